use crate::error::{AccessError, AuthError};
use serde_json::json;

pub fn ok(id: &str, result: serde_json::Value) -> serde_json::Value {
    json!({
        "id": id,
        "ok": true,
        "result": result
    })
}

pub fn err(
    id: &str,
    code: &str,
    message: impl Into<String>,
    details: Option<serde_json::Value>,
) -> serde_json::Value {
    let mut error = json!({
        "code": code,
        "message": message.into(),
    });
    if let Some(d) = details {
        error["details"] = d;
    }
    json!({
        "id": id,
        "ok": false,
        "error": error,
    })
}

/// Renders a service error. Scope violations read exactly like capability
/// denials; only the audit log tells them apart.
pub fn access_err(id: &str, e: &AccessError) -> serde_json::Value {
    let details = match e {
        AccessError::Auth(AuthError::Forbidden {
            entity,
            action,
            field,
            ..
        }) => Some(json!({ "entity": entity, "action": action, "field": field })),
        AccessError::ScopeViolation { entity, .. } => Some(json!({ "entity": entity })),
        AccessError::NotFound { entity, id } => Some(json!({ "entity": entity, "id": id })),
        AccessError::Invalid { entity, .. } => Some(json!({ "entity": entity })),
        _ => None,
    };
    let message = match e {
        AccessError::ScopeViolation { entity, .. } => {
            format!("{entity} is outside the caller's scope")
        }
        other => other.to_string(),
    };
    err(id, e.code(), message, details)
}

pub fn auth_err(id: &str, e: &AuthError) -> serde_json::Value {
    let code = match e {
        AuthError::ExpiredToken | AuthError::Malformed(_) => "not_authenticated",
        AuthError::Forbidden { .. } => "forbidden",
    };
    err(id, code, e.to_string(), None)
}
