use crate::identity::{Identity, Role};
use crate::ipc::error::{auth_err, err, ok};
use crate::ipc::helpers::{authenticate, get_required_i64, get_required_str, Reply};
use crate::ipc::types::{AppState, Request};
use chrono::Utc;
use serde_json::json;
use tracing::info;

/// Issuing is a host privilege: the host has already authenticated the user.
fn handle_issue(state: &mut AppState, req: &Request) -> Reply {
    let subject_id = get_required_i64(req, "subjectId")?;
    let raw_role = get_required_str(req, "role")?;
    let role = Role::parse(raw_role);
    if role == Role::Unknown {
        return Err(err(
            &req.id,
            "bad_params",
            format!("unknown role: {raw_role}"),
            None,
        ));
    }
    let identity = Identity::new(subject_id, role);
    let issued = state
        .sessions
        .issue(&identity, Utc::now())
        .map_err(|e| auth_err(&req.id, &e))?;
    info!(%identity, expires_at = %issued.expires_at, "session issued");
    Ok(ok(
        &req.id,
        json!({ "token": issued.token, "expiresAt": issued.expires_at }),
    ))
}

fn handle_verify(state: &mut AppState, req: &Request) -> Reply {
    let identity = authenticate(state, req)?;
    Ok(ok(
        &req.id,
        json!({ "subjectId": identity.subject_id, "role": identity.role }),
    ))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let reply = match req.method.as_str() {
        "session.issue" => handle_issue(state, req),
        "session.verify" => handle_verify(state, req),
        _ => return None,
    };
    Some(reply.unwrap_or_else(|e| e))
}
