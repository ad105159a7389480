use crate::capability::Action;
use crate::graph::EntityType;
use crate::identity::Role;
use thiserror::Error;

/// Failures deciding who the caller is and what they may do.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("session token expired")]
    ExpiredToken,

    #[error("malformed session token: {0}")]
    Malformed(String),

    #[error(
        "{action} on {entity} is not permitted for role {role}{}",
        .field.as_ref().map(|f| format!(" (field `{f}`)")).unwrap_or_default()
    )]
    Forbidden {
        role: Role,
        entity: EntityType,
        action: Action,
        field: Option<String>,
    },
}

impl AuthError {
    pub(crate) fn forbidden(role: Role, entity: EntityType, action: Action) -> Self {
        AuthError::Forbidden {
            role,
            entity,
            action,
            field: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("constraint violated: {0}")]
    Constraint(String),

    #[error("stored {entity} row {id} is inconsistent: {message}")]
    Corrupt {
        entity: EntityType,
        id: i64,
        message: String,
    },

    #[error(transparent)]
    Sqlite(rusqlite::Error),
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        match &e {
            rusqlite::Error::SqliteFailure(code, message)
                if code.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                StoreError::Constraint(message.clone().unwrap_or_else(|| code.to_string()))
            }
            _ => StoreError::Sqlite(e),
        }
    }
}

/// Everything the scoped query service can reject a request with.
#[derive(Debug, Error)]
pub enum AccessError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("{entity} {id} is outside the caller's scope")]
    ScopeViolation { entity: EntityType, id: i64 },

    #[error("{entity} {id} not found")]
    NotFound { entity: EntityType, id: i64 },

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("invalid {entity} record: {message}")]
    Invalid { entity: EntityType, message: String },

    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for AccessError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Constraint(message) => AccessError::Conflict(message),
            other => AccessError::Store(other),
        }
    }
}

impl AccessError {
    /// Stable code reported to the host process.
    pub fn code(&self) -> &'static str {
        match self {
            AccessError::Auth(AuthError::ExpiredToken | AuthError::Malformed(_)) => {
                "not_authenticated"
            }
            // Scope violations are reported exactly like capability denials.
            AccessError::Auth(AuthError::Forbidden { .. }) | AccessError::ScopeViolation { .. } => {
                "forbidden"
            }
            AccessError::NotFound { .. } => "not_found",
            AccessError::Conflict(_) => "conflict",
            AccessError::Invalid { .. } => "invalid_record",
            AccessError::Store(_) => "db_query_failed",
        }
    }

    pub fn is_denial(&self) -> bool {
        self.code() == "forbidden"
    }
}
