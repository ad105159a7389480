use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Teacher,
    Student,
    Parent,
    /// Any role string this build does not recognise. Never granted anything.
    #[serde(other)]
    Unknown,
}

impl Role {
    pub fn parse(raw: &str) -> Role {
        match raw.trim().to_ascii_lowercase().as_str() {
            "admin" => Role::Admin,
            "teacher" => Role::Teacher,
            "student" => Role::Student,
            "parent" => Role::Parent,
            _ => Role::Unknown,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Teacher => "teacher",
            Role::Student => "student",
            Role::Parent => "parent",
            Role::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Verified caller of one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub subject_id: i64,
    pub role: Role,
}

impl Identity {
    pub fn new(subject_id: i64, role: Role) -> Self {
        Self { subject_id, role }
    }

    pub fn admin(subject_id: i64) -> Self {
        Self::new(subject_id, Role::Admin)
    }

    pub fn teacher(subject_id: i64) -> Self {
        Self::new(subject_id, Role::Teacher)
    }

    pub fn student(subject_id: i64) -> Self {
        Self::new(subject_id, Role::Student)
    }

    pub fn parent(subject_id: i64) -> Self {
        Self::new(subject_id, Role::Parent)
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.role, self.subject_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unrecognised_role_strings_become_unknown() {
        assert_eq!(Role::parse("ADMIN"), Role::Admin);
        assert_eq!(Role::parse("superuser"), Role::Unknown);
        let decoded: Role = serde_json::from_str("\"principal\"").expect("decode role");
        assert_eq!(decoded, Role::Unknown);
    }
}
