use crate::graph::EntityType;
use crate::identity::{Identity, Role};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Read,
    Create,
    Update,
    Delete,
}

impl Action {
    pub const ALL: [Action; 4] = [Action::Read, Action::Create, Action::Update, Action::Delete];

    pub fn as_str(self) -> &'static str {
        match self {
            Action::Read => "read",
            Action::Create => "create",
            Action::Update => "update",
            Action::Delete => "delete",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a capability lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grant {
    Deny,
    Allow,
    /// Allowed only on the row whose id is the caller's own subject id.
    OwnRecord,
}

/// A set of camelCase field names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum FieldSet {
    All,
    None,
    Only(&'static [&'static str]),
}

impl FieldSet {
    pub fn contains(&self, field: &str) -> bool {
        match self {
            FieldSet::All => true,
            FieldSet::None => false,
            FieldSet::Only(fields) => fields.iter().any(|f| *f == field),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldAccess {
    pub visible: FieldSet,
    pub creatable: FieldSet,
    pub mutable: FieldSet,
}

const EXAM_FIELDS: &[&str] = &["title", "startTime", "endTime", "lessonId"];
const ASSIGNMENT_FIELDS: &[&str] = &["title", "startDate", "dueDate", "lessonId"];
const ATTENDANCE_FIELDS: &[&str] = &["date", "present", "lessonId", "attendee"];
const RESULT_FIELDS: &[&str] = &["score", "studentId", "source"];
const EVENT_FIELDS: &[&str] = &["title", "description", "startTime", "endTime", "audience"];
const ANNOUNCEMENT_FIELDS: &[&str] = &["title", "description", "date", "audience"];
const CONTACT_FIELDS: &[&str] = &["email", "phone", "address"];
const SUBMISSION_CREATE_FIELDS: &[&str] = &["assignmentId", "studentId", "content"];
const SUBMISSION_UPDATE_FIELDS: &[&str] = &["content"];

fn is_readable(role: Role, entity: EntityType) -> bool {
    use EntityType as E;
    match role {
        Role::Admin => true,
        Role::Teacher => !matches!(entity, E::Finance | E::Subject),
        Role::Student => matches!(
            entity,
            E::Lesson
                | E::Exam
                | E::Assignment
                | E::Submission
                | E::Attendance
                | E::Result
                | E::Event
                | E::Announcement
                | E::Student
                | E::Class
        ),
        Role::Parent => matches!(
            entity,
            E::Lesson
                | E::Exam
                | E::Assignment
                | E::Submission
                | E::Attendance
                | E::Result
                | E::Event
                | E::Announcement
                | E::Student
                | E::Parent
                | E::Class
        ),
        Role::Unknown => false,
    }
}

/// Fields a role may set on create and on update, or `None` when it may not write.
fn writable_fields(role: Role, entity: EntityType) -> Option<(FieldSet, FieldSet)> {
    use EntityType as E;
    let both = |fields| Some((FieldSet::Only(fields), FieldSet::Only(fields)));
    match (role, entity) {
        (Role::Admin, _) => Some((FieldSet::All, FieldSet::All)),
        (Role::Teacher, E::Exam) => both(EXAM_FIELDS),
        (Role::Teacher, E::Assignment) => both(ASSIGNMENT_FIELDS),
        (Role::Teacher, E::Attendance) => both(ATTENDANCE_FIELDS),
        (Role::Teacher, E::Result) => both(RESULT_FIELDS),
        (Role::Teacher, E::Event) => both(EVENT_FIELDS),
        (Role::Teacher, E::Announcement) => both(ANNOUNCEMENT_FIELDS),
        (Role::Teacher, E::Teacher) => Some((FieldSet::None, FieldSet::Only(CONTACT_FIELDS))),
        (Role::Student, E::Submission) => Some((
            FieldSet::Only(SUBMISSION_CREATE_FIELDS),
            FieldSet::Only(SUBMISSION_UPDATE_FIELDS),
        )),
        _ => None,
    }
}

pub fn grant(identity: &Identity, entity: EntityType, action: Action) -> Grant {
    use EntityType as E;
    let role = identity.role;
    if action == Action::Read {
        return if is_readable(role, entity) {
            Grant::Allow
        } else {
            Grant::Deny
        };
    }
    match (role, entity, action) {
        (Role::Admin, _, _) => Grant::Allow,
        (
            Role::Teacher,
            E::Exam | E::Assignment | E::Attendance | E::Result | E::Event | E::Announcement,
            _,
        ) => Grant::Allow,
        (Role::Teacher, E::Teacher, Action::Update) => Grant::OwnRecord,
        (Role::Student, E::Submission, Action::Create | Action::Update) => Grant::Allow,
        _ => Grant::Deny,
    }
}

/// Whether `identity` may perform `action` on some row of `entity`.
pub fn resolve_capability(identity: &Identity, entity: EntityType, action: Action) -> bool {
    grant(identity, entity, action) != Grant::Deny
}

pub fn field_access(identity: &Identity, entity: EntityType) -> FieldAccess {
    let visible = if is_readable(identity.role, entity) {
        FieldSet::All
    } else {
        FieldSet::None
    };
    let (creatable, mutable) =
        writable_fields(identity.role, entity).unwrap_or((FieldSet::None, FieldSet::None));
    let creatable = if resolve_capability(identity, entity, Action::Create) {
        creatable
    } else {
        FieldSet::None
    };
    FieldAccess {
        visible,
        creatable,
        mutable,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::resolve_scope;

    #[test]
    fn admin_can_do_everything() {
        let admin = Identity::admin(1);
        for entity in EntityType::ALL {
            for action in Action::ALL {
                assert!(resolve_capability(&admin, entity, action));
            }
            assert_eq!(field_access(&admin, entity).mutable, FieldSet::All);
        }
    }

    #[test]
    fn teacher_writes_lesson_derived_rows_but_not_lessons() {
        let teacher = Identity::teacher(7);
        for entity in [EntityType::Exam, EntityType::Attendance, EntityType::Announcement] {
            for action in Action::ALL {
                assert!(resolve_capability(&teacher, entity, action), "{entity} {action}");
            }
        }
        assert!(resolve_capability(&teacher, EntityType::Lesson, Action::Read));
        assert!(!resolve_capability(&teacher, EntityType::Lesson, Action::Update));
        assert!(!resolve_capability(&teacher, EntityType::Student, Action::Delete));
        assert!(!resolve_capability(&teacher, EntityType::Finance, Action::Read));
    }

    #[test]
    fn teacher_may_only_touch_own_contact_fields() {
        let teacher = Identity::teacher(7);
        assert_eq!(grant(&teacher, EntityType::Teacher, Action::Update), Grant::OwnRecord);
        assert_eq!(grant(&teacher, EntityType::Teacher, Action::Delete), Grant::Deny);
        let access = field_access(&teacher, EntityType::Teacher);
        assert!(access.mutable.contains("phone"));
        assert!(!access.mutable.contains("username"));
        assert_eq!(access.creatable, FieldSet::None);
    }

    #[test]
    fn students_write_only_their_answers() {
        let student = Identity::student(21);
        assert!(!resolve_capability(&student, EntityType::Assignment, Action::Delete));
        assert!(!resolve_capability(&student, EntityType::Result, Action::Update));
        assert!(resolve_capability(&student, EntityType::Submission, Action::Create));
        assert!(!resolve_capability(&student, EntityType::Submission, Action::Delete));
        let access = field_access(&student, EntityType::Submission);
        assert!(access.creatable.contains("assignmentId"));
        assert!(!access.mutable.contains("assignmentId"));
    }

    #[test]
    fn parents_and_unknown_roles_are_read_only() {
        for identity in [Identity::parent(3), Identity::new(3, Role::Unknown)] {
            for entity in EntityType::ALL {
                for action in [Action::Create, Action::Update, Action::Delete] {
                    assert!(!resolve_capability(&identity, entity, action));
                }
            }
        }
    }

    #[test]
    fn read_capability_matches_a_non_empty_scope() {
        for role in [Role::Admin, Role::Teacher, Role::Student, Role::Parent, Role::Unknown] {
            let identity = Identity::new(4, role);
            for entity in EntityType::ALL {
                assert_eq!(
                    resolve_capability(&identity, entity, Action::Read),
                    !resolve_scope(&identity, entity).is_nothing(),
                    "{role} reading {entity}"
                );
            }
        }
    }
}
