//! Role × entity dispatch table for read scopes.
//!
//! Every list page, detail page and mutation consults [`resolve_scope`]; no
//! caller rebuilds an ownership traversal of its own.

use crate::graph::{
    Column, EntityType, Link, ANNOUNCEMENT_CLASS, ASSIGNMENT_LESSON, ATTENDANCE_LESSON,
    ATTENDANCE_STUDENT, CLASS_STUDENTS, EVENT_CLASS, EXAM_LESSON, LESSON_CLASS, RESULT_ASSIGNMENT,
    RESULT_EXAM, RESULT_STUDENT, SUBMISSION_ASSIGNMENT, SUBMISSION_STUDENT,
};
use crate::identity::{Identity, Role};
use crate::scope::{Predicate, Scope};
use tracing::debug;

/// How a (role, entity) pair narrows rows, independent of who exactly asks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Rule {
    All,
    Nothing,
    /// `column == self`.
    Own(Column),
    /// Lesson-derived rows whose lesson is taught by the caller.
    TaughtBy(LessonPath),
    /// Lesson-derived rows whose lesson's class holds the caller.
    AttendedBy(LessonPath),
    /// Lesson-derived rows whose lesson's class holds one of the caller's children.
    AttendedByChild(LessonPath),
    /// Rows pointing at a student who is the caller's child.
    ChildOf(&'static Link),
    /// Attendance recorded for the caller or taken in the caller's lessons.
    AttendanceOfTeacher,
    /// Results for an exam or assignment in one of the caller's lessons.
    ResultsOfTeacher,
    /// Global rows plus rows for the class holding the caller.
    AudienceOfStudent(&'static Link),
    /// Global rows plus rows for any class holding one of the caller's children.
    AudienceOfParent(&'static Link),
    /// A class (row itself) holding the caller.
    ClassOfStudent,
    /// A class (row itself) holding one of the caller's children.
    ClassOfParent,
}

/// Hops from an entity to the lesson it belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LessonPath {
    Itself,
    Via(&'static Link),
    Via2(&'static Link, &'static Link),
}

impl LessonPath {
    fn wrap(self, on_lesson: Predicate) -> Predicate {
        match self {
            LessonPath::Itself => on_lesson,
            LessonPath::Via(link) => Predicate::follow(link, on_lesson),
            LessonPath::Via2(first, second) => {
                Predicate::follow(first, Predicate::follow(second, on_lesson))
            }
        }
    }
}

static LESSON: LessonPath = LessonPath::Itself;
static EXAM: LessonPath = LessonPath::Via(&EXAM_LESSON);
static ASSIGNMENT: LessonPath = LessonPath::Via(&ASSIGNMENT_LESSON);
static SUBMISSION: LessonPath = LessonPath::Via2(&SUBMISSION_ASSIGNMENT, &ASSIGNMENT_LESSON);

fn rule(role: Role, entity: EntityType) -> Rule {
    use EntityType as E;
    use Role as R;
    match (role, entity) {
        (R::Admin, _) => Rule::All,
        (R::Unknown, _) => Rule::Nothing,

        (R::Teacher, E::Lesson) => Rule::TaughtBy(LESSON),
        (R::Teacher, E::Exam) => Rule::TaughtBy(EXAM),
        (R::Teacher, E::Assignment) => Rule::TaughtBy(ASSIGNMENT),
        (R::Teacher, E::Submission) => Rule::TaughtBy(SUBMISSION),
        (R::Teacher, E::Attendance) => Rule::AttendanceOfTeacher,
        (R::Teacher, E::Result) => Rule::ResultsOfTeacher,
        (R::Teacher, E::Event | E::Announcement) => Rule::All,
        (R::Teacher, E::Teacher | E::Student | E::Parent | E::Class) => Rule::All,

        (R::Student, E::Lesson) => Rule::AttendedBy(LESSON),
        (R::Student, E::Exam) => Rule::AttendedBy(EXAM),
        (R::Student, E::Assignment) => Rule::AttendedBy(ASSIGNMENT),
        (R::Student, E::Submission) => Rule::Own(Column::StudentId),
        (R::Student, E::Attendance) => Rule::Own(Column::StudentId),
        (R::Student, E::Result) => Rule::Own(Column::StudentId),
        (R::Student, E::Event) => Rule::AudienceOfStudent(&EVENT_CLASS),
        (R::Student, E::Announcement) => Rule::AudienceOfStudent(&ANNOUNCEMENT_CLASS),
        (R::Student, E::Student) => Rule::Own(Column::Id),
        (R::Student, E::Class) => Rule::ClassOfStudent,

        (R::Parent, E::Lesson) => Rule::AttendedByChild(LESSON),
        (R::Parent, E::Exam) => Rule::AttendedByChild(EXAM),
        (R::Parent, E::Assignment) => Rule::AttendedByChild(ASSIGNMENT),
        (R::Parent, E::Submission) => Rule::ChildOf(&SUBMISSION_STUDENT),
        (R::Parent, E::Attendance) => Rule::ChildOf(&ATTENDANCE_STUDENT),
        (R::Parent, E::Result) => Rule::ChildOf(&RESULT_STUDENT),
        (R::Parent, E::Event) => Rule::AudienceOfParent(&EVENT_CLASS),
        (R::Parent, E::Announcement) => Rule::AudienceOfParent(&ANNOUNCEMENT_CLASS),
        (R::Parent, E::Student) => Rule::Own(Column::ParentId),
        (R::Parent, E::Parent) => Rule::Own(Column::Id),
        (R::Parent, E::Class) => Rule::ClassOfParent,

        _ => Rule::Nothing,
    }
}

/// A class holding a student that matches `on_student`.
fn class_holding(on_student: Predicate) -> Predicate {
    Predicate::any(&CLASS_STUDENTS, on_student)
}

fn build(rule: Rule, me: i64) -> Scope {
    let predicate = match rule {
        Rule::All => return Scope::All,
        Rule::Nothing => return Scope::Nothing,
        Rule::Own(column) => Predicate::eq(column, me),
        Rule::TaughtBy(path) => path.wrap(Predicate::eq(Column::TeacherId, me)),
        Rule::AttendedBy(path) => path.wrap(Predicate::follow(
            &LESSON_CLASS,
            class_holding(Predicate::eq(Column::Id, me)),
        )),
        Rule::AttendedByChild(path) => path.wrap(Predicate::follow(
            &LESSON_CLASS,
            class_holding(Predicate::eq(Column::ParentId, me)),
        )),
        Rule::ChildOf(link) => Predicate::follow(link, Predicate::eq(Column::ParentId, me)),
        // Matches the attendee teacher as well as the lesson's teacher, so a
        // teacher covering someone else's lesson still sees their own rows.
        Rule::AttendanceOfTeacher => Predicate::or([
            Predicate::eq(Column::TeacherId, me),
            Predicate::follow(&ATTENDANCE_LESSON, Predicate::eq(Column::TeacherId, me)),
        ]),
        Rule::ResultsOfTeacher => Predicate::or([
            Predicate::follow(
                &RESULT_EXAM,
                EXAM.wrap(Predicate::eq(Column::TeacherId, me)),
            ),
            Predicate::follow(
                &RESULT_ASSIGNMENT,
                ASSIGNMENT.wrap(Predicate::eq(Column::TeacherId, me)),
            ),
        ]),
        Rule::AudienceOfStudent(link) => Predicate::or([
            Predicate::is_null(Column::ClassId),
            Predicate::follow(link, class_holding(Predicate::eq(Column::Id, me))),
        ]),
        Rule::AudienceOfParent(link) => Predicate::or([
            Predicate::is_null(Column::ClassId),
            Predicate::follow(link, class_holding(Predicate::eq(Column::ParentId, me))),
        ]),
        Rule::ClassOfStudent => class_holding(Predicate::eq(Column::Id, me)),
        Rule::ClassOfParent => class_holding(Predicate::eq(Column::ParentId, me)),
    };
    Scope::Where(predicate)
}

/// Rows of `entity` visible to `identity`. Pure; unknown pairs get no rows.
pub fn resolve_scope(identity: &Identity, entity: EntityType) -> Scope {
    let scope = build(rule(identity.role, entity), identity.subject_id);
    debug!(%identity, %entity, %scope, "resolved scope");
    scope
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_sees_everything_and_unknown_sees_nothing() {
        for entity in EntityType::ALL {
            assert_eq!(resolve_scope(&Identity::admin(1), entity), Scope::All);
            assert_eq!(
                resolve_scope(&Identity::new(1, Role::Unknown), entity),
                Scope::Nothing
            );
        }
    }

    #[test]
    fn finance_and_subjects_are_admin_only() {
        for identity in [Identity::teacher(7), Identity::student(21), Identity::parent(3)] {
            assert!(resolve_scope(&identity, EntityType::Finance).is_nothing());
            assert!(resolve_scope(&identity, EntityType::Subject).is_nothing());
        }
    }

    #[test]
    fn every_resolved_predicate_is_well_formed() {
        for role in [Role::Admin, Role::Teacher, Role::Student, Role::Parent, Role::Unknown] {
            for entity in EntityType::ALL {
                if let Scope::Where(p) = resolve_scope(&Identity::new(5, role), entity) {
                    p.check(entity)
                        .unwrap_or_else(|e| panic!("{role} on {entity}: {e}"));
                }
            }
        }
    }

    #[test]
    fn teacher_attendance_keeps_the_attendee_grant() {
        let scope = resolve_scope(&Identity::teacher(7), EntityType::Attendance);
        assert_eq!(
            scope,
            Scope::Where(Predicate::Or(vec![
                Predicate::eq(Column::TeacherId, 7),
                Predicate::follow(&ATTENDANCE_LESSON, Predicate::eq(Column::TeacherId, 7)),
            ]))
        );
    }

    #[test]
    fn teacher_results_go_through_exam_or_assignment_lessons() {
        let Scope::Where(Predicate::Or(parts)) =
            resolve_scope(&Identity::teacher(7), EntityType::Result)
        else {
            panic!("expected a disjunction");
        };
        assert_eq!(parts.len(), 2);
        assert_eq!(
            parts[0],
            Predicate::follow(
                &RESULT_EXAM,
                Predicate::follow(&EXAM_LESSON, Predicate::eq(Column::TeacherId, 7))
            )
        );
    }

    #[test]
    fn student_events_include_global_rows() {
        let scope = resolve_scope(&Identity::student(21), EntityType::Event);
        assert_eq!(
            scope.to_string(),
            "(class_id IS NULL OR class.(any students.(id = 21)))"
        );
        let parent = resolve_scope(&Identity::parent(3), EntityType::Announcement);
        assert_eq!(
            parent.to_string(),
            "(class_id IS NULL OR class.(any students.(parent_id = 3)))"
        );
    }

    #[test]
    fn teachers_see_all_events_like_admins() {
        assert_eq!(
            resolve_scope(&Identity::teacher(7), EntityType::Announcement),
            Scope::All
        );
    }

    #[test]
    fn resolution_is_idempotent() {
        for identity in [Identity::teacher(7), Identity::student(21), Identity::parent(3)] {
            for entity in EntityType::ALL {
                assert_eq!(resolve_scope(&identity, entity), resolve_scope(&identity, entity));
            }
        }
    }
}
