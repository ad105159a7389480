//! Static ownership graph of the school schema.
//!
//! Every scope predicate is expressed in terms of the key columns and links
//! declared here, so the same predicate can be evaluated in memory or compiled
//! to SQL without either side knowing about roles.

use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EntityType {
    Teacher,
    Student,
    Parent,
    Class,
    Subject,
    Lesson,
    Exam,
    Assignment,
    Submission,
    Attendance,
    Result,
    Event,
    Announcement,
    Finance,
}

impl EntityType {
    pub const ALL: [EntityType; 14] = [
        EntityType::Teacher,
        EntityType::Student,
        EntityType::Parent,
        EntityType::Class,
        EntityType::Subject,
        EntityType::Lesson,
        EntityType::Exam,
        EntityType::Assignment,
        EntityType::Submission,
        EntityType::Attendance,
        EntityType::Result,
        EntityType::Event,
        EntityType::Announcement,
        EntityType::Finance,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EntityType::Teacher => "teacher",
            EntityType::Student => "student",
            EntityType::Parent => "parent",
            EntityType::Class => "class",
            EntityType::Subject => "subject",
            EntityType::Lesson => "lesson",
            EntityType::Exam => "exam",
            EntityType::Assignment => "assignment",
            EntityType::Submission => "submission",
            EntityType::Attendance => "attendance",
            EntityType::Result => "result",
            EntityType::Event => "event",
            EntityType::Announcement => "announcement",
            EntityType::Finance => "finance",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let wanted = raw.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|e| e.as_str().eq_ignore_ascii_case(wanted))
    }

    pub fn table(self) -> &'static str {
        match self {
            EntityType::Teacher => "teachers",
            EntityType::Student => "students",
            EntityType::Parent => "parents",
            EntityType::Class => "classes",
            EntityType::Subject => "subjects",
            EntityType::Lesson => "lessons",
            EntityType::Exam => "exams",
            EntityType::Assignment => "assignments",
            EntityType::Submission => "submissions",
            EntityType::Attendance => "attendances",
            EntityType::Result => "results",
            EntityType::Event => "events",
            EntityType::Announcement => "announcements",
            EntityType::Finance => "finances",
        }
    }

    /// Key columns a predicate may compare on this entity. `Id` is always first.
    pub fn columns(self) -> &'static [Column] {
        use Column::*;
        match self {
            EntityType::Teacher | EntityType::Parent | EntityType::Subject | EntityType::Finance => {
                &[Id]
            }
            EntityType::Class => &[Id, SupervisorId],
            EntityType::Student => &[Id, ClassId, ParentId],
            EntityType::Lesson => &[Id, TeacherId, ClassId, SubjectId],
            EntityType::Exam | EntityType::Assignment => &[Id, LessonId],
            EntityType::Submission => &[Id, AssignmentId, StudentId],
            EntityType::Attendance => &[Id, LessonId, StudentId, TeacherId],
            EntityType::Result => &[Id, StudentId, ExamId, AssignmentId],
            EntityType::Event | EntityType::Announcement => &[Id, ClassId],
        }
    }

    pub fn has_column(self, column: Column) -> bool {
        self.columns().contains(&column)
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Column {
    Id,
    TeacherId,
    ClassId,
    StudentId,
    ParentId,
    SupervisorId,
    SubjectId,
    LessonId,
    ExamId,
    AssignmentId,
}

impl Column {
    pub fn sql_name(self) -> &'static str {
        match self {
            Column::Id => "id",
            Column::TeacherId => "teacher_id",
            Column::ClassId => "class_id",
            Column::StudentId => "student_id",
            Column::ParentId => "parent_id",
            Column::SupervisorId => "supervisor_id",
            Column::SubjectId => "subject_id",
            Column::LessonId => "lesson_id",
            Column::ExamId => "exam_id",
            Column::AssignmentId => "assignment_id",
        }
    }

    pub fn json_name(self) -> &'static str {
        match self {
            Column::Id => "id",
            Column::TeacherId => "teacherId",
            Column::ClassId => "classId",
            Column::StudentId => "studentId",
            Column::ParentId => "parentId",
            Column::SupervisorId => "supervisorId",
            Column::SubjectId => "subjectId",
            Column::LessonId => "lessonId",
            Column::ExamId => "examId",
            Column::AssignmentId => "assignmentId",
        }
    }

    pub fn parse_json(raw: &str) -> Option<Self> {
        use Column::*;
        [
            Id,
            TeacherId,
            ClassId,
            StudentId,
            ParentId,
            SupervisorId,
            SubjectId,
            LessonId,
            ExamId,
            AssignmentId,
        ]
        .into_iter()
        .find(|c| c.json_name() == raw)
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.sql_name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    /// `from.column` holds the id of one `to` row (or is null).
    One,
    /// Every `to` row whose `column` equals `from.id`.
    Many,
}

#[derive(Debug, PartialEq, Eq)]
pub struct Link {
    pub name: &'static str,
    pub from: EntityType,
    pub to: EntityType,
    pub column: Column,
    pub cardinality: Cardinality,
}

impl Link {
    const fn one(name: &'static str, from: EntityType, column: Column, to: EntityType) -> Self {
        Self {
            name,
            from,
            to,
            column,
            cardinality: Cardinality::One,
        }
    }

    const fn many(name: &'static str, from: EntityType, to: EntityType, column: Column) -> Self {
        Self {
            name,
            from,
            to,
            column,
            cardinality: Cardinality::Many,
        }
    }
}

impl fmt::Display for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.from, self.name)
    }
}

impl Serialize for Link {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

pub static STUDENT_CLASS: Link =
    Link::one("class", EntityType::Student, Column::ClassId, EntityType::Class);
pub static STUDENT_PARENT: Link =
    Link::one("parent", EntityType::Student, Column::ParentId, EntityType::Parent);
pub static PARENT_CHILDREN: Link =
    Link::many("children", EntityType::Parent, EntityType::Student, Column::ParentId);
pub static CLASS_SUPERVISOR: Link = Link::one(
    "supervisor",
    EntityType::Class,
    Column::SupervisorId,
    EntityType::Teacher,
);
pub static CLASS_STUDENTS: Link =
    Link::many("students", EntityType::Class, EntityType::Student, Column::ClassId);
pub static TEACHER_LESSONS: Link =
    Link::many("lessons", EntityType::Teacher, EntityType::Lesson, Column::TeacherId);
pub static LESSON_TEACHER: Link =
    Link::one("teacher", EntityType::Lesson, Column::TeacherId, EntityType::Teacher);
pub static LESSON_CLASS: Link =
    Link::one("class", EntityType::Lesson, Column::ClassId, EntityType::Class);
pub static LESSON_SUBJECT: Link =
    Link::one("subject", EntityType::Lesson, Column::SubjectId, EntityType::Subject);
pub static EXAM_LESSON: Link =
    Link::one("lesson", EntityType::Exam, Column::LessonId, EntityType::Lesson);
pub static ASSIGNMENT_LESSON: Link =
    Link::one("lesson", EntityType::Assignment, Column::LessonId, EntityType::Lesson);
pub static SUBMISSION_ASSIGNMENT: Link = Link::one(
    "assignment",
    EntityType::Submission,
    Column::AssignmentId,
    EntityType::Assignment,
);
pub static SUBMISSION_STUDENT: Link = Link::one(
    "student",
    EntityType::Submission,
    Column::StudentId,
    EntityType::Student,
);
pub static ATTENDANCE_LESSON: Link =
    Link::one("lesson", EntityType::Attendance, Column::LessonId, EntityType::Lesson);
pub static ATTENDANCE_STUDENT: Link = Link::one(
    "student",
    EntityType::Attendance,
    Column::StudentId,
    EntityType::Student,
);
pub static ATTENDANCE_TEACHER: Link = Link::one(
    "teacher",
    EntityType::Attendance,
    Column::TeacherId,
    EntityType::Teacher,
);
pub static RESULT_STUDENT: Link =
    Link::one("student", EntityType::Result, Column::StudentId, EntityType::Student);
pub static RESULT_EXAM: Link =
    Link::one("exam", EntityType::Result, Column::ExamId, EntityType::Exam);
pub static RESULT_ASSIGNMENT: Link = Link::one(
    "assignment",
    EntityType::Result,
    Column::AssignmentId,
    EntityType::Assignment,
);
pub static EVENT_CLASS: Link =
    Link::one("class", EntityType::Event, Column::ClassId, EntityType::Class);
pub static ANNOUNCEMENT_CLASS: Link = Link::one(
    "class",
    EntityType::Announcement,
    Column::ClassId,
    EntityType::Class,
);

pub static LINKS: [&Link; 21] = [
    &STUDENT_CLASS,
    &STUDENT_PARENT,
    &PARENT_CHILDREN,
    &CLASS_SUPERVISOR,
    &CLASS_STUDENTS,
    &TEACHER_LESSONS,
    &LESSON_TEACHER,
    &LESSON_CLASS,
    &LESSON_SUBJECT,
    &EXAM_LESSON,
    &ASSIGNMENT_LESSON,
    &SUBMISSION_ASSIGNMENT,
    &SUBMISSION_STUDENT,
    &ATTENDANCE_LESSON,
    &ATTENDANCE_STUDENT,
    &ATTENDANCE_TEACHER,
    &RESULT_STUDENT,
    &RESULT_EXAM,
    &RESULT_ASSIGNMENT,
    &EVENT_CLASS,
    &ANNOUNCEMENT_CLASS,
];

/// Foreign keys held by `entity`: every to-one link leaving it.
pub fn references(entity: EntityType) -> impl Iterator<Item = &'static Link> {
    LINKS
        .iter()
        .copied()
        .filter(move |l| l.from == entity && l.cardinality == Cardinality::One)
}

/// Foreign keys pointing at `entity` from other tables.
pub fn referenced_by(entity: EntityType) -> impl Iterator<Item = &'static Link> {
    LINKS
        .iter()
        .copied()
        .filter(move |l| l.to == entity && l.cardinality == Cardinality::One)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn link_columns_exist_on_the_holding_side() {
        for link in LINKS.iter() {
            let holder = match link.cardinality {
                Cardinality::One => link.from,
                Cardinality::Many => link.to,
            };
            assert!(
                holder.has_column(link.column),
                "{link} uses {} which {holder} does not have",
                link.column
            );
        }
    }

    #[test]
    fn every_non_id_key_column_has_a_reference() {
        for entity in EntityType::ALL {
            for column in entity.columns().iter().filter(|c| **c != Column::Id) {
                assert!(
                    references(entity).any(|l| l.column == *column),
                    "{entity}.{column} is not declared as a link"
                );
            }
        }
    }

    #[test]
    fn parse_accepts_display_names() {
        for entity in EntityType::ALL {
            assert_eq!(EntityType::parse(entity.as_str()), Some(entity));
        }
        assert_eq!(EntityType::parse("Announcement"), Some(EntityType::Announcement));
        assert_eq!(EntityType::parse("payroll"), None);
    }

    #[test]
    fn many_links_mirror_a_one_link() {
        assert!(referenced_by(EntityType::Class).any(|l| *l == LESSON_CLASS));
        assert_eq!(CLASS_STUDENTS.column, STUDENT_CLASS.column);
        assert_eq!(PARENT_CHILDREN.column, STUDENT_PARENT.column);
    }
}
