use crate::graph::{Column, EntityType};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Teacher {
    #[serde(default)]
    pub id: i64,
    pub username: String,
    pub name: String,
    pub surname: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    pub address: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Parent {
    #[serde(default)]
    pub id: i64,
    pub username: String,
    pub name: String,
    pub surname: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    pub address: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Class {
    #[serde(default)]
    pub id: i64,
    pub name: String,
    pub capacity: i64,
    pub grade: i64,
    #[serde(default)]
    pub supervisor_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Student {
    #[serde(default)]
    pub id: i64,
    pub username: String,
    pub name: String,
    pub surname: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    pub address: String,
    pub grade: i64,
    pub class_id: i64,
    #[serde(default)]
    pub parent_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Subject {
    #[serde(default)]
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Day {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
}

impl Day {
    pub fn as_str(self) -> &'static str {
        match self {
            Day::Monday => "MONDAY",
            Day::Tuesday => "TUESDAY",
            Day::Wednesday => "WEDNESDAY",
            Day::Thursday => "THURSDAY",
            Day::Friday => "FRIDAY",
        }
    }

    pub fn parse(raw: &str) -> Option<Day> {
        match raw {
            "MONDAY" => Some(Day::Monday),
            "TUESDAY" => Some(Day::Tuesday),
            "WEDNESDAY" => Some(Day::Wednesday),
            "THURSDAY" => Some(Day::Thursday),
            "FRIDAY" => Some(Day::Friday),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Lesson {
    #[serde(default)]
    pub id: i64,
    pub name: String,
    pub day: Day,
    pub start_time: NaiveDateTime,
    pub end_time: NaiveDateTime,
    pub subject_id: i64,
    pub class_id: i64,
    pub teacher_id: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Exam {
    #[serde(default)]
    pub id: i64,
    pub title: String,
    pub start_time: NaiveDateTime,
    pub end_time: NaiveDateTime,
    pub lesson_id: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Assignment {
    #[serde(default)]
    pub id: i64,
    pub title: String,
    pub start_date: NaiveDate,
    pub due_date: NaiveDate,
    pub lesson_id: i64,
}

/// A student's answer to one assignment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Submission {
    #[serde(default)]
    pub id: i64,
    pub assignment_id: i64,
    pub student_id: i64,
    pub content: String,
}

/// Whose presence an attendance row records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Attendee {
    Student(i64),
    Teacher(i64),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Attendance {
    #[serde(default)]
    pub id: i64,
    pub date: NaiveDate,
    pub present: bool,
    pub lesson_id: i64,
    pub attendee: Attendee,
}

/// What a result grades.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ResultSource {
    Exam(i64),
    Assignment(i64),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Grade {
    #[serde(default)]
    pub id: i64,
    pub score: i64,
    pub student_id: i64,
    pub source: ResultSource,
}

/// Who an event or announcement is addressed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Audience {
    Global,
    Class(i64),
}

impl Audience {
    pub fn from_class_id(class_id: Option<i64>) -> Self {
        class_id.map_or(Audience::Global, Audience::Class)
    }

    pub fn class_id(self) -> Option<i64> {
        match self {
            Audience::Global => None,
            Audience::Class(id) => Some(id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Event {
    #[serde(default)]
    pub id: i64,
    pub title: String,
    pub description: String,
    pub start_time: NaiveDateTime,
    pub end_time: NaiveDateTime,
    pub audience: Audience,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Announcement {
    #[serde(default)]
    pub id: i64,
    pub title: String,
    pub description: String,
    pub date: NaiveDate,
    pub audience: Audience,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FinanceKind {
    Income,
    Expense,
}

impl FinanceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FinanceKind::Income => "income",
            FinanceKind::Expense => "expense",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "income" => Some(FinanceKind::Income),
            "expense" => Some(FinanceKind::Expense),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Finance {
    #[serde(default)]
    pub id: i64,
    pub title: String,
    pub kind: FinanceKind,
    pub amount_cents: i64,
    pub date: NaiveDate,
}

/// One row of any entity, as stored and as returned to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Record {
    Teacher(Teacher),
    Student(Student),
    Parent(Parent),
    Class(Class),
    Subject(Subject),
    Lesson(Lesson),
    Exam(Exam),
    Assignment(Assignment),
    Submission(Submission),
    Attendance(Attendance),
    Result(Grade),
    Event(Event),
    Announcement(Announcement),
    Finance(Finance),
}

macro_rules! each_record {
    ($record:expr, $row:ident => $body:expr) => {
        match $record {
            Record::Teacher($row) => $body,
            Record::Student($row) => $body,
            Record::Parent($row) => $body,
            Record::Class($row) => $body,
            Record::Subject($row) => $body,
            Record::Lesson($row) => $body,
            Record::Exam($row) => $body,
            Record::Assignment($row) => $body,
            Record::Submission($row) => $body,
            Record::Attendance($row) => $body,
            Record::Result($row) => $body,
            Record::Event($row) => $body,
            Record::Announcement($row) => $body,
            Record::Finance($row) => $body,
        }
    };
}

impl Record {
    pub fn entity(&self) -> EntityType {
        match self {
            Record::Teacher(_) => EntityType::Teacher,
            Record::Student(_) => EntityType::Student,
            Record::Parent(_) => EntityType::Parent,
            Record::Class(_) => EntityType::Class,
            Record::Subject(_) => EntityType::Subject,
            Record::Lesson(_) => EntityType::Lesson,
            Record::Exam(_) => EntityType::Exam,
            Record::Assignment(_) => EntityType::Assignment,
            Record::Submission(_) => EntityType::Submission,
            Record::Attendance(_) => EntityType::Attendance,
            Record::Result(_) => EntityType::Result,
            Record::Event(_) => EntityType::Event,
            Record::Announcement(_) => EntityType::Announcement,
            Record::Finance(_) => EntityType::Finance,
        }
    }

    pub fn id(&self) -> i64 {
        each_record!(self, row => row.id)
    }

    pub fn set_id(&mut self, id: i64) {
        each_record!(self, row => row.id = id)
    }

    /// Value of a key column; `None` when the column is null or absent.
    pub fn key(&self, column: Column) -> Option<i64> {
        if column == Column::Id {
            return Some(self.id());
        }
        match (self, column) {
            (Record::Class(c), Column::SupervisorId) => c.supervisor_id,
            (Record::Student(s), Column::ClassId) => Some(s.class_id),
            (Record::Student(s), Column::ParentId) => s.parent_id,
            (Record::Lesson(l), Column::TeacherId) => Some(l.teacher_id),
            (Record::Lesson(l), Column::ClassId) => Some(l.class_id),
            (Record::Lesson(l), Column::SubjectId) => Some(l.subject_id),
            (Record::Exam(e), Column::LessonId) => Some(e.lesson_id),
            (Record::Assignment(a), Column::LessonId) => Some(a.lesson_id),
            (Record::Submission(s), Column::AssignmentId) => Some(s.assignment_id),
            (Record::Submission(s), Column::StudentId) => Some(s.student_id),
            (Record::Attendance(a), Column::LessonId) => Some(a.lesson_id),
            (Record::Attendance(a), Column::StudentId) => match a.attendee {
                Attendee::Student(id) => Some(id),
                Attendee::Teacher(_) => None,
            },
            (Record::Attendance(a), Column::TeacherId) => match a.attendee {
                Attendee::Teacher(id) => Some(id),
                Attendee::Student(_) => None,
            },
            (Record::Result(r), Column::StudentId) => Some(r.student_id),
            (Record::Result(r), Column::ExamId) => match r.source {
                ResultSource::Exam(id) => Some(id),
                ResultSource::Assignment(_) => None,
            },
            (Record::Result(r), Column::AssignmentId) => match r.source {
                ResultSource::Assignment(id) => Some(id),
                ResultSource::Exam(_) => None,
            },
            (Record::Event(e), Column::ClassId) => e.audience.class_id(),
            (Record::Announcement(a), Column::ClassId) => a.audience.class_id(),
            _ => None,
        }
    }

    pub fn from_json(entity: EntityType, value: Value) -> Result<Record, serde_json::Error> {
        use serde_json::from_value;
        Ok(match entity {
            EntityType::Teacher => Record::Teacher(from_value(value)?),
            EntityType::Student => Record::Student(from_value(value)?),
            EntityType::Parent => Record::Parent(from_value(value)?),
            EntityType::Class => Record::Class(from_value(value)?),
            EntityType::Subject => Record::Subject(from_value(value)?),
            EntityType::Lesson => Record::Lesson(from_value(value)?),
            EntityType::Exam => Record::Exam(from_value(value)?),
            EntityType::Assignment => Record::Assignment(from_value(value)?),
            EntityType::Submission => Record::Submission(from_value(value)?),
            EntityType::Attendance => Record::Attendance(from_value(value)?),
            EntityType::Result => Record::Result(from_value(value)?),
            EntityType::Event => Record::Event(from_value(value)?),
            EntityType::Announcement => Record::Announcement(from_value(value)?),
            EntityType::Finance => Record::Finance(from_value(value)?),
        })
    }

    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// Returns a copy with `patch` merged over the top-level fields.
    /// The result goes through the same decoding as a fresh record, so a patch
    /// can never produce a row the typed model would reject.
    pub fn patched(&self, patch: &Map<String, Value>) -> Result<Record, serde_json::Error> {
        let mut merged = match self.to_json() {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        for (k, v) in patch {
            merged.insert(k.clone(), v.clone());
        }
        merged.insert("id".to_string(), Value::from(self.id()));
        Record::from_json(self.entity(), Value::Object(merged))
    }
}
