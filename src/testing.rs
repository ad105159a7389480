//! A small, fully linked school for tests and local experiments.
//!
//! Layout:
//!
//! - teachers A, B, C supervise classes A, B, C respectively
//! - parent P has student 1 (class A) and student 2 (class B)
//! - parent Q has student 3 (class A); student 4 (class C) has no parent
//! - lesson A is taught by A in class A, lesson B by B in class B,
//!   lesson C by C in class C, and C also teaches a second lesson in class B
//! - every lesson except the second class-B lesson has one exam and one assignment
//! - teacher B has an attendance row in lesson A, which B does not teach

use crate::error::StoreError;
use crate::model::{
    Announcement, Assignment, Attendance, Attendee, Audience, Class, Day, Event, Exam, Finance,
    FinanceKind, Grade, Lesson, Parent, Record, ResultSource, Student, Subject, Submission,
    Teacher,
};
use crate::store::Store;
use chrono::{NaiveDate, NaiveDateTime};

#[derive(Debug, Clone)]
pub struct SampleSchool {
    pub teacher_a: i64,
    pub teacher_b: i64,
    pub teacher_c: i64,
    pub parent_p: i64,
    pub parent_q: i64,
    pub subject_math: i64,
    pub class_a: i64,
    pub class_b: i64,
    pub class_c: i64,
    pub student_1: i64,
    pub student_2: i64,
    pub student_3: i64,
    pub student_4: i64,
    pub lesson_a: i64,
    pub lesson_b: i64,
    pub lesson_c: i64,
    pub lesson_b_by_c: i64,
    pub exam_a: i64,
    pub exam_b: i64,
    pub exam_c: i64,
    pub assignment_a: i64,
    pub assignment_b: i64,
    pub assignment_c: i64,
    pub submission_1: i64,
    pub submission_3: i64,
    pub attendance_s1: i64,
    pub attendance_s2: i64,
    pub attendance_s3: i64,
    pub attendance_s4: i64,
    pub attendance_recorded_by_teacher_b: i64,
    pub attendance_teacher_c: i64,
    pub result_s1: i64,
    pub result_s2: i64,
    pub result_s3: i64,
    pub result_s4: i64,
    pub event_global: i64,
    pub event_a: i64,
    pub event_c: i64,
    pub announcement_global: i64,
    pub announcement_a: i64,
    pub announcement_b: i64,
    pub announcement_c: i64,
    pub finance_income: i64,
    pub finance_expense: i64,
}

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 9, d).unwrap_or_default()
}

fn at(d: u32, hour: u32) -> NaiveDateTime {
    day(d).and_hms_opt(hour, 0, 0).unwrap_or_default()
}

fn teacher(username: &str, name: &str) -> Record {
    Record::Teacher(Teacher {
        id: 0,
        username: username.to_string(),
        name: name.to_string(),
        surname: "Teacher".to_string(),
        email: Some(format!("{username}@school.test")),
        phone: None,
        address: "1 School Road".to_string(),
    })
}

fn parent(username: &str) -> Record {
    Record::Parent(Parent {
        id: 0,
        username: username.to_string(),
        name: username.to_uppercase(),
        surname: "Parent".to_string(),
        email: None,
        phone: Some("555-0100".to_string()),
        address: "2 Home Street".to_string(),
    })
}

fn class(name: &str, supervisor: i64) -> Record {
    Record::Class(Class {
        id: 0,
        name: name.to_string(),
        capacity: 20,
        grade: 1,
        supervisor_id: Some(supervisor),
    })
}

fn student(username: &str, class_id: i64, parent_id: Option<i64>) -> Record {
    Record::Student(Student {
        id: 0,
        username: username.to_string(),
        name: username.to_uppercase(),
        surname: "Student".to_string(),
        email: None,
        phone: None,
        address: "2 Home Street".to_string(),
        grade: 1,
        class_id,
        parent_id,
    })
}

fn lesson(name: &str, subject_id: i64, class_id: i64, teacher_id: i64) -> Record {
    Record::Lesson(Lesson {
        id: 0,
        name: name.to_string(),
        day: Day::Monday,
        start_time: at(2, 8),
        end_time: at(2, 9),
        subject_id,
        class_id,
        teacher_id,
    })
}

fn exam(title: &str, lesson_id: i64) -> Record {
    Record::Exam(Exam {
        id: 0,
        title: title.to_string(),
        start_time: at(16, 10),
        end_time: at(16, 11),
        lesson_id,
    })
}

fn assignment(title: &str, lesson_id: i64) -> Record {
    Record::Assignment(Assignment {
        id: 0,
        title: title.to_string(),
        start_date: day(3),
        due_date: day(10),
        lesson_id,
    })
}

fn submission(assignment_id: i64, student_id: i64) -> Record {
    Record::Submission(Submission {
        id: 0,
        assignment_id,
        student_id,
        content: "my answer".to_string(),
    })
}

fn attendance(lesson_id: i64, attendee: Attendee) -> Record {
    Record::Attendance(Attendance {
        id: 0,
        date: day(2),
        present: true,
        lesson_id,
        attendee,
    })
}

fn result(student_id: i64, source: ResultSource) -> Record {
    Record::Result(Grade {
        id: 0,
        score: 75,
        student_id,
        source,
    })
}

fn event(title: &str, audience: Audience) -> Record {
    Record::Event(Event {
        id: 0,
        title: title.to_string(),
        description: format!("{title} details"),
        start_time: at(20, 13),
        end_time: at(20, 15),
        audience,
    })
}

fn announcement(title: &str, audience: Audience) -> Record {
    Record::Announcement(Announcement {
        id: 0,
        title: title.to_string(),
        description: format!("{title} details"),
        date: day(1),
        audience,
    })
}

fn finance(title: &str, kind: FinanceKind, amount_cents: i64) -> Record {
    Record::Finance(Finance {
        id: 0,
        title: title.to_string(),
        kind,
        amount_cents,
        date: day(1),
    })
}

impl SampleSchool {
    /// Inserts the whole school into an empty store and returns the ids it got.
    pub fn seed<S: Store>(store: &mut S) -> Result<SampleSchool, StoreError> {
        let mut put = |record: Record| store.insert(record).map(|r| r.id());

        let teacher_a = put(teacher("ta", "Ada"))?;
        let teacher_b = put(teacher("tb", "Ben"))?;
        let teacher_c = put(teacher("tc", "Cy"))?;
        let parent_p = put(parent("pp"))?;
        let parent_q = put(parent("pq"))?;
        let subject_math = put(Record::Subject(Subject {
            id: 0,
            name: "Mathematics".to_string(),
        }))?;
        let class_a = put(class("1A", teacher_a))?;
        let class_b = put(class("1B", teacher_b))?;
        let class_c = put(class("1C", teacher_c))?;

        let student_1 = put(student("s1", class_a, Some(parent_p)))?;
        let student_2 = put(student("s2", class_b, Some(parent_p)))?;
        let student_3 = put(student("s3", class_a, Some(parent_q)))?;
        let student_4 = put(student("s4", class_c, None))?;

        let lesson_a = put(lesson("Math 1A", subject_math, class_a, teacher_a))?;
        let lesson_b = put(lesson("Math 1B", subject_math, class_b, teacher_b))?;
        let lesson_c = put(lesson("Math 1C", subject_math, class_c, teacher_c))?;
        let lesson_b_by_c = put(lesson("Extra 1B", subject_math, class_b, teacher_c))?;

        let exam_a = put(exam("Midterm 1A", lesson_a))?;
        let exam_b = put(exam("Midterm 1B", lesson_b))?;
        let exam_c = put(exam("Midterm 1C", lesson_c))?;
        let assignment_a = put(assignment("Homework 1A", lesson_a))?;
        let assignment_b = put(assignment("Homework 1B", lesson_b))?;
        let assignment_c = put(assignment("Homework 1C", lesson_c))?;

        let submission_1 = put(submission(assignment_a, student_1))?;
        let submission_3 = put(submission(assignment_a, student_3))?;

        let attendance_s1 = put(attendance(lesson_a, Attendee::Student(student_1)))?;
        let attendance_s2 = put(attendance(lesson_b, Attendee::Student(student_2)))?;
        let attendance_s3 = put(attendance(lesson_a, Attendee::Student(student_3)))?;
        let attendance_s4 = put(attendance(lesson_c, Attendee::Student(student_4)))?;
        let attendance_recorded_by_teacher_b =
            put(attendance(lesson_a, Attendee::Teacher(teacher_b)))?;
        let attendance_teacher_c = put(attendance(lesson_c, Attendee::Teacher(teacher_c)))?;

        let result_s1 = put(result(student_1, ResultSource::Exam(exam_a)))?;
        let result_s2 = put(result(student_2, ResultSource::Assignment(assignment_b)))?;
        let result_s3 = put(result(student_3, ResultSource::Exam(exam_a)))?;
        let result_s4 = put(result(student_4, ResultSource::Exam(exam_c)))?;

        let event_global = put(event("Sports day", Audience::Global))?;
        let event_a = put(event("1A trip", Audience::Class(class_a)))?;
        let event_c = put(event("1C play", Audience::Class(class_c)))?;

        let announcement_global = put(announcement("Term starts", Audience::Global))?;
        let announcement_a = put(announcement("1A room change", Audience::Class(class_a)))?;
        let announcement_b = put(announcement("1B room change", Audience::Class(class_b)))?;
        let announcement_c = put(announcement("1C room change", Audience::Class(class_c)))?;

        let finance_income = put(finance("Tuition", FinanceKind::Income, 1_250_000))?;
        let finance_expense = put(finance("Books", FinanceKind::Expense, 80_000))?;

        Ok(SampleSchool {
            teacher_a,
            teacher_b,
            teacher_c,
            parent_p,
            parent_q,
            subject_math,
            class_a,
            class_b,
            class_c,
            student_1,
            student_2,
            student_3,
            student_4,
            lesson_a,
            lesson_b,
            lesson_c,
            lesson_b_by_c,
            exam_a,
            exam_b,
            exam_c,
            assignment_a,
            assignment_b,
            assignment_c,
            submission_1,
            submission_3,
            attendance_s1,
            attendance_s2,
            attendance_s3,
            attendance_s4,
            attendance_recorded_by_teacher_b,
            attendance_teacher_c,
            result_s1,
            result_s2,
            result_s3,
            result_s4,
            event_global,
            event_a,
            event_c,
            announcement_global,
            announcement_a,
            announcement_b,
            announcement_c,
            finance_income,
            finance_expense,
        })
    }
}
