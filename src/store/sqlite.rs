use super::{Listing, Page, Store};
use crate::db;
use crate::error::StoreError;
use crate::graph::{Cardinality, EntityType, Link};
use crate::model::{
    Announcement, Assignment, Attendance, Attendee, Audience, Class, Day, Event, Exam, Finance,
    FinanceKind, Grade, Lesson, Parent, Record, ResultSource, Student, Subject, Submission,
    Teacher,
};
use crate::scope::{Lookup, Predicate, Scope};
use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, Row};
use tracing::trace;

const DATE_FMT: &str = "%Y-%m-%d";
const DATETIME_FMT: &str = "%Y-%m-%dT%H:%M:%S";

/// Non-id columns of each table, in bind order.
fn data_columns(entity: EntityType) -> &'static [&'static str] {
    match entity {
        EntityType::Teacher | EntityType::Parent => {
            &["username", "name", "surname", "email", "phone", "address"]
        }
        EntityType::Student => &[
            "username", "name", "surname", "email", "phone", "address", "grade", "class_id",
            "parent_id",
        ],
        EntityType::Class => &["name", "capacity", "grade", "supervisor_id"],
        EntityType::Subject => &["name"],
        EntityType::Lesson => &[
            "name",
            "day",
            "start_time",
            "end_time",
            "subject_id",
            "class_id",
            "teacher_id",
        ],
        EntityType::Exam => &["title", "start_time", "end_time", "lesson_id"],
        EntityType::Assignment => &["title", "start_date", "due_date", "lesson_id"],
        EntityType::Submission => &["assignment_id", "student_id", "content"],
        EntityType::Attendance => &["date", "present", "lesson_id", "student_id", "teacher_id"],
        EntityType::Result => &["score", "student_id", "exam_id", "assignment_id"],
        EntityType::Event => &["title", "description", "start_time", "end_time", "class_id"],
        EntityType::Announcement => &["title", "description", "date", "class_id"],
        EntityType::Finance => &["title", "kind", "amount_cents", "date"],
    }
}

fn select_list(entity: EntityType, alias: &str) -> String {
    std::iter::once("id")
        .chain(data_columns(entity).iter().copied())
        .map(|c| format!("{alias}.{c}"))
        .collect::<Vec<_>>()
        .join(", ")
}

fn text(s: &str) -> Value {
    Value::Text(s.to_string())
}

fn opt_text(s: &Option<String>) -> Value {
    s.as_deref().map_or(Value::Null, text)
}

fn opt_int(v: Option<i64>) -> Value {
    v.map_or(Value::Null, Value::Integer)
}

fn date(d: NaiveDate) -> Value {
    Value::Text(d.format(DATE_FMT).to_string())
}

fn datetime(d: NaiveDateTime) -> Value {
    Value::Text(d.format(DATETIME_FMT).to_string())
}

/// Values for [`data_columns`] of the record's entity.
fn bind_values(record: &Record) -> Vec<Value> {
    match record {
        Record::Teacher(Teacher {
            username,
            name,
            surname,
            email,
            phone,
            address,
            ..
        })
        | Record::Parent(Parent {
            username,
            name,
            surname,
            email,
            phone,
            address,
            ..
        }) => vec![
            text(username),
            text(name),
            text(surname),
            opt_text(email),
            opt_text(phone),
            text(address),
        ],
        Record::Student(s) => vec![
            text(&s.username),
            text(&s.name),
            text(&s.surname),
            opt_text(&s.email),
            opt_text(&s.phone),
            text(&s.address),
            Value::Integer(s.grade),
            Value::Integer(s.class_id),
            opt_int(s.parent_id),
        ],
        Record::Class(c) => vec![
            text(&c.name),
            Value::Integer(c.capacity),
            Value::Integer(c.grade),
            opt_int(c.supervisor_id),
        ],
        Record::Subject(s) => vec![text(&s.name)],
        Record::Lesson(l) => vec![
            text(&l.name),
            text(l.day.as_str()),
            datetime(l.start_time),
            datetime(l.end_time),
            Value::Integer(l.subject_id),
            Value::Integer(l.class_id),
            Value::Integer(l.teacher_id),
        ],
        Record::Exam(e) => vec![
            text(&e.title),
            datetime(e.start_time),
            datetime(e.end_time),
            Value::Integer(e.lesson_id),
        ],
        Record::Assignment(a) => vec![
            text(&a.title),
            date(a.start_date),
            date(a.due_date),
            Value::Integer(a.lesson_id),
        ],
        Record::Submission(s) => vec![
            Value::Integer(s.assignment_id),
            Value::Integer(s.student_id),
            text(&s.content),
        ],
        Record::Attendance(a) => {
            let (student, teacher) = match a.attendee {
                Attendee::Student(id) => (Some(id), None),
                Attendee::Teacher(id) => (None, Some(id)),
            };
            vec![
                date(a.date),
                Value::Integer(if a.present { 1 } else { 0 }),
                Value::Integer(a.lesson_id),
                opt_int(student),
                opt_int(teacher),
            ]
        }
        Record::Result(r) => {
            let (exam, assignment) = match r.source {
                ResultSource::Exam(id) => (Some(id), None),
                ResultSource::Assignment(id) => (None, Some(id)),
            };
            vec![
                Value::Integer(r.score),
                Value::Integer(r.student_id),
                opt_int(exam),
                opt_int(assignment),
            ]
        }
        Record::Event(e) => vec![
            text(&e.title),
            text(&e.description),
            datetime(e.start_time),
            datetime(e.end_time),
            opt_int(e.audience.class_id()),
        ],
        Record::Announcement(a) => vec![
            text(&a.title),
            text(&a.description),
            date(a.date),
            opt_int(a.audience.class_id()),
        ],
        Record::Finance(f) => vec![
            text(&f.title),
            text(f.kind.as_str()),
            Value::Integer(f.amount_cents),
            date(f.date),
        ],
    }
}

/// Decodes a row selected with [`select_list`].
fn read_row(entity: EntityType, row: &Row<'_>) -> Result<Record, StoreError> {
    let id: i64 = row.get(0)?;
    let corrupt = |message: &str| StoreError::Corrupt {
        entity,
        id,
        message: message.to_string(),
    };
    let record = match entity {
        EntityType::Teacher => Record::Teacher(Teacher {
            id,
            username: row.get(1)?,
            name: row.get(2)?,
            surname: row.get(3)?,
            email: row.get(4)?,
            phone: row.get(5)?,
            address: row.get(6)?,
        }),
        EntityType::Parent => Record::Parent(Parent {
            id,
            username: row.get(1)?,
            name: row.get(2)?,
            surname: row.get(3)?,
            email: row.get(4)?,
            phone: row.get(5)?,
            address: row.get(6)?,
        }),
        EntityType::Student => Record::Student(Student {
            id,
            username: row.get(1)?,
            name: row.get(2)?,
            surname: row.get(3)?,
            email: row.get(4)?,
            phone: row.get(5)?,
            address: row.get(6)?,
            grade: row.get(7)?,
            class_id: row.get(8)?,
            parent_id: row.get(9)?,
        }),
        EntityType::Class => Record::Class(Class {
            id,
            name: row.get(1)?,
            capacity: row.get(2)?,
            grade: row.get(3)?,
            supervisor_id: row.get(4)?,
        }),
        EntityType::Subject => Record::Subject(Subject {
            id,
            name: row.get(1)?,
        }),
        EntityType::Lesson => {
            let day: String = row.get(2)?;
            Record::Lesson(Lesson {
                id,
                name: row.get(1)?,
                day: Day::parse(&day).ok_or_else(|| corrupt("unknown day"))?,
                start_time: row.get(3)?,
                end_time: row.get(4)?,
                subject_id: row.get(5)?,
                class_id: row.get(6)?,
                teacher_id: row.get(7)?,
            })
        }
        EntityType::Exam => Record::Exam(Exam {
            id,
            title: row.get(1)?,
            start_time: row.get(2)?,
            end_time: row.get(3)?,
            lesson_id: row.get(4)?,
        }),
        EntityType::Assignment => Record::Assignment(Assignment {
            id,
            title: row.get(1)?,
            start_date: row.get(2)?,
            due_date: row.get(3)?,
            lesson_id: row.get(4)?,
        }),
        EntityType::Submission => Record::Submission(Submission {
            id,
            assignment_id: row.get(1)?,
            student_id: row.get(2)?,
            content: row.get(3)?,
        }),
        EntityType::Attendance => {
            let present: i64 = row.get(2)?;
            let student: Option<i64> = row.get(4)?;
            let teacher: Option<i64> = row.get(5)?;
            let attendee = match (student, teacher) {
                (Some(s), None) => Attendee::Student(s),
                (None, Some(t)) => Attendee::Teacher(t),
                _ => return Err(corrupt("attendance must name exactly one attendee")),
            };
            Record::Attendance(Attendance {
                id,
                date: row.get(1)?,
                present: present != 0,
                lesson_id: row.get(3)?,
                attendee,
            })
        }
        EntityType::Result => {
            let exam: Option<i64> = row.get(3)?;
            let assignment: Option<i64> = row.get(4)?;
            let source = match (exam, assignment) {
                (Some(e), None) => ResultSource::Exam(e),
                (None, Some(a)) => ResultSource::Assignment(a),
                _ => return Err(corrupt("result must grade exactly one exam or assignment")),
            };
            Record::Result(Grade {
                id,
                score: row.get(1)?,
                student_id: row.get(2)?,
                source,
            })
        }
        EntityType::Event => Record::Event(Event {
            id,
            title: row.get(1)?,
            description: row.get(2)?,
            start_time: row.get(3)?,
            end_time: row.get(4)?,
            audience: Audience::from_class_id(row.get(5)?),
        }),
        EntityType::Announcement => Record::Announcement(Announcement {
            id,
            title: row.get(1)?,
            description: row.get(2)?,
            date: row.get(3)?,
            audience: Audience::from_class_id(row.get(4)?),
        }),
        EntityType::Finance => {
            let kind: String = row.get(2)?;
            Record::Finance(Finance {
                id,
                title: row.get(1)?,
                kind: FinanceKind::parse(&kind).ok_or_else(|| corrupt("unknown finance kind"))?,
                amount_cents: row.get(3)?,
                date: row.get(4)?,
            })
        }
    };
    Ok(record)
}

/// A `WHERE` fragment plus its positional parameters.
#[derive(Debug)]
pub struct WhereClause {
    pub sql: String,
    pub params: Vec<Value>,
}

/// Compiles a scope against the table aliased `t0`.
///
/// Every hop opens a correlated `EXISTS` subquery on a fresh alias, so the
/// clause never multiplies rows and can be reused for `COUNT(*)`.
pub fn compile_scope(scope: &Scope) -> WhereClause {
    let mut params = Vec::new();
    let sql = match scope {
        Scope::All => "1".to_string(),
        Scope::Nothing => "0".to_string(),
        Scope::Where(predicate) => {
            let mut aliases = 0;
            compile(predicate, "t0", &mut aliases, &mut params)
        }
    };
    WhereClause { sql, params }
}

fn compile(pred: &Predicate, alias: &str, aliases: &mut usize, params: &mut Vec<Value>) -> String {
    match pred {
        Predicate::Eq(column, value) => {
            params.push(Value::Integer(*value));
            format!("{alias}.{} = ?", column.sql_name())
        }
        Predicate::IsNull(column) => format!("{alias}.{} IS NULL", column.sql_name()),
        Predicate::Follow(link, inner) | Predicate::Any(link, inner) => {
            *aliases += 1;
            let next = format!("t{aliases}");
            let join = hop_condition(link, alias, &next);
            let inner = compile(inner, &next, aliases, params);
            format!(
                "EXISTS (SELECT 1 FROM {} {next} WHERE {join} AND {inner})",
                link.to.table()
            )
        }
        Predicate::Or(parts) => join_parts(parts, " OR ", "0", alias, aliases, params),
        Predicate::And(parts) => join_parts(parts, " AND ", "1", alias, aliases, params),
    }
}

fn hop_condition(link: &Link, from: &str, to: &str) -> String {
    let column = link.column.sql_name();
    match link.cardinality {
        Cardinality::One => format!("{to}.id = {from}.{column}"),
        Cardinality::Many => format!("{to}.{column} = {from}.id"),
    }
}

fn join_parts(
    parts: &[Predicate],
    sep: &str,
    empty: &str,
    alias: &str,
    aliases: &mut usize,
    params: &mut Vec<Value>,
) -> String {
    if parts.is_empty() {
        return empty.to_string();
    }
    let compiled: Vec<String> = parts
        .iter()
        .map(|p| compile(p, alias, aliases, params))
        .collect();
    format!("({})", compiled.join(sep))
}

/// SQLite-backed store. Scopes are pushed down into SQL; nothing is filtered
/// after the fact.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn new(conn: Connection) -> Self {
        Self { conn }
    }

    pub fn open_in_memory() -> anyhow::Result<Self> {
        Ok(Self::new(db::open_in_memory()?))
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    fn query_records(
        &self,
        entity: EntityType,
        sql: &str,
        params: &[Value],
    ) -> Result<Vec<Record>, StoreError> {
        trace!(%entity, sql, "query");
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query(params_from_iter(params))?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            out.push(read_row(entity, row)?);
        }
        Ok(out)
    }
}

impl Lookup for SqliteStore {
    fn fetch(&self, entity: EntityType, id: i64) -> Result<Option<Record>, StoreError> {
        let sql = format!(
            "SELECT {} FROM {} t0 WHERE t0.id = ?",
            select_list(entity, "t0"),
            entity.table()
        );
        Ok(self
            .query_records(entity, &sql, &[Value::Integer(id)])?
            .into_iter()
            .next())
    }

    fn related(&self, link: &'static Link, parent_id: i64) -> Result<Vec<Record>, StoreError> {
        let sql = format!(
            "SELECT {} FROM {} t0 WHERE t0.{} = ? ORDER BY t0.id",
            select_list(link.to, "t0"),
            link.to.table(),
            link.column.sql_name()
        );
        self.query_records(link.to, &sql, &[Value::Integer(parent_id)])
    }
}

impl Store for SqliteStore {
    fn select(
        &self,
        entity: EntityType,
        scope: &Scope,
        page: Option<Page>,
    ) -> Result<Listing, StoreError> {
        let clause = compile_scope(scope);
        let table = entity.table();

        let count_sql = format!("SELECT COUNT(*) FROM {table} t0 WHERE {}", clause.sql);
        let total: i64 = self.conn.query_row(
            &count_sql,
            params_from_iter(&clause.params),
            |r| r.get(0),
        )?;

        let mut sql = format!(
            "SELECT {} FROM {table} t0 WHERE {} ORDER BY t0.id",
            select_list(entity, "t0"),
            clause.sql
        );
        let total = usize::try_from(total).unwrap_or(0);
        let mut params = clause.params;
        if let Some(page) = page {
            let limit = i64::try_from(page.size).ok();
            let offset = page.offset().and_then(|o| i64::try_from(o).ok());
            let (Some(limit), Some(offset)) = (limit, offset) else {
                return Ok(Listing {
                    rows: Vec::new(),
                    total,
                });
            };
            sql.push_str(" LIMIT ? OFFSET ?");
            params.push(Value::Integer(limit));
            params.push(Value::Integer(offset));
        }
        let rows = self.query_records(entity, &sql, &params)?;
        Ok(Listing { rows, total })
    }

    fn insert(&mut self, mut record: Record) -> Result<Record, StoreError> {
        let entity = record.entity();
        let columns = data_columns(entity);
        let placeholders = vec!["?"; columns.len()].join(", ");
        let sql = format!(
            "INSERT INTO {}({}) VALUES({placeholders})",
            entity.table(),
            columns.join(", ")
        );
        self.conn
            .execute(&sql, params_from_iter(bind_values(&record)))?;
        record.set_id(self.conn.last_insert_rowid());
        Ok(record)
    }

    fn update(&mut self, record: Record) -> Result<Record, StoreError> {
        let entity = record.entity();
        let set_parts: Vec<String> = data_columns(entity)
            .iter()
            .map(|c| format!("{c} = ?"))
            .collect();
        let sql = format!(
            "UPDATE {} SET {} WHERE id = ?",
            entity.table(),
            set_parts.join(", ")
        );
        let mut bind = bind_values(&record);
        bind.push(Value::Integer(record.id()));
        let changed = self.conn.execute(&sql, params_from_iter(bind))?;
        if changed == 0 {
            return Err(StoreError::Corrupt {
                entity,
                id: record.id(),
                message: "row vanished before update".to_string(),
            });
        }
        Ok(record)
    }

    fn delete(&mut self, entity: EntityType, id: i64) -> Result<(), StoreError> {
        self.conn.execute(
            &format!("DELETE FROM {} WHERE id = ?", entity.table()),
            [id],
        )?;
        Ok(())
    }

    fn transaction<T, E, F>(&mut self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut Self) -> Result<T, E>,
        E: From<StoreError>,
    {
        self.conn
            .execute_batch("BEGIN IMMEDIATE")
            .map_err(|e| E::from(StoreError::from(e)))?;
        let out = f(self);
        let finish = if out.is_ok() { "COMMIT" } else { "ROLLBACK" };
        if let Err(e) = self.conn.execute_batch(finish) {
            let _ = self.conn.execute_batch("ROLLBACK");
            return Err(E::from(StoreError::from(e)));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Column, ANNOUNCEMENT_CLASS, CLASS_STUDENTS, EXAM_LESSON, LESSON_CLASS};
    use crate::identity::{Identity, Role};
    use crate::resolver::resolve_scope;
    use crate::store::MemoryStore;
    use crate::testing::SampleSchool;

    fn seeded() -> (SqliteStore, SampleSchool) {
        let mut store = SqliteStore::open_in_memory().expect("open");
        let school = SampleSchool::seed(&mut store).expect("seed");
        (store, school)
    }

    #[test]
    fn compiles_hops_to_correlated_exists() {
        let scope = Scope::Where(Predicate::follow(
            &EXAM_LESSON,
            Predicate::follow(
                &LESSON_CLASS,
                Predicate::any(&CLASS_STUDENTS, Predicate::eq(Column::Id, 21)),
            ),
        ));
        let clause = compile_scope(&scope);
        assert_eq!(
            clause.sql,
            "EXISTS (SELECT 1 FROM lessons t1 WHERE t1.id = t0.lesson_id AND \
             EXISTS (SELECT 1 FROM classes t2 WHERE t2.id = t1.class_id AND \
             EXISTS (SELECT 1 FROM students t3 WHERE t3.class_id = t2.id AND t3.id = ?)))"
        );
        assert_eq!(clause.params, vec![Value::Integer(21)]);
    }

    #[test]
    fn compiles_global_audience_and_trivial_scopes() {
        let scope = Scope::Where(Predicate::or([
            Predicate::is_null(Column::ClassId),
            Predicate::follow(&ANNOUNCEMENT_CLASS, Predicate::eq(Column::Id, 2)),
        ]));
        assert_eq!(
            compile_scope(&scope).sql,
            "(t0.class_id IS NULL OR EXISTS (SELECT 1 FROM classes t1 WHERE t1.id = t0.class_id AND t1.id = ?))"
        );
        assert_eq!(compile_scope(&Scope::All).sql, "1");
        assert_eq!(compile_scope(&Scope::Nothing).sql, "0");
        assert_eq!(compile_scope(&Scope::Where(Predicate::Or(vec![]))).sql, "0");
    }

    #[test]
    fn rows_round_trip_through_sqlite() {
        let (store, school) = seeded();
        let mut memory = MemoryStore::new();
        SampleSchool::seed(&mut memory).expect("seed");
        for entity in EntityType::ALL {
            let from_sqlite = store.select(entity, &Scope::All, None).expect("sqlite");
            let from_memory = memory.select(entity, &Scope::All, None).expect("memory");
            assert_eq!(from_sqlite, from_memory, "{entity}");
        }
        assert!(store
            .fetch(EntityType::Attendance, school.attendance_recorded_by_teacher_b)
            .expect("fetch")
            .is_some());
    }

    #[test]
    fn sqlite_and_memory_agree_on_every_resolved_scope() {
        let (store, school) = seeded();
        let mut memory = MemoryStore::new();
        SampleSchool::seed(&mut memory).expect("seed");
        let callers = [
            Identity::admin(1),
            Identity::teacher(school.teacher_a),
            Identity::teacher(school.teacher_b),
            Identity::teacher(school.teacher_c),
            Identity::student(school.student_1),
            Identity::student(school.student_4),
            Identity::parent(school.parent_p),
            Identity::parent(school.parent_q),
            Identity::new(1, Role::Unknown),
        ];
        for identity in callers {
            for entity in EntityType::ALL {
                let scope = resolve_scope(&identity, entity);
                let a = store.select(entity, &scope, None).expect("sqlite");
                let b = memory.select(entity, &scope, None).expect("memory");
                assert_eq!(a, b, "{identity} on {entity}");
            }
        }
    }

    #[test]
    fn pages_are_applied_after_the_count() {
        let (store, _) = seeded();
        let page = store
            .select(EntityType::Student, &Scope::All, Some(Page::new(2, 3)))
            .expect("select");
        assert_eq!(page.total, 4);
        assert_eq!(page.rows.len(), 1);
    }

    #[test]
    fn unreachable_pages_are_empty() {
        let (store, _) = seeded();
        let page = store
            .select(
                EntityType::Student,
                &Scope::All,
                Some(Page::new(i64::MAX as usize, 10)),
            )
            .expect("select");
        assert_eq!(page.total, 4);
        assert!(page.rows.is_empty());
    }

    #[test]
    fn rolled_back_transaction_leaves_no_trace() {
        let (mut store, school) = seeded();
        let out: Result<(), StoreError> = store.transaction(|s| {
            s.delete(EntityType::Submission, school.submission_1)?;
            Err(StoreError::Constraint("abort".to_string()))
        });
        assert!(out.is_err());
        assert!(store
            .fetch(EntityType::Submission, school.submission_1)
            .expect("fetch")
            .is_some());
    }

    #[test]
    fn foreign_keys_are_enforced() {
        let (mut store, school) = seeded();
        let err = store
            .delete(EntityType::Lesson, school.lesson_a)
            .expect_err("lesson is referenced");
        assert!(matches!(err, StoreError::Constraint(_)), "got {err:?}");
    }
}
