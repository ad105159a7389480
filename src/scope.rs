//! Row predicates produced by the access resolver.
//!
//! A [`Scope`] is data, not a closure: the SQLite store compiles it to a
//! `WHERE` clause, the in-memory store and the mutation re-check evaluate it
//! against a [`Record`] through a [`Lookup`].

use crate::error::StoreError;
use crate::graph::{Cardinality, Column, EntityType, Link};
use crate::model::Record;
use serde::Serialize;
use std::fmt;

/// Read access to stored rows, enough to follow links.
pub trait Lookup {
    fn fetch(&self, entity: EntityType, id: i64) -> Result<Option<Record>, StoreError>;

    /// Rows on the far side of a to-many `link` whose key points at `parent_id`.
    fn related(&self, link: &'static Link, parent_id: i64) -> Result<Vec<Record>, StoreError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Predicate {
    Eq(Column, i64),
    IsNull(Column),
    /// The row referenced through a to-one link exists and matches.
    Follow(&'static Link, Box<Predicate>),
    /// At least one row reached through a to-many link matches.
    Any(&'static Link, Box<Predicate>),
    Or(Vec<Predicate>),
    And(Vec<Predicate>),
}

impl Predicate {
    pub fn eq(column: Column, value: i64) -> Self {
        Predicate::Eq(column, value)
    }

    pub fn is_null(column: Column) -> Self {
        Predicate::IsNull(column)
    }

    pub fn follow(link: &'static Link, inner: Predicate) -> Self {
        Predicate::Follow(link, Box::new(inner))
    }

    pub fn any(link: &'static Link, inner: Predicate) -> Self {
        Predicate::Any(link, Box::new(inner))
    }

    pub fn or(parts: impl IntoIterator<Item = Predicate>) -> Self {
        Predicate::Or(parts.into_iter().collect())
    }

    pub fn and(parts: impl IntoIterator<Item = Predicate>) -> Self {
        Predicate::And(parts.into_iter().collect())
    }

    /// Checks that every column and hop makes sense starting from `entity`.
    pub fn check(&self, entity: EntityType) -> Result<(), String> {
        match self {
            Predicate::Eq(column, _) | Predicate::IsNull(column) => {
                if entity.has_column(*column) {
                    Ok(())
                } else {
                    Err(format!("{entity} has no key column {column}"))
                }
            }
            Predicate::Follow(link, inner) => {
                check_hop(entity, link, Cardinality::One)?;
                inner.check(link.to)
            }
            Predicate::Any(link, inner) => {
                check_hop(entity, link, Cardinality::Many)?;
                inner.check(link.to)
            }
            Predicate::Or(parts) | Predicate::And(parts) => {
                parts.iter().try_for_each(|p| p.check(entity))
            }
        }
    }

    pub fn evaluate(&self, row: &Record, lookup: &dyn Lookup) -> Result<bool, StoreError> {
        match self {
            Predicate::Eq(column, value) => Ok(row.key(*column) == Some(*value)),
            Predicate::IsNull(column) => Ok(row.key(*column).is_none()),
            Predicate::Follow(link, inner) => {
                let Some(target_id) = row.key(link.column) else {
                    return Ok(false);
                };
                match lookup.fetch(link.to, target_id)? {
                    Some(target) => inner.evaluate(&target, lookup),
                    None => Ok(false),
                }
            }
            Predicate::Any(link, inner) => {
                for related in lookup.related(link, row.id())? {
                    if inner.evaluate(&related, lookup)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            Predicate::Or(parts) => {
                for p in parts {
                    if p.evaluate(row, lookup)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            Predicate::And(parts) => {
                for p in parts {
                    if !p.evaluate(row, lookup)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
        }
    }
}

fn check_hop(entity: EntityType, link: &Link, want: Cardinality) -> Result<(), String> {
    if link.from != entity {
        return Err(format!("{link} does not start at {entity}"));
    }
    if link.cardinality != want {
        return Err(format!("{link} has the wrong cardinality for this hop"));
    }
    Ok(())
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::Eq(column, value) => write!(f, "{column} = {value}"),
            Predicate::IsNull(column) => write!(f, "{column} IS NULL"),
            Predicate::Follow(link, inner) => write!(f, "{}.({inner})", link.name),
            Predicate::Any(link, inner) => write!(f, "any {}.({inner})", link.name),
            Predicate::Or(parts) => write_joined(f, parts, " OR ", "false"),
            Predicate::And(parts) => write_joined(f, parts, " AND ", "true"),
        }
    }
}

fn write_joined(
    f: &mut fmt::Formatter<'_>,
    parts: &[Predicate],
    sep: &str,
    empty: &str,
) -> fmt::Result {
    if parts.is_empty() {
        return f.write_str(empty);
    }
    f.write_str("(")?;
    for (i, p) in parts.iter().enumerate() {
        if i > 0 {
            f.write_str(sep)?;
        }
        write!(f, "{p}")?;
    }
    f.write_str(")")
}

/// Rows of one entity an identity may see.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Scope {
    All,
    Nothing,
    Where(Predicate),
}

impl Scope {
    pub fn is_nothing(&self) -> bool {
        matches!(self, Scope::Nothing)
    }

    /// Narrows the scope by an additional predicate (logical AND).
    pub fn and(self, extra: Predicate) -> Scope {
        match self {
            Scope::All => Scope::Where(extra),
            Scope::Nothing => Scope::Nothing,
            Scope::Where(Predicate::And(mut parts)) => {
                parts.push(extra);
                Scope::Where(Predicate::And(parts))
            }
            Scope::Where(existing) => Scope::Where(Predicate::And(vec![existing, extra])),
        }
    }

    pub fn admits(&self, row: &Record, lookup: &dyn Lookup) -> Result<bool, StoreError> {
        match self {
            Scope::All => Ok(true),
            Scope::Nothing => Ok(false),
            Scope::Where(predicate) => predicate.evaluate(row, lookup),
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::All => f.write_str("all rows"),
            Scope::Nothing => f.write_str("no rows"),
            Scope::Where(p) => write!(f, "{p}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{ATTENDANCE_LESSON, CLASS_STUDENTS, EXAM_LESSON, LESSON_CLASS};
    use crate::store::memory::MemoryStore;
    use crate::testing::SampleSchool;

    #[test]
    fn follow_through_a_null_key_is_false() {
        let mut store = MemoryStore::new();
        let school = SampleSchool::seed(&mut store).expect("seed");
        let global = store
            .fetch(EntityType::Announcement, school.announcement_global)
            .expect("fetch")
            .expect("row");
        let pred = Predicate::follow(
            &crate::graph::ANNOUNCEMENT_CLASS,
            Predicate::eq(Column::Id, school.class_a),
        );
        assert!(!pred.evaluate(&global, &store).expect("evaluate"));
        assert!(Predicate::is_null(Column::ClassId)
            .evaluate(&global, &store)
            .expect("evaluate"));
    }

    #[test]
    fn or_is_a_union() {
        let mut store = MemoryStore::new();
        let school = SampleSchool::seed(&mut store).expect("seed");
        let row = store
            .fetch(EntityType::Attendance, school.attendance_recorded_by_teacher_b)
            .expect("fetch")
            .expect("row");
        let pred = Predicate::or([
            Predicate::eq(Column::TeacherId, school.teacher_b),
            Predicate::follow(
                &ATTENDANCE_LESSON,
                Predicate::eq(Column::TeacherId, school.teacher_b),
            ),
        ]);
        assert!(pred.evaluate(&row, &store).expect("evaluate"));
    }

    #[test]
    fn check_rejects_hops_from_the_wrong_entity() {
        let pred = Predicate::follow(&LESSON_CLASS, Predicate::eq(Column::Id, 1));
        assert!(pred.check(EntityType::Lesson).is_ok());
        assert!(pred.check(EntityType::Exam).is_err());
        assert!(Predicate::eq(Column::ParentId, 1)
            .check(EntityType::Lesson)
            .is_err());
        assert!(Predicate::follow(&CLASS_STUDENTS, Predicate::eq(Column::Id, 1))
            .check(EntityType::Class)
            .is_err());
    }

    #[test]
    fn display_reads_like_the_ownership_chain() {
        let pred = Predicate::follow(
            &EXAM_LESSON,
            Predicate::follow(
                &LESSON_CLASS,
                Predicate::any(&CLASS_STUDENTS, Predicate::eq(Column::Id, 21)),
            ),
        );
        assert_eq!(pred.to_string(), "lesson.(class.(any students.(id = 21)))");
        assert_eq!(Scope::Nothing.and(pred).to_string(), "no rows");
    }

    #[test]
    fn and_flattens_into_existing_conjunction() {
        let scope = Scope::All
            .and(Predicate::eq(Column::Id, 1))
            .and(Predicate::eq(Column::LessonId, 2));
        assert_eq!(
            scope,
            Scope::Where(Predicate::And(vec![
                Predicate::eq(Column::Id, 1),
                Predicate::eq(Column::LessonId, 2)
            ]))
        );
    }
}
