use super::{Listing, Page, Store};
use crate::error::StoreError;
use crate::graph::{self, Cardinality, EntityType, Link};
use crate::model::Record;
use crate::scope::{Lookup, Scope};
use std::collections::BTreeMap;

/// Map-backed store with the same constraint behaviour as the SQLite schema.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: BTreeMap<EntityType, BTreeMap<i64, Record>>,
    next_ids: BTreeMap<EntityType, i64>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn table(&self, entity: EntityType) -> impl Iterator<Item = &Record> {
        self.tables.get(&entity).into_iter().flat_map(|t| t.values())
    }

    fn check_references(&self, record: &Record) -> Result<(), StoreError> {
        for link in graph::references(record.entity()) {
            let Some(target) = record.key(link.column) else {
                continue;
            };
            let exists = self
                .tables
                .get(&link.to)
                .is_some_and(|t| t.contains_key(&target));
            if !exists {
                return Err(StoreError::Constraint(format!(
                    "FOREIGN KEY constraint failed: {link} -> {} {target}",
                    link.to
                )));
            }
        }
        Ok(())
    }

    fn check_unique(&self, record: &Record) -> Result<(), StoreError> {
        let Record::Submission(sub) = record else {
            return Ok(());
        };
        let clash = self.table(EntityType::Submission).any(|r| match r {
            Record::Submission(other) => {
                other.id != sub.id
                    && other.assignment_id == sub.assignment_id
                    && other.student_id == sub.student_id
            }
            _ => false,
        });
        if clash {
            return Err(StoreError::Constraint(
                "UNIQUE constraint failed: submissions.assignment_id, submissions.student_id"
                    .to_string(),
            ));
        }
        Ok(())
    }
}

impl Lookup for MemoryStore {
    fn fetch(&self, entity: EntityType, id: i64) -> Result<Option<Record>, StoreError> {
        Ok(self.tables.get(&entity).and_then(|t| t.get(&id)).cloned())
    }

    fn related(&self, link: &'static Link, parent_id: i64) -> Result<Vec<Record>, StoreError> {
        debug_assert_eq!(link.cardinality, Cardinality::Many);
        Ok(self
            .table(link.to)
            .filter(|r| r.key(link.column) == Some(parent_id))
            .cloned()
            .collect())
    }
}

impl Store for MemoryStore {
    fn select(
        &self,
        entity: EntityType,
        scope: &Scope,
        page: Option<Page>,
    ) -> Result<Listing, StoreError> {
        let mut rows = Vec::new();
        for row in self.table(entity) {
            if scope.admits(row, self)? {
                rows.push(row.clone());
            }
        }
        let total = rows.len();
        if let Some(page) = page {
            rows = match page.offset() {
                Some(offset) => rows.into_iter().skip(offset).take(page.size).collect(),
                None => Vec::new(),
            };
        }
        Ok(Listing { rows, total })
    }

    fn insert(&mut self, mut record: Record) -> Result<Record, StoreError> {
        self.check_references(&record)?;
        let entity = record.entity();
        let id = self.next_ids.get(&entity).copied().unwrap_or(1);
        record.set_id(id);
        self.check_unique(&record)?;
        self.next_ids.insert(entity, id + 1);
        self.tables
            .entry(entity)
            .or_default()
            .insert(record.id(), record.clone());
        Ok(record)
    }

    fn update(&mut self, record: Record) -> Result<Record, StoreError> {
        let entity = record.entity();
        if self.fetch(entity, record.id())?.is_none() {
            return Err(StoreError::Corrupt {
                entity,
                id: record.id(),
                message: "row vanished before update".to_string(),
            });
        }
        self.check_references(&record)?;
        self.check_unique(&record)?;
        self.tables
            .entry(entity)
            .or_default()
            .insert(record.id(), record.clone());
        Ok(record)
    }

    fn delete(&mut self, entity: EntityType, id: i64) -> Result<(), StoreError> {
        for link in graph::referenced_by(entity) {
            let referenced = self
                .table(link.from)
                .any(|r| r.key(link.column) == Some(id));
            if referenced {
                return Err(StoreError::Constraint(format!(
                    "FOREIGN KEY constraint failed: {entity} {id} is still referenced by {link}"
                )));
            }
        }
        if let Some(table) = self.tables.get_mut(&entity) {
            table.remove(&id);
        }
        Ok(())
    }

    fn transaction<T, E, F>(&mut self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut Self) -> Result<T, E>,
        E: From<StoreError>,
    {
        let snapshot = self.clone();
        let out = f(self);
        if out.is_err() {
            *self = snapshot;
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Column;
    use crate::model::Submission;
    use crate::testing::SampleSchool;

    fn ids_where(store: &MemoryStore, entity: EntityType, column: Column, value: i64) -> Vec<i64> {
        store
            .table(entity)
            .filter(|r| r.key(column) == Some(value))
            .map(Record::id)
            .collect()
    }

    #[test]
    fn insert_rejects_dangling_references() {
        let mut store = MemoryStore::new();
        let err = store
            .insert(Record::Submission(Submission {
                id: 0,
                assignment_id: 404,
                student_id: 1,
                content: "answer".to_string(),
            }))
            .expect_err("dangling assignment");
        assert!(matches!(err, StoreError::Constraint(_)));
    }

    #[test]
    fn second_submission_for_same_assignment_conflicts() {
        let mut store = MemoryStore::new();
        let school = SampleSchool::seed(&mut store).expect("seed");
        let err = store
            .insert(Record::Submission(Submission {
                id: 0,
                assignment_id: school.assignment_a,
                student_id: school.student_1,
                content: "again".to_string(),
            }))
            .expect_err("duplicate answer");
        assert!(err.to_string().contains("UNIQUE"), "got: {err}");
    }

    #[test]
    fn failed_transaction_rolls_back_writes() {
        let mut store = MemoryStore::new();
        let school = SampleSchool::seed(&mut store).expect("seed");
        let before = store
            .select(EntityType::Submission, &Scope::All, None)
            .expect("select")
            .total;
        let out: Result<(), StoreError> = store.transaction(|s| {
            s.delete(EntityType::Submission, school.submission_1)?;
            Err(StoreError::Constraint("abort".to_string()))
        });
        assert!(out.is_err());
        let after = store
            .select(EntityType::Submission, &Scope::All, None)
            .expect("select")
            .total;
        assert_eq!(before, after);
    }

    #[test]
    fn delete_is_restricted_while_referenced() {
        let mut store = MemoryStore::new();
        let school = SampleSchool::seed(&mut store).expect("seed");
        assert!(store.delete(EntityType::Lesson, school.lesson_a).is_err());
        assert!(!ids_where(&store, EntityType::Exam, Column::LessonId, school.lesson_a).is_empty());
    }

    #[test]
    fn paging_reports_the_unpaged_total() {
        let mut store = MemoryStore::new();
        SampleSchool::seed(&mut store).expect("seed");
        let page = store
            .select(EntityType::Student, &Scope::All, Some(Page::new(2, 3)))
            .expect("select");
        assert_eq!(page.total, 4);
        assert_eq!(page.rows.len(), 1);
        assert_eq!(page.rows[0].id(), 4);
    }
}
