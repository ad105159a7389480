//! Storage capability consumed by the scoped query service.

pub mod memory;
pub mod sqlite;

use crate::error::StoreError;
use crate::graph::EntityType;
use crate::model::Record;
use crate::scope::{Lookup, Scope};
use serde::{Deserialize, Serialize};

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Largest page a caller may ask for.
pub const MAX_PAGE_SIZE: usize = 500;

/// One page of a listing. `number` starts at 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub number: usize,
    pub size: usize,
}

impl Page {
    pub fn new(number: usize, size: usize) -> Self {
        Self {
            number: number.max(1),
            size: size.clamp(1, MAX_PAGE_SIZE),
        }
    }

    /// Rows before this page, or `None` when the count does not fit in an `i64`.
    pub fn offset(&self) -> Option<usize> {
        (self.number - 1)
            .checked_mul(self.size)
            .filter(|offset| i64::try_from(*offset).is_ok())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Listing {
    pub rows: Vec<Record>,
    /// Matching rows before paging.
    pub total: usize,
}

/// Query-by-predicate plus transactional writes.
///
/// Writes assign ids on insert and never look at scopes; authorization is the
/// caller's job and happens inside [`Store::transaction`].
pub trait Store: Lookup {
    /// Rows of `entity` admitted by `scope`, ordered by id.
    fn select(
        &self,
        entity: EntityType,
        scope: &Scope,
        page: Option<Page>,
    ) -> Result<Listing, StoreError>;

    fn insert(&mut self, record: Record) -> Result<Record, StoreError>;

    fn update(&mut self, record: Record) -> Result<Record, StoreError>;

    fn delete(&mut self, entity: EntityType, id: i64) -> Result<(), StoreError>;

    /// Runs `f` atomically: every write it made is undone when it returns `Err`.
    fn transaction<T, E, F>(&mut self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut Self) -> Result<T, E>,
        E: From<StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_is_clamped_to_sane_bounds() {
        assert_eq!(Page::new(0, 0), Page { number: 1, size: 1 });
        assert_eq!(Page::new(3, usize::MAX).size, MAX_PAGE_SIZE);
        assert_eq!(Page::new(3, 10).offset(), Some(20));
    }

    #[test]
    fn offset_overflow_is_none() {
        assert_eq!(Page::new(usize::MAX, 10).offset(), None);
        assert_eq!(Page::new(i64::MAX as usize, 10).offset(), None);
    }
}
