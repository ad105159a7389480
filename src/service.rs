//! Scoped reads and checked writes over an injected [`Store`].

use crate::capability::{self, field_access, Action, FieldAccess, FieldSet, Grant};
use crate::error::{AccessError, AuthError};
use crate::graph::{Column, EntityType, Link, SUBMISSION_ASSIGNMENT};
use crate::identity::Identity;
use crate::model::Record;
use crate::resolver::resolve_scope;
use crate::scope::{Predicate, Scope};
use crate::store::{Listing, Page, Store};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

pub const DEFAULT_PAGE_SIZE: usize = 10;

#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    Create { record: Value },
    Update { id: i64, patch: Map<String, Value> },
    Delete { id: i64 },
}

impl Mutation {
    pub fn action(&self) -> Action {
        match self {
            Mutation::Create { .. } => Action::Create,
            Mutation::Update { .. } => Action::Update,
            Mutation::Delete { .. } => Action::Delete,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutated {
    Written(Record),
    Deleted { entity: EntityType, id: i64 },
}

/// What one identity may do with one entity, as reported to the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessDescription {
    pub entity: EntityType,
    pub scope: String,
    pub capabilities: Vec<Action>,
    pub fields: FieldAccess,
}

/// References a written row must keep inside the caller's scope of the target entity.
fn write_guards(entity: EntityType) -> &'static [&'static Link] {
    static SUBMISSION: [&Link; 1] = [&SUBMISSION_ASSIGNMENT];
    match entity {
        EntityType::Submission => &SUBMISSION,
        _ => &[],
    }
}

/// Keeps only the fields in `visible`.
pub fn project(record: &Record, visible: FieldSet) -> Value {
    match (record.to_json(), visible) {
        (value, FieldSet::All) => value,
        (Value::Object(map), FieldSet::Only(fields)) => Value::Object(
            map.into_iter()
                .filter(|(k, _)| k == "id" || fields.iter().any(|f| *f == k.as_str()))
                .collect(),
        ),
        _ => Value::Object(Map::new()),
    }
}

pub fn describe(identity: &Identity, entity: EntityType) -> AccessDescription {
    AccessDescription {
        entity,
        scope: resolve_scope(identity, entity).to_string(),
        capabilities: Action::ALL
            .into_iter()
            .filter(|a| capability::resolve_capability(identity, entity, *a))
            .collect(),
        fields: field_access(identity, entity),
    }
}

pub struct ScopedQueryService<S> {
    store: S,
    page_size: usize,
}

impl<S: Store> ScopedQueryService<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Rows of `entity` inside the caller's scope and `extra`. An empty scope
    /// is zero rows, not an error.
    pub fn list(
        &self,
        identity: &Identity,
        entity: EntityType,
        extra: Option<&Predicate>,
        page: Option<Page>,
    ) -> Result<Listing, AccessError> {
        let mut scope = resolve_scope(identity, entity);
        if let Some(extra) = extra {
            extra.check(entity).map_err(|message| AccessError::Invalid {
                entity,
                message,
            })?;
            scope = scope.and(extra.clone());
        }
        if scope.is_nothing() {
            return Ok(Listing {
                rows: Vec::new(),
                total: 0,
            });
        }
        Ok(self.store.select(entity, &scope, page)?)
    }

    /// One row, or `None` when it is missing or outside the caller's scope.
    pub fn get(
        &self,
        identity: &Identity,
        entity: EntityType,
        id: i64,
    ) -> Result<Option<Record>, AccessError> {
        let scope = resolve_scope(identity, entity).and(Predicate::eq(Column::Id, id));
        if scope.is_nothing() {
            return Ok(None);
        }
        let listing = self.store.select(entity, &scope, None)?;
        Ok(listing.rows.into_iter().next())
    }

    pub fn mutate(
        &mut self,
        identity: &Identity,
        entity: EntityType,
        mutation: Mutation,
    ) -> Result<Mutated, AccessError> {
        let action = mutation.action();
        let out = self.checked_mutate(identity, entity, mutation);
        match &out {
            Ok(Mutated::Written(record)) => {
                info!(%identity, %entity, %action, id = record.id(), "mutation applied");
            }
            Ok(Mutated::Deleted { id, .. }) => {
                info!(%identity, %entity, %action, id, "mutation applied");
            }
            Err(AccessError::ScopeViolation { id, .. }) => {
                warn!(target: "audit", %identity, %entity, %action, id, "scope violation");
            }
            Err(AccessError::Auth(err @ AuthError::Forbidden { .. })) => {
                warn!(target: "audit", %identity, %entity, %action, error = %err, "forbidden");
            }
            Err(err) => debug!(%identity, %entity, %action, error = %err, "mutation rejected"),
        }
        out
    }

    fn checked_mutate(
        &mut self,
        identity: &Identity,
        entity: EntityType,
        mutation: Mutation,
    ) -> Result<Mutated, AccessError> {
        let action = mutation.action();
        let grant = capability::grant(identity, entity, action);
        if grant == Grant::Deny {
            return Err(AuthError::forbidden(identity.role, entity, action).into());
        }
        check_fields(identity, entity, &mutation)?;

        let mut scope = resolve_scope(identity, entity);
        if grant == Grant::OwnRecord {
            scope = scope.and(Predicate::eq(Column::Id, identity.subject_id));
        }

        self.store.transaction(|store| match mutation {
            Mutation::Create { record } => {
                let candidate = Record::from_json(entity, record).map_err(|e| {
                    AccessError::Invalid {
                        entity,
                        message: e.to_string(),
                    }
                })?;
                admit(&*store, &scope, &candidate)?;
                guard_references(&*store, identity, &candidate)?;
                Ok(Mutated::Written(store.insert(candidate)?))
            }
            Mutation::Update { id, patch } => {
                let target = fetch_in_scope(&*store, &scope, entity, id)?;
                let candidate = target.patched(&patch).map_err(|e| AccessError::Invalid {
                    entity,
                    message: e.to_string(),
                })?;
                admit(&*store, &scope, &candidate)?;
                guard_references(&*store, identity, &candidate)?;
                Ok(Mutated::Written(store.update(candidate)?))
            }
            Mutation::Delete { id } => {
                fetch_in_scope(&*store, &scope, entity, id)?;
                store.delete(entity, id)?;
                Ok(Mutated::Deleted { entity, id })
            }
        })
    }
}

fn check_fields(
    identity: &Identity,
    entity: EntityType,
    mutation: &Mutation,
) -> Result<(), AccessError> {
    let access = field_access(identity, entity);
    let (keys, allowed, action): (Vec<&String>, FieldSet, Action) = match mutation {
        Mutation::Create { record } => {
            let Value::Object(map) = record else {
                return Err(AccessError::Invalid {
                    entity,
                    message: "record must be an object".to_string(),
                });
            };
            (map.keys().collect(), access.creatable, Action::Create)
        }
        Mutation::Update { patch, .. } => {
            if patch.is_empty() {
                return Err(AccessError::Invalid {
                    entity,
                    message: "patch must include at least one field".to_string(),
                });
            }
            (patch.keys().collect(), access.mutable, Action::Update)
        }
        Mutation::Delete { .. } => return Ok(()),
    };
    if keys.iter().any(|k| k.as_str() == "id") {
        return Err(AccessError::Invalid {
            entity,
            message: "id is assigned by the store and cannot be written".to_string(),
        });
    }
    if let Some(field) = keys.into_iter().find(|k| !allowed.contains(k)) {
        return Err(AuthError::Forbidden {
            role: identity.role,
            entity,
            action,
            field: Some(field.clone()),
        }
        .into());
    }
    Ok(())
}

/// Re-reads the target inside the transaction and checks it against `scope`.
fn fetch_in_scope<S: Store>(
    store: &S,
    scope: &Scope,
    entity: EntityType,
    id: i64,
) -> Result<Record, AccessError> {
    let target = store
        .fetch(entity, id)?
        .ok_or(AccessError::NotFound { entity, id })?;
    admit(store, scope, &target)?;
    Ok(target)
}

fn admit<S: Store>(store: &S, scope: &Scope, row: &Record) -> Result<(), AccessError> {
    if scope.admits(row, store)? {
        Ok(())
    } else {
        Err(AccessError::ScopeViolation {
            entity: row.entity(),
            id: row.id(),
        })
    }
}

fn guard_references<S: Store>(
    store: &S,
    identity: &Identity,
    candidate: &Record,
) -> Result<(), AccessError> {
    for link in write_guards(candidate.entity()) {
        let Some(target_id) = candidate.key(link.column) else {
            continue;
        };
        let target = store
            .fetch(link.to, target_id)?
            .ok_or(AccessError::NotFound {
                entity: link.to,
                id: target_id,
            })?;
        admit(store, &resolve_scope(identity, link.to), &target)?;
    }
    Ok(())
}
