//! Role-scoped access resolution for a school dashboard.
//!
//! A verified [`identity::Identity`] is mapped to a row [`scope::Scope`] per
//! entity by [`resolver::resolve_scope`] and to action permissions by
//! [`capability::resolve_capability`]. [`service::ScopedQueryService`] applies
//! both to every read and write against an injected [`store::Store`].

pub mod capability;
pub mod config;
pub mod db;
pub mod error;
pub mod graph;
pub mod identity;
pub mod ipc;
pub mod model;
pub mod resolver;
pub mod scope;
pub mod service;
pub mod session;
pub mod store;
pub mod testing;
