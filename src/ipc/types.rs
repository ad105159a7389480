use std::path::PathBuf;

use crate::config::Config;
use crate::service::ScopedQueryService;
use crate::session::SessionCodec;
use crate::store::SqliteStore;
use chrono::Duration;
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

pub struct AppState {
    pub workspace: Option<PathBuf>,
    pub service: Option<ScopedQueryService<SqliteStore>>,
    pub sessions: SessionCodec,
    pub page_size: usize,
}

impl AppState {
    pub fn new(config: &Config) -> Self {
        Self {
            workspace: None,
            service: None,
            sessions: SessionCodec::new(
                config.session.secret.as_bytes(),
                Duration::try_seconds(config.session.ttl_secs).unwrap_or(Duration::MAX),
            ),
            page_size: config.query.page_size,
        }
    }
}
