use crate::store::MAX_PAGE_SIZE;
use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub const CONFIG_ENV: &str = "SCHOOLD_CONFIG";
pub const SECRET_ENV: &str = "SCHOOLD_SESSION_SECRET";
pub const LOG_ENV: &str = "SCHOOLD_LOG";

/// One year.
pub const MAX_TTL_SECS: i64 = 365 * 24 * 60 * 60;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub session: SessionConfig,
    pub query: QueryConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub secret: String,
    pub ttl_secs: i64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            secret: String::new(),
            ttl_secs: 3600,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    pub page_size: usize,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self { page_size: 10 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// `EnvFilter` directive used when `SCHOOLD_LOG` is unset.
    pub filter: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: "warn".to_string(),
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("failed to parse config {}", path.display()))?;
        Ok(config)
    }

    /// Loads the file named by `SCHOOLD_CONFIG` (or defaults), applies the
    /// secret override and validates the result.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let mut config = match var(CONFIG_ENV).filter(|p| !p.trim().is_empty()) {
            Some(path) => Self::load(path)?,
            None => Config::default(),
        };
        if let Some(secret) = var(SECRET_ENV) {
            config.session.secret = secret;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.session.secret.trim().is_empty() {
            bail!("session secret is empty; set [session] secret or {SECRET_ENV}");
        }
        if !(1..=MAX_TTL_SECS).contains(&self.session.ttl_secs) {
            bail!("session.ttl_secs must be between 1 and {MAX_TTL_SECS}");
        }
        if !(1..=MAX_PAGE_SIZE).contains(&self.query.page_size) {
            bail!("query.page_size must be between 1 and {MAX_PAGE_SIZE}");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_match_the_dashboard() {
        let config = Config::default();
        assert_eq!(config.session.ttl_secs, 3600);
        assert_eq!(config.query.page_size, 10);
        assert_eq!(config.log.filter, "warn");
    }

    #[test]
    fn empty_secret_is_rejected() {
        let err = Config::from_vars(vars(&[])).expect_err("no secret");
        assert!(err.to_string().contains("secret"));
        assert!(Config::from_vars(vars(&[(SECRET_ENV, "  ")])).is_err());
    }

    #[test]
    fn ttl_and_page_size_are_bounded() {
        let mut config = Config::default();
        config.session.secret = "s".to_string();
        assert!(config.validate().is_ok());

        config.session.ttl_secs = i64::MAX;
        assert!(config.validate().is_err());
        config.session.ttl_secs = MAX_TTL_SECS;
        assert!(config.validate().is_ok());

        config.query.page_size = MAX_PAGE_SIZE + 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn env_secret_overrides_file() {
        let dir = std::env::temp_dir().join(format!("schoold-config-{}", std::process::id()));
        fs::create_dir_all(&dir).expect("mkdir");
        let path = dir.join("schoold.toml");
        fs::write(
            &path,
            "[session]\nsecret = \"from-file\"\nttl_secs = 60\n\n[query]\npage_size = 25\n",
        )
        .expect("write");

        let from_file =
            Config::from_vars(vars(&[(CONFIG_ENV, path.to_str().expect("utf8"))])).expect("load");
        assert_eq!(from_file.session.secret, "from-file");
        assert_eq!(from_file.session.ttl_secs, 60);
        assert_eq!(from_file.query.page_size, 25);
        assert_eq!(from_file.log.filter, "warn");

        let overridden = Config::from_vars(vars(&[
            (CONFIG_ENV, path.to_str().expect("utf8")),
            (SECRET_ENV, "from-env"),
        ]))
        .expect("load");
        assert_eq!(overridden.session.secret, "from-env");
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn unreadable_config_names_the_file() {
        let err = Config::load("/nonexistent/schoold.toml").expect_err("missing");
        assert!(format!("{err:#}").contains("/nonexistent/schoold.toml"));
    }
}
