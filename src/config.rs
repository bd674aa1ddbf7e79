//! Engine configuration.
//!
//! Precedence is CLI > environment (`FIRELITE_*`) > TOML file > defaults. The
//! binary applies CLI flags last; everything else is handled by [`EngineConfig::load`].

use crate::errors::DbError;
use crate::query::compile::DEFAULT_MAX_FILTER_DEPTH;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const CONFIG_FILE_NAME: &str = "firelite.toml";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub dir: Option<PathBuf>,
    pub level: String,
    pub retention: usize,
    pub dev6: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self { dir: None, level: "info".into(), retention: 7, dev6: false }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub project_id: String,
    pub database_id: String,
    pub max_filter_depth: usize,
    /// 0 disables slow-query reporting.
    pub slow_query_ms: u64,
    pub log: LogConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            project_id: "demo-project".into(),
            database_id: "(default)".into(),
            max_filter_depth: DEFAULT_MAX_FILTER_DEPTH,
            slow_query_ms: 500,
            log: LogConfig::default(),
        }
    }
}

impl EngineConfig {
    /// # Errors
    /// Returns `DbError::Toml` on malformed input.
    pub fn from_toml_str(s: &str) -> Result<Self, DbError> {
        Ok(toml::from_str(s)?)
    }

    /// # Errors
    /// Returns `DbError::Io` if the file cannot be read, `DbError::Toml` if it does not parse.
    pub fn from_file(path: &Path) -> Result<Self, DbError> {
        let s = std::fs::read_to_string(path)?;
        Self::from_toml_str(&s)
    }

    /// Overlays `FIRELITE_*` environment variables.
    ///
    /// # Errors
    /// Returns `DbError::Config` when a numeric variable does not parse.
    pub fn apply_env(&mut self) -> Result<(), DbError> {
        self.apply_env_with(|k| std::env::var(k).ok())
    }

    /// Same as [`apply_env`](Self::apply_env) with an injectable lookup.
    ///
    /// # Errors
    /// Returns `DbError::Config` when a numeric variable does not parse.
    pub fn apply_env_with<F>(&mut self, lookup: F) -> Result<(), DbError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("FIRELITE_PROJECT") {
            self.project_id = v;
        }
        if let Some(v) = lookup("FIRELITE_DATABASE") {
            self.database_id = v;
        }
        if let Some(v) = lookup("FIRELITE_MAX_FILTER_DEPTH") {
            self.max_filter_depth = parse_num("FIRELITE_MAX_FILTER_DEPTH", &v)?;
        }
        if let Some(v) = lookup("FIRELITE_SLOW_QUERY_MS") {
            self.slow_query_ms = parse_num("FIRELITE_SLOW_QUERY_MS", &v)?;
        }
        if let Some(v) = lookup("FIRELITE_LOG_DIR") {
            self.log.dir = Some(PathBuf::from(v));
        }
        if let Some(v) = lookup("FIRELITE_LOG_LEVEL") {
            self.log.level = v;
        }
        if let Some(v) = lookup("FIRELITE_LOG_RETENTION") {
            self.log.retention = parse_num("FIRELITE_LOG_RETENTION", &v)?;
        }
        if let Some(v) = lookup("FIRELITE_DEV6") {
            self.log.dev6 = matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes");
        }
        Ok(())
    }

    /// Loads the file (explicit path, then `FIRELITE_CONFIG`, then `./firelite.toml`),
    /// overlays the environment and validates. A missing default file is not an error.
    ///
    /// # Errors
    /// Fails on an unreadable explicit file, bad TOML, bad env values, or invalid settings.
    pub fn load(explicit: Option<&Path>) -> Result<Self, DbError> {
        let mut cfg = match explicit
            .map(Path::to_path_buf)
            .or_else(|| std::env::var("FIRELITE_CONFIG").ok().map(PathBuf::from))
        {
            Some(p) => Self::from_file(&p)?,
            None => {
                let local = PathBuf::from(CONFIG_FILE_NAME);
                if local.exists() { Self::from_file(&local)? } else { Self::default() }
            }
        };
        cfg.apply_env()?;
        cfg.validate()?;
        log::debug!("engine config loaded: project={} database={}", cfg.project_id, cfg.database_id);
        Ok(cfg)
    }

    /// # Errors
    /// Returns `DbError::Config` for empty ids or a zero filter depth.
    pub fn validate(&self) -> Result<(), DbError> {
        if self.project_id.trim().is_empty() {
            return Err(DbError::Config("project_id must not be empty".into()));
        }
        if self.database_id.trim().is_empty() {
            return Err(DbError::Config("database_id must not be empty".into()));
        }
        if self.max_filter_depth == 0 {
            return Err(DbError::Config("max_filter_depth must be at least 1".into()));
        }
        Ok(())
    }
}

fn parse_num<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T, DbError> {
    raw.trim().parse().map_err(|_| DbError::Config(format!("{key}: expected a number, got {raw:?}")))
}
