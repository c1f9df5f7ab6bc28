use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::tasks::view::{SortKey, TaskFilter, ViewQuery};

pub const URL_ENV: &str = "TASKBOARD_URL";

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub sync:   SyncConfig,
    pub view:   ViewConfig,
    pub log:    LogConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub base_url:        String,
    pub timeout_seconds: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { base_url: "http://localhost:8080/api".into(), timeout_seconds: 30 }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub interval_seconds: u64,
    pub auto_refresh:     bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self { interval_seconds: 300, auto_refresh: true }
    }
}

impl SyncConfig {
    /// `None` when periodic refresh is off or the interval is zero.
    pub fn refresh_interval(&self) -> Option<Duration> {
        (self.auto_refresh && self.interval_seconds > 0)
            .then(|| Duration::from_secs(self.interval_seconds))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ViewConfig {
    pub filter: TaskFilter,
    pub sort:   SortKey,
}

impl ViewConfig {
    pub fn query(&self) -> ViewQuery { ViewQuery::new(self.filter, self.sort) }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Per-task classification events at debug level.
    pub trace_classification: bool,
}

impl AppConfig {
    /// `config.toml` from the config dir, defaults when missing, then the
    /// environment override.
    pub fn load() -> Result<Self> {
        let mut cfg = Self::load_from(&config_dir().join("config.toml"))?;
        cfg.apply_env(std::env::var(URL_ENV).ok());
        Ok(cfg)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(AppConfig::default());
        }
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("parsing {}", path.display()))
    }

    pub fn parse(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn apply_env(&mut self, base_url: Option<String>) {
        if let Some(url) = base_url.filter(|u| !u.trim().is_empty()) {
            self.server.base_url = url.trim().to_owned();
        }
    }
}

pub fn config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("taskboard")
}
