use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::time::Duration;

use crate::history::key::DEFAULT_SHARD_COUNT;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AppConfig {
    pub log_level: String,
    pub log_dir: String,
    pub log_file: String,
    pub use_json: bool,
    pub rotation: String,
    #[serde(default)]
    pub history: HistoryConfig,
}

/// Connection settings for the history database (`db_log`)
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct DbConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub pass: String,
    pub name: String,
    #[serde(default = "default_charset")]
    pub charset: String,
}

fn default_charset() -> String {
    "utf8mb4".to_string()
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3306,
            user: "root".to_string(),
            pass: "".to_string(),
            name: "trade_log".to_string(),
            charset: default_charset(),
        }
    }
}

/// History writer tuning
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct HistoryConfig {
    pub db: DbConfig,
    /// Pool size; one connection per worker
    pub worker_count: usize,
    pub flush_interval_ms: u64,
    pub retry_backoff_ms: u64,
    /// Per-worker job queue bound
    pub queue_capacity: usize,
    /// Partitions per history table; must match the schema
    pub shard_count: u32,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            db: DbConfig::default(),
            worker_count: 20,
            flush_interval_ms: 100,
            retry_backoff_ms: 1000,
            queue_capacity: 1024,
            shard_count: DEFAULT_SHARD_COUNT,
        }
    }
}

impl HistoryConfig {
    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    /// Reject settings the service cannot run with
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.worker_count == 0 {
            return Err("worker_count must be > 0".to_string());
        }
        if self.shard_count == 0 {
            return Err("shard_count must be > 0".to_string());
        }
        if self.queue_capacity == 0 {
            return Err("queue_capacity must be > 0".to_string());
        }
        if self.flush_interval_ms == 0 {
            return Err("flush_interval_ms must be > 0".to_string());
        }
        Ok(())
    }
}

impl AppConfig {
    pub fn load(env: &str) -> Result<Self> {
        let config_path = format!("config/{}.yaml", env);
        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path))?;
        Self::from_yaml(&content).with_context(|| format!("Failed to parse {}", config_path))
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_history_defaults() {
        let config = HistoryConfig::default();
        assert_eq!(config.worker_count, 20);
        assert_eq!(config.flush_interval(), Duration::from_millis(100));
        assert_eq!(config.retry_backoff(), Duration::from_secs(1));
        assert_eq!(config.shard_count, 100);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_partial_yaml() {
        let yaml = r#"
log_level: info
log_dir: ./logs
log_file: history.log
use_json: false
rotation: daily
history:
  worker_count: 4
  db:
    host: db.internal
    port: 3306
    user: writer
    pass: secret
    name: trade_log
"#;
        let config = AppConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.history.worker_count, 4);
        assert_eq!(config.history.flush_interval_ms, 100);
        assert_eq!(config.history.db.host, "db.internal");
        assert_eq!(config.history.db.charset, "utf8mb4");
    }

    #[test]
    fn test_validate_rejects_zero_workers() {
        let config = HistoryConfig {
            worker_count: 0,
            ..HistoryConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
