use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::db::JobFilter;

/// Overrides `db_path` from the config file.
pub const DB_ENV_VAR: &str = "SIDEQUEST_DB";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// bcrypt cost for new password hashes.
    #[serde(default = "default_password_cost")]
    pub password_cost: u32,

    #[serde(default)]
    pub tracker: TrackerConfig,

    #[serde(default)]
    pub jobs: JobsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerConfig {
    /// Statuses the tracker cycles through. The store accepts any text.
    #[serde(default = "default_statuses")]
    pub statuses: Vec<String>,
}

fn default_statuses() -> Vec<String> {
    [
        "Saved",
        "Applied",
        "Phone Screen",
        "Interview",
        "Offer",
        "Accepted",
        "Rejected",
        "Withdrawn",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            statuses: default_statuses(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobsConfig {
    #[serde(default = "default_list_limit")]
    pub list_limit: usize,
}

fn default_list_limit() -> usize {
    JobFilter::default().limit
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            list_limit: default_list_limit(),
        }
    }
}

fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("", "", "sidequest")
}

fn default_db_path() -> PathBuf {
    // XDG data directory, or the current directory as a fallback
    project_dirs()
        .map(|dirs| dirs.data_dir().join("sidequest.db"))
        .unwrap_or_else(|| PathBuf::from("sidequest.db"))
}

fn default_password_cost() -> u32 {
    bcrypt::DEFAULT_COST
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            password_cost: default_password_cost(),
            tracker: TrackerConfig::default(),
            jobs: JobsConfig::default(),
        }
    }
}

impl Config {
    pub fn default_path() -> Option<PathBuf> {
        project_dirs().map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Load from the default location, falling back to defaults when no file exists.
    pub fn load() -> Result<Self> {
        let mut config = match Self::default_path() {
            Some(path) => Self::load_from(&path)?,
            None => Self::default(),
        };
        if let Ok(db) = std::env::var(DB_ENV_VAR) {
            if !db.is_empty() {
                config.db_path = PathBuf::from(db);
            }
        }
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Invalid config file: {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn job_filter(&self) -> JobFilter {
        JobFilter {
            limit: self.jobs.list_limit,
            ..JobFilter::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.password_cost, bcrypt::DEFAULT_COST);
        assert_eq!(config.jobs.list_limit, 100);
        assert_eq!(config.tracker.statuses.first().map(String::as_str), Some("Saved"));
        assert_eq!(config.tracker.statuses.len(), 8);
        assert!(config.db_path.ends_with("sidequest.db"));
    }

    #[test]
    fn test_partial_config() {
        let config = Config::parse(
            r#"
            db_path = "/tmp/jobs.db"

            [tracker]
            statuses = ["Saved", "Applied", "Ghosted"]
            "#,
        )
        .unwrap();
        assert_eq!(config.db_path, PathBuf::from("/tmp/jobs.db"));
        assert_eq!(config.tracker.statuses, vec!["Saved", "Applied", "Ghosted"]);
        assert_eq!(config.job_filter().limit, 100);
    }

    #[test]
    fn test_load_from_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        assert_eq!(Config::load_from(&path).unwrap().jobs.list_limit, 100);

        std::fs::write(&path, "[jobs]\nlist_limit = 25\n").unwrap();
        assert_eq!(Config::load_from(&path).unwrap().jobs.list_limit, 25);

        std::fs::write(&path, "password_cost = \"high\"").unwrap();
        let err = Config::load_from(&path).unwrap_err();
        assert!(err.to_string().contains("Invalid config file"));
    }
}
