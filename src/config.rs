//! Configuration for portfolio-engine
//!
//! Score cutoffs live here rather than in code: the 85/90 mission thresholds
//! and the publish threshold are product policy, tuned per program cohort.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default data directory
pub fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("portfolio-engine")
}

/// Configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Data directory for the SQLite database
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Minimum mission score for portfolio auto-creation (inclusive)
    #[serde(default = "default_auto_create_min_score")]
    pub auto_create_min_score: f64,

    /// Mission score at which auto-created items skip human review
    #[serde(default = "default_auto_approve_min_score")]
    pub auto_approve_min_score: f64,

    /// Review total score required for approval (0-10)
    #[serde(default = "default_publish_threshold")]
    pub publish_threshold: f64,

    /// Portfolio health (0-10) at which a marketplace profile is created
    #[serde(default = "default_profile_health_threshold")]
    pub profile_health_threshold: f64,

    /// Maximum number of featured items on a profile
    #[serde(default = "default_featured_limit")]
    pub featured_limit: usize,

    /// Event bus channel capacity
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

fn default_auto_create_min_score() -> f64 {
    85.0
}

fn default_auto_approve_min_score() -> f64 {
    90.0
}

fn default_publish_threshold() -> f64 {
    7.0
}

fn default_profile_health_threshold() -> f64 {
    3.0
}

fn default_featured_limit() -> usize {
    6
}

fn default_event_capacity() -> usize {
    1024
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            auto_create_min_score: default_auto_create_min_score(),
            auto_approve_min_score: default_auto_approve_min_score(),
            publish_threshold: default_publish_threshold(),
            profile_health_threshold: default_profile_health_threshold(),
            featured_limit: default_featured_limit(),
            event_capacity: default_event_capacity(),
        }
    }
}

impl Config {
    /// Load config from file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, std::io::Error> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }

    /// Save config to file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), std::io::Error> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, content)
    }

    /// Get database path
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("portfolio.db")
    }

    /// Get config file path
    pub fn config_path(&self) -> PathBuf {
        self.data_dir.join("config.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.auto_create_min_score, 85.0);
        assert_eq!(config.auto_approve_min_score, 90.0);
        assert!(config.auto_approve_min_score >= config.auto_create_min_score);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: Config = toml::from_str("auto_create_min_score = 80.0").unwrap();
        assert_eq!(config.auto_create_min_score, 80.0);
        assert_eq!(config.publish_threshold, 7.0);
    }
}
