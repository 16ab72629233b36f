//! # Redaction Bot Configuration
//!
//! Everything the bot needs besides its command-line flags comes from one
//! YAML file: database locations, the API site and token, the geometric and
//! upload limits, and changeset metadata.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use redaction_bot::config::ConfigManager;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConfigManager::load(None)?;
//! let limits = &manager.config().limits;
//! println!("max request area: {}", limits.max_request_area);
//! # Ok(())
//! # }
//! ```
//!
//! ## Example file
//!
//! ```yaml
//! database:
//!   url: postgres://localhost/openstreetmap
//! tracker:
//!   url: postgres://localhost/redaction_tracker
//! api:
//!   site: https://api.openstreetmap.org
//!   token: "..."
//! limits:
//!   max_changeset_elements: 500
//! ```

pub mod error;
pub mod loader;

use crate::geo::{AreaSplitter, DEFAULT_MAX_REQUEST_AREA, DEFAULT_TOO_SMALL_TO_SPLIT};
use crate::models::changeset::DEFAULT_MAX_CHANGESET_ELEMENTS;
use crate::models::region::{DEFAULT_CONFLICT_RADIUS_DEGREES, DEFAULT_REGION_SIZE_DEGREES};
use crate::remote::throttle::{
    ThrottlePolicy, DEFAULT_MAX_THROTTLE_ATTEMPTS, DEFAULT_THROTTLE_BASE_DELAY_SECONDS,
};
use crate::remote::ChangesetMetadata;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub use error::{ConfigResult, ConfigurationError};
pub use loader::ConfigManager;

/// Root configuration structure mirroring redaction-bot.yaml
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct BotConfig {
    /// Source dataset (the map database the change compiler reads)
    pub database: DatabaseConfig,

    /// Shared tracker store holding regions and candidates
    pub tracker: TrackerConfig,

    /// Remote map API
    pub api: ApiConfig,

    pub limits: LimitsConfig,

    /// Creator metadata for opened changesets
    pub changeset: ChangesetMetadata,

    /// Where candidates for an area come from
    pub candidate_source: CandidateSourceKind,

    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "postgres://localhost/openstreetmap".to_string(),
            max_connections: 2,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TrackerConfig {
    pub url: String,
    pub max_connections: u32,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            url: "postgres://localhost/redaction_tracker".to_string(),
            max_connections: 2,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ApiConfig {
    pub site: String,
    /// Bearer token, obtained out of band
    pub token: String,
    /// Client-side timeout. Must exceed `remote_timeout_seconds` so a slow
    /// server answer is never cut off locally.
    pub read_timeout_seconds: u64,
    /// The server's own processing timeout
    pub remote_timeout_seconds: u64,
    /// Time allowed to establish the TCP and TLS connection
    pub connect_timeout_seconds: u64,
    pub user_agent: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            site: "https://api.openstreetmap.org".to_string(),
            token: String::new(),
            read_timeout_seconds: 320,
            remote_timeout_seconds: 300,
            connect_timeout_seconds: 30,
            user_agent: format!("redaction-bot/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Areas larger than this (square degrees) are split before querying
    pub max_request_area: f64,
    /// Splitting an area smaller than this is a fatal error
    pub too_small_to_split: f64,
    pub max_changeset_elements: usize,
    pub max_throttle_attempts: u32,
    pub throttle_base_delay_seconds: u64,
    /// Per-type cap on candidates taken in ignore-regions mode
    pub ignore_regions_batch_limit: usize,
    pub region_size_degrees: f64,
    pub conflict_radius_degrees: f64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_request_area: DEFAULT_MAX_REQUEST_AREA,
            too_small_to_split: DEFAULT_TOO_SMALL_TO_SPLIT,
            max_changeset_elements: DEFAULT_MAX_CHANGESET_ELEMENTS,
            max_throttle_attempts: DEFAULT_MAX_THROTTLE_ATTEMPTS,
            throttle_base_delay_seconds: DEFAULT_THROTTLE_BASE_DELAY_SECONDS,
            ignore_regions_batch_limit: 1000,
            region_size_degrees: DEFAULT_REGION_SIZE_DEGREES,
            conflict_radius_degrees: DEFAULT_CONFLICT_RADIUS_DEGREES,
        }
    }
}

impl LimitsConfig {
    pub fn splitter(&self) -> AreaSplitter {
        AreaSplitter::new(self.too_small_to_split)
    }

    pub fn throttle_policy(&self) -> ThrottlePolicy {
        ThrottlePolicy {
            base_delay_seconds: self.throttle_base_delay_seconds,
            max_attempts: self.max_throttle_attempts,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateSourceKind {
    /// Query the tracker's candidate table by bounding box
    #[default]
    Tracker,
    /// Read live map data for the area and keep the ids that are candidates
    Map,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub directory: PathBuf,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("logs"),
        }
    }
}

impl BotConfig {
    /// Reject configurations that would make the run misbehave rather than fail
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.database.url.is_empty() {
            return Err(ConfigurationError::missing_required_field(
                "database.url",
                "database configuration",
            ));
        }

        if self.tracker.url.is_empty() {
            return Err(ConfigurationError::missing_required_field(
                "tracker.url",
                "tracker configuration",
            ));
        }

        if self.api.site.is_empty() {
            return Err(ConfigurationError::missing_required_field(
                "api.site",
                "api configuration",
            ));
        }

        if self.api.read_timeout_seconds <= self.api.remote_timeout_seconds {
            return Err(ConfigurationError::invalid_value(
                "api.read_timeout_seconds",
                self.api.read_timeout_seconds.to_string(),
                format!(
                    "must be greater than api.remote_timeout_seconds ({})",
                    self.api.remote_timeout_seconds
                ),
            ));
        }

        if self.api.connect_timeout_seconds == 0 {
            return Err(ConfigurationError::invalid_value(
                "api.connect_timeout_seconds",
                "0",
                "must be greater than 0",
            ));
        }

        let limits = &self.limits;
        if !(limits.max_request_area > 0.0) {
            return Err(ConfigurationError::invalid_value(
                "limits.max_request_area",
                limits.max_request_area.to_string(),
                "must be greater than 0",
            ));
        }

        if !(limits.too_small_to_split > 0.0) || limits.too_small_to_split >= limits.max_request_area {
            return Err(ConfigurationError::invalid_value(
                "limits.too_small_to_split",
                limits.too_small_to_split.to_string(),
                "must be greater than 0 and smaller than limits.max_request_area",
            ));
        }

        if limits.max_changeset_elements == 0 {
            return Err(ConfigurationError::invalid_value(
                "limits.max_changeset_elements",
                "0",
                "must be greater than 0",
            ));
        }

        if limits.max_throttle_attempts == 0 {
            return Err(ConfigurationError::invalid_value(
                "limits.max_throttle_attempts",
                "0",
                "must be greater than 0",
            ));
        }

        if limits.ignore_regions_batch_limit == 0 {
            return Err(ConfigurationError::invalid_value(
                "limits.ignore_regions_batch_limit",
                "0",
                "must be greater than 0",
            ));
        }

        if !(limits.region_size_degrees > 0.0) {
            return Err(ConfigurationError::invalid_value(
                "limits.region_size_degrees",
                limits.region_size_degrees.to_string(),
                "must be greater than 0",
            ));
        }

        if !(limits.conflict_radius_degrees >= 0.0) {
            return Err(ConfigurationError::invalid_value(
                "limits.conflict_radius_degrees",
                limits.conflict_radius_degrees.to_string(),
                "must not be negative",
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        let config = BotConfig::default();
        config.validate().unwrap();
        assert_eq!(config.limits.max_changeset_elements, 500);
        assert_eq!(config.limits.max_request_area, 0.25 / 32.0);
        assert_eq!(config.api.read_timeout_seconds, 320);
        assert_eq!(config.api.connect_timeout_seconds, 30);
        assert_eq!(config.candidate_source, CandidateSourceKind::Tracker);
    }

    #[test]
    fn test_connect_timeout_must_be_positive() {
        let mut config = BotConfig::default();
        config.api.connect_timeout_seconds = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("api.connect_timeout_seconds"));
    }

    #[test]
    fn test_read_timeout_must_exceed_remote_timeout() {
        let mut config = BotConfig::default();
        config.api.read_timeout_seconds = 300;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("api.read_timeout_seconds"));
    }

    #[test]
    fn test_split_threshold_must_be_below_request_area() {
        let mut config = BotConfig::default();
        config.limits.too_small_to_split = 1.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_limits_build_policies() {
        let limits = LimitsConfig {
            throttle_base_delay_seconds: 5,
            max_throttle_attempts: 3,
            ..LimitsConfig::default()
        };
        let policy = limits.throttle_policy();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.delay_for(2).as_secs(), 10);
        assert_eq!(limits.splitter().threshold(), DEFAULT_TOO_SMALL_TO_SPLIT);
    }

    #[test]
    fn test_partial_yaml_fills_defaults() {
        let yaml = r#"
api:
  site: https://master.apis.dev.openstreetmap.org
candidate_source: map
limits:
  max_changeset_elements: 100
changeset:
  tags:
    - [created_by, test bot]
"#;
        let config: BotConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.api.site, "https://master.apis.dev.openstreetmap.org");
        assert_eq!(config.api.read_timeout_seconds, 320);
        assert_eq!(config.limits.max_changeset_elements, 100);
        assert_eq!(config.limits.max_throttle_attempts, 10);
        assert_eq!(config.candidate_source, CandidateSourceKind::Map);
        assert_eq!(config.changeset.tags.len(), 1);
    }
}
