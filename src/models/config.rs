//! Application configuration structures.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::ShipmentStatus;

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Accepted AWB prefixes and partnered branches
    #[serde(default)]
    pub carrier: CarrierConfig,

    /// Manifest lookup behavior
    #[serde(default)]
    pub manifest: ManifestConfig,

    /// Bulk update scheduling
    #[serde(default)]
    pub batch: BatchConfig,

    /// Continuous scan defaults
    #[serde(default)]
    pub scan: ScanConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.carrier.prefixes.is_empty() {
            return Err(AppError::validation("carrier.prefixes is empty"));
        }
        if self.carrier.prefixes.iter().any(|p| p.trim().is_empty()) {
            return Err(AppError::validation("carrier.prefixes contains a blank prefix"));
        }
        if let Some(orphan) = self
            .carrier
            .partner_prefixes
            .iter()
            .find(|p| !self.carrier.prefixes.iter().any(|q| q.eq_ignore_ascii_case(p)))
        {
            return Err(AppError::validation(format!(
                "carrier.partner_prefixes entry '{orphan}' is not an accepted prefix"
            )));
        }
        if self.manifest.timeout_ms == 0 {
            return Err(AppError::validation("manifest.timeout_ms must be > 0"));
        }
        if self.manifest.partner_enabled && self.manifest.partner_base_url.trim().is_empty() {
            return Err(AppError::validation(
                "manifest.partner_base_url is empty but the partner source is enabled",
            ));
        }
        if self.manifest.user_agent.trim().is_empty() {
            return Err(AppError::validation("manifest.user_agent is empty"));
        }
        if self.batch.group_size == 0 {
            return Err(AppError::validation("batch.group_size must be > 0"));
        }
        Ok(())
    }
}

/// AWB prefix rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CarrierConfig {
    /// Prefixes an AWB must start with to be accepted
    #[serde(default = "defaults::prefixes")]
    pub prefixes: Vec<String>,

    /// Prefixes whose AWBs may be looked up at the partner endpoint
    #[serde(default = "defaults::partner_prefixes")]
    pub partner_prefixes: Vec<String>,
}

impl Default for CarrierConfig {
    fn default() -> Self {
        Self {
            prefixes: defaults::prefixes(),
            partner_prefixes: defaults::partner_prefixes(),
        }
    }
}

/// Manifest resolver settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestConfig {
    /// Base URL of the partner branch API
    #[serde(default = "defaults::partner_base_url")]
    pub partner_base_url: String,

    #[serde(default = "defaults::partner_enabled")]
    pub partner_enabled: bool,

    /// Budget for a single lookup call in milliseconds
    #[serde(default = "defaults::timeout_ms")]
    pub timeout_ms: u64,

    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,
}

impl Default for ManifestConfig {
    fn default() -> Self {
        Self {
            partner_base_url: defaults::partner_base_url(),
            partner_enabled: defaults::partner_enabled(),
            timeout_ms: defaults::timeout_ms(),
            user_agent: defaults::user_agent(),
        }
    }
}

/// Bulk update scheduling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Items processed concurrently per group
    #[serde(default = "defaults::group_size")]
    pub group_size: usize,

    /// Start delay added per item position within a group
    #[serde(default = "defaults::stagger_ms")]
    pub stagger_ms: u64,

    /// Pause between consecutive groups
    #[serde(default = "defaults::group_pause_ms")]
    pub group_pause_ms: u64,

    /// History timestamp offset per item position in the run
    #[serde(default = "defaults::history_offset_ms")]
    pub history_offset_ms: u64,

    #[serde(default = "defaults::status")]
    pub status: ShipmentStatus,

    #[serde(default = "defaults::location")]
    pub location: String,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            group_size: defaults::group_size(),
            stagger_ms: defaults::stagger_ms(),
            group_pause_ms: defaults::group_pause_ms(),
            history_offset_ms: defaults::history_offset_ms(),
            status: defaults::status(),
            location: defaults::location(),
        }
    }
}

/// Continuous scan defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    #[serde(default = "defaults::status")]
    pub status: ShipmentStatus,

    #[serde(default = "defaults::location")]
    pub location: String,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            status: defaults::status(),
            location: defaults::location(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "defaults::level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::level(),
        }
    }
}

mod defaults {
    use crate::models::ShipmentStatus;

    // Carrier defaults
    pub fn prefixes() -> Vec<String> {
        vec!["BCE".into(), "BE".into()]
    }
    pub fn partner_prefixes() -> Vec<String> {
        vec!["BE".into()]
    }

    // Manifest defaults
    pub fn partner_base_url() -> String {
        "http://localhost:8080".into()
    }
    pub fn partner_enabled() -> bool {
        true
    }
    pub fn timeout_ms() -> u64 {
        500
    }
    pub fn user_agent() -> String {
        "Mozilla/5.0 (compatible; shiptrack/0.1)".into()
    }

    // Batch defaults
    pub fn group_size() -> usize {
        5
    }
    pub fn stagger_ms() -> u64 {
        50
    }
    pub fn group_pause_ms() -> u64 {
        200
    }
    pub fn history_offset_ms() -> u64 {
        1
    }
    pub fn status() -> ShipmentStatus {
        ShipmentStatus::OutForDelivery
    }
    pub fn location() -> String {
        "Hub".into()
    }

    pub fn level() -> String {
        "info".into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_default_config_ok() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn validate_rejects_zero_group_size() {
        let mut config = Config::default();
        config.batch.group_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_unknown_partner_prefix() {
        let mut config = Config::default();
        config.carrier.partner_prefixes = vec!["ZZ".into()];
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_timeout() {
        let mut config = Config::default();
        config.manifest.timeout_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let config: Config = toml::from_str(
            r#"
            [batch]
            group_size = 3
            status = "in_transit"

            [manifest]
            partner_base_url = "https://partner.example.com/api"
            "#,
        )
        .unwrap();

        assert_eq!(config.batch.group_size, 3);
        assert_eq!(config.batch.status, ShipmentStatus::InTransit);
        assert_eq!(config.batch.stagger_ms, 50);
        assert_eq!(config.manifest.timeout_ms, 500);
        assert_eq!(config.carrier.prefixes, vec!["BCE", "BE"]);
    }
}
