//! Serializable run configuration (`sentinel.toml`).
//!
//! Every field has a default, so an empty file (or no file) is a valid
//! configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config value `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SentinelConfig {
    /// Root of every on-disk store.
    pub data_dir: PathBuf,
    pub harvest: HarvestConfig,
    pub disclosures: DisclosureConfig,
    pub credentials: CredentialConfig,
    pub index: IndexConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarvestConfig {
    /// Batch size per harvest run.
    pub max_entities_per_run: usize,
    /// Lower bound of the randomized pause between entities.
    pub min_sleep_secs: f64,
    /// Upper bound of the randomized pause between entities.
    pub max_sleep_secs: f64,
    pub fetch_financials: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisclosureConfig {
    /// Fiscal year-end month used to estimate the annual report date.
    pub fiscal_month: u32,
    /// Minimum days between two disclosure sync runs.
    pub min_interval_days: i64,
    /// Inbox of pre-extracted disclosure documents.
    pub extract_dir: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CredentialConfig {
    /// Environment variable holding the disclosure API key.
    pub disclosure_api_key_env: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Group name used when `sync-index` is not given one.
    pub default_name: String,
}

impl Default for SentinelConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            harvest: HarvestConfig::default(),
            disclosures: DisclosureConfig::default(),
            credentials: CredentialConfig::default(),
            index: IndexConfig::default(),
        }
    }
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            max_entities_per_run: 100,
            min_sleep_secs: 1.0,
            max_sleep_secs: 3.0,
            fetch_financials: true,
        }
    }
}

impl Default for DisclosureConfig {
    fn default() -> Self {
        Self {
            fiscal_month: 3,
            min_interval_days: 7,
            extract_dir: PathBuf::from("data/extracts"),
        }
    }
}

impl Default for CredentialConfig {
    fn default() -> Self {
        Self {
            disclosure_api_key_env: "EDINET_API_KEY".to_string(),
        }
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            default_name: "Nikkei225".to_string(),
        }
    }
}

impl SentinelConfig {
    /// Load and validate a config file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Load `path` if it exists, defaults otherwise.
    pub fn from_file_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: SentinelConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let h = &self.harvest;
        if h.max_entities_per_run == 0 {
            return Err(ConfigError::Invalid {
                field: "harvest.max_entities_per_run",
                reason: "must be at least 1".into(),
            });
        }
        if !(h.min_sleep_secs.is_finite() && h.min_sleep_secs >= 0.0) {
            return Err(ConfigError::Invalid {
                field: "harvest.min_sleep_secs",
                reason: format!("must be a non-negative number, got {}", h.min_sleep_secs),
            });
        }
        if !(h.max_sleep_secs.is_finite() && h.max_sleep_secs >= h.min_sleep_secs) {
            return Err(ConfigError::Invalid {
                field: "harvest.max_sleep_secs",
                reason: format!(
                    "must be >= min_sleep_secs ({}), got {}",
                    h.min_sleep_secs, h.max_sleep_secs
                ),
            });
        }
        if !(1..=12).contains(&self.disclosures.fiscal_month) {
            return Err(ConfigError::Invalid {
                field: "disclosures.fiscal_month",
                reason: format!("must be 1..=12, got {}", self.disclosures.fiscal_month),
            });
        }
        if self.disclosures.min_interval_days < 0 {
            return Err(ConfigError::Invalid {
                field: "disclosures.min_interval_days",
                reason: "must not be negative".into(),
            });
        }
        Ok(())
    }

    /// Serialize back to TOML (used by `sentinel config`).
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}
