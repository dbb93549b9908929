//! Analysis configuration (routegraph.toml)
//!
//! Every field has a default, so an empty file (or no file) is valid.
//!
//! # Example routegraph.toml
//!
//! ```toml
//! [validation]
//! min_avg_hops = 1.0
//! min_sample_count = 1000
//!
//! [source]
//! production_only = true
//! exclude_looping = true
//!
//! [stability]
//! derive_fingerprints = false
//! resymmetrize = false
//!
//! [output]
//! top_edges = 100
//! network_name = "Network"
//! ```

use crate::pair_validator::ValidationThresholds;
use crate::source::SourceFilter;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct StabilityConfig {
    /// Derive fingerprints from hops when `route-sha1` is missing
    pub derive_fingerprints: bool,
    /// Re-run the symmetry fix-up after stability tracking
    pub resymmetrize: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Edges kept for the network summary
    pub top_edges: usize,
    /// Network name prefix
    pub network_name: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            top_edges: 100,
            network_name: "Network".to_string(),
        }
    }
}

/// Root configuration
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub validation: ValidationThresholds,
    pub source: SourceFilter,
    pub stability: StabilityConfig,
    pub output: OutputConfig,
}

impl AnalysisConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.validation.min_avg_hops.is_finite() {
            return Err(ConfigError::Invalid(format!(
                "validation.min_avg_hops must be finite, got {}",
                self.validation.min_avg_hops
            )));
        }
        if self.output.network_name.is_empty() {
            return Err(ConfigError::Invalid("output.network_name must not be empty".to_string()));
        }
        Ok(())
    }
}
