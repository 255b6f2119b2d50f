//! Engine configuration
//!
//! Every field has a default, so a configuration file only needs to name the
//! values it changes.

use crate::graph_store::{BuildOptions, DEFAULT_PARALLEL_EDGE_THRESHOLD};
use crate::patterns::PatternConfig;
use crate::AnalyticsError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// Analytics engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub detector: PatternConfig,
    /// Length of the most-connected ranking in stats
    pub top_connected: usize,
    /// Latency budget for one stats computation; `None` is unbounded
    pub analysis_budget_ms: Option<u64>,
    /// Edge count at which degree counting is sharded
    pub parallel_edge_threshold: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            detector: PatternConfig::default(),
            top_connected: 5,
            analysis_budget_ms: None,
            parallel_edge_threshold: DEFAULT_PARALLEL_EDGE_THRESHOLD,
        }
    }
}

impl EngineConfig {
    /// Parse and validate a JSON configuration
    pub fn from_json_str(json: &str) -> Result<Self, AnalyticsError> {
        let config: EngineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON configuration file
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, AnalyticsError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        let config = Self::from_json_str(&contents)?;
        info!(path = %path.display(), "loaded engine configuration");
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AnalyticsError> {
        self.detector.validate()?;
        if self.parallel_edge_threshold == 0 {
            return Err(AnalyticsError::InvalidConfiguration(
                "parallel_edge_threshold must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn build_options(&self) -> BuildOptions {
        BuildOptions {
            parallel_edge_threshold: self.parallel_edge_threshold,
        }
    }

    /// Export as JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
