//! # Transaction Graph Analytics
//!
//! In-memory analytics engine for transaction networks: users and merchants as
//! nodes, money movements as directed edges.
//!
//! ## Features
//!
//! - **Strict Ingestion**: Structural validation with fail-fast or collect-all reporting
//! - **Immutable Graph Store**: Directed adjacency indices built in one linear pass
//! - **Network Metrics**: Density, degree profile, most-connected ranking, fraud totals
//! - **Fraud Pattern Detection**: Gather (fan-in) and scatter (fan-out) money movement
//! - **Filtered Views**: Node-type and size-bounded projections for visualization
//! - **Latency Budgets**: Long analysis passes abort cleanly on a caller deadline
//!
//! ## Example
//!
//! ```
//! use transaction_graph_analytics::{NetworkAnalyzer, NetworkData};
//!
//! let data = NetworkData::from_json(r#"{
//!     "nodes": [
//!         {"id": "u1", "label": "Alice", "type": "user"},
//!         {"id": "m1", "label": "Coffee Shop", "type": "merchant"}
//!     ],
//!     "edges": [
//!         {"id": "t1", "source": "u1", "target": "m1", "label": "$4.50"}
//!     ]
//! }"#).unwrap();
//!
//! let mut analyzer = NetworkAnalyzer::default();
//! assert!(analyzer.ingest(&data).success);
//!
//! let stats = analyzer.stats().unwrap();
//! assert_eq!(stats.edge_count, 1);
//! assert_eq!(stats.density, 1.0);
//! ```

pub mod analyzer;
pub mod config;
pub mod deadline;
pub mod filter;
pub mod graph_store;
pub mod metrics;
pub mod model;
pub mod patterns;
pub mod validator;
pub mod wire;

pub use analyzer::{
    IngestResponse, NetworkAnalyzer, NetworkQuery, QueryResponse, StatsCategories, StatsResponse,
};
pub use config::EngineConfig;
pub use deadline::Deadline;
pub use filter::{project, ProjectionOptions};
pub use graph_store::{BuildOptions, Graph};
pub use metrics::{ConnectedNode, DegreeProfile, FraudSummary, KindTotals};
pub use model::{Edge, EdgeKind, Node, NodeKind};
pub use patterns::{
    FraudEvidence, InferencePolicy, PatternConfig, PatternDetector, PatternMatch, PatternReport,
    PatternType,
};
pub use validator::{validate, validate_all, Endpoint, ValidatedInput, ValidationWarning};
pub use wire::{NetworkData, RawEdge, RawNode};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Structural problems that cause a snapshot to be rejected
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ValidationError {
    #[error("Duplicate node id: {0}")]
    DuplicateNodeId(String),

    #[error("Node at index {index} is missing required field '{field}'")]
    MissingNodeField { index: usize, field: String },

    #[error("Edge at index {index} is missing required field '{field}'")]
    MissingEdgeField { index: usize, field: String },

    #[error("Duplicate edge id: {0}")]
    DuplicateEdgeId(String),

    #[error("Edge {edge_id} has {endpoint} {node_id} which is not a known node")]
    DanglingEdgeReference {
        edge_id: String,
        endpoint: Endpoint,
        node_id: String,
    },

    #[error("Edge {edge_id} has invalid amount {amount}")]
    InvalidAmount { edge_id: String, amount: f64 },
}

/// Errors surfaced by the engine
#[derive(Error, Debug)]
pub enum AnalyticsError {
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Analysis exceeded its {budget_ms}ms budget during {stage}")]
    DeadlineExceeded { stage: &'static str, budget_ms: u64 },

    #[error("No network snapshot has been ingested")]
    NoSnapshot,

    #[error("Failed to read configuration: {0}")]
    ConfigRead(#[from] std::io::Error),

    #[error("Failed to parse configuration: {0}")]
    ConfigParse(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_messages() {
        let err = ValidationError::DanglingEdgeReference {
            edge_id: "e1".to_string(),
            endpoint: Endpoint::Target,
            node_id: "ghost".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Edge e1 has target ghost which is not a known node"
        );

        let err = ValidationError::MissingNodeField {
            index: 3,
            field: "label".to_string(),
        };
        assert!(err.to_string().contains("index 3"));
    }

    #[test]
    fn test_validation_error_serializes() {
        let err = ValidationError::DuplicateNodeId("A".to_string());
        let json = serde_json::to_string(&err).unwrap();
        let back: ValidationError = serde_json::from_str(&json).unwrap();
        assert_eq!(back, err);
    }

    #[test]
    fn test_analytics_error_from_validation() {
        let err: AnalyticsError = ValidationError::DuplicateEdgeId("e1".to_string()).into();
        assert!(matches!(err, AnalyticsError::Validation(_)));
        assert_eq!(err.to_string(), "Validation failed: Duplicate edge id: e1");
    }
}
