//! Serving facade: snapshot ingestion, filtered queries and network statistics
//!
//! [`NetworkAnalyzer`] holds the current validated snapshot. The serving layer
//! maps its responses onto whatever transport it uses; status-code mapping is
//! the caller's concern.

use crate::config::EngineConfig;
use crate::deadline::Deadline;
use crate::filter::{project, ProjectionOptions};
use crate::graph_store::Graph;
use crate::metrics::{self, ConnectedNode, FraudSummary, KindTotals};
use crate::model::NodeKind;
use crate::patterns::{PatternDetector, PatternMatch, PatternReport};
use crate::validator::{validate_all, ValidationWarning};
use crate::wire::NetworkData;
use crate::{AnalyticsError, ValidationError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock};
use tracing::{info, warn};
use uuid::Uuid;

/// Filtered-view request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NetworkQuery {
    pub node_types: Option<Vec<String>>,
    /// 0 means no limit
    pub max_nodes: Option<usize>,
    pub include_metadata: bool,
}

impl NetworkQuery {
    /// Translate to projection options. Empty type lists and a zero node
    /// limit leave that dimension unrestricted.
    pub fn to_projection(&self) -> ProjectionOptions {
        ProjectionOptions {
            allowed_kinds: self
                .node_types
                .as_ref()
                .filter(|types| !types.is_empty())
                .map(|types| {
                    types
                        .iter()
                        .map(|t| NodeKind::from_type(Some(t)))
                        .collect()
                }),
            max_nodes: self.max_nodes.filter(|&n| n > 0),
        }
    }
}

/// Metadata attached to a query response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryMetadata {
    pub last_updated: DateTime<Utc>,
    pub version: String,
    pub snapshot_id: String,
    pub node_count: usize,
    pub edge_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub density: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_type_histogram: Option<BTreeMap<String, usize>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResponse {
    pub success: bool,
    pub data: NetworkData,
    pub metadata: QueryMetadata,
}

/// Outcome of an ingestion attempt
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshot_id: Option<String>,
    pub node_count: usize,
    pub edge_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation_errors: Option<Vec<ValidationError>>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub warnings: Vec<ValidationWarning>,
}

/// Ranked node with its display label
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopConnectedEntry {
    pub node_id: String,
    pub label: String,
    pub connections: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatternSummary {
    pub analysis_id: Uuid,
    pub gather_count: usize,
    pub scatter_count: usize,
    pub total_fraud_volume: f64,
    pub matches: Vec<PatternMatch>,
}

/// Node and transaction counts by dashboard category
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsCategories {
    pub merchants: usize,
    pub users: usize,
    pub normal_transactions: usize,
    pub fraudulent_transactions: usize,
}

/// Whole-network statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsResponse {
    pub node_count: usize,
    pub edge_count: usize,
    pub density: f64,
    pub avg_degree: f64,
    pub top_connected: Vec<TopConnectedEntry>,
    pub most_connected_node: Option<TopConnectedEntry>,
    pub isolated_nodes: usize,
    /// Weakly connected components
    pub clusters: usize,
    pub node_types: BTreeMap<String, usize>,
    pub categories: StatsCategories,
    /// Count and volume per edge kind (`transaction`, `p2p`, ...)
    pub transaction_kinds: BTreeMap<String, KindTotals>,
    pub fraud_stats: FraudSummary,
    pub patterns: PatternSummary,
    pub last_updated: DateTime<Utc>,
}

impl StatsResponse {
    /// Export as JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

struct Snapshot {
    graph: Arc<Graph>,
    fingerprint: String,
    ingested_at: DateTime<Utc>,
    patterns: OnceLock<PatternReport>,
}

/// SHA-256 over the graph content in input order
pub fn fingerprint(graph: &Graph) -> String {
    let mut hasher = Sha256::new();
    for node in graph.nodes() {
        hasher.update(b"N");
        for field in [node.id.as_str(), node.label.as_str(), node.kind.as_str()] {
            hasher.update((field.len() as u64).to_le_bytes());
            hasher.update(field.as_bytes());
        }
    }
    for edge in graph.edges() {
        hasher.update(b"E");
        let fields = [
            edge.id.as_str(),
            edge.source.as_str(),
            edge.target.as_str(),
            edge.kind.as_str(),
        ];
        for field in fields {
            hasher.update((field.len() as u64).to_le_bytes());
            hasher.update(field.as_bytes());
        }
        hasher.update(edge.amount.to_bits().to_le_bytes());
        hasher.update(edge.weight.to_bits().to_le_bytes());
        hasher.update([match edge.is_fraud {
            None => 0u8,
            Some(false) => 1,
            Some(true) => 2,
        }]);
    }
    format!("{:x}", hasher.finalize())
}

/// Holds the current snapshot and answers queries over it
pub struct NetworkAnalyzer {
    config: EngineConfig,
    detector: PatternDetector,
    snapshot: Option<Arc<Snapshot>>,
}

impl NetworkAnalyzer {
    /// Create an analyzer, failing fast on invalid configuration
    pub fn new(config: EngineConfig) -> Result<Self, AnalyticsError> {
        config.validate()?;
        let detector = PatternDetector::new(config.detector.clone())?;
        Ok(Self {
            config,
            detector,
            snapshot: None,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Current graph, shareable across reader threads
    pub fn graph(&self) -> Option<Arc<Graph>> {
        self.snapshot.as_ref().map(|s| Arc::clone(&s.graph))
    }

    pub fn snapshot_id(&self) -> Option<&str> {
        self.snapshot.as_ref().map(|s| s.fingerprint.as_str())
    }

    /// Validate and install a new snapshot. A rejected snapshot leaves the
    /// current one in place.
    pub fn ingest(&mut self, data: &NetworkData) -> IngestResponse {
        match validate_all(&data.nodes, &data.edges) {
            Ok(input) => {
                let graph = Graph::build_with(input, self.config.build_options());
                let fingerprint = fingerprint(&graph);
                let response = IngestResponse {
                    success: true,
                    message: "Network data uploaded successfully".to_string(),
                    snapshot_id: Some(fingerprint.clone()),
                    node_count: graph.node_count(),
                    edge_count: graph.edge_count(),
                    validation_errors: None,
                    warnings: graph.warnings().to_vec(),
                };
                info!(
                    snapshot = %fingerprint,
                    nodes = graph.node_count(),
                    edges = graph.edge_count(),
                    "snapshot ingested"
                );
                self.snapshot = Some(Arc::new(Snapshot {
                    graph: Arc::new(graph),
                    fingerprint,
                    ingested_at: Utc::now(),
                    patterns: OnceLock::new(),
                }));
                response
            }
            Err(errors) => {
                warn!(errors = errors.len(), "snapshot rejected");
                IngestResponse {
                    success: false,
                    message: match errors.first() {
                        Some(first) => format!("Invalid network data: {}", first),
                        None => "Invalid network data".to_string(),
                    },
                    snapshot_id: None,
                    node_count: data.nodes.len(),
                    edge_count: data.edges.len(),
                    validation_errors: Some(errors),
                    warnings: Vec::new(),
                }
            }
        }
    }

    fn current(&self) -> Result<&Arc<Snapshot>, AnalyticsError> {
        self.snapshot.as_ref().ok_or(AnalyticsError::NoSnapshot)
    }

    /// Filtered view of the current snapshot
    pub fn query(&self, query: &NetworkQuery) -> Result<QueryResponse, AnalyticsError> {
        let snapshot = self.current()?;
        let view = project(&snapshot.graph, &query.to_projection());

        let (density, node_type_histogram) = if query.include_metadata {
            (
                Some(metrics::density(&view)),
                Some(metrics::node_type_histogram(&view)),
            )
        } else {
            (None, None)
        };

        Ok(QueryResponse {
            success: true,
            data: view.to_network_data(),
            metadata: QueryMetadata {
                last_updated: snapshot.ingested_at,
                version: env!("CARGO_PKG_VERSION").to_string(),
                snapshot_id: snapshot.fingerprint.clone(),
                node_count: view.node_count(),
                edge_count: view.edge_count(),
                density,
                node_type_histogram,
            },
        })
    }

    /// Gather/scatter report for the current snapshot, computed once per
    /// snapshot. Uses the configured analysis budget.
    pub fn patterns(&self) -> Result<PatternReport, AnalyticsError> {
        let deadline = Deadline::from_millis(self.config.analysis_budget_ms);
        self.patterns_within(&deadline)
    }

    fn patterns_within(&self, deadline: &Deadline) -> Result<PatternReport, AnalyticsError> {
        let snapshot = self.current()?;
        if let Some(report) = snapshot.patterns.get() {
            return Ok(report.clone());
        }
        let report = self.detector.detect(&snapshot.graph, deadline)?;
        // A concurrent reader may have filled the cell first; its report wins.
        Ok(snapshot.patterns.get_or_init(|| report).clone())
    }

    /// Network statistics using the configured analysis budget
    pub fn stats(&self) -> Result<StatsResponse, AnalyticsError> {
        self.stats_within(&Deadline::from_millis(self.config.analysis_budget_ms))
    }

    /// Network statistics bounded by a caller-supplied deadline
    pub fn stats_within(&self, deadline: &Deadline) -> Result<StatsResponse, AnalyticsError> {
        let snapshot = self.current()?;
        let graph = &snapshot.graph;

        let top_connected: Vec<TopConnectedEntry> =
            metrics::top_connected(graph, self.config.top_connected, deadline)?
                .into_iter()
                .map(|c| self.entry(graph, c))
                .collect();
        let most_connected_node = match top_connected.first() {
            Some(first) => Some(first.clone()),
            None => metrics::top_connected(graph, 1, deadline)?
                .into_iter()
                .next()
                .map(|c| self.entry(graph, c)),
        };

        let report = self.patterns_within(deadline)?;
        let node_types = metrics::node_type_histogram(graph);
        let fraud_stats = metrics::fraud_summary(graph);
        let categories = StatsCategories {
            merchants: node_types.get(NodeKind::Merchant.as_str()).copied().unwrap_or(0),
            users: node_types.get(NodeKind::User.as_str()).copied().unwrap_or(0),
            normal_transactions: fraud_stats.total_transactions
                - fraud_stats.fraudulent_transactions,
            fraudulent_transactions: fraud_stats.fraudulent_transactions,
        };

        Ok(StatsResponse {
            node_count: graph.node_count(),
            edge_count: graph.edge_count(),
            density: metrics::density(graph),
            avg_degree: metrics::average_degree(graph),
            top_connected,
            most_connected_node,
            isolated_nodes: metrics::isolated_nodes(graph),
            clusters: metrics::weakly_connected_components(graph),
            node_types,
            categories,
            transaction_kinds: metrics::transaction_kinds(graph),
            fraud_stats,
            patterns: PatternSummary {
                analysis_id: report.analysis_id,
                gather_count: report.gather_count,
                scatter_count: report.scatter_count,
                total_fraud_volume: report.total_fraud_volume,
                matches: report.matches,
            },
            last_updated: snapshot.ingested_at,
        })
    }

    fn entry(&self, graph: &Graph, connected: ConnectedNode) -> TopConnectedEntry {
        let label = graph
            .node(&connected.node_id)
            .map(|n| n.label.clone())
            .unwrap_or_default();
        TopConnectedEntry {
            node_id: connected.node_id,
            label,
            connections: connected.total_degree,
        }
    }
}

impl Default for NetworkAnalyzer {
    fn default() -> Self {
        Self {
            config: EngineConfig::default(),
            detector: PatternDetector::default(),
            snapshot: None,
        }
    }
}
