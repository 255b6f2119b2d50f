//! Gather (fan-in) and scatter (fan-out) fraud pattern detection
//!
//! Each pass walks every node once and looks at the edges on one side of it.
//! An edge takes part in a pattern when it carries ground-truth evidence
//! (`isFraud = true`) or, only when the caller opts into
//! [`InferencePolicy::AnomalyFallback`], when its amount or weight is anomalous
//! relative to the counterpart's other transactions. Under
//! [`InferencePolicy::Structural`] every edge takes part and detection reduces
//! to fan degree and volume alone.

use crate::deadline::Deadline;
use crate::graph_store::Graph;
use crate::AnalyticsError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, info};
use uuid::Uuid;

/// Fraud pattern type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PatternType {
    /// Many distinct sources sending to one destination
    Gather,
    /// One source distributing to many distinct destinations
    Scatter,
}

/// How edges without an explicit fraud label are treated
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum InferencePolicy {
    /// Only `isFraud = true` edges participate
    LabelsOnly,
    /// Unlabeled edges participate when their amount or weight exceeds
    /// `multiplier` times the counterpart's average over its other edges
    AnomalyFallback { multiplier: f64 },
    /// Every non-self-loop edge participates regardless of label; matches
    /// depend on topology and volume alone
    Structural,
}

impl Default for InferencePolicy {
    fn default() -> Self {
        InferencePolicy::LabelsOnly
    }
}

/// Detection thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PatternConfig {
    /// Minimum distinct counterparts around a center
    pub min_fan_degree: usize,
    /// Minimum summed amount of participating edges
    pub min_volume: f64,
    pub inference: InferencePolicy,
}

impl Default for PatternConfig {
    fn default() -> Self {
        Self {
            min_fan_degree: 5,
            min_volume: 1000.0,
            inference: InferencePolicy::LabelsOnly,
        }
    }
}

impl PatternConfig {
    /// Reject parameters that make detection meaningless
    pub fn validate(&self) -> Result<(), AnalyticsError> {
        if self.min_fan_degree < 1 {
            return Err(AnalyticsError::InvalidConfiguration(format!(
                "min_fan_degree must be at least 1, got {}",
                self.min_fan_degree
            )));
        }
        if !self.min_volume.is_finite() || self.min_volume < 0.0 {
            return Err(AnalyticsError::InvalidConfiguration(format!(
                "min_volume must be a non-negative number, got {}",
                self.min_volume
            )));
        }
        if let InferencePolicy::AnomalyFallback { multiplier } = self.inference {
            if !multiplier.is_finite() || multiplier <= 0.0 {
                return Err(AnalyticsError::InvalidConfiguration(format!(
                    "anomaly multiplier must be positive, got {}",
                    multiplier
                )));
            }
        }
        Ok(())
    }
}

/// Why an edge was (or was not) counted as fraudulent
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum FraudEvidence {
    /// Ground-truth label from the input
    Labeled(bool),
    /// Heuristic anomaly ratio (amount or weight over the counterpart's average)
    Inferred(f64),
    /// Counted on topology alone under [`InferencePolicy::Structural`]
    Structural,
}

/// One detected gather or scatter pattern
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatternMatch {
    pub pattern_type: PatternType,
    pub center_node_id: String,
    /// Distinct counterparts in edge input order
    pub counterpart_node_ids: Vec<String>,
    /// Participating edges in input order
    pub edge_ids: Vec<String>,
    pub total_volume: f64,
    /// Participating edges that carry an explicit `isFraud` label
    pub labeled_edges: usize,
    /// Participating edges admitted by inference or topology
    pub inferred_edges: usize,
    /// In [0, 1), increasing in both fan degree and volume
    pub confidence: f64,
}

impl PatternMatch {
    pub fn fan_degree(&self) -> usize {
        self.counterpart_node_ids.len()
    }
}

/// Result of one detector run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatternReport {
    pub analysis_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub matches: Vec<PatternMatch>,
    pub gather_count: usize,
    pub scatter_count: usize,
    /// Summed amount of distinct edges taking part in any match
    pub total_fraud_volume: f64,
}

impl PatternReport {
    /// Check if any pattern was found
    pub fn has_suspicious_activity(&self) -> bool {
        !self.matches.is_empty()
    }

    pub fn of_type(&self, pattern_type: PatternType) -> impl Iterator<Item = &PatternMatch> {
        self.matches
            .iter()
            .filter(move |m| m.pattern_type == pattern_type)
    }

    pub fn center(&self, pattern_type: PatternType, node_id: &str) -> Option<&PatternMatch> {
        self.of_type(pattern_type)
            .find(|m| m.center_node_id == node_id)
    }
}

/// Confidence of a match: mean of two saturating terms,
/// `1 - exp(-fan / min_fan)` and `1 - exp(-volume / max(min_volume, 1))`.
///
/// Strictly increasing in both `fan_degree` and `total_volume` and always in
/// `[0, 1)`.
pub fn confidence(fan_degree: usize, total_volume: f64, config: &PatternConfig) -> f64 {
    let fan_scale = config.min_fan_degree.max(1) as f64;
    let volume_scale = config.min_volume.max(1.0);
    let degree_term = 1.0 - (-(fan_degree as f64) / fan_scale).exp();
    let volume_term = 1.0 - (-total_volume.max(0.0) / volume_scale).exp();
    (degree_term + volume_term) / 2.0
}

/// Per-node sums used by the anomaly fallback
struct Baselines {
    out_amount: Vec<f64>,
    out_weight: Vec<f64>,
    out_count: Vec<usize>,
    in_amount: Vec<f64>,
    in_weight: Vec<f64>,
    in_count: Vec<usize>,
}

impl Baselines {
    fn compute(graph: &Graph) -> Self {
        let n = graph.node_count();
        let mut b = Self {
            out_amount: vec![0.0; n],
            out_weight: vec![0.0; n],
            out_count: vec![0; n],
            in_amount: vec![0.0; n],
            in_weight: vec![0.0; n],
            in_count: vec![0; n],
        };
        for (edge, &(src, dst)) in graph.edges().iter().zip(graph.endpoints()) {
            b.out_amount[src] += edge.amount;
            b.out_weight[src] += edge.weight;
            b.out_count[src] += 1;
            b.in_amount[dst] += edge.amount;
            b.in_weight[dst] += edge.weight;
            b.in_count[dst] += 1;
        }
        b
    }

    /// Largest of amount/avg and weight/avg, averaging over the counterpart's
    /// edges on the same side excluding this one. 0 with no other history.
    fn anomaly_ratio(
        &self,
        pattern: PatternType,
        counterpart: usize,
        amount: f64,
        weight: f64,
    ) -> f64 {
        let (amount_sum, weight_sum, count) = match pattern {
            // Gather counterparts are senders: compare against what else they sent.
            PatternType::Gather => (
                self.out_amount[counterpart],
                self.out_weight[counterpart],
                self.out_count[counterpart],
            ),
            PatternType::Scatter => (
                self.in_amount[counterpart],
                self.in_weight[counterpart],
                self.in_count[counterpart],
            ),
        };
        if count <= 1 {
            return 0.0;
        }
        let others = (count - 1) as f64;
        let ratio = |value: f64, sum: f64| {
            let avg = (sum - value) / others;
            if avg > 0.0 {
                value / avg
            } else {
                0.0
            }
        };
        ratio(amount, amount_sum).max(ratio(weight, weight_sum))
    }
}

/// Gather/scatter detector
#[derive(Debug, Clone)]
pub struct PatternDetector {
    config: PatternConfig,
}

impl PatternDetector {
    /// Create a detector, failing fast on invalid thresholds
    pub fn new(config: PatternConfig) -> Result<Self, AnalyticsError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &PatternConfig {
        &self.config
    }

    /// Run both passes
    pub fn detect(
        &self,
        graph: &Graph,
        deadline: &Deadline,
    ) -> Result<PatternReport, AnalyticsError> {
        let baselines = self.baselines(graph);
        let mut matches = self.run_pass(graph, PatternType::Gather, baselines.as_ref(), deadline)?;
        let gather_count = matches.len();
        matches.extend(self.run_pass(graph, PatternType::Scatter, baselines.as_ref(), deadline)?);
        let scatter_count = matches.len() - gather_count;

        let mut seen = HashSet::new();
        let total_fraud_volume: f64 = matches
            .iter()
            .flat_map(|m| m.edge_ids.iter())
            .filter(|id| seen.insert(id.as_str()))
            .filter_map(|id| graph.edge(id))
            .map(|e| e.amount)
            .sum();

        info!(
            gather = gather_count,
            scatter = scatter_count,
            total_fraud_volume,
            "pattern detection finished"
        );

        Ok(PatternReport {
            analysis_id: Uuid::new_v4(),
            generated_at: Utc::now(),
            matches,
            gather_count,
            scatter_count,
            total_fraud_volume,
        })
    }

    /// Fan-in pass only
    pub fn detect_gather(
        &self,
        graph: &Graph,
        deadline: &Deadline,
    ) -> Result<Vec<PatternMatch>, AnalyticsError> {
        let baselines = self.baselines(graph);
        self.run_pass(graph, PatternType::Gather, baselines.as_ref(), deadline)
    }

    /// Fan-out pass only
    pub fn detect_scatter(
        &self,
        graph: &Graph,
        deadline: &Deadline,
    ) -> Result<Vec<PatternMatch>, AnalyticsError> {
        let baselines = self.baselines(graph);
        self.run_pass(graph, PatternType::Scatter, baselines.as_ref(), deadline)
    }

    /// Evidence for one edge seen from the given pattern's side.
    ///
    /// `None` when the edge is unlabeled and inference is disabled, or the
    /// edge id is unknown.
    ///
    /// Under [`InferencePolicy::AnomalyFallback`] each call recomputes the
    /// per-node baselines, which is O(E); use [`PatternDetector::detect`] to
    /// classify many edges.
    pub fn evidence(
        &self,
        graph: &Graph,
        edge_id: &str,
        pattern: PatternType,
    ) -> Option<FraudEvidence> {
        let pos = graph.edge_position(edge_id)?;
        let baselines = self.baselines(graph);
        self.classify(graph, pos, pattern, baselines.as_ref())
    }

    fn baselines(&self, graph: &Graph) -> Option<Baselines> {
        match self.config.inference {
            InferencePolicy::LabelsOnly => None,
            InferencePolicy::AnomalyFallback { .. } => Some(Baselines::compute(graph)),
            InferencePolicy::Structural => None,
        }
    }

    fn classify(
        &self,
        graph: &Graph,
        edge_pos: usize,
        pattern: PatternType,
        baselines: Option<&Baselines>,
    ) -> Option<FraudEvidence> {
        let edge = &graph.edges()[edge_pos];
        if let Some(label) = edge.is_fraud {
            return Some(FraudEvidence::Labeled(label));
        }
        if self.config.inference == InferencePolicy::Structural {
            return Some(FraudEvidence::Structural);
        }
        let baselines = baselines?;
        let (src, dst) = graph.endpoints()[edge_pos];
        let counterpart = match pattern {
            PatternType::Gather => src,
            PatternType::Scatter => dst,
        };
        Some(FraudEvidence::Inferred(baselines.anomaly_ratio(
            pattern,
            counterpart,
            edge.amount,
            edge.weight,
        )))
    }

    fn participates(&self, evidence: Option<FraudEvidence>) -> bool {
        match (evidence, &self.config.inference) {
            (Some(_), InferencePolicy::Structural) => true,
            (Some(FraudEvidence::Labeled(label)), _) => label,
            (
                Some(FraudEvidence::Inferred(ratio)),
                InferencePolicy::AnomalyFallback { multiplier },
            ) => ratio > *multiplier,
            _ => false,
        }
    }

    fn run_pass(
        &self,
        graph: &Graph,
        pattern: PatternType,
        baselines: Option<&Baselines>,
        deadline: &Deadline,
    ) -> Result<Vec<PatternMatch>, AnalyticsError> {
        let stage = match pattern {
            PatternType::Gather => "gather_detection",
            PatternType::Scatter => "scatter_detection",
        };
        let nodes = graph.nodes();
        let edges = graph.edges();
        let endpoints = graph.endpoints();
        let mut matches = Vec::new();

        for (center, node) in nodes.iter().enumerate() {
            deadline.check_every(center, stage)?;

            let side = match pattern {
                PatternType::Gather => graph.incoming_positions(center),
                PatternType::Scatter => graph.outgoing_positions(center),
            };
            if side.len() < self.config.min_fan_degree {
                continue;
            }

            let mut counterparts = Vec::new();
            let mut seen = HashSet::new();
            let mut edge_ids = Vec::new();
            let mut total_volume = 0.0;
            let mut labeled_edges = 0;
            let mut inferred_edges = 0;

            for &pos in side {
                let (src, dst) = endpoints[pos];
                if src == dst {
                    continue;
                }
                let evidence = self.classify(graph, pos, pattern, baselines);
                if !self.participates(evidence) {
                    continue;
                }
                match evidence {
                    Some(FraudEvidence::Labeled(_)) => labeled_edges += 1,
                    _ => inferred_edges += 1,
                }
                let counterpart = match pattern {
                    PatternType::Gather => src,
                    PatternType::Scatter => dst,
                };
                if seen.insert(counterpart) {
                    counterparts.push(nodes[counterpart].id.clone());
                }
                edge_ids.push(edges[pos].id.clone());
                total_volume += edges[pos].amount;
            }

            if counterparts.len() < self.config.min_fan_degree
                || total_volume < self.config.min_volume
            {
                continue;
            }

            debug!(
                pattern = ?pattern,
                center = %node.id,
                fan_degree = counterparts.len(),
                total_volume,
                "pattern match"
            );

            matches.push(PatternMatch {
                pattern_type: pattern,
                center_node_id: node.id.clone(),
                confidence: confidence(counterparts.len(), total_volume, &self.config),
                counterpart_node_ids: counterparts,
                edge_ids,
                total_volume,
                labeled_edges,
                inferred_edges,
            });
        }

        Ok(matches)
    }
}

impl Default for PatternDetector {
    fn default() -> Self {
        Self {
            config: PatternConfig::default(),
        }
    }
}
