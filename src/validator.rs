//! Structural-integrity checks that turn raw caller input into graph entities.
//!
//! Validation is a pure function of its inputs. Reference checks use a
//! precomputed id set so each edge costs O(1) regardless of node count.

use crate::model::{DropReason, Edge, EdgeAttributes, EdgeKind, Node, NodeAttributes, NodeKind};
use crate::wire::{resolve_amount, NetworkData, RawEdge, RawNode};
use crate::ValidationError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, info};

/// Weight assigned to edges that do not carry one
pub const DEFAULT_EDGE_WEIGHT: f64 = 1.0;

/// Non-fatal findings attached to an accepted input
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ValidationWarning {
    /// Edge whose source and target are the same node
    SelfLoop { edge_id: String, node_id: String },
    /// Attribute that could not be kept
    DroppedAttribute {
        owner_id: String,
        key: String,
        reason: DropReason,
    },
}

impl std::fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationWarning::SelfLoop { edge_id, node_id } => {
                write!(f, "Edge {} is a self-loop on node {}", edge_id, node_id)
            }
            ValidationWarning::DroppedAttribute {
                owner_id,
                key,
                reason,
            } => write!(f, "Dropped attribute {} on {}: {:?}", key, owner_id, reason),
        }
    }
}

/// Input that passed every structural check
#[derive(Debug, Clone, Default)]
pub struct ValidatedInput {
    pub(crate) nodes: Vec<Node>,
    pub(crate) edges: Vec<Edge>,
    pub(crate) warnings: Vec<ValidationWarning>,
}

impl ValidatedInput {
    /// Wrap entities that are already known to be consistent (e.g. a projection
    /// of an existing graph).
    pub(crate) fn from_trusted(nodes: Vec<Node>, edges: Vec<Edge>) -> Self {
        Self {
            nodes,
            edges,
            warnings: Vec::new(),
        }
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn warnings(&self) -> &[ValidationWarning] {
        &self.warnings
    }

    pub fn self_loop_count(&self) -> usize {
        self.warnings
            .iter()
            .filter(|w| matches!(w, ValidationWarning::SelfLoop { .. }))
            .count()
    }
}

/// Validate raw nodes and edges, failing on the first structural error.
pub fn validate(nodes: &[RawNode], edges: &[RawEdge]) -> Result<ValidatedInput, ValidationError> {
    run(nodes, edges, true).map_err(|mut errors| errors.swap_remove(0))
}

/// Validate raw nodes and edges, collecting every structural error.
pub fn validate_all(
    nodes: &[RawNode],
    edges: &[RawEdge],
) -> Result<ValidatedInput, Vec<ValidationError>> {
    run(nodes, edges, false)
}

/// Validate a whole snapshot
pub fn validate_network(data: &NetworkData) -> Result<ValidatedInput, ValidationError> {
    validate(&data.nodes, &data.edges)
}

fn present(field: &Option<String>) -> Option<&str> {
    field.as_deref().filter(|s| !s.is_empty())
}

fn run(
    raw_nodes: &[RawNode],
    raw_edges: &[RawEdge],
    fail_fast: bool,
) -> Result<ValidatedInput, Vec<ValidationError>> {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();
    let mut nodes = Vec::with_capacity(raw_nodes.len());
    let mut node_ids: HashSet<&str> = HashSet::with_capacity(raw_nodes.len());

    macro_rules! reject {
        ($err:expr) => {{
            errors.push($err);
            if fail_fast {
                return Err(errors);
            }
        }};
    }

    for (index, raw) in raw_nodes.iter().enumerate() {
        let Some(id) = present(&raw.id) else {
            reject!(ValidationError::MissingNodeField {
                index,
                field: "id".to_string(),
            });
            continue;
        };
        let Some(label) = present(&raw.label) else {
            reject!(ValidationError::MissingNodeField {
                index,
                field: "label".to_string(),
            });
            continue;
        };
        if !node_ids.insert(id) {
            reject!(ValidationError::DuplicateNodeId(id.to_string()));
            continue;
        }

        let attributes = match raw.data {
            Some(ref data) => {
                let (attrs, dropped) = NodeAttributes::from_json_map(data);
                warnings.extend(dropped.into_iter().map(|(key, reason)| {
                    ValidationWarning::DroppedAttribute {
                        owner_id: id.to_string(),
                        key,
                        reason,
                    }
                }));
                attrs
            }
            None => NodeAttributes::default(),
        };

        nodes.push(Node {
            id: id.to_string(),
            label: label.to_string(),
            kind: NodeKind::from_type(raw.kind.as_deref()),
            attributes,
        });
    }

    let mut edges = Vec::with_capacity(raw_edges.len());
    let mut edge_ids: HashSet<&str> = HashSet::with_capacity(raw_edges.len());

    for (index, raw) in raw_edges.iter().enumerate() {
        let (id, source, target) =
            match (present(&raw.id), present(&raw.source), present(&raw.target)) {
                (Some(id), Some(source), Some(target)) => (id, source, target),
                (id, source, _) => {
                    let field = if id.is_none() {
                        "id"
                    } else if source.is_none() {
                        "source"
                    } else {
                        "target"
                    };
                    reject!(ValidationError::MissingEdgeField {
                        index,
                        field: field.to_string(),
                    });
                    continue;
                }
            };

        if !edge_ids.insert(id) {
            reject!(ValidationError::DuplicateEdgeId(id.to_string()));
            continue;
        }

        let mut dangling = false;
        for (endpoint, node_id) in [(Endpoint::Source, source), (Endpoint::Target, target)] {
            if !node_ids.contains(node_id) {
                dangling = true;
                reject!(ValidationError::DanglingEdgeReference {
                    edge_id: id.to_string(),
                    endpoint,
                    node_id: node_id.to_string(),
                });
            }
        }
        if dangling {
            continue;
        }

        let amount = resolve_amount(raw);
        if !amount.is_finite() || amount < 0.0 {
            reject!(ValidationError::InvalidAmount {
                edge_id: id.to_string(),
                amount,
            });
            continue;
        }

        if source == target {
            warnings.push(ValidationWarning::SelfLoop {
                edge_id: id.to_string(),
                node_id: source.to_string(),
            });
        }

        let attributes = match raw.data {
            Some(ref data) => {
                let (attrs, dropped) = EdgeAttributes::from_json_map(data);
                warnings.extend(dropped.into_iter().map(|(key, reason)| {
                    ValidationWarning::DroppedAttribute {
                        owner_id: id.to_string(),
                        key,
                        reason,
                    }
                }));
                attrs
            }
            None => EdgeAttributes::default(),
        };

        edges.push(Edge {
            id: id.to_string(),
            source: source.to_string(),
            target: target.to_string(),
            label: raw.label.clone(),
            amount,
            weight: raw.weight.filter(|w| w.is_finite()).unwrap_or(DEFAULT_EDGE_WEIGHT),
            kind: EdgeKind::from_type(raw.kind.as_deref()),
            is_fraud: raw.is_fraud,
            attributes,
        });
    }

    if !errors.is_empty() {
        debug!(errors = errors.len(), "network input rejected");
        return Err(errors);
    }

    info!(
        nodes = nodes.len(),
        edges = edges.len(),
        warnings = warnings.len(),
        "network input validated"
    );

    Ok(ValidatedInput {
        nodes,
        edges,
        warnings,
    })
}

/// Which end of an edge a reference error concerns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Endpoint {
    Source,
    Target,
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Endpoint::Source => write!(f, "source"),
            Endpoint::Target => write!(f, "target"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: &str) -> RawNode {
        RawNode {
            id: Some(id.to_string()),
            label: Some(format!("Node {}", id)),
            kind: Some("user".to_string()),
            data: None,
        }
    }

    fn edge(id: &str, source: &str, target: &str) -> RawEdge {
        RawEdge {
            id: Some(id.to_string()),
            source: Some(source.to_string()),
            target: Some(target.to_string()),
            label: Some("$100.00".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_valid_input() {
        let nodes = vec![node("A"), node("B")];
        let edges = vec![edge("e1", "A", "B")];
        let input = validate(&nodes, &edges).unwrap();

        assert_eq!(input.nodes().len(), 2);
        assert_eq!(input.edges().len(), 1);
        assert_eq!(input.edges()[0].amount, 100.0);
        assert_eq!(input.edges()[0].weight, DEFAULT_EDGE_WEIGHT);
        assert!(input.warnings().is_empty());
    }

    #[test]
    fn test_duplicate_node_id() {
        let nodes = vec![node("A"), node("A")];
        let err = validate(&nodes, &[]).unwrap_err();
        assert_eq!(err, ValidationError::DuplicateNodeId("A".to_string()));
    }

    #[test]
    fn test_missing_node_fields() {
        let mut no_label = node("A");
        no_label.label = None;
        let err = validate(&[no_label], &[]).unwrap_err();
        assert_eq!(
            err,
            ValidationError::MissingNodeField {
                index: 0,
                field: "label".to_string()
            }
        );

        let mut empty_id = node("B");
        empty_id.id = Some(String::new());
        let err = validate(&[node("A"), empty_id], &[]).unwrap_err();
        assert_eq!(
            err,
            ValidationError::MissingNodeField {
                index: 1,
                field: "id".to_string()
            }
        );
    }

    #[test]
    fn test_dangling_edge_reference() {
        let nodes = vec![node("A")];
        let edges = vec![edge("e1", "A", "GHOST")];
        let err = validate(&nodes, &edges).unwrap_err();
        assert_eq!(
            err,
            ValidationError::DanglingEdgeReference {
                edge_id: "e1".to_string(),
                endpoint: Endpoint::Target,
                node_id: "GHOST".to_string(),
            }
        );
    }

    #[test]
    fn test_duplicate_edge_id() {
        let nodes = vec![node("A"), node("B")];
        let edges = vec![edge("e1", "A", "B"), edge("e1", "B", "A")];
        let err = validate(&nodes, &edges).unwrap_err();
        assert_eq!(err, ValidationError::DuplicateEdgeId("e1".to_string()));
    }

    #[test]
    fn test_missing_edge_field() {
        let nodes = vec![node("A")];
        let mut bad = edge("e1", "A", "A");
        bad.source = None;
        let err = validate(&nodes, &[bad]).unwrap_err();
        assert_eq!(
            err,
            ValidationError::MissingEdgeField {
                index: 0,
                field: "source".to_string()
            }
        );
    }

    #[test]
    fn test_negative_amount_rejected() {
        let nodes = vec![node("A"), node("B")];
        let mut bad = edge("e1", "A", "B");
        bad.label = Some("-$5.00".to_string());
        let err = validate(&nodes, &[bad]).unwrap_err();
        assert!(matches!(err, ValidationError::InvalidAmount { .. }));
    }

    #[test]
    fn test_self_loop_is_warning() {
        let nodes = vec![node("A")];
        let edges = vec![edge("loop", "A", "A")];
        let input = validate(&nodes, &edges).unwrap();

        assert_eq!(input.self_loop_count(), 1);
        assert_eq!(
            input.warnings()[0],
            ValidationWarning::SelfLoop {
                edge_id: "loop".to_string(),
                node_id: "A".to_string()
            }
        );
    }

    #[test]
    fn test_validate_all_collects_every_error() {
        let nodes = vec![node("A"), node("A"), node("B")];
        let edges = vec![
            edge("e1", "A", "B"),
            edge("e1", "B", "A"),
            edge("e2", "X", "Y"),
        ];
        let errors = validate_all(&nodes, &edges).unwrap_err();

        assert_eq!(errors.len(), 4);
        assert_eq!(errors[0], ValidationError::DuplicateNodeId("A".to_string()));
        assert_eq!(errors[1], ValidationError::DuplicateEdgeId("e1".to_string()));
        assert!(errors[2..]
            .iter()
            .all(|e| matches!(e, ValidationError::DanglingEdgeReference { .. })));
    }

    #[test]
    fn test_dropped_attribute_warning() {
        let mut n = node("A");
        let mut data = serde_json::Map::new();
        data.insert("history".to_string(), serde_json::json!([1, 2, 3]));
        n.data = Some(data);
        let input = validate(&[n], &[]).unwrap();
        assert!(matches!(
            input.warnings()[0],
            ValidationWarning::DroppedAttribute { ref key, .. } if key == "history"
        ));
    }

    #[test]
    fn test_accepts_iff_references_resolve() {
        let nodes: Vec<RawNode> = (0..20).map(|i| node(&format!("n{}", i))).collect();
        for target in 0..25 {
            let edges = vec![edge("e", "n0", &format!("n{}", target))];
            assert_eq!(validate(&nodes, &edges).is_ok(), target < 20);
        }
    }
}
