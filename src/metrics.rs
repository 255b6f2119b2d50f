//! Aggregate network statistics: density, degree ranking and summary counts.

use crate::deadline::Deadline;
use crate::graph_store::Graph;
use crate::model::NodeKind;
use crate::AnalyticsError;
#[cfg(feature = "parallel")]
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::{Ordering, Reverse};
use std::collections::{BTreeMap, BinaryHeap, HashMap};
use tracing::{debug, warn};

/// Users scoring at or below this (0-100 scale, lower is riskier) count as suspicious
pub const SUSPICIOUS_SCORE_CEILING: f64 = 20.0;

/// Per-node degree counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DegreeProfile {
    pub in_degree: usize,
    pub out_degree: usize,
    pub total_degree: usize,
}

/// Entry of a most-connected ranking
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectedNode {
    pub node_id: String,
    pub total_degree: usize,
}

/// Labeled-fraud totals over the whole graph
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FraudSummary {
    pub total_transactions: usize,
    pub fraudulent_transactions: usize,
    /// fraudulent / total; 0 for an edgeless graph
    pub fraud_rate: f64,
    pub fraudulent_volume: f64,
    /// Merchants whose status is `flagged`
    pub high_risk_merchants: usize,
    /// Users scored at or below [`SUSPICIOUS_SCORE_CEILING`]
    pub suspicious_users: usize,
}

/// Edges over the pair count of an undirected simple graph on the same nodes.
///
/// This is the figure the dashboard displays: `E / (V * (V - 1) / 2)`, 0 when
/// `V <= 1`. A directed multigraph can hold more edges than that denominator,
/// so the ratio is capped at 1 and the cap is logged; see [`raw_density`] for
/// the uncapped value.
pub fn density(graph: &Graph) -> f64 {
    graph.density()
}

/// Uncapped `E / (V * (V - 1) / 2)`; 0 when `V <= 1`
pub fn raw_density(graph: &Graph) -> f64 {
    let n = graph.node_count();
    if n <= 1 {
        return 0.0;
    }
    let pairs = (n as f64) * ((n - 1) as f64) / 2.0;
    graph.edge_count() as f64 / pairs
}

pub(crate) fn compute_density(graph: &Graph) -> f64 {
    let raw = raw_density(graph);
    if raw > 1.0 {
        warn!(
            raw_density = raw,
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            "edge count exceeds undirected pair count, density capped at 1"
        );
        return 1.0;
    }
    raw
}

/// Degree profile of every node, keyed by node id
pub fn degree_profile(graph: &Graph) -> HashMap<&str, DegreeProfile> {
    graph
        .nodes()
        .iter()
        .zip(graph.degrees())
        .map(|(node, profile)| (node.id.as_str(), *profile))
        .collect()
}

/// Single pass over edges; sharded across workers for large graphs when the
/// `parallel` feature is enabled.
pub(crate) fn count_degrees(graph: &Graph) -> Vec<DegreeProfile> {
    let node_count = graph.node_count();
    let endpoints = graph.endpoints();
    let threshold = graph.build_options().parallel_edge_threshold;

    let mut counts = if endpoints.len() >= threshold {
        debug!(edges = endpoints.len(), "counting degrees in shards");
        count_sharded(node_count, endpoints)
    } else {
        count_sequential(node_count, endpoints)
    };

    for profile in &mut counts {
        profile.total_degree = profile.in_degree + profile.out_degree;
    }
    counts
}

fn count_sequential(node_count: usize, endpoints: &[(usize, usize)]) -> Vec<DegreeProfile> {
    let mut counts = vec![DegreeProfile::default(); node_count];
    for &(src, dst) in endpoints {
        counts[src].out_degree += 1;
        counts[dst].in_degree += 1;
    }
    counts
}

#[cfg(feature = "parallel")]
fn count_sharded(node_count: usize, endpoints: &[(usize, usize)]) -> Vec<DegreeProfile> {
    endpoints
        .par_chunks(16_384)
        .map(|shard| count_sequential(node_count, shard))
        .reduce(
            || vec![DegreeProfile::default(); node_count],
            |mut merged, partial| {
                for (into, from) in merged.iter_mut().zip(partial) {
                    into.in_degree += from.in_degree;
                    into.out_degree += from.out_degree;
                }
                merged
            },
        )
}

#[cfg(not(feature = "parallel"))]
fn count_sharded(node_count: usize, endpoints: &[(usize, usize)]) -> Vec<DegreeProfile> {
    count_sequential(node_count, endpoints)
}

/// Heap entry; greater means better ranked.
#[derive(PartialEq, Eq)]
struct Ranked<'a> {
    degree: usize,
    id: &'a str,
}

impl Ord for Ranked<'_> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.degree
            .cmp(&other.degree)
            .then_with(|| other.id.cmp(self.id))
    }
}

impl PartialOrd for Ranked<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// The `k` nodes with the highest total degree, best first.
///
/// Ties are broken by ascending node id. Uses a bounded min-heap, so the cost
/// is O(V log k).
pub fn top_connected(
    graph: &Graph,
    k: usize,
    deadline: &Deadline,
) -> Result<Vec<ConnectedNode>, AnalyticsError> {
    let k = k.min(graph.node_count());
    if k == 0 {
        return Ok(Vec::new());
    }

    let mut heap: BinaryHeap<Reverse<Ranked<'_>>> = BinaryHeap::with_capacity(k + 1);
    for (i, (node, profile)) in graph.nodes().iter().zip(graph.degrees()).enumerate() {
        deadline.check_every(i, "top_connected")?;

        let candidate = Ranked {
            degree: profile.total_degree,
            id: &node.id,
        };
        if heap.len() == k {
            match heap.peek() {
                Some(Reverse(worst)) if candidate <= *worst => continue,
                _ => {}
            }
        }
        heap.push(Reverse(candidate));
        if heap.len() > k {
            heap.pop();
        }
    }

    Ok(heap
        .into_sorted_vec()
        .into_iter()
        .map(|Reverse(r)| ConnectedNode {
            node_id: r.id.to_string(),
            total_degree: r.degree,
        })
        .collect())
}

/// Mean total degree, `2E / V`; 0 for an empty graph
pub fn average_degree(graph: &Graph) -> f64 {
    if graph.node_count() == 0 {
        return 0.0;
    }
    (2 * graph.edge_count()) as f64 / graph.node_count() as f64
}

/// Number of nodes with no incident edges
pub fn isolated_nodes(graph: &Graph) -> usize {
    graph
        .degrees()
        .iter()
        .filter(|p| p.total_degree == 0)
        .count()
}

/// Node count per kind name; untyped nodes count under `default`
pub fn node_type_histogram(graph: &Graph) -> BTreeMap<String, usize> {
    let mut histogram = BTreeMap::new();
    for node in graph.nodes() {
        *histogram.entry(node.kind.as_str().to_string()).or_insert(0) += 1;
    }
    histogram
}

/// Number of weakly connected components; isolated nodes count as their own
/// component. 0 for an empty graph.
pub fn weakly_connected_components(graph: &Graph) -> usize {
    let mut parent: Vec<usize> = (0..graph.node_count()).collect();

    fn find(parent: &mut [usize], mut x: usize) -> usize {
        while parent[x] != x {
            parent[x] = parent[parent[x]];
            x = parent[x];
        }
        x
    }

    let mut components = graph.node_count();
    for &(src, dst) in graph.endpoints() {
        let (a, b) = (find(&mut parent, src), find(&mut parent, dst));
        if a != b {
            parent[a] = b;
            components -= 1;
        }
    }
    components
}

/// Count and volume of one kind of transaction
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KindTotals {
    pub count: usize,
    pub volume: f64,
    pub fraudulent_count: usize,
    pub fraudulent_volume: f64,
}

/// Edge totals per edge kind name (`transaction`, `p2p`, ...)
pub fn transaction_kinds(graph: &Graph) -> BTreeMap<String, KindTotals> {
    let mut kinds: BTreeMap<String, KindTotals> = BTreeMap::new();
    for edge in graph.edges() {
        let totals = kinds.entry(edge.kind.as_str().to_string()).or_default();
        totals.count += 1;
        totals.volume += edge.amount;
        if edge.is_labeled_fraud() {
            totals.fraudulent_count += 1;
            totals.fraudulent_volume += edge.amount;
        }
    }
    kinds
}

/// Totals over explicitly labeled fraud edges
pub fn fraud_summary(graph: &Graph) -> FraudSummary {
    let (fraudulent_transactions, fraudulent_volume) = graph
        .edges()
        .iter()
        .filter(|e| e.is_labeled_fraud())
        .fold((0usize, 0.0f64), |(count, volume), e| (count + 1, volume + e.amount));

    let total_transactions = graph.edge_count();
    let fraud_rate = if total_transactions == 0 {
        0.0
    } else {
        fraudulent_transactions as f64 / total_transactions as f64
    };

    let high_risk_merchants = graph
        .nodes()
        .iter()
        .filter(|n| n.kind == NodeKind::Merchant)
        .filter(|n| {
            n.attributes
                .status
                .as_deref()
                .is_some_and(|s| s.eq_ignore_ascii_case("flagged"))
        })
        .count();

    let suspicious_users = graph
        .nodes()
        .iter()
        .filter(|n| n.kind == NodeKind::User)
        .filter(|n| {
            n.attributes
                .score
                .is_some_and(|s| s <= SUSPICIOUS_SCORE_CEILING)
        })
        .count();

    FraudSummary {
        total_transactions,
        fraudulent_transactions,
        fraud_rate,
        fraudulent_volume,
        high_risk_merchants,
        suspicious_users,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph_store::BuildOptions;
    use crate::validator::validate;
    use crate::wire::{RawEdge, RawNode};
    use std::time::Duration;

    fn graph_of(node_ids: &[&str], edges: &[(&str, &str)]) -> Graph {
        graph_with(node_ids, edges, BuildOptions::default())
    }

    fn graph_with(node_ids: &[&str], edges: &[(&str, &str)], options: BuildOptions) -> Graph {
        let nodes: Vec<RawNode> = node_ids
            .iter()
            .map(|id| RawNode {
                id: Some(id.to_string()),
                label: Some(id.to_string()),
                ..Default::default()
            })
            .collect();
        let edges: Vec<RawEdge> = edges
            .iter()
            .enumerate()
            .map(|(i, (s, t))| RawEdge {
                id: Some(format!("e{}", i)),
                source: Some(s.to_string()),
                target: Some(t.to_string()),
                ..Default::default()
            })
            .collect();
        Graph::build_with(validate(&nodes, &edges).unwrap(), options)
    }

    #[test]
    fn test_density_three_nodes_two_edges() {
        let graph = graph_of(&["A", "B", "C"], &[("A", "B"), ("B", "C")]);
        assert!((density(&graph) - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_density_small_graphs_are_zero() {
        assert_eq!(density(&graph_of(&[], &[])), 0.0);
        assert_eq!(density(&graph_of(&["A"], &[("A", "A")])), 0.0);
    }

    #[test]
    fn test_density_capped_for_multigraph() {
        let graph = graph_of(&["A", "B"], &[("A", "B"), ("B", "A"), ("A", "B")]);
        assert_eq!(raw_density(&graph), 3.0);
        assert_eq!(density(&graph), 1.0);
    }

    #[test]
    fn test_handshake_invariant() {
        let graph = graph_of(
            &["A", "B", "C", "D"],
            &[("A", "B"), ("A", "C"), ("C", "A"), ("D", "D"), ("B", "C")],
        );
        let profile = degree_profile(&graph);
        let ins: usize = profile.values().map(|p| p.in_degree).sum();
        let outs: usize = profile.values().map(|p| p.out_degree).sum();
        assert_eq!(ins, graph.edge_count());
        assert_eq!(outs, graph.edge_count());
        assert_eq!(profile["D"].total_degree, 2);
    }

    #[test]
    fn test_sharded_count_matches_sequential() {
        let ids: Vec<String> = (0..50).map(|i| format!("n{:02}", i)).collect();
        let id_refs: Vec<&str> = ids.iter().map(String::as_str).collect();
        let pairs: Vec<(&str, &str)> = (0..2_000)
            .map(|i| (id_refs[i % 50], id_refs[(i * 7 + 3) % 50]))
            .collect();

        let sequential = graph_of(&id_refs, &pairs);
        let sharded = graph_with(
            &id_refs,
            &pairs,
            BuildOptions {
                parallel_edge_threshold: 1,
            },
        );
        assert_eq!(sequential.degrees(), sharded.degrees());
    }

    #[test]
    fn test_top_connected_ordering_and_ties() {
        let graph = graph_of(
            &["D", "C", "B", "A", "E"],
            &[("A", "B"), ("C", "D"), ("A", "E"), ("E", "A")],
        );
        let top = top_connected(&graph, 3, &Deadline::unbounded()).unwrap();
        let ids: Vec<&str> = top.iter().map(|c| c.node_id.as_str()).collect();
        assert_eq!(ids, vec!["A", "E", "B"]);
        assert_eq!(top[0].total_degree, 3);

        // Idempotent
        assert_eq!(top, top_connected(&graph, 3, &Deadline::unbounded()).unwrap());
    }

    #[test]
    fn test_top_connected_bounds() {
        let graph = graph_of(&["B", "A", "C"], &[]);
        let top = top_connected(&graph, 10, &Deadline::unbounded()).unwrap();
        let ids: Vec<&str> = top.iter().map(|c| c.node_id.as_str()).collect();
        assert_eq!(ids, vec!["A", "B", "C"]);
        assert!(top.iter().all(|c| c.total_degree == 0));
        assert!(top_connected(&graph, 0, &Deadline::unbounded())
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_top_connected_huge_k_is_clamped() {
        let graph = graph_of(&["A", "B"], &[("A", "B")]);
        let top = top_connected(&graph, usize::MAX, &Deadline::unbounded()).unwrap();
        assert_eq!(top.len(), 2);
        let top = top_connected(&graph, 1 << 40, &Deadline::unbounded()).unwrap();
        assert_eq!(top.len(), 2);
        assert!(top_connected(&graph_of(&[], &[]), usize::MAX, &Deadline::unbounded())
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_top_connected_deadline() {
        let graph = graph_of(&["A", "B"], &[("A", "B")]);
        let err = top_connected(&graph, 1, &Deadline::after(Duration::ZERO)).unwrap_err();
        assert!(matches!(err, AnalyticsError::DeadlineExceeded { .. }));
    }

    #[test]
    fn test_average_degree_and_isolated() {
        let graph = graph_of(&["A", "B", "C", "D"], &[("A", "B"), ("B", "C")]);
        assert_eq!(average_degree(&graph), 1.0);
        assert_eq!(isolated_nodes(&graph), 1);
        assert_eq!(average_degree(&graph_of(&[], &[])), 0.0);
    }

    #[test]
    fn test_weakly_connected_components() {
        let graph = graph_of(
            &["A", "B", "C", "D", "E", "F"],
            &[("A", "B"), ("C", "B"), ("D", "E"), ("E", "D")],
        );
        // {A, B, C}, {D, E}, {F}
        assert_eq!(weakly_connected_components(&graph), 3);
        assert_eq!(weakly_connected_components(&graph_of(&[], &[])), 0);
        assert_eq!(weakly_connected_components(&graph_of(&["A", "B"], &[])), 2);
    }

    #[test]
    fn test_transaction_kinds() {
        let nodes = vec![
            RawNode {
                id: Some("u1".to_string()),
                label: Some("U1".to_string()),
                ..Default::default()
            },
            RawNode {
                id: Some("u2".to_string()),
                label: Some("U2".to_string()),
                ..Default::default()
            },
        ];
        let edge = |id: &str, kind: Option<&str>, amount: f64, fraud: bool| RawEdge {
            id: Some(id.to_string()),
            source: Some("u1".to_string()),
            target: Some("u2".to_string()),
            amount: Some(amount),
            kind: kind.map(str::to_string),
            is_fraud: Some(fraud),
            ..Default::default()
        };
        let edges = vec![
            edge("t1", None, 10.0, false),
            edge("p1", Some("p2p"), 50.0, true),
            edge("p2", Some("p2p"), 25.0, false),
        ];
        let graph = Graph::build(validate(&nodes, &edges).unwrap());
        let kinds = transaction_kinds(&graph);

        assert_eq!(kinds.len(), 2);
        let p2p = kinds["p2p"];
        assert_eq!((p2p.count, p2p.volume), (2, 75.0));
        assert_eq!((p2p.fraudulent_count, p2p.fraudulent_volume), (1, 50.0));
        assert_eq!(kinds["transaction"].count, 1);
        assert_eq!(kinds["transaction"].fraudulent_count, 0);
    }

    #[test]
    fn test_node_type_histogram_defaults() {
        let graph = graph_of(&["A", "B"], &[]);
        let histogram = node_type_histogram(&graph);
        assert_eq!(histogram.get("default"), Some(&2));
    }
}
