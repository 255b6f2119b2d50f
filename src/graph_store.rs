//! Immutable transaction graph with directed adjacency indices.
//!
//! A [`Graph`] is built once from a [`ValidatedInput`] in a single linear pass
//! over the edges and never mutated afterwards, so any number of readers can
//! share it. Derived values (degree profile, density) are computed on first
//! access and cached for the lifetime of the graph.

use crate::metrics::{self, DegreeProfile};
use crate::model::{Edge, Node};
use crate::validator::{ValidatedInput, ValidationWarning};
use crate::wire::{NetworkData, RawEdge, RawNode};
use std::collections::HashMap;
use std::sync::OnceLock;
use std::time::Instant;
use tracing::debug;

/// Edge count at which degree counting is sharded across workers
pub const DEFAULT_PARALLEL_EDGE_THRESHOLD: usize = 100_000;

/// Options applied when building a graph
#[derive(Debug, Clone, Copy)]
pub struct BuildOptions {
    pub parallel_edge_threshold: usize,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            parallel_edge_threshold: DEFAULT_PARALLEL_EDGE_THRESHOLD,
        }
    }
}

/// Validated, read-only transaction network
#[derive(Debug)]
pub struct Graph {
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    node_index: HashMap<String, usize>,
    edge_index: HashMap<String, usize>,
    /// (source position, target position) per edge
    endpoints: Vec<(usize, usize)>,
    outgoing: Vec<Vec<usize>>,
    incoming: Vec<Vec<usize>>,
    warnings: Vec<ValidationWarning>,
    options: BuildOptions,
    degrees: OnceLock<Vec<DegreeProfile>>,
    density: OnceLock<f64>,
}

impl Graph {
    /// Build a graph with default options
    pub fn build(input: ValidatedInput) -> Self {
        Self::build_with(input, BuildOptions::default())
    }

    /// Build a graph. O(V + E) time and space.
    pub fn build_with(input: ValidatedInput, options: BuildOptions) -> Self {
        let started = Instant::now();
        let ValidatedInput {
            nodes,
            edges,
            warnings,
        } = input;

        let node_index: HashMap<String, usize> = nodes
            .iter()
            .enumerate()
            .map(|(pos, node)| (node.id.clone(), pos))
            .collect();

        let mut outgoing = vec![Vec::new(); nodes.len()];
        let mut incoming = vec![Vec::new(); nodes.len()];
        let mut endpoints = Vec::with_capacity(edges.len());
        let mut edge_index = HashMap::with_capacity(edges.len());

        for (pos, edge) in edges.iter().enumerate() {
            // Validated input guarantees both endpoints resolve.
            let (Some(&src), Some(&dst)) =
                (node_index.get(&edge.source), node_index.get(&edge.target))
            else {
                continue;
            };
            outgoing[src].push(pos);
            incoming[dst].push(pos);
            endpoints.push((src, dst));
            edge_index.insert(edge.id.clone(), pos);
        }

        debug!(
            nodes = nodes.len(),
            edges = edges.len(),
            elapsed_us = started.elapsed().as_micros() as u64,
            "graph built"
        );

        Self {
            nodes,
            edges,
            node_index,
            edge_index,
            endpoints,
            outgoing,
            incoming,
            warnings,
            options,
            degrees: OnceLock::new(),
            density: OnceLock::new(),
        }
    }

    /// Validate a snapshot and build a graph from it
    pub fn from_network(data: &NetworkData) -> Result<Self, crate::ValidationError> {
        crate::validator::validate_network(data).map(Self::build)
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.node_index.get(id).map(|&pos| &self.nodes[pos])
    }

    pub fn edge(&self, id: &str) -> Option<&Edge> {
        self.edge_index.get(id).map(|&pos| &self.edges[pos])
    }

    /// Ids of edges leaving `id`, in input order. Empty for unknown nodes.
    pub fn neighbors_out(&self, id: &str) -> Vec<&str> {
        self.outgoing_edges(id).map(|e| e.id.as_str()).collect()
    }

    /// Ids of edges arriving at `id`, in input order. Empty for unknown nodes.
    pub fn neighbors_in(&self, id: &str) -> Vec<&str> {
        self.incoming_edges(id).map(|e| e.id.as_str()).collect()
    }

    pub fn outgoing_edges(&self, id: &str) -> impl Iterator<Item = &Edge> + '_ {
        self.adjacent(&self.outgoing, id)
    }

    pub fn incoming_edges(&self, id: &str) -> impl Iterator<Item = &Edge> + '_ {
        self.adjacent(&self.incoming, id)
    }

    fn adjacent<'a>(
        &'a self,
        index: &'a [Vec<usize>],
        id: &str,
    ) -> impl Iterator<Item = &'a Edge> + 'a {
        self.node_index
            .get(id)
            .map(|&pos| index[pos].as_slice())
            .unwrap_or(&[])
            .iter()
            .map(move |&e| &self.edges[e])
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Nodes in input order
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Edges in input order
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Non-fatal findings from validation
    pub fn warnings(&self) -> &[ValidationWarning] {
        &self.warnings
    }

    pub fn build_options(&self) -> BuildOptions {
        self.options
    }

    /// Degree profile of one node (cached)
    pub fn degree(&self, id: &str) -> Option<DegreeProfile> {
        let pos = *self.node_index.get(id)?;
        self.degrees().get(pos).copied()
    }

    /// Degree profiles aligned with [`Graph::nodes`] (cached)
    pub fn degrees(&self) -> &[DegreeProfile] {
        self.degrees.get_or_init(|| metrics::count_degrees(self))
    }

    /// Network density (cached). See [`metrics::density`].
    pub fn density(&self) -> f64 {
        *self.density.get_or_init(|| metrics::compute_density(self))
    }

    pub(crate) fn edge_position(&self, id: &str) -> Option<usize> {
        self.edge_index.get(id).copied()
    }

    pub(crate) fn endpoints(&self) -> &[(usize, usize)] {
        &self.endpoints
    }

    pub(crate) fn outgoing_positions(&self, node_pos: usize) -> &[usize] {
        &self.outgoing[node_pos]
    }

    pub(crate) fn incoming_positions(&self, node_pos: usize) -> &[usize] {
        &self.incoming[node_pos]
    }

    /// Render back to the wire shape
    pub fn to_network_data(&self) -> NetworkData {
        NetworkData {
            nodes: self.nodes.iter().map(RawNode::from).collect(),
            edges: self.edges.iter().map(RawEdge::from).collect(),
        }
    }
}
