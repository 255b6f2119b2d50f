//! Type- and size-bounded projections of a graph.

use crate::graph_store::Graph;
use crate::model::NodeKind;
use crate::validator::ValidatedInput;
use std::collections::HashSet;
use tracing::debug;

/// Projection parameters; `None` leaves that dimension unrestricted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProjectionOptions {
    pub allowed_kinds: Option<HashSet<NodeKind>>,
    pub max_nodes: Option<usize>,
}

impl ProjectionOptions {
    pub fn with_kinds<I: IntoIterator<Item = NodeKind>>(mut self, kinds: I) -> Self {
        self.allowed_kinds = Some(kinds.into_iter().collect());
        self
    }

    pub fn with_max_nodes(mut self, max_nodes: usize) -> Self {
        self.max_nodes = Some(max_nodes);
        self
    }
}

/// Build a new graph holding the selected nodes and only the edges whose
/// endpoints both survived. The input graph is untouched.
///
/// Kind filtering runs first, then truncation to the first `max_nodes`
/// surviving nodes in input order.
pub fn project(graph: &Graph, options: &ProjectionOptions) -> Graph {
    let mut kept: Vec<_> = graph
        .nodes()
        .iter()
        .filter(|node| {
            options
                .allowed_kinds
                .as_ref()
                .map_or(true, |kinds| kinds.contains(&node.kind))
        })
        .collect();

    if let Some(max_nodes) = options.max_nodes {
        kept.truncate(max_nodes);
    }

    let ids: HashSet<&str> = kept.iter().map(|n| n.id.as_str()).collect();
    let nodes: Vec<_> = kept.into_iter().cloned().collect();
    let edges: Vec<_> = graph
        .edges()
        .iter()
        .filter(|e| ids.contains(e.source.as_str()) && ids.contains(e.target.as_str()))
        .cloned()
        .collect();

    debug!(
        nodes_in = graph.node_count(),
        edges_in = graph.edge_count(),
        nodes_out = nodes.len(),
        edges_out = edges.len(),
        "graph projected"
    );

    Graph::build_with(
        ValidatedInput::from_trusted(nodes, edges),
        graph.build_options(),
    )
}
