//! Transaction network analysis example
//!
//! This example loads the sample dashboard network, prints network statistics
//! and the detected gather/scatter patterns, then shows a filtered view and a
//! rejected upload.
//!
//! Run with: RUST_LOG=debug cargo run --example analyze_network

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use transaction_graph_analytics::{
    EngineConfig, NetworkAnalyzer, NetworkData, NetworkQuery, PatternType,
};

const SAMPLE: &str = include_str!("../tests/fixtures/sample_network.json");

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,transaction_graph_analytics=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    println!("=== Transaction Network Analytics ===\n");

    let config = EngineConfig {
        analysis_budget_ms: Some(2_000),
        ..Default::default()
    };
    let mut analyzer = NetworkAnalyzer::new(config)?;

    // 1. Ingest the sample network
    println!("1. Ingesting sample network");
    let data = NetworkData::from_json(SAMPLE)?;
    let response = analyzer.ingest(&data);
    println!("   {}", response.message);
    println!("   Snapshot: {}", response.snapshot_id.unwrap_or_default());
    println!("   Nodes: {}, Edges: {}", response.node_count, response.edge_count);
    println!();

    // 2. Network statistics
    println!("2. Network Statistics");
    let stats = analyzer.stats()?;
    println!("   Density: {:.4}", stats.density);
    println!("   Average degree: {:.2}", stats.avg_degree);
    println!("   Isolated nodes: {}", stats.isolated_nodes);
    println!("   Clusters: {}", stats.clusters);
    for (kind, totals) in &stats.transaction_kinds {
        println!(
            "   {} transactions: {} (${:.2}), fraudulent: {}",
            kind, totals.count, totals.volume, totals.fraudulent_count
        );
    }
    println!("   Node types: {:?}", stats.node_types);
    println!("   Most connected:");
    for entry in &stats.top_connected {
        println!("     {} ({}) - {} connections", entry.label, entry.node_id, entry.connections);
    }
    println!(
        "   Fraud: {}/{} transactions ({:.1}%), ${:.2}",
        stats.fraud_stats.fraudulent_transactions,
        stats.fraud_stats.total_transactions,
        stats.fraud_stats.fraud_rate * 100.0,
        stats.fraud_stats.fraudulent_volume
    );
    println!();

    // 3. Fraud patterns
    println!("3. Fraud Patterns");
    for m in &stats.patterns.matches {
        let kind = match m.pattern_type {
            PatternType::Gather => "GATHER ",
            PatternType::Scatter => "SCATTER",
        };
        println!(
            "   {} {} - {} counterparts, ${:.2}, confidence {:.2}",
            kind,
            m.center_node_id,
            m.fan_degree(),
            m.total_volume,
            m.confidence
        );
    }
    println!(
        "   Total volume in patterns: ${:.2}",
        stats.patterns.total_fraud_volume
    );
    println!();

    // 4. Filtered view
    println!("4. Users-only view");
    let view = analyzer.query(&NetworkQuery {
        node_types: Some(vec!["user".to_string()]),
        max_nodes: None,
        include_metadata: true,
    })?;
    println!(
        "   Nodes: {}, Edges: {}, Density: {:.4}",
        view.metadata.node_count,
        view.metadata.edge_count,
        view.metadata.density.unwrap_or_default()
    );
    println!();

    // 5. Rejected upload
    println!("5. Uploading an edge with an unknown target");
    let mut broken = data.clone();
    if let Some(edge) = broken.edges.first_mut() {
        edge.target = Some("user-999".to_string());
    }
    let response = analyzer.ingest(&broken);
    println!("   Success: {}", response.success);
    println!("   Message: {}", response.message);
    println!(
        "   Current snapshot still has {} edges",
        analyzer.stats()?.edge_count
    );

    println!("\n=== Analysis Complete ===");
    Ok(())
}
