//! Benchmarks for graph construction, degree counting and pattern detection.
//!
//! Run with: cargo bench --bench analytics_benchmark

use criterion::{black_box, criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use transaction_graph_analytics::graph_store::BuildOptions;
use transaction_graph_analytics::metrics::top_connected;
use transaction_graph_analytics::{
    validate, Deadline, Graph, NetworkData, PatternDetector, RawEdge, RawNode, ValidatedInput,
};

/// Synthetic network with `users` accounts, a tenth as many merchants and
/// `edges` transactions. A few hub accounts receive labeled fraud.
fn synthetic_network(users: usize, edges: usize) -> NetworkData {
    let merchants = (users / 10).max(1);
    let mut nodes = Vec::with_capacity(users + merchants);
    for i in 0..users {
        nodes.push(RawNode {
            id: Some(format!("user-{}", i)),
            label: Some(format!("User {}", i)),
            kind: Some("user".to_string()),
            data: None,
        });
    }
    for i in 0..merchants {
        nodes.push(RawNode {
            id: Some(format!("merchant-{}", i)),
            label: Some(format!("Merchant {}", i)),
            kind: Some("merchant".to_string()),
            data: None,
        });
    }

    // Deterministic LCG so runs are comparable
    let mut state: u64 = 0x2545_f491_4f6c_dd1d;
    let mut next = move |bound: usize| {
        state = state.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(1);
        ((state >> 33) as usize) % bound
    };

    let mut raw_edges = Vec::with_capacity(edges);
    for i in 0..edges {
        let source = next(users);
        let fraud = i % 50 == 0;
        let target = if fraud {
            format!("user-{}", next(16))
        } else if i % 3 == 0 {
            format!("user-{}", next(users))
        } else {
            format!("merchant-{}", next(merchants))
        };
        raw_edges.push(RawEdge {
            id: Some(format!("txn-{}", i)),
            source: Some(format!("user-{}", source)),
            target: Some(target),
            amount: Some((next(100_000) as f64) / 100.0),
            is_fraud: Some(fraud),
            ..Default::default()
        });
    }

    NetworkData {
        nodes,
        edges: raw_edges,
    }
}

fn validated(users: usize, edges: usize) -> ValidatedInput {
    let data = synthetic_network(users, edges);
    validate(&data.nodes, &data.edges).unwrap()
}

fn bench_validate_and_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("build");
    group.sample_size(20);
    for edges in [10_000, 100_000] {
        let data = synthetic_network(edges / 10, edges);
        group.bench_with_input(BenchmarkId::new("validate", edges), &data, |b, data| {
            b.iter(|| validate(black_box(&data.nodes), black_box(&data.edges)).unwrap())
        });
        let input = validated(edges / 10, edges);
        group.bench_with_input(BenchmarkId::new("graph", edges), &input, |b, input| {
            b.iter_batched(|| input.clone(), Graph::build, BatchSize::LargeInput)
        });
    }
    group.finish();
}

fn bench_degrees(c: &mut Criterion) {
    let mut group = c.benchmark_group("degrees");
    group.sample_size(20);
    let input = validated(20_000, 200_000);
    for (name, threshold) in [("sequential", usize::MAX), ("sharded", 1)] {
        let options = BuildOptions {
            parallel_edge_threshold: threshold,
        };
        group.bench_function(name, |b| {
            b.iter_batched(
                || Graph::build_with(input.clone(), options),
                |graph| black_box(graph.degrees().len()),
                BatchSize::LargeInput,
            )
        });
    }
    group.finish();
}

fn bench_analysis(c: &mut Criterion) {
    let graph = Graph::build(validated(10_000, 100_000));
    graph.degrees();

    c.bench_function("top_connected_10", |b| {
        b.iter(|| top_connected(black_box(&graph), 10, &Deadline::unbounded()).unwrap())
    });

    let detector = PatternDetector::default();
    c.bench_function("detect_patterns", |b| {
        b.iter(|| detector.detect(black_box(&graph), &Deadline::unbounded()).unwrap())
    });
}

criterion_group!(benches, bench_validate_and_build, bench_degrees, bench_analysis);
criterion_main!(benches);
