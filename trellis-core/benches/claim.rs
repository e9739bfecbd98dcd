//! Claim graph benchmarks: invalidate-and-pull over a deep chain, and
//! staleness propagation over a wide fan-out.

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use trellis_core::{ClaimGraph, EdgeKind, EvalOutput, NodeId};

/// A chain of `depth` derived nodes over one input, each adding one to
/// the green below it.
fn build_chain(depth: usize) -> (ClaimGraph<u64, u64>, NodeId, NodeId) {
    let mut graph: ClaimGraph<u64, u64> = ClaimGraph::new();
    let source = graph.create_node("input", "0");

    graph.register_callback("link", |_, ctx| {
        let index: usize = ctx.key().parse().unwrap();
        let dep = if index == 1 {
            ctx.create_node("input", "0")
        } else {
            ctx.create_node("link", &(index - 1).to_string())
        };
        let below = ctx.pull(dep)?;
        let green = below.green().copied().unwrap_or(0) + 1;
        Ok(EvalOutput { green, red: green })
    });

    let mut tip = source;
    for index in 1..=depth {
        tip = graph.create_node("link", &index.to_string());
    }
    graph.set_input_value(source, 0, 0);
    (graph, source, tip)
}

fn bench_chain_pull(c: &mut Criterion) {
    c.bench_function("invalidate_and_pull_chain_64", |b| {
        let (mut graph, source, tip) = build_chain(64);
        graph.pull(tip).unwrap();

        let mut tick = 0u64;
        b.iter(|| {
            tick += 1;
            graph.set_input_value(source, tick, tick);
            black_box(graph.pull(tip).unwrap());
        });
    });
}

fn bench_fanout_propagation(c: &mut Criterion) {
    c.bench_function("mark_stale_fanout_1024", |b| {
        let mut graph: ClaimGraph<u64, u64> = ClaimGraph::new();
        let source = graph.create_node("input", "0");
        let leaves: Vec<NodeId> = (0..1024)
            .map(|index| {
                let dependent = graph.create_node("leaf", &index.to_string());
                graph.add_edge(source, dependent, EdgeKind::Data);
                dependent
            })
            .collect();
        graph.set_input_value(source, 0, 0);

        let mut tick = 0u64;
        b.iter(|| {
            // Re-freshen the leaves so every pass propagates for real.
            tick += 1;
            for &leaf in &leaves {
                graph.set_input_value(leaf, tick, tick);
            }
            graph.mark_stale(source);
            black_box(graph.stale_count());
        });
    });
}

criterion_group!(benches, bench_chain_pull, bench_fanout_propagation);
criterion_main!(benches);
