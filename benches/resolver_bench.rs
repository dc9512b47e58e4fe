/// Benchmarks for downstream resolution.
///
/// Run with: `cargo bench`
///
/// - Long internal call chains ending in one stub call
/// - Wide fan-out graphs where every helper reaches several stubs
/// - Handler matching over large graphs

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use service_tracer::domain::callgraph::{CallEdge, CallGraph, CallGraphNode, TypeRef};
use service_tracer::domain::catalog::MethodCatalog;
use service_tracer::domain::downstream::DownstreamResolver;
use service_tracer::domain::entry_point::{RpcEntry, RpcEntryMatcher};
use service_tracer::domain::method::RpcMethod;

const SVC: &str = "github.com/acme/orders";
const STUBS: &str = "github.com/acme/protos/gen/payments";
const OWN_GEN: &str = "github.com/acme/protos/gen/orders";

// ═══════════════════════════════════════════════════════════════════════════
// Synthetic Graph Generators
// ═══════════════════════════════════════════════════════════════════════════

fn internal(id: usize) -> CallGraphNode {
    let pkg = format!("{}/internal", SVC);
    CallGraphNode {
        id,
        name: format!("step{}", id),
        package: pkg.clone(),
        receiver: Some(TypeRef::pointer_to(&pkg, "svc")),
        params: vec![],
        results: vec![],
        location: None,
        synthetic: false,
    }
}

fn stub(id: usize, name: &str) -> CallGraphNode {
    CallGraphNode {
        id,
        name: name.to_string(),
        package: STUBS.to_string(),
        receiver: Some(TypeRef::pointer_to(STUBS, "client")),
        params: vec![
            TypeRef::new("context.Context", Some("context")),
            TypeRef::pointer_to(STUBS, &format!("{}Request", name)),
        ],
        results: vec![
            TypeRef::pointer_to(STUBS, &format!("{}Response", name)),
            TypeRef::new("error", None),
        ],
        location: None,
        synthetic: false,
    }
}

/// 0 -> 1 -> ... -> len-1 -> stub
fn chain_graph(len: usize) -> CallGraph {
    let mut nodes: Vec<CallGraphNode> = (0..len).map(internal).collect();
    nodes.push(stub(len, "Charge"));
    let edges = (0..len)
        .map(|i| CallEdge {
            caller: i,
            callee: i + 1,
        })
        .collect();
    CallGraph::from_parts(nodes, edges)
}

/// Root calls `width` helpers; every helper calls every helper after it
/// (capped) and `stubs` distinct stub methods.
fn wide_graph(width: usize, stubs: usize) -> CallGraph {
    let mut nodes: Vec<CallGraphNode> = (0..=width).map(internal).collect();
    for s in 0..stubs {
        nodes.push(stub(width + 1 + s, &format!("Method{}", s)));
    }
    let mut edges = Vec::new();
    for h in 1..=width {
        edges.push(CallEdge { caller: 0, callee: h });
        for next in (h + 1)..=(h + 8).min(width) {
            edges.push(CallEdge { caller: h, callee: next });
        }
        for s in 0..stubs {
            edges.push(CallEdge {
                caller: h,
                callee: width + 1 + s,
            });
        }
    }
    CallGraph::from_parts(nodes, edges)
}

fn entry() -> RpcEntry {
    RpcEntry {
        method: RpcMethod::new("orders", OWN_GEN, "CreateOrder", "CreateOrderRequest", "CreateOrderResponse"),
        occurrences: vec![0],
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Benchmarks
// ═══════════════════════════════════════════════════════════════════════════

fn bench_chain(c: &mut Criterion) {
    let mut group = c.benchmark_group("resolve_chain");
    for len in [1_000usize, 10_000, 100_000] {
        let graph = chain_graph(len);
        let adj = graph.adjacency();
        let entry = entry();
        group.throughput(Throughput::Elements(len as u64));
        group.bench_with_input(BenchmarkId::from_parameter(len), &len, |b, _| {
            let resolver = DownstreamResolver::new(&graph, &adj, SVC);
            b.iter(|| black_box(resolver.resolve(&entry)))
        });
    }
    group.finish();
}

fn bench_wide(c: &mut Criterion) {
    let mut group = c.benchmark_group("resolve_wide");
    for width in [100usize, 1_000, 5_000] {
        let graph = wide_graph(width, 16);
        let adj = graph.adjacency();
        let entry = entry();
        group.throughput(Throughput::Elements(adj.edge_count() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(width), &width, |b, _| {
            let resolver = DownstreamResolver::new(&graph, &adj, SVC);
            b.iter(|| black_box(resolver.resolve(&entry)))
        });
    }
    group.finish();
}

fn bench_match(c: &mut Criterion) {
    let catalog = MethodCatalog::new(
        (0..200)
            .map(|i| {
                RpcMethod::new(
                    "payments",
                    STUBS,
                    format!("Method{}", i),
                    format!("Method{}Request", i),
                    format!("Method{}Response", i),
                )
            })
            .collect(),
    );
    let graph = wide_graph(5_000, 64);
    let matcher = RpcEntryMatcher::new(&catalog);

    c.bench_function("match_graph_wide_5000", |b| {
        b.iter(|| black_box(matcher.match_graph(&graph)))
    });
}

criterion_group!(benches, bench_chain, bench_wide, bench_match);
criterion_main!(benches);
