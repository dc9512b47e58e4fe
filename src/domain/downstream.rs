//! Downstream RPC Resolution
//!
//! Walks the call graph from an RPC handler and collects the calls it makes
//! into generated RPC stubs of other services.

use std::collections::HashSet;

use tracing::trace;

use crate::domain::callgraph::{Adjacency, CallGraph, CallGraphNode, NodeId};
use crate::domain::entry_point::RpcEntry;

/// Nodes already expanded during one resolution pass.
#[derive(Debug, Default)]
pub struct VisitedSet {
    seen: HashSet<NodeId>,
}

impl VisitedSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false when `id` was already visited.
    pub fn insert(&mut self, id: NodeId) -> bool {
        self.seen.insert(id)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.seen.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

pub struct DownstreamResolver<'g> {
    graph: &'g CallGraph,
    adjacency: &'g Adjacency,
    /// Source identity of the analyzed service, e.g. `github.com/acme/orders`
    service_source: &'g str,
}

impl<'g> DownstreamResolver<'g> {
    pub fn new(graph: &'g CallGraph, adjacency: &'g Adjacency, service_source: &'g str) -> Self {
        Self {
            graph,
            adjacency,
            service_source,
        }
    }

    /// Boundary nodes reachable from every occurrence of `entry`.
    pub fn resolve(&self, entry: &RpcEntry) -> Vec<NodeId> {
        let prefix = entry.method.generated_path_prefix();
        let mut visited = VisitedSet::new();
        self.resolve_from(&entry.occurrences, &prefix, &mut visited)
    }

    /// Depth-first search from `starts`, in discovery order without repeats.
    ///
    /// A node is expanded only when its receiver lives in the service's own
    /// source. Boundary calls are recorded and never expanded.
    pub fn resolve_from(
        &self,
        starts: &[NodeId],
        prefix: &str,
        visited: &mut VisitedSet,
    ) -> Vec<NodeId> {
        let mut found = Vec::new();
        let mut recorded: HashSet<NodeId> = HashSet::new();
        let mut stack: Vec<NodeId> = starts.iter().rev().copied().collect();

        while let Some(id) = stack.pop() {
            if !visited.insert(id) {
                continue;
            }
            let Some(node) = self.graph.node(id) else {
                continue;
            };
            if !self.is_own_code(node) {
                continue;
            }

            let mut pending = Vec::new();
            for &callee_id in self.adjacency.callees(id) {
                let Some(callee) = self.graph.node(callee_id) else {
                    continue;
                };
                if is_boundary_call(callee, prefix) {
                    if recorded.insert(callee_id) {
                        trace!(from = %node.name, to = %callee.name, "boundary call");
                        found.push(callee_id);
                    }
                } else if !visited.contains(callee_id) {
                    pending.push(callee_id);
                }
            }
            // Reverse so the first callee is expanded first.
            stack.extend(pending.into_iter().rev());
        }

        found
    }

    fn is_own_code(&self, node: &CallGraphNode) -> bool {
        node.receiver_package()
            .is_some_and(|pkg| pkg.contains(self.service_source))
    }
}

/// An exported RPC-shaped function whose package, request and response types
/// all live under the generated-path `prefix`.
pub fn is_boundary_call(node: &CallGraphNode, prefix: &str) -> bool {
    if !node.package.contains(prefix) || !node.is_exported() || !node.has_rpc_shape() {
        return false;
    }
    node.params[1].package_path().contains(prefix) && node.results[0].package_path().contains(prefix)
}
