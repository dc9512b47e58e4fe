//! RPC Entry Matching Module
//!
//! Finds the call graph nodes that implement a service's declared RPC methods.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::callgraph::{Adjacency, CallGraph, CallGraphNode, NodeId};
use crate::domain::catalog::MethodCatalog;
use crate::domain::method::{RpcMethod, CONTEXT_TYPE};

/// How a node is resolved when several declared methods fit its signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchPolicy {
    /// Exactly one candidate must remain; ambiguous nodes are skipped.
    #[default]
    Strict,
    /// The first remaining candidate in declaration order wins.
    FirstCandidate,
}

/// A declared RPC method together with the nodes implementing it.
#[derive(Debug, Clone)]
pub struct RpcEntry {
    pub method: RpcMethod,
    /// Concrete handler nodes, in graph order
    pub occurrences: Vec<NodeId>,
}

/// Output of one matching pass over a call graph.
#[derive(Debug, Clone, Default)]
pub struct EntryMatches {
    /// Entries in first-match order
    pub entries: Vec<RpcEntry>,
    pub adjacency: Adjacency,
}

/// Matches call graph nodes against one service's method catalog.
pub struct RpcEntryMatcher<'a> {
    catalog: &'a MethodCatalog,
    policy: MatchPolicy,
}

impl<'a> RpcEntryMatcher<'a> {
    pub fn new(catalog: &'a MethodCatalog) -> Self {
        Self {
            catalog,
            policy: MatchPolicy::Strict,
        }
    }

    pub fn with_policy(mut self, policy: MatchPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Walk every node once, grouping RPC handler occurrences by declared method.
    pub fn match_graph(&self, graph: &CallGraph) -> EntryMatches {
        let mut entries: Vec<RpcEntry> = Vec::new();
        let mut positions: HashMap<&RpcMethod, usize> = HashMap::new();

        for node in graph.nodes() {
            let Some(method) = self.match_node(node) else {
                continue;
            };
            match positions.get(method) {
                Some(&i) => entries[i].occurrences.push(node.id),
                None => {
                    positions.insert(method, entries.len());
                    entries.push(RpcEntry {
                        method: method.clone(),
                        occurrences: vec![node.id],
                    });
                }
            }
        }

        debug!(
            entries = entries.len(),
            nodes = graph.nodes().len(),
            "matched rpc entries"
        );

        EntryMatches {
            entries,
            adjacency: graph.adjacency(),
        }
    }

    /// The declared method `node` implements, if its signature singles one out.
    pub fn match_node(&self, node: &CallGraphNode) -> Option<&'a RpcMethod> {
        if !self.catalog.contains_name(&node.name) {
            return None;
        }
        if !node.has_rpc_shape() || node.params[0].repr != CONTEXT_TYPE {
            return None;
        }

        let request = &node.params[1].repr;
        let response = &node.results[0].repr;
        let mut candidates = self.catalog.candidates(&node.name).filter(|m| {
            // A node declared in the generated package is the stub's own
            // interface method, not an implementation.
            node.package != m.generated_path
                && *request == m.qualified_input()
                && *response == m.qualified_output()
        });

        let first = candidates.next()?;
        match self.policy {
            MatchPolicy::FirstCandidate => Some(first),
            MatchPolicy::Strict => {
                if candidates.next().is_some() {
                    debug!(node = %node.name, "ambiguous rpc entry skipped");
                    None
                } else {
                    Some(first)
                }
            }
        }
    }
}
