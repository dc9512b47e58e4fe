// Call graph structures for Service Tracer.
// Nodes are functions of one analyzed program, edges are possible calls.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::domain::method::is_exported;

/// Stable integer id assigned by the call graph provider.
pub type NodeId = usize;

/// A type as it appears in a function signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeRef {
    /// Rendered type, e.g. `*github.com/acme/protos/gen/payments.ChargeRequest`
    #[serde(rename = "type")]
    pub repr: String,
    /// Package declaring the named (pointee) type; absent for builtins
    #[serde(default)]
    pub package: Option<String>,
}

impl TypeRef {
    pub fn new(repr: impl Into<String>, package: Option<&str>) -> Self {
        Self {
            repr: repr.into(),
            package: package.map(str::to_string),
        }
    }

    /// Pointer to a named type declared in `package`.
    pub fn pointer_to(package: &str, name: &str) -> Self {
        Self::new(format!("*{}.{}", package, name), Some(package))
    }

    pub fn package_path(&self) -> &str {
        self.package.as_deref().unwrap_or("")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLocation {
    pub file: String,
    pub line: u32,
}

/// A function in the call graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallGraphNode {
    pub id: NodeId,
    pub name: String,
    /// Package path declaring the function
    pub package: String,
    #[serde(default)]
    pub receiver: Option<TypeRef>,
    #[serde(default)]
    pub params: Vec<TypeRef>,
    #[serde(default)]
    pub results: Vec<TypeRef>,
    #[serde(default)]
    pub location: Option<SourceLocation>,
    /// Wrappers and thunks introduced by the analysis itself
    #[serde(default)]
    pub synthetic: bool,
}

impl CallGraphNode {
    /// `(ctx, request, ...) (response, error, ...)`: two parameters and two results at least.
    pub fn has_rpc_shape(&self) -> bool {
        self.params.len() >= 2 && self.results.len() >= 2
    }

    pub fn is_exported(&self) -> bool {
        is_exported(&self.name)
    }

    pub fn receiver_package(&self) -> Option<&str> {
        self.receiver.as_ref().and_then(|r| r.package.as_deref())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallEdge {
    pub caller: NodeId,
    pub callee: NodeId,
}

/// The whole-program call graph of one entry path.
#[derive(Debug, Clone, Default)]
pub struct CallGraph {
    nodes: Vec<CallGraphNode>,
    edges: Vec<CallEdge>,
    index: HashMap<NodeId, usize>,
}

impl CallGraph {
    /// Build a graph, dropping synthetic nodes and every edge touching them.
    pub fn from_parts(nodes: Vec<CallGraphNode>, edges: Vec<CallEdge>) -> Self {
        let nodes: Vec<CallGraphNode> = nodes.into_iter().filter(|n| !n.synthetic).collect();
        let index: HashMap<NodeId, usize> =
            nodes.iter().enumerate().map(|(i, n)| (n.id, i)).collect();
        let edges = edges
            .into_iter()
            .filter(|e| index.contains_key(&e.caller) && index.contains_key(&e.callee))
            .collect();
        Self { nodes, edges, index }
    }

    pub fn nodes(&self) -> &[CallGraphNode] {
        &self.nodes
    }

    pub fn edges(&self) -> &[CallEdge] {
        &self.edges
    }

    pub fn node(&self, id: NodeId) -> Option<&CallGraphNode> {
        self.index.get(&id).map(|&i| &self.nodes[i])
    }

    /// Caller -> callees list, callees in edge order without repeats.
    pub fn adjacency(&self) -> Adjacency {
        let mut callees: HashMap<NodeId, Vec<NodeId>> = HashMap::new();
        let mut seen: HashSet<(NodeId, NodeId)> = HashSet::new();
        for edge in &self.edges {
            if seen.insert((edge.caller, edge.callee)) {
                callees.entry(edge.caller).or_default().push(edge.callee);
            }
        }
        Adjacency { callees }
    }
}

/// Outgoing edges per caller.
#[derive(Debug, Clone, Default)]
pub struct Adjacency {
    callees: HashMap<NodeId, Vec<NodeId>>,
}

impl Adjacency {
    pub fn callees(&self, caller: NodeId) -> &[NodeId] {
        self.callees.get(&caller).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn edge_count(&self) -> usize {
        self.callees.values().map(Vec::len).sum()
    }
}
