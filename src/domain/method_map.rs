//! Method Map Assembly
//!
//! Turns resolved boundary nodes into the per-method dependency lists that
//! are cached per service and merged into one fleet-wide map.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::domain::callgraph::{CallGraph, CallGraphNode, NodeId};
use crate::domain::downstream::DownstreamResolver;
use crate::domain::entry_point::{EntryMatches, RpcEntry};
use crate::domain::method::{strip_package_path, RpcMethod};
use crate::domain::registry::{ServiceDescriptor, ServiceRegistry};

/// Downstream methods of one declared RPC.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MethodMapEntry {
    /// Link to the handler implementation, first known occurrence wins
    pub source_url: Option<String>,
    /// Ordered, deduplicated by canonical key
    pub methods: Vec<RpcMethod>,
}

impl MethodMapEntry {
    /// Appends `method` unless one with the same canonical key is present.
    pub fn push_unique(&mut self, method: RpcMethod) -> bool {
        let key = method.canonical_key();
        if self.methods.iter().any(|m| m.canonical_key() == key) {
            return false;
        }
        self.methods.push(method);
        true
    }
}

/// Canonical key -> downstream methods.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MethodMap {
    entries: BTreeMap<String, MethodMapEntry>,
}

impl MethodMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&MethodMapEntry> {
        self.entries.get(key)
    }

    pub fn insert(&mut self, key: String, entry: MethodMapEntry) -> Option<MethodMapEntry> {
        self.entries.insert(key, entry)
    }

    pub fn entry_mut(&mut self, key: &str) -> &mut MethodMapEntry {
        self.entries.entry(key.to_string()).or_default()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &MethodMapEntry)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Fold in another map of the same service: downstream lists are
    /// unioned and the first known source location is kept.
    pub fn absorb(&mut self, other: MethodMap) {
        for (key, entry) in other.entries {
            let slot = self.entry_mut(&key);
            if slot.source_url.is_none() {
                slot.source_url = entry.source_url;
            }
            for method in entry.methods {
                slot.push_unique(method);
            }
        }
    }

    /// Union with `other`. Keys already present keep their entry; the
    /// colliding keys are returned.
    pub fn merge(&mut self, other: MethodMap) -> Vec<String> {
        let mut collisions = Vec::new();
        for (key, entry) in other.entries {
            if self.entries.contains_key(&key) {
                collisions.push(key);
            } else {
                self.entries.insert(key, entry);
            }
        }
        collisions
    }
}

/// Builds method maps for the services of one registry.
pub struct MethodMapAssembler<'r> {
    registry: &'r ServiceRegistry,
}

impl<'r> MethodMapAssembler<'r> {
    pub fn new(registry: &'r ServiceRegistry) -> Self {
        Self { registry }
    }

    /// Resolve every matched entry of `service` and collect its boundary calls.
    pub fn assemble(
        &self,
        service: &ServiceDescriptor,
        graph: &CallGraph,
        matches: &EntryMatches,
    ) -> MethodMap {
        let resolver = DownstreamResolver::new(graph, &matches.adjacency, &service.repo);
        let mut map = MethodMap::new();
        for entry in &matches.entries {
            let boundary = resolver.resolve(entry);
            self.add_entry(&mut map, service, graph, entry, &boundary);
        }
        map
    }

    /// Merge the boundary nodes of `entry` into `map` under its canonical key.
    pub fn add_entry(
        &self,
        map: &mut MethodMap,
        service: &ServiceDescriptor,
        graph: &CallGraph,
        entry: &RpcEntry,
        boundary: &[NodeId],
    ) {
        let slot = map.entry_mut(&entry.method.canonical_key());
        if slot.source_url.is_none() {
            slot.source_url = entry
                .occurrences
                .iter()
                .filter_map(|&id| graph.node(id)?.location.as_ref())
                .find_map(|loc| service.source_url(loc));
        }
        for node in boundary.iter().filter_map(|&id| graph.node(id)) {
            slot.push_unique(self.boundary_method(node));
        }
    }

    /// The RPC method a boundary node stands for.
    pub fn boundary_method(&self, node: &CallGraphNode) -> RpcMethod {
        let input_type = node
            .params
            .get(1)
            .map(|t| strip_package_path(&t.repr))
            .unwrap_or_default();
        let output_type = if node.results.len() > 1 {
            strip_package_path(&node.results[0].repr)
        } else {
            ""
        };
        RpcMethod::new(
            self.registry.service_name_by_generated_path(&node.package),
            node.package.clone(),
            node.name.clone(),
            input_type,
            output_type,
        )
    }

    /// Refresh owning-service names against the current registry and drop
    /// self references and methods owned by `owner`.
    ///
    /// Cached maps outlive registry edits, so this always reruns.
    pub fn resolve_names(&self, map: &MethodMap, owner: &str) -> MethodMap {
        let mut resolved = MethodMap::new();
        for (key, entry) in map.iter() {
            let mut seen: HashSet<String> = HashSet::new();
            let methods = entry
                .methods
                .iter()
                .map(|m| {
                    let mut m = m.clone();
                    m.service = self
                        .registry
                        .service_name_by_generated_path(&m.generated_path)
                        .to_string();
                    m
                })
                .filter(|m| m.service != owner)
                .filter(|m| m.canonical_key() != *key)
                .filter(|m| seen.insert(m.canonical_key()))
                .collect();
            resolved.insert(
                key.clone(),
                MethodMapEntry {
                    source_url: entry.source_url.clone(),
                    methods,
                },
            );
        }
        resolved
    }
}

/// Union of per-service maps; the first service to claim a key keeps it.
pub fn merge_service_maps(maps: Vec<(String, MethodMap)>) -> MethodMap {
    let mut global = MethodMap::new();
    let mut owners: BTreeMap<String, String> = BTreeMap::new();
    for (service, map) in maps {
        let keys: Vec<String> = map.iter().map(|(k, _)| k.clone()).collect();
        for key in global.merge(map) {
            warn!(
                key = %key,
                kept = owners.get(&key).map(String::as_str).unwrap_or("?"),
                dropped = %service,
                "canonical key declared by more than one service"
            );
        }
        for key in keys {
            owners.entry(key).or_insert_with(|| service.clone());
        }
    }
    global
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::callgraph::TypeRef;
    use crate::domain::catalog::MethodCatalog;
    use std::path::PathBuf;

    const PAY: &str = "github.com/acme/protos/gen/payments";

    fn registry() -> ServiceRegistry {
        let svc = |name: &str, gp: &str, method: &str| ServiceDescriptor {
            name: name.to_string(),
            repo: format!("github.com/acme/{}", name),
            source_root: PathBuf::from(format!("/cache/{}", name)),
            proto_roots: vec![],
            entry: None,
            catalog: MethodCatalog::new(vec![RpcMethod::new(
                name,
                gp,
                method,
                format!("{}Request", method),
                format!("{}Response", method),
            )]),
        };
        ServiceRegistry::new(vec![
            svc("orders", "github.com/acme/protos/gen/orders", "CreateOrder"),
            svc("payments", PAY, "Charge"),
        ])
    }

    fn stub(id: NodeId, name: &str) -> CallGraphNode {
        CallGraphNode {
            id,
            name: name.to_string(),
            package: PAY.to_string(),
            receiver: None,
            params: vec![
                TypeRef::new("context.Context", Some("context")),
                TypeRef::pointer_to(PAY, &format!("{}Request", name)),
            ],
            results: vec![
                TypeRef::pointer_to(PAY, &format!("{}Response", name)),
                TypeRef::new("error", None),
            ],
            location: None,
            synthetic: false,
        }
    }

    #[test]
    fn test_boundary_method_resolves_owner() {
        let registry = registry();
        let m = MethodMapAssembler::new(&registry).boundary_method(&stub(1, "Charge"));
        assert_eq!(m.service, "payments");
        assert_eq!(m.input_type, "ChargeRequest");
        assert_eq!(m.output_type, "ChargeResponse");
        assert_eq!(m.generated_path, PAY);
    }

    #[test]
    fn test_push_unique_dedupes_by_key() {
        let mut entry = MethodMapEntry::default();
        assert!(entry.push_unique(RpcMethod::new("payments", PAY, "Charge", "ChargeRequest", "ChargeResponse")));
        assert!(!entry.push_unique(RpcMethod::new("payments", "other/path", "charge", "chargeRequest", "ChargeResponse")));
        assert_eq!(entry.methods.len(), 1);
    }

    #[test]
    fn test_resolve_names_refreshes_and_drops_own_service() {
        let registry = registry();
        let mut map = MethodMap::new();
        let entry = map.entry_mut("createorder.createorderrequest.createorderresponse");
        entry.methods.push(RpcMethod::new("stale-name", PAY, "Charge", "ChargeRequest", "ChargeResponse"));
        entry.methods.push(RpcMethod::new(
            "orders",
            "github.com/acme/protos/gen/orders",
            "GetOrder",
            "GetOrderRequest",
            "GetOrderResponse",
        ));

        let resolved = MethodMapAssembler::new(&registry).resolve_names(&map, "orders");
        let methods = &resolved
            .get("createorder.createorderrequest.createorderresponse")
            .unwrap()
            .methods;
        assert_eq!(methods.len(), 1);
        assert_eq!(methods[0].service, "payments");
    }

    #[test]
    fn test_merge_keeps_first_owner() {
        let mut a = MethodMap::new();
        a.entry_mut("get.req.resp").source_url = Some("a".to_string());
        let mut b = MethodMap::new();
        b.entry_mut("get.req.resp").source_url = Some("b".to_string());
        b.entry_mut("put.req.resp");

        let global = merge_service_maps(vec![("a".to_string(), a), ("b".to_string(), b)]);
        assert_eq!(global.len(), 2);
        assert_eq!(global.get("get.req.resp").unwrap().source_url.as_deref(), Some("a"));
    }
}
