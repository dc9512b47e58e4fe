use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::domain::method::RpcMethod;
use crate::domain::method_map::MethodMap;
use crate::domain::registry::ServiceRegistry;

#[derive(Debug, Serialize, Deserialize)]
pub struct GraphDto {
    pub nodes: Vec<NodeDto>,
    pub edges: Vec<EdgeDto>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct NodeDto {
    pub id: String,
    pub label: String,
    pub service: String,
    /// Whether the method's handler was found and traced
    pub analyzed: bool,
    pub source_url: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct EdgeDto {
    pub from: String,
    pub to: String,
    pub type_: String,
}

impl GraphDto {
    /// Declared methods grouped by service, plus every downstream method
    /// no service declares; one edge per discovered dependency.
    pub fn from_method_map(map: &MethodMap, registry: &ServiceRegistry) -> Self {
        let mut nodes = Vec::new();
        let mut edges = Vec::new();
        let mut known: HashSet<String> = HashSet::new();

        for service in registry.services() {
            for method in service.catalog.methods() {
                let id = node_id(&service.name, method);
                if !known.insert(id.clone()) {
                    continue;
                }
                let entry = map.get(&method.canonical_key());
                nodes.push(NodeDto {
                    id,
                    label: format!("{}.{}", service.name, method.name),
                    service: service.name.clone(),
                    analyzed: entry.is_some(),
                    source_url: entry.and_then(|e| e.source_url.clone()),
                });
            }
        }

        for service in registry.services() {
            for method in service.catalog.methods() {
                let Some(entry) = map.get(&method.canonical_key()) else {
                    continue;
                };
                let from = node_id(&service.name, method);
                for callee in &entry.methods {
                    let to = node_id(&callee.service, callee);
                    if known.insert(to.clone()) {
                        nodes.push(NodeDto {
                            id: to.clone(),
                            label: callee.display_name(),
                            service: callee.service.clone(),
                            analyzed: map.get(&callee.canonical_key()).is_some(),
                            source_url: None,
                        });
                    }
                    edges.push(EdgeDto {
                        from: from.clone(),
                        to,
                        type_: "rpc".to_string(),
                    });
                }
            }
        }

        GraphDto { nodes, edges }
    }
}

fn node_id(service: &str, method: &RpcMethod) -> String {
    format!("{}/{}", service, method.canonical_key())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::catalog::MethodCatalog;
    use crate::domain::registry::ServiceDescriptor;
    use std::path::PathBuf;

    #[test]
    fn test_graph_dto_nodes_and_edges() {
        let create = RpcMethod::new("orders", "gen/orders", "CreateOrder", "CreateOrderRequest", "CreateOrderResponse");
        let charge = RpcMethod::new("payments", "gen/payments", "Charge", "ChargeRequest", "ChargeResponse");
        let svc = |name: &str, m: &RpcMethod| ServiceDescriptor {
            name: name.to_string(),
            repo: format!("github.com/acme/{}", name),
            source_root: PathBuf::from(name),
            proto_roots: vec![],
            entry: None,
            catalog: MethodCatalog::new(vec![m.clone()]),
        };
        let registry = ServiceRegistry::new(vec![svc("orders", &create), svc("payments", &charge)]);

        let mut map = MethodMap::new();
        map.entry_mut(&create.canonical_key()).methods.push(charge.clone());

        let dto = GraphDto::from_method_map(&map, &registry);
        assert_eq!(dto.nodes.len(), 2);
        assert!(dto.nodes[0].analyzed);
        assert!(!dto.nodes[1].analyzed);
        assert_eq!(dto.edges.len(), 1);
        assert_eq!(dto.edges[0].from, "orders/createorder.createorderrequest.createorderresponse");
        assert_eq!(dto.edges[0].to, "payments/charge.chargerequest.chargeresponse");

        let json = serde_json::to_string(&dto).unwrap();
        assert!(json.contains("\"type_\":\"rpc\""));
    }
}
