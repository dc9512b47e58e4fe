use std::collections::HashMap;

use crate::domain::method::RpcMethod;

/// Declared RPC methods of one service, grouped by simple name.
#[derive(Debug, Clone, Default)]
pub struct MethodCatalog {
    methods: Vec<RpcMethod>,
    by_name: HashMap<String, Vec<usize>>,
}

impl MethodCatalog {
    pub fn new(methods: Vec<RpcMethod>) -> Self {
        let mut by_name: HashMap<String, Vec<usize>> = HashMap::new();
        for (i, m) in methods.iter().enumerate() {
            by_name.entry(m.name.clone()).or_default().push(i);
        }
        Self { methods, by_name }
    }

    pub fn methods(&self) -> &[RpcMethod] {
        &self.methods
    }

    pub fn contains_name(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// Declared methods sharing `name`, in declaration order.
    pub fn candidates<'a>(&'a self, name: &str) -> impl Iterator<Item = &'a RpcMethod> + 'a {
        self.by_name
            .get(name)
            .into_iter()
            .flatten()
            .map(move |&i| &self.methods[i])
    }

    pub fn len(&self) -> usize {
        self.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_candidates_grouped_by_name() {
        let catalog = MethodCatalog::new(vec![
            RpcMethod::new("orders", "gen/orders", "Get", "GetOrderRequest", "Order"),
            RpcMethod::new("orders", "gen/orders", "Create", "CreateOrderRequest", "Order"),
            RpcMethod::new("orders", "gen/orders/v2", "Get", "GetOrderRequest", "Order"),
        ]);
        let gets: Vec<_> = catalog.candidates("Get").map(|m| m.generated_path.as_str()).collect();
        assert_eq!(gets, vec!["gen/orders", "gen/orders/v2"]);
        assert!(catalog.contains_name("Create"));
        assert_eq!(catalog.candidates("Delete").count(), 0);
        assert_eq!(catalog.len(), 3);
    }
}
