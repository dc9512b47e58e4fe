use std::path::{Path, PathBuf};

use crate::domain::callgraph::CallGraph;
use crate::domain::method::RpcMethod;
use crate::domain::method_map::MethodMap;
use crate::domain::registry::ServiceRegistry;
use crate::error::Result;

pub mod dependency_exporter;

/// What whole-program analysis produced for one entry directory.
#[derive(Debug)]
pub enum AnalysisOutcome {
    Graph(CallGraph),
    /// Library-only code: nothing to analyze
    NoMainPackages,
    /// The source tree did not type-check; carries the reported errors
    TypeCheckFailed(Vec<String>),
}

pub trait CallGraphProvider {
    fn call_graph(&self, entry_dir: &Path) -> Result<AnalysisOutcome>;
}

pub trait CatalogProvider {
    /// Declared RPC methods of `service_name` found in the IDL files of `proto_dir`.
    fn methods(&self, service_name: &str, proto_dir: &Path) -> Result<Vec<RpcMethod>>;
}

pub trait RepositoryProvider {
    /// Make sure `repo` is checked out at `dest` and return its root.
    fn ensure(&self, repo: &str, dest: &Path) -> Result<PathBuf>;
}

pub trait DependencyRenderer {
    /// Render `map` and return the written artifacts.
    fn render(
        &mut self,
        map: &MethodMap,
        registry: &ServiceRegistry,
        output: &str,
    ) -> Result<Vec<PathBuf>>;
}
