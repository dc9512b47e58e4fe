//! Service Registry
//!
//! Maps service names to their source trees and declared RPC catalogs, and
//! maps generated package paths back to the service that declares them.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::domain::callgraph::SourceLocation;
use crate::domain::catalog::MethodCatalog;

/// One service of the traced fleet.
#[derive(Debug, Clone)]
pub struct ServiceDescriptor {
    pub name: String,
    /// Source repository identifier, e.g. `github.com/acme/orders`
    pub repo: String,
    /// Local checkout of `repo`
    pub source_root: PathBuf,
    /// Directories holding this service's IDL files
    pub proto_roots: Vec<PathBuf>,
    /// Explicit program entry subpath, relative to `source_root`
    pub entry: Option<String>,
    pub catalog: MethodCatalog,
}

impl ServiceDescriptor {
    /// Browsable link to `location`, when it lies inside this service's checkout.
    pub fn source_url(&self, location: &SourceLocation) -> Option<String> {
        let file = Path::new(&location.file);
        let sub_path = file.strip_prefix(&self.source_root).ok().or_else(|| {
            let absolute = self.source_root.canonicalize().ok()?;
            file.strip_prefix(absolute).ok()
        })?;
        let sub_path = sub_path.to_string_lossy().replace('\\', "/");
        Some(format!(
            "https://{}/blob/master/{}#L{}",
            self.repo, sub_path, location.line
        ))
    }
}

#[derive(Debug, Clone, Default)]
pub struct ServiceRegistry {
    services: Vec<ServiceDescriptor>,
    by_generated_path: HashMap<String, String>,
}

impl ServiceRegistry {
    pub fn new(services: Vec<ServiceDescriptor>) -> Self {
        let mut by_generated_path = HashMap::new();
        for service in &services {
            for method in service.catalog.methods() {
                // First service in configuration order claims the path.
                by_generated_path
                    .entry(method.generated_path.clone())
                    .or_insert_with(|| service.name.clone());
            }
        }
        Self {
            services,
            by_generated_path,
        }
    }

    pub fn services(&self) -> &[ServiceDescriptor] {
        &self.services
    }

    /// Owning service of a generated package, or the path itself as a fallback label.
    pub fn service_name_by_generated_path<'a>(&'a self, path: &'a str) -> &'a str {
        self.by_generated_path
            .get(path)
            .map(String::as_str)
            .unwrap_or(path)
    }
}
