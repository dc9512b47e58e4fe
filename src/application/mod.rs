use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::domain::catalog::MethodCatalog;
use crate::domain::entry_point::{MatchPolicy, RpcEntryMatcher};
use crate::domain::method_map::{merge_service_maps, MethodMap, MethodMapAssembler};
use crate::domain::registry::{ServiceDescriptor, ServiceRegistry};
use crate::domain::store::MethodMapStore;
use crate::infrastructure::config::Config;
use crate::infrastructure::project_loader::ProjectLoader;
use crate::ports::{
    AnalysisOutcome, CallGraphProvider, CatalogProvider, DependencyRenderer, RepositoryProvider,
};

pub struct TraceUsecase<'a> {
    pub repositories: &'a dyn RepositoryProvider,
    pub catalogs: &'a dyn CatalogProvider,
    pub call_graphs: &'a dyn CallGraphProvider,
    pub store: &'a dyn MethodMapStore,
    pub policy: MatchPolicy,
}

impl<'a> TraceUsecase<'a> {
    /// Clone, analyze every service, and render the fleet-wide method map.
    pub fn run(
        &self,
        config: &Config,
        renderer: &mut dyn DependencyRenderer,
        output: &str,
        refresh: bool,
    ) -> Result<Vec<PathBuf>> {
        self.clone_repositories(config)
            .context("failed to clone repository")?;
        let registry = self
            .build_registry(config)
            .context("failed to build service registry")?;
        let map = self
            .create_method_map(&registry, refresh)
            .context("failed to create method map")?;
        renderer
            .render(&map, &registry, output)
            .context("failed to render method map")
    }

    pub fn clone_repositories(&self, config: &Config) -> Result<()> {
        for service in &config.services {
            self.repositories
                .ensure(&service.repo, &service.source_root(&config.cache_dir))
                .with_context(|| format!("failed to clone source of {}", service.name))?;
            self.repositories
                .ensure(&service.proto.repo, &service.proto_repo_root(&config.cache_dir))
                .with_context(|| format!("failed to clone protos of {}", service.name))?;
        }
        Ok(())
    }

    /// Parse every service's IDL files into a registry.
    pub fn build_registry(&self, config: &Config) -> Result<ServiceRegistry> {
        let mut services = Vec::with_capacity(config.services.len());
        for service in &config.services {
            let proto_roots = service.proto_paths(&config.cache_dir);
            let mut methods = Vec::new();
            for dir in &proto_roots {
                let found = self
                    .catalogs
                    .methods(&service.name, dir)
                    .with_context(|| format!("failed to parse protos of {}", service.name))?;
                methods.extend(found);
            }
            debug!(service = %service.name, methods = methods.len(), "declared methods");
            services.push(ServiceDescriptor {
                name: service.name.clone(),
                repo: service.repo.clone(),
                source_root: service.source_root(&config.cache_dir),
                proto_roots,
                entry: service.entry.clone(),
                catalog: MethodCatalog::new(methods),
            });
        }
        Ok(ServiceRegistry::new(services))
    }

    /// Per service: load-or-compute the structural map, then re-resolve
    /// service names against `registry`, then merge.
    pub fn create_method_map(&self, registry: &ServiceRegistry, refresh: bool) -> Result<MethodMap> {
        let assembler = MethodMapAssembler::new(registry);
        let mut maps = Vec::with_capacity(registry.services().len());
        for service in registry.services() {
            if refresh {
                self.store
                    .invalidate(&service.name)
                    .with_context(|| format!("failed to invalidate cache of {}", service.name))?;
            }
            let structural = self.load_or_compute(service, registry)?;
            maps.push((
                service.name.clone(),
                assembler.resolve_names(&structural, &service.name),
            ));
        }
        Ok(merge_service_maps(maps))
    }

    pub fn load_or_compute(
        &self,
        service: &ServiceDescriptor,
        registry: &ServiceRegistry,
    ) -> Result<MethodMap> {
        let cached = self
            .store
            .load(&service.name)
            .with_context(|| format!("failed to read maps cache of {}", service.name))?;
        if let Some(map) = cached {
            info!(service = %service.name, entries = map.len(), "using cached method map");
            return Ok(map);
        }

        let map = self
            .analyze_service(service, registry)
            .with_context(|| format!("failed to analyze {}", service.name))?;
        self.store
            .save(&service.name, &map)
            .with_context(|| format!("failed to write maps cache of {}", service.name))?;
        Ok(map)
    }

    /// Build the structural method map of one service from its call graphs.
    pub fn analyze_service(
        &self,
        service: &ServiceDescriptor,
        registry: &ServiceRegistry,
    ) -> Result<MethodMap> {
        info!(service = %service.name, "analyzing");
        let mut map = MethodMap::new();
        if service.catalog.is_empty() {
            warn!(service = %service.name, "no declared rpc methods");
            return Ok(map);
        }

        let entries = ProjectLoader::discover_entries(&service.source_root, service.entry.as_deref())?;
        let matcher = RpcEntryMatcher::new(&service.catalog).with_policy(self.policy);
        let assembler = MethodMapAssembler::new(registry);

        for dir in entries {
            let outcome = self
                .call_graphs
                .call_graph(&dir)
                .with_context(|| format!("failed to create callgraph for {}", dir.display()))?;
            match outcome {
                AnalysisOutcome::Graph(graph) => {
                    let matches = matcher.match_graph(&graph);
                    map.absorb(assembler.assemble(service, &graph, &matches));
                }
                AnalysisOutcome::NoMainPackages => {
                    warn!(
                        service = %service.name,
                        entry = %dir.display(),
                        "no main package, nothing to analyze"
                    );
                }
                AnalysisOutcome::TypeCheckFailed(errors) => {
                    warn!(
                        service = %service.name,
                        entry = %dir.display(),
                        errors = errors.len(),
                        first = errors.first().map(String::as_str).unwrap_or(""),
                        "source does not type-check; its dependencies are not traced"
                    );
                }
            }
        }

        info!(service = %service.name, methods = map.len(), "analyzed");
        Ok(map)
    }
}
