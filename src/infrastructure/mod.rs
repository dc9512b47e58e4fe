// Infrastructure implementations for Service Tracer.

pub mod callgraph_runner;
pub mod config;
pub mod project_loader;
pub mod proto_catalog;
pub mod repository;

pub use callgraph_runner::CommandCallGraphProvider;
pub use config::Config;
pub use project_loader::ProjectLoader;
pub use proto_catalog::ProtoCatalogProvider;
pub use repository::GitRepositoryProvider;
