// Command-line entry point for service-tracer.

use std::collections::BTreeSet;
use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use service_tracer::application::TraceUsecase;
use service_tracer::domain::store::DiskMapStore;
use service_tracer::infrastructure::{
    CommandCallGraphProvider, Config, GitRepositoryProvider, ProtoCatalogProvider,
};
use service_tracer::ports::dependency_exporter::DotRenderer;

#[derive(Parser, Debug)]
#[command(author, version, about = "Trace cross-service RPC dependencies", long_about = None)]
struct Cli {
    /// Service configuration (YAML, or TOML by extension)
    #[arg(short, long)]
    config: PathBuf,

    /// Output base path; writes <output>.dot and <output>.json
    #[arg(short, long, default_value = "trace")]
    output: String,

    /// Ignore cached method maps and re-analyze every service
    #[arg(long)]
    refresh: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "service_tracer=info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = Config::load(&cli.config).context("failed to load configuration")?;

    let maps_dir = config.maps_dir();
    fs::create_dir_all(&maps_dir)
        .with_context(|| format!("failed to create {}", maps_dir.display()))?;

    let repositories = GitRepositoryProvider::new(config.auth_token());
    let proto_roots: BTreeSet<PathBuf> = config
        .services
        .iter()
        .map(|s| s.proto_repo_root(&config.cache_dir))
        .collect();
    let catalogs = proto_roots
        .into_iter()
        .fold(ProtoCatalogProvider::new(), |p, root| p.with_include_root(root));
    let call_graphs =
        CommandCallGraphProvider::new(&config.analyzer.command, config.analyzer.args.clone());
    let store = DiskMapStore::new(&maps_dir).context("failed to open maps cache")?;

    let usecase = TraceUsecase {
        repositories: &repositories,
        catalogs: &catalogs,
        call_graphs: &call_graphs,
        store: &store,
        policy: config.match_policy,
    };
    let mut renderer = DotRenderer::new();
    let written = usecase.run(&config, &mut renderer, &cli.output, cli.refresh)?;

    for path in written {
        info!(path = %path.display(), "wrote");
    }
    Ok(())
}
