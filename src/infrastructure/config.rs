//! Tracer configuration.
//!
//! Loaded once at startup from YAML, or TOML when the file ends in `.toml`.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::domain::entry_point::MatchPolicy;
use crate::error::{Result, TraceError};

pub const DEFAULT_CACHE_DIR: &str = ".service-tracer-cache";
pub const DEFAULT_ANALYZER: &str = "callgraph-dump";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub auth: Auth,
    pub services: Vec<ServiceConfig>,
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,
    #[serde(default)]
    pub analyzer: AnalyzerConfig,
    #[serde(default)]
    pub match_policy: MatchPolicy,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Auth {
    #[serde(default)]
    pub token: Token,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Token {
    /// Environment variable holding the clone token
    pub env: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
    pub repo: String,
    /// Program entry subpath; every `main` package is analyzed when absent
    #[serde(default)]
    pub entry: Option<String>,
    pub proto: ProtoConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtoConfig {
    pub repo: String,
    #[serde(default)]
    pub path: Vec<String>,
}

/// External whole-program analyzer producing call graphs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzerConfig {
    #[serde(default = "default_analyzer")]
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            command: default_analyzer(),
            args: Vec::new(),
        }
    }
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from(DEFAULT_CACHE_DIR)
}

fn default_analyzer() -> String {
    DEFAULT_ANALYZER.to_string()
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| {
            TraceError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        let is_toml = path.extension().is_some_and(|ext| ext == "toml");
        let config = if is_toml {
            Self::from_toml(&text)?
        } else {
            Self::from_yaml(&text)?
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml(text: &str) -> Result<Self> {
        serde_yaml_ng::from_str(text)
            .map_err(|e| TraceError::Config(format!("invalid YAML config: {}", e)))
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| TraceError::Config(format!("invalid TOML config: {}", e)))
    }

    pub fn validate(&self) -> Result<()> {
        if self.services.is_empty() {
            return Err(TraceError::Config("no services configured".to_string()));
        }
        let mut names = HashSet::new();
        for service in &self.services {
            if service.name.trim().is_empty() {
                return Err(TraceError::Config("service with empty name".to_string()));
            }
            if !names.insert(service.name.as_str()) {
                return Err(TraceError::Config(format!(
                    "duplicate service name: {}",
                    service.name
                )));
            }
            if service.repo.trim().is_empty() || service.proto.repo.trim().is_empty() {
                return Err(TraceError::Config(format!(
                    "service {} is missing a repository",
                    service.name
                )));
            }
        }
        Ok(())
    }

    /// Clone token read from the configured environment variable.
    pub fn auth_token(&self) -> Option<String> {
        let var = self.auth.token.env.as_deref()?;
        std::env::var(var).ok().filter(|t| !t.is_empty())
    }

    pub fn maps_dir(&self) -> PathBuf {
        self.cache_dir.join("maps")
    }
}

impl ServiceConfig {
    pub fn source_root(&self, cache_dir: &Path) -> PathBuf {
        cache_dir.join(repo_name(&self.repo))
    }

    pub fn proto_repo_root(&self, cache_dir: &Path) -> PathBuf {
        cache_dir.join(repo_name(&self.proto.repo))
    }

    pub fn proto_paths(&self, cache_dir: &Path) -> Vec<PathBuf> {
        let root = self.proto_repo_root(cache_dir);
        self.proto.path.iter().map(|p| root.join(p)).collect()
    }
}

/// Last path segment of a repository identifier.
pub fn repo_name(repo: &str) -> &str {
    repo.trim_end_matches('/').rsplit('/').next().unwrap_or(repo)
}
