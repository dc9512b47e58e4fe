/// Source Repository Provider.
///
/// Clones repositories into the tracer cache directory with the `git` CLI,
/// skipping any that are already present.

use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::{debug, info};

use crate::error::{Result, TraceError};
use crate::ports::RepositoryProvider;

pub struct GitRepositoryProvider {
    token: Option<String>,
}

impl GitRepositoryProvider {
    pub fn new(token: Option<String>) -> Self {
        Self { token }
    }

    /// Build the command that would clone `repo` into `dest`.
    pub fn build_command_spec(&self, repo: &str, dest: &Path) -> CloneCommandSpec {
        CloneCommandSpec {
            program: "git".to_string(),
            args: vec![
                "clone".to_string(),
                "--quiet".to_string(),
                clone_url(self.token.as_deref(), repo),
                dest.to_string_lossy().to_string(),
            ],
        }
    }
}

impl RepositoryProvider for GitRepositoryProvider {
    fn ensure(&self, repo: &str, dest: &Path) -> Result<PathBuf> {
        if dest.exists() {
            debug!(repo, dest = %dest.display(), "repository already cloned");
            return Ok(dest.to_path_buf());
        }
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)?;
        }

        info!(repo, "cloning");
        let spec = self.build_command_spec(repo, dest);
        let output = Command::new(&spec.program)
            .args(&spec.args)
            .output()
            .map_err(|e| TraceError::Repository {
                repo: repo.to_string(),
                reason: format!("failed to execute git: {}", e),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let reason = match &self.token {
                Some(token) => stderr.replace(token.as_str(), "***"),
                None => stderr.to_string(),
            };
            return Err(TraceError::Repository {
                repo: repo.to_string(),
                reason: reason.trim().to_string(),
            });
        }
        Ok(dest.to_path_buf())
    }
}

/// Describes a clone invocation without running it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloneCommandSpec {
    pub program: String,
    pub args: Vec<String>,
}

/// HTTPS clone URL, with the token as userinfo when one is set.
pub fn clone_url(token: Option<&str>, repo: &str) -> String {
    match token {
        Some(token) => format!("https://{}@{}.git", token, repo),
        None => format!("https://{}.git", repo),
    }
}
