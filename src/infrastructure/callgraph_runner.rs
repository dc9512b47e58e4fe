//! Call Graph Provider backed by an external analyzer.
//!
//! The analyzer is run once per entry directory (passed as its last
//! argument) and prints a JSON report on stdout:
//!
//! ```json
//! { "main_packages": ["github.com/acme/orders/cmd/server"],
//!   "errors": [],
//!   "nodes": [{ "id": 0, "name": "CreateOrder", "package": "...", ... }],
//!   "edges": [{ "caller": 0, "callee": 1 }] }
//! ```

use std::path::Path;
use std::process::Command;

use serde::Deserialize;
use tracing::{debug, info};

use crate::domain::callgraph::{CallEdge, CallGraph, CallGraphNode};
use crate::error::{Result, TraceError};
use crate::ports::{AnalysisOutcome, CallGraphProvider};

// ═══════════════════════════════════════════════════════════════════════════
// Wire format
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Debug, Deserialize)]
struct AnalysisReport {
    #[serde(default)]
    main_packages: Vec<String>,
    #[serde(default)]
    errors: Vec<String>,
    #[serde(default)]
    nodes: Vec<CallGraphNode>,
    #[serde(default)]
    edges: Vec<CallEdge>,
}

/// Decode an analyzer report. Type errors take precedence over everything else.
pub fn parse_report(bytes: &[u8], entry_dir: &Path) -> Result<AnalysisOutcome> {
    let report: AnalysisReport =
        serde_json::from_slice(bytes).map_err(|e| TraceError::Analysis {
            path: entry_dir.display().to_string(),
            reason: format!("invalid analyzer output: {}", e),
        })?;
    if !report.errors.is_empty() {
        return Ok(AnalysisOutcome::TypeCheckFailed(report.errors));
    }
    if report.main_packages.is_empty() {
        return Ok(AnalysisOutcome::NoMainPackages);
    }
    Ok(AnalysisOutcome::Graph(CallGraph::from_parts(
        report.nodes,
        report.edges,
    )))
}

// ═══════════════════════════════════════════════════════════════════════════
// Provider
// ═══════════════════════════════════════════════════════════════════════════

pub struct CommandCallGraphProvider {
    program: String,
    args: Vec<String>,
}

impl CommandCallGraphProvider {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Describes the command that would be run for `entry_dir`.
    pub fn build_command_spec(&self, entry_dir: &Path) -> AnalyzerCommandSpec {
        let mut args = self.args.clone();
        args.push(entry_dir.to_string_lossy().to_string());
        AnalyzerCommandSpec {
            program: self.program.clone(),
            args,
        }
    }
}

impl CallGraphProvider for CommandCallGraphProvider {
    fn call_graph(&self, entry_dir: &Path) -> Result<AnalysisOutcome> {
        let spec = self.build_command_spec(entry_dir);
        info!(entry = %entry_dir.display(), analyzer = %spec.program, "building call graph");

        let output = Command::new(&spec.program)
            .args(&spec.args)
            .current_dir(entry_dir)
            .output()
            .map_err(|e| TraceError::Analysis {
                path: entry_dir.display().to_string(),
                reason: format!("failed to execute {}: {}", spec.program, e),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(TraceError::Analysis {
                path: entry_dir.display().to_string(),
                reason: format!(
                    "{} exited with {:?}: {}",
                    spec.program,
                    output.status.code(),
                    stderr.trim()
                ),
            });
        }

        let outcome = parse_report(&output.stdout, entry_dir)?;
        if let AnalysisOutcome::Graph(graph) = &outcome {
            debug!(nodes = graph.nodes().len(), edges = graph.edges().len(), "call graph loaded");
        }
        Ok(outcome)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalyzerCommandSpec {
    pub program: String,
    pub args: Vec<String>,
}
