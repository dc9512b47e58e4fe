//! Dependency Graph Exporter
//!
//! Renders the method map as Graphviz DOT (one cluster per service) and as a
//! JSON node/edge report.

use std::collections::HashSet;
use std::path::PathBuf;

use tracing::info;

use crate::api::dto::GraphDto;
use crate::domain::method::RpcMethod;
use crate::domain::method_map::MethodMap;
use crate::domain::registry::{ServiceDescriptor, ServiceRegistry};
use crate::error::{Result, TraceError};
use crate::ports::DependencyRenderer;

/// Fill colour of methods whose handler was never found.
const UNANALYZED_COLOR: &str = "#c9c9c9";

const EDGE_COLORS: [&str; 7] = [
    "#c71585", // MediumVioletRed
    "#dc143c", // Crimson
    "#ff4500", // OrangeRed
    "#006400", // DarkGreen
    "#00ced1", // DarkTurquoise
    "#4169e1", // RoyalBlue
    "#9400d3", // DarkViolet
];

/// Cycles through the edge colours.
#[derive(Debug, Default)]
pub struct Palette {
    index: usize,
}

impl Palette {
    pub fn next_color(&mut self) -> &'static str {
        let color = EDGE_COLORS[self.index % EDGE_COLORS.len()];
        self.index = (self.index + 1) % EDGE_COLORS.len();
        color
    }
}

#[derive(Debug, Default)]
pub struct DotRenderer {
    palette: Palette,
    next_id: usize,
}

impl DotRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Convert the method map to a DOT string.
    pub fn to_dot(&mut self, map: &MethodMap, registry: &ServiceRegistry) -> String {
        let mut lines = Vec::new();

        lines.push("digraph ServiceDependencies {".to_string());
        lines.push("    rankdir=LR;".to_string());
        lines.push("    newrank=true;".to_string());
        lines.push("    node [shape=box, fontname=\"Helvetica\", fontsize=12];".to_string());
        lines.push("    edge [fontname=\"Helvetica\", fontsize=10];".to_string());

        for service in registry.services() {
            lines.push(String::new());
            lines.push(format!(
                "    subgraph \"cluster_{}\" {{",
                escape_label(&service.name)
            ));
            lines.push(format!("        label=\"{}\";", escape_label(&service.name)));
            self.render_service(&mut lines, service, map);
            lines.push("    }".to_string());
        }

        lines.push("}".to_string());
        lines.join("\n")
    }

    fn render_service(&mut self, lines: &mut Vec<String>, service: &ServiceDescriptor, map: &MethodMap) {
        for method in service.catalog.methods() {
            let from = self.unique_id();
            let label = format!("{}.{}", service.name, method.name);
            match map.get(&method.canonical_key()) {
                Some(entry) => {
                    lines.push(node_line(&from, &label, entry.source_url.as_deref(), None));
                    // Each declared method gets its own tree.
                    let mut edge_names = HashSet::new();
                    self.render_calls(lines, &service.name, &mut edge_names, &from, method, map);
                }
                None => lines.push(node_line(&from, &label, None, Some(UNANALYZED_COLOR))),
            }
        }
    }

    /// Emit `from`'s downstream calls and follow them transitively.
    fn render_calls(
        &mut self,
        lines: &mut Vec<String>,
        service: &str,
        edge_names: &mut HashSet<String>,
        from_id: &str,
        from: &RpcMethod,
        map: &MethodMap,
    ) {
        let Some(entry) = map.get(&from.canonical_key()) else {
            return;
        };
        let from_name = format!("{}.{}", from.service, from.name);
        for to in &entry.methods {
            let to_name = to.display_name();
            if to.service == service || to_name == from_name {
                continue;
            }
            if !edge_names.insert(format!("{}->{}", from_name, to_name)) {
                continue;
            }
            let to_id = self.unique_id();
            let downstream = map.get(&to.canonical_key());
            lines.push(node_line(
                &to_id,
                &to_name,
                downstream.and_then(|e| e.source_url.as_deref()),
                None,
            ));
            lines.push(format!(
                "        \"{}\" -> \"{}\" [color=\"{}\"];",
                from_id,
                to_id,
                self.palette.next_color()
            ));
            if downstream.is_some() {
                self.render_calls(lines, service, edge_names, &to_id, to, map);
            }
        }
    }

    fn unique_id(&mut self) -> String {
        self.next_id += 1;
        format!("n{}", self.next_id)
    }
}

impl DependencyRenderer for DotRenderer {
    fn render(
        &mut self,
        map: &MethodMap,
        registry: &ServiceRegistry,
        output: &str,
    ) -> Result<Vec<PathBuf>> {
        let dot_path = PathBuf::from(format!("{}.dot", output));
        std::fs::write(&dot_path, self.to_dot(map, registry)).map_err(|e| {
            TraceError::Render(format!("failed to write {}: {}", dot_path.display(), e))
        })?;

        let json_path = PathBuf::from(format!("{}.json", output));
        let report = serde_json::to_string_pretty(&GraphDto::from_method_map(map, registry))
            .map_err(|e| TraceError::Render(format!("failed to encode report: {}", e)))?;
        std::fs::write(&json_path, report).map_err(|e| {
            TraceError::Render(format!("failed to write {}: {}", json_path.display(), e))
        })?;

        info!(dot = %dot_path.display(), report = %json_path.display(), "rendered dependency graph");
        Ok(vec![dot_path, json_path])
    }
}

fn node_line(id: &str, label: &str, url: Option<&str>, fill: Option<&str>) -> String {
    let mut attrs = vec![format!("label=\"{}\"", escape_label(label))];
    if let Some(url) = url {
        attrs.push(format!("URL=\"{}\"", escape_label(url)));
    }
    if let Some(fill) = fill {
        attrs.push(format!("style=filled, fillcolor=\"{}\", color=\"{}\"", fill, fill));
    }
    format!("        \"{}\" [{}];", id, attrs.join(", "))
}

fn escape_label(label: &str) -> String {
    label
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}
