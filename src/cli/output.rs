//! Rendering laid-out graphs for the terminal

use crate::graph::{EdgeKind, GraphLayout, GraphNode, ResourceGraph};
use anyhow::{Context, Result};
use clap::ValueEnum;
use serde_json::{Value, json};

/// Output format for graph commands
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Layers top-down with positions
    #[default]
    Text,
    /// Nodes, edges and positions as JSON
    Json,
}

pub fn render(graph: &ResourceGraph, layout: &GraphLayout, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Text => Ok(render_text(graph, layout)),
        OutputFormat::Json => serde_json::to_string_pretty(&render_json(graph, layout))
            .context("Failed to serialize graph"),
    }
}

/// `Kind namespace/name`, or `Kind name` for cluster-scoped resources
pub fn node_label(node: &GraphNode) -> String {
    match &node.key.namespace {
        Some(ns) => format!("{} {}/{}", node.key.kind, ns, node.key.name),
        None => format!("{} {}", node.key.kind, node.key.name),
    }
}

fn edge_kind_name(kind: EdgeKind) -> &'static str {
    match kind {
        EdgeKind::Owns => "owns",
        EdgeKind::OwnedBy => "owned-by",
        EdgeKind::HelmPart => "helm-part",
        EdgeKind::ArgocdApp => "argocd-app",
    }
}

pub fn render_text(graph: &ResourceGraph, layout: &GraphLayout) -> String {
    let mut lines = vec![
        format!(
            "{} ({} nodes, {} edges)",
            node_label(graph.node(graph.root())),
            graph.node_count(),
            graph.edge_count()
        ),
        format!("Canvas {}x{}", layout.canvas_width, layout.canvas_height),
    ];

    for (idx, layer) in layout.layers.iter().enumerate() {
        lines.push(String::new());
        lines.push(format!("Layer {}", idx));
        for &id in layer {
            let node = graph.node(id);
            let position = layout.position(id).unwrap_or_default();
            let mut line = format!("  {} @{},{}", node_label(node), position.x, position.y);
            if node.is_missing() {
                line.push_str(" [missing]");
            } else if let Some(status) = node.resource.status() {
                line.push_str(&format!(" ({})", status));
            }
            if node.is_root {
                line.push_str(" [root]");
            }
            lines.push(line);
        }
    }

    if graph.edge_count() > 0 {
        lines.push(String::new());
        lines.push("Edges".to_string());
        for edge in graph.edges() {
            lines.push(format!(
                "  {} -> {} ({})",
                node_label(graph.node(edge.from)),
                node_label(graph.node(edge.to)),
                edge_kind_name(edge.kind)
            ));
        }
    }

    lines.join("\n")
}

pub fn render_json(graph: &ResourceGraph, layout: &GraphLayout) -> Value {
    let nodes: Vec<Value> = graph
        .node_ids()
        .map(|id| {
            let node = graph.node(id);
            let placement = layout.node(id);
            json!({
                "id": id,
                "kind": node.key.kind,
                "apiVersion": node.key.api_version,
                "namespace": node.key.namespace,
                "name": node.key.name,
                "relationship": node.relationship,
                "status": node.resource.status(),
                "root": node.is_root,
                "missing": node.is_missing(),
                "metadata": node.metadata,
                "layer": placement.map(|p| p.layer),
                "order": placement.map(|p| p.order),
                "position": placement.map(|p| p.position),
            })
        })
        .collect();

    json!({
        "root": graph.root(),
        "canvas": { "width": layout.canvas_width, "height": layout.canvas_height },
        "nodes": nodes,
        "edges": graph.edges(),
    })
}
