//! Layered layout for resource graphs
//!
//! Assigns every node a layer and an order inside that layer, then packs the
//! layers into character-cell positions for a top-down drawing:
//!
//! 1. Longest-path layering, so every edge points to a deeper layer
//! 2. Barycenter sweeps to reduce edge crossings
//! 3. Fixed-size packing with per-layer centering

use crate::graph::model::{NodeId, ResourceGraph};
use serde::Serialize;
use std::collections::VecDeque;

/// Number of forward+backward sweep pairs used for crossing reduction
const CROSSING_PASSES: usize = 3;

/// Cell dimensions used to place nodes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutMetrics {
    pub node_width: u16,
    pub node_height: u16,
    pub horizontal_gap: u16,
    pub vertical_gap: u16,
    pub margin: u16,
}

impl Default for LayoutMetrics {
    fn default() -> Self {
        Self {
            node_width: 30,
            node_height: 5,
            horizontal_gap: 4,
            vertical_gap: 3,
            margin: 1,
        }
    }
}

/// Cell occupied by a node: top-left corner plus size
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Position {
    pub x: u16,
    pub y: u16,
    pub width: u16,
    pub height: u16,
}

/// Placement of one graph node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LayoutNode {
    pub id: NodeId,
    pub layer: usize,
    /// Index inside the layer, left to right
    pub order: usize,
    pub position: Position,
}

/// Result of laying out a graph
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphLayout {
    /// One entry per graph node, indexed by `NodeId`
    pub nodes: Vec<LayoutNode>,
    /// Node ids of each layer, top to bottom, in final left-to-right order
    pub layers: Vec<Vec<NodeId>>,
    pub canvas_width: u16,
    pub canvas_height: u16,
}

impl GraphLayout {
    pub fn node(&self, id: NodeId) -> Option<&LayoutNode> {
        self.nodes.get(id.0)
    }

    pub fn position(&self, id: NodeId) -> Option<Position> {
        self.node(id).map(|n| n.position)
    }

    pub fn layer_of(&self, id: NodeId) -> Option<usize> {
        self.node(id).map(|n| n.layer)
    }
}

/// Lay out a graph with the default cell metrics
pub fn compute_layout(graph: &ResourceGraph, container_width: u16) -> GraphLayout {
    compute_layout_with(graph, container_width, &LayoutMetrics::default())
}

/// Lay out a graph for a container of `container_width` cells
pub fn compute_layout_with(
    graph: &ResourceGraph,
    container_width: u16,
    metrics: &LayoutMetrics,
) -> GraphLayout {
    let adjacency = Adjacency::new(graph);
    let mut layers = group_layers(&assign_layers(graph, &adjacency));
    reduce_crossings(&mut layers, &adjacency);
    place(graph.node_count(), layers, container_width, metrics)
}

/// Deduplicated parent/child lists, ignoring self-loops
struct Adjacency {
    parents: Vec<Vec<usize>>,
    children: Vec<Vec<usize>>,
}

impl Adjacency {
    fn new(graph: &ResourceGraph) -> Self {
        let n = graph.node_count();
        let mut parents = vec![Vec::new(); n];
        let mut children = vec![Vec::new(); n];

        for edge in graph.edges() {
            let (from, to) = (edge.from.0, edge.to.0);
            if from == to || from >= n || to >= n {
                continue;
            }
            // Two edge kinds can link the same pair
            if !children[from].contains(&to) {
                children[from].push(to);
                parents[to].push(from);
            }
        }

        Self { parents, children }
    }
}

/// Longest-path layer of every node
///
/// Sources start at layer 0 and each edge relaxes its target to at least one
/// layer below its source, re-enqueueing targets whose layer was raised.
/// Layers are capped at `n - 1` so cycles terminate. Nodes not reachable from
/// any source land in an extra layer below the deepest one.
fn assign_layers(graph: &ResourceGraph, adjacency: &Adjacency) -> Vec<usize> {
    let n = graph.node_count();
    let cap = n.saturating_sub(1);
    let mut layer: Vec<Option<usize>> = vec![None; n];
    let mut queue = VecDeque::new();

    for (id, parents) in adjacency.parents.iter().enumerate() {
        if parents.is_empty() {
            layer[id] = Some(0);
            queue.push_back(id);
        }
    }

    if queue.is_empty() && n > 0 {
        // Every node has a parent: the graph cycles through the root
        let root = graph.root().0;
        layer[root] = Some(0);
        queue.push_back(root);
    }

    while let Some(u) = queue.pop_front() {
        let Some(lu) = layer[u] else {
            continue;
        };
        let candidate = (lu + 1).min(cap);
        for &v in &adjacency.children[u] {
            if layer[v].is_none_or(|lv| candidate > lv) {
                layer[v] = Some(candidate);
                queue.push_back(v);
            }
        }
    }

    let deepest = layer.iter().flatten().copied().max().unwrap_or(0);
    let unlayered = layer.iter().filter(|l| l.is_none()).count();
    if unlayered > 0 {
        tracing::warn!(
            "{} nodes unreachable from any source, placing them in layer {}",
            unlayered,
            deepest + 1
        );
    }

    layer
        .into_iter()
        .map(|l| l.unwrap_or(deepest + 1))
        .collect()
}

/// Bucket nodes by layer in insertion order, dropping empty layers
fn group_layers(layer_of: &[usize]) -> Vec<Vec<usize>> {
    let count = layer_of.iter().copied().max().map_or(0, |max| max + 1);
    let mut layers = vec![Vec::new(); count];
    for (id, &layer) in layer_of.iter().enumerate() {
        layers[layer].push(id);
    }
    layers.retain(|l| !l.is_empty());
    layers
}

fn reduce_crossings(layers: &mut [Vec<usize>], adjacency: &Adjacency) {
    if layers.len() < 2 {
        return;
    }

    for _ in 0..CROSSING_PASSES {
        for l in 1..layers.len() {
            let (above, rest) = layers.split_at_mut(l);
            order_by_barycenter(&mut rest[0], &above[l - 1], &adjacency.parents);
        }
        for l in (0..layers.len() - 1).rev() {
            let (current, below) = layers.split_at_mut(l + 1);
            order_by_barycenter(&mut current[l], &below[0], &adjacency.children);
        }
    }
}

/// Stable sort of `layer` by the mean index of each node's neighbors in `adjacent`
///
/// A node with no neighbor in `adjacent` keeps its current index as its weight.
fn order_by_barycenter(layer: &mut Vec<usize>, adjacent: &[usize], neighbors: &[Vec<usize>]) {
    let weighted: Vec<(f64, usize)> = layer
        .iter()
        .enumerate()
        .map(|(idx, &node)| {
            let indices: Vec<usize> = neighbors[node]
                .iter()
                .filter_map(|n| adjacent.iter().position(|a| a == n))
                .collect();
            let weight = if indices.is_empty() {
                idx as f64
            } else {
                indices.iter().sum::<usize>() as f64 / indices.len() as f64
            };
            (weight, node)
        })
        .collect();

    let mut sorted = weighted;
    sorted.sort_by(|a, b| a.0.total_cmp(&b.0));
    *layer = sorted.into_iter().map(|(_, node)| node).collect();
}

fn saturate(value: usize) -> u16 {
    value.min(u16::MAX as usize) as u16
}

fn place(
    node_count: usize,
    layers: Vec<Vec<usize>>,
    container_width: u16,
    metrics: &LayoutMetrics,
) -> GraphLayout {
    let width = metrics.node_width as usize;
    let height = metrics.node_height as usize;
    let h_gap = metrics.horizontal_gap as usize;
    let v_gap = metrics.vertical_gap as usize;
    let margin = metrics.margin as usize;
    let container = container_width as usize;

    let mut nodes: Vec<LayoutNode> = (0..node_count)
        .map(|id| LayoutNode {
            id: NodeId(id),
            layer: 0,
            order: 0,
            position: Position::default(),
        })
        .collect();
    let mut widest = 0;

    for (layer_idx, layer) in layers.iter().enumerate() {
        let count = layer.len();
        let layer_width = count * width + count.saturating_sub(1) * h_gap;
        widest = widest.max(layer_width);

        let start_x = if layer_width < container {
            (container - layer_width) / 2
        } else {
            margin
        };
        let y = margin + layer_idx * (height + v_gap);

        for (order, &id) in layer.iter().enumerate() {
            nodes[id] = LayoutNode {
                id: NodeId(id),
                layer: layer_idx,
                order,
                position: Position {
                    x: saturate(start_x + order * (width + h_gap)),
                    y: saturate(y),
                    width: metrics.node_width,
                    height: metrics.node_height,
                },
            };
        }
    }

    let layer_count = layers.len();
    let canvas_height =
        2 * margin + layer_count * height + layer_count.saturating_sub(1) * v_gap;
    let canvas_width = container.max(widest + 2 * margin);

    GraphLayout {
        nodes,
        layers: layers
            .into_iter()
            .map(|layer| layer.into_iter().map(NodeId).collect())
            .collect(),
        canvas_width: saturate(canvas_width),
        canvas_height: saturate(canvas_height),
    }
}
