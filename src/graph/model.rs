//! Graph data structures for resource relationships
//!
//! A `ResourceGraph` holds every resource discovered for one visualize action,
//! the directed edges between them, and a single root node. Nodes are keyed by
//! resource identity so that every edge touching the same resource lands on
//! the same node.

use crate::graph::release::{HELM_RELEASE_API_VERSION, HELM_RELEASE_KIND, HelmRelease};
use kube::core::DynamicObject;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;

/// Metadata key set on nodes declared in a manifest but absent from the cluster
pub const MISSING_METADATA_KEY: &str = "missing";

/// Index of a node inside its graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NodeId(pub usize);

/// Identity of a resource inside a graph
///
/// Cluster-scoped resources carry no namespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NodeKey {
    pub namespace: Option<String>,
    pub name: String,
    pub kind: String,
    pub api_version: String,
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{}:{}:{}:{}", self.api_version, self.kind, ns, self.name),
            None => write!(f, "{}:{}:{}", self.api_version, self.kind, self.name),
        }
    }
}

/// A resource wrapped by a graph node
#[derive(Debug, Clone)]
pub enum ResourceHandle {
    /// Any Kubernetes object
    Object(DynamicObject),
    /// A Helm release (pseudo-resource, not served by the API)
    Release(HelmRelease),
}

impl ResourceHandle {
    pub fn name(&self) -> &str {
        match self {
            ResourceHandle::Object(obj) => obj.metadata.name.as_deref().unwrap_or(""),
            ResourceHandle::Release(release) => &release.name,
        }
    }

    /// Namespace, or `None` for cluster-scoped resources
    pub fn namespace(&self) -> Option<&str> {
        let ns = match self {
            ResourceHandle::Object(obj) => obj.metadata.namespace.as_deref(),
            ResourceHandle::Release(release) => Some(release.namespace.as_str()),
        };
        ns.filter(|ns| !ns.is_empty())
    }

    pub fn kind(&self) -> &str {
        match self {
            ResourceHandle::Object(obj) => {
                obj.types.as_ref().map(|t| t.kind.as_str()).unwrap_or("")
            }
            ResourceHandle::Release(_) => HELM_RELEASE_KIND,
        }
    }

    pub fn api_version(&self) -> &str {
        match self {
            ResourceHandle::Object(obj) => obj
                .types
                .as_ref()
                .map(|t| t.api_version.as_str())
                .unwrap_or(""),
            ResourceHandle::Release(_) => HELM_RELEASE_API_VERSION,
        }
    }

    pub fn uid(&self) -> Option<&str> {
        match self {
            ResourceHandle::Object(obj) => obj.metadata.uid.as_deref().filter(|u| !u.is_empty()),
            ResourceHandle::Release(_) => None,
        }
    }

    /// Status summary used by renderers
    ///
    /// Objects report a plain string `status` if one was set (e.g. the missing
    /// sentinel), otherwise `status.phase`. Releases report their Helm status.
    pub fn status(&self) -> Option<&str> {
        match self {
            ResourceHandle::Object(obj) => {
                let status = obj.data.get("status")?;
                status
                    .as_str()
                    .or_else(|| status.get("phase").and_then(|p| p.as_str()))
            }
            ResourceHandle::Release(release) => release.status.as_deref(),
        }
    }

    pub fn as_object(&self) -> Option<&DynamicObject> {
        match self {
            ResourceHandle::Object(obj) => Some(obj),
            ResourceHandle::Release(_) => None,
        }
    }

    /// Identity key for this resource
    pub fn key(&self) -> NodeKey {
        NodeKey {
            namespace: self.namespace().map(str::to_string),
            name: self.name().to_string(),
            kind: self.kind().to_string(),
            api_version: self.api_version().to_string(),
        }
    }
}

impl From<DynamicObject> for ResourceHandle {
    fn from(obj: DynamicObject) -> Self {
        ResourceHandle::Object(obj)
    }
}

impl From<HelmRelease> for ResourceHandle {
    fn from(release: HelmRelease) -> Self {
        ResourceHandle::Release(release)
    }
}

/// How a node came to be part of the graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RelationshipKind {
    /// Reached through ownerReferences
    OwnerReference,
    /// Declared in a Helm release manifest
    HelmMembership,
    /// Carries the application tracking label
    ArgocdMembership,
}

/// Why an edge exists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum EdgeKind {
    /// Owner found the child through the owner-UID index
    Owns,
    /// Child names the owner in its ownerReferences
    OwnedBy,
    /// Release manifest declares the resource
    HelmPart,
    /// Application tracks the resource by label
    ArgocdApp,
}

/// A node in the resource graph
#[derive(Debug, Clone)]
pub struct GraphNode {
    /// Identity the graph indexes this node by
    pub key: NodeKey,
    /// The resource itself (object or Helm release)
    pub resource: ResourceHandle,
    /// How the node was first reached
    pub relationship: RelationshipKind,
    /// Free-form annotations, e.g. the missing flag
    pub metadata: BTreeMap<String, String>,
    /// Whether this node is the graph root
    pub is_root: bool,
}

impl GraphNode {
    /// Whether the node stands in for a resource missing from the cluster
    pub fn is_missing(&self) -> bool {
        self.metadata
            .get(MISSING_METADATA_KEY)
            .is_some_and(|v| v == "true")
    }
}

/// A directed edge between two nodes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct GraphEdge {
    /// Source node (owner, release or application)
    pub from: NodeId,
    /// Target node
    pub to: NodeId,
    /// Why the edge exists
    pub kind: EdgeKind,
}

/// A graph of resource relationships rooted at one resource
#[derive(Debug, Clone)]
pub struct ResourceGraph {
    nodes: Vec<GraphNode>,
    edges: Vec<GraphEdge>,
    node_index: HashMap<NodeKey, NodeId>,
    edge_index: HashSet<GraphEdge>,
    root: NodeId,
}

impl ResourceGraph {
    /// Create a graph holding only the root node
    pub fn new(root: impl Into<ResourceHandle>, relationship: RelationshipKind) -> Self {
        let resource = root.into();
        let key = resource.key();
        let root_id = NodeId(0);
        let mut node_index = HashMap::new();
        node_index.insert(key.clone(), root_id);

        Self {
            nodes: vec![GraphNode {
                key,
                resource,
                relationship,
                metadata: BTreeMap::new(),
                is_root: true,
            }],
            edges: Vec::new(),
            node_index,
            edge_index: HashSet::new(),
            root: root_id,
        }
    }

    /// Add a node, or return the existing one with the same identity
    pub fn add_node(
        &mut self,
        resource: impl Into<ResourceHandle>,
        relationship: RelationshipKind,
    ) -> NodeId {
        let resource = resource.into();
        let key = resource.key();
        if let Some(&id) = self.node_index.get(&key) {
            return id;
        }

        let id = NodeId(self.nodes.len());
        self.node_index.insert(key.clone(), id);
        self.nodes.push(GraphNode {
            key,
            resource,
            relationship,
            metadata: BTreeMap::new(),
            is_root: false,
        });
        id
    }

    /// Add an edge unless the same triple is already present
    ///
    /// Returns `true` when a new edge was stored.
    pub fn add_edge(&mut self, from: NodeId, to: NodeId, kind: EdgeKind) -> bool {
        let edge = GraphEdge { from, to, kind };
        if !self.edge_index.insert(edge) {
            return false;
        }
        self.edges.push(edge);
        true
    }

    /// Targets of outgoing edges, in edge insertion order
    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        self.edges
            .iter()
            .filter(|e| e.from == id)
            .map(|e| e.to)
            .collect()
    }

    /// Sources of incoming edges, in edge insertion order
    pub fn parents(&self, id: NodeId) -> Vec<NodeId> {
        self.edges
            .iter()
            .filter(|e| e.to == id)
            .map(|e| e.from)
            .collect()
    }

    /// Look up the node holding a resource with the same identity
    pub fn get_node(&self, resource: &ResourceHandle) -> Option<NodeId> {
        self.get_node_by_key(&resource.key())
    }

    pub fn get_node_by_key(&self, key: &NodeKey) -> Option<NodeId> {
        self.node_index.get(key).copied()
    }

    pub fn node(&self, id: NodeId) -> &GraphNode {
        &self.nodes[id.0]
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn nodes(&self) -> &[GraphNode] {
        &self.nodes
    }

    pub fn edges(&self) -> &[GraphEdge] {
        &self.edges
    }

    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        (0..self.nodes.len()).map(NodeId)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Attach a metadata entry to a node
    pub(crate) fn set_metadata(&mut self, id: NodeId, key: &str, value: &str) {
        if let Some(node) = self.nodes.get_mut(id.0) {
            node.metadata.insert(key.to_string(), value.to_string());
        }
    }
}
