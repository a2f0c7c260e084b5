//! Resource relationship graphs
//!
//! [`GraphBuilder`] discovers the resources related to a root object through a
//! [`ResourceProvider`] and records them in a [`ResourceGraph`]. [`compute_layout`]
//! turns a finished graph into positions for a layered, top-down drawing.

pub mod builder;
pub mod error;
pub mod layout;
pub mod manifest;
pub mod model;
pub mod provider;
pub mod release;

pub use builder::{
    CancelHandle, DEFAULT_MAX_DEPTH, DEFAULT_TRACKING_LABEL, GraphBuilder, GraphRoot,
    MISSING_KIND_SUFFIX, MISSING_STATUS,
};
pub use error::{GraphError, ProviderError};
pub use layout::{
    GraphLayout, LayoutMetrics, LayoutNode, Position, compute_layout, compute_layout_with,
};
pub use manifest::{ManifestDocument, parse_manifest, split_documents};
pub use model::{
    EdgeKind, GraphEdge, GraphNode, MISSING_METADATA_KEY, NodeId, NodeKey, RelationshipKind,
    ResourceGraph, ResourceHandle,
};
pub use provider::{ResourceProvider, ResourceType};
pub use release::HelmRelease;
