//! Kubernetes resource relationship graphs
//!
//! Discovers how resources relate (ownerReferences, ArgoCD tracking labels,
//! Helm release manifests), records the relationships in a graph rooted at
//! one resource, and lays the graph out for top-down terminal rendering.
//!
//! The graph core in [`graph`] only talks to the cluster through the
//! [`graph::ResourceProvider`] trait; [`kube::KubeProvider`] is the
//! Kubernetes-backed implementation.

pub mod cli;
pub mod config;
pub mod graph;
pub mod kube;

pub use graph::{
    CancelHandle, GraphBuilder, GraphError, GraphLayout, GraphRoot, ResourceGraph,
    ResourceProvider, compute_layout,
};
