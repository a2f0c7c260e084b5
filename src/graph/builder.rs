//! Graph builder for discovering resource relationships
//!
//! Builds a [`ResourceGraph`] rooted at one resource using one of three
//! strategies, picked by the shape of the root:
//!
//! - ownership: walk ownerReferences upward and the owner-UID index downward
//! - managed application: one label-selector query for everything an
//!   Application tracks, then walk each result downward
//! - manifest reconciliation: match every object in a Helm release manifest
//!   against the cluster, keeping the ones that are missing as placeholders
//!
//! Lookup failures only end the branch that hit them. The only error that
//! stops a build midway is cancellation.

use crate::graph::error::{GraphError, ProviderError};
use crate::graph::manifest::{ManifestDocument, parse_manifest};
use crate::graph::model::{
    EdgeKind, MISSING_METADATA_KEY, NodeId, NodeKey, RelationshipKind, ResourceGraph,
};
use crate::graph::provider::{ResourceProvider, ResourceType, split_group_version};
use crate::graph::release::{HELM_SECRET_TYPE, HelmRelease};
use futures::FutureExt;
use futures::future::BoxFuture;
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
use kube::core::{DynamicObject, TypeMeta};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Generations followed in each direction from a traversal's starting node
pub const DEFAULT_MAX_DEPTH: usize = 5;

/// Label ArgoCD uses to track the resources an Application manages
pub const DEFAULT_TRACKING_LABEL: &str = "app.kubernetes.io/instance";

/// Status written onto placeholders for manifest objects missing from the cluster
pub const MISSING_STATUS: &str = "Missing";

/// Suffix appended to the kind of missing placeholders
pub const MISSING_KIND_SUFFIX: &str = " [Missing]";

pub const ARGOCD_GROUP: &str = "argoproj.io";
pub const APPLICATION_KIND: &str = "Application";

/// Root of a graph build, tagged with the strategy it needs
#[derive(Debug, Clone)]
pub enum GraphRoot {
    /// Any object: follow ownership in both directions
    Ownership(DynamicObject),
    /// An ArgoCD Application tracking resources by label
    ManagedApplication(DynamicObject),
    /// A Helm release with a stored manifest
    ManifestRelease(HelmRelease),
}

impl GraphRoot {
    /// Pick the strategy for a fetched object
    ///
    /// ArgoCD Applications track their resources by label, Helm storage
    /// Secrets are decoded into releases, and everything else falls back to
    /// ownership traversal.
    pub fn classify(obj: DynamicObject) -> Result<Self, GraphError> {
        if is_application(&obj) {
            return Ok(GraphRoot::ManagedApplication(obj));
        }

        if is_helm_release_secret(&obj) {
            let secret: Secret = serde_json::to_value(&obj)
                .and_then(serde_json::from_value)
                .map_err(|e| GraphError::Release(anyhow::Error::new(e)))?;
            let release = HelmRelease::from_secret(&secret).map_err(GraphError::Release)?;
            return Ok(GraphRoot::ManifestRelease(release));
        }

        Ok(GraphRoot::Ownership(obj))
    }

    /// Name of the strategy this root selects
    pub fn strategy(&self) -> &'static str {
        match self {
            GraphRoot::Ownership(_) => "ownership",
            GraphRoot::ManagedApplication(_) => "managed-application",
            GraphRoot::ManifestRelease(_) => "manifest-reconciliation",
        }
    }
}

fn is_application(obj: &DynamicObject) -> bool {
    obj.types.as_ref().is_some_and(|t| {
        t.kind == APPLICATION_KIND && split_group_version(&t.api_version).0 == ARGOCD_GROUP
    })
}

fn is_helm_release_secret(obj: &DynamicObject) -> bool {
    let is_secret = obj
        .types
        .as_ref()
        .is_some_and(|t| t.kind == "Secret" && t.api_version == "v1");
    is_secret && obj.data.get("type").and_then(|t| t.as_str()) == Some(HELM_SECRET_TYPE)
}

/// Handle used to cancel in-flight graph builds
///
/// Cloning shares the same signal. Cancelling is sticky.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    sender: Arc<watch::Sender<bool>>,
}

impl CancelHandle {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(false);
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn cancel(&self) {
        self.sender.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.sender.borrow()
    }

    fn subscribe(&self) -> watch::Receiver<bool> {
        self.sender.subscribe()
    }
}

impl Default for CancelHandle {
    fn default() -> Self {
        Self::new()
    }
}

async fn wait_cancelled(rx: &mut watch::Receiver<bool>) {
    // A closed channel can never flip to cancelled
    if rx.wait_for(|cancelled| *cancelled).await.is_err() {
        std::future::pending::<()>().await;
    }
}

/// Builds resource graphs from a [`ResourceProvider`]
///
/// Discovery results are memoized for the lifetime of the builder. A builder
/// runs one build at a time (`&mut self`).
pub struct GraphBuilder<P> {
    provider: P,
    max_depth: usize,
    tracking_label: String,
    call_timeout: Option<Duration>,
    cancel: Option<watch::Receiver<bool>>,
    discovery_cache: HashMap<(String, String), ResourceType>,
}

impl<P: ResourceProvider> GraphBuilder<P> {
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            max_depth: DEFAULT_MAX_DEPTH,
            tracking_label: DEFAULT_TRACKING_LABEL.to_string(),
            call_timeout: None,
            cancel: None,
            discovery_cache: HashMap::new(),
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_tracking_label(mut self, label: impl Into<String>) -> Self {
        self.tracking_label = label.into();
        self
    }

    /// Deadline for each individual provider call
    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = Some(timeout);
        self
    }

    pub fn with_cancel(mut self, cancel: &CancelHandle) -> Self {
        self.cancel = Some(cancel.subscribe());
        self
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Build a graph with the strategy the root asks for
    pub async fn build(&mut self, root: GraphRoot) -> Result<ResourceGraph, GraphError> {
        tracing::debug!("Building {} graph", root.strategy());
        match root {
            GraphRoot::Ownership(obj) => self.build_ownership_graph(&obj).await,
            GraphRoot::ManagedApplication(app) => self.build_managed_application_graph(&app).await,
            GraphRoot::ManifestRelease(release) => {
                self.build_manifest_reconciliation_graph(&release).await
            }
        }
    }

    /// Owners above and owned resources below an arbitrary object
    pub async fn build_ownership_graph(
        &mut self,
        root: &DynamicObject,
    ) -> Result<ResourceGraph, GraphError> {
        require_identity("ownership", root)?;
        self.check_cancelled()?;

        let mut graph = ResourceGraph::new(root.clone(), RelationshipKind::OwnerReference);
        let root_id = graph.root();

        let mut visited_up = HashSet::new();
        self.walk_up(&mut graph, root_id, 0, &mut visited_up).await?;

        let mut visited_down = HashSet::new();
        self.walk_down(&mut graph, root_id, 0, &mut visited_down)
            .await?;

        tracing::debug!(
            "Ownership graph for {} has {} nodes, {} edges",
            graph.node(root_id).key,
            graph.node_count(),
            graph.edge_count()
        );
        Ok(graph)
    }

    /// Everything an ArgoCD Application tracks, plus what those resources own
    pub async fn build_managed_application_graph(
        &mut self,
        app: &DynamicObject,
    ) -> Result<ResourceGraph, GraphError> {
        const STRATEGY: &str = "managed-application";
        require_identity(STRATEGY, app)?;
        if !is_application(app) {
            let kind = app.types.as_ref().map(|t| t.kind.as_str()).unwrap_or("");
            return Err(GraphError::invalid_root(
                STRATEGY,
                format!("expected {}/{}, got {}", ARGOCD_GROUP, APPLICATION_KIND, kind),
            ));
        }
        self.check_cancelled()?;

        let app_name = app.metadata.name.clone().unwrap_or_default();
        let mut graph = ResourceGraph::new(app.clone(), RelationshipKind::ArgocdMembership);
        let root_id = graph.root();

        // Single indexed query instead of one lookup per tracked resource
        let selector = format!("{}={}", self.tracking_label, app_name);
        let managed = match self.guarded(self.provider.fetch_by_label(&selector)).await? {
            Ok(items) => items,
            Err(e) => {
                tracing::warn!("Label query {} failed: {}", selector, e);
                return Ok(graph);
            }
        };
        tracing::debug!(
            "Application {} tracks {} resources ({})",
            app_name,
            managed.len(),
            selector
        );

        for obj in managed {
            let id = graph.add_node(obj, RelationshipKind::ArgocdMembership);
            if id == root_id {
                continue;
            }
            graph.add_edge(root_id, id, EdgeKind::ArgocdApp);

            let mut visited = HashSet::new();
            self.walk_down(&mut graph, id, 0, &mut visited).await?;
        }

        Ok(graph)
    }

    /// Every object in a release manifest, live or missing, plus what the live ones own
    pub async fn build_manifest_reconciliation_graph(
        &mut self,
        release: &HelmRelease,
    ) -> Result<ResourceGraph, GraphError> {
        const STRATEGY: &str = "manifest-reconciliation";
        if release.name.is_empty() {
            return Err(GraphError::invalid_root(STRATEGY, "release has no name"));
        }
        self.check_cancelled()?;

        let mut graph = ResourceGraph::new(release.clone(), RelationshipKind::HelmMembership);
        let root_id = graph.root();

        for doc in parse_manifest(&release.manifest) {
            let resource_type = self.resolve(&doc.api_version, &doc.kind).await?;
            let namespace = match &resource_type {
                Some(rt) if !rt.namespaced => None,
                _ => Some(doc.namespace_or(&release.namespace).to_string()),
            };

            // A `generateName`-only document names no live object to match
            let live = match &resource_type {
                Some(rt) if !doc.name.is_empty() => {
                    self.find_declared(rt, &doc.name, namespace.as_deref())
                        .await?
                }
                _ => None,
            };

            match live {
                Some(obj) => {
                    let id = graph.add_node(obj, RelationshipKind::HelmMembership);
                    if id == root_id {
                        continue;
                    }
                    graph.add_edge(root_id, id, EdgeKind::HelmPart);

                    let mut visited = HashSet::new();
                    self.walk_down(&mut graph, id, 0, &mut visited).await?;
                }
                None => {
                    tracing::debug!(
                        "{} {} from release {} not found in cluster",
                        doc.kind,
                        doc.name,
                        release.name
                    );
                    let placeholder = missing_placeholder(&doc, namespace);
                    let id = graph.add_node(placeholder, RelationshipKind::HelmMembership);
                    graph.set_metadata(id, MISSING_METADATA_KEY, "true");
                    graph.add_edge(root_id, id, EdgeKind::HelmPart);
                }
            }
        }

        Ok(graph)
    }

    /// Follow ownerReferences from `node` upward
    fn walk_up<'a>(
        &'a mut self,
        graph: &'a mut ResourceGraph,
        node: NodeId,
        depth: usize,
        visited: &'a mut HashSet<NodeKey>,
    ) -> BoxFuture<'a, Result<(), GraphError>> {
        async move {
            if depth >= self.max_depth {
                return Ok(());
            }
            if !visited.insert(graph.node(node).key.clone()) {
                return Ok(());
            }

            let Some(obj) = graph.node(node).resource.as_object() else {
                return Ok(());
            };
            let owner_refs: Vec<OwnerReference> =
                obj.metadata.owner_references.clone().unwrap_or_default();
            let namespace = obj.metadata.namespace.clone();

            for owner_ref in owner_refs {
                let Some(owner) = self.find_owner(&owner_ref, namespace.as_deref()).await? else {
                    continue;
                };
                let owner_id = graph.add_node(owner, RelationshipKind::OwnerReference);
                if owner_id == node {
                    continue;
                }
                graph.add_edge(owner_id, node, EdgeKind::OwnedBy);
                self.walk_up(graph, owner_id, depth + 1, visited).await?;
            }
            Ok(())
        }
        .boxed()
    }

    /// Follow the owner-UID index from `node` downward
    fn walk_down<'a>(
        &'a mut self,
        graph: &'a mut ResourceGraph,
        node: NodeId,
        depth: usize,
        visited: &'a mut HashSet<NodeKey>,
    ) -> BoxFuture<'a, Result<(), GraphError>> {
        async move {
            if depth >= self.max_depth {
                return Ok(());
            }
            if !visited.insert(graph.node(node).key.clone()) {
                return Ok(());
            }

            let Some(uid) = graph.node(node).resource.uid().map(str::to_string) else {
                return Ok(());
            };
            let owned = match self.guarded(self.provider.list_by_owner_uid(&uid)).await? {
                Ok(items) => items,
                Err(e) => {
                    tracing::warn!(
                        "Failed to list resources owned by {}: {}",
                        graph.node(node).key,
                        e
                    );
                    return Ok(());
                }
            };

            for obj in owned {
                let child = graph.add_node(obj, RelationshipKind::OwnerReference);
                if child == node {
                    continue;
                }
                graph.add_edge(node, child, EdgeKind::Owns);
                self.walk_down(graph, child, depth + 1, visited).await?;
            }
            Ok(())
        }
        .boxed()
    }

    /// Resolve an owner reference to the live owner object
    ///
    /// The cached snapshot is searched by name, namespace and UID first; a
    /// direct fetch is the fallback. A fetched object with another UID counts
    /// as not found.
    async fn find_owner(
        &mut self,
        owner_ref: &OwnerReference,
        child_namespace: Option<&str>,
    ) -> Result<Option<DynamicObject>, GraphError> {
        let Some(resource_type) = self.resolve(&owner_ref.api_version, &owner_ref.kind).await?
        else {
            return Ok(None);
        };
        let namespace = if resource_type.namespaced {
            child_namespace
        } else {
            None
        };
        let uid = Some(owner_ref.uid.as_str());

        match self.guarded(self.provider.list_cached(&resource_type)).await? {
            Ok(items) => {
                if let Some(found) = items
                    .into_iter()
                    .find(|obj| object_matches(obj, &owner_ref.name, namespace, uid))
                {
                    return Ok(Some(with_type_meta(found, &resource_type)));
                }
            }
            Err(e) => tracing::warn!("Failed to list cached {}: {}", resource_type.plural, e),
        }

        let fetched = self
            .guarded(
                self.provider
                    .fetch_one(&resource_type, &owner_ref.name, namespace, uid),
            )
            .await?;
        match fetched {
            Ok(Some(obj)) if object_matches(&obj, &owner_ref.name, namespace, uid) => {
                Ok(Some(with_type_meta(obj, &resource_type)))
            }
            Ok(Some(_)) => {
                tracing::warn!(
                    "Owner {} {} exists with a different UID than {}",
                    owner_ref.kind,
                    owner_ref.name,
                    owner_ref.uid
                );
                Ok(None)
            }
            Ok(None) => {
                tracing::debug!("Owner {} {} not found", owner_ref.kind, owner_ref.name);
                Ok(None)
            }
            Err(e) => {
                tracing::warn!(
                    "Failed to fetch owner {} {}: {}",
                    owner_ref.kind,
                    owner_ref.name,
                    e
                );
                Ok(None)
            }
        }
    }

    /// Find the live object a manifest document declares
    async fn find_declared(
        &mut self,
        resource_type: &ResourceType,
        name: &str,
        namespace: Option<&str>,
    ) -> Result<Option<DynamicObject>, GraphError> {
        match self.guarded(self.provider.list_cached(resource_type)).await? {
            Ok(items) => {
                if let Some(found) = items
                    .into_iter()
                    .find(|obj| object_matches(obj, name, namespace, None))
                {
                    return Ok(Some(with_type_meta(found, resource_type)));
                }
            }
            Err(e) => tracing::warn!("Failed to list cached {}: {}", resource_type.plural, e),
        }

        let fetched = self
            .guarded(self.provider.fetch_one(resource_type, name, namespace, None))
            .await?;
        match fetched {
            Ok(found) => Ok(found.map(|obj| with_type_meta(obj, resource_type))),
            Err(e) => {
                tracing::warn!("Failed to fetch {} {}: {}", resource_type.kind, name, e);
                Ok(None)
            }
        }
    }

    /// Memoized discovery lookup; `None` when the kind cannot be resolved
    async fn resolve(
        &mut self,
        group_version: &str,
        kind: &str,
    ) -> Result<Option<ResourceType>, GraphError> {
        let cache_key = (group_version.to_string(), kind.to_string());
        if let Some(resource_type) = self.discovery_cache.get(&cache_key) {
            return Ok(Some(resource_type.clone()));
        }

        let resolved = self
            .guarded(self.provider.resolve_resource_type(group_version, kind))
            .await?;
        match resolved {
            Ok(resource_type) => {
                self.discovery_cache
                    .insert(cache_key, resource_type.clone());
                Ok(Some(resource_type))
            }
            Err(e) => {
                // Not cached: the next request retries discovery
                tracing::warn!("Discovery failed for {} {}: {}", group_version, kind, e);
                Ok(None)
            }
        }
    }

    /// Run one provider call under the call deadline and the cancel signal
    ///
    /// The outer error is cancellation only; provider failures and timeouts
    /// come back in the inner result for the caller to log and skip.
    async fn guarded<T>(
        &self,
        call: impl Future<Output = Result<T, ProviderError>>,
    ) -> Result<Result<T, ProviderError>, GraphError> {
        let bounded = async {
            match self.call_timeout {
                Some(limit) => tokio::time::timeout(limit, call)
                    .await
                    .unwrap_or_else(|_| Err(ProviderError::Timeout(limit))),
                None => call.await,
            }
        };

        match &self.cancel {
            Some(cancel) => {
                let mut cancel = cancel.clone();
                if *cancel.borrow() {
                    return Err(GraphError::Cancelled);
                }
                tokio::select! {
                    biased;
                    _ = wait_cancelled(&mut cancel) => Err(GraphError::Cancelled),
                    result = bounded => Ok(result),
                }
            }
            None => Ok(bounded.await),
        }
    }

    fn check_cancelled(&self) -> Result<(), GraphError> {
        match &self.cancel {
            Some(cancel) if *cancel.borrow() => Err(GraphError::Cancelled),
            _ => Ok(()),
        }
    }
}

fn require_identity(strategy: &'static str, obj: &DynamicObject) -> Result<(), GraphError> {
    if obj.metadata.name.as_deref().unwrap_or("").is_empty() {
        return Err(GraphError::invalid_root(strategy, "root has no name"));
    }
    if obj.types.as_ref().is_none_or(|t| t.kind.is_empty()) {
        return Err(GraphError::invalid_root(strategy, "root has no kind"));
    }
    Ok(())
}

fn object_matches(
    obj: &DynamicObject,
    name: &str,
    namespace: Option<&str>,
    uid: Option<&str>,
) -> bool {
    obj.metadata.name.as_deref() == Some(name)
        && namespace.is_none_or(|ns| obj.metadata.namespace.as_deref() == Some(ns))
        && uid.is_none_or(|uid| obj.metadata.uid.as_deref() == Some(uid))
}

/// List responses omit per-item apiVersion/kind; fill them from the type
fn with_type_meta(mut obj: DynamicObject, resource_type: &ResourceType) -> DynamicObject {
    let incomplete = obj
        .types
        .as_ref()
        .is_none_or(|t| t.kind.is_empty() || t.api_version.is_empty());
    if incomplete {
        obj.types = Some(TypeMeta {
            api_version: resource_type.api_version(),
            kind: resource_type.kind.clone(),
        });
    }
    obj
}

/// Stand-in node for a manifest object that is not in the cluster
fn missing_placeholder(doc: &ManifestDocument, namespace: Option<String>) -> DynamicObject {
    let mut data = doc.object.clone();
    if let Some(fields) = data.as_object_mut() {
        fields.remove("apiVersion");
        fields.remove("kind");
        fields.remove("metadata");
        fields.insert(
            "status".to_string(),
            Value::String(MISSING_STATUS.to_string()),
        );
    } else {
        data = serde_json::json!({ "status": MISSING_STATUS });
    }

    DynamicObject {
        types: Some(TypeMeta {
            api_version: doc.api_version.clone(),
            kind: format!("{}{}", doc.kind, MISSING_KIND_SUFFIX),
        }),
        metadata: ObjectMeta {
            name: Some(doc.name.clone()),
            namespace,
            ..Default::default()
        },
        data,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn typed(api_version: &str, kind: &str, name: &str) -> DynamicObject {
        serde_json::from_value(json!({
            "apiVersion": api_version,
            "kind": kind,
            "metadata": { "name": name, "namespace": "default" }
        }))
        .unwrap()
    }

    #[test]
    fn test_classify_application() {
        let root = GraphRoot::classify(typed("argoproj.io/v1alpha1", "Application", "guestbook"))
            .unwrap();
        assert!(matches!(root, GraphRoot::ManagedApplication(_)));
        assert_eq!(root.strategy(), "managed-application");
    }

    #[test]
    fn test_classify_other_application_group_is_ownership() {
        let root =
            GraphRoot::classify(typed("app.k8s.io/v1beta1", "Application", "guestbook")).unwrap();
        assert!(matches!(root, GraphRoot::Ownership(_)));
    }

    #[test]
    fn test_classify_plain_secret_is_ownership() {
        let mut secret = typed("v1", "Secret", "creds");
        secret.data = json!({ "type": "Opaque", "data": {} });
        assert!(matches!(
            GraphRoot::classify(secret).unwrap(),
            GraphRoot::Ownership(_)
        ));
    }

    #[test]
    fn test_classify_broken_helm_secret_is_an_error() {
        let mut secret = typed("v1", "Secret", "sh.helm.release.v1.app.v1");
        secret.data = json!({ "type": HELM_SECRET_TYPE, "data": {} });
        assert!(matches!(
            GraphRoot::classify(secret),
            Err(GraphError::Release(_))
        ));
    }

    #[test]
    fn test_missing_placeholder() {
        let doc = ManifestDocument {
            api_version: "apps/v1".to_string(),
            kind: "Deployment".to_string(),
            name: "web".to_string(),
            namespace: None,
            object: json!({
                "apiVersion": "apps/v1",
                "kind": "Deployment",
                "metadata": { "name": "web" },
                "spec": { "replicas": 3 },
                "status": { "readyReplicas": 3 }
            }),
        };
        let obj = missing_placeholder(&doc, Some("apps".to_string()));
        let types = obj.types.as_ref().unwrap();
        assert_eq!(types.kind, "Deployment [Missing]");
        assert_eq!(types.api_version, "apps/v1");
        assert_eq!(obj.metadata.namespace.as_deref(), Some("apps"));
        assert_eq!(obj.data["status"], MISSING_STATUS);
        assert_eq!(obj.data["spec"]["replicas"], 3);
        assert!(obj.data.get("metadata").is_none());
    }

    #[test]
    fn test_object_matches() {
        let mut obj = typed("apps/v1", "ReplicaSet", "web-abc");
        obj.metadata.uid = Some("uid-1".to_string());
        assert!(object_matches(&obj, "web-abc", Some("default"), Some("uid-1")));
        assert!(object_matches(&obj, "web-abc", None, None));
        assert!(!object_matches(&obj, "web-abc", Some("other"), None));
        assert!(!object_matches(&obj, "web-abc", None, Some("uid-2")));
        assert!(!object_matches(&obj, "web", None, None));
    }

    #[test]
    fn test_with_type_meta_fills_list_items() {
        let mut obj = typed("apps/v1", "ReplicaSet", "web-abc");
        obj.types = None;
        let rt = ResourceType::new("apps/v1", "ReplicaSet", "replicasets", true);
        let obj = with_type_meta(obj, &rt);
        assert_eq!(obj.types.unwrap().kind, "ReplicaSet");
    }

    #[test]
    fn test_cancel_handle_is_sticky() {
        let handle = CancelHandle::new();
        let clone = handle.clone();
        assert!(!handle.is_cancelled());
        clone.cancel();
        assert!(handle.is_cancelled());
    }
}
