//! [`ResourceProvider`] backed by the Kubernetes API
//!
//! Lists are fetched cluster-wide once per type and kept for the provider's
//! lifetime, so one provider should serve one graph build (or a short series
//! of them).

use crate::config::{GraphConfig, split_kind_ref};
use crate::graph::provider::split_group_version;
use crate::graph::{ProviderError, ResourceProvider, ResourceType};
use async_trait::async_trait;
use futures::future::join_all;
use kube::api::ListParams;
use kube::core::{DynamicObject, GroupVersionKind, TypeMeta};
use kube::discovery::{self, Scope};
use kube::{Api, Client};
use std::collections::HashMap;
use tokio::sync::{OnceCell, RwLock};

/// Reads cluster state for the graph builder
pub struct KubeProvider {
    client: Client,
    /// `(group/version, Kind)` scanned to build the owner-UID index
    indexed_kinds: Vec<(String, String)>,
    /// `(group/version, Kind)` searched by label queries
    label_kinds: Vec<(String, String)>,
    snapshots: RwLock<HashMap<ResourceType, Vec<DynamicObject>>>,
    owner_index: OnceCell<HashMap<String, Vec<DynamicObject>>>,
}

impl KubeProvider {
    pub fn new(client: Client, config: &GraphConfig) -> anyhow::Result<Self> {
        Ok(Self {
            client,
            indexed_kinds: parse_kind_refs(&config.indexed_kinds)?,
            label_kinds: parse_kind_refs(&config.label_kinds)?,
            snapshots: RwLock::new(HashMap::new()),
            owner_index: OnceCell::new(),
        })
    }

    async fn list(
        &self,
        resource_type: &ResourceType,
        params: &ListParams,
    ) -> Result<Vec<DynamicObject>, ProviderError> {
        let api: Api<DynamicObject> =
            Api::all_with(self.client.clone(), &resource_type.to_api_resource());
        let list = api.list(params).await?;
        Ok(list
            .items
            .into_iter()
            .map(|obj| with_types(obj, resource_type))
            .collect())
    }

    /// Map owner UID to every indexed object naming it in its ownerReferences
    async fn build_owner_index(&self) -> HashMap<String, Vec<DynamicObject>> {
        let mut index: HashMap<String, Vec<DynamicObject>> = HashMap::new();

        for (group_version, kind) in &self.indexed_kinds {
            let resource_type = match self.resolve_resource_type(group_version, kind).await {
                Ok(rt) => rt,
                Err(e) => {
                    tracing::warn!("Skipping {} in owner index: {}", kind, e);
                    continue;
                }
            };
            let items = match self.list_cached(&resource_type).await {
                Ok(items) => items,
                Err(e) => {
                    tracing::warn!("Skipping {} in owner index: {}", kind, e);
                    continue;
                }
            };

            for obj in items {
                for owner_ref in obj.metadata.owner_references.iter().flatten() {
                    index
                        .entry(owner_ref.uid.clone())
                        .or_default()
                        .push(obj.clone());
                }
            }
        }

        tracing::debug!("Owner index covers {} owners", index.len());
        index
    }
}

fn parse_kind_refs(kind_refs: &[String]) -> anyhow::Result<Vec<(String, String)>> {
    kind_refs
        .iter()
        .map(|kind_ref| {
            let (group_version, kind) = split_kind_ref(kind_ref)?;
            Ok((group_version.to_string(), kind.to_string()))
        })
        .collect()
}

/// List items come back without apiVersion/kind
fn with_types(mut obj: DynamicObject, resource_type: &ResourceType) -> DynamicObject {
    if obj.types.is_none() {
        obj.types = Some(TypeMeta {
            api_version: resource_type.api_version(),
            kind: resource_type.kind.clone(),
        });
    }
    obj
}

#[async_trait]
impl ResourceProvider for KubeProvider {
    async fn fetch_by_label(&self, selector: &str) -> Result<Vec<DynamicObject>, ProviderError> {
        let params = ListParams::default().labels(selector);

        let queries = self.label_kinds.iter().map(|(group_version, kind)| {
            let params = &params;
            async move {
                let resource_type = self.resolve_resource_type(group_version, kind).await?;
                self.list(&resource_type, params).await
            }
        });

        let mut matched = Vec::new();
        for ((_, kind), result) in self.label_kinds.iter().zip(join_all(queries).await) {
            match result {
                Ok(items) => matched.extend(items),
                Err(e) => tracing::warn!("Label query on {} failed: {}", kind, e),
            }
        }
        Ok(matched)
    }

    async fn list_cached(
        &self,
        resource_type: &ResourceType,
    ) -> Result<Vec<DynamicObject>, ProviderError> {
        if let Some(items) = self.snapshots.read().await.get(resource_type) {
            return Ok(items.clone());
        }

        let items = self.list(resource_type, &ListParams::default()).await?;
        tracing::debug!("Cached {} {}", items.len(), resource_type.plural);
        self.snapshots
            .write()
            .await
            .insert(resource_type.clone(), items.clone());
        Ok(items)
    }

    async fn list_by_owner_uid(&self, uid: &str) -> Result<Vec<DynamicObject>, ProviderError> {
        let index = self
            .owner_index
            .get_or_init(|| self.build_owner_index())
            .await;
        Ok(index.get(uid).cloned().unwrap_or_default())
    }

    async fn fetch_one(
        &self,
        resource_type: &ResourceType,
        name: &str,
        namespace: Option<&str>,
        expected_uid: Option<&str>,
    ) -> Result<Option<DynamicObject>, ProviderError> {
        let ar = resource_type.to_api_resource();
        let api: Api<DynamicObject> = match (resource_type.namespaced, namespace) {
            (true, Some(ns)) => Api::namespaced_with(self.client.clone(), ns, &ar),
            (true, None) => Api::default_namespaced_with(self.client.clone(), &ar),
            (false, _) => Api::all_with(self.client.clone(), &ar),
        };

        let Some(obj) = api.get_opt(name).await? else {
            return Ok(None);
        };
        if let Some(uid) = expected_uid {
            if obj.metadata.uid.as_deref() != Some(uid) {
                return Ok(None);
            }
        }
        Ok(Some(with_types(obj, resource_type)))
    }

    async fn resolve_resource_type(
        &self,
        group_version: &str,
        kind: &str,
    ) -> Result<ResourceType, ProviderError> {
        let (group, version) = split_group_version(group_version);
        let gvk = GroupVersionKind::gvk(group, version, kind);

        match discovery::pinned_kind(&self.client, &gvk).await {
            Ok((ar, caps)) => Ok(ResourceType::new(
                group_version,
                kind,
                &ar.plural,
                matches!(caps.scope, Scope::Namespaced),
            )),
            Err(kube::Error::Discovery(e)) => {
                tracing::debug!("Discovery for {} {}: {}", group_version, kind, e);
                Err(ProviderError::Discovery {
                    group_version: group_version.to_string(),
                    kind: kind.to_string(),
                })
            }
            Err(e) => Err(ProviderError::Api(e)),
        }
    }
}
