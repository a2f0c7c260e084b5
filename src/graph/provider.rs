//! Resource lookup contract consumed by the graph builder
//!
//! The builder never talks to the cluster directly. Everything it knows about
//! live resources comes through a [`ResourceProvider`], which is free to serve
//! reads from an informer cache, a snapshot, or plain API calls.

use crate::graph::error::ProviderError;
use async_trait::async_trait;
use kube::core::{ApiResource, DynamicObject};
use std::sync::Arc;

/// Queryable identifier of a resource type (a GVR plus scope)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceType {
    pub group: String,
    pub version: String,
    pub kind: String,
    pub plural: String,
    pub namespaced: bool,
}

impl ResourceType {
    pub fn new(group_version: &str, kind: &str, plural: &str, namespaced: bool) -> Self {
        let (group, version) = split_group_version(group_version);
        Self {
            group: group.to_string(),
            version: version.to_string(),
            kind: kind.to_string(),
            plural: plural.to_string(),
            namespaced,
        }
    }

    /// `group/version`, or just `version` for the core group
    pub fn api_version(&self) -> String {
        if self.group.is_empty() {
            self.version.clone()
        } else {
            format!("{}/{}", self.group, self.version)
        }
    }

    pub fn to_api_resource(&self) -> ApiResource {
        ApiResource {
            group: self.group.clone(),
            version: self.version.clone(),
            api_version: self.api_version(),
            kind: self.kind.clone(),
            plural: self.plural.clone(),
        }
    }
}

/// Split `apps/v1` into `("apps", "v1")` and `v1` into `("", "v1")`
pub fn split_group_version(group_version: &str) -> (&str, &str) {
    match group_version.rsplit_once('/') {
        Some((group, version)) => (group, version),
        None => ("", group_version),
    }
}

/// Source of live resources for the graph builder
#[async_trait]
pub trait ResourceProvider: Send + Sync {
    /// Server-side label-selector query across the types the provider tracks
    async fn fetch_by_label(&self, selector: &str) -> Result<Vec<DynamicObject>, ProviderError>;

    /// Snapshot of every resource of one type
    async fn list_cached(
        &self,
        resource_type: &ResourceType,
    ) -> Result<Vec<DynamicObject>, ProviderError>;

    /// Resources carrying an ownerReference with this UID
    async fn list_by_owner_uid(&self, uid: &str) -> Result<Vec<DynamicObject>, ProviderError>;

    /// Direct lookup; `Ok(None)` when absent or when the UID does not match
    async fn fetch_one(
        &self,
        resource_type: &ResourceType,
        name: &str,
        namespace: Option<&str>,
        expected_uid: Option<&str>,
    ) -> Result<Option<DynamicObject>, ProviderError>;

    /// Map `group/version` + kind to a queryable resource type
    async fn resolve_resource_type(
        &self,
        group_version: &str,
        kind: &str,
    ) -> Result<ResourceType, ProviderError>;
}

#[async_trait]
impl<T: ResourceProvider + ?Sized> ResourceProvider for &T {
    async fn fetch_by_label(&self, selector: &str) -> Result<Vec<DynamicObject>, ProviderError> {
        (**self).fetch_by_label(selector).await
    }

    async fn list_cached(
        &self,
        resource_type: &ResourceType,
    ) -> Result<Vec<DynamicObject>, ProviderError> {
        (**self).list_cached(resource_type).await
    }

    async fn list_by_owner_uid(&self, uid: &str) -> Result<Vec<DynamicObject>, ProviderError> {
        (**self).list_by_owner_uid(uid).await
    }

    async fn fetch_one(
        &self,
        resource_type: &ResourceType,
        name: &str,
        namespace: Option<&str>,
        expected_uid: Option<&str>,
    ) -> Result<Option<DynamicObject>, ProviderError> {
        (**self)
            .fetch_one(resource_type, name, namespace, expected_uid)
            .await
    }

    async fn resolve_resource_type(
        &self,
        group_version: &str,
        kind: &str,
    ) -> Result<ResourceType, ProviderError> {
        (**self).resolve_resource_type(group_version, kind).await
    }
}

#[async_trait]
impl<T: ResourceProvider + ?Sized> ResourceProvider for Arc<T> {
    async fn fetch_by_label(&self, selector: &str) -> Result<Vec<DynamicObject>, ProviderError> {
        (**self).fetch_by_label(selector).await
    }

    async fn list_cached(
        &self,
        resource_type: &ResourceType,
    ) -> Result<Vec<DynamicObject>, ProviderError> {
        (**self).list_cached(resource_type).await
    }

    async fn list_by_owner_uid(&self, uid: &str) -> Result<Vec<DynamicObject>, ProviderError> {
        (**self).list_by_owner_uid(uid).await
    }

    async fn fetch_one(
        &self,
        resource_type: &ResourceType,
        name: &str,
        namespace: Option<&str>,
        expected_uid: Option<&str>,
    ) -> Result<Option<DynamicObject>, ProviderError> {
        (**self)
            .fetch_one(resource_type, name, namespace, expected_uid)
            .await
    }

    async fn resolve_resource_type(
        &self,
        group_version: &str,
        kind: &str,
    ) -> Result<ResourceType, ProviderError> {
        (**self).resolve_resource_type(group_version, kind).await
    }
}
