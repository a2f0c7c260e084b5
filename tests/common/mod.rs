//! In-memory resource provider for builder tests
//!
//! Serves a fixed set of objects and counts every call so tests can assert on
//! how the builder talks to the cluster.

#![allow(dead_code)]

use async_trait::async_trait;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
use kube::core::{DynamicObject, TypeMeta};
use relgraph::graph::{ProviderError, ResourceProvider, ResourceType};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

#[derive(Default)]
pub struct CallCounts {
    pub label_queries: AtomicUsize,
    pub list_cached: AtomicUsize,
    pub owner_lookups: AtomicUsize,
    pub fetch_one: AtomicUsize,
    pub discovery: AtomicUsize,
}

impl CallCounts {
    pub fn total(&self) -> usize {
        [
            &self.label_queries,
            &self.list_cached,
            &self.owner_lookups,
            &self.fetch_one,
            &self.discovery,
        ]
        .iter()
        .map(|c| c.load(Ordering::SeqCst))
        .sum()
    }
}

pub struct FakeProvider {
    objects: Vec<DynamicObject>,
    types: HashMap<(String, String), ResourceType>,
    /// Kinds left out of `list_cached`, reachable only through `fetch_one`
    uncached_kinds: HashSet<String>,
    delay: Option<Duration>,
    pub calls: CallCounts,
    pub selectors: Mutex<Vec<String>>,
    pub discovery_requests: Mutex<Vec<(String, String)>>,
}

impl FakeProvider {
    /// Provider knowing the usual built-in kinds plus ArgoCD Applications
    pub fn new() -> Self {
        let mut provider = Self {
            objects: Vec::new(),
            types: HashMap::new(),
            uncached_kinds: HashSet::new(),
            delay: None,
            calls: CallCounts::default(),
            selectors: Mutex::new(Vec::new()),
            discovery_requests: Mutex::new(Vec::new()),
        };
        for (group_version, kind, plural, namespaced) in [
            ("v1", "Pod", "pods", true),
            ("v1", "Service", "services", true),
            ("v1", "ConfigMap", "configmaps", true),
            ("v1", "Namespace", "namespaces", false),
            ("apps/v1", "Deployment", "deployments", true),
            ("apps/v1", "ReplicaSet", "replicasets", true),
            ("argoproj.io/v1alpha1", "Application", "applications", true),
        ] {
            provider = provider.register(group_version, kind, plural, namespaced);
        }
        provider
    }

    pub fn register(mut self, group_version: &str, kind: &str, plural: &str, namespaced: bool) -> Self {
        self.types.insert(
            (group_version.to_string(), kind.to_string()),
            ResourceType::new(group_version, kind, plural, namespaced),
        );
        self
    }

    pub fn with(mut self, obj: DynamicObject) -> Self {
        self.objects.push(obj);
        self
    }

    pub fn with_all(mut self, objs: impl IntoIterator<Item = DynamicObject>) -> Self {
        self.objects.extend(objs);
        self
    }

    pub fn uncached(mut self, kind: &str) -> Self {
        self.uncached_kinds.insert(kind.to_string());
        self
    }

    /// Delay every call, for timeout and cancellation tests
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn count(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }

    pub fn discovery_count(&self, group_version: &str, kind: &str) -> usize {
        self.discovery_requests
            .lock()
            .unwrap()
            .iter()
            .filter(|(gv, k)| gv == group_version && k == kind)
            .count()
    }

    async fn pause(&self) {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
    }

    fn of_type<'a>(
        &'a self,
        resource_type: &'a ResourceType,
    ) -> impl Iterator<Item = &'a DynamicObject> + 'a {
        self.objects.iter().filter(move |obj| {
            obj.types.as_ref().is_some_and(|t| {
                t.kind == resource_type.kind && t.api_version == resource_type.api_version()
            })
        })
    }
}

#[async_trait]
impl ResourceProvider for FakeProvider {
    async fn fetch_by_label(&self, selector: &str) -> Result<Vec<DynamicObject>, ProviderError> {
        self.calls.label_queries.fetch_add(1, Ordering::SeqCst);
        self.selectors.lock().unwrap().push(selector.to_string());
        self.pause().await;

        let (key, value) = selector
            .split_once('=')
            .ok_or_else(|| ProviderError::Other(format!("unsupported selector {}", selector)))?;
        Ok(self
            .objects
            .iter()
            .filter(|obj| {
                obj.metadata
                    .labels
                    .as_ref()
                    .and_then(|labels| labels.get(key))
                    .is_some_and(|v| v == value)
            })
            .cloned()
            .collect())
    }

    async fn list_cached(
        &self,
        resource_type: &ResourceType,
    ) -> Result<Vec<DynamicObject>, ProviderError> {
        self.calls.list_cached.fetch_add(1, Ordering::SeqCst);
        self.pause().await;

        if self.uncached_kinds.contains(&resource_type.kind) {
            return Ok(Vec::new());
        }
        Ok(self.of_type(resource_type).cloned().collect())
    }

    async fn list_by_owner_uid(&self, uid: &str) -> Result<Vec<DynamicObject>, ProviderError> {
        self.calls.owner_lookups.fetch_add(1, Ordering::SeqCst);
        self.pause().await;

        Ok(self
            .objects
            .iter()
            .filter(|obj| {
                obj.metadata
                    .owner_references
                    .iter()
                    .flatten()
                    .any(|r| r.uid == uid)
            })
            .cloned()
            .collect())
    }

    async fn fetch_one(
        &self,
        resource_type: &ResourceType,
        name: &str,
        namespace: Option<&str>,
        expected_uid: Option<&str>,
    ) -> Result<Option<DynamicObject>, ProviderError> {
        self.calls.fetch_one.fetch_add(1, Ordering::SeqCst);
        self.pause().await;

        Ok(self
            .of_type(resource_type)
            .find(|obj| {
                obj.metadata.name.as_deref() == Some(name)
                    && (namespace.is_none() || obj.metadata.namespace.as_deref() == namespace)
                    && expected_uid.is_none_or(|uid| obj.metadata.uid.as_deref() == Some(uid))
            })
            .cloned())
    }

    async fn resolve_resource_type(
        &self,
        group_version: &str,
        kind: &str,
    ) -> Result<ResourceType, ProviderError> {
        self.calls.discovery.fetch_add(1, Ordering::SeqCst);
        self.discovery_requests
            .lock()
            .unwrap()
            .push((group_version.to_string(), kind.to_string()));
        self.pause().await;

        self.types
            .get(&(group_version.to_string(), kind.to_string()))
            .cloned()
            .ok_or_else(|| ProviderError::Discovery {
                group_version: group_version.to_string(),
                kind: kind.to_string(),
            })
    }
}

/// A typed object with a UID derived from its name
pub fn object(api_version: &str, kind: &str, namespace: Option<&str>, name: &str) -> DynamicObject {
    DynamicObject {
        types: Some(TypeMeta {
            api_version: api_version.to_string(),
            kind: kind.to_string(),
        }),
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: namespace.map(str::to_string),
            uid: Some(format!("uid-{}-{}", kind.to_lowercase(), name)),
            ..Default::default()
        },
        data: serde_json::Value::Null,
    }
}

pub fn config_map(name: &str) -> DynamicObject {
    object("v1", "ConfigMap", Some("default"), name)
}

/// Add an ownerReference pointing at `owner`
pub fn owned_by(mut obj: DynamicObject, owner: &DynamicObject) -> DynamicObject {
    let types = owner.types.clone().unwrap_or_default();
    obj.metadata
        .owner_references
        .get_or_insert_with(Vec::new)
        .push(OwnerReference {
            api_version: types.api_version,
            kind: types.kind,
            name: owner.metadata.name.clone().unwrap_or_default(),
            uid: owner.metadata.uid.clone().unwrap_or_default(),
            ..Default::default()
        });
    obj
}

pub fn labeled(mut obj: DynamicObject, key: &str, value: &str) -> DynamicObject {
    obj.metadata
        .labels
        .get_or_insert_with(BTreeMap::new)
        .insert(key.to_string(), value.to_string());
    obj
}

pub fn uid(obj: &DynamicObject) -> &str {
    obj.metadata.uid.as_deref().unwrap_or_default()
}
