//! Resource fetching utilities
//!
//! Resolves user-supplied kinds and fetches graph roots from the Kubernetes API.

use crate::graph::{HelmRelease, ResourceType};
use crate::graph::release::latest_release_secret;
use anyhow::{Context, Result};
use k8s_openapi::api::core::v1::Secret;
use kube::Api;
use kube::api::ListParams;
use kube::core::{DynamicObject, TypeMeta};
use kube::discovery::{Discovery, Scope};

/// Resolve a kind as typed on the command line
///
/// Accepts the kind (`Deployment`), the plural (`deployments`), or either
/// qualified with the API group (`deployments.apps`, `Application.argoproj.io`).
/// Matching is case-insensitive.
pub async fn resolve_kind(client: &kube::Client, kind: &str) -> Result<ResourceType> {
    let (name, group) = match kind.split_once('.') {
        Some((name, group)) => (name, Some(group)),
        None => (kind, None),
    };

    let discovery = Discovery::new(client.clone())
        .run()
        .await
        .context("Failed to run API discovery")?;

    for api_group in discovery.groups() {
        if group.is_some_and(|g| !g.eq_ignore_ascii_case(api_group.name())) {
            continue;
        }
        for (ar, caps) in api_group.recommended_resources() {
            if ar.kind.eq_ignore_ascii_case(name) || ar.plural.eq_ignore_ascii_case(name) {
                tracing::debug!("Resolved {} to {}/{}", kind, ar.api_version, ar.kind);
                return Ok(ResourceType::new(
                    &ar.api_version,
                    &ar.kind,
                    &ar.plural,
                    matches!(caps.scope, Scope::Namespaced),
                ));
            }
        }
    }

    Err(anyhow::anyhow!("Unknown resource type: {}", kind))
}

/// Fetch the object a graph is rooted at
pub async fn fetch_object(
    client: &kube::Client,
    resource_type: &ResourceType,
    namespace: &str,
    name: &str,
) -> Result<DynamicObject> {
    let ar = resource_type.to_api_resource();
    let api: Api<DynamicObject> = if resource_type.namespaced {
        Api::namespaced_with(client.clone(), namespace, &ar)
    } else {
        Api::all_with(client.clone(), &ar)
    };

    let mut obj = api
        .get(name)
        .await
        .with_context(|| format!("Failed to fetch {} {}", resource_type.kind, name))?;
    if obj.types.is_none() {
        obj.types = Some(TypeMeta {
            api_version: resource_type.api_version(),
            kind: resource_type.kind.clone(),
        });
    }
    Ok(obj)
}

/// Fetch and decode a Helm release from its storage Secrets
///
/// Without a revision the newest stored revision is used.
pub async fn fetch_helm_release(
    client: &kube::Client,
    namespace: &str,
    name: &str,
    revision: Option<i64>,
) -> Result<HelmRelease> {
    let api: Api<Secret> = Api::namespaced(client.clone(), namespace);

    if let Some(revision) = revision {
        let secret_name = HelmRelease::secret_name(name, revision);
        let secret = api
            .get(&secret_name)
            .await
            .with_context(|| format!("Failed to fetch Helm storage Secret {}", secret_name))?;
        return HelmRelease::from_secret(&secret);
    }

    let selector = format!("owner=helm,name={}", name);
    let secrets = api
        .list(&ListParams::default().labels(&selector))
        .await
        .with_context(|| format!("Failed to list Helm storage Secrets for {}", name))?
        .items;
    tracing::debug!("Found {} stored revisions of {}", secrets.len(), name);

    let latest = latest_release_secret(&secrets).ok_or_else(|| {
        anyhow::anyhow!("Helm release {} not found in namespace {}", name, namespace)
    })?;
    HelmRelease::from_secret(latest)
}
