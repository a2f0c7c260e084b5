//! Cluster access
//!
//! Client construction, root lookups used by the CLI, and [`KubeProvider`],
//! the API-backed implementation of the graph builder's resource provider.
//!
//! The client honours `HTTP_PROXY`, `HTTPS_PROXY` and `NO_PROXY`. When the API
//! server looks like an internal host it is appended to `NO_PROXY` so that a
//! corporate proxy does not swallow cluster traffic.

pub mod fetch;
pub mod provider;

pub use fetch::{fetch_helm_release, fetch_object, resolve_kind};
pub use provider::KubeProvider;

use anyhow::{Context, Result};
use kube::{Client, Config};
use url::Url;

/// Create a client from the inferred kubeconfig (in-cluster, `KUBECONFIG`, or
/// `~/.kube/config`)
pub async fn create_client() -> Result<Client> {
    let config = Config::infer()
        .await
        .context("Failed to infer Kubernetes configuration")?;

    let server = Url::parse(&config.cluster_url.to_string()).ok();
    if let Some(host) = server.as_ref().and_then(Url::host_str) {
        ensure_no_proxy_bypass(host);
    }

    tracing::debug!("Connecting to {}", config.cluster_url);
    Client::try_from(config).context("Failed to create Kubernetes client")
}

/// Add an internal API server host to NO_PROXY unless already covered
fn ensure_no_proxy_bypass(host: &str) {
    // NO_PROXY takes precedence over no_proxy
    let current = ["NO_PROXY", "no_proxy"]
        .iter()
        .filter_map(|var| std::env::var(var).ok())
        .find(|value| !value.is_empty())
        .unwrap_or_default();

    let Some(updated) = no_proxy_with(&current, host) else {
        return;
    };
    tracing::debug!("Adding {} to NO_PROXY", host);

    // SAFETY: the runtime is already multi-threaded here. Its only other task
    // is the ctrl-c listener in main, which never touches the environment, and
    // no client exists yet to read the proxy variables concurrently.
    unsafe {
        std::env::set_var("NO_PROXY", &updated);
        std::env::set_var("no_proxy", &updated);
    }
}

/// NO_PROXY value covering `host`, or `None` when nothing needs to change
fn no_proxy_with(current: &str, host: &str) -> Option<String> {
    if !is_internal_host(host) || no_proxy_contains(current, host) {
        return None;
    }
    Some(if current.is_empty() {
        host.to_string()
    } else {
        format!("{},{}", current, host)
    })
}

const INTERNAL_PREFIXES: &[&str] = &["dev", "test", "staging", "qa", "uat", "internal"];

/// Heuristic for hosts that should never go through a corporate proxy
///
/// Private and loopback addresses, internal TLDs, and hostnames with an
/// environment-style label (`dev`, `staging`, ...) anywhere before the TLD.
fn is_internal_host(host: &str) -> bool {
    let private_ip = ["10.", "172.", "192.168."]
        .iter()
        .any(|prefix| host.starts_with(prefix));
    if private_ip || matches!(host, "localhost" | "127.0.0.1" | "::1") {
        return true;
    }

    if [".local", ".internal"].iter().any(|tld| host.ends_with(tld)) {
        return true;
    }

    let labels: Vec<&str> = host.split('.').collect();
    if labels.len() < 2 {
        return false;
    }

    let second_level = labels[labels.len() - 2];
    if matches!(second_level, "corp" | "internal" | "int" | "local") {
        return true;
    }

    labels[..labels.len() - 1]
        .iter()
        .any(|label| INTERNAL_PREFIXES.iter().any(|p| label.starts_with(p)))
}

/// Whether a NO_PROXY list already covers `host`
///
/// `example.com` and `.example.com` both cover the domain and its subdomains.
fn no_proxy_contains(no_proxy: &str, host: &str) -> bool {
    no_proxy
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .any(|pattern| {
            let domain = pattern.strip_prefix('.').unwrap_or(pattern);
            host == domain || host.ends_with(&format!(".{}", domain))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_internal_host() {
        for host in [
            "10.0.0.1",
            "192.168.1.1",
            "localhost",
            "::1",
            "pod.svc.cluster.local",
            "api.internal",
            "dev.example.corp",
            "test.example.int",
            "staging.api.example",
            "devprod.example.com",
        ] {
            assert!(is_internal_host(host), "{}", host);
        }
    }

    #[test]
    fn test_is_internal_host_public_domains() {
        for host in ["example.com", "api.github.com", "kubernetes.io", "dev"] {
            assert!(!is_internal_host(host), "{}", host);
        }
    }

    #[test]
    fn test_no_proxy_with() {
        assert_eq!(no_proxy_with("", "10.0.0.1").as_deref(), Some("10.0.0.1"));
        assert_eq!(
            no_proxy_with("localhost", "api.dev.example.com").as_deref(),
            Some("localhost,api.dev.example.com")
        );
        assert_eq!(no_proxy_with(".example.com", "api.dev.example.com"), None);
        assert_eq!(no_proxy_with("", "api.github.com"), None);
    }

    #[test]
    fn test_no_proxy_contains() {
        assert!(no_proxy_contains("localhost, example.com", "example.com"));
        assert!(no_proxy_contains(".example.com", "example.com"));
        assert!(no_proxy_contains(".example.com", "api.sub.example.com"));
        assert!(no_proxy_contains("example.com", "sub.example.com"));
        assert!(no_proxy_contains(".prod.example.com", "dev.prod.example.com"));

        assert!(!no_proxy_contains("", "example.com"));
        assert!(!no_proxy_contains(".other.com", "example.com"));
        // Suffix match is per label, not per character
        assert!(!no_proxy_contains(".prod.example.com", "devprod.example.com"));
    }
}
