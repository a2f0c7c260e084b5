//! Helm release model and storage Secret decoding
//!
//! Helm v3 stores each release revision in a Secret named
//! `sh.helm.release.v1.<release>.v<revision>` of type `helm.sh/release.v1`.
//! The `release` key holds base64-encoded, usually gzipped, JSON that includes
//! the rendered manifest.

use anyhow::{Context, Result};
use base64::Engine;
use k8s_openapi::api::core::v1::Secret;
use serde_json::Value;
use std::io::Read;

/// Pseudo-kind used to identify Helm releases in a graph
pub const HELM_RELEASE_KIND: &str = "HelmRelease";

/// Pseudo-apiVersion used to identify Helm releases in a graph
pub const HELM_RELEASE_API_VERSION: &str = "helm.sh/release.v1";

/// Secret type Helm uses for release storage
pub const HELM_SECRET_TYPE: &str = "helm.sh/release.v1";

/// A decoded Helm release revision
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HelmRelease {
    pub name: String,
    pub namespace: String,
    pub revision: i64,
    pub status: Option<String>,
    pub chart: Option<String>,
    pub chart_version: Option<String>,
    pub app_version: Option<String>,
    /// Rendered multi-document manifest
    pub manifest: String,
}

impl HelmRelease {
    /// Name of the storage Secret for a release revision
    pub fn secret_name(release: &str, revision: i64) -> String {
        format!("sh.helm.release.v1.{}.v{}", release, revision)
    }

    /// Decode a release from its storage Secret
    pub fn from_secret(secret: &Secret) -> Result<Self> {
        if let Some(secret_type) = secret.type_.as_deref() {
            if secret_type != HELM_SECRET_TYPE {
                anyhow::bail!("Secret has type {}, expected {}", secret_type, HELM_SECRET_TYPE);
            }
        }

        let release_data = secret
            .data
            .as_ref()
            .and_then(|data| data.get("release"))
            .ok_or_else(|| anyhow::anyhow!("Secret missing 'release' key"))?;

        let mut release = Self::decode(&release_data.0)?;
        if release.namespace.is_empty() {
            release.namespace = secret.metadata.namespace.clone().unwrap_or_default();
        }
        Ok(release)
    }

    /// Decode the Helm payload stored under the Secret's `release` key
    ///
    /// `payload` is the Secret value after the API's own base64 layer has been
    /// removed: Helm's base64 text, optionally wrapping gzip.
    pub fn decode(payload: &[u8]) -> Result<Self> {
        let decoded = base64::engine::general_purpose::STANDARD
            .decode(payload)
            .context("Failed to decode base64 release data")?;

        // gzip magic bytes
        let is_gzipped =
            decoded.len() >= 3 && decoded[0] == 0x1f && decoded[1] == 0x8b && decoded[2] == 0x08;

        let decompressed = if is_gzipped {
            let mut decoder = flate2::read::GzDecoder::new(&decoded[..]);
            let mut buf = Vec::new();
            decoder
                .read_to_end(&mut buf)
                .context("Failed to decompress gzip release data")?;
            buf
        } else {
            decoded
        };

        let release_json: Value =
            serde_json::from_slice(&decompressed).context("Failed to parse release JSON")?;
        Self::from_json(&release_json)
    }

    /// Build a release from Helm's release JSON
    pub fn from_json(release_json: &Value) -> Result<Self> {
        let str_field = |v: Option<&Value>| v.and_then(|v| v.as_str()).map(str::to_string);

        let name = str_field(release_json.get("name"))
            .filter(|n| !n.is_empty())
            .ok_or_else(|| anyhow::anyhow!("Release JSON missing 'name' field"))?;
        let manifest = str_field(release_json.get("manifest"))
            .ok_or_else(|| anyhow::anyhow!("Release JSON missing 'manifest' field"))?;
        let chart_metadata = release_json.get("chart").and_then(|c| c.get("metadata"));

        Ok(Self {
            name,
            namespace: str_field(release_json.get("namespace")).unwrap_or_default(),
            revision: release_json
                .get("version")
                .and_then(|v| v.as_i64())
                .unwrap_or(0),
            status: str_field(release_json.get("info").and_then(|i| i.get("status"))),
            chart: str_field(chart_metadata.and_then(|m| m.get("name"))),
            chart_version: str_field(chart_metadata.and_then(|m| m.get("version"))),
            app_version: str_field(chart_metadata.and_then(|m| m.get("appVersion"))),
            manifest,
        })
    }
}

/// Pick the newest revision out of a release's storage Secrets
///
/// Revisions come from the `version` label Helm sets on every storage Secret.
pub fn latest_release_secret(secrets: &[Secret]) -> Option<&Secret> {
    secrets.iter().max_by_key(|secret| {
        secret
            .metadata
            .labels
            .as_ref()
            .and_then(|labels| labels.get("version"))
            .and_then(|v| v.parse::<i64>().ok())
            .unwrap_or(0)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use k8s_openapi::ByteString;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
    use serde_json::json;
    use std::collections::BTreeMap;
    use std::io::Write;

    fn release_json() -> Value {
        json!({
            "name": "podinfo",
            "namespace": "apps",
            "version": 4,
            "info": { "status": "deployed" },
            "chart": { "metadata": { "name": "podinfo", "version": "6.5.0", "appVersion": "6.5.0" } },
            "manifest": "---\napiVersion: v1\nkind: Service\nmetadata:\n  name: podinfo\n"
        })
    }

    fn encode(gzip: bool) -> Vec<u8> {
        let raw = serde_json::to_vec(&release_json()).unwrap();
        let bytes = if gzip {
            let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(&raw).unwrap();
            encoder.finish().unwrap()
        } else {
            raw
        };
        base64::engine::general_purpose::STANDARD
            .encode(bytes)
            .into_bytes()
    }

    fn secret(payload: Vec<u8>, version: &str) -> Secret {
        let mut labels = BTreeMap::new();
        labels.insert("owner".to_string(), "helm".to_string());
        labels.insert("version".to_string(), version.to_string());
        let mut data = BTreeMap::new();
        data.insert("release".to_string(), ByteString(payload));
        Secret {
            metadata: ObjectMeta {
                name: Some(HelmRelease::secret_name("podinfo", 4)),
                namespace: Some("apps".to_string()),
                labels: Some(labels),
                ..Default::default()
            },
            type_: Some(HELM_SECRET_TYPE.to_string()),
            data: Some(data),
            ..Default::default()
        }
    }

    #[test]
    fn test_decode_gzipped_release() {
        let release = HelmRelease::decode(&encode(true)).unwrap();
        assert_eq!(release.name, "podinfo");
        assert_eq!(release.namespace, "apps");
        assert_eq!(release.revision, 4);
        assert_eq!(release.status.as_deref(), Some("deployed"));
        assert_eq!(release.chart.as_deref(), Some("podinfo"));
        assert_eq!(release.chart_version.as_deref(), Some("6.5.0"));
        assert!(release.manifest.contains("kind: Service"));
    }

    #[test]
    fn test_decode_plain_release() {
        let release = HelmRelease::decode(&encode(false)).unwrap();
        assert_eq!(release.name, "podinfo");
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(HelmRelease::decode(b"!!! not base64").is_err());
        let not_json = base64::engine::general_purpose::STANDARD.encode("hello");
        assert!(HelmRelease::decode(not_json.as_bytes()).is_err());
    }

    #[test]
    fn test_from_secret() {
        let release = HelmRelease::from_secret(&secret(encode(true), "4")).unwrap();
        assert_eq!(release.name, "podinfo");

        let mut wrong_type = secret(encode(true), "4");
        wrong_type.type_ = Some("Opaque".to_string());
        assert!(HelmRelease::from_secret(&wrong_type).is_err());
    }

    #[test]
    fn test_latest_release_secret() {
        let secrets = vec![
            secret(encode(false), "2"),
            secret(encode(false), "10"),
            secret(encode(false), "9"),
        ];
        let latest = latest_release_secret(&secrets).unwrap();
        assert_eq!(
            latest.metadata.labels.as_ref().unwrap().get("version").map(String::as_str),
            Some("10")
        );
        assert!(latest_release_secret(&[]).is_none());
    }

    #[test]
    fn test_secret_name() {
        assert_eq!(
            HelmRelease::secret_name("podinfo", 4),
            "sh.helm.release.v1.podinfo.v4"
        );
    }
}
