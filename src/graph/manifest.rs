//! Multi-document manifest parsing
//!
//! Helm stores the rendered desired state of a release as one string of YAML
//! documents separated by `---` lines. This module splits that string and keeps
//! the documents that describe a Kubernetes object.

use serde_json::Value;

/// One object declared in a manifest
#[derive(Debug, Clone, PartialEq)]
pub struct ManifestDocument {
    pub api_version: String,
    pub kind: String,
    /// `metadata.name`, empty when the document only sets `generateName`
    pub name: String,
    /// Namespace written in the document, if any
    pub namespace: Option<String>,
    /// The full parsed document
    pub object: Value,
}

impl ManifestDocument {
    /// Namespace of the document, falling back to the release namespace
    pub fn namespace_or<'a>(&'a self, default: &'a str) -> &'a str {
        self.namespace.as_deref().unwrap_or(default)
    }
}

/// Split a manifest into raw documents
///
/// A separator is a line that is exactly `---` (trailing whitespace ignored).
/// Documents are trimmed; blank ones are dropped.
pub fn split_documents(manifest: &str) -> Vec<String> {
    let mut documents = Vec::new();
    let mut current = String::new();

    for line in manifest.lines() {
        if line.trim_end() == "---" {
            push_document(&mut documents, &current);
            current.clear();
        } else {
            current.push_str(line);
            current.push('\n');
        }
    }
    push_document(&mut documents, &current);

    documents
}

fn push_document(documents: &mut Vec<String>, raw: &str) {
    let trimmed = raw.trim();
    if !trimmed.is_empty() {
        documents.push(trimmed.to_string());
    }
}

/// Parse every usable object out of a manifest
///
/// Documents that fail to parse, or lack `kind` or `apiVersion`, are logged
/// and skipped. A document without `metadata.name` is kept with an empty name.
pub fn parse_manifest(manifest: &str) -> Vec<ManifestDocument> {
    let documents = split_documents(manifest);
    tracing::debug!("Manifest contains {} non-empty documents", documents.len());

    documents
        .iter()
        .enumerate()
        .filter_map(|(idx, doc)| match parse_document(doc) {
            Ok(parsed) => Some(parsed),
            Err(reason) => {
                tracing::warn!("Skipping manifest document {}: {}", idx, reason);
                None
            }
        })
        .collect()
}

fn parse_document(doc: &str) -> Result<ManifestDocument, String> {
    let object: Value =
        serde_yaml::from_str(doc).map_err(|e| format!("invalid YAML: {}", e))?;

    let field = |value: Option<&Value>| {
        value
            .and_then(|v| v.as_str())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };

    let kind = field(object.get("kind")).ok_or("missing kind")?;
    let api_version = field(object.get("apiVersion")).ok_or("missing apiVersion")?;
    let metadata = object.get("metadata");
    let name = field(metadata.and_then(|m| m.get("name"))).unwrap_or_default();
    let namespace = field(metadata.and_then(|m| m.get("namespace")));

    Ok(ManifestDocument {
        api_version,
        kind,
        name,
        namespace,
        object,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const MANIFEST: &str = r#"---
# Source: podinfo/templates/service.yaml
apiVersion: v1
kind: Service
metadata:
  name: podinfo
---
# Source: podinfo/templates/deployment.yaml
apiVersion: apps/v1
kind: Deployment
metadata:
  name: podinfo
  namespace: other
spec:
  replicas: 2
"#;

    #[test]
    fn test_split_documents_skips_blank() {
        let docs = split_documents("---\n\n---\nkind: A\n---   \n  \n---\nkind: B\n");
        assert_eq!(docs, vec!["kind: A".to_string(), "kind: B".to_string()]);
    }

    #[test]
    fn test_separator_must_be_whole_line() {
        let docs = split_documents("data: |\n  a---b\n  --- not a separator\nkind: A\n");
        assert_eq!(docs.len(), 1);
    }

    #[test]
    fn test_parse_manifest_reads_objects() {
        let docs = parse_manifest(MANIFEST);
        assert_eq!(docs.len(), 2);

        assert_eq!(docs[0].kind, "Service");
        assert_eq!(docs[0].api_version, "v1");
        assert_eq!(docs[0].name, "podinfo");
        assert_eq!(docs[0].namespace, None);
        assert_eq!(docs[0].namespace_or("apps"), "apps");

        assert_eq!(docs[1].kind, "Deployment");
        assert_eq!(docs[1].namespace_or("apps"), "other");
        assert_eq!(docs[1].object["spec"]["replicas"], 2);
    }

    #[test]
    fn test_parse_manifest_skips_malformed_documents() {
        let manifest = "\
kind: ConfigMap
metadata:
  name: no-api-version
---
apiVersion: v1
kind: \"\"
metadata:
  name: empty-kind
---
apiVersion: v1
kind: ConfigMap
metadata: [unclosed
---
# only a comment
---
apiVersion: v1
kind: ConfigMap
metadata:
  name: good
";
        let docs = parse_manifest(manifest);
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].name, "good");
    }

    #[test]
    fn test_parse_manifest_keeps_unnamed_documents() {
        let manifest = "\
apiVersion: v1
kind: ConfigMap
metadata:
  generateName: settings-
---
apiVersion: v1
kind: ConfigMap
";
        let docs = parse_manifest(manifest);
        assert_eq!(docs.len(), 2);
        assert!(docs.iter().all(|d| d.kind == "ConfigMap" && d.name.is_empty()));
        assert_eq!(docs[0].object["metadata"]["generateName"], "settings-");
    }
}
