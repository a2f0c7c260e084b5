//! Configuration schema definitions
//!
//! Defines the structure of configuration files using serde for serialization.

use super::defaults;
use crate::graph::{DEFAULT_MAX_DEPTH, DEFAULT_TRACKING_LABEL, LayoutMetrics};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Namespace used when none is given on the command line
    #[serde(default = "default_namespace")]
    pub default_namespace: String,

    /// Graph discovery configuration
    #[serde(default)]
    pub graph: GraphConfig,

    /// Layout configuration
    #[serde(default)]
    pub layout: LayoutConfig,
}

/// Graph discovery configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GraphConfig {
    /// Generations followed in each direction from a traversal start
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    /// Label an ArgoCD Application uses to track its resources
    #[serde(default = "default_tracking_label")]
    pub tracking_label: String,

    /// Deadline for each cluster call, in seconds (0 disables it)
    #[serde(default = "default_call_timeout_secs")]
    pub call_timeout_secs: u64,

    /// Kinds scanned to build the owner-UID index (`group/version/Kind`)
    #[serde(default = "defaults::indexed_kinds")]
    pub indexed_kinds: Vec<String>,

    /// Kinds searched by tracking-label queries (`group/version/Kind`)
    #[serde(default = "defaults::label_kinds")]
    pub label_kinds: Vec<String>,
}

/// Layout configuration, in terminal cells
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LayoutConfig {
    #[serde(default = "default_node_width")]
    pub node_width: u16,

    #[serde(default = "default_node_height")]
    pub node_height: u16,

    #[serde(default = "default_horizontal_gap")]
    pub horizontal_gap: u16,

    #[serde(default = "default_vertical_gap")]
    pub vertical_gap: u16,

    #[serde(default = "default_margin")]
    pub margin: u16,
}

impl GraphConfig {
    pub fn call_timeout(&self) -> Option<Duration> {
        (self.call_timeout_secs > 0).then(|| Duration::from_secs(self.call_timeout_secs))
    }
}

impl LayoutConfig {
    pub fn metrics(&self) -> LayoutMetrics {
        LayoutMetrics {
            node_width: self.node_width,
            node_height: self.node_height,
            horizontal_gap: self.horizontal_gap,
            vertical_gap: self.vertical_gap,
            margin: self.margin,
        }
    }
}

// Default value functions
fn default_namespace() -> String {
    "default".to_string()
}

fn default_max_depth() -> usize {
    DEFAULT_MAX_DEPTH
}

fn default_tracking_label() -> String {
    DEFAULT_TRACKING_LABEL.to_string()
}

fn default_call_timeout_secs() -> u64 {
    10
}

fn default_node_width() -> u16 {
    LayoutMetrics::default().node_width
}

fn default_node_height() -> u16 {
    LayoutMetrics::default().node_height
}

fn default_horizontal_gap() -> u16 {
    LayoutMetrics::default().horizontal_gap
}

fn default_vertical_gap() -> u16 {
    LayoutMetrics::default().vertical_gap
}

fn default_margin() -> u16 {
    LayoutMetrics::default().margin
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_namespace: default_namespace(),
            graph: GraphConfig::default(),
            layout: LayoutConfig::default(),
        }
    }
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
            tracking_label: default_tracking_label(),
            call_timeout_secs: default_call_timeout_secs(),
            indexed_kinds: defaults::indexed_kinds(),
            label_kinds: defaults::label_kinds(),
        }
    }
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            node_width: default_node_width(),
            node_height: default_node_height(),
            horizontal_gap: default_horizontal_gap(),
            vertical_gap: default_vertical_gap(),
            margin: default_margin(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = Config::default();
        assert_eq!(config.default_namespace, "default");
        assert_eq!(config.graph.max_depth, 5);
        assert_eq!(config.graph.tracking_label, "app.kubernetes.io/instance");
        assert_eq!(config.graph.call_timeout(), Some(Duration::from_secs(10)));
        assert_eq!(config.layout.metrics(), LayoutMetrics::default());
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let yaml = serde_yaml::to_string(&config).unwrap();
        assert!(yaml.contains("maxDepth"));
        assert!(yaml.contains("trackingLabel"));
        assert!(yaml.contains("nodeWidth"));
    }

    #[test]
    fn test_config_deserialization() {
        let yaml = r#"
graph:
  maxDepth: 3
  callTimeoutSecs: 0
  labelKinds:
    - apps/v1/Deployment
layout:
  nodeWidth: 24
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.graph.max_depth, 3);
        assert_eq!(config.graph.call_timeout(), None);
        assert_eq!(config.graph.label_kinds, vec!["apps/v1/Deployment"]);
        // Unset fields keep their defaults
        assert_eq!(config.graph.tracking_label, "app.kubernetes.io/instance");
        assert_eq!(config.graph.indexed_kinds, defaults::indexed_kinds());
        assert_eq!(config.layout.node_width, 24);
        assert_eq!(config.layout.node_height, 5);
    }
}
