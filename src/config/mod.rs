//! Configuration system for relgraph
//!
//! Layered configuration: built-in defaults, a YAML file in the config
//! directory, and environment overrides.

mod defaults;
pub mod loader;
pub mod paths;
pub mod schema;

pub use loader::ConfigLoader;
pub use schema::{Config, GraphConfig, LayoutConfig};

use anyhow::Context;

/// Every key accepted by [`get_config_value`] and [`set_config_value`]
pub const CONFIG_KEYS: &[&str] = &[
    "defaultNamespace",
    "graph.maxDepth",
    "graph.trackingLabel",
    "graph.callTimeoutSecs",
    "graph.indexedKinds",
    "graph.labelKinds",
    "layout.nodeWidth",
    "layout.nodeHeight",
    "layout.horizontalGap",
    "layout.verticalGap",
    "layout.margin",
];

/// Split a `group/version/Kind` reference into `(group/version, Kind)`
///
/// Core kinds are written `v1/Kind`.
pub fn split_kind_ref(kind_ref: &str) -> anyhow::Result<(&str, &str)> {
    match kind_ref.rsplit_once('/') {
        Some((group_version, kind)) if !group_version.is_empty() && !kind.is_empty() => {
            Ok((group_version, kind))
        }
        _ => Err(anyhow::anyhow!(
            "Invalid kind reference '{}', expected group/version/Kind (e.g. apps/v1/Deployment)",
            kind_ref
        )),
    }
}

/// Get a configuration value by key (dot notation)
pub fn get_config_value(config: &schema::Config, key: &str) -> anyhow::Result<String> {
    match key {
        "defaultNamespace" => Ok(config.default_namespace.clone()),
        "graph.maxDepth" => Ok(config.graph.max_depth.to_string()),
        "graph.trackingLabel" => Ok(config.graph.tracking_label.clone()),
        "graph.callTimeoutSecs" => Ok(config.graph.call_timeout_secs.to_string()),
        "graph.indexedKinds" => serde_yaml::to_string(&config.graph.indexed_kinds)
            .context("Failed to serialize graph.indexedKinds"),
        "graph.labelKinds" => serde_yaml::to_string(&config.graph.label_kinds)
            .context("Failed to serialize graph.labelKinds"),
        "layout.nodeWidth" => Ok(config.layout.node_width.to_string()),
        "layout.nodeHeight" => Ok(config.layout.node_height.to_string()),
        "layout.horizontalGap" => Ok(config.layout.horizontal_gap.to_string()),
        "layout.verticalGap" => Ok(config.layout.vertical_gap.to_string()),
        "layout.margin" => Ok(config.layout.margin.to_string()),
        _ => Err(anyhow::anyhow!("Unknown configuration key: {}", key)),
    }
}

/// Set a configuration value by key (dot notation)
pub fn set_config_value(config: &mut schema::Config, key: &str, value: &str) -> anyhow::Result<()> {
    match key {
        "defaultNamespace" => {
            config.default_namespace = value.to_string();
        }
        "graph.maxDepth" => {
            config.graph.max_depth = value.parse().context("graph.maxDepth must be a number")?;
        }
        "graph.trackingLabel" => {
            if value.trim().is_empty() {
                return Err(anyhow::anyhow!("graph.trackingLabel must not be empty"));
            }
            config.graph.tracking_label = value.to_string();
        }
        "graph.callTimeoutSecs" => {
            config.graph.call_timeout_secs = value
                .parse()
                .context("graph.callTimeoutSecs must be a number")?;
        }
        "graph.indexedKinds" => {
            config.graph.indexed_kinds = parse_kind_list(value)?;
        }
        "graph.labelKinds" => {
            config.graph.label_kinds = parse_kind_list(value)?;
        }
        "layout.nodeWidth" => {
            config.layout.node_width = value
                .parse()
                .context("layout.nodeWidth must be a number")?;
        }
        "layout.nodeHeight" => {
            config.layout.node_height = value
                .parse()
                .context("layout.nodeHeight must be a number")?;
        }
        "layout.horizontalGap" => {
            config.layout.horizontal_gap = value
                .parse()
                .context("layout.horizontalGap must be a number")?;
        }
        "layout.verticalGap" => {
            config.layout.vertical_gap = value
                .parse()
                .context("layout.verticalGap must be a number")?;
        }
        "layout.margin" => {
            config.layout.margin = value.parse().context("layout.margin must be a number")?;
        }
        _ => return Err(anyhow::anyhow!("Unknown configuration key: {}", key)),
    }

    Ok(())
}

/// Parse a YAML array or comma-separated list of kind references
fn parse_kind_list(value: &str) -> anyhow::Result<Vec<String>> {
    let kinds: Vec<String> = if value.trim_start().starts_with('[') {
        serde_yaml::from_str(value)
            .context("Kind list must be a YAML array (e.g., ['apps/v1/Deployment', 'v1/Pod'])")?
    } else {
        value
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    };

    for kind_ref in &kinds {
        split_kind_ref(kind_ref)?;
    }
    Ok(kinds)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_kind_ref() {
        assert_eq!(
            split_kind_ref("apps/v1/Deployment").unwrap(),
            ("apps/v1", "Deployment")
        );
        assert_eq!(split_kind_ref("v1/Pod").unwrap(), ("v1", "Pod"));
        assert!(split_kind_ref("Pod").is_err());
        assert!(split_kind_ref("v1/").is_err());
        assert!(split_kind_ref("/Pod").is_err());
    }

    #[test]
    fn test_every_key_is_readable() {
        let config = Config::default();
        for key in CONFIG_KEYS {
            assert!(get_config_value(&config, key).is_ok(), "{}", key);
        }
        assert!(get_config_value(&config, "ui.skin").is_err());
    }

    #[test]
    fn test_set_config_value() {
        let mut config = Config::default();
        set_config_value(&mut config, "graph.maxDepth", "3").unwrap();
        set_config_value(&mut config, "layout.margin", "0").unwrap();
        set_config_value(&mut config, "graph.labelKinds", "apps/v1/Deployment, v1/Service")
            .unwrap();
        set_config_value(&mut config, "graph.indexedKinds", "['v1/Pod']").unwrap();

        assert_eq!(config.graph.max_depth, 3);
        assert_eq!(config.layout.margin, 0);
        assert_eq!(
            config.graph.label_kinds,
            vec!["apps/v1/Deployment", "v1/Service"]
        );
        assert_eq!(config.graph.indexed_kinds, vec!["v1/Pod"]);
    }

    #[test]
    fn test_set_config_value_rejects_bad_input() {
        let mut config = Config::default();
        assert!(set_config_value(&mut config, "graph.maxDepth", "deep").is_err());
        assert!(set_config_value(&mut config, "graph.trackingLabel", " ").is_err());
        assert!(set_config_value(&mut config, "graph.labelKinds", "Deployment").is_err());
        assert!(set_config_value(&mut config, "nope", "1").is_err());
        assert_eq!(config, Config::default());
    }
}
