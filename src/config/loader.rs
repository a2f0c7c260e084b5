//! Configuration loading and validation
//!
//! Handles loading configuration from the config file and the environment
//! according to precedence rules.

use super::{defaults, paths, schema::Config, split_kind_ref};
use anyhow::{Context, Result};
use std::path::Path;

/// Configuration loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with all layers applied
    ///
    /// Precedence order (highest to lowest):
    /// 1. Environment variable overrides
    /// 2. Root config file
    /// 3. Built-in defaults
    ///
    /// A missing config file is not an error; an unreadable or invalid one is.
    pub fn load() -> Result<Config> {
        let path = paths::root_config_path();
        let config = if path.exists() {
            Self::load_file(&path)?
        } else {
            Self::load_defaults()
        };

        Ok(Self::apply_env_overrides(config))
    }

    /// Load configuration from a file
    ///
    /// Keys absent from the file keep their default values.
    pub fn load_file(path: &Path) -> Result<Config> {
        if !path.exists() {
            return Err(anyhow::anyhow!("Config file not found: {}", path.display()));
        }

        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = serde_yaml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Validate the root config file and the merged configuration
    ///
    /// Fails on invalid YAML syntax, invalid value types, file read errors,
    /// malformed kind references and zero-sized layout cells.
    pub fn validate() -> Result<()> {
        let root_path = paths::root_config_path();
        if root_path.exists() {
            let config = Self::load_file(&root_path)?;
            Self::check(&config)
                .with_context(|| format!("Invalid config file: {}", root_path.display()))?;
        }

        let merged = Self::load().context("Failed to load merged configuration")?;
        Self::check(&merged)
    }

    /// Semantic checks serde cannot express
    pub fn check(config: &Config) -> Result<()> {
        for kind_ref in config
            .graph
            .indexed_kinds
            .iter()
            .chain(&config.graph.label_kinds)
        {
            split_kind_ref(kind_ref)?;
        }

        if config.graph.tracking_label.trim().is_empty() {
            return Err(anyhow::anyhow!("graph.trackingLabel must not be empty"));
        }

        if config.layout.node_width == 0 || config.layout.node_height == 0 {
            return Err(anyhow::anyhow!(
                "layout.nodeWidth and layout.nodeHeight must be greater than 0"
            ));
        }

        Ok(())
    }

    /// Load default configuration
    pub fn load_defaults() -> Config {
        defaults::default_config()
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(mut config: Config) -> Config {
        // RELGRAPH_MAX_DEPTH override
        if let Ok(depth) = std::env::var("RELGRAPH_MAX_DEPTH") {
            match depth.parse::<usize>() {
                Ok(val) => config.graph.max_depth = val,
                Err(_) => tracing::warn!("Ignoring invalid RELGRAPH_MAX_DEPTH: {}", depth),
            }
        }

        // RELGRAPH_TRACKING_LABEL override
        if let Ok(label) = std::env::var("RELGRAPH_TRACKING_LABEL") {
            if !label.trim().is_empty() {
                config.graph.tracking_label = label;
            }
        }

        // RELGRAPH_CALL_TIMEOUT_SECS override
        if let Ok(timeout) = std::env::var("RELGRAPH_CALL_TIMEOUT_SECS") {
            match timeout.parse::<u64>() {
                Ok(val) => config.graph.call_timeout_secs = val,
                Err(_) => {
                    tracing::warn!("Ignoring invalid RELGRAPH_CALL_TIMEOUT_SECS: {}", timeout)
                }
            }
        }

        config
    }

    /// Save configuration to a file
    pub fn save(config: &Config, path: &Path) -> Result<()> {
        // Ensure directory exists
        if let Some(parent) = path.parent() {
            paths::ensure_dir(parent)?;
        }

        let yaml =
            serde_yaml::to_string(config).context("Failed to serialize configuration to YAML")?;

        std::fs::write(path, yaml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Save root configuration
    pub fn save_root(config: &Config) -> Result<()> {
        Self::save(config, &paths::root_config_path())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_defaults() {
        let config = ConfigLoader::load_defaults();
        assert_eq!(config.graph.max_depth, 5);
        assert_eq!(config.default_namespace, "default");
    }

    #[test]
    fn test_save_then_load_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nested").join("config.yaml");

        let mut config = Config::default();
        config.graph.max_depth = 2;
        config.layout.margin = 0;
        ConfigLoader::save(&config, &path).unwrap();

        let loaded = ConfigLoader::load_file(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_load_file_errors() {
        let tmp = tempfile::tempdir().unwrap();
        let missing = tmp.path().join("missing.yaml");
        assert!(ConfigLoader::load_file(&missing).is_err());

        let broken = tmp.path().join("broken.yaml");
        std::fs::write(&broken, "graph:\n  maxDepth: [nope\n").unwrap();
        assert!(ConfigLoader::load_file(&broken).is_err());
    }

    #[test]
    fn test_check_rejects_bad_values() {
        let mut config = Config::default();
        assert!(ConfigLoader::check(&config).is_ok());

        config.graph.label_kinds.push("Deployment".to_string());
        assert!(ConfigLoader::check(&config).is_err());

        let mut config = Config::default();
        config.layout.node_height = 0;
        assert!(ConfigLoader::check(&config).is_err());
    }

    #[test]
    fn test_env_overrides() {
        // SAFETY: set_var is unsafe in Rust 2024 due to potential data races.
        // No other test reads these variables.
        unsafe {
            std::env::set_var("RELGRAPH_MAX_DEPTH", "7");
            std::env::set_var("RELGRAPH_TRACKING_LABEL", "argocd.argoproj.io/instance");
            std::env::set_var("RELGRAPH_CALL_TIMEOUT_SECS", "not-a-number");
        }

        let config = ConfigLoader::apply_env_overrides(Config::default());

        assert_eq!(config.graph.max_depth, 7);
        assert_eq!(config.graph.tracking_label, "argocd.argoproj.io/instance");
        assert_eq!(config.graph.call_timeout_secs, 10);

        // SAFETY: see above
        unsafe {
            std::env::remove_var("RELGRAPH_MAX_DEPTH");
            std::env::remove_var("RELGRAPH_TRACKING_LABEL");
            std::env::remove_var("RELGRAPH_CALL_TIMEOUT_SECS");
        }
    }
}
