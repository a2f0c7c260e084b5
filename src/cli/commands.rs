//! CLI command handlers

use anyhow::{Context, Result};
use clap::{Args, Subcommand};

use super::output::{self, OutputFormat};
use crate::config::{self, CONFIG_KEYS, Config, ConfigLoader, paths};
use crate::graph::{
    CancelHandle, GraphBuilder, GraphRoot, ResourceGraph, compute_layout_with,
};
use crate::kube::{self as cluster, KubeProvider};

/// Width used when `--width` is absent and the terminal size is unknown
const FALLBACK_WIDTH: u16 = 120;

/// Arguments of the `graph` command
#[derive(Args, Debug)]
pub struct GraphArgs {
    /// Resource kind (e.g. "Deployment", "deployments.apps", "Application")
    pub kind: String,
    /// Resource name
    pub name: String,
    /// Namespace (defaults to the configured defaultNamespace)
    #[arg(long, short = 'n')]
    pub namespace: Option<String>,
    /// Layout width in terminal cells
    #[arg(long)]
    pub width: Option<u16>,
    /// Output format
    #[arg(long, short = 'o', value_enum, default_value_t)]
    pub output: OutputFormat,
}

/// Arguments of the `release` command
#[derive(Args, Debug)]
pub struct ReleaseArgs {
    /// Helm release name
    pub name: String,
    /// Namespace (defaults to the configured defaultNamespace)
    #[arg(long, short = 'n')]
    pub namespace: Option<String>,
    /// Release revision (defaults to the latest stored revision)
    #[arg(long)]
    pub revision: Option<i64>,
    /// Layout width in terminal cells
    #[arg(long)]
    pub width: Option<u16>,
    /// Output format
    #[arg(long, short = 'o', value_enum, default_value_t)]
    pub output: OutputFormat,
}

/// Configuration management subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigSubcommand {
    /// Get configuration value
    Get {
        /// Configuration key (e.g., "graph.maxDepth", "layout.nodeWidth")
        key: Option<String>,
    },
    /// Set configuration value
    Set {
        /// Configuration key (e.g., "graph.maxDepth", "layout.nodeWidth")
        key: String,
        /// Configuration value
        value: String,
    },
    /// List all configuration
    List,
    /// Show configuration file path
    Path,
    /// Validate configuration
    Validate,
}

/// Build and print the graph rooted at one cluster object
pub async fn handle_graph_command(args: GraphArgs, cancel: &CancelHandle) -> Result<()> {
    let config = ConfigLoader::load().context("Failed to load configuration")?;
    let namespace = args
        .namespace
        .unwrap_or_else(|| config.default_namespace.clone());

    let client = cluster::create_client().await?;
    let resource_type = cluster::resolve_kind(&client, &args.kind).await?;
    let obj = cluster::fetch_object(&client, &resource_type, &namespace, &args.name).await?;

    let root = GraphRoot::classify(obj)?;
    tracing::debug!("{} {} uses {} strategy", args.kind, args.name, root.strategy());

    let graph = build_graph(client, &config, root, cancel).await?;
    print_graph(&graph, &config, args.width, args.output)
}

/// Build and print the graph of a Helm release manifest
pub async fn handle_release_command(args: ReleaseArgs, cancel: &CancelHandle) -> Result<()> {
    let config = ConfigLoader::load().context("Failed to load configuration")?;
    let namespace = args
        .namespace
        .unwrap_or_else(|| config.default_namespace.clone());

    let client = cluster::create_client().await?;
    let release = cluster::fetch_helm_release(&client, &namespace, &args.name, args.revision)
        .await?;
    tracing::debug!(
        "Loaded release {} revision {} ({:?})",
        release.name,
        release.revision,
        release.status
    );

    let graph = build_graph(client, &config, GraphRoot::ManifestRelease(release), cancel).await?;
    print_graph(&graph, &config, args.width, args.output)
}

async fn build_graph(
    client: kube::Client,
    config: &Config,
    root: GraphRoot,
    cancel: &CancelHandle,
) -> Result<ResourceGraph> {
    let provider = KubeProvider::new(client, &config.graph)?;
    let mut builder = GraphBuilder::new(provider)
        .with_max_depth(config.graph.max_depth)
        .with_tracking_label(config.graph.tracking_label.clone())
        .with_cancel(cancel);
    if let Some(timeout) = config.graph.call_timeout() {
        builder = builder.with_call_timeout(timeout);
    }

    let graph = builder.build(root).await?;
    Ok(graph)
}

fn print_graph(
    graph: &ResourceGraph,
    config: &Config,
    width: Option<u16>,
    format: OutputFormat,
) -> Result<()> {
    let width = width.unwrap_or_else(terminal_width);
    let layout = compute_layout_with(graph, width, &config.layout.metrics());
    println!("{}", output::render(graph, &layout, format)?);
    Ok(())
}

fn terminal_width() -> u16 {
    width_from_terminal(crossterm::terminal::size())
}

fn width_from_terminal(size: std::io::Result<(u16, u16)>) -> u16 {
    match size {
        Ok((columns, _)) if columns > 0 => columns,
        Ok(_) => FALLBACK_WIDTH,
        Err(e) => {
            // Not a terminal, e.g. piped output
            tracing::debug!("Terminal size unavailable ({}), using {}", e, FALLBACK_WIDTH);
            FALLBACK_WIDTH
        }
    }
}

/// Handle configuration subcommands
pub async fn handle_config_command(cmd: ConfigSubcommand) -> Result<()> {
    match cmd {
        ConfigSubcommand::Get { key } => {
            let config = ConfigLoader::load().context("Failed to load configuration")?;

            if let Some(key) = key {
                let value = config::get_config_value(&config, &key)?;
                println!("{}", value.trim_end());
            } else {
                for key in CONFIG_KEYS {
                    let value = config::get_config_value(&config, key)?;
                    println!("{}: {}", key, value.trim_end().replace('\n', " "));
                }
            }
        }
        ConfigSubcommand::Set { key, value } => {
            // Only the file layer is saved, never environment overrides
            let path = paths::root_config_path();
            let mut config = if path.exists() {
                ConfigLoader::load_file(&path)?
            } else {
                ConfigLoader::load_defaults()
            };

            config::set_config_value(&mut config, &key, &value)
                .with_context(|| format!("Failed to set {} = {}", key, value))?;

            ConfigLoader::save_root(&config).context("Failed to save configuration")?;
            println!("Configuration saved");
        }
        ConfigSubcommand::List => {
            let config = ConfigLoader::load().context("Failed to load configuration")?;
            let yaml =
                serde_yaml::to_string(&config).context("Failed to serialize configuration")?;
            print!("{}", yaml);
        }
        ConfigSubcommand::Path => {
            println!("{}", paths::root_config_path().display());
        }
        ConfigSubcommand::Validate => match ConfigLoader::validate() {
            Ok(()) => {
                println!("Configuration is valid");
            }
            Err(e) => {
                eprintln!("Configuration validation failed: {:#}", e);
                std::process::exit(1);
            }
        },
    }

    Ok(())
}
