//! relgraph - Kubernetes resource relationship graphs in the terminal
//!
//! Builds the graph of resources related to one root object (owners and
//! owned resources, ArgoCD-tracked resources, or a Helm release manifest)
//! and prints it as a layered layout.

use anyhow::Result;
use clap::{Parser, Subcommand};
use relgraph::CancelHandle;
use relgraph::cli::{self, ConfigSubcommand, GraphArgs, ReleaseArgs};

/// relgraph - Kubernetes resource relationship graphs
#[derive(Parser, Debug)]
#[command(name = "relgraph", version)]
#[command(about = "Visualize how Kubernetes resources relate to each other", long_about = None)]
struct Args {
    /// Enable debug logging
    #[arg(long, short = 'd', global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

/// Main commands
#[derive(Subcommand, Debug)]
enum Command {
    /// Graph the resources related to a cluster object
    Graph(GraphArgs),
    /// Graph a Helm release manifest against the cluster
    Release(ReleaseArgs),
    /// Configuration management
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging if debug flag is set
    let log_file = cli::init_logging(args.debug);
    if let Some(ref log_path) = log_file {
        eprintln!(
            "Debug logging enabled. Logs written to: {}",
            log_path.display()
        );
    }

    let cancel = CancelHandle::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::debug!("Interrupted, cancelling graph build");
            on_interrupt.cancel();
        }
    });

    match args.command {
        Command::Graph(graph_args) => cli::handle_graph_command(graph_args, &cancel).await,
        Command::Release(release_args) => {
            cli::handle_release_command(release_args, &cancel).await
        }
        Command::Config { subcommand } => cli::handle_config_command(subcommand).await,
    }
}
