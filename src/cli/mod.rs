//! CLI command handling module
//!
//! Handles all CLI subcommands and argument parsing.

mod commands;
mod logging;
pub mod output;

pub use commands::{
    ConfigSubcommand, GraphArgs, ReleaseArgs, handle_config_command, handle_graph_command,
    handle_release_command,
};
pub use logging::init_logging;
pub use output::OutputFormat;
