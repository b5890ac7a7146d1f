pub mod config;
pub mod doctor;

use clap::{Parser, Subcommand};

/// aegis-gateway — an authorization and audit gateway for AI-tool
/// invocations.
#[derive(Debug, Parser)]
#[command(name = "aegis-gateway", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Path to the runtime configuration file.
    #[arg(long, global = true, default_value = "config.toml")]
    pub config: String,

    /// Path to the resource topology file.
    #[arg(long, global = true, default_value = "resources.toml")]
    pub resources: String,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start the gateway server (default when no subcommand is given).
    Serve,
    /// Run diagnostic checks against the current configuration.
    Doctor,
    /// Configuration utilities.
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Print version information.
    Version,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Parse the config file and report any errors.
    Validate,
    /// Dump the resolved configuration (with defaults) as TOML.
    Show,
}
