//! Built-in `clustermap` commands.
use clap::Parser;
use clap::Subcommand;

pub mod server;

/// Multi-cluster infrastructure observability service.
#[derive(Debug, Parser)]
#[command(version, about)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the clustermap configuration to use.
    #[arg(short = 'c', long = "config", default_value_t = String::from("clustermap.yaml"))]
    pub config: String,

    /// Select the clustermap command to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Select the clustermap command to run.
#[derive(Clone, Debug, Subcommand)]
pub enum Command {
    /// Run the clustermap observability server.
    #[command(alias = "run")]
    Server,
}
