use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;

/// Axon tool-calling adapter
#[derive(Debug, Parser)]
#[command(name = "axon", about = "OpenAI-compatible tool calling for text-only models")]
pub struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "axon.toml", env = "AXON_CONFIG")]
    pub config: PathBuf,

    /// Override the listen address
    #[arg(long, env = "AXON_LISTEN")]
    pub listen: Option<SocketAddr>,

    /// Log filter used when `RUST_LOG` is unset
    #[arg(long, default_value = "info", env = "AXON_LOG")]
    pub log: String,
}
