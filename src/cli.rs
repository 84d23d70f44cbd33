//! Command line interface for the `wirework` binary.
//!
//! Shared with the build script, which renders it as a man page.

use std::{net::SocketAddr, path::PathBuf};

use clap::Parser;

/// Command line arguments for the `wirework` binary.
#[derive(Debug, Parser)]
#[command(
    name = "wirework",
    version,
    about = "Run a wirework echo server on message id 0"
)]
pub struct Cli {
    /// TOML configuration file. Flags override its values.
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Interface to bind.
    #[arg(long)]
    pub host: Option<String>,

    /// TCP port to bind.
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Number of dispatch workers; 0 handles requests inline.
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Serve Prometheus metrics on this address.
    #[arg(long, value_name = "ADDR")]
    pub metrics_addr: Option<SocketAddr>,
}
