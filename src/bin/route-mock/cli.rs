//! Command-line interface definitions for the route mock server.

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;

/// Command-line arguments for the route mock server.
#[derive(Debug, Parser)]
#[command(name = "route-mock")]
#[command(author, version, about = "Request-matching mock HTTP server driven by a YAML route plan")]
pub struct Cli {
    /// Address to listen on
    #[arg(long, default_value = "127.0.0.1:19090")]
    pub listen: SocketAddr,

    /// Path to YAML route plan file
    #[arg(long)]
    pub plan: Option<PathBuf>,

    /// Exit with an error if the plan was not strictly followed
    #[arg(long)]
    pub strict: bool,
}
