//! # Route Mock Server CLI
//!
//! Runs a mock server with routes from a YAML plan until interrupted, then
//! reports whether the plan was strictly followed.

use std::io;

use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use route_mock_rs::http::MockServer;
use route_mock_rs::plan::RoutePlan;

mod cli;

use cli::Cli;

#[tokio::main]
async fn main() -> io::Result<()> {
    // Initialize logging
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(env_filter).init();

    let cli = Cli::parse();

    // An empty plan is valid: every request is then unmatched
    let plan = if let Some(path) = &cli.plan {
        RoutePlan::load_from_path(path).map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?
    } else {
        RoutePlan::default()
    };

    let server = MockServer::builder().with_listen(cli.listen).start().await?;
    let routes = plan
        .install(&server)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
    info!(routes, "starting route-mock on {}", server.uri());

    tokio::signal::ctrl_c().await?;

    let requests = server.request_count();
    let outcome = server.assert_plan_strictly_followed();
    server.shutdown().await;

    match outcome {
        Ok(()) => {
            info!(requests, "route plan strictly followed");
            Ok(())
        }
        Err(e) => {
            warn!(requests, "route plan not followed: {e}");
            if cli.strict {
                return Err(io::Error::other(e));
            }
            Ok(())
        }
    }
}
