// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// findpip: picture extraction server
//
// Entry point. Initialises logging, starts the TCP server on port 6003, and
// runs until interrupted.

use findpip_core::ServerConfig;
use findpip_server::FindpipServer;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = ServerConfig::default();
    tracing::info!(version = %config.version, "findpip starting");

    let mut server = FindpipServer::new(config);
    if let Err(e) = server.start().await {
        tracing::error!(error = %e, "server failed to start");
        std::process::exit(1);
    }

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
    }

    if let Err(e) = server.stop().await {
        tracing::error!(error = %e, "server did not stop cleanly");
    }
    tracing::info!("findpip stopped");
}
