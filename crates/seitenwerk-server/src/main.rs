// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Seitenwerk: document image analysis service.
//
// Entry point. Initialises logging, resolves configuration, loads the model
// toolkit once, and serves until Ctrl-C.

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;

use seitenwerk_core::config::ServerConfig;
use seitenwerk_core::error::Result;
use seitenwerk_document::{ModelContext, ModelToolkit};
use seitenwerk_server::RpcServer;
use seitenwerk_server::cli::Cli;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Seitenwerk failed");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<()> {
    let config = Cli::parse().resolve_config()?;
    tracing::info!(
        addr = %config.socket_addr(),
        stages = ?config.stages,
        "Seitenwerk starting"
    );

    let toolkit = load_toolkit(&config)?;
    let context = Arc::new(ModelContext::new(toolkit, config.stages));

    let mut server = RpcServer::new(config, context);
    server.start().await?;

    tokio::signal::ctrl_c().await?;
    tracing::info!(
        active_connections = server.active_connections(),
        "Shutdown requested"
    );
    server.stop().await
}

#[cfg(feature = "ocr")]
fn load_toolkit(config: &ServerConfig) -> Result<Arc<dyn ModelToolkit>> {
    let toolkit = seitenwerk_document::OcrsToolkit::from_model_dir(config.model_dir.as_deref())?;
    Ok(Arc::new(toolkit))
}

#[cfg(not(feature = "ocr"))]
fn load_toolkit(_config: &ServerConfig) -> Result<Arc<dyn ModelToolkit>> {
    Err(seitenwerk_core::SeitenwerkError::ToolkitUnavailable(
        "built without the `ocr` feature; rebuild with `--features ocr`".into(),
    ))
}
