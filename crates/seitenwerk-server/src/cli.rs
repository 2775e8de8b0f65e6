// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Command-line arguments of the `seitenwerk` binary.
//
// Each flag can also be given through its `SEITENWERK_*` environment
// variable. Flags win over the config file; anything unset keeps the file
// value or the built-in default.

use std::path::PathBuf;

use clap::Parser;
use seitenwerk_core::config::ServerConfig;
use seitenwerk_core::error::Result;

#[derive(Parser, Debug, Clone, Default, PartialEq, Eq)]
#[command(
    name = "seitenwerk",
    version = env!("CARGO_PKG_VERSION"),
    about = "Document image analysis service: text lines, layout regions, and reading order"
)]
pub struct Cli {
    /// JSON config file
    #[arg(long, short, env = "SEITENWERK_CONFIG")]
    pub config: Option<PathBuf>,

    /// Port for the RPC listener
    #[arg(long, short, env = "SEITENWERK_PORT")]
    pub port: Option<u16>,

    /// Maximum number of analyses running at once
    #[arg(long, env = "SEITENWERK_MAX_WORKERS")]
    pub max_workers: Option<usize>,

    /// Directory holding model weights
    #[arg(long, env = "SEITENWERK_MODEL_DIR")]
    pub model_dir: Option<PathBuf>,
}

impl Cli {
    /// Layer the overrides that were given on top of `config`.
    pub fn apply(&self, mut config: ServerConfig) -> ServerConfig {
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(max_workers) = self.max_workers {
            config.max_workers = max_workers;
        }
        if let Some(dir) = &self.model_dir {
            config.model_dir = Some(dir.clone());
        }
        config
    }

    /// Load the config file (or defaults), apply overrides, and validate.
    pub fn resolve_config(&self) -> Result<ServerConfig> {
        let config = self.apply(ServerConfig::load(self.config.as_deref())?);
        config.validate()?;
        Ok(config)
    }
}
