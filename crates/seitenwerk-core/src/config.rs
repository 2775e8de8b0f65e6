// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Service configuration.
//
// Resolution order: built-in defaults, then an optional JSON file. The
// binary layers its command-line and `SEITENWERK_*` overrides on top and
// validates the result once at startup.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, SeitenwerkError};

/// Which toolkit stages a request runs.
///
/// All enabled is full analysis (text lines, recognition, layout). Turning off
/// everything but `layout` gives the layout-only mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StageConfig {
    pub text_lines: bool,
    pub recognition: bool,
    pub vertical_lines: bool,
    pub layout: bool,
}

impl Default for StageConfig {
    fn default() -> Self {
        Self {
            text_lines: true,
            recognition: true,
            vertical_lines: true,
            layout: true,
        }
    }
}

impl StageConfig {
    /// Layout detection only; no text lines are returned.
    pub fn layout_only() -> Self {
        Self {
            text_lines: false,
            recognition: false,
            vertical_lines: false,
            layout: true,
        }
    }
}

/// Settings for the analysis server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the RPC listener binds to.
    pub bind_address: IpAddr,
    /// Port for the RPC listener (default 50051, 0 picks a free port).
    pub port: u16,
    /// Upper bound on requests analysed concurrently.
    pub max_workers: usize,
    /// Largest accepted request body, in bytes.
    pub max_request_bytes: usize,
    /// Toolkit stages to run per request.
    pub stages: StageConfig,
    /// Directory holding model weights for toolkits that load from disk.
    pub model_dir: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 50051,
            max_workers: 10,
            max_request_bytes: 64 * 1024 * 1024,
            stages: StageConfig::default(),
            model_dir: None,
        }
    }
}

impl ServerConfig {
    /// Read a config from a JSON file. Missing keys take their defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|err| {
            SeitenwerkError::Config(format!("failed to read {}: {}", path.display(), err))
        })?;
        serde_json::from_str(&raw).map_err(|err| {
            SeitenwerkError::Config(format!("failed to parse {}: {}", path.display(), err))
        })
    }

    /// Read `path` if given, defaults otherwise.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }

    /// Reject settings the server cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.max_workers == 0 {
            return Err(SeitenwerkError::Config(
                "max_workers must be at least 1".into(),
            ));
        }
        if self.max_request_bytes == 0 {
            return Err(SeitenwerkError::Config(
                "max_request_bytes must be greater than 0".into(),
            ));
        }
        if self.stages.recognition && !self.stages.text_lines {
            return Err(SeitenwerkError::Config(
                "recognition requires the text_lines stage".into(),
            ));
        }
        Ok(())
    }

    /// Socket address the listener binds to.
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_address, self.port)
    }
}
