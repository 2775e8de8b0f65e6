// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Seitenwerk: wire types, error taxonomy, and configuration shared across all crates.

pub mod config;
pub mod error;
pub mod status;
pub mod types;

pub use config::{ServerConfig, StageConfig};
pub use error::SeitenwerkError;
pub use status::{RpcStatus, StatusCode};
pub use types::*;
