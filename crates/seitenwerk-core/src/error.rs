// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Seitenwerk.

use thiserror::Error;

use crate::types::Stage;

/// Top-level error type for all Seitenwerk operations.
#[derive(Debug, Error)]
pub enum SeitenwerkError {
    // -- Caller errors --
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("invalid image: {0}")]
    InvalidImage(String),

    // -- Result assembly --
    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),

    // -- Model toolkit --
    #[error("inference failed during {stage}: {detail}")]
    Inference { stage: Stage, detail: String },

    #[error("model toolkit unavailable: {0}")]
    ToolkitUnavailable(String),

    #[error("resource cleanup failed: {0}")]
    Cleanup(String),

    // -- Service plumbing --
    #[error("configuration error: {0}")]
    Config(String),

    #[error("RPC server error: {0}")]
    Server(String),

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, SeitenwerkError>;
