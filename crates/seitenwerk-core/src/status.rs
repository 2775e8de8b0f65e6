// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// RPC status surface.
//
// Every error that leaves the pipeline is classified into one of two codes:
// the caller sent something we cannot analyse (INVALID_ARGUMENT), or something
// went wrong on our side (INTERNAL). The detail string is meant for humans;
// clients should branch on the code only.

use serde::{Deserialize, Serialize};

use crate::error::SeitenwerkError;

/// Status codes carried on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StatusCode {
    Ok,
    /// Empty payload, undecodable image, oversized request.
    InvalidArgument,
    /// Unknown RPC method.
    Unimplemented,
    /// Toolkit failure, assembly failure, or anything else server-side.
    Internal,
}

impl StatusCode {
    /// Canonical upper-case name, as used in the `x-rpc-status` header.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::InvalidArgument => "INVALID_ARGUMENT",
            Self::Unimplemented => "UNIMPLEMENTED",
            Self::Internal => "INTERNAL",
        }
    }

    /// HTTP status used by the transport binding.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::Ok => 200,
            Self::InvalidArgument => 400,
            Self::Unimplemented => 404,
            Self::Internal => 500,
        }
    }
}

impl std::fmt::Display for StatusCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A terminal, non-OK outcome of an RPC call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcStatus {
    pub code: StatusCode,
    pub details: String,
}

impl RpcStatus {
    pub fn new(code: StatusCode, details: impl Into<String>) -> Self {
        Self {
            code,
            details: details.into(),
        }
    }

    pub fn invalid_argument(details: impl Into<String>) -> Self {
        Self::new(StatusCode::InvalidArgument, details)
    }

    pub fn internal(details: impl Into<String>) -> Self {
        Self::new(StatusCode::Internal, details)
    }
}

impl std::fmt::Display for RpcStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.details)
    }
}

impl SeitenwerkError {
    /// Classify this error for the wire.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidInput(_) | Self::InvalidImage(_) => StatusCode::InvalidArgument,
            Self::InvalidGeometry(_)
            | Self::Inference { .. }
            | Self::ToolkitUnavailable(_)
            | Self::Cleanup(_)
            | Self::Config(_)
            | Self::Server(_)
            | Self::Io(_)
            | Self::Serialization(_) => StatusCode::Internal,
        }
    }
}

impl From<&SeitenwerkError> for RpcStatus {
    fn from(err: &SeitenwerkError) -> Self {
        let code = err.status_code();
        let details = match code {
            StatusCode::InvalidArgument => format!("Invalid request: {err}"),
            _ => format!("Error analyzing document: {err}"),
        };
        RpcStatus::new(code, details)
    }
}

impl From<SeitenwerkError> for RpcStatus {
    fn from(err: SeitenwerkError) -> Self {
        RpcStatus::from(&err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Stage;

    #[test]
    fn caller_errors_are_invalid_argument() {
        let empty = SeitenwerkError::InvalidInput("image_data is empty".into());
        assert_eq!(empty.status_code(), StatusCode::InvalidArgument);

        let corrupt = SeitenwerkError::InvalidImage("truncated PNG".into());
        let status = RpcStatus::from(&corrupt);
        assert_eq!(status.code, StatusCode::InvalidArgument);
        assert!(status.details.contains("truncated PNG"));
    }

    #[test]
    fn toolkit_errors_are_internal_and_keep_the_original_text() {
        let err = SeitenwerkError::Inference {
            stage: Stage::Layout,
            detail: "CUDA out of memory".into(),
        };
        let status = RpcStatus::from(err);
        assert_eq!(status.code, StatusCode::Internal);
        assert!(status.details.starts_with("Error analyzing document"));
        assert!(status.details.contains("layout"));
        assert!(status.details.contains("CUDA out of memory"));
    }

    #[test]
    fn geometry_and_cleanup_errors_are_internal() {
        assert_eq!(
            SeitenwerkError::InvalidGeometry("odd polygon".into()).status_code(),
            StatusCode::Internal
        );
        assert_eq!(
            SeitenwerkError::Cleanup("double free".into()).status_code(),
            StatusCode::Internal
        );
    }

    #[test]
    fn http_mapping() {
        assert_eq!(StatusCode::Ok.http_status(), 200);
        assert_eq!(StatusCode::InvalidArgument.http_status(), 400);
        assert_eq!(StatusCode::Unimplemented.http_status(), 404);
        assert_eq!(StatusCode::Internal.http_status(), 500);
    }

    #[test]
    fn status_serializes_with_wire_names() {
        let status = RpcStatus::invalid_argument("empty");
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["code"], "INVALID_ARGUMENT");
        assert_eq!(json["details"], "empty");
    }
}
