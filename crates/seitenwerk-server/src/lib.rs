// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// seitenwerk-server: RPC surface of the Seitenwerk analysis service.
//
// A minimal HTTP/1.1 binding on raw TCP: one `AnalyzeDocument` method plus a
// health probe. Analysis runs on Tokio's blocking pool, bounded by a worker
// semaphore.

pub mod cli;
pub mod http;
pub mod server;
pub mod service;

#[cfg(test)]
pub(crate) mod testing;

pub use server::{ANALYZE_PATH, HEALTH_PATH, RpcServer, ServerStatus};
pub use service::{AnalysisService, HealthStatus};
