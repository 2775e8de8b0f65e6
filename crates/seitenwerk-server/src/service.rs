// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// AnalyzeDocument service.
//
// Each call is a single synchronous analysis on Tokio's blocking pool. A
// semaphore caps the number of analyses in flight at `max_workers`; calls
// beyond that wait for a permit.

use std::sync::Arc;

use seitenwerk_core::status::RpcStatus;
use seitenwerk_core::types::{DocumentAnalysisRequest, DocumentAnalysisResponse, RequestId};
use seitenwerk_document::{DocumentPipeline, ModelContext};
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tracing::{debug, error, instrument};

/// Health probe reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub toolkit: String,
}

/// Runs analysis requests against the shared models.
#[derive(Debug)]
pub struct AnalysisService {
    pipeline: DocumentPipeline,
    permits: Arc<Semaphore>,
    max_workers: usize,
}

impl AnalysisService {
    pub fn new(context: Arc<ModelContext>, max_workers: usize) -> Self {
        Self {
            pipeline: DocumentPipeline::new(context),
            permits: Arc::new(Semaphore::new(max_workers)),
            max_workers,
        }
    }

    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    /// Analyses currently running.
    pub fn busy_workers(&self) -> usize {
        self.max_workers - self.permits.available_permits()
    }

    pub fn health(&self) -> HealthStatus {
        HealthStatus {
            status: "SERVING".into(),
            toolkit: self.pipeline.context().toolkit().name().to_owned(),
        }
    }

    /// Analyze one document image.
    ///
    /// # Errors
    ///
    /// Returns `INVALID_ARGUMENT` for empty or undecodable images and
    /// `INTERNAL` for everything else.
    #[instrument(skip_all, fields(request_id = %request_id, payload_bytes = request.image_data.len()))]
    pub async fn analyze_document(
        &self,
        request_id: RequestId,
        request: DocumentAnalysisRequest,
    ) -> Result<DocumentAnalysisResponse, RpcStatus> {
        let permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|_| RpcStatus::internal("Error analyzing document: worker pool closed"))?;
        debug!(busy = self.busy_workers(), "Worker acquired");

        let pipeline = self.pipeline.clone();
        let task = tokio::task::spawn_blocking(move || {
            // Held until the analysis ends, even if the caller goes away.
            let _permit = permit;
            pipeline.analyze(request_id, &request.image_data)
        });

        match task.await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(err)) => Err(RpcStatus::from(err)),
            Err(join_err) => {
                error!(error = %join_err, "Analysis worker task failed");
                Err(RpcStatus::internal(format!(
                    "Error analyzing document: worker task failed: {join_err}"
                )))
            }
        }
    }
}
