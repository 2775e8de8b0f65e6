// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Document pipeline: one analysis request from payload bytes to response.
//
//   Received -> ImageDecoded -> Inferred -> Assembled -> Responded
//
// Any step may move the request to Failed instead. Whatever happens, the
// decoded image and every prediction batch are handed back to the toolkit
// exactly once when the request ends, including when a toolkit call panics.
// Each request is a single attempt; there are no internal retries.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use seitenwerk_core::config::StageConfig;
use seitenwerk_core::error::{Result, SeitenwerkError};
use seitenwerk_core::types::{DetectedElement, DocumentAnalysisResponse, RequestId, Stage};
use tracing::{debug, error, info, instrument, warn};

use crate::element::{self, RegionOutcome};
use crate::image::decoder::{self, DecodedImage};
use crate::layout;
use crate::toolkit::{ModelToolkit, PredictionBatch, RequestResources, ToolkitError};

/// Lifecycle of a single analysis request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Received,
    ImageDecoded,
    Inferred,
    Assembled,
    Responded,
    Failed,
}

impl PipelineState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Responded | Self::Failed)
    }
}

/// Process-wide model handles, built once at startup and shared read-only.
pub struct ModelContext {
    toolkit: Arc<dyn ModelToolkit>,
    stages: StageConfig,
}

impl ModelContext {
    pub fn new(toolkit: Arc<dyn ModelToolkit>, stages: StageConfig) -> Self {
        Self { toolkit, stages }
    }

    pub fn toolkit(&self) -> &dyn ModelToolkit {
        self.toolkit.as_ref()
    }

    pub fn stages(&self) -> StageConfig {
        self.stages
    }
}

impl std::fmt::Debug for ModelContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelContext")
            .field("toolkit", &self.toolkit.name())
            .field("stages", &self.stages)
            .finish()
    }
}

/// Runs analysis requests against a shared [`ModelContext`].
///
/// Cheap to clone; every clone shares the same models.
#[derive(Debug, Clone)]
pub struct DocumentPipeline {
    context: Arc<ModelContext>,
}

impl DocumentPipeline {
    pub fn new(context: Arc<ModelContext>) -> Self {
        Self { context }
    }

    pub fn context(&self) -> &ModelContext {
        &self.context
    }

    /// Analyze one encoded page image.
    ///
    /// # Errors
    ///
    /// - [`SeitenwerkError::InvalidInput`] / [`SeitenwerkError::InvalidImage`]
    ///   for empty or undecodable payloads (no inference is attempted).
    /// - [`SeitenwerkError::Inference`] when a toolkit stage fails or panics.
    /// - [`SeitenwerkError::InvalidGeometry`] when the text-line stage returned
    ///   regions and none of them could be built.
    pub fn analyze(
        &self,
        request_id: RequestId,
        image_data: &[u8],
    ) -> Result<DocumentAnalysisResponse> {
        self.analyze_tracked(request_id, image_data).0
    }

    #[instrument(skip_all, fields(request_id = %request_id, payload_bytes = image_data.len()))]
    fn analyze_tracked(
        &self,
        request_id: RequestId,
        image_data: &[u8],
    ) -> (Result<DocumentAnalysisResponse>, PipelineState) {
        let mut scope = RequestScope::new(self.context.toolkit());
        let mut tracker = StateTracker::default();

        let result = self.run(scope.resources(), &mut tracker, image_data);

        match &result {
            Ok(response) => {
                tracker.advance(PipelineState::Responded);
                info!(
                    text_lines = response.text_lines.len(),
                    vertical_lines = response.vertical_lines.len(),
                    layout_elements = response.layout_elements.len(),
                    "Document analyzed"
                );
            }
            Err(err) => {
                let failed_in = tracker.state;
                tracker.advance(PipelineState::Failed);
                let image = scope.resources().image.as_ref();
                let width = image.map(DecodedImage::width);
                let height = image.map(DecodedImage::height);
                let color = image.map(|img| format!("{:?}", img.color_type()));
                if err.status_code() == seitenwerk_core::StatusCode::InvalidArgument {
                    warn!(
                        error = %err,
                        payload_bytes = image_data.len(),
                        ?failed_in,
                        "Rejected analysis request"
                    );
                } else {
                    error!(
                        error = %err,
                        payload_bytes = image_data.len(),
                        ?width,
                        ?height,
                        ?color,
                        ?failed_in,
                        "Document analysis failed"
                    );
                }
            }
        }

        scope.finish();
        (result, tracker.state)
    }

    fn run(
        &self,
        resources: &mut RequestResources,
        tracker: &mut StateTracker,
        image_data: &[u8],
    ) -> Result<DocumentAnalysisResponse> {
        if image_data.is_empty() {
            return Err(SeitenwerkError::InvalidInput("image_data is empty".into()));
        }

        let decoded = decoder::decode(image_data)?;
        let RequestResources { image, predictions } = resources;
        let image: &DecodedImage = image.insert(decoded);
        tracker.advance(PipelineState::ImageDecoded);

        let stages = self.context.stages();
        let toolkit = self.context.toolkit();

        let mut detection_at = None;
        let mut text_at = None;
        let mut vertical_at = None;
        let mut layout_at = None;

        if stages.text_lines {
            let lines = invoke(Stage::TextLines, || toolkit.detect_text_lines(image))?;
            detection_at = Some(hold(predictions, lines));
            text_at = detection_at;

            if stages.recognition {
                let lines = &predictions[predictions.len() - 1];
                let recognized = invoke(Stage::Recognition, || toolkit.recognize_text(image, lines))?;
                text_at = Some(hold(predictions, recognized));
            }
        }

        if stages.vertical_lines {
            let vertical = invoke(Stage::VerticalLines, || toolkit.detect_vertical_lines(image))?;
            vertical_at = Some(hold(predictions, vertical));
        }

        if stages.layout {
            let held: &[PredictionBatch] = predictions;
            let prior = detection_at.map(move |index| &held[index]);
            let regions = invoke(Stage::Layout, || toolkit.detect_layout(image, prior))?;
            layout_at = Some(hold(predictions, regions));
        }
        tracker.advance(PipelineState::Inferred);

        let mut response = DocumentAnalysisResponse::default();
        if let Some(index) = text_at {
            response.text_lines = build_text_lines(&predictions[index])?;
        }
        if let Some(index) = vertical_at {
            response.vertical_lines = build_lines(&predictions[index]).0;
        }
        if let Some(index) = layout_at {
            let (layout_elements, reading_order) = layout::assemble(&predictions[index]).into_parts();
            response.layout_elements = layout_elements;
            response.reading_order = reading_order;
        }
        tracker.advance(PipelineState::Assembled);

        Ok(response)
    }
}

/// Keep a batch for release at the end of the request; returns its index.
fn hold(predictions: &mut Vec<PredictionBatch>, batch: PredictionBatch) -> usize {
    debug!(stage = %batch.stage(), regions = batch.len(), "Stage complete");
    predictions.push(batch);
    predictions.len() - 1
}

/// Call into the toolkit, turning failures and panics into inference errors.
fn invoke<T>(stage: Stage, call: impl FnOnce() -> std::result::Result<T, ToolkitError>) -> Result<T> {
    match panic::catch_unwind(AssertUnwindSafe(call)) {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) => Err(SeitenwerkError::Inference {
            stage,
            detail: err.to_string(),
        }),
        Err(payload) => Err(SeitenwerkError::Inference {
            stage,
            detail: format!("toolkit panicked: {}", panic_message(payload.as_ref())),
        }),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_owned()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic payload".to_owned()
    }
}

/// Build line elements, skipping malformed regions. Returns the elements and
/// the number of regions skipped.
fn build_lines(batch: &PredictionBatch) -> (Vec<DetectedElement>, usize) {
    let mut elements = Vec::with_capacity(batch.len());
    let mut skipped = 0;
    for (index, region) in batch.regions().iter().enumerate() {
        match element::build_region(region.as_ref()) {
            RegionOutcome::Built(element) => elements.push(element),
            RegionOutcome::Skipped(reason) => {
                skipped += 1;
                warn!(stage = %batch.stage(), index, %reason, "Skipping invalid line region");
            }
        }
    }
    (elements, skipped)
}

/// Text lines are the primary result: if the toolkit found lines and none of
/// them survive, there is no partial result to return.
fn build_text_lines(batch: &PredictionBatch) -> Result<Vec<DetectedElement>> {
    let (elements, skipped) = build_lines(batch);
    if elements.is_empty() && skipped > 0 {
        return Err(SeitenwerkError::InvalidGeometry(format!(
            "none of the {skipped} detected text lines had usable geometry"
        )));
    }
    Ok(elements)
}

#[derive(Debug)]
struct StateTracker {
    state: PipelineState,
}

impl Default for StateTracker {
    fn default() -> Self {
        Self {
            state: PipelineState::Received,
        }
    }
}

impl StateTracker {
    fn advance(&mut self, next: PipelineState) {
        debug!(from = ?self.state, to = ?next, "Pipeline state change");
        self.state = next;
    }
}

/// Owns a request's resources and releases them exactly once.
///
/// Release happens in [`finish`](Self::finish) or, if the request unwinds,
/// in `Drop`.
struct RequestScope<'a> {
    toolkit: &'a dyn ModelToolkit,
    resources: Option<RequestResources>,
}

impl<'a> RequestScope<'a> {
    fn new(toolkit: &'a dyn ModelToolkit) -> Self {
        Self {
            toolkit,
            resources: Some(RequestResources::default()),
        }
    }

    fn resources(&mut self) -> &mut RequestResources {
        self.resources.get_or_insert_with(RequestResources::default)
    }

    fn finish(mut self) {
        self.release();
    }

    fn release(&mut self) {
        let Some(resources) = self.resources.take() else {
            return;
        };
        let batches = resources.predictions.len();
        let had_image = resources.image.is_some();
        let toolkit = self.toolkit;

        // Cleanup failures are logged and never replace the request's result.
        match panic::catch_unwind(AssertUnwindSafe(|| toolkit.release(resources))) {
            Ok(Ok(())) => debug!(batches, had_image, "Request resources released"),
            Ok(Err(err)) => {
                let err = SeitenwerkError::Cleanup(err.to_string());
                warn!(error = %err, batches, had_image, "Failed to release request resources");
            }
            Err(payload) => {
                let err = SeitenwerkError::Cleanup(panic_message(payload.as_ref()));
                warn!(error = %err, batches, had_image, "Toolkit panicked while releasing resources");
            }
        }
    }
}

impl Drop for RequestScope<'_> {
    fn drop(&mut self) {
        self.release();
    }
}
