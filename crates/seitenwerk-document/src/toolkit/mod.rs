// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Model toolkit boundary.
//
// The detection, recognition, and layout models are external collaborators.
// This module defines the seam: `ModelToolkit` for the calls we make, and
// `RegionPrediction` for the narrow view we take of whatever region objects
// a toolkit returns. Each upstream prediction shape gets one adapter that
// implements `RegionPrediction`; nothing past this module probes raw output.
//
// # Feature Gate
//
// The `ocrs` adapter is only available when the `ocr` feature is enabled.

#[cfg(feature = "ocr")]
pub mod ocr;

use std::any::Any;

use seitenwerk_core::types::Stage;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::image::decoder::DecodedImage;

/// Failure reported by a toolkit.
///
/// Toolkit messages are not a stable contract; the pipeline wraps them
/// before they reach the wire.
#[derive(Debug, Error)]
pub enum ToolkitError {
    #[error("{0}")]
    Failed(String),

    #[error("{0} is not supported by this toolkit")]
    Unsupported(Stage),

    #[error("failed to release resources: {0}")]
    Release(String),
}

/// Read-only view of one predicted region.
///
/// Every accessor but `bbox` is optional; the defaults report "not provided".
/// Values are returned raw and normalized later by the element builder.
pub trait RegionPrediction: Send + Sync + std::fmt::Debug {
    /// Box geometry in any supported shape.
    fn bbox(&self) -> Option<Value>;

    /// Outline geometry in any supported shape.
    fn polygon(&self) -> Option<Value> {
        None
    }

    /// Layout label, e.g. `"Table"`.
    fn label(&self) -> Option<&str> {
        None
    }

    /// Reading position assigned by the model.
    fn position(&self) -> Option<Value> {
        None
    }

    /// Model confidence.
    fn confidence(&self) -> Option<Value> {
        None
    }

    /// Recognized text.
    fn text(&self) -> Option<&str> {
        None
    }
}

/// Region shape for toolkits that report JSON-like attribute bags.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawRegion {
    #[serde(alias = "box")]
    pub bbox: Option<Value>,
    pub polygon: Option<Value>,
    pub label: Option<String>,
    pub position: Option<Value>,
    pub confidence: Option<Value>,
    pub text: Option<String>,
}

impl RegionPrediction for RawRegion {
    fn bbox(&self) -> Option<Value> {
        self.bbox.clone()
    }

    fn polygon(&self) -> Option<Value> {
        self.polygon.clone()
    }

    fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    fn position(&self) -> Option<Value> {
        self.position.clone()
    }

    fn confidence(&self) -> Option<Value> {
        self.confidence.clone()
    }

    fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }
}

/// Output of one toolkit stage for one image.
///
/// Besides the regions, a batch may carry a toolkit-native payload (tensors,
/// intermediate detections) that a later stage of the same toolkit reads back.
/// The whole batch is handed back to [`ModelToolkit::release`] at the end of
/// the request.
pub struct PredictionBatch {
    stage: Stage,
    regions: Vec<Box<dyn RegionPrediction>>,
    native: Option<Box<dyn Any + Send + Sync>>,
}

impl PredictionBatch {
    pub fn new(stage: Stage, regions: Vec<Box<dyn RegionPrediction>>) -> Self {
        Self {
            stage,
            regions,
            native: None,
        }
    }

    /// A batch with no regions.
    pub fn empty(stage: Stage) -> Self {
        Self::new(stage, Vec::new())
    }

    /// Box up attribute-bag regions.
    pub fn from_raw(stage: Stage, regions: Vec<RawRegion>) -> Self {
        Self::new(
            stage,
            regions
                .into_iter()
                .map(|region| Box::new(region) as Box<dyn RegionPrediction>)
                .collect(),
        )
    }

    /// Attach a toolkit-native payload.
    pub fn with_native<T: Any + Send + Sync>(mut self, native: T) -> Self {
        self.native = Some(Box::new(native));
        self
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn regions(&self) -> &[Box<dyn RegionPrediction>] {
        &self.regions
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    /// Borrow the native payload if it is a `T`.
    pub fn native<T: Any>(&self) -> Option<&T> {
        self.native.as_ref()?.downcast_ref::<T>()
    }
}

impl std::fmt::Debug for PredictionBatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PredictionBatch")
            .field("stage", &self.stage)
            .field("regions", &self.regions.len())
            .field("native", &self.native.is_some())
            .finish()
    }
}

/// Everything a request acquired that must be given back once it ends.
#[derive(Debug, Default)]
pub struct RequestResources {
    pub image: Option<DecodedImage>,
    pub predictions: Vec<PredictionBatch>,
}

impl RequestResources {
    pub fn is_empty(&self) -> bool {
        self.image.is_none() && self.predictions.is_empty()
    }
}

/// The external model toolkit.
///
/// Implementations are loaded once at startup and shared read-only by every
/// worker, hence `Send + Sync`. All calls are synchronous.
pub trait ModelToolkit: Send + Sync {
    /// Short identifier for logs and the health endpoint.
    fn name(&self) -> &str;

    /// Detect text lines (geometry only).
    fn detect_text_lines(&self, image: &DecodedImage) -> Result<PredictionBatch, ToolkitError>;

    /// Recognize the text inside previously detected lines.
    fn recognize_text(
        &self,
        image: &DecodedImage,
        lines: &PredictionBatch,
    ) -> Result<PredictionBatch, ToolkitError>;

    /// Detect vertical separators. Toolkits without such a model report none.
    fn detect_vertical_lines(&self, _image: &DecodedImage) -> Result<PredictionBatch, ToolkitError> {
        Ok(PredictionBatch::empty(Stage::VerticalLines))
    }

    /// Detect layout regions, optionally seeded with a text-line detection.
    fn detect_layout(
        &self,
        image: &DecodedImage,
        prior: Option<&PredictionBatch>,
    ) -> Result<PredictionBatch, ToolkitError>;

    /// Give back a finished request's image and predictions.
    ///
    /// Called exactly once per request, on every exit path, possibly with
    /// nothing to release.
    fn release(&self, resources: RequestResources) -> Result<(), ToolkitError> {
        let RequestResources { image, predictions } = resources;
        if let Some(image) = image {
            image.release();
        }
        drop(predictions);
        Ok(())
    }
}
