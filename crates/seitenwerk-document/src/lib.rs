// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// seitenwerk-document: Result assembly between the wire schema and the model
// toolkit.
//
// Provides image decoding, normalization of heterogeneous model geometry,
// canonical element construction, layout assembly with reading order, and the
// per-request pipeline that drives the toolkit and guarantees cleanup.

pub mod element;
pub mod geometry;
pub mod image;
pub mod layout;
pub mod pipeline;
pub mod toolkit;

// Re-export the primary entry points so callers can use `seitenwerk_document::DocumentPipeline` etc.
pub use crate::element::{
    RegionOutcome, SkipReason, build_element, coerce_confidence, coerce_reading_order,
};
pub use crate::geometry::{GeometryError, normalize_box, normalize_polygon};
pub use crate::image::decoder::{DecodedImage, decode};
pub use crate::layout::{LayoutAssembly, assemble};
pub use crate::pipeline::{DocumentPipeline, ModelContext, PipelineState};
pub use crate::toolkit::{
    ModelToolkit, PredictionBatch, RawRegion, RegionPrediction, RequestResources, ToolkitError,
};

#[cfg(feature = "ocr")]
pub use crate::toolkit::ocr::{OcrConfig, OcrsToolkit};
