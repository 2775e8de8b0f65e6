// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Test toolkit and fixtures shared by the server tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use seitenwerk_core::config::StageConfig;
use seitenwerk_core::types::Stage;
use seitenwerk_document::{
    DecodedImage, ModelContext, ModelToolkit, PredictionBatch, RawRegion, RequestResources,
    ToolkitError,
};
use serde_json::json;

/// Toolkit returning one line and one table, or failing on demand.
///
/// With `layout_delay` set, layout detection sleeps and the toolkit records
/// how many analyses were inside it at once.
#[derive(Default)]
pub struct StaticToolkit {
    pub fail_layout: bool,
    pub layout_delay: Option<Duration>,
    pub releases: AtomicUsize,
    pub(crate) in_layout: AtomicUsize,
    pub(crate) peak_in_layout: AtomicUsize,
}

impl StaticToolkit {
    pub fn slow(delay: Duration) -> Self {
        Self {
            layout_delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn releases(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }

    /// Analyses currently inside layout detection.
    pub fn in_layout(&self) -> usize {
        self.in_layout.load(Ordering::SeqCst)
    }

    /// Most analyses ever inside layout detection at the same time.
    pub fn peak_in_layout(&self) -> usize {
        self.peak_in_layout.load(Ordering::SeqCst)
    }
}

impl ModelToolkit for StaticToolkit {
    fn name(&self) -> &str {
        "static"
    }

    fn detect_text_lines(&self, _image: &DecodedImage) -> Result<PredictionBatch, ToolkitError> {
        Ok(PredictionBatch::from_raw(
            Stage::TextLines,
            vec![RawRegion {
                bbox: Some(json!([2, 2, 30, 10])),
                ..RawRegion::default()
            }],
        ))
    }

    fn recognize_text(
        &self,
        _image: &DecodedImage,
        lines: &PredictionBatch,
    ) -> Result<PredictionBatch, ToolkitError> {
        let regions = lines
            .regions()
            .iter()
            .map(|line| RawRegion {
                bbox: line.bbox(),
                text: Some("Invoice".into()),
                confidence: Some(json!(0.97)),
                ..RawRegion::default()
            })
            .collect();
        Ok(PredictionBatch::from_raw(Stage::Recognition, regions))
    }

    fn detect_layout(
        &self,
        _image: &DecodedImage,
        _prior: Option<&PredictionBatch>,
    ) -> Result<PredictionBatch, ToolkitError> {
        if self.fail_layout {
            return Err(ToolkitError::Failed("layout model out of memory".into()));
        }
        if let Some(delay) = self.layout_delay {
            let inside = self.in_layout.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak_in_layout.fetch_max(inside, Ordering::SeqCst);
            std::thread::sleep(delay);
            self.in_layout.fetch_sub(1, Ordering::SeqCst);
        }
        Ok(PredictionBatch::from_raw(
            Stage::Layout,
            vec![RawRegion {
                bbox: Some(json!([0, 12, 40, 28])),
                label: Some("Table".into()),
                position: Some(json!(0)),
                ..RawRegion::default()
            }],
        ))
    }

    fn release(&self, _resources: RequestResources) -> Result<(), ToolkitError> {
        self.releases.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub fn context(toolkit: Arc<StaticToolkit>) -> Arc<ModelContext> {
    Arc::new(ModelContext::new(toolkit, StageConfig::default()))
}

/// A small white PNG page.
pub fn png_bytes() -> Vec<u8> {
    let page = DynamicImage::ImageRgb8(RgbImage::from_pixel(48, 32, Rgb([255, 255, 255])));
    let mut buffer = Vec::new();
    page.write_to(&mut std::io::Cursor::new(&mut buffer), ImageFormat::Png)
        .unwrap();
    buffer
}
