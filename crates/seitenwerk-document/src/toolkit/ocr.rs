// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// `ocrs` toolkit adapter.
//
// Runs text-line detection and recognition with the pure-Rust `ocrs` engine
// (neural network models executed via `rten`). `ocrs` has no layout or
// vertical-line model, so:
//
// - vertical-line detection reports no lines;
// - layout detection reports one `Text` region per detected line, in the
//   engine's line order, reusing the text-line detection when one is given.
//
// # Model Setup
//
// The engine needs two model files in one directory:
//
// - `text-detection.rten` locates words in the page.
// - `text-recognition.rten` decodes characters from detected lines.
//
// Running the `ocrs` CLI once downloads both to `$XDG_CACHE_HOME/ocrs`
// (typically `~/.cache/ocrs`), which is the default directory.

use std::path::{Path, PathBuf};

use ocrs::{ImageSource, OcrEngine, OcrEngineParams, OcrInput};
use rten::Model;
use rten_imageproc::RotatedRect;
use seitenwerk_core::error::SeitenwerkError;
use seitenwerk_core::types::Stage;
use serde_json::{Value, json};
use tracing::{debug, info, instrument};

use super::{ModelToolkit, PredictionBatch, RegionPrediction, ToolkitError};
use crate::image::decoder::DecodedImage;

const DETECTION_MODEL_FILENAME: &str = "text-detection.rten";
const RECOGNITION_MODEL_FILENAME: &str = "text-recognition.rten";

/// Default directory for cached model files: `$XDG_CACHE_HOME/ocrs`, falling
/// back to `~/.cache/ocrs`.
pub fn default_model_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CACHE_HOME") {
        PathBuf::from(xdg).join("ocrs")
    } else if let Ok(home) = std::env::var("HOME") {
        PathBuf::from(home).join(".cache").join("ocrs")
    } else {
        PathBuf::from("ocrs-models")
    }
}

/// Where to find the two `ocrs` models.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OcrConfig {
    pub detection_model_path: PathBuf,
    pub recognition_model_path: PathBuf,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self::from_dir(default_model_dir())
    }
}

impl OcrConfig {
    /// Expect `text-detection.rten` and `text-recognition.rten` in `dir`.
    pub fn from_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            detection_model_path: dir.join(DETECTION_MODEL_FILENAME),
            recognition_model_path: dir.join(RECOGNITION_MODEL_FILENAME),
        }
    }

    /// Check that both model files exist.
    pub fn validate(&self) -> Result<(), SeitenwerkError> {
        for (role, path) in [
            ("detection", &self.detection_model_path),
            ("recognition", &self.recognition_model_path),
        ] {
            if !path.exists() {
                return Err(SeitenwerkError::ToolkitUnavailable(format!(
                    "{role} model not found at {}; run the `ocrs` CLI once to download models",
                    path.display()
                )));
            }
        }
        Ok(())
    }
}

/// Word rectangles grouped into lines, as found by the detection model.
///
/// Kept as the native payload of the text-line batch so recognition and
/// layout can reuse the detection.
#[derive(Debug, Clone, Default)]
pub struct DetectedLines {
    pub lines: Vec<Vec<RotatedRect>>,
}

/// One `ocrs` line as a region.
#[derive(Debug, Clone)]
struct OcrsLine {
    bbox: [f32; 4],
    position: usize,
    text: Option<String>,
    label: Option<&'static str>,
}

impl RegionPrediction for OcrsLine {
    fn bbox(&self) -> Option<Value> {
        Some(json!(self.bbox))
    }

    fn label(&self) -> Option<&str> {
        self.label
    }

    fn position(&self) -> Option<Value> {
        Some(json!(self.position))
    }

    fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }
}

/// Axis-aligned bounds of a line: the union of its words' bounding rects.
fn line_bounds(words: &[RotatedRect]) -> Option<[f32; 4]> {
    words.iter().map(RotatedRect::bounding_rect).fold(None, |acc, rect| {
        let [left, top, right, bottom] =
            acc.unwrap_or([rect.left(), rect.top(), rect.right(), rect.bottom()]);
        Some([
            left.min(rect.left()),
            top.min(rect.top()),
            right.max(rect.right()),
            bottom.max(rect.bottom()),
        ])
    })
}

fn line_regions(
    detected: &DetectedLines,
    texts: Option<&[Option<String>]>,
    label: Option<&'static str>,
) -> Vec<Box<dyn RegionPrediction>> {
    detected
        .lines
        .iter()
        .enumerate()
        .filter_map(|(position, words)| {
            let bbox = line_bounds(words)?;
            let text = texts.and_then(|texts| texts.get(position).cloned().flatten());
            Some(Box::new(OcrsLine {
                bbox,
                position,
                text,
                label,
            }) as Box<dyn RegionPrediction>)
        })
        .collect()
}

fn failed(context: &str, err: impl std::fmt::Display) -> ToolkitError {
    ToolkitError::Failed(format!("{context}: {err}"))
}

/// [`ModelToolkit`] backed by the `ocrs` engine.
///
/// Model loading is the expensive step; build one toolkit at startup and
/// share it across requests.
///
/// **Important:** `ocrs` and `rten` must be compiled in release mode. Debug
/// builds are 10-100x slower.
pub struct OcrsToolkit {
    engine: OcrEngine,
}

impl OcrsToolkit {
    /// Load both models.
    ///
    /// # Errors
    ///
    /// Returns [`SeitenwerkError::ToolkitUnavailable`] if a model file is
    /// missing or corrupt.
    #[instrument(skip_all, fields(
        detection = %config.detection_model_path.display(),
        recognition = %config.recognition_model_path.display(),
    ))]
    pub fn new(config: &OcrConfig) -> Result<Self, SeitenwerkError> {
        config.validate()?;

        let load = |role: &str, path: &Path| {
            info!(role, "Loading OCR model");
            Model::load_file(path).map_err(|err| {
                SeitenwerkError::ToolkitUnavailable(format!(
                    "failed to load {role} model from {}: {err}",
                    path.display()
                ))
            })
        };
        let detection_model = load("detection", &config.detection_model_path)?;
        let recognition_model = load("recognition", &config.recognition_model_path)?;

        let engine = OcrEngine::new(OcrEngineParams {
            detection_model: Some(detection_model),
            recognition_model: Some(recognition_model),
            ..Default::default()
        })
        .map_err(|err| {
            SeitenwerkError::ToolkitUnavailable(format!("failed to initialise OCR engine: {err}"))
        })?;

        info!("OCR engine initialised");
        Ok(Self { engine })
    }

    /// Load models from `dir`, or from [`default_model_dir`] when `None`.
    pub fn from_model_dir(dir: Option<&Path>) -> Result<Self, SeitenwerkError> {
        let config = dir.map(OcrConfig::from_dir).unwrap_or_default();
        Self::new(&config)
    }

    fn prepare(&self, image: &DecodedImage) -> Result<OcrInput, ToolkitError> {
        let rgb = image.as_dynamic().to_rgb8();
        let (width, height) = rgb.dimensions();
        let source = ImageSource::from_bytes(rgb.as_raw(), (width, height))
            .map_err(|err| failed(&format!("failed to create image source ({width}x{height})"), err))?;
        self.engine
            .prepare_input(source)
            .map_err(|err| failed("OCR preprocessing failed", err))
    }

    fn detect(&self, input: &OcrInput) -> Result<DetectedLines, ToolkitError> {
        let words = self
            .engine
            .detect_words(input)
            .map_err(|err| failed("word detection failed", err))?;
        let lines = self.engine.find_text_lines(input, &words);
        debug!(words = words.len(), lines = lines.len(), "Text lines found");
        Ok(DetectedLines { lines })
    }
}

impl ModelToolkit for OcrsToolkit {
    fn name(&self) -> &str {
        "ocrs"
    }

    #[instrument(skip_all, fields(width = image.width(), height = image.height()))]
    fn detect_text_lines(&self, image: &DecodedImage) -> Result<PredictionBatch, ToolkitError> {
        let input = self.prepare(image)?;
        let detected = self.detect(&input)?;
        let regions = line_regions(&detected, None, None);
        Ok(PredictionBatch::new(Stage::TextLines, regions).with_native(detected))
    }

    #[instrument(skip_all, fields(lines = lines.len()))]
    fn recognize_text(
        &self,
        image: &DecodedImage,
        lines: &PredictionBatch,
    ) -> Result<PredictionBatch, ToolkitError> {
        let detected = lines.native::<DetectedLines>().ok_or_else(|| {
            ToolkitError::Failed("text-line batch was not produced by this toolkit".into())
        })?;
        let input = self.prepare(image)?;
        let recognized = self
            .engine
            .recognize_text(&input, &detected.lines)
            .map_err(|err| failed("line recognition failed", err))?;
        let texts: Vec<Option<String>> = recognized
            .iter()
            .map(|line| line.as_ref().map(ToString::to_string))
            .collect();
        debug!(
            recognized = texts.iter().filter(|text| text.is_some()).count(),
            "Lines recognized"
        );
        let regions = line_regions(detected, Some(&texts), None);
        Ok(PredictionBatch::new(Stage::Recognition, regions))
    }

    fn detect_layout(
        &self,
        image: &DecodedImage,
        prior: Option<&PredictionBatch>,
    ) -> Result<PredictionBatch, ToolkitError> {
        let regions = match prior.and_then(PredictionBatch::native::<DetectedLines>) {
            Some(detected) => line_regions(detected, None, Some("Text")),
            None => {
                let input = self.prepare(image)?;
                line_regions(&self.detect(&input)?, None, Some("Text"))
            }
        };
        Ok(PredictionBatch::new(Stage::Layout, regions))
    }
}

#[cfg(test)]
mod tests {
    use rten_imageproc::{Point, RotatedRect, Vec2};

    use super::*;

    fn word(x: f32, y: f32, width: f32, height: f32) -> RotatedRect {
        RotatedRect::new(
            Point::from_yx(y + height / 2.0, x + width / 2.0),
            Vec2::from_yx(1.0, 0.0),
            width,
            height,
        )
    }

    #[test]
    fn config_from_dir() {
        let config = OcrConfig::from_dir("/tmp/my-models");
        assert_eq!(
            config.detection_model_path,
            PathBuf::from("/tmp/my-models/text-detection.rten")
        );
        assert_eq!(
            config.recognition_model_path,
            PathBuf::from("/tmp/my-models/text-recognition.rten")
        );
    }

    #[test]
    fn default_config_uses_known_filenames() {
        let config = OcrConfig::default();
        assert!(config.detection_model_path.ends_with(DETECTION_MODEL_FILENAME));
        assert!(config.recognition_model_path.ends_with(RECOGNITION_MODEL_FILENAME));
    }

    #[test]
    fn missing_models_make_the_toolkit_unavailable() {
        let err = OcrsToolkit::from_model_dir(Some(Path::new("/nonexistent/ocr-models")))
            .err()
            .unwrap();
        assert!(matches!(err, SeitenwerkError::ToolkitUnavailable(_)));
        assert!(err.to_string().contains("detection model not found"));
    }

    #[test]
    fn empty_line_has_no_bounds() {
        assert_eq!(line_bounds(&[]), None);
    }

    #[test]
    fn line_bounds_cover_every_word() {
        let [left, top, right, bottom] =
            line_bounds(&[word(10.0, 20.0, 30.0, 10.0), word(50.0, 18.0, 20.0, 14.0)]).unwrap();
        assert!((left - 10.0).abs() < 1e-3);
        assert!((top - 18.0).abs() < 1e-3);
        assert!((right - 70.0).abs() < 1e-3);
        assert!((bottom - 32.0).abs() < 1e-3);
    }

    #[test]
    fn regions_follow_engine_line_order() {
        let detected = DetectedLines {
            lines: vec![
                vec![word(0.0, 0.0, 10.0, 5.0)],
                vec![],
                vec![word(0.0, 40.0, 10.0, 5.0)],
            ],
        };
        let texts = vec![Some("first".to_owned()), None, None];
        let regions = line_regions(&detected, Some(&texts), Some("Text"));

        assert_eq!(regions.len(), 2);
        assert_eq!(regions[0].text(), Some("first"));
        assert_eq!(regions[0].position(), Some(json!(0)));
        assert_eq!(regions[1].text(), None);
        assert_eq!(regions[1].position(), Some(json!(2)));
        assert_eq!(regions[1].label(), Some("Text"));
    }
}
