// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Element builder: canonical `DetectedElement`s from normalized geometry and
// model metadata.
//
// Geometry is strict (malformed boxes are rejected). Metadata is lenient:
// confidence and reading order fall back to fixed defaults when the model
// reports something unusable.

use seitenwerk_core::types::DetectedElement;
use serde_json::Value;

use crate::geometry::{self, GeometryError};
use crate::toolkit::RegionPrediction;

/// Confidence reported when the model gives none (or garbage).
pub const DEFAULT_CONFIDENCE: f64 = 1.0;

/// Reading order reported when the model gives none (or garbage).
pub const DEFAULT_READING_ORDER: i32 = 0;

/// Coerce a raw confidence to `f64`, falling back to [`DEFAULT_CONFIDENCE`].
///
/// Accepts numbers, numeric strings, and booleans. Never fails. The value is
/// not clamped to [0, 1].
pub fn coerce_confidence(raw: Option<&Value>) -> f64 {
    let coerced = match raw {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        Some(Value::Bool(flag)) => Some(f64::from(u8::from(*flag))),
        _ => None,
    };
    coerced
        .filter(|value| value.is_finite())
        .unwrap_or(DEFAULT_CONFIDENCE)
}

/// Coerce a raw reading-order index to `i32`, falling back to
/// [`DEFAULT_READING_ORDER`].
///
/// Floats truncate toward zero, strings must hold an integer, and anything
/// outside the `i32` range falls back. Never fails.
pub fn coerce_reading_order(raw: Option<&Value>) -> i32 {
    let coerced = match raw {
        Some(Value::Number(n)) => match n.as_i64() {
            Some(int) => Some(int),
            None => n
                .as_f64()
                .filter(|value| value.is_finite())
                .map(f64::trunc)
                .filter(|value| *value >= i32::MIN as f64 && *value <= i32::MAX as f64)
                .map(|value| value as i64),
        },
        Some(Value::String(s)) => s.trim().parse::<i64>().ok(),
        Some(Value::Bool(flag)) => Some(i64::from(*flag)),
        _ => None,
    };
    coerced
        .and_then(|value| i32::try_from(value).ok())
        .unwrap_or(DEFAULT_READING_ORDER)
}

/// Build a canonical element.
///
/// # Errors
///
/// Propagates [`GeometryError`] from box or polygon normalization unchanged.
pub fn build_element(
    bbox: &Value,
    polygon: Option<&Value>,
    content: Option<&str>,
    confidence: Option<&Value>,
    reading_order: Option<&Value>,
) -> Result<DetectedElement, GeometryError> {
    let bbox = geometry::normalize_box(bbox)?;
    let polygon = geometry::normalize_polygon(polygon)?;
    Ok(DetectedElement {
        bbox,
        polygon,
        content: content.unwrap_or_default().to_owned(),
        confidence: coerce_confidence(confidence),
        reading_order: coerce_reading_order(reading_order),
    })
}

/// Why a region was left out of the response.
#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    /// The region carried no box at all.
    NoBox,
    /// The region's box or polygon was malformed.
    Geometry(GeometryError),
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoBox => f.write_str("no bounding box"),
            Self::Geometry(err) => write!(f, "{err}"),
        }
    }
}

/// Outcome of building one region: an element, or a skip with its reason.
#[derive(Debug, Clone, PartialEq)]
pub enum RegionOutcome {
    Built(DetectedElement),
    Skipped(SkipReason),
}

/// Build the element for one toolkit region.
///
/// The region's position is used as its reading order.
pub fn build_region(region: &dyn RegionPrediction) -> RegionOutcome {
    let Some(bbox) = region.bbox().filter(geometry::box_present) else {
        return RegionOutcome::Skipped(SkipReason::NoBox);
    };
    let polygon = region.polygon();
    let confidence = region.confidence();
    let position = region.position();
    match build_element(
        &bbox,
        polygon.as_ref(),
        region.text(),
        confidence.as_ref(),
        position.as_ref(),
    ) {
        Ok(element) => RegionOutcome::Built(element),
        Err(err) => RegionOutcome::Skipped(SkipReason::Geometry(err)),
    }
}
