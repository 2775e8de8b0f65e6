// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Geometry normalizer: canonical boxes and polygons from raw model output.
//
// Toolkits report geometry in several shapes:
//
//   [x1, y1, x2, y2]                          flat
//   [[x1, y1], [x2, y1], [x2, y2], [x1, y2]]  per-corner
//   {"bbox": [...]} / {"polygon": [...]}      wrapped in an object
//
// Objects are unwrapped exactly one level, nested sequences are flattened
// exactly one level. `null` coordinates read as 0.

use seitenwerk_core::types::{BoundingBox, Polygon};
use serde_json::Value;
use thiserror::Error;

/// Keys probed (in order) when a box arrives wrapped in an object.
const BOX_KEYS: [&str; 2] = ["bbox", "box"];

/// Key probed when a polygon arrives wrapped in an object.
const POLYGON_KEYS: [&str; 1] = ["polygon"];

/// Malformed geometry from a single region.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeometryError {
    #[error("bounding box is missing or empty")]
    Missing,

    #[error("expected a coordinate sequence, found {0}")]
    NotASequence(String),

    #[error("expected at least 4 coordinates, found {found}")]
    TooFewCoordinates { found: usize },

    #[error("coordinate {index} is not a finite number: {value}")]
    InvalidCoordinate { index: usize, value: String },

    #[error("polygon has an odd number of coordinates ({count})")]
    OddPolygon { count: usize },
}

/// Whether `raw` carries any geometry at all.
///
/// `null` and empty sequences/objects/strings count as absent.
pub fn is_present(raw: &Value) -> bool {
    match raw {
        Value::Null => false,
        Value::Array(items) => !items.is_empty(),
        Value::Object(fields) => !fields.is_empty(),
        Value::String(s) => !s.is_empty(),
        Value::Bool(_) | Value::Number(_) => true,
    }
}

/// Whether `raw` carries a box once any `{"bbox": ...}` wrapper is removed.
pub fn box_present(raw: &Value) -> bool {
    is_present(unwrap_field(raw, &BOX_KEYS))
}

/// Normalize a raw bounding box into `(x1, y1, x2, y2)`.
///
/// Takes the first four scalars after flattening; anything after them is
/// ignored and need not be numeric.
pub fn normalize_box(raw: &Value) -> Result<BoundingBox, GeometryError> {
    let raw = unwrap_field(raw, &BOX_KEYS);
    if !is_present(raw) {
        return Err(GeometryError::Missing);
    }
    let items = as_sequence(raw)?;
    let flat = flatten_one_level(items);
    if flat.len() < 4 {
        return Err(GeometryError::TooFewCoordinates { found: flat.len() });
    }

    let mut coords = [0.0; 4];
    for (index, value) in flat.iter().take(4).enumerate() {
        coords[index] = coordinate(value, index)?;
    }
    let [x1, y1, x2, y2] = coords;
    Ok(BoundingBox { x1, y1, x2, y2 })
}

/// Normalize an optional raw polygon into parallel x/y sequences.
///
/// Absent input is not an error and yields `None`.
pub fn normalize_polygon(raw: Option<&Value>) -> Result<Option<Polygon>, GeometryError> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    let raw = unwrap_field(raw, &POLYGON_KEYS);
    if !is_present(raw) {
        return Ok(None);
    }
    let items = as_sequence(raw)?;
    let flat = flatten_one_level(items);
    if flat.len() % 2 != 0 {
        return Err(GeometryError::OddPolygon { count: flat.len() });
    }

    let mut polygon = Polygon {
        x: Vec::with_capacity(flat.len() / 2),
        y: Vec::with_capacity(flat.len() / 2),
    };
    for (index, value) in flat.iter().enumerate() {
        let coord = coordinate(value, index)?;
        if index % 2 == 0 {
            polygon.x.push(coord);
        } else {
            polygon.y.push(coord);
        }
    }
    Ok(Some(polygon))
}

/// Unwrap one level of `{"bbox": ...}`-style wrapping.
fn unwrap_field<'a>(raw: &'a Value, keys: &[&str]) -> &'a Value {
    match raw {
        Value::Object(fields) => keys
            .iter()
            .find_map(|key| fields.get(*key))
            .unwrap_or(raw),
        _ => raw,
    }
}

fn as_sequence(raw: &Value) -> Result<&[Value], GeometryError> {
    match raw {
        Value::Array(items) => Ok(items),
        other => Err(GeometryError::NotASequence(describe(other))),
    }
}

/// Expand nested sequences by one level, keeping scalars in place.
fn flatten_one_level(items: &[Value]) -> Vec<&Value> {
    let mut flat = Vec::with_capacity(items.len() * 2);
    for item in items {
        match item {
            Value::Array(inner) => flat.extend(inner.iter()),
            scalar => flat.push(scalar),
        }
    }
    flat
}

/// Convert one coordinate to a finite `f64`.
fn coordinate(value: &Value, index: usize) -> Result<f64, GeometryError> {
    let invalid = || GeometryError::InvalidCoordinate {
        index,
        value: describe(value),
    };
    let number = match value {
        Value::Null => 0.0,
        Value::Bool(flag) => f64::from(u8::from(*flag)),
        Value::Number(n) => n.as_f64().ok_or_else(invalid)?,
        Value::String(s) if s.trim().is_empty() => 0.0,
        Value::String(s) => s.trim().parse::<f64>().map_err(|_| invalid())?,
        Value::Array(_) | Value::Object(_) => return Err(invalid()),
    };
    if number.is_finite() {
        Ok(number)
    } else {
        Err(invalid())
    }
}

/// Short rendering of a JSON value for error messages.
fn describe(value: &Value) -> String {
    let mut text = value.to_string();
    if text.len() > 48 {
        let mut cut = 45;
        while !text.is_char_boundary(cut) {
            cut -= 1;
        }
        text.truncate(cut);
        text.push_str("...");
    }
    text
}
