// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types and the wire schema of the document analysis RPC.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for one analysis request, used for log correlation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestId(pub Uuid);

impl RequestId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Model toolkit stages the pipeline can invoke.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Text-line detection (geometry only).
    TextLines,
    /// Text recognition over detected lines.
    Recognition,
    /// Vertical separator detection.
    VerticalLines,
    /// Layout region detection and ordering.
    Layout,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::TextLines => "text-line detection",
            Self::Recognition => "text recognition",
            Self::VerticalLines => "vertical-line detection",
            Self::Layout => "layout detection",
        })
    }
}

// ---------------------------------------------------------------------------
// Geometry
// ---------------------------------------------------------------------------

/// Axis-aligned rectangle in image pixel coordinates.
///
/// `x1 <= x2` and `y1 <= y2` are not enforced: boxes are passed through from
/// the model as-is, degenerate ones included.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

impl BoundingBox {
    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Coordinates in `(x1, y1, x2, y2)` order.
    pub fn to_array(&self) -> [f64; 4] {
        [self.x1, self.y1, self.x2, self.y2]
    }
}

/// Region outline as parallel x/y coordinate sequences of equal length.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Polygon {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
}

impl Polygon {
    /// Number of vertices.
    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    /// Iterate the vertices as `(x, y)` pairs.
    pub fn points(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.x.iter().copied().zip(self.y.iter().copied())
    }

    /// Flatten back into alternating `x, y, x, y, ...` order.
    pub fn interleaved(&self) -> Vec<f64> {
        self.points().flat_map(|(x, y)| [x, y]).collect()
    }
}

// ---------------------------------------------------------------------------
// Elements
// ---------------------------------------------------------------------------

/// One detected region in canonical form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedElement {
    pub bbox: BoundingBox,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub polygon: Option<Polygon>,
    #[serde(default)]
    pub content: String,
    /// Conceptually in [0, 1], never clamped.
    pub confidence: f64,
    #[serde(default)]
    pub reading_order: i32,
}

/// Fixed layout element enumeration of the wire schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ElementType {
    Blank,
    Text,
    TextInlineMath,
    Code,
    SectionHeader,
    Caption,
    Footnote,
    Equation,
    ListItem,
    PageFooter,
    PageHeader,
    Picture,
    Figure,
    Table,
    Form,
    TableOfContents,
    Handwriting,
}

impl ElementType {
    /// Every variant, in wire enumeration order.
    pub const ALL: [ElementType; 17] = [
        Self::Blank,
        Self::Text,
        Self::TextInlineMath,
        Self::Code,
        Self::SectionHeader,
        Self::Caption,
        Self::Footnote,
        Self::Equation,
        Self::ListItem,
        Self::PageFooter,
        Self::PageHeader,
        Self::Picture,
        Self::Figure,
        Self::Table,
        Self::Form,
        Self::TableOfContents,
        Self::Handwriting,
    ];

    /// Map a layout model label to its element type.
    ///
    /// Labels are matched exactly; anything unknown (or no label at all) is
    /// reported as generic [`ElementType::Text`].
    pub fn from_label(label: Option<&str>) -> Self {
        match label {
            Some("Blank") => Self::Blank,
            Some("Text") => Self::Text,
            Some("TextInlineMath") => Self::TextInlineMath,
            Some("Code") => Self::Code,
            Some("SectionHeader") => Self::SectionHeader,
            Some("Caption") => Self::Caption,
            Some("Footnote") => Self::Footnote,
            Some("Equation") => Self::Equation,
            Some("ListItem") => Self::ListItem,
            Some("PageFooter") => Self::PageFooter,
            Some("PageHeader") => Self::PageHeader,
            Some("Picture") => Self::Picture,
            Some("Figure") => Self::Figure,
            Some("Table") => Self::Table,
            Some("Form") => Self::Form,
            Some("TableOfContents") => Self::TableOfContents,
            Some("Handwriting") => Self::Handwriting,
            _ => Self::Text,
        }
    }

    /// The model label this type is produced from.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Blank => "Blank",
            Self::Text => "Text",
            Self::TextInlineMath => "TextInlineMath",
            Self::Code => "Code",
            Self::SectionHeader => "SectionHeader",
            Self::Caption => "Caption",
            Self::Footnote => "Footnote",
            Self::Equation => "Equation",
            Self::ListItem => "ListItem",
            Self::PageFooter => "PageFooter",
            Self::PageHeader => "PageHeader",
            Self::Picture => "Picture",
            Self::Figure => "Figure",
            Self::Table => "Table",
            Self::Form => "Form",
            Self::TableOfContents => "TableOfContents",
            Self::Handwriting => "Handwriting",
        }
    }
}

/// A typed layout region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutElement {
    #[serde(rename = "type")]
    pub element_type: ElementType,
    pub element: DetectedElement,
}

// ---------------------------------------------------------------------------
// RPC messages
// ---------------------------------------------------------------------------

/// `AnalyzeDocument` request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentAnalysisRequest {
    /// Encoded image bytes (PNG, JPEG, TIFF, ...). Base64 in JSON.
    #[serde(with = "base64_bytes", default)]
    pub image_data: Vec<u8>,
}

impl DocumentAnalysisRequest {
    pub fn new(image_data: impl Into<Vec<u8>>) -> Self {
        Self {
            image_data: image_data.into(),
        }
    }
}

/// `AnalyzeDocument` response. Built once per request, then sent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentAnalysisResponse {
    /// Free-form recognized text lines.
    #[serde(default)]
    pub text_lines: Vec<DetectedElement>,
    /// Detected vertical separators.
    #[serde(default)]
    pub vertical_lines: Vec<DetectedElement>,
    /// Typed layout regions, sorted by reading order.
    #[serde(default)]
    pub layout_elements: Vec<LayoutElement>,
    /// The same regions as `layout_elements`, as a plain sequence.
    #[serde(default)]
    pub reading_order: Vec<DetectedElement>,
}

mod base64_bytes {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(|err| serde::de::Error::custom(format!("image_data is not valid base64: {err}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_labels_map_to_their_type() {
        assert_eq!(ElementType::from_label(Some("Table")), ElementType::Table);
        assert_eq!(
            ElementType::from_label(Some("SectionHeader")),
            ElementType::SectionHeader
        );
        assert_eq!(
            ElementType::from_label(Some("TableOfContents")),
            ElementType::TableOfContents
        );
    }

    #[test]
    fn unknown_or_missing_label_is_text() {
        assert_eq!(ElementType::from_label(Some("Header")), ElementType::Text);
        assert_eq!(ElementType::from_label(Some("table")), ElementType::Text);
        assert_eq!(ElementType::from_label(None), ElementType::Text);
    }

    #[test]
    fn every_label_maps_back_to_itself() {
        for ty in ElementType::ALL {
            assert_eq!(ElementType::from_label(Some(ty.label())), ty);
        }
    }

    #[test]
    fn element_type_wire_names() {
        let json = serde_json::to_string(&ElementType::TextInlineMath).unwrap();
        assert_eq!(json, "\"TEXT_INLINE_MATH\"");
        let json = serde_json::to_string(&ElementType::TableOfContents).unwrap();
        assert_eq!(json, "\"TABLE_OF_CONTENTS\"");
    }

    #[test]
    fn detected_element_wire_shape() {
        let element = DetectedElement {
            bbox: BoundingBox::new(1.0, 2.0, 3.0, 4.0),
            polygon: Some(Polygon {
                x: vec![1.0, 3.0],
                y: vec![2.0, 4.0],
            }),
            content: "Invoice".into(),
            confidence: 0.9,
            reading_order: 2,
        };
        let json = serde_json::to_value(&element).unwrap();
        assert_eq!(json["bbox"]["x1"], 1.0);
        assert_eq!(json["bbox"]["y2"], 4.0);
        assert_eq!(json["polygon"]["x"][1], 3.0);
        assert_eq!(json["polygon"]["y"][0], 2.0);
        assert_eq!(json["content"], "Invoice");
        assert_eq!(json["reading_order"], 2);
    }

    #[test]
    fn polygon_is_omitted_when_absent() {
        let element = DetectedElement {
            bbox: BoundingBox::default(),
            polygon: None,
            content: String::new(),
            confidence: 1.0,
            reading_order: 0,
        };
        let json = serde_json::to_value(&element).unwrap();
        assert!(json.get("polygon").is_none());
    }

    #[test]
    fn layout_element_uses_type_key() {
        let layout = LayoutElement {
            element_type: ElementType::Caption,
            element: DetectedElement {
                bbox: BoundingBox::default(),
                polygon: None,
                content: String::new(),
                confidence: 1.0,
                reading_order: 0,
            },
        };
        let json = serde_json::to_value(&layout).unwrap();
        assert_eq!(json["type"], "CAPTION");
    }

    #[test]
    fn request_image_data_is_base64_on_the_wire() {
        let request = DocumentAnalysisRequest::new(vec![0x89, b'P', b'N', b'G']);
        let json = serde_json::to_string(&request).unwrap();
        assert_eq!(json, r#"{"image_data":"iVBORw=="}"#);

        let parsed: DocumentAnalysisRequest = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, request);
    }

    #[test]
    fn request_without_image_data_parses_as_empty() {
        let parsed: DocumentAnalysisRequest = serde_json::from_str("{}").unwrap();
        assert!(parsed.image_data.is_empty());
    }

    #[test]
    fn request_with_bad_base64_is_rejected() {
        let result: Result<DocumentAnalysisRequest, _> =
            serde_json::from_str(r#"{"image_data":"!!not base64!!"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn polygon_interleaves_points() {
        let polygon = Polygon {
            x: vec![0.0, 10.0, 10.0],
            y: vec![1.0, 1.0, 5.0],
        };
        assert_eq!(polygon.len(), 3);
        assert_eq!(polygon.interleaved(), vec![0.0, 1.0, 10.0, 1.0, 10.0, 5.0]);
    }
}
