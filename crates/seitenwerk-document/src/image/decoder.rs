// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Image decoder: turns request payload bytes into a fully decoded image.
//
// The format is sniffed from the magic bytes first so unrecognized payloads
// fail fast with a specific message. Pixel data is then decoded completely,
// so truncation and corruption surface here and never inside the toolkit.

use image::{ColorType, DynamicImage, ImageFormat};
use seitenwerk_core::error::SeitenwerkError;
use tracing::{debug, instrument};

/// A decoded request image.
///
/// Owned by the request that decoded it. Call [`release`](Self::release) (or
/// drop it) once the toolkit no longer needs the pixels.
#[derive(Debug)]
pub struct DecodedImage {
    /// The decoded pixel buffer.
    image: DynamicImage,
    /// Encoding detected from the payload.
    format: ImageFormat,
    /// Size of the encoded payload in bytes.
    encoded_len: usize,
}

impl DecodedImage {
    /// Image width in pixels.
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    /// Image height in pixels.
    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Pixel layout of the decoded buffer.
    pub fn color_type(&self) -> ColorType {
        self.image.color()
    }

    /// Encoding the payload was decoded from.
    pub fn format(&self) -> ImageFormat {
        self.format
    }

    /// Size of the encoded payload in bytes.
    pub fn encoded_len(&self) -> usize {
        self.encoded_len
    }

    /// Borrow the underlying `DynamicImage`.
    pub fn as_dynamic(&self) -> &DynamicImage {
        &self.image
    }

    /// Free the pixel buffer.
    pub fn release(self) {
        debug!(
            width = self.width(),
            height = self.height(),
            "Releasing decoded image"
        );
        drop(self.image);
    }
}

/// Decode a request payload.
///
/// # Errors
///
/// Returns [`SeitenwerkError::InvalidImage`] if `data` is empty, is not a
/// recognizable image encoding, or fails to decode completely.
#[instrument(skip(data), fields(data_len = data.len()))]
pub fn decode(data: &[u8]) -> Result<DecodedImage, SeitenwerkError> {
    if data.is_empty() {
        return Err(SeitenwerkError::InvalidImage("image data is empty".into()));
    }

    let format = image::guess_format(data).map_err(|_| {
        SeitenwerkError::InvalidImage(format!(
            "unrecognized image format ({} bytes, leading bytes {})",
            data.len(),
            hex_prefix(data)
        ))
    })?;

    let image = image::load_from_memory_with_format(data, format).map_err(|err| {
        SeitenwerkError::InvalidImage(format!("failed to decode {format:?} image: {err}"))
    })?;

    debug!(
        ?format,
        width = image.width(),
        height = image.height(),
        color = ?image.color(),
        "Image decoded from bytes"
    );

    Ok(DecodedImage {
        image,
        format,
        encoded_len: data.len(),
    })
}

/// First few payload bytes in hex, for diagnostics.
fn hex_prefix(data: &[u8]) -> String {
    data.iter()
        .take(8)
        .map(|byte| format!("{byte:02x}"))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use ::image::{Rgb, RgbImage};

    use super::*;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
            Rgb([(x * 7 % 256) as u8, (y * 13 % 256) as u8, ((x ^ y) % 256) as u8])
        }));
        let mut buffer = Vec::new();
        img.write_to(&mut std::io::Cursor::new(&mut buffer), ImageFormat::Png)
            .unwrap();
        buffer
    }

    #[test]
    fn decodes_png() {
        let decoded = decode(&png_bytes(32, 16)).unwrap();
        assert_eq!(decoded.width(), 32);
        assert_eq!(decoded.height(), 16);
        assert_eq!(decoded.format(), ImageFormat::Png);
        assert_eq!(decoded.color_type(), ColorType::Rgb8);
        assert!(decoded.encoded_len() > 0);
        decoded.release();
    }

    #[test]
    fn rejects_empty_payload() {
        let err = decode(&[]).unwrap_err();
        assert!(matches!(err, SeitenwerkError::InvalidImage(_)));
    }

    #[test]
    fn rejects_unrecognized_format() {
        let err = decode(b"definitely not an image").unwrap_err();
        match err {
            SeitenwerkError::InvalidImage(msg) => assert!(msg.contains("unrecognized")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn rejects_truncated_png() {
        let bytes = png_bytes(64, 64);
        let truncated = &bytes[..bytes.len() / 2];
        let err = decode(truncated).unwrap_err();
        match err {
            SeitenwerkError::InvalidImage(msg) => assert!(msg.contains("failed to decode")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn hex_prefix_is_bounded() {
        assert_eq!(hex_prefix(&[0x89, 0x50]), "89 50");
        assert_eq!(hex_prefix(&[0u8; 32]).split(' ').count(), 8);
    }
}
