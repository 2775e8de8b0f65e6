// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Image module: format sniffing and full decoding of request payloads.

pub mod decoder;

pub use decoder::{DecodedImage, decode};
