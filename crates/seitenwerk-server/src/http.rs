// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Minimal HTTP/1.1 framing.
//
// Just enough to carry the RPC schema: a request line, headers, and a
// Content-Length body. No chunked encoding, no keep-alive; every response
// closes the connection.

use seitenwerk_core::status::{RpcStatus, StatusCode};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

/// Upper bound on the request line plus headers.
pub const MAX_HEADER_BYTES: usize = 16 * 1024;

const JSON: &str = "application/json";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum HttpError {
    #[error("malformed HTTP request: {0}")]
    Malformed(String),

    #[error("request headers exceed {limit} bytes", limit = MAX_HEADER_BYTES)]
    HeadersTooLarge,
}

/// Request line and headers of one HTTP request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestHead {
    pub method: String,
    pub path: String,
    pub headers: Vec<(String, String)>,
    /// Offset where the body begins in the buffer the head was parsed from.
    pub body_offset: usize,
}

impl RequestHead {
    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Declared body length; an absent header means no body.
    pub fn content_length(&self) -> Result<usize, HttpError> {
        match self.header("content-length") {
            None => Ok(0),
            Some(value) => value
                .parse()
                .map_err(|_| HttpError::Malformed(format!("invalid Content-Length {value:?}"))),
        }
    }

    /// Whether the body is a JSON-encoded request message.
    pub fn is_json(&self) -> bool {
        self.header("content-type")
            .and_then(|value| value.split(';').next())
            .is_some_and(|mime| mime.trim().eq_ignore_ascii_case(JSON))
    }
}

/// A complete request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub head: RequestHead,
    pub body: Vec<u8>,
}

/// Parse the request head from the start of `data`.
///
/// Returns `Ok(None)` while the blank line ending the headers has not
/// arrived yet.
pub fn parse_head(data: &[u8]) -> Result<Option<RequestHead>, HttpError> {
    let Some(header_end) = find_subsequence(data, b"\r\n\r\n") else {
        if data.len() > MAX_HEADER_BYTES {
            return Err(HttpError::HeadersTooLarge);
        }
        return Ok(None);
    };
    if header_end > MAX_HEADER_BYTES {
        return Err(HttpError::HeadersTooLarge);
    }

    let text = std::str::from_utf8(&data[..header_end])
        .map_err(|_| HttpError::Malformed("headers are not valid UTF-8".into()))?;
    let mut lines = text.split("\r\n");

    let request_line = lines.next().unwrap_or_default();
    let mut parts = request_line.split_whitespace();
    let (Some(method), Some(path), Some(version)) = (parts.next(), parts.next(), parts.next())
    else {
        return Err(HttpError::Malformed(format!(
            "bad request line {request_line:?}"
        )));
    };
    if !version.starts_with("HTTP/1.") {
        return Err(HttpError::Malformed(format!("unsupported version {version:?}")));
    }

    let mut headers = Vec::new();
    for line in lines {
        let Some((name, value)) = line.split_once(':') else {
            return Err(HttpError::Malformed(format!("bad header line {line:?}")));
        };
        headers.push((name.trim().to_owned(), value.trim().to_owned()));
    }

    Ok(Some(RequestHead {
        method: method.to_owned(),
        path: path.to_owned(),
        headers,
        body_offset: header_end + 4,
    }))
}

/// Find the first occurrence of `needle` in `haystack`.
pub fn find_subsequence(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

/// A JSON response with its RPC status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub rpc_status: StatusCode,
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// 200 with a serialized message.
    pub fn ok<T: Serialize>(message: &T) -> Self {
        match serde_json::to_vec(message) {
            Ok(body) => Self {
                status: StatusCode::Ok.http_status(),
                rpc_status: StatusCode::Ok,
                body,
            },
            Err(err) => {
                error!(error = %err, "Failed to serialize response");
                Self::from_status(&RpcStatus::internal(format!(
                    "Error analyzing document: failed to serialize response: {err}"
                )))
            }
        }
    }

    /// Error response carrying `{code, details}`.
    pub fn from_status(status: &RpcStatus) -> Self {
        // Serializing a code and a string cannot fail.
        let body = serde_json::to_vec(status).unwrap_or_default();
        Self {
            status: status.code.http_status(),
            rpc_status: status.code,
            body,
        }
    }

    /// Serialize headers and body.
    pub fn to_bytes(&self) -> Vec<u8> {
        let head = format!(
            "HTTP/1.1 {} {}\r\n\
             Content-Type: {JSON}\r\n\
             Content-Length: {}\r\n\
             x-rpc-status: {}\r\n\
             Connection: close\r\n\
             \r\n",
            self.status,
            reason_phrase(self.status),
            self.body.len(),
            self.rpc_status,
        );
        let mut bytes = Vec::with_capacity(head.len() + self.body.len());
        bytes.extend_from_slice(head.as_bytes());
        bytes.extend_from_slice(&self.body);
        bytes
    }
}

fn reason_phrase(status: u16) -> &'static str {
    match status {
        200 => "OK",
        400 => "Bad Request",
        404 => "Not Found",
        500 => "Internal Server Error",
        _ => "Unknown",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn incomplete_head_needs_more_data() {
        assert_eq!(parse_head(b"POST /x HTTP/1.1\r\nHost: a\r\n"), Ok(None));
    }

    #[test]
    fn parses_request_line_and_headers() {
        let data = b"POST /seitenwerk.DocumentAnalysis/AnalyzeDocument HTTP/1.1\r\n\
                     Host: localhost\r\n\
                     content-type: application/json; charset=utf-8\r\n\
                     Content-Length: 17\r\n\
                     \r\n\
                     {\"image_data\":\"\"}";
        let head = parse_head(data).unwrap().unwrap();
        assert_eq!(head.method, "POST");
        assert_eq!(head.path, "/seitenwerk.DocumentAnalysis/AnalyzeDocument");
        assert_eq!(head.header("HOST"), Some("localhost"));
        assert_eq!(head.content_length(), Ok(17));
        assert!(head.is_json());
        assert_eq!(&data[head.body_offset..], b"{\"image_data\":\"\"}");
    }

    #[test]
    fn missing_content_length_means_empty_body() {
        let head = parse_head(b"GET /health HTTP/1.1\r\n\r\n").unwrap().unwrap();
        assert_eq!(head.content_length(), Ok(0));
        assert!(!head.is_json());
    }

    #[test]
    fn bad_content_length_is_malformed() {
        let head = parse_head(b"POST / HTTP/1.1\r\nContent-Length: lots\r\n\r\n")
            .unwrap()
            .unwrap();
        assert!(matches!(head.content_length(), Err(HttpError::Malformed(_))));
    }

    #[test]
    fn garbage_request_line_is_malformed() {
        assert!(matches!(
            parse_head(b"HELLO\r\n\r\n"),
            Err(HttpError::Malformed(_))
        ));
        assert!(matches!(
            parse_head(b"GET / SPDY/3\r\n\r\n"),
            Err(HttpError::Malformed(_))
        ));
    }

    #[test]
    fn oversized_head_is_rejected() {
        let data = vec![b'a'; MAX_HEADER_BYTES + 1];
        assert_eq!(parse_head(&data), Err(HttpError::HeadersTooLarge));
    }

    #[test]
    fn error_response_carries_code_and_details() {
        let response = HttpResponse::from_status(&RpcStatus::invalid_argument("Invalid request: x"));
        let bytes = response.to_bytes();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.starts_with("HTTP/1.1 400 Bad Request\r\n"));
        assert!(text.contains("x-rpc-status: INVALID_ARGUMENT\r\n"));
        assert!(text.ends_with(r#"{"code":"INVALID_ARGUMENT","details":"Invalid request: x"}"#));
    }

    #[test]
    fn find_subsequence_locates_needle() {
        assert_eq!(find_subsequence(b"abc\r\n\r\ndef", b"\r\n\r\n"), Some(3));
        assert_eq!(find_subsequence(b"abc", b"\r\n\r\n"), None);
    }
}
