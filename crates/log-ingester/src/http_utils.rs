// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::io::Read;

use flate2::read::{GzDecoder, ZlibDecoder};
use http_body_util::Full;
use hyper::body::Bytes;
use hyper::{
    header,
    http::{self, HeaderMap},
    Response, StatusCode,
};
use serde_json::json;
use tracing::{debug, error};

pub type Body = Full<Bytes>;
pub type HttpResponse = Response<Body>;

/// Does two things:
/// 1. Logs the given message. A success status code (within 200-299) will cause a debug log to be
///    written, otherwise error will be written.
/// 2. Returns the given message in the body of JSON response with the given status code.
///
/// Response body format:
/// {
///     "message": message
/// }
pub fn log_and_create_http_response(
    message: &str,
    status: StatusCode,
) -> http::Result<HttpResponse> {
    if status.is_success() {
        debug!("{message}");
    } else {
        error!("{message}");
    }
    let body = json!({ "message": message }).to_string();
    Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body))
}

/// Returns a `text/plain` response with the given body.
pub fn create_text_http_response(
    body: impl Into<String>,
    status: StatusCode,
) -> http::Result<HttpResponse> {
    Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, "text/plain; charset=utf-8")
        .body(Body::from(body.into()))
}

/// Takes a request's header map, and verifies that the "content-length" and/or "Transfer-Encoding" header
/// is present, valid, and less than the given max_content_length.
///
/// Will return None if no issues are found. Otherwise logs an error (with the given prefix) and
/// returns and HTTP Response with the appropriate error status code.
pub fn verify_request_content_length(
    header_map: &HeaderMap,
    max_content_length: usize,
    error_message_prefix: &str,
) -> Option<http::Result<HttpResponse>> {
    let content_length_header = match header_map.get(header::CONTENT_LENGTH) {
        Some(res) => res,
        None => {
            if let Some(transfer_encoding_header) = header_map.get(header::TRANSFER_ENCODING) {
                debug!(
                    "Transfer-Encoding header is present: {:?}",
                    transfer_encoding_header
                );
                return None;
            }
            return Some(log_and_create_http_response(
                &format!(
                    "{error_message_prefix}: Missing Content-Length and Transfer-Encoding header"
                ),
                StatusCode::LENGTH_REQUIRED,
            ));
        }
    };
    let content_length = match content_length_header
        .to_str()
        .ok()
        .and_then(|value| value.parse::<usize>().ok())
    {
        Some(res) => res,
        None => {
            return Some(log_and_create_http_response(
                &format!("{error_message_prefix}: Invalid Content-Length header"),
                StatusCode::BAD_REQUEST,
            ));
        }
    };
    if content_length > max_content_length {
        return Some(log_and_create_http_response(
            &format!("{error_message_prefix}: Payload too large"),
            StatusCode::PAYLOAD_TOO_LARGE,
        ));
    }
    None
}

/// Inflates a request body according to its "Content-Encoding" header. `gzip` and `deflate` are
/// supported; a missing header or `identity` returns the body untouched.
///
/// On failure, logs an error (with the given prefix) and returns an HTTP Response: 415 for an
/// unknown encoding, 400 for a body that does not inflate.
pub fn decompress_request_body(
    header_map: &HeaderMap,
    body: Bytes,
    max_content_length: usize,
    error_message_prefix: &str,
) -> Result<Bytes, http::Result<HttpResponse>> {
    let encoding = match header_map.get(header::CONTENT_ENCODING) {
        None => return Ok(body),
        Some(value) => match value.to_str() {
            Ok(value) => value.trim().to_ascii_lowercase(),
            Err(_) => {
                return Err(log_and_create_http_response(
                    &format!("{error_message_prefix}: Invalid Content-Encoding header"),
                    StatusCode::BAD_REQUEST,
                ))
            }
        },
    };

    let decoder: Box<dyn Read + '_> = match encoding.as_str() {
        "" | "identity" => return Ok(body),
        "gzip" | "x-gzip" => Box::new(GzDecoder::new(&body[..])),
        "deflate" => Box::new(ZlibDecoder::new(&body[..])),
        other => {
            return Err(log_and_create_http_response(
                &format!("{error_message_prefix}: Unsupported Content-Encoding {other:?}"),
                StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ))
        }
    };

    // Read one byte past the limit so an oversized payload is detected without inflating all of it.
    let mut decompressed = Vec::new();
    let limit = u64::try_from(max_content_length)
        .unwrap_or(u64::MAX)
        .saturating_add(1);
    if let Err(e) = decoder.take(limit).read_to_end(&mut decompressed) {
        return Err(log_and_create_http_response(
            &format!("{error_message_prefix}: Failed to decompress {encoding} body: {e}"),
            StatusCode::BAD_REQUEST,
        ));
    }
    if decompressed.len() > max_content_length {
        return Err(log_and_create_http_response(
            &format!("{error_message_prefix}: Payload too large"),
            StatusCode::PAYLOAD_TOO_LARGE,
        ));
    }
    debug!(
        "Decompressed {encoding} request body from {} to {} bytes",
        body.len(),
        decompressed.len()
    );
    Ok(Bytes::from(decompressed))
}
