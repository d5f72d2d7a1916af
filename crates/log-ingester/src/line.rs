// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Decoding of single agent log lines.
//!
//! Agents may ship either the plain text of a line, or a structured envelope
//! such as the one produced by container runtimes:
//!
//! ```text
//! {"log":"GET /health 200","stream":"stdout","time":"2024-01-01T00:00:00Z"}
//! ```
//!
//! A line claims to be an envelope when, ignoring leading whitespace, it
//! starts with `{`. Such a line must then be a complete JSON object carrying a
//! string `log` field, otherwise decoding fails: a truncated envelope like
//! `{"log":"hello"` is an error, never silently written as plain text.
//! Braces anywhere else in a line leave it plain.

use serde::Deserialize;

use crate::error::DecodeError;

#[derive(Deserialize)]
struct Envelope {
    log: String,
}

/// The effective text of one log line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodedLine {
    /// The raw line, passed through unchanged.
    Plain(String),
    /// The `log` field unwrapped from a structured envelope.
    Enveloped(String),
}

impl DecodedLine {
    pub fn into_text(self) -> String {
        match self {
            DecodedLine::Plain(text) | DecodedLine::Enveloped(text) => text,
        }
    }
}

fn looks_like_envelope(raw: &str) -> bool {
    raw.trim_start().starts_with('{')
}

pub fn decode(raw: &str) -> Result<DecodedLine, DecodeError> {
    if !looks_like_envelope(raw) {
        return Ok(DecodedLine::Plain(raw.to_string()));
    }
    serde_json::from_str::<Envelope>(raw)
        .map(|envelope| DecodedLine::Enveloped(envelope.log))
        .map_err(|err| DecodeError::new(raw, err))
}
