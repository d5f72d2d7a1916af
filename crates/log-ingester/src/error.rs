// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::path::PathBuf;

use hyper::StatusCode;

const MAX_DISPLAYED_LINE_CHARS: usize = 120;

/// A line that looked like a structured envelope (`{...}`) could not be unwrapped.
#[derive(Debug, thiserror::Error)]
#[error("Failed to decode log envelope {line:?}: {source}")]
pub struct DecodeError {
    line: String,
    #[source]
    source: serde_json::Error,
}

impl DecodeError {
    pub fn new(raw: &str, source: serde_json::Error) -> Self {
        let line = match raw.char_indices().nth(MAX_DISPLAYED_LINE_CHARS) {
            Some((idx, _)) => format!("{}...", &raw[..idx]),
            None => raw.to_string(),
        };
        Self { line, source }
    }

    /// The offending line, truncated for display.
    pub fn line(&self) -> &str {
        &self.line
    }
}

/// Appending to an output artifact failed.
#[derive(Debug, thiserror::Error)]
#[error("Failed to append to {}: {source}", path.display())]
pub struct WriteError {
    path: PathBuf,
    #[source]
    source: std::io::Error,
}

impl WriteError {
    pub fn new(path: PathBuf, source: std::io::Error) -> Self {
        Self { path, source }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    pub fn kind(&self) -> std::io::ErrorKind {
        self.source.kind()
    }
}

/// Errors that fail a single `POST /logs/agent` request.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("Malformed request: {0}")]
    MalformedRequest(String),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Write(#[from] WriteError),
}

impl IngestError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            IngestError::MalformedRequest(_) | IngestError::Decode(_) => StatusCode::BAD_REQUEST,
            IngestError::Write(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
