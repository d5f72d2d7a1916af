// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Parsing of `POST /logs/agent` payloads and grouping of their lines by source.
//!
//! Payload format, where the line array may be named either `ls` or `lines`:
//!
//! ```json
//! {"lines": [{"file": "app/web.log", "line": "GET / 200"}]}
//! ```

use std::collections::HashMap;

use serde::Deserialize;
use serde_json::Value;

use crate::error::{DecodeError, IngestError};
use crate::line;

/// Accepted names of the line array, in priority order.
pub const BATCH_FIELD_NAMES: [&str; 2] = ["ls", "lines"];

/// One line as shipped by an agent.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LogLine {
    #[serde(rename = "file")]
    pub source: String,
    #[serde(rename = "line")]
    pub raw: String,
}

/// The ordered lines of one request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Batch {
    lines: Vec<LogLine>,
}

impl Batch {
    /// Extracts the batch from a JSON request body, taking the first field of
    /// [`BATCH_FIELD_NAMES`] that is present and not null.
    pub fn from_json(body: &[u8]) -> Result<Self, IngestError> {
        let value: Value = serde_json::from_slice(body).map_err(|e| {
            IngestError::MalformedRequest(format!("request body is not valid JSON: {e}"))
        })?;
        let Value::Object(mut object) = value else {
            return Err(IngestError::MalformedRequest(
                "request body is not a JSON object".to_string(),
            ));
        };

        let (field, lines) = BATCH_FIELD_NAMES
            .iter()
            .find_map(|name| {
                object
                    .remove(*name)
                    .filter(|value| !value.is_null())
                    .map(|value| (*name, value))
            })
            .ok_or_else(|| {
                IngestError::MalformedRequest(format!(
                    "request body has none of the fields {BATCH_FIELD_NAMES:?}"
                ))
            })?;

        let Value::Array(items) = lines else {
            return Err(IngestError::MalformedRequest(format!(
                "`{field}` is not a list"
            )));
        };

        let lines = items
            .into_iter()
            .enumerate()
            .map(|(idx, item)| {
                let line: LogLine = serde_json::from_value(item).map_err(|e| {
                    IngestError::MalformedRequest(format!("`{field}[{idx}]` is not a log line: {e}"))
                })?;
                if line.source.is_empty() {
                    return Err(IngestError::MalformedRequest(format!(
                        "`{field}[{idx}]` has an empty `file`"
                    )));
                }
                Ok(line)
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { lines })
    }

    pub fn lines(&self) -> &[LogLine] {
        &self.lines
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// Effective line texts of one batch, keyed by source. Sources are kept in order of their first
/// line.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct SourceBuckets {
    buckets: Vec<(String, Vec<String>)>,
    index: HashMap<String, usize>,
    line_count: usize,
}

impl SourceBuckets {
    pub fn get(&self, source: &str) -> Option<&[String]> {
        self.index
            .get(source)
            .map(|idx| self.buckets[*idx].1.as_slice())
    }

    /// Number of distinct sources.
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Total number of lines across all sources.
    pub fn line_count(&self) -> usize {
        self.line_count
    }

    fn push(&mut self, source: &str, text: String) {
        let idx = match self.index.get(source) {
            Some(idx) => *idx,
            None => {
                self.buckets.push((source.to_string(), Vec::new()));
                self.index.insert(source.to_string(), self.buckets.len() - 1);
                self.buckets.len() - 1
            }
        };
        self.buckets[idx].1.push(text);
        self.line_count += 1;
    }
}

impl IntoIterator for SourceBuckets {
    type Item = (String, Vec<String>);
    type IntoIter = std::vec::IntoIter<(String, Vec<String>)>;

    fn into_iter(self) -> Self::IntoIter {
        self.buckets.into_iter()
    }
}

/// Decodes every line and buckets it by source, keeping arrival order within each source.
///
/// The first line that fails to decode fails the whole batch; nothing is returned for the
/// lines decoded before it.
pub fn group(lines: &[LogLine]) -> Result<SourceBuckets, DecodeError> {
    let mut buckets = SourceBuckets::default();
    for log_line in lines {
        let text = line::decode(&log_line.raw)?.into_text();
        buckets.push(&log_line.source, text);
    }
    Ok(buckets)
}
