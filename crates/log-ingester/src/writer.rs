// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::io::SeekFrom;
use std::path::PathBuf;

use async_trait::async_trait;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tracing::debug;

use crate::batch::SourceBuckets;
use crate::error::WriteError;

#[async_trait]
pub trait AppendWriter {
    /// Appends `texts`, newline separated, to the output artifact for `source`, creating it if
    /// needed. Nothing is retried; whatever landed before a failure stays written.
    async fn append(&self, source: &str, texts: &[String]) -> Result<(), WriteError>;
}

/// Flat file name for a log source: every path separator becomes `_`.
///
/// Distinct sources that only differ in separator placement (`a/b_c` and `a_b/c`) share an
/// artifact.
pub fn artifact_name(source: &str) -> String {
    source
        .chars()
        .map(|c| if std::path::is_separator(c) || c == '/' { '_' } else { c })
        .collect()
}

/// Merges the buckets of sources sharing an artifact so that each artifact gets one append per
/// batch. Aliased texts follow the order in which their sources first appeared, under the name
/// of the first source.
pub fn coalesce_by_artifact(buckets: SourceBuckets) -> Vec<(String, Vec<String>)> {
    let mut merged: Vec<(String, Vec<String>)> = Vec::with_capacity(buckets.len());
    let mut by_artifact: HashMap<String, usize> = HashMap::new();
    for (source, texts) in buckets {
        match by_artifact.entry(artifact_name(&source)) {
            Entry::Occupied(entry) => merged[*entry.get()].1.extend(texts),
            Entry::Vacant(entry) => {
                entry.insert(merged.len());
                merged.push((source, texts));
            }
        }
    }
    merged
}

/// Bytes appended for one call. A newline is prepended when the artifact holds data not yet
/// terminated by one, so that consecutive batches stay line separated; no newline is added after
/// the last text.
fn append_payload(texts: &[String], needs_separator: bool) -> Vec<u8> {
    let joined = texts.join("\n");
    let mut payload = Vec::with_capacity(joined.len() + 1);
    if needs_separator {
        payload.push(b'\n');
    }
    payload.extend_from_slice(joined.as_bytes());
    payload
}

async fn ends_without_newline(file: &mut File, len: u64) -> std::io::Result<bool> {
    if len == 0 {
        return Ok(false);
    }
    file.seek(SeekFrom::Start(len - 1)).await?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last).await?;
    Ok(last[0] != b'\n')
}

#[derive(Debug, Clone)]
pub struct FsAppendWriter {
    output_dir: PathBuf,
}

impl FsAppendWriter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }
}

#[async_trait]
impl AppendWriter for FsAppendWriter {
    async fn append(&self, source: &str, texts: &[String]) -> Result<(), WriteError> {
        let path = self.output_dir.join(artifact_name(source));

        let mut file = OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(&path)
            .await
            .map_err(|e| WriteError::new(path.clone(), e))?;
        let artifact_len = file
            .metadata()
            .await
            .map_err(|e| WriteError::new(path.clone(), e))?
            .len();
        let needs_separator = ends_without_newline(&mut file, artifact_len)
            .await
            .map_err(|e| WriteError::new(path.clone(), e))?;

        let payload = append_payload(texts, needs_separator);
        file.write_all(&payload)
            .await
            .map_err(|e| WriteError::new(path.clone(), e))?;
        file.flush()
            .await
            .map_err(|e| WriteError::new(path.clone(), e))?;

        debug!(
            "Appended {} lines ({} bytes) to {}",
            texts.len(),
            payload.len(),
            path.display()
        );
        Ok(())
    }
}
