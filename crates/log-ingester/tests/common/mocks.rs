// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Mock writers for testing the ingester without touching the filesystem

use std::sync::Mutex;
use std::time::Duration;

use log_ingester::error::WriteError;
use log_ingester::writer::AppendWriter;

/// Records every line it is asked to append, one at a time and slowly, so that two batches
/// written at the same time would show up interleaved.
#[derive(Default)]
pub struct SlowRecordingWriter {
    pub delay: Duration,
    pub written: Mutex<Vec<String>>,
}

impl SlowRecordingWriter {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            written: Mutex::new(Vec::new()),
        }
    }

    pub fn written(&self) -> Vec<String> {
        self.written.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl AppendWriter for SlowRecordingWriter {
    async fn append(&self, _source: &str, texts: &[String]) -> Result<(), WriteError> {
        for text in texts {
            tokio::time::sleep(self.delay).await;
            self.written.lock().unwrap().push(text.clone());
        }
        Ok(())
    }
}
