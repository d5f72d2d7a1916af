// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::future::Future;

use tokio::sync::Mutex;

/// Process-wide gate that lets one batch at a time run its group-and-write
/// pipeline.
///
/// Waiters are admitted in arrival order (tokio's mutex is fair) and the gate
/// is released whenever the action's future completes or is dropped, including
/// when it returns an error or panics. There is no timeout: a stalled action
/// holds every later batch.
#[derive(Debug, Default)]
pub struct IngestionSerializer {
    gate: Mutex<()>,
}

impl IngestionSerializer {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn with_exclusive<F, Fut, T>(&self, action: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let _guard = self.gate.lock().await;
        action().await
    }
}
