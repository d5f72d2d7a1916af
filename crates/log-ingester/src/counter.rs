// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::sync::atomic::{AtomicU64, Ordering};

/// Running total of lines durably written since start-up or the last reset.
///
/// Reads and resets are not ordered against an in-flight batch: a reset that
/// races with a batch completing may be followed by that batch's `add`.
#[derive(Debug, Default)]
pub struct LineCounter {
    total: AtomicU64,
}

impl LineCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }

    pub fn add(&self, lines: u64) {
        self.total.fetch_add(lines, Ordering::Relaxed);
    }

    pub fn reset(&self) {
        self.total.store(0, Ordering::Relaxed);
    }
}
