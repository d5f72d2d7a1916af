// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Log ingestion endpoint.
//!
//! Agents `POST` batches of `(file, line)` pairs to `/logs/agent`. Each batch is decoded,
//! grouped by source file and appended to one output file per source, one batch at a time.

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

pub mod batch;
pub mod config;
pub mod counter;
pub mod error;
pub mod http_utils;
pub mod ingester;
pub mod line;
pub mod serializer;
pub mod writer;
