// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

use std::{env, process::ExitCode, sync::Arc};

use tracing::{debug, error};
use tracing_subscriber::EnvFilter;

use log_ingester::{
    config::Config,
    ingester::{IngestState, Ingester},
    writer::FsAppendWriter,
};

#[tokio::main]
pub async fn main() -> ExitCode {
    let log_level = env::var("INGESTER_LOG_LEVEL")
        .map(|val| val.to_lowercase())
        .unwrap_or("info".to_string());

    let env_filter = format!("h2=off,hyper=off,{}", log_level);

    #[allow(clippy::expect_used)]
    let subscriber = tracing_subscriber::fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_new(env_filter).expect("could not parse log level in configuration"),
        )
        .with_level(true)
        .with_thread_names(false)
        .with_thread_ids(false)
        .with_line_number(false)
        .with_file(false)
        .with_target(true)
        .without_time()
        .finish();

    #[allow(clippy::expect_used)]
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    debug!("Logging subsystem enabled");

    let config = Config::default();
    let writer = Arc::new(FsAppendWriter::new(config.output_dir.clone()));
    let state = Arc::new(IngestState::new(config, writer));
    let ingester = Ingester::new(state);

    match ingester.start_ingester().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("There was an error while starting the ingester: {e}");
            ExitCode::FAILURE
        }
    }
}
