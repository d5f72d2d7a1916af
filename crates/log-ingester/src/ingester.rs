// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::stream::{FuturesUnordered, StreamExt};
use http_body_util::BodyExt;
use hyper::service::service_fn;
use hyper::{http, Method, Request, Response, StatusCode};
use tracing::{debug, error, info, warn};

use crate::batch::{self, Batch, SourceBuckets};
use crate::config::Config;
use crate::counter::LineCounter;
use crate::error::{IngestError, WriteError};
use crate::http_utils::{
    create_text_http_response, decompress_request_body, log_and_create_http_response,
    verify_request_content_length, HttpResponse,
};
use crate::serializer::IngestionSerializer;
use crate::writer::{coalesce_by_artifact, AppendWriter};

const ROOT_PATH: &str = "/";
const COUNT_PATH: &str = "/count";
const AGENT_LOGS_PATH: &str = "/logs/agent";

const LIVENESS_MESSAGE: &str = "OK: ingester running";
const COUNT_RESET_MESSAGE: &str = "OK: deleted";
const INGEST_SUCCESS_MESSAGE: &str = "OK";

/// Process-wide ingestion state, built once at start-up and shared by every request.
pub struct IngestState {
    config: Config,
    serializer: IngestionSerializer,
    counter: LineCounter,
    writer: Arc<dyn AppendWriter + Send + Sync>,
    first_request_seen: AtomicBool,
}

impl IngestState {
    pub fn new(config: Config, writer: Arc<dyn AppendWriter + Send + Sync>) -> Self {
        Self {
            config,
            serializer: IngestionSerializer::new(),
            counter: LineCounter::new(),
            writer,
            first_request_seen: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn counter(&self) -> &LineCounter {
        &self.counter
    }

    /// Parses, groups and writes one batch while holding the serializer. Returns the number of
    /// lines written. The counter only moves when every source was written.
    pub async fn ingest(&self, body: &[u8]) -> Result<usize, IngestError> {
        self.serializer.with_exclusive(|| self.run_pipeline(body)).await
    }

    async fn run_pipeline(&self, body: &[u8]) -> Result<usize, IngestError> {
        let batch = Batch::from_json(body)?;
        let buckets = batch::group(batch.lines())?;
        let line_count = buckets.line_count();
        debug!("Writing {} lines for {} sources", line_count, buckets.len());

        self.write_buckets(buckets).await?;
        self.counter.add(line_count as u64);
        Ok(line_count)
    }

    /// Writes every artifact of a batch, a bounded number at a time. Sources sharing an artifact
    /// go out as a single append. Once a write fails no new write is started, but the ones
    /// already running are awaited before the first error is returned, so nothing from this
    /// batch lands after the serializer is released.
    async fn write_buckets(&self, buckets: SourceBuckets) -> Result<(), WriteError> {
        let limit = self.config.max_concurrent_writes.max(1);
        let mut pending = coalesce_by_artifact(buckets).into_iter();
        let mut in_flight = FuturesUnordered::new();
        let mut first_error: Option<WriteError> = None;

        loop {
            while first_error.is_none() && in_flight.len() < limit {
                let Some((source, texts)) = pending.next() else {
                    break;
                };
                let writer = Arc::clone(&self.writer);
                in_flight.push(async move { writer.append(&source, &texts).await });
            }

            match in_flight.next().await {
                Some(Ok(())) => {}
                Some(Err(err)) if first_error.is_none() => first_error = Some(err),
                Some(Err(err)) => warn!("Another write failed in the same batch: {err}"),
                None => break,
            }
        }

        match first_error {
            Some(err) => {
                let skipped = pending.len();
                if skipped > 0 {
                    warn!("Skipped writing {skipped} artifacts after a write failure");
                }
                Err(err)
            }
            None => Ok(()),
        }
    }
}

pub struct Ingester {
    pub state: Arc<IngestState>,
}

impl Ingester {
    pub fn new(state: Arc<IngestState>) -> Self {
        Self { state }
    }

    /// Binds the configured address and serves requests until the listener fails.
    pub async fn start_ingester(&self) -> Result<(), Box<dyn std::error::Error>> {
        let addr = self.state.config().listen_addr();
        let listener = tokio::net::TcpListener::bind(&addr).await?;
        info!("Ingester listening on http://{addr}");
        self.serve(listener).await
    }

    /// Serves requests on an already bound listener.
    pub async fn serve(
        &self,
        listener: tokio::net::TcpListener,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let state = Arc::clone(&self.state);
        let service = service_fn(move |req: Request<hyper::body::Incoming>| {
            // called for each http request
            let state = Arc::clone(&state);
            Ingester::endpoint_handler(state, req)
        });

        let server = hyper::server::conn::http1::Builder::new();
        let mut joinset = tokio::task::JoinSet::new();

        loop {
            let conn = tokio::select! {
                con_res = listener.accept() => match con_res {
                    Err(e)
                        if matches!(
                            e.kind(),
                            io::ErrorKind::ConnectionAborted
                                | io::ErrorKind::ConnectionReset
                                | io::ErrorKind::ConnectionRefused
                        ) =>
                    {
                        continue;
                    }
                    Err(e) => {
                        error!("Server error: {e}");
                        return Err(e.into());
                    }
                    Ok((conn, _)) => conn,
                },
                finished = async {
                    match joinset.join_next().await {
                        Some(finished) => finished,
                        None => std::future::pending().await,
                    }
                } => match finished {
                    Err(e) if e.is_panic() => {
                        // Don't kill server on panic - log and continue
                        error!("Connection handler panicked: {:?}", e);
                        continue;
                    },
                    Ok(()) | Err(_) => continue,
                },
            };
            let conn = hyper_util::rt::TokioIo::new(conn);
            let server = server.clone();
            let service = service.clone();
            joinset.spawn(async move {
                if let Err(e) = server.serve_connection(conn, service).await {
                    error!("Connection error: {e}");
                }
            });
        }
    }

    pub async fn endpoint_handler<B>(
        state: Arc<IngestState>,
        req: Request<B>,
    ) -> http::Result<HttpResponse>
    where
        B: hyper::body::Body,
        B::Error: std::fmt::Display,
    {
        match (req.method(), req.uri().path()) {
            (&Method::GET, ROOT_PATH) => {
                create_text_http_response(LIVENESS_MESSAGE, StatusCode::OK)
            }
            (&Method::GET, COUNT_PATH) => {
                create_text_http_response(state.counter().get().to_string(), StatusCode::OK)
            }
            (&Method::DELETE, COUNT_PATH) => {
                state.counter().reset();
                debug!("Line counter reset");
                create_text_http_response(COUNT_RESET_MESSAGE, StatusCode::OK)
            }
            (&Method::POST, AGENT_LOGS_PATH) => Self::agent_logs_handler(state, req).await,
            _ => {
                let mut not_found = Response::default();
                *not_found.status_mut() = StatusCode::NOT_FOUND;
                Ok(not_found)
            }
        }
    }

    async fn agent_logs_handler<B>(
        state: Arc<IngestState>,
        req: Request<B>,
    ) -> http::Result<HttpResponse>
    where
        B: hyper::body::Body,
        B::Error: std::fmt::Display,
    {
        if !state.first_request_seen.swap(true, Ordering::Relaxed) {
            info!("Ingester received first request");
        }

        let max_content_length = state.config().max_request_content_length;
        let (parts, body) = req.into_parts();
        if let Some(response) = verify_request_content_length(
            &parts.headers,
            max_content_length,
            "Error ingesting logs",
        ) {
            return response;
        }

        let body = match body.collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(e) => {
                return log_and_create_http_response(
                    &format!("Error reading log request body: {e}"),
                    StatusCode::BAD_REQUEST,
                );
            }
        };

        // double check content length is < max request content length in case transfer encoding is used
        if body.len() > max_content_length {
            return log_and_create_http_response(
                "Error ingesting logs: Payload too large",
                StatusCode::PAYLOAD_TOO_LARGE,
            );
        }

        let body = match decompress_request_body(
            &parts.headers,
            body,
            max_content_length,
            "Error ingesting logs",
        ) {
            Ok(body) => body,
            Err(response) => return response,
        };

        match state.ingest(&body).await {
            Ok(line_count) => {
                debug!("Ingested {line_count} lines");
                create_text_http_response(INGEST_SUCCESS_MESSAGE, StatusCode::OK)
            }
            Err(err) => log_and_create_http_response(
                &format!("Error ingesting logs: {err}"),
                err.status_code(),
            ),
        }
    }
}
