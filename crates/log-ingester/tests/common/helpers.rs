// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Helper functions for integration tests

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use hyper::{Request, StatusCode};
use hyper_util::rt::TokioIo;
use log_ingester::config::Config;
use log_ingester::ingester::{IngestState, Ingester};
use log_ingester::writer::{AppendWriter, FsAppendWriter};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio::time::timeout;

pub struct TestIngester {
    pub port: u16,
    pub state: Arc<IngestState>,
    handle: JoinHandle<()>,
}

impl Drop for TestIngester {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Start an ingester writing to `output_dir` on an ephemeral local port
pub async fn start_fs_ingester(output_dir: &Path) -> TestIngester {
    let config = Config {
        output_dir: output_dir.to_path_buf(),
        ..Default::default()
    };
    let writer = Arc::new(FsAppendWriter::new(output_dir));
    start_ingester(config, writer).await
}

/// Start an ingester with the given writer on an ephemeral local port
pub async fn start_ingester(
    config: Config,
    writer: Arc<dyn AppendWriter + Send + Sync>,
) -> TestIngester {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind test listener");
    let port = listener.local_addr().expect("Failed to get local addr").port();

    let state = Arc::new(IngestState::new(config, writer));
    let ingester = Ingester::new(Arc::clone(&state));
    let handle = tokio::spawn(async move {
        let _ = ingester.serve(listener).await;
    });

    TestIngester {
        port,
        state,
        handle,
    }
}

/// Send an HTTP request over TCP and return the status and body
pub async fn send_tcp_request(
    port: u16,
    uri: &str,
    method: &str,
    headers: &[(&str, &str)],
    body: Option<Vec<u8>>,
) -> Result<(StatusCode, String), Box<dyn std::error::Error>> {
    let stream = timeout(
        Duration::from_secs(2),
        tokio::net::TcpStream::connect(format!("127.0.0.1:{}", port)),
    )
    .await??;

    let io = TokioIo::new(stream);
    let (mut sender, conn) = hyper::client::conn::http1::handshake(io).await?;

    tokio::spawn(async move {
        let _ = conn.await;
    });

    let mut request_builder = Request::builder()
        .uri(uri)
        .method(method)
        .header("Host", format!("127.0.0.1:{}", port));
    for (name, value) in headers {
        request_builder = request_builder.header(*name, *value);
    }

    let body_data = body.unwrap_or_default();
    let request = request_builder
        .header("Content-Length", body_data.len().to_string())
        .body(Full::new(Bytes::from(body_data)))?;

    let response = timeout(Duration::from_secs(5), sender.send_request(request)).await??;
    let status = response.status();
    let bytes = response.into_body().collect().await?.to_bytes();
    Ok((status, String::from_utf8(bytes.to_vec())?))
}

/// POST a JSON batch to the agent logs endpoint
pub async fn post_logs(
    port: u16,
    body: &serde_json::Value,
) -> Result<(StatusCode, String), Box<dyn std::error::Error>> {
    send_tcp_request(
        port,
        "/logs/agent",
        "POST",
        &[("Content-Type", "application/json")],
        Some(body.to_string().into_bytes()),
    )
    .await
}
