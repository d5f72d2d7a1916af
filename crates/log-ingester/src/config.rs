// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;

const DEFAULT_PORT: u16 = 80;
const DEFAULT_OUTPUT_DIR: &str = "/root/output";
const DEFAULT_MAX_CONCURRENT_WRITES: usize = 8;

#[derive(Debug, Clone)]
pub struct Config {
    pub host: IpAddr,
    pub port: u16,
    /// directory holding one output file per log source
    pub output_dir: PathBuf,
    pub max_request_content_length: usize,
    /// upper bound on per-source appends in flight for a single batch
    pub max_concurrent_writes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            max_request_content_length: 10 * 1024 * 1024, // 10MB in Bytes
            max_concurrent_writes: DEFAULT_MAX_CONCURRENT_WRITES,
        }
    }
}

impl Config {
    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}
