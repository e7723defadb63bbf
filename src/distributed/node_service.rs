//! Network peer
//!
//! A peer is the worker side of the network strategy. It:
//! - Connects to the coordinator, retrying until the listener is up
//! - Receives one length-prefixed slice
//! - Scans it
//! - Replies with the partial count and closes the connection
//!
//! Peers are either launched by the coordinator (`scanpulse --mode worker`)
//! or started independently against a known `host:port`.

use crate::distributed::protocol::{read_frame, write_reply};
use crate::error::{Result, ScanError};
use crate::worker::ScanWorker;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::time::sleep;

/// Worker that serves exactly one slice for a coordinator
#[derive(Debug, Clone)]
pub struct ScanPeer {
    /// Coordinator address (`host:port`)
    coordinator: String,
    threshold: u32,
    connect_retry: Duration,
    connect_attempts: u32,
}

impl ScanPeer {
    pub fn new(coordinator: impl Into<String>, threshold: u32) -> Self {
        Self {
            coordinator: coordinator.into(),
            threshold,
            connect_retry: Duration::from_millis(50),
            connect_attempts: 200,
        }
    }

    /// Set the delay between connect attempts and how many attempts to make.
    pub fn with_retry(mut self, delay: Duration, attempts: u32) -> Self {
        self.connect_retry = delay;
        self.connect_attempts = attempts.max(1);
        self
    }

    /// Connect to the coordinator, retrying while the listener is not ready.
    pub async fn connect(&self) -> Result<TcpStream> {
        let mut attempt = 1;
        loop {
            match TcpStream::connect(&self.coordinator).await {
                Ok(stream) => {
                    tracing::debug!(coordinator = %self.coordinator, attempt, "connected");
                    return Ok(stream);
                }
                Err(e) if attempt < self.connect_attempts => {
                    tracing::trace!(coordinator = %self.coordinator, attempt, "connect failed: {}", e);
                    attempt += 1;
                    sleep(self.connect_retry).await;
                }
                Err(e) => {
                    return Err(ScanError::transport(
                        format!(
                            "failed to connect to {} after {} attempts",
                            self.coordinator, attempt
                        ),
                        e,
                    ));
                }
            }
        }
    }

    /// Serve one slice: receive, scan, reply, close. Returns the count sent.
    pub async fn run(&self) -> Result<u64> {
        let mut stream = self.connect().await?;
        let local = stream
            .local_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "unknown".to_string());

        let payload = read_frame(&mut stream).await?;
        tracing::debug!(peer = %local, bytes = payload.len(), "slice received");

        let worker = ScanWorker::new(std::process::id() as usize, self.threshold);
        let count = worker.scan(&payload)?;

        write_reply(&mut stream, count).await?;
        stream
            .shutdown()
            .await
            .map_err(|e| ScanError::transport("failed to close connection", e))?;

        tracing::info!(peer = %local, local_count = count, "reply sent");
        Ok(count)
    }
}

/// Run one peer to completion on a fresh runtime (worker-mode entry point).
pub fn run_peer_blocking(peer: &ScanPeer) -> anyhow::Result<u64> {
    use anyhow::Context;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to create tokio runtime")?;

    runtime
        .block_on(peer.run())
        .with_context(|| format!("Worker for {} failed", peer.coordinator))
}
