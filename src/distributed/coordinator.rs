//! Network-pool transport
//!
//! The coordinator side of the network strategy. It:
//! - Binds the listening endpoint when constructed, before any peer starts
//! - Optionally launches one peer process per slice (`launch = "spawn"`)
//! - Accepts exactly one connection per slice and sends the slice over it
//! - Reads each peer's 8-byte reply and reaps the peer it launched
//!
//! The [`WorkerTransport`] contract is synchronous, so the transport owns a
//! tokio runtime and drives each socket operation with `block_on`.

use crate::config::{LaunchMode, NetworkConfig};
use crate::distributed::protocol::{read_reply, write_frame};
use crate::error::{Result, ScanError};
use crate::partition::Slice;
use crate::stats::PartialResult;
use crate::transport::{WorkerHandle, WorkerTransport};
use crate::util::TripleBuffer;
use std::future::Future;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::runtime::Runtime;

/// Serves slices to network peers over TCP
pub struct NetworkTransport {
    runtime: Runtime,
    listener: TcpListener,
    local_addr: SocketAddr,
    launch: LaunchMode,
    threshold: u32,
    accept_timeout: Option<Duration>,
    io_timeout: Option<Duration>,
    connect_retry_ms: u64,
    connect_attempts: u32,
    /// Program and leading arguments used to launch peers; the running
    /// executable when unset
    peer_program: Option<(PathBuf, Vec<String>)>,
}

/// One accepted peer connection with its slice already sent
pub struct NetworkHandle {
    slice: Slice,
    peer: SocketAddr,
    stream: TcpStream,
    process: Option<PeerProcess>,
}

/// A peer process launched by the coordinator
///
/// Killed and reaped on drop unless it was waited for normally.
struct PeerProcess {
    child: Child,
    reaped: bool,
}

impl PeerProcess {
    fn start(mut cmd: Command, worker: usize) -> Result<Self> {
        let child = cmd
            .spawn()
            .map_err(|e| ScanError::spawn(format!("peer process for worker {}", worker), e))?;

        tracing::debug!(worker, pid = child.id(), "peer process launched");
        Ok(Self { child, reaped: false })
    }

    /// Wait for the peer to exit after it has replied.
    fn reap(mut self) -> Result<()> {
        let pid = self.child.id();
        let status = self
            .child
            .wait()
            .map_err(|e| ScanError::transport(format!("failed to wait for peer process {}", pid), e))?;
        self.reaped = true;

        if !status.success() {
            return Err(ScanError::Aggregation(format!(
                "peer process {} exited with {}",
                pid, status
            )));
        }
        Ok(())
    }
}

impl Drop for PeerProcess {
    fn drop(&mut self) {
        if self.reaped {
            return;
        }
        let pid = self.child.id();
        if let Err(e) = self.child.kill() {
            tracing::warn!(pid, "failed to kill peer process: {}", e);
        }
        if let Err(e) = self.child.wait() {
            tracing::warn!(pid, "failed to reap peer process: {}", e);
        }
    }
}

impl WorkerHandle for NetworkHandle {
    fn slice(&self) -> &Slice {
        &self.slice
    }

    fn identity(&self) -> String {
        match self.process {
            Some(ref process) => format!("peer {} (pid {})", self.peer, process.child.id()),
            None => format!("peer {}", self.peer),
        }
    }
}

/// Run `fut`, failing with a transport error if `limit` elapses first.
async fn bounded<T, F>(limit: Option<Duration>, what: &str, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match limit {
        Some(limit) => tokio::time::timeout(limit, fut).await.map_err(|_| {
            ScanError::protocol(format!("{} timed out after {:?}", what, limit))
        })?,
        None => fut.await,
    }
}

impl NetworkTransport {
    /// Bind the listening endpoint described by `network`.
    pub fn new(network: &NetworkConfig, threshold: u32) -> Result<Self> {
        let runtime = Runtime::new()
            .map_err(|e| ScanError::transport("failed to create tokio runtime", e))?;

        let endpoint = network.endpoint();
        let listener = runtime
            .block_on(TcpListener::bind(&endpoint))
            .map_err(|e| ScanError::transport(format!("failed to bind {}", endpoint), e))?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| ScanError::transport("failed to read listener address", e))?;

        tracing::info!(addr = %local_addr, launch = ?network.launch, "listening for peers");

        Ok(Self {
            runtime,
            listener,
            local_addr,
            launch: network.launch,
            threshold,
            accept_timeout: network.accept_timeout(),
            io_timeout: network.io_timeout(),
            connect_retry_ms: network.connect_retry_ms,
            connect_attempts: network.connect_attempts,
            peer_program: None,
        })
    }

    /// Launch peers as `program args.. --mode worker ..` instead of re-running
    /// the current executable (for example through a wrapper such as `taskset`).
    pub fn with_peer_command<I, S>(mut self, program: impl Into<PathBuf>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.peer_program = Some((program.into(), args.into_iter().map(Into::into).collect()));
        self
    }

    /// Command line for one spawned peer.
    ///
    /// Peers inherit the scan threshold and connect retry policy.
    fn peer_command(&self) -> Result<Command> {
        let mut cmd = match self.peer_program {
            Some((ref program, ref args)) => {
                let mut cmd = Command::new(program);
                cmd.args(args);
                cmd
            }
            None => {
                let exe_path = std::env::current_exe()
                    .map_err(|e| ScanError::spawn("failed to locate current executable", e))?;
                Command::new(exe_path)
            }
        };

        cmd.arg("--mode").arg("worker");
        cmd.arg("--connect").arg(self.local_addr.to_string());
        cmd.arg("--threshold").arg(self.threshold.to_string());
        cmd.arg("--connect-retry-ms").arg(self.connect_retry_ms.to_string());
        cmd.arg("--connect-attempts").arg(self.connect_attempts.to_string());
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::null());
        Ok(cmd)
    }

    /// Address peers connect to (resolves port 0 to the bound port)
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}

impl WorkerTransport for NetworkTransport {
    type Handle = NetworkHandle;

    fn name(&self) -> &'static str {
        "network"
    }

    fn dispatch(&mut self, buffer: &TripleBuffer, slice: Slice) -> Result<NetworkHandle> {
        let view = buffer.view(&slice)?;

        // Launched before accepting so its connect attempt is what we accept next
        let process = match self.launch {
            LaunchMode::Spawn => Some(PeerProcess::start(self.peer_command()?, slice.index)?),
            LaunchMode::External => None,
        };

        let listener = &self.listener;
        let accept_timeout = self.accept_timeout;
        let io_timeout = self.io_timeout;

        let (stream, peer) = self.runtime.block_on(async {
            let (mut stream, peer) = bounded(accept_timeout, "accept", async {
                listener
                    .accept()
                    .await
                    .map_err(|e| ScanError::transport("failed to accept peer connection", e))
            })
            .await?;

            bounded(io_timeout, "slice send", write_frame(&mut stream, view)).await?;
            stream
                .shutdown()
                .await
                .map_err(|e| ScanError::transport(format!("failed to half-close {}", peer), e))?;

            Ok::<_, ScanError>((stream, peer))
        })?;

        tracing::debug!(worker = slice.index, %peer, bytes = view.len(), "slice sent");

        Ok(NetworkHandle {
            slice,
            peer,
            stream,
            process,
        })
    }

    fn await_result(&mut self, mut handle: NetworkHandle) -> Result<PartialResult> {
        let io_timeout = self.io_timeout;
        let count = self
            .runtime
            .block_on(bounded(io_timeout, "reply", read_reply(&mut handle.stream)))?;

        tracing::debug!(worker = handle.slice.index, peer = %handle.peer, count, "reply received");

        if let Some(process) = handle.process.take() {
            process.reap()?;
        }

        Ok(PartialResult::new(handle.slice.index, count))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AggregationKind;
    use crate::coordinator::Coordinator;
    use crate::distributed::ScanPeer;
    use crate::error::ErrorKind;
    use crate::util::TRIPLE_LEN;
    use crate::worker::{count_below, DEFAULT_THRESHOLD};
    use rand::{Rng, SeedableRng};
    use rand_xoshiro::Xoshiro256PlusPlus;
    use std::io::{Read, Write};
    use std::thread::JoinHandle;

    fn external_config() -> NetworkConfig {
        NetworkConfig {
            port: 0,
            launch: LaunchMode::External,
            accept_timeout_ms: 10_000,
            io_timeout_ms: 10_000,
            ..Default::default()
        }
    }

    fn random_buffer(triples: usize, seed: u64) -> TripleBuffer {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
        let bytes: Vec<u8> = (0..triples * TRIPLE_LEN).map(|_| rng.gen_range(0..24)).collect();
        TripleBuffer::new(bytes).unwrap()
    }

    fn start_peers(addr: SocketAddr, count: usize) -> Vec<JoinHandle<Result<u64>>> {
        (0..count)
            .map(|_| {
                std::thread::spawn(move || {
                    let runtime = tokio::runtime::Builder::new_current_thread()
                        .enable_all()
                        .build()
                        .unwrap();
                    runtime.block_on(ScanPeer::new(addr.to_string(), DEFAULT_THRESHOLD).run())
                })
            })
            .collect()
    }

    #[test]
    fn test_five_peers_match_single_pass() {
        let buffer = random_buffer(17, 3);
        let transport = NetworkTransport::new(&external_config(), DEFAULT_THRESHOLD).unwrap();
        let peers = start_peers(transport.local_addr(), 5);

        let mut coordinator = Coordinator::new(transport, AggregationKind::Slots);
        let total = coordinator.run(&buffer, 5).unwrap();

        let peer_sum: u64 = peers.into_iter().map(|p| p.join().unwrap().unwrap()).sum();
        assert_eq!(total, count_below(buffer.as_bytes(), DEFAULT_THRESHOLD));
        assert_eq!(peer_sum, total);
    }

    #[test]
    fn test_large_slice_over_socket() {
        let buffer = random_buffer(400_000, 11);
        let transport = NetworkTransport::new(&external_config(), DEFAULT_THRESHOLD).unwrap();
        let peers = start_peers(transport.local_addr(), 3);

        let mut coordinator = Coordinator::new(transport, AggregationKind::Locked);
        let total = coordinator.run(&buffer, 3).unwrap();

        for peer in peers {
            peer.join().unwrap().unwrap();
        }
        assert_eq!(total, count_below(buffer.as_bytes(), DEFAULT_THRESHOLD));
    }

    #[test]
    fn test_truncated_reply_fails_run() {
        let buffer = random_buffer(15, 5);
        let transport = NetworkTransport::new(&external_config(), DEFAULT_THRESHOLD).unwrap();
        let addr = transport.local_addr();

        let peer = std::thread::spawn(move || {
            let mut stream = std::net::TcpStream::connect(addr).unwrap();
            let mut request = Vec::new();
            stream.read_to_end(&mut request).unwrap();
            stream.write_all(b"1234").unwrap();
            request.len()
        });

        let mut coordinator = Coordinator::new(transport, AggregationKind::Slots);
        let err = coordinator.run(&buffer, 1).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Transport);
        assert_eq!(err.worker(), Some(0));
        assert_eq!(peer.join().unwrap(), 8 + 45);
    }

    #[test]
    fn test_malformed_reply_is_aggregation_error() {
        let buffer = random_buffer(6, 8);
        let mut transport = NetworkTransport::new(&external_config(), DEFAULT_THRESHOLD).unwrap();
        let addr = transport.local_addr();

        let peer = std::thread::spawn(move || {
            let mut stream = std::net::TcpStream::connect(addr).unwrap();
            let mut request = Vec::new();
            stream.read_to_end(&mut request).unwrap();
            stream.write_all(b"x1\0\0\0\0\0\0").unwrap();
        });

        let slice = Slice { index: 0, start: 0, end: buffer.len() };
        let handle = transport.dispatch(&buffer, slice).unwrap();
        assert!(handle.identity().starts_with("peer 127.0.0.1:"));

        let err = transport.await_result(handle).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Aggregation);
        peer.join().unwrap();
    }

    #[test]
    fn test_accept_timeout() {
        let config = NetworkConfig {
            accept_timeout_ms: 100,
            ..external_config()
        };
        let buffer = random_buffer(3, 1);
        let mut transport = NetworkTransport::new(&config, DEFAULT_THRESHOLD).unwrap();

        let err = transport
            .dispatch(&buffer, Slice { index: 0, start: 0, end: 9 })
            .err()
            .unwrap();
        assert_eq!(err.kind(), ErrorKind::Transport);
        assert!(err.to_string().contains("accept timed out"));
    }

    #[test]
    fn test_bind_conflict_is_transport_error() {
        let first = NetworkTransport::new(&external_config(), DEFAULT_THRESHOLD).unwrap();
        let config = NetworkConfig {
            port: first.local_addr().port(),
            ..external_config()
        };

        let err = NetworkTransport::new(&config, DEFAULT_THRESHOLD).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::Transport);
    }

    fn spawn_config(accept_timeout_ms: u64) -> NetworkConfig {
        NetworkConfig {
            port: 0,
            launch: LaunchMode::Spawn,
            accept_timeout_ms,
            connect_retry_ms: 7,
            connect_attempts: 9,
            ..Default::default()
        }
    }

    fn shell(script: &str) -> Command {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(script);
        cmd
    }

    #[test]
    fn test_peer_command_forwards_settings() {
        let transport = NetworkTransport::new(&spawn_config(1000), 500).unwrap();
        let cmd = transport.peer_command().unwrap();
        let args: Vec<String> = cmd
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();

        let addr = transport.local_addr().to_string();
        let expected = [
            "--mode", "worker", "--connect", addr.as_str(), "--threshold", "500",
            "--connect-retry-ms", "7", "--connect-attempts", "9",
        ];
        assert_eq!(args, expected);
    }

    #[test]
    fn test_peer_command_wrapper_prefix() {
        let transport = NetworkTransport::new(&spawn_config(1000), DEFAULT_THRESHOLD)
            .unwrap()
            .with_peer_command("taskset", ["-c", "0", "/usr/bin/scanpulse"]);
        let cmd = transport.peer_command().unwrap();

        assert_eq!(cmd.get_program(), "taskset");
        let args: Vec<_> = cmd.get_args().take(4).collect();
        assert_eq!(args, ["-c", "0", "/usr/bin/scanpulse", "--mode"]);
    }

    #[test]
    fn test_peer_exit_status() {
        PeerProcess::start(shell("exit 0"), 0).unwrap().reap().unwrap();

        let err = PeerProcess::start(shell("exit 3"), 1).unwrap().reap().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Aggregation);
    }

    #[test]
    fn test_dropped_peer_is_killed_and_reaped() {
        let started = std::time::Instant::now();
        let process = PeerProcess::start(shell("exec sleep 30"), 0).unwrap();
        let pid = process.child.id() as libc::pid_t;
        drop(process);

        assert!(started.elapsed() < Duration::from_secs(10));
        // Reaped, so the pid no longer names a process
        assert_eq!(unsafe { libc::kill(pid, 0) }, -1);
    }

    #[test]
    fn test_spawned_peer_killed_when_accept_times_out() {
        let buffer = random_buffer(5, 2);
        // The peer never connects; the run must abort instead of waiting for it
        let transport = NetworkTransport::new(&spawn_config(200), DEFAULT_THRESHOLD)
            .unwrap()
            .with_peer_command("sh", ["-c", "exec sleep 30", "peer"]);

        let started = std::time::Instant::now();
        let err = Coordinator::new(transport, AggregationKind::Slots)
            .run(&buffer, 2)
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Transport);
        assert_eq!(err.worker(), Some(0));
        assert!(err.to_string().contains("worker 0"));
        assert!(started.elapsed() < Duration::from_secs(10));
    }
}
