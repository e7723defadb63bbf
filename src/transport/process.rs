//! Process-pool transport
//!
//! Each slice is scanned by a forked child process. The child inherits the
//! buffer through the fork, so nothing but the slice boundaries is handed over.
//! It writes its count as 8 little-endian bytes to a pipe and exits; the parent
//! reads the pipe and then reaps the child with `waitpid` before the slot is
//! considered done.
//!
//! The child only scans, writes and calls `_exit`. It never allocates, logs or
//! unwinds, which keeps forking safe from a multi-threaded parent. Both pipe
//! ends are close-on-exec, so processes launched later never inherit them.

use super::{WorkerHandle, WorkerTransport};
use crate::error::{Result, ScanError};
use crate::partition::Slice;
use crate::stats::PartialResult;
use crate::util::TripleBuffer;
use crate::worker::count_below;
use std::fs::File;
use std::io::Read;
use std::os::unix::io::{FromRawFd, RawFd};
use std::os::unix::process::ExitStatusExt;
use std::process::ExitStatus;

/// Size of the count written by a child
const RESULT_LEN: usize = 8;

pub struct ProcessTransport {
    threshold: u32,
}

impl ProcessTransport {
    pub fn new(threshold: u32) -> Self {
        Self { threshold }
    }
}

/// A forked worker process and the read end of its result pipe
///
/// Dropping a handle that was never waited on kills and reaps the child.
pub struct ProcessHandle {
    slice: Slice,
    pid: libc::pid_t,
    result: Option<File>,
    reaped: bool,
}

/// Outcome of waiting on a worker process
#[derive(Debug)]
pub struct ExitResult {
    pub pid: libc::pid_t,
    pub status: ExitStatus,
    /// Count read from the result pipe, if the child delivered one
    pub count: Result<u64>,
}

impl ProcessHandle {
    pub fn pid(&self) -> libc::pid_t {
        self.pid
    }

    fn read_count(&mut self) -> Result<u64> {
        let mut pipe = self
            .result
            .take()
            .ok_or_else(|| ScanError::protocol("result pipe already consumed"))?;

        let mut buf = [0u8; RESULT_LEN];
        pipe.read_exact(&mut buf).map_err(|e| {
            ScanError::transport(format!("worker process {} closed its result pipe early", self.pid), e)
        })?;

        Ok(u64::from_le_bytes(buf))
    }

    fn reap(&mut self) -> Result<ExitStatus> {
        let mut status: libc::c_int = 0;
        loop {
            let rc = unsafe { libc::waitpid(self.pid, &mut status, 0) };
            if rc == self.pid {
                break;
            }
            let err = std::io::Error::last_os_error();
            if err.kind() != std::io::ErrorKind::Interrupted {
                self.reaped = true;
                return Err(ScanError::transport(format!("waitpid({}) failed", self.pid), err));
            }
        }

        self.reaped = true;
        Ok(ExitStatus::from_raw(status))
    }
}

impl Drop for ProcessHandle {
    fn drop(&mut self) {
        if !self.reaped {
            unsafe {
                libc::kill(self.pid, libc::SIGKILL);
            }
            if let Err(e) = self.reap() {
                tracing::warn!(pid = self.pid, "failed to reap abandoned worker: {}", e);
            }
        }
    }
}

impl WorkerHandle for ProcessHandle {
    fn slice(&self) -> &Slice {
        &self.slice
    }

    fn identity(&self) -> String {
        format!("pid {}", self.pid)
    }
}

/// Fork a child that scans `slice` of `buffer`.
pub fn spawn_worker(buffer: &TripleBuffer, slice: Slice, threshold: u32) -> Result<ProcessHandle> {
    let view = buffer.view(&slice)?;
    fork_child(slice, |fd| {
        let count = count_below(view, threshold).to_le_bytes();
        let code = if write_fd(fd, &count) { 0 } else { 1 };
        exit_child(fd, code)
    })
}

/// Create the result pipe with close-on-exec set on both ends.
fn result_pipe(slice: &Slice) -> Result<(RawFd, RawFd)> {
    let mut fds: [RawFd; 2] = [-1, -1];

    #[cfg(any(target_os = "linux", target_os = "android", target_os = "freebsd"))]
    let rc = unsafe { libc::pipe2(fds.as_mut_ptr(), libc::O_CLOEXEC) };

    #[cfg(not(any(target_os = "linux", target_os = "android", target_os = "freebsd")))]
    let rc = unsafe {
        let rc = libc::pipe(fds.as_mut_ptr());
        if rc == 0 {
            libc::fcntl(fds[0], libc::F_SETFD, libc::FD_CLOEXEC);
            libc::fcntl(fds[1], libc::F_SETFD, libc::FD_CLOEXEC);
        }
        rc
    };

    if rc != 0 {
        return Err(ScanError::spawn(
            format!("result pipe for worker {}", slice.index),
            std::io::Error::last_os_error(),
        ));
    }
    Ok((fds[0], fds[1]))
}

/// Fork and run `child` with the write end of a fresh result pipe.
///
/// `child` runs in the forked process and must end in [`exit_child`].
fn fork_child<F>(slice: Slice, child: F) -> Result<ProcessHandle>
where
    F: FnOnce(RawFd) -> std::convert::Infallible,
{
    let (read_fd, write_fd) = result_pipe(&slice)?;

    let pid = unsafe { libc::fork() };
    if pid < 0 {
        let err = std::io::Error::last_os_error();
        unsafe {
            libc::close(read_fd);
            libc::close(write_fd);
        }
        return Err(ScanError::spawn(format!("fork for worker {}", slice.index), err));
    }

    if pid == 0 {
        unsafe { libc::close(read_fd) };
        match child(write_fd) {}
    }

    unsafe { libc::close(write_fd) };
    let result = unsafe { File::from_raw_fd(read_fd) };

    Ok(ProcessHandle {
        slice,
        pid,
        result: Some(result),
        reaped: false,
    })
}

/// Wait for a worker process: read its count, then reap it.
///
/// The child is always reaped, even when its count could not be read.
pub fn wait(mut handle: ProcessHandle) -> Result<ExitResult> {
    let count = handle.read_count();
    let status = handle.reap()?;

    Ok(ExitResult {
        pid: handle.pid,
        status,
        count,
    })
}

/// Write all of `bytes` to `fd` with raw syscalls. Safe to call after fork.
fn write_fd(fd: RawFd, bytes: &[u8]) -> bool {
    let mut written = 0;
    while written < bytes.len() {
        let rc = unsafe {
            libc::write(
                fd,
                bytes[written..].as_ptr() as *const libc::c_void,
                bytes.len() - written,
            )
        };
        if rc > 0 {
            written += rc as usize;
        } else if rc < 0 && std::io::Error::last_os_error().kind() == std::io::ErrorKind::Interrupted {
            continue;
        } else {
            return false;
        }
    }
    true
}

/// Close the result pipe and leave the child without unwinding.
fn exit_child(fd: RawFd, code: libc::c_int) -> ! {
    unsafe {
        libc::close(fd);
        libc::_exit(code)
    }
}

impl WorkerTransport for ProcessTransport {
    type Handle = ProcessHandle;

    fn name(&self) -> &'static str {
        "processes"
    }

    fn dispatch(&mut self, buffer: &TripleBuffer, slice: Slice) -> Result<ProcessHandle> {
        let handle = spawn_worker(buffer, slice, self.threshold)?;
        tracing::debug!(worker = slice.index, pid = handle.pid, "worker process forked");
        Ok(handle)
    }

    fn await_result(&mut self, handle: ProcessHandle) -> Result<PartialResult> {
        let worker = handle.slice.index;
        let exit = wait(handle)?;
        let count = exit.count?;

        if !exit.status.success() {
            return Err(ScanError::Aggregation(format!(
                "worker process {} exited abnormally: {}",
                exit.pid, exit.status
            )));
        }

        tracing::debug!(worker, pid = exit.pid, local_count = count, "worker process reaped");
        Ok(PartialResult::new(worker, count))
    }
}
