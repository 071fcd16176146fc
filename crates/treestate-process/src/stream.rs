use std::io;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, ChildStdout};
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use crate::{CappedBuffer, ExitReport};

/// Size of a single stdout read
const CHUNK_SIZE: usize = 64 * 1024;

/// A running process whose stdout is consumed chunk by chunk.
///
/// The process leads its own process group; termination signals the whole
/// group so helpers it forked cannot keep the pipes open.
pub struct StreamingChild {
    child: Child,
    group: Option<u32>,
    stdout: Option<ChildStdout>,
    stderr: Arc<Mutex<CappedBuffer>>,
    stderr_task: Option<JoinHandle<()>>,
    kill_grace: Duration,
    killed: bool,
}

impl StreamingChild {
    pub(crate) fn new(
        mut child: Child,
        stderr_limit: usize,
        kill_grace: Duration,
    ) -> io::Result<Self> {
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| io::Error::other("stdout not captured"))?;
        let stderr = Arc::new(Mutex::new(CappedBuffer::new(stderr_limit)));
        let stderr_task = child
            .stderr
            .take()
            .map(|pipe| tokio::spawn(drain_capped(pipe, stderr.clone())));

        Ok(Self {
            group: child.id(),
            child,
            stdout: Some(stdout),
            stderr,
            stderr_task,
            kill_grace,
            killed: false,
        })
    }

    /// OS process id, if the process has not been reaped yet
    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    /// Read the next stdout chunk. Returns `None` at end of stream.
    ///
    /// Cancel safe: a chunk is never half-consumed when the future is dropped.
    pub async fn next_chunk(&mut self) -> io::Result<Option<Vec<u8>>> {
        let Some(stdout) = self.stdout.as_mut() else {
            return Ok(None);
        };

        let mut buf = vec![0u8; CHUNK_SIZE];
        let n = stdout.read(&mut buf).await?;
        if n == 0 {
            self.stdout = None;
            return Ok(None);
        }
        buf.truncate(n);
        trace!(bytes = n, "stdout chunk");
        Ok(Some(buf))
    }

    /// Stop the process group: SIGTERM first, then a forced kill after the
    /// grace period. Calling it again is a no-op.
    pub async fn terminate(&mut self) {
        if self.killed {
            return;
        }
        self.killed = true;
        // Closing our end of the pipe stops git from blocking on a full buffer.
        self.stdout = None;
        terminate_child(&mut self.child, self.group, self.kill_grace).await;
    }

    /// Wait for the process to exit and collect its stderr.
    ///
    /// A descendant still holding stderr after the exit gets `kill_grace` to
    /// let go before the group is killed; whatever was read by then is kept.
    pub async fn wait(mut self) -> io::Result<ExitReport> {
        self.stdout = None;
        let status = self.child.wait().await?;

        if let Some(mut handle) = self.stderr_task.take() {
            match tokio::time::timeout(self.kill_grace, &mut handle).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(error = %e, "stderr reader task failed"),
                Err(_) => {
                    debug!(
                        grace_ms = self.kill_grace.as_millis(),
                        "stderr still open after exit, killing process group"
                    );
                    handle.abort();
                    signal_group(self.group, GroupSignal::Kill);
                }
            }
        }
        let stderr = std::mem::take(&mut *lock(&self.stderr));

        debug!(
            exit_code = status.code().unwrap_or(-1),
            killed = self.killed,
            stderr_bytes = stderr.len(),
            "Process exited"
        );

        Ok(ExitReport {
            exit_code: status.code(),
            stderr: stderr.to_string_lossy(),
            stderr_truncated: stderr.is_truncated(),
            killed: self.killed,
        })
    }
}

impl Drop for StreamingChild {
    fn drop(&mut self) {
        if let Some(handle) = self.stderr_task.take() {
            handle.abort();
        }
        // kill_on_drop only reaches the leader
        if self.child.id().is_some() {
            signal_group(self.group, GroupSignal::Kill);
        }
    }
}

fn lock(buffer: &Mutex<CappedBuffer>) -> MutexGuard<'_, CappedBuffer> {
    buffer.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Read `reader` to the end into the shared capped buffer.
/// Excess bytes are still read so the child never blocks on a full pipe.
pub(crate) async fn drain_capped<R>(mut reader: R, buffer: Arc<Mutex<CappedBuffer>>)
where
    R: AsyncRead + Unpin,
{
    let mut buf = [0u8; 4096];
    loop {
        match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => lock(&buffer).push(&buf[..n]),
            Err(e) => {
                trace!(error = %e, "stderr read failed");
                break;
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum GroupSignal {
    Terminate,
    Kill,
}

/// Signal every process in the group led by `group`. Returns whether the
/// signal was delivered.
#[cfg(unix)]
fn signal_group(group: Option<u32>, signal: GroupSignal) -> bool {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    let Some(pgid) = group else {
        return false;
    };
    let signal = match signal {
        GroupSignal::Terminate => Signal::SIGTERM,
        GroupSignal::Kill => Signal::SIGKILL,
    };
    match killpg(Pid::from_raw(pgid as i32), signal) {
        Ok(()) => true,
        Err(e) => {
            trace!(pgid, ?signal, error = %e, "killpg failed");
            false
        }
    }
}

#[cfg(not(unix))]
fn signal_group(_group: Option<u32>, _signal: GroupSignal) -> bool {
    false
}

/// SIGTERM the group, wait up to `grace`, then SIGKILL the group and reap
/// the leader
async fn terminate_child(child: &mut Child, group: Option<u32>, grace: Duration) {
    if signal_group(group, GroupSignal::Terminate) {
        match tokio::time::timeout(grace, child.wait()).await {
            Ok(Ok(status)) => {
                debug!(exit_code = status.code().unwrap_or(-1), "Process exited after SIGTERM")
            }
            _ => debug!(grace_ms = grace.as_millis(), "Process ignored SIGTERM, killing"),
        }
    }

    // Also reaches descendants that outlived the leader
    signal_group(group, GroupSignal::Kill);
    if let Err(e) = child.start_kill() {
        // Already exited between the signal and the kill.
        trace!(error = %e, "start_kill failed");
    }
    if tokio::time::timeout(grace, child.wait()).await.is_err() {
        warn!("Process did not exit after kill");
    }
}
