use std::time::Duration;

/// Byte buffer that keeps at most `limit` bytes and remembers whether it dropped any
#[derive(Debug, Clone, Default)]
pub struct CappedBuffer {
    data: Vec<u8>,
    limit: usize,
    truncated: bool,
}

impl CappedBuffer {
    pub fn new(limit: usize) -> Self {
        Self {
            data: Vec::new(),
            limit,
            truncated: false,
        }
    }

    /// Append bytes, keeping only what fits under the cap
    pub fn push(&mut self, bytes: &[u8]) {
        let room = self.limit.saturating_sub(self.data.len());
        if bytes.len() > room {
            self.truncated = true;
        }
        let take = bytes.len().min(room);
        self.data.extend_from_slice(&bytes[..take]);
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn is_truncated(&self) -> bool {
        self.truncated
    }

    pub fn to_string_lossy(&self) -> String {
        String::from_utf8_lossy(&self.data).into_owned()
    }
}

/// Output captured from a buffered process run
#[derive(Debug, Clone)]
pub struct ProcessOutput {
    /// Full stdout
    pub stdout: String,
    /// Stderr, capped
    pub stderr: String,
    /// Exit code (-1 when terminated by a signal)
    pub exit_code: i32,
    /// Duration of execution
    pub duration: Duration,
}

impl ProcessOutput {
    pub fn new(stdout: String, stderr: String, exit_code: i32, duration: Duration) -> Self {
        Self {
            stdout,
            stderr,
            exit_code,
            duration,
        }
    }

    /// Check if the process exited successfully
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// How a streamed process ended
#[derive(Debug, Clone)]
pub struct ExitReport {
    /// Exit code, `None` when the process died from a signal
    pub exit_code: Option<i32>,
    /// Captured stderr, capped
    pub stderr: String,
    /// Whether stderr exceeded the cap
    pub stderr_truncated: bool,
    /// Whether we terminated the process ourselves
    pub killed: bool,
}

impl ExitReport {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}
