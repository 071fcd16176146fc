use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Default cap for captured stderr (8 KiB)
pub const DEFAULT_STDERR_LIMIT: usize = 8 * 1024;

/// Default time a process gets to exit after SIGTERM before it is killed
pub const DEFAULT_KILL_GRACE: Duration = Duration::from_millis(500);

/// Errors that can occur while running a subprocess
#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("Failed to spawn process: {0}")]
    SpawnFailed(#[source] std::io::Error),

    #[error("Process timed out after {0:?}")]
    Timeout(Duration),

    #[error("Process I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration for a single subprocess invocation
#[derive(Debug, Clone)]
pub struct ProcessConfig {
    /// Working directory for the process
    pub working_dir: PathBuf,
    /// Optional wall-clock timeout (None = no limit)
    pub timeout: Option<Duration>,
    /// Additional environment variables
    pub env_vars: HashMap<String, String>,
    /// Maximum number of stderr bytes kept
    pub stderr_limit: usize,
    /// Grace period between SIGTERM and a forced kill
    pub kill_grace: Duration,
}

impl Default for ProcessConfig {
    fn default() -> Self {
        Self {
            working_dir: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            timeout: None,
            env_vars: HashMap::new(),
            stderr_limit: DEFAULT_STDERR_LIMIT,
            kill_grace: DEFAULT_KILL_GRACE,
        }
    }
}

impl ProcessConfig {
    pub fn new(working_dir: PathBuf) -> Self {
        Self {
            working_dir,
            ..Default::default()
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env_vars.insert(key.into(), value.into());
        self
    }

    pub fn with_envs(mut self, vars: HashMap<String, String>) -> Self {
        self.env_vars.extend(vars);
        self
    }

    pub fn with_stderr_limit(mut self, limit: usize) -> Self {
        self.stderr_limit = limit;
        self
    }

    pub fn with_kill_grace(mut self, grace: Duration) -> Self {
        self.kill_grace = grace;
        self
    }
}
