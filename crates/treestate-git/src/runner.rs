use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, trace};
use treestate_process::{git_environment, ProcessConfig, ProcessSpawner, StreamingChild};

use crate::error::looks_like_push_rejection;
use crate::{EngineSettings, GitError};

/// Anything that can run a git command and return its stdout
#[async_trait]
pub trait GitExec: Send + Sync {
    async fn run(&self, args: &[&str]) -> Result<String, GitError>;
}

/// Runs the git binary inside one working tree
#[derive(Debug, Clone)]
pub struct GitRunner {
    binary: PathBuf,
    working_dir: PathBuf,
    env: HashMap<String, String>,
    aux_timeout: Duration,
    stderr_limit: usize,
    kill_grace: Duration,
}

impl GitRunner {
    pub fn new(working_dir: &Path, settings: &EngineSettings) -> Self {
        Self {
            binary: settings.git_binary.clone(),
            working_dir: working_dir.to_path_buf(),
            env: git_environment(&settings.proxy, &settings.extra_path),
            aux_timeout: settings.limits.aux_timeout(),
            stderr_limit: settings.limits.stderr_limit_bytes,
            kill_grace: settings.limits.kill_grace(),
        }
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    fn process_config(&self, timeout: Option<Duration>) -> ProcessConfig {
        let mut config = ProcessConfig::new(self.working_dir.clone())
            .with_envs(self.env.clone())
            .with_stderr_limit(self.stderr_limit)
            .with_kill_grace(self.kill_grace);
        config.timeout = timeout;
        config
    }

    /// Start a long-running git command whose stdout is consumed as a stream.
    /// The caller owns the timeout.
    pub fn spawn_stream(&self, args: &[&str]) -> Result<StreamingChild, GitError> {
        let command = args.join(" ");
        ProcessSpawner::spawn_streaming(&self.binary, args, &self.process_config(None))
            .map_err(|e| GitError::from_process(&command, e))
    }

    /// Run git and treat any exit code in `ok_codes` as success
    pub async fn run_with_exit_codes(
        &self,
        args: &[&str],
        ok_codes: &[i32],
    ) -> Result<String, GitError> {
        let command = args.join(" ");
        let output = ProcessSpawner::run(
            &self.binary,
            args,
            &self.process_config(Some(self.aux_timeout)),
        )
        .await
        .map_err(|e| GitError::from_process(&command, e))?;

        if ok_codes.contains(&output.exit_code) {
            trace!(command = %command, bytes = output.stdout.len(), "git succeeded");
            return Ok(output.stdout);
        }

        // Some commands (pull, rebase) report conflicts on stdout only.
        let message = if output.stderr.trim().is_empty() {
            cap_text(output.stdout.trim(), self.stderr_limit)
        } else {
            output.stderr.trim().to_string()
        };
        debug!(command = %command, exit_code = output.exit_code, "git failed");

        if args.first() == Some(&"push") && looks_like_push_rejection(&message) {
            return Err(GitError::PushRejected { stderr: message });
        }

        Err(GitError::NonZeroExit {
            command,
            code: (output.exit_code >= 0).then_some(output.exit_code),
            stderr: message,
        })
    }
}

#[async_trait]
impl GitExec for GitRunner {
    async fn run(&self, args: &[&str]) -> Result<String, GitError> {
        self.run_with_exit_codes(args, &[0]).await
    }
}

/// Truncate to at most `limit` bytes on a char boundary
fn cap_text(text: &str, limit: usize) -> String {
    if text.len() <= limit {
        return text.to_string();
    }
    let mut end = limit;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    text[..end].to_string()
}
