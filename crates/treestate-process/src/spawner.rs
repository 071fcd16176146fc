use std::ffi::OsStr;
use std::path::Path;
use std::process::Stdio;
use std::time::Instant;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::{ProcessConfig, ProcessError, ProcessOutput, StreamingChild};

/// Utility for spawning processes
pub struct ProcessSpawner;

impl ProcessSpawner {
    /// Spawn a process with piped stdout/stderr and hand back the live child
    pub fn spawn_streaming<S: AsRef<OsStr>>(
        binary: &Path,
        args: &[S],
        config: &ProcessConfig,
    ) -> Result<StreamingChild, ProcessError> {
        debug!(
            binary = %binary.display(),
            args = ?args.iter().map(|a| a.as_ref().to_string_lossy()).collect::<Vec<_>>(),
            working_dir = %config.working_dir.display(),
            "Spawning process"
        );

        let mut cmd = Command::new(binary);
        cmd.args(args)
            .current_dir(&config.working_dir)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .stdin(Stdio::null()) // Non-interactive
            .kill_on_drop(true);
        // Own group, so termination also reaches helpers the child forks
        #[cfg(unix)]
        cmd.process_group(0);

        for (key, value) in &config.env_vars {
            cmd.env(key, value);
        }

        let child = cmd.spawn().map_err(ProcessError::SpawnFailed)?;
        StreamingChild::new(child, config.stderr_limit, config.kill_grace).map_err(ProcessError::Io)
    }

    /// Run a process to completion and capture its output.
    ///
    /// If `config.timeout` elapses first the process is terminated and
    /// [`ProcessError::Timeout`] is returned.
    pub async fn run<S: AsRef<OsStr>>(
        binary: &Path,
        args: &[S],
        config: &ProcessConfig,
    ) -> Result<ProcessOutput, ProcessError> {
        let start = Instant::now();
        let mut child = Self::spawn_streaming(binary, args, config)?;

        let stdout = match config.timeout {
            Some(timeout) => match tokio::time::timeout(timeout, read_to_end(&mut child)).await {
                Ok(result) => result?,
                Err(_) => {
                    warn!(
                        binary = %binary.display(),
                        timeout_ms = timeout.as_millis(),
                        "Process timed out"
                    );
                    child.terminate().await;
                    return Err(ProcessError::Timeout(timeout));
                }
            },
            None => read_to_end(&mut child).await?,
        };

        let report = child.wait().await?;
        let duration = start.elapsed();

        debug!(
            exit_code = report.exit_code.unwrap_or(-1),
            duration_ms = duration.as_millis(),
            "Process completed"
        );

        Ok(ProcessOutput::new(
            String::from_utf8_lossy(&stdout).into_owned(),
            report.stderr,
            report.exit_code.unwrap_or(-1),
            duration,
        ))
    }
}

async fn read_to_end(child: &mut StreamingChild) -> std::io::Result<Vec<u8>> {
    let mut stdout = Vec::new();
    while let Some(chunk) = child.next_chunk().await? {
        stdout.extend_from_slice(&chunk);
    }
    Ok(stdout)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::time::Duration;

    fn sh() -> PathBuf {
        PathBuf::from("/bin/sh")
    }

    #[tokio::test]
    async fn run_captures_stdout_and_exit_code() {
        let config = ProcessConfig::default();
        let output = ProcessSpawner::run(&sh(), &["-c", "printf 'a\\0b\\0'; exit 3"], &config)
            .await
            .unwrap();

        assert_eq!(output.stdout, "a\0b\0");
        assert_eq!(output.exit_code, 3);
        assert!(!output.success());
    }

    #[tokio::test]
    async fn run_caps_stderr() {
        let config = ProcessConfig::default().with_stderr_limit(10);
        let output = ProcessSpawner::run(
            &sh(),
            &["-c", "printf 'fatal: something went badly wrong' >&2"],
            &config,
        )
        .await
        .unwrap();

        assert_eq!(output.stderr, "fatal: som");
    }

    #[tokio::test]
    async fn run_times_out_and_kills() {
        let config = ProcessConfig::default()
            .with_timeout(Duration::from_millis(100))
            .with_kill_grace(Duration::from_millis(100));
        let start = Instant::now();
        let err = ProcessSpawner::run(&sh(), &["-c", "sleep 30"], &config)
            .await
            .unwrap_err();

        assert!(matches!(err, ProcessError::Timeout(_)));
        assert!(start.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn spawn_missing_binary_is_spawn_failure() {
        let config = ProcessConfig::default();
        let err = ProcessSpawner::run(
            Path::new("/definitely/not/a/binary"),
            &["status"],
            &config,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, ProcessError::SpawnFailed(_)));
    }

    #[tokio::test]
    async fn terminate_stops_streaming_child() {
        let config = ProcessConfig::default().with_kill_grace(Duration::from_millis(200));
        let mut child =
            ProcessSpawner::spawn_streaming(&sh(), &["-c", "while :; do echo y; done"], &config)
                .unwrap();

        assert!(child.next_chunk().await.unwrap().is_some());
        child.terminate().await;
        let report = child.wait().await.unwrap();

        assert!(report.killed);
        assert!(!report.success());
    }

    #[tokio::test]
    async fn terminate_reaches_children_that_ignore_sigterm() {
        let config = ProcessConfig::default().with_kill_grace(Duration::from_millis(200));
        let mut child = ProcessSpawner::spawn_streaming(
            &sh(),
            &["-c", "trap '' TERM; sleep 30 & while :; do echo y; done"],
            &config,
        )
        .unwrap();

        assert!(child.next_chunk().await.unwrap().is_some());
        let start = Instant::now();
        child.terminate().await;
        let report = child.wait().await.unwrap();

        assert!(report.killed);
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn timeout_is_bounded_when_a_grandchild_holds_the_pipes() {
        let config = ProcessConfig::default()
            .with_timeout(Duration::from_millis(200))
            .with_kill_grace(Duration::from_millis(200));
        let start = Instant::now();
        let err = ProcessSpawner::run(&sh(), &["-c", "sleep 30 & echo started; wait"], &config)
            .await
            .unwrap_err();

        assert!(matches!(err, ProcessError::Timeout(_)));
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn exited_child_with_stderr_held_open_returns_promptly() {
        let config = ProcessConfig::default().with_kill_grace(Duration::from_millis(500));
        let start = Instant::now();
        let output = ProcessSpawner::run(
            &sh(),
            &["-c", "printf 'warning: kept\\n' >&2; sleep 30 >/dev/null & exit 0"],
            &config,
        )
        .await
        .unwrap();

        assert_eq!(output.exit_code, 0);
        assert_eq!(output.stderr, "warning: kept\n");
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn env_vars_reach_the_child() {
        let config = ProcessConfig::default().with_env("TREESTATE_MARKER", "marker-value");
        let output = ProcessSpawner::run(&sh(), &["-c", "printf %s \"$TREESTATE_MARKER\""], &config)
            .await
            .unwrap();

        assert_eq!(output.stdout, "marker-value");
    }
}
