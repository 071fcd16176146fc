use async_trait::async_trait;
use std::io;
use std::time::Duration;
use tracing::{debug, info, warn};
use treestate_process::{ExitReport, StreamingChild};

use crate::parser::RecordSplitter;
use crate::GitError;

/// Whether a sink wants more records
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    /// The entry cap was hit; the producer should be stopped
    LimitReached,
}

/// Synchronous consumer of porcelain records
pub trait RecordSink {
    type Output;

    /// Consume one record in stream order
    fn accept(&mut self, record: &str) -> Flow;

    /// Flag the result as partial (timeout)
    fn mark_truncated(&mut self);

    fn is_truncated(&self) -> bool;

    fn finish(self) -> Self::Output;
}

/// Producer of stdout chunks, usually a running git process
#[async_trait]
pub trait ChunkSource: Send {
    /// Next chunk in FIFO order, `None` at end of stream
    async fn next_chunk(&mut self) -> io::Result<Option<Vec<u8>>>;

    /// Stop the producer early
    async fn terminate(&mut self);

    /// Wait for the producer to finish
    async fn wait(self) -> io::Result<ExitReport>;
}

#[async_trait]
impl ChunkSource for StreamingChild {
    async fn next_chunk(&mut self) -> io::Result<Option<Vec<u8>>> {
        StreamingChild::next_chunk(self).await
    }

    async fn terminate(&mut self) {
        StreamingChild::terminate(self).await
    }

    async fn wait(self) -> io::Result<ExitReport> {
        StreamingChild::wait(self).await
    }
}

/// How a collection ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stop {
    EndOfStream,
    LimitReached,
    TimedOut,
}

/// Drives a [`ChunkSource`] into a [`RecordSink`] under a wall-clock timeout.
///
/// - normal exit with code 0: the complete result
/// - non-zero exit: [`GitError::NonZeroExit`] with the captured stderr
/// - entry cap or timeout: the producer is terminated and the partial
///   result is returned with `truncated` set
#[derive(Debug, Clone, Copy)]
pub struct BoundedCollector {
    timeout: Duration,
}

impl BoundedCollector {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Returns the sink output and whether it was truncated
    pub async fn collect<S, K>(
        &self,
        mut source: S,
        mut sink: K,
        command: &str,
    ) -> Result<(K::Output, bool), GitError>
    where
        S: ChunkSource,
        K: RecordSink,
    {
        let deadline = tokio::time::Instant::now() + self.timeout;
        let mut splitter = RecordSplitter::new();

        let stop = loop {
            tokio::select! {
                chunk = source.next_chunk() => match chunk? {
                    Some(bytes) => {
                        let limited = splitter
                            .feed(&bytes)
                            .iter()
                            .any(|record| sink.accept(record) == Flow::LimitReached);
                        if limited {
                            break Stop::LimitReached;
                        }
                    }
                    None => break Stop::EndOfStream,
                },
                _ = tokio::time::sleep_until(deadline) => break Stop::TimedOut,
            }
        };

        match stop {
            Stop::EndOfStream => {
                if let Some(leftover) = splitter.finish() {
                    debug!(bytes = leftover.len(), "Discarding unterminated trailing record");
                }
                // Dropping the source on expiry kills it
                match tokio::time::timeout_at(deadline, source.wait()).await {
                    Ok(report) => {
                        let report = report?;
                        if !report.success() {
                            return Err(GitError::NonZeroExit {
                                command: command.to_string(),
                                code: report.exit_code,
                                stderr: report.stderr.trim().to_string(),
                            });
                        }
                    }
                    Err(_) => {
                        warn!(
                            command,
                            timeout_ms = self.timeout.as_millis(),
                            "git closed stdout but did not exit in time, returning partial result"
                        );
                        sink.mark_truncated();
                    }
                }
            }
            Stop::LimitReached => {
                info!(command, "Entry cap reached, stopping git early");
                source.terminate().await;
                source.wait().await?;
            }
            Stop::TimedOut => {
                warn!(
                    command,
                    timeout_ms = self.timeout.as_millis(),
                    "git timed out, returning partial result"
                );
                sink.mark_truncated();
                source.terminate().await;
                source.wait().await?;
            }
        }

        let truncated = sink.is_truncated();
        Ok((sink.finish(), truncated))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StatusClassifier;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    /// Scripted chunk source. After the script runs out it either ends the
    /// stream or hangs forever.
    struct FakeSource {
        chunks: VecDeque<Vec<u8>>,
        hang_after_script: bool,
        hang_on_wait: bool,
        exit_code: Option<i32>,
        stderr: String,
        terminated: Arc<AtomicBool>,
    }

    impl FakeSource {
        fn new(chunks: &[&[u8]]) -> Self {
            Self {
                chunks: chunks.iter().map(|c| c.to_vec()).collect(),
                hang_after_script: false,
                hang_on_wait: false,
                exit_code: Some(0),
                stderr: String::new(),
                terminated: Arc::new(AtomicBool::new(false)),
            }
        }
    }

    #[async_trait]
    impl ChunkSource for FakeSource {
        async fn next_chunk(&mut self) -> io::Result<Option<Vec<u8>>> {
            if let Some(chunk) = self.chunks.pop_front() {
                return Ok(Some(chunk));
            }
            if self.hang_after_script {
                std::future::pending::<()>().await;
            }
            Ok(None)
        }

        async fn terminate(&mut self) {
            self.terminated.store(true, Ordering::SeqCst);
        }

        async fn wait(self) -> io::Result<ExitReport> {
            if self.hang_on_wait {
                std::future::pending::<()>().await;
            }
            let killed = self.terminated.load(Ordering::SeqCst);
            Ok(ExitReport {
                exit_code: if killed { None } else { self.exit_code },
                stderr: self.stderr,
                stderr_truncated: false,
                killed,
            })
        }
    }

    fn collector() -> BoundedCollector {
        BoundedCollector::new(Duration::from_secs(15))
    }

    #[tokio::test]
    async fn collects_records_across_chunks() {
        let source = FakeSource::new(&[b"# branch.head ma", b"in\0? a.t", b"xt\0"]);
        let (status, truncated) = collector()
            .collect(source, StatusClassifier::new(100), "status")
            .await
            .unwrap();

        assert!(!truncated);
        assert_eq!(status.branch.current.as_deref(), Some("main"));
        assert!(status.untracked.contains("a.txt"));
    }

    #[tokio::test]
    async fn non_zero_exit_carries_stderr() {
        let mut source = FakeSource::new(&[]);
        source.exit_code = Some(128);
        source.stderr = "fatal: not a git repository\n".to_string();

        let err = collector()
            .collect(source, StatusClassifier::new(100), "status")
            .await
            .unwrap_err();

        match err {
            GitError::NonZeroExit { code, stderr, command } => {
                assert_eq!(code, Some(128));
                assert_eq!(stderr, "fatal: not a git repository");
                assert_eq!(command, "status");
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[tokio::test]
    async fn cap_terminates_the_source() {
        let mut source = FakeSource::new(&[b"? a\0? b\0? c\0", b"? d\0"]);
        source.hang_after_script = true;
        let terminated = source.terminated.clone();

        let (status, truncated) = collector()
            .collect(source, StatusClassifier::new(2), "status")
            .await
            .unwrap();

        assert!(truncated);
        assert!(terminated.load(Ordering::SeqCst));
        assert_eq!(status.total_entries(), 2);
        assert_eq!(status.truncated_limit, Some(2));
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_returns_partial_result() {
        let mut source = FakeSource::new(&[b"# branch.head main\0? a\0"]);
        source.hang_after_script = true;
        let terminated = source.terminated.clone();

        let (status, truncated) = BoundedCollector::new(Duration::from_secs(15))
            .collect(source, StatusClassifier::new(100), "status")
            .await
            .unwrap();

        assert!(truncated);
        assert!(status.truncated);
        assert!(terminated.load(Ordering::SeqCst));
        assert!(status.untracked.contains("a"));
        assert_eq!(status.branch.current.as_deref(), Some("main"));
    }

    #[tokio::test(start_paused = true)]
    async fn exit_that_never_comes_is_bounded_by_the_timeout() {
        let mut source = FakeSource::new(&[b"? a\0? b\0"]);
        source.hang_on_wait = true;

        let (status, truncated) = BoundedCollector::new(Duration::from_secs(15))
            .collect(source, StatusClassifier::new(100), "status")
            .await
            .unwrap();

        assert!(truncated);
        assert!(status.truncated);
        assert_eq!(status.truncated_limit, Some(100));
        assert_eq!(status.untracked.len(), 2);
    }

    #[tokio::test]
    async fn trailing_fragment_is_discarded() {
        let source = FakeSource::new(&[b"? a\0? partial"]);
        let (status, _) = collector()
            .collect(source, StatusClassifier::new(100), "status")
            .await
            .unwrap();

        assert_eq!(status.untracked.len(), 1);
        assert!(!status.untracked.contains("partial"));
    }
}
