//! Push/pull reconciliation against a remote.
//!
//! Pull tries a fast-forward first and falls back to a rebase. A failed
//! rebase is always aborted before the error reaches the caller, so the
//! working tree is never left mid-rebase. Push retries exactly once after a
//! reconciling pull when the remote rejected it as a non-fast-forward.

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::looks_like_rebase_conflict;
use crate::{GitError, GitExec};

/// Remote used when the caller does not name one
pub const DEFAULT_REMOTE: &str = "origin";

/// How a pull was completed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PullStrategy {
    /// Plain pull of an explicitly named branch
    Explicit,
    FastForward,
    Rebase,
}

/// How a push was completed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PushOutcome {
    Pushed,
    /// Rejected once, reconciled with a pull, then pushed
    PushedAfterReconcile,
}

/// Smart push/pull over any [`GitExec`]
pub struct SmartSync<'a, E: GitExec + ?Sized> {
    git: &'a E,
}

impl<'a, E: GitExec + ?Sized> SmartSync<'a, E> {
    pub fn new(git: &'a E) -> Self {
        Self { git }
    }

    pub async fn pull(
        &self,
        remote: Option<&str>,
        branch: Option<&str>,
    ) -> Result<PullStrategy, GitError> {
        let remote = remote.unwrap_or(DEFAULT_REMOTE);

        if let Some(branch) = branch {
            self.git.run(&["pull", remote, branch]).await?;
            info!(remote, branch, "Pulled branch");
            return Ok(PullStrategy::Explicit);
        }

        match self.git.run(&["pull", "--ff-only", remote]).await {
            Ok(_) => {
                info!(remote, "Pulled (fast-forward)");
                return Ok(PullStrategy::FastForward);
            }
            Err(e) => debug!(error = %e, "Fast-forward pull failed, falling back to rebase"),
        }

        match self.git.run(&["pull", "--rebase", remote]).await {
            Ok(_) => {
                info!(remote, "Pulled (rebase)");
                Ok(PullStrategy::Rebase)
            }
            Err(rebase_err) => {
                self.abort_rebase().await;
                Err(match rebase_err {
                    GitError::NonZeroExit { stderr, .. } if looks_like_rebase_conflict(&stderr) => {
                        GitError::RebaseConflict { stderr }
                    }
                    other => other,
                })
            }
        }
    }

    pub async fn push(
        &self,
        remote: Option<&str>,
        branch: Option<&str>,
        set_upstream: bool,
    ) -> Result<PushOutcome, GitError> {
        let remote = remote.unwrap_or(DEFAULT_REMOTE);
        let mut args = vec!["push"];
        if set_upstream {
            args.push("-u");
        }
        args.push(remote);
        args.push(branch.unwrap_or("HEAD"));

        match self.git.run(&args).await {
            Ok(_) => {
                info!(remote, "Pushed");
                Ok(PushOutcome::Pushed)
            }
            Err(e) if e.is_push_rejection() => {
                warn!(remote, error = %e, "Push rejected, reconciling with a pull");
                self.pull(Some(remote), None).await?;
                self.git.run(&args).await?;
                info!(remote, "Pushed after reconcile");
                Ok(PushOutcome::PushedAfterReconcile)
            }
            Err(e) => Err(e),
        }
    }

    /// `git rebase --abort`; a failure here does not replace the caller's error
    async fn abort_rebase(&self) {
        match self.git.run(&["rebase", "--abort"]).await {
            Ok(_) => info!("Aborted failed rebase"),
            Err(e) => warn!(error = %e, "rebase --abort failed"),
        }
    }
}
