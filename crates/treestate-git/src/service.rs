use git2::Repository;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::collector::BoundedCollector;
use crate::sync::{PullStrategy, PushOutcome, SmartSync};
use crate::validation::{repo_relative, resolve_in_repo};
use crate::{
    ChangeListBuilder, EngineSettings, FileChanges, GitError, GitExec, GitRunner,
    StatusClassifier, WorkingTreeStatus,
};

/// Arguments of the streamed status call
pub const STATUS_ARGS: &[&str] = &[
    "status",
    "--porcelain=v2",
    "--branch",
    "-z",
    "--untracked-files=normal",
];

/// Working-tree operations for one repository
#[derive(Debug)]
pub struct GitService {
    root: PathBuf,
    runner: GitRunner,
    settings: EngineSettings,
}

impl GitService {
    /// Open the repository containing `path`. The service is keyed on the
    /// canonical worktree root, not on `path` itself.
    pub fn discover(path: &Path, settings: EngineSettings) -> Result<Self, GitError> {
        let root = Self::discover_root(path)?;
        Ok(Self::open_root(root, settings))
    }

    /// Canonical worktree root of the innermost repository containing `path`
    pub fn discover_root(path: &Path) -> Result<PathBuf, GitError> {
        let repo = Repository::discover(path)
            .map_err(|_| GitError::NotARepo(path.display().to_string()))?;
        let workdir = repo
            .workdir()
            .ok_or_else(|| GitError::NotARepo(format!("{} (bare repository)", path.display())))?;
        Ok(workdir.canonicalize()?)
    }

    /// Service for a root already returned by [`discover_root`](Self::discover_root)
    pub(crate) fn open_root(root: PathBuf, settings: EngineSettings) -> Self {
        debug!(root = %root.display(), "Opened repository");
        Self {
            runner: GitRunner::new(&root, &settings),
            root,
            settings,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn runner(&self) -> &GitRunner {
        &self.runner
    }

    /// Bucketed status, capped at `max_status_entries`
    pub async fn status(&self) -> Result<WorkingTreeStatus, GitError> {
        let limits = &self.settings.limits;
        let child = self.runner.spawn_stream(STATUS_ARGS)?;
        let (status, _) = BoundedCollector::new(limits.status_timeout())
            .collect(
                child,
                StatusClassifier::new(limits.max_status_entries),
                "status",
            )
            .await?;

        debug!(
            entries = status.total_entries(),
            truncated = status.truncated,
            "Collected status"
        );
        Ok(status)
    }

    /// Flat change list, capped at `max_change_entries`
    pub async fn file_changes(&self) -> Result<FileChanges, GitError> {
        let limits = &self.settings.limits;
        let child = self.runner.spawn_stream(STATUS_ARGS)?;
        let builder =
            ChangeListBuilder::new(limits.max_change_entries, self.settings.ignored_dirs.iter().cloned());
        let (changes, _) = BoundedCollector::new(limits.status_timeout())
            .collect(child, builder, "status")
            .await?;

        debug!(
            entries = changes.changes.len(),
            truncated = changes.truncated,
            "Collected change list"
        );
        Ok(changes)
    }

    pub async fn pull(
        &self,
        remote: Option<&str>,
        branch: Option<&str>,
    ) -> Result<PullStrategy, GitError> {
        SmartSync::new(&self.runner).pull(remote, branch).await
    }

    pub async fn push(
        &self,
        remote: Option<&str>,
        branch: Option<&str>,
        set_upstream: bool,
    ) -> Result<PushOutcome, GitError> {
        SmartSync::new(&self.runner)
            .push(remote, branch, set_upstream)
            .await
    }

    /// Unified diff of one file. Untracked files are diffed against
    /// `/dev/null`; an empty repository yields an empty diff.
    pub async fn diff_file(&self, path: &str, staged: bool) -> Result<String, GitError> {
        let rel = self.validated(path)?;

        if !staged && !self.is_tracked(&rel).await? {
            // --no-index exits 1 when the files differ
            return self
                .runner
                .run_with_exit_codes(&["diff", "--no-index", "--", "/dev/null", rel.as_str()], &[0, 1])
                .await;
        }

        let mut args = vec!["diff"];
        if staged {
            args.push("--cached");
        }
        args.extend(["--", rel.as_str()]);

        match self.runner.run(&args).await {
            Ok(diff) => Ok(diff),
            Err(e) if e.is_no_commits() => Ok(String::new()),
            Err(e) => Err(e),
        }
    }

    /// Throw away working-tree changes to one file. Untracked files are deleted.
    pub async fn discard_file(&self, path: &str) -> Result<(), GitError> {
        let rel = self.validated(path)?;

        if self.is_tracked(&rel).await? {
            self.runner.run(&["checkout", "--", rel.as_str()]).await?;
            info!(path = %rel, "Discarded changes");
            return Ok(());
        }

        let target = self.root.join(&rel);
        let meta = tokio::fs::symlink_metadata(&target).await?;
        if meta.is_dir() {
            tokio::fs::remove_dir_all(&target).await?;
        } else {
            tokio::fs::remove_file(&target).await?;
        }
        info!(path = %rel, "Removed untracked path");
        Ok(())
    }

    pub async fn stage(&self, paths: &[String]) -> Result<(), GitError> {
        let rels = self.validated_all(paths)?;
        let mut args = vec!["add", "--"];
        args.extend(rels.iter().map(String::as_str));
        self.runner.run(&args).await?;
        info!(count = rels.len(), "Staged paths");
        Ok(())
    }

    pub async fn unstage(&self, paths: &[String]) -> Result<(), GitError> {
        let rels = self.validated_all(paths)?;
        let mut args = vec!["restore", "--staged", "--"];
        args.extend(rels.iter().map(String::as_str));

        match self.runner.run(&args).await {
            Ok(_) => {}
            // Nothing to restore from before the first commit
            Err(e) if e.is_no_commits() => {
                let mut args = vec!["rm", "--cached", "-r", "-q", "--"];
                args.extend(rels.iter().map(String::as_str));
                self.runner.run(&args).await?;
            }
            Err(e) => return Err(e),
        }
        info!(count = rels.len(), "Unstaged paths");
        Ok(())
    }

    pub async fn is_rebase_in_progress(&self) -> Result<bool, GitError> {
        for marker in ["rebase-merge", "rebase-apply"] {
            let git_path = self
                .runner
                .run(&["rev-parse", "--git-path", marker])
                .await?;
            let git_path = Path::new(git_path.trim());
            let full = if git_path.is_absolute() {
                git_path.to_path_buf()
            } else {
                self.root.join(git_path)
            };
            if tokio::fs::try_exists(&full).await? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Current branch name, `None` on a detached HEAD
    pub async fn current_branch(&self) -> Result<Option<String>, GitError> {
        let name = match self.runner.run(&["rev-parse", "--abbrev-ref", "HEAD"]).await {
            Ok(name) => name,
            Err(e) if e.is_no_commits() => {
                self.runner.run(&["symbolic-ref", "--short", "HEAD"]).await?
            }
            Err(e) => return Err(e),
        };

        let name = name.trim();
        Ok((!name.is_empty() && name != "HEAD").then(|| name.to_string()))
    }

    async fn is_tracked(&self, rel: &str) -> Result<bool, GitError> {
        match self
            .runner
            .run(&["ls-files", "--error-unmatch", "--", rel])
            .await
        {
            Ok(_) => Ok(true),
            Err(GitError::NonZeroExit { code: Some(1), .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Repository-relative form of `path` after traversal checks
    fn validated(&self, path: &str) -> Result<String, GitError> {
        let absolute = resolve_in_repo(&self.root, path)?;
        repo_relative(&self.root, &absolute).ok_or_else(|| GitError::PathTraversal {
            path: path.to_string(),
        })
    }

    fn validated_all(&self, paths: &[String]) -> Result<Vec<String>, GitError> {
        paths.iter().map(|p| self.validated(p)).collect()
    }
}
