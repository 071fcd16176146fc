//! # treestate-git
//!
//! Bounded, cancelable working-tree state for git repositories.
//!
//! Status is derived by streaming `git status --porcelain=v2 -z` from a
//! subprocess and classifying each record as it arrives, so huge
//! repositories never make a call unbounded in memory or time.
//!
//! ## Overview
//!
//! - [`RecordSplitter`] turns raw stdout chunks into NUL-delimited records,
//!   whatever the chunk boundaries
//! - [`StatusClassifier`] buckets records into staged, modified, deleted,
//!   untracked and conflicted sets
//! - [`ChangeListBuilder`] produces the flat change list, hiding noisy
//!   directories such as `node_modules`
//! - [`BoundedCollector`] drives a git process into either consumer under an
//!   entry cap and a timeout, stopping git early once the cap is hit
//! - [`SmartSync`] pushes and pulls with fast-forward, rebase-with-abort and
//!   one reconcile-and-retry
//! - [`GitServiceRegistry`] holds one [`GitService`] per worktree root
//!
//! ## Usage
//!
//! ```rust,ignore
//! use treestate_git::{EngineSettings, GitServiceRegistry};
//! use std::path::Path;
//!
//! let registry = GitServiceRegistry::new(EngineSettings::default());
//! let service = registry.get_or_open(Path::new("."))?;
//!
//! let status = service.status().await?;
//! if status.truncated {
//!     println!("showing the first {:?} entries", status.truncated_limit);
//! }
//!
//! service.push(None, None, false).await?;
//! ```

mod changes;
mod classifier;
mod collector;
mod error;
mod parser;
mod record;
mod registry;
mod runner;
mod service;
mod settings;
mod status;
mod sync;
mod validation;

pub use changes::{ChangeListBuilder, DEFAULT_IGNORED_DIRS};
pub use classifier::{classify_xy, StatusClassifier, UnstagedChange, XyOutcome};
pub use collector::{BoundedCollector, ChunkSource, Flow, RecordSink};
pub use error::GitError;
pub use parser::{RecordSplitter, RECORD_DELIMITER};
pub use record::RecordLayout;
pub use registry::GitServiceRegistry;
pub use runner::{GitExec, GitRunner};
pub use service::{GitService, STATUS_ARGS};
pub use settings::{EngineSettings, Limits};
pub use status::{BranchInfo, FileChange, FileChangeStatus, FileChanges, WorkingTreeStatus};
pub use sync::{PullStrategy, PushOutcome, SmartSync, DEFAULT_REMOTE};
pub use validation::{repo_relative, resolve_in_repo};
