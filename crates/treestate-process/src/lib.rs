//! # treestate-process
//!
//! Subprocess plumbing for the treestate engine.
//!
//! - [`ProcessSpawner::run`] runs an auxiliary command to completion under a timeout.
//! - [`ProcessSpawner::spawn_streaming`] hands back a [`StreamingChild`] whose stdout
//!   is read chunk by chunk while stderr is drained into a capped buffer.
//! - [`StreamingChild::terminate`] sends SIGTERM and escalates to a forced kill.
//! - [`env`] builds the augmented `PATH` and proxy environment for git.

pub mod env;

mod config;
mod output;
mod spawner;
mod stream;

pub use config::{ProcessConfig, ProcessError, DEFAULT_KILL_GRACE, DEFAULT_STDERR_LIMIT};
pub use env::{git_environment, ProxySettings};
pub use output::{CappedBuffer, ExitReport, ProcessOutput};
pub use spawner::ProcessSpawner;
pub use stream::StreamingChild;
