use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

use crate::{EngineSettings, GitError, GitService};

/// Open [`GitService`]s keyed by canonical worktree root.
///
/// Owned by whoever orchestrates worktrees. Entries live until
/// [`unregister`](Self::unregister) or [`clear`](Self::clear) is called,
/// typically when a worktree is removed.
#[derive(Debug, Default)]
pub struct GitServiceRegistry {
    settings: EngineSettings,
    services: Mutex<HashMap<PathBuf, Arc<GitService>>>,
}

impl GitServiceRegistry {
    pub fn new(settings: EngineSettings) -> Self {
        Self {
            settings,
            services: Mutex::new(HashMap::new()),
        }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Service for the repository containing `path`, opening it on first use.
    ///
    /// The innermost repository wins, so a nested repository or linked
    /// worktree under an open root gets its own service.
    pub fn get_or_open(&self, path: &Path) -> Result<Arc<GitService>, GitError> {
        let root = GitService::discover_root(path)?;

        let mut services = self.lock();
        if let Some(service) = services.get(&root) {
            return Ok(service.clone());
        }
        let service = Arc::new(GitService::open_root(root.clone(), self.settings.clone()));
        services.insert(root.clone(), service.clone());
        debug!(root = %root.display(), "Registered git service");
        Ok(service)
    }

    /// Already-open service registered for exactly this root
    pub fn get(&self, root: &Path) -> Option<Arc<GitService>> {
        self.lock().get(&canonical(root)).cloned()
    }

    /// Drop the service registered for exactly this root
    pub fn unregister(&self, root: &Path) -> Option<Arc<GitService>> {
        let removed = self.lock().remove(&canonical(root));
        if removed.is_some() {
            debug!(root = %root.display(), "Unregistered git service");
        }
        removed
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<PathBuf, Arc<GitService>>> {
        self.services.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Canonical form when the path still exists, otherwise the path as given
fn canonical(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}
