use std::io;
use std::path::{Component, Path, PathBuf};

use crate::GitError;

/// Resolve a caller-supplied path against the repository root and reject
/// anything that would land outside it.
///
/// `..` segments are folded lexically. The deepest existing ancestor of the
/// target is then canonicalized so a symlink pointing out of the tree is
/// caught even when the final component does not exist yet.
pub fn resolve_in_repo(root: &Path, relative: &str) -> Result<PathBuf, GitError> {
    let traversal = || GitError::PathTraversal {
        path: relative.to_string(),
    };

    if relative.is_empty() || relative.contains('\0') {
        return Err(traversal());
    }

    let root = root.canonicalize()?;
    let requested = Path::new(relative);
    if requested.is_absolute() {
        return Err(traversal());
    }

    let target = normalize(&root.join(requested)).ok_or_else(traversal)?;
    if !target.starts_with(&root) || target == root {
        return Err(traversal());
    }

    let resolved = canonicalize_existing(&target)?;
    if !resolved.starts_with(&root) {
        return Err(traversal());
    }

    Ok(target)
}

/// Path of `absolute` relative to `root`, using `/` separators as git does
pub fn repo_relative(root: &Path, absolute: &Path) -> Option<String> {
    let rel = absolute.strip_prefix(root).ok()?;
    let parts: Vec<_> = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    (!parts.is_empty()).then(|| parts.join("/"))
}

/// Lexically fold `.` and `..`; `None` if `..` climbs past the filesystem root
fn normalize(path: &Path) -> Option<PathBuf> {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    return None;
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    Some(out)
}

/// Canonicalize the longest existing prefix and re-append the missing tail
fn canonicalize_existing(path: &Path) -> io::Result<PathBuf> {
    let mut existing = path;
    let mut tail = Vec::new();

    loop {
        match existing.canonicalize() {
            Ok(resolved) => {
                let mut full = resolved;
                for part in tail.iter().rev() {
                    full.push(part);
                }
                return Ok(full);
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                let (Some(parent), Some(name)) = (existing.parent(), existing.file_name()) else {
                    return Err(e);
                };
                tail.push(name.to_os_string());
                existing = parent;
            }
            Err(e) => return Err(e),
        }
    }
}
