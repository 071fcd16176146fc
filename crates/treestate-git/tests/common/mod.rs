#![allow(dead_code)]

use std::fs;
use std::path::Path;
use std::process::Command;

use tempfile::TempDir;

/// Run git in `dir` and return trimmed stdout, panicking on failure
pub fn git(dir: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .env("GIT_TERMINAL_PROMPT", "0")
        .env("LC_ALL", "C")
        .output()
        .expect("failed to run git");
    assert!(
        output.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

/// Identity and signing settings so commits work on any machine
pub fn configure(dir: &Path) {
    git(dir, &["config", "user.name", "Treestate Tests"]);
    git(dir, &["config", "user.email", "tests@treestate.invalid"]);
    git(dir, &["config", "commit.gpgsign", "false"]);
    git(dir, &["config", "core.autocrlf", "false"]);
}

/// Fresh repository on branch `main` with no commits
pub fn init_repo() -> TempDir {
    let dir = TempDir::new().unwrap();
    git(dir.path(), &["init", "-q", "-b", "main"]);
    configure(dir.path());
    dir
}

pub fn write(dir: &Path, rel: &str, contents: &str) {
    let path = dir.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, contents).unwrap();
}

pub fn commit_all(dir: &Path, message: &str) {
    git(dir, &["add", "-A"]);
    git(dir, &["commit", "-q", "-m", message]);
}

/// A bare remote seeded with one commit, plus two independent clones of it
pub struct Remote {
    pub bare: TempDir,
    pub alice: TempDir,
    pub bob: TempDir,
}

impl Remote {
    pub fn new() -> Self {
        let bare = TempDir::new().unwrap();
        git(bare.path(), &["init", "-q", "--bare", "-b", "main"]);

        let seed = TempDir::new().unwrap();
        git(seed.path(), &["init", "-q", "-b", "main"]);
        configure(seed.path());
        write(seed.path(), "shared.txt", "line one\nline two\n");
        commit_all(seed.path(), "seed");
        let url = bare.path().to_str().unwrap();
        git(seed.path(), &["remote", "add", "origin", url]);
        git(seed.path(), &["push", "-q", "-u", "origin", "main"]);

        let alice = Self::clone_from(url);
        let bob = Self::clone_from(url);
        Self { bare, alice, bob }
    }

    fn clone_from(url: &str) -> TempDir {
        let dir = TempDir::new().unwrap();
        git(dir.path(), &["clone", "-q", url, "."]);
        configure(dir.path());
        dir
    }
}
