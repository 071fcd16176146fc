mod common;

use common::{commit_all, git, write, Remote};
use treestate_git::{EngineSettings, GitError, GitService, PullStrategy, PushOutcome};

fn open(dir: &std::path::Path) -> GitService {
    GitService::discover(dir, EngineSettings::default()).unwrap()
}

#[tokio::test]
async fn fast_forward_pull_picks_up_remote_commits() {
    let remote = Remote::new();
    write(remote.alice.path(), "feature.txt", "from alice\n");
    commit_all(remote.alice.path(), "alice adds a file");
    git(remote.alice.path(), &["push", "-q", "origin", "main"]);

    let strategy = open(remote.bob.path()).pull(None, None).await.unwrap();

    assert_eq!(strategy, PullStrategy::FastForward);
    assert!(remote.bob.path().join("feature.txt").exists());
}

#[tokio::test]
async fn diverged_pull_rebases_local_commits() {
    let remote = Remote::new();
    write(remote.alice.path(), "alice.txt", "a\n");
    commit_all(remote.alice.path(), "alice");
    git(remote.alice.path(), &["push", "-q", "origin", "main"]);

    write(remote.bob.path(), "bob.txt", "b\n");
    commit_all(remote.bob.path(), "bob");

    let strategy = open(remote.bob.path()).pull(None, None).await.unwrap();

    assert_eq!(strategy, PullStrategy::Rebase);
    assert!(remote.bob.path().join("alice.txt").exists());
    assert!(remote.bob.path().join("bob.txt").exists());
    let parent = git(remote.bob.path(), &["log", "-1", "--format=%s", "HEAD~1"]);
    assert_eq!(parent, "alice");
}

#[tokio::test]
async fn conflicting_pull_aborts_the_rebase() {
    let remote = Remote::new();
    write(remote.alice.path(), "shared.txt", "alice was here\nline two\n");
    commit_all(remote.alice.path(), "alice edits");
    git(remote.alice.path(), &["push", "-q", "origin", "main"]);

    let bob = remote.bob.path();
    write(bob, "shared.txt", "bob was here\nline two\n");
    commit_all(bob, "bob edits");
    let head_before = git(bob, &["rev-parse", "HEAD"]);

    let service = open(bob);
    let err = service.pull(None, None).await.unwrap_err();

    match &err {
        GitError::RebaseConflict { stderr } => assert!(!stderr.is_empty()),
        other => panic!("expected a rebase conflict, got {:?}", other),
    }
    assert!(!service.is_rebase_in_progress().await.unwrap());
    assert_eq!(git(bob, &["rev-parse", "HEAD"]), head_before);
    assert_eq!(
        std::fs::read_to_string(bob.join("shared.txt")).unwrap(),
        "bob was here\nline two\n"
    );
    assert!(service.status().await.unwrap().is_clean());
}

#[tokio::test]
async fn pull_from_unknown_remote_is_not_a_conflict() {
    let remote = Remote::new();
    let bob = remote.bob.path();
    let head_before = git(bob, &["rev-parse", "HEAD"]);
    let service = open(bob);

    let err = service.pull(Some("nosuchremote"), None).await.unwrap_err();

    match &err {
        GitError::NonZeroExit { stderr, .. } => assert!(stderr.contains("nosuchremote")),
        other => panic!("expected a plain git failure, got {:?}", other),
    }
    assert!(!service.is_rebase_in_progress().await.unwrap());
    assert_eq!(git(bob, &["rev-parse", "HEAD"]), head_before);
}

#[tokio::test]
async fn rejected_push_is_reconciled_and_retried() {
    let remote = Remote::new();
    write(remote.alice.path(), "alice.txt", "a\n");
    commit_all(remote.alice.path(), "alice");
    git(remote.alice.path(), &["push", "-q", "origin", "main"]);

    write(remote.bob.path(), "bob.txt", "b\n");
    commit_all(remote.bob.path(), "bob");

    let outcome = open(remote.bob.path()).push(None, None, false).await.unwrap();

    assert_eq!(outcome, PushOutcome::PushedAfterReconcile);
    let remote_head = git(remote.bare.path(), &["log", "-1", "--format=%s", "main"]);
    assert_eq!(remote_head, "bob");
}

#[tokio::test]
async fn plain_push_with_upstream() {
    let remote = Remote::new();
    let alice = remote.alice.path();
    git(alice, &["checkout", "-q", "-b", "topic"]);
    write(alice, "topic.txt", "t\n");
    commit_all(alice, "topic work");

    let outcome = open(alice).push(None, None, true).await.unwrap();

    assert_eq!(outcome, PushOutcome::Pushed);
    assert_eq!(
        git(alice, &["rev-parse", "--abbrev-ref", "topic@{upstream}"]),
        "origin/topic"
    );
}

#[tokio::test]
async fn status_reports_ahead_and_behind() {
    let remote = Remote::new();
    write(remote.alice.path(), "alice.txt", "a\n");
    commit_all(remote.alice.path(), "alice");
    git(remote.alice.path(), &["push", "-q", "origin", "main"]);

    let bob = remote.bob.path();
    write(bob, "bob.txt", "b\n");
    commit_all(bob, "bob");
    git(bob, &["fetch", "-q", "origin"]);

    let status = open(bob).status().await.unwrap();
    assert_eq!(status.branch.tracking.as_deref(), Some("origin/main"));
    assert_eq!(status.branch.ahead, 1);
    assert_eq!(status.branch.behind, 1);
}
