#![cfg(unix)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;
use std::time::Duration;

use alertslice_core::services::oracle::OracleError;
use alertslice_core::vcs::GitInspector;
use tempfile::{tempdir, TempDir};

const REPO: &str = "https://github.com/acme/widget.git";

/// A `GitInspector` driving a shell script in place of git.
fn inspector(git_body: &str, timeout: Duration) -> (TempDir, GitInspector, PathBuf) {
    let dir = tempdir().unwrap();
    let git = dir.path().join("git.sh");
    fs::write(&git, format!("#!/bin/sh\n{git_body}\n")).unwrap();
    let mut perms = fs::metadata(&git).unwrap().permissions();
    perms.set_mode(0o755);
    fs::set_permissions(&git, perms).unwrap();

    let repos = dir.path().join("repos");
    let inspector = GitInspector::new(git.display().to_string(), &repos, timeout);
    (dir, inspector, repos)
}

#[test]
fn successful_clone_is_moved_into_place() {
    let (_dir, git, repos) = inspector(
        "[ \"$1\" = clone ] && mkdir -p \"$3\" && touch \"$3/HEAD\"",
        Duration::from_secs(10),
    );
    let folder = git.ensure_clone(REPO).unwrap();
    assert_eq!(folder, repos.join("widget"));
    assert!(folder.join("HEAD").is_file());
    assert!(!repos.join(".widget.partial").exists());
}

#[test]
fn timed_out_clone_leaves_no_checkout_behind() {
    let (_dir, git, repos) = inspector(
        "[ \"$1\" = clone ] && mkdir -p \"$3\" && exec sleep 30",
        Duration::from_secs(1),
    );

    let first = git.ensure_clone(REPO).unwrap_err();
    assert!(matches!(first, OracleError::Timeout { .. }), "unexpected error: {first}");
    assert!(!repos.join("widget").exists());
    assert!(!repos.join(".widget.partial").exists());

    // The next call clones again instead of trusting a half-written folder.
    let second = git.ensure_clone(REPO);
    assert!(second.is_err(), "partial clone accepted: {second:?}");
}

#[test]
fn failed_clone_reports_git_stderr_and_cleans_up() {
    let (_dir, git, repos) = inspector(
        "mkdir -p \"$3\"\necho 'fatal: repository not found' >&2\nexit 128",
        Duration::from_secs(10),
    );
    let err = git.ensure_clone(REPO).unwrap_err();
    match err {
        OracleError::Tool { tool, message } => {
            assert_eq!(tool, "git clone");
            assert!(message.contains("repository not found"));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(!repos.join("widget").exists());
    assert!(!repos.join(".widget.partial").exists());
}

#[test]
fn parent_of_a_merge_commit_is_the_last_listed_parent() {
    let (_dir, git, repos) = inspector("echo \"$5 first000 second000\"", Duration::from_secs(10));
    fs::create_dir_all(repos.join("widget")).unwrap();
    assert_eq!(git.parent_commit(REPO, "merge123").unwrap(), "second000");
}

#[test]
fn root_commit_is_its_own_parent() {
    let (_dir, git, repos) = inspector("echo \"$5\"", Duration::from_secs(10));
    fs::create_dir_all(repos.join("widget")).unwrap();
    assert_eq!(git.parent_commit(REPO, "root123").unwrap(), "root123");
}

#[test]
fn empty_rev_list_output_is_a_parse_error() {
    let (_dir, git, repos) = inspector("true", Duration::from_secs(10));
    fs::create_dir_all(repos.join("widget")).unwrap();
    let err = git.parent_commit(REPO, "abc123").unwrap_err();
    assert!(matches!(err, OracleError::Parse { .. }), "unexpected error: {err}");
}
