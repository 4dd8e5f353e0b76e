use std::fs;
use std::path::Path;

use alertslice::commands::parse_revisions;
use alertslice::{canonicalize_or_current, infer_project_name};
use alertslice_core::model::Revision;
use tempfile::tempdir;

#[test]
fn canonicalize_or_current_returns_cwd_for_dot() {
    let original = std::env::current_dir().expect("cwd");
    let tmp = tempdir().expect("tempdir");
    std::env::set_current_dir(tmp.path()).expect("chdir tmp");

    let result = canonicalize_or_current(".").expect("canonicalize").canonicalize().expect("canon");
    let expected = tmp.path().canonicalize().expect("canon tmp");
    assert_eq!(result, expected);

    std::env::set_current_dir(original).expect("restore cwd");
}

#[test]
fn canonicalize_or_current_joins_missing_paths_onto_cwd() {
    let tmp = tempdir().expect("tempdir");
    let nested = tmp.path().join("nested");
    fs::create_dir_all(&nested).expect("create nested");

    let existing = canonicalize_or_current(nested.to_str().unwrap()).expect("existing");
    assert_eq!(existing, nested.canonicalize().expect("canonicalize nested"));

    let missing = canonicalize_or_current("not-there-yet").expect("missing");
    assert!(missing.is_absolute());
    assert!(missing.ends_with("not-there-yet"));
}

#[test]
fn infer_project_name_uses_last_path_component() {
    assert_eq!(infer_project_name(Path::new("/tmp/vuln-dataset")), "vuln-dataset");
    assert_eq!(infer_project_name(Path::new("/")), "unnamed-project");
}

#[test]
fn revision_selector_accepts_both_and_single_sides() {
    assert_eq!(parse_revisions("both").unwrap(), vec![Revision::Vuln, Revision::Fix]);
    assert_eq!(parse_revisions("fix").unwrap(), vec![Revision::Fix]);
    assert!(parse_revisions("old").is_err());
}
