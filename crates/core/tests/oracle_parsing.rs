use alertslice_core::fetch::{raw_content_url, repo_owner_and_name};
use alertslice_core::model::{LineSet, StartIndex};
use alertslice_core::services::backends::line_differ::parse_line_pairs;
use alertslice_core::services::backends::slicer::parse_slicer_output;
use alertslice_core::services::oracle::{LineMapping, OracleError, SourceRef};
use alertslice_core::vcs::parse_numbered_diff;

#[test]
fn slicer_output_accepts_bracketed_and_bare_lists() {
    assert_eq!(parse_slicer_output("[3, 5, 8]\n").unwrap(), LineSet::from([3, 5, 8]));
    assert_eq!(parse_slicer_output("8,3").unwrap(), LineSet::from([3, 8]));
    assert!(parse_slicer_output("[]").unwrap().is_empty());
}

#[test]
fn slicer_error_marker_fails_the_call() {
    let err = parse_slicer_output("Error: cannot parse file").unwrap_err();
    assert!(matches!(err, OracleError::Tool { .. }));
    let err = parse_slicer_output("[3, x]").unwrap_err();
    assert!(matches!(err, OracleError::Parse { .. }));
}

#[test]
fn line_pairs_skip_banner_and_noise() {
    let pairs = parse_line_pairs("LHDiff 1.0 results\n1,1\n2, 4\nnot a pair\n[7,9]\n");
    assert_eq!(pairs, vec![(1, 1), (2, 4), (7, 9)]);
}

#[test]
fn mapping_pairs_are_rebased_to_caller_convention() {
    let mapping = LineMapping::from_one_based_pairs(&[(1, 2), (5, 5)], StartIndex::Zero);
    assert_eq!(mapping.lookup(0), Some(1));
    assert_eq!(mapping.lookup(4), Some(4));
    assert_eq!(mapping.lookup(1), None);
    assert_eq!(LineMapping::Equals.lookup(17), Some(17));
}

#[test]
fn numbered_diff_tracks_only_matching_files() {
    let diff = "\
diff --git a/src/A.java b/src/A.java
--- a/src/A.java
+++ b/src/A.java
12:+ int x = 1;
13:  int y;
14:+ return x;
+++ b/docs/readme.txt
2:+ changed docs
+++ b/src/B.java
";
    let files = parse_numbered_diff(diff, ".java");
    assert_eq!(files.len(), 2);
    assert_eq!(files["src/A.java"], vec![12, 14]);
    assert!(files["src/B.java"].is_empty());
}

#[test]
fn raw_content_url_uses_last_two_repo_segments() {
    assert_eq!(
        repo_owner_and_name("https://github.com/acme/widget.git"),
        Some(("acme".to_string(), "widget".to_string()))
    );
    assert_eq!(
        repo_owner_and_name("git@github.com:acme/widget.git"),
        Some(("acme".to_string(), "widget".to_string()))
    );
    assert_eq!(repo_owner_and_name("widget"), None);

    let source = SourceRef::new("https://github.com/acme/widget", "abc123", "/src/A.java");
    assert_eq!(
        raw_content_url("https://raw.githubusercontent.com/", &source).as_deref(),
        Some("https://raw.githubusercontent.com/acme/widget/abc123/src/A.java")
    );
}
