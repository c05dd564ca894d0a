// Copyright 2026 sshjob contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Pattern expansion and outcome accounting for the fetch path.

use sshjob::transfer::{TransferOutcome, TransferRequest};
use std::path::PathBuf;

fn request(base: &str, pattern: Option<&str>) -> TransferRequest {
    TransferRequest {
        local_base_dir: PathBuf::from("/work"),
        local_relative_path: "incoming".to_string(),
        remote_base_path: base.to_string(),
        remote_pattern: pattern.map(str::to_string),
    }
}

#[test]
fn test_absent_pattern_fetches_the_base_path_itself() {
    let set = request("/srv/out/app.log", None).remote_file_set();
    assert_eq!(set, vec!["/srv/out/app.log"]);
}

#[test]
fn test_empty_pattern_fetches_the_base_path_itself() {
    let set = request("/srv/out", Some("")).remote_file_set();
    assert_eq!(set, vec!["/srv/out"]);
}

#[test]
fn test_whitespace_pattern_forms_the_bare_entry() {
    // Not empty, so it tokenizes: one whitespace token, trimmed away.
    let set = request("/srv/out", Some("  \t ")).remote_file_set();
    assert_eq!(set, vec!["/srv/out/"]);
}

#[test]
fn test_tokens_join_under_the_base_path() {
    let set = request("/srv/out", Some("app.log")).remote_file_set();
    assert_eq!(set, vec!["/srv/out/app.log"]);
}

#[test]
fn test_expansion_is_descending_lexicographic() {
    let set = request("/srv/out", Some("b.txt,a.log,c/d")).remote_file_set();
    assert_eq!(set, vec!["/srv/out/c/d", "/srv/out/b.txt", "/srv/out/a.log"]);
}

#[test]
fn test_duplicates_collapse_to_one_entry() {
    let set = request("/srv/out", Some("a,a,b,a")).remote_file_set();
    assert_eq!(set, vec!["/srv/out/b", "/srv/out/a"]);
}

#[test]
fn test_token_whitespace_is_trimmed() {
    let set = request("/srv/out", Some(" a , b ")).remote_file_set();
    assert_eq!(set, vec!["/srv/out/b", "/srv/out/a"]);
}

#[test]
fn test_consecutive_commas_hold_no_token() {
    let set = request("/srv/out", Some("a,,b,")).remote_file_set();
    assert_eq!(set, vec!["/srv/out/b", "/srv/out/a"]);
}

#[test]
fn test_whitespace_only_token_keeps_a_bare_entry() {
    // " " is a token; trimming empties it, so the bare `base/` entry is
    // formed and attempted like any other.
    let set = request("/srv/out", Some("a.txt, , b.txt")).remote_file_set();
    assert_eq!(
        set,
        vec!["/srv/out/b.txt", "/srv/out/a.txt", "/srv/out/"]
    );
}

#[test]
fn test_destination_is_base_joined_with_relative() {
    let req = request("/srv/out", None);
    assert_eq!(req.destination_dir(), PathBuf::from("/work/incoming"));
}

#[test]
fn test_outcome_keeps_copied_and_failed_disjoint() {
    let mut outcome = TransferOutcome::default();
    outcome.copied.insert("/srv/out/a".to_string());
    outcome.failed.insert("/srv/out/b".to_string());

    assert!(outcome.is_failed());
    assert!(outcome.copied.iter().all(|f| !outcome.failed.contains(f)));
}

#[test]
fn test_clean_outcome_reports_success() {
    let mut outcome = TransferOutcome::default();
    outcome.copied.insert("/srv/out/a".to_string());
    assert!(!outcome.is_failed());
}
