//! Matching registry inventory entries to local tests.
//!
//! The registry encodes each inventory key in one of three shapes,
//! distinguished by how many `#` separators it contains:
//!
//! | Key                        | title            | suite   | file         |
//! |----------------------------|------------------|---------|--------------|
//! | `Simple Test`              | `Simple Test`    | -       | -            |
//! | `Suite#Login` (known suite)| `Login`          | `Suite` | -            |
//! | `Unknown#Login`            | `Unknown#Login`  | -       | -            |
//! | `file.robot#Suite#Login`   | `Login`          | -       | `file.robot` |
//!
//! The three-part shape never fills `suite`; the suite is expected to come
//! from a sibling two-part key for the same id. An id seen only through a
//! three-part key therefore never matches a local test.

use crate::errors::SourceError;
use crate::ident;
use crate::registry::wire::RemoteInventory;
use crate::suite::{AssignOutcome, SuiteFile};
use crate::types::{LocalTest, RemoteCandidate};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use tracing::{debug, info, warn};

pub const KEY_SEPARATOR: char = '#';

/// Decode inventory entries and merge those sharing a remote id.
///
/// Candidates come out in the order their id was first seen. Later entries
/// for the same id only fill fields that are still unset.
pub fn parse_inventory<'a>(
    entries: &[(String, String)],
    suite_names: impl IntoIterator<Item = &'a str>,
) -> Vec<RemoteCandidate> {
    let suites: HashSet<&str> = suite_names.into_iter().collect();
    let mut candidates: Vec<RemoteCandidate> = Vec::new();
    let mut by_id: HashMap<&str, usize> = HashMap::new();

    for (key, remote_id) in entries {
        let parsed = parse_key(key, remote_id, &suites);
        match by_id.get(remote_id.as_str()) {
            Some(&idx) => merge_into(&mut candidates[idx], parsed),
            None => {
                by_id.insert(remote_id.as_str(), candidates.len());
                candidates.push(parsed);
            }
        }
    }

    debug!(
        entries = entries.len(),
        candidates = candidates.len(),
        "Parsed remote inventory"
    );
    candidates
}

/// Convenience over [`parse_inventory`] for a fetched inventory.
pub fn candidates_from(inventory: &RemoteInventory) -> Vec<RemoteCandidate> {
    parse_inventory(&inventory.tests, inventory.suite_names())
}

fn parse_key(key: &str, remote_id: &str, suites: &HashSet<&str>) -> RemoteCandidate {
    let mut candidate = RemoteCandidate {
        remote_id: remote_id.to_string(),
        title: key.to_string(),
        suite: None,
        file_name: None,
    };

    match key.matches(KEY_SEPARATOR).count() {
        0 => {}
        1 => {
            if let Some((suite, title)) = key.split_once(KEY_SEPARATOR)
                && suites.contains(suite)
            {
                candidate.suite = Some(suite.to_string());
                candidate.title = title.to_string();
            }
        }
        _ => {
            let mut parts = key.splitn(3, KEY_SEPARATOR);
            let file = parts.next().unwrap_or_default();
            let _suite = parts.next();
            let title = parts.next().unwrap_or_default();
            candidate.file_name = Some(file.to_string());
            candidate.title = title.to_string();
        }
    }
    candidate
}

fn merge_into(existing: &mut RemoteCandidate, other: RemoteCandidate) {
    if existing.suite.is_none() {
        existing.suite = other.suite;
    }
    if existing.file_name.is_none() {
        existing.file_name = other.file_name;
    }
}

/// Pair local tests with candidates on exact `(suite, title)` equality.
///
/// Each local test takes the first matching candidate. Tests without a
/// match are left out and can match in a later run.
pub fn match_tests<'a, 'b>(
    local: &'a [LocalTest],
    candidates: &'b [RemoteCandidate],
) -> Vec<(&'a LocalTest, &'b RemoteCandidate)> {
    local
        .iter()
        .filter_map(|test| {
            candidates
                .iter()
                .find(|c| {
                    c.title == test.sync_title
                        && c.suite.as_deref() == Some(test.suite_title.as_str())
                })
                .map(|c| (test, c))
        })
        .collect()
}

/// Counts from one reconciliation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub matched: usize,
    pub assigned: usize,
    pub already_marked: usize,
}

/// Write each matched remote id into its test's source file.
///
/// Files are opened once each, in the order they first appear. The raw
/// title is passed unchanged; the rewriter skips names already marked.
pub fn write_back(
    matches: &[(&LocalTest, &RemoteCandidate)],
) -> Result<ReconcileReport, SourceError> {
    let mut report = ReconcileReport {
        matched: matches.len(),
        ..ReconcileReport::default()
    };

    let mut order: Vec<&Path> = Vec::new();
    let mut grouped: HashMap<&Path, Vec<(&LocalTest, &RemoteCandidate)>> = HashMap::new();
    for &(test, candidate) in matches {
        let path = test.file_path.as_path();
        grouped
            .entry(path)
            .or_insert_with(|| {
                order.push(path);
                Vec::new()
            })
            .push((test, candidate));
    }

    for path in order {
        let mut suite = SuiteFile::open(path)?;
        for (test, candidate) in grouped.remove(path).unwrap_or_default() {
            let marker = ident::to_marker(&candidate.remote_id);
            match suite.assign_identifier(&test.raw_title, &marker)? {
                AssignOutcome::Assigned { .. } => report.assigned += 1,
                AssignOutcome::AlreadyMarked => report.already_marked += 1,
            }
        }
    }
    Ok(report)
}

/// Parse, match and write back in one pass.
pub fn reconcile(
    local: &[LocalTest],
    inventory: &RemoteInventory,
) -> Result<ReconcileReport, SourceError> {
    let candidates = candidates_from(inventory);
    let matches = match_tests(local, &candidates);

    let unmatched = local.len() - matches.len();
    if unmatched > 0 {
        warn!(unmatched, "Some tests have no registry entry yet");
    }
    let report = write_back(&matches)?;
    info!(
        matched = report.matched,
        assigned = report.assigned,
        already_marked = report.already_marked,
        "Reconciled test ids"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    const NO_SUITES: [&str; 0] = [];

    fn entries(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn candidate(id: &str, title: &str, suite: Option<&str>, file: Option<&str>) -> RemoteCandidate {
        RemoteCandidate {
            remote_id: id.to_string(),
            title: title.to_string(),
            suite: suite.map(str::to_string),
            file_name: file.map(str::to_string),
        }
    }

    #[test]
    fn title_only_key() {
        let parsed = parse_inventory(&entries(&[("Simple Test", "T001")]), NO_SUITES);
        assert_eq!(parsed, vec![candidate("T001", "Simple Test", None, None)]);
    }

    #[test]
    fn two_part_key_with_known_suite() {
        let parsed = parse_inventory(&entries(&[("Suite#Login", "T002")]), ["Suite"]);
        assert_eq!(parsed, vec![candidate("T002", "Login", Some("Suite"), None)]);
    }

    #[test]
    fn two_part_key_with_unknown_suite_keeps_whole_key() {
        let parsed = parse_inventory(&entries(&[("Unknown#Login", "T003")]), ["Suite"]);
        assert_eq!(parsed, vec![candidate("T003", "Unknown#Login", None, None)]);
    }

    #[test]
    fn three_part_key_sets_file_not_suite() {
        let parsed = parse_inventory(
            &entries(&[("file.robot#Suite#Login", "T004")]),
            ["Suite"],
        );
        assert_eq!(
            parsed,
            vec![candidate("T004", "Login", None, Some("file.robot"))]
        );
    }

    #[test]
    fn extra_separators_stay_in_title() {
        let parsed = parse_inventory(&entries(&[("f.robot#S#A#B", "T9")]), NO_SUITES);
        assert_eq!(parsed[0].title, "A#B");
        assert_eq!(parsed[0].file_name.as_deref(), Some("f.robot"));
    }

    #[test]
    fn shared_id_collapses_to_one_record() {
        let parsed = parse_inventory(
            &entries(&[
                ("Name", "T005"),
                ("Suite#Name", "T005"),
                ("f.robot#Suite#Name", "T005"),
            ]),
            ["Suite"],
        );
        assert_eq!(
            parsed,
            vec![candidate("T005", "Name", Some("Suite"), Some("f.robot"))]
        );
    }

    #[test]
    fn merge_never_overwrites_populated_fields() {
        let parsed = parse_inventory(
            &entries(&[("A#Name", "T6"), ("B#Name", "T6")]),
            ["A", "B"],
        );
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].suite.as_deref(), Some("A"));
    }

    #[test]
    fn match_requires_suite_and_title() {
        let local = vec![
            LocalTest::new("Login", "Auth", "auth.robot"),
            LocalTest::new("Login", "Other", "other.robot"),
            LocalTest::new("Logout @Tabc", "Auth", "auth.robot"),
        ];
        let candidates = vec![
            candidate("@T1", "Login", Some("Auth"), None),
            candidate("@T2", "Logout", Some("Auth"), None),
            candidate("@T3", "Login", None, Some("other.robot")),
        ];

        let matches = match_tests(&local, &candidates);
        let pairs: Vec<_> = matches
            .iter()
            .map(|(t, c)| (t.raw_title.as_str(), t.suite_title.as_str(), c.remote_id.as_str()))
            .collect();
        assert_eq!(pairs, vec![("Login", "Auth", "@T1"), ("Logout @Tabc", "Auth", "@T2")]);
    }

    #[test]
    fn write_back_assigns_and_skips_marked() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("auth.robot");
        std::fs::write(
            &path,
            "*** Test Cases ***\nLogin\n    Log    in\n\nLogout @Tabc\n    Log    out\n",
        )
        .unwrap();

        let local = vec![
            LocalTest::new("Login", "Auth", &path),
            LocalTest::new("Logout @Tabc", "Auth", &path),
        ];
        let candidates = vec![
            candidate("@T1", "Login", Some("Auth"), None),
            candidate("@Tabc", "Logout", Some("Auth"), None),
        ];

        let report = write_back(&match_tests(&local, &candidates)).unwrap();

        assert_eq!(
            report,
            ReconcileReport {
                matched: 2,
                assigned: 1,
                already_marked: 1
            }
        );
        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("\nLogin @T1\n"));
        assert!(written.contains("\nLogout @Tabc\n"));
    }

    #[test]
    fn write_back_reports_missing_test() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("auth.robot");
        std::fs::write(&path, "*** Test Cases ***\nRenamed\n    No Operation\n").unwrap();

        let local = vec![LocalTest::new("Login", "Auth", &path)];
        let candidates = vec![candidate("@T1", "Login", Some("Auth"), None)];

        let err = write_back(&match_tests(&local, &candidates)).unwrap_err();
        assert!(matches!(err, SourceError::TestNotFound { .. }));
    }
}
