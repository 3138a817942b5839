//! Local suite discovery for the CLI.
//!
//! Walks the given paths for `*.robot` files and lists every test-case block
//! as a [`LocalTest`]. Directories are expanded here and never handed to
//! [`SuiteFile`].

use super::rewriter::SuiteFile;
use crate::errors::SourceError;
use crate::types::LocalTest;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const SUITE_EXTENSION: &str = "robot";

/// Expand files and directories into a sorted, deduplicated list of suite files.
pub fn find_suite_files(paths: &[PathBuf]) -> Result<Vec<PathBuf>, SourceError> {
    let mut files = Vec::new();
    for path in paths {
        let meta = fs::metadata(path).map_err(|e| SourceError::io(path, e))?;
        if meta.is_dir() {
            walk_dir(path, &mut files)?;
        } else if is_suite_file(path) {
            files.push(path.clone());
        } else {
            debug!(path = %path.display(), "Skipping non-suite file");
        }
    }
    files.sort();
    files.dedup();
    Ok(files)
}

fn walk_dir(dir: &Path, files: &mut Vec<PathBuf>) -> Result<(), SourceError> {
    let entries = fs::read_dir(dir).map_err(|e| SourceError::io(dir, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| SourceError::io(dir, e))?;
        let path = entry.path();
        let file_type = entry.file_type().map_err(|e| SourceError::io(&path, e))?;
        if file_type.is_dir() {
            walk_dir(&path, files)?;
        } else if file_type.is_file() && is_suite_file(&path) {
            files.push(path);
        }
    }
    Ok(())
}

fn is_suite_file(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case(SUITE_EXTENSION))
}

/// Suite title Robot Framework derives from a file name.
///
/// `01__user_login.robot` becomes `User Login`; names containing uppercase
/// letters keep their casing (`API_checks` becomes `API checks`).
pub fn suite_title_from_path(path: &Path) -> String {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let stem = match stem.split_once("__") {
        Some((prefix, rest)) if !prefix.is_empty() && !rest.is_empty() => rest.to_string(),
        _ => stem,
    };
    let spaced = stem.replace('_', " ").trim().to_string();
    if spaced.chars().any(char::is_uppercase) {
        return spaced;
    }
    spaced
        .split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Every test in `suite`, with its source span filled in.
pub fn collect_tests(suite: &SuiteFile) -> Vec<LocalTest> {
    let suite_title = suite_title_from_path(suite.path());
    suite
        .test_names()
        .into_iter()
        .map(|name| {
            let source = suite.extract_source_span(&name);
            let mut test = LocalTest::new(name, suite_title.clone(), suite.path());
            test.source_text = source;
            test
        })
        .collect()
}
