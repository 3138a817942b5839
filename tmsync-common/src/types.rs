//! Common types shared by the suite, registry and reconciliation layers.

use crate::ident;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Outcome of a single executed test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestStatus {
    Passed,
    Failed,
    Skipped,
}

impl std::fmt::Display for TestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Passed => write!(f, "passed"),
            Self::Failed => write!(f, "failed"),
            Self::Skipped => write!(f, "skipped"),
        }
    }
}

/// One locally discovered test.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalTest {
    /// Display name as authored, markers and tags included.
    pub raw_title: String,
    /// `raw_title` with every marker removed.
    pub sync_title: String,
    /// Token of the last marker in `raw_title`.
    pub identifier: Option<String>,
    /// Name of the enclosing suite.
    pub suite_title: String,
    /// Path of the suite file that declares the test.
    pub file_path: PathBuf,
    /// File name component of `file_path`.
    pub file_name: String,
    /// Verbatim block text, filled in on demand.
    pub source_text: Option<String>,
    pub status: Option<TestStatus>,
    pub run_time_micros: Option<u64>,
}

impl LocalTest {
    pub fn new(
        raw_title: impl Into<String>,
        suite_title: impl Into<String>,
        file_path: impl AsRef<Path>,
    ) -> Self {
        let raw_title = raw_title.into();
        let file_path = file_path.as_ref().to_path_buf();
        let file_name = file_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        Self {
            sync_title: ident::strip_identifiers(&raw_title),
            identifier: ident::extract_identifier(&raw_title).map(str::to_string),
            raw_title,
            suite_title: suite_title.into(),
            file_path,
            file_name,
            source_text: None,
            status: None,
            run_time_micros: None,
        }
    }

    #[must_use]
    pub fn with_outcome(mut self, status: TestStatus, run_time_micros: u64) -> Self {
        self.status = Some(status);
        self.run_time_micros = Some(run_time_micros);
        self
    }

    #[must_use]
    pub fn with_source_text(mut self, text: impl Into<String>) -> Self {
        self.source_text = Some(text.into());
        self
    }

    /// Build the per-test result record sent to a run.
    pub fn to_result(&self) -> TestResult {
        TestResult {
            status: self.status,
            title: self.raw_title.clone(),
            suite_title: Some(self.suite_title.clone()),
            test_id: self.identifier.clone(),
            file: Some(self.file_name.clone()),
            run_time: self.run_time_micros,
        }
    }
}

/// One decoded registry inventory entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteCandidate {
    pub remote_id: String,
    pub title: String,
    pub suite: Option<String>,
    pub file_name: Option<String>,
}

impl std::fmt::Display for RemoteCandidate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} - {} - {} - {}",
            self.remote_id,
            self.title,
            self.suite.as_deref().unwrap_or("-"),
            self.file_name.as_deref().unwrap_or("-")
        )
    }
}

/// Result fields reported for one test. `None` fields are left out of the
/// request body.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TestResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<TestStatus>,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suite_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_time: Option<u64>,
}
