//! Results file loading for `tmsync report`.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tmsync_common::{LocalTest, TestStatus};

/// One executed test as written by the runner integration.
#[derive(Debug, Clone, Deserialize)]
pub struct ResultRecord {
    pub title: String,
    pub suite: String,
    #[serde(default)]
    pub file: PathBuf,
    pub status: TestStatus,
    /// Microseconds.
    #[serde(default)]
    pub run_time: Option<u64>,
}

impl ResultRecord {
    pub fn to_local_test(&self) -> LocalTest {
        LocalTest::new(&self.title, &self.suite, &self.file)
            .with_outcome(self.status, self.run_time.unwrap_or(0))
    }
}

pub fn load(path: &Path) -> Result<Vec<ResultRecord>> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read results file {}", path.display()))?;
    parse(&contents).with_context(|| format!("invalid results file {}", path.display()))
}

pub fn parse(contents: &str) -> Result<Vec<ResultRecord>> {
    Ok(serde_json::from_str(contents)?)
}

/// Group records by suite, suites in first-seen order.
pub fn group_by_suite(records: Vec<ResultRecord>) -> Vec<(String, Vec<ResultRecord>)> {
    let mut groups: Vec<(String, Vec<ResultRecord>)> = Vec::new();
    for record in records {
        match groups.iter_mut().find(|(suite, _)| *suite == record.suite) {
            Some((_, members)) => members.push(record),
            None => groups.push((record.suite.clone(), vec![record])),
        }
    }
    groups
}
