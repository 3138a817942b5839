//! Subcommand implementations.

use crate::results;
use anyhow::{Context, Result, bail};
use std::path::{Path, PathBuf};
use tmsync_common::suite::find_suite_files;
use tmsync_common::{
    ImportMode, ImportOptions, ImportSession, ReportError, ReportSession, SyncConfig,
};
use tracing::{info, warn};

pub fn import(config: &SyncConfig, paths: &[PathBuf], options: ImportOptions) -> Result<()> {
    let files = find_suite_files(paths).context("failed to discover suite files")?;
    info!(files = files.len(), "Importing suites");

    let mut session = ImportSession::new(config, ImportMode::Upload(options));
    if !session.is_enabled() {
        bail!("registry import is disabled: no API key configured");
    }
    for file in &files {
        session
            .visit_file(file)
            .with_context(|| format!("failed to read suite {}", file.display()))?;
    }

    let summary = session.close().context("failed to write test ids back")?;
    println!("Collected {} tests from {} files", summary.collected, files.len());
    if summary.collected > 0 && !summary.uploaded {
        println!("Upload failed; see log for details");
    }
    match summary.reconciled {
        Some(report) => println!(
            "Matched {} tests: {} ids written, {} already marked",
            report.matched, report.assigned, report.already_marked
        ),
        None if summary.collected > 0 => println!("Test ids were not fetched; files left unchanged"),
        None => {}
    }
    Ok(())
}

pub fn strip_ids(config: &SyncConfig, paths: &[PathBuf]) -> Result<()> {
    let files = find_suite_files(paths).context("failed to discover suite files")?;

    let mut session = ImportSession::new(config, ImportMode::RemoveIds);
    for file in &files {
        session
            .visit_file(file)
            .with_context(|| format!("failed to strip ids from {}", file.display()))?;
    }
    let stripped = session.stripped();
    session.close()?;

    println!("Removed {} ids from {} files", stripped, files.len());
    Ok(())
}

pub fn report(config: &SyncConfig, results_path: &Path) -> Result<()> {
    let records = results::load(results_path)?;
    let total = records.len();

    let mut session = ReportSession::new(config);
    if !session.is_enabled() {
        bail!("reporting is disabled: no API key configured or the run could not be created");
    }

    for (suite, members) in results::group_by_suite(records) {
        for record in &members {
            session.end_test(&record.to_local_test()).map_err(forbidden)?;
        }
        if let Some(summary) = session.end_suite().map_err(forbidden)?
            && !summary.is_complete()
        {
            warn!(suite, "Not every batch was delivered");
        }
    }

    if session.close().map_err(forbidden)? {
        println!("Reported {total} results");
    } else {
        println!("Reported {total} results; the run could not be finished");
    }
    Ok(())
}

fn forbidden(err: ReportError) -> anyhow::Error {
    anyhow::Error::new(err).context("registry rejected the API key")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tmsync_common::testing::{SAMPLE_SUITE, init_test_logging};

    #[test]
    fn test_strip_ids_runs_without_api_key() {
        init_test_logging();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("login.robot");
        std::fs::write(&path, SAMPLE_SUITE).unwrap();

        strip_ids(&SyncConfig::default(), &[dir.path().to_path_buf()]).unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("\nInvalid Password\n"));
        assert!(!written.contains("@Tc51dd44d"));
    }

    #[test]
    fn test_import_without_api_key_fails_fast() {
        init_test_logging();
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("login.robot"), SAMPLE_SUITE).unwrap();

        let err = import(
            &SyncConfig::default(),
            &[dir.path().to_path_buf()],
            ImportOptions::default(),
        )
        .unwrap_err();

        assert!(err.to_string().contains("no API key"));
        assert_eq!(
            std::fs::read_to_string(dir.path().join("login.robot")).unwrap(),
            SAMPLE_SUITE
        );
    }

    #[test]
    fn test_report_with_bad_results_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.json");
        std::fs::write(&path, "not json").unwrap();

        let err = report(&SyncConfig::default(), &path).unwrap_err();
        assert!(format!("{err:#}").contains("invalid results file"));
    }
}
