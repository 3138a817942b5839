//! Import and report sessions.
//!
//! A session wraps one [`RegistryClient`] for the lifetime of a test-runner
//! invocation. Without an API key a session is created disabled and every
//! call is a no-op, so callers never branch on configuration themselves.

use crate::config::SyncConfig;
use crate::errors::{ReportError, SourceError};
use crate::reconcile::{self, ReconcileReport};
use crate::registry::client::{BatchSummary, RegistryClient};
use crate::registry::retry::{Clock, SystemClock};
use crate::registry::transport::{Transport, UreqTransport};
use crate::registry::wire::{ImportOptions, RunHandle};
use crate::suite::{SuiteFile, collect_tests};
use crate::types::{LocalTest, TestResult};
use std::path::Path;
use tracing::{debug, error, info, warn};

/// What an import session does with each visited suite.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportMode {
    /// Collect tests, upload them at close and write back learned ids.
    Upload(ImportOptions),
    /// Strip every id from visited files; nothing is sent.
    RemoveIds,
}

/// Outcome of [`ImportSession::close`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub collected: usize,
    pub uploaded: bool,
    /// `None` when the remote inventory could not be fetched.
    pub reconciled: Option<ReconcileReport>,
}

pub struct ImportSession<T = UreqTransport, C = SystemClock> {
    client: Option<RegistryClient<T, C>>,
    mode: ImportMode,
    tests: Vec<LocalTest>,
    stripped: usize,
}

impl ImportSession {
    /// Session over the real network; disabled when no API key is set.
    pub fn new(config: &SyncConfig, mode: ImportMode) -> Self {
        if mode == ImportMode::RemoveIds {
            return Self::with_client(config, mode, None);
        }
        let client = match RegistryClient::from_config(&config.registry) {
            Ok(client) => Some(client),
            Err(e) => {
                warn!(error = %e, "Registry import disabled");
                None
            }
        };
        Self::with_client(config, mode, client)
    }
}

impl<T: Transport, C: Clock> ImportSession<T, C> {
    pub fn with_client(
        config: &SyncConfig,
        mode: ImportMode,
        client: Option<RegistryClient<T, C>>,
    ) -> Self {
        let mode = match mode {
            ImportMode::Upload(mut options) => {
                let defaults = config.import_options();
                options.directory = options.directory.or(defaults.directory);
                if options.labels.is_empty() {
                    options.labels = defaults.labels;
                }
                ImportMode::Upload(options)
            }
            ImportMode::RemoveIds => ImportMode::RemoveIds,
        };
        Self {
            client,
            mode,
            tests: Vec::new(),
            stripped: 0,
        }
    }

    /// Stripping works offline; uploading needs a client.
    pub fn is_enabled(&self) -> bool {
        matches!(self.mode, ImportMode::RemoveIds) || self.client.is_some()
    }

    pub fn tests(&self) -> &[LocalTest] {
        &self.tests
    }

    /// Number of names stripped so far in `RemoveIds` mode.
    pub fn stripped(&self) -> usize {
        self.stripped
    }

    /// Process one suite file. Returns the number of tests collected, or
    /// the number of names stripped in `RemoveIds` mode.
    pub fn visit_file(&mut self, path: &Path) -> Result<usize, SourceError> {
        if !self.is_enabled() {
            return Ok(0);
        }
        let mut suite = SuiteFile::open(path)?;
        match self.mode {
            ImportMode::RemoveIds => {
                let count = suite.strip_all_identifiers()?;
                self.stripped += count;
                Ok(count)
            }
            ImportMode::Upload(_) => {
                let tests = collect_tests(&suite);
                let count = tests.len();
                debug!(file = %path.display(), tests = count, "Collected tests");
                self.tests.extend(tests);
                Ok(count)
            }
        }
    }

    /// Upload, fetch and reconcile. No-op when nothing was collected.
    pub fn close(mut self) -> Result<ImportSummary, SourceError> {
        let mut summary = ImportSummary {
            collected: self.tests.len(),
            ..ImportSummary::default()
        };
        let (ImportMode::Upload(options), Some(client)) = (&self.mode, self.client.as_mut())
        else {
            return Ok(summary);
        };
        if self.tests.is_empty() {
            debug!("No tests collected; skipping upload");
            return Ok(summary);
        }

        summary.uploaded = client.upload_inventory(&self.tests, options);
        let Some(inventory) = client.fetch_inventory() else {
            warn!("Failed to get test ids from the registry");
            return Ok(summary);
        };
        summary.reconciled = Some(reconcile::reconcile(&self.tests, &inventory)?);
        Ok(summary)
    }
}

pub struct ReportSession<T = UreqTransport, C = SystemClock> {
    client: Option<RegistryClient<T, C>>,
    run: Option<RunHandle>,
    batch_upload_disabled: bool,
    buffer: Vec<TestResult>,
}

impl ReportSession {
    /// Session over the real network; disabled when no API key is set or
    /// the run cannot be created.
    pub fn new(config: &SyncConfig) -> Self {
        let client = match RegistryClient::from_config(&config.registry) {
            Ok(client) => Some(client),
            Err(e) => {
                warn!(error = %e, "Result reporting disabled");
                None
            }
        };
        Self::with_client(config, client)
    }
}

impl<T: Transport, C: Clock> ReportSession<T, C> {
    pub fn with_client(config: &SyncConfig, mut client: Option<RegistryClient<T, C>>) -> Self {
        let run = client.as_mut().and_then(|client| open_run(client, config));
        if run.is_none() {
            client = None;
        }
        Self {
            client,
            run,
            batch_upload_disabled: config.run.batch_upload_disabled,
            buffer: Vec::new(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.client.is_some() && self.run.is_some()
    }

    pub fn run(&self) -> Option<&RunHandle> {
        self.run.as_ref()
    }

    /// Buffered results not yet flushed.
    pub fn pending(&self) -> &[TestResult] {
        &self.buffer
    }

    /// Record one finished test: sent immediately when batching is off,
    /// buffered otherwise.
    pub fn end_test(&mut self, test: &LocalTest) -> Result<(), ReportError> {
        let (Some(client), Some(run)) = (self.client.as_mut(), self.run.as_ref()) else {
            return Ok(());
        };
        let result = test.to_result();
        if self.batch_upload_disabled {
            client.report_single(run, &result)
        } else {
            self.buffer.push(result);
            Ok(())
        }
    }

    /// Flush buffered results as one batch.
    pub fn end_suite(&mut self) -> Result<Option<BatchSummary>, ReportError> {
        let (Some(client), Some(run)) = (self.client.as_mut(), self.run.as_ref()) else {
            return Ok(None);
        };
        if self.batch_upload_disabled || self.buffer.is_empty() {
            return Ok(None);
        }
        let results = std::mem::take(&mut self.buffer);
        client.report_batch(run, &results).map(Some)
    }

    /// Flush anything still buffered and finish the run.
    pub fn close(mut self) -> Result<bool, ReportError> {
        if !self.is_enabled() {
            return Ok(false);
        }
        self.end_suite()?;
        match (self.client.as_mut(), self.run.as_ref()) {
            (Some(client), Some(run)) => Ok(client.finish_run(run)),
            _ => Ok(false),
        }
    }
}

/// Reuse the configured run or create one.
fn open_run<T: Transport, C: Clock>(
    client: &mut RegistryClient<T, C>,
    config: &SyncConfig,
) -> Option<RunHandle> {
    if let Some(run_id) = &config.run.run_id {
        debug!(run_id, "Reporting into existing run");
        return Some(RunHandle::existing(run_id.clone()));
    }

    let access_event = config.run.access_event();
    let run = client.create_run(
        access_event,
        config.run.title.as_deref(),
        config.run.group_title.as_deref(),
    );
    match &run {
        Some(run) => announce_run(run, access_event.is_some()),
        None => error!("Failed to create test run; result reporting disabled"),
    }
    run
}

fn announce_run(run: &RunHandle, publish: bool) {
    info!(
        run_id = %run.uid,
        url = run.url.as_deref().unwrap_or("-"),
        "Test run created. See run aggregation at the run url"
    );
    if publish && let Some(public_url) = &run.public_url {
        info!(public_url = %public_url, "Public run url");
    }
}
