//! Registry client.
//!
//! Every public operation is one logical HTTP exchange:
//!
//! 1. Negotiate connectivity (proxy probe and fallback).
//! 2. Send through [`RetryPolicy::send`], which retries statuses 501+.
//! 3. Classify the final response: `< 400` success, `403` authentication
//!    failure, anything else a logged failure.
//!
//! Only result reporting escalates an error to the caller, and only for 403.
//! The remaining operations log and return an absent or `false` result so a
//! failed registry interaction never aborts the run.

use super::connectivity::{self, Connectivity, ProbeSettings};
use super::retry::{Clock, RetryPolicy, SystemClock};
use super::transport::{HttpRequest, HttpResponse, Route, Transport, UreqTransport};
use super::wire::{
    BatchRequest, CreateRunRequest, FinishRunRequest, ImportOptions, LoadRequest,
    RemoteInventory, RunHandle,
};
use crate::config::RegistryConfig;
use crate::errors::{ConfigError, FORBIDDEN_MESSAGE, RegistryError, ReportError};
use crate::types::{LocalTest, TestResult};
use crate::util::mask_api_key;
use serde::de::DeserializeOwned;
use tracing::{debug, error, info, warn};

/// Upper bound on results per batch request.
pub const MAX_BATCH_SIZE: usize = 100;
pub const DEFAULT_BATCH_SIZE: usize = 50;

/// Outcome of [`RegistryClient::report_batch`].
///
/// Chunks answered with a non-403 failure status are skipped and the
/// remaining chunks are still sent. A chunk that never got a final answer
/// (no response, or retries exhausted) abandons the rest of the batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchSummary {
    /// 1-based indices of accepted chunks.
    pub delivered: Vec<usize>,
    /// Chunks the registry answered with a failure status.
    pub rejected: Vec<(usize, u16)>,
    /// Index of the chunk that failed without a final answer; it and every
    /// later chunk were not delivered.
    pub abandoned_from: Option<usize>,
    /// Total number of chunks the results were split into.
    pub total: usize,
}

impl BatchSummary {
    pub fn is_complete(&self) -> bool {
        self.delivered.len() == self.total
    }
}

pub struct RegistryClient<T = UreqTransport, C = SystemClock> {
    base_url: String,
    api_key: String,
    policy: RetryPolicy,
    batch_size: usize,
    proxy: Option<String>,
    probe: Option<ProbeSettings>,
    transport: T,
    clock: C,
    connectivity: Connectivity,
}

impl RegistryClient {
    /// Client over the real network.
    pub fn from_config(config: &RegistryConfig) -> Result<Self, ConfigError> {
        Self::new(config, UreqTransport::new(), SystemClock::new())
    }
}

impl<T: Transport, C: Clock> RegistryClient<T, C> {
    pub fn new(config: &RegistryConfig, transport: T, clock: C) -> Result<Self, ConfigError> {
        let api_key = config
            .api_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .ok_or(ConfigError::MissingApiKey)?;

        Ok(Self {
            base_url: config.url.trim_end_matches('/').to_string(),
            api_key,
            policy: config.retry_policy(),
            batch_size: config.effective_batch_size(),
            proxy: config.proxy.clone(),
            probe: config.probe_settings(),
            transport,
            clock,
            connectivity: Connectivity::Unknown,
        })
    }

    /// Result of the most recent connectivity negotiation.
    pub fn connectivity(&self) -> Connectivity {
        self.connectivity
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}?api_key={}", self.base_url, path, self.api_key)
    }

    /// Re-evaluate routing before a registry call.
    fn prepare(&mut self) {
        match &self.probe {
            Some(settings) => {
                self.connectivity = connectivity::negotiate(
                    &mut self.transport,
                    &self.clock,
                    self.proxy.as_deref(),
                    settings,
                );
            }
            None => {
                let route = self
                    .proxy
                    .as_deref()
                    .map_or_else(Route::direct, Route::via_proxy);
                if let Err(e) = self.transport.apply_route(&route) {
                    warn!(error = %e, "Ignoring unusable proxy");
                    if let Err(e) = self.transport.apply_route(&Route::direct()) {
                        error!(error = %e, "Failed to apply direct route");
                    }
                }
            }
        }
    }

    /// Send one request and classify the final response.
    fn exchange(&mut self, request: &HttpRequest) -> Result<HttpResponse, RegistryError> {
        self.prepare();
        let response = self.policy.send(&self.transport, &self.clock, request)?;

        if response.status == 403 {
            error!("{FORBIDDEN_MESSAGE}");
            return Err(RegistryError::Forbidden);
        }
        if !response.is_success() {
            return Err(RegistryError::Status {
                code: response.status,
                url: mask_api_key(&request.url),
            });
        }
        Ok(response)
    }

    fn exchange_json<R: DeserializeOwned>(
        &mut self,
        request: &HttpRequest,
    ) -> Result<R, RegistryError> {
        let response = self.exchange(request)?;
        Ok(serde_json::from_str(&response.body)?)
    }

    /// Upload the local inventory, source spans included.
    pub fn upload_inventory(&mut self, tests: &[LocalTest], options: &ImportOptions) -> bool {
        let url = self.endpoint("/api/load");
        let payload = LoadRequest::new(tests, options);
        debug!(tests = tests.len(), ?options, "Uploading test inventory");

        let result = HttpRequest::post_json(url.as_str(), &payload)
            .map_err(RegistryError::from)
            .and_then(|request| self.exchange(&request));
        match result {
            Ok(_) => {
                info!(tests = tests.len(), "Tests loaded to the registry");
                true
            }
            Err(e) => {
                log_failure("load tests", &url, &e);
                false
            }
        }
    }

    /// Current remote key → id mapping and suite names.
    pub fn fetch_inventory(&mut self) -> Option<RemoteInventory> {
        let url = self.endpoint("/api/test_data");
        match self.exchange_json::<RemoteInventory>(&HttpRequest::get(url.as_str())) {
            Ok(inventory) => {
                debug!(
                    tests = inventory.tests.len(),
                    suites = inventory.suites.len(),
                    "Fetched remote inventory"
                );
                Some(inventory)
            }
            Err(e) => {
                log_failure("fetch test data", &url, &e);
                None
            }
        }
    }

    pub fn create_run(
        &mut self,
        access_event: Option<&str>,
        title: Option<&str>,
        group_title: Option<&str>,
    ) -> Option<RunHandle> {
        let url = self.endpoint("/api/reporter");
        let payload = CreateRunRequest {
            api_key: self.api_key.clone(),
            access_event: access_event.map(str::to_string),
            title: title.map(str::to_string),
            group_title: group_title.map(str::to_string),
        };

        let result = HttpRequest::post_json(url.as_str(), &payload)
            .map_err(RegistryError::from)
            .and_then(|request| self.exchange_json::<RunHandle>(&request));
        match result {
            Ok(run) => {
                info!(run_id = %run.uid, "Created test run");
                Some(run)
            }
            Err(e) => {
                log_failure("create test run", &url, &e);
                None
            }
        }
    }

    /// Report one result immediately.
    pub fn report_single(&mut self, run: &RunHandle, result: &TestResult) -> Result<(), ReportError> {
        let url = self.endpoint(&format!("/api/reporter/{}/testrun", run.uid));
        let outcome = HttpRequest::post_json(url.as_str(), result)
            .map_err(RegistryError::from)
            .and_then(|request| self.exchange(&request));
        match outcome {
            Ok(_) => {
                debug!(title = %result.title, "Reported test result");
                Ok(())
            }
            Err(RegistryError::Forbidden) => Err(ReportError::Forbidden),
            Err(e) => {
                log_failure("report test result", &url, &e);
                Ok(())
            }
        }
    }

    /// Report results in chunks of the configured batch size.
    pub fn report_batch(
        &mut self,
        run: &RunHandle,
        results: &[TestResult],
    ) -> Result<BatchSummary, ReportError> {
        let url = self.endpoint(&format!("/api/reporter/{}/testrun", run.uid));
        let mut summary = BatchSummary {
            total: results.len().div_ceil(self.batch_size),
            ..BatchSummary::default()
        };

        for (offset, chunk) in results.chunks(self.batch_size).enumerate() {
            let batch_index = offset + 1;
            let payload = BatchRequest {
                tests: chunk,
                batch_index,
            };
            let outcome = HttpRequest::post_json(url.as_str(), &payload)
                .map_err(RegistryError::from)
                .and_then(|request| self.exchange(&request));

            match outcome {
                Ok(_) => {
                    debug!(batch_index, results = chunk.len(), "Reported result batch");
                    summary.delivered.push(batch_index);
                }
                Err(RegistryError::Forbidden) => return Err(ReportError::Forbidden),
                Err(RegistryError::Status { code, .. }) => {
                    error!(
                        url = %mask_api_key(&url),
                        batch_index,
                        status = code,
                        "Failed to report result batch"
                    );
                    summary.rejected.push((batch_index, code));
                }
                Err(e) => {
                    log_failure("report result batch", &url, &e);
                    summary.abandoned_from = Some(batch_index);
                    break;
                }
            }
        }

        if !summary.is_complete() {
            warn!(
                delivered = ?summary.delivered,
                rejected = ?summary.rejected,
                abandoned_from = ?summary.abandoned_from,
                total = summary.total,
                "Result batch only partially delivered"
            );
        }
        Ok(summary)
    }

    /// Mark the run finished.
    pub fn finish_run(&mut self, run: &RunHandle) -> bool {
        let url = self.endpoint(&format!("/api/reporter/{}", run.uid));
        let result = HttpRequest::put_json(url.as_str(), &FinishRunRequest::finish())
            .map_err(RegistryError::from)
            .and_then(|request| self.exchange(&request));
        match result {
            Ok(_) => {
                info!(run_id = %run.uid, "Finished test run");
                true
            }
            Err(e) => {
                log_failure("finish test run", &url, &e);
                false
            }
        }
    }
}

fn log_failure(operation: &str, url: &str, err: &RegistryError) {
    // The 403 message was already logged by `exchange`.
    if matches!(err, RegistryError::Forbidden) {
        return;
    }
    error!(url = %mask_api_key(url), error = %err, "Failed to {operation}");
}
