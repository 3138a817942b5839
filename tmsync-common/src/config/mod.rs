//! Configuration for tmsync.
//!
//! Built once at process entry and passed by reference into the registry
//! client and the sessions. Sources, later wins:
//! - built-in defaults
//! - TOML file (`--config` or `~/.config/tmsync/config.toml`)
//! - `TMSYNC_*` environment variables
//! - CLI flags (applied by the binary)

pub mod env;

pub use env::{EnvError, EnvParser};

use crate::errors::ConfigError;
use crate::registry::client::{DEFAULT_BATCH_SIZE, MAX_BATCH_SIZE};
use crate::registry::connectivity::{DEFAULT_PROBE_URL, ProbeSettings};
use crate::registry::retry::{MAX_RETRIES_DEFAULT, RETRY_INTERVAL_DEFAULT, RetryPolicy};
use crate::registry::wire::ImportOptions;
use crate::util::mask_secret;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

pub const DEFAULT_REGISTRY_URL: &str = "https://app.testomat.io";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub registry: RegistryConfig,
    pub import: ImportConfig,
    pub run: RunConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Attempts per request, first try included.
    pub max_retries: u32,
    pub retry_interval_secs: u64,
    pub batch_size: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proxy: Option<String>,
    pub probe_url: String,
    pub probe_connectivity: bool,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_REGISTRY_URL.to_string(),
            api_key: None,
            max_retries: MAX_RETRIES_DEFAULT,
            retry_interval_secs: RETRY_INTERVAL_DEFAULT.as_secs(),
            batch_size: DEFAULT_BATCH_SIZE,
            proxy: None,
            probe_url: DEFAULT_PROBE_URL.to_string(),
            probe_connectivity: true,
        }
    }
}

impl RegistryConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries.max(1),
            retry_interval: Duration::from_secs(self.retry_interval_secs),
        }
    }

    /// Batch size clamped to what the registry accepts.
    pub fn effective_batch_size(&self) -> usize {
        if (1..=MAX_BATCH_SIZE).contains(&self.batch_size) {
            self.batch_size
        } else {
            warn!(
                batch_size = self.batch_size,
                max = MAX_BATCH_SIZE,
                fallback = DEFAULT_BATCH_SIZE,
                "Batch size out of range, using default"
            );
            DEFAULT_BATCH_SIZE
        }
    }

    /// Probe settings, or `None` when probing is disabled.
    pub fn probe_settings(&self) -> Option<ProbeSettings> {
        self.probe_connectivity.then(|| ProbeSettings {
            url: self.probe_url.clone(),
            ..ProbeSettings::default()
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub directory: Option<String>,
    pub labels: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Existing run to report into instead of creating one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
    pub publish: bool,
    pub batch_upload_disabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_title: Option<String>,
}

impl RunConfig {
    pub fn access_event(&self) -> Option<&'static str> {
        self.publish.then_some("publish")
    }
}

impl SyncConfig {
    /// `~/.config/tmsync/config.toml`, if a config directory exists.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("tmsync").join("config.toml"))
    }

    /// Defaults, then the config file, then the process environment.
    ///
    /// An explicit `path` must exist; the default path is optional.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => match Self::default_path().filter(|p| p.is_file()) {
                Some(default) => Self::from_file(&default)?,
                None => Self::default(),
            },
        };
        config.apply_env(&mut EnvParser::new())?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = toml::from_str(&contents).map_err(|source| ConfigError::Toml {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), "Loaded config file");
        Ok(config)
    }

    /// Overlay every variable the parser finds; all invalid values are
    /// reported together.
    pub fn apply_env(&mut self, env: &mut EnvParser) -> Result<(), ConfigError> {
        let registry = &mut self.registry;
        if let Some(url) = env.get_string("URL") {
            registry.url = url;
        }
        if let Some(key) = env.get_string("API_KEY") {
            registry.api_key = Some(key);
        }
        if let Some(n) = env.get_u32_range("MAX_REQUEST_FAILURES", 1, 1000) {
            registry.max_retries = n;
        }
        if let Some(secs) = env.get_u64_range("REQUEST_INTERVAL", 0, 3600) {
            registry.retry_interval_secs = secs;
        }
        if let Some(size) = env.get_u32_range("BATCH_SIZE", 0, u32::MAX) {
            registry.batch_size = size as usize;
        }
        if let Some(proxy) = env
            .get_string("PROXY")
            .or_else(|| env.get_raw("HTTP_PROXY").filter(|p| !p.trim().is_empty()))
        {
            registry.proxy = Some(proxy);
        }

        if let Some(directory) = env.get_string("IMPORT_DIRECTORY") {
            self.import.directory = Some(directory);
        }
        if let Some(labels) = env.get_list("SYNC_LABELS") {
            self.import.labels = labels;
        }

        let run = &mut self.run;
        if let Some(run_id) = env.get_string("RUN") {
            run.run_id = Some(run_id);
        }
        if let Some(publish) = env.get_bool("PUBLISH") {
            run.publish = publish;
        }
        if let Some(disabled) = env.get_bool("DISABLE_BATCH_UPLOAD") {
            run.batch_upload_disabled = disabled;
        }
        if let Some(title) = env.get_string("TITLE") {
            run.title = Some(title);
        }
        if let Some(group) = env.get_string("RUNGROUP_TITLE") {
            run.group_title = Some(group);
        }

        let errors = env.take_errors();
        if errors.is_empty() {
            Ok(())
        } else {
            let joined = errors
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("; ");
            Err(ConfigError::Env(joined))
        }
    }

    /// Import flags derived from config; upload mode flags come from the caller.
    pub fn import_options(&self) -> ImportOptions {
        ImportOptions {
            directory: self.import.directory.clone(),
            labels: self.import.labels.clone(),
            ..ImportOptions::default()
        }
    }

    /// Copy safe to print: the API key is masked.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        copy.registry.api_key = copy.registry.api_key.as_deref().map(mask_secret);
        copy
    }

    /// Redacted TOML rendering for `tmsync config`.
    pub fn to_redacted_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(&self.redacted())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(vars: &[(&str, &str)]) -> EnvParser {
        EnvParser::from_map(
            vars.iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<HashMap<_, _>>(),
        )
    }

    #[test]
    fn test_defaults() {
        let config = SyncConfig::default();
        assert_eq!(config.registry.url, DEFAULT_REGISTRY_URL);
        assert_eq!(config.registry.max_retries, 5);
        assert_eq!(config.registry.retry_interval_secs, 5);
        assert_eq!(config.registry.batch_size, 50);
        assert!(config.registry.probe_connectivity);
        assert_eq!(config.run.access_event(), None);
    }

    #[test]
    fn test_toml_sections_are_partial() {
        let config: SyncConfig = toml::from_str(
            r#"
            [registry]
            api_key = "tstmt_abc"
            batch_size = 20

            [import]
            labels = ["smoke", "ci"]
            "#,
        )
        .unwrap();
        assert_eq!(config.registry.api_key.as_deref(), Some("tstmt_abc"));
        assert_eq!(config.registry.batch_size, 20);
        assert_eq!(config.registry.max_retries, 5);
        assert_eq!(config.import.labels, vec!["smoke", "ci"]);
        assert!(!config.run.publish);
    }

    #[test]
    fn test_env_overrides_file_values() {
        let mut config = SyncConfig::default();
        config.registry.api_key = Some("from_file".to_string());
        config
            .apply_env(&mut env(&[
                ("TMSYNC_API_KEY", "from_env"),
                ("TMSYNC_MAX_REQUEST_FAILURES", "3"),
                ("TMSYNC_REQUEST_INTERVAL", "1"),
                ("TMSYNC_RUN", "run42"),
                ("TMSYNC_PUBLISH", "yes"),
                ("TMSYNC_SYNC_LABELS", "a,b"),
            ]))
            .unwrap();

        assert_eq!(config.registry.api_key.as_deref(), Some("from_env"));
        assert_eq!(config.registry.max_retries, 3);
        assert_eq!(config.registry.retry_interval_secs, 1);
        assert_eq!(config.run.run_id.as_deref(), Some("run42"));
        assert_eq!(config.run.access_event(), Some("publish"));
        assert_eq!(config.import.labels, vec!["a", "b"]);
    }

    #[test]
    fn test_proxy_falls_back_to_http_proxy() {
        let mut config = SyncConfig::default();
        config
            .apply_env(&mut env(&[("HTTP_PROXY", "http://corp:8080")]))
            .unwrap();
        assert_eq!(config.registry.proxy.as_deref(), Some("http://corp:8080"));

        let mut config = SyncConfig::default();
        config
            .apply_env(&mut env(&[
                ("HTTP_PROXY", "http://corp:8080"),
                ("TMSYNC_PROXY", "http://mine:3128"),
            ]))
            .unwrap();
        assert_eq!(config.registry.proxy.as_deref(), Some("http://mine:3128"));
    }

    #[test]
    fn test_env_errors_are_reported_together() {
        let mut config = SyncConfig::default();
        let err = config
            .apply_env(&mut env(&[
                ("TMSYNC_PUBLISH", "perhaps"),
                ("TMSYNC_MAX_REQUEST_FAILURES", "0"),
            ]))
            .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("TMSYNC_PUBLISH"));
        assert!(message.contains("TMSYNC_MAX_REQUEST_FAILURES"));
    }

    #[test]
    fn test_batch_size_out_of_range_falls_back() {
        for size in [0, 101, 5000] {
            let config = RegistryConfig {
                batch_size: size,
                ..RegistryConfig::default()
            };
            assert_eq!(config.effective_batch_size(), DEFAULT_BATCH_SIZE);
        }
        let config = RegistryConfig {
            batch_size: 100,
            ..RegistryConfig::default()
        };
        assert_eq!(config.effective_batch_size(), 100);
    }

    #[test]
    fn test_probe_settings_follow_toggle() {
        let mut config = RegistryConfig {
            probe_url: "http://probe.local/".to_string(),
            ..RegistryConfig::default()
        };
        assert_eq!(config.probe_settings().unwrap().url, "http://probe.local/");
        config.probe_connectivity = false;
        assert!(config.probe_settings().is_none());
    }

    #[test]
    fn test_redacted_toml_masks_key() {
        let mut config = SyncConfig::default();
        config.registry.api_key = Some("tstmt_0123456789".to_string());
        let rendered = config.to_redacted_toml().unwrap();
        assert!(rendered.contains("tstm***"));
        assert!(!rendered.contains("0123456789"));
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = SyncConfig::from_file(&dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_invalid_toml_names_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[registry\nurl = 1").unwrap();
        let err = SyncConfig::from_file(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Toml { .. }));
        assert!(err.to_string().contains("config.toml"));
    }
}
