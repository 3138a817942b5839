//! Process-wide logging setup for the tmsync binary.
//!
//! ```ignore
//! let mut log_config = LogConfig::from_env("info").with_stderr();
//! if cli.verbose {
//!     log_config = log_config.with_level("debug");
//! }
//! let _logging_guards = init_logging(&log_config)?;
//! ```

use anyhow::{Context, Result};
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt};

pub const LOG_ENV: &str = "TMSYNC_LOG";
pub const LOG_FORMAT_ENV: &str = "TMSYNC_LOG_FORMAT";
pub const LOG_FILE_ENV: &str = "TMSYNC_LOG_FILE";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    /// `EnvFilter` directive string.
    pub filter: String,
    pub json: bool,
    /// Console output goes to stderr instead of stdout.
    pub stderr: bool,
    /// Additional JSON log file, written off-thread.
    pub file: Option<PathBuf>,
}

impl LogConfig {
    /// Defaults overridden by `TMSYNC_LOG`, `TMSYNC_LOG_FORMAT=json` and
    /// `TMSYNC_LOG_FILE`.
    pub fn from_env(default_level: &str) -> Self {
        Self::from_lookup(default_level, |name| std::env::var(name).ok())
    }

    fn from_lookup(default_level: &str, lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            filter: lookup(LOG_ENV)
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| default_level.to_string()),
            json: lookup(LOG_FORMAT_ENV).is_some_and(|v| v.eq_ignore_ascii_case("json")),
            stderr: false,
            file: lookup(LOG_FILE_ENV)
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from),
        }
    }

    #[must_use]
    pub fn with_stderr(mut self) -> Self {
        self.stderr = true;
        self
    }

    #[must_use]
    pub fn with_level(mut self, level: &str) -> Self {
        self.filter = level.to_string();
        self
    }

    #[must_use]
    pub fn with_json(mut self, json: bool) -> Self {
        self.json = json;
        self
    }

    #[must_use]
    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.file = Some(path.into());
        self
    }
}

/// Keeps background log writers alive; drop at process exit.
#[derive(Default)]
pub struct LoggingGuards {
    _file: Option<WorkerGuard>,
}

/// Install the global subscriber described by `config`.
pub fn init_logging(config: &LogConfig) -> Result<LoggingGuards> {
    let filter = EnvFilter::try_new(&config.filter)
        .with_context(|| format!("invalid log filter '{}'", config.filter))?;

    let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = Vec::new();
    layers.push(match (config.json, config.stderr) {
        (true, true) => fmt::layer().json().with_writer(std::io::stderr).boxed(),
        (true, false) => fmt::layer().json().boxed(),
        (false, true) => fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr)
            .boxed(),
        (false, false) => fmt::layer().with_target(false).boxed(),
    });

    let mut guards = LoggingGuards::default();
    if let Some(path) = &config.file {
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map_or_else(|| PathBuf::from("."), PathBuf::from);
        let file_name = path
            .file_name()
            .with_context(|| format!("log file path has no file name: {}", path.display()))?;
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create log directory {}", dir.display()))?;

        let appender = tracing_appender::rolling::never(&dir, file_name);
        let (writer, guard) = tracing_appender::non_blocking(appender);
        layers.push(
            fmt::layer()
                .json()
                .with_ansi(false)
                .with_writer(writer)
                .boxed(),
        );
        guards._file = Some(guard);
    }

    tracing_subscriber::registry()
        .with(layers)
        .with(filter)
        .try_init()
        .context("failed to install tracing subscriber")?;
    Ok(guards)
}
