//! Error types for tmsync.
//!
//! | Type             | Raised by                  | Retried |
//! |------------------|----------------------------|---------|
//! | `TransportError` | transport (no response)    | never   |
//! | `RegistryError`  | retry layer / client calls | 501+    |
//! | `ReportError`    | result reporting (403)     | never   |
//! | `SourceError`    | suite file parse/rewrite   | never   |
//! | `ConfigError`    | config loading             | never   |

use std::path::PathBuf;
use thiserror::Error;

/// Logged verbatim whenever the registry rejects the API key.
pub const FORBIDDEN_MESSAGE: &str = "Authentication failed. Please check your project API key. \
     It may be invalid or expired";

/// A request that produced no HTTP response at all.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("failed to connect to {url}: {message}")]
    Connection { url: String, message: String },

    #[error("request to {url} timed out")]
    Timeout { url: String },

    #[error("invalid proxy {proxy}: {message}")]
    InvalidProxy { proxy: String, message: String },
}

/// Failure of a single logical registry exchange.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("retries exhausted after {attempts} attempts to {url}")]
    RetriesExhausted { attempts: u32, url: String },

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("{}", FORBIDDEN_MESSAGE)]
    Forbidden,

    #[error("registry returned status {code} for {url}")]
    Status { code: u16, url: String },

    #[error("failed to decode registry response: {0}")]
    Decode(#[from] serde_json::Error),
}

/// The only condition result reporting escalates to its caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReportError {
    #[error("{}", FORBIDDEN_MESSAGE)]
    Forbidden,
}

/// Suite file load, lookup and rewrite failures.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("failed to access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{}:{line}: {message}", path.display())]
    Parse {
        path: PathBuf,
        line: usize,
        message: String,
    },

    #[error("Test '{name}' not found in {}", path.display())]
    TestNotFound { name: String, path: PathBuf },
}

impl SourceError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Configuration load failures.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {}: {source}", path.display())]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid environment configuration: {0}")]
    Env(String),

    #[error("no registry API key configured (set TMSYNC_API_KEY or registry.api_key)")]
    MissingApiKey,
}
