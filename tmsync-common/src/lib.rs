//! Shared library for tmsync.
//!
//! Keeps Robot Framework suites and a test-management registry in sync:
//! uploads test inventories and run results, and embeds each test's
//! registry id (`@T…`) in its name so local and remote tests re-match
//! across runs.

pub mod config;
pub mod errors;
pub mod ident;
pub mod logging;
pub mod reconcile;
pub mod registry;
pub mod suite;
pub mod sync;
pub mod testing;
pub mod types;
pub mod util;

pub use config::{EnvParser, ImportConfig, RegistryConfig, RunConfig, SyncConfig};
pub use errors::{
    ConfigError, FORBIDDEN_MESSAGE, RegistryError, ReportError, SourceError, TransportError,
};
pub use logging::{LogConfig, LoggingGuards, init_logging};
pub use reconcile::{ReconcileReport, match_tests, parse_inventory, reconcile};
pub use registry::{BatchSummary, ImportOptions, RegistryClient, RunHandle};
pub use suite::{AssignOutcome, SuiteFile};
pub use sync::{ImportMode, ImportSession, ImportSummary, ReportSession};
pub use types::{LocalTest, RemoteCandidate, TestResult, TestStatus};
