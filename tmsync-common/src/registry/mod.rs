//! Resilient registry client.
//!
//! | Module         | Concern                                         |
//! |----------------|-------------------------------------------------|
//! | `transport`    | request/response seam and the `ureq` transport  |
//! | `retry`        | transient-status retry policy and `Clock`       |
//! | `connectivity` | proxy probing and direct fallback               |
//! | `wire`         | request and response bodies                     |
//! | `client`       | the public registry operations                   |
//! | `mock`         | scripted transport and clock for tests          |

pub mod client;
pub mod connectivity;
pub mod mock;
pub mod retry;
pub mod transport;
pub mod wire;

pub use client::{BatchSummary, DEFAULT_BATCH_SIZE, MAX_BATCH_SIZE, RegistryClient};
pub use connectivity::{Connectivity, ProbeSettings};
pub use retry::{Clock, RetryPolicy, SystemClock, is_transient};
pub use transport::{HttpMethod, HttpRequest, HttpResponse, Route, Transport, UreqTransport};
pub use wire::{ImportOptions, RemoteInventory, RunHandle};
