//! Direct-vs-proxied route negotiation.
//!
//! Runs before every registry operation. A configured proxy is applied and
//! probed with a short deadline; if it does not answer, the transport falls
//! back to a direct route with certificate verification restored. Without a
//! proxy, a longer probe tells "no network" apart from "registry down".
//! Results are advisory: the operation is attempted either way.

use super::retry::Clock;
use super::transport::{HttpRequest, Route, Transport};
use std::time::Duration;
use tracing::{debug, error, warn};

pub const DEFAULT_PROBE_URL: &str = "https://api.ipify.org?format=json";

/// Probe timing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeSettings {
    pub url: String,
    /// Overall budget for probing a configured proxy.
    pub proxy_deadline: Duration,
    /// Overall budget for probing the direct route.
    pub direct_deadline: Duration,
    /// Timeout of each probe request.
    pub attempt_timeout: Duration,
    /// Pause after a failed probe request.
    pub pause: Duration,
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self {
            url: DEFAULT_PROBE_URL.to_string(),
            proxy_deadline: Duration::from_secs(1),
            direct_deadline: Duration::from_secs(30),
            attempt_timeout: Duration::from_secs(5),
            pause: Duration::from_secs(1),
        }
    }
}

/// Outcome of the last negotiation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connectivity {
    /// Not negotiated yet, or probing is disabled.
    Unknown,
    /// Requests go through the configured proxy, which answered the probe.
    Proxied,
    /// The proxy did not answer; requests go direct.
    ProxyFallback,
    /// No proxy configured; the direct probe succeeded.
    Direct,
    /// No proxy configured and the direct probe never succeeded.
    Offline,
}

/// Apply the route for `proxy` to `transport`, probing as described above.
pub fn negotiate<T, C>(
    transport: &mut T,
    clock: &C,
    proxy: Option<&str>,
    settings: &ProbeSettings,
) -> Connectivity
where
    T: Transport + ?Sized,
    C: Clock + ?Sized,
{
    debug!(proxy = ?proxy, "Negotiating registry connectivity");

    if let Some(proxy) = proxy {
        match transport.apply_route(&Route::via_proxy(proxy)) {
            Ok(()) => {
                debug!(proxy, "Proxy settings applied");
                if probe(&*transport, clock, settings, settings.proxy_deadline) {
                    return Connectivity::Proxied;
                }
                warn!(proxy, "Proxy is unavailable. Falling back to a direct connection");
            }
            Err(e) => warn!(error = %e, "Ignoring unusable proxy"),
        }
        apply_direct(transport);
        return Connectivity::ProxyFallback;
    }

    debug!("No proxy configured. Using a direct connection");
    apply_direct(transport);
    if probe(&*transport, clock, settings, settings.direct_deadline) {
        Connectivity::Direct
    } else {
        Connectivity::Offline
    }
}

fn apply_direct<T: Transport + ?Sized>(transport: &mut T) {
    // The direct route carries no proxy URI, so applying it cannot fail.
    if let Err(e) = transport.apply_route(&Route::direct()) {
        error!(error = %e, "Failed to apply direct route");
    }
}

/// Poll the probe URL until it answers or `deadline` passes.
fn probe<T, C>(transport: &T, clock: &C, settings: &ProbeSettings, deadline: Duration) -> bool
where
    T: Transport + ?Sized,
    C: Clock + ?Sized,
{
    let start = clock.elapsed();
    let request = HttpRequest::get(settings.url.as_str()).with_timeout(settings.attempt_timeout);

    while clock.elapsed().saturating_sub(start) < deadline {
        match transport.send(&request) {
            Ok(response) if response.is_success() => {
                debug!("Internet connection is available");
                return true;
            }
            Ok(response) => {
                error!(status = response.status, "Internet connection probe failed");
            }
            Err(e) => {
                error!(error = %e, "Internet connection is unavailable");
            }
        }
        clock.sleep(settings.pause);
    }

    error!(
        deadline_secs = deadline.as_secs(),
        "Internet connection check timed out"
    );
    false
}
