//! HTTP transport seam.
//!
//! The registry client only needs "send a request, get status + body". The
//! production transport wraps a blocking `ureq` agent; tests substitute
//! [`super::mock::MockTransport`].

use crate::errors::TransportError;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Get => write!(f, "GET"),
            Self::Post => write!(f, "POST"),
            Self::Put => write!(f, "PUT"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    /// JSON body, already serialized.
    pub body: Option<Vec<u8>>,
    /// Per-request deadline; `None` uses the transport default.
    pub timeout: Option<Duration>,
}

impl HttpRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: HttpMethod::Get,
            url: url.into(),
            body: None,
            timeout: None,
        }
    }

    pub fn post_json(
        url: impl Into<String>,
        body: &impl serde::Serialize,
    ) -> serde_json::Result<Self> {
        Ok(Self {
            method: HttpMethod::Post,
            url: url.into(),
            body: Some(serde_json::to_vec(body)?),
            timeout: None,
        })
    }

    pub fn put_json(
        url: impl Into<String>,
        body: &impl serde::Serialize,
    ) -> serde_json::Result<Self> {
        Ok(Self {
            method: HttpMethod::Put,
            ..Self::post_json(url, body)?
        })
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Body parsed back as JSON (used by tests and debug logging).
    pub fn json_body(&self) -> Option<serde_json::Value> {
        self.body
            .as_deref()
            .and_then(|bytes| serde_json::from_slice(bytes).ok())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status < 400
    }
}

/// How outbound requests are routed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub proxy: Option<String>,
    pub verify_tls: bool,
}

impl Route {
    pub fn direct() -> Self {
        Self {
            proxy: None,
            verify_tls: true,
        }
    }

    /// Proxied routes skip certificate verification; intercepting proxies
    /// commonly re-sign traffic.
    pub fn via_proxy(proxy: impl Into<String>) -> Self {
        Self {
            proxy: Some(proxy.into()),
            verify_tls: false,
        }
    }
}

impl Default for Route {
    fn default() -> Self {
        Self::direct()
    }
}

/// Blocking request/response exchange.
///
/// Implementations return every HTTP status as `Ok`; `Err` means no
/// response was received at all.
pub trait Transport {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError>;

    /// Reconfigure routing for subsequent requests.
    fn apply_route(&mut self, route: &Route) -> Result<(), TransportError>;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        (**self).send(request)
    }

    fn apply_route(&mut self, route: &Route) -> Result<(), TransportError> {
        (**self).apply_route(route)
    }
}

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// `ureq`-backed transport.
pub struct UreqTransport {
    agent: ureq::Agent,
    route: Route,
    timeout: Duration,
}

impl UreqTransport {
    pub fn new() -> Self {
        let route = Route::direct();
        Self {
            agent: build_agent(&route, None),
            route,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn route(&self) -> &Route {
        &self.route
    }
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new()
    }
}

fn build_agent(route: &Route, proxy: Option<ureq::Proxy>) -> ureq::Agent {
    let tls = ureq::tls::TlsConfig::builder()
        .disable_verification(!route.verify_tls)
        .build();
    ureq::Agent::config_builder()
        .http_status_as_error(false)
        .proxy(proxy)
        .tls_config(tls)
        .build()
        .into()
}

fn map_ureq_error(url: &str, err: ureq::Error) -> TransportError {
    match err {
        ureq::Error::Timeout(_) => TransportError::Timeout {
            url: url.to_string(),
        },
        other => TransportError::Connection {
            url: url.to_string(),
            message: other.to_string(),
        },
    }
}

impl Transport for UreqTransport {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        let url = request.url.as_str();
        let timeout = Some(request.timeout.unwrap_or(self.timeout));
        let result = match (request.method, request.body.as_ref()) {
            (HttpMethod::Get, _) => self
                .agent
                .get(url)
                .config()
                .timeout_global(timeout)
                .build()
                .call(),
            (HttpMethod::Post, body) => self
                .agent
                .post(url)
                .config()
                .timeout_global(timeout)
                .build()
                .header("Content-Type", "application/json")
                .send(body.cloned().unwrap_or_default()),
            (HttpMethod::Put, body) => self
                .agent
                .put(url)
                .config()
                .timeout_global(timeout)
                .build()
                .header("Content-Type", "application/json")
                .send(body.cloned().unwrap_or_default()),
        };

        let mut response = result.map_err(|e| map_ureq_error(url, e))?;
        let status = response.status().as_u16();
        let body = response
            .body_mut()
            .read_to_string()
            .map_err(|e| map_ureq_error(url, e))?;
        debug!(method = %request.method, status, "Registry transport exchange");
        Ok(HttpResponse { status, body })
    }

    fn apply_route(&mut self, route: &Route) -> Result<(), TransportError> {
        let proxy = match &route.proxy {
            Some(uri) => Some(ureq::Proxy::new(uri).map_err(|e| TransportError::InvalidProxy {
                proxy: uri.clone(),
                message: e.to_string(),
            })?),
            None => None,
        };
        self.agent = build_agent(route, proxy);
        self.route = route.clone();
        Ok(())
    }
}
