//! Scripted transport and clock for tests.
//!
//! `MockTransport` answers by HTTP method and URL path (scheme, host and
//! query string are ignored), records every request it sees, and records
//! every route the client applies. Handles are cheap clones sharing state,
//! so a test can keep one while the client owns another.

use super::retry::Clock;
use super::transport::{HttpMethod, HttpRequest, HttpResponse, Route, Transport};
use crate::errors::TransportError;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

type Reply = Result<HttpResponse, TransportError>;

#[derive(Debug)]
struct Rule {
    method: HttpMethod,
    path: String,
    /// Replies served in order; the last one repeats.
    replies: VecDeque<Reply>,
}

#[derive(Debug, Default)]
struct MockState {
    rules: Vec<Rule>,
    requests: Vec<HttpRequest>,
    routes: Vec<Route>,
    route: Route,
}

#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        // A panicking test thread must not cascade into unrelated assertions.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn push_rule(&self, method: HttpMethod, path: &str, replies: Vec<Reply>) {
        let mut state = self.lock();
        state.rules.retain(|r| !(r.method == method && r.path == path));
        state.rules.push(Rule {
            method,
            path: path.to_string(),
            replies: replies.into(),
        });
    }

    /// Always answer `method path` with `status` and `body`.
    pub fn respond(&self, method: HttpMethod, path: &str, status: u16, body: &str) {
        self.push_rule(method, path, vec![Ok(HttpResponse::new(status, body))]);
    }

    /// Answer successive requests with the given replies; the last repeats.
    pub fn respond_sequence(&self, method: HttpMethod, path: &str, replies: Vec<(u16, &str)>) {
        let replies = replies
            .into_iter()
            .map(|(status, body)| Ok(HttpResponse::new(status, body)))
            .collect();
        self.push_rule(method, path, replies);
    }

    /// Fail every `method path` request without a response.
    pub fn fail(&self, method: HttpMethod, path: &str, error: TransportError) {
        self.push_rule(method, path, vec![Err(error)]);
    }

    /// Every request sent so far, in order.
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.lock().requests.clone()
    }

    /// Requests sent to `path`, in order.
    pub fn requests_to(&self, path: &str) -> Vec<HttpRequest> {
        self.lock()
            .requests
            .iter()
            .filter(|r| url_path(&r.url) == path)
            .cloned()
            .collect()
    }

    /// Every route applied so far, in order.
    pub fn applied_routes(&self) -> Vec<Route> {
        self.lock().routes.clone()
    }

    pub fn current_route(&self) -> Route {
        self.lock().route.clone()
    }
}

impl Transport for MockTransport {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        let mut state = self.lock();
        state.requests.push(request.clone());
        let path = url_path(&request.url);
        let rule = state
            .rules
            .iter_mut()
            .find(|r| r.method == request.method && r.path == path);
        match rule {
            Some(rule) if rule.replies.len() > 1 => rule
                .replies
                .pop_front()
                .unwrap_or_else(|| Ok(HttpResponse::new(404, ""))),
            Some(rule) => rule
                .replies
                .front()
                .cloned()
                .unwrap_or_else(|| Ok(HttpResponse::new(404, ""))),
            None => Ok(HttpResponse::new(404, "")),
        }
    }

    fn apply_route(&mut self, route: &Route) -> Result<(), TransportError> {
        let mut state = self.lock();
        state.routes.push(route.clone());
        state.route = route.clone();
        Ok(())
    }
}

/// Path component of `url`, without scheme, host or query.
pub fn url_path(url: &str) -> String {
    let without_scheme = url.split_once("://").map_or(url, |(_, rest)| rest);
    let path = without_scheme
        .find('/')
        .map_or("/", |idx| &without_scheme[idx..]);
    let path = path.split(['?', '#']).next().unwrap_or(path);
    if path.is_empty() {
        "/".to_string()
    } else {
        path.to_string()
    }
}

/// Clock whose sleeps advance virtual time instantly.
#[derive(Debug, Clone, Default)]
pub struct FakeClock {
    elapsed_nanos: Arc<AtomicU64>,
    sleeps: Arc<AtomicUsize>,
}

impl FakeClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `sleep` calls so far.
    pub fn sleeps(&self) -> usize {
        self.sleeps.load(Ordering::SeqCst)
    }

    /// Advance time without counting a sleep (simulates slow requests).
    pub fn advance(&self, duration: Duration) {
        self.elapsed_nanos
            .fetch_add(duration.as_nanos() as u64, Ordering::SeqCst);
    }
}

impl Clock for FakeClock {
    fn elapsed(&self) -> Duration {
        Duration::from_nanos(self.elapsed_nanos.load(Ordering::SeqCst))
    }

    fn sleep(&self, duration: Duration) {
        self.sleeps.fetch_add(1, Ordering::SeqCst);
        self.advance(duration);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_path_strips_host_and_query() {
        assert_eq!(url_path("https://r.io/api/load?api_key=x"), "/api/load");
        assert_eq!(url_path("https://api.ipify.org?format=json"), "/");
        assert_eq!(url_path("/api/reporter/1/testrun"), "/api/reporter/1/testrun");
    }

    #[test]
    fn sequence_repeats_last_reply() {
        let transport = MockTransport::new();
        transport.respond_sequence(HttpMethod::Get, "/x", vec![(503, ""), (200, "ok")]);
        let statuses: Vec<u16> = (0..3)
            .map(|_| transport.send(&HttpRequest::get("https://h/x")).unwrap().status)
            .collect();
        assert_eq!(statuses, vec![503, 200, 200]);
    }

    #[test]
    fn unscripted_requests_get_404() {
        let transport = MockTransport::new();
        let response = transport.send(&HttpRequest::get("https://h/unknown")).unwrap();
        assert_eq!(response.status, 404);
        assert_eq!(transport.requests().len(), 1);
    }

    #[test]
    fn fake_clock_counts_sleeps() {
        let clock = FakeClock::new();
        clock.sleep(Duration::from_secs(2));
        clock.advance(Duration::from_secs(1));
        assert_eq!(clock.sleeps(), 1);
        assert_eq!(clock.elapsed(), Duration::from_secs(3));
    }
}
