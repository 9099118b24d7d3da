//! Fakes shared by the unit tests.

use std::error::Error;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;
use std::time::Instant;

use serde_json::Value;
use url::Url;

use crate::case::Method;
use crate::case::TestCase;
use crate::client::ClientError;
use crate::client::HttpClient;
use crate::client::error_chain;
use crate::clock::Clock;
use crate::outputter::Reporter;
use crate::outputter::render_failure;
use crate::runner::RunError;
use crate::runner::RunSummary;
use crate::setup::CleanupError;

pub fn base_url() -> Url {
    Url::parse("http://localhost:7777").unwrap()
}

pub fn test_case(
    name: &str,
    method: &str,
    path: &str,
    data: Option<Value>,
    wait: Option<f64>,
    response: Value,
) -> TestCase {
    TestCase {
        name: name.into(),
        method: method.into(),
        path: path.into(),
        data,
        wait,
        response,
    }
}

/// Serves `app` on an ephemeral local port and returns its base URL.
pub async fn spawn_server(app: axum::Router) -> Url {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    Url::parse(&format!("http://{addr}")).unwrap()
}

/// A local URL nothing listens on.
pub async fn closed_port_url() -> Url {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    Url::parse(&format!("http://{addr}")).unwrap()
}

/// A local URL that accepts connections but never answers.
pub async fn silent_server_url() -> Url {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let mut held = vec![];
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });

    Url::parse(&format!("http://{addr}")).unwrap()
}

/// Virtual time: `sleep` advances the clock instantly.
pub struct ManualClock {
    origin: Instant,
    elapsed: Mutex<Duration>,
    sleeps: Mutex<Vec<Duration>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            elapsed: Mutex::new(Duration::ZERO),
            sleeps: Mutex::new(vec![]),
        }
    }

    pub fn elapsed(&self) -> Duration {
        *self.elapsed.lock().unwrap()
    }

    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().unwrap().clone()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + self.elapsed()
    }

    async fn sleep(&self, duration: Duration) {
        *self.elapsed.lock().unwrap() += duration;
        self.sleeps.lock().unwrap().push(duration);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRequest {
    pub method: Method,
    pub url: Url,
    pub body: Option<Value>,
    /// Virtual time of dispatch, when a clock is attached.
    pub at: Option<Duration>,
}

type Responder = Box<dyn Fn(&RecordedRequest) -> Result<Value, ClientError>>;

/// Records every request and answers through a scripted responder.
pub struct FakeClient {
    responder: Responder,
    refusals: u32,
    probes: Mutex<u32>,
    probe_timeouts: Mutex<Vec<Duration>>,
    requests: Mutex<Vec<RecordedRequest>>,
    clock: Option<Arc<ManualClock>>,
}

impl FakeClient {
    pub fn new(
        responder: impl Fn(&RecordedRequest) -> Result<Value, ClientError> + 'static,
    ) -> Self {
        Self {
            responder: Box::new(responder),
            refusals: 0,
            probes: Mutex::new(0),
            probe_timeouts: Mutex::new(vec![]),
            requests: Mutex::new(vec![]),
            clock: None,
        }
    }

    pub fn replying(value: Value) -> Self {
        Self::new(move |_| Ok(value.clone()))
    }

    /// Refuse the first `n` probes.
    pub fn refusing(mut self, n: u32) -> Self {
        self.refusals = n;
        self
    }

    pub fn with_clock(mut self, clock: Arc<ManualClock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn probes(&self) -> u32 {
        *self.probes.lock().unwrap()
    }

    /// The timeout each probe was given, in order.
    pub fn probe_timeouts(&self) -> Vec<Duration> {
        self.probe_timeouts.lock().unwrap().clone()
    }

    fn record(&self, method: Method, url: Url, body: Option<Value>) -> Result<Value, ClientError> {
        let request = RecordedRequest {
            method,
            url,
            body,
            at: self.clock.as_ref().map(|clock| clock.elapsed()),
        };
        let response = (self.responder)(&request);
        self.requests.lock().unwrap().push(request);

        response
    }
}

impl HttpClient for FakeClient {
    async fn get(&self, url: Url) -> Result<Value, ClientError> {
        self.record(Method::Get, url, None)
    }

    async fn post(&self, url: Url, body: Value) -> Result<Value, ClientError> {
        self.record(Method::Post, url, Some(body))
    }

    async fn delete(&self, url: Url, body: Option<Value>) -> Result<Value, ClientError> {
        self.record(Method::Delete, url, body)
    }

    async fn probe(&self, url: &Url, timeout: Duration) -> Result<(), ClientError> {
        self.probe_timeouts.lock().unwrap().push(timeout);

        let mut probes = self.probes.lock().unwrap();
        *probes += 1;

        if *probes <= self.refusals {
            return Err(ClientError::Transport {
                url: url.clone(),
                message: "Connection refused (os error 111)".into(),
            });
        }

        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Loaded(usize),
    Waiting(u32),
    Testing(String),
    Passed(String),
    Failed(String),
    StartUpFailed(String),
    CleanupFailed(String),
    Finished(usize),
}

#[derive(Debug, Default)]
pub struct RecordingReporter {
    events: Mutex<Vec<Event>>,
}

impl RecordingReporter {
    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    pub fn count(&self, predicate: impl Fn(&Event) -> bool) -> usize {
        self.events().iter().filter(|event| predicate(event)).count()
    }

    fn push(&self, event: Event) {
        self.events.lock().unwrap().push(event);
    }
}

impl Reporter for RecordingReporter {
    fn loaded(&self, _path: &str, n_tests: usize) {
        self.push(Event::Loaded(n_tests));
    }

    fn waiting(&self, _url: &Url, attempt: u32) {
        self.push(Event::Waiting(attempt));
    }

    fn testing(&self, name: &str) {
        self.push(Event::Testing(name.into()));
    }

    fn passed(&self, name: &str) {
        self.push(Event::Passed(name.into()));
    }

    fn failed(&self, error: &RunError) {
        self.push(Event::Failed(render_failure(error)));
    }

    fn start_up_failed(&self, error: &dyn Error) {
        self.push(Event::StartUpFailed(error_chain(error)));
    }

    fn cleanup_failed(&self, error: &CleanupError) {
        self.push(Event::CleanupFailed(error_chain(error)));
    }

    fn finished(&self, summary: &RunSummary) {
        self.push(Event::Finished(summary.passed));
    }
}
