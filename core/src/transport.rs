//! Transport executors.
//!
//! # Design
//! A `DataTask` performs exactly one exchange. `start` takes `Box<Self>`, so a
//! task cannot be started twice. The completion always runs on the worker
//! runtime, never before `start` returns.
//!
//! `NetworkTask` builds its own reqwest `Client` per request. That client is
//! the session: it carries the request's TLS policy and timeout, and it is
//! dropped (invalidated) as soon as its single request finishes, whatever the
//! result.

use std::fmt;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::OnceLock;
use std::time::Duration;

use bytes::Bytes;
use tokio::runtime::{Builder, Handle, Runtime};
use tracing::Instrument;
use uuid::Uuid;

use crate::classify::TransportOutcome;
use crate::delivery;
use crate::error::{EncodeError, TransportError};
use crate::http::{HttpRequest, HttpResponse};
use crate::tls::{self, TrustPolicy};

pub type Completion = Box<dyn FnOnce(TransportOutcome) + Send + 'static>;
pub type EncodeAction = Box<dyn FnOnce() -> Result<Vec<u8>, EncodeError> + Send + 'static>;

/// One single-use exchange with a server, real or mocked.
pub trait DataTask: Send {
    fn start(self: Box<Self>, runtime: &Handle, completion: Completion);

    /// The request this task will send, when there is one.
    fn descriptor(&self) -> Option<&HttpRequest> {
        None
    }

    /// Whether the body is produced by a deferred encode at send time.
    fn has_deferred_body(&self) -> bool {
        false
    }
}

/// Handle of the process-wide worker runtime, started on first use.
pub(crate) fn shared_runtime() -> io::Result<Handle> {
    static SHARED: OnceLock<Runtime> = OnceLock::new();

    if let Some(runtime) = SHARED.get() {
        return Ok(runtime.handle().clone());
    }
    let runtime = Builder::new_multi_thread()
        .thread_name("wirecall-worker")
        .enable_all()
        .build()?;
    if let Err(lost) = SHARED.set(runtime) {
        lost.shutdown_background();
    }
    SHARED
        .get()
        .map(|runtime| runtime.handle().clone())
        .ok_or_else(|| io::Error::other("worker runtime unavailable"))
}

pub struct NetworkTask {
    id: Uuid,
    request: HttpRequest,
    encode: Option<EncodeAction>,
    trust: TrustPolicy,
    timeout: Option<Duration>,
}

impl NetworkTask {
    pub fn new(
        request: HttpRequest,
        encode: Option<EncodeAction>,
        trust: TrustPolicy,
        timeout: Option<Duration>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            request,
            encode,
            trust,
            timeout,
        }
    }

    pub fn trust(&self) -> &TrustPolicy {
        &self.trust
    }

    async fn execute(self) -> TransportOutcome {
        match self.perform().await {
            Ok(response) => TransportOutcome::Completed(response),
            Err(error) => TransportOutcome::Failed(error),
        }
    }

    async fn perform(self) -> Result<HttpResponse, TransportError> {
        let NetworkTask {
            mut request,
            encode,
            trust,
            timeout,
            ..
        } = self;

        if let Some(encode) = encode {
            request.body = Some(Bytes::from(run_encode(encode)?));
        }

        let session = open_session(&trust, timeout)?;
        let mut outgoing = session.request(request.method.into(), request.url);
        for (name, value) in &request.headers {
            outgoing = outgoing.header(name.as_str(), value.as_str());
        }
        if let Some(body) = request.body {
            outgoing = outgoing.body(body);
        }

        tracing::debug!("sending request");
        let response = outgoing.send().await?;
        let status = response.status().as_u16();
        let body = response.bytes().await?;
        tracing::debug!(status, bytes = body.len(), "response received");

        drop(session);
        tracing::debug!("session closed");

        Ok(HttpResponse {
            status: Some(status),
            body: Some(body),
        })
    }
}

/// Run the deferred body encode. A panic in the caller's `Serialize` impl
/// becomes a transport error so the request still completes.
fn run_encode(encode: EncodeAction) -> Result<Vec<u8>, TransportError> {
    match panic::catch_unwind(AssertUnwindSafe(encode)) {
        Ok(result) => Ok(result?),
        Err(payload) => {
            let message = delivery::panic_message(&*payload).to_string();
            tracing::warn!(panic = %message, "request body encode panicked");
            Err(TransportError::other(format!("request body encode panicked: {message}")))
        }
    }
}

fn open_session(trust: &TrustPolicy, timeout: Option<Duration>) -> Result<reqwest::Client, TransportError> {
    let mut builder = reqwest::Client::builder().pool_max_idle_per_host(0);
    if let Some(timeout) = timeout {
        builder = builder.timeout(timeout);
    }
    if let Some(config) = tls::client_config(trust)? {
        builder = builder.use_preconfigured_tls(config);
    }
    Ok(builder.build()?)
}

impl DataTask for NetworkTask {
    fn start(self: Box<Self>, runtime: &Handle, completion: Completion) {
        let span = tracing::debug_span!(
            "request",
            id = %self.id,
            method = %self.request.method,
            url = %self.request.url,
        );
        let task = *self;
        runtime.spawn(
            async move {
                let outcome = task.execute().await;
                completion(outcome);
            }
            .instrument(span),
        );
    }

    fn descriptor(&self) -> Option<&HttpRequest> {
        Some(&self.request)
    }

    fn has_deferred_body(&self) -> bool {
        self.encode.is_some()
    }
}

impl fmt::Debug for NetworkTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NetworkTask")
            .field("id", &self.id)
            .field("request", &self.request)
            .field("deferred_body", &self.encode.is_some())
            .field("trust", &self.trust)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Canned transport result used instead of the network.
#[derive(Debug, Default)]
pub struct MockResponse {
    pub body: Option<Bytes>,
    pub status: Option<u16>,
    pub error: Option<TransportError>,
}

impl MockResponse {
    /// A response carrying `body` and no explicit status.
    pub fn body(body: impl Into<Bytes>) -> Self {
        Self {
            body: Some(body.into()),
            ..Self::default()
        }
    }

    /// A response with no payload at all.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn failure(error: TransportError) -> Self {
        Self {
            error: Some(error),
            ..Self::default()
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }
}

#[derive(Debug)]
pub struct MockedTask {
    response: MockResponse,
}

impl MockedTask {
    pub fn new(response: MockResponse) -> Self {
        Self { response }
    }
}

impl DataTask for MockedTask {
    fn start(self: Box<Self>, runtime: &Handle, completion: Completion) {
        let MockResponse { body, status, error } = self.response;
        let outcome = match error {
            Some(error) => TransportOutcome::Failed(error),
            None => TransportOutcome::Completed(HttpResponse { status, body }),
        };
        runtime.spawn(async move { completion(outcome) });
    }
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc;

    use super::*;

    fn await_outcome(task: Box<dyn DataTask>) -> TransportOutcome {
        let runtime = shared_runtime().unwrap();
        let (tx, rx) = mpsc::channel();
        task.start(&runtime, Box::new(move |outcome| tx.send(outcome).unwrap()));
        rx.recv_timeout(Duration::from_secs(2)).unwrap()
    }

    #[test]
    fn mocked_body_completes_without_status() {
        let outcome = await_outcome(Box::new(MockedTask::new(MockResponse::body("{}"))));
        match outcome {
            TransportOutcome::Completed(response) => {
                assert_eq!(response.status, None);
                assert_eq!(response.body.as_deref(), Some(&b"{}"[..]));
            }
            other => panic!("expected completion, got {other:?}"),
        }
    }

    #[test]
    fn mocked_error_wins_over_body() {
        let mock = MockResponse {
            body: Some(Bytes::from_static(b"{}")),
            status: Some(200),
            error: Some(TransportError::other("down")),
        };
        let outcome = await_outcome(Box::new(MockedTask::new(mock)));
        assert!(matches!(outcome, TransportOutcome::Failed(_)));
    }

    #[test]
    fn completion_runs_off_the_calling_thread() {
        let runtime = shared_runtime().unwrap();
        let caller = std::thread::current().id();
        let (tx, rx) = mpsc::channel();
        Box::new(MockedTask::new(MockResponse::empty())).start(
            &runtime,
            Box::new(move |_| tx.send(std::thread::current().id()).unwrap()),
        );
        let completed_on = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_ne!(completed_on, caller);
    }

    #[test]
    fn failed_deferred_encode_is_a_transport_error() {
        let request = HttpRequest {
            method: crate::http::HttpMethod::Post,
            url: "http://127.0.0.1:9/".parse().unwrap(),
            headers: Default::default(),
            body: None,
        };
        let encode: EncodeAction = Box::new(|| Err(EncodeError::new("unencodable")));
        let task = NetworkTask::new(request, Some(encode), TrustPolicy::new(), None);
        match await_outcome(Box::new(task)) {
            TransportOutcome::Failed(TransportError::Encode(error)) => {
                assert_eq!(error.to_string(), "unencodable");
            }
            other => panic!("expected encode failure, got {other:?}"),
        }
    }

    #[test]
    fn panicking_deferred_encode_still_completes() {
        let request = HttpRequest {
            method: crate::http::HttpMethod::Post,
            url: "http://127.0.0.1:9/".parse().unwrap(),
            headers: Default::default(),
            body: None,
        };
        let encode: EncodeAction = Box::new(|| -> Result<Vec<u8>, EncodeError> { panic!("serializer blew up") });
        let task = NetworkTask::new(request, Some(encode), TrustPolicy::new(), None);
        match await_outcome(Box::new(task)) {
            TransportOutcome::Failed(TransportError::Other(error)) => {
                assert!(error.to_string().contains("serializer blew up"), "{error}");
            }
            other => panic!("expected encode panic to fail the request, got {other:?}"),
        }
    }

    #[test]
    fn network_task_exposes_descriptor() {
        let request = HttpRequest {
            method: crate::http::HttpMethod::Get,
            url: "https://example.test/".parse().unwrap(),
            headers: Default::default(),
            body: None,
        };
        let task = NetworkTask::new(request, None, TrustPolicy::new(), None);
        assert!(!task.has_deferred_body());
        assert_eq!(task.descriptor().unwrap().url.as_str(), "https://example.test/");
    }
}
