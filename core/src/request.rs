//! A built, single-use request.
//!
//! `start` wires the pieces together. The transport task runs on the worker
//! runtime, and its raw outcome is classified there, so decoding stays off the
//! delivery context. Response-code actions are then queued on the delivery
//! context, followed by the caller's completion.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use tokio::runtime::Handle;

use crate::actions::ActionTable;
use crate::classify::{self, Expectation, Outcome};
use crate::codec::{Codec, JsonCodec};
use crate::delivery::DeliveryQueue;
use crate::http::HttpRequest;
use crate::transport::DataTask;
use crate::types::NoApiError;

pub struct Request<T, E = NoApiError, C = JsonCodec> {
    task: Box<dyn DataTask>,
    expectation: Expectation,
    codec: Arc<C>,
    actions: Arc<ActionTable>,
    runtime: Handle,
    delivery: DeliveryQueue,
    _marker: PhantomData<fn() -> (T, E)>,
}

impl<T, E, C> Request<T, E, C> {
    /// The outgoing request, or `None` for a mocked one.
    pub fn descriptor(&self) -> Option<&HttpRequest> {
        self.task.descriptor()
    }

    pub fn has_deferred_body(&self) -> bool {
        self.task.has_deferred_body()
    }

    pub fn expectation(&self) -> Expectation {
        self.expectation
    }
}

impl<T, E, C> Request<T, E, C>
where
    T: DeserializeOwned + Send + 'static,
    E: DeserializeOwned + Send + 'static,
    C: Codec,
{
    pub(crate) fn new(
        task: Box<dyn DataTask>,
        expectation: Expectation,
        codec: Arc<C>,
        actions: Arc<ActionTable>,
        runtime: Handle,
        delivery: DeliveryQueue,
    ) -> Self {
        Self {
            task,
            expectation,
            codec,
            actions,
            runtime,
            delivery,
            _marker: PhantomData,
        }
    }

    /// Also try `A` when the payload does not decode as the success type.
    pub fn with_api_error<A>(self) -> Request<T, A, C>
    where
        A: DeserializeOwned + Send + 'static,
    {
        Request {
            task: self.task,
            expectation: Expectation {
                api_error: true,
                ..self.expectation
            },
            codec: self.codec,
            actions: self.actions,
            runtime: self.runtime,
            delivery: self.delivery,
            _marker: PhantomData,
        }
    }

    /// Send the request. `completion` runs exactly once, on the delivery
    /// context, never before this call returns.
    pub fn start<F>(self, completion: F)
    where
        F: FnOnce(Outcome<T, E>) + Send + 'static,
    {
        let Request {
            task,
            expectation,
            codec,
            actions,
            runtime,
            delivery,
            ..
        } = self;

        task.start(
            &runtime,
            Box::new(move |outcome| {
                let result = classify::classify::<T, E, C>(outcome, expectation, &*codec, |status| {
                    actions.fire(status, &delivery);
                });
                tracing::trace!(outcome = outcome_kind(&result), "request classified");
                delivery.dispatch(move || completion(result));
            }),
        );
    }
}

fn outcome_kind<T, E>(outcome: &Outcome<T, E>) -> &'static str {
    match outcome {
        Outcome::Ok(_) => "ok",
        Outcome::ApiError(_) => "api_error",
        Outcome::Failure(_) => "failure",
    }
}

impl<T, E, C> fmt::Debug for Request<T, E, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("descriptor", &self.task.descriptor())
            .field("expectation", &self.expectation)
            .finish_non_exhaustive()
    }
}
