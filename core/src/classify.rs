//! Response classification.
//!
//! # Design
//! `classify` turns one `TransportOutcome` into exactly one `Outcome`. The
//! order of checks is fixed:
//!
//! 1. transport error → `Failure(Service)`
//! 2. effective status (absent → 200) is reported to `on_status`, which is how
//!    the action table hears about it whatever happens next
//! 3. status in 300..=599 → `Failure(Http)`
//! 4. absent payload → `Failure(EmptyData)`; a zero-length payload is *not*
//!    absent and goes on to decoding
//! 5. decode as the success type, then as the API-error type if one is
//!    configured, else `Failure(Decoding)` carrying the success-type error
//!
//! When both decodes fail, the error surfaced is the one from the success
//! type, because that is the shape the caller asked for.

use std::marker::PhantomData;

use bytes::Bytes;
use serde::de::DeserializeOwned;

use crate::codec::Codec;
use crate::error::{RequestError, TransportError};
use crate::http::HttpResponse;

const EMPTY_OBJECT: &[u8] = b"{}";

/// What the transport handed back for one request.
#[derive(Debug)]
pub enum TransportOutcome {
    Failed(TransportError),
    Completed(HttpResponse),
}

/// How the success payload is expected to look, fixed when the request is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExpectedShape {
    /// "Succeeded, nothing to read": an empty payload is read as `{}`.
    NoContent,
    #[default]
    Typed,
}

/// Decoding plan for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Expectation {
    pub shape: ExpectedShape,
    /// Whether to retry a failed decode as the API-error type.
    pub api_error: bool,
}

/// Classified result of a request.
#[derive(Debug)]
pub enum Outcome<T, E> {
    Ok(T),
    ApiError(E),
    Failure(RequestError),
}

impl<T, E> Outcome<T, E> {
    pub fn is_ok(&self) -> bool {
        matches!(self, Outcome::Ok(_))
    }

    pub fn ok(self) -> Option<T> {
        match self {
            Outcome::Ok(value) => Some(value),
            _ => None,
        }
    }

    pub fn api_error(self) -> Option<E> {
        match self {
            Outcome::ApiError(value) => Some(value),
            _ => None,
        }
    }

    pub fn failure(self) -> Option<RequestError> {
        match self {
            Outcome::Failure(error) => Some(error),
            _ => None,
        }
    }

    /// Collapse into nested results: transport, HTTP and decode failures
    /// outside, the API-error branch inside.
    pub fn into_result(self) -> Result<Result<T, E>, RequestError> {
        match self {
            Outcome::Ok(value) => Ok(Ok(value)),
            Outcome::ApiError(value) => Ok(Err(value)),
            Outcome::Failure(error) => Err(error),
        }
    }
}

/// Classify a transport outcome.
///
/// `on_status` is called once with the effective status code whenever the
/// transport produced a response, before any status or payload checks.
pub fn classify<T, E, C>(
    outcome: TransportOutcome,
    expectation: Expectation,
    codec: &C,
    on_status: impl FnOnce(u16),
) -> Outcome<T, E>
where
    T: DeserializeOwned,
    E: DeserializeOwned,
    C: Codec,
{
    let response = match outcome {
        TransportOutcome::Failed(error) => {
            return Outcome::Failure(RequestError::Service(error));
        }
        TransportOutcome::Completed(response) => response,
    };

    let status = response.status.unwrap_or(200);
    on_status(status);

    if (300..=599).contains(&status) {
        return Outcome::Failure(RequestError::Http(status));
    }

    let Some(data) = response.body else {
        return Outcome::Failure(RequestError::EmptyData);
    };

    Decoder {
        codec,
        expectation,
        _marker: PhantomData,
    }
    .decode(data)
}

struct Decoder<'a, T, E, C> {
    codec: &'a C,
    expectation: Expectation,
    _marker: PhantomData<fn() -> (T, E)>,
}

impl<T, E, C> Decoder<'_, T, E, C>
where
    T: DeserializeOwned,
    E: DeserializeOwned,
    C: Codec,
{
    fn decode(self, data: Bytes) -> Outcome<T, E> {
        let payload: &[u8] = match self.expectation.shape {
            ExpectedShape::NoContent if data.is_empty() => EMPTY_OBJECT,
            _ => &data,
        };

        let error = match self.codec.decode::<T>(payload) {
            Ok(value) => return Outcome::Ok(value),
            Err(error) => error,
        };

        if self.expectation.api_error {
            if let Ok(value) = self.codec.decode::<E>(payload) {
                return Outcome::ApiError(value);
            }
        }

        Outcome::Failure(RequestError::Decoding {
            source: error,
            data,
        })
    }
}
