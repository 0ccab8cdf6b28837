//! Error types for the request pipeline.
//!
//! # Design
//! `RequestError` is the failure half of every classified outcome and is
//! always delivered as a value, never raised. Transport-level causes are kept
//! apart in `TransportError` so callers can tell "the server said no" from
//! "we never got an answer". Codec errors are opaque boxes because the codec
//! is injected.

use std::error::Error as StdError;

use bytes::Bytes;

type BoxError = Box<dyn StdError + Send + Sync>;

/// Terminal failure of a request.
#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    /// The exchange never produced an HTTP response.
    #[error("service error: {0}")]
    Service(#[source] TransportError),

    /// The server answered with a status in 300..=599.
    #[error("http error: status {0}")]
    Http(u16),

    /// A payload arrived but did not match the expected shape.
    #[error("could not decode {len} byte payload: {source}", len = .data.len())]
    Decoding {
        #[source]
        source: DecodeError,
        data: Bytes,
    },

    /// A payload was expected but none arrived.
    #[error("response carried no payload")]
    EmptyData,
}

/// Why the transport failed to deliver a response.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error("tls setup failed: {0}")]
    Tls(#[from] TlsError),

    #[error("request body could not be encoded: {0}")]
    Encode(#[from] EncodeError),

    #[error(transparent)]
    Other(BoxError),
}

impl TransportError {
    /// Wrap an arbitrary cause, e.g. one injected through a mocked response.
    pub fn other(error: impl Into<BoxError>) -> Self {
        TransportError::Other(error.into())
    }
}

/// Failure of the injected encode capability.
#[derive(Debug, thiserror::Error)]
#[error(transparent)]
pub struct EncodeError(BoxError);

impl EncodeError {
    pub fn new(error: impl Into<BoxError>) -> Self {
        Self(error.into())
    }
}

impl From<serde_json::Error> for EncodeError {
    fn from(error: serde_json::Error) -> Self {
        Self::new(error)
    }
}

/// Failure of the injected decode capability.
#[derive(Debug, thiserror::Error)]
#[error(transparent)]
pub struct DecodeError(BoxError);

impl DecodeError {
    pub fn new(error: impl Into<BoxError>) -> Self {
        Self(error.into())
    }
}

impl From<serde_json::Error> for DecodeError {
    fn from(error: serde_json::Error) -> Self {
        Self::new(error)
    }
}

/// Failure while turning a trust policy into a TLS client configuration.
#[derive(Debug, thiserror::Error)]
pub enum TlsError {
    #[error(transparent)]
    Rustls(#[from] rustls::Error),

    #[error("server verifier: {0}")]
    Verifier(#[from] rustls::client::VerifierBuilderError),
}

/// Failure while assembling a `Configuration`.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid base url: {0}")]
    InvalidBaseUrl(#[from] url::ParseError),

    #[error("base url cannot carry path segments: {0}")]
    CannotBeABase(String),

    #[error("failed to start execution context: {0}")]
    Runtime(#[from] std::io::Error),
}
