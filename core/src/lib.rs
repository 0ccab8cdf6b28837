//! Typed HTTP request construction, execution and response classification.
//!
//! # Overview
//! A `Configuration` holds what every request shares: base URL, codec,
//! response-code actions, default timeout and the two execution contexts.
//! A `RequestBuilder` accumulates one request at a time and `build` turns it
//! into a single-use `Request`, which is sent with `start` and reports exactly
//! one `Outcome`.
//!
//! # Design
//! - Network work runs on a tokio worker runtime. Completions and actions run
//!   on a separate delivery context (`DeliveryQueue`), one at a time.
//! - Every request opens its own reqwest session carrying its TLS policy and
//!   drops it when the exchange ends.
//! - Classification (`classify`) is a pure function of the transport outcome,
//!   so it is tested without any I/O.
//! - Certificate pinning and client identities are plugged in through the
//!   `CertificatesProvider` and `IdentityProvider` traits.

pub mod actions;
pub mod builder;
pub mod classify;
pub mod codec;
pub mod delivery;
pub mod error;
pub mod http;
pub mod request;
pub mod tls;
pub mod transport;
pub mod types;

pub use actions::{Action, ActionTable, ResponseCode};
pub use builder::{Configuration, ConfigurationBuilder, RequestBuilder};
pub use classify::{classify, ExpectedShape, Expectation, Outcome, TransportOutcome};
pub use codec::{Codec, JsonCodec};
pub use delivery::{DeliveryQueue, Mailbox};
pub use error::{ConfigError, DecodeError, EncodeError, RequestError, TlsError, TransportError};
pub use http::{ContentType, HttpMethod, HttpRequest, HttpResponse};
pub use request::Request;
pub use tls::{CertificatesProvider, Challenge, ClientIdentity, Disposition, IdentityProvider, TrustPolicy};
pub use transport::{DataTask, MockResponse};
pub use types::{NoApiError, NoContent};
