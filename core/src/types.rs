//! Marker types used as the success or API-error side of a request.
//!
//! # Design
//! `NoContent` stands for "the operation succeeded and there is nothing to
//! read". It accepts any well-formed payload and ignores it. Whether an empty
//! body is promoted to `{}` is decided by `ExpectedShape`, chosen when the
//! request is built, not by inspecting the type at runtime.
//!
//! `NoApiError` is the default API-error type. It is uninhabited, so a request
//! that never configured an API-error shape can never produce that variant.

use serde::de::{Deserialize, Deserializer, Error as _, IgnoredAny};

/// Success marker for endpoints that return no meaningful payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NoContent;

impl<'de> Deserialize<'de> for NoContent {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        IgnoredAny::deserialize(deserializer)?;
        Ok(NoContent)
    }
}

/// API-error type of a request that has none configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoApiError {}

impl<'de> Deserialize<'de> for NoApiError {
    fn deserialize<D: Deserializer<'de>>(_deserializer: D) -> Result<Self, D::Error> {
        Err(D::Error::custom("no api error shape configured"))
    }
}
