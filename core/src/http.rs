//! HTTP request types handed from the builder to the executor.
//!
//! # Design
//! `HttpRequest` describes one outgoing request as plain data. The builder
//! produces it by value on every `build()`, so an executor never observes the
//! builder's later mutations. Headers live in a `BTreeMap` keyed by the
//! lower-cased name, so two spellings of one header share an entry and the
//! last write wins. Iteration order is stable for tests and logs.

use std::collections::BTreeMap;
use std::fmt;

use bytes::Bytes;
use url::Url;

/// HTTP method for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
    Put,
    Delete,
    Patch,
    Head,
    Options,
    Trace,
    Connect,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Head => "HEAD",
            HttpMethod::Options => "OPTIONS",
            HttpMethod::Trace => "TRACE",
            HttpMethod::Connect => "CONNECT",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<HttpMethod> for reqwest::Method {
    fn from(method: HttpMethod) -> Self {
        match method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Delete => reqwest::Method::DELETE,
            HttpMethod::Patch => reqwest::Method::PATCH,
            HttpMethod::Head => reqwest::Method::HEAD,
            HttpMethod::Options => reqwest::Method::OPTIONS,
            HttpMethod::Trace => reqwest::Method::TRACE,
            HttpMethod::Connect => reqwest::Method::CONNECT,
        }
    }
}

/// MIME type placed in the `Content-Type` header.
///
/// Full registry: <https://www.iana.org/assignments/media-types/media-types.xhtml>
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentType {
    Json,
    Css,
    Csv,
    Html,
    Gif,
    Jpeg,
    Png,
    Pdf,
    Rar,
    Txt,
    Xml,
    Zip,
    Form,
    Custom(String),
}

impl ContentType {
    pub fn as_str(&self) -> &str {
        match self {
            ContentType::Json => "application/json",
            ContentType::Css => "text/css",
            ContentType::Csv => "text/csv",
            ContentType::Html => "text/html",
            ContentType::Gif => "image/gif",
            ContentType::Jpeg => "image/jpeg",
            ContentType::Png => "image/png",
            ContentType::Pdf => "application/pdf",
            ContentType::Rar => "application/vnd.rar",
            ContentType::Txt => "text/plain",
            ContentType::Xml => "application/xml",
            ContentType::Zip => "application/zip",
            ContentType::Form => "application/x-www-form-urlencoded",
            ContentType::Custom(value) => value,
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An HTTP request described as plain data.
///
/// Immutable once handed to an executor. A body produced by a deferred
/// encode is not stored here; the executor fills it in right before sending.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: Url,
    /// Lower-cased name to value.
    pub headers: BTreeMap<String, String>,
    pub body: Option<Bytes>,
}

impl HttpRequest {
    /// Look up a header by name, ignoring case.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }
}

/// Raw result of a completed HTTP exchange.
///
/// `status` is absent when no HTTP-level response exists, which only happens
/// for mocked responses without an explicit code.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: Option<u16>,
    pub body: Option<Bytes>,
}
