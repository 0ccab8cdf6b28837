//! Request configuration and the request builder.
//!
//! # Design
//! `RequestBuilder` accumulates one request's worth of state in a private
//! `BuildInfo`. `build` moves that state out with `mem::replace`, leaving a
//! fresh baseline with the configured applications re-applied. A built
//! `Request` owns everything it needs and shares nothing mutable with the
//! builder.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::runtime::Handle;
use url::Url;

use crate::actions::ActionTable;
use crate::classify::{ExpectedShape, Expectation};
use crate::codec::{self, Codec, JsonCodec};
use crate::delivery::DeliveryQueue;
use crate::error::ConfigError;
use crate::http::{ContentType, HttpMethod, HttpRequest};
use crate::request::Request;
use crate::tls::{CertificatesProvider, IdentityProvider, TrustPolicy};
use crate::transport::{self, DataTask, EncodeAction, MockResponse, MockedTask, NetworkTask};
use crate::types::{NoApiError, NoContent};

const AUTHORIZATION: &str = "Authorization";
const CONTENT_TYPE: &str = "Content-Type";

/// Hook applied to every fresh builder baseline.
pub type Application<C> = Arc<dyn Fn(&mut RequestBuilder<C>) + Send + Sync>;

/// Settings shared by every request made through one builder.
pub struct Configuration<C = JsonCodec> {
    base_url: Url,
    codec: Arc<C>,
    actions: Arc<ActionTable>,
    applications: Vec<Application<C>>,
    timeout: Option<Duration>,
    runtime: Handle,
    delivery: DeliveryQueue,
}

impl Configuration {
    pub fn builder(base_url: &str) -> ConfigurationBuilder<JsonCodec> {
        ConfigurationBuilder {
            base_url: base_url.to_string(),
            codec: JsonCodec,
            actions: ActionTable::new(),
            applications: Vec::new(),
            timeout: None,
            runtime: None,
            delivery: None,
        }
    }
}

impl<C> Configuration<C> {
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn delivery(&self) -> &DeliveryQueue {
        &self.delivery
    }
}

impl<C> fmt::Debug for Configuration<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Configuration")
            .field("base_url", &self.base_url.as_str())
            .field("actions", &self.actions)
            .field("applications", &self.applications.len())
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

pub struct ConfigurationBuilder<C> {
    base_url: String,
    codec: C,
    actions: ActionTable,
    applications: Vec<Application<C>>,
    timeout: Option<Duration>,
    runtime: Option<Handle>,
    delivery: Option<DeliveryQueue>,
}

impl<C: Codec> ConfigurationBuilder<C> {
    /// Swap the codec. Applications registered so far are dropped.
    pub fn codec<D: Codec>(self, codec: D) -> ConfigurationBuilder<D> {
        ConfigurationBuilder {
            base_url: self.base_url,
            codec,
            actions: self.actions,
            applications: Vec::new(),
            timeout: self.timeout,
            runtime: self.runtime,
            delivery: self.delivery,
        }
    }

    pub fn actions(mut self, actions: ActionTable) -> Self {
        self.actions = actions;
        self
    }

    pub fn application(mut self, application: impl Fn(&mut RequestBuilder<C>) + Send + Sync + 'static) -> Self {
        self.applications.push(Arc::new(application));
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Run network calls on this runtime instead of the shared worker runtime.
    pub fn runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    /// Deliver results and actions here instead of a dedicated thread.
    pub fn delivery(mut self, delivery: DeliveryQueue) -> Self {
        self.delivery = Some(delivery);
        self
    }

    pub fn build(self) -> Result<Configuration<C>, ConfigError> {
        let base_url = Url::parse(&self.base_url)?;
        if base_url.cannot_be_a_base() {
            return Err(ConfigError::CannotBeABase(self.base_url));
        }
        let runtime = match self.runtime {
            Some(runtime) => runtime,
            None => transport::shared_runtime()?,
        };
        let delivery = match self.delivery {
            Some(delivery) => delivery,
            None => DeliveryQueue::spawn("wirecall-delivery")?,
        };
        Ok(Configuration {
            base_url,
            codec: Arc::new(self.codec),
            actions: Arc::new(self.actions),
            applications: self.applications,
            timeout: self.timeout,
            runtime,
            delivery,
        })
    }
}

struct BuildInfo {
    url: Url,
    method: HttpMethod,
    headers: BTreeMap<String, String>,
    body: Option<Bytes>,
    encode: Option<EncodeAction>,
    mock: Option<MockResponse>,
    trust: TrustPolicy,
    timeout: Option<Duration>,
}

impl BuildInfo {
    fn new(base_url: &Url, timeout: Option<Duration>) -> Self {
        Self {
            url: base_url.clone(),
            method: HttpMethod::default(),
            headers: BTreeMap::new(),
            body: None,
            encode: None,
            mock: None,
            trust: TrustPolicy::default(),
            timeout,
        }
    }
}

/// Fluent, reusable request builder.
pub struct RequestBuilder<C = JsonCodec> {
    config: Arc<Configuration<C>>,
    info: BuildInfo,
}

impl<C: Codec> RequestBuilder<C> {
    pub fn new(config: Configuration<C>) -> Self {
        let info = BuildInfo::new(&config.base_url, config.timeout);
        let config = Arc::new(config);
        let mut builder = Self { config, info };
        builder.apply_applications();
        builder
    }

    pub fn configuration(&self) -> &Configuration<C> {
        &self.config
    }

    pub fn method(&mut self, method: HttpMethod) -> &mut Self {
        self.info.method = method;
        self
    }

    /// Append `path` to the URL, one segment per `/`-separated part.
    pub fn path(&mut self, path: &str) -> &mut Self {
        if let Ok(mut segments) = self.info.url.path_segments_mut() {
            segments
                .pop_if_empty()
                .extend(path.split('/').filter(|segment| !segment.is_empty()));
        }
        self
    }

    /// Set a header. Names are case-insensitive and stored lower-cased.
    pub fn header(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.info.headers.insert(header_key(name), value.into());
        self
    }

    /// Merge `headers` into the request; later values replace earlier ones.
    pub fn headers<K, V>(&mut self, headers: impl IntoIterator<Item = (K, V)>) -> &mut Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.info
            .headers
            .extend(headers.into_iter().map(|(k, v)| (header_key(k), v.into())));
        self
    }

    pub fn content_type(&mut self, content_type: ContentType) -> &mut Self {
        self.header(CONTENT_TYPE, content_type.as_str())
    }

    pub fn basic_auth(&mut self, login: &str, pass: &str) -> &mut Self {
        let credentials = STANDARD.encode(format!("{login}:{pass}"));
        self.header(AUTHORIZATION, format!("Basic {credentials}"))
    }

    pub fn bearer_auth(&mut self, token: &str) -> &mut Self {
        self.header(AUTHORIZATION, format!("Bearer {token}"))
    }

    pub fn oauth(&mut self, token: &str) -> &mut Self {
        self.header(AUTHORIZATION, format!("OAuth {token}"))
    }

    pub fn identity(&mut self, provider: Arc<dyn IdentityProvider>) -> &mut Self {
        self.info.trust = std::mem::take(&mut self.info.trust).with_identity(provider);
        self
    }

    pub fn ssl_pin(&mut self, provider: Arc<dyn CertificatesProvider>) -> &mut Self {
        self.info.trust = std::mem::take(&mut self.info.trust).with_pinned(provider);
        self
    }

    pub fn timeout(&mut self, timeout: Duration) -> &mut Self {
        self.info.timeout = Some(timeout);
        self
    }

    /// Encode `value` with the configured codec right before sending.
    pub fn encode<Q>(&mut self, value: Q) -> &mut Self
    where
        Q: Serialize + Send + 'static,
    {
        let codec = Arc::clone(&self.config.codec);
        self.info.encode = Some(Box::new(move || codec.encode(&value)));
        self
    }

    /// Use the flattened fields of `value` as a form-urlencoded body.
    pub fn form_encode<Q: Serialize + ?Sized>(&mut self, value: &Q) -> &mut Self {
        match codec::form_encode(value) {
            Some(form) => self.info.body = Some(Bytes::from(form)),
            None => tracing::warn!("form body is not an object, leaving body unset"),
        }
        self.content_type(ContentType::Form)
    }

    /// Replace the URL query with the flattened fields of `value`.
    pub fn url_encode<Q: Serialize + ?Sized>(&mut self, value: &Q) -> &mut Self {
        match codec::query_pairs(value) {
            Some(pairs) if pairs.is_empty() => self.info.url.set_query(None),
            Some(pairs) => {
                self.info.url.query_pairs_mut().clear().extend_pairs(pairs);
            }
            None => tracing::warn!("query is not an object, leaving url unchanged"),
        }
        self
    }

    pub fn mock_response(&mut self, response: MockResponse) -> &mut Self {
        self.info.mock = Some(response);
        self
    }

    /// Drop everything accumulated so far and re-apply the applications.
    pub fn reset(&mut self) -> &mut Self {
        self.info = BuildInfo::new(&self.config.base_url, self.config.timeout);
        self.apply_applications();
        self
    }

    pub fn build<T>(&mut self) -> Request<T, NoApiError, C>
    where
        T: DeserializeOwned + Send + 'static,
    {
        self.finish(ExpectedShape::Typed)
    }

    /// Build a request whose success carries no payload.
    pub fn build_no_content(&mut self) -> Request<NoContent, NoApiError, C> {
        self.finish(ExpectedShape::NoContent)
    }

    fn finish<T>(&mut self, shape: ExpectedShape) -> Request<T, NoApiError, C>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let baseline = BuildInfo::new(&self.config.base_url, self.config.timeout);
        let info = std::mem::replace(&mut self.info, baseline);
        self.apply_applications();

        let task: Box<dyn DataTask> = match info.mock {
            Some(mock) => Box::new(MockedTask::new(mock)),
            None => {
                let mut url = info.url;
                if let Ok(mut segments) = url.path_segments_mut() {
                    segments.pop_if_empty().push("");
                }
                let request = HttpRequest {
                    method: info.method,
                    url,
                    headers: info.headers,
                    body: info.body,
                };
                Box::new(NetworkTask::new(request, info.encode, info.trust, info.timeout))
            }
        };

        let config = &self.config;
        Request::new(
            task,
            Expectation {
                shape,
                api_error: false,
            },
            Arc::clone(&config.codec),
            Arc::clone(&config.actions),
            config.runtime.clone(),
            config.delivery.clone(),
        )
    }

    fn apply_applications(&mut self) {
        let config = Arc::clone(&self.config);
        for application in &config.applications {
            application(self);
        }
    }
}

fn header_key(name: impl Into<String>) -> String {
    let mut name = name.into();
    name.make_ascii_lowercase();
    name
}

impl<C> fmt::Debug for RequestBuilder<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestBuilder")
            .field("url", &self.info.url.as_str())
            .field("method", &self.info.method)
            .field("headers", &self.info.headers)
            .finish_non_exhaustive()
    }
}
