//! TLS trust policy: certificate pinning and client identity.
//!
//! # Design
//! The decision logic is the pure function `TrustPolicy::handle`, which maps
//! a handshake `Challenge` to a `Disposition`. Two small rustls adapters feed
//! it:
//!
//! - `PinningVerifier` runs the platform (webpki) evaluation first, then asks
//!   the policy whether the evaluated chain may be used.
//! - `IdentityResolver` asks the policy for a client identity every time the
//!   server requests one.
//!
//! A chain that exposes no leaf at index 0 counts as matching the pins (see
//! `leaf_matches`). rustls always supplies an end-entity certificate, so this
//! only matters to direct callers of `handle`.

use std::fmt;
use std::sync::Arc;

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::client::{ResolvesClientCert, WebPkiServerVerifier};
use rustls::crypto::CryptoProvider;
use rustls::pki_types::{CertificateDer, PrivateKeyDer, ServerName, UnixTime};
use rustls::sign::CertifiedKey;
use rustls::{CertificateError, ClientConfig, DigitallySignedStruct, RootCertStore, SignatureScheme};

use crate::error::TlsError;

/// Source of pinned server certificates.
pub trait CertificatesProvider: Send + Sync {
    /// DER certificates the server leaf must match byte for byte.
    fn certificates(&self) -> Vec<CertificateDer<'static>>;

    /// Roots the platform evaluation is anchored to. Empty means the bundled
    /// webpki roots.
    fn anchors(&self) -> Vec<CertificateDer<'static>> {
        Vec::new()
    }
}

impl CertificatesProvider for Vec<CertificateDer<'static>> {
    fn certificates(&self) -> Vec<CertificateDer<'static>> {
        self.clone()
    }
}

/// Source of the client identity presented for mutual TLS.
pub trait IdentityProvider: Send + Sync {
    fn identity(&self) -> Option<ClientIdentity>;
}

/// Certificate chain and private key presented to the server.
pub struct ClientIdentity {
    pub chain: Vec<CertificateDer<'static>>,
    pub key: PrivateKeyDer<'static>,
}

impl ClientIdentity {
    pub fn new(chain: Vec<CertificateDer<'static>>, key: PrivateKeyDer<'static>) -> Self {
        Self { chain, key }
    }
}

impl Clone for ClientIdentity {
    fn clone(&self) -> Self {
        Self {
            chain: self.chain.clone(),
            key: self.key.clone_key(),
        }
    }
}

impl fmt::Debug for ClientIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientIdentity")
            .field("chain_len", &self.chain.len())
            .finish_non_exhaustive()
    }
}

impl IdentityProvider for ClientIdentity {
    fn identity(&self) -> Option<ClientIdentity> {
        Some(self.clone())
    }
}

/// A credential request raised during the handshake.
#[derive(Debug)]
pub enum Challenge<'a> {
    /// The server presented `chain` (leaf first). `trusted` is the platform
    /// evaluation verdict.
    ServerTrust {
        chain: &'a [CertificateDer<'a>],
        trusted: bool,
    },
    /// The server asked for a client certificate.
    ClientIdentity,
}

/// What to do with a `Challenge`.
#[derive(Debug)]
pub enum Disposition {
    /// Accept the server with the credential derived from the evaluated trust.
    UseCredential,
    /// Present this identity for the current session.
    PresentIdentity(ClientIdentity),
    CancelHandshake,
    PerformDefaultHandling,
}

/// Pinning and identity configuration for one request.
///
/// The default policy has no pinning provider and no identity provider. It
/// defers to the platform: reqwest's own TLS setup is used untouched.
#[derive(Clone, Default)]
pub struct TrustPolicy {
    pinned: Option<Arc<dyn CertificatesProvider>>,
    identity: Option<Arc<dyn IdentityProvider>>,
}

impl TrustPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pinned(mut self, provider: Arc<dyn CertificatesProvider>) -> Self {
        self.pinned = Some(provider);
        self
    }

    pub fn with_identity(mut self, provider: Arc<dyn IdentityProvider>) -> Self {
        self.identity = Some(provider);
        self
    }

    pub fn is_platform_default(&self) -> bool {
        self.pinned.is_none() && self.identity.is_none()
    }

    pub fn handle(&self, challenge: Challenge<'_>) -> Disposition {
        match challenge {
            Challenge::ServerTrust { chain, trusted } => {
                let pins = match &self.pinned {
                    Some(provider) => provider.certificates(),
                    None => return Disposition::PerformDefaultHandling,
                };
                if pins.is_empty() {
                    return Disposition::PerformDefaultHandling;
                }
                if trusted && leaf_matches(chain, &pins) {
                    Disposition::UseCredential
                } else {
                    Disposition::CancelHandshake
                }
            }
            Challenge::ClientIdentity => match self.identity.as_ref().and_then(|p| p.identity()) {
                Some(identity) => Disposition::PresentIdentity(identity),
                None => Disposition::PerformDefaultHandling,
            },
        }
    }

    fn root_store(&self) -> Result<RootCertStore, TlsError> {
        let anchors = self
            .pinned
            .as_ref()
            .map(|provider| provider.anchors())
            .unwrap_or_default();

        let mut roots = RootCertStore::empty();
        if anchors.is_empty() {
            roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        } else {
            for anchor in anchors {
                roots.add(anchor)?;
            }
        }
        Ok(roots)
    }
}

impl fmt::Debug for TrustPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrustPolicy")
            .field("pinned", &self.pinned.is_some())
            .field("identity", &self.identity.is_some())
            .finish()
    }
}

/// Whether the leaf of `chain` equals one of `pins`, byte for byte.
///
/// An empty chain matches.
pub fn leaf_matches(chain: &[CertificateDer<'_>], pins: &[CertificateDer<'_>]) -> bool {
    match chain.first() {
        None => true,
        Some(leaf) => pins.iter().any(|pin| pin.as_ref() == leaf.as_ref()),
    }
}

/// Build the rustls configuration for `policy`, or `None` for platform default.
pub fn client_config(policy: &TrustPolicy) -> Result<Option<ClientConfig>, TlsError> {
    if policy.is_platform_default() {
        return Ok(None);
    }

    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let verifier = PinningVerifier::new(policy, &provider)?;

    let builder = ClientConfig::builder_with_provider(Arc::clone(&provider))
        .with_safe_default_protocol_versions()?
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(verifier));

    let config = if policy.identity.is_some() {
        builder.with_client_cert_resolver(Arc::new(IdentityResolver::new(policy, provider)))
    } else {
        builder.with_no_client_auth()
    };
    Ok(Some(config))
}

#[derive(Debug)]
struct PinningVerifier {
    platform: Arc<WebPkiServerVerifier>,
    policy: TrustPolicy,
}

impl PinningVerifier {
    fn new(policy: &TrustPolicy, provider: &Arc<CryptoProvider>) -> Result<Self, TlsError> {
        let roots = Arc::new(policy.root_store()?);
        let platform = WebPkiServerVerifier::builder_with_provider(roots, Arc::clone(provider)).build()?;
        Ok(Self {
            platform,
            policy: policy.clone(),
        })
    }
}

impl ServerCertVerifier for PinningVerifier {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        server_name: &ServerName<'_>,
        ocsp_response: &[u8],
        now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        let evaluation =
            self.platform
                .verify_server_cert(end_entity, intermediates, server_name, ocsp_response, now);

        let mut chain = Vec::with_capacity(intermediates.len() + 1);
        chain.push(end_entity.clone());
        chain.extend(intermediates.iter().cloned());

        let challenge = Challenge::ServerTrust {
            chain: &chain,
            trusted: evaluation.is_ok(),
        };
        match self.policy.handle(challenge) {
            Disposition::CancelHandshake => {
                tracing::warn!(server = ?server_name, "server certificate rejected by pinning policy");
                evaluation.and(Err(rustls::Error::InvalidCertificate(
                    CertificateError::ApplicationVerificationFailure,
                )))
            }
            Disposition::UseCredential
            | Disposition::PresentIdentity(_)
            | Disposition::PerformDefaultHandling => evaluation,
        }
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        self.platform.verify_tls12_signature(message, cert, dss)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        self.platform.verify_tls13_signature(message, cert, dss)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.platform.supported_verify_schemes()
    }
}

#[derive(Debug)]
struct IdentityResolver {
    policy: TrustPolicy,
    provider: Arc<CryptoProvider>,
}

impl IdentityResolver {
    fn new(policy: &TrustPolicy, provider: Arc<CryptoProvider>) -> Self {
        Self {
            policy: policy.clone(),
            provider,
        }
    }
}

impl ResolvesClientCert for IdentityResolver {
    fn resolve(
        &self,
        _root_hint_subjects: &[&[u8]],
        _sigschemes: &[SignatureScheme],
    ) -> Option<Arc<CertifiedKey>> {
        let identity = match self.policy.handle(Challenge::ClientIdentity) {
            Disposition::PresentIdentity(identity) => identity,
            _ => return None,
        };
        match self.provider.key_provider.load_private_key(identity.key) {
            Ok(key) => Some(Arc::new(CertifiedKey::new(identity.chain, key))),
            Err(error) => {
                tracing::warn!(%error, "client identity key rejected");
                None
            }
        }
    }

    fn has_certs(&self) -> bool {
        true
    }
}
