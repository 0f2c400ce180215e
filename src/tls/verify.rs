//! Certificate verification policies and the client configurations built from them.

use std::fmt;
use std::io;
use std::sync::{Arc, OnceLock};

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::CryptoProvider;
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{ClientConfig, DigitallySignedStruct, SignatureScheme};
use tracing::{debug, warn};

/// How the default TLS handshake verifies server certificates.
#[derive(Clone, Default)]
pub enum TlsVerification {
    /// Accept any certificate. This lets the client reach self-signed and
    /// otherwise untrusted endpoints, and is the default.
    #[default]
    Disabled,

    /// Verify against the platform's native root certificates.
    Platform,

    /// Use this client configuration as-is.
    Custom(Arc<ClientConfig>),
}

impl fmt::Debug for TlsVerification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TlsVerification::Disabled => f.write_str("Disabled"),
            TlsVerification::Platform => f.write_str("Platform"),
            TlsVerification::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

impl TlsVerification {
    /// The client configuration for this policy.
    ///
    /// Configurations for the built-in policies are created once and shared.
    pub fn client_config(&self) -> io::Result<Arc<ClientConfig>> {
        static DISABLED: OnceLock<Arc<ClientConfig>> = OnceLock::new();
        static PLATFORM: OnceLock<Arc<ClientConfig>> = OnceLock::new();

        match self {
            TlsVerification::Disabled => cached(&DISABLED, insecure_client_config),
            TlsVerification::Platform => cached(&PLATFORM, platform_client_config),
            TlsVerification::Custom(config) => Ok(config.clone()),
        }
    }
}

fn cached(
    cell: &OnceLock<Arc<ClientConfig>>,
    build: fn() -> io::Result<ClientConfig>,
) -> io::Result<Arc<ClientConfig>> {
    if let Some(config) = cell.get() {
        return Ok(config.clone());
    }
    let config = Arc::new(build()?);
    Ok(cell.get_or_init(|| config).clone())
}

fn provider() -> Arc<CryptoProvider> {
    Arc::new(rustls::crypto::ring::default_provider())
}

fn insecure_client_config() -> io::Result<ClientConfig> {
    let provider = provider();
    let config = ClientConfig::builder_with_provider(provider.clone())
        .with_safe_default_protocol_versions()
        .map_err(io::Error::other)?
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(NoVerification { provider }))
        .with_no_client_auth();
    Ok(config)
}

fn platform_client_config() -> io::Result<ClientConfig> {
    let mut roots = rustls::RootCertStore::empty();

    let native = rustls_native_certs::load_native_certs();
    for error in &native.errors {
        warn!("error loading native certificate: {}", error);
    }
    let (added, ignored) = roots.add_parsable_certificates(native.certs);
    debug!(added, ignored, "loaded native root certificates");

    let config = ClientConfig::builder_with_provider(provider())
        .with_safe_default_protocol_versions()
        .map_err(io::Error::other)?
        .with_root_certificates(roots)
        .with_no_client_auth();
    Ok(config)
}

/// Accepts every server certificate.
///
/// Handshake signatures are still checked, so the peer must hold the key for
/// the certificate it presents.
#[derive(Debug)]
struct NoVerification {
    provider: Arc<CryptoProvider>,
}

impl ServerCertVerifier for NoVerification {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls12_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls13_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.provider
            .signature_verification_algorithms
            .supported_schemes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_configs_are_shared() {
        let a = TlsVerification::Disabled.client_config().unwrap();
        let b = TlsVerification::Disabled.client_config().unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn custom_config_is_used_as_is() {
        let config = TlsVerification::Disabled.client_config().unwrap();
        let custom = TlsVerification::Custom(config.clone());
        assert!(Arc::ptr_eq(&custom.client_config().unwrap(), &config));
        assert_eq!(format!("{custom:?}"), "Custom(..)");
    }
}
