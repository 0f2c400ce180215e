//! Client options.
//!
//! [`Options`] is shared between the dialer and the code that writes
//! requests and reads responses. The dialer only reads the timeout, proxy,
//! server name, TLS and TCP fields; the rest are carried for the request and
//! response layers. Options are never modified by a dial.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;

use crate::proxy::ProxyDial;
use crate::tls::{TlsHandshake, TlsVerification};
use crate::DebugLiteral;

/// Configuration for a raw HTTP client.
#[derive(Clone)]
pub struct Options {
    /// Deadline for dialing and the TLS handshake. [`Duration::ZERO`] means
    /// no deadline.
    pub timeout: Duration,

    /// Whether redirects are followed.
    pub follow_redirects: bool,

    /// The maximum number of redirects to follow.
    pub max_redirects: usize,

    /// Whether a `Host` header is added when missing.
    pub automatic_host_header: bool,

    /// Whether a `Content-Length` header is computed when missing.
    pub automatic_content_length: bool,

    /// Headers sent with every request, in order.
    pub custom_headers: Headers,

    /// Read the whole body, ignoring any content length.
    pub force_read_all_body: bool,

    /// Bytes sent verbatim in place of the serialized request.
    pub custom_raw_bytes: Option<Bytes>,

    /// Dial through this hook instead of connecting directly.
    pub proxy: Option<Arc<dyn ProxyDial>>,

    /// Deadline for the proxy hook. [`Duration::ZERO`] means no deadline.
    pub proxy_dial_timeout: Duration,

    /// Server name sent during the TLS handshake. When `None` (or empty) it
    /// is derived from the dialed address.
    pub sni: Option<String>,

    /// Replaces the default TLS handshake entirely.
    pub tls_handshake: Option<Arc<dyn TlsHandshake>>,

    /// Certificate verification for the default TLS handshake.
    pub tls_verification: TlsVerification,

    /// Socket options for directly dialed connections.
    pub tcp: TcpConfig,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            follow_redirects: true,
            max_redirects: 10,
            automatic_host_header: true,
            automatic_content_length: true,
            custom_headers: Headers::default(),
            force_read_all_body: false,
            custom_raw_bytes: None,
            proxy: None,
            proxy_dial_timeout: Duration::ZERO,
            sni: None,
            tls_handshake: None,
            tls_verification: TlsVerification::default(),
            tcp: TcpConfig::default(),
        }
    }
}

impl fmt::Debug for Options {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Options")
            .field("timeout", &self.timeout)
            .field("follow_redirects", &self.follow_redirects)
            .field("max_redirects", &self.max_redirects)
            .field("automatic_host_header", &self.automatic_host_header)
            .field("automatic_content_length", &self.automatic_content_length)
            .field("custom_headers", &self.custom_headers)
            .field("force_read_all_body", &self.force_read_all_body)
            .field(
                "custom_raw_bytes",
                &self.custom_raw_bytes.as_ref().map(|b| b.len()),
            )
            .field("proxy", &self.proxy.as_ref().map(|_| DebugLiteral("<hook>")))
            .field("proxy_dial_timeout", &self.proxy_dial_timeout)
            .field("sni", &self.sni)
            .field(
                "tls_handshake",
                &self.tls_handshake.as_ref().map(|_| DebugLiteral("<hook>")),
            )
            .field("tls_verification", &self.tls_verification)
            .field("tcp", &self.tcp)
            .finish()
    }
}

impl Options {
    /// Set the dial timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the server name sent during the TLS handshake.
    pub fn with_sni(mut self, sni: impl Into<String>) -> Self {
        self.sni = Some(sni.into());
        self
    }

    /// Replace the default TLS handshake.
    pub fn with_tls_handshake<H>(mut self, handshake: H) -> Self
    where
        H: TlsHandshake + 'static,
    {
        self.tls_handshake = Some(Arc::new(handshake));
        self
    }

    /// Set the certificate verification policy for the default handshake.
    pub fn with_tls_verification(mut self, verification: TlsVerification) -> Self {
        self.tls_verification = verification;
        self
    }

    /// Dial through a proxy hook, bounded by `timeout`.
    pub fn with_proxy<P>(mut self, proxy: P, timeout: Duration) -> Self
    where
        P: ProxyDial + 'static,
    {
        self.proxy = Some(Arc::new(proxy));
        self.proxy_dial_timeout = timeout;
        self
    }

    /// Set the TCP socket options.
    pub fn with_tcp_config(mut self, config: TcpConfig) -> Self {
        self.tcp = config;
        self
    }

    /// Set whether redirects are followed, and how many.
    pub fn with_redirects(mut self, follow: bool, max: usize) -> Self {
        self.follow_redirects = follow;
        self.max_redirects = max;
        self
    }

    /// Set the headers sent with every request.
    pub fn with_custom_headers(mut self, headers: Headers) -> Self {
        self.custom_headers = headers;
        self
    }

    /// Send these bytes verbatim instead of a serialized request.
    pub fn with_custom_raw_bytes(mut self, bytes: impl Into<Bytes>) -> Self {
        self.custom_raw_bytes = Some(bytes.into());
        self
    }

    /// The explicit server name, if one is set and non-empty.
    pub(crate) fn sni(&self) -> Option<&str> {
        self.sni.as_deref().filter(|sni| !sni.is_empty())
    }
}

/// Configuration for TCP connections.
#[derive(Debug, Clone)]
pub struct TcpConfig {
    /// The TCP keep-alive time. `None` leaves the system default.
    pub keep_alive: Option<Duration>,

    /// Whether to disable Nagle's algorithm.
    pub nodelay: bool,
}

impl Default for TcpConfig {
    fn default() -> Self {
        Self {
            keep_alive: Some(Duration::from_secs(90)),
            nodelay: true,
        }
    }
}

/// An ordered list of header fields.
///
/// Names are kept exactly as given: no case folding, no merging of
/// duplicates, and insertion order is preserved.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    fields: Vec<(String, String)>,
}

impl Headers {
    /// An empty header list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a header field.
    pub fn push(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.fields.push((name.into(), value.into()));
    }

    /// The value of the first field whose name matches `name`, ignoring case.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(field, _)| field.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Iterate over the fields in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }

    /// The number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether there are no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<N, V> FromIterator<(N, V)> for Headers
where
    N: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (N, V)>>(iter: I) -> Self {
        Self {
            fields: iter
                .into_iter()
                .map(|(name, value)| (name.into(), value.into()))
                .collect(),
        }
    }
}
