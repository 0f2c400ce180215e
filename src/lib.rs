//! Rawhttp
//!
//! The connection layer of a raw HTTP client: dial, reuse and secure the
//! transport connections that hand-crafted request bytes are written to.
//!
//! The [`Dialer`] is the entry point. It hands out [`Conn`] values, either
//! taken from its idle cache or freshly dialed (directly, or through a
//! caller-supplied [`ProxyDial`] hook), with TLS layered on top for `https`.
//! How the TLS handshake happens is controlled by [`Options`], which can
//! override the server name, the certificate verification policy, or replace
//! the handshake entirely with a custom [`TlsHandshake`].
//!
//! # Example
//! ```no_run
//! # use rawhttp::{Dialer, Options};
//! # use http::uri::Scheme;
//! # async fn run() -> Result<(), rawhttp::DialError> {
//! let dialer = Dialer::new();
//! let options = Options::default().with_sni("example.com");
//!
//! let conn = dialer.dial(&Scheme::HTTPS, "93.184.216.34:443", &options).await?;
//! assert!(conn.info().tls().is_some());
//! # Ok(())
//! # }
//! ```

#![cfg_attr(docsrs, feature(doc_auto_cfg))]

use std::fmt;

pub mod conn;
pub mod dialer;
mod error;
pub mod options;
pub mod proxy;
pub mod tls;

pub use conn::{Conn, ConnId};
pub use dialer::{DialRequest, Dialer};
pub use error::DialError;
pub use options::{Headers, Options, TcpConfig};
pub use proxy::{DialContext, ProxyDial};
pub use tls::{DefaultTlsHandshake, TlsHandshake, TlsVerification};

/// Boxed error type used by the pluggable hooks.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

pub(crate) struct DebugLiteral<T: fmt::Display>(T);

impl<T: fmt::Display> fmt::Debug for DebugLiteral<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
