use std::error::Error as _;
use std::io;

use thiserror::Error;

use crate::BoxError;

/// Error returned when a connection could not be acquired.
///
/// The variants tell apart where the acquisition failed. Nothing is retried
/// and there is no fallback (proxy to direct, TLS to plain) behind any of them.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DialError {
    /// The transport connection could not be established (refused,
    /// unreachable, timed out). Displayed as the underlying error.
    #[error("{0}")]
    Dial(#[source] io::Error),

    /// The proxy dial hook failed.
    #[error("proxy error: {0}")]
    Proxy(#[source] BoxError),

    /// The TLS handshake failed. The partially established connection has
    /// already been closed.
    #[error("tls handshake error: {0}")]
    Handshake(#[source] BoxError),
}

impl DialError {
    /// Whether this error was caused by a deadline expiring.
    ///
    /// Walks the chain of sources looking for an [`io::Error`] of kind
    /// [`io::ErrorKind::TimedOut`].
    pub fn is_timeout(&self) -> bool {
        let mut source = self.source();
        while let Some(error) = source {
            if let Some(error) = error.downcast_ref::<io::Error>() {
                if error.kind() == io::ErrorKind::TimedOut {
                    return true;
                }
            }
            source = error.source();
        }
        false
    }
}

/// The error produced when a dial deadline expires.
pub(crate) fn timeout_error() -> io::Error {
    io::Error::new(io::ErrorKind::TimedOut, "i/o timeout")
}

#[cfg(test)]
mod tests {

    use super::*;

    use static_assertions::assert_impl_all;

    assert_impl_all!(DialError: std::error::Error, Send, Sync, Into<BoxError>);

    #[test]
    fn dial_error_is_displayed_as_is() {
        let error = DialError::Dial(io::Error::new(
            io::ErrorKind::ConnectionRefused,
            "connection refused",
        ));
        assert_eq!(error.to_string(), "connection refused");
        assert!(!error.is_timeout());
    }

    #[test]
    fn proxy_and_handshake_errors_are_prefixed() {
        let error = DialError::Proxy("socks5 unreachable".into());
        assert_eq!(error.to_string(), "proxy error: socks5 unreachable");

        let error = DialError::Handshake("bad record mac".into());
        assert_eq!(error.to_string(), "tls handshake error: bad record mac");
    }

    #[test]
    fn timeouts_are_found_through_boxed_sources() {
        assert!(DialError::Dial(timeout_error()).is_timeout());
        assert!(DialError::Proxy(timeout_error().into()).is_timeout());
        assert!(DialError::Handshake(timeout_error().into()).is_timeout());
        assert!(!DialError::Handshake("alert".into()).is_timeout());
        assert!(timeout_error().to_string().contains("i/o timeout"));
    }
}
