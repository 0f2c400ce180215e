//! TLS handshakes over established connections.
//!
//! The default handshake wraps a connection in a rustls client session using
//! the server name from [`Options::sni`][crate::Options::sni], or the host
//! part of the dialed address when none is set. It can be replaced entirely
//! through [`Options::tls_handshake`][crate::Options::tls_handshake].

use std::future::Future;
use std::io;

use futures_util::future::BoxFuture;
use futures_util::FutureExt as _;
use rustls::pki_types::ServerName;
use tokio_rustls::TlsConnector;
use tracing::trace;

use crate::{BoxError, Conn, Options};

mod verify;

pub use self::verify::TlsVerification;

/// Performs a TLS handshake over a plain connection.
///
/// Implemented for closures of the form
/// `Fn(Conn, &str, &Options) -> impl Future<Output = Result<Conn, BoxError>>`.
/// An implementation owns `conn`; dropping it on failure closes it.
pub trait TlsHandshake: Send + Sync {
    /// Secure `conn`, which was dialed to `addr`.
    fn handshake(
        &self,
        conn: Conn,
        addr: &str,
        options: &Options,
    ) -> BoxFuture<'static, Result<Conn, BoxError>>;
}

impl<F, Fut> TlsHandshake for F
where
    F: Fn(Conn, &str, &Options) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Conn, BoxError>> + Send + 'static,
{
    fn handshake(
        &self,
        conn: Conn,
        addr: &str,
        options: &Options,
    ) -> BoxFuture<'static, Result<Conn, BoxError>> {
        (self)(conn, addr, options).boxed()
    }
}

/// The handshake used when no custom one is configured. See [`handshake`].
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultTlsHandshake;

impl TlsHandshake for DefaultTlsHandshake {
    fn handshake(
        &self,
        conn: Conn,
        addr: &str,
        options: &Options,
    ) -> BoxFuture<'static, Result<Conn, BoxError>> {
        let server_name = server_name(addr, options).to_owned();
        let config = options.tls_verification.clone();

        async move {
            let config = config.client_config()?;
            let conn = connect(conn, &server_name, config).await?;
            Ok::<_, BoxError>(conn)
        }
        .boxed()
    }
}

/// Perform the default TLS handshake over `conn`.
///
/// The server name is [`Options::sni`] when set, otherwise the host part of
/// `addr` (see [`server_name`]). Certificates are checked according to
/// [`Options::tls_verification`], which skips verification by default.
pub async fn handshake(conn: Conn, addr: &str, options: &Options) -> io::Result<Conn> {
    let config = options.tls_verification.client_config()?;
    connect(conn, server_name(addr, options), config).await
}

async fn connect(
    conn: Conn,
    server_name: &str,
    config: std::sync::Arc<rustls::ClientConfig>,
) -> io::Result<Conn> {
    let name = ServerName::try_from(server_name.to_owned()).map_err(|error| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("invalid server name {server_name:?}: {error}"),
        )
    })?;

    trace!(id = %conn.id(), server.name = %server_name, "tls handshake");
    let stream = TlsConnector::from(config).connect(name, conn).await?;
    let conn = Conn::from_tls(stream, server_name);
    trace!(id = %conn.id(), tls = ?conn.info().tls(), "tls handshake complete");

    Ok(conn)
}

/// The server name used for a handshake to `addr`.
///
/// An explicit, non-empty [`Options::sni`] wins. Otherwise this is everything
/// before the last `:` in `addr` (all of `addr` if there is none). Bracketed
/// IPv6 literals such as `[::1]:443` yield the address inside the brackets.
pub fn server_name<'a>(addr: &'a str, options: &'a Options) -> &'a str {
    if let Some(sni) = options.sni() {
        return sni;
    }

    if let Some(rest) = addr.strip_prefix('[') {
        if let Some((host, _)) = rest.split_once(']') {
            return host;
        }
    }

    match addr.rfind(':') {
        Some(colon) => &addr[..colon],
        None => addr,
    }
}
