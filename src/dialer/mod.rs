//! The connection broker.
//!
//! A [`Dialer`] hands out connections for a protocol and address. It first
//! looks for an idle connection to the exact same address string in its
//! cache, and dials a fresh one when there is none. Fresh dials go straight
//! to the address over TCP, or through a [`ProxyDial`] hook, and get a TLS
//! session layered on top for `https`.
//!
//! The cache lock is only held while looking up or returning a connection.
//! Dials and handshakes run without it, so concurrent dials never wait on
//! each other. Two callers missing the cache for the same address at the
//! same time will both dial.
//!
//! Nothing is retried, and a failed proxy or TLS step never falls back to a
//! direct or plain connection.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use futures_util::future::BoxFuture;
use futures_util::FutureExt as _;
use http::uri::Scheme;
use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::conn::tcp;
use crate::proxy::{DialContext, ProxyDial};
use crate::tls::{DefaultTlsHandshake, TlsHandshake};
use crate::{Conn, DialError, Options};

mod idle;

use self::idle::IdleConnections;

type Cache = HashMap<Box<str>, IdleConnections>;

/// Dials remote HTTP servers, reusing idle connections when it can.
///
/// Clones share the same idle cache.
///
/// # Example
/// ```no_run
/// # use rawhttp::{Dialer, Options};
/// # use http::uri::Scheme;
/// # use std::time::Duration;
/// # async fn run() -> Result<(), rawhttp::DialError> {
/// let dialer = Dialer::new();
/// let options = Options::default();
///
/// let conn = dialer
///     .dial_timeout(&Scheme::HTTP, "example.com:80", Duration::from_secs(5), &options)
///     .await?;
///
/// // ... write a request, read the response ...
///
/// dialer.put("example.com:80", conn);
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Default)]
pub struct Dialer {
    conns: Arc<Mutex<Option<Cache>>>,
}

impl fmt::Debug for Dialer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let conns = self.conns.lock();
        let idle: usize = conns
            .as_ref()
            .map_or(0, |conns| conns.values().map(IdleConnections::len).sum());
        f.debug_struct("Dialer").field("idle", &idle).finish()
    }
}

impl Dialer {
    /// A dialer with an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a connection to `addr` without a deadline.
    ///
    /// Equivalent to [`dial_timeout`][Self::dial_timeout] with [`Duration::ZERO`].
    pub async fn dial(
        &self,
        protocol: &Scheme,
        addr: &str,
        options: &Options,
    ) -> Result<Conn, DialError> {
        self.dial_timeout(protocol, addr, Duration::ZERO, options).await
    }

    /// Get a connection to `addr`, failing if dialing (and the TLS handshake
    /// for protocols other than `http`) takes longer than `timeout`.
    ///
    /// An idle connection to `addr` is returned immediately if there is one,
    /// whatever the protocol. [`Duration::ZERO`] means no deadline.
    #[tracing::instrument(skip_all, fields(protocol = %protocol, addr = %addr), level = "debug")]
    pub async fn dial_timeout(
        &self,
        protocol: &Scheme,
        addr: &str,
        timeout: Duration,
        options: &Options,
    ) -> Result<Conn, DialError> {
        if let Some(conn) = self.checkout(addr) {
            trace!(id = %conn.id(), "reusing idle connection");
            return Ok(conn);
        }

        trace!("no idle connection, dialing");
        dial_direct(protocol, addr, timeout, options).await
    }

    /// Get a fresh connection to `addr` through `upstream`.
    ///
    /// The hook gets a [`DialContext`] expiring after `timeout`, and is cut
    /// off if it runs past it. For `https`, a TLS handshake is performed on
    /// the connection the hook returned, within the same deadline. The idle
    /// cache is not consulted.
    #[tracing::instrument(skip_all, fields(protocol = %protocol, addr = %addr), level = "debug")]
    pub async fn dial_with_proxy(
        &self,
        protocol: &Scheme,
        addr: &str,
        upstream: &dyn ProxyDial,
        timeout: Duration,
        options: &Options,
    ) -> Result<Conn, DialError> {
        let cx = DialContext::with_timeout(timeout);

        let conn = cx
            .run(upstream.dial(cx, "tcp", addr))
            .await
            .map_err(DialError::Proxy)?;
        trace!(id = %conn.id(), "proxy connected");

        if *protocol == Scheme::HTTPS {
            // The handshake owns the connection, so a failure closes it.
            let handshake = handshaker(options);
            return cx
                .run(handshake.handshake(conn, addr, options))
                .await
                .map_err(DialError::Handshake);
        }

        Ok(conn)
    }

    /// Get a connection the way a client configured with `options` would:
    /// through [`Options::proxy`] when set (bounded by
    /// [`Options::proxy_dial_timeout`]), otherwise directly, bounded by
    /// [`Options::timeout`].
    pub async fn connect(
        &self,
        protocol: &Scheme,
        addr: &str,
        options: &Options,
    ) -> Result<Conn, DialError> {
        match options.proxy.as_deref() {
            Some(proxy) => {
                self.dial_with_proxy(protocol, addr, proxy, options.proxy_dial_timeout, options)
                    .await
            }
            None => {
                self.dial_timeout(protocol, addr, options.timeout, options)
                    .await
            }
        }
    }

    /// Return an idle connection to the cache for reuse by a later dial to
    /// exactly `addr`.
    ///
    /// The connection must still be open; closed connections must not be
    /// returned.
    pub fn put(&self, addr: &str, conn: Conn) {
        trace!(id = %conn.id(), addr, "connection idle");
        let mut conns = self.conns.lock();
        conns
            .get_or_insert_with(HashMap::new)
            .entry(addr.into())
            .or_default()
            .push(conn);
    }

    /// The number of idle connections cached for `addr`.
    pub fn idle(&self, addr: &str) -> usize {
        self.conns
            .lock()
            .as_ref()
            .and_then(|conns| conns.get(addr))
            .map_or(0, IdleConnections::len)
    }

    fn checkout(&self, addr: &str) -> Option<Conn> {
        let mut conns = self.conns.lock();
        let cache = conns.get_or_insert_with(HashMap::new);
        let idle = cache.get_mut(addr)?;
        let conn = idle.pop();
        if idle.is_empty() {
            cache.remove(addr);
        }
        conn
    }
}

fn handshaker(options: &Options) -> &dyn TlsHandshake {
    match options.tls_handshake.as_deref() {
        Some(handshake) => handshake,
        None => &DefaultTlsHandshake,
    }
}

/// Dial `addr` without the cache or a proxy.
///
/// `http` gets plain TCP. Every other protocol gets TLS on top, through
/// [`Options::tls_handshake`] when set or the default handshake otherwise.
/// The deadline covers both the connect and the handshake.
async fn dial_direct(
    protocol: &Scheme,
    addr: &str,
    timeout: Duration,
    options: &Options,
) -> Result<Conn, DialError> {
    let cx = DialContext::with_timeout(timeout);

    let stream = cx
        .run(tcp::connect(addr, &options.tcp))
        .await
        .map_err(DialError::Dial)?;
    let conn = Conn::from(stream);
    debug!(id = %conn.id(), "connected");

    if *protocol == Scheme::HTTP {
        return Ok(conn);
    }

    cx.run(handshaker(options).handshake(conn, addr, options))
        .await
        .map_err(DialError::Handshake)
}

/// A request for a connection, for use of the [`Dialer`] as a [`tower::Service`].
#[derive(Debug, Clone)]
pub struct DialRequest {
    /// The protocol, `http` or `https`.
    pub protocol: Scheme,

    /// The address to dial, as `host:port`.
    pub addr: Box<str>,

    /// The dial deadline; [`Duration::ZERO`] means none.
    pub timeout: Duration,

    /// The options to dial with.
    pub options: Arc<Options>,
}

impl DialRequest {
    /// A request for `addr` bounded by [`Options::timeout`].
    pub fn new(protocol: Scheme, addr: impl Into<Box<str>>, options: Arc<Options>) -> Self {
        Self {
            protocol,
            addr: addr.into(),
            timeout: options.timeout,
            options,
        }
    }
}

impl tower::Service<DialRequest> for Dialer {
    type Response = Conn;
    type Error = DialError;
    type Future = BoxFuture<'static, Result<Conn, DialError>>;

    fn poll_ready(&mut self, _: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: DialRequest) -> Self::Future {
        let dialer = self.clone();
        async move {
            dialer
                .dial_timeout(&req.protocol, &req.addr, req.timeout, &req.options)
                .await
        }
        .boxed()
    }
}
