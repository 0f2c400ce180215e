//! Connections handed out by the [`Dialer`][crate::Dialer].
//!
//! A [`Conn`] is a bidirectional byte stream. It is plain TCP when dialed
//! directly for `http`, TLS layered over another connection for `https`, or
//! whatever stream a proxy hook or custom handshake produced. All of these
//! read and write the same way, so the code writing raw request bytes does
//! not need to care which one it holds.

use std::fmt;
use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream;

mod info;
pub(crate) mod tcp;

pub use self::info::{ConnectionInfo, TlsConnectionInfo};

/// A stream which can be wrapped in a [`Conn`].
///
/// This is implemented for every type that can stand in as a connection, so
/// proxy hooks can return their own stream types (or a [`tokio::io::DuplexStream`]
/// in tests).
pub trait Io: AsyncRead + AsyncWrite + Send + Sync + Unpin + fmt::Debug + 'static {}

impl<T> Io for T where T: AsyncRead + AsyncWrite + Send + Sync + Unpin + fmt::Debug + 'static {}

/// Process-unique identity of a connection.
///
/// Wrapping a connection in TLS keeps its identity, so a connection can be
/// followed from dial through the idle cache and back out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnId(u64);

impl ConnId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        ConnId(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ConnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn#{}", self.0)
    }
}

enum Kind {
    Tcp(TcpStream),
    Tls(Box<TlsStream<Conn>>),
    Custom(Box<dyn Io>),
}

impl fmt::Debug for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Kind::Tcp(stream) => f.debug_tuple("Tcp").field(stream).finish(),
            Kind::Tls(stream) => f.debug_tuple("Tls").field(&stream.get_ref().0).finish(),
            Kind::Custom(stream) => f.debug_tuple("Custom").field(stream).finish(),
        }
    }
}

/// A live transport connection.
///
/// Dropping a `Conn` closes it.
#[derive(Debug)]
pub struct Conn {
    id: ConnId,
    kind: Kind,
    info: ConnectionInfo,
}

impl Conn {
    /// Wrap an arbitrary stream as a connection.
    pub fn new<IO: Io>(stream: IO) -> Self {
        Self {
            id: ConnId::next(),
            kind: Kind::Custom(Box::new(stream)),
            info: ConnectionInfo::default(),
        }
    }

    /// Wrap a completed TLS session, keeping the identity of the connection
    /// underneath.
    pub fn from_tls(stream: TlsStream<Conn>, server_name: &str) -> Self {
        let (inner, session) = stream.get_ref();
        let id = inner.id;
        let info = inner
            .info
            .clone()
            .with_tls(TlsConnectionInfo::client(session, server_name));

        Self {
            id,
            kind: Kind::Tls(Box::new(stream)),
            info,
        }
    }

    /// The identity of this connection.
    pub fn id(&self) -> ConnId {
        self.id
    }

    /// Information about the connection.
    pub fn info(&self) -> &ConnectionInfo {
        &self.info
    }

    /// Whether this connection is a TLS session.
    pub fn is_tls(&self) -> bool {
        matches!(self.kind, Kind::Tls(_))
    }
}

impl From<TcpStream> for Conn {
    fn from(stream: TcpStream) -> Self {
        let info = ConnectionInfo::tcp(stream.local_addr().ok(), stream.peer_addr().ok());
        Self {
            id: ConnId::next(),
            kind: Kind::Tcp(stream),
            info,
        }
    }
}

macro_rules! dispatch {
    ($conn:ident.$method:ident($($args:expr),*)) => {
        match &mut $conn.get_mut().kind {
            Kind::Tcp(stream) => Pin::new(stream).$method($($args),*),
            Kind::Tls(stream) => Pin::new(&mut **stream).$method($($args),*),
            Kind::Custom(stream) => Pin::new(&mut **stream).$method($($args),*),
        }
    };
}

impl AsyncRead for Conn {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        dispatch!(self.poll_read(cx, buf))
    }
}

impl AsyncWrite for Conn {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<Result<usize, io::Error>> {
        dispatch!(self.poll_write(cx, buf))
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), io::Error>> {
        dispatch!(self.poll_flush(cx))
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), io::Error>> {
        dispatch!(self.poll_shutdown(cx))
    }
}
