//! Plain TCP dialing.
//!
//! Addresses are `host:port` strings, resolved with the system resolver. Each
//! resolved address is tried in order until one accepts the connection.

use std::io;
use std::net::SocketAddr;

use socket2::{Domain, Protocol, Socket, TcpKeepalive, Type};
use tokio::net::{TcpSocket, TcpStream};
use tracing::{trace, warn, Instrument};

use crate::options::TcpConfig;

/// Resolve `addr` and connect to the first address that answers.
///
/// No deadline is applied here; callers bound the returned future.
pub(crate) async fn connect(addr: &str, config: &TcpConfig) -> io::Result<TcpStream> {
    let addrs = tokio::net::lookup_host(addr).await?;

    let mut last_error = None;
    for address in addrs {
        let span = tracing::trace_span!("tcp", remote.addr = %address);
        match connect_one(address, config).instrument(span).await {
            Ok(stream) => {
                trace!(peer.addr = %address, "tcp connected");
                return Ok(stream);
            }
            Err(error) => {
                trace!(peer.addr = %address, %error, "tcp connect error");
                last_error = Some(error);
            }
        }
    }

    Err(last_error.unwrap_or_else(|| {
        io::Error::new(
            io::ErrorKind::NotFound,
            format!("no addresses resolved for {addr}"),
        )
    }))
}

async fn connect_one(address: SocketAddr, config: &TcpConfig) -> io::Result<TcpStream> {
    let socket = Socket::new(Domain::for_address(address), Type::STREAM, Some(Protocol::TCP))?;

    // Tokio requires O_NONBLOCK on sockets it adopts.
    socket.set_nonblocking(true)?;

    if let Some(duration) = config.keep_alive {
        let keepalive = TcpKeepalive::new().with_time(duration);
        if let Err(error) = socket.set_tcp_keepalive(&keepalive) {
            warn!("tcp set_keepalive error: {}", error);
        }
    }

    let socket = TcpSocket::from_std_stream(std::net::TcpStream::from(socket));
    let stream = socket.connect(address).await?;

    if config.nodelay {
        if let Err(error) = stream.set_nodelay(true) {
            warn!("tcp set_nodelay error: {}", error);
        }
    }

    Ok(stream)
}

#[cfg(test)]
mod tests {
    use tokio::net::TcpListener;

    use super::*;

    #[tokio::test]
    async fn connects_to_listener() {
        let _ = tracing_subscriber::fmt::try_init();

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let target = addr.to_string();
        let config = TcpConfig::default();
        let (stream, accepted) = tokio::join!(
            connect(&target, &config),
            listener.accept()
        );

        let stream = stream.unwrap();
        let (_, peer) = accepted.unwrap();
        assert_eq!(stream.peer_addr().unwrap(), addr);
        assert_eq!(stream.local_addr().unwrap(), peer);
        assert!(stream.nodelay().unwrap());
    }

    #[tokio::test]
    async fn refused_connection_is_an_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let error = connect(&addr.to_string(), &TcpConfig::default())
            .await
            .unwrap_err();
        assert_eq!(error.kind(), io::ErrorKind::ConnectionRefused);
    }

    #[tokio::test]
    async fn address_without_port_is_an_error() {
        assert!(connect("localhost", &TcpConfig::default()).await.is_err());
    }
}
