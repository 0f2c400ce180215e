//! Information about an established connection.
//!
//! TLS information is only available once the handshake is complete, so it
//! is attached to a connection when the TLS layer is added.

use std::net::SocketAddr;

/// Information about a connection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionInfo {
    local_addr: Option<SocketAddr>,
    remote_addr: Option<SocketAddr>,
    tls: Option<TlsConnectionInfo>,
}

impl ConnectionInfo {
    pub(crate) fn tcp(local_addr: Option<SocketAddr>, remote_addr: Option<SocketAddr>) -> Self {
        Self {
            local_addr,
            remote_addr,
            tls: None,
        }
    }

    pub(crate) fn with_tls(mut self, tls: TlsConnectionInfo) -> Self {
        self.tls = Some(tls);
        self
    }

    /// The local socket address, if the connection is a socket we opened.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// The remote socket address, if the connection is a socket we opened.
    ///
    /// Connections returned by a proxy hook do not carry addresses.
    pub fn remote_addr(&self) -> Option<SocketAddr> {
        self.remote_addr
    }

    /// TLS information, present once a handshake has completed.
    pub fn tls(&self) -> Option<&TlsConnectionInfo> {
        self.tls.as_ref()
    }
}

/// Information about a TLS session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TlsConnectionInfo {
    /// The server name used for this connection.
    ///
    /// IP addresses are recorded here even though they are not sent in the
    /// SNI extension.
    pub server_name: Option<String>,

    /// The application layer protocol negotiated for this connection.
    pub alpn: Option<String>,

    /// The negotiated protocol version, e.g. `TLSv1_3`.
    pub protocol_version: Option<String>,
}

impl TlsConnectionInfo {
    pub(crate) fn client(client_info: &rustls::ClientConnection, server_name: &str) -> Self {
        let alpn = client_info
            .alpn_protocol()
            .and_then(|s| std::str::from_utf8(s).ok())
            .map(String::from);

        let protocol_version = client_info
            .protocol_version()
            .map(|version| format!("{version:?}"));

        Self {
            server_name: Some(server_name.to_owned()).filter(|s| !s.is_empty()),
            alpn,
            protocol_version,
        }
    }
}
