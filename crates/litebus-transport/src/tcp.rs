use std::net::{IpAddr, Ipv4Addr, SocketAddr, TcpListener, TcpStream};

use socket2::{Domain, Protocol, Socket, Type};
use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::stream::BusStream;

/// Pending-connection backlog used by [`TcpTransport::bind`].
pub const DEFAULT_BACKLOG: i32 = 100;

/// Parse a literal IP address and port into a socket address.
///
/// Host names are rejected; only IPv4 and IPv6 literals are accepted.
pub fn parse_endpoint(addr: &str, port: u16) -> Result<SocketAddr> {
    let ip: IpAddr = addr
        .trim()
        .parse()
        .map_err(|_| TransportError::InvalidAddress {
            addr: addr.to_string(),
        })?;
    Ok(SocketAddr::new(ip, port))
}

/// TCP listening endpoint.
///
/// Provides bind/accept/connect over IPv4 and IPv6. Binding goes through
/// `socket2` so the listen backlog is the one requested rather than the
/// platform default std picks.
pub struct TcpTransport {
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl TcpTransport {
    /// Bind and listen on `addr:port` with the default backlog.
    pub fn bind(addr: &str, port: u16) -> Result<Self> {
        Self::bind_with_backlog(addr, port, DEFAULT_BACKLOG)
    }

    /// Bind and listen on every IPv4 interface.
    pub fn bind_any(port: u16, backlog: i32) -> Result<Self> {
        Self::bind_endpoint(SocketAddr::from((Ipv4Addr::UNSPECIFIED, port)), backlog)
    }

    /// Bind and listen on `addr:port` with an explicit backlog.
    pub fn bind_with_backlog(addr: &str, port: u16, backlog: i32) -> Result<Self> {
        Self::bind_endpoint(parse_endpoint(addr, port)?, backlog)
    }

    fn bind_endpoint(endpoint: SocketAddr, backlog: i32) -> Result<Self> {
        let listener = create_listener(endpoint, backlog).map_err(|e| TransportError::Bind {
            addr: endpoint,
            source: e,
        })?;
        let local_addr = listener.local_addr().map_err(|e| TransportError::Bind {
            addr: endpoint,
            source: e,
        })?;

        info!(addr = %local_addr, backlog, "listening on tcp endpoint");

        Ok(Self {
            listener,
            local_addr,
        })
    }

    /// Accept an incoming connection (blocking).
    pub fn accept(&self) -> Result<BusStream> {
        let (stream, addr) = self.listener.accept().map_err(TransportError::Accept)?;
        debug!(peer = %addr, "accepted connection");
        Ok(BusStream::from_tcp(stream))
    }

    /// Connect to a listening endpoint (blocking).
    pub fn connect(addr: &str, port: u16) -> Result<BusStream> {
        let endpoint = parse_endpoint(addr, port)?;
        let stream = TcpStream::connect(endpoint).map_err(|e| TransportError::Connect {
            addr: endpoint,
            source: e,
        })?;
        debug!(peer = %endpoint, "connected to tcp endpoint");
        Ok(BusStream::from_tcp(stream))
    }

    /// The address this listener is bound to (resolves port 0).
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}

impl std::fmt::Debug for TcpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TcpTransport")
            .field("local_addr", &self.local_addr)
            .finish()
    }
}

fn create_listener(addr: SocketAddr, backlog: i32) -> std::io::Result<TcpListener> {
    let socket = Socket::new(
        match addr {
            SocketAddr::V4(_) => Domain::IPV4,
            SocketAddr::V6(_) => Domain::IPV6,
        },
        Type::STREAM,
        Some(Protocol::TCP),
    )?;

    socket.set_reuse_address(true)?;
    socket.bind(&addr.into())?;
    socket.listen(backlog)?;

    Ok(socket.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};

    #[test]
    fn test_bind_accept_connect() {
        let listener = TcpTransport::bind("127.0.0.1", 0).unwrap();
        let port = listener.local_addr().port();
        assert_ne!(port, 0);

        let handle = std::thread::spawn(move || {
            let mut client = TcpTransport::connect("127.0.0.1", port).unwrap();
            client.write_all(b"hello").unwrap();
        });

        let mut server = listener.accept().unwrap();
        let mut buf = [0u8; 5];
        server.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"hello");

        handle.join().unwrap();
    }

    #[test]
    fn test_parse_endpoint_accepts_ipv4_and_ipv6() {
        let v4 = parse_endpoint("127.0.0.1", 11000).unwrap();
        assert_eq!(v4.port(), 11000);
        assert!(v4.is_ipv4());

        let v6 = parse_endpoint("::1", 11000).unwrap();
        assert!(v6.is_ipv6());
    }

    #[test]
    fn test_parse_endpoint_rejects_host_names() {
        let result = parse_endpoint("localhost", 80);
        assert!(matches!(result, Err(TransportError::InvalidAddress { .. })));
    }

    #[test]
    fn test_connect_refused_reports_endpoint() {
        // Grab a free port, then release it so nothing is listening there.
        let port = {
            let listener = TcpTransport::bind("127.0.0.1", 0).unwrap();
            listener.local_addr().port()
        };

        let err = TcpTransport::connect("127.0.0.1", port).unwrap_err();
        match err {
            TransportError::Connect { addr, .. } => assert_eq!(addr.port(), port),
            other => panic!("expected connect error, got {other:?}"),
        }
    }

    #[test]
    fn test_bind_any_listens_on_unspecified_ipv4() {
        let listener = TcpTransport::bind_any(0, 8).unwrap();
        let local = listener.local_addr();
        assert_eq!(local.ip(), IpAddr::V4(Ipv4Addr::UNSPECIFIED));
        assert_ne!(local.port(), 0);

        let client = TcpTransport::connect("127.0.0.1", local.port()).unwrap();
        let server = listener.accept().unwrap();
        assert_eq!(server.peer_addr().unwrap(), client.local_addr().unwrap());
    }

    #[test]
    fn test_bind_conflict_is_bind_error() {
        let first = TcpTransport::bind("127.0.0.1", 0).unwrap();
        let port = first.local_addr().port();

        let second = TcpTransport::bind("127.0.0.1", port);
        assert!(matches!(second, Err(TransportError::Bind { .. })));
    }

    #[test]
    fn test_stream_addresses_and_shutdown_is_idempotent() {
        let listener = TcpTransport::bind("127.0.0.1", 0).unwrap();
        let port = listener.local_addr().port();

        let client = TcpTransport::connect("127.0.0.1", port).unwrap();
        let server = listener.accept().unwrap();

        assert_eq!(client.peer_addr().unwrap(), server.local_addr().unwrap());
        assert_eq!(server.peer_addr().unwrap(), client.local_addr().unwrap());

        client.shutdown().unwrap();
        client.shutdown().unwrap();
    }

    #[test]
    fn test_peer_shutdown_reads_zero() {
        let listener = TcpTransport::bind("127.0.0.1", 0).unwrap();
        let port = listener.local_addr().port();

        let client = TcpTransport::connect("127.0.0.1", port).unwrap();
        let mut server = listener.accept().unwrap();

        client.shutdown().unwrap();
        let mut buf = [0u8; 8];
        assert_eq!(server.read(&mut buf).unwrap(), 0);
    }
}
