use std::net::SocketAddr;
use std::sync::Arc;

use litebus_frame::MessageReader;
use litebus_transport::{BusStream, TcpTransport};

use crate::bus::BusConfig;
use crate::connection::{Connection, ConnectionId};
use crate::error::Result;

/// A bound server endpoint waiting for peers.
///
/// Obtained from [`Bus::bind`](crate::Bus::bind) and driven by
/// [`Bus::serve`](crate::Bus::serve).
#[derive(Debug)]
pub struct BusListener {
    transport: TcpTransport,
}

impl BusListener {
    /// Bind to `addr:port` with the default backlog of 100.
    pub fn bind(addr: &str, port: u16) -> Result<Self> {
        Ok(Self {
            transport: TcpTransport::bind(addr, port)?,
        })
    }

    /// Bind with an explicit listen backlog.
    pub fn bind_with_backlog(addr: &str, port: u16, backlog: i32) -> Result<Self> {
        Ok(Self {
            transport: TcpTransport::bind_with_backlog(addr, port, backlog)?,
        })
    }

    /// Bind every IPv4 interface on `port` with an explicit backlog.
    pub fn bind_any(port: u16, backlog: i32) -> Result<Self> {
        Ok(Self {
            transport: TcpTransport::bind_any(port, backlog)?,
        })
    }

    /// Accept the next peer and wrap it as a connection (blocking).
    pub(crate) fn accept_connection(
        &self,
        id: ConnectionId,
        config: &BusConfig,
    ) -> Result<(Arc<Connection>, MessageReader<BusStream>)> {
        let stream = self.transport.accept()?;
        Connection::establish(id, stream, config)
    }

    /// Bound address; resolves an ephemeral port 0.
    pub fn local_addr(&self) -> SocketAddr {
        self.transport.local_addr()
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use litebus_transport::TcpTransport;

    use super::*;

    #[test]
    fn accept_returns_connection() {
        let listener = BusListener::bind("127.0.0.1", 0).expect("listener should bind");
        let port = listener.local_addr().port();

        let client = thread::spawn(move || {
            TcpTransport::connect("127.0.0.1", port).expect("client should connect")
        });

        let (connection, _reader) = listener
            .accept_connection(ConnectionId(1), &BusConfig::default())
            .expect("listener should accept");
        let remote = client.join().expect("client thread should finish");

        assert_eq!(connection.id(), ConnectionId(1));
        assert_eq!(connection.remote_addr(), remote.local_addr().unwrap());
    }

    #[test]
    fn accepts_multiple_sequential_connections() {
        let listener = BusListener::bind_with_backlog("127.0.0.1", 0, 4)
            .expect("listener should bind");
        let port = listener.local_addr().port();

        let _c1 = TcpTransport::connect("127.0.0.1", port).expect("first client should connect");
        let _c2 = TcpTransport::connect("127.0.0.1", port).expect("second client should connect");

        let (first, _) = listener
            .accept_connection(ConnectionId(1), &BusConfig::default())
            .expect("first accept should succeed");
        let (second, _) = listener
            .accept_connection(ConnectionId(2), &BusConfig::default())
            .expect("second accept should succeed");
        assert_ne!(first.remote_addr(), second.remote_addr());
    }

    #[test]
    fn bind_rejects_invalid_address() {
        assert!(BusListener::bind("not-an-ip", 0).is_err());
    }
}
