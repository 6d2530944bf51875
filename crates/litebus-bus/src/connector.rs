use std::sync::Arc;

use litebus_frame::MessageReader;
use litebus_transport::{BusStream, TcpTransport};

use crate::bus::BusConfig;
use crate::connection::{Connection, ConnectionId};
use crate::error::Result;

/// Open a connection to a listening bus.
///
/// Blocks until the TCP connection attempt resolves.
pub(crate) fn connect_with_config(
    addr: &str,
    port: u16,
    id: ConnectionId,
    config: &BusConfig,
) -> Result<(Arc<Connection>, MessageReader<BusStream>)> {
    let stream = TcpTransport::connect(addr, port)?;
    Connection::establish(id, stream, config)
}

#[cfg(test)]
mod tests {
    use litebus_frame::ReadEvent;

    use super::*;
    use crate::error::BusError;
    use crate::listener::BusListener;

    #[test]
    fn connect_and_exchange() {
        let listener = BusListener::bind("127.0.0.1", 0).expect("listener should bind");
        let port = listener.local_addr().port();

        let server = std::thread::spawn(move || {
            let (connection, mut reader) = listener
                .accept_connection(ConnectionId(1), &BusConfig::default())
                .expect("listener should accept");
            let event = reader.read_event().expect("server should read");
            assert_eq!(event, ReadEvent::Message("hello".to_string()));
            connection.send("Reply: hello").expect("reply should send");
        });

        let (connection, mut reader) =
            connect_with_config("127.0.0.1", port, ConnectionId(2), &BusConfig::default())
                .expect("client should connect");
        connection.send("hello").expect("send should succeed");
        assert_eq!(
            reader.read_event().expect("client should read"),
            ReadEvent::Message("Reply: hello".to_string())
        );

        server.join().expect("server thread should complete");
    }

    #[test]
    fn connect_rejects_host_names() {
        let err = connect_with_config("localhost", 1, ConnectionId(1), &BusConfig::default())
            .unwrap_err();
        assert!(matches!(
            err,
            BusError::Transport(litebus_transport::TransportError::InvalidAddress { .. })
        ));
    }
}
