use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use litebus_frame::{MessageReader, MessageWriter};
use litebus_transport::BusStream;
use tracing::{debug, trace};

use crate::bus::BusConfig;
use crate::error::{BusError, Result};

/// Identity of one connection within a bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// One live TCP connection.
///
/// The write half sits behind a mutex so concurrent senders never
/// interleave partial messages. The read half is handed to the receive loop
/// when the connection is established.
pub struct Connection {
    id: ConnectionId,
    local_addr: SocketAddr,
    remote_addr: SocketAddr,
    writer: Mutex<MessageWriter<BusStream>>,
    control: BusStream,
    alive: AtomicBool,
}

impl Connection {
    /// Wrap a connected stream, returning the shared connection and the
    /// reader its receive loop will own.
    pub(crate) fn establish(
        id: ConnectionId,
        stream: BusStream,
        config: &BusConfig,
    ) -> Result<(Arc<Self>, MessageReader<BusStream>)> {
        stream.set_nodelay(config.nodelay)?;
        let local_addr = stream.local_addr()?;
        let remote_addr = stream.peer_addr()?;

        let reader_stream = stream.try_clone()?;
        let control = stream.try_clone()?;

        let reader = MessageReader::with_config_stream(reader_stream, config.frame.clone())?;
        let writer = MessageWriter::with_config_stream(stream, config.frame.clone())?;

        debug!(conn = %id, local = %local_addr, remote = %remote_addr, "connection established");

        let connection = Arc::new(Self {
            id,
            local_addr,
            remote_addr,
            writer: Mutex::new(writer),
            control,
            alive: AtomicBool::new(true),
        });
        Ok((connection, reader))
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn remote_addr(&self) -> SocketAddr {
        self.remote_addr
    }

    /// False once either side has closed the connection.
    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    /// Send one message and wait until it has been written.
    ///
    /// Sends on the same connection are serialized; a second call blocks
    /// until the first has completed.
    pub fn send(&self, text: &str) -> Result<()> {
        if !self.is_alive() {
            return Err(BusError::Disconnected(self.id));
        }

        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        writer.send(text)?;
        trace!(conn = %self.id, size = text.len(), "message sent");
        Ok(())
    }

    /// Send `<EOF>` (best effort) and close the connection.
    ///
    /// If another thread is in the middle of a write the `<EOF>` is skipped;
    /// the shutdown then unblocks that writer.
    pub fn disconnect(&self) {
        if !self.is_alive() {
            return;
        }
        if let Ok(mut writer) = self.writer.try_lock() {
            if let Err(err) = writer.send_end_of_stream() {
                debug!(conn = %self.id, error = %err, "failed to send end of stream");
            }
        }
        self.close();
    }

    /// Shut down both directions of the socket. Idempotent.
    pub fn close(&self) {
        if !self.alive.swap(false, Ordering::SeqCst) {
            return;
        }
        if let Err(err) = self.control.shutdown() {
            debug!(conn = %self.id, error = %err, "socket shutdown failed");
        }
        debug!(conn = %self.id, remote = %self.remote_addr, "connection closed");
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("local_addr", &self.local_addr)
            .field("remote_addr", &self.remote_addr)
            .field("alive", &self.is_alive())
            .finish()
    }
}
