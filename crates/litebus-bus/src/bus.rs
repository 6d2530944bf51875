use std::collections::HashMap;
use std::fmt;
use std::io::ErrorKind;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};
use std::thread;

use litebus_frame::{FrameConfig, MessageReader, ReadEvent};
use litebus_transport::{BusStream, TransportError, DEFAULT_BACKLOG};
use tracing::{debug, info, warn};

use crate::connection::{Connection, ConnectionId};
use crate::connector::connect_with_config;
use crate::error::{BusError, Result};
use crate::events::BusEvents;
use crate::listener::BusListener;

/// Which side of the conversation a bus plays. Fixed by the first
/// bind/connect call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Server,
    Client,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Server => f.write_str("server"),
            Role::Client => f.write_str("client"),
        }
    }
}

/// Configuration for a bus and the connections it opens.
#[derive(Debug, Clone)]
pub struct BusConfig {
    /// Framing limits and socket timeouts.
    pub frame: FrameConfig,
    /// Pending-connection backlog for server binds. Default: 100.
    pub backlog: i32,
    /// Disable Nagle's algorithm on every connection. Default: true.
    pub nodelay: bool,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            frame: FrameConfig::default(),
            backlog: DEFAULT_BACKLOG,
            nodelay: true,
        }
    }
}

/// Outcome of [`Bus::broadcast`].
#[derive(Debug, Default)]
pub struct BroadcastReport {
    /// Connections the message was written to.
    pub delivered: usize,
    /// Connections that failed, with the reason.
    pub failed: Vec<(ConnectionId, BusError)>,
}

impl BroadcastReport {
    /// True when every targeted connection received the message.
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

type ConnectionSet = Mutex<HashMap<ConnectionId, Arc<Connection>>>;

struct Shared {
    config: BusConfig,
    events: BusEvents,
    role: OnceLock<Role>,
    connections: ConnectionSet,
    client: Mutex<Option<Arc<Connection>>>,
    next_id: AtomicU64,
}

/// A bidirectional TCP message bus.
///
/// Cloning a `Bus` yields another handle to the same instance, so the
/// blocking accept loop can run on one thread while others send.
#[derive(Clone)]
pub struct Bus {
    shared: Arc<Shared>,
}

impl Bus {
    /// Create a bus with default configuration.
    pub fn new(events: BusEvents) -> Self {
        Self::with_config(events, BusConfig::default())
    }

    /// Create a bus with explicit configuration.
    pub fn with_config(events: BusEvents, config: BusConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                config,
                events,
                role: OnceLock::new(),
                connections: Mutex::new(HashMap::new()),
                client: Mutex::new(None),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// The role fixed by the first bind/connect, if any.
    pub fn role(&self) -> Option<Role> {
        self.shared.role.get().copied()
    }

    pub fn config(&self) -> &BusConfig {
        &self.shared.config
    }

    fn claim_role(&self, role: Role) -> Result<()> {
        let current = *self.shared.role.get_or_init(|| role);
        if current != role {
            return Err(BusError::InvalidOperation(format!(
                "bus is already acting as a {current}; it cannot also act as a {role}"
            )));
        }
        Ok(())
    }

    fn allocate_id(&self) -> ConnectionId {
        ConnectionId(self.shared.next_id.fetch_add(1, Ordering::Relaxed))
    }

    fn connection_set(&self) -> MutexGuard<'_, HashMap<ConnectionId, Arc<Connection>>> {
        self.shared
            .connections
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn client_slot(&self) -> MutexGuard<'_, Option<Arc<Connection>>> {
        self.shared
            .client
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    // --- server role ---

    /// Bind a server endpoint and mark this bus as a server.
    pub fn bind(&self, addr: &str, port: u16) -> Result<BusListener> {
        self.claim_role(Role::Server)?;
        BusListener::bind_with_backlog(addr, port, self.shared.config.backlog)
    }

    /// Bind every IPv4 interface on `port`.
    pub fn bind_any(&self, port: u16) -> Result<BusListener> {
        self.claim_role(Role::Server)?;
        BusListener::bind_any(port, self.shared.config.backlog)
    }

    /// Bind and run the accept loop. Blocks for the life of the process.
    pub fn listen(&self, addr: &str, port: u16) -> Result<()> {
        let listener = self.bind(addr, port)?;
        self.serve(listener)
    }

    /// [`listen`](Bus::listen) on every IPv4 interface.
    pub fn listen_any(&self, port: u16) -> Result<()> {
        let listener = self.bind_any(port)?;
        self.serve(listener)
    }

    /// Run the accept loop on a bound listener.
    ///
    /// Each accepted peer is registered, reported through
    /// `on_client_connected` (before the next accept), and then handed to
    /// its own receive loop thread. Failures that concern a single peer are
    /// logged and the loop keeps going; this only returns on an error that
    /// leaves the listener unusable.
    pub fn serve(&self, listener: BusListener) -> Result<()> {
        self.claim_role(Role::Server)?;
        info!(addr = %listener.local_addr(), "bus accepting connections");

        loop {
            let id = self.allocate_id();
            let (connection, reader) =
                match listener.accept_connection(id, &self.shared.config) {
                    Ok(accepted) => accepted,
                    Err(BusError::Transport(TransportError::Accept(err)))
                        if !is_transient_accept_error(err.kind()) =>
                    {
                        warn!(error = %err, "accept loop stopped");
                        return Err(BusError::Transport(TransportError::Accept(err)));
                    }
                    Err(err) => {
                        warn!(error = %err, "failed to accept connection");
                        continue;
                    }
                };

            info!(conn = %id, remote = %connection.remote_addr(), "client connected");
            self.connection_set().insert(id, Arc::clone(&connection));
            self.shared.events.client_connected(&connection);

            if let Err(err) = self.spawn_receive_loop(connection, reader, false) {
                warn!(conn = %id, error = %err, "dropping connection");
            }
        }
    }

    // --- client role ---

    /// Connect to a server and mark this bus as a client.
    ///
    /// Returns once the TCP connection is established. `on_connect` then
    /// fires on the connection's own thread, followed by its receive loop.
    pub fn connect(&self, addr: &str, port: u16) -> Result<Arc<Connection>> {
        self.claim_role(Role::Client)?;
        if let Some(existing) = self.live_client() {
            return Err(already_connected(&existing));
        }

        let id = self.allocate_id();
        let (connection, reader) = connect_with_config(addr, port, id, &self.shared.config)?;

        {
            let mut slot = self.client_slot();
            if let Some(existing) = slot.as_ref().filter(|c| c.is_alive()) {
                let err = already_connected(existing);
                drop(slot);
                connection.close();
                return Err(err);
            }
            *slot = Some(Arc::clone(&connection));
        }
        info!(conn = %id, remote = %connection.remote_addr(), "connected");

        self.spawn_receive_loop(Arc::clone(&connection), reader, true)?;
        Ok(connection)
    }

    fn live_client(&self) -> Option<Arc<Connection>> {
        self.client_slot().clone().filter(|c| c.is_alive())
    }

    /// The client connection, if one has been opened.
    pub fn connection(&self) -> Option<Arc<Connection>> {
        self.client_slot().clone()
    }

    // --- send path ---

    /// Send a message on a specific connection and wait for the write.
    pub fn send_to(&self, connection: &Connection, text: &str) -> Result<()> {
        connection.send(text)
    }

    /// Send a message to the server. Client role only.
    pub fn send(&self, text: &str) -> Result<()> {
        match self.role() {
            Some(Role::Client) => {}
            Some(Role::Server) => {
                return Err(BusError::InvalidOperation(
                    "send cannot be used while the bus is acting as a server".to_string(),
                ))
            }
            None => {
                return Err(BusError::InvalidOperation(
                    "no connection; connect before sending".to_string(),
                ))
            }
        }

        let connection = self.connection().ok_or_else(|| {
            BusError::InvalidOperation("no connection; connect before sending".to_string())
        })?;
        connection.send(text)
    }

    /// Send a message to every connected peer, one after another. Server
    /// role only.
    ///
    /// Works on a snapshot of the connection set. A peer that fails or
    /// disconnects mid-broadcast is recorded in the report and the remaining
    /// peers still get the message.
    pub fn broadcast(&self, text: &str) -> Result<BroadcastReport> {
        match self.role() {
            Some(Role::Server) => {}
            Some(Role::Client) => {
                return Err(BusError::InvalidOperation(
                    "broadcast cannot be used while the bus is acting as a client".to_string(),
                ))
            }
            None => {
                return Err(BusError::InvalidOperation(
                    "no listener; bind before broadcasting".to_string(),
                ))
            }
        }

        let mut report = BroadcastReport::default();
        for connection in self.connections() {
            match connection.send(text) {
                Ok(()) => report.delivered += 1,
                Err(err) => {
                    warn!(conn = %connection.id(), error = %err, "broadcast to peer failed");
                    report.failed.push((connection.id(), err));
                }
            }
        }
        debug!(
            delivered = report.delivered,
            failed = report.failed.len(),
            "broadcast complete"
        );
        Ok(report)
    }

    /// Close every connection (server) or the single connection (client).
    ///
    /// Each peer is sent `<EOF>` before its socket is shut down. Safe to call
    /// repeatedly. A server keeps accepting new peers afterwards.
    pub fn disconnect(&self) {
        match self.role() {
            Some(Role::Server) => {
                let drained: Vec<_> = self.connection_set().drain().map(|(_, c)| c).collect();
                for connection in drained {
                    connection.disconnect();
                }
            }
            Some(Role::Client) => {
                if let Some(connection) = self.connection() {
                    connection.disconnect();
                }
            }
            None => {}
        }
    }

    /// Snapshot of the currently registered server-side connections.
    pub fn connections(&self) -> Vec<Arc<Connection>> {
        self.connection_set().values().cloned().collect()
    }

    pub fn connection_count(&self) -> usize {
        self.connection_set().len()
    }

    // --- receive loop ---

    fn spawn_receive_loop(
        &self,
        connection: Arc<Connection>,
        reader: MessageReader<BusStream>,
        fire_connect: bool,
    ) -> Result<()> {
        let bus = self.clone();
        let worker = Arc::clone(&connection);
        let spawned = thread::Builder::new()
            .name(format!("litebus-{}", connection.id()))
            .spawn(move || {
                if fire_connect {
                    bus.shared.events.connected(&worker);
                }
                bus.receive_loop(worker, reader);
            });

        if let Err(err) = spawned {
            self.connection_set().remove(&connection.id());
            connection.close();
            return Err(BusError::Spawn(err));
        }
        Ok(())
    }

    fn receive_loop(&self, connection: Arc<Connection>, mut reader: MessageReader<BusStream>) {
        let id = connection.id();
        loop {
            match reader.read_event() {
                Ok(ReadEvent::Message(message)) => {
                    self.shared.events.message_received(&connection, &message);
                }
                Ok(ReadEvent::EndOfStream) => {
                    debug!(conn = %id, "peer sent end of stream");
                    break;
                }
                Ok(ReadEvent::Closed) => {
                    debug!(conn = %id, "peer closed the connection");
                    break;
                }
                Err(err) => {
                    if connection.is_alive() {
                        warn!(conn = %id, error = %err, "receive failed");
                    }
                    break;
                }
            }
        }

        // Closed before the callback so it observes a dead connection.
        self.connection_set().remove(&id);
        connection.close();
        info!(conn = %id, remote = %connection.remote_addr(), "disconnected");
        self.shared.events.disconnected(&connection);
    }
}

impl fmt::Debug for Bus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bus")
            .field("role", &self.role())
            .field("connections", &self.connection_count())
            .field("config", &self.shared.config)
            .finish()
    }
}

fn already_connected(existing: &Connection) -> BusError {
    BusError::InvalidOperation(format!(
        "already connected to {}; disconnect first",
        existing.remote_addr()
    ))
}

fn is_transient_accept_error(kind: ErrorKind) -> bool {
    matches!(
        kind,
        ErrorKind::ConnectionAborted
            | ErrorKind::ConnectionReset
            | ErrorKind::Interrupted
            | ErrorKind::WouldBlock
            | ErrorKind::TimedOut
    )
}
