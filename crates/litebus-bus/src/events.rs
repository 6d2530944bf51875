use std::fmt;
use std::sync::Arc;

use crate::connection::Connection;

type ConnectionCallback = Arc<dyn Fn(&Arc<Connection>) + Send + Sync>;
type MessageCallback = Arc<dyn Fn(&Arc<Connection>, &str) + Send + Sync>;

/// Application callbacks the bus notifies.
///
/// Every slot defaults to a no-op. Callbacks run synchronously on the
/// thread of the connection they concern, so a slow callback stalls that
/// connection only. `client_connected` is the exception: it runs on the
/// accept loop, which waits for it before accepting the next peer.
#[derive(Clone)]
pub struct BusEvents {
    on_connect: ConnectionCallback,
    on_message: MessageCallback,
    on_client_connected: ConnectionCallback,
    on_disconnect: ConnectionCallback,
}

impl Default for BusEvents {
    fn default() -> Self {
        Self {
            on_connect: Arc::new(|_| {}),
            on_message: Arc::new(|_, _| {}),
            on_client_connected: Arc::new(|_| {}),
            on_disconnect: Arc::new(|_| {}),
        }
    }
}

impl BusEvents {
    pub fn new() -> Self {
        Self::default()
    }

    /// Client role: the connection to the server is up.
    pub fn on_connect(mut self, f: impl Fn(&Arc<Connection>) + Send + Sync + 'static) -> Self {
        self.on_connect = Arc::new(f);
        self
    }

    /// A complete message arrived on a connection.
    pub fn on_message(
        mut self,
        f: impl Fn(&Arc<Connection>, &str) + Send + Sync + 'static,
    ) -> Self {
        self.on_message = Arc::new(f);
        self
    }

    /// Server role: a peer was accepted.
    pub fn on_client_connected(
        mut self,
        f: impl Fn(&Arc<Connection>) + Send + Sync + 'static,
    ) -> Self {
        self.on_client_connected = Arc::new(f);
        self
    }

    /// A connection ended, whichever side closed it. Fires once per connection.
    pub fn on_disconnect(mut self, f: impl Fn(&Arc<Connection>) + Send + Sync + 'static) -> Self {
        self.on_disconnect = Arc::new(f);
        self
    }

    pub(crate) fn connected(&self, connection: &Arc<Connection>) {
        (self.on_connect)(connection)
    }

    pub(crate) fn message_received(&self, connection: &Arc<Connection>, message: &str) {
        (self.on_message)(connection, message)
    }

    pub(crate) fn client_connected(&self, connection: &Arc<Connection>) {
        (self.on_client_connected)(connection)
    }

    pub(crate) fn disconnected(&self, connection: &Arc<Connection>) {
        (self.on_disconnect)(connection)
    }
}

impl fmt::Debug for BusEvents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BusEvents").finish_non_exhaustive()
    }
}
