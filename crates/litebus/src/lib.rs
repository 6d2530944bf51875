//! Minimal bidirectional TCP message bus.
//!
//! litebus exchanges `<EOM>`-delimited text messages over TCP. One bus
//! instance acts either as a server accepting many peers or as a client
//! connected to one, and reports connects, messages and disconnects through
//! callbacks.
//!
//! # Crate Structure
//!
//! - [`transport`]: TCP endpoints: bind with backlog, accept, connect
//! - [`frame`]: Delimiter framing, receive buffering, blocking reader/writer
//! - [`bus`]: The bus itself: roles, connection set, receive loops, callbacks

/// Re-export transport types.
pub mod transport {
    pub use litebus_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use litebus_frame::*;
}

/// Re-export bus types.
pub mod bus {
    pub use litebus_bus::*;
}

pub use litebus_bus::{Bus, BusConfig, BusError, BusEvents, Connection, ConnectionId, Role};
