//! Symmetric TCP message bus.
//!
//! A [`Bus`] acts either as a server accepting many peers or as a client
//! connected to one. Every connection gets its own receive loop thread that
//! turns the `<EOM>`-delimited byte stream into ordered callbacks on
//! [`BusEvents`]; sends block until the whole message has been written.

pub mod bus;
pub mod connection;
mod connector;
pub mod error;
pub mod events;
pub mod listener;

pub use bus::{BroadcastReport, Bus, BusConfig, Role};
pub use connection::{Connection, ConnectionId};
pub use error::{BusError, Result};
pub use events::BusEvents;
pub use listener::BusListener;
