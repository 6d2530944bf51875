//! TCP endpoint abstraction for litebus.
//!
//! This is the lowest layer of litebus: binding a listener with an explicit
//! backlog, accepting and opening connections, and the [`BusStream`] handle
//! everything above it reads from and writes to.

pub mod error;
pub mod stream;
pub mod tcp;

pub use error::{Result, TransportError};
pub use stream::BusStream;
pub use tcp::{parse_endpoint, TcpTransport, DEFAULT_BACKLOG};
