//! Delimiter-based text message framing for litebus.
//!
//! Messages travel as UTF-8 text terminated by the `<EOM>` token. A party
//! that intends to hang up sends `<EOF>`. There are no length prefixes and
//! no escaping: message content must never contain either token.
//!
//! Callers get whole messages; partial reads, multi-byte characters split
//! across reads and trailing fragments are handled by [`ConnectionBuffer`].

pub mod buffer;
pub mod codec;
pub mod error;
pub mod reader;
pub mod writer;

#[cfg(feature = "async")]
pub mod async_codec;

pub use buffer::{ConnectionBuffer, Drained};
pub use codec::{
    encode_end_of_stream, encode_message, extract_messages, Extraction, FrameConfig,
    DEFAULT_CHUNK_SIZE, DEFAULT_MAX_BUFFER, EOF, EOM,
};
pub use error::{FrameError, Result};
pub use reader::{MessageReader, ReadEvent};
pub use writer::MessageWriter;

#[cfg(feature = "async")]
pub use async_codec::MessageCodec;
