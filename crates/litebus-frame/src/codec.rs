use bytes::{BufMut, BytesMut};

/// End-of-message token appended to every message on the wire.
pub const EOM: &str = "<EOM>";

/// End-of-stream token sent by a party that intends to disconnect.
pub const EOF: &str = "<EOF>";

/// Size of the fixed receive window used for each read: 256 bytes.
pub const DEFAULT_CHUNK_SIZE: usize = 256;

/// Default cap on pending partial-message text: 1 MiB.
pub const DEFAULT_MAX_BUFFER: usize = 1024 * 1024;

/// Result of running the framer over accumulated text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extraction {
    /// Complete messages, in stream order.
    pub messages: Vec<String>,
    /// Trailing text after the last delimiter, kept for the next read.
    pub remainder: String,
}

/// Split accumulated text into complete messages and a trailing remainder.
///
/// Everything up to the last `<EOM>` is split on the delimiter, with empty
/// fragments (back-to-back delimiters) dropped. Text after the last
/// delimiter is returned as the remainder. Input without any delimiter is
/// returned whole as the remainder.
pub fn extract_messages(data: &str) -> Extraction {
    let (complete, remainder) = if data.ends_with(EOM) {
        (data, "")
    } else {
        match data.rfind(EOM) {
            Some(idx) => (&data[..idx], &data[idx + EOM.len()..]),
            None => ("", data),
        }
    };

    let messages = complete
        .split(EOM)
        .filter(|fragment| !fragment.is_empty())
        .map(str::to_owned)
        .collect();

    Extraction {
        messages,
        remainder: remainder.to_owned(),
    }
}

/// Encode a message into the wire format: the UTF-8 text followed by `<EOM>`.
///
/// Wire format:
/// ```text
/// ┌──────────────────────┬─────────┐
/// │ Text (UTF-8, any len) │ "<EOM>" │
/// └──────────────────────┴─────────┘
/// ```
pub fn encode_message(text: &str, dst: &mut BytesMut) {
    dst.reserve(text.len() + EOM.len());
    dst.put_slice(text.as_bytes());
    dst.put_slice(EOM.as_bytes());
}

/// Encode the end-of-stream signal.
pub fn encode_end_of_stream(dst: &mut BytesMut) {
    dst.put_slice(EOF.as_bytes());
}

/// Configuration for message readers and writers.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Bytes requested per read. Default: 256.
    pub chunk_size: usize,
    /// Maximum pending partial-message text in bytes. Default: 1 MiB.
    pub max_buffer_size: usize,
    /// Read timeout for blocking operations.
    pub read_timeout: Option<std::time::Duration>,
    /// Write timeout for blocking operations.
    pub write_timeout: Option<std::time::Duration>,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_buffer_size: DEFAULT_MAX_BUFFER,
            read_timeout: None,
            write_timeout: None,
        }
    }
}
