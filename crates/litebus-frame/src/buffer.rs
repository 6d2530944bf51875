//! Per-connection receive state.
//!
//! Each connection owns one [`ConnectionBuffer`]: a fixed-size window the
//! socket reads into, and the accumulated text those reads decode to. After
//! every [`drain`](ConnectionBuffer::drain) the accumulated text holds at
//! most one trailing incomplete message.

use crate::codec::{extract_messages, EOF, EOM};
use crate::error::{FrameError, Result};

/// Output of a drain pass over the accumulated text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Drained {
    /// Complete messages, in receive order.
    pub messages: Vec<String>,
    /// The peer sent `<EOF>` after those messages.
    pub end_of_stream: bool,
}

/// Receive window plus accumulation text for one connection.
#[derive(Debug)]
pub struct ConnectionBuffer {
    window: Box<[u8]>,
    /// Leading bytes of a UTF-8 sequence cut off by the end of a read.
    partial_char: Vec<u8>,
    text: String,
    max_buffer_size: usize,
}

impl ConnectionBuffer {
    /// Create a buffer with a `chunk_size`-byte window and a cap on
    /// pending text.
    pub fn new(chunk_size: usize, max_buffer_size: usize) -> Self {
        Self {
            window: vec![0u8; chunk_size.max(1)].into_boxed_slice(),
            partial_char: Vec::new(),
            text: String::new(),
            max_buffer_size,
        }
    }

    /// The receive window to read into.
    pub fn window_mut(&mut self) -> &mut [u8] {
        &mut self.window
    }

    /// Append the first `n` bytes of the window to the accumulated text.
    ///
    /// Multi-byte characters split across reads are held back until the
    /// rest arrives. Invalid sequences decode to U+FFFD.
    pub fn commit(&mut self, n: usize) {
        let n = n.min(self.window.len());
        let mut bytes = std::mem::take(&mut self.partial_char);
        bytes.extend_from_slice(&self.window[..n]);
        self.push_utf8(&bytes);
    }

    fn push_utf8(&mut self, mut input: &[u8]) {
        loop {
            match std::str::from_utf8(input) {
                Ok(text) => {
                    self.text.push_str(text);
                    return;
                }
                Err(err) => {
                    let (valid, rest) = input.split_at(err.valid_up_to());
                    self.text.push_str(&String::from_utf8_lossy(valid));
                    match err.error_len() {
                        None => {
                            self.partial_char = rest.to_vec();
                            return;
                        }
                        Some(len) => {
                            self.text.push(char::REPLACEMENT_CHARACTER);
                            input = &rest[len..];
                        }
                    }
                }
            }
        }
    }

    /// Pull every complete message out of the accumulated text.
    ///
    /// Messages are extracted first; if the remainder then carries `<EOF>`
    /// the stream is over and the remainder is discarded. Fails with
    /// [`FrameError::BufferOverflow`] when the incomplete remainder exceeds
    /// the configured cap.
    pub fn drain(&mut self) -> Result<Drained> {
        let mut drained = Drained::default();

        if self.text.contains(EOM) {
            let extraction = extract_messages(&self.text);
            drained.messages = extraction.messages;
            self.text = extraction.remainder;
        }

        if self.text.contains(EOF) {
            drained.end_of_stream = true;
            self.text.clear();
            self.partial_char.clear();
            return Ok(drained);
        }

        let pending = self.pending_len();
        if pending > self.max_buffer_size {
            return Err(FrameError::BufferOverflow {
                size: pending,
                max: self.max_buffer_size,
            });
        }

        Ok(drained)
    }

    /// Bytes of incomplete message data currently held.
    pub fn pending_len(&self) -> usize {
        self.text.len() + self.partial_char.len()
    }

    /// True when no partial message is pending.
    pub fn is_empty(&self) -> bool {
        self.pending_len() == 0
    }

    /// Pending incomplete text.
    pub fn pending_text(&self) -> &str {
        &self.text
    }

    /// Size of the receive window.
    pub fn chunk_size(&self) -> usize {
        self.window.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(buf: &mut ConnectionBuffer, data: &[u8]) {
        buf.window_mut()[..data.len()].copy_from_slice(data);
        buf.commit(data.len());
    }

    #[test]
    fn test_messages_survive_chunk_boundaries() {
        let mut buf = ConnectionBuffer::new(256, 1024);

        feed(&mut buf, b"A<EOM>B");
        let first = buf.drain().unwrap();
        assert_eq!(first.messages, vec!["A".to_string()]);
        assert_eq!(buf.pending_text(), "B");

        feed(&mut buf, b"<EOM>C<EOM>");
        let second = buf.drain().unwrap();
        assert_eq!(second.messages, vec!["B".to_string(), "C".to_string()]);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_delimiter_split_across_reads() {
        let mut buf = ConnectionBuffer::new(256, 1024);

        feed(&mut buf, b"hello<E");
        assert!(buf.drain().unwrap().messages.is_empty());

        feed(&mut buf, b"OM>");
        assert_eq!(buf.drain().unwrap().messages, vec!["hello".to_string()]);
    }

    #[test]
    fn test_end_of_stream_after_messages() {
        let mut buf = ConnectionBuffer::new(256, 1024);

        feed(&mut buf, b"one<EOM>two<EOM><EOF>");
        let drained = buf.drain().unwrap();
        assert_eq!(drained.messages, vec!["one".to_string(), "two".to_string()]);
        assert!(drained.end_of_stream);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_end_of_stream_token_split_across_reads() {
        let mut buf = ConnectionBuffer::new(256, 1024);

        feed(&mut buf, b"<EO");
        assert!(!buf.drain().unwrap().end_of_stream);

        feed(&mut buf, b"F>");
        assert!(buf.drain().unwrap().end_of_stream);
    }

    #[test]
    fn test_multibyte_char_split_across_reads() {
        let mut buf = ConnectionBuffer::new(256, 1024);
        let text = "ü<EOM>".as_bytes();

        feed(&mut buf, &text[..1]);
        assert!(buf.drain().unwrap().messages.is_empty());
        assert_eq!(buf.pending_len(), 1);

        feed(&mut buf, &text[1..]);
        assert_eq!(buf.drain().unwrap().messages, vec!["ü".to_string()]);
    }

    #[test]
    fn test_invalid_utf8_is_replaced() {
        let mut buf = ConnectionBuffer::new(256, 1024);
        feed(&mut buf, b"a\xFFb<EOM>");
        assert_eq!(buf.drain().unwrap().messages, vec!["a\u{FFFD}b".to_string()]);
    }

    #[test]
    fn test_overflow_when_remainder_exceeds_cap() {
        let mut buf = ConnectionBuffer::new(16, 8);
        feed(&mut buf, b"0123456789");
        let err = buf.drain().unwrap_err();
        assert!(matches!(err, FrameError::BufferOverflow { size: 10, max: 8 }));
    }

    #[test]
    fn test_complete_messages_do_not_count_against_cap() {
        let mut buf = ConnectionBuffer::new(64, 8);
        feed(&mut buf, b"a long message<EOM>ok");
        let drained = buf.drain().unwrap();
        assert_eq!(drained.messages, vec!["a long message".to_string()]);
        assert_eq!(buf.pending_text(), "ok");
    }

    #[test]
    fn test_commit_clamps_to_window() {
        let mut buf = ConnectionBuffer::new(4, 1024);
        buf.window_mut().copy_from_slice(b"abcd");
        buf.commit(100);
        assert_eq!(buf.pending_text(), "abcd");
        assert_eq!(buf.chunk_size(), 4);
    }
}
