//! `tokio_util::codec` adapter for the delimiter protocol.
//!
//! Lets callers that already run on tokio drive a litebus stream through
//! `Framed`/`FramedRead`/`FramedWrite` instead of the blocking reader and
//! writer.

use bytes::{Buf, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::codec::{encode_message, DEFAULT_MAX_BUFFER, EOF, EOM};
use crate::error::{FrameError, Result};
use crate::reader::ReadEvent;

/// Decodes [`ReadEvent`]s and encodes outgoing message text.
#[derive(Debug, Clone)]
pub struct MessageCodec {
    max_buffer_size: usize,
    finished: bool,
}

impl MessageCodec {
    pub fn new() -> Self {
        Self::with_max_buffer(DEFAULT_MAX_BUFFER)
    }

    pub fn with_max_buffer(max_buffer_size: usize) -> Self {
        Self {
            max_buffer_size,
            finished: false,
        }
    }
}

impl Default for MessageCodec {
    fn default() -> Self {
        Self::new()
    }
}

fn find(haystack: &[u8], needle: &str) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle.as_bytes())
}

impl Decoder for MessageCodec {
    type Item = ReadEvent;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<ReadEvent>> {
        loop {
            if self.finished {
                src.clear();
                return Ok(None);
            }

            if let Some(pos) = find(src, EOM) {
                let fragment = src.split_to(pos);
                src.advance(EOM.len());
                if fragment.is_empty() {
                    continue;
                }
                let text = String::from_utf8_lossy(&fragment).into_owned();
                return Ok(Some(ReadEvent::Message(text)));
            }

            if find(src, EOF).is_some() {
                self.finished = true;
                src.clear();
                return Ok(Some(ReadEvent::EndOfStream));
            }

            if src.len() > self.max_buffer_size {
                return Err(FrameError::BufferOverflow {
                    size: src.len(),
                    max: self.max_buffer_size,
                });
            }
            return Ok(None);
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<ReadEvent>> {
        if let Some(event) = self.decode(src)? {
            return Ok(Some(event));
        }
        if self.finished {
            return Ok(None);
        }
        self.finished = true;
        src.clear();
        Ok(Some(ReadEvent::Closed))
    }
}

impl Encoder<&str> for MessageCodec {
    type Error = FrameError;

    fn encode(&mut self, item: &str, dst: &mut BytesMut) -> Result<()> {
        encode_message(item, dst);
        Ok(())
    }
}
