use std::collections::VecDeque;
use std::io::{ErrorKind, Read};

use litebus_transport::BusStream;
use tracing::debug;

use crate::buffer::ConnectionBuffer;
use crate::codec::FrameConfig;
use crate::error::{transport_to_frame_error, Result};

/// One step of an incoming message stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadEvent {
    /// A complete message, delimiter stripped.
    Message(String),
    /// The peer sent `<EOF>`.
    EndOfStream,
    /// The peer closed the connection without sending `<EOF>`.
    Closed,
}

/// Reads complete messages from any `Read` stream.
///
/// Handles partial reads internally; callers always get whole messages, in
/// the order they were sent. Once the stream ends, every later call returns
/// the same terminal event.
#[derive(Debug)]
pub struct MessageReader<T> {
    inner: T,
    buffer: ConnectionBuffer,
    ready: VecDeque<String>,
    finished: Option<ReadEvent>,
    config: FrameConfig,
}

impl<T: Read> MessageReader<T> {
    /// Create a new message reader with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new message reader with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            buffer: ConnectionBuffer::new(config.chunk_size, config.max_buffer_size),
            ready: VecDeque::new(),
            finished: None,
            config,
        }
    }

    /// Read the next event (blocking).
    ///
    /// Messages that arrived before `<EOF>` are returned before
    /// [`ReadEvent::EndOfStream`].
    pub fn read_event(&mut self) -> Result<ReadEvent> {
        loop {
            if let Some(message) = self.ready.pop_front() {
                return Ok(ReadEvent::Message(message));
            }
            if let Some(terminal) = &self.finished {
                return Ok(terminal.clone());
            }

            let read = match self.inner.read(self.buffer.window_mut()) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(err.into()),
            };

            if read == 0 {
                if !self.buffer.is_empty() {
                    debug!(
                        discarded = self.buffer.pending_len(),
                        "stream closed with an incomplete message"
                    );
                }
                self.finished = Some(ReadEvent::Closed);
                continue;
            }

            self.buffer.commit(read);
            let drained = self.buffer.drain()?;
            self.ready.extend(drained.messages);
            if drained.end_of_stream {
                self.finished = Some(ReadEvent::EndOfStream);
            }
        }
    }

    /// Read the next message, or `None` once the stream has ended.
    pub fn read_message(&mut self) -> Result<Option<String>> {
        match self.read_event()? {
            ReadEvent::Message(message) => Ok(Some(message)),
            ReadEvent::EndOfStream | ReadEvent::Closed => Ok(None),
        }
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Current message reader configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

impl MessageReader<BusStream> {
    /// Create a message reader for `BusStream` and apply read timeout from config.
    pub fn with_config_stream(inner: BusStream, config: FrameConfig) -> Result<Self> {
        inner
            .set_read_timeout(config.read_timeout)
            .map_err(transport_to_frame_error)?;
        Ok(Self::with_config(inner, config))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::error::FrameError;

    fn message(text: &str) -> ReadEvent {
        ReadEvent::Message(text.to_string())
    }

    #[test]
    fn read_single_message() {
        let mut reader = MessageReader::new(Cursor::new(b"hello<EOM>".to_vec()));
        assert_eq!(reader.read_event().unwrap(), message("hello"));
        assert_eq!(reader.read_event().unwrap(), ReadEvent::Closed);
    }

    #[test]
    fn read_messages_split_across_reads() {
        let chunked = ChunkedReader::new(vec![b"A<EOM>B".to_vec(), b"<EOM>C<EOM>".to_vec()]);
        let mut reader = MessageReader::new(chunked);

        assert_eq!(reader.read_event().unwrap(), message("A"));
        assert_eq!(reader.read_event().unwrap(), message("B"));
        assert_eq!(reader.read_event().unwrap(), message("C"));
        assert_eq!(reader.read_event().unwrap(), ReadEvent::Closed);
    }

    #[test]
    fn byte_by_byte_delivery() {
        let wire = b"slow<EOM>and steady<EOM>".to_vec();
        let chunks = wire.iter().map(|b| vec![*b]).collect();
        let mut reader = MessageReader::new(ChunkedReader::new(chunks));

        assert_eq!(reader.read_event().unwrap(), message("slow"));
        assert_eq!(reader.read_event().unwrap(), message("and steady"));
    }

    #[test]
    fn message_longer_than_chunk_size() {
        let long = "x".repeat(1000);
        let wire = format!("{long}<EOM>");
        let mut reader = MessageReader::new(Cursor::new(wire.into_bytes()));

        assert_eq!(reader.read_event().unwrap(), message(&long));
    }

    #[test]
    fn end_of_stream_after_messages() {
        let mut reader = MessageReader::new(Cursor::new(b"one<EOM>two<EOM><EOF>".to_vec()));

        assert_eq!(reader.read_event().unwrap(), message("one"));
        assert_eq!(reader.read_event().unwrap(), message("two"));
        assert_eq!(reader.read_event().unwrap(), ReadEvent::EndOfStream);
        // Terminal events are sticky.
        assert_eq!(reader.read_event().unwrap(), ReadEvent::EndOfStream);
    }

    #[test]
    fn nothing_is_read_past_end_of_stream() {
        let mut reader = MessageReader::new(ChunkedReader::new(vec![
            b"<EOF>".to_vec(),
            b"late<EOM>".to_vec(),
        ]));

        assert_eq!(reader.read_event().unwrap(), ReadEvent::EndOfStream);
        assert_eq!(reader.read_event().unwrap(), ReadEvent::EndOfStream);
        assert_eq!(reader.get_ref().remaining(), 1);
    }

    #[test]
    fn closed_with_partial_message() {
        let mut reader = MessageReader::new(Cursor::new(b"done<EOM>trunc".to_vec()));
        assert_eq!(reader.read_message().unwrap(), Some("done".to_string()));
        assert_eq!(reader.read_message().unwrap(), None);
        assert_eq!(reader.read_event().unwrap(), ReadEvent::Closed);
    }

    #[test]
    fn oversized_pending_text_fails() {
        let cfg = FrameConfig {
            max_buffer_size: 16,
            ..FrameConfig::default()
        };
        let wire = "y".repeat(64);
        let mut reader = MessageReader::with_config(Cursor::new(wire.into_bytes()), cfg);

        let err = reader.read_event().unwrap_err();
        assert!(matches!(err, FrameError::BufferOverflow { .. }));
    }

    #[test]
    fn interrupted_read_retries() {
        let reader = InterruptedThenData {
            interrupted: false,
            inner: Cursor::new(b"ok<EOM>".to_vec()),
        };
        let mut framed = MessageReader::new(reader);
        assert_eq!(framed.read_event().unwrap(), message("ok"));
    }

    #[test]
    fn would_block_propagates_io_error() {
        let mut framed = MessageReader::new(WouldBlockReader);
        let err = framed.read_event().unwrap_err();
        assert!(matches!(err, FrameError::Io(e) if e.kind() == ErrorKind::WouldBlock));
    }

    #[test]
    fn accessors_and_into_inner() {
        let mut reader = MessageReader::new(Cursor::new(Vec::<u8>::new()));
        let _ = reader.get_ref();
        let _ = reader.get_mut();
        assert_eq!(reader.config().chunk_size, 256);
        let _inner = reader.into_inner();
    }

    #[test]
    fn roundtrip_over_tcp() {
        let listener = litebus_transport::TcpTransport::bind("127.0.0.1", 0).unwrap();
        let port = listener.local_addr().port();

        let client = std::thread::spawn(move || {
            let stream = litebus_transport::TcpTransport::connect("127.0.0.1", port).unwrap();
            let mut writer = crate::writer::MessageWriter::new(stream);
            writer.send("ping").unwrap();
            writer.send("pong").unwrap();
            writer.send_end_of_stream().unwrap();
        });

        let stream = listener.accept().unwrap();
        let mut reader = MessageReader::with_config_stream(stream, FrameConfig::default()).unwrap();
        assert_eq!(reader.read_event().unwrap(), message("ping"));
        assert_eq!(reader.read_event().unwrap(), message("pong"));
        assert_eq!(reader.read_event().unwrap(), ReadEvent::EndOfStream);

        client.join().unwrap();
    }

    /// Hands out one pre-cut chunk per read call.
    struct ChunkedReader {
        chunks: VecDeque<Vec<u8>>,
    }

    impl ChunkedReader {
        fn new(chunks: Vec<Vec<u8>>) -> Self {
            Self {
                chunks: chunks.into(),
            }
        }

        fn remaining(&self) -> usize {
            self.chunks.len()
        }
    }

    impl Read for ChunkedReader {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            let Some(chunk) = self.chunks.pop_front() else {
                return Ok(0);
            };
            assert!(chunk.len() <= buf.len(), "test chunk larger than window");
            buf[..chunk.len()].copy_from_slice(&chunk);
            Ok(chunk.len())
        }
    }

    struct InterruptedThenData {
        interrupted: bool,
        inner: Cursor<Vec<u8>>,
    }

    impl Read for InterruptedThenData {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if !self.interrupted {
                self.interrupted = true;
                return Err(std::io::Error::from(ErrorKind::Interrupted));
            }
            self.inner.read(buf)
        }
    }

    struct WouldBlockReader;

    impl Read for WouldBlockReader {
        fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
            Err(std::io::Error::from(ErrorKind::WouldBlock))
        }
    }
}
