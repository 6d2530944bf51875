use std::io::{ErrorKind, Write};

use bytes::BytesMut;
use litebus_transport::BusStream;

use crate::codec::{encode_end_of_stream, encode_message, FrameConfig};
use crate::error::{transport_to_frame_error, FrameError, Result};

const INITIAL_BUFFER_CAPACITY: usize = 1024;

/// Writes complete messages to any `Write` stream.
///
/// Each call returns only once the whole encoded message has been handed to
/// the stream and flushed.
#[derive(Debug)]
pub struct MessageWriter<T> {
    inner: T,
    buf: BytesMut,
    config: FrameConfig,
}

impl<T: Write> MessageWriter<T> {
    /// Create a new message writer with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new message writer with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            config,
        }
    }

    /// Send one message, appending `<EOM>` (blocking).
    pub fn send(&mut self, text: &str) -> Result<()> {
        self.buf.clear();
        encode_message(text, &mut self.buf);
        self.write_buffered()
    }

    /// Send the `<EOF>` end-of-stream signal (blocking).
    pub fn send_end_of_stream(&mut self) -> Result<()> {
        self.buf.clear();
        encode_end_of_stream(&mut self.buf);
        self.write_buffered()
    }

    fn write_buffered(&mut self) -> Result<()> {
        let mut offset = 0usize;
        while offset < self.buf.len() {
            match self.inner.write(&self.buf[offset..]) {
                Ok(0) => return Err(FrameError::ConnectionClosed),
                Ok(n) => offset += n,
                Err(err) if self.is_retryable(err.kind()) => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }

        self.flush()
    }

    /// Flush the underlying stream.
    pub fn flush(&mut self) -> Result<()> {
        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if self.is_retryable(err.kind()) => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
    }

    /// With a write timeout set, `WouldBlock` means the timeout expired.
    fn is_retryable(&self, kind: ErrorKind) -> bool {
        match kind {
            ErrorKind::Interrupted => true,
            ErrorKind::WouldBlock => self.config.write_timeout.is_none(),
            _ => false,
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

    /// Consume the writer and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Current message writer configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

impl MessageWriter<BusStream> {
    /// Create a message writer for `BusStream` and apply write timeout from config.
    pub fn with_config_stream(inner: BusStream, config: FrameConfig) -> Result<Self> {
        inner
            .set_write_timeout(config.write_timeout)
            .map_err(transport_to_frame_error)?;
        Ok(Self::with_config(inner, config))
    }
}
