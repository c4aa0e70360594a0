use bytes::BytesMut;
use std::io::{self, Read, Write};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::codec::{Decoder, Encoder};

use super::codec::LineCodec;
use super::discovery::{self, Candidates, PortOpener, SerialOpener};
use super::sink::{Direction, LogSink};
use super::{ProtoError, Result};
use crate::{DEFAULT_BAUDRATE, DEFAULT_TIMEOUT};

/// Any duplex byte channel a session can run on.
pub trait Channel: Read + Write + Send {}

impl<T> Channel for T where T: Read + Write + Send {}

/// Connection parameters. Framing is fixed to 8 data bits, no parity,
/// one stop bit and no flow control.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Explicit port. When `None`, `candidates` are probed.
    pub port: Option<String>,
    pub candidates: Candidates,
    pub baudrate: u32,
    /// Applies to each single read or write.
    pub timeout: Duration,
    /// Upper bound for a whole streamed measurement. `None` waits for the
    /// end-of-stream line for as long as the device keeps answering.
    pub stream_deadline: Option<Duration>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            port: None,
            candidates: Candidates::platform_default(),
            baudrate: DEFAULT_BAUDRATE,
            timeout: DEFAULT_TIMEOUT,
            stream_deadline: None,
        }
    }
}

/// One open connection to a device.
///
/// All methods take `&mut self`, so only one exchange can be in flight.
pub struct Session {
    port: String,
    channel: Box<dyn Channel>,
    codec: LineCodec,
    buf: BytesMut,
    timeout: Duration,
    stream_deadline: Option<Duration>,
    sink: Arc<dyn LogSink>,
    /// A streamed response was acknowledged and its empty line not read yet.
    unterminated: bool,
    line_wait: Duration,
}

impl Session {
    /// Open the configured port, or discover one if none is configured.
    pub fn open(config: &SessionConfig, sink: Arc<dyn LogSink>) -> Result<Self> {
        Self::open_with(config, &SerialOpener, sink)
    }

    pub fn open_with(
        config: &SessionConfig,
        opener: &dyn PortOpener,
        sink: Arc<dyn LogSink>,
    ) -> Result<Self> {
        match &config.port {
            Some(port) => {
                let channel = opener.open(port, config)?;
                tracing::info!(port = %port, "Opened serial port");
                Ok(Self::with_channel(port, channel, config, sink))
            }
            None => discovery::discover(&config.candidates, opener, config, sink),
        }
    }

    pub fn with_channel(
        port: impl Into<String>,
        channel: Box<dyn Channel>,
        config: &SessionConfig,
        sink: Arc<dyn LogSink>,
    ) -> Self {
        Self {
            port: port.into(),
            channel,
            codec: LineCodec::default(),
            buf: BytesMut::with_capacity(256),
            timeout: config.timeout,
            stream_deadline: config.stream_deadline,
            sink,
            unterminated: false,
            line_wait: config.timeout,
        }
    }

    pub fn port(&self) -> &str {
        &self.port
    }

    pub fn stream_deadline(&self) -> Option<Duration> {
        self.stream_deadline
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Write `line` followed by the line terminator.
    pub fn send(&mut self, line: &str) -> Result<()> {
        self.sink.record(Direction::ToDevice, &self.port, line);
        let mut out = BytesMut::with_capacity(line.len() + 1);
        self.codec
            .encode(line, &mut out)
            .map_err(ProtoError::TransportWrite)?;
        self.channel
            .write_all(&out)
            .and_then(|_| self.channel.flush())
            .map_err(ProtoError::TransportWrite)
    }

    /// Block until a full line arrived and return it without terminator and
    /// surrounding whitespace. An empty line is returned as an empty string.
    pub fn receive(&mut self) -> Result<String> {
        self.receive_within(self.timeout)
    }

    /// Like `receive`, but waits up to `wait` for the line.
    pub fn receive_within(&mut self, wait: Duration) -> Result<String> {
        let received = self.read_line(wait);
        match &received {
            Ok(line) => self.sink.record(Direction::FromDevice, &self.port, line),
            Err(err) => self
                .sink
                .record(Direction::FromDevice, &self.port, &format!("<{}>", err)),
        }
        received
    }

    fn read_line(&mut self, wait: Duration) -> Result<String> {
        let deadline = Instant::now() + wait;
        let mut chunk = [0u8; 256];
        loop {
            if let Some(line) = self
                .codec
                .decode(&mut self.buf)
                .map_err(ProtoError::TransportRead)?
            {
                return Ok(line);
            }
            if Instant::now() >= deadline {
                return Err(ProtoError::TransportRead(io::Error::new(
                    io::ErrorKind::TimedOut,
                    format!("No complete line from {} within {:?}", self.port, wait),
                )));
            }
            match self.channel.read(&mut chunk) {
                Ok(0) => {
                    return Err(ProtoError::TransportRead(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "Connection was closed",
                    )))
                }
                Ok(n) => self.buf.extend_from_slice(&chunk[..n]),
                Err(err)
                    if matches!(
                        err.kind(),
                        io::ErrorKind::Interrupted | io::ErrorKind::TimedOut
                    ) => {}
                Err(err) => return Err(ProtoError::TransportRead(err)),
            }
        }
    }

    /// Mark the start of a streamed response that ends with an empty line
    /// and sends one line per `line_wait` at most.
    pub(crate) fn begin_stream(&mut self, line_wait: Duration) {
        self.unterminated = true;
        self.line_wait = line_wait;
    }

    pub(crate) fn end_stream(&mut self) {
        self.unterminated = false;
    }

    /// True while the lines of an aborted stream may still be pending.
    pub fn is_unterminated(&self) -> bool {
        self.unterminated
    }

    /// Discard the rest of an unterminated stream up to its empty line.
    ///
    /// A device that stays silent for a whole line wait has nothing left to
    /// send, so the stream counts as finished. Returns the number of
    /// discarded lines.
    pub fn drain_stream(&mut self) -> Result<usize> {
        let mut discarded = 0;
        while self.unterminated {
            match self.receive_within(self.line_wait) {
                Ok(line) if line.is_empty() => self.unterminated = false,
                Ok(_) => discarded += 1,
                Err(ProtoError::TransportRead(err)) if err.kind() == io::ErrorKind::TimedOut => {
                    tracing::warn!(port = %self.port, "No end of stream before timeout");
                    self.buf.clear();
                    self.unterminated = false;
                }
                Err(err) => return Err(err),
            }
        }
        if discarded > 0 {
            tracing::debug!(port = %self.port, "Discarded {} pending stream lines", discarded);
        }
        Ok(discarded)
    }

    /// Close the connection.
    pub fn close(self) {
        tracing::debug!(port = %self.port, "Closing serial port");
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("port", &self.port)
            .field("timeout", &self.timeout)
            .field("stream_deadline", &self.stream_deadline)
            .field("unterminated", &self.unterminated)
            .finish()
    }
}
