use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::measurement::{FieldMap, MeasurementRecord, Sample, Selection};
use crate::proto::command::{clamp_sample_rate, Command, FlowUnits};
use crate::proto::response::check_ack;
use crate::proto::session::{Session, SessionConfig};
use crate::proto::sink::TracingSink;
use crate::proto::{ProtoError, Result};

/// Identification strings of a flow meter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub serial: String,
    pub model: String,
    pub firmware: String,
    pub calibration_date: String,
}

/// Protocol client for a TSI flow meter.
#[derive(Debug)]
pub struct Device {
    session: Session,
    sample_rate: Option<u16>,
}

impl Device {
    /// Open the configured port, or probe the candidate ports for a device.
    pub fn open(config: &SessionConfig) -> Result<Self> {
        let session = Session::open(config, Arc::new(TracingSink))?;
        Ok(Self::with_session(session))
    }

    pub fn with_session(session: Session) -> Self {
        Self {
            session,
            sample_rate: None,
        }
    }

    #[cfg(test)]
    pub(crate) fn new_faked(
        response: &str,
        config: &SessionConfig,
    ) -> (Self, Arc<std::sync::Mutex<Vec<u8>>>) {
        Self::new_faked_channel(crate::proto::fake::FakeChannel::new(response), config)
    }

    #[cfg(test)]
    pub(crate) fn new_faked_channel(
        channel: crate::proto::fake::FakeChannel,
        config: &SessionConfig,
    ) -> (Self, Arc<std::sync::Mutex<Vec<u8>>>) {
        let written = channel.written();
        let session = Session::with_channel(
            "FAKE",
            Box::new(channel),
            config,
            Arc::new(crate::proto::sink::NullSink),
        );
        (Self::with_session(session), written)
    }

    pub fn port(&self) -> &str {
        self.session.port()
    }

    /// Sample rate in ms applied by the last successful `set_sample_rate`.
    pub fn sample_rate(&self) -> Option<u16> {
        self.sample_rate
    }

    /// Send a command and wait for its acknowledgement. The remaining lines
    /// of an aborted stream are read first.
    fn command(&mut self, command: &Command) -> Result<()> {
        if self.session.is_unterminated() {
            self.session.drain_stream()?;
        }
        self.session.send(&command.to_string())?;
        let ack = self.session.receive()?;
        check_ack(&ack)
    }

    fn query(&mut self, command: Command) -> Result<String> {
        debug_assert!(command.has_payload());
        self.command(&command)?;
        Ok(self.session.receive()?.trim().to_string())
    }

    /// Set the sample rate in milliseconds per sample, clamped to 1..=1000.
    /// Returns the rate that was sent.
    pub fn set_sample_rate(&mut self, rate: i64) -> Result<u16> {
        let applied = clamp_sample_rate(rate);
        tracing::info!("Setting sample rate to {} ms", applied);
        self.command(&Command::SetSampleRate(applied))?;
        self.sample_rate = Some(applied);
        Ok(applied)
    }

    pub fn set_units(&mut self, units: FlowUnits) -> Result<()> {
        self.command(&Command::SetUnits(units))
    }

    pub fn serial_number(&mut self) -> Result<String> {
        self.query(Command::SerialNumber)
    }

    /// Date of the last calibration, as reported by the device (month/day/year).
    pub fn calibration_date(&mut self) -> Result<String> {
        self.query(Command::CalibrationDate)
    }

    pub fn model_number(&mut self) -> Result<String> {
        self.query(Command::ModelNumber)
    }

    pub fn firmware_revision(&mut self) -> Result<String> {
        self.query(Command::FirmwareRevision)
    }

    pub fn identity(&mut self) -> Result<Identity> {
        Ok(Identity {
            serial: self.serial_number()?,
            model: self.model_number()?,
            firmware: self.firmware_revision()?,
            calibration_date: self.calibration_date()?,
        })
    }

    /// Start a flow/temperature/pressure measurement of `samples` lines
    /// (clamped to 1..=9999) and return the decoded lines as they arrive.
    ///
    /// Nothing is sent if the selection is empty. The stream ends at the
    /// first empty line; there is no bound on the number of lines.
    pub fn stream_ftp(&mut self, selection: Selection, samples: i64) -> Result<FtpStream<'_>> {
        let map = selection.field_map()?;
        let command = Command::measure_ftp(selection, samples);
        tracing::debug!(fields = ?map.quantities(), "Starting measurement {}", command);
        self.command(&command)?;
        Ok(FtpStream {
            lines: LineStream::new(&mut self.session, self.sample_rate),
            map,
        })
    }

    /// Collect a whole flow/temperature/pressure measurement.
    ///
    /// A malformed line aborts the measurement and the samples decoded so far
    /// are dropped.
    pub fn measure_ftp(&mut self, selection: Selection, samples: i64) -> Result<MeasurementRecord> {
        let stream = self.stream_ftp(selection, samples)?;
        let mut record = MeasurementRecord::new(stream.field_map());
        for sample in stream {
            record.push(sample?);
        }
        Ok(record)
    }

    /// Start a volume measurement, one value per line.
    pub fn stream_volume(&mut self, samples: i64) -> Result<VolumeStream<'_>> {
        self.command(&Command::measure_volume(samples))?;
        Ok(VolumeStream {
            lines: LineStream::new(&mut self.session, self.sample_rate),
        })
    }

    pub fn measure_volume(&mut self, samples: i64) -> Result<Vec<f64>> {
        self.stream_volume(samples)?.collect()
    }

    pub fn close(self) {
        self.session.close();
    }
}

/// Lines of a streamed response up to, not including, the empty line.
///
/// Each line may take one sample period plus the session timeout. Lines left
/// unread when the stream is dropped are drained by the next command.
struct LineStream<'a> {
    session: &'a mut Session,
    line_wait: Duration,
    deadline: Option<Instant>,
    done: bool,
}

impl<'a> LineStream<'a> {
    fn new(session: &'a mut Session, sample_rate: Option<u16>) -> Self {
        let line_wait = session.timeout()
            + sample_rate.map_or(Duration::ZERO, |ms| Duration::from_millis(u64::from(ms)));
        session.begin_stream(line_wait);
        let deadline = session.stream_deadline().map(|d| Instant::now() + d);
        Self {
            session,
            line_wait,
            deadline,
            done: false,
        }
    }

    fn next_line(&mut self) -> Option<Result<String>> {
        if self.done {
            return None;
        }
        if let Some(deadline) = self.deadline {
            if Instant::now() >= deadline {
                self.done = true;
                return Some(Err(ProtoError::TransportRead(io::Error::new(
                    io::ErrorKind::TimedOut,
                    "Stream deadline exceeded before end of measurement",
                ))));
            }
        }
        match self.session.receive_within(self.line_wait) {
            Ok(line) if line.is_empty() => {
                self.session.end_stream();
                self.done = true;
                None
            }
            Ok(line) => Some(Ok(line)),
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}

/// Decoded lines of a running flow/temperature/pressure measurement.
///
/// Borrows the device, so no other command can be sent until the stream is dropped.
pub struct FtpStream<'a> {
    lines: LineStream<'a>,
    map: FieldMap,
}

impl FtpStream<'_> {
    pub fn field_map(&self) -> &FieldMap {
        &self.map
    }
}

impl Iterator for FtpStream<'_> {
    type Item = Result<Sample>;

    fn next(&mut self) -> Option<Self::Item> {
        let line = match self.lines.next_line()? {
            Ok(line) => line,
            Err(err) => return Some(Err(err)),
        };
        match self.map.decode(&line) {
            Ok(sample) => Some(Ok(sample)),
            Err(err) => {
                self.lines.done = true;
                Some(Err(err))
            }
        }
    }
}

/// Values of a running volume measurement.
pub struct VolumeStream<'a> {
    lines: LineStream<'a>,
}

impl Iterator for VolumeStream<'_> {
    type Item = Result<f64>;

    fn next(&mut self) -> Option<Self::Item> {
        let line = match self.lines.next_line()? {
            Ok(line) => line,
            Err(err) => return Some(Err(err)),
        };
        match line.parse::<f64>() {
            Ok(value) => Some(Ok(value)),
            Err(_) => {
                self.lines.done = true;
                Some(Err(ProtoError::MalformedSample { raw: line }))
            }
        }
    }
}
