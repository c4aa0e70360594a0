use std::ops::Range;
use std::sync::Arc;

use serialport::{DataBits, FlowControl, Parity, StopBits};

use super::command::Command;
use super::response::OK_TOKEN;
use super::session::{Channel, Session, SessionConfig};
use super::sink::LogSink;
use super::{ProtoError, Result};

/// Address space searched when no explicit port is configured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Candidates {
    /// `prefix` followed by each number of `range`, e.g. `COM0` .. `COM255`.
    Numbered { prefix: String, range: Range<u16> },
    /// Glob patterns over device files, expanded in the given order.
    Patterns(Vec<String>),
    /// A fixed list of port names.
    List(Vec<String>),
}

impl Candidates {
    #[cfg(windows)]
    pub fn platform_default() -> Self {
        Self::Numbered {
            prefix: "COM".to_string(),
            range: 0..256,
        }
    }

    #[cfg(not(windows))]
    pub fn platform_default() -> Self {
        Self::Patterns(vec!["/dev/ttyS*".to_string(), "/dev/ttyUSB*".to_string()])
    }

    /// Port names in probing order.
    pub fn expand(&self) -> Vec<String> {
        match self {
            Candidates::Numbered { prefix, range } => {
                range.clone().map(|n| format!("{}{}", prefix, n)).collect()
            }
            Candidates::Patterns(patterns) => patterns
                .iter()
                .flat_map(|pattern| match glob::glob(pattern) {
                    Ok(paths) => paths
                        .filter_map(|entry| entry.ok())
                        .map(|path| path.to_string_lossy().to_string())
                        .collect::<Vec<String>>(),
                    Err(err) => {
                        tracing::warn!(pattern = %pattern, "Invalid port pattern: {}", err);
                        Vec::new()
                    }
                })
                .collect(),
            Candidates::List(ports) => ports.clone(),
        }
    }
}

/// Opens a channel to a named port.
pub trait PortOpener {
    fn open(&self, port: &str, config: &SessionConfig) -> Result<Box<dyn Channel>>;
}

/// Opens real serial ports with the fixed framing parameters.
#[derive(Debug, Default, Clone, Copy)]
pub struct SerialOpener;

impl PortOpener for SerialOpener {
    fn open(&self, port: &str, config: &SessionConfig) -> Result<Box<dyn Channel>> {
        let port = serialport::new(port, config.baudrate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(config.timeout)
            .open()?;
        Ok(Box::new(port))
    }
}

/// Probe each candidate in order and keep the first one answering `?` with `OK`.
///
/// Ports that fail to open, fail the probe exchange or answer anything else
/// are closed before the next candidate is tried.
pub fn discover(
    candidates: &Candidates,
    opener: &dyn PortOpener,
    config: &SessionConfig,
    sink: Arc<dyn LogSink>,
) -> Result<Session> {
    for port in candidates.expand() {
        tracing::debug!(port = %port, "Probing port");
        let channel = match opener.open(&port, config) {
            Ok(channel) => channel,
            Err(err) => {
                tracing::debug!(port = %port, "Unable to open: {}", err);
                continue;
            }
        };
        let mut session = Session::with_channel(port.as_str(), channel, config, sink.clone());
        match probe(&mut session) {
            Ok(true) => {
                tracing::info!(port = %port, "Found device");
                return Ok(session);
            }
            Ok(false) => tracing::debug!(port = %port, "No device answered"),
            Err(err) => tracing::debug!(port = %port, "Probe failed: {}", err),
        }
        session.close();
    }
    Err(ProtoError::NoDeviceFound)
}

fn probe(session: &mut Session) -> Result<bool> {
    session.send(&Command::Probe.to_string())?;
    Ok(session.receive()? == OK_TOKEN)
}
