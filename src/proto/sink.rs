use std::fmt;

/// Direction of a logged protocol line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    ToDevice,
    FromDevice,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::ToDevice => f.write_str("to"),
            Direction::FromDevice => f.write_str("from"),
        }
    }
}

/// Receives one record for every line sent to or received from a device.
pub trait LogSink: Send + Sync {
    fn record(&self, direction: Direction, endpoint: &str, message: &str);
}

/// Emits every exchange as a `tracing` event.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn record(&self, direction: Direction, endpoint: &str, message: &str) {
        tracing::debug!(
            target: "tsiflow::wire",
            %direction,
            port = endpoint,
            payload = message,
            "{} TSI@{}: {}",
            direction,
            endpoint,
            message
        );
    }
}

/// Discards all records.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl LogSink for NullSink {
    fn record(&self, _direction: Direction, _endpoint: &str, _message: &str) {}
}
