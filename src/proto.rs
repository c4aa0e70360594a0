pub mod codec;
pub mod command;
pub mod discovery;
pub mod response;
pub mod session;
pub mod sink;

#[cfg(test)]
pub mod fake;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProtoError {
    #[error("Unable to write to device: {:?}", _0)]
    TransportWrite(std::io::Error),

    #[error("Unable to read from device: {:?}", _0)]
    TransportRead(std::io::Error),

    #[error("Unable to open serial port: {:?}", _0)]
    Open(#[from] serialport::Error),

    #[error("No device answered the probe on any candidate port")]
    NoDeviceFound,
    #[error("Device returned error {code}")]
    Device { code: u16 },
    #[error("Unexpected response: {raw:?}")]
    UnexpectedResponse { raw: String },
    #[error("At least one of flow, temperature or pressure must be selected")]
    InvalidSelection,
    #[error("Malformed sample line: {raw:?}")]
    MalformedSample { raw: String },
}

pub type Result<T> = std::result::Result<T, ProtoError>;
