//!
//! This library provides communication with a TSI laboratory flow meter
//! over its ASCII serial protocol.
//!
//! <br>
//!
//! # Details
//!
//! - The device is connected through a serial (RS-232 or USB) port running
//!   at 38400 baud, 8N1, without flow control.
//!
//! - Basic setup and connection
//!
//!   ```no_run
//!   use tsiflow::{Device, SessionConfig};
//!
//!   fn main() -> tsiflow::Result<()> {
//!       let config = SessionConfig {
//!           port: Some(tsiflow::DEFAULT_TTY.to_string()),
//!           ..SessionConfig::default()
//!       };
//!       let mut device = Device::open(&config)?;
//!       eprintln!("Connected to: {}\n", device.model_number()?);
//!       Ok(())
//!   }
//!   ```
//!
//! - Without an explicit port, the candidate ports (`COM0`..`COM255` on
//!   Windows, `/dev/ttyS*` and `/dev/ttyUSB*` elsewhere) are probed and the
//!   first one answering is used.
//!
//! - Measuring flow and pressure
//!
//!   ```no_run
//!   use tsiflow::{measurement::Selection, Device, SessionConfig};
//!
//!   fn main() -> tsiflow::Result<()> {
//!       let mut device = Device::open(&SessionConfig::default())?;
//!       device.set_sample_rate(10)?;
//!       let selection = Selection { flow: true, temperature: false, pressure: true };
//!       let record = device.measure_ftp(selection, 100)?;
//!       println!("{:?}", record.flow());
//!       Ok(())
//!   }
//!   ```
//!
//! # Supported devices
//!
//!  * TSI 4000/4100 series flow meters
//!

pub mod device;
pub mod measurement;
pub mod proto;

use std::time::Duration;

pub use device::Device;
pub use proto::session::SessionConfig;
pub use proto::{ProtoError, Result};

#[cfg(unix)]
pub const DEFAULT_TTY: &str = "/dev/ttyUSB0";
#[cfg(windows)]
pub const DEFAULT_TTY: &str = "COM1";

/// Baudrate of the TSI serial interface.
pub const DEFAULT_BAUDRATE: u32 = 38400;

/// Default timeout for a single read or write. Longer than the slowest
/// sample period of 1000 ms.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(2);
