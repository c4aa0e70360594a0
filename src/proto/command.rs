use std::fmt;
use std::ops::RangeInclusive;

use crate::measurement::Selection;

/// Valid sample rates in milliseconds per sample.
pub const SAMPLE_RATE_RANGE: RangeInclusive<i64> = 1..=1000;
/// Valid number of samples for a streamed measurement.
pub const SAMPLE_COUNT_RANGE: RangeInclusive<i64> = 1..=9999;

/// Clamp `value` into `range` and render it as exactly four decimal digits.
///
/// The device expects fixed-width numeric arguments. Out of range values are
/// silently adjusted to the closest limit.
pub fn fixed_width(value: i64, range: &RangeInclusive<i64>) -> String {
    let clamped = value.clamp(*range.start(), *range.end());
    format!("{:04}", clamped)
}

/// Flow units used for display and serial output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FlowUnits {
    /// Standard flow rate (std l/min).
    #[default]
    Standard,
    /// Volumetric flow rate.
    Volumetric,
}

impl FlowUnits {
    pub fn code(&self) -> char {
        match self {
            FlowUnits::Standard => 'S',
            FlowUnits::Volumetric => 'V',
        }
    }
}

impl fmt::Display for FlowUnits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlowUnits::Standard => f.write_str("standard"),
            FlowUnits::Volumetric => f.write_str("volumetric"),
        }
    }
}

impl std::str::FromStr for FlowUnits {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "standard" | "std" | "s" => Ok(Self::Standard),
            "volumetric" | "vol" | "v" => Ok(Self::Volumetric),
            _ => Err(format!("Unknown flow units: {}", s)),
        }
    }
}

/// A single request to the device. Numeric arguments are stored already
/// clamped, use the constructors to build them from arbitrary input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Presence check, only used during port discovery.
    Probe,
    SetSampleRate(u16),
    SetUnits(FlowUnits),
    SerialNumber,
    CalibrationDate,
    ModelNumber,
    FirmwareRevision,
    MeasureFtp { selection: Selection, samples: u16 },
    MeasureVolume { samples: u16 },
}

fn clamp_to_u16(value: i64, range: &RangeInclusive<i64>) -> u16 {
    // Both ranges lie well within u16.
    value.clamp(*range.start(), *range.end()) as u16
}

/// Sample rate the device will actually use for a requested `rate`.
pub fn clamp_sample_rate(rate: i64) -> u16 {
    clamp_to_u16(rate, &SAMPLE_RATE_RANGE)
}

impl Command {
    pub fn set_sample_rate(rate: i64) -> Self {
        Self::SetSampleRate(clamp_sample_rate(rate))
    }

    pub fn measure_ftp(selection: Selection, samples: i64) -> Self {
        Self::MeasureFtp {
            selection,
            samples: clamp_to_u16(samples, &SAMPLE_COUNT_RANGE),
        }
    }

    pub fn measure_volume(samples: i64) -> Self {
        Self::MeasureVolume {
            samples: clamp_to_u16(samples, &SAMPLE_COUNT_RANGE),
        }
    }

    /// Returns true if a successful acknowledgement is followed by one payload line.
    pub fn has_payload(&self) -> bool {
        matches!(
            self,
            Command::SerialNumber
                | Command::CalibrationDate
                | Command::ModelNumber
                | Command::FirmwareRevision
        )
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Probe => f.write_str("?"),
            Command::SetSampleRate(rate) => write!(
                f,
                "SSR{}",
                fixed_width(i64::from(*rate), &SAMPLE_RATE_RANGE)
            ),
            Command::SetUnits(units) => write!(f, "SU{}", units.code()),
            Command::SerialNumber => f.write_str("SN"),
            Command::CalibrationDate => f.write_str("DATE"),
            Command::ModelNumber => f.write_str("MN"),
            Command::FirmwareRevision => f.write_str("REV"),
            // D: data transfer, C: ASCII lines, then F/T/P or 'x' per quantity
            Command::MeasureFtp { selection, samples } => write!(
                f,
                "DC{}{}",
                selection.mnemonic(),
                fixed_width(i64::from(*samples), &SAMPLE_COUNT_RANGE)
            ),
            Command::MeasureVolume { samples } => write!(
                f,
                "VA{}",
                fixed_width(i64::from(*samples), &SAMPLE_COUNT_RANGE)
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_fixed_width_rate_boundaries() {
        let got: Vec<String> = [-5, 0, 1, 500, 1000, 5000]
            .iter()
            .map(|r| fixed_width(*r, &SAMPLE_RATE_RANGE))
            .collect();
        assert_eq!(got, vec!["0001", "0001", "0001", "0500", "1000", "1000"]);
    }

    #[test]
    fn test_fixed_width_sample_count_boundaries() {
        assert_eq!(fixed_width(0, &SAMPLE_COUNT_RANGE), "0001");
        assert_eq!(fixed_width(42, &SAMPLE_COUNT_RANGE), "0042");
        assert_eq!(fixed_width(9999, &SAMPLE_COUNT_RANGE), "9999");
        assert_eq!(fixed_width(10_000, &SAMPLE_COUNT_RANGE), "9999");
        assert_eq!(fixed_width(i64::MIN, &SAMPLE_COUNT_RANGE), "0001");
    }

    #[test]
    fn test_wire_mnemonics() {
        assert_eq!(Command::Probe.to_string(), "?");
        assert_eq!(Command::set_sample_rate(5000).to_string(), "SSR1000");
        assert_eq!(Command::set_sample_rate(25).to_string(), "SSR0025");
        assert_eq!(Command::SetUnits(FlowUnits::Standard).to_string(), "SUS");
        assert_eq!(Command::SetUnits(FlowUnits::Volumetric).to_string(), "SUV");
        assert_eq!(Command::SerialNumber.to_string(), "SN");
        assert_eq!(Command::CalibrationDate.to_string(), "DATE");
        assert_eq!(Command::ModelNumber.to_string(), "MN");
        assert_eq!(Command::FirmwareRevision.to_string(), "REV");
        assert_eq!(Command::measure_volume(-3).to_string(), "VA0001");
    }

    #[test]
    fn test_measure_ftp_mnemonic() {
        let selection = Selection {
            flow: true,
            temperature: false,
            pressure: true,
        };
        assert_eq!(
            Command::measure_ftp(selection, 12).to_string(),
            "DCFxP0012"
        );
        assert_eq!(
            Command::measure_ftp(Selection::all(), 20_000).to_string(),
            "DCFTP9999"
        );
    }

    #[test]
    fn test_flow_units_parse() {
        assert_eq!("Volumetric".parse::<FlowUnits>(), Ok(FlowUnits::Volumetric));
        assert_eq!("s".parse::<FlowUnits>(), Ok(FlowUnits::Standard));
        assert!("mass".parse::<FlowUnits>().is_err());
    }
}
