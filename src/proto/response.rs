use super::{ProtoError, Result};

/// Success token sent as the first line of every accepted command.
pub const OK_TOKEN: &str = "OK";
/// Marker preceding the numeric code of an error acknowledgement.
pub const ERROR_MARKER: &str = "ERR";

/// The first line returned after a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acknowledgement {
    Ok,
    Error(u16),
}

impl Acknowledgement {
    /// Classify an acknowledgement line.
    ///
    /// Anything that is neither the success token nor the error marker
    /// followed by a numeric code is reported as `UnexpectedResponse`.
    pub fn parse(line: &str) -> Result<Self> {
        let line = line.trim();
        if line == OK_TOKEN {
            return Ok(Self::Ok);
        }
        match line.find(ERROR_MARKER) {
            Some(pos) => line[pos + ERROR_MARKER.len()..]
                .trim()
                .parse::<u16>()
                .map(Self::Error)
                .map_err(|_| ProtoError::UnexpectedResponse {
                    raw: line.to_string(),
                }),
            None => Err(ProtoError::UnexpectedResponse {
                raw: line.to_string(),
            }),
        }
    }

    /// Convert into a protocol result, mapping error acknowledgements to `ProtoError::Device`.
    pub fn into_result(self) -> Result<()> {
        match self {
            Self::Ok => Ok(()),
            Self::Error(code) => Err(ProtoError::Device { code }),
        }
    }
}

/// Parse an acknowledgement line and fail unless it is the success token.
pub fn check_ack(line: &str) -> Result<()> {
    Acknowledgement::parse(line)?.into_result()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ok() {
        assert_eq!(Acknowledgement::parse("OK").unwrap(), Acknowledgement::Ok);
        assert!(check_ack(" OK ").is_ok());
    }

    #[test]
    fn test_device_error_code() {
        assert!(matches!(
            check_ack("ERR12"),
            Err(ProtoError::Device { code: 12 })
        ));
        assert_eq!(
            Acknowledgement::parse("ERR 3").unwrap(),
            Acknowledgement::Error(3)
        );
    }

    #[test]
    fn test_error_marker_with_garbage_code() {
        match check_ack("ERRxx") {
            Err(ProtoError::UnexpectedResponse { raw }) => assert_eq!(raw, "ERRxx"),
            other => panic!("unexpected result: {:?}", other),
        }
        assert!(matches!(
            check_ack("ERR"),
            Err(ProtoError::UnexpectedResponse { .. })
        ));
    }

    #[test]
    fn test_unknown_response() {
        match check_ack("HELLO") {
            Err(ProtoError::UnexpectedResponse { raw }) => assert_eq!(raw, "HELLO"),
            other => panic!("unexpected result: {:?}", other),
        }
        assert!(matches!(
            check_ack(""),
            Err(ProtoError::UnexpectedResponse { .. })
        ));
    }
}
