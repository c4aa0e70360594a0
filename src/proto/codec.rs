use bytes::{BufMut, BytesMut};
use std::io;
use tokio_util::codec::{Decoder, Encoder};

/// Line terminator appended to every outgoing command.
pub const TERMINATOR: u8 = b'\r';

/// Frames the ASCII line protocol.
///
/// Outgoing lines get a single CARRIAGE RETURN appended. Incoming lines end
/// with CR, LF or CRLF; the decoder yields the line with the terminator and
/// any surrounding whitespace removed. An empty line is a valid item (the
/// stream sentinel), so a CRLF pair must not be split into two lines.
#[derive(Default, Debug)]
pub struct LineCodec {
    // A CR terminated the previous line, so a leading LF belongs to it.
    skip_lf: bool,
}

impl LineCodec {
    fn convert_string(payload: impl AsRef<[u8]>) -> String {
        String::from_utf8_lossy(payload.as_ref()).trim().to_string()
    }
}

impl Decoder for LineCodec {
    type Item = String;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if self.skip_lf && !src.is_empty() {
            if src[0] == b'\n' {
                let _ = src.split_to(1);
            }
            self.skip_lf = false;
        }
        match src.iter().position(|b| *b == b'\r' || *b == b'\n') {
            Some(n) => {
                let line = src.split_to(n);
                let terminator = src.split_to(1);
                if terminator[0] == b'\r' {
                    if src.first() == Some(&b'\n') {
                        let _ = src.split_to(1);
                    } else if src.is_empty() {
                        self.skip_lf = true;
                    }
                }
                Ok(Some(Self::convert_string(&line)))
            }
            None => Ok(None),
        }
    }
}

impl Encoder<&str> for LineCodec {
    type Error = io::Error;

    fn encode(&mut self, item: &str, dst: &mut BytesMut) -> Result<(), Self::Error> {
        if item.bytes().any(|b| b == b'\r' || b == b'\n') {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("Command contains a line terminator: {:?}", item),
            ));
        }
        dst.reserve(item.len() + 1);
        dst.put_slice(item.as_bytes());
        dst.put_u8(TERMINATOR);
        Ok(())
    }
}
