//! Checksummed frames on the secondary bus.
//!
//! Wire format of one frame:
//! ```text
//! ┌────────────┬─────────┬──────────────────┬──────────┐
//! │ Length(1B) │ Cmd(1B) │ Payload          │ XOR(1B)  │
//! └────────────┴─────────┴──────────────────┴──────────┘
//! ```
//! `Length` counts everything after itself. The checksum is the XOR of every
//! byte between the length and the checksum. On an addressed bus (I2C) the
//! transaction size carries the length and only the body is sent; a byte
//! stream (RS-485/UART) carries the explicit length prefix.

use bytes::{BufMut, BytesMut};

use crate::error::FrameError;

/// Receive buffer size on the subordinate side; longer bodies are rejected.
pub const MAX_FRAME_LEN: usize = 40;

/// Smallest body: a command byte and its checksum.
pub const MIN_FRAME_LEN: usize = 2;

/// XOR of all bytes.
#[inline]
pub fn checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0, |acc, b| acc ^ b)
}

/// Append the checksum of everything currently in `buf`.
#[inline]
pub fn seal(buf: &mut BytesMut) {
    let crc = checksum(buf);
    buf.put_u8(crc);
}

/// Validate a body's length and checksum, returning the bytes before the checksum.
pub fn open(frame: &[u8]) -> Result<&[u8], FrameError> {
    let Some((&actual, content)) = frame.split_last() else {
        return Err(FrameError::TooShort(0));
    };
    if frame.len() < MIN_FRAME_LEN {
        return Err(FrameError::TooShort(frame.len()));
    }
    let expected = checksum(content);
    if expected != actual {
        return Err(FrameError::BadChecksum { expected, actual });
    }
    Ok(content)
}

/// Like [`open`], for responses whose total length is fixed.
pub fn open_exact(frame: &[u8], len: usize) -> Result<&[u8], FrameError> {
    if frame.len() != len {
        return Err(FrameError::LengthMismatch {
            expected: len,
            actual: frame.len(),
        });
    }
    open(frame)
}

/// Write `[len][body]` for a byte-stream transport.
pub fn encode_stream(body: &[u8], dst: &mut BytesMut) -> Result<(), FrameError> {
    if body.is_empty() {
        return Err(FrameError::TooShort(0));
    }
    if body.len() > MAX_FRAME_LEN {
        return Err(FrameError::TooLarge(body.len()));
    }
    let len = u8::try_from(body.len()).map_err(|_| FrameError::TooLarge(body.len()))?;
    dst.reserve(1 + body.len());
    dst.put_u8(len);
    dst.put_slice(body);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(feature = "hardware-errors")]
    #[test]
    fn uart_framing_shares_the_receive_limit() {
        assert_eq!(pump_hardware::util::MAX_STREAM_FRAME, MAX_FRAME_LEN);
    }

    #[test]
    fn sealed_frame_opens() {
        let mut buf = BytesMut::from(&[0x10, 0x02][..]);
        seal(&mut buf);
        assert_eq!(buf.as_ref(), &[0x10, 0x02, 0x12]);
        assert_eq!(open(&buf).unwrap(), &[0x10, 0x02]);
    }

    #[test]
    fn short_and_corrupt_frames_are_rejected() {
        assert_eq!(open(&[]), Err(FrameError::TooShort(0)));
        assert_eq!(open(&[0x01]), Err(FrameError::TooShort(1)));
        assert_eq!(
            open(&[0x10, 0x02, 0x13]),
            Err(FrameError::BadChecksum {
                expected: 0x12,
                actual: 0x13
            })
        );
    }

    #[test]
    fn fixed_length_is_checked_first() {
        assert_eq!(
            open_exact(&[0x01, 0x01], 6),
            Err(FrameError::LengthMismatch {
                expected: 6,
                actual: 2
            })
        );
    }

    #[test]
    fn stream_prefix_carries_body_length() {
        let mut dst = BytesMut::new();
        encode_stream(&[0x01, 0x01], &mut dst).unwrap();
        assert_eq!(dst.as_ref(), &[0x02, 0x01, 0x01]);
        assert_eq!(
            encode_stream(&[0u8; MAX_FRAME_LEN + 1], &mut dst),
            Err(FrameError::TooLarge(MAX_FRAME_LEN + 1))
        );
    }
}
