//! Buffer management for framed ISO 8583 messages.
//!
//! Over TCP each message travels behind a 2-byte big-endian length header
//! (`00 24` for a 36-byte message). Forge buffers reserve those two bytes up
//! front: write the message from [`FORGE_WRITE_START`] and patch the header
//! once the final position is known.

use crate::errors::CodecError;

/// Default buffer size for message writing operations.
/// 1024 bytes accommodate any message built from the numeric field table.
pub const FORGE_BUFFER_SIZE: usize = 1024;

/// Width of the big-endian length header.
pub const WIRE_LENGTH_LEN: usize = 2;

/// Starting position for writing the MTI after the reserved length header.
pub const FORGE_WRITE_START: usize = WIRE_LENGTH_LEN;

/// Largest message body a 2-byte header can describe.
pub const MAX_FRAME_BODY: usize = u16::MAX as usize;

/// Create a zeroed buffer with the length header reserved.
///
/// # Buffer Layout
/// - Bytes 0-1: length header placeholder `00 00`
/// - Bytes 2+: MTI, bitmaps and data elements
///
/// # Example
/// ```
/// # use iso8583_forge_helpers::*;
/// let mut buffer = forge_out_buffer();
/// let mut pos = FORGE_WRITE_START;
///
/// buffer[pos..pos + 2].copy_from_slice(&Mti::new("0800").unwrap().encode());
/// pos += 2;
/// // ... bitmap and fields
/// update_wire_length(&mut buffer, pos).unwrap();
/// assert_eq!(&buffer[..4], &[0x00, 0x02, 0x08, 0x00]);
/// ```
#[inline]
pub fn forge_out_buffer() -> [u8; FORGE_BUFFER_SIZE] {
    [0u8; FORGE_BUFFER_SIZE]
}

/// Patch the length header of a forge buffer.
///
/// `message_end` is the position one past the last written byte; the header
/// receives `message_end - FORGE_WRITE_START`. An end inside the header
/// counts as an empty body.
///
/// Fails with [`CodecError::TruncatedField`] when `buffer` cannot hold the
/// header or does not reach `message_end`, and with
/// [`CodecError::LengthOverflow`] when the body is longer than a 2-byte
/// header can describe.
///
/// # Example
/// ```
/// # use iso8583_forge_helpers::*;
/// let mut buffer = forge_out_buffer();
/// update_wire_length(&mut buffer, FORGE_WRITE_START + 36).unwrap();
/// assert_eq!(&buffer[..2], &[0x00, 0x24]);
///
/// assert!(update_wire_length(&mut [0u8; 1], 3).is_err());
/// ```
#[inline(always)]
pub fn update_wire_length(buffer: &mut [u8], message_end: usize) -> Result<(), CodecError> {
    let required = message_end.max(FORGE_WRITE_START);
    if buffer.len() < required {
        return Err(CodecError::truncated(required, buffer.len()));
    }
    let body_length = message_end.saturating_sub(FORGE_WRITE_START);
    let header = u16::try_from(body_length)
        .map_err(|_| CodecError::overflow(body_length, MAX_FRAME_BODY))?;
    buffer[..WIRE_LENGTH_LEN].copy_from_slice(&header.to_be_bytes());
    Ok(())
}

/// Prefix an encoded message with its 2-byte big-endian length.
///
/// # Example
/// ```
/// # use iso8583_forge_helpers::frame;
/// assert_eq!(frame(&[0x08, 0x00]).unwrap(), vec![0x00, 0x02, 0x08, 0x00]);
/// ```
pub fn frame(message: &[u8]) -> Result<Vec<u8>, CodecError> {
    if message.len() > MAX_FRAME_BODY {
        return Err(CodecError::overflow(message.len(), MAX_FRAME_BODY));
    }
    let mut out = Vec::with_capacity(WIRE_LENGTH_LEN + message.len());
    out.extend_from_slice(&(message.len() as u16).to_be_bytes());
    out.extend_from_slice(message);
    Ok(out)
}

/// Split one framed message off the front of `bytes`.
///
/// Returns the message body and the total bytes consumed (header included),
/// so stream readers can advance past it.
///
/// # Example
/// ```
/// # use iso8583_forge_helpers::read_frame;
/// let stream = [0x00, 0x02, 0x08, 0x00, 0x00, 0x02];
/// let (body, consumed) = read_frame(&stream).unwrap();
/// assert_eq!(body, &[0x08, 0x00]);
/// assert_eq!(consumed, 4);
/// assert!(read_frame(&stream[consumed..]).is_err());
/// ```
pub fn read_frame(bytes: &[u8]) -> Result<(&[u8], usize), CodecError> {
    let header: [u8; WIRE_LENGTH_LEN] = bytes
        .get(..WIRE_LENGTH_LEN)
        .and_then(|h| h.try_into().ok())
        .ok_or(CodecError::truncated(WIRE_LENGTH_LEN, bytes.len()))?;
    let body_len = usize::from(u16::from_be_bytes(header));
    let total = WIRE_LENGTH_LEN + body_len;
    let body = bytes
        .get(WIRE_LENGTH_LEN..total)
        .ok_or(CodecError::truncated(total, bytes.len()))?;
    Ok((body, total))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::parse_hex_spaced;
    use crate::message::{MessageSpec, decode_message};

    const FULL_MESSAGE_HEX: &str = "02 00 D0 20 00 00 00 00 00 00 00 00 00 00 00 00 00 00 \
                                    16 45 39 68 12 34 56 78 90 00 00 00 00 10 00 12 34 56";

    #[test]
    fn test_forge_out_buffer() {
        let buffer = forge_out_buffer();
        assert_eq!(
            buffer.len(),
            FORGE_BUFFER_SIZE
        );
        assert!(buffer.iter().all(|&b| b == 0));
        assert_eq!(FORGE_WRITE_START, 2);
    }

    #[test]
    fn test_forge_out_buffer_ready_for_writing() {
        let message = parse_hex_spaced(FULL_MESSAGE_HEX).unwrap();
        let mut buffer = forge_out_buffer();
        let mut pos = FORGE_WRITE_START;

        buffer[pos..pos + message.len()].copy_from_slice(&message);
        pos += message.len();
        update_wire_length(&mut buffer, pos).unwrap();

        assert_eq!(&buffer[..2], &[0x00, 0x24]);
        let (body, consumed) = read_frame(&buffer[..pos]).unwrap();
        assert_eq!(consumed, 38);
        assert_eq!(body, message.as_slice());
    }

    #[test]
    fn test_update_wire_length() {
        let mut buffer = forge_out_buffer();

        update_wire_length(&mut buffer, 2).unwrap();
        assert_eq!(&buffer[..2], &[0x00, 0x00]);

        update_wire_length(&mut buffer, 302).unwrap();
        assert_eq!(&buffer[..2], &[0x01, 0x2C]);

        update_wire_length(&mut buffer, 1024).unwrap();
        assert_eq!(&buffer[..2], &[0x03, 0xFE]);

        // body untouched
        assert_eq!(buffer[2], 0);
    }

    #[test]
    fn test_update_wire_length_short_buffer() {
        let mut tiny = [0u8; 1];
        assert_eq!(
            update_wire_length(&mut tiny, 3),
            Err(CodecError::truncated(3, 1))
        );
        assert_eq!(
            update_wire_length(&mut tiny, 0),
            Err(CodecError::truncated(2, 1))
        );
        assert_eq!(tiny, [0]);

        // message_end past the end of the buffer
        let mut buffer = forge_out_buffer();
        assert_eq!(
            update_wire_length(&mut buffer, FORGE_BUFFER_SIZE + 1),
            Err(CodecError::truncated(FORGE_BUFFER_SIZE + 1, FORGE_BUFFER_SIZE))
        );
        assert_eq!(&buffer[..2], &[0x00, 0x00]);
    }

    #[test]
    fn test_update_wire_length_oversize_body() {
        let mut buffer = vec![0u8; FORGE_WRITE_START + MAX_FRAME_BODY + 1];
        let end = buffer.len();
        assert_eq!(
            update_wire_length(&mut buffer, end),
            Err(CodecError::overflow(MAX_FRAME_BODY + 1, MAX_FRAME_BODY))
        );
        assert_eq!(&buffer[..2], &[0x00, 0x00]);

        update_wire_length(&mut buffer, end - 1).unwrap();
        assert_eq!(&buffer[..2], &[0xFF, 0xFF]);

        // A header-only buffer describes an empty body
        let mut header = [0xAAu8; 2];
        update_wire_length(&mut header, 0).unwrap();
        assert_eq!(header, [0x00, 0x00]);
    }

    #[test]
    fn test_frame_canonical_message() {
        let message = parse_hex_spaced(FULL_MESSAGE_HEX).unwrap();
        let framed = frame(&message).unwrap();
        assert_eq!(&framed[..2], &[0x00, 0x24]);
        assert_eq!(framed.len(), 38);

        let (body, _) = read_frame(&framed).unwrap();
        let decoded = decode_message(&MessageSpec::iso8583_numeric(), body).unwrap();
        assert_eq!(decoded.get(11), Some("123456"));
    }

    #[test]
    fn test_frame_limits() {
        assert_eq!(frame(&[]).unwrap(), vec![0x00, 0x00]);
        let huge = vec![0u8; MAX_FRAME_BODY + 1];
        assert_eq!(
            frame(&huge),
            Err(CodecError::overflow(MAX_FRAME_BODY + 1, MAX_FRAME_BODY))
        );
    }

    #[test]
    fn test_read_frame_truncated() {
        assert_eq!(
            read_frame(&[0x00]),
            Err(CodecError::truncated(2, 1))
        );
        assert_eq!(
            read_frame(&[0x00, 0x05, 0x01, 0x02]),
            Err(CodecError::truncated(7, 4))
        );
        assert_eq!(
            read_frame(&[0x00, 0x00]).unwrap(),
            (&[][..], 2)
        );
    }
}
