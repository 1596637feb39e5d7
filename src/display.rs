//! Text renderings of wire bytes.
//!
//! Front ends (logs, dumps, teaching material) show ISO 8583 bytes as
//! space-separated upper-case hex pairs (`02 00 D0 20 ...`) and bitmaps as
//! binary octets (`11010000`). These helpers produce and accept exactly that.

use crate::errors::CodecError;

/// Render bytes as upper-case hex pairs separated by single spaces.
///
/// # Example
/// ```
/// # use iso8583_forge_helpers::to_hex_spaced;
/// assert_eq!(to_hex_spaced(&[0x02, 0x00, 0xD0]), "02 00 D0");
/// assert_eq!(to_hex_spaced(&[]), "");
/// ```
pub fn to_hex_spaced(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|&b| hex::encode_upper([b]))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Parse hex text, ignoring any ASCII whitespace between digits.
///
/// # Example
/// ```
/// # use iso8583_forge_helpers::parse_hex_spaced;
/// assert_eq!(parse_hex_spaced("16 45 39").unwrap(), vec![0x16, 0x45, 0x39]);
/// assert_eq!(parse_hex_spaced("d020\n0000").unwrap(), vec![0xD0, 0x20, 0x00, 0x00]);
/// assert!(parse_hex_spaced("0 2 0").is_err());
/// ```
pub fn parse_hex_spaced(text: &str) -> Result<Vec<u8>, CodecError> {
    let compact: String = text
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();
    Ok(hex::decode(compact)?)
}

/// Render one byte as eight binary digits, most significant first.
///
/// # Example
/// ```
/// # use iso8583_forge_helpers::byte_bits;
/// assert_eq!(byte_bits(0xD0), "11010000");
/// assert_eq!(byte_bits(0x20), "00100000");
/// ```
#[inline]
pub fn byte_bits(byte: u8) -> String {
    format!("{byte:08b}")
}

/// Render hex text (such as `"D0 20"`) as space-separated binary octets.
///
/// # Example
/// ```
/// # use iso8583_forge_helpers::hex_to_bits;
/// assert_eq!(hex_to_bits("D0 20").unwrap(), "11010000 00100000");
/// ```
pub fn hex_to_bits(text: &str) -> Result<String, CodecError> {
    Ok(parse_hex_spaced(text)?
        .into_iter()
        .map(byte_bits)
        .collect::<Vec<_>>()
        .join(" "))
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL_MESSAGE_HEX: &str = "02 00 D0 20 00 00 00 00 00 00 00 00 00 00 00 00 00 00 \
                                    16 45 39 68 12 34 56 78 90 00 00 00 00 10 00 12 34 56";

    #[test]
    fn test_hex_spaced_round_trip() {
        let bytes = parse_hex_spaced(FULL_MESSAGE_HEX).unwrap();
        assert_eq!(bytes.len(), 36);
        assert_eq!(&bytes[..2], &[0x02, 0x00]);
        assert_eq!(
            to_hex_spaced(&bytes),
            FULL_MESSAGE_HEX
                .split_whitespace()
                .collect::<Vec<_>>()
                .join(" ")
        );
    }

    #[test]
    fn test_parse_hex_errors() {
        assert!(matches!(
            parse_hex_spaced("0"),
            Err(CodecError::InvalidHex(hex::FromHexError::OddLength))
        ));
        assert!(matches!(
            parse_hex_spaced("ZZ"),
            Err(CodecError::InvalidHex(_))
        ));
        assert_eq!(parse_hex_spaced("   ").unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn test_byte_bits() {
        assert_eq!(byte_bits(0x00), "00000000");
        assert_eq!(byte_bits(0xFF), "11111111");
        assert_eq!(byte_bits(0x01), "00000001");
    }

    #[test]
    fn test_hex_to_bits() {
        assert_eq!(hex_to_bits("D0").unwrap(), "11010000");
        assert_eq!(hex_to_bits("").unwrap(), "");
        assert!(hex_to_bits("D").is_err());
    }
}
