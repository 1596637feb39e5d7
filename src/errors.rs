//! Error types for ISO 8583 field packing and message parsing.
//!
//! Every fallible helper in this crate returns [`CodecError`]. Whole-message
//! decoding wraps it in [`ParseError`], which also records the [`ParseStage`]
//! the decoder was in when it gave up.

use core::fmt;

/// Error raised by the BCD, bitmap, field and framing helpers.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CodecError {
    /// A digit string contained something other than `0`-`9`.
    #[error("invalid digit {found:?} at index {index}")]
    InvalidDigit {
        /// Offending character
        found: char,
        /// Character index within the input
        index: usize,
    },

    /// An alphanumeric value contained a byte outside printable ASCII.
    #[error("byte {byte:#04X} at index {index} is not printable ASCII")]
    InvalidCharacter {
        /// Offending byte
        byte: u8,
        /// Byte index within the value
        index: usize,
    },

    /// A BCD byte sequence could not be unpacked.
    #[error("malformed BCD at byte {offset}: {reason}")]
    MalformedBcd {
        /// Byte offset within the BCD input
        offset: usize,
        /// Description of what went wrong
        reason: &'static str,
    },

    /// A bitmap was neither 8 nor 16 bytes long.
    #[error("bitmap must be 8 or 16 bytes, got {len}")]
    InvalidBitmapLength {
        /// Length of the rejected input
        len: usize,
    },

    /// A value does not fit its field.
    #[error("length {len} exceeds limit {max}")]
    LengthOverflow {
        /// Actual length (digits, characters or bytes)
        len: usize,
        /// Largest length the field accepts
        max: usize,
    },

    /// A binary or track value is shorter than its fixed field and has no
    /// filler convention.
    #[error("value length {len} does not fill fixed field of {expected}")]
    LengthMismatch {
        /// Actual length
        len: usize,
        /// Length the fixed field requires
        expected: usize,
    },

    /// Not enough bytes left to satisfy a field's declared length.
    #[error("truncated field: need {required} bytes, {available} available")]
    TruncatedField {
        /// Bytes the field needs from the cursor
        required: usize,
        /// Bytes left from the cursor
        available: usize,
    },

    /// Variable fields only support LL (2) and LLL (3) prefixes.
    #[error("unsupported length prefix width {0}, expected 2 or 3")]
    UnsupportedLengthDigits(u8),

    /// A Message Type Indicator was not exactly 4 digits.
    #[error("MTI must be 4 digits, got {0:?}")]
    InvalidMti(String),

    /// A data element is present in the bitmap but has no layout.
    #[error("no layout for data element {0}")]
    UnknownField(u8),

    /// Bytes remained after the last present data element.
    #[error("{0} trailing bytes after last data element")]
    TrailingBytes(usize),

    /// Hex text could not be parsed.
    #[error("invalid hex: {0}")]
    InvalidHex(#[from] hex::FromHexError),

    /// A field table could not be loaded.
    #[error("invalid field table: {0}")]
    InvalidSpec(String),
}

impl CodecError {
    /// Build a [`CodecError::TruncatedField`].
    #[inline]
    pub fn truncated(required: usize, available: usize) -> Self {
        CodecError::TruncatedField {
            required,
            available,
        }
    }

    /// Build a [`CodecError::LengthOverflow`].
    #[inline]
    pub fn overflow(len: usize, max: usize) -> Self {
        CodecError::LengthOverflow { len, max }
    }

    /// Build a [`CodecError::MalformedBcd`].
    #[inline]
    pub fn malformed(offset: usize, reason: &'static str) -> Self {
        CodecError::MalformedBcd { offset, reason }
    }
}

/// Decoder states of a whole-message parse, in wire order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseStage {
    /// Reading the 4-digit Message Type Indicator
    Mti,
    /// Reading the first 8 bitmap bytes
    PrimaryBitmap,
    /// Reading the 8 extension bytes announced by bit 1
    SecondaryBitmap,
    /// Reading a data element
    Field(u8),
    /// All present elements consumed
    Done,
}

impl fmt::Display for ParseStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseStage::Mti => write!(f, "MTI"),
            ParseStage::PrimaryBitmap => write!(f, "primary bitmap"),
            ParseStage::SecondaryBitmap => write!(f, "secondary bitmap"),
            ParseStage::Field(n) => write!(f, "DE {n}"),
            ParseStage::Done => write!(f, "end of message"),
        }
    }
}

/// Whole-message decode or encode failure.
///
/// Message parsing is all-or-nothing: on failure no partially decoded message
/// is returned, only the stage and the underlying [`CodecError`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{stage}: {source}")]
pub struct ParseError {
    /// Stage the decoder was in
    pub stage: ParseStage,
    /// Underlying codec failure
    #[source]
    pub source: CodecError,
}

impl ParseError {
    /// Returns the data element number when the failure happened inside one.
    pub fn field(&self) -> Option<u8> {
        match self.stage {
            ParseStage::Field(n) => Some(n),
            _ => None,
        }
    }
}

/// Extension for tagging a codec result with the stage it belongs to.
pub(crate) trait AtStage<T> {
    fn at(self, stage: ParseStage) -> Result<T, ParseError>;
}

impl<T> AtStage<T> for Result<T, CodecError> {
    #[inline]
    fn at(self, stage: ParseStage) -> Result<T, ParseError> {
        self.map_err(|source| {
            tracing::debug!(%stage, error = %source, "ISO 8583 codec failure");
            ParseError { stage, source }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_codec_error_display() {
        let error = CodecError::InvalidDigit {
            found: 'x',
            index: 3,
        };
        assert_eq!(
            error.to_string(),
            "invalid digit 'x' at index 3"
        );

        assert_eq!(
            CodecError::InvalidBitmapLength { len: 7 }.to_string(),
            "bitmap must be 8 or 16 bytes, got 7"
        );

        assert_eq!(
            CodecError::truncated(9, 4).to_string(),
            "truncated field: need 9 bytes, 4 available"
        );

        assert_eq!(
            CodecError::InvalidCharacter {
                byte: 0x07,
                index: 1
            }
            .to_string(),
            "byte 0x07 at index 1 is not printable ASCII"
        );

        assert_eq!(
            CodecError::overflow(100, 99).to_string(),
            "length 100 exceeds limit 99"
        );
    }

    #[test]
    fn test_parse_error_display_and_source() {
        let error = ParseError {
            stage: ParseStage::Field(11),
            source: CodecError::truncated(3, 1),
        };
        assert_eq!(
            error.to_string(),
            "DE 11: truncated field: need 3 bytes, 1 available"
        );
        assert_eq!(error.field(), Some(11));
        assert!(error.source().is_some());

        let error = ParseError {
            stage: ParseStage::PrimaryBitmap,
            source: CodecError::InvalidBitmapLength { len: 5 },
        };
        assert_eq!(error.field(), None);
    }

    #[test]
    fn test_at_stage() {
        let ok: Result<u8, CodecError> = Ok(7);
        assert_eq!(ok.at(ParseStage::Mti), Ok(7));

        let err: Result<u8, CodecError> = Err(CodecError::UnknownField(48));
        let tagged = err
            .at(ParseStage::Field(48))
            .unwrap_err();
        assert_eq!(tagged.stage, ParseStage::Field(48));
        assert_eq!(
            tagged.source,
            CodecError::UnknownField(48)
        );
    }

    #[test]
    fn test_hex_error_conversion() {
        let err: CodecError = hex::decode("0G")
            .unwrap_err()
            .into();
        assert!(matches!(err, CodecError::InvalidHex(_)));
    }
}
