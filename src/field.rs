//! Data element framing: fixed fields and `LLVAR` / `LLLVAR` fields.
//!
//! A fixed field always occupies the same number of bytes. A variable field is
//! a length prefix (2 or 3 decimal digits, packed as BCD or written as ASCII)
//! followed by the value:
//!
//! ```text
//! DE 2, LLVAR, BCD prefix
//! 16 | 45 39 68 12 34 56 78 90
//! ^^   ^^^^^^^^^^^^^^^^^^^^^^^ 16 digits, 8 bytes
//! length
//! ```
//!
//! How the value itself is carried depends on its [`ContentType`]:
//!
//! | Type | Value text | Wire | Length unit | Fixed fill |
//! | --- | --- | --- | --- | --- |
//! | `n` | `0`-`9` | packed BCD | digit | leading `0` |
//! | `an` | letters, digits, space | ASCII | character | trailing space |
//! | `ans` | printable ASCII | ASCII | character | trailing space |
//! | `b` | hex text (`"1A2B"`) | raw bytes | byte | none |
//! | `z` | `0`-`9` and `=` | packed BCD, `=` as nibble `D` | character | none |
//!
//! Decoding is cursor based so a message body can be walked field by field.

use crate::bcd::{BcdCodec, bcd_len, check_digits, check_track};
use crate::errors::CodecError;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;

/// How the digits of a variable field's length prefix are carried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LengthEncoding {
    /// Packed BCD, left filler `0` (`LL` = 1 byte, `LLL` = 2 bytes)
    #[default]
    Bcd,
    /// One ASCII digit per byte (`LL` = 2 bytes, `LLL` = 3 bytes)
    Ascii,
}

/// Data type of a field value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ContentType {
    /// `n`: decimal digits
    #[default]
    #[serde(rename = "n")]
    Numeric,
    /// `an`: letters, digits and space
    #[serde(rename = "an")]
    Alphanumeric,
    /// `ans`: any printable ASCII
    #[serde(rename = "ans")]
    Special,
    /// `b`: raw bytes, given as hex text
    #[serde(rename = "b")]
    Binary,
    /// `z`: track data, digits and the `=` separator
    #[serde(rename = "z")]
    Track,
}

impl ContentType {
    /// Bytes on the wire for a value of `units` digits, characters or bytes.
    #[inline]
    pub const fn wire_len(self, units: usize) -> usize {
        match self {
            ContentType::Numeric | ContentType::Track => bcd_len(units),
            ContentType::Alphanumeric | ContentType::Special | ContentType::Binary => units,
        }
    }

    /// Whether short values may be filled up to a fixed field's length.
    #[inline]
    const fn fills(self) -> bool {
        matches!(
            self,
            ContentType::Numeric | ContentType::Alphanumeric | ContentType::Special
        )
    }

    #[inline(always)]
    fn accepts(self, byte: u8) -> bool {
        match self {
            ContentType::Alphanumeric => byte.is_ascii_alphanumeric() || byte == b' ',
            ContentType::Special => (0x20..=0x7E).contains(&byte),
            _ => true,
        }
    }

    /// Fail with [`CodecError::InvalidCharacter`] at the first byte this
    /// text type does not allow.
    fn check_text(self, bytes: &[u8]) -> Result<(), CodecError> {
        match bytes
            .iter()
            .position(|&b| !self.accepts(b))
        {
            Some(index) => Err(CodecError::InvalidCharacter {
                byte: bytes[index],
                index,
            }),
            None => Ok(()),
        }
    }

    /// Validate `value` and turn it into what goes on the wire.
    fn payload(self, value: &str) -> Result<Payload<'_>, CodecError> {
        match self {
            ContentType::Numeric => {
                check_digits(value)?;
                Ok(Payload::Nibbles(value))
            }
            ContentType::Track => {
                check_track(value)?;
                Ok(Payload::Nibbles(value))
            }
            ContentType::Alphanumeric | ContentType::Special => {
                self.check_text(value.as_bytes())?;
                Ok(Payload::Bytes(Cow::Borrowed(value.as_bytes())))
            }
            ContentType::Binary => Ok(Payload::Bytes(Cow::Owned(hex::decode(value)?))),
        }
    }

    fn pack_into(
        self,
        codec: BcdCodec,
        buf: &mut [u8],
        pos: usize,
        text: &str,
    ) -> Result<usize, CodecError> {
        match self {
            ContentType::Track => codec.encode_track_into(buf, pos, text),
            _ => codec.encode_into(buf, pos, text),
        }
    }

    /// Turn `raw` wire bytes holding `units` digits, characters or bytes back
    /// into value text.
    fn unpack(self, codec: BcdCodec, raw: &[u8], units: usize) -> Result<String, CodecError> {
        match self {
            ContentType::Numeric => codec.decode(raw, units),
            ContentType::Track => codec.decode_track(raw, units),
            ContentType::Alphanumeric | ContentType::Special => {
                self.check_text(raw)?;
                Ok(raw
                    .iter()
                    .map(|&b| char::from(b))
                    .collect())
            }
            ContentType::Binary => Ok(hex::encode_upper(raw)),
        }
    }
}

/// A validated value, ready to be written.
enum Payload<'a> {
    /// Text packed as BCD nibbles (`n`, `z`)
    Nibbles(&'a str),
    /// Bytes copied as they are (`an`, `ans`, `b`)
    Bytes(Cow<'a, [u8]>),
}

impl Payload<'_> {
    #[inline]
    fn units(&self) -> usize {
        match self {
            Payload::Nibbles(text) => text.len(),
            Payload::Bytes(raw) => raw.len(),
        }
    }
}

/// Field of exactly `length` digits, characters or bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixedField {
    /// Length in the content type's unit
    #[serde(alias = "digits")]
    pub length: usize,
    /// Data type of the value
    #[serde(default)]
    pub content: ContentType,
    /// Packing convention for odd lengths of `n` and `z` values
    #[serde(default)]
    pub codec: BcdCodec,
}

impl FixedField {
    /// Fixed field of `length` units of `content`, left filler `0`.
    #[inline]
    pub const fn new(length: usize, content: ContentType) -> Self {
        Self {
            length,
            content,
            codec: BcdCodec::LEFT_ZERO,
        }
    }

    /// Same layout with a different packing convention.
    #[inline]
    pub const fn with_codec(mut self, codec: BcdCodec) -> Self {
        self.codec = codec;
        self
    }

    /// Bytes on the wire.
    #[inline]
    pub const fn byte_len(&self) -> usize {
        self.content.wire_len(self.length)
    }
}

/// Field with a 2- or 3-digit length prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "VariableFieldDef", into = "VariableFieldDef")]
pub struct VariableField {
    length_digits: u8,
    max_len: usize,
    length_encoding: LengthEncoding,
    content: ContentType,
    codec: BcdCodec,
}

impl VariableField {
    /// Layout for built-in tables, checked when the table constant is
    /// evaluated: a bad prefix width or maximum is a build error there.
    pub(crate) const fn checked(length_digits: u8, max_len: usize, content: ContentType) -> Self {
        assert!(
            length_digits == 2 || length_digits == 3,
            "length prefix must be 2 or 3 digits"
        );
        assert!(
            max_len <= prefix_capacity(length_digits),
            "maximum does not fit the length prefix"
        );
        Self {
            length_digits,
            max_len,
            length_encoding: LengthEncoding::Bcd,
            content,
            codec: BcdCodec::LEFT_ZERO,
        }
    }

    /// Width of the length prefix in decimal digits (2 or 3).
    #[inline]
    pub fn length_digits(&self) -> u8 {
        self.length_digits
    }

    /// Longest value accepted, in the content type's unit.
    #[inline]
    pub fn max_len(&self) -> usize {
        self.max_len
    }

    /// Encoding of the length prefix.
    #[inline]
    pub fn length_encoding(&self) -> LengthEncoding {
        self.length_encoding
    }

    /// Data type of the value.
    #[inline]
    pub fn content(&self) -> ContentType {
        self.content
    }

    /// Packing convention of `n` and `z` values.
    #[inline]
    pub fn codec(&self) -> BcdCodec {
        self.codec
    }

    /// Same layout with a different prefix encoding.
    #[inline]
    pub const fn with_length_encoding(mut self, length_encoding: LengthEncoding) -> Self {
        self.length_encoding = length_encoding;
        self
    }

    /// Same layout with a different value data type.
    #[inline]
    pub const fn with_content(mut self, content: ContentType) -> Self {
        self.content = content;
        self
    }

    /// Same layout with a different value packing convention.
    #[inline]
    pub const fn with_codec(mut self, codec: BcdCodec) -> Self {
        self.codec = codec;
        self
    }

    /// Bytes taken by the length prefix.
    #[inline]
    pub fn prefix_len(&self) -> usize {
        let digits = usize::from(self.length_digits);
        match self.length_encoding {
            LengthEncoding::Bcd => bcd_len(digits),
            LengthEncoding::Ascii => digits,
        }
    }

    /// Bytes on the wire for a value of `actual` digits, characters or bytes.
    #[inline]
    pub fn wire_len(&self, actual: usize) -> usize {
        self.prefix_len() + self.content.wire_len(actual)
    }
}

/// Largest length a prefix of `length_digits` digits can express (99 or 999).
#[inline]
const fn prefix_capacity(length_digits: u8) -> usize {
    10usize.pow(length_digits as u32) - 1
}

/// Serialized shape of [`VariableField`], validated on the way in.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct VariableFieldDef {
    length_digits: u8,
    #[serde(alias = "max_digits")]
    max_len: usize,
    #[serde(default)]
    length_encoding: LengthEncoding,
    #[serde(default)]
    content: ContentType,
    #[serde(default)]
    codec: BcdCodec,
}

impl TryFrom<VariableFieldDef> for VariableField {
    type Error = CodecError;

    fn try_from(def: VariableFieldDef) -> Result<Self, Self::Error> {
        Ok(describe_variable(def.length_digits, def.max_len)?
            .with_length_encoding(def.length_encoding)
            .with_content(def.content)
            .with_codec(def.codec))
    }
}

impl From<VariableField> for VariableFieldDef {
    fn from(field: VariableField) -> Self {
        Self {
            length_digits: field.length_digits,
            max_len: field.max_len,
            length_encoding: field.length_encoding,
            content: field.content,
            codec: field.codec,
        }
    }
}

/// Layout of one data element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum FieldDescriptor {
    /// `n 6`, `an 2`, `b 8`, ...
    Fixed(FixedField),
    /// `LLVAR` / `LLLVAR`
    Variable(VariableField),
}

impl FieldDescriptor {
    /// Longest value the field accepts, in the content type's unit.
    pub fn max_len(&self) -> usize {
        match self {
            FieldDescriptor::Fixed(field) => field.length,
            FieldDescriptor::Variable(field) => field.max_len,
        }
    }

    /// Data type of the value.
    pub fn content(&self) -> ContentType {
        match self {
            FieldDescriptor::Fixed(field) => field.content,
            FieldDescriptor::Variable(field) => field.content,
        }
    }

    /// Whether the field carries a length prefix.
    pub fn is_variable(&self) -> bool {
        matches!(self, FieldDescriptor::Variable(_))
    }
}

impl From<FixedField> for FieldDescriptor {
    fn from(field: FixedField) -> Self {
        FieldDescriptor::Fixed(field)
    }
}

impl From<VariableField> for FieldDescriptor {
    fn from(field: VariableField) -> Self {
        FieldDescriptor::Variable(field)
    }
}

/// Describe a fixed numeric field of `n_digits` digits (left filler `0`).
///
/// # Example
/// ```
/// # use iso8583_forge_helpers::{describe_fixed, ContentType, FixedField};
/// assert_eq!(describe_fixed(12).byte_len(), 6);
/// assert_eq!(describe_fixed(3).byte_len(), 2);
/// assert_eq!(FixedField::new(8, ContentType::Special).byte_len(), 8);
/// ```
#[inline]
pub const fn describe_fixed(n_digits: usize) -> FixedField {
    FixedField::new(n_digits, ContentType::Numeric)
}

/// Describe an `LLVAR` (`length_digits = 2`) or `LLLVAR` (`3`) numeric field
/// with a BCD length prefix.
///
/// Fails with [`CodecError::UnsupportedLengthDigits`] for other prefix widths
/// and [`CodecError::LengthOverflow`] when `max_len` cannot be expressed
/// by the prefix.
///
/// # Example
/// ```
/// # use iso8583_forge_helpers::{describe_variable, ContentType, LengthEncoding};
/// let pan = describe_variable(2, 19).unwrap();
/// assert_eq!(pan.prefix_len(), 1);
/// assert_eq!(pan.wire_len(16), 9);
///
/// let ascii = describe_variable(3, 999).unwrap().with_length_encoding(LengthEncoding::Ascii);
/// assert_eq!(ascii.prefix_len(), 3);
///
/// let text = describe_variable(3, 999).unwrap().with_content(ContentType::Special);
/// assert_eq!(text.wire_len(10), 12);
///
/// assert!(describe_variable(4, 10).is_err());
/// assert!(describe_variable(2, 100).is_err());
/// ```
pub fn describe_variable(length_digits: u8, max_len: usize) -> Result<VariableField, CodecError> {
    if !(2..=3).contains(&length_digits) {
        return Err(CodecError::UnsupportedLengthDigits(length_digits));
    }
    let capacity = prefix_capacity(length_digits);
    if max_len > capacity {
        return Err(CodecError::overflow(max_len, capacity));
    }
    Ok(VariableField::checked(
        length_digits,
        max_len,
        ContentType::Numeric,
    ))
}

/// Encode one field value into a new byte vector.
///
/// # Example
/// ```
/// # use iso8583_forge_helpers::{describe_fixed, describe_variable, encode_field, ContentType, FieldDescriptor, FixedField};
/// let amount: FieldDescriptor = describe_fixed(12).into();
/// assert_eq!(encode_field(&amount, "1000").unwrap(), vec![0, 0, 0, 0, 0x10, 0x00]);
///
/// let pan: FieldDescriptor = describe_variable(2, 19).unwrap().into();
/// assert_eq!(encode_field(&pan, "12345").unwrap(), vec![0x05, 0x01, 0x23, 0x45]);
///
/// let response_code: FieldDescriptor = FixedField::new(2, ContentType::Alphanumeric).into();
/// assert_eq!(encode_field(&response_code, "00").unwrap(), b"00".to_vec());
/// ```
pub fn encode_field(descriptor: &FieldDescriptor, value: &str) -> Result<Vec<u8>, CodecError> {
    let mut out = Vec::new();
    append_field(&mut out, descriptor, value)?;
    Ok(out)
}

/// Append one encoded field to `out`, returns bytes appended.
///
/// `out` is left untouched when encoding fails.
///
/// Values longer than the field fail with [`CodecError::LengthOverflow`].
/// Short fixed values are filled: `n` with leading zeros, `an`/`ans` with
/// trailing spaces. Short fixed `b` and `z` values fail with
/// [`CodecError::LengthMismatch`].
pub fn append_field(
    out: &mut Vec<u8>,
    descriptor: &FieldDescriptor,
    value: &str,
) -> Result<usize, CodecError> {
    let start = out.len();
    let appended = match descriptor {
        FieldDescriptor::Fixed(field) => append_fixed(out, field, value),
        FieldDescriptor::Variable(field) => append_variable(out, field, value),
    };
    if appended.is_err() {
        out.truncate(start);
    }
    appended.map(|()| out.len() - start)
}

fn append_fixed(out: &mut Vec<u8>, field: &FixedField, value: &str) -> Result<(), CodecError> {
    let payload = field.content.payload(value)?;
    let len = payload.units();
    if len > field.length {
        return Err(CodecError::overflow(len, field.length));
    }
    if len < field.length && !field.content.fills() {
        return Err(CodecError::LengthMismatch {
            len,
            expected: field.length,
        });
    }

    let start = out.len();
    match payload {
        Payload::Nibbles(text) => {
            let filled = format!("{text:0>width$}", width = field.length);
            out.resize(start + field.byte_len(), 0);
            field
                .content
                .pack_into(field.codec, out, start, &filled)?;
        }
        Payload::Bytes(raw) => {
            out.extend_from_slice(&raw);
            out.resize(start + field.length, b' ');
        }
    }
    Ok(())
}

fn append_variable(
    out: &mut Vec<u8>,
    field: &VariableField,
    value: &str,
) -> Result<(), CodecError> {
    let payload = field.content.payload(value)?;
    let len = payload.units();
    if len > field.max_len {
        return Err(CodecError::overflow(len, field.max_len));
    }

    let prefix = format!(
        "{len:0width$}",
        width = usize::from(field.length_digits)
    );
    match field.length_encoding {
        LengthEncoding::Bcd => out.extend(BcdCodec::LEFT_ZERO.encode(&prefix)?),
        LengthEncoding::Ascii => out.extend_from_slice(prefix.as_bytes()),
    }

    match payload {
        Payload::Nibbles(text) => {
            let value_start = out.len();
            out.resize(value_start + bcd_len(len), 0);
            field
                .content
                .pack_into(field.codec, out, value_start, text)?;
        }
        Payload::Bytes(raw) => out.extend_from_slice(&raw),
    }
    Ok(())
}

/// Decode one field starting at `cursor`, returns the value text and the
/// number of bytes consumed.
///
/// Fails with [`CodecError::TruncatedField`] when fewer bytes remain than the
/// field needs, and with [`CodecError::LengthOverflow`] when a length prefix
/// declares more than `max_len`. `b` values come back as upper-case hex;
/// fixed `an`/`ans` values keep their trailing fill.
///
/// # Example
/// ```
/// # use iso8583_forge_helpers::{describe_variable, decode_field, FieldDescriptor};
/// let pan: FieldDescriptor = describe_variable(2, 99).unwrap().into();
/// let bytes = [0x16, 0x45, 0x39, 0x68, 0x12, 0x34, 0x56, 0x78, 0x90];
/// let (value, consumed) = decode_field(&pan, &bytes, 0).unwrap();
/// assert_eq!(value, "4539681234567890");
/// assert_eq!(consumed, 9);
/// ```
pub fn decode_field(
    descriptor: &FieldDescriptor,
    bytes: &[u8],
    cursor: usize,
) -> Result<(String, usize), CodecError> {
    let rest = bytes
        .get(cursor..)
        .unwrap_or_default();
    match descriptor {
        FieldDescriptor::Fixed(field) => {
            let need = field.byte_len();
            let raw = rest
                .get(..need)
                .ok_or(CodecError::truncated(need, rest.len()))?;
            let value = field
                .content
                .unpack(field.codec, raw, field.length)?;
            Ok((value, need))
        }
        FieldDescriptor::Variable(field) => {
            let prefix_len = field.prefix_len();
            let prefix = rest
                .get(..prefix_len)
                .ok_or(CodecError::truncated(prefix_len, rest.len()))?;
            let len = read_length_prefix(field, prefix)?;
            if len > field.max_len {
                return Err(CodecError::overflow(len, field.max_len));
            }
            let need = field.wire_len(len);
            let raw = rest
                .get(prefix_len..need)
                .ok_or(CodecError::truncated(need, rest.len()))?;
            let value = field
                .content
                .unpack(field.codec, raw, len)?;
            Ok((value, need))
        }
    }
}

/// Read the decimal length carried by a prefix of `field.prefix_len()` bytes.
fn read_length_prefix(field: &VariableField, prefix: &[u8]) -> Result<usize, CodecError> {
    let digits = usize::from(field.length_digits);
    match field.length_encoding {
        LengthEncoding::Bcd => {
            let text = BcdCodec::LEFT_ZERO.decode(prefix, digits)?;
            Ok(text
                .bytes()
                .fold(0, |acc, d| acc * 10 + usize::from(d - b'0')))
        }
        LengthEncoding::Ascii => prefix
            .iter()
            .enumerate()
            .try_fold(0usize, |acc, (index, &b)| {
                if b.is_ascii_digit() {
                    Ok(acc * 10 + usize::from(b - b'0'))
                } else {
                    Err(CodecError::InvalidDigit {
                        found: char::from(b),
                        index,
                    })
                }
            }),
    }
}
