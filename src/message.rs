//! Whole ISO 8583 messages: MTI, bitmaps and data elements.
//!
//! Wire layout (binary, BCD numerics):
//!
//! ```text
//! MTI     primary bitmap            [secondary bitmap]        data elements...
//! 02 00   D0 20 00 00 00 00 00 00   00 00 00 00 00 00 00 00   16 45 39 ...
//! ```
//!
//! Decoding walks `MTI -> primary bitmap -> secondary bitmap (if bit 1) ->
//! fields in ascending element number -> done`. Each element is framed by its
//! entry in a [`MessageSpec`]. A failure at any stage aborts the whole parse
//! and reports the stage; no partial message is returned.

use crate::bcd::{BcdCodec, check_digits, decode_bcd};
use crate::bitmap::{BitmapIndex, EXTENDED_BITMAP_LEN, MAX_FIELD, PRIMARY_BITMAP_LEN};
use crate::errors::{AtStage, CodecError, ParseError, ParseStage};
use crate::field::{
    ContentType, FieldDescriptor, FixedField, LengthEncoding, VariableField, append_field, decode_field,
};
use core::fmt;
use core::str::FromStr;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, trace};

/// Bytes taken by a BCD-packed MTI.
pub const MTI_LEN: usize = 2;

// -----------------------------------------------------------------------------------------
// Message Type Indicator
// -----------------------------------------------------------------------------------------

/// Four-digit Message Type Indicator, such as `0200`.
///
/// Digit by digit: ISO version, message class, message function, message
/// origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Mti([u8; 4]);

/// First MTI digit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MtiVersion {
    Iso1987,
    Iso1993,
    Iso2003,
    National,
    Private,
    Reserved(u8),
}

/// Second MTI digit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageClass {
    Authorization,
    Financial,
    FileAction,
    Reversal,
    Reconciliation,
    Administrative,
    FeeCollection,
    NetworkManagement,
    Reserved(u8),
}

/// Third MTI digit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageFunction {
    Request,
    RequestResponse,
    Advice,
    AdviceResponse,
    Notification,
    NotificationAcknowledgement,
    Instruction,
    InstructionAcknowledgement,
    Reserved(u8),
}

/// Fourth MTI digit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageOrigin {
    Acquirer,
    AcquirerRepeat,
    Issuer,
    IssuerRepeat,
    Other,
    OtherRepeat,
    Reserved(u8),
}

impl Mti {
    /// Parse a 4-digit MTI.
    ///
    /// # Example
    /// ```
    /// # use iso8583_forge_helpers::{Mti, MessageClass, MessageFunction};
    /// let mti = Mti::new("0200").unwrap();
    /// assert_eq!(mti.class(), MessageClass::Financial);
    /// assert_eq!(mti.function(), MessageFunction::Request);
    /// assert_eq!(mti.response().unwrap().as_str(), "0210");
    /// assert!(Mti::new("200").is_err());
    /// ```
    pub fn new(digits: &str) -> Result<Self, CodecError> {
        check_digits(digits)?;
        let raw: [u8; 4] = digits
            .as_bytes()
            .try_into()
            .map_err(|_| CodecError::InvalidMti(digits.to_string()))?;
        Ok(Self(raw))
    }

    /// Unpack a 2-byte BCD MTI.
    pub fn decode(bytes: &[u8]) -> Result<Self, CodecError> {
        let raw = bytes
            .get(..MTI_LEN)
            .ok_or(CodecError::truncated(MTI_LEN, bytes.len()))?;
        Self::new(&decode_bcd(raw, 4)?)
    }

    /// Pack as 2 BCD bytes.
    pub fn encode(&self) -> [u8; MTI_LEN] {
        [
            (self.digit(0) << 4) | self.digit(1),
            (self.digit(2) << 4) | self.digit(3),
        ]
    }

    /// The MTI digits as text.
    #[inline]
    pub fn as_str(&self) -> &str {
        // Only ever built from validated ASCII digits
        core::str::from_utf8(&self.0).unwrap_or_default()
    }

    #[inline(always)]
    fn digit(&self, i: usize) -> u8 {
        self.0[i] - b'0'
    }

    pub fn version(&self) -> MtiVersion {
        match self.digit(0) {
            0 => MtiVersion::Iso1987,
            1 => MtiVersion::Iso1993,
            2 => MtiVersion::Iso2003,
            8 => MtiVersion::National,
            9 => MtiVersion::Private,
            d => MtiVersion::Reserved(d),
        }
    }

    pub fn class(&self) -> MessageClass {
        match self.digit(1) {
            1 => MessageClass::Authorization,
            2 => MessageClass::Financial,
            3 => MessageClass::FileAction,
            4 => MessageClass::Reversal,
            5 => MessageClass::Reconciliation,
            6 => MessageClass::Administrative,
            7 => MessageClass::FeeCollection,
            8 => MessageClass::NetworkManagement,
            d => MessageClass::Reserved(d),
        }
    }

    pub fn function(&self) -> MessageFunction {
        match self.digit(2) {
            0 => MessageFunction::Request,
            1 => MessageFunction::RequestResponse,
            2 => MessageFunction::Advice,
            3 => MessageFunction::AdviceResponse,
            4 => MessageFunction::Notification,
            5 => MessageFunction::NotificationAcknowledgement,
            6 => MessageFunction::Instruction,
            7 => MessageFunction::InstructionAcknowledgement,
            d => MessageFunction::Reserved(d),
        }
    }

    pub fn origin(&self) -> MessageOrigin {
        match self.digit(3) {
            0 => MessageOrigin::Acquirer,
            1 => MessageOrigin::AcquirerRepeat,
            2 => MessageOrigin::Issuer,
            3 => MessageOrigin::IssuerRepeat,
            4 => MessageOrigin::Other,
            5 => MessageOrigin::OtherRepeat,
            d => MessageOrigin::Reserved(d),
        }
    }

    /// Whether the function digit marks a request, advice, notification or
    /// instruction (0, 2, 4, 6) rather than its answer.
    pub fn is_request(&self) -> bool {
        matches!(self.digit(2), 0 | 2 | 4 | 6)
    }

    /// The matching answer MTI (`0200 -> 0210`, `0420 -> 0430`), or `None`
    /// when this MTI is itself an answer.
    pub fn response(&self) -> Option<Mti> {
        if !self.is_request() {
            return None;
        }
        let mut raw = self.0;
        raw[2] += 1;
        Some(Mti(raw))
    }
}

impl FromStr for Mti {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Mti::new(s)
    }
}

impl fmt::Display for Mti {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// -----------------------------------------------------------------------------------------
// Field table
// -----------------------------------------------------------------------------------------

type TableEntry = (u8, &'static str, FieldDescriptor);

const fn fixed(length: usize, content: ContentType) -> FieldDescriptor {
    FieldDescriptor::Fixed(FixedField::new(length, content))
}

const fn llvar(max_len: usize, content: ContentType) -> FieldDescriptor {
    FieldDescriptor::Variable(VariableField::checked(2, max_len, content))
}

const NUMERIC_ELEMENTS: [TableEntry; 14] = [
    (2, "Primary account number", llvar(19, ContentType::Numeric)),
    (3, "Processing code", fixed(6, ContentType::Numeric)),
    (4, "Amount, transaction", fixed(12, ContentType::Numeric)),
    (7, "Transmission date and time", fixed(10, ContentType::Numeric)),
    (11, "System trace audit number", fixed(6, ContentType::Numeric)),
    (12, "Local transaction time", fixed(6, ContentType::Numeric)),
    (13, "Local transaction date", fixed(4, ContentType::Numeric)),
    (14, "Expiration date", fixed(4, ContentType::Numeric)),
    (18, "Merchant type", fixed(4, ContentType::Numeric)),
    (22, "POS entry mode", fixed(3, ContentType::Numeric)),
    (25, "POS condition code", fixed(2, ContentType::Numeric)),
    (32, "Acquiring institution ID", llvar(11, ContentType::Numeric)),
    (49, "Currency code, transaction", fixed(3, ContentType::Numeric)),
    (70, "Network management information code", fixed(3, ContentType::Numeric)),
];

const CARD_ELEMENTS: [TableEntry; 11] = [
    (
        35,
        "Track 2 data",
        FieldDescriptor::Variable(
            VariableField::checked(2, 37, ContentType::Track).with_codec(BcdCodec::RIGHT_F),
        ),
    ),
    (37, "Retrieval reference number", fixed(12, ContentType::Alphanumeric)),
    (38, "Authorization ID response", fixed(6, ContentType::Alphanumeric)),
    (39, "Response code", fixed(2, ContentType::Alphanumeric)),
    (41, "Card acceptor terminal ID", fixed(8, ContentType::Special)),
    (42, "Card acceptor ID code", fixed(15, ContentType::Special)),
    (43, "Card acceptor name/location", fixed(40, ContentType::Special)),
    (
        48,
        "Additional data, private",
        FieldDescriptor::Variable(VariableField::checked(3, 999, ContentType::Special)),
    ),
    (52, "PIN data", fixed(8, ContentType::Binary)),
    (64, "Message authentication code", fixed(8, ContentType::Binary)),
    (128, "Message authentication code", fixed(8, ContentType::Binary)),
];

/// Name and layout of one data element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    /// Human readable element name
    pub name: String,
    /// Wire framing
    pub layout: FieldDescriptor,
}

/// Data element table: element number (2-128) to layout.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageSpec {
    fields: BTreeMap<u8, FieldSpec>,
}

impl MessageSpec {
    /// Empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Numeric elements of the 1987 layout used in card payments.
    ///
    /// | DE | Name | Format |
    /// | --- | --- | --- |
    /// | 2 | Primary account number | n..19 |
    /// | 3 | Processing code | n 6 |
    /// | 4 | Amount, transaction | n 12 |
    /// | 7 | Transmission date and time | n 10 |
    /// | 11 | System trace audit number | n 6 |
    /// | 12 | Local transaction time | n 6 |
    /// | 13 | Local transaction date | n 4 |
    /// | 14 | Expiration date | n 4 |
    /// | 18 | Merchant type | n 4 |
    /// | 22 | POS entry mode | n 3 |
    /// | 25 | POS condition code | n 2 |
    /// | 32 | Acquiring institution ID | n..11 |
    /// | 49 | Currency code, transaction | n 3 |
    /// | 70 | Network management information code | n 3 |
    pub fn iso8583_numeric() -> Self {
        Self::from_table(&NUMERIC_ELEMENTS)
    }

    /// [`MessageSpec::iso8583_numeric`] plus the text, track and binary
    /// elements of the 1987 layout.
    ///
    /// | DE | Name | Format |
    /// | --- | --- | --- |
    /// | 35 | Track 2 data | z..37, filler `F` on the right |
    /// | 37 | Retrieval reference number | an 12 |
    /// | 38 | Authorization ID response | an 6 |
    /// | 39 | Response code | an 2 |
    /// | 41 | Card acceptor terminal ID | ans 8 |
    /// | 42 | Card acceptor ID code | ans 15 |
    /// | 43 | Card acceptor name/location | ans 40 |
    /// | 48 | Additional data, private | ans...999 |
    /// | 52 | PIN data | b 8 |
    /// | 64 | Message authentication code | b 8 |
    /// | 128 | Message authentication code | b 8 |
    ///
    /// # Example
    /// ```
    /// # use iso8583_forge_helpers::{ContentType, MessageSpec};
    /// let spec = MessageSpec::iso8583_1987();
    /// assert_eq!(spec.get(39).unwrap().layout.content(), ContentType::Alphanumeric);
    /// assert_eq!(spec.get(4).unwrap().layout.max_len(), 12);
    /// ```
    pub fn iso8583_1987() -> Self {
        let mut spec = Self::from_table(&NUMERIC_ELEMENTS);
        spec.extend_table(&CARD_ELEMENTS);
        spec
    }

    fn from_table(table: &[TableEntry]) -> Self {
        let mut spec = Self::new();
        spec.extend_table(table);
        spec
    }

    fn extend_table(&mut self, table: &[TableEntry]) {
        for &(number, name, layout) in table {
            self.fields.insert(
                number,
                FieldSpec {
                    name: name.to_string(),
                    layout,
                },
            );
        }
    }

    /// Load a table from JSON keyed by element number.
    ///
    /// # Example
    /// ```
    /// # use iso8583_forge_helpers::MessageSpec;
    /// let spec = MessageSpec::from_json(r#"{
    ///     "2":  { "name": "PAN",  "layout": { "type": "variable", "length_digits": 2, "max_len": 19 } },
    ///     "39": { "name": "RC",   "layout": { "type": "fixed", "length": 2, "content": "an" } },
    ///     "11": { "name": "STAN", "layout": { "type": "fixed", "length": 6 } }
    /// }"#).unwrap();
    /// assert_eq!(spec.len(), 3);
    /// assert_eq!(spec.get(11).unwrap().name, "STAN");
    /// ```
    pub fn from_json(json: &str) -> Result<Self, CodecError> {
        let spec: MessageSpec =
            serde_json::from_str(json).map_err(|e| CodecError::InvalidSpec(e.to_string()))?;
        if let Some(&number) = spec
            .fields
            .keys()
            .find(|n| !(2..=MAX_FIELD).contains(*n))
        {
            return Err(CodecError::InvalidSpec(format!(
                "data element {number} outside 2-{MAX_FIELD}"
            )));
        }
        debug!(fields = spec.len(), "loaded ISO 8583 field table");
        Ok(spec)
    }

    /// Serialize the table back to JSON.
    pub fn to_json(&self) -> Result<String, CodecError> {
        serde_json::to_string_pretty(self).map_err(|e| CodecError::InvalidSpec(e.to_string()))
    }

    /// Add or replace one element's layout.
    pub fn insert(
        &mut self,
        number: u8,
        name: impl Into<String>,
        layout: impl Into<FieldDescriptor>,
    ) -> Result<&mut Self, CodecError> {
        if !(2..=MAX_FIELD).contains(&number) {
            return Err(CodecError::UnknownField(number));
        }
        self.fields.insert(
            number,
            FieldSpec {
                name: name.into(),
                layout: layout.into(),
            },
        );
        Ok(self)
    }

    /// Layout of element `number`, if the table has one.
    #[inline]
    pub fn get(&self, number: u8) -> Option<&FieldSpec> {
        self.fields.get(&number)
    }

    /// Elements in ascending number order.
    pub fn iter(&self) -> impl Iterator<Item = (u8, &FieldSpec)> {
        self.fields
            .iter()
            .map(|(&n, spec)| (n, spec))
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Switch every variable element's length prefix to `encoding`.
    pub fn with_length_encoding(mut self, encoding: LengthEncoding) -> Self {
        for spec in self.fields.values_mut() {
            if let FieldDescriptor::Variable(field) = spec.layout {
                spec.layout = field
                    .with_length_encoding(encoding)
                    .into();
            }
        }
        self
    }
}

// -----------------------------------------------------------------------------------------
// Message
// -----------------------------------------------------------------------------------------

/// A decoded message: MTI plus data element values as text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Message Type Indicator
    pub mti: Mti,
    fields: BTreeMap<u8, String>,
}

impl Message {
    /// Message with no data elements.
    pub fn new(mti: Mti) -> Self {
        Self {
            mti,
            fields: BTreeMap::new(),
        }
    }

    /// Set element `number` (2-128).
    pub fn set(&mut self, number: u8, value: impl Into<String>) -> Result<&mut Self, CodecError> {
        if !(2..=MAX_FIELD).contains(&number) {
            return Err(CodecError::UnknownField(number));
        }
        self.fields.insert(number, value.into());
        Ok(self)
    }

    /// Builder form of [`Message::set`].
    pub fn with(mut self, number: u8, value: impl Into<String>) -> Result<Self, CodecError> {
        self.set(number, value)?;
        Ok(self)
    }

    /// Value of element `number`.
    #[inline]
    pub fn get(&self, number: u8) -> Option<&str> {
        self.fields
            .get(&number)
            .map(String::as_str)
    }

    /// Remove element `number`, returning its value.
    pub fn remove(&mut self, number: u8) -> Option<String> {
        self.fields.remove(&number)
    }

    /// Present elements in ascending number order.
    pub fn fields(&self) -> impl Iterator<Item = (u8, &str)> {
        self.fields
            .iter()
            .map(|(&n, v)| (n, v.as_str()))
    }

    /// Bitmap flagging exactly the present elements.
    pub fn bitmap(&self) -> Result<BitmapIndex, CodecError> {
        BitmapIndex::from_fields(self.fields.keys().copied())
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MTI {}", self.mti)?;
        for (number, value) in self.fields() {
            write!(f, "\nDE {number:>3}: {value}")?;
        }
        Ok(())
    }
}

/// Decode a complete message; every byte must be consumed.
///
/// # Example
/// ```
/// # use iso8583_forge_helpers::{decode_message, parse_hex_spaced, MessageSpec};
/// let bytes = parse_hex_spaced(
///     "02 00 D0 20 00 00 00 00 00 00 00 00 00 00 00 00 00 00 \
///      16 45 39 68 12 34 56 78 90 00 00 00 00 10 00 12 34 56",
/// ).unwrap();
/// let message = decode_message(&MessageSpec::iso8583_numeric(), &bytes).unwrap();
/// assert_eq!(message.mti.as_str(), "0200");
/// assert_eq!(message.get(2), Some("4539681234567890"));
/// assert_eq!(message.get(4), Some("000000001000"));
/// assert_eq!(message.get(11), Some("123456"));
/// ```
pub fn decode_message(spec: &MessageSpec, bytes: &[u8]) -> Result<Message, ParseError> {
    let (message, consumed) = decode_message_prefix(spec, bytes)?;
    if consumed != bytes.len() {
        return Err(CodecError::TrailingBytes(bytes.len() - consumed)).at(ParseStage::Done);
    }
    Ok(message)
}

/// Decode one message from the front of `bytes`, returns it with the number
/// of bytes consumed. Anything after the last element is left alone.
pub fn decode_message_prefix(
    spec: &MessageSpec,
    bytes: &[u8],
) -> Result<(Message, usize), ParseError> {
    debug!(len = bytes.len(), "decoding ISO 8583 message");

    let mti = Mti::decode(bytes).at(ParseStage::Mti)?;
    let mut cursor = MTI_LEN;
    trace!(%mti, "MTI");

    let primary = take(bytes, cursor, PRIMARY_BITMAP_LEN).at(ParseStage::PrimaryBitmap)?;
    let mut bitmap = BitmapIndex::from_bytes(primary).at(ParseStage::PrimaryBitmap)?;
    cursor += PRIMARY_BITMAP_LEN;

    if bitmap.secondary_present() {
        take(bytes, cursor, PRIMARY_BITMAP_LEN).at(ParseStage::SecondaryBitmap)?;
        let both = take(bytes, MTI_LEN, EXTENDED_BITMAP_LEN).at(ParseStage::SecondaryBitmap)?;
        bitmap = BitmapIndex::from_bytes(both).at(ParseStage::SecondaryBitmap)?;
        cursor += PRIMARY_BITMAP_LEN;
    }
    trace!(%bitmap, "bitmap");

    let mut message = Message::new(mti);
    for number in bitmap.fields() {
        let stage = ParseStage::Field(number);
        let field = spec
            .get(number)
            .ok_or(CodecError::UnknownField(number))
            .at(stage)?;
        let (value, consumed) = decode_field(&field.layout, bytes, cursor).at(stage)?;
        trace!(
            field = number,
            name = %field.name,
            len = value.len(),
            consumed,
            "data element"
        );
        cursor += consumed;
        message.fields.insert(number, value);
    }

    debug!(%mti, fields = message.fields.len(), consumed = cursor, "decoded ISO 8583 message");
    Ok((message, cursor))
}

/// Encode a message; the bitmap is derived from the present elements.
///
/// # Example
/// ```
/// # use iso8583_forge_helpers::{encode_message, to_hex_spaced, Message, MessageSpec, Mti};
/// let message = Message::new(Mti::new("0800").unwrap())
///     .with(11, "000042").unwrap()
///     .with(70, "301").unwrap();
/// let bytes = encode_message(&MessageSpec::iso8583_numeric(), &message).unwrap();
/// assert_eq!(
///     to_hex_spaced(&bytes),
///     "08 00 80 20 00 00 00 00 00 00 04 00 00 00 00 00 00 00 00 00 42 03 01"
/// );
/// ```
pub fn encode_message(spec: &MessageSpec, message: &Message) -> Result<Vec<u8>, ParseError> {
    let bitmap = message
        .bitmap()
        .at(ParseStage::PrimaryBitmap)?;

    let mut out = Vec::with_capacity(MTI_LEN + bitmap.len_bytes() + 64);
    out.extend_from_slice(&message.mti.encode());
    out.extend_from_slice(bitmap.as_bytes());

    for (number, value) in message.fields() {
        let stage = ParseStage::Field(number);
        let field = spec
            .get(number)
            .ok_or(CodecError::UnknownField(number))
            .at(stage)?;
        let written = append_field(&mut out, &field.layout, value).at(stage)?;
        trace!(field = number, name = %field.name, written, "data element");
    }

    debug!(mti = %message.mti, len = out.len(), "encoded ISO 8583 message");
    Ok(out)
}

/// Pack an MTI given as text.
pub fn encode_mti(digits: &str) -> Result<[u8; MTI_LEN], CodecError> {
    Mti::new(digits).map(|mti| mti.encode())
}

#[inline]
fn take(bytes: &[u8], cursor: usize, len: usize) -> Result<&[u8], CodecError> {
    let available = bytes.len().saturating_sub(cursor);
    bytes
        .get(cursor..cursor + len)
        .ok_or(CodecError::truncated(len, available))
}
