//! Packed BCD (Binary-Coded Decimal) reading and writing.
//!
//! ISO 8583 numeric elements travel as packed BCD: two decimal digits per byte,
//! first digit in the high nibble. Odd digit counts carry one filler nibble,
//! which by convention sits on the left and is `0` (so `"123"` packs as
//! `01 23`). Track-style layouts put the filler on the right instead, usually
//! as `F`; [`BcdCodec`] carries whichever convention the field uses.
//!
//! # Validation
//!
//! Nothing here stops early or wraps silently:
//! - Encoding rejects any character outside `0`-`9`.
//! - Decoding rejects nibbles `A`-`F` in digit positions, a filler nibble that
//!   does not match the convention, and digit counts that do not fit the
//!   byte length.
//!
//! # Empty input
//!
//! `""` packs to zero bytes and zero bytes unpack to `""` (digit count 0).

use crate::BCD_PAIRS;
use crate::errors::CodecError;
use serde::{Deserialize, Serialize};

/// Which end of an odd-length digit string receives the filler nibble.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PadSide {
    /// Filler precedes the first digit (`"123"` -> `01 23`)
    #[default]
    Left,
    /// Filler follows the last digit (`"123"` -> `12 3F` with filler `F`)
    Right,
}

/// Packing convention for one BCD field.
///
/// Decoding is strict about the filler: an odd-length value whose filler
/// nibble differs from `pad_nibble` is rejected with
/// [`CodecError::MalformedBcd`] instead of being stripped blindly. This is a
/// policy of this crate, not of the wire format, which only requires the
/// filler to be dropped. Peers sending another filler need a codec built with
/// that filler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "BcdCodecDef", into = "BcdCodecDef")]
pub struct BcdCodec {
    pad_nibble: u8,
    pad_side: PadSide,
}

/// Serialized shape of [`BcdCodec`]; the filler must fit one nibble.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
struct BcdCodecDef {
    pad_nibble: u8,
    pad_side: PadSide,
}

impl Default for BcdCodecDef {
    fn default() -> Self {
        BcdCodec::LEFT_ZERO.into()
    }
}

impl TryFrom<BcdCodecDef> for BcdCodec {
    type Error = CodecError;

    fn try_from(def: BcdCodecDef) -> Result<Self, Self::Error> {
        if def.pad_nibble > 0x0F {
            return Err(CodecError::InvalidSpec(format!(
                "pad nibble {:#04X} does not fit 4 bits",
                def.pad_nibble
            )));
        }
        Ok(BcdCodec::new(def.pad_nibble, def.pad_side))
    }
}

impl From<BcdCodec> for BcdCodecDef {
    fn from(codec: BcdCodec) -> Self {
        Self {
            pad_nibble: codec.pad_nibble,
            pad_side: codec.pad_side,
        }
    }
}

impl Default for BcdCodec {
    fn default() -> Self {
        Self::LEFT_ZERO
    }
}

impl BcdCodec {
    /// Left filler `0`: the usual layout of numeric (`N`) elements.
    pub const LEFT_ZERO: BcdCodec = BcdCodec::new(0x0, PadSide::Left);

    /// Right filler `F`: the usual layout of track-2 style elements.
    pub const RIGHT_F: BcdCodec = BcdCodec::new(0xF, PadSide::Right);

    /// Create a codec. Bits above the low nibble of `pad_nibble` are dropped.
    #[inline]
    pub const fn new(pad_nibble: u8, pad_side: PadSide) -> Self {
        Self {
            pad_nibble: pad_nibble & 0x0F,
            pad_side,
        }
    }

    /// Filler nibble for odd digit counts (`0x0`-`0xF`).
    #[inline]
    pub const fn pad_nibble(&self) -> u8 {
        self.pad_nibble
    }

    /// Side the filler goes on.
    #[inline]
    pub const fn pad_side(&self) -> PadSide {
        self.pad_side
    }

    /// Pack a digit string into a new byte vector.
    ///
    /// # Example
    /// ```
    /// # use iso8583_forge_helpers::{BcdCodec, PadSide};
    /// let codec = BcdCodec::new(0xF, PadSide::Right);
    /// assert_eq!(codec.encode("123").unwrap(), vec![0x12, 0x3F]);
    /// assert_eq!(BcdCodec::default().encode("123").unwrap(), vec![0x01, 0x23]);
    /// ```
    pub fn encode(&self, digits: &str) -> Result<Vec<u8>, CodecError> {
        let mut out = vec![0u8; bcd_len(digits.len())];
        self.encode_into(&mut out, 0, digits)?;
        Ok(out)
    }

    /// Pack a digit string into `buf` at `pos`, returns bytes written.
    ///
    /// Fails with [`CodecError::TruncatedField`] when `buf` has fewer than
    /// `bcd_len(digits.len())` bytes from `pos`; nothing is written on failure.
    #[inline]
    pub fn encode_into(
        &self,
        buf: &mut [u8],
        pos: usize,
        digits: &str,
    ) -> Result<usize, CodecError> {
        self.pack_into(buf, pos, digits, Alphabet::Digits)
    }

    /// Unpack `digit_count` digits from `bytes`.
    ///
    /// `digit_count` must be `2 * bytes.len()` or `2 * bytes.len() - 1`; in the
    /// second case the filler nibble is checked and dropped.
    ///
    /// # Example
    /// ```
    /// # use iso8583_forge_helpers::BcdCodec;
    /// let codec = BcdCodec::default();
    /// assert_eq!(codec.decode(&[0x02, 0x00], 4).unwrap(), "0200");
    /// assert_eq!(codec.decode(&[0x01, 0x23], 3).unwrap(), "123");
    /// assert!(codec.decode(&[0x1A], 2).is_err());
    /// ```
    #[inline]
    pub fn decode(&self, bytes: &[u8], digit_count: usize) -> Result<String, CodecError> {
        self.unpack(bytes, digit_count, Alphabet::Digits)
    }

    /// Pack track data (`Z`): digits plus the `=` separator, carried as
    /// nibble `D`. Returns bytes written.
    ///
    /// # Example
    /// ```
    /// # use iso8583_forge_helpers::BcdCodec;
    /// let mut buf = [0u8; 3];
    /// BcdCodec::RIGHT_F.encode_track_into(&mut buf, 0, "12=34").unwrap();
    /// assert_eq!(buf, [0x12, 0xD3, 0x4F]);
    /// ```
    #[inline]
    pub fn encode_track_into(
        &self,
        buf: &mut [u8],
        pos: usize,
        track: &str,
    ) -> Result<usize, CodecError> {
        self.pack_into(buf, pos, track, Alphabet::Track)
    }

    /// Unpack `char_count` track characters (digits and `=`).
    #[inline]
    pub fn decode_track(&self, bytes: &[u8], char_count: usize) -> Result<String, CodecError> {
        self.unpack(bytes, char_count, Alphabet::Track)
    }

    fn pack_into(
        &self,
        buf: &mut [u8],
        pos: usize,
        text: &str,
        alphabet: Alphabet,
    ) -> Result<usize, CodecError> {
        alphabet.check(text)?;
        let raw = text.as_bytes();
        let len = bcd_len(raw.len());
        let available = buf.len().saturating_sub(pos);
        if available < len {
            return Err(CodecError::truncated(len, available));
        }

        let pad = self.pad_nibble;
        let lead = raw.len() % 2 == 1 && self.pad_side == PadSide::Left;
        let nibble = |k: usize| -> u8 {
            let k = if lead {
                match k.checked_sub(1) {
                    Some(k) => k,
                    None => return pad,
                }
            } else {
                k
            };
            raw.get(k)
                .and_then(|&c| alphabet.nibble(c))
                .unwrap_or(pad)
        };

        for (i, slot) in buf[pos..pos + len]
            .iter_mut()
            .enumerate()
        {
            *slot = (nibble(2 * i) << 4) | nibble(2 * i + 1);
        }
        Ok(len)
    }

    fn unpack(
        &self,
        bytes: &[u8],
        count: usize,
        alphabet: Alphabet,
    ) -> Result<String, CodecError> {
        let full = bytes.len() * 2;
        if count > full || count + 1 < full {
            return Err(CodecError::malformed(
                0,
                "digit count does not match byte length",
            ));
        }
        let padded = count < full;
        let pad_at = match self.pad_side {
            PadSide::Left => 0,
            PadSide::Right => full.wrapping_sub(1),
        };

        let mut out = String::with_capacity(count);
        for (offset, &b) in bytes.iter().enumerate() {
            for (k, nib) in [(2 * offset, b >> 4), (2 * offset + 1, b & 0x0F)] {
                if padded && k == pad_at {
                    if nib != self.pad_nibble {
                        return Err(CodecError::malformed(
                            offset,
                            "unexpected filler nibble",
                        ));
                    }
                    continue;
                }
                match alphabet.char(nib) {
                    Some(c) => out.push(c),
                    None => {
                        return Err(CodecError::malformed(
                            offset,
                            alphabet.bad_nibble(),
                        ));
                    }
                }
            }
        }
        Ok(out)
    }
}

/// Characters a BCD value may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Alphabet {
    /// `0`-`9`
    Digits,
    /// `0`-`9` and the `=` field separator (nibble `D`)
    Track,
}

impl Alphabet {
    #[inline(always)]
    fn nibble(self, c: u8) -> Option<u8> {
        match (self, c) {
            (_, b'0'..=b'9') => Some(c - b'0'),
            (Alphabet::Track, b'=') => Some(0xD),
            _ => None,
        }
    }

    #[inline(always)]
    fn char(self, nibble: u8) -> Option<char> {
        match (self, nibble) {
            (_, 0..=9) => Some(char::from(b'0' + nibble)),
            (Alphabet::Track, 0xD) => Some('='),
            _ => None,
        }
    }

    fn check(self, text: &str) -> Result<(), CodecError> {
        match text
            .chars()
            .enumerate()
            .find(|&(_, c)| !c.is_ascii() || self.nibble(c as u8).is_none())
        {
            Some((index, found)) => Err(CodecError::InvalidDigit { found, index }),
            None => Ok(()),
        }
    }

    fn bad_nibble(self) -> &'static str {
        match self {
            Alphabet::Digits => "nibble is not a decimal digit",
            Alphabet::Track => "nibble is not a track character",
        }
    }
}

/// Number of bytes needed to pack `n_digits` digits.
///
/// # Example
/// ```
/// # use iso8583_forge_helpers::bcd_len;
/// assert_eq!(bcd_len(4), 2);
/// assert_eq!(bcd_len(19), 10);
/// assert_eq!(bcd_len(0), 0);
/// ```
#[inline(always)]
pub const fn bcd_len(n_digits: usize) -> usize {
    n_digits.div_ceil(2)
}

/// Fail with [`CodecError::InvalidDigit`] at the first non-decimal character.
#[inline]
pub fn check_digits(digits: &str) -> Result<(), CodecError> {
    Alphabet::Digits.check(digits)
}

/// Fail with [`CodecError::InvalidDigit`] at the first character that is
/// neither a decimal digit nor the `=` track separator.
#[inline]
pub fn check_track(track: &str) -> Result<(), CodecError> {
    Alphabet::Track.check(track)
}

/// Pack digits with the default convention (left filler `0`).
///
/// # Example
/// ```
/// # use iso8583_forge_helpers::encode_bcd;
/// assert_eq!(encode_bcd("123456").unwrap(), vec![0x12, 0x34, 0x56]);
/// assert!(encode_bcd("12a4").is_err());
/// ```
#[inline]
pub fn encode_bcd(digits: &str) -> Result<Vec<u8>, CodecError> {
    BcdCodec::LEFT_ZERO.encode(digits)
}

/// Unpack digits with the default convention (left filler `0`).
#[inline]
pub fn decode_bcd(bytes: &[u8], digit_count: usize) -> Result<String, CodecError> {
    BcdCodec::LEFT_ZERO.decode(bytes, digit_count)
}

/// Write digits as left-padded BCD into `buf` at `pos`, returns bytes written.
///
/// # Example
/// ```
/// # use iso8583_forge_helpers::write_bcd;
/// let mut buf = [0u8; 8];
/// let written = write_bcd(&mut buf, 2, "0200").unwrap();
/// assert_eq!(written, 2);
/// assert_eq!(&buf[2..4], &[0x02, 0x00]);
/// ```
#[inline]
pub fn write_bcd(buf: &mut [u8], pos: usize, digits: &str) -> Result<usize, CodecError> {
    BcdCodec::LEFT_ZERO.encode_into(buf, pos, digits)
}

/// Write an unsigned value as `n_digits` zero-filled BCD digits, returns bytes written.
///
/// Fills backward one byte (two digits) at a time from a precomputed table.
/// Fails with [`CodecError::LengthOverflow`] if `value` needs more than
/// `n_digits` digits.
///
/// # Example
/// ```
/// # use iso8583_forge_helpers::write_bcd_u64;
/// let mut buf = [0u8; 6];
/// let written = write_bcd_u64(&mut buf, 0, 1000, 12).unwrap();
/// assert_eq!(written, 6);
/// assert_eq!(buf, [0x00, 0x00, 0x00, 0x00, 0x10, 0x00]);
/// ```
pub fn write_bcd_u64(
    buf: &mut [u8],
    pos: usize,
    value: u64,
    n_digits: usize,
) -> Result<usize, CodecError> {
    let needed = decimal_digits(value);
    if needed > n_digits {
        return Err(CodecError::overflow(needed, n_digits));
    }
    let len = bcd_len(n_digits);
    let available = buf.len().saturating_sub(pos);
    if available < len {
        return Err(CodecError::truncated(len, available));
    }

    let mut n = value;
    for slot in buf[pos..pos + len]
        .iter_mut()
        .rev()
    {
        *slot = BCD_PAIRS[(n % 100) as usize];
        n /= 100;
    }
    Ok(len)
}

/// Read a BCD byte run as an unsigned value (every nibble must be a digit).
///
/// Fails with [`CodecError::LengthOverflow`] when the value exceeds `u64`.
///
/// # Example
/// ```
/// # use iso8583_forge_helpers::read_bcd_u64;
/// assert_eq!(read_bcd_u64(&[0x12, 0x34, 0x56]).unwrap(), 123456);
/// assert_eq!(read_bcd_u64(&[]).unwrap(), 0);
/// ```
pub fn read_bcd_u64(bytes: &[u8]) -> Result<u64, CodecError> {
    let mut acc: u64 = 0;
    for (offset, &b) in bytes.iter().enumerate() {
        let (hi, lo) = (b >> 4, b & 0x0F);
        if hi > 9 || lo > 9 {
            return Err(CodecError::malformed(
                offset,
                "nibble is not a decimal digit",
            ));
        }
        acc = acc
            .checked_mul(100)
            .and_then(|v| v.checked_add(u64::from(hi * 10 + lo)))
            .ok_or(CodecError::overflow(bytes.len() * 2, 20))?;
    }
    Ok(acc)
}

/// Calculate the decimal digit length of a u64
#[inline(always)]
fn decimal_digits(n: u64) -> usize {
    n.checked_ilog10()
        .map_or(1, |d| d as usize + 1)
}
