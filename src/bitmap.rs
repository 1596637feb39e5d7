//! Primary and secondary bitmaps.
//!
//! A bitmap says which data elements follow it. Bits are numbered from 1,
//! starting at the most significant bit of the first byte:
//!
//! ```text
//! D0       20       00 ...
//! 11010000 00100000 00000000 ...
//! ^^ ^      ^
//! 1  4      11
//! ```
//!
//! Bit 1 of the primary bitmap is not a data element: it announces an 8-byte
//! secondary bitmap carrying elements 65-128.

use crate::display::{byte_bits, to_hex_spaced};
use crate::errors::CodecError;
use core::fmt;
use core::iter::FusedIterator;

/// Bytes in a primary bitmap.
pub const PRIMARY_BITMAP_LEN: usize = 8;

/// Bytes in a primary plus secondary bitmap.
pub const EXTENDED_BITMAP_LEN: usize = 16;

/// Highest data element number a primary+secondary bitmap can flag.
pub const MAX_FIELD: u8 = 128;

/// Read-only view of a 64- or 128-bit bitmap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BitmapIndex {
    bytes: [u8; EXTENDED_BITMAP_LEN],
    len: usize,
}

impl BitmapIndex {
    /// Interpret 8 or 16 bytes as a big-endian bit string.
    ///
    /// # Example
    /// ```
    /// # use iso8583_forge_helpers::BitmapIndex;
    /// let bitmap = BitmapIndex::from_bytes(&[0xD0, 0x20, 0, 0, 0, 0, 0, 0]).unwrap();
    /// assert!(bitmap.secondary_present());
    /// assert_eq!(bitmap.set_bits().collect::<Vec<_>>(), vec![1, 2, 4, 11]);
    /// assert!(BitmapIndex::from_bytes(&[0; 7]).is_err());
    /// ```
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CodecError> {
        match bytes.len() {
            PRIMARY_BITMAP_LEN | EXTENDED_BITMAP_LEN => {
                let mut out = [0u8; EXTENDED_BITMAP_LEN];
                out[..bytes.len()].copy_from_slice(bytes);
                Ok(Self {
                    bytes: out,
                    len: bytes.len(),
                })
            }
            len => Err(CodecError::InvalidBitmapLength { len }),
        }
    }

    /// Build the bitmap for a set of data element numbers.
    ///
    /// Any element above 64 makes the bitmap 16 bytes long and sets bit 1;
    /// otherwise it is 8 bytes with bit 1 clear. Element numbers outside
    /// 2-128 fail with [`CodecError::UnknownField`].
    ///
    /// # Example
    /// ```
    /// # use iso8583_forge_helpers::BitmapIndex;
    /// let bitmap = BitmapIndex::from_fields([2, 4, 11]).unwrap();
    /// assert_eq!(bitmap.as_bytes(), &[0x50, 0x20, 0, 0, 0, 0, 0, 0]);
    ///
    /// let bitmap = BitmapIndex::from_fields([11, 70]).unwrap();
    /// assert_eq!(bitmap.len_bytes(), 16);
    /// assert!(bitmap.secondary_present());
    /// ```
    pub fn from_fields<I>(fields: I) -> Result<Self, CodecError>
    where
        I: IntoIterator<Item = u8>,
    {
        let mut bytes = [0u8; EXTENDED_BITMAP_LEN];
        let mut extended = false;
        for field in fields {
            if !(2..=MAX_FIELD).contains(&field) {
                return Err(CodecError::UnknownField(field));
            }
            extended |= field > 64;
            let bit = usize::from(field - 1);
            bytes[bit / 8] |= 0x80 >> (bit % 8);
        }
        if extended {
            bytes[0] |= 0x80;
        }
        Ok(Self {
            bytes,
            len: if extended {
                EXTENDED_BITMAP_LEN
            } else {
                PRIMARY_BITMAP_LEN
            },
        })
    }

    /// Whether bit `position` (1-based) is set. Positions outside
    /// `1..=len_bytes() * 8` are never set.
    #[inline]
    pub fn is_set(&self, position: usize) -> bool {
        if position == 0 || position > self.capacity() {
            return false;
        }
        let bit = position - 1;
        self.bytes[bit / 8] & (0x80 >> (bit % 8)) != 0
    }

    /// Whether bit 1 announces a secondary bitmap.
    #[inline]
    pub fn secondary_present(&self) -> bool {
        self.is_set(1)
    }

    /// Ascending positions of every set bit, bit 1 included.
    ///
    /// Each call starts a fresh scan; the iterator borrows the bitmap and
    /// never changes it.
    #[inline]
    pub fn set_bits(&self) -> SetBits<'_> {
        SetBits {
            bytes: self.as_bytes(),
            pos: 0,
        }
    }

    /// Ascending data element numbers present, without the bit 1 indicator.
    pub fn fields(&self) -> impl Iterator<Item = u8> + '_ {
        self.set_bits()
            .filter(|&bit| bit != 1)
            .map(|bit| bit as u8)
    }

    /// Raw bitmap bytes (8 or 16).
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len]
    }

    /// 8 or 16.
    #[inline]
    pub fn len_bytes(&self) -> usize {
        self.len
    }

    /// Number of addressable bits (64 or 128).
    #[inline]
    pub fn capacity(&self) -> usize {
        self.len * 8
    }

    /// The first 8 bytes.
    #[inline]
    pub fn primary(&self) -> &[u8] {
        &self.bytes[..PRIMARY_BITMAP_LEN]
    }

    /// The extension bytes, when this bitmap carries them.
    #[inline]
    pub fn secondary(&self) -> Option<&[u8]> {
        (self.len == EXTENDED_BITMAP_LEN).then(|| &self.bytes[PRIMARY_BITMAP_LEN..])
    }

    /// Binary rendering, one space-separated group of 8 bits per byte.
    ///
    /// # Example
    /// ```
    /// # use iso8583_forge_helpers::BitmapIndex;
    /// let bitmap = BitmapIndex::from_bytes(&[0xD0, 0x20, 0, 0, 0, 0, 0, 0]).unwrap();
    /// assert!(bitmap.bit_string().starts_with("11010000 00100000 00000000"));
    /// ```
    pub fn bit_string(&self) -> String {
        self.as_bytes()
            .iter()
            .map(|&b| byte_bits(b))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl fmt::Display for BitmapIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&to_hex_spaced(self.as_bytes()))
    }
}

/// Iterator over set bit positions of a [`BitmapIndex`].
#[derive(Debug, Clone)]
pub struct SetBits<'a> {
    bytes: &'a [u8],
    /// Next 0-based bit to examine
    pos: usize,
}

impl Iterator for SetBits<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        let total = self.bytes.len() * 8;
        while self.pos < total {
            let byte = self.bytes[self.pos / 8];
            let rest = byte << (self.pos % 8);
            if rest == 0 {
                // Nothing left in this byte, jump to the next one
                self.pos = (self.pos / 8 + 1) * 8;
                continue;
            }
            let bit = self.pos + rest.leading_zeros() as usize;
            self.pos = bit + 1;
            return Some(bit + 1);
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.bytes.len() * 8 - self.pos.min(self.bytes.len() * 8)))
    }
}

impl FusedIterator for SetBits<'_> {}

#[cfg(test)]
mod tests {
    use super::*;

    const PRIMARY: [u8; 8] = [0xD0, 0x20, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00];

    #[test]
    fn test_set_bits_canonical_primary() {
        let bitmap = BitmapIndex::from_bytes(&PRIMARY).unwrap();
        assert_eq!(
            bitmap
                .set_bits()
                .collect::<Vec<_>>(),
            vec![1, 2, 4, 11]
        );
        assert_eq!(
            bitmap.fields().collect::<Vec<_>>(),
            vec![2, 4, 11]
        );
        assert!(bitmap.secondary_present());
        assert_eq!(bitmap.len_bytes(), 8);
        assert_eq!(bitmap.secondary(), None);
    }

    #[test]
    fn test_invalid_lengths() {
        for len in [0, 1, 7, 9, 15, 17, 32] {
            let bytes = vec![0u8; len];
            assert_eq!(
                BitmapIndex::from_bytes(&bytes),
                Err(CodecError::InvalidBitmapLength { len })
            );
        }
    }

    #[test]
    fn test_is_set_bounds_and_stability() {
        let bitmap = BitmapIndex::from_bytes(&PRIMARY).unwrap();
        assert!(!bitmap.is_set(0));
        assert!(!bitmap.is_set(65));
        assert!(!bitmap.is_set(usize::MAX));
        for _ in 0..3 {
            assert!(bitmap.is_set(11));
            assert!(!bitmap.is_set(12));
        }
        assert_eq!(bitmap.as_bytes(), &PRIMARY);
    }

    #[test]
    fn test_set_bits_restartable() {
        let bitmap = BitmapIndex::from_bytes(&PRIMARY).unwrap();
        let mut scan = bitmap.set_bits();
        assert_eq!(scan.next(), Some(1));
        let copy = scan.clone();
        assert_eq!(scan.collect::<Vec<_>>(), vec![2, 4, 11]);
        assert_eq!(copy.collect::<Vec<_>>(), vec![2, 4, 11]);
        assert_eq!(bitmap.set_bits().count(), 4);
    }

    #[test]
    fn test_extended_bitmap() {
        let mut bytes = [0u8; 16];
        bytes[0] = 0x80;
        bytes[15] = 0x01; // bit 128
        bytes[8] = 0x40; // bit 66
        let bitmap = BitmapIndex::from_bytes(&bytes).unwrap();
        assert_eq!(
            bitmap
                .set_bits()
                .collect::<Vec<_>>(),
            vec![1, 66, 128]
        );
        assert_eq!(bitmap.capacity(), 128);
        assert_eq!(bitmap.secondary(), Some(&bytes[8..]));
        assert_eq!(bitmap.primary(), &bytes[..8]);
    }

    #[test]
    fn test_all_bits() {
        let bitmap = BitmapIndex::from_bytes(&[0xFF; 8]).unwrap();
        assert_eq!(
            bitmap
                .set_bits()
                .collect::<Vec<_>>(),
            (1..=64).collect::<Vec<_>>()
        );
        let empty = BitmapIndex::from_bytes(&[0; 16]).unwrap();
        assert_eq!(empty.set_bits().next(), None);
        assert!(!empty.secondary_present());
    }

    #[test]
    fn test_from_fields() {
        let bitmap = BitmapIndex::from_fields([11, 4, 2]).unwrap();
        assert_eq!(bitmap.as_bytes(), &[0x50, 0x20, 0, 0, 0, 0, 0, 0]);
        assert!(!bitmap.secondary_present());

        let bitmap = BitmapIndex::from_fields([2, 4, 11, 70]).unwrap();
        assert_eq!(bitmap.len_bytes(), 16);
        assert_eq!(
            bitmap
                .set_bits()
                .collect::<Vec<_>>(),
            vec![1, 2, 4, 11, 70]
        );

        let bitmap = BitmapIndex::from_fields(core::iter::empty()).unwrap();
        assert_eq!(bitmap.as_bytes(), &[0; 8]);

        assert_eq!(
            BitmapIndex::from_fields([1]),
            Err(CodecError::UnknownField(1))
        );
        assert_eq!(
            BitmapIndex::from_fields([129]),
            Err(CodecError::UnknownField(129))
        );
    }

    #[test]
    fn test_display_and_bit_string() {
        let bitmap = BitmapIndex::from_bytes(&PRIMARY).unwrap();
        assert_eq!(bitmap.to_string(), "D0 20 00 00 00 00 00 00");
        assert_eq!(
            bitmap.bit_string(),
            "11010000 00100000 00000000 00000000 00000000 00000000 00000000 00000000"
        );
    }
}
