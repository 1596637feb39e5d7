//! # iso8583-forge-helpers
//!
//! Helper functions for ISO 8583 binary message parsing and serialization.
//!
//! This crate covers the pieces every ISO 8583 integration needs: packed BCD
//! numerics, the primary/secondary bitmap, fixed and `LLVAR`/`LLLVAR` field
//! framing for numeric, text, binary and track values, and a whole-message decoder driven by a data element table.
//!
//! ## Platform Support
//!
//! **Unix/Linux Only** - This crate requires Unix-like systems and will NOT compile on Windows.
//! Uses `libc::clock_gettime` for DE 7 transmission timestamps.
//!
//! ## Wire Conventions
//!
//! - Numerics are packed BCD, odd lengths left-filled with `0`
//! - Variable fields carry a BCD length prefix (1 byte for `LL`, 2 for `LLL`)
//! - Bitmaps are binary, 8 bytes, or 16 when bit 1 is set
//! - Every failure is a typed [`CodecError`]; message-level failures name the
//!   [`ParseStage`] they happened in
//!
//! # Example
//!
//! ```rust
//! use iso8583_forge_helpers::*;
//!
//! let bytes = parse_hex_spaced(
//!     "02 00 D0 20 00 00 00 00 00 00 00 00 00 00 00 00 00 00 \
//!      16 45 39 68 12 34 56 78 90 00 00 00 00 10 00 12 34 56",
//! ).unwrap();
//!
//! let spec = MessageSpec::iso8583_numeric();
//! let message = decode_message(&spec, &bytes).unwrap();
//! assert_eq!(message.mti.class(), MessageClass::Financial);
//! assert_eq!(message.get(2), Some("4539681234567890")); // PAN
//! assert_eq!(message.get(4), Some("000000001000"));     // amount
//! assert_eq!(message.get(11), Some("123456"));          // STAN
//!
//! // Answer with the matching response MTI
//! let mut response = Message::new(message.mti.response().unwrap());
//! response.set(11, message.get(11).unwrap()).unwrap();
//! let framed = frame(&encode_message(&spec, &response).unwrap()).unwrap();
//! assert_eq!(&framed[..4], &[0x00, 0x0D, 0x02, 0x10]);
//! ```

// Compile-time platform check
#[cfg(not(unix))]
compile_error!(
    "iso8583-forge-helpers requires a Unix-like operating system (Linux, macOS, BSD). Windows is not supported due to the use of Unix-specific system calls like libc::clock_gettime. Consider using WSL2 or a containerized Linux environment for Windows development."
);

pub mod bcd;
pub mod bitmap;
pub mod buffer;
pub mod display;
pub mod errors;
pub mod field;
pub mod message;
pub mod special;

// Re-export all public items for convenience
pub use bcd::*;
pub use bitmap::*;
pub use buffer::*;
pub use display::*;
pub use errors::*;
pub use field::*;
pub use message::*;
pub use special::*;

/// Packed BCD byte for every value `0..100` (`BCD_PAIRS[42] == 0x42`).
pub(crate) const BCD_PAIRS: [u8; 100] = bcd_pairs();

const fn bcd_pairs() -> [u8; 100] {
    let mut table = [0u8; 100];
    let mut i = 0;
    while i < 100 {
        table[i] = ((i / 10) << 4 | i % 10) as u8;
        i += 1;
    }
    table
}
