//! Generated field values: DE 7 transmission date/time and DE 11 trace numbers.
//!
//! Timestamp note:
//! - The packed BCD month/day (`MMDD`, 2 bytes) for the current UTC day is cached.
//! - On each call only hour, minute and second are packed.
//! - Day number and month/day share one atomic word, so a reader never pairs one day's
//!   number with another day's digits.

use crate::BCD_PAIRS;
use crate::errors::CodecError;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

// -----------------------------------------------------------------------------------------
// Date cache: (days since Unix epoch << 16) | packed BCD "MMDD"
// -----------------------------------------------------------------------------------------
static CACHED_DATE: AtomicU64 = AtomicU64::new(u64::MAX); // Sentinel invalid day

// Trace number state
static STAN_COUNTER: AtomicU32 = AtomicU32::new(0);

const SECS_PER_DAY: u64 = 86_400;

/// Bytes taken by a packed `MMDDhhmmss` value.
pub const TRANSMISSION_DATETIME_LEN: usize = 5;

/// Bytes taken by a packed 6-digit trace number.
pub const STAN_LEN: usize = 3;

/// Largest system trace audit number; the sequence wraps back to 1 after it.
pub const STAN_MAX: u32 = 999_999;

#[cfg(test)]
pub(crate) fn __reset_date_cache_for_test() {
    CACHED_DATE.store(u64::MAX, Ordering::Release);
}

/// Civil (year, month, day) for a count of days since 1970-01-01.
///
/// Howard Hinnant's `civil_from_days`.
#[inline(always)]
fn civil_from_days(day_number: u64) -> (i64, u8, u8) {
    let z = day_number as i64 + 719_468;
    let era = z / 146_097;
    let doe = z - era * 146_097;
    let yoe = (doe - doe / 1_460 + doe / 36_524 - doe / 146_096) / 365;
    let y = yoe + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = doy - (153 * mp + 2) / 5 + 1;
    let m = mp + if mp < 10 { 3 } else { -9 };
    let year = y + if m <= 2 { 1 } else { 0 };
    (year, m as u8, d as u8)
}

/// Recompute and publish the packed month/day for the given day number.
#[inline(always)]
fn publish_date_for_day(day_number: u64) -> [u8; 2] {
    let (_, month, day) = civil_from_days(day_number);
    let mmdd = [BCD_PAIRS[month as usize], BCD_PAIRS[day as usize]];

    let packed = (day_number << 16) | u64::from(u16::from_be_bytes(mmdd));
    CACHED_DATE.store(packed, Ordering::Release);
    mmdd
}

/// Packed month/day for `day_number`, from the cache when it is current.
#[inline(always)]
fn cached_mmdd(day_number: u64) -> [u8; 2] {
    let packed = CACHED_DATE.load(Ordering::Acquire);
    if packed >> 16 == day_number {
        return (packed as u16).to_be_bytes();
    }
    // Possible benign races on day boundary; last writer wins
    publish_date_for_day(day_number)
}

#[inline(always)]
fn now() -> libc::timespec {
    let mut ts = libc::timespec {
        tv_sec: 0,
        tv_nsec: 0,
    };
    unsafe { libc::clock_gettime(libc::CLOCK_REALTIME, &mut ts) };
    ts
}

/// Write the current UTC time as DE 7 (`MMDDhhmmss`, 5 BCD bytes).
///
/// Uses `libc::clock_gettime` (CLOCK_REALTIME). Returns the bytes written.
///
/// # Example
/// ```
/// # use iso8583_forge_helpers::{write_transmission_datetime, read_bcd_u64};
/// let mut buf = [0u8; 8];
/// let written = write_transmission_datetime(&mut buf, 1).unwrap();
/// assert_eq!(written, 5);
/// let month = read_bcd_u64(&buf[1..2]).unwrap();
/// assert!((1..=12).contains(&month));
/// ```
#[inline]
pub fn write_transmission_datetime(buf: &mut [u8], pos: usize) -> Result<usize, CodecError> {
    format_transmission_datetime_from_timespec(buf, pos, &now())
}

/// Write DE 7 for a pre-fetched `libc::timespec`.
///
/// Lets callers read the clock once per message and reuse it for DE 7, DE 12
/// and DE 13. Sub-second precision is dropped.
///
/// # Example
/// ```
/// # use iso8583_forge_helpers::format_transmission_datetime_from_timespec;
/// let ts = libc::timespec { tv_sec: 1_700_000_000, tv_nsec: 0 }; // 2023-11-14 22:13:20 UTC
/// let mut buf = [0u8; 5];
/// format_transmission_datetime_from_timespec(&mut buf, 0, &ts).unwrap();
/// assert_eq!(buf, [0x11, 0x14, 0x22, 0x13, 0x20]);
/// ```
#[inline]
pub fn format_transmission_datetime_from_timespec(
    buf: &mut [u8],
    pos: usize,
    ts: &libc::timespec,
) -> Result<usize, CodecError> {
    let available = buf.len().saturating_sub(pos);
    if available < TRANSMISSION_DATETIME_LEN {
        return Err(CodecError::truncated(TRANSMISSION_DATETIME_LEN, available));
    }

    let secs = ts.tv_sec.max(0) as u64;
    let day_number = secs / SECS_PER_DAY;
    let sec_of_day = (secs - day_number * SECS_PER_DAY) as usize;

    let mmdd = cached_mmdd(day_number);
    let out = &mut buf[pos..pos + TRANSMISSION_DATETIME_LEN];
    out[..2].copy_from_slice(&mmdd);
    out[2] = BCD_PAIRS[sec_of_day / 3600];
    out[3] = BCD_PAIRS[(sec_of_day % 3600) / 60];
    out[4] = BCD_PAIRS[sec_of_day % 60];

    Ok(TRANSMISSION_DATETIME_LEN)
}

/// Next system trace audit number (DE 11), `1..=999_999`, wrapping.
///
/// Process-wide and safe to call from any thread; concurrent callers never
/// see the same value within one cycle.
///
/// # Example
/// ```
/// # use iso8583_forge_helpers::{next_stan, STAN_MAX};
/// let a = next_stan();
/// let b = next_stan();
/// assert!((1..=STAN_MAX).contains(&a));
/// assert_ne!(a, b);
/// ```
#[inline]
pub fn next_stan() -> u32 {
    let previous = STAN_COUNTER
        .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| {
            Some(if n >= STAN_MAX { 1 } else { n + 1 })
        })
        .unwrap_or_default();
    if previous >= STAN_MAX { 1 } else { previous + 1 }
}

/// Write the next trace number as DE 11 (6 digits, 3 BCD bytes).
///
/// # Example
/// ```
/// # use iso8583_forge_helpers::{write_stan, read_bcd_u64};
/// let mut buf = [0u8; 3];
/// assert_eq!(write_stan(&mut buf, 0).unwrap(), 3);
/// assert!(read_bcd_u64(&buf).unwrap() >= 1);
/// ```
#[inline]
pub fn write_stan(buf: &mut [u8], pos: usize) -> Result<usize, CodecError> {
    crate::bcd::write_bcd_u64(buf, pos, u64::from(next_stan()), 6)
}
