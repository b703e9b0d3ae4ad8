//! NTP64 time tags
//!
//! OSC time tags are 64-bit NTP timestamps:
//! ```text
//! ┌───────────────────────────────┬───────────────────────────────┐
//! │ seconds since 1900 (u32, BE)  │ fraction of a second (u32, BE)│
//! └───────────────────────────────┴───────────────────────────────┘
//! ```
//!
//! The seconds field rolls over in February 2036. Following RFC 2030, a
//! set high bit means the 1900 era (1968-2036), a clear high bit means the
//! era that starts on 2036-02-07 06:28:16 UTC.
//!
//! The value `0x0000000000000001` is reserved for "immediately" and is never
//! converted to a wall-clock instant.

use std::fmt;
use std::str::FromStr;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::{Error, Result};

/// Unix milliseconds of 2036-02-07 06:28:16 UTC (NTP era 1 start)
pub const MSB_0_BASE_TIME: i64 = 2_085_978_496_000;

/// Unix milliseconds of 1900-01-01 00:00:00 UTC (NTP era 0 start)
pub const MSB_1_BASE_TIME: i64 = -2_208_988_800_000;

/// Seconds between the NTP epoch and the Unix epoch
pub const SECONDS_FROM_1900_TO_1970: u64 = 2_208_988_800;

const FRACTION_SCALE: u64 = 0x1_0000_0000;

/// A 64-bit NTP time tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimeTag(u64);

impl TimeTag {
    /// The reserved "process immediately" tag (63 zero bits and a one)
    pub const IMMEDIATE: TimeTag = TimeTag(1);

    /// Wrap a raw NTP64 value
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Build from the seconds and fraction words
    pub const fn from_parts(seconds: u32, fraction: u32) -> Self {
        Self(((seconds as u64) << 32) | fraction as u64)
    }

    /// Raw NTP64 value as written on the wire
    pub const fn as_raw(&self) -> u64 {
        self.0
    }

    /// High-order word: seconds within the current NTP era
    pub const fn seconds(&self) -> u32 {
        (self.0 >> 32) as u32
    }

    /// Low-order word: binary fraction of a second
    pub const fn fraction(&self) -> u32 {
        self.0 as u32
    }

    pub const fn is_immediate(&self) -> bool {
        self.0 == Self::IMMEDIATE.0
    }

    /// Current wall-clock time
    pub fn now() -> Self {
        Self::from_system_time(SystemTime::now())
    }

    /// Convert Unix milliseconds to an NTP time tag.
    ///
    /// Instants before 2036-02-07 use the 1900 era, later ones the 2036 era.
    /// Only 1968..2104 is representable without ambiguity.
    pub fn from_unix_millis(millis: i64) -> Self {
        let base = if millis < MSB_0_BASE_TIME {
            millis - MSB_1_BASE_TIME
        } else {
            millis - MSB_0_BASE_TIME
        };

        let seconds = base.div_euclid(1000) as u64 & 0xFFFF_FFFF;
        let fraction = (base.rem_euclid(1000) as u64 * FRACTION_SCALE) / 1000;

        Self((seconds << 32) | fraction)
    }

    /// Convert to Unix milliseconds, rounding the fraction to the nearest
    /// millisecond. Returns `None` for [`TimeTag::IMMEDIATE`].
    pub fn to_unix_millis(&self) -> Option<i64> {
        if self.is_immediate() {
            return None;
        }

        let seconds = self.seconds() as i64;
        let fraction_ms = ((self.fraction() as u64 * 1000 + FRACTION_SCALE / 2) / FRACTION_SCALE) as i64;

        let base = if self.seconds() & 0x8000_0000 == 0 {
            MSB_0_BASE_TIME
        } else {
            MSB_1_BASE_TIME
        };

        Some(base + seconds * 1000 + fraction_ms)
    }

    /// Convert a calendar instant to a time tag (millisecond precision)
    pub fn from_system_time(time: SystemTime) -> Self {
        let millis = match time.duration_since(UNIX_EPOCH) {
            Ok(d) => d.as_millis() as i64,
            Err(e) => -(e.duration().as_millis() as i64),
        };
        Self::from_unix_millis(millis)
    }

    /// Convert to a calendar instant. Returns `None` for [`TimeTag::IMMEDIATE`].
    pub fn to_system_time(&self) -> Option<SystemTime> {
        let millis = self.to_unix_millis()?;
        if millis >= 0 {
            UNIX_EPOCH.checked_add(Duration::from_millis(millis as u64))
        } else {
            UNIX_EPOCH.checked_sub(Duration::from_millis(millis.unsigned_abs()))
        }
    }
}

impl Default for TimeTag {
    fn default() -> Self {
        Self::IMMEDIATE
    }
}

impl From<SystemTime> for TimeTag {
    fn from(time: SystemTime) -> Self {
        Self::from_system_time(time)
    }
}

/// Hex form `c1a089bd.fc904f6d` (seconds, fraction)
impl fmt::Display for TimeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:08x}.{:08x}", self.seconds(), self.fraction())
    }
}

impl FromStr for TimeTag {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let parse = |part: &str| {
            u32::from_str_radix(part, 16)
                .map_err(|e| Error::DecodeError(format!("bad NTP hex string {:?}: {}", s, e)))
        };

        match s.split_once('.') {
            Some((secs, frac)) => Ok(Self::from_parts(parse(secs)?, parse(frac)?)),
            None if s.is_empty() => Ok(Self(0)),
            None => Ok(Self::from_parts(parse(s)?, 0)),
        }
    }
}
