// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! Contains the implementation of `DateTime`.

use std::{
    fmt,
    io::{Read, Write},
    ops::Add,
    str::FromStr,
};

use chrono::{Duration, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::types::encoding::*;

const NANOS_PER_TICK: i64 = 100;
const TICKS_PER_SECOND: i64 = 10_000_000;
const TICKS_PER_MILLISECOND: i64 = 10_000;

/// Ticks between 1601-01-01 (the OPC UA epoch) and 1970-01-01 (the unix epoch)
const UNIX_EPOCH_TICKS: i64 = 116_444_736_000_000_000;
/// Ticks of 9999-12-31 23:59:59, after which dates are encoded as `i64::MAX`
const ENDTIMES_TICKS: i64 = 2_650_467_743_990_000_000;

pub type DateTimeUtc = chrono::DateTime<Utc>;

/// A date / time value held as the number of 100 nanosecond ticks since 1601-01-01 UTC, which
/// is also how it appears on the wire. A value of 0 is the null date.
#[derive(PartialEq, Eq, PartialOrd, Ord, Debug, Clone, Copy, Hash)]
pub struct DateTime {
    ticks: i64,
}

impl Serialize for DateTime {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.checked_ticks().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for DateTime {
    fn deserialize<D>(deserializer: D) -> Result<DateTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let ticks = i64::deserialize(deserializer)?;
        Ok(DateTime::from(ticks))
    }
}

/// DateTime encoded as 64-bit signed int
impl BinaryEncoder<DateTime> for DateTime {
    fn byte_len(&self) -> usize {
        8
    }

    fn encode<S: Write>(&self, stream: &mut S) -> EncodingResult<usize> {
        write_i64(stream, self.checked_ticks())
    }

    fn decode<S: Read>(stream: &mut S, decoding_options: &DecodingOptions) -> EncodingResult<Self> {
        let date_time = DateTime::from(read_i64(stream)?);
        if date_time.is_null() || decoding_options.client_offset == Duration::zero() {
            Ok(date_time)
        } else {
            Ok(date_time + (-decoding_options.client_offset))
        }
    }
}

impl Default for DateTime {
    fn default() -> Self {
        DateTime::null()
    }
}

impl Add<Duration> for DateTime {
    type Output = Self;

    fn add(self, duration: Duration) -> Self {
        let ticks = duration
            .num_microseconds()
            .map(|micros| micros * 10)
            .unwrap_or_else(|| duration.num_milliseconds() * TICKS_PER_MILLISECOND);
        DateTime::from(self.ticks.saturating_add(ticks))
    }
}

impl From<DateTimeUtc> for DateTime {
    fn from(date_time: DateTimeUtc) -> Self {
        let seconds = date_time.timestamp();
        let nanos = date_time.timestamp_subsec_nanos() as i64;
        DateTime::from(
            seconds
                .saturating_mul(TICKS_PER_SECOND)
                .saturating_add(nanos / NANOS_PER_TICK)
                .saturating_add(UNIX_EPOCH_TICKS),
        )
    }
}

/// Values outside the representable range clamp to the null date or the end of time.
impl From<i64> for DateTime {
    fn from(ticks: i64) -> Self {
        let ticks = if ticks < 0 {
            0
        } else if ticks > ENDTIMES_TICKS {
            ENDTIMES_TICKS
        } else {
            ticks
        };
        DateTime { ticks }
    }
}

impl From<DateTime> for i64 {
    fn from(value: DateTime) -> Self {
        value.ticks
    }
}

impl fmt::Display for DateTime {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.as_chrono() {
            Some(dt) => write!(f, "{}", dt.to_rfc3339()),
            None => write!(f, "{} ticks", self.ticks),
        }
    }
}

impl FromStr for DateTime {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DateTimeUtc::from_str(s).map(DateTime::from).map_err(|e| {
            error!("Cannot parse date {}, error = {}", s, e);
        })
    }
}

impl DateTime {
    /// Constructs from the current time
    pub fn now() -> DateTime {
        DateTime::from(Utc::now())
    }

    /// Creates a null date time (i.e. the epoch)
    pub fn null() -> DateTime {
        DateTime { ticks: 0 }
    }

    /// Tests if the date time is null (i.e. equal to epoch)
    pub fn is_null(&self) -> bool {
        self.ticks == 0
    }

    /// Constructs a date time for the end of time
    pub fn endtimes() -> DateTime {
        DateTime {
            ticks: ENDTIMES_TICKS,
        }
    }

    /// Returns the time in ticks, of 100 nanosecond intervals
    pub fn ticks(&self) -> i64 {
        self.ticks
    }

    /// Ticks as they go onto the wire, the end of time becomes `i64::MAX`
    pub fn checked_ticks(&self) -> i64 {
        if self.ticks >= ENDTIMES_TICKS {
            i64::MAX
        } else {
            self.ticks
        }
    }

    /// Milliseconds elapsed from `earlier` to this date time, negative if `earlier` is later
    pub fn millis_since(&self, earlier: &DateTime) -> i64 {
        (self.ticks - earlier.ticks) / TICKS_PER_MILLISECOND
    }

    /// Time as chrono, if it can be represented
    pub fn as_chrono(&self) -> Option<DateTimeUtc> {
        let unix_ticks = self.ticks - UNIX_EPOCH_TICKS;
        let seconds = unix_ticks.div_euclid(TICKS_PER_SECOND);
        let nanos = (unix_ticks.rem_euclid(TICKS_PER_SECOND) * NANOS_PER_TICK) as u32;
        Utc.timestamp_opt(seconds, nanos).single()
    }
}
