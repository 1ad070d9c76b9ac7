//! Calendar helpers shared by the scheduler, the record log and the
//! downlink time-sync command.
//!
//! Record timestamps are 5-minute ticks since 2025-01-01 00:00; the 20-bit
//! field covers roughly ten years from that epoch. Times past the end of
//! that range (late 2034 onwards, while time sync accepts years up to
//! 2040) saturate at the largest tick instead of wrapping.

use crate::error::RtcError;
use crate::record::TIMESTAMP_MAX;

pub const SECONDS_PER_DAY: u32 = 86_400;
/// Length of one log tick in seconds.
pub const TICK_SECS: u32 = 300;

/// First year of the tick epoch.
pub const EPOCH_YEAR: u16 = 2025;
/// Latest year the time-sync command may set.
pub const MAX_YEAR: u16 = 2040;
/// Earliest year the time-sync command may set.
pub const MIN_YEAR: u16 = 2000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TimeOfDay {
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

impl TimeOfDay {
    pub const fn new(hour: u8, minute: u8, second: u8) -> Self {
        Self {
            hour,
            minute,
            second,
        }
    }

    /// Build from seconds since midnight, wrapping past 24 h.
    pub fn from_seconds(secs: u32) -> Self {
        let secs = secs % SECONDS_PER_DAY;
        Self {
            hour: (secs / 3600) as u8,
            minute: (secs / 60 % 60) as u8,
            second: (secs % 60) as u8,
        }
    }

    pub fn seconds_of_day(&self) -> u32 {
        u32::from(self.hour) * 3600 + u32::from(self.minute) * 60 + u32::from(self.second)
    }

    pub fn is_valid(&self) -> bool {
        self.hour < 24 && self.minute < 60 && self.second < 60
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Date {
    pub day: u8,
    pub month: u8,
    /// Full year, e.g. 2026.
    pub year: u16,
}

impl Date {
    pub const fn new(day: u8, month: u8, year: u16) -> Self {
        Self { day, month, year }
    }

    pub fn is_valid(&self) -> bool {
        (1..=12).contains(&self.month)
            && self.day >= 1
            && self.day <= days_in_month(self.month, self.year)
    }
}

impl Date {
    /// The following calendar day.
    pub fn next_day(&self) -> Self {
        if self.day < days_in_month(self.month, self.year) {
            Self::new(self.day + 1, self.month, self.year)
        } else if self.month < 12 {
            Self::new(1, self.month + 1, self.year)
        } else {
            Self::new(1, 1, self.year + 1)
        }
    }
}

impl Default for Date {
    fn default() -> Self {
        Self::new(1, 1, EPOCH_YEAR)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DateTime {
    pub date: Date,
    pub time: TimeOfDay,
}

impl DateTime {
    pub fn validate(&self) -> Result<(), RtcError> {
        if self.date.is_valid() && self.time.is_valid() {
            Ok(())
        } else {
            Err(RtcError::InvalidDateTime)
        }
    }

    /// Move forward by `secs`, rolling the date over at midnight.
    pub fn advance(&mut self, secs: u32) {
        let total = self.time.seconds_of_day() + secs;
        self.time = TimeOfDay::from_seconds(total);
        for _ in 0..total / SECONDS_PER_DAY {
            self.date = self.date.next_day();
        }
    }

    /// 5-minute ticks since 2025-01-01 00:00.  Dates before the epoch
    /// yield 0; dates past the 20-bit range yield `TIMESTAMP_MAX`.
    pub fn tick_timestamp(&self) -> u32 {
        if self.date.year < EPOCH_YEAR {
            return 0;
        }
        let mut days: u32 = (EPOCH_YEAR..self.date.year)
            .map(|y| if is_leap_year(y) { 366 } else { 365 })
            .sum();
        for m in 1..self.date.month {
            days += u32::from(days_in_month(m, self.date.year));
        }
        days += u32::from(self.date.day.saturating_sub(1));

        let minutes = days * 24 * 60 + u32::from(self.time.hour) * 60 + u32::from(self.time.minute);
        (minutes / 5).min(TIMESTAMP_MAX)
    }
}

pub fn is_leap_year(year: u16) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

pub fn days_in_month(month: u8, year: u16) -> u8 {
    match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        2 if is_leap_year(year) => 29,
        2 => 28,
        _ => 0,
    }
}

/// `now + delta` seconds, wrapped to the day.
pub fn offset_seconds(now: u32, delta: u32) -> u32 {
    (now % SECONDS_PER_DAY + delta % SECONDS_PER_DAY) % SECONDS_PER_DAY
}
