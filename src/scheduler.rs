//! Alarm scheduler: picks the next wake-up between the measurement alarm
//! and the uplink alarm.
//!
//! Pure computation over the settings and the current time of day; the
//! mode controller arms whatever [`resolve`] returns.
//!
//! ```text
//!   now ──────────────┬───────────────┬──────────────▶ time of day
//!                     │ temp alarm    │ radio alarm
//!                     │◀── ≤ tolerance ──▶│
//!                     └─ radio wins: one measure-and-send cycle
//! ```
//!
//! Times are seconds since midnight.  Ordering is by distance from `now`,
//! so an alarm that wraps past midnight correctly counts as later.

use crate::clock::{SECONDS_PER_DAY, TICK_SECS, offset_seconds};
use crate::config::Schedule;

/// Default tie-break window between the two alarms (seconds).
pub const DEFAULT_TOLERANCE_SECS: u32 = 50;

// ═══════════════════════════════════════════════════════════════
//  Alarm types
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlarmKind {
    /// Every `interval_5min` × 5 minutes, aligned to midnight.
    Periodic { interval_5min: u16 },
    /// Once a day at the given time.
    FixedDaily { hour: u8, minute: u8, second: u8 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Alarm {
    pub kind: AlarmKind,
}

impl From<Schedule> for Alarm {
    fn from(schedule: Schedule) -> Self {
        let kind = match schedule {
            Schedule::Periodic { interval_5min } => AlarmKind::Periodic { interval_5min },
            Schedule::FixedDaily { hour, minute } => AlarmKind::FixedDaily {
                hour,
                minute,
                second: 0,
            },
        };
        Self { kind }
    }
}

/// Which alarm was armed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Winner {
    /// Uplink alarm; the cycle measures and sends.
    Radio,
    /// Measurement alarm.
    Temperature,
}

// ═══════════════════════════════════════════════════════════════
//  Computation
// ═══════════════════════════════════════════════════════════════

/// Next time of day, strictly after `now`, at which `alarm` fires.
pub fn next_fire_time(alarm: &Alarm, now: u32) -> u32 {
    let now = now % SECONDS_PER_DAY;
    match alarm.kind {
        AlarmKind::Periodic { interval_5min } => {
            let interval = u32::from(interval_5min.max(1)) * TICK_SECS;
            ((now / interval + 1) * interval) % SECONDS_PER_DAY
        }
        AlarmKind::FixedDaily {
            hour,
            minute,
            second,
        } => (u32::from(hour) * 3600 + u32::from(minute) * 60 + u32::from(second)) % SECONDS_PER_DAY,
    }
}

/// Seconds from `now` until `fire_time`, in `1..=SECONDS_PER_DAY`.
pub fn delay_until(now: u32, fire_time: u32) -> u32 {
    let d = (fire_time % SECONDS_PER_DAY + SECONDS_PER_DAY - now % SECONDS_PER_DAY) % SECONDS_PER_DAY;
    if d == 0 { SECONDS_PER_DAY } else { d }
}

/// Choose between the uplink and measurement alarms.
///
/// The radio alarm wins when it fires no later than the measurement alarm,
/// or at most `tolerance_secs` after it.
pub fn resolve(radio: &Alarm, temperature: &Alarm, now: u32, tolerance_secs: u32) -> (u32, Winner) {
    let radio_at = next_fire_time(radio, now);
    let temp_at = next_fire_time(temperature, now);
    let radio_in = delay_until(now, radio_at);
    let temp_in = delay_until(now, temp_at);

    if radio_in <= temp_in.saturating_add(tolerance_secs) {
        (radio_at, Winner::Radio)
    } else {
        (temp_at, Winner::Temperature)
    }
}

/// Time of day for a relative alarm `delta_secs` from `now`, plus a guard
/// so the alarm never lands in the past while it is being programmed.
pub fn relative_alarm(now: u32, delta_secs: u32, guard_secs: u32) -> u32 {
    offset_seconds(now, delta_secs + guard_secs)
}
