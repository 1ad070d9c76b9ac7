//! Interrupt-to-main-loop wake reporting.
//!
//! Wake sources are the two RTC alarms and the temperature sensor's alert
//! line.  Their interrupt handlers only quiesce the source and store one
//! [`WakeReason`]; the mode controller drains it exactly once after each
//! halt.
//!
//! ```text
//! ┌──────────────┐     ┌──────────────┐     ┌──────────────────┐
//! │ RTC alarm A  │────▶│              │     │                  │
//! │ RTC alarm B  │────▶│  WakeFlag    │────▶│  ModeController  │
//! │ Temp alert   │────▶│  (AtomicU8)  │     │  take() per wake │
//! └──────────────┘     └──────────────┘     └──────────────────┘
//! ```

use core::sync::atomic::{AtomicU8, Ordering};

use crate::app::ports::{AlarmId, RealTimeClock};

/// Why the device left its halt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum WakeReason {
    /// Nothing reported (spurious wake or already drained).
    None = 0,
    /// Measurement alarm.
    RtcAlarmA = 1,
    /// Uplink / retry alarm.
    RtcAlarmB = 2,
    /// Temperature sensor alert line.
    TempAlert = 3,
}

impl WakeReason {
    fn from_u8(raw: u8) -> Self {
        match raw {
            1 => Self::RtcAlarmA,
            2 => Self::RtcAlarmB,
            3 => Self::TempAlert,
            _ => Self::None,
        }
    }
}

/// Single-slot wake reason shared between interrupt and main context.
pub struct WakeFlag(AtomicU8);

impl WakeFlag {
    pub const fn new() -> Self {
        Self(AtomicU8::new(WakeReason::None as u8))
    }

    /// Record a wake reason.  Safe from interrupt context; a later signal
    /// before the main loop drains overwrites an earlier one.
    pub fn signal(&self, reason: WakeReason) {
        self.0.store(reason as u8, Ordering::Release);
    }

    /// Drain the pending reason, leaving `None` behind.
    pub fn take(&self) -> WakeReason {
        WakeReason::from_u8(self.0.swap(WakeReason::None as u8, Ordering::AcqRel))
    }

    /// Look at the pending reason without draining it.
    pub fn peek(&self) -> WakeReason {
        WakeReason::from_u8(self.0.load(Ordering::Acquire))
    }
}

impl Default for WakeFlag {
    fn default() -> Self {
        Self::new()
    }
}

/// The flag the board's interrupt vectors report into.
pub static WAKE: WakeFlag = WakeFlag::new();

// ── Interrupt handler bodies ──────────────────────────────────

/// RTC alarm interrupt: find the alarm that fired, clear and disable both
/// alarms, report it.
pub fn on_rtc_interrupt(rtc: &mut impl RealTimeClock, flag: &WakeFlag) {
    let reason = if rtc.is_triggered(AlarmId::A) {
        WakeReason::RtcAlarmA
    } else if rtc.is_triggered(AlarmId::B) {
        WakeReason::RtcAlarmB
    } else {
        WakeReason::None
    };

    for id in [AlarmId::A, AlarmId::B] {
        // Failures here cannot be reported from interrupt context; the
        // next arming reprograms both alarms anyway.
        let _ = rtc.clear_alarm(id);
        let _ = rtc.disable_alarm(id);
    }

    if reason != WakeReason::None {
        flag.signal(reason);
    }
}

/// Temperature alert line interrupt.
pub fn on_temp_alert_interrupt(flag: &WakeFlag) {
    flag.signal(WakeReason::TempAlert);
}
