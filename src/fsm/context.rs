//! Shared mutable context threaded through every mode handler.
//!
//! `ModeContext` owns the persistent store, the uplink engine and the
//! bookkeeping that must survive from one duty cycle to the next: the
//! high-temperature buffer, a record waiting to be persisted, and the
//! activation attempt counter.

use heapless::Deque;
use log::{debug, warn};

use super::Mode;
use crate::app::ports::{AlarmId, Eeprom, PowerControl, RealTimeClock};
use crate::clock::{DateTime, TimeOfDay};
use crate::config::Profile;
use crate::error::RtcError;
use crate::events::{WakeFlag, WakeReason};
use crate::record::Record;
use crate::scheduler::relative_alarm;
use crate::sensors::Thermometer;
use crate::storage::PersistentStore;
use crate::uplink::UplinkEngine;

/// Samples held in RAM during an excursion.  The oldest is dropped when
/// the buffer is full.
pub const HIGH_TEMP_BUFFER_LEN: usize = 64;

pub struct ModeContext<'w> {
    // --- Configuration ---
    pub profile: Profile,

    // --- Services ---
    pub store: PersistentStore,
    pub uplink: UplinkEngine,
    pub thermometer: Thermometer,
    pub wake: &'w WakeFlag,

    // --- Mode bookkeeping ---
    /// Mode whose handler is running (or ran last).
    pub current: Mode,
    pending: Option<Mode>,
    /// Set by a `SoftReset` command; the controller resets after the cycle.
    pub reset_requested: bool,

    // --- Cycle-to-cycle state ---
    /// Excursion samples not yet written to flash.
    pub high_temp_buffer: Deque<Record, HIGH_TEMP_BUFFER_LEN>,
    /// Operational record whose append failed; retried next cycle.
    pub pending_record: Option<Record>,
    /// Activation cycles since entering `WaitForActivation`.
    pub activation_attempts: u8,
    /// Wake reason consumed by the last halt.
    pub last_wake: WakeReason,
}

impl<'w> ModeContext<'w> {
    pub fn new(profile: Profile, wake: &'w WakeFlag) -> Self {
        Self {
            store: PersistentStore::new(profile.flash_capacity_records),
            uplink: UplinkEngine::new(&profile),
            thermometer: Thermometer::new(),
            wake,
            profile,
            current: Mode::Test,
            pending: None,
            reset_requested: false,
            high_temp_buffer: Deque::new(),
            pending_record: None,
            activation_attempts: 0,
            last_wake: WakeReason::None,
        }
    }

    /// Queue a transition for the end of the cycle.  Durable targets are
    /// persisted now; a failed write is logged and the transition still
    /// happens.
    pub fn request_transition(&mut self, hw: &mut impl Eeprom, target: Mode) {
        if target.is_durable() {
            if let Err(e) = self.store.persist_mode(hw, target) {
                warn!("CTRL: could not persist {:?}: {}", target, e);
            }
        }
        self.pending = Some(target);
    }

    pub fn pending_transition(&self) -> Option<Mode> {
        self.pending
    }

    pub(super) fn take_pending(&mut self) -> Option<Mode> {
        self.pending.take()
    }

    /// Halt until an interrupt, then consume the wake reason.
    pub fn suspend(&mut self, hw: &mut impl PowerControl) -> WakeReason {
        hw.halt_until_interrupt();
        let reason = self.wake.take();
        debug!("CTRL: woke ({:?})", reason);
        self.last_wake = reason;
        reason
    }

    /// Clear and arm `id` at an absolute second of the day.
    pub fn arm_alarm(
        &self,
        rtc: &mut impl RealTimeClock,
        id: AlarmId,
        seconds_of_day: u32,
    ) -> Result<(), RtcError> {
        rtc.clear_alarm(id)?;
        rtc.configure_absolute_alarm(id, TimeOfDay::from_seconds(seconds_of_day))
    }

    /// Arm `id` `delta_secs` from now, plus the guard interval.
    pub fn arm_relative(
        &self,
        rtc: &mut impl RealTimeClock,
        id: AlarmId,
        delta_secs: u32,
    ) -> Result<(), RtcError> {
        let now = rtc.get_time()?.seconds_of_day();
        let at = relative_alarm(now, delta_secs, self.profile.alarm_guard_secs);
        self.arm_alarm(rtc, id, at)
    }

    /// Buffer an excursion sample, dropping the oldest when full.
    pub fn buffer_sample(&mut self, record: Record) {
        if self.high_temp_buffer.is_full() {
            warn!("HIGH_TEMP: buffer full, oldest sample dropped");
            self.high_temp_buffer.pop_front();
        }
        // Cannot fail: a slot was freed above.
        let _ = self.high_temp_buffer.push_back(record);
    }
}

/// Current date and time from the RTC.
pub fn read_clock(rtc: &mut impl RealTimeClock) -> Result<DateTime, RtcError> {
    let date = rtc.get_date()?;
    let time = rtc.get_time()?;
    let now = DateTime { date, time };
    now.validate()?;
    Ok(now)
}
