//! Mock hardware adapter for integration tests.
//!
//! One object implementing every port.  Sensor readings, gateway replies
//! and wake reasons are scripted up front; every flash program, radio
//! transmission and alarm arming is recorded so tests can assert on the
//! full history.

use std::collections::VecDeque;

use embedded_hal::delay::DelayNs;
use templogger::app::events::NodeEvent;
use templogger::app::ports::{
    AlarmId, AlertEdge, Eeprom, EventSink, FlashMemory, PowerControl, RealTimeClock,
    TemperatureSensor,
};
use templogger::clock::{Date, DateTime, TimeOfDay};
use templogger::error::{RadioError, RtcError, SensorError, StorageError};
use templogger::events::{WakeFlag, WakeReason};
use templogger::uplink::transport::{Radio, RadioMode};

pub const EEPROM_SIZE: usize = 256;
pub const FLASH_SIZE: usize = 64 * 1024;
const PAGE: u32 = 256;

// ── Recorded calls ────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArmedAlarm {
    pub id: AlarmId,
    pub at: TimeOfDay,
}

// ── MockHardware ──────────────────────────────────────────────

pub struct MockHardware<'w> {
    wake: &'w WakeFlag,

    // Memories
    pub eeprom: [u8; EEPROM_SIZE],
    pub flash: Vec<u8>,
    flash_powered: bool,
    pub fail_eeprom_writes: bool,
    pub fail_flash_programs: bool,
    /// Every `(address, bytes)` handed to `page_program`.
    pub programs: Vec<(u32, Vec<u8>)>,

    // Sensor
    pub readings: VecDeque<Result<f32, SensorError>>,
    pub default_reading: f32,
    sensor_powered: bool,
    pub hi_limit: Option<f32>,
    pub hysteresis: Option<f32>,
    pub hi_alert_enabled: bool,
    pub lo_alert_enabled: bool,

    // RTC
    pub now: DateTime,
    pub armed: Vec<ArmedAlarm>,
    triggered: [bool; 2],

    // Radio
    radio_powered: bool,
    radio_mode: RadioMode,
    /// Carrier trim applied by the last open.
    pub frequency_offset: Option<i16>,
    /// Replies handed out by `radio_receive`, in order.
    pub replies: VecDeque<Vec<u8>>,
    /// Every frame the node transmitted.
    pub sent: Vec<Vec<u8>>,

    // Power / timing
    /// Wake reasons delivered by successive halts; `None` once exhausted.
    pub wakes: VecDeque<WakeReason>,
    pub halts: u32,
    pub delayed_ms: u64,
    pub resets: u32,
}

#[allow(dead_code)]
impl<'w> MockHardware<'w> {
    pub fn new(wake: &'w WakeFlag) -> Self {
        Self {
            wake,
            eeprom: [0xFF; EEPROM_SIZE],
            flash: vec![0xFF; FLASH_SIZE],
            flash_powered: false,
            fail_eeprom_writes: false,
            fail_flash_programs: false,
            programs: Vec::new(),
            readings: VecDeque::new(),
            default_reading: 21.5,
            sensor_powered: false,
            hi_limit: None,
            hysteresis: None,
            hi_alert_enabled: false,
            lo_alert_enabled: false,
            now: DateTime {
                date: Date::new(10, 3, 2026),
                time: TimeOfDay::new(3, 30, 0),
            },
            armed: Vec::new(),
            triggered: [false; 2],
            radio_powered: false,
            radio_mode: RadioMode::Sleep,
            frequency_offset: None,
            replies: VecDeque::new(),
            sent: Vec::new(),
            wakes: VecDeque::new(),
            halts: 0,
            delayed_ms: 0,
            resets: 0,
        }
    }

    pub fn script_readings(&mut self, readings: impl IntoIterator<Item = f32>) {
        self.readings.extend(readings.into_iter().map(Ok));
    }

    pub fn script_reply(&mut self, bytes: &[u8]) {
        self.replies.push_back(bytes.to_vec());
    }

    pub fn script_wake(&mut self, reason: WakeReason) {
        self.wakes.push_back(reason);
    }

    pub fn last_armed(&self) -> Option<ArmedAlarm> {
        self.armed.last().copied()
    }

    /// Simulate a power cycle: volatile peripheral state is lost, the
    /// memories and the clock survive.
    pub fn power_cycle(&mut self) {
        self.flash_powered = false;
        self.sensor_powered = false;
        self.radio_powered = false;
        self.radio_mode = RadioMode::Sleep;
        self.wake.take();
    }

    fn slot(id: AlarmId) -> usize {
        match id {
            AlarmId::A => 0,
            AlarmId::B => 1,
        }
    }
}

impl TemperatureSensor for MockHardware<'_> {
    fn sensor_open(&mut self) -> Result<(), SensorError> {
        self.sensor_powered = true;
        Ok(())
    }

    fn sensor_read_celsius(&mut self) -> Result<f32, SensorError> {
        if !self.sensor_powered {
            return Err(SensorError::Timeout);
        }
        self.readings.pop_front().unwrap_or(Ok(self.default_reading))
    }

    fn sensor_close(&mut self) {
        self.sensor_powered = false;
    }

    fn set_hi_limit(&mut self, celsius: f32) -> Result<(), SensorError> {
        self.hi_limit = Some(celsius);
        Ok(())
    }

    fn set_lo_limit(&mut self, _celsius: f32) -> Result<(), SensorError> {
        Ok(())
    }

    fn set_hysteresis(&mut self, celsius: f32) -> Result<(), SensorError> {
        self.hysteresis = Some(celsius);
        Ok(())
    }

    fn enable_alert(&mut self, edge: AlertEdge) -> Result<(), SensorError> {
        match edge {
            AlertEdge::High => self.hi_alert_enabled = true,
            AlertEdge::Low => self.lo_alert_enabled = true,
        }
        Ok(())
    }

    fn disable_alert(&mut self, edge: AlertEdge) -> Result<(), SensorError> {
        match edge {
            AlertEdge::High => self.hi_alert_enabled = false,
            AlertEdge::Low => self.lo_alert_enabled = false,
        }
        Ok(())
    }
}

impl RealTimeClock for MockHardware<'_> {
    fn get_time(&mut self) -> Result<TimeOfDay, RtcError> {
        Ok(self.now.time)
    }

    fn set_time(&mut self, time: TimeOfDay) -> Result<(), RtcError> {
        self.now.time = time;
        Ok(())
    }

    fn get_date(&mut self) -> Result<Date, RtcError> {
        Ok(self.now.date)
    }

    fn set_date(&mut self, date: Date) -> Result<(), RtcError> {
        self.now.date = date;
        Ok(())
    }

    fn configure_absolute_alarm(&mut self, id: AlarmId, at: TimeOfDay) -> Result<(), RtcError> {
        self.armed.push(ArmedAlarm { id, at });
        Ok(())
    }

    fn clear_alarm(&mut self, id: AlarmId) -> Result<(), RtcError> {
        self.triggered[Self::slot(id)] = false;
        Ok(())
    }

    fn disable_alarm(&mut self, _id: AlarmId) -> Result<(), RtcError> {
        Ok(())
    }

    fn is_triggered(&mut self, id: AlarmId) -> bool {
        self.triggered[Self::slot(id)]
    }
}

impl Radio for MockHardware<'_> {
    fn radio_open(&mut self) -> Result<(), RadioError> {
        self.radio_powered = true;
        Ok(())
    }

    fn radio_close(&mut self) {
        self.radio_powered = false;
    }

    fn set_frequency_offset(&mut self, steps: i16) -> Result<(), RadioError> {
        if !self.radio_powered {
            return Err(RadioError::InitFailed);
        }
        self.frequency_offset = Some(steps);
        Ok(())
    }

    fn set_radio_mode(&mut self, mode: RadioMode) -> Result<(), RadioError> {
        if !self.radio_powered && mode != RadioMode::Sleep {
            return Err(RadioError::InitFailed);
        }
        self.radio_mode = mode;
        Ok(())
    }

    fn radio_send(&mut self, data: &[u8], _timeout_ms: u32) -> Result<(), RadioError> {
        assert_eq!(self.radio_mode, RadioMode::Transmit, "send outside TX mode");
        self.sent.push(data.to_vec());
        Ok(())
    }

    fn radio_receive(&mut self, buf: &mut [u8], timeout_ms: u32) -> Result<usize, RadioError> {
        assert_eq!(self.radio_mode, RadioMode::Receive, "receive outside RX mode");
        match self.replies.pop_front() {
            Some(reply) => {
                let n = reply.len().min(buf.len());
                buf[..n].copy_from_slice(&reply[..n]);
                Ok(n)
            }
            None => {
                self.delayed_ms += u64::from(timeout_ms);
                Ok(0)
            }
        }
    }
}

impl Eeprom for MockHardware<'_> {
    fn eeprom_read(&mut self, addr: u16, buf: &mut [u8]) -> Result<(), StorageError> {
        let start = addr as usize;
        let end = start + buf.len();
        if end > EEPROM_SIZE {
            return Err(StorageError::OutOfBounds);
        }
        buf.copy_from_slice(&self.eeprom[start..end]);
        Ok(())
    }

    fn eeprom_write(&mut self, addr: u16, data: &[u8]) -> Result<(), StorageError> {
        if self.fail_eeprom_writes {
            return Err(StorageError::Io);
        }
        let start = addr as usize;
        let end = start + data.len();
        if end > EEPROM_SIZE {
            return Err(StorageError::OutOfBounds);
        }
        self.eeprom[start..end].copy_from_slice(data);
        Ok(())
    }
}

impl FlashMemory for MockHardware<'_> {
    fn flash_open(&mut self) -> Result<(), StorageError> {
        self.flash_powered = true;
        Ok(())
    }

    fn flash_close(&mut self) {
        self.flash_powered = false;
    }

    fn page_program(&mut self, addr: u32, data: &[u8]) -> Result<(), StorageError> {
        if !self.flash_powered || self.fail_flash_programs {
            return Err(StorageError::Io);
        }
        if let Some(last) = (addr + data.len() as u32).checked_sub(1) {
            assert_eq!(addr / PAGE, last / PAGE, "program crosses a page");
        }
        let start = addr as usize;
        for (cell, byte) in self.flash[start..start + data.len()].iter_mut().zip(data) {
            *cell &= *byte;
        }
        self.programs.push((addr, data.to_vec()));
        Ok(())
    }

    fn flash_read(&mut self, addr: u32, buf: &mut [u8]) -> Result<(), StorageError> {
        if !self.flash_powered {
            return Err(StorageError::Io);
        }
        let start = addr as usize;
        buf.copy_from_slice(&self.flash[start..start + buf.len()]);
        Ok(())
    }

    fn flash_erase(&mut self) -> Result<(), StorageError> {
        if !self.flash_powered {
            return Err(StorageError::Io);
        }
        self.flash.fill(0xFF);
        Ok(())
    }
}

impl PowerControl for MockHardware<'_> {
    fn halt_until_interrupt(&mut self) {
        self.halts += 1;
        let reason = self.wakes.pop_front().unwrap_or(WakeReason::None);
        match reason {
            WakeReason::RtcAlarmA | WakeReason::RtcAlarmB => {
                let id = if reason == WakeReason::RtcAlarmA {
                    AlarmId::A
                } else {
                    AlarmId::B
                };
                if let Some(armed) = self.armed.iter().rev().find(|a| a.id == id) {
                    self.now.time = armed.at;
                }
                self.triggered[Self::slot(id)] = true;
                let wake = self.wake;
                templogger::events::on_rtc_interrupt(self, wake);
            }
            WakeReason::TempAlert => templogger::events::on_temp_alert_interrupt(self.wake),
            WakeReason::None => {}
        }
    }

    fn soft_reset(&mut self) {
        self.resets += 1;
    }
}

impl DelayNs for MockHardware<'_> {
    fn delay_ns(&mut self, ns: u32) {
        self.delayed_ms += u64::from(ns / 1_000_000);
    }

    fn delay_ms(&mut self, ms: u32) {
        self.delayed_ms += u64::from(ms);
    }
}

// ── RecordingSink ─────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingSink {
    pub events: Vec<NodeEvent>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, event: &NodeEvent) -> bool {
        self.events.contains(event)
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &NodeEvent) {
        self.events.push(event.clone());
    }
}
