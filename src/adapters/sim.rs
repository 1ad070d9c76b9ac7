//! Simulated board: one object implementing every hardware port.
//!
//! Composes the real memory adapters ([`EepromAdapter`], [`FlashLogAdapter`])
//! with a simulated temperature sensor, RTC, radio gateway and power
//! controller.  Halting advances the simulated clock straight to the next
//! wake source and runs the matching interrupt handler body, so a full
//! day of duty cycles executes in milliseconds.
//!
//! The binary runs on this board until sensor, RTC and transceiver drivers
//! exist; the memories underneath are the real NVS and partition adapters.

use std::collections::VecDeque;

use embedded_hal::delay::DelayNs;
use log::{debug, info, warn};

use super::eeprom::EepromAdapter;
use super::flash_log::FlashLogAdapter;
use crate::app::commands::DownlinkCommand;
use crate::app::ports::{
    AlarmId, AlertEdge, Eeprom, FlashMemory, PowerControl, RealTimeClock, TemperatureSensor,
};
use crate::clock::{Date, DateTime, SECONDS_PER_DAY, TimeOfDay};
use crate::error::{RadioError, RtcError, SensorError, StorageError};
use crate::events::{self, WakeFlag};
use crate::record::Record;
use crate::scheduler::delay_until;
use crate::uplink::codec::{self, FLAG_COMMAND_FOLLOWS, OP_ACK, OP_NACK};
use crate::uplink::transport::{Radio, RadioMode};

// ───────────────────────────────────────────────────────────────
// Simulated peripherals
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default)]
struct SimAlarm {
    at: Option<TimeOfDay>,
    enabled: bool,
    triggered: bool,
}

#[derive(Debug, Clone, Copy)]
struct SimSensor {
    powered: bool,
    faulty: bool,
    temperature_c: f32,
    /// Linear drift applied as simulated time passes (°C per hour).
    ramp_c_per_hour: f32,
    hi_limit_c: f32,
    lo_limit_c: f32,
    hysteresis_c: f32,
    hi_alert: bool,
    lo_alert: bool,
}

impl Default for SimSensor {
    fn default() -> Self {
        Self {
            powered: false,
            faulty: false,
            temperature_c: 21.0,
            ramp_c_per_hour: 0.0,
            hi_limit_c: 125.0,
            lo_limit_c: -40.0,
            hysteresis_c: 0.0,
            hi_alert: false,
            lo_alert: false,
        }
    }
}

/// The gateway on the other end of the simulated radio link.
#[derive(Debug, Default)]
pub struct SimGateway {
    online: bool,
    replies: VecDeque<Vec<u8>>,
    downlinks: VecDeque<DownlinkCommand>,
    received: Vec<Record>,
    command_acks: u32,
}

impl SimGateway {
    pub fn set_online(&mut self, online: bool) {
        self.online = online;
    }

    /// Announce `command` on the next ping ACK.
    pub fn queue_downlink(&mut self, command: DownlinkCommand) {
        self.downlinks.push_back(command);
    }

    /// Records acknowledged so far, in arrival order.
    pub fn received(&self) -> &[Record] {
        &self.received
    }

    /// Command acknowledgement frames heard from the node.
    pub fn command_acks(&self) -> u32 {
        self.command_acks
    }

    /// React to a frame from the node.  A transfer ping with nothing
    /// queued is answered with a time sync taken from `now`.
    fn on_frame(&mut self, bytes: &[u8], now: DateTime) {
        if !self.online {
            return;
        }
        let frame = match codec::decode_frame(bytes) {
            Ok(f) => f,
            Err(e) => {
                debug!("SIM: gateway rejects frame: {}", e);
                self.replies.push_back(vec![OP_NACK]);
                return;
            }
        };
        match frame.opcode {
            codec::OP_PING_ACTIVATION | codec::OP_PING_TRANSFER => {
                let downlink = self.downlinks.pop_front().or_else(|| {
                    (frame.opcode == codec::OP_PING_TRANSFER).then_some(DownlinkCommand::SetRtc(now))
                });
                let flags = if downlink.is_some() { FLAG_COMMAND_FOLLOWS } else { 0 };
                self.replies.push_back(vec![OP_ACK, flags]);
                if let Some(cmd) = downlink {
                    self.replies.push_back(codec::encode_downlink(&cmd).to_vec());
                }
            }
            codec::OP_DATA => {
                let before = self.received.len();
                self.received
                    .extend(codec::decode_records(frame.payload).filter_map(|r| r.ok()));
                let flagged = self.received[before..].iter().filter(|r| !r.is_valid()).count();
                if flagged > 0 {
                    warn!("SIM: gateway received {} records without the valid flag", flagged);
                }
                self.replies.push_back(vec![OP_ACK, 0]);
            }
            codec::OP_ACK => self.command_acks += 1,
            other => debug!("SIM: gateway ignores opcode 0x{:02X}", other),
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Board
// ───────────────────────────────────────────────────────────────

pub struct SimBoard<'w> {
    eeprom: EepromAdapter,
    flash: FlashLogAdapter,
    wake: &'w WakeFlag,

    now: DateTime,
    pending_ns: u64,
    alarms: [SimAlarm; 2],

    sensor: SimSensor,

    radio_powered: bool,
    radio_mode: RadioMode,
    gateway: SimGateway,

    resets: u32,
}

impl<'w> SimBoard<'w> {
    pub fn new(wake: &'w WakeFlag) -> Result<Self, StorageError> {
        info!("SIM: simulated board");
        Ok(Self {
            eeprom: EepromAdapter::new()?,
            flash: FlashLogAdapter::new()?,
            wake,
            now: DateTime::default(),
            pending_ns: 0,
            alarms: [SimAlarm::default(); 2],
            sensor: SimSensor::default(),
            radio_powered: false,
            radio_mode: RadioMode::Sleep,
            gateway: SimGateway {
                online: true,
                ..SimGateway::default()
            },
            resets: 0,
        })
    }

    pub fn now(&self) -> DateTime {
        self.now
    }

    pub fn set_now(&mut self, now: DateTime) {
        self.now = now;
    }

    pub fn temperature_c(&self) -> f32 {
        self.sensor.temperature_c
    }

    pub fn set_temperature(&mut self, celsius: f32) {
        self.sensor.temperature_c = celsius;
    }

    pub fn set_ramp(&mut self, c_per_hour: f32) {
        self.sensor.ramp_c_per_hour = c_per_hour;
    }

    pub fn set_sensor_fault(&mut self, faulty: bool) {
        self.sensor.faulty = faulty;
    }

    pub fn gateway(&self) -> &SimGateway {
        &self.gateway
    }

    pub fn gateway_mut(&mut self) -> &mut SimGateway {
        &mut self.gateway
    }

    pub fn resets(&self) -> u32 {
        self.resets
    }

    pub fn eeprom(&self) -> &EepromAdapter {
        &self.eeprom
    }

    fn advance(&mut self, secs: u32) {
        self.now.advance(secs);
        self.sensor.temperature_c += self.sensor.ramp_c_per_hour * secs as f32 / 3600.0;
    }

    fn alarm(&mut self, id: AlarmId) -> &mut SimAlarm {
        match id {
            AlarmId::A => &mut self.alarms[0],
            AlarmId::B => &mut self.alarms[1],
        }
    }

    /// Seconds until the drifting temperature crosses an enabled limit.
    fn secs_to_alert(&self) -> Option<u32> {
        let s = &self.sensor;
        let crossing = |limit: f32, rate: f32| -> Option<u32> {
            if rate <= 0.0 {
                return None;
            }
            Some(((limit - s.temperature_c).abs() / rate * 3600.0).ceil() as u32)
        };
        let hi = if !s.hi_alert {
            None
        } else if s.temperature_c >= s.hi_limit_c {
            Some(0)
        } else {
            crossing(s.hi_limit_c, s.ramp_c_per_hour)
        };
        let lo = if !s.lo_alert {
            None
        } else if s.temperature_c <= s.lo_limit_c {
            Some(0)
        } else {
            crossing(s.lo_limit_c, -s.ramp_c_per_hour)
        };
        match (hi, lo) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// High limit and hysteresis last programmed into the sensor.
    pub fn alert_limits(&self) -> (f32, f32) {
        (self.sensor.hi_limit_c, self.sensor.hysteresis_c)
    }

    /// Next enabled alarm as `(seconds away, index)`.
    fn next_alarm(&self) -> Option<(u32, usize)> {
        let now = self.now.time.seconds_of_day();
        self.alarms
            .iter()
            .enumerate()
            .filter(|(_, a)| a.enabled)
            .filter_map(|(i, a)| a.at.map(|t| (delay_until(now, t.seconds_of_day()), i)))
            .min()
    }
}

// ── TemperatureSensor ─────────────────────────────────────────

impl TemperatureSensor for SimBoard<'_> {
    fn sensor_open(&mut self) -> Result<(), SensorError> {
        if self.sensor.faulty {
            return Err(SensorError::BusFault);
        }
        self.sensor.powered = true;
        Ok(())
    }

    fn sensor_read_celsius(&mut self) -> Result<f32, SensorError> {
        if !self.sensor.powered {
            return Err(SensorError::Timeout);
        }
        Ok(self.sensor.temperature_c)
    }

    fn sensor_close(&mut self) {
        self.sensor.powered = false;
    }

    fn set_hi_limit(&mut self, celsius: f32) -> Result<(), SensorError> {
        self.sensor.hi_limit_c = celsius;
        Ok(())
    }

    fn set_lo_limit(&mut self, celsius: f32) -> Result<(), SensorError> {
        self.sensor.lo_limit_c = celsius;
        Ok(())
    }

    fn set_hysteresis(&mut self, celsius: f32) -> Result<(), SensorError> {
        self.sensor.hysteresis_c = celsius;
        Ok(())
    }

    fn enable_alert(&mut self, edge: AlertEdge) -> Result<(), SensorError> {
        match edge {
            AlertEdge::High => self.sensor.hi_alert = true,
            AlertEdge::Low => self.sensor.lo_alert = true,
        }
        Ok(())
    }

    fn disable_alert(&mut self, edge: AlertEdge) -> Result<(), SensorError> {
        match edge {
            AlertEdge::High => self.sensor.hi_alert = false,
            AlertEdge::Low => self.sensor.lo_alert = false,
        }
        Ok(())
    }
}

// ── RealTimeClock ─────────────────────────────────────────────

impl RealTimeClock for SimBoard<'_> {
    fn get_time(&mut self) -> Result<TimeOfDay, RtcError> {
        Ok(self.now.time)
    }

    fn set_time(&mut self, time: TimeOfDay) -> Result<(), RtcError> {
        if !time.is_valid() {
            return Err(RtcError::InvalidDateTime);
        }
        self.now.time = time;
        Ok(())
    }

    fn get_date(&mut self) -> Result<Date, RtcError> {
        Ok(self.now.date)
    }

    fn set_date(&mut self, date: Date) -> Result<(), RtcError> {
        if !date.is_valid() {
            return Err(RtcError::InvalidDateTime);
        }
        self.now.date = date;
        Ok(())
    }

    fn configure_absolute_alarm(&mut self, id: AlarmId, time: TimeOfDay) -> Result<(), RtcError> {
        if !time.is_valid() {
            return Err(RtcError::InvalidDateTime);
        }
        *self.alarm(id) = SimAlarm {
            at: Some(time),
            enabled: true,
            triggered: false,
        };
        Ok(())
    }

    fn clear_alarm(&mut self, id: AlarmId) -> Result<(), RtcError> {
        self.alarm(id).triggered = false;
        Ok(())
    }

    fn disable_alarm(&mut self, id: AlarmId) -> Result<(), RtcError> {
        self.alarm(id).enabled = false;
        Ok(())
    }

    fn is_triggered(&mut self, id: AlarmId) -> bool {
        self.alarm(id).triggered
    }
}

// ── Radio ─────────────────────────────────────────────────────

impl Radio for SimBoard<'_> {
    fn radio_open(&mut self) -> Result<(), RadioError> {
        self.radio_powered = true;
        self.radio_mode = RadioMode::Standby;
        Ok(())
    }

    fn radio_close(&mut self) {
        self.radio_powered = false;
        self.radio_mode = RadioMode::Sleep;
    }

    fn set_frequency_offset(&mut self, steps: i16) -> Result<(), RadioError> {
        if !self.radio_powered {
            return Err(RadioError::InitFailed);
        }
        debug!("SIM: carrier offset {} steps", steps);
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
        if self.radio_mode != RadioMode::Transmit {
            return Err(RadioError::TxTimeout);
        }
        let now = self.now;
        self.gateway.on_frame(data, now);
        Ok(())
    }

    fn radio_receive(&mut self, buf: &mut [u8], timeout_ms: u32) -> Result<usize, RadioError> {
        if self.radio_mode != RadioMode::Receive {
            return Err(RadioError::InitFailed);
        }
        match self.gateway.replies.pop_front() {
            Some(reply) => {
                let n = reply.len().min(buf.len());
                buf[..n].copy_from_slice(&reply[..n]);
                Ok(n)
            }
            None => {
                self.delay_ms(timeout_ms);
                Ok(0)
            }
        }
    }
}

// ── Memories ──────────────────────────────────────────────────

impl Eeprom for SimBoard<'_> {
    fn eeprom_read(&mut self, addr: u16, buf: &mut [u8]) -> Result<(), StorageError> {
        self.eeprom.eeprom_read(addr, buf)
    }

    fn eeprom_write(&mut self, addr: u16, data: &[u8]) -> Result<(), StorageError> {
        self.eeprom.eeprom_write(addr, data)
    }
}

impl FlashMemory for SimBoard<'_> {
    fn flash_open(&mut self) -> Result<(), StorageError> {
        self.flash.flash_open()
    }

    fn flash_close(&mut self) {
        self.flash.flash_close();
    }

    fn page_program(&mut self, addr: u32, data: &[u8]) -> Result<(), StorageError> {
        self.flash.page_program(addr, data)
    }

    fn flash_read(&mut self, addr: u32, buf: &mut [u8]) -> Result<(), StorageError> {
        self.flash.flash_read(addr, buf)
    }

    fn flash_erase(&mut self) -> Result<(), StorageError> {
        self.flash.flash_erase()
    }
}

// ── Power and timing ──────────────────────────────────────────

impl PowerControl for SimBoard<'_> {
    fn halt_until_interrupt(&mut self) {
        let alarm = self.next_alarm();
        let alert = self.secs_to_alert();

        match (alarm, alert) {
            (_, Some(alert_secs)) if alarm.map_or(true, |(secs, _)| alert_secs < secs) => {
                self.advance(alert_secs);
                events::on_temp_alert_interrupt(self.wake);
            }
            (Some((secs, index)), _) => {
                self.advance(secs);
                self.alarms[index].triggered = true;
                let wake = self.wake;
                events::on_rtc_interrupt(self, wake);
            }
            _ => {
                warn!("SIM: halted with no wake source armed, skipping a day");
                self.advance(SECONDS_PER_DAY);
            }
        }
    }

    fn soft_reset(&mut self) {
        warn!("SIM: soft reset requested");
        self.resets += 1;
        self.radio_close();
        self.sensor.powered = false;
        self.flash.flash_close();
    }
}

impl DelayNs for SimBoard<'_> {
    fn delay_ns(&mut self, ns: u32) {
        self.pending_ns += u64::from(ns);
        let secs = self.pending_ns / 1_000_000_000;
        if secs > 0 {
            self.pending_ns %= 1_000_000_000;
            self.advance(secs as u32);
        }
    }
}
