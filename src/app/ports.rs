//! Port traits: the hexagonal boundary between domain logic and the board.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ ModeController (domain)
//! ```
//!
//! Board adapters (sensor, RTC, radio, memories, power) implement these
//! traits.  A single board object implements all of them and is handed to
//! the controller as `&mut impl NodeHardware`; this keeps one mutable
//! borrow while the port boundary stays explicit.  Method names are unique
//! across traits so the combined object never needs disambiguation.

use embedded_hal::delay::DelayNs;

use crate::clock::{Date, TimeOfDay};
use crate::error::{RtcError, SensorError, StorageError};
use crate::uplink::transport::Radio;

// ───────────────────────────────────────────────────────────────
// Temperature sensor
// ───────────────────────────────────────────────────────────────

/// Alert comparator of the temperature sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertEdge {
    High,
    Low,
}

pub trait TemperatureSensor {
    /// Power the sensor up and start a one-shot conversion.
    fn sensor_open(&mut self) -> Result<(), SensorError>;

    /// Read the completed conversion in °C.
    fn sensor_read_celsius(&mut self) -> Result<f32, SensorError>;

    /// Return the sensor to its low-power state.
    fn sensor_close(&mut self);

    fn set_hi_limit(&mut self, celsius: f32) -> Result<(), SensorError>;
    fn set_lo_limit(&mut self, celsius: f32) -> Result<(), SensorError>;
    fn set_hysteresis(&mut self, celsius: f32) -> Result<(), SensorError>;
    fn enable_alert(&mut self, edge: AlertEdge) -> Result<(), SensorError>;
    fn disable_alert(&mut self, edge: AlertEdge) -> Result<(), SensorError>;
}

// ───────────────────────────────────────────────────────────────
// Real-time clock
// ───────────────────────────────────────────────────────────────

/// The RTC's two absolute alarms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlarmId {
    /// Measurement wake-ups.
    A,
    /// Uplink and retry wake-ups.
    B,
}

pub trait RealTimeClock {
    fn get_time(&mut self) -> Result<TimeOfDay, RtcError>;
    fn set_time(&mut self, time: TimeOfDay) -> Result<(), RtcError>;
    fn get_date(&mut self) -> Result<Date, RtcError>;
    fn set_date(&mut self, date: Date) -> Result<(), RtcError>;

    /// Arm `id` to fire once at the given time of day.
    fn configure_absolute_alarm(&mut self, id: AlarmId, time: TimeOfDay) -> Result<(), RtcError>;
    fn clear_alarm(&mut self, id: AlarmId) -> Result<(), RtcError>;
    fn disable_alarm(&mut self, id: AlarmId) -> Result<(), RtcError>;
    fn is_triggered(&mut self, id: AlarmId) -> bool;
}

// ───────────────────────────────────────────────────────────────
// Non-volatile memories
// ───────────────────────────────────────────────────────────────

/// Byte-addressable EEPROM holding the mode, identity and settings blocks.
pub trait Eeprom {
    fn eeprom_read(&mut self, addr: u16, buf: &mut [u8]) -> Result<(), StorageError>;
    fn eeprom_write(&mut self, addr: u16, data: &[u8]) -> Result<(), StorageError>;
}

/// External NOR flash holding the record log.
///
/// Programming can only clear bits; [`flash_erase`](Self::flash_erase)
/// returns the log area to 0xFF.
pub trait FlashMemory {
    /// Wake the chip from deep power-down.
    fn flash_open(&mut self) -> Result<(), StorageError>;
    /// Put the chip back into deep power-down.
    fn flash_close(&mut self);
    fn page_program(&mut self, addr: u32, data: &[u8]) -> Result<(), StorageError>;
    fn flash_read(&mut self, addr: u32, buf: &mut [u8]) -> Result<(), StorageError>;
    fn flash_erase(&mut self) -> Result<(), StorageError>;
}

// ───────────────────────────────────────────────────────────────
// Power
// ───────────────────────────────────────────────────────────────

pub trait PowerControl {
    /// Enter the lowest-power halt; returns after an interrupt fired.
    fn halt_until_interrupt(&mut self);

    /// Restart the MCU.  Does not return on hardware.
    fn soft_reset(&mut self);
}

// ───────────────────────────────────────────────────────────────
// Combined board
// ───────────────────────────────────────────────────────────────

/// Everything the mode controller needs from the board.
pub trait NodeHardware:
    TemperatureSensor + RealTimeClock + Radio + Eeprom + FlashMemory + PowerControl + DelayNs
{
}

impl<T> NodeHardware for T where
    T: TemperatureSensor + RealTimeClock + Radio + Eeprom + FlashMemory + PowerControl + DelayNs
{
}

// ───────────────────────────────────────────────────────────────
// Event sink port (domain → logging / telemetry)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`NodeEvent`](super::events::NodeEvent)s
/// through this port.
pub trait EventSink {
    fn emit(&mut self, event: &super::events::NodeEvent);
}
