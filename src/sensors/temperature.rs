//! One-shot temperature measurement and alert arming on top of the
//! [`TemperatureSensor`] port.
//!
//! Each measurement powers the sensor up, reads one conversion and powers
//! it down again.  Readings outside -100 … +200 °C are treated as a sensor
//! fault; such a sample is never logged.

use log::{debug, warn};

use crate::app::ports::{AlertEdge, TemperatureSensor};
use crate::error::SensorError;

/// Lowest reading accepted as physical (°C).
pub const PLAUSIBLE_MIN_C: f32 = -100.0;
/// Highest reading accepted as physical (°C).
pub const PLAUSIBLE_MAX_C: f32 = 200.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TemperatureReading {
    pub celsius: f32,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Thermometer;

impl Thermometer {
    pub fn new() -> Self {
        Self
    }

    /// Take one reading.  The sensor is closed again on every path.
    pub fn measure(&self, sensor: &mut impl TemperatureSensor) -> Result<TemperatureReading, SensorError> {
        sensor.sensor_open()?;
        let result = sensor.sensor_read_celsius();
        sensor.sensor_close();

        let celsius = result?;
        if !(PLAUSIBLE_MIN_C..=PLAUSIBLE_MAX_C).contains(&celsius) {
            warn!("SENSOR: implausible reading {:.2} °C", celsius);
            return Err(SensorError::OutOfRange);
        }
        debug!("SENSOR: {:.2} °C", celsius);
        Ok(TemperatureReading { celsius })
    }

    /// Program the high alert at `threshold_c` with `hysteresis_c` and make
    /// sure the low alert cannot wake the device.
    pub fn arm_high_alert(
        &self,
        sensor: &mut impl TemperatureSensor,
        threshold_c: f32,
        hysteresis_c: f32,
    ) -> Result<(), SensorError> {
        sensor.set_hi_limit(threshold_c)?;
        sensor.set_hysteresis(hysteresis_c)?;
        sensor.disable_alert(AlertEdge::Low)?;
        sensor.enable_alert(AlertEdge::High)
    }

    pub fn disarm_alerts(&self, sensor: &mut impl TemperatureSensor) -> Result<(), SensorError> {
        sensor.disable_alert(AlertEdge::High)?;
        sensor.disable_alert(AlertEdge::Low)
    }
}
