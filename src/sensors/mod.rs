//! Sensor subsystem.
//!
//! The node has a single digital temperature sensor; [`temperature`]
//! wraps its port with plausibility checking and alert arming.

pub mod temperature;

pub use temperature::{TemperatureReading, Thermometer};
