//! Device settings and runtime profile.
//!
//! [`Settings`] is the persisted, gateway-tunable configuration (stored in
//! EEPROM behind a CRC-8).  [`Profile`] carries the timing and retry knobs
//! that differ between production and bench builds; it is chosen at boot
//! and never persisted.

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::clock::SECONDS_PER_DAY;

/// Longest periodic interval, in 5-minute ticks (one day).
pub const MAX_INTERVAL_5MIN: u16 = (SECONDS_PER_DAY / 300) as u16;

// ---------------------------------------------------------------------------
// Validation error
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// A field is out of range; carries the field's constraint.
    ValidationFailed(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ValidationFailed(msg) => write!(f, "validation failed: {msg}"),
        }
    }
}

impl From<ConfigError> for crate::error::Error {
    fn from(e: ConfigError) -> Self {
        match e {
            ConfigError::ValidationFailed(msg) => Self::Config(msg),
        }
    }
}

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

/// When a recurring activity (measurement or uplink) takes place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Schedule {
    /// Every `interval_5min` × 5 minutes, aligned to midnight.
    Periodic { interval_5min: u16 },
    /// Once a day at `hour:minute`.
    FixedDaily { hour: u8, minute: u8 },
}

impl Schedule {
    pub fn validate(&self) -> Result<(), ConfigError> {
        match *self {
            Self::Periodic { interval_5min } => {
                if interval_5min == 0 || interval_5min > MAX_INTERVAL_5MIN {
                    return Err(ConfigError::ValidationFailed(
                        "periodic interval must be 1–288 ticks",
                    ));
                }
            }
            Self::FixedDaily { hour, minute } => {
                if hour >= 24 || minute >= 60 {
                    return Err(ConfigError::ValidationFailed(
                        "fixed time must be 00:00–23:59",
                    ));
                }
            }
        }
        Ok(())
    }
}

/// Daily time window in which uplinks are allowed.  Wraps past midnight
/// when `start` is later than `end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendWindow {
    pub start_hour: u8,
    pub start_minute: u8,
    pub end_hour: u8,
    pub end_minute: u8,
}

impl SendWindow {
    fn start_secs(&self) -> u32 {
        u32::from(self.start_hour) * 3600 + u32::from(self.start_minute) * 60
    }

    fn end_secs(&self) -> u32 {
        u32::from(self.end_hour) * 3600 + u32::from(self.end_minute) * 60
    }

    /// Whether `seconds_of_day` falls inside the window (start inclusive,
    /// end exclusive).
    pub fn contains(&self, seconds_of_day: u32) -> bool {
        let (start, end) = (self.start_secs(), self.end_secs());
        if start <= end {
            seconds_of_day >= start && seconds_of_day < end
        } else {
            seconds_of_day >= start || seconds_of_day < end
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.start_hour >= 24 || self.end_hour >= 24 {
            return Err(ConfigError::ValidationFailed(
                "send window hours must be 0–23",
            ));
        }
        if self.start_minute >= 60 || self.end_minute >= 60 {
            return Err(ConfigError::ValidationFailed(
                "send window minutes must be 0–59",
            ));
        }
        if self.start_secs() == self.end_secs() {
            return Err(ConfigError::ValidationFailed(
                "send window must not be empty",
            ));
        }
        Ok(())
    }
}

/// Which records a data transfer sends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransferStrategy {
    /// The whole log, from index 0.
    All,
    /// Only records after the last delivered prefix.
    NewOnly,
}

impl TransferStrategy {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(Self::All),
            1 => Some(Self::NewOnly),
            _ => None,
        }
    }
}

/// Persisted device configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    // --- Identity ---
    /// Radio device identifier; all 0xFF until provisioned.
    pub device_id: [u8; 4],
    /// Transceiver carrier trim in synthesizer steps.
    pub rf_frequency_offset: i16,

    // --- Cadence ---
    /// When to take a regular measurement.
    pub measurement: Schedule,
    /// When to send the log to the gateway.
    pub uplink: Schedule,
    /// Optional daily window outside which uplinks are skipped.
    pub send_window: Option<SendWindow>,
    /// Measurement interval during a high-temperature excursion (5-minute ticks).
    pub high_temp_interval_5min: u16,

    // --- Thresholds ---
    /// Excursion ends when the temperature falls below this (°C).
    pub cool_down_threshold_c: f32,
    /// Excursion starts when the temperature reaches this (°C).
    pub pre_alert_threshold_c: f32,

    // --- Log bookkeeping ---
    pub transfer_strategy: TransferStrategy,
    /// Append cursor of the flash record log.
    pub flash_record_count: u32,
    /// Records `[0, uplink_cursor)` were delivered to the gateway.
    pub uplink_cursor: u32,
    /// Set by a log erase, cleared after the next successful handshake.
    pub flash_erased: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            device_id: [0xFF; 4],
            rf_frequency_offset: 0,

            measurement: Schedule::Periodic { interval_5min: 12 }, // hourly
            uplink: Schedule::Periodic { interval_5min: 48 },      // every 4 h
            send_window: None,
            high_temp_interval_5min: 2, // 10 min

            cool_down_threshold_c: 50.0,
            pre_alert_threshold_c: 100.0,

            transfer_strategy: TransferStrategy::All,
            flash_record_count: 0,
            uplink_cursor: 0,
            flash_erased: false,
        }
    }
}

impl Settings {
    /// Range-check every field.  Settings that fail are rejected wholesale.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.measurement.validate()?;
        self.uplink.validate()?;
        if let Some(window) = &self.send_window {
            window.validate()?;
        }
        if self.high_temp_interval_5min == 0 || self.high_temp_interval_5min > MAX_INTERVAL_5MIN {
            return Err(ConfigError::ValidationFailed(
                "high_temp_interval_5min must be 1–288",
            ));
        }
        if !self.cool_down_threshold_c.is_finite() || !self.pre_alert_threshold_c.is_finite() {
            return Err(ConfigError::ValidationFailed("thresholds must be finite"));
        }
        if self.cool_down_threshold_c >= self.pre_alert_threshold_c {
            return Err(ConfigError::ValidationFailed(
                "cool_down_threshold_c must be < pre_alert_threshold_c",
            ));
        }
        if self.uplink_cursor > self.flash_record_count {
            return Err(ConfigError::ValidationFailed(
                "uplink_cursor must not exceed flash_record_count",
            ));
        }
        Ok(())
    }

    /// Whether the gateway has assigned an identity.
    pub fn is_provisioned(&self) -> bool {
        self.device_id != [0xFF; 4]
    }
}

// ---------------------------------------------------------------------------
// Runtime profile
// ---------------------------------------------------------------------------

/// Timing and retry configuration selected at boot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    /// Dwell in `Test` before moving on (ms).
    pub test_delay_ms: u32,

    // --- Radio link ---
    /// How long to listen for ACK/NACK after a transmission (ms).
    pub ack_timeout_ms: u32,
    /// How long to listen for a downlink command after an announcing ACK (ms).
    pub cmd_timeout_ms: u32,
    /// Transmit completion timeout (ms).
    pub tx_timeout_ms: u32,
    /// Ping attempts while waiting for activation.
    pub activation_ping_retries: u8,
    /// Ping attempts before a data transfer.
    pub transfer_ping_retries: u8,
    /// Attempts per data packet before it is skipped.
    pub packet_retries: u8,
    /// Upper bound of the random backoff between attempts (ms).
    pub max_backoff_ms: u32,
    /// Pause before re-pinging after a NACK (ms).
    pub nack_retry_delay_ms: u32,
    /// How many times an applied command is acknowledged.
    pub command_ack_repeats: u8,
    /// Gap between repeated acknowledgements (ms).
    pub command_ack_gap_ms: u32,
    /// Records per data packet (1–10).
    pub records_per_packet: u8,

    // --- Activation retry ---
    /// Retry offset for the first `activation_fast_attempts` cycles (s).
    pub activation_retry_secs: u32,
    pub activation_fast_attempts: u8,
    /// Retry offset once the fast attempts are used up (s).
    pub activation_slow_retry_secs: u32,

    // --- Scheduling ---
    /// Radio alarm wins when it fires at most this long after the
    /// measurement alarm (s).
    pub alarm_tolerance_secs: u32,
    /// Added to relative alarms so they never land in the past (s).
    pub alarm_guard_secs: u32,

    // --- Excursion handling ---
    /// Hysteresis programmed into the sensor's high alert (°C).
    pub high_temp_hysteresis_c: f32,
    /// Poll the sensor instead of waiting for the alert line.
    pub poll_for_excursion: bool,

    // --- Storage ---
    /// Maximum records the flash log holds.
    pub flash_capacity_records: u32,

    /// Seed for the backoff jitter generator.
    pub rng_seed: u64,
}

impl Profile {
    /// Field deployment.
    pub fn production() -> Self {
        Self {
            test_delay_ms: 5_000,
            ack_timeout_ms: 100,
            cmd_timeout_ms: 1_000,
            tx_timeout_ms: 200,
            activation_ping_retries: 5,
            transfer_ping_retries: 3,
            packet_retries: 3,
            max_backoff_ms: 1_000,
            nack_retry_delay_ms: 50,
            command_ack_repeats: 3,
            command_ack_gap_ms: 200,
            records_per_packet: 1,
            activation_retry_secs: 60,
            activation_fast_attempts: 3,
            activation_slow_retry_secs: 3_600,
            alarm_tolerance_secs: 50,
            alarm_guard_secs: 2,
            high_temp_hysteresis_c: 2.0,
            poll_for_excursion: false,
            flash_capacity_records: 2048,
            rng_seed: 0x5EED_1065,
        }
    }

    /// Bench and lab builds: short waits, polling instead of the alert line.
    pub fn development() -> Self {
        Self {
            test_delay_ms: 1_000,
            activation_retry_secs: 30,
            activation_slow_retry_secs: 30,
            poll_for_excursion: true,
            ..Self::production()
        }
    }
}

impl Default for Profile {
    fn default() -> Self {
        Self::production()
    }
}
