//! Unified error types for the logger firmware.
//!
//! A single `Error` enum that every subsystem converts into, so the mode
//! controller can log and recover uniformly.  All variants are `Copy` so
//! they travel through state handlers without allocation.

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

/// Every fallible operation in the firmware funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The temperature sensor could not be read or returned implausible data.
    Sensor(SensorError),
    /// The real-time clock could not be read or programmed.
    Rtc(RtcError),
    /// The radio transceiver failed or the link gave up.
    Radio(RadioError),
    /// EEPROM or flash access failed, or stored data is unusable.
    Storage(StorageError),
    /// A frame or record could not be encoded or decoded.
    Codec(CodecError),
    /// Configuration is invalid or could not be loaded.
    Config(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sensor(e) => write!(f, "sensor: {e}"),
            Self::Rtc(e) => write!(f, "rtc: {e}"),
            Self::Radio(e) => write!(f, "radio: {e}"),
            Self::Storage(e) => write!(f, "storage: {e}"),
            Self::Codec(e) => write!(f, "codec: {e}"),
            Self::Config(msg) => write!(f, "config: {msg}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Sensor errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorError {
    /// Bus transaction with the sensor failed.
    BusFault,
    /// Conversion did not complete in time.
    Timeout,
    /// Reading is outside the physically plausible range.
    OutOfRange,
}

impl fmt::Display for SensorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BusFault => write!(f, "bus fault"),
            Self::Timeout => write!(f, "conversion timeout"),
            Self::OutOfRange => write!(f, "reading out of range"),
        }
    }
}

impl From<SensorError> for Error {
    fn from(e: SensorError) -> Self {
        Self::Sensor(e)
    }
}

// ---------------------------------------------------------------------------
// RTC errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RtcError {
    BusFault,
    /// A date or time field is outside its calendar range.
    InvalidDateTime,
}

impl fmt::Display for RtcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BusFault => write!(f, "bus fault"),
            Self::InvalidDateTime => write!(f, "invalid date/time"),
        }
    }
}

impl From<RtcError> for Error {
    fn from(e: RtcError) -> Self {
        Self::Rtc(e)
    }
}

// ---------------------------------------------------------------------------
// Radio errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RadioError {
    /// The transceiver did not come up.
    InitFailed,
    /// Transmission did not complete within its timeout.
    TxTimeout,
    /// Gateway stayed silent for every attempt.
    NoResponse,
    /// Gateway answered NACK on every attempt.
    Rejected,
}

impl fmt::Display for RadioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InitFailed => write!(f, "transceiver init failed"),
            Self::TxTimeout => write!(f, "transmit timeout"),
            Self::NoResponse => write!(f, "no response from gateway"),
            Self::Rejected => write!(f, "gateway rejected request"),
        }
    }
}

impl From<RadioError> for Error {
    fn from(e: RadioError) -> Self {
        Self::Radio(e)
    }
}

// ---------------------------------------------------------------------------
// Storage errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    /// Underlying EEPROM/flash read or write failed.
    Io,
    /// Address range falls outside the device.
    OutOfBounds,
    /// The record log reached its capacity.
    LogFull,
    /// A stored block or record failed its CRC check.
    Corrupted,
    /// The write-once identity block is already programmed.
    AlreadyProvisioned,
    /// Serialization of a persisted block failed.
    Encoding,
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io => write!(f, "I/O failure"),
            Self::OutOfBounds => write!(f, "address out of bounds"),
            Self::LogFull => write!(f, "record log full"),
            Self::Corrupted => write!(f, "CRC mismatch"),
            Self::AlreadyProvisioned => write!(f, "identity already provisioned"),
            Self::Encoding => write!(f, "encoding failed"),
        }
    }
}

impl From<StorageError> for Error {
    fn from(e: StorageError) -> Self {
        Self::Storage(e)
    }
}

// ---------------------------------------------------------------------------
// Codec errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecError {
    /// Frame shorter than its header or declared length.
    Truncated,
    /// Trailing CRC does not match the frame contents.
    BadCrc,
    /// Header byte is not a known opcode.
    UnknownOpcode(u8),
    /// Downlink command byte is not recognised.
    UnknownCommand(u8),
    /// A field is outside its permitted range.
    InvalidField(&'static str),
    /// Payload exceeds the frame capacity.
    TooLarge,
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Truncated => write!(f, "truncated frame"),
            Self::BadCrc => write!(f, "CRC mismatch"),
            Self::UnknownOpcode(op) => write!(f, "unknown opcode 0x{op:02X}"),
            Self::UnknownCommand(cmd) => write!(f, "unknown command 0x{cmd:02X}"),
            Self::InvalidField(name) => write!(f, "invalid field: {name}"),
            Self::TooLarge => write!(f, "payload too large"),
        }
    }
}

impl From<CodecError> for Error {
    fn from(e: CodecError) -> Self {
        Self::Codec(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Firmware-wide `Result` alias.
impl core::error::Error for Error {}
impl core::error::Error for SensorError {}
impl core::error::Error for RtcError {}
impl core::error::Error for RadioError {}
impl core::error::Error for StorageError {}
impl core::error::Error for CodecError {}

pub type Result<T> = core::result::Result<T, Error>;
