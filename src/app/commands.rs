//! Inbound commands from the gateway.
//!
//! Decoded from downlink frames by the uplink codec and applied by the
//! mode controller.

use crate::clock::DateTime;
use crate::config::{Schedule, TransferStrategy};

/// Downlink command codes (byte 1 of a downlink frame).
pub mod code {
    pub const SET_MEASUREMENT_INTERVAL: u8 = 0x01;
    pub const SET_SEND_INTERVAL: u8 = 0x02;
    pub const SET_HIGH_TEMP_THRESHOLD: u8 = 0x03;
    pub const SET_RTC: u8 = 0x04;
    pub const ERASE_FLASH: u8 = 0x05;
    pub const SET_TRANSFER_STRATEGY: u8 = 0x06;
    pub const SET_ACTIVATION_MODE: u8 = 0x07;
    pub const SOFT_RESET: u8 = 0x08;
    pub const ACTIVATION: u8 = 0x09;
}

/// Commands the gateway can send to the node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DownlinkCommand {
    SetMeasurementInterval(Schedule),
    SetSendInterval(Schedule),
    /// New pre-alert threshold in °C.
    SetHighTempThreshold(f32),
    /// Time sync; the date is already range-checked.
    SetRtc(DateTime),
    EraseFlash,
    SetTransferStrategy(TransferStrategy),
    /// Only honoured on the production line; refused at runtime.
    SetActivationMode(u8),
    SoftReset,
    /// Activation addressed to the given device id.
    Activation([u8; 4]),
}

impl DownlinkCommand {
    pub fn code(&self) -> u8 {
        match self {
            Self::SetMeasurementInterval(_) => code::SET_MEASUREMENT_INTERVAL,
            Self::SetSendInterval(_) => code::SET_SEND_INTERVAL,
            Self::SetHighTempThreshold(_) => code::SET_HIGH_TEMP_THRESHOLD,
            Self::SetRtc(_) => code::SET_RTC,
            Self::EraseFlash => code::ERASE_FLASH,
            Self::SetTransferStrategy(_) => code::SET_TRANSFER_STRATEGY,
            Self::SetActivationMode(_) => code::SET_ACTIVATION_MODE,
            Self::SoftReset => code::SOFT_RESET,
            Self::Activation(_) => code::ACTIVATION,
        }
    }
}

/// What applying a command achieved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    /// Settings changed and persisted, or an action was carried out.
    Applied,
    /// The clock was set.
    TimeSynced,
    /// Activation addressed to this device.
    Activated,
    /// Command refused; nothing changed.
    Rejected(&'static str),
}

impl CommandOutcome {
    /// Whether the node should leave `WaitForActivation`.
    pub fn activates(&self) -> bool {
        matches!(self, Self::TimeSynced | Self::Activated)
    }
}
