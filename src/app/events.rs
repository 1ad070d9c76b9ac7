//! Outbound application events.
//!
//! The [`ModeController`](crate::fsm::ModeController) emits these through
//! the [`EventSink`](super::ports::EventSink) port.

use crate::fsm::Mode;

/// Structured events emitted by the application core.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeEvent {
    /// The controller finished `init` (carries the resumed mode).
    Started(Mode),

    /// A deferred transition was applied.
    ModeChanged { from: Mode, to: Mode },

    /// A record was appended to the flash log.
    RecordLogged { index: u32, temperature_c: f32 },

    /// A measurement was abandoned because the sensor failed.
    SensorFault,

    /// A data transfer finished.
    TransferFinished { delivered: u32, failed: u32 },

    /// A downlink command was applied.
    CommandApplied(u8),

    /// A downlink command was refused.
    CommandRejected { code: u8, reason: &'static str },

    /// Stored settings were unusable and defaults were written back.
    SettingsRecovered,
}
