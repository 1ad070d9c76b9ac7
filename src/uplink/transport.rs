//! Radio transceiver abstraction: a half-duplex packet channel.
//!
//! The uplink engine is generic over `Radio`; the transceiver driver
//! (register access, FIFO handling, ECC) lives behind it.

use crate::error::RadioError;

/// Transceiver operating mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RadioMode {
    Sleep,
    Standby,
    Receive,
    Transmit,
}

/// Half-duplex packet radio.
pub trait Radio {
    /// Power up and configure the transceiver.
    fn radio_open(&mut self) -> Result<(), RadioError>;

    /// Put the transceiver back to sleep.
    fn radio_close(&mut self);

    /// Trim the carrier by `steps` synthesizer steps from nominal.
    fn set_frequency_offset(&mut self, steps: i16) -> Result<(), RadioError>;

    fn set_radio_mode(&mut self, mode: RadioMode) -> Result<(), RadioError>;

    /// Transmit one packet, waiting at most `timeout_ms` for completion.
    fn radio_send(&mut self, data: &[u8], timeout_ms: u32) -> Result<(), RadioError>;

    /// Listen for one packet for at most `timeout_ms`.
    /// Returns the number of bytes written to `buf`; 0 means nothing arrived.
    fn radio_receive(&mut self, buf: &mut [u8], timeout_ms: u32) -> Result<usize, RadioError>;
}
