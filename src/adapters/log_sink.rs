//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing one line per [`NodeEvent`] to the
//! logger (UART on the device, nothing on the host unless a test installs
//! one).

use log::{info, warn};

use crate::app::events::NodeEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`NodeEvent`] to the serial console.
#[derive(Debug, Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &NodeEvent) {
        match event {
            NodeEvent::Started(mode) => {
                info!("START | mode={:?}", mode);
            }
            NodeEvent::ModeChanged { from, to } => {
                info!("MODE | {:?} -> {:?}", from, to);
            }
            NodeEvent::RecordLogged {
                index,
                temperature_c,
            } => {
                info!("LOG | #{} {:.2}\u{00b0}C", index, temperature_c);
            }
            NodeEvent::SensorFault => {
                warn!("FAULT | temperature sensor");
            }
            NodeEvent::TransferFinished { delivered, failed } => {
                info!("UPLINK | delivered={} failed={}", delivered, failed);
            }
            NodeEvent::CommandApplied(code) => {
                info!("CMD | 0x{:02X} applied", code);
            }
            NodeEvent::CommandRejected { code, reason } => {
                warn!("CMD | 0x{:02X} rejected: {}", code, reason);
            }
            NodeEvent::SettingsRecovered => {
                warn!("CONFIG | stored settings unusable, defaults written");
            }
        }
    }
}
