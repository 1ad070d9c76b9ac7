//! Radio uplink to the gateway.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │                      Uplink Stack                          │
//! │                                                            │
//! │  ┌────────────┐   ┌────────────┐   ┌────────────────────┐  │
//! │  │ Radio      │◀─▶│  Engine    │◀─▶│  ModeController    │  │
//! │  │ (trait)    │   │ (handshake,│   │  (DataTransfer,    │  │
//! │  │            │   │  retries)  │   │   WaitForActivation)│  │
//! │  └────────────┘   └─────┬──────┘   └────────────────────┘  │
//! │                         │                                  │
//! │                   ┌─────▼──────┐                           │
//! │                   │  Codec     │  frames, CRC-8, downlink  │
//! │                   └────────────┘                           │
//! └────────────────────────────────────────────────────────────┘
//! ```

pub mod codec;
pub mod engine;
pub mod transport;

pub use engine::{Handshake, UplinkEngine};
