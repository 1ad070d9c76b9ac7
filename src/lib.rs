//! Temperature logger node firmware library.
//!
//! Exposes the pure-logic modules for integration testing and external
//! inspection. All ESP-IDF-specific code is guarded by
//! `#[cfg(target_os = "espidf")]` within each module.

#![deny(unused_must_use)]

pub mod app;
pub mod checksum;
pub mod clock;
pub mod config;
pub mod error;
pub mod events;
pub mod fsm;
pub mod record;
pub mod scheduler;
pub mod storage;
pub mod uplink;

pub mod adapters;
pub mod sensors;
