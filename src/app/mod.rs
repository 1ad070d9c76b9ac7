//! Application core boundary.
//!
//! Hardware is reached only through the **port traits** in [`ports`];
//! gateway commands arrive as [`commands::DownlinkCommand`] and milestones
//! leave as [`events::NodeEvent`].

pub mod commands;
pub mod events;
pub mod ports;
