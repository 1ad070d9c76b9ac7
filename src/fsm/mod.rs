//! Mode controller: a function-pointer state machine where each state's
//! handler runs one complete duty cycle.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │  StateTable                                                    │
//! │  ┌───────────────────┬─────────────┬─────────────────────────┐ │
//! │  │ Mode              │ on_enter    │ run (one duty cycle)    │ │
//! │  ├───────────────────┼─────────────┼─────────────────────────┤ │
//! │  │ Test              │ —           │ fn(ctx, hw, sink)       │ │
//! │  │ WaitForActivation │ fn(ctx)     │ fn(ctx, hw, sink)       │ │
//! │  │ Operational       │ —           │ fn(ctx, hw, sink)       │ │
//! │  │ PreHighTemp       │ —           │ fn(ctx, hw, sink)       │ │
//! │  │ HighTemperature   │ fn(ctx)     │ fn(ctx, hw, sink)       │ │
//! │  │ DataTransfer      │ —           │ fn(ctx, hw, sink)       │ │
//! │  │ Sleep             │ —           │ fn(ctx, hw, sink)       │ │
//! │  └───────────────────┴─────────────┴─────────────────────────┘ │
//! └────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A handler typically measures, persists, arms the next wake-up and
//! halts.  Transitions requested while it runs are deferred: the mode
//! changes only after the handler returns, then the next state's
//! `on_enter` runs.  Durable targets are written to EEPROM at request time
//! so a power loss mid-cycle resumes in the new mode.

pub mod context;
pub mod states;

use log::{info, warn};

use crate::app::events::NodeEvent;
use crate::app::ports::{EventSink, NodeHardware};
use crate::config::{Profile, Settings};
use crate::events::WakeFlag;
use crate::storage::SettingsOrigin;
use context::ModeContext;

// ---------------------------------------------------------------------------
// Mode identity
// ---------------------------------------------------------------------------

/// Operating modes.  The discriminant is what gets persisted.
/// Must stay in sync with the table built in [`states::build_state_table`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Mode {
    Test = 0,
    WaitForActivation = 1,
    Operational = 2,
    PreHighTemp = 3,
    HighTemperature = 4,
    DataTransfer = 5,
    Sleep = 6,
}

impl Mode {
    /// Total number of modes; sizes the table array.
    pub const COUNT: usize = 7;

    pub const ALL: [Mode; Mode::COUNT] = [
        Mode::Test,
        Mode::WaitForActivation,
        Mode::Operational,
        Mode::PreHighTemp,
        Mode::HighTemperature,
        Mode::DataTransfer,
        Mode::Sleep,
    ];

    pub fn from_u8(raw: u8) -> Option<Self> {
        Self::ALL.get(raw as usize).copied()
    }

    /// Modes that survive a reset.  Everything else resumes as `Test`.
    pub fn is_durable(self) -> bool {
        matches!(
            self,
            Self::Operational | Self::PreHighTemp | Self::WaitForActivation
        )
    }
}

// ---------------------------------------------------------------------------
// Function-pointer type aliases
// ---------------------------------------------------------------------------

/// Runs once whenever the mode is entered (and for the boot mode).
pub type StateActionFn = fn(&mut ModeContext<'_>);

/// One full duty cycle of a mode.
pub type StateRunFn<H> = fn(&mut ModeContext<'_>, &mut H, &mut dyn EventSink);

// ---------------------------------------------------------------------------
// State descriptor (one row in the table)
// ---------------------------------------------------------------------------

pub struct StateDescriptor<H> {
    pub mode: Mode,
    pub name: &'static str,
    pub on_enter: Option<StateActionFn>,
    pub run: StateRunFn<H>,
}

// ---------------------------------------------------------------------------
// Controller
// ---------------------------------------------------------------------------

/// Owns the state table and the [`ModeContext`] threaded through every
/// handler.
pub struct ModeController<'w, H: NodeHardware> {
    table: [StateDescriptor<H>; Mode::COUNT],
    ctx: ModeContext<'w>,
    cycles: u64,
}

impl<'w, H: NodeHardware> ModeController<'w, H> {
    pub fn new(profile: Profile, wake: &'w WakeFlag) -> Self {
        Self {
            table: states::build_state_table(),
            ctx: ModeContext::new(profile, wake),
            cycles: 0,
        }
    }

    /// Load settings and the persisted mode; returns the mode to run.
    pub fn init(&mut self, hw: &mut H, sink: &mut dyn EventSink) -> Mode {
        if self.ctx.store.load_settings(hw) == SettingsOrigin::Defaults {
            sink.emit(&NodeEvent::SettingsRecovered);
        }
        let mode = self.ctx.store.load_mode(hw);
        info!("CTRL: starting in {}", self.table[mode as usize].name);

        self.ctx.current = mode;
        if let Some(enter) = self.table[mode as usize].on_enter {
            enter(&mut self.ctx);
        }
        sink.emit(&NodeEvent::Started(mode));
        mode
    }

    /// Run `current`'s duty cycle, then apply any transition it requested.
    pub fn run_one_cycle(&mut self, hw: &mut H, sink: &mut dyn EventSink, current: Mode) -> Mode {
        self.cycles += 1;
        self.ctx.current = current;

        (self.table[current as usize].run)(&mut self.ctx, hw, sink);

        if core::mem::take(&mut self.ctx.reset_requested) {
            warn!("CTRL: soft reset");
            hw.soft_reset();
        }

        match self.ctx.take_pending() {
            Some(next) if next != current => {
                info!(
                    "CTRL: {} -> {}",
                    self.table[current as usize].name, self.table[next as usize].name
                );
                self.ctx.current = next;
                if let Some(enter) = self.table[next as usize].on_enter {
                    enter(&mut self.ctx);
                }
                sink.emit(&NodeEvent::ModeChanged {
                    from: current,
                    to: next,
                });
                next
            }
            _ => current,
        }
    }

    /// Run one cycle of the current mode.
    pub fn step(&mut self, hw: &mut H, sink: &mut dyn EventSink) -> Mode {
        let current = self.ctx.current;
        self.run_one_cycle(hw, sink, current)
    }

    /// Request a switch to `target` at the end of the running cycle.
    pub fn request_transition(&mut self, hw: &mut H, target: Mode) {
        self.ctx.request_transition(hw, target);
    }

    pub fn current_mode(&self) -> Mode {
        self.ctx.current
    }

    pub fn settings(&self) -> &Settings {
        self.ctx.store.settings()
    }

    pub fn context(&self) -> &ModeContext<'w> {
        &self.ctx
    }

    pub fn cycles(&self) -> u64 {
        self.cycles
    }
}
