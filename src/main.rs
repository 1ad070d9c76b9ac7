//! Temperature logger node: main entry point.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                    Adapters (outer ring)                     │
//! │  SimBoard (sensor · RTC · radio · power)   LogEventSink      │
//! │  EepromAdapter (NVS)   FlashLogAdapter (reclog partition)    │
//! │                                                              │
//! │  ──────────────── Port Trait Boundary ─────────────────      │
//! │                                                              │
//! │  ┌────────────────────────────────────────────────────────┐  │
//! │  │  ModeController (pure logic)                           │  │
//! │  │  Scheduler · UplinkEngine · PersistentStore            │  │
//! │  └────────────────────────────────────────────────────────┘  │
//! │                                                              │
//! │  Interrupt bodies ──▶ WAKE (AtomicU8) ──▶ one take() per halt │
//! └──────────────────────────────────────────────────────────────┘
//! ```

use anyhow::Result;
use esp_idf_hal::delay::FreeRtos;
use log::{debug, info};

use templogger::adapters::log_sink::LogEventSink;
use templogger::adapters::sim::SimBoard;
use templogger::config::Profile;
use templogger::events::WAKE;
use templogger::fsm::ModeController;

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  Templogger v{}                      ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    // ── 2. Runtime profile ────────────────────────────────────
    let profile = if cfg!(debug_assertions) {
        Profile::development()
    } else {
        Profile::production()
    };

    // ── 3. Board and adapters ─────────────────────────────────
    let mut board = SimBoard::new(&WAKE)?;
    let mut sink = LogEventSink::new();

    // ── 4. Controller ─────────────────────────────────────────
    let mut controller = ModeController::new(profile, &WAKE);
    let mode = controller.init(&mut board, &mut sink);
    info!("Boot complete, resuming in {:?}", mode);

    // ── 5. Duty-cycle loop ────────────────────────────────────
    // Each step ends halted until the next alarm or alert.  The simulated
    // halt returns at once, so yield to let the idle task feed the watchdog.
    loop {
        let mode = controller.step(&mut board, &mut sink);
        debug!(
            "cycle {}: {:?}, {} records logged",
            controller.cycles(),
            mode,
            controller.context().store.record_count()
        );
        FreeRtos::delay_ms(1);
    }
}
