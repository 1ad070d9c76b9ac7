//! Concrete mode handlers and the table builder.
//!
//! Each handler runs one duty cycle and usually ends halted until the
//! next RTC alarm or sensor alert.
//!
//! ```text
//!  TEST ──▶ WAIT_FOR_ACTIVATION ──[SET_RTC / ACTIVATION]──▶ PRE_HIGH_TEMP
//!                 ▲   │                                         │
//!                 └───┘ retry alarm                    [alert / poll ≥ T]
//!                                                               ▼
//!  SLEEP ──[wake]──▶ OPERATIONAL ◀──[cooled, buffer flushed]── HIGH_TEMP
//!    ▲                 │    ▲
//!    └─[sensor fault]──┘    │
//!              [alarm B] ▼  │ done
//!                      DATA_TRANSFER
//! ```

use heapless::Vec;
use log::{debug, info, warn};

use super::context::{ModeContext, read_clock};
use super::{Mode, StateDescriptor};
use crate::app::commands::{CommandOutcome, DownlinkCommand};
use crate::app::events::NodeEvent;
use crate::app::ports::{AlarmId, EventSink, NodeHardware};
use crate::clock::TICK_SECS;
use crate::config::{Settings, TransferStrategy};
use crate::error::{Error, StorageError};
use crate::events::WakeReason;
use crate::record::Record;
use crate::scheduler::{self, Alarm, Winner};
use crate::uplink::codec::MAX_RECORDS_PER_PACKET;

use super::context::HIGH_TEMP_BUFFER_LEN;

// ═══════════════════════════════════════════════════════════════════════════
//  Table builder
// ═══════════════════════════════════════════════════════════════════════════

/// Build the state table.  Called once by [`ModeController::new`](super::ModeController::new).
pub fn build_state_table<H: NodeHardware>() -> [StateDescriptor<H>; Mode::COUNT] {
    [
        // Index 0 — Test
        StateDescriptor {
            mode: Mode::Test,
            name: "Test",
            on_enter: None,
            run: test_run::<H>,
        },
        // Index 1 — WaitForActivation
        StateDescriptor {
            mode: Mode::WaitForActivation,
            name: "WaitForActivation",
            on_enter: Some(wait_for_activation_enter),
            run: wait_for_activation_run::<H>,
        },
        // Index 2 — Operational
        StateDescriptor {
            mode: Mode::Operational,
            name: "Operational",
            on_enter: None,
            run: operational_run::<H>,
        },
        // Index 3 — PreHighTemp
        StateDescriptor {
            mode: Mode::PreHighTemp,
            name: "PreHighTemp",
            on_enter: None,
            run: pre_high_temp_run::<H>,
        },
        // Index 4 — HighTemperature
        StateDescriptor {
            mode: Mode::HighTemperature,
            name: "HighTemperature",
            on_enter: Some(high_temperature_enter),
            run: high_temperature_run::<H>,
        },
        // Index 5 — DataTransfer
        StateDescriptor {
            mode: Mode::DataTransfer,
            name: "DataTransfer",
            on_enter: None,
            run: data_transfer_run::<H>,
        },
        // Index 6 — Sleep
        StateDescriptor {
            mode: Mode::Sleep,
            name: "Sleep",
            on_enter: None,
            run: sleep_run::<H>,
        },
    ]
}

// ═══════════════════════════════════════════════════════════════════════════
//  TEST
// ═══════════════════════════════════════════════════════════════════════════

fn test_run<H: NodeHardware>(ctx: &mut ModeContext<'_>, hw: &mut H, _sink: &mut dyn EventSink) {
    info!("TEST: dwelling {} ms", ctx.profile.test_delay_ms);
    hw.delay_ms(ctx.profile.test_delay_ms);
    ctx.request_transition(hw, Mode::WaitForActivation);
}

// ═══════════════════════════════════════════════════════════════════════════
//  WAIT_FOR_ACTIVATION
// ═══════════════════════════════════════════════════════════════════════════

fn wait_for_activation_enter(ctx: &mut ModeContext<'_>) {
    ctx.activation_attempts = 0;
}

fn wait_for_activation_run<H: NodeHardware>(
    ctx: &mut ModeContext<'_>,
    hw: &mut H,
    sink: &mut dyn EventSink,
) {
    ctx.activation_attempts = ctx.activation_attempts.saturating_add(1);

    let activated = match ctx.uplink.open(hw, ctx.store.settings().rf_frequency_offset) {
        Ok(()) => {
            let activated = try_activation(ctx, hw, sink);
            ctx.uplink.close(hw);
            activated
        }
        Err(e) => {
            warn!("ACTIVATION: radio unavailable: {}", e);
            false
        }
    };

    if activated {
        info!("ACTIVATION: activated after {} attempts", ctx.activation_attempts);
        ctx.request_transition(hw, Mode::PreHighTemp);
        return;
    }

    let retry_secs = if ctx.activation_attempts <= ctx.profile.activation_fast_attempts {
        ctx.profile.activation_retry_secs
    } else {
        // One slow retry, then the fast burst starts over.
        ctx.activation_attempts = 0;
        ctx.profile.activation_slow_retry_secs
    };
    if let Err(e) = ctx.arm_relative(hw, AlarmId::B, retry_secs) {
        warn!("ACTIVATION: retry alarm not armed: {}", e);
    }
    debug!("ACTIVATION: retry in {} s", retry_secs);
    ctx.suspend(hw);
}

/// Ping, and if the gateway announces a command, receive and apply it.
fn try_activation<H: NodeHardware>(ctx: &mut ModeContext<'_>, hw: &mut H, sink: &mut dyn EventSink) -> bool {
    let device_id = ctx.store.settings().device_id;
    let attempts = ctx.profile.activation_ping_retries;
    let handshake = match ctx.uplink.ping_activation(hw, device_id, attempts) {
        Ok(h) => h,
        Err(_) => return false,
    };
    if !handshake.command_follows {
        info!("ACTIVATION: ACK without command, staying");
        return false;
    }
    let command = match ctx.uplink.await_command(hw) {
        Ok(c) => c,
        Err(e) => {
            warn!("ACTIVATION: announced command not received: {}", e);
            return false;
        }
    };
    let outcome = handle_command(ctx, hw, sink, command);
    outcome.activates()
}

// ═══════════════════════════════════════════════════════════════════════════
//  OPERATIONAL
// ═══════════════════════════════════════════════════════════════════════════

fn operational_run<H: NodeHardware>(ctx: &mut ModeContext<'_>, hw: &mut H, sink: &mut dyn EventSink) {
    let now = match read_clock(hw) {
        Ok(now) => now,
        Err(e) => {
            warn!("OPERATIONAL: clock unreadable: {}", e);
            ctx.request_transition(hw, Mode::Sleep);
            return;
        }
    };

    if let Some(record) = ctx.pending_record.take() {
        log_record(ctx, hw, sink, record);
    }

    match ctx.thermometer.measure(hw) {
        Ok(reading) => {
            let record = Record::valid(now.tick_timestamp(), reading.celsius);
            log_record(ctx, hw, sink, record);
        }
        Err(e) => {
            warn!("OPERATIONAL: measurement abandoned: {}", e);
            sink.emit(&NodeEvent::SensorFault);
            ctx.request_transition(hw, Mode::Sleep);
            return;
        }
    }

    let settings = ctx.store.settings();
    let radio = Alarm::from(settings.uplink);
    let measurement = Alarm::from(settings.measurement);
    let now_secs = now.time.seconds_of_day();
    let (fire_at, winner) =
        scheduler::resolve(&radio, &measurement, now_secs, ctx.profile.alarm_tolerance_secs);
    let id = match winner {
        Winner::Radio => AlarmId::B,
        Winner::Temperature => AlarmId::A,
    };
    debug!("OPERATIONAL: next wake {:?} at {} s", winner, fire_at);
    if let Err(e) = ctx.arm_alarm(hw, id, fire_at) {
        warn!("OPERATIONAL: alarm not armed: {}", e);
    }

    if ctx.suspend(hw) != WakeReason::RtcAlarmB {
        return;
    }
    let wake_secs = hw.get_time().map(|t| t.seconds_of_day()).unwrap_or(fire_at);
    match ctx.store.settings().send_window {
        Some(window) if !window.contains(wake_secs) => {
            info!("OPERATIONAL: outside send window, uplink skipped");
        }
        _ => ctx.request_transition(hw, Mode::DataTransfer),
    }
}

/// Append `record`; an I/O failure keeps it for the next cycle.
fn log_record<H: NodeHardware>(ctx: &mut ModeContext<'_>, hw: &mut H, sink: &mut dyn EventSink, record: Record) {
    match ctx.store.append_record(hw, &record) {
        Ok(index) => sink.emit(&NodeEvent::RecordLogged {
            index,
            temperature_c: record.temperature_c,
        }),
        Err(StorageError::LogFull) => {}
        Err(e) => {
            warn!("OPERATIONAL: record not persisted, retrying next cycle: {}", e);
            ctx.pending_record = Some(record);
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  PRE_HIGH_TEMP
// ═══════════════════════════════════════════════════════════════════════════

fn pre_high_temp_run<H: NodeHardware>(ctx: &mut ModeContext<'_>, hw: &mut H, _sink: &mut dyn EventSink) {
    let threshold = ctx.store.settings().pre_alert_threshold_c;
    let poll_secs = u32::from(ctx.store.settings().high_temp_interval_5min) * TICK_SECS;

    if ctx.profile.poll_for_excursion {
        match ctx.thermometer.measure(hw) {
            Ok(r) if r.celsius >= threshold => {
                info!("PRE_HIGH_TEMP: {:.1} °C reached threshold {:.1} °C", r.celsius, threshold);
                ctx.request_transition(hw, Mode::HighTemperature);
                return;
            }
            Ok(_) => {}
            Err(e) => warn!("PRE_HIGH_TEMP: poll failed: {}", e),
        }
        if let Err(e) = ctx.arm_relative(hw, AlarmId::A, poll_secs) {
            warn!("PRE_HIGH_TEMP: poll alarm not armed: {}", e);
        }
        ctx.suspend(hw);
        return;
    }

    let hysteresis = ctx.profile.high_temp_hysteresis_c;
    if let Err(e) = ctx.thermometer.arm_high_alert(hw, threshold, hysteresis) {
        warn!("PRE_HIGH_TEMP: alert not armed ({}), retrying later", e);
        if let Err(e) = ctx.arm_relative(hw, AlarmId::A, poll_secs) {
            warn!("PRE_HIGH_TEMP: retry alarm not armed: {}", e);
        }
        ctx.suspend(hw);
        return;
    }

    match ctx.suspend(hw) {
        WakeReason::TempAlert => {
            if let Err(e) = ctx.thermometer.disarm_alerts(hw) {
                warn!("PRE_HIGH_TEMP: alert not disarmed: {}", e);
            }
            info!("PRE_HIGH_TEMP: threshold {:.1} °C crossed", threshold);
            ctx.request_transition(hw, Mode::HighTemperature);
        }
        other => debug!("PRE_HIGH_TEMP: woke by {:?}, re-arming", other),
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  HIGH_TEMPERATURE
// ═══════════════════════════════════════════════════════════════════════════

fn high_temperature_enter(ctx: &mut ModeContext<'_>) {
    info!(
        "HIGH_TEMP: excursion started ({} samples buffered)",
        ctx.high_temp_buffer.len()
    );
}

fn high_temperature_run<H: NodeHardware>(
    ctx: &mut ModeContext<'_>,
    hw: &mut H,
    sink: &mut dyn EventSink,
) {
    let cool_down = ctx.store.settings().cool_down_threshold_c;
    let interval_secs = u32::from(ctx.store.settings().high_temp_interval_5min) * TICK_SECS;

    match read_clock(hw) {
        Ok(now) => match ctx.thermometer.measure(hw) {
            Ok(reading) => {
                ctx.buffer_sample(Record::valid(now.tick_timestamp(), reading.celsius));
                if reading.celsius < cool_down && flush_excursion(ctx, hw, sink) {
                    info!("HIGH_TEMP: cooled to {:.1} °C, excursion logged", reading.celsius);
                    ctx.request_transition(hw, Mode::Operational);
                    return;
                }
            }
            Err(e) => {
                warn!("HIGH_TEMP: measurement abandoned: {}", e);
                sink.emit(&NodeEvent::SensorFault);
            }
        },
        Err(e) => warn!("HIGH_TEMP: clock unreadable: {}", e),
    }

    if let Err(e) = ctx.arm_relative(hw, AlarmId::A, interval_secs) {
        warn!("HIGH_TEMP: alarm not armed: {}", e);
    }
    ctx.suspend(hw);
}

/// Write the buffered excursion to flash.  Returns true once the buffer
/// is empty.  A full log discards the remainder, since no later attempt
/// can succeed.
fn flush_excursion<H: NodeHardware>(ctx: &mut ModeContext<'_>, hw: &mut H, sink: &mut dyn EventSink) -> bool {
    let records: Vec<Record, HIGH_TEMP_BUFFER_LEN> = ctx.high_temp_buffer.iter().copied().collect();
    let first_index = ctx.store.record_count();
    let outcome = ctx.store.append_batch(hw, &records);

    for (offset, record) in records.iter().take(outcome.written).enumerate() {
        ctx.high_temp_buffer.pop_front();
        sink.emit(&NodeEvent::RecordLogged {
            index: first_index + offset as u32,
            temperature_c: record.temperature_c,
        });
    }

    match outcome.error {
        None => true,
        Some(StorageError::LogFull) => {
            warn!(
                "HIGH_TEMP: log full, {} excursion samples discarded",
                ctx.high_temp_buffer.len()
            );
            ctx.high_temp_buffer.clear();
            true
        }
        Some(e) => {
            warn!(
                "HIGH_TEMP: flush stopped ({}), {} samples kept",
                e,
                ctx.high_temp_buffer.len()
            );
            false
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  DATA_TRANSFER
// ═══════════════════════════════════════════════════════════════════════════

fn data_transfer_run<H: NodeHardware>(ctx: &mut ModeContext<'_>, hw: &mut H, sink: &mut dyn EventSink) {
    match ctx.uplink.open(hw, ctx.store.settings().rf_frequency_offset) {
        Ok(()) => {
            transfer_log(ctx, hw, sink);
            ctx.uplink.close(hw);
        }
        Err(e) => warn!("TRANSFER: radio unavailable: {}", e),
    }
    ctx.request_transition(hw, Mode::Operational);
}

fn transfer_start(ctx: &ModeContext<'_>) -> u32 {
    match ctx.store.settings().transfer_strategy {
        TransferStrategy::All => 0,
        TransferStrategy::NewOnly => ctx.store.settings().uplink_cursor,
    }
}

fn transfer_log<H: NodeHardware>(ctx: &mut ModeContext<'_>, hw: &mut H, sink: &mut dyn EventSink) {
    let device_id = ctx.store.settings().device_id;
    let pending = ctx.store.record_count().saturating_sub(transfer_start(ctx));
    let announced = u16::try_from(pending).unwrap_or(u16::MAX);
    let erased = ctx.store.settings().flash_erased;
    let attempts = ctx.profile.transfer_ping_retries;

    let handshake = match ctx.uplink.ping_transfer(hw, device_id, announced, erased, attempts) {
        Ok(h) => h,
        Err(_) => {
            info!("TRANSFER: gateway unreachable, nothing sent");
            return;
        }
    };
    if erased {
        if let Err(e) = ctx.store.clear_erased_flag(hw) {
            warn!("TRANSFER: erased flag not cleared: {}", e);
        }
    }
    if !handshake.command_follows {
        info!("TRANSFER: ACK without time sync, nothing sent");
        return;
    }
    let outcome = match ctx.uplink.await_command(hw) {
        Ok(command) => handle_command(ctx, hw, sink, command),
        Err(e) => {
            warn!("TRANSFER: announced command not received: {}", e);
            return;
        }
    };
    // Records only go out with a freshly synced clock.
    if outcome != CommandOutcome::TimeSynced {
        info!("TRANSFER: session ended without time sync, nothing sent");
        return;
    }

    let start = transfer_start(ctx);
    let total = ctx.store.record_count();
    let per_packet = u32::from(ctx.profile.records_per_packet).clamp(1, MAX_RECORDS_PER_PACKET as u32);

    let mut delivered = 0u32;
    let mut failed = 0u32;
    let mut contiguous_end = start;
    let mut index = start;

    while index < total {
        let end = (index + per_packet).min(total);
        let mut batch: Vec<Record, MAX_RECORDS_PER_PACKET> = Vec::new();
        let mut unreadable = 0u32;
        for i in index..end {
            match ctx.store.read_record(hw, i) {
                Ok(record) => {
                    // Capacity matches the clamp above.
                    let _ = batch.push(record);
                }
                Err(e) => {
                    warn!("TRANSFER: record {} skipped: {}", i, e);
                    unreadable += 1;
                }
            }
        }

        let sent = batch.is_empty() || ctx.uplink.send_records(hw, device_id, &batch);
        if sent {
            delivered += batch.len() as u32;
        } else {
            failed += batch.len() as u32;
        }
        failed += unreadable;
        if sent && unreadable == 0 && contiguous_end == index {
            contiguous_end = end;
        }
        index = end;
    }

    // Resending the whole log never moves the cursor backwards.
    let cursor = contiguous_end.max(ctx.store.settings().uplink_cursor);
    if let Err(e) = ctx.store.mark_delivered(hw, cursor) {
        warn!("TRANSFER: cursor not persisted: {}", e);
    }
    info!(
        "TRANSFER: {} delivered, {} failed, cursor {}",
        delivered, failed, cursor
    );
    sink.emit(&NodeEvent::TransferFinished { delivered, failed });
}

// ═══════════════════════════════════════════════════════════════════════════
//  SLEEP
// ═══════════════════════════════════════════════════════════════════════════

fn sleep_run<H: NodeHardware>(ctx: &mut ModeContext<'_>, hw: &mut H, _sink: &mut dyn EventSink) {
    match ctx.suspend(hw) {
        WakeReason::None => debug!("SLEEP: spurious wake"),
        reason => {
            info!("SLEEP: woke by {:?}", reason);
            ctx.request_transition(hw, Mode::Operational);
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  Downlink commands
// ═══════════════════════════════════════════════════════════════════════════

/// Apply `command`, report it, and acknowledge it over the radio unless
/// it was refused.
fn handle_command<H: NodeHardware>(
    ctx: &mut ModeContext<'_>,
    hw: &mut H,
    sink: &mut dyn EventSink,
    command: DownlinkCommand,
) -> CommandOutcome {
    let code = command.code();
    let outcome = apply_command(ctx, hw, command);
    match outcome {
        CommandOutcome::Rejected(reason) => {
            warn!("CMD: 0x{:02X} rejected: {}", code, reason);
            sink.emit(&NodeEvent::CommandRejected { code, reason });
        }
        _ => {
            info!("CMD: 0x{:02X} applied ({:?})", code, outcome);
            sink.emit(&NodeEvent::CommandApplied(code));
            let device_id = ctx.store.settings().device_id;
            if let Err(e) = ctx.uplink.acknowledge_command(hw, device_id, code) {
                warn!("CMD: acknowledgement failed: {}", e);
            }
        }
    }
    outcome
}

/// Validate and persist a settings change requested by the gateway.
fn update_settings<H: NodeHardware>(
    ctx: &mut ModeContext<'_>,
    hw: &mut H,
    change: impl FnOnce(&mut Settings),
) -> CommandOutcome {
    match ctx.store.update_settings(hw, change) {
        Ok(()) => CommandOutcome::Applied,
        Err(Error::Config(reason)) => CommandOutcome::Rejected(reason),
        Err(_) => CommandOutcome::Rejected("settings not persisted"),
    }
}

/// Carry out one downlink command.
pub fn apply_command<H: NodeHardware>(
    ctx: &mut ModeContext<'_>,
    hw: &mut H,
    command: DownlinkCommand,
) -> CommandOutcome {
    match command {
        DownlinkCommand::SetMeasurementInterval(schedule) => {
            update_settings(ctx, hw, |s| s.measurement = schedule)
        }
        DownlinkCommand::SetSendInterval(schedule) => update_settings(ctx, hw, |s| s.uplink = schedule),
        DownlinkCommand::SetHighTempThreshold(celsius) => {
            update_settings(ctx, hw, |s| s.pre_alert_threshold_c = celsius)
        }
        DownlinkCommand::SetTransferStrategy(strategy) => {
            update_settings(ctx, hw, |s| s.transfer_strategy = strategy)
        }
        DownlinkCommand::SetRtc(datetime) => {
            let result = hw.set_date(datetime.date).and_then(|()| hw.set_time(datetime.time));
            match result {
                Ok(()) => CommandOutcome::TimeSynced,
                Err(_) => CommandOutcome::Rejected("rtc write failed"),
            }
        }
        DownlinkCommand::EraseFlash => match ctx.store.erase_log(hw) {
            Ok(()) => {
                ctx.pending_record = None;
                CommandOutcome::Applied
            }
            Err(_) => CommandOutcome::Rejected("flash erase failed"),
        },
        DownlinkCommand::SetActivationMode(_) => CommandOutcome::Rejected("not permitted at runtime"),
        DownlinkCommand::SoftReset => {
            ctx.reset_requested = true;
            CommandOutcome::Applied
        }
        DownlinkCommand::Activation(id) if id == ctx.store.settings().device_id => {
            CommandOutcome::Activated
        }
        DownlinkCommand::Activation(_) => CommandOutcome::Rejected("activation for another device"),
    }
}
