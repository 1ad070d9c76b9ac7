//! Integration tests for the ModeController → store / uplink pipeline.
//!
//! Each test scripts the mock board (sensor readings, gateway replies,
//! wake reasons), runs whole duty cycles and asserts on what reached
//! EEPROM, flash and the radio.

use templogger::app::commands::{DownlinkCommand, code};
use templogger::app::events::NodeEvent;
use templogger::app::ports::AlarmId;
use templogger::clock::{Date, DateTime, TimeOfDay};
use templogger::config::{Profile, TransferStrategy};
use templogger::error::SensorError;
use templogger::events::{WakeFlag, WakeReason};
use templogger::fsm::{Mode, ModeController};
use templogger::record::{RECORD_SIZE, Record};
use templogger::storage::PersistentStore;
use templogger::storage::layout::{FLASH_LOG_BASE, record_address};
use templogger::uplink::codec::{self, OP_ACK, OP_DATA, OP_NACK, OP_PING_ACTIVATION, OP_PING_TRANSFER};

use super::mock_hw::{ArmedAlarm, MockHardware, RecordingSink};

const ACK: [u8; 2] = [OP_ACK, 0x00];
const ACK_WITH_COMMAND: [u8; 2] = [OP_ACK, 0x01];

fn profile() -> Profile {
    Profile {
        max_backoff_ms: 0,
        ..Profile::production()
    }
}

/// Persist `mode` and `records` log entries as if earlier cycles ran.
fn seed(hw: &mut MockHardware<'_>, mode: Mode, records: u32) {
    let mut store = PersistentStore::new(profile().flash_capacity_records);
    store.load_settings(hw);
    for i in 0..records {
        store.append_record(hw, &Record::valid(i, 20.0 + i as f32)).unwrap();
    }
    store.persist_mode(hw, mode).unwrap();
}

/// What a freshly booted device would load.
fn reload(hw: &mut MockHardware<'_>) -> PersistentStore {
    let mut store = PersistentStore::new(profile().flash_capacity_records);
    store.load_settings(hw);
    store
}

/// Gateway side of a transfer handshake: ACK announcing a command, then
/// the SET_RTC downlink.
fn script_time_sync(hw: &mut MockHardware<'_>) {
    let synced = DateTime {
        date: Date::new(10, 3, 2026),
        time: TimeOfDay::new(4, 0, 5),
    };
    hw.script_reply(&ACK_WITH_COMMAND);
    hw.script_reply(&codec::encode_downlink(&DownlinkCommand::SetRtc(synced)));
}

fn boot<'w>(
    hw: &mut MockHardware<'w>,
    wake: &'w WakeFlag,
    sink: &mut RecordingSink,
) -> ModeController<'w, MockHardware<'w>> {
    let mut controller = ModeController::new(profile(), wake);
    controller.init(hw, sink);
    controller
}

// ── Boot and persistence ──────────────────────────────────────

#[test]
fn blank_device_starts_in_test_with_default_settings() {
    let wake = WakeFlag::new();
    let mut hw = MockHardware::new(&wake);
    let mut sink = RecordingSink::new();

    let controller = boot(&mut hw, &wake, &mut sink);

    assert_eq!(controller.current_mode(), Mode::Test);
    assert_eq!(
        sink.events,
        [NodeEvent::SettingsRecovered, NodeEvent::Started(Mode::Test)]
    );
    assert_eq!(reload(&mut hw).settings(), controller.settings());
}

#[test]
fn test_mode_dwells_then_persists_wait_for_activation() {
    let wake = WakeFlag::new();
    let mut hw = MockHardware::new(&wake);
    let mut sink = RecordingSink::new();
    let mut controller = boot(&mut hw, &wake, &mut sink);

    let next = controller.step(&mut hw, &mut sink);

    assert_eq!(next, Mode::WaitForActivation);
    assert!(hw.delayed_ms >= 5_000);
    assert!(sink.contains(&NodeEvent::ModeChanged {
        from: Mode::Test,
        to: Mode::WaitForActivation
    }));

    hw.power_cycle();
    let mut sink = RecordingSink::new();
    let rebooted = boot(&mut hw, &wake, &mut sink);
    assert_eq!(rebooted.current_mode(), Mode::WaitForActivation);
}

#[test]
fn durable_modes_survive_power_loss_and_transient_ones_do_not() {
    for (target, expected) in [
        (Mode::Operational, Mode::Operational),
        (Mode::PreHighTemp, Mode::PreHighTemp),
        (Mode::WaitForActivation, Mode::WaitForActivation),
        (Mode::HighTemperature, Mode::Test),
        (Mode::DataTransfer, Mode::Test),
    ] {
        let wake = WakeFlag::new();
        let mut hw = MockHardware::new(&wake);
        let mut sink = RecordingSink::new();
        let mut controller = boot(&mut hw, &wake, &mut sink);

        controller.request_transition(&mut hw, target);
        hw.power_cycle();

        let rebooted = boot(&mut hw, &wake, &mut sink);
        assert_eq!(rebooted.current_mode(), expected, "after requesting {target:?}");
    }
}

#[test]
fn failed_mode_write_still_transitions() {
    let wake = WakeFlag::new();
    let mut hw = MockHardware::new(&wake);
    let mut sink = RecordingSink::new();
    let mut controller = boot(&mut hw, &wake, &mut sink);

    hw.fail_eeprom_writes = true;
    assert_eq!(controller.step(&mut hw, &mut sink), Mode::WaitForActivation);
}

// ── Operational ───────────────────────────────────────────────

#[test]
fn operational_cycle_appends_fourth_record() {
    let wake = WakeFlag::new();
    let mut hw = MockHardware::new(&wake);
    seed(&mut hw, Mode::Operational, 3);
    let mut sink = RecordingSink::new();
    let mut controller = boot(&mut hw, &wake, &mut sink);
    assert_eq!(controller.current_mode(), Mode::Operational);
    hw.programs.clear();

    let next = controller.step(&mut hw, &mut sink);

    assert_eq!(next, Mode::Operational);
    assert_eq!(hw.programs.len(), 1);
    assert_eq!(hw.programs[0].0, FLASH_LOG_BASE + 15);
    assert_eq!(reload(&mut hw).record_count(), 4);

    let start = record_address(3) as usize;
    let mut raw = [0u8; RECORD_SIZE];
    raw.copy_from_slice(&hw.flash[start..start + RECORD_SIZE]);
    let record = Record::decode(&raw).unwrap();
    assert_eq!(record.timestamp, hw.now.tick_timestamp());
    assert!((record.temperature_c - 21.5).abs() < 1.0 / 16.0);
    assert!(sink.contains(&NodeEvent::RecordLogged {
        index: 3,
        temperature_c: 21.5
    }));
}

#[test]
fn coinciding_alarms_arm_the_radio() {
    // 03:30 with hourly measurements and 4-hourly uplinks: both fire at 04:00.
    let wake = WakeFlag::new();
    let mut hw = MockHardware::new(&wake);
    seed(&mut hw, Mode::Operational, 0);
    let mut sink = RecordingSink::new();
    let mut controller = boot(&mut hw, &wake, &mut sink);

    controller.step(&mut hw, &mut sink);

    assert_eq!(
        hw.last_armed(),
        Some(ArmedAlarm {
            id: AlarmId::B,
            at: TimeOfDay::new(4, 0, 0)
        })
    );
}

#[test]
fn measurement_alarm_wins_when_uplink_is_far() {
    let wake = WakeFlag::new();
    let mut hw = MockHardware::new(&wake);
    seed(&mut hw, Mode::Operational, 0);
    hw.now.time = TimeOfDay::new(4, 10, 0);
    let mut sink = RecordingSink::new();
    let mut controller = boot(&mut hw, &wake, &mut sink);

    controller.step(&mut hw, &mut sink);

    assert_eq!(
        hw.last_armed(),
        Some(ArmedAlarm {
            id: AlarmId::A,
            at: TimeOfDay::new(5, 0, 0)
        })
    );
}

#[test]
fn sensor_fault_sleeps_until_next_wake() {
    let wake = WakeFlag::new();
    let mut hw = MockHardware::new(&wake);
    seed(&mut hw, Mode::Operational, 1);
    hw.readings.push_back(Err(SensorError::BusFault));
    let mut sink = RecordingSink::new();
    let mut controller = boot(&mut hw, &wake, &mut sink);
    hw.programs.clear();

    assert_eq!(controller.step(&mut hw, &mut sink), Mode::Sleep);
    assert!(sink.contains(&NodeEvent::SensorFault));
    assert!(hw.programs.is_empty());

    // A spurious wake keeps it asleep; an alarm brings it back.
    assert_eq!(controller.step(&mut hw, &mut sink), Mode::Sleep);
    hw.script_wake(WakeReason::RtcAlarmA);
    assert_eq!(controller.step(&mut hw, &mut sink), Mode::Operational);
}

#[test]
fn failed_append_is_retried_next_cycle() {
    let wake = WakeFlag::new();
    let mut hw = MockHardware::new(&wake);
    seed(&mut hw, Mode::Operational, 0);
    hw.script_readings([30.0, 31.0]);
    let mut sink = RecordingSink::new();
    let mut controller = boot(&mut hw, &wake, &mut sink);

    hw.fail_flash_programs = true;
    controller.step(&mut hw, &mut sink);
    assert!(controller.context().pending_record.is_some());
    assert_eq!(reload(&mut hw).record_count(), 0);

    hw.fail_flash_programs = false;
    controller.step(&mut hw, &mut sink);
    assert!(controller.context().pending_record.is_none());
    assert_eq!(reload(&mut hw).record_count(), 2);
}

#[test]
fn unsaved_count_does_not_duplicate_the_record() {
    let wake = WakeFlag::new();
    let mut hw = MockHardware::new(&wake);
    seed(&mut hw, Mode::Operational, 0);
    hw.script_readings([30.0, 31.0]);
    let mut sink = RecordingSink::new();
    let mut controller = boot(&mut hw, &wake, &mut sink);

    hw.fail_eeprom_writes = true;
    controller.step(&mut hw, &mut sink);
    assert!(controller.context().pending_record.is_none());
    assert!(sink.contains(&NodeEvent::RecordLogged {
        index: 0,
        temperature_c: 30.0
    }));

    hw.fail_eeprom_writes = false;
    controller.step(&mut hw, &mut sink);

    let store = reload(&mut hw);
    assert_eq!(store.record_count(), 2);
    let temps: Vec<f32> = (0..2)
        .map(|i| store.read_record(&mut hw, i).unwrap().temperature_c)
        .collect();
    assert_eq!(temps, [30.0, 31.0]);
}

// ── Activation ────────────────────────────────────────────────

#[test]
fn ack_without_command_keeps_waiting_and_arms_retry() {
    let wake = WakeFlag::new();
    let mut hw = MockHardware::new(&wake);
    seed(&mut hw, Mode::WaitForActivation, 0);
    hw.script_reply(&ACK);
    let mut sink = RecordingSink::new();
    let mut controller = boot(&mut hw, &wake, &mut sink);

    let next = controller.step(&mut hw, &mut sink);

    assert_eq!(next, Mode::WaitForActivation);
    assert_eq!(hw.sent.len(), 1);
    assert_eq!(hw.sent[0][0], OP_PING_ACTIVATION);
    // 03:30:00 + 60 s retry + 2 s guard.
    assert_eq!(
        hw.last_armed(),
        Some(ArmedAlarm {
            id: AlarmId::B,
            at: TimeOfDay::new(3, 31, 2)
        })
    );
    assert_eq!(hw.halts, 1);
}

#[test]
fn activation_retry_slows_after_fast_attempts() {
    let wake = WakeFlag::new();
    let mut hw = MockHardware::new(&wake);
    seed(&mut hw, Mode::WaitForActivation, 0);
    let mut sink = RecordingSink::new();
    let mut controller = boot(&mut hw, &wake, &mut sink);

    for _ in 0..3 {
        controller.step(&mut hw, &mut sink);
        assert_eq!(hw.last_armed().map(|a| a.at), Some(TimeOfDay::new(3, 31, 2)));
    }
    controller.step(&mut hw, &mut sink);
    assert_eq!(hw.last_armed().map(|a| a.at), Some(TimeOfDay::new(4, 30, 2)));

    // Every cycle used all activation ping attempts.
    assert_eq!(hw.sent.len(), 4 * usize::from(profile().activation_ping_retries));
}

#[test]
fn activation_fast_retries_resume_after_slow_retry() {
    let wake = WakeFlag::new();
    let mut hw = MockHardware::new(&wake);
    seed(&mut hw, Mode::WaitForActivation, 0);
    let mut sink = RecordingSink::new();
    let mut controller = boot(&mut hw, &wake, &mut sink);

    for _ in 0..4 {
        controller.step(&mut hw, &mut sink);
    }
    assert_eq!(hw.last_armed().map(|a| a.at), Some(TimeOfDay::new(4, 30, 2)));

    for _ in 0..3 {
        controller.step(&mut hw, &mut sink);
        assert_eq!(hw.last_armed().map(|a| a.at), Some(TimeOfDay::new(3, 31, 2)));
    }
    controller.step(&mut hw, &mut sink);
    assert_eq!(hw.last_armed().map(|a| a.at), Some(TimeOfDay::new(4, 30, 2)));
}

#[test]
fn stored_carrier_offset_is_applied_when_the_radio_opens() {
    let wake = WakeFlag::new();
    let mut hw = MockHardware::new(&wake);
    seed(&mut hw, Mode::WaitForActivation, 0);
    let mut store = reload(&mut hw);
    store
        .update_settings(&mut hw, |s| s.rf_frequency_offset = -12)
        .unwrap();
    let mut sink = RecordingSink::new();
    let mut controller = boot(&mut hw, &wake, &mut sink);

    controller.step(&mut hw, &mut sink);

    assert_eq!(hw.frequency_offset, Some(-12));
}

#[test]
fn time_sync_downlink_activates_and_is_acknowledged() {
    let wake = WakeFlag::new();
    let mut hw = MockHardware::new(&wake);
    seed(&mut hw, Mode::WaitForActivation, 0);
    let synced = DateTime {
        date: Date::new(1, 6, 2026),
        time: TimeOfDay::new(12, 0, 0),
    };
    hw.script_reply(&ACK_WITH_COMMAND);
    hw.script_reply(&codec::encode_downlink(&DownlinkCommand::SetRtc(synced)));
    let mut sink = RecordingSink::new();
    let mut controller = boot(&mut hw, &wake, &mut sink);

    let next = controller.step(&mut hw, &mut sink);

    assert_eq!(next, Mode::PreHighTemp);
    assert_eq!(hw.now, synced);
    assert!(sink.contains(&NodeEvent::CommandApplied(code::SET_RTC)));
    // One ping, then the acknowledgement three times.
    assert_eq!(hw.sent.len(), 4);
    assert!(hw.sent[1..].iter().all(|f| f[0] == OP_ACK && f[7] == code::SET_RTC));

    hw.power_cycle();
    let rebooted = boot(&mut hw, &wake, &mut sink);
    assert_eq!(rebooted.current_mode(), Mode::PreHighTemp);
}

#[test]
fn runtime_activation_mode_change_is_refused() {
    let wake = WakeFlag::new();
    let mut hw = MockHardware::new(&wake);
    seed(&mut hw, Mode::WaitForActivation, 0);
    hw.script_reply(&ACK_WITH_COMMAND);
    hw.script_reply(&codec::encode_downlink(&DownlinkCommand::SetActivationMode(1)));
    let mut sink = RecordingSink::new();
    let mut controller = boot(&mut hw, &wake, &mut sink);

    assert_eq!(controller.step(&mut hw, &mut sink), Mode::WaitForActivation);
    assert!(sink.events.iter().any(|e| matches!(
        e,
        NodeEvent::CommandRejected {
            code: code::SET_ACTIVATION_MODE,
            ..
        }
    )));
    assert_eq!(hw.sent.len(), 1, "refused commands are not acknowledged");
}

// ── Excursion ─────────────────────────────────────────────────

#[test]
fn excursion_is_buffered_then_logged_on_cool_down() {
    let wake = WakeFlag::new();
    let mut hw = MockHardware::new(&wake);
    seed(&mut hw, Mode::PreHighTemp, 0);
    hw.script_wake(WakeReason::TempAlert);
    let mut sink = RecordingSink::new();
    let mut controller = boot(&mut hw, &wake, &mut sink);

    assert_eq!(controller.step(&mut hw, &mut sink), Mode::HighTemperature);
    assert_eq!(hw.hi_limit, Some(100.0));
    assert_eq!(hw.hysteresis, Some(2.0));
    assert!(!hw.hi_alert_enabled);

    hw.script_readings([121.0, 118.5, 45.0]);
    assert_eq!(controller.step(&mut hw, &mut sink), Mode::HighTemperature);
    assert_eq!(controller.step(&mut hw, &mut sink), Mode::HighTemperature);
    assert_eq!(controller.context().high_temp_buffer.len(), 2);
    assert_eq!(reload(&mut hw).record_count(), 0, "nothing written mid-excursion");
    // 10-minute excursion interval plus guard.
    assert_eq!(hw.last_armed().map(|a| a.at), Some(TimeOfDay::new(3, 40, 2)));

    assert_eq!(controller.step(&mut hw, &mut sink), Mode::Operational);
    let store = reload(&mut hw);
    assert_eq!(store.record_count(), 3);
    let temps: Vec<f32> = (0..3)
        .map(|i| store.read_record(&mut hw, i).unwrap().temperature_c)
        .collect();
    assert_eq!(temps, [121.0, 118.5, 45.0]);
    assert!(controller.context().high_temp_buffer.is_empty());
}

#[test]
fn polling_profile_detects_excursion_without_alert_line() {
    let wake = WakeFlag::new();
    let mut hw = MockHardware::new(&wake);
    seed(&mut hw, Mode::PreHighTemp, 0);
    hw.script_readings([80.0, 101.0]);
    let mut sink = RecordingSink::new();
    let mut controller = ModeController::new(
        Profile {
            max_backoff_ms: 0,
            ..Profile::development()
        },
        &wake,
    );
    controller.init(&mut hw, &mut sink);

    assert_eq!(controller.step(&mut hw, &mut sink), Mode::PreHighTemp);
    assert!(!hw.hi_alert_enabled);
    assert_eq!(controller.step(&mut hw, &mut sink), Mode::HighTemperature);
}

// ── Data transfer ─────────────────────────────────────────────

#[test]
fn radio_alarm_sends_whole_log_and_advances_cursor() {
    let wake = WakeFlag::new();
    let mut hw = MockHardware::new(&wake);
    seed(&mut hw, Mode::Operational, 2);
    hw.script_wake(WakeReason::RtcAlarmB);
    let mut sink = RecordingSink::new();
    let mut controller = boot(&mut hw, &wake, &mut sink);

    assert_eq!(controller.step(&mut hw, &mut sink), Mode::DataTransfer);
    assert!(hw.sent.is_empty(), "operational cycle does not transmit");

    script_time_sync(&mut hw);
    for _ in 0..3 {
        hw.script_reply(&ACK);
    }
    assert_eq!(controller.step(&mut hw, &mut sink), Mode::Operational);

    assert_eq!(hw.sent[0][0], OP_PING_TRANSFER);
    assert_eq!(&hw.sent[0][7..9], &[0, 3]);
    assert_eq!(hw.sent[1..4].iter().filter(|f| f[0] == OP_ACK).count(), 3);
    let data: Vec<_> = hw.sent[1..].iter().filter(|f| f[0] == OP_DATA).collect();
    assert_eq!(data.len(), 3);
    let seqs: Vec<u8> = data.iter().map(|f| f[1]).collect();
    assert_eq!(seqs, [0, 1, 2]);
    assert!(sink.contains(&NodeEvent::TransferFinished {
        delivered: 3,
        failed: 0
    }));
    assert_eq!(reload(&mut hw).settings().uplink_cursor, 3);
}

#[test]
fn new_only_transfer_skips_failed_packet_and_keeps_cursor() {
    let wake = WakeFlag::new();
    let mut hw = MockHardware::new(&wake);
    seed(&mut hw, Mode::Operational, 4);
    {
        let mut store = reload(&mut hw);
        store.mark_delivered(&mut hw, 2).unwrap();
        store
            .update_settings(&mut hw, |s| s.transfer_strategy = TransferStrategy::NewOnly)
            .unwrap();
    }
    let mut sink = RecordingSink::new();
    let mut controller = boot(&mut hw, &wake, &mut sink);

    script_time_sync(&mut hw);
    for _ in 0..profile().packet_retries {
        hw.script_reply(&[OP_NACK]);
    }
    hw.script_reply(&ACK);
    let next = controller.run_one_cycle(&mut hw, &mut sink, Mode::DataTransfer);

    assert_eq!(next, Mode::Operational);
    assert_eq!(&hw.sent[0][7..9], &[0, 2], "announces only new records");
    assert!(sink.contains(&NodeEvent::TransferFinished {
        delivered: 1,
        failed: 1
    }));
    assert_eq!(reload(&mut hw).settings().uplink_cursor, 2);
}

#[test]
fn unreachable_gateway_sends_nothing() {
    let wake = WakeFlag::new();
    let mut hw = MockHardware::new(&wake);
    seed(&mut hw, Mode::Operational, 3);
    let mut sink = RecordingSink::new();
    let mut controller = boot(&mut hw, &wake, &mut sink);

    let next = controller.run_one_cycle(&mut hw, &mut sink, Mode::DataTransfer);

    assert_eq!(next, Mode::Operational);
    assert_eq!(hw.sent.len(), usize::from(profile().transfer_ping_retries));
    assert!(hw.sent.iter().all(|f| f[0] == OP_PING_TRANSFER));
    assert_eq!(reload(&mut hw).settings().uplink_cursor, 0);
}

#[test]
fn bare_ack_without_time_sync_sends_no_records() {
    let wake = WakeFlag::new();
    let mut hw = MockHardware::new(&wake);
    seed(&mut hw, Mode::Operational, 2);
    hw.script_reply(&ACK);
    let mut sink = RecordingSink::new();
    let mut controller = boot(&mut hw, &wake, &mut sink);

    let next = controller.run_one_cycle(&mut hw, &mut sink, Mode::DataTransfer);

    assert_eq!(next, Mode::Operational);
    assert_eq!(hw.sent.len(), 1);
    assert_eq!(hw.sent[0][0], OP_PING_TRANSFER);
    assert!(!sink.events.iter().any(|e| matches!(e, NodeEvent::TransferFinished { .. })));
    assert_eq!(reload(&mut hw).settings().uplink_cursor, 0);
}

#[test]
fn announced_command_that_never_arrives_sends_no_records() {
    let wake = WakeFlag::new();
    let mut hw = MockHardware::new(&wake);
    seed(&mut hw, Mode::Operational, 2);
    hw.script_reply(&ACK_WITH_COMMAND);
    let mut sink = RecordingSink::new();
    let mut controller = boot(&mut hw, &wake, &mut sink);

    controller.run_one_cycle(&mut hw, &mut sink, Mode::DataTransfer);

    assert!(hw.sent.iter().all(|f| f[0] == OP_PING_TRANSFER));
    assert_eq!(reload(&mut hw).settings().uplink_cursor, 0);
}

#[test]
fn erase_downlink_during_transfer_empties_log_and_flags_next_ping() {
    let wake = WakeFlag::new();
    let mut hw = MockHardware::new(&wake);
    seed(&mut hw, Mode::Operational, 3);
    hw.script_reply(&ACK_WITH_COMMAND);
    hw.script_reply(&codec::encode_downlink(&DownlinkCommand::EraseFlash));
    let mut sink = RecordingSink::new();
    let mut controller = boot(&mut hw, &wake, &mut sink);

    controller.run_one_cycle(&mut hw, &mut sink, Mode::DataTransfer);

    assert_eq!(reload(&mut hw).record_count(), 0);
    assert!(hw.sent.iter().all(|f| f[0] != OP_DATA));
    assert_eq!(hw.sent.iter().filter(|f| f[0] == OP_ACK).count(), 3);

    // The next handshake reports the erase once.
    hw.sent.clear();
    hw.script_reply(&ACK);
    controller.run_one_cycle(&mut hw, &mut sink, Mode::DataTransfer);
    assert_eq!(hw.sent[0][1] & codec::FLAG_LOG_ERASED, codec::FLAG_LOG_ERASED);
    assert!(!reload(&mut hw).settings().flash_erased);
}

#[test]
fn settings_downlink_is_validated_and_persisted() {
    let wake = WakeFlag::new();
    let mut hw = MockHardware::new(&wake);
    seed(&mut hw, Mode::Operational, 0);
    hw.script_reply(&ACK_WITH_COMMAND);
    hw.script_reply(&codec::encode_downlink(&DownlinkCommand::SetHighTempThreshold(
        40.0,
    )));
    let mut sink = RecordingSink::new();
    let mut controller = boot(&mut hw, &wake, &mut sink);

    controller.run_one_cycle(&mut hw, &mut sink, Mode::DataTransfer);

    // 40 °C would sit below the 50 °C cool-down threshold.
    assert!(sink.events.iter().any(|e| matches!(
        e,
        NodeEvent::CommandRejected {
            code: code::SET_HIGH_TEMP_THRESHOLD,
            ..
        }
    )));
    assert_eq!(reload(&mut hw).settings().pre_alert_threshold_c, 100.0);
}

#[test]
fn soft_reset_downlink_resets_after_acknowledging() {
    let wake = WakeFlag::new();
    let mut hw = MockHardware::new(&wake);
    seed(&mut hw, Mode::Operational, 0);
    hw.script_reply(&ACK_WITH_COMMAND);
    hw.script_reply(&codec::encode_downlink(&DownlinkCommand::SoftReset));
    let mut sink = RecordingSink::new();
    let mut controller = boot(&mut hw, &wake, &mut sink);

    controller.run_one_cycle(&mut hw, &mut sink, Mode::DataTransfer);

    assert_eq!(hw.resets, 1);
    assert_eq!(hw.sent.iter().filter(|f| f[0] == OP_ACK).count(), 3);
}
