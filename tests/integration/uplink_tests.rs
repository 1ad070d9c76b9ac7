//! Integration tests for the uplink engine against the mock radio.

use templogger::app::commands::{DownlinkCommand, code};
use templogger::config::{Profile, Schedule};
use templogger::error::{CodecError, Error, RadioError};
use templogger::events::WakeFlag;
use templogger::record::Record;
use templogger::uplink::UplinkEngine;
use templogger::uplink::codec::{self, OP_ACK, OP_NACK};

use super::mock_hw::MockHardware;

const ID: [u8; 4] = [0x10, 0x20, 0x30, 0x40];

fn engine() -> UplinkEngine {
    UplinkEngine::new(&Profile {
        max_backoff_ms: 0,
        ..Profile::production()
    })
}

fn open<'w>(wake: &'w WakeFlag) -> (MockHardware<'w>, UplinkEngine) {
    let mut hw = MockHardware::new(wake);
    let mut engine = engine();
    engine.open(&mut hw, 0).unwrap();
    (hw, engine)
}

#[test]
fn nack_is_retried_after_short_pause() {
    let wake = WakeFlag::new();
    let (mut hw, mut engine) = open(&wake);
    hw.script_reply(&[OP_NACK]);
    hw.script_reply(&[OP_ACK, 0x01]);

    let handshake = engine.ping_activation(&mut hw, ID, 5).unwrap();

    assert!(handshake.command_follows);
    assert_eq!(hw.sent.len(), 2);
    assert!(hw.delayed_ms >= u64::from(Profile::production().nack_retry_delay_ms));
}

#[test]
fn silent_gateway_exhausts_attempts() {
    let wake = WakeFlag::new();
    let (mut hw, mut engine) = open(&wake);

    let err = engine.ping_transfer(&mut hw, ID, 7, false, 3).unwrap_err();

    assert_eq!(err, Error::Radio(RadioError::NoResponse));
    assert_eq!(hw.sent.len(), 3);
    let frame = codec::decode_frame(&hw.sent[0]).unwrap();
    assert_eq!(frame.device_id, ID);
    assert_eq!(frame.payload, &[0, 7]);
}

#[test]
fn last_nack_is_reported_as_rejection() {
    let wake = WakeFlag::new();
    let (mut hw, mut engine) = open(&wake);
    hw.script_reply(&[OP_NACK]);
    hw.script_reply(&[OP_NACK]);

    let err = engine.ping_activation(&mut hw, ID, 2).unwrap_err();
    assert_eq!(err, Error::Radio(RadioError::Rejected));
}

#[test]
fn multi_record_packet_carries_records_in_order() {
    let wake = WakeFlag::new();
    let (mut hw, mut engine) = open(&wake);
    hw.script_reply(&[OP_ACK, 0]);
    let records: Vec<Record> = (0..4).map(|i| Record::valid(100 + i, -10.0 + i as f32)).collect();

    assert!(engine.send_records(&mut hw, ID, &records));

    let frame = codec::decode_frame(&hw.sent[0]).unwrap();
    let decoded: Vec<Record> = codec::decode_records(frame.payload)
        .map(Result::unwrap)
        .collect();
    assert_eq!(decoded.len(), 4);
    for (sent, got) in records.iter().zip(&decoded) {
        assert_eq!(sent.timestamp, got.timestamp);
        assert!((sent.temperature_c - got.temperature_c).abs() < 1.0 / 16.0);
    }
    assert_eq!(engine.next_seq(), 1);
}

#[test]
fn dropped_packet_still_consumes_a_sequence_number() {
    let wake = WakeFlag::new();
    let (mut hw, mut engine) = open(&wake);

    assert!(!engine.send_records(&mut hw, ID, &[Record::valid(1, 1.0)]));
    assert_eq!(hw.sent.len(), usize::from(Profile::production().packet_retries));

    hw.script_reply(&[OP_ACK, 0]);
    assert!(engine.send_records(&mut hw, ID, &[Record::valid(2, 2.0)]));
    assert_eq!(hw.sent.last().map(|f| f[1]), Some(1));
}

#[test]
fn downlink_command_is_decoded() {
    let wake = WakeFlag::new();
    let (mut hw, mut engine) = open(&wake);
    let cmd = DownlinkCommand::SetMeasurementInterval(Schedule::FixedDaily { hour: 6, minute: 30 });
    hw.script_reply(&codec::encode_downlink(&cmd));

    assert_eq!(engine.await_command(&mut hw).unwrap(), cmd);
}

#[test]
fn missing_or_malformed_downlink_is_an_error() {
    let wake = WakeFlag::new();
    let (mut hw, mut engine) = open(&wake);

    assert_eq!(
        engine.await_command(&mut hw).unwrap_err(),
        Error::Radio(RadioError::NoResponse)
    );

    hw.script_reply(&[0xB0, 0x42, 0, 0, 0, 0, 0, 0]);
    assert_eq!(
        engine.await_command(&mut hw).unwrap_err(),
        Error::Codec(CodecError::UnknownCommand(0x42))
    );
}

#[test]
fn command_ack_is_repeated_with_gaps() {
    let wake = WakeFlag::new();
    let (mut hw, mut engine) = open(&wake);

    engine.acknowledge_command(&mut hw, ID, code::ERASE_FLASH).unwrap();

    let profile = Profile::production();
    assert_eq!(hw.sent.len(), usize::from(profile.command_ack_repeats));
    assert!(hw.sent.windows(2).all(|w| w[0] == w[1]));
    assert_eq!(
        hw.delayed_ms,
        u64::from(profile.command_ack_gap_ms) * u64::from(profile.command_ack_repeats - 1)
    );
}
