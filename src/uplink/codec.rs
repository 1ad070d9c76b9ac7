//! Uplink frame codec and downlink command decoding.
//!
//! Uplink wire format:
//! ```text
//! ┌────────┬───────────┬──────────────┬─────────┬─────────────┬───────┐
//! │ opcode │ seq/flags │ device id ×4 │ len (1) │ payload (N) │ crc-8 │
//! └────────┴───────────┴──────────────┴─────────┴─────────────┴───────┘
//! ```
//! CRC-8 covers every byte before it.  Data frames carry `count × 5`
//! bytes of encoded records; the transfer ping carries the record count
//! (big-endian u16) and sets bit 0 of the flags byte when the log was
//! erased since the last handshake.
//!
//! Gateway replies are bare: `0xAA [flags]` (bit 0 = a command follows) or
//! `0x55`.  Downlink commands are fixed 8-byte frames
//! `[0xB0][command][6 payload bytes]`, integrity-checked by the radio.

use heapless::Vec;

use crate::app::commands::{DownlinkCommand, code};
use crate::checksum::crc8;
use crate::clock::{Date, DateTime, MAX_YEAR, MIN_YEAR, TimeOfDay};
use crate::config::{Schedule, TransferStrategy};
use crate::error::CodecError;
use crate::record::{RECORD_SIZE, Record};

// ── Opcodes ───────────────────────────────────────────────────

pub const OP_PING_ACTIVATION: u8 = 0xA0;
pub const OP_PING_TRANSFER: u8 = 0xA1;
pub const OP_DATA: u8 = 0xA2;
pub const OP_DOWNLINK: u8 = 0xB0;
pub const OP_ACK: u8 = 0xAA;
pub const OP_NACK: u8 = 0x55;

// ── Sizes ─────────────────────────────────────────────────────

/// Opcode, seq/flags, device id, payload length.
pub const HEADER_LEN: usize = 7;
pub const CRC_LEN: usize = 1;
pub const MAX_RECORDS_PER_PACKET: usize = 10;
pub const MAX_PAYLOAD_LEN: usize = MAX_RECORDS_PER_PACKET * RECORD_SIZE;
pub const MAX_FRAME_LEN: usize = HEADER_LEN + MAX_PAYLOAD_LEN + CRC_LEN;
pub const DOWNLINK_LEN: usize = 8;

/// Ping flag: log was erased since the last successful handshake.
pub const FLAG_LOG_ERASED: u8 = 0x01;
/// ACK flag: a downlink command follows.
pub const FLAG_COMMAND_FOLLOWS: u8 = 0x01;

pub type FrameBuf = Vec<u8, MAX_FRAME_LEN>;

// ═══════════════════════════════════════════════════════════════
//  Uplink frames
// ═══════════════════════════════════════════════════════════════

/// A decoded uplink frame borrowing its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame<'a> {
    pub opcode: u8,
    /// Sequence number for data frames, flags for pings.
    pub seq: u8,
    pub device_id: [u8; 4],
    pub payload: &'a [u8],
}

/// Encode `[opcode][seq][id][len][payload][crc]`.
pub fn encode_frame(
    opcode: u8,
    seq: u8,
    device_id: [u8; 4],
    payload: &[u8],
) -> Result<FrameBuf, CodecError> {
    if payload.len() > MAX_PAYLOAD_LEN {
        return Err(CodecError::TooLarge);
    }
    let mut out = FrameBuf::new();
    // Capacity is checked above; extends cannot fail.
    let _ = out.push(opcode);
    let _ = out.push(seq);
    let _ = out.extend_from_slice(&device_id);
    let _ = out.push(payload.len() as u8);
    let _ = out.extend_from_slice(payload);
    let crc = crc8(&out);
    let _ = out.push(crc);
    Ok(out)
}

/// Parse and CRC-check an uplink frame.
pub fn decode_frame(bytes: &[u8]) -> Result<Frame<'_>, CodecError> {
    if bytes.len() < HEADER_LEN + CRC_LEN {
        return Err(CodecError::Truncated);
    }
    let len = bytes[6] as usize;
    if len > MAX_PAYLOAD_LEN {
        return Err(CodecError::TooLarge);
    }
    let total = HEADER_LEN + len + CRC_LEN;
    if bytes.len() < total {
        return Err(CodecError::Truncated);
    }
    if crc8(&bytes[..total - 1]) != bytes[total - 1] {
        return Err(CodecError::BadCrc);
    }
    let opcode = bytes[0];
    if !matches!(
        opcode,
        OP_PING_ACTIVATION | OP_PING_TRANSFER | OP_DATA | OP_ACK
    ) {
        return Err(CodecError::UnknownOpcode(opcode));
    }
    Ok(Frame {
        opcode,
        seq: bytes[1],
        device_id: [bytes[2], bytes[3], bytes[4], bytes[5]],
        payload: &bytes[HEADER_LEN..HEADER_LEN + len],
    })
}

/// Activation ping: no payload.
pub fn activation_ping(device_id: [u8; 4]) -> Result<FrameBuf, CodecError> {
    encode_frame(OP_PING_ACTIVATION, 0, device_id, &[])
}

/// Transfer ping announcing how many records follow.
pub fn transfer_ping(
    device_id: [u8; 4],
    record_count: u16,
    log_erased: bool,
) -> Result<FrameBuf, CodecError> {
    let flags = if log_erased { FLAG_LOG_ERASED } else { 0 };
    encode_frame(OP_PING_TRANSFER, flags, device_id, &record_count.to_be_bytes())
}

/// Data frame carrying 1..=10 records.
pub fn data_frame(seq: u8, device_id: [u8; 4], records: &[Record]) -> Result<FrameBuf, CodecError> {
    if records.len() > MAX_RECORDS_PER_PACKET {
        return Err(CodecError::TooLarge);
    }
    let mut payload: Vec<u8, MAX_PAYLOAD_LEN> = Vec::new();
    for rec in records {
        payload
            .extend_from_slice(&rec.encode())
            .map_err(|_| CodecError::TooLarge)?;
    }
    encode_frame(OP_DATA, seq, device_id, &payload)
}

/// Acknowledgement of an applied downlink command.
pub fn command_ack(device_id: [u8; 4], command: u8) -> Result<FrameBuf, CodecError> {
    encode_frame(OP_ACK, 0, device_id, &[command])
}

/// Decode the records carried by a data frame's payload.
pub fn decode_records(payload: &[u8]) -> impl Iterator<Item = Result<Record, CodecError>> + '_ {
    payload.chunks_exact(RECORD_SIZE).map(|chunk| {
        let mut raw = [0u8; RECORD_SIZE];
        raw.copy_from_slice(chunk);
        Record::decode(&raw)
    })
}

// ═══════════════════════════════════════════════════════════════
//  Gateway replies
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reply {
    Ack { command_follows: bool },
    Nack,
}

/// Interpret a gateway reply; anything else is treated as silence.
pub fn parse_reply(bytes: &[u8]) -> Option<Reply> {
    match bytes.first()? {
        &OP_ACK => Some(Reply::Ack {
            command_follows: bytes.get(1).is_some_and(|f| f & FLAG_COMMAND_FOLLOWS != 0),
        }),
        &OP_NACK => Some(Reply::Nack),
        _ => None,
    }
}

// ═══════════════════════════════════════════════════════════════
//  Downlink commands
// ═══════════════════════════════════════════════════════════════

fn decode_schedule(p: &[u8]) -> Result<Schedule, CodecError> {
    let schedule = match p[0] {
        0 => Schedule::Periodic {
            interval_5min: u16::from_be_bytes([p[1], p[2]]),
        },
        1 => Schedule::FixedDaily {
            hour: p[1],
            minute: p[2],
        },
        _ => return Err(CodecError::InvalidField("schedule kind")),
    };
    schedule
        .validate()
        .map_err(|_| CodecError::InvalidField("schedule"))?;
    Ok(schedule)
}

fn encode_schedule(schedule: &Schedule, p: &mut [u8]) {
    match *schedule {
        Schedule::Periodic { interval_5min } => {
            p[0] = 0;
            p[1..3].copy_from_slice(&interval_5min.to_be_bytes());
        }
        Schedule::FixedDaily { hour, minute } => {
            p[0] = 1;
            p[1] = hour;
            p[2] = minute;
        }
    }
}

/// Decode an 8-byte downlink frame.  Out-of-range fields make the whole
/// frame malformed.
pub fn decode_downlink(bytes: &[u8]) -> Result<DownlinkCommand, CodecError> {
    if bytes.len() < DOWNLINK_LEN {
        return Err(CodecError::Truncated);
    }
    if bytes[0] != OP_DOWNLINK {
        return Err(CodecError::UnknownOpcode(bytes[0]));
    }
    let p = &bytes[2..DOWNLINK_LEN];

    let cmd = match bytes[1] {
        code::SET_MEASUREMENT_INTERVAL => DownlinkCommand::SetMeasurementInterval(decode_schedule(p)?),
        code::SET_SEND_INTERVAL => DownlinkCommand::SetSendInterval(decode_schedule(p)?),
        code::SET_HIGH_TEMP_THRESHOLD => {
            let tenths = i16::from_be_bytes([p[0], p[1]]);
            DownlinkCommand::SetHighTempThreshold(f32::from(tenths) / 10.0)
        }
        code::SET_RTC => {
            let year = 2000 + u16::from(p[2]);
            if !(MIN_YEAR..=MAX_YEAR).contains(&year) {
                return Err(CodecError::InvalidField("year"));
            }
            let dt = DateTime {
                date: Date::new(p[0], p[1], year),
                time: TimeOfDay::new(p[3], p[4], p[5]),
            };
            dt.validate()
                .map_err(|_| CodecError::InvalidField("date/time"))?;
            DownlinkCommand::SetRtc(dt)
        }
        code::ERASE_FLASH => DownlinkCommand::EraseFlash,
        code::SET_TRANSFER_STRATEGY => DownlinkCommand::SetTransferStrategy(
            TransferStrategy::from_u8(p[0]).ok_or(CodecError::InvalidField("strategy"))?,
        ),
        code::SET_ACTIVATION_MODE => DownlinkCommand::SetActivationMode(p[0]),
        code::SOFT_RESET => DownlinkCommand::SoftReset,
        code::ACTIVATION => DownlinkCommand::Activation([p[0], p[1], p[2], p[3]]),
        other => return Err(CodecError::UnknownCommand(other)),
    };
    Ok(cmd)
}

/// Gateway-side encoding of a downlink command.
pub fn encode_downlink(cmd: &DownlinkCommand) -> [u8; DOWNLINK_LEN] {
    let mut out = [0u8; DOWNLINK_LEN];
    out[0] = OP_DOWNLINK;
    out[1] = cmd.code();
    let p = &mut out[2..];
    match cmd {
        DownlinkCommand::SetMeasurementInterval(s) | DownlinkCommand::SetSendInterval(s) => {
            encode_schedule(s, p);
        }
        DownlinkCommand::SetHighTempThreshold(c) => {
            let tenths = (c * 10.0).round() as i16;
            p[..2].copy_from_slice(&tenths.to_be_bytes());
        }
        DownlinkCommand::SetRtc(dt) => {
            p.copy_from_slice(&[
                dt.date.day,
                dt.date.month,
                dt.date.year.saturating_sub(2000) as u8,
                dt.time.hour,
                dt.time.minute,
                dt.time.second,
            ]);
        }
        DownlinkCommand::SetTransferStrategy(s) => p[0] = *s as u8,
        DownlinkCommand::SetActivationMode(m) => p[0] = *m,
        DownlinkCommand::Activation(id) => p[..4].copy_from_slice(id),
        DownlinkCommand::EraseFlash | DownlinkCommand::SoftReset => {}
    }
    out
}
