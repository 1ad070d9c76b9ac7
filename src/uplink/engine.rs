//! Uplink protocol engine: ping/ACK handshake, downlink reception and
//! retried data packets over a [`Radio`].
//!
//! Every wait is bounded.  Silence is retried after a random backoff in
//! `0..=max_backoff_ms`; a NACK is retried after a short fixed pause.
//! Exhausting the attempts is reported, never retried further here.

use embedded_hal::delay::DelayNs;
use log::{debug, info, warn};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use super::codec::{self, Reply};
use super::transport::{Radio, RadioMode};
use crate::app::commands::DownlinkCommand;
use crate::config::Profile;
use crate::error::{RadioError, Result};
use crate::record::Record;

/// Largest reply the engine listens for.
const REPLY_BUF_LEN: usize = 16;

/// Link timing copied out of the [`Profile`].
#[derive(Debug, Clone, Copy)]
struct LinkTiming {
    ack_timeout_ms: u32,
    cmd_timeout_ms: u32,
    tx_timeout_ms: u32,
    max_backoff_ms: u32,
    nack_retry_delay_ms: u32,
    packet_retries: u8,
    command_ack_repeats: u8,
    command_ack_gap_ms: u32,
}

/// Result of a successful ping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Handshake {
    /// The gateway announced a downlink command.
    pub command_follows: bool,
}

pub struct UplinkEngine {
    timing: LinkTiming,
    rng: SmallRng,
    seq: u8,
}

impl UplinkEngine {
    pub fn new(profile: &Profile) -> Self {
        Self {
            timing: LinkTiming {
                ack_timeout_ms: profile.ack_timeout_ms,
                cmd_timeout_ms: profile.cmd_timeout_ms,
                tx_timeout_ms: profile.tx_timeout_ms,
                max_backoff_ms: profile.max_backoff_ms,
                nack_retry_delay_ms: profile.nack_retry_delay_ms,
                packet_retries: profile.packet_retries.max(1),
                command_ack_repeats: profile.command_ack_repeats,
                command_ack_gap_ms: profile.command_ack_gap_ms,
            },
            rng: SmallRng::seed_from_u64(profile.rng_seed),
            seq: 0,
        }
    }

    /// Sequence number the next data packet will carry.
    pub fn next_seq(&self) -> u8 {
        self.seq
    }

    // ── Session ───────────────────────────────────────────────

    /// Power up the transceiver for an exchange, trimmed by the device's
    /// stored carrier offset.
    pub fn open(&mut self, radio: &mut impl Radio, frequency_offset: i16) -> Result<()> {
        radio.radio_open()?;
        radio.set_frequency_offset(frequency_offset)?;
        radio.set_radio_mode(RadioMode::Standby)?;
        Ok(())
    }

    /// Put the transceiver back to sleep.
    pub fn close(&mut self, radio: &mut impl Radio) {
        if let Err(e) = radio.set_radio_mode(RadioMode::Sleep) {
            debug!("UPLINK: sleep mode failed: {}", e);
        }
        radio.radio_close();
    }

    // ── Handshake ─────────────────────────────────────────────

    /// Activation ping, up to `attempts` times.
    pub fn ping_activation<H: Radio + DelayNs>(
        &mut self,
        hw: &mut H,
        device_id: [u8; 4],
        attempts: u8,
    ) -> Result<Handshake> {
        let frame = codec::activation_ping(device_id)?;
        self.ping(hw, &frame, attempts)
    }

    /// Transfer ping announcing `record_count` records.
    pub fn ping_transfer<H: Radio + DelayNs>(
        &mut self,
        hw: &mut H,
        device_id: [u8; 4],
        record_count: u16,
        log_erased: bool,
        attempts: u8,
    ) -> Result<Handshake> {
        let frame = codec::transfer_ping(device_id, record_count, log_erased)?;
        self.ping(hw, &frame, attempts)
    }

    fn ping<H: Radio + DelayNs>(&mut self, hw: &mut H, frame: &[u8], attempts: u8) -> Result<Handshake> {
        let attempts = attempts.max(1);
        let mut last = RadioError::NoResponse;

        for attempt in 1..=attempts {
            match self.exchange(hw, frame) {
                Ok(Some(Reply::Ack { command_follows })) => {
                    info!(
                        "UPLINK: ping ACK on attempt {}/{} (command_follows={})",
                        attempt, attempts, command_follows
                    );
                    return Ok(Handshake { command_follows });
                }
                Ok(Some(Reply::Nack)) => {
                    debug!("UPLINK: ping NACK ({}/{})", attempt, attempts);
                    last = RadioError::Rejected;
                    if attempt < attempts {
                        hw.delay_ms(self.timing.nack_retry_delay_ms);
                    }
                    continue;
                }
                Ok(None) => {
                    debug!("UPLINK: ping unanswered ({}/{})", attempt, attempts);
                    last = RadioError::NoResponse;
                }
                Err(e) => {
                    warn!("UPLINK: ping transmit failed: {}", e);
                    last = e;
                }
            }
            if attempt < attempts {
                self.backoff(hw);
            }
        }

        warn!("UPLINK: ping gave up after {} attempts: {}", attempts, last);
        Err(last.into())
    }

    // ── Downlink ──────────────────────────────────────────────

    /// Listen once for a downlink command frame.
    pub fn await_command(&mut self, radio: &mut impl Radio) -> Result<DownlinkCommand> {
        radio.set_radio_mode(RadioMode::Receive)?;
        let mut buf = [0u8; REPLY_BUF_LEN];
        let n = radio.radio_receive(&mut buf, self.timing.cmd_timeout_ms)?;
        if n == 0 {
            debug!("UPLINK: no downlink within {} ms", self.timing.cmd_timeout_ms);
            return Err(RadioError::NoResponse.into());
        }
        match codec::decode_downlink(&buf[..n.min(buf.len())]) {
            Ok(cmd) => {
                info!("UPLINK: downlink command 0x{:02X}", cmd.code());
                Ok(cmd)
            }
            Err(e) => {
                warn!("UPLINK: malformed downlink discarded: {}", e);
                Err(e.into())
            }
        }
    }

    /// Acknowledge an applied command, `command_ack_repeats` times.
    pub fn acknowledge_command<H: Radio + DelayNs>(
        &mut self,
        hw: &mut H,
        device_id: [u8; 4],
        command: u8,
    ) -> Result<()> {
        let frame = codec::command_ack(device_id, command)?;
        let repeats = self.timing.command_ack_repeats.max(1);
        for i in 0..repeats {
            hw.set_radio_mode(RadioMode::Transmit)?;
            hw.radio_send(&frame, self.timing.tx_timeout_ms)?;
            if i + 1 < repeats {
                hw.delay_ms(self.timing.command_ack_gap_ms);
            }
        }
        Ok(())
    }

    // ── Data ──────────────────────────────────────────────────

    /// Send one data packet with bounded retries.  Returns whether the
    /// gateway acknowledged it.  The sequence number advances either way.
    pub fn send_records<H: Radio + DelayNs>(
        &mut self,
        hw: &mut H,
        device_id: [u8; 4],
        records: &[Record],
    ) -> bool {
        let seq = self.seq;
        self.seq = self.seq.wrapping_add(1);

        let frame = match codec::data_frame(seq, device_id, records) {
            Ok(f) => f,
            Err(e) => {
                warn!("UPLINK: cannot frame {} records: {}", records.len(), e);
                return false;
            }
        };

        let attempts = self.timing.packet_retries;
        for attempt in 1..=attempts {
            match self.exchange(hw, &frame) {
                Ok(Some(Reply::Ack { .. })) => return true,
                Ok(Some(Reply::Nack)) => debug!("UPLINK: seq {} NACK ({}/{})", seq, attempt, attempts),
                Ok(None) => debug!("UPLINK: seq {} unanswered ({}/{})", seq, attempt, attempts),
                Err(e) => warn!("UPLINK: seq {} transmit failed: {}", seq, e),
            }
            if attempt < attempts {
                self.backoff(hw);
            }
        }
        warn!("UPLINK: seq {} dropped after {} attempts", seq, attempts);
        false
    }

    // ── Internal ──────────────────────────────────────────────

    /// Transmit `frame`, then listen for a reply.
    fn exchange(&mut self, radio: &mut impl Radio, frame: &[u8]) -> core::result::Result<Option<Reply>, RadioError> {
        radio.set_radio_mode(RadioMode::Transmit)?;
        radio.radio_send(frame, self.timing.tx_timeout_ms)?;
        radio.set_radio_mode(RadioMode::Receive)?;
        let mut buf = [0u8; REPLY_BUF_LEN];
        let n = radio.radio_receive(&mut buf, self.timing.ack_timeout_ms)?;
        Ok(codec::parse_reply(&buf[..n.min(buf.len())]))
    }

    fn backoff(&mut self, delay: &mut impl DelayNs) {
        let ms = self.rng.gen_range(0..=self.timing.max_backoff_ms);
        delay.delay_ms(ms);
    }
}
