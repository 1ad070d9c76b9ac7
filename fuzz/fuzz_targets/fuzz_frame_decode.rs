//! Fuzz target: `codec::decode_frame`
//!
//! Arbitrary bytes must never panic the uplink frame parser, and any frame
//! it accepts must re-encode to the same bytes.
//!
//! cargo fuzz run fuzz_frame_decode

#![no_main]

use libfuzzer_sys::fuzz_target;
use templogger::record::RECORD_SIZE;
use templogger::uplink::codec;

fuzz_target!(|data: &[u8]| {
    let Ok(frame) = codec::decode_frame(data) else {
        return;
    };
    assert!(frame.payload.len() <= codec::MAX_PAYLOAD_LEN, "payload exceeds MAX_PAYLOAD_LEN");

    let again = codec::encode_frame(frame.opcode, frame.seq, frame.device_id, frame.payload)
        .expect("accepted payload must re-encode");
    assert_eq!(&again[..], &data[..again.len()]);

    let records = codec::decode_records(frame.payload).count();
    assert_eq!(records, frame.payload.len() / RECORD_SIZE);
});
