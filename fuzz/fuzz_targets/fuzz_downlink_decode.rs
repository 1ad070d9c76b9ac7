//! Fuzz target: `codec::decode_downlink`
//!
//! Gateway commands arrive over the air unauthenticated; decoding must be
//! total, and every accepted command must survive an encode/decode pass.
//!
//! cargo fuzz run fuzz_downlink_decode

#![no_main]

use libfuzzer_sys::fuzz_target;
use templogger::uplink::codec;

fuzz_target!(|data: &[u8]| {
    if let Ok(cmd) = codec::decode_downlink(data) {
        let encoded = codec::encode_downlink(&cmd);
        assert_eq!(codec::decode_downlink(&encoded), Ok(cmd));
    }
});
