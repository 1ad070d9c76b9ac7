//! Fuzz target: `Record::decode`
//!
//! Flash contents are untrusted after a brown-out.  A record that passes
//! its timestamp CRC must encode back to identical bytes.
//!
//! cargo fuzz run fuzz_record_decode

#![no_main]

use libfuzzer_sys::fuzz_target;
use templogger::record::{RECORD_SIZE, Record};

fuzz_target!(|data: [u8; RECORD_SIZE]| {
    if let Ok(record) = Record::decode(&data) {
        assert_eq!(record.encode(), data);
    }
});
