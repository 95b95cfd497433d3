//! Fuzz target for fio terse v3 line decoding.
//!
//! Tests that `decode_line` handles arbitrary input without panicking.

#![no_main]

use fiox_core::decode::decode_line;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    // The decoder must never panic, only report a field-count mismatch
    let _ = decode_line(data);
});
