//! Fuzz target for IPC JSON message decoding.
//!
//! Arbitrary byte sequences must decode to Ok or Err, never panic.

#![no_main]

use aqua_core::ipc::decode_message;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let _ = decode_message(data);
});
