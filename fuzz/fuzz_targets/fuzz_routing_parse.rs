//! Fuzz target for routing table parsing.
//!
//! Parsing must never panic, and a parsed table never routes the unmapped
//! sentinel.

#![no_main]

use aqua_core::memory::{RequesterId, RoutingTable};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(spec) = std::str::from_utf8(data) {
        if let Ok(table) = RoutingTable::parse(spec) {
            assert!(table.resolve(RequesterId::UNMAPPED).is_err());
            assert!(table.len() <= spec.split(',').count());
        }
    }
});
