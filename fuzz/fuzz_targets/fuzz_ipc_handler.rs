//! Fuzz target for request dispatch.
//!
//! Every input frame must produce a decodable response frame, and no pool
//! may ever report more bytes allocated than its capacity.

#![no_main]

use std::sync::Arc;

use aqua_core::ipc::{decode_message, IpcHandler, IpcHandlerConfig};
use aqua_core::memory::{AllocationManager, RoutingTable};
use aqua_core::shutdown::ShutdownCoordinator;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let routing = RoutingTable::parse("0:0,1:1,2:0").unwrap();
    let manager = Arc::new(AllocationManager::new(routing));
    let _ = manager.add_pool(0, 1 << 20, "dev0");
    let handler = IpcHandler::new(
        Arc::clone(&manager),
        ShutdownCoordinator::new(),
        IpcHandlerConfig::default(),
    );

    for frame in data.split(|b| *b == b'\n') {
        let response = handler.process(frame);
        assert!(decode_message(&response).is_ok());
    }

    for pool in manager.pools() {
        assert!(pool.allocated <= pool.capacity);
    }
});
