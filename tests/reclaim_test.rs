//! Integration tests for cooperative reclaim.

use aqua_core::memory::{AllocateOutcome, AllocationId, AllocationManager, RequesterId, RoutingTable};

fn setup() -> AllocationManager {
    let manager = AllocationManager::new(RoutingTable::parse("0:0,1:1").unwrap());
    manager.add_pool(0, 1000, "dev0").unwrap();
    manager.add_pool(1, 1000, "dev1").unwrap();
    manager
}

fn grant(manager: &AllocationManager, size: u64, requester: i64) -> AllocationId {
    match manager.allocate(size, RequesterId(requester)).unwrap() {
        AllocateOutcome::Granted(allocation) => allocation.allocation_id,
        other => panic!("expected a grant, got {:?}", other),
    }
}

#[test]
fn test_request_is_idempotent() {
    let manager = setup();
    assert!(manager.request_reclaim(0));
    assert!(manager.request_reclaim(0));
    assert_eq!(manager.reclaiming(), vec![0]);
}

#[test]
fn test_request_for_unknown_pool_is_accepted() {
    let manager = setup();
    assert!(manager.request_reclaim(42));
    assert!(manager.is_reclaiming(42));
}

#[test]
fn test_cancel_unmarked_pool_is_noop() {
    let manager = setup();
    manager.cancel_reclaim(0);
    assert!(manager.reclaiming().is_empty());
}

#[test]
fn test_blocked_pool_does_not_block_others() {
    let manager = setup();
    manager.request_reclaim(0);

    assert_eq!(
        manager.allocate(1, RequesterId(0)).unwrap(),
        AllocateOutcome::ReclaimBlocked(0)
    );
    grant(&manager, 1, 1);
}

#[test]
fn test_reclaim_does_not_evict_existing_allocations() {
    let manager = setup();
    let id = grant(&manager, 250, 0);
    manager.request_reclaim(0);

    assert!(manager.allocation(&id).is_some());
    let status = manager.reclaim_status(0).unwrap();
    assert_eq!(status.capacity, 1000);
    assert_eq!(status.available, 750);
    assert!(!status.can_reclaim);

    assert!(manager.free(&id).unwrap());
    assert!(manager.reclaim_status(0).unwrap().can_reclaim);
}

#[test]
fn test_can_reclaim_iff_fully_available() {
    let manager = setup();
    assert!(manager.reclaim_status(0).unwrap().can_reclaim);

    let id = grant(&manager, 1, 0);
    assert!(!manager.reclaim_status(0).unwrap().can_reclaim);
    manager.free(&id).unwrap();
    assert!(manager.reclaim_status(0).unwrap().can_reclaim);

    // Empty pools are trivially reclaimable.
    manager.add_pool(5, 0, "dev5").unwrap();
    assert!(manager.reclaim_status(5).unwrap().can_reclaim);
}

#[test]
fn test_responsive_returns_exact_subset() {
    let manager = setup();
    let on_zero: Vec<_> = (0..3).map(|_| grant(&manager, 10, 0)).collect();
    let on_one: Vec<_> = (0..3).map(|_| grant(&manager, 10, 1)).collect();
    let unknown = AllocationId::new();

    manager.request_reclaim(1);

    let query = vec![on_zero[0], on_one[0], unknown, on_zero[1], on_one[2], on_one[1]];
    let responsive = manager.responsive_reclaim(&query);
    assert_eq!(responsive, vec![on_one[0], on_one[2], on_one[1]]);

    manager.cancel_reclaim(1);
    assert!(manager.responsive_reclaim(&query).is_empty());

    manager.request_reclaim(0);
    manager.request_reclaim(1);
    assert_eq!(manager.responsive_reclaim(&query).len(), 5);
}

#[test]
fn test_responsive_skips_freed_allocations() {
    let manager = setup();
    let a = grant(&manager, 10, 0);
    let b = grant(&manager, 10, 0);
    manager.request_reclaim(0);
    manager.free(&a).unwrap();

    assert_eq!(manager.responsive_reclaim(&[a, b]), vec![b]);
}

#[test]
fn test_drain_then_release_cycle() {
    let manager = setup();
    let ids: Vec<_> = (0..4).map(|_| grant(&manager, 100, 0)).collect();

    manager.request_reclaim(0);
    let to_drain = manager.responsive_reclaim(&ids);
    assert_eq!(to_drain.len(), 4);

    for id in &to_drain {
        assert!(manager.free(id).unwrap());
    }
    assert!(manager.reclaim_status(0).unwrap().can_reclaim);

    assert!(manager.delete_pool(0));
    manager.cancel_reclaim(0);
    assert!(manager.reclaiming().is_empty());
    assert!(manager.reclaim_status(0).is_err());
}
