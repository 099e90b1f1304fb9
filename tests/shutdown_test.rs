//! Tests for graceful shutdown coordination.

use std::time::Duration;

use aqua_core::shutdown::{ShutdownCoordinator, ShutdownResult, ShutdownState};

#[test]
fn test_initial_state_is_running() {
    let coordinator = ShutdownCoordinator::new();
    assert_eq!(coordinator.state(), ShutdownState::Running);
    assert!(coordinator.is_accepting());
}

#[test]
fn test_multiple_guards_track_correctly() {
    let coordinator = ShutdownCoordinator::new();

    let g1 = coordinator.track();
    let g2 = coordinator.track();
    let g3 = coordinator.track();
    assert_eq!(coordinator.in_flight_count(), 3);

    drop(g1);
    assert_eq!(coordinator.in_flight_count(), 2);

    drop(g2);
    drop(g3);
    assert_eq!(coordinator.in_flight_count(), 0);
}

#[test]
fn test_clones_share_state() {
    let coordinator = ShutdownCoordinator::new();
    let clone = coordinator.clone();

    let _guard = clone.track().unwrap();
    assert_eq!(coordinator.in_flight_count(), 1);
}

#[tokio::test]
async fn test_track_returns_none_while_draining() {
    let coordinator = ShutdownCoordinator::new();
    let guard = coordinator.track().unwrap();

    let draining = coordinator.clone();
    let handle = tokio::spawn(async move { draining.initiate(Duration::from_millis(500)).await });

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(coordinator.state(), ShutdownState::Draining);
    assert!(!coordinator.is_accepting());
    assert!(coordinator.track().is_none());
    // A refused track does not leak a count.
    assert_eq!(coordinator.in_flight_count(), 1);

    drop(guard);
    assert_eq!(handle.await.unwrap(), ShutdownResult::Complete);
}

#[tokio::test]
async fn test_drain_completes_when_zero_requests() {
    let coordinator = ShutdownCoordinator::new();
    let result = coordinator.initiate(Duration::from_millis(100)).await;
    assert_eq!(result, ShutdownResult::Complete);
}

#[tokio::test]
async fn test_drain_timeout_returns_remaining() {
    let coordinator = ShutdownCoordinator::new();
    let _g1 = coordinator.track().unwrap();
    let _g2 = coordinator.track().unwrap();

    let result = coordinator.initiate(Duration::from_millis(50)).await;
    assert_eq!(result, ShutdownResult::Timeout { remaining: 2 });
}

#[tokio::test]
async fn test_state_is_stopped_after_drain() {
    let coordinator = ShutdownCoordinator::new();
    let _ = coordinator.initiate(Duration::from_millis(50)).await;
    assert_eq!(coordinator.state(), ShutdownState::Stopped);
    assert!(coordinator.track().is_none());
}
