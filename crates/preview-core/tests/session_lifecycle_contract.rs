//! Contract Test: Session Lifecycle
//!
//! This test verifies the background monitoring sessions.
//!
//! Constraints verified:
//! - A gated session makes zero queries and ends as `Gated`
//! - An open session queries at least once within one interval
//! - Check time counts toward the interval; a slow check is followed at once
//! - `cancel()` freezes the query count and wakes a sleeping session
//! - A query already in flight completes after `cancel()`
//! - Dropping the handle does not stop the session
//! - Sessions of one monitor are independent
//!
//! If this test fails, someone has added:
//! - Queries before consulting the gate
//! - Sleeps that ignore cancellation
//! - A full interval of sleep after every check
//! - Shared cancellation state between sessions

mod common;

use common::*;
use preview_core::{MonitorEvent, SessionState};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

fn update_service() -> MockPreviewService {
    MockPreviewService::returning(Some(summary(
        "p1",
        Some("1.2.0"),
        &["B"],
        Some("https://x/preview"),
    )))
}

#[tokio::test]
async fn gated_session_makes_no_queries() {
    let (monitor, service, gate) = monitor_with(Some("A"), update_service(), true, 20);
    let (monitor, mut events) = monitor.with_event_channel(16);

    let delivered = Arc::new(AtomicUsize::new(0));
    let counter = delivered.clone();
    let session = monitor.monitor(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    let state = tokio::time::timeout(Duration::from_secs(5), session.wait())
        .await
        .expect("gated session ends on its own")
        .expect("session task did not panic");

    assert_eq!(state, SessionState::Gated);
    assert_eq!(gate.call_count(), 1, "gate consulted once per activation");
    assert_eq!(service.call_count(), 0, "gated session never queries");
    assert_eq!(delivered.load(Ordering::SeqCst), 0);

    assert_eq!(events.recv().await, Some(MonitorEvent::Started));
    assert_eq!(events.recv().await, Some(MonitorEvent::Gated));
}

#[tokio::test]
async fn open_session_queries_within_one_interval() {
    let (monitor, service, gate) =
        monitor_with(Some("A"), MockPreviewService::returning(None), false, 200);

    let session = monitor.monitor(|_| {});

    assert!(
        wait_until(Duration::from_millis(200), || service.call_count() >= 1).await,
        "first query happens immediately"
    );
    assert_eq!(gate.call_count(), 1);
    assert_eq!(session.state(), SessionState::Running);

    session.cancel();
}

#[tokio::test]
async fn session_repeats_on_its_interval() {
    let (monitor, service, _gate) =
        monitor_with(Some("A"), MockPreviewService::returning(None), false, 20);

    let session = monitor.monitor(|_| {});
    tokio::time::sleep(Duration::from_millis(150)).await;
    session.cancel();

    let calls = service.call_count();
    assert!(calls >= 3, "expected repeated queries, got {calls}");
    assert!(calls <= 12, "queries must respect the interval, got {calls}");
}

fn average(gaps: &[Duration]) -> Duration {
    gaps.iter().sum::<Duration>() / gaps.len() as u32
}

#[tokio::test]
async fn check_time_counts_toward_the_interval() {
    let service = MockPreviewService::returning(None).with_delay(Duration::from_millis(60));
    let (monitor, service, _gate) = monitor_with(Some("A"), service, false, 100);

    let session = monitor.monitor(|_| {});
    assert!(wait_until(Duration::from_secs(3), || service.call_count() >= 7).await);
    session.cancel();

    let gaps = service.start_gaps();
    for gap in &gaps {
        assert!(*gap >= Duration::from_millis(99), "checks started {gap:?} apart");
    }
    // 100 ms per check start, not 60 ms of checking plus a full 100 ms sleep
    let avg = average(&gaps);
    assert!(avg < Duration::from_millis(135), "average gap {avg:?}");
}

#[tokio::test]
async fn slow_check_is_followed_immediately_by_the_next() {
    let service = MockPreviewService::returning(None).with_delay(Duration::from_millis(50));
    let (monitor, service, _gate) = monitor_with(Some("A"), service, false, 40);

    let session = monitor.monitor(|_| {});
    assert!(wait_until(Duration::from_secs(3), || service.call_count() >= 7).await);
    session.cancel();

    let gaps = service.start_gaps();
    for gap in &gaps {
        assert!(*gap >= Duration::from_millis(50), "checks overlapped: {gap:?}");
    }
    // Back to back: no sleep is added after a check longer than the interval
    let avg = average(&gaps);
    assert!(avg < Duration::from_millis(75), "average gap {avg:?}");
}

#[tokio::test]
async fn every_update_is_delivered_once_per_check() {
    let (monitor, service, _gate) = monitor_with(Some("A"), update_service(), false, 20);

    let delivered = Arc::new(AtomicUsize::new(0));
    let counter = delivered.clone();
    let session = monitor.monitor(move |update| {
        assert_eq!(update.id, "p1");
        counter.fetch_add(1, Ordering::SeqCst);
    });

    assert!(wait_until(Duration::from_secs(2), || delivered.load(Ordering::SeqCst) >= 3).await);
    session.cancel();
    let state = session.wait().await.unwrap();
    assert_eq!(state, SessionState::Cancelled);

    // One delivery per successful check, never more
    assert_eq!(delivered.load(Ordering::SeqCst), service.call_count());
}

#[tokio::test]
async fn cancel_freezes_query_count() {
    let (monitor, service, _gate) =
        monitor_with(Some("A"), MockPreviewService::returning(None), false, 10);

    let session = monitor.monitor(|_| {});
    assert!(wait_until(Duration::from_secs(2), || service.call_count() >= 2).await);

    session.cancel();
    assert!(session.is_cancel_requested());
    let state = tokio::time::timeout(Duration::from_secs(5), session.wait())
        .await
        .expect("cancelled session ends")
        .unwrap();
    assert_eq!(state, SessionState::Cancelled);

    let frozen = service.call_count();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(service.call_count(), frozen, "no queries after cancellation");
}

#[tokio::test]
async fn cancel_wakes_a_sleeping_session() {
    // An interval far longer than the test: only cancel() can end the sleep
    let (monitor, service, _gate) =
        monitor_with(Some("A"), MockPreviewService::returning(None), false, 3_600_000);

    let session = monitor.monitor(|_| {});
    assert!(wait_until(Duration::from_secs(2), || service.call_count() == 1).await);

    session.cancel();
    let state = tokio::time::timeout(Duration::from_secs(1), session.wait())
        .await
        .expect("sleep interrupted by cancel")
        .unwrap();

    assert_eq!(state, SessionState::Cancelled);
    assert_eq!(service.call_count(), 1);
}

#[tokio::test]
async fn in_flight_query_completes_after_cancel() {
    let service = update_service().with_delay(Duration::from_millis(100));
    let (monitor, service, _gate) = monitor_with(Some("A"), service, false, 10);

    let delivered = Arc::new(AtomicUsize::new(0));
    let counter = delivered.clone();
    let session = monitor.monitor(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    assert!(wait_until(Duration::from_secs(2), || service.call_count() == 1).await);
    session.cancel();
    session.wait().await.unwrap();

    // The query in flight was not aborted; its update was still delivered
    assert_eq!(service.call_count(), 1);
    assert_eq!(delivered.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn cancel_is_idempotent() {
    let (monitor, _service, _gate) =
        monitor_with(Some("A"), MockPreviewService::returning(None), false, 10);

    let session = monitor.monitor(|_| {});
    session.cancel();
    session.cancel();
    assert_eq!(session.wait().await.unwrap(), SessionState::Cancelled);
}

#[tokio::test]
async fn dropping_the_handle_does_not_cancel() {
    let (monitor, service, _gate) =
        monitor_with(Some("A"), MockPreviewService::returning(None), false, 10);

    drop(monitor.monitor(|_| {}));

    assert!(
        wait_until(Duration::from_secs(2), || service.call_count() >= 3).await,
        "detached session keeps running"
    );
}

#[tokio::test]
async fn sessions_are_independent() {
    let (monitor, service, gate) =
        monitor_with(Some("A"), MockPreviewService::returning(None), false, 10);

    let first = monitor.monitor(|_| {});
    let second = monitor.monitor(|_| {});
    assert!(wait_until(Duration::from_secs(2), || service.call_count() >= 4).await);
    assert_eq!(gate.call_count(), 2, "each session consults the gate");

    first.cancel();
    assert_eq!(first.wait().await.unwrap(), SessionState::Cancelled);

    let after_first = service.call_count();
    assert!(
        wait_until(Duration::from_secs(2), || service.call_count() >= after_first + 2).await,
        "second session keeps querying"
    );
    assert_eq!(second.state(), SessionState::Running);
    assert!(!second.is_finished());

    second.cancel();
    assert_eq!(second.wait().await.unwrap(), SessionState::Cancelled);
}

#[tokio::test]
async fn events_follow_session_progress() {
    let (monitor, _service, _gate) = monitor_with(Some("A"), update_service(), false, 3_600_000);
    let (monitor, mut events) = monitor.with_event_channel(16);

    let session = monitor.monitor(|_| {});
    assert_eq!(events.recv().await, Some(MonitorEvent::Started));
    assert_eq!(
        events.recv().await,
        Some(MonitorEvent::CheckSucceeded { update: true })
    );

    session.cancel();
    session.wait().await.unwrap();
    assert_eq!(events.recv().await, Some(MonitorEvent::Stopped));
}
