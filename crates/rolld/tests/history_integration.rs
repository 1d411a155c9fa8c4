//! Integration tests for the History Actor.
//!
//! These tests verify the history log works correctly as a complete system,
//! testing the spawn_history() function and HistoryHandle interface.
//!
//! Tests CAN use `.unwrap()` and `.expect()` - this is allowed.
//! We test the panic-free behavior of production code through assertions.

use std::time::Duration;

use roll_core::{render_history, HistoryEntry, RollMode, EMPTY_HISTORY_PLACEHOLDER};
use rolld::history::{spawn_history, HistoryEvent};
use tokio::time::timeout;

// ============================================================================
// Test Helpers
// ============================================================================

/// Helper to create a test entry with default values.
fn create_test_entry(prompt: &str, result: &str) -> HistoryEntry {
    HistoryEntry::new(prompt, RollMode::Normal, result)
}

/// Maximum time to wait for a broadcast event.
const EVENT_TIMEOUT: Duration = Duration::from_secs(2);

// ============================================================================
// Basic Lifecycle Tests
// ============================================================================

#[tokio::test]
async fn test_basic_lifecycle() {
    // Spawn history actor
    let handle = spawn_history();

    // Append
    let entry = create_test_entry("3d6+2", "3d6+2 = 14 [4,6,2]+2");
    handle.append(entry).await.expect("append should succeed");

    // Query
    let entries = handle.snapshot().await;
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].prompt, "3d6+2");
    assert_eq!(entries[0].result, "3d6+2 = 14 [4,6,2]+2");
    assert_eq!(entries[0].mode, RollMode::Normal);

    // Handle should still be connected
    assert!(handle.is_connected());
}

#[tokio::test]
async fn test_append_then_snapshot_happens_before() {
    let handle = spawn_history();

    // An awaited append must be visible in the very next snapshot
    for i in 0..10 {
        let entry = create_test_entry("d6", &format!("roll-{i}"));
        handle.append(entry).await.expect("append should succeed");

        let entries = handle.snapshot().await;
        assert_eq!(entries.len(), i + 1);
        assert_eq!(entries[i].result, format!("roll-{i}"));
    }
}

#[tokio::test]
async fn test_clear_then_snapshot_empty() {
    let handle = spawn_history();

    for i in 0..5 {
        let entry = create_test_entry("d20", &format!("roll-{i}"));
        handle.append(entry).await.expect("append should succeed");
    }

    handle.clear().await.expect("clear should succeed");

    let entries = handle.snapshot().await;
    assert!(entries.is_empty());

    // And the rendered form is the placeholder, never an empty string
    assert_eq!(render_history(&entries), EMPTY_HISTORY_PLACEHOLDER);
}

// ============================================================================
// Concurrency Tests
// ============================================================================

#[tokio::test]
async fn test_concurrent_appends_none_lost() {
    let handle = spawn_history();

    // 20 tasks appending concurrently
    let mut join_handles = Vec::new();
    for i in 0..20 {
        let handle = handle.clone();
        join_handles.push(tokio::spawn(async move {
            let entry = create_test_entry("2d6", &format!("concurrent-{i}"));
            handle.append(entry).await
        }));
    }

    for jh in join_handles {
        jh.await.expect("task should finish").expect("append should succeed");
    }

    // Every append must be recorded exactly once
    let entries = handle.snapshot().await;
    assert_eq!(entries.len(), 20);

    let mut results: Vec<String> = entries.iter().map(|e| e.result.clone()).collect();
    results.sort();
    results.dedup();
    assert_eq!(results.len(), 20, "no duplicates, no losses");
}

#[tokio::test]
async fn test_snapshot_order_is_append_order() {
    let handle = spawn_history();

    // Sequential appends from one task establish a known order
    for i in 0..50 {
        let entry = create_test_entry("d4", &format!("ordered-{i:02}"));
        handle.append(entry).await.expect("append should succeed");
    }

    let entries = handle.snapshot().await;
    assert_eq!(entries.len(), 50);
    for (i, entry) in entries.iter().enumerate() {
        assert_eq!(entry.result, format!("ordered-{i:02}"));
    }
}

// ============================================================================
// Event Broadcast Tests
// ============================================================================

#[tokio::test]
async fn test_append_publishes_event() {
    let handle = spawn_history();
    let mut events = handle.subscribe();

    let entry = create_test_entry("d20+3", "d20+3 = 17 [14]+3");
    handle.append(entry).await.expect("append should succeed");

    let event = timeout(EVENT_TIMEOUT, events.recv())
        .await
        .expect("event should arrive")
        .expect("channel should be open");

    match event {
        HistoryEvent::Appended { entry } => {
            assert_eq!(entry.prompt, "d20+3");
            assert_eq!(entry.result, "d20+3 = 17 [14]+3");
        }
        other => panic!("Expected Appended, got {other:?}"),
    }
}

#[tokio::test]
async fn test_clear_publishes_event() {
    let handle = spawn_history();

    let entry = create_test_entry("d8", "d8 = 5 [5]");
    handle.append(entry).await.expect("append should succeed");

    // Subscribe after the append so the first event we see is the clear
    let mut events = handle.subscribe();

    handle.clear().await.expect("clear should succeed");

    let event = timeout(EVENT_TIMEOUT, events.recv())
        .await
        .expect("event should arrive")
        .expect("channel should be open");

    assert!(matches!(event, HistoryEvent::Cleared));
}

#[tokio::test]
async fn test_multiple_subscribers_see_every_event() {
    let handle = spawn_history();

    let mut rx1 = handle.subscribe();
    let mut rx2 = handle.subscribe();

    let entry = create_test_entry("5d6", "5d6 = 18 [3,4,2,5,4]");
    handle.append(entry).await.expect("append should succeed");

    for rx in [&mut rx1, &mut rx2] {
        let event = timeout(EVENT_TIMEOUT, rx.recv())
            .await
            .expect("event should arrive")
            .expect("channel should be open");
        assert!(matches!(event, HistoryEvent::Appended { .. }));
    }
}

// ============================================================================
// Rendering Tests
// ============================================================================

#[tokio::test]
async fn test_rendered_history_is_result_lines() {
    let handle = spawn_history();

    handle
        .append(create_test_entry("d20", "d20 = 11 [11]"))
        .await
        .expect("append should succeed");
    handle
        .append(create_test_entry("3d6", "3d6 = 12 [4,6,2]"))
        .await
        .expect("append should succeed");

    let rendered = render_history(&handle.snapshot().await);
    assert_eq!(rendered, "d20 = 11 [11]\n3d6 = 12 [4,6,2]");
}
