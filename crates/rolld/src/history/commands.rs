//! History actor commands, errors, and events.
//!
//! This module defines the message types for communicating with the `HistoryActor`:
//! - `HistoryCommand`: Commands sent to the actor
//! - `HistoryError`: Errors that can occur during history operations
//! - `HistoryEvent`: Events published by the history log for subscribers
//!
//! All types are designed for async message passing and follow the panic-free policy.

use roll_core::HistoryEntry;
use thiserror::Error;
use tokio::sync::oneshot;

// ============================================================================
// History Commands
// ============================================================================

/// Commands sent to the history actor.
///
/// Each command uses a oneshot channel for the response, enabling
/// request-response patterns in async code without blocking.
///
/// # Usage
///
/// ```ignore
/// let (tx, rx) = oneshot::channel();
/// history_tx.send(HistoryCommand::Snapshot {
///     respond_to: tx,
/// }).await?;
/// let entries = rx.await?;
/// ```
#[derive(Debug)]
pub enum HistoryCommand {
    /// Append a completed roll to the log.
    ///
    /// The entry is boxed to reduce enum size variance. The actor
    /// acknowledges after the entry is stored, so a client that awaits
    /// the response observes its own roll in any later snapshot.
    ///
    /// # Errors
    /// - `HistoryError::ChannelClosed` if the actor has shut down
    Append {
        /// The entry to record (boxed for size optimization)
        entry: Box<HistoryEntry>,
        /// Channel to send the result
        respond_to: oneshot::Sender<Result<(), HistoryError>>,
    },

    /// Get a copy of all recorded entries, oldest first.
    ///
    /// Returns an empty vector if nothing has been rolled yet.
    Snapshot {
        /// Channel to send the results
        respond_to: oneshot::Sender<Vec<HistoryEntry>>,
    },

    /// Discard all recorded entries.
    Clear {
        /// Channel to send the result
        respond_to: oneshot::Sender<Result<(), HistoryError>>,
    },
}

// ============================================================================
// History Errors
// ============================================================================

/// Errors that can occur during history operations.
///
/// Uses `thiserror` for ergonomic error handling and Display implementations.
#[derive(Debug, Clone, Error)]
pub enum HistoryError {
    /// The response channel was closed before receiving a response.
    ///
    /// This typically indicates the actor was shut down.
    #[error("response channel closed")]
    ChannelClosed,
}

// ============================================================================
// History Events
// ============================================================================

/// Events published by the history log to subscribers.
///
/// These events are broadcast to all connected clients
/// via the broadcast channel.
#[derive(Debug, Clone)]
pub enum HistoryEvent {
    /// A roll was appended to the log.
    ///
    /// The entry is boxed to reduce enum size variance.
    Appended {
        /// The recorded entry (boxed for size optimization)
        entry: Box<HistoryEntry>,
    },

    /// The log was emptied.
    Cleared,
}

#[cfg(test)]
mod tests {
    use super::*;
    use roll_core::RollMode;

    #[test]
    fn test_history_error_display() {
        let err = HistoryError::ChannelClosed;
        assert_eq!(err.to_string(), "response channel closed");
    }

    #[test]
    fn test_history_event_variants() {
        // Test that all event types can be created and cloned
        let appended = HistoryEvent::Appended {
            entry: Box::new(HistoryEntry::new(
                "3d6+2",
                RollMode::Normal,
                "3d6+2 = 14 [4,6,2]+2",
            )),
        };
        let _cloned = appended.clone();

        let cleared = HistoryEvent::Cleared;
        let _cloned = cleared.clone();
    }

    #[tokio::test]
    async fn test_command_oneshot_pattern() {
        // Verify the oneshot channel pattern works correctly
        let (tx, rx) = oneshot::channel::<Result<(), HistoryError>>();

        // Simulate actor receiving and responding
        tokio::spawn(async move {
            tx.send(Ok(())).ok();
        });

        // Verify we can receive the response
        let result = rx.await;
        assert!(result.is_ok());
        assert!(result.unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_command_channel_closed_error() {
        // Verify behavior when channel is dropped
        let (tx, rx) = oneshot::channel::<Result<(), HistoryError>>();

        // Drop sender without sending
        drop(tx);

        // Receiver should get an error
        let result = rx.await;
        assert!(result.is_err());
    }
}
