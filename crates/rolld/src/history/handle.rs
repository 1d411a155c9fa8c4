//! Client interface for interacting with the HistoryActor.
//!
//! The `HistoryHandle` provides a cheap-to-clone interface for sending commands
//! to the history actor and subscribing to log events.
//!
//! # Panic-Free Guarantees
//!
//! This module follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - All fallible operations use `?`, pattern matching, or `unwrap_or`
//! - Channel errors are mapped to `HistoryError::ChannelClosed`

use tokio::sync::{broadcast, mpsc, oneshot};

use roll_core::HistoryEntry;

use super::commands::{HistoryCommand, HistoryError, HistoryEvent};

// ============================================================================
// History Handle
// ============================================================================

/// Handle for interacting with the history actor.
///
/// This is a cheap-to-clone handle that can be shared across tasks.
/// All methods are async and communicate with the actor via channels.
///
/// # Usage
///
/// ```ignore
/// // Clone the handle to share across tasks
/// let handle = history_handle.clone();
///
/// // Record a roll
/// handle.append(entry).await?;
///
/// // Read the log
/// let entries = handle.snapshot().await;
///
/// // Subscribe to events
/// let mut rx = handle.subscribe();
/// while let Ok(event) = rx.recv().await {
///     // Handle event
/// }
/// ```
#[derive(Clone)]
pub struct HistoryHandle {
    /// Command sender to the actor
    sender: mpsc::Sender<HistoryCommand>,

    /// Event broadcaster for subscribing to updates
    event_sender: broadcast::Sender<HistoryEvent>,
}

impl HistoryHandle {
    /// Create a new history handle.
    ///
    /// # Arguments
    ///
    /// * `sender` - The command channel sender for communicating with the actor
    /// * `event_sender` - The broadcast sender for subscribing to events
    pub fn new(
        sender: mpsc::Sender<HistoryCommand>,
        event_sender: broadcast::Sender<HistoryEvent>,
    ) -> Self {
        Self {
            sender,
            event_sender,
        }
    }

    /// Record a completed roll in the log.
    ///
    /// Resolves only after the actor has stored the entry, so a caller
    /// that awaits this before replying to its client guarantees the
    /// roll is visible in any subsequent snapshot.
    ///
    /// # Errors
    ///
    /// - `HistoryError::ChannelClosed` if the actor has shut down
    pub async fn append(&self, entry: HistoryEntry) -> Result<(), HistoryError> {
        let (tx, rx) = oneshot::channel();

        self.sender
            .send(HistoryCommand::Append {
                entry: Box::new(entry),
                respond_to: tx,
            })
            .await
            .map_err(|_| HistoryError::ChannelClosed)?;

        rx.await.map_err(|_| HistoryError::ChannelClosed)?
    }

    /// Get a copy of all recorded entries, oldest first.
    ///
    /// Returns an empty vector if nothing has been rolled yet or if
    /// communication with the actor fails.
    pub async fn snapshot(&self) -> Vec<HistoryEntry> {
        let (tx, rx) = oneshot::channel();

        if self
            .sender
            .send(HistoryCommand::Snapshot { respond_to: tx })
            .await
            .is_err()
        {
            return Vec::new();
        }

        rx.await.unwrap_or_default()
    }

    /// Discard all recorded entries.
    ///
    /// # Errors
    ///
    /// - `HistoryError::ChannelClosed` if the actor has shut down
    pub async fn clear(&self) -> Result<(), HistoryError> {
        let (tx, rx) = oneshot::channel();

        self.sender
            .send(HistoryCommand::Clear { respond_to: tx })
            .await
            .map_err(|_| HistoryError::ChannelClosed)?;

        rx.await.map_err(|_| HistoryError::ChannelClosed)?
    }

    /// Subscribe to history events.
    ///
    /// Returns a broadcast receiver that will receive all log events
    /// (appends, clears) published by the history actor.
    ///
    /// This is a synchronous operation - it doesn't communicate with the actor.
    pub fn subscribe(&self) -> broadcast::Receiver<HistoryEvent> {
        self.event_sender.subscribe()
    }

    /// Check if the actor is still running.
    ///
    /// Returns `true` if the command channel is still open.
    pub fn is_connected(&self) -> bool {
        !self.sender.is_closed()
    }
}
