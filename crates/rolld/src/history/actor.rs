//! History actor - owns the roll log and processes commands.
//!
//! The HistoryActor is the single owner of roll history in the system.
//! It receives commands via an mpsc channel and publishes events via broadcast.
//!
//! # Panic-Free Guarantees
//!
//! This module follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - All fallible operations use `?`, pattern matching, or `unwrap_or`
//! - Channel send failures are logged but don't panic

use std::collections::VecDeque;

use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info};

use roll_core::HistoryEntry;

use super::commands::{HistoryCommand, HistoryError, HistoryEvent};

// ============================================================================
// Resource Limits
// ============================================================================

/// Maximum number of entries the log retains. When full, the oldest
/// entry is evicted to make room for the new one.
pub const MAX_HISTORY_ENTRIES: usize = 1000;

// ============================================================================
// History Actor
// ============================================================================

/// The history actor - owns the roll log.
///
/// Implements the actor pattern: receives commands via mpsc channel,
/// processes them sequentially, and publishes events to subscribers.
///
/// # Ordering
///
/// Because all mutations flow through a single command channel and the
/// actor processes them one at a time, every client observes the log in
/// one consistent append order. A client that awaits its `Append`
/// acknowledgement is guaranteed to see that roll in any `Snapshot`
/// it requests afterwards.
pub struct HistoryActor {
    /// Command receiver
    receiver: mpsc::Receiver<HistoryCommand>,

    /// The log itself, oldest entry at the front.
    /// VecDeque so eviction at capacity is O(1).
    entries: VecDeque<HistoryEntry>,

    /// Event publisher for real-time updates to subscribed clients
    event_publisher: broadcast::Sender<HistoryEvent>,
}

impl HistoryActor {
    /// Creates a new history actor.
    ///
    /// # Arguments
    ///
    /// * `receiver` - Channel for receiving commands
    /// * `event_publisher` - Broadcast channel for publishing events
    pub fn new(
        receiver: mpsc::Receiver<HistoryCommand>,
        event_publisher: broadcast::Sender<HistoryEvent>,
    ) -> Self {
        Self {
            receiver,
            entries: VecDeque::new(),
            event_publisher,
        }
    }

    /// Runs the actor event loop.
    ///
    /// Processes commands until the channel closes (all senders dropped).
    /// This is the main entry point - call this in a spawned task.
    pub async fn run(mut self) {
        info!("History actor starting");

        while let Some(cmd) = self.receiver.recv().await {
            self.handle_command(cmd);
        }

        info!("History actor stopped (entries: {})", self.entries.len());
    }

    /// Dispatches a command to the appropriate handler.
    fn handle_command(&mut self, cmd: HistoryCommand) {
        match cmd {
            HistoryCommand::Append { entry, respond_to } => {
                let result = self.handle_append(*entry);
                // Ignore send error - client may have dropped the receiver
                let _ = respond_to.send(result);
            }
            HistoryCommand::Snapshot { respond_to } => {
                let result = self.handle_snapshot();
                let _ = respond_to.send(result);
            }
            HistoryCommand::Clear { respond_to } => {
                let result = self.handle_clear();
                let _ = respond_to.send(result);
            }
        }
    }

    // ========================================================================
    // Command Handlers
    // ========================================================================

    /// Handles appending a roll to the log.
    ///
    /// The entry is stored before the event is published, so subscribers
    /// that request a snapshot after seeing the event always find it.
    fn handle_append(&mut self, entry: HistoryEntry) -> Result<(), HistoryError> {
        // Evict the oldest entry at capacity
        if self.entries.len() >= MAX_HISTORY_ENTRIES {
            let evicted = self.entries.pop_front();
            if let Some(old) = evicted {
                debug!(
                    prompt = %old.prompt,
                    "History at capacity, evicting oldest entry"
                );
            }
        }

        debug!(
            prompt = %entry.prompt,
            mode = %entry.mode,
            result = %entry.result,
            total_entries = self.entries.len() + 1,
            "Roll recorded"
        );

        self.entries.push_back(entry.clone());

        // Publish event (ignore if no subscribers)
        let _ = self.event_publisher.send(HistoryEvent::Appended {
            entry: Box::new(entry),
        });

        Ok(())
    }

    /// Handles a snapshot request: copies out all entries, oldest first.
    fn handle_snapshot(&self) -> Vec<HistoryEntry> {
        self.entries.iter().cloned().collect()
    }

    /// Handles clearing the log.
    fn handle_clear(&mut self) -> Result<(), HistoryError> {
        let discarded = self.entries.len();
        self.entries.clear();

        info!(discarded = discarded, "History cleared");

        // Publish event (ignore if no subscribers)
        let _ = self.event_publisher.send(HistoryEvent::Cleared);

        Ok(())
    }

    // ========================================================================
    // Accessors (for testing)
    // ========================================================================

    /// Returns the number of entries currently recorded.
    #[cfg(test)]
    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }
}
