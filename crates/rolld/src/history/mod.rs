//! Shared roll history using Actor pattern.
//!
//! The history actor is the single owner of the roll log. It receives
//! commands via a tokio mpsc channel and maintains the canonical,
//! append-only record of every roll made through the daemon.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌─────────────────┐     ┌──────────────────┐
//! │ Connection task │────▶│  HistoryActor   │────▶│ Broadcast Channel│
//! └─────────────────┘     └─────────────────┘     └──────────────────┘
//!         │                       │                       │
//!         │   HistoryCommand      │   HistoryEvent        │
//!         │   (mpsc channel)      │   (broadcast)         │
//!         ▼                       ▼                       ▼
//!    Append/Snapshot/        VecDeque of            All subscribed
//!    Clear the log           HistoryEntry           clients notified
//! ```
//!
//! # Panic-Free Guarantees
//!
//! All operations in this module follow the panic-free policy:
//! - No `.unwrap()` or `.expect()` in production code
//! - All fallible operations return `Result` or `Option`
//! - Channel operations handle closure gracefully

use tokio::sync::{broadcast, mpsc};

mod actor;
mod commands;
mod handle;

pub use actor::{HistoryActor, MAX_HISTORY_ENTRIES};
pub use commands::{HistoryCommand, HistoryError, HistoryEvent};
pub use handle::HistoryHandle;

/// Channel buffer sizes
const COMMAND_BUFFER: usize = 100;
const EVENT_BUFFER: usize = 100;

/// Spawn the history actor and return a handle for interaction.
///
/// This function:
/// 1. Creates command and event channels
/// 2. Spawns the HistoryActor on a tokio task
/// 3. Returns a HistoryHandle for client use
///
/// # Panics
///
/// This function does NOT panic. All operations are safe.
///
/// # Example
///
/// ```no_run
/// use rolld::history::spawn_history;
///
/// #[tokio::main]
/// async fn main() {
///     let handle = spawn_history();
///
///     // Use handle to interact with the log
///     let entries = handle.snapshot().await;
/// }
/// ```
pub fn spawn_history() -> HistoryHandle {
    // Create channels
    let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_BUFFER);
    let (event_tx, _) = broadcast::channel(EVENT_BUFFER);

    // Create and spawn actor
    let actor = HistoryActor::new(cmd_rx, event_tx.clone());
    tokio::spawn(actor.run());

    // Create handle
    HistoryHandle::new(cmd_tx, event_tx)
}
