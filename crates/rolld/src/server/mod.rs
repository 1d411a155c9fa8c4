//! TCP socket server for the roll daemon.
//!
//! The server:
//! - Listens on a TCP socket for client connections
//! - Spawns a ConnectionHandler for each client
//! - Manages subscriptions and broadcasts roll results
//! - Supports graceful shutdown via CancellationToken
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │   RollServer    │
//! │                 │
//! │   TcpListener   │
//! └───────┬─────────┘
//!         │ accept()
//!         ▼
//! ┌─────────────────┐     ┌─────────────────┐
//! │ConnectionHandler│────▶│  HistoryHandle  │
//! │   (per client)  │     │                 │
//! └─────────────────┘     └─────────────────┘
//!         │
//!         │ broadcast
//!         ▼
//! ┌─────────────────┐
//! │    Clients      │
//! │  (subscribers)  │
//! └─────────────────┘
//! ```
//!
//! # Panic-Free Guarantees
//!
//! This module follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - All fallible operations use `?`, pattern matching, or `unwrap_or`
//! - Server errors are logged and allow continued operation

mod connection;

pub use connection::{
    ConnectionError, ConnectionHandler, Subscriber, SubscriberWriter, SubscribersMap,
};

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::{broadcast, RwLock};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use roll_core::EMPTY_HISTORY_PLACEHOLDER;
use roll_protocol::DaemonMessage;

use crate::history::{HistoryEvent, HistoryHandle};

/// Default listen address
pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:7654";

/// TCP socket server for the roll daemon.
///
/// Manages client connections and roll result broadcasting.
pub struct RollServer {
    /// The bound TCP listener
    listener: TcpListener,

    /// Handle to the history actor
    history: HistoryHandle,

    /// Cancellation token for graceful shutdown
    cancel_token: CancellationToken,

    /// Connection counter for generating client IDs
    connection_counter: AtomicU64,

    /// Active subscribers (keyed by client_id)
    subscribers: SubscribersMap,
}

impl RollServer {
    /// Binds the server to the given address.
    ///
    /// Binding happens here rather than in `run()` so callers can bind
    /// to port 0 and read the assigned port via [`local_addr`](Self::local_addr)
    /// before accepting traffic.
    ///
    /// # Arguments
    ///
    /// * `addr` - Address to listen on, e.g. "127.0.0.1:7654"
    /// * `history` - Handle to the history actor
    /// * `cancel_token` - Token for graceful shutdown
    pub async fn bind(
        addr: &str,
        history: HistoryHandle,
        cancel_token: CancellationToken,
    ) -> Result<Self, ServerError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::SocketSetup {
                addr: addr.to_string(),
                error: e.to_string(),
            })?;

        Ok(Self {
            listener,
            history,
            cancel_token,
            connection_counter: AtomicU64::new(0),
            subscribers: Arc::new(RwLock::new(HashMap::new())),
        })
    }

    /// Returns the address the server is listening on.
    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        self.listener
            .local_addr()
            .map_err(|e| ServerError::SocketSetup {
                addr: "unknown".to_string(),
                error: e.to_string(),
            })
    }

    /// Runs the server.
    ///
    /// Listens for connections until the cancellation token is triggered.
    /// This method does not return until shutdown.
    pub async fn run(&self) -> Result<(), ServerError> {
        if let Ok(addr) = self.local_addr() {
            info!(addr = %addr, "Roll server listening");
        }

        // Spawn broadcaster for history events
        self.spawn_event_broadcaster();

        // Accept connections until cancelled
        loop {
            tokio::select! {
                // Check for cancellation
                _ = self.cancel_token.cancelled() => {
                    info!("Server shutdown requested");
                    break;
                }

                // Accept new connection
                result = self.listener.accept() => {
                    match result {
                        Ok((stream, _addr)) => {
                            let conn_num = self.connection_counter.fetch_add(1, Ordering::Relaxed);
                            self.handle_connection(stream, conn_num);
                        }
                        Err(e) => {
                            error!(error = %e, "Failed to accept connection");
                            // Continue accepting other connections
                        }
                    }
                }
            }
        }

        // Cleanup
        self.cleanup().await;
        Ok(())
    }

    /// Handles a new client connection by spawning a handler task.
    fn handle_connection(&self, stream: tokio::net::TcpStream, connection_number: u64) {
        let (reader, writer) = stream.into_split();
        let history = self.history.clone();
        let subscribers = Arc::clone(&self.subscribers);

        tokio::spawn(async move {
            let handler = ConnectionHandler::new(
                reader,
                writer,
                history,
                Arc::clone(&subscribers),
                connection_number,
            );

            // Run the handler and get the client_id when done
            let client_id = handler.run().await;

            // Remove from subscribers if was subscribed
            if let Some(id) = client_id {
                let mut subs = subscribers.write().await;
                if subs.remove(&id).is_some() {
                    debug!(client_id = %id, "Removed disconnected subscriber");
                }
            }
        });
    }

    /// Spawns the roll broadcaster task.
    ///
    /// This task receives events from the history actor and broadcasts
    /// them to all subscribed clients.
    fn spawn_event_broadcaster(&self) {
        let mut event_rx = self.history.subscribe();
        let subscribers = Arc::clone(&self.subscribers);
        let cancel_token = self.cancel_token.clone();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel_token.cancelled() => {
                        debug!("Roll broadcaster shutting down");
                        break;
                    }

                    result = event_rx.recv() => {
                        match result {
                            Ok(event) => {
                                broadcast_event(&subscribers, &event).await;
                            }
                            Err(broadcast::error::RecvError::Lagged(n)) => {
                                warn!(skipped = n, "Roll broadcaster lagged, skipped events");
                            }
                            Err(broadcast::error::RecvError::Closed) => {
                                debug!("History event channel closed");
                                break;
                            }
                        }
                    }
                }
            }
        });
    }

    /// Performs cleanup on shutdown.
    async fn cleanup(&self) {
        // Clear subscribers
        {
            let mut subs = self.subscribers.write().await;
            subs.clear();
        }

        info!("Server cleanup complete");
    }
}

/// Broadcasts a history event to all subscribed clients.
async fn broadcast_event(subscribers: &SubscribersMap, event: &HistoryEvent) {
    // Build the message once
    let msg = match event {
        HistoryEvent::Appended { entry } => DaemonMessage::roll_result(entry.result.clone()),
        HistoryEvent::Cleared => DaemonMessage::history(EMPTY_HISTORY_PLACEHOLDER),
    };

    let json = match serde_json::to_string(&msg) {
        Ok(j) => j,
        Err(e) => {
            error!(error = %e, "Failed to serialize broadcast");
            return;
        }
    };

    // Clone the writer handles so the map lock is not held across the
    // writes; a stalled subscriber must not block Subscribe/Unsubscribe
    let writers: Vec<(String, SubscriberWriter)> = {
        let subs = subscribers.read().await;
        subs.iter()
            .map(|(id, sub)| (id.clone(), Arc::clone(&sub.writer)))
            .collect()
    };

    let mut failed_clients = Vec::new();

    for (client_id, writer) in writers {
        let mut writer = writer.lock().await;
        let send_result = timeout(connection::WRITE_TIMEOUT, async {
            use tokio::io::AsyncWriteExt;
            writer.write_all(json.as_bytes()).await?;
            writer.write_all(b"\n").await?;
            writer.flush().await?;
            Ok::<(), std::io::Error>(())
        })
        .await;

        // A timed-out writer counts as failed so one stalled client
        // cannot wedge the broadcaster for every later event
        match send_result {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                debug!(
                    client_id = %client_id,
                    error = %e,
                    "Failed to send broadcast to subscriber"
                );
                failed_clients.push(client_id);
            }
            Err(_) => {
                warn!(
                    client_id = %client_id,
                    "Broadcast write timed out, dropping subscriber"
                );
                failed_clients.push(client_id);
            }
        }
    }

    if !failed_clients.is_empty() {
        let mut subs = subscribers.write().await;
        for client_id in failed_clients {
            subs.remove(&client_id);
            debug!(client_id = %client_id, "Removed failed subscriber");
        }
    }
}

/// Errors that can occur in server operations.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Failed to setup socket at {addr}: {error}")]
    SocketSetup { addr: String, error: String },

    #[error("Connection error: {0}")]
    Connection(#[from] ConnectionError),
}
