//! Protocol message types for daemon communication.

use crate::version::ProtocolVersion;
use roll_core::RollMode;
use serde::{Deserialize, Serialize};

/// Request types that can be sent by clients to the daemon.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RequestType {
    /// Client handshake/connection request
    Connect {
        /// Client identifier (optional)
        #[serde(skip_serializing_if = "Option::is_none")]
        client_id: Option<String>,
    },

    /// Evaluate a dice expression
    Roll {
        /// The raw expression string, e.g. "3d6+2"
        prompt: String,
        /// Roll mode; omitted means normal
        #[serde(default)]
        mode: RollMode,
    },

    /// Request the rendered roll history
    History,

    /// Empty the roll history
    ClearHistory,

    /// Subscribe to roll broadcasts
    Subscribe,

    /// Unsubscribe from broadcasts
    Unsubscribe,

    /// Ping to check connection
    Ping {
        /// Sequence number for matching pong response
        seq: u64,
    },

    /// Client disconnecting gracefully
    Disconnect,
}

/// Messages sent from client to daemon.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientMessage {
    /// Protocol version
    pub protocol_version: ProtocolVersion,

    /// Message payload
    #[serde(flatten)]
    pub request: RequestType,
}

impl ClientMessage {
    /// Creates a new client message with current protocol version.
    pub fn new(request: RequestType) -> Self {
        Self {
            protocol_version: ProtocolVersion::CURRENT,
            request,
        }
    }

    /// Creates a connect message.
    pub fn connect(client_id: Option<String>) -> Self {
        Self::new(RequestType::Connect { client_id })
    }

    /// Creates a roll request.
    pub fn roll(prompt: impl Into<String>, mode: RollMode) -> Self {
        Self::new(RequestType::Roll {
            prompt: prompt.into(),
            mode,
        })
    }

    /// Creates a history request.
    pub fn history() -> Self {
        Self::new(RequestType::History)
    }

    /// Creates a clear-history request.
    pub fn clear_history() -> Self {
        Self::new(RequestType::ClearHistory)
    }

    /// Creates a subscribe message.
    pub fn subscribe() -> Self {
        Self::new(RequestType::Subscribe)
    }

    /// Creates a ping message.
    pub fn ping(seq: u64) -> Self {
        Self::new(RequestType::Ping { seq })
    }

    /// Creates a disconnect message.
    pub fn disconnect() -> Self {
        Self::new(RequestType::Disconnect)
    }
}

/// Messages sent from daemon to clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DaemonMessage {
    /// Connection accepted
    Connected {
        /// Daemon's protocol version
        protocol_version: ProtocolVersion,
        /// Assigned client ID
        client_id: String,
    },

    /// Connection rejected (version mismatch, etc.)
    Rejected {
        /// Reason for rejection
        reason: String,
        /// Daemon's protocol version (for client to upgrade)
        protocol_version: ProtocolVersion,
    },

    /// A roll result: the response to `Roll`, and the payload
    /// broadcast to every subscriber when anyone rolls
    RollResult {
        /// Formatted single-line result
        result: String,
    },

    /// Rendered roll history, newline-delimited, oldest first.
    /// An empty log renders as a placeholder line, never ""
    History {
        /// The rendered history body
        history: String,
    },

    /// Acknowledges a `ClearHistory` request
    HistoryCleared,

    /// Pong response to ping
    Pong {
        /// Sequence number from ping
        seq: u64,
    },

    /// Error response
    Error {
        /// Error message
        message: String,
        /// Error code (optional)
        #[serde(skip_serializing_if = "Option::is_none")]
        code: Option<String>,
    },
}

impl DaemonMessage {
    /// Creates a connected response.
    pub fn connected(client_id: String) -> Self {
        Self::Connected {
            protocol_version: ProtocolVersion::CURRENT,
            client_id,
        }
    }

    /// Creates a rejected response.
    pub fn rejected(reason: &str) -> Self {
        Self::Rejected {
            reason: reason.to_string(),
            protocol_version: ProtocolVersion::CURRENT,
        }
    }

    /// Creates a roll result message.
    pub fn roll_result(result: impl Into<String>) -> Self {
        Self::RollResult {
            result: result.into(),
        }
    }

    /// Creates a history response.
    pub fn history(history: impl Into<String>) -> Self {
        Self::History {
            history: history.into(),
        }
    }

    /// Creates a pong response.
    pub fn pong(seq: u64) -> Self {
        Self::Pong { seq }
    }

    /// Creates an error response.
    pub fn error(message: &str) -> Self {
        Self::Error {
            message: message.to_string(),
            code: None,
        }
    }

    /// Creates an error response with code.
    pub fn error_with_code(message: &str, code: &str) -> Self {
        Self::Error {
            message: message.to_string(),
            code: Some(code.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_message_serialization() {
        let msg = ClientMessage::roll("3d6+2", RollMode::Fortune);
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"type\":\"roll\""));
        assert!(json.contains("\"prompt\":\"3d6+2\""));
        assert!(json.contains("\"mode\":\"fortune\""));
    }

    #[test]
    fn test_roll_mode_defaults_to_normal() {
        let json = r#"{"protocol_version":{"major":1,"minor":0},"type":"roll","prompt":"d20"}"#;
        let msg: ClientMessage = serde_json::from_str(json).unwrap();
        match msg.request {
            RequestType::Roll { mode, .. } => assert_eq!(mode, RollMode::Normal),
            other => panic!("Expected Roll, got {other:?}"),
        }
    }

    #[test]
    fn test_daemon_message_serialization() {
        let msg = DaemonMessage::connected("client-123".to_string());
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"type\":\"connected\""));
        assert!(json.contains("\"client_id\":\"client-123\""));
    }

    #[test]
    fn test_history_message_roundtrip() {
        let original = DaemonMessage::history("d20 = 11 [11]\n3d6 = 12 [4,6,2]");
        let json = serde_json::to_string(&original).unwrap();
        let parsed: DaemonMessage = serde_json::from_str(&json).unwrap();

        match parsed {
            DaemonMessage::History { history } => {
                assert_eq!(history.lines().count(), 2);
            }
            other => panic!("Expected History, got {other:?}"),
        }
    }

    #[test]
    fn test_message_roundtrip() {
        let original = ClientMessage::roll("d20-1", RollMode::Misfortune);
        let json = serde_json::to_string(&original).unwrap();
        let parsed: ClientMessage = serde_json::from_str(&json).unwrap();

        match parsed.request {
            RequestType::Roll { prompt, mode } => {
                assert_eq!(prompt, "d20-1");
                assert_eq!(mode, RollMode::Misfortune);
            }
            other => panic!("Expected Roll, got {other:?}"),
        }
    }
}
