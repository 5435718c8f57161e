//! Error taxonomy for the client session lifecycle

use crate::game::GameMode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    /// Transport failed to open, or failed while open.
    #[error("connection error: {0}")]
    Connection(String),

    /// Connection closed while waiting for an opponent.
    #[error("connection lost")]
    ConnectionLost,

    #[error("matchmaking timed out")]
    MatchmakingTimeout,

    #[error("no opponent available ({mode:?})")]
    OpponentUnavailable { mode: GameMode },

    #[error("opponent left the game")]
    OpponentLeft,

    /// Malformed or out-of-sequence inbound frame. Never fatal.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// A presentation surface requirement was not met.
    #[error("missing presentation element: {0}")]
    LocalPrecondition(&'static str),

    #[error("game service request failed: {0}")]
    Http(String),

    #[error("credential error: {0}")]
    Credential(String),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Request(#[from] reqwest::Error),

    #[error(transparent)]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
}

impl ClientError {
    /// Text shown to the player in an alert.
    pub fn user_message(&self) -> String {
        match self {
            ClientError::OpponentUnavailable { mode } if mode.is_pve() => {
                "An error occurred: the AI could not connect".to_string()
            }
            ClientError::OpponentUnavailable { .. } => {
                "An error occurred: no opponent found".to_string()
            }
            ClientError::MatchmakingTimeout => "An error occurred: timeout".to_string(),
            ClientError::ConnectionLost => "An error occurred: connection lost".to_string(),
            ClientError::OpponentLeft => "The opponent left the game".to_string(),
            other => format!("An error occurred: {}", other),
        }
    }

    /// Errors after which the session must be torn down.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            ClientError::Protocol(_) | ClientError::LocalPrecondition(_)
        )
    }
}

impl From<shared::DecodeError> for ClientError {
    fn from(err: shared::DecodeError) -> Self {
        ClientError::Protocol(err.to_string())
    }
}
