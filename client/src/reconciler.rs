//! Inbound frame reconciliation
//!
//! Decodes raw frames and applies them to the [`SessionContext`]. The
//! greeting and names handshakes are applied once per session; repeats are
//! dropped. Steady-state snapshots become the current snapshot.

use crate::error::ClientError;
use crate::game::{SessionContext, OPPONENT_PLACEHOLDER, SELF_LABEL};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use log::{debug, info, warn};
use shared::{MatchmakingSignal, PlayerSide, ServerMessage, AI_NAME};

/// What a frame turned out to be once applied.
#[derive(Debug, Clone, PartialEq)]
pub enum Reconciled {
    /// Repeated one-shot handshake, nothing changed.
    Ignored,
    Greeting(PlayerSide),
    NamesReceived,
    Matchmaking(MatchmakingSignal),
    OpponentLeft { winner: Option<String> },
    Snapshot,
}

#[derive(Debug, Default)]
pub struct SnapshotReconciler {
    greeted: bool,
}

impl SnapshotReconciler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Re-arms the one-shot handshakes for a new session.
    pub fn reset(&mut self) {
        self.greeted = false;
    }

    /// Applies one frame. Malformed frames return a protocol error and leave
    /// the context untouched.
    pub fn apply(&mut self, ctx: &mut SessionContext, text: &str) -> Result<Reconciled, ClientError> {
        let message = ServerMessage::decode(text).map_err(|e| {
            warn!("Ignoring malformed frame: {}", e);
            ClientError::from(e)
        })?;

        let outcome = match message {
            ServerMessage::Greeting { side } => self.apply_greeting(ctx, side),
            ServerMessage::Names { p1, p2 } => apply_names(ctx, p1, p2),
            ServerMessage::Matchmaking(signal) => Reconciled::Matchmaking(signal),
            ServerMessage::OpponentLeft { winner } => Reconciled::OpponentLeft { winner },
            ServerMessage::State(snapshot) => {
                ctx.push_snapshot(*snapshot);
                Reconciled::Snapshot
            }
        };
        Ok(outcome)
    }

    fn apply_greeting(&mut self, ctx: &mut SessionContext, side: PlayerSide) -> Reconciled {
        if self.greeted {
            debug!("Duplicate greeting ignored");
            return Reconciled::Ignored;
        }
        self.greeted = true;
        info!("Assigned to player {}", side.tag());
        ctx.local_side = Some(side);

        let relabel = ctx
            .mode
            .as_ref()
            .map(|mode| mode.uses_side_assignment())
            .unwrap_or(false);
        if relabel {
            ctx.names = match side {
                PlayerSide::One => [SELF_LABEL.to_string(), OPPONENT_PLACEHOLDER.to_string()],
                PlayerSide::Two => [OPPONENT_PLACEHOLDER.to_string(), SELF_LABEL.to_string()],
            };
        }
        Reconciled::Greeting(side)
    }
}

fn apply_names(ctx: &mut SessionContext, p1: Option<String>, p2: Option<String>) -> Reconciled {
    if ctx.names_received {
        debug!("Duplicate names ignored");
        return Reconciled::Ignored;
    }
    for (side, name) in [(PlayerSide::One, p1), (PlayerSide::Two, p2)] {
        let Some(name) = name else { continue };
        if name.is_empty() || name == AI_NAME {
            continue;
        }
        if ctx.own_username.as_deref() == Some(name.as_str()) {
            continue;
        }
        ctx.names[side.index()] = name;
    }
    ctx.names_received = true;
    Reconciled::NamesReceived
}

/// `username` claim from a JWT, with or without the `Bearer ` scheme.
pub fn username_from_token(token: &str) -> Option<String> {
    let token = token.trim().trim_start_matches("Bearer ").trim();
    let payload = token.split('.').nth(1)?;
    let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
    let claims: serde_json::Value = serde_json::from_slice(&bytes).ok()?;
    claims
        .get("username")
        .and_then(serde_json::Value::as_str)
        .map(str::to_string)
}
