//! Client configuration assembled from the command line

use crate::camera::DEFAULT_SETTLE_BUDGET;
use crate::game::{Difficulty, GameMode};
use crate::input::{KeyBindings, DEFAULT_TICK};
use crate::matchmaking::{Endpoints, DEFAULT_POLL_INTERVAL, DEFAULT_TIMEOUT};
use std::time::Duration;

pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_PORT: u16 = 7777;
/// How long a tournament start waits for the names handshake.
pub const NAMES_WAIT: Duration = Duration::from_secs(10);
/// Pause between the names arriving and the tournament start.
pub const TOURNAMENT_START_DELAY: Duration = Duration::from_secs(1);

/// A tournament match handed to the client by the tournament organiser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TournamentConfig {
    pub names: [String; 2],
    pub difficulty: Difficulty,
    pub versus_ai: bool,
}

impl TournamentConfig {
    pub fn mode(&self) -> GameMode {
        GameMode::Tournament {
            versus_ai: self.versus_ai,
            difficulty: self.difficulty,
            names: self.names.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub host: String,
    pub port: u16,
    /// Bearer credential. A guest token is fetched when absent.
    pub token: Option<String>,
    pub insecure_tls: bool,
    pub bindings: KeyBindings,
    pub input_tick: Duration,
    pub poll_interval: Duration,
    pub matchmaking_timeout: Duration,
    pub names_wait: Duration,
    pub tournament_start_delay: Duration,
    /// Frames a camera flight may take before it snaps to its target.
    pub settle_budget: u32,
    pub window_width: u32,
    pub window_height: u32,
    pub tournament: Option<TournamentConfig>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            token: None,
            insecure_tls: true,
            bindings: KeyBindings::default(),
            input_tick: DEFAULT_TICK,
            poll_interval: DEFAULT_POLL_INTERVAL,
            matchmaking_timeout: DEFAULT_TIMEOUT,
            names_wait: NAMES_WAIT,
            tournament_start_delay: TOURNAMENT_START_DELAY,
            settle_budget: DEFAULT_SETTLE_BUDGET,
            window_width: 1280,
            window_height: 720,
            tournament: None,
        }
    }
}

impl ClientConfig {
    pub fn endpoints(&self) -> Endpoints {
        Endpoints::new(self.host.clone(), self.port)
    }

    /// Token with surrounding whitespace removed; empty counts as absent.
    pub fn token(&self) -> Option<&str> {
        self.token
            .as_deref()
            .map(str::trim)
            .filter(|token| !token.is_empty())
    }
}
