//! Session-wide game record shared by the per-frame components
//!
//! `SessionContext` is the one explicitly owned record of the current game.
//! Each field has a single writer:
//! - `mode`, `own_username`: the driver, when a game is requested or connected
//! - `local_side`, `names`, `names_received`: the snapshot reconciler
//! - `current`, `previous`: the snapshot reconciler (via [`SessionContext::push_snapshot`])
//! - `displayed_scores`: the goal animation in the effects module

use shared::{PlayerSide, StateSnapshot};

pub const OPPONENT_PLACEHOLDER: &str = "Opponent";
pub const SELF_LABEL: &str = "You";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
    /// Tournament variants where the AI plays the first paddle.
    EasyP1,
    MediumP1,
    HardP1,
}

impl Difficulty {
    pub fn option(self) -> u8 {
        match self {
            Difficulty::Easy => 1,
            Difficulty::Medium => 2,
            Difficulty::Hard => 3,
            Difficulty::EasyP1 => 11,
            Difficulty::MediumP1 => 21,
            Difficulty::HardP1 => 31,
        }
    }

    /// Unknown names fall back to medium.
    pub fn from_name(name: &str) -> Self {
        match name {
            "easy" => Difficulty::Easy,
            "hard" => Difficulty::Hard,
            "easy_p1" => Difficulty::EasyP1,
            "medium_p1" => Difficulty::MediumP1,
            "hard_p1" => Difficulty::HardP1,
            _ => Difficulty::Medium,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GameMode {
    Pve(Difficulty),
    /// Two clients matched through the game service.
    PvpLan,
    /// Both paddles driven from this keyboard.
    PvpKeyboard,
    Tournament {
        versus_ai: bool,
        difficulty: Difficulty,
        names: [String; 2],
    },
}

impl GameMode {
    /// Mode string sent to the join/create endpoints.
    pub fn wire_mode(&self) -> &'static str {
        match self {
            GameMode::Pve(_) => "PVE",
            GameMode::Tournament { versus_ai: true, .. } => "PVE",
            _ => "PVP",
        }
    }

    pub fn option(&self) -> u8 {
        match self {
            GameMode::Pve(difficulty) => difficulty.option(),
            GameMode::PvpLan => 1,
            GameMode::PvpKeyboard => 2,
            GameMode::Tournament { difficulty, .. } => difficulty.option(),
        }
    }

    pub fn is_pve(&self) -> bool {
        self.wire_mode() == "PVE"
    }

    pub fn is_tournament(&self) -> bool {
        matches!(self, GameMode::Tournament { .. })
    }

    /// Only a LAN match tries to join an existing game before creating one.
    pub fn joins_first(&self) -> bool {
        matches!(self, GameMode::PvpLan)
    }

    /// Modes that block on an `opponent_connected` signal before play.
    pub fn awaits_opponent(&self) -> bool {
        matches!(self, GameMode::Pve(_) | GameMode::PvpLan)
    }

    /// Whether the server's side assignment relabels the players.
    pub fn uses_side_assignment(&self) -> bool {
        matches!(self, GameMode::Pve(_) | GameMode::PvpLan)
    }

    pub fn default_names(&self) -> [String; 2] {
        match self {
            GameMode::Pve(_) => [SELF_LABEL.to_string(), shared::AI_NAME.to_string()],
            GameMode::Tournament { names, .. } => names.clone(),
            _ => ["Player 1".to_string(), "Player 2".to_string()],
        }
    }

    /// Display names carried by the greeting message, if any.
    pub fn greeting_names(&self) -> Option<[String; 2]> {
        match self {
            GameMode::Tournament { names, .. } => Some(names.clone()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SessionContext {
    pub mode: Option<GameMode>,
    pub local_side: Option<PlayerSide>,
    pub names: [String; 2],
    pub names_received: bool,
    /// Username from the viewer's own token, never used as a label.
    pub own_username: Option<String>,
    pub displayed_scores: [u32; 2],
    current: Option<StateSnapshot>,
    previous: Option<StateSnapshot>,
}

impl SessionContext {
    pub fn new(own_username: Option<String>) -> Self {
        Self {
            own_username,
            names: ["Player 1".to_string(), "Player 2".to_string()],
            ..Default::default()
        }
    }

    /// Prepares the record for a new game in `mode`.
    pub fn begin(&mut self, mode: GameMode) {
        self.names = mode.default_names();
        self.mode = Some(mode);
        self.local_side = None;
        self.names_received = false;
        self.displayed_scores = [0, 0];
        self.current = None;
        self.previous = None;
    }

    /// Forgets everything tied to the finished game.
    pub fn clear(&mut self) {
        self.mode = None;
        self.local_side = None;
        self.names = ["Player 1".to_string(), "Player 2".to_string()];
        self.names_received = false;
        self.displayed_scores = [0, 0];
        self.current = None;
        self.previous = None;
    }

    /// Makes `snapshot` current; the old current becomes the previous one.
    pub fn push_snapshot(&mut self, snapshot: StateSnapshot) {
        self.previous = self.current.take();
        self.current = Some(snapshot);
    }

    pub fn current(&self) -> Option<&StateSnapshot> {
        self.current.as_ref()
    }

    pub fn previous(&self) -> Option<&StateSnapshot> {
        self.previous.as_ref()
    }

    pub fn name(&self, side: PlayerSide) -> &str {
        &self.names[side.index()]
    }

    /// Text shown when the match ends.
    pub fn winner_announcement(&self, winner: Option<PlayerSide>) -> String {
        let winner = winner.unwrap_or(PlayerSide::Two);
        let local = self.local_side.unwrap_or(PlayerSide::One);
        match &self.mode {
            Some(GameMode::Tournament { .. }) => format!("{} wins!", self.name(winner)),
            Some(GameMode::Pve(_)) => {
                if winner == local {
                    "Victory!".to_string()
                } else {
                    "Defeat!".to_string()
                }
            }
            Some(GameMode::PvpKeyboard) => match winner {
                PlayerSide::One => "Player 1 wins!".to_string(),
                PlayerSide::Two => "Player 2 wins!".to_string(),
            },
            Some(GameMode::PvpLan) => {
                let opponent = self.name(local.opponent());
                let outcome = if winner == local { "Victory" } else { "Defeat" };
                if opponent == OPPONENT_PLACEHOLDER {
                    format!("{}!", outcome)
                } else {
                    format!("{} against {}!", outcome, opponent)
                }
            }
            None => "Game over".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{BallState, PaddleState};

    fn snapshot(goal: Option<PlayerSide>) -> StateSnapshot {
        StateSnapshot {
            paddle1: PaddleState { y: 0.5, score: 0 },
            paddle2: PaddleState { y: 0.5, score: 0 },
            ball: BallState {
                x: 0.5,
                y: 0.5,
                speed: 0.5,
                last_touch: None,
            },
            goal,
            gameover: None,
            playing: true,
            winner: None,
            game_mode: None,
        }
    }

    #[test]
    fn test_mode_options() {
        assert_eq!(GameMode::Pve(Difficulty::Hard).option(), 3);
        assert_eq!(GameMode::PvpLan.option(), 1);
        assert_eq!(GameMode::PvpKeyboard.option(), 2);
        assert_eq!(Difficulty::from_name("medium_p1").option(), 21);
        assert_eq!(Difficulty::from_name("nonsense"), Difficulty::Medium);
    }

    #[test]
    fn test_tournament_wire_mode() {
        let vs_ai = GameMode::Tournament {
            versus_ai: true,
            difficulty: Difficulty::EasyP1,
            names: ["bot".into(), "ann".into()],
        };
        assert_eq!(vs_ai.wire_mode(), "PVE");
        assert!(!vs_ai.awaits_opponent());
        assert_eq!(vs_ai.default_names(), ["bot".to_string(), "ann".to_string()]);
        assert!(vs_ai.greeting_names().is_some());
    }

    #[test]
    fn test_only_lan_joins_first() {
        assert!(GameMode::PvpLan.joins_first());
        assert!(!GameMode::PvpKeyboard.joins_first());
        assert!(!GameMode::Pve(Difficulty::Easy).joins_first());
    }

    #[test]
    fn test_push_snapshot_keeps_previous() {
        let mut ctx = SessionContext::new(None);
        ctx.begin(GameMode::Pve(Difficulty::Easy));
        assert_eq!(ctx.names, ["You".to_string(), "AI".to_string()]);

        ctx.push_snapshot(snapshot(None));
        ctx.push_snapshot(snapshot(Some(PlayerSide::One)));
        assert_eq!(ctx.previous().unwrap().goal, None);
        assert_eq!(ctx.current().unwrap().goal, Some(PlayerSide::One));

        ctx.clear();
        assert!(ctx.current().is_none());
        assert!(ctx.mode.is_none());
    }

    #[test]
    fn test_winner_announcement_per_mode() {
        let mut ctx = SessionContext::new(None);
        ctx.begin(GameMode::Pve(Difficulty::Medium));
        ctx.local_side = Some(PlayerSide::Two);
        assert_eq!(ctx.winner_announcement(Some(PlayerSide::Two)), "Victory!");
        assert_eq!(ctx.winner_announcement(Some(PlayerSide::One)), "Defeat!");

        ctx.begin(GameMode::PvpKeyboard);
        assert_eq!(ctx.winner_announcement(Some(PlayerSide::One)), "Player 1 wins!");

        ctx.begin(GameMode::PvpLan);
        ctx.local_side = Some(PlayerSide::One);
        ctx.names = ["You".into(), "Opponent".into()];
        assert_eq!(ctx.winner_announcement(Some(PlayerSide::One)), "Victory!");
        ctx.names = ["You".into(), "bob".into()];
        assert_eq!(ctx.winner_announcement(Some(PlayerSide::Two)), "Defeat against bob!");

        ctx.begin(GameMode::Tournament {
            versus_ai: false,
            difficulty: Difficulty::Medium,
            names: ["ann".into(), "bob".into()],
        });
        assert_eq!(ctx.winner_announcement(Some(PlayerSide::One)), "ann wins!");
    }
}
