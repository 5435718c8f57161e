//! Session state machine
//!
//! The machine owns the single authoritative [`SessionState`]. It never
//! performs side effects itself: every transition returns the
//! [`SessionAction`]s the driver must carry out (send a message, toggle
//! input, move the camera, ...). This keeps the transitions testable
//! without a connection or a window.

use crate::error::ClientError;
use log::{debug, info};
use shared::{PlayerSide, StateSnapshot};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Loading,
    PressStart,
    MainMenu,
    InGame,
    Goal,
}

/// Side effects requested by a transition.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionAction {
    SendStart,
    SendResume,
    ActivateInput,
    DeactivateInput,
    CloseConnection,
    ShowNames,
    ZoomToTerrain,
    ZoomToMenu,
    ResetTerrain,
    /// A goal edge was detected on this snapshot while in play.
    GoalScored(PlayerSide),
    AnnounceWinner { winner: Option<PlayerSide>, color: PlayerSide },
    Alert(String),
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct PendingGameOver {
    winner: Option<PlayerSide>,
    color: PlayerSide,
}

pub struct SessionStateMachine {
    state: SessionState,
    awaiting_resume_ack: bool,
    pending_game_over: Option<PendingGameOver>,
    game_over: bool,
    zooming_in: bool,
    zooming_out: bool,
    start_on_settle: bool,
}

impl SessionStateMachine {
    pub fn new() -> Self {
        Self {
            state: SessionState::Loading,
            awaiting_resume_ack: false,
            pending_game_over: None,
            game_over: false,
            zooming_in: false,
            zooming_out: false,
            start_on_settle: false,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_game_over(&self) -> bool {
        self.game_over
    }

    /// A game over was reported but not declared yet.
    pub fn game_over_pending(&self) -> bool {
        self.pending_game_over.is_some()
    }

    pub fn awaiting_resume_ack(&self) -> bool {
        self.awaiting_resume_ack
    }

    /// Camera shake runs only during live play, never once the match has
    /// been reported over.
    pub fn camera_shake_enabled(&self) -> bool {
        self.state == SessionState::InGame && !self.game_over && self.pending_game_over.is_none()
    }

    pub fn is_zooming_in(&self) -> bool {
        self.zooming_in
    }

    pub fn is_zooming_out(&self) -> bool {
        self.zooming_out
    }

    /// In the menu with no camera movement under way.
    pub fn is_idle_in_menu(&self) -> bool {
        self.state == SessionState::MainMenu && !self.zooming_in && !self.zooming_out
    }

    fn set_state(&mut self, next: SessionState) {
        if self.state != next {
            info!("Session state: {:?} -> {:?}", self.state, next);
            self.state = next;
        }
    }

    pub fn on_scene_loaded(&mut self) {
        if self.state == SessionState::Loading {
            self.set_state(SessionState::PressStart);
        }
    }

    /// Any key or click. Only meaningful on the press-start screen.
    pub fn on_user_gesture(&mut self) -> bool {
        if self.state == SessionState::PressStart {
            self.set_state(SessionState::MainMenu);
            return true;
        }
        false
    }

    /// Matchmaking succeeded; the camera flies to the terrain and play
    /// starts once it settles.
    pub fn on_match_ready(&mut self) -> Vec<SessionAction> {
        if self.state != SessionState::MainMenu {
            return Vec::new();
        }
        self.zooming_in = true;
        self.zooming_out = false;
        self.start_on_settle = true;
        vec![SessionAction::ResetTerrain, SessionAction::ZoomToTerrain]
    }

    /// Tournament matches enter play straight away; start is sent later by
    /// [`SessionStateMachine::on_tournament_ready`].
    pub fn on_tournament_match(&mut self) -> Vec<SessionAction> {
        if self.state != SessionState::MainMenu {
            return Vec::new();
        }
        self.zooming_in = true;
        self.zooming_out = false;
        self.start_on_settle = false;
        self.set_state(SessionState::InGame);
        vec![SessionAction::ResetTerrain, SessionAction::ZoomToTerrain]
    }

    pub fn on_tournament_ready(&mut self) -> Vec<SessionAction> {
        if self.state != SessionState::InGame || self.game_over {
            return Vec::new();
        }
        vec![
            SessionAction::ShowNames,
            SessionAction::SendStart,
            SessionAction::ActivateInput,
        ]
    }

    pub fn on_camera_settled_on_terrain(&mut self) -> Vec<SessionAction> {
        if !self.zooming_in {
            return Vec::new();
        }
        self.zooming_in = false;
        if !self.start_on_settle {
            return Vec::new();
        }
        self.start_on_settle = false;
        self.set_state(SessionState::InGame);
        vec![
            SessionAction::ShowNames,
            SessionAction::SendStart,
            SessionAction::ActivateInput,
        ]
    }

    pub fn on_camera_settled_on_menu(&mut self) -> Vec<SessionAction> {
        if !self.zooming_out {
            return Vec::new();
        }
        self.zooming_out = false;
        self.set_state(SessionState::MainMenu);
        vec![SessionAction::ResetTerrain]
    }

    /// Feeds one steady-state snapshot. `previous` is the snapshot that was
    /// current before this one.
    pub fn on_snapshot(
        &mut self,
        previous: Option<&StateSnapshot>,
        current: &StateSnapshot,
    ) -> Vec<SessionAction> {
        let mut actions = Vec::new();
        if self.game_over || !matches!(self.state, SessionState::InGame | SessionState::Goal) {
            return actions;
        }

        if self.awaiting_resume_ack && current.playing {
            debug!("Server acknowledged goal resume");
            self.awaiting_resume_ack = false;
            self.set_state(SessionState::InGame);
        }

        if current.is_game_over() && self.pending_game_over.is_none() {
            let color = current.goal.or(current.winner).unwrap_or(PlayerSide::Two);
            self.pending_game_over = Some(PendingGameOver {
                winner: current.winner,
                color,
            });
        }

        let previous_goal = previous.and_then(|p| p.goal);
        if let Some(scorer) = current.goal {
            if self.state == SessionState::InGame
                && !self.awaiting_resume_ack
                && Some(scorer) != previous_goal
            {
                info!("Goal for player {}", scorer.tag());
                self.set_state(SessionState::Goal);
                actions.push(SessionAction::GoalScored(scorer));
            }
        }

        actions
    }

    /// The local goal animation finished its fall phase. The state stays in
    /// GOAL until a snapshot reports play resumed.
    pub fn on_goal_animation_complete(&mut self) -> Vec<SessionAction> {
        if self.state != SessionState::Goal || self.awaiting_resume_ack {
            return Vec::new();
        }
        self.awaiting_resume_ack = true;
        vec![SessionAction::SendResume]
    }

    /// Declares a pending game over once no goal animation is running.
    pub fn poll_game_over(&mut self) -> Vec<SessionAction> {
        let Some(pending) = self.pending_game_over else {
            return Vec::new();
        };
        if self.game_over {
            return Vec::new();
        }
        if self.state == SessionState::Goal && !self.awaiting_resume_ack {
            return Vec::new();
        }
        self.pending_game_over = None;
        self.game_over = true;
        self.awaiting_resume_ack = false;
        self.set_state(SessionState::InGame);
        vec![
            SessionAction::DeactivateInput,
            SessionAction::AnnounceWinner {
                winner: pending.winner,
                color: pending.color,
            },
            SessionAction::CloseConnection,
        ]
    }

    /// Player dismissed the winner announcement.
    pub fn on_dismiss(&mut self) -> Vec<SessionAction> {
        if !self.game_over {
            return Vec::new();
        }
        self.game_over = false;
        self.zooming_in = false;
        self.zooming_out = true;
        self.set_state(SessionState::MainMenu);
        vec![SessionAction::DeactivateInput, SessionAction::ZoomToMenu]
    }

    /// Aborts whatever is under way and heads back to the menu.
    pub fn on_abort(&mut self, error: &ClientError) -> Vec<SessionAction> {
        if matches!(self.state, SessionState::Loading | SessionState::PressStart) {
            return vec![SessionAction::Alert(error.user_message())];
        }
        info!("Session aborted: {}", error);
        let mut actions = self.return_to_menu();
        actions.push(SessionAction::Alert(error.user_message()));
        actions
    }

    /// The player walked away from the match.
    pub fn on_leave(&mut self) -> Vec<SessionAction> {
        if matches!(self.state, SessionState::Loading | SessionState::PressStart)
            || self.is_idle_in_menu()
        {
            return Vec::new();
        }
        info!("Leaving the match");
        self.return_to_menu()
    }

    fn return_to_menu(&mut self) -> Vec<SessionAction> {
        let was_out_of_menu = self.state != SessionState::MainMenu || self.zooming_in;
        self.awaiting_resume_ack = false;
        self.pending_game_over = None;
        self.game_over = false;
        self.zooming_in = false;
        self.start_on_settle = false;
        self.set_state(SessionState::MainMenu);

        let mut actions = vec![SessionAction::DeactivateInput, SessionAction::CloseConnection];
        if was_out_of_menu {
            self.zooming_out = true;
            actions.push(SessionAction::ZoomToMenu);
        }
        actions.push(SessionAction::ResetTerrain);
        actions
    }

    /// The transport closed without a local close request. Expected after a
    /// declared game over, an abort otherwise.
    pub fn on_connection_closed(&mut self) -> Vec<SessionAction> {
        if self.game_over || self.pending_game_over.is_some() || self.is_idle_in_menu() {
            return Vec::new();
        }
        self.on_abort(&ClientError::Connection(
            "connection closed unexpectedly".to_string(),
        ))
    }
}

impl Default for SessionStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{BallState, PaddleState};

    fn snapshot(goal: Option<PlayerSide>, playing: bool) -> StateSnapshot {
        StateSnapshot {
            paddle1: PaddleState { y: 0.5, score: 0 },
            paddle2: PaddleState { y: 0.5, score: 0 },
            ball: BallState {
                x: 0.5,
                y: 0.5,
                speed: 0.6,
                last_touch: None,
            },
            goal,
            gameover: None,
            playing,
            winner: None,
            game_mode: None,
        }
    }

    fn in_game() -> SessionStateMachine {
        let mut sm = SessionStateMachine::new();
        sm.on_scene_loaded();
        sm.on_user_gesture();
        sm.on_match_ready();
        sm.on_camera_settled_on_terrain();
        assert_eq!(sm.state(), SessionState::InGame);
        sm
    }

    #[test]
    fn test_startup_sequence() {
        let mut sm = SessionStateMachine::new();
        assert!(!sm.on_user_gesture());
        assert_eq!(sm.state(), SessionState::Loading);
        sm.on_scene_loaded();
        assert_eq!(sm.state(), SessionState::PressStart);
        assert!(sm.on_user_gesture());
        assert_eq!(sm.state(), SessionState::MainMenu);
        assert!(!sm.on_user_gesture());
    }

    #[test]
    fn test_play_starts_when_camera_settles() {
        let mut sm = SessionStateMachine::new();
        sm.on_scene_loaded();
        sm.on_user_gesture();
        let actions = sm.on_match_ready();
        assert!(actions.contains(&SessionAction::ZoomToTerrain));
        assert_eq!(sm.state(), SessionState::MainMenu);

        let actions = sm.on_camera_settled_on_terrain();
        assert_eq!(sm.state(), SessionState::InGame);
        assert!(actions.contains(&SessionAction::SendStart));
        assert!(actions.contains(&SessionAction::ActivateInput));
    }

    #[test]
    fn test_goal_transitions_exactly_once() {
        let mut sm = in_game();
        let before = snapshot(None, true);
        let goal = snapshot(Some(PlayerSide::One), false);

        let actions = sm.on_snapshot(Some(&before), &goal);
        assert_eq!(actions, vec![SessionAction::GoalScored(PlayerSide::One)]);
        assert_eq!(sm.state(), SessionState::Goal);

        let actions = sm.on_snapshot(Some(&goal), &goal);
        assert!(actions.is_empty());
        assert_eq!(sm.state(), SessionState::Goal);
    }

    #[test]
    fn test_resume_requires_animation_and_ack() {
        let mut sm = in_game();
        let goal = snapshot(Some(PlayerSide::Two), false);
        sm.on_snapshot(None, &goal);

        // A snapshot saying "playing" before the animation ends changes nothing.
        sm.on_snapshot(Some(&goal), &snapshot(Some(PlayerSide::Two), true));
        assert_eq!(sm.state(), SessionState::Goal);

        let actions = sm.on_goal_animation_complete();
        assert_eq!(actions, vec![SessionAction::SendResume]);
        assert_eq!(sm.state(), SessionState::Goal);
        assert!(sm.awaiting_resume_ack());

        // Still paused server-side: stays in GOAL, no re-trigger.
        let actions = sm.on_snapshot(Some(&goal), &goal);
        assert!(actions.is_empty());
        assert_eq!(sm.state(), SessionState::Goal);

        sm.on_snapshot(Some(&goal), &snapshot(None, true));
        assert_eq!(sm.state(), SessionState::InGame);
        assert!(!sm.awaiting_resume_ack());
    }

    #[test]
    fn test_same_goal_after_resume_does_not_retrigger() {
        let mut sm = in_game();
        let goal = snapshot(Some(PlayerSide::One), false);
        sm.on_snapshot(None, &goal);
        sm.on_goal_animation_complete();
        let resumed = snapshot(Some(PlayerSide::One), true);
        let actions = sm.on_snapshot(Some(&goal), &resumed);
        assert!(actions.is_empty());
        assert_eq!(sm.state(), SessionState::InGame);
    }

    #[test]
    fn test_game_over_waits_for_goal_animation() {
        let mut sm = in_game();
        let mut last = snapshot(Some(PlayerSide::One), false);
        last.gameover = Some("Score".to_string());
        last.winner = Some(PlayerSide::One);
        sm.on_snapshot(Some(&snapshot(None, true)), &last);
        assert_eq!(sm.state(), SessionState::Goal);

        assert!(sm.poll_game_over().is_empty());
        sm.on_goal_animation_complete();

        let actions = sm.poll_game_over();
        assert!(sm.is_game_over());
        assert!(actions.contains(&SessionAction::CloseConnection));
        assert!(actions.contains(&SessionAction::AnnounceWinner {
            winner: Some(PlayerSide::One),
            color: PlayerSide::One
        }));

        // Our own close must not read as an abort.
        assert!(sm.on_connection_closed().is_empty());

        let actions = sm.on_dismiss();
        assert!(actions.contains(&SessionAction::ZoomToMenu));
        assert_eq!(sm.state(), SessionState::MainMenu);
        assert_eq!(sm.on_camera_settled_on_menu(), vec![SessionAction::ResetTerrain]);
        assert!(sm.is_idle_in_menu());
    }

    #[test]
    fn test_shake_stops_once_game_over_reported() {
        let mut sm = in_game();
        assert!(sm.camera_shake_enabled());

        let mut last = snapshot(None, true);
        last.gameover = Some("Score".to_string());
        last.winner = Some(PlayerSide::Two);
        sm.on_snapshot(Some(&snapshot(None, true)), &last);
        assert_eq!(sm.state(), SessionState::InGame);
        assert!(sm.game_over_pending());
        assert!(!sm.camera_shake_enabled());

        sm.poll_game_over();
        assert!(sm.is_game_over());
        assert!(!sm.camera_shake_enabled());
    }

    #[test]
    fn test_unexpected_close_aborts_to_menu() {
        let mut sm = in_game();
        let actions = sm.on_connection_closed();
        assert_eq!(sm.state(), SessionState::MainMenu);
        assert!(actions.contains(&SessionAction::CloseConnection));
        assert!(actions.contains(&SessionAction::ZoomToMenu));
        assert!(actions
            .iter()
            .any(|a| matches!(a, SessionAction::Alert(_))));
    }

    #[test]
    fn test_abort_during_loading_only_alerts() {
        let mut sm = SessionStateMachine::new();
        let actions = sm.on_abort(&ClientError::ConnectionLost);
        assert_eq!(actions.len(), 1);
        assert_eq!(sm.state(), SessionState::Loading);
    }

    #[test]
    fn test_leave_from_menu_is_noop() {
        let mut sm = SessionStateMachine::new();
        sm.on_scene_loaded();
        sm.on_user_gesture();
        assert!(sm.on_leave().is_empty());

        let mut sm = in_game();
        let actions = sm.on_leave();
        assert!(actions.contains(&SessionAction::CloseConnection));
        assert!(!actions.iter().any(|a| matches!(a, SessionAction::Alert(_))));
    }

    #[test]
    fn test_tournament_match_enters_play_immediately() {
        let mut sm = SessionStateMachine::new();
        sm.on_scene_loaded();
        sm.on_user_gesture();
        sm.on_tournament_match();
        assert_eq!(sm.state(), SessionState::InGame);
        assert!(sm.on_camera_settled_on_terrain().is_empty());
        let actions = sm.on_tournament_ready();
        assert!(actions.contains(&SessionAction::SendStart));
    }
}
