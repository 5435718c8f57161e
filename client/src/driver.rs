//! Per-frame driver and session lifecycle
//!
//! [`RenderDriver::tick`] runs once per display refresh on the render
//! thread. It is the only place where session state changes: network I/O
//! runs on the tokio runtime and is observed here by polling, and every wait
//! (connecting, matchmaking, tournament names, camera settle, goal resume) is
//! a condition checked once per tick with its own timeout. Nothing in a tick
//! may fail the frame; errors become alerts or log lines.

use crate::border::{BorderHitSimulator, BorderSide};
use crate::camera::{CameraEvent, CameraRig, GOAL_SHAKE_FRAMES, TOUCH_SHAKE_FRAMES};
use crate::config::ClientConfig;
use crate::effects::{
    ball_glow, side_color, victory_intensity, EjectedBall, GoalAnimation, GoalStep,
    LoadingProgress, TouchEffects,
};
use crate::error::ClientError;
use crate::game::{GameMode, SessionContext};
use crate::input::InputSampler;
use crate::matchmaking::{GameService, MatchmakingWait, WaitOutcome};
use crate::network::{CloseFuture, NetworkSession, SessionEvent, WsTransport};
use crate::reconciler::{username_from_token, Reconciled, SnapshotReconciler};
use crate::rendering::{BallView, Notice, PaddleView, PresentationSurface, SceneFrame};
use crate::state::{SessionAction, SessionState, SessionStateMachine};
use futures::future::{BoxFuture, FutureExt};
use log::{debug, info, warn};
use macroquad::math::{vec3, Vec3};
use shared::{ball_world_position, paddle_world_x, ClientMessage, PlayerSide};
use std::sync::Arc;
use std::time::Instant;
use tokio::runtime::Handle;
use tokio::sync::{oneshot, Mutex};

const PADDLE_Z: f32 = 7.05;
const BALL_Y: f32 = 0.1;

/// A freshly opened game connection.
pub struct Connected {
    pub session: NetworkSession,
    /// Username decoded from the credential used to connect.
    pub own_username: Option<String>,
}

/// Opens the game connection for a mode.
pub trait GameConnector: Send + Sync + 'static {
    fn connect(
        &self,
        mode: GameMode,
        names: Option<[String; 2]>,
    ) -> BoxFuture<'static, Result<Connected, ClientError>>;
}

/// Connects through the game service: credential, game uid, then websocket.
pub struct ServiceConnector {
    service: Arc<GameService>,
    token: Arc<Mutex<Option<String>>>,
    insecure_tls: bool,
}

impl ServiceConnector {
    pub fn new(config: &ClientConfig) -> Result<Self, ClientError> {
        let service = GameService::new(config.endpoints(), config.insecure_tls)?;
        Ok(Self {
            service: Arc::new(service),
            token: Arc::new(Mutex::new(config.token().map(str::to_string))),
            insecure_tls: config.insecure_tls,
        })
    }
}

impl GameConnector for ServiceConnector {
    fn connect(
        &self,
        mode: GameMode,
        names: Option<[String; 2]>,
    ) -> BoxFuture<'static, Result<Connected, ClientError>> {
        let service = Arc::clone(&self.service);
        let cached = Arc::clone(&self.token);
        let insecure_tls = self.insecure_tls;
        async move {
            let token = {
                let mut cached = cached.lock().await;
                match cached.as_ref() {
                    Some(token) => token.clone(),
                    None => {
                        info!("No credential configured, requesting a guest token");
                        let token = service.guest_token().await?;
                        *cached = Some(token.clone());
                        token
                    }
                }
            };
            let uid = service.resolve_uid(&mode, &token).await?;
            let url = service.endpoints().socket_url(&uid);
            let transport = WsTransport::connect(&url, &token, insecure_tls).await?;
            Ok(Connected {
                session: NetworkSession::start(transport, names),
                own_username: username_from_token(&token),
            })
        }
        .boxed()
    }
}

/// Everything the window reported since the previous tick.
#[derive(Debug, Clone)]
pub struct FrameInput {
    pub now: Instant,
    /// Paddle key transitions, `true` for pressed.
    pub key_events: Vec<(String, bool)>,
    /// Any key or click.
    pub gesture: bool,
    pub dismiss: bool,
    pub leave: bool,
    pub start: Option<GameMode>,
}

impl FrameInput {
    pub fn at(now: Instant) -> Self {
        Self {
            now,
            key_events: Vec::new(),
            gesture: false,
            dismiss: false,
            leave: false,
            start: None,
        }
    }
}

enum Lifecycle {
    Idle,
    Connecting {
        mode: GameMode,
        result: oneshot::Receiver<Result<Connected, ClientError>>,
    },
    WaitingForOpponent(MatchmakingWait),
    AwaitingNames {
        since: Instant,
    },
    TournamentCountdown {
        until: Instant,
    },
    Live,
}

pub struct RenderDriver {
    config: ClientConfig,
    runtime: Handle,
    connector: Arc<dyn GameConnector>,
    sm: SessionStateMachine,
    ctx: SessionContext,
    reconciler: SnapshotReconciler,
    input: InputSampler,
    border: BorderHitSimulator,
    camera: CameraRig,
    touch: TouchEffects,
    goal: GoalAnimation,
    ejected: EjectedBall,
    loading: LoadingProgress,
    session: Option<NetworkSession>,
    lifecycle: Lifecycle,
    pending_close: Option<CloseFuture>,
    ball: Vec3,
    ball_previous_x: f32,
    banner: Option<String>,
    victory: Option<(PlayerSide, Instant)>,
}

impl RenderDriver {
    pub fn new(config: ClientConfig, runtime: Handle, connector: Arc<dyn GameConnector>) -> Self {
        let own_username = config.token().and_then(username_from_token);
        Self {
            input: InputSampler::new(&config.bindings, config.input_tick),
            camera: CameraRig::new(config.settle_budget),
            config,
            runtime,
            connector,
            sm: SessionStateMachine::new(),
            ctx: SessionContext::new(own_username),
            reconciler: SnapshotReconciler::new(),
            border: BorderHitSimulator::new(),
            touch: TouchEffects::new(),
            goal: GoalAnimation::new(),
            ejected: EjectedBall::new(),
            loading: LoadingProgress::new(),
            session: None,
            lifecycle: Lifecycle::Idle,
            pending_close: None,
            ball: vec3(0.0, BALL_Y, 0.0),
            ball_previous_x: 0.0,
            banner: None,
            victory: None,
        }
    }

    pub fn session_state(&self) -> SessionState {
        self.sm.state()
    }

    pub fn context(&self) -> &SessionContext {
        &self.ctx
    }

    pub fn border(&self) -> &BorderHitSimulator {
        &self.border
    }

    pub fn banner(&self) -> Option<&str> {
        self.banner.as_deref()
    }

    pub fn has_session(&self) -> bool {
        self.session.is_some()
    }

    pub fn is_game_over(&self) -> bool {
        self.sm.is_game_over()
    }

    pub fn is_matchmaking(&self) -> bool {
        matches!(
            self.lifecycle,
            Lifecycle::Connecting { .. } | Lifecycle::WaitingForOpponent(_)
        )
    }

    pub fn awaiting_resume_ack(&self) -> bool {
        self.sm.awaiting_resume_ack()
    }

    /// Close of the last torn-down connection, if one was started.
    pub fn pending_close(&self) -> Option<CloseFuture> {
        self.pending_close.clone()
    }

    /// Runs one frame and hands the result to `surface`.
    pub fn tick(&mut self, input: &FrameInput, surface: &mut dyn PresentationSurface) {
        let now = input.now;

        if self.sm.state() == SessionState::Loading && self.loading.advance() {
            self.sm.on_scene_loaded();
        }
        let entered_menu = input.gesture && self.sm.on_user_gesture();
        if input.dismiss {
            self.dismiss(now, surface);
        }
        if input.leave {
            self.leave(now, surface);
        }
        if let Some(mode) = input.start.as_ref().filter(|_| !entered_menu) {
            self.start_game(mode.clone(), surface);
        }

        self.poll_connecting(now, surface);
        self.drain_events(now, surface);
        self.advance_lifecycle(now, surface);
        self.advance_effects(now, surface);

        for (key, pressed) in &input.key_events {
            self.input.key_event(key, *pressed);
        }
        self.input.sample(now);
        for message in self.input.drain(now) {
            if let Some(session) = &self.session {
                session.send(&message.to_message());
            }
        }

        let frame = self.build_frame(now);
        if let Err(e) = surface.present(&frame) {
            debug!("Frame presented with degraded surface: {}", e);
        }
    }

    fn start_game(&mut self, mode: GameMode, surface: &mut dyn PresentationSurface) {
        if !self.sm.is_idle_in_menu() || !matches!(self.lifecycle, Lifecycle::Idle) {
            debug!("Ignoring game request for {:?}: busy", mode);
            return;
        }
        info!("Starting {:?} game", mode);
        self.ctx.begin(mode.clone());
        self.reconciler.reset();
        if mode.awaits_opponent() {
            surface.notify(Notice::MatchmakingStarted(mode.clone()));
        }

        let (tx, rx) = oneshot::channel();
        let previous_close = self.pending_close.take();
        let connect = self.connector.connect(mode.clone(), mode.greeting_names());
        self.runtime.spawn(async move {
            if let Some(close) = previous_close {
                close.await;
            }
            let _ = tx.send(connect.await);
        });
        self.lifecycle = Lifecycle::Connecting { mode, result: rx };
    }

    fn poll_connecting(&mut self, now: Instant, surface: &mut dyn PresentationSurface) {
        let Lifecycle::Connecting { mode, result } = &mut self.lifecycle else {
            return;
        };
        let outcome = match result.try_recv() {
            Ok(outcome) => outcome,
            Err(oneshot::error::TryRecvError::Empty) => return,
            Err(oneshot::error::TryRecvError::Closed) => Err(ClientError::Connection(
                "connection attempt abandoned".to_string(),
            )),
        };
        let mode = mode.clone();
        self.lifecycle = Lifecycle::Idle;
        match outcome {
            Ok(connected) => self.on_connected(mode, connected, now, surface),
            Err(e) => {
                if mode.awaits_opponent() {
                    surface.notify(Notice::MatchmakingFinished);
                }
                self.fail_session(e, now, surface)
            }
        }
    }

    fn on_connected(
        &mut self,
        mode: GameMode,
        connected: Connected,
        now: Instant,
        surface: &mut dyn PresentationSurface,
    ) {
        info!("Game connection open");
        if connected.own_username.is_some() {
            self.ctx.own_username = connected.own_username;
        }
        self.session = Some(connected.session);

        if mode.is_tournament() {
            self.lifecycle = Lifecycle::AwaitingNames { since: now };
            let actions = self.sm.on_tournament_match();
            self.apply_actions(actions, now, surface);
        } else if mode.awaits_opponent() {
            self.lifecycle = Lifecycle::WaitingForOpponent(MatchmakingWait::new(
                mode,
                now,
                self.config.poll_interval,
                self.config.matchmaking_timeout,
            ));
        } else {
            self.lifecycle = Lifecycle::Live;
            let actions = self.sm.on_match_ready();
            self.apply_actions(actions, now, surface);
        }
    }

    fn advance_lifecycle(&mut self, now: Instant, surface: &mut dyn PresentationSurface) {
        let open = self.session.as_ref().map_or(false, NetworkSession::is_open);
        match &mut self.lifecycle {
            Lifecycle::WaitingForOpponent(wait) => match wait.poll(now, open) {
                WaitOutcome::Pending => {}
                WaitOutcome::Ready => {
                    info!("Opponent ready");
                    surface.notify(Notice::MatchmakingFinished);
                    self.lifecycle = Lifecycle::Live;
                    let actions = self.sm.on_match_ready();
                    self.apply_actions(actions, now, surface);
                }
                WaitOutcome::Failed(e) => self.fail_session(e, now, surface),
            },
            Lifecycle::AwaitingNames { since } => {
                let waited = now.duration_since(*since);
                if self.ctx.names_received || waited >= self.config.names_wait {
                    if !self.ctx.names_received {
                        warn!("Player names did not arrive, starting anyway");
                    }
                    self.lifecycle = Lifecycle::TournamentCountdown {
                        until: now + self.config.tournament_start_delay,
                    };
                }
            }
            Lifecycle::TournamentCountdown { until } => {
                if now >= *until {
                    self.lifecycle = Lifecycle::Live;
                    let actions = self.sm.on_tournament_ready();
                    self.apply_actions(actions, now, surface);
                }
            }
            Lifecycle::Idle | Lifecycle::Connecting { .. } | Lifecycle::Live => {}
        }
    }

    fn drain_events(&mut self, now: Instant, surface: &mut dyn PresentationSurface) {
        loop {
            let Some(event) = self.session.as_mut().and_then(NetworkSession::try_next_event)
            else {
                return;
            };
            match event {
                SessionEvent::Message(text) => self.handle_frame(&text, now, surface),
                SessionEvent::Closed => self.handle_closed(now, surface),
            }
        }
    }

    fn handle_frame(&mut self, text: &str, now: Instant, surface: &mut dyn PresentationSurface) {
        let reconciled = match self.reconciler.apply(&mut self.ctx, text) {
            Ok(reconciled) => reconciled,
            // Malformed frames are dropped; the next one will do.
            Err(_) => return,
        };
        match reconciled {
            Reconciled::Matchmaking(signal) => {
                if let Lifecycle::WaitingForOpponent(wait) = &mut self.lifecycle {
                    wait.record(signal);
                }
            }
            Reconciled::OpponentLeft { winner } => {
                if self.sm.is_game_over() || self.sm.game_over_pending() {
                    debug!("Game over frame after the end of the match: {:?}", winner);
                } else {
                    self.fail_session(ClientError::OpponentLeft, now, surface);
                }
            }
            Reconciled::Snapshot => self.on_snapshot(now, surface),
            Reconciled::Greeting(_) | Reconciled::NamesReceived | Reconciled::Ignored => {}
        }
    }

    fn on_snapshot(&mut self, now: Instant, surface: &mut dyn PresentationSurface) {
        let Some(current) = self.ctx.current().cloned() else {
            return;
        };
        if self.sm.state() != SessionState::Goal {
            let (x, z) = ball_world_position(&current.ball);
            if x.is_finite() && z.is_finite() {
                self.ball_previous_x = self.ball.x;
                self.ball = vec3(x, BALL_Y, z);
            }
        }
        let previous = self.ctx.previous().cloned();
        let actions = self.sm.on_snapshot(previous.as_ref(), &current);
        self.apply_actions(actions, now, surface);
    }

    fn handle_closed(&mut self, now: Instant, surface: &mut dyn PresentationSurface) {
        let actions = self.sm.on_connection_closed();
        if actions.is_empty() {
            // An open matchmaking wait notices on its next poll.
            return;
        }
        self.lifecycle = Lifecycle::Idle;
        self.apply_actions(actions, now, surface);
        self.ctx.clear();
    }

    /// Tears the session down and returns to the menu with an alert.
    fn fail_session(&mut self, error: ClientError, now: Instant, surface: &mut dyn PresentationSurface) {
        warn!("Session failed: {}", error);
        if self.is_matchmaking() {
            surface.notify(Notice::MatchmakingFinished);
        }
        self.abandon_connect();
        let actions = self.sm.on_abort(&error);
        self.apply_actions(actions, now, surface);
        self.teardown();
        self.ctx.clear();
    }

    fn leave(&mut self, now: Instant, surface: &mut dyn PresentationSurface) {
        if matches!(self.sm.state(), SessionState::Loading | SessionState::PressStart) {
            return;
        }
        if self.is_matchmaking() {
            surface.notify(Notice::MatchmakingFinished);
        }
        let actions = self.sm.on_leave();
        self.apply_actions(actions, now, surface);
        self.abandon_connect();
        self.teardown();
        self.banner = None;
        self.victory = None;
        self.ctx.clear();
    }

    fn dismiss(&mut self, now: Instant, surface: &mut dyn PresentationSurface) {
        if !self.sm.is_game_over() {
            return;
        }
        let actions = self.sm.on_dismiss();
        self.apply_actions(actions, now, surface);
        self.lifecycle = Lifecycle::Idle;
        self.banner = None;
        self.victory = None;
        self.ctx.clear();
    }

    /// Closes the current connection in the background. The next connect
    /// waits for this close before opening a new one.
    fn teardown(&mut self) {
        let Some(session) = self.session.take() else {
            return;
        };
        let close = session.close();
        self.pending_close = Some(close.clone());
        self.runtime.spawn(async move {
            close.await;
            drop(session);
        });
    }

    /// Drops back to `Idle`. A connect still in flight is closed as soon as
    /// it lands, and that close becomes the one the next connect waits for.
    fn abandon_connect(&mut self) {
        let Lifecycle::Connecting { mode, result } =
            std::mem::replace(&mut self.lifecycle, Lifecycle::Idle)
        else {
            return;
        };
        info!("Abandoning {:?} connect in flight", mode);
        let close: CloseFuture = async move {
            if let Ok(Ok(connected)) = result.await {
                let session = connected.session;
                session.close().await;
            }
        }
        .boxed()
        .shared();
        self.pending_close = Some(close.clone());
        self.runtime.spawn(close);
    }

    fn apply_actions(
        &mut self,
        actions: Vec<SessionAction>,
        now: Instant,
        surface: &mut dyn PresentationSurface,
    ) {
        for action in actions {
            self.apply_action(action, now, surface);
        }
    }

    fn apply_action(&mut self, action: SessionAction, now: Instant, surface: &mut dyn PresentationSurface) {
        match action {
            SessionAction::SendStart => self.send(&ClientMessage::start()),
            SessionAction::SendResume => self.send(&ClientMessage::ResumeOnGoal),
            SessionAction::ActivateInput => self.input.activate(),
            SessionAction::DeactivateInput => self.input.deactivate(),
            SessionAction::CloseConnection => self.teardown(),
            SessionAction::ShowNames => surface.notify(Notice::PlayerNames(self.ctx.names.clone())),
            SessionAction::ZoomToTerrain => self.camera.fly_to_terrain(),
            SessionAction::ZoomToMenu => self.camera.fly_to_menu(),
            SessionAction::ResetTerrain => self.reset_terrain(),
            SessionAction::GoalScored(scorer) => self.on_goal(scorer),
            SessionAction::AnnounceWinner { winner, color } => {
                let text = self.ctx.winner_announcement(winner);
                info!("Match over: {}", text);
                self.banner = Some(text);
                self.victory = Some((color, now));
            }
            SessionAction::Alert(message) => surface.notify(Notice::Alert(message)),
        }
    }

    fn send(&self, message: &ClientMessage) {
        match &self.session {
            Some(session) => session.send(message),
            None => debug!("No connection for {:?}", message),
        }
    }

    fn on_goal(&mut self, scorer: PlayerSide) {
        let speed = self.ctx.current().map_or(0.0, |s| s.ball.speed);
        let broken = self.border.on_goal(scorer, self.ball.x, speed);
        if let Some(index) = broken {
            debug!("Border segment {} broke", index);
        }
        self.ejected.launch(
            self.ball,
            self.ball_previous_x,
            speed,
            BorderSide::conceded_by(scorer),
            broken.is_some(),
        );
        self.ejected.emissive = ball_glow(speed);
        self.ejected.color = self.touch.ball_color;
        self.camera.shake(GOAL_SHAKE_FRAMES);
        self.goal.start(scorer);
    }

    fn reset_terrain(&mut self) {
        self.border.reset();
        self.goal.reset();
        self.ejected.reset();
        self.touch.reset();
        self.ball = vec3(0.0, BALL_Y, 0.0);
        self.ball_previous_x = 0.0;
    }

    fn in_play(&self) -> bool {
        matches!(self.sm.state(), SessionState::InGame | SessionState::Goal)
            && !self.sm.is_game_over()
    }

    fn advance_effects(&mut self, now: Instant, surface: &mut dyn PresentationSurface) {
        if let Some(current) = self.ctx.current().cloned() {
            if self.goal.advance(&current, &mut self.ctx.displayed_scores) == GoalStep::Finished {
                let actions = self.sm.on_goal_animation_complete();
                self.apply_actions(actions, now, surface);
            }
        }

        let actions = self.sm.poll_game_over();
        self.apply_actions(actions, now, surface);

        match self.camera.advance_flight() {
            Some(CameraEvent::SettledOnTerrain) => {
                let actions = self.sm.on_camera_settled_on_terrain();
                self.apply_actions(actions, now, surface);
            }
            Some(CameraEvent::SettledOnMenu) => {
                let actions = self.sm.on_camera_settled_on_menu();
                self.apply_actions(actions, now, surface);
            }
            None => {}
        }

        if self.in_play() {
            if let Some(current) = self.ctx.current() {
                if self.touch.apply(current) {
                    self.camera.shake(TOUCH_SHAKE_FRAMES);
                }
            }
            if self.sm.camera_shake_enabled() {
                let speed = self.ctx.current().map_or(0.0, |s| s.ball.speed);
                self.camera.advance_shake(speed);
            }
        }

        self.border.advance();
        self.ejected.advance();
    }

    fn build_frame(&self, now: Instant) -> SceneFrame {
        let state = self.sm.state();
        let current = self.ctx.current();
        let speed = current.map_or(0.0, |s| s.ball.speed);

        let paddle = |side: PlayerSide, z: f32| PaddleView {
            position: vec3(
                current.map_or(0.0, |s| paddle_world_x(s.paddle(side).y)),
                BALL_Y,
                z,
            ),
            color: side_color(side),
            light: self.touch.paddle_light(side),
            emissive: self.touch.paddle_emissive(side),
        };

        let ball_position = if state == SessionState::Goal && self.goal.ball_at_center {
            vec3(0.0, BALL_Y, 0.0)
        } else {
            self.ball
        };
        let glow = if state == SessionState::Goal {
            self.goal.ball_light
        } else {
            ball_glow(speed)
        };
        let ball = BallView {
            position: ball_position,
            color: self.touch.ball_color,
            opacity: self.goal.ball_opacity,
            glow,
            visible: current.is_some()
                && self.goal.ball_visible
                && self.victory.is_none()
                && matches!(state, SessionState::InGame | SessionState::Goal),
        };

        let ejected = self.ejected.active.then(|| BallView {
            position: self.ejected.position,
            color: self.ejected.color,
            opacity: 1.0,
            glow: self.ejected.emissive,
            visible: true,
        });

        let (border_color, border_intensity) = match self.victory {
            Some((color, since)) => (side_color(color), victory_intensity(now.duration_since(since))),
            None => (self.goal.border_color, self.goal.border_intensity),
        };

        SceneFrame {
            state,
            loading: self.loading.progress(),
            menu_visible: self.sm.is_idle_in_menu() && matches!(self.lifecycle, Lifecycle::Idle),
            camera_position: self.camera.position,
            camera_jitter: self.camera.rotation,
            paddles: [
                paddle(PlayerSide::One, -PADDLE_Z),
                paddle(PlayerSide::Two, PADDLE_Z),
            ],
            ball,
            ejected,
            segments: self.border.segments().to_vec(),
            border_color,
            border_intensity,
            scores: self.ctx.displayed_scores,
            score_opacity: self.goal.text_opacity,
            banner: self.banner.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::Difficulty;
    use crate::network::mock::{self, MockHandle, MockTransport};
    use std::sync::Mutex as StdMutex;
    use std::time::Duration;

    struct MockConnector {
        transports: StdMutex<Vec<MockTransport>>,
    }

    impl GameConnector for MockConnector {
        fn connect(
            &self,
            _mode: GameMode,
            names: Option<[String; 2]>,
        ) -> BoxFuture<'static, Result<Connected, ClientError>> {
            let transport = self.transports.lock().unwrap().pop();
            async move {
                match transport {
                    Some(transport) => Ok(Connected {
                        session: NetworkSession::start(transport, names),
                        own_username: None,
                    }),
                    None => Err(ClientError::Connection("refused".to_string())),
                }
            }
            .boxed()
        }
    }

    #[derive(Default)]
    struct Recorder {
        notices: Vec<Notice>,
        frames: usize,
    }

    impl PresentationSurface for Recorder {
        fn present(&mut self, _frame: &SceneFrame) -> Result<(), ClientError> {
            self.frames += 1;
            Ok(())
        }

        fn notify(&mut self, notice: Notice) {
            self.notices.push(notice);
        }
    }

    fn driver(transports: Vec<MockTransport>) -> RenderDriver {
        let config = ClientConfig {
            settle_budget: 2,
            ..ClientConfig::default()
        };
        let connector = Arc::new(MockConnector {
            transports: StdMutex::new(transports),
        });
        RenderDriver::new(config, Handle::current(), connector)
    }

    fn to_menu(driver: &mut RenderDriver, surface: &mut Recorder, now: &mut Instant) {
        while driver.session_state() == SessionState::Loading {
            *now += Duration::from_millis(16);
            driver.tick(&FrameInput::at(*now), surface);
        }
        let mut input = FrameInput::at(*now);
        input.gesture = true;
        driver.tick(&input, surface);
        assert_eq!(driver.session_state(), SessionState::MainMenu);
    }

    async fn frames(driver: &mut RenderDriver, surface: &mut Recorder, now: &mut Instant, count: usize) {
        for _ in 0..count {
            *now += Duration::from_millis(16);
            driver.tick(&FrameInput::at(*now), surface);
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    }

    #[tokio::test]
    async fn test_keyboard_game_starts_after_camera_settles() {
        let (transport, handle): (MockTransport, MockHandle) = mock::transport();
        let mut driver = driver(vec![transport]);
        let mut surface = Recorder::default();
        let mut now = Instant::now();
        to_menu(&mut driver, &mut surface, &mut now);

        let mut input = FrameInput::at(now);
        input.start = Some(GameMode::PvpKeyboard);
        driver.tick(&input, &mut surface);
        frames(&mut driver, &mut surface, &mut now, 10).await;

        assert_eq!(driver.session_state(), SessionState::InGame);
        assert_eq!(handle.sent_types(), vec!["greetings", "start"]);
        assert!(surface
            .notices
            .iter()
            .any(|n| matches!(n, Notice::PlayerNames(_))));
    }

    #[tokio::test]
    async fn test_failed_connect_alerts_and_stays_in_menu() {
        let mut driver = driver(Vec::new());
        let mut surface = Recorder::default();
        let mut now = Instant::now();
        to_menu(&mut driver, &mut surface, &mut now);

        let mut input = FrameInput::at(now);
        input.start = Some(GameMode::Pve(Difficulty::Easy));
        driver.tick(&input, &mut surface);
        frames(&mut driver, &mut surface, &mut now, 5).await;

        assert_eq!(driver.session_state(), SessionState::MainMenu);
        assert!(!driver.is_matchmaking());
        assert!(surface
            .notices
            .iter()
            .any(|n| matches!(n, Notice::Alert(_))));
        assert_eq!(surface.notices.last(), Some(&Notice::Alert(
            "An error occurred: connection error: refused".to_string()
        )));
    }

    #[tokio::test]
    async fn test_leave_while_connecting_closes_gracefully() {
        let (transport, handle) = mock::transport();
        let mut driver = driver(vec![transport]);
        let mut surface = Recorder::default();
        let mut now = Instant::now();
        to_menu(&mut driver, &mut surface, &mut now);

        let mut input = FrameInput::at(now);
        input.start = Some(GameMode::PvpLan);
        driver.tick(&input, &mut surface);
        // The connect lands on the runtime before the driver polls it.
        tokio::time::sleep(Duration::from_millis(1)).await;

        now += Duration::from_millis(16);
        let mut input = FrameInput::at(now);
        input.leave = true;
        driver.tick(&input, &mut surface);
        assert!(!driver.is_matchmaking());
        assert!(!driver.has_session());

        let close = driver.pending_close().expect("abandoned connect is closed");
        close.await;
        frames(&mut driver, &mut surface, &mut now, 5).await;

        assert_eq!(handle.sent_types(), vec!["greetings", "disconnect"]);
        assert_eq!(handle.closes.load(std::sync::atomic::Ordering::SeqCst), 1);
        assert_eq!(driver.session_state(), SessionState::MainMenu);
        assert!(surface
            .notices
            .iter()
            .all(|n| !matches!(n, Notice::Alert(_))));
    }

    #[tokio::test]
    async fn test_start_ignored_before_menu() {
        let mut driver = driver(Vec::new());
        let mut surface = Recorder::default();
        let mut input = FrameInput::at(Instant::now());
        input.start = Some(GameMode::PvpKeyboard);
        driver.tick(&input, &mut surface);
        assert!(!driver.is_matchmaking());
        assert_eq!(surface.frames, 1);
    }
}
