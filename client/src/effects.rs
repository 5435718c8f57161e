//! Per-frame cosmetic effects driven by the current snapshot
//!
//! Nothing here feeds back into the session: effects only read snapshots
//! and produce values for the presentation surface. The one exception is
//! [`GoalAnimation`], whose completion releases the goal pause.

use crate::border::BorderSide;
use macroquad::color::Color;
use macroquad::math::Vec3;
use shared::{PlayerSide, StateSnapshot};
use std::time::Duration;

pub const P1_COLOR: Color = Color::new(0.973, 0.737, 0.016, 1.0);
pub const P2_COLOR: Color = Color::new(0.604, 0.918, 0.867, 1.0);
pub const WHITE: Color = Color::new(1.0, 1.0, 1.0, 1.0);

const PADDLE_LIGHT_REST: f32 = 10.0;
const PADDLE_LIGHT_PEAK: f32 = 30.0;
const BALL_COLOR_STEP: f32 = 0.025;
const MIN_BALL_GLOW: f32 = 0.3;
const BORDER_LIGHT_INITIAL: f32 = 2.0;
const BORDER_LIGHT_RESET: f32 = 5.0;
const GOAL_RISE_END: f32 = 15.0;
const GOAL_FALL_END: f32 = 5.0;
const BALL_LIGHT_REST: f32 = 0.5;
const VICTORY_MAX_INTENSITY: f32 = 20.0;

pub fn side_color(side: PlayerSide) -> Color {
    match side {
        PlayerSide::One => P1_COLOR,
        PlayerSide::Two => P2_COLOR,
    }
}

pub fn lerp_color(from: Color, to: Color, t: f32) -> Color {
    Color::new(
        from.r + (to.r - from.r) * t,
        from.g + (to.g - from.g) * t,
        from.b + (to.b - from.b) * t,
        from.a + (to.a - from.a) * t,
    )
}

/// Ball light and emissive intensity outside of a goal pause.
pub fn ball_glow(speed: f32) -> f32 {
    (speed * speed * 5.0).max(MIN_BALL_GLOW)
}

/// Border light intensity of the winner pulse.
pub fn victory_intensity(elapsed: Duration) -> f32 {
    ((elapsed.as_millis() as f32 * 0.003).sin() + 1.0) * VICTORY_MAX_INTENSITY
}

#[derive(Debug, Clone, PartialEq)]
struct PaddleLight {
    intensity: f32,
    rising: bool,
    falling: bool,
    touched: bool,
}

impl PaddleLight {
    fn new() -> Self {
        Self {
            intensity: PADDLE_LIGHT_REST,
            rising: false,
            falling: false,
            touched: false,
        }
    }

    fn advance(&mut self, speed: f32) {
        if self.rising {
            self.intensity += speed * 5.0;
            if self.intensity >= PADDLE_LIGHT_PEAK {
                self.rising = false;
                self.falling = true;
            }
        } else if self.falling {
            self.intensity -= speed * 5.0;
            if self.intensity <= PADDLE_LIGHT_REST {
                self.falling = false;
            }
        }
    }
}

/// Paddle hit flash and ball tint keyed by `lastTouch`.
#[derive(Debug, Clone)]
pub struct TouchEffects {
    paddles: [PaddleLight; 2],
    pub ball_color: Color,
    t: f32,
}

impl TouchEffects {
    pub fn new() -> Self {
        Self {
            paddles: [PaddleLight::new(), PaddleLight::new()],
            ball_color: WHITE,
            t: 0.0,
        }
    }

    /// Applies one snapshot. Returns true on the first touch by a side,
    /// which asks for a camera shake.
    pub fn apply(&mut self, snapshot: &StateSnapshot) -> bool {
        let mut first_touch = false;
        if let Some(side) = snapshot.ball.last_touch {
            let paddle = &mut self.paddles[side.index()];
            if !paddle.touched && snapshot.goal.is_none() {
                paddle.rising = true;
                paddle.touched = true;
                first_touch = true;
            }
            self.t += BALL_COLOR_STEP;
            self.paddles[side.opponent().index()].touched = false;
            self.ball_color = lerp_color(self.ball_color, side_color(side), self.t);
        }
        if self.t > 1.0 {
            self.t = 0.0;
        }
        for paddle in &mut self.paddles {
            paddle.advance(snapshot.ball.speed);
        }
        if snapshot.goal.is_some() {
            for paddle in &mut self.paddles {
                paddle.touched = false;
            }
        }
        first_touch
    }

    pub fn paddle_light(&self, side: PlayerSide) -> f32 {
        self.paddles[side.index()].intensity
    }

    pub fn paddle_emissive(&self, side: PlayerSide) -> f32 {
        self.paddle_light(side) * 0.1
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

impl Default for TouchEffects {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GoalPhase {
    Rise,
    Fall,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GoalStep {
    Idle,
    Running,
    /// The fall phase ended this frame.
    Finished,
}

/// Border light oscillation played during a goal pause.
#[derive(Debug, Clone)]
pub struct GoalAnimation {
    phase: Option<GoalPhase>,
    scorer: PlayerSide,
    t_border: f32,
    pub border_intensity: f32,
    pub border_color: Color,
    pub text_opacity: f32,
    pub ball_opacity: f32,
    pub ball_light: f32,
    pub ball_visible: bool,
    /// Ball is parked at the centre of the field until play resumes.
    pub ball_at_center: bool,
}

impl GoalAnimation {
    pub fn new() -> Self {
        Self {
            phase: None,
            scorer: PlayerSide::One,
            t_border: 0.0,
            border_intensity: BORDER_LIGHT_INITIAL,
            border_color: WHITE,
            text_opacity: 0.0,
            ball_opacity: 1.0,
            ball_light: BALL_LIGHT_REST,
            ball_visible: true,
            ball_at_center: false,
        }
    }

    pub fn phase(&self) -> Option<GoalPhase> {
        self.phase
    }

    pub fn is_running(&self) -> bool {
        self.phase.is_some()
    }

    pub fn start(&mut self, scorer: PlayerSide) {
        self.phase = Some(GoalPhase::Rise);
        self.scorer = scorer;
        self.ball_at_center = false;
    }

    /// One frame. `scores` is the displayed score pair, refreshed from the
    /// snapshot during the rise.
    pub fn advance(&mut self, snapshot: &StateSnapshot, scores: &mut [u32; 2]) -> GoalStep {
        let step = match self.phase {
            None => return GoalStep::Idle,
            Some(GoalPhase::Rise) => self.rise(snapshot, scores),
            Some(GoalPhase::Fall) => self.fall(),
        };
        if self.t_border > 1.0 {
            self.t_border = 0.0;
        }
        step
    }

    fn rise(&mut self, snapshot: &StateSnapshot, scores: &mut [u32; 2]) -> GoalStep {
        self.ball_visible = false;
        self.ball_light = 0.0;
        self.t_border += 0.025;

        scores[self.scorer.index()] = snapshot.paddle(self.scorer).score;
        self.border_color = lerp_color(self.border_color, side_color(self.scorer), self.t_border);
        self.border_intensity += 0.1;
        if self.text_opacity < 1.0 {
            self.text_opacity += 0.015;
        }

        if self.border_intensity >= GOAL_RISE_END {
            self.phase = Some(GoalPhase::Fall);
            self.ball_opacity = 0.0;
            self.ball_at_center = true;
            self.t_border = 0.0;
        }
        GoalStep::Running
    }

    fn fall(&mut self) -> GoalStep {
        self.ball_visible = true;
        self.border_intensity -= 0.2;
        self.t_border += 0.001;
        self.ball_opacity += 0.015;
        self.ball_light += 0.01;
        self.border_color = lerp_color(self.border_color, WHITE, self.t_border);
        if self.text_opacity > 0.1 {
            self.text_opacity -= 0.02;
        } else {
            self.text_opacity = 0.0;
        }

        if self.border_intensity <= GOAL_FALL_END {
            self.border_color = WHITE;
            self.ball_opacity = 1.0;
            self.ball_light = BALL_LIGHT_REST;
            self.phase = None;
            return GoalStep::Finished;
        }
        GoalStep::Running
    }

    /// Terrain reset: white borders at resting intensity.
    pub fn reset(&mut self) {
        *self = Self::new();
        self.border_intensity = BORDER_LIGHT_RESET;
    }
}

impl Default for GoalAnimation {
    fn default() -> Self {
        Self::new()
    }
}

/// Copy of the ball that flies off through the conceding goal line.
#[derive(Debug, Clone, PartialEq)]
pub struct EjectedBall {
    pub active: bool,
    pub position: Vec3,
    pub spin: f32,
    pub emissive: f32,
    pub color: Color,
    speed: f32,
    drift_x: f32,
    direction: f32,
    wall_hit: bool,
}

impl EjectedBall {
    const ESCAPE_DISTANCE: f32 = 200.0;

    pub fn new() -> Self {
        Self {
            active: false,
            position: Vec3::ZERO,
            spin: 0.0,
            emissive: 0.0,
            color: WHITE,
            speed: 0.0,
            drift_x: 0.0,
            direction: 0.0,
            wall_hit: false,
        }
    }

    /// Launches from the ball's current position. `previous_x` is the ball's
    /// lateral position one frame earlier. Emissive and color are copied
    /// from the ball by the caller.
    pub fn launch(
        &mut self,
        position: Vec3,
        previous_x: f32,
        speed: f32,
        conceded: BorderSide,
        wall_hit: bool,
    ) {
        self.active = true;
        self.position = position;
        self.spin = 0.0;
        self.speed = speed;
        self.drift_x = previous_x - position.x;
        self.direction = match conceded {
            BorderSide::A => -1.0,
            BorderSide::B => 1.0,
        };
        self.wall_hit = wall_hit;
    }

    pub fn advance(&mut self) {
        if !self.active {
            return;
        }
        self.position.z += self.direction * self.speed * 0.29;
        self.position.x -= self.drift_x * 0.9;
        if self.wall_hit {
            self.position.y += 0.02;
            self.spin += self.direction * self.speed * 0.2;
        }
        self.emissive = (self.emissive - 0.04).max(0.0);
        if self.position.z.abs() > Self::ESCAPE_DISTANCE {
            self.active = false;
        }
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

impl Default for EjectedBall {
    fn default() -> Self {
        Self::new()
    }
}

/// Loading bar advancing through fixed milestones.
#[derive(Debug, Clone)]
pub struct LoadingProgress {
    progress: f32,
    step: usize,
}

impl LoadingProgress {
    pub const STEPS: [f32; 4] = [0.2, 0.6, 0.8, 1.0];

    pub fn new() -> Self {
        Self {
            progress: 0.0,
            step: 0,
        }
    }

    pub fn progress(&self) -> f32 {
        self.progress.min(1.0)
    }

    pub fn is_complete(&self) -> bool {
        self.step >= Self::STEPS.len()
    }

    /// Advances one frame. Returns true on the frame loading completes.
    pub fn advance(&mut self) -> bool {
        let Some(&target) = Self::STEPS.get(self.step) else {
            return false;
        };
        if self.progress < target {
            self.progress += 0.01;
        }
        // Float steps land a hair under the target.
        if self.progress >= target - 1e-4 {
            self.step += 1;
            return self.is_complete();
        }
        false
    }
}

impl Default for LoadingProgress {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use shared::{BallState, PaddleState};

    fn snapshot(last_touch: Option<PlayerSide>, goal: Option<PlayerSide>, speed: f32) -> StateSnapshot {
        StateSnapshot {
            paddle1: PaddleState { y: 0.5, score: 3 },
            paddle2: PaddleState { y: 0.5, score: 1 },
            ball: BallState {
                x: 0.5,
                y: 0.5,
                speed,
                last_touch,
            },
            goal,
            gameover: None,
            playing: goal.is_none(),
            winner: None,
            game_mode: None,
        }
    }

    #[test]
    fn test_ball_glow_floor() {
        assert_approx_eq!(ball_glow(0.1), 0.3);
        assert_approx_eq!(ball_glow(1.0), 5.0);
    }

    #[test]
    fn test_victory_pulse_range() {
        assert_approx_eq!(victory_intensity(Duration::ZERO), 20.0);
        for ms in (0..5000).step_by(37) {
            let value = victory_intensity(Duration::from_millis(ms));
            assert!((0.0..=40.0).contains(&value));
        }
    }

    #[test]
    fn test_first_touch_flashes_once() {
        let mut fx = TouchEffects::new();
        let touch = snapshot(Some(PlayerSide::One), None, 1.0);
        assert!(fx.apply(&touch));
        assert_approx_eq!(fx.paddle_light(PlayerSide::One), 15.0);
        assert!(!fx.apply(&touch));
        assert_approx_eq!(fx.paddle_light(PlayerSide::One), 20.0);

        // Rises to the peak then settles back to rest.
        for _ in 0..20 {
            fx.apply(&touch);
        }
        assert_approx_eq!(fx.paddle_light(PlayerSide::One), 10.0);
        assert_approx_eq!(fx.paddle_emissive(PlayerSide::One), 1.0);
    }

    #[test]
    fn test_touch_by_other_side_rearms_latch() {
        let mut fx = TouchEffects::new();
        assert!(fx.apply(&snapshot(Some(PlayerSide::One), None, 0.5)));
        assert!(fx.apply(&snapshot(Some(PlayerSide::Two), None, 0.5)));
        assert!(fx.apply(&snapshot(Some(PlayerSide::One), None, 0.5)));
    }

    #[test]
    fn test_no_flash_during_goal() {
        let mut fx = TouchEffects::new();
        assert!(!fx.apply(&snapshot(Some(PlayerSide::Two), Some(PlayerSide::Two), 0.5)));
        assert_approx_eq!(fx.paddle_light(PlayerSide::Two), 10.0);
    }

    #[test]
    fn test_ball_tints_toward_toucher() {
        let mut fx = TouchEffects::new();
        for _ in 0..30 {
            fx.apply(&snapshot(Some(PlayerSide::Two), None, 0.5));
        }
        assert!(fx.ball_color.r < 1.0);
        assert!(fx.ball_color.b < 1.0);
    }

    #[test]
    fn test_goal_animation_rise_then_fall() {
        let mut anim = GoalAnimation::new();
        anim.reset();
        let snap = snapshot(None, Some(PlayerSide::One), 0.6);
        let mut scores = [0, 0];
        anim.start(PlayerSide::One);

        let mut frames = 0;
        while anim.phase() == Some(GoalPhase::Rise) {
            assert_eq!(anim.advance(&snap, &mut scores), GoalStep::Running);
            frames += 1;
        }
        // 5.0 -> 15.0 in steps of 0.1
        assert!((99..=101).contains(&frames));
        assert_eq!(scores, [3, 0]);
        assert!(anim.ball_at_center);
        assert!(anim.text_opacity > 0.9);

        let mut last = GoalStep::Running;
        while last == GoalStep::Running {
            last = anim.advance(&snap, &mut scores);
        }
        assert_eq!(last, GoalStep::Finished);
        assert_eq!(anim.border_color, WHITE);
        assert_approx_eq!(anim.ball_light, 0.5);
        assert_eq!(anim.advance(&snap, &mut scores), GoalStep::Idle);
    }

    #[test]
    fn test_ejected_ball_leaves_through_conceding_side() {
        let mut ball = EjectedBall::new();
        ball.launch(
            Vec3::new(1.0, 0.025, 7.4),
            1.2,
            0.8,
            BorderSide::B,
            true,
        );
        ball.emissive = 1.0;
        ball.advance();
        assert!(ball.position.z > 7.4);
        // Keeps drifting the way the ball was moving.
        assert!(ball.position.x < 1.0);
        assert!(ball.position.y > 0.025);
        assert_approx_eq!(ball.emissive, 0.96);
        for _ in 0..2000 {
            ball.advance();
        }
        assert!(!ball.active);
    }

    #[test]
    fn test_loading_progress_completes_once() {
        let mut loading = LoadingProgress::new();
        let mut completions = 0;
        for _ in 0..200 {
            if loading.advance() {
                completions += 1;
            }
        }
        assert_eq!(completions, 1);
        assert!(loading.is_complete());
        assert_approx_eq!(loading.progress(), 1.0, 0.02);
    }
}
