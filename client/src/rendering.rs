use crate::border::BorderSegment;
use crate::error::ClientError;
use crate::game::GameMode;
use crate::state::SessionState;
use macroquad::prelude::*;
use std::time::{Duration, Instant};

pub const MIN_VIEWPORT: (f32, f32) = (426.0, 240.0);
pub const MAX_VIEWPORT: (f32, f32) = (3840.0, 2160.0);

const ALERT_LIFETIME: Duration = Duration::from_secs(4);
const NAMES_LIFETIME: Duration = Duration::from_secs(3);
const SPACE: Color = Color::new(0.01, 0.01, 0.04, 1.0);
const TERRAIN: Color = Color::new(0.08, 0.08, 0.1, 1.0);

#[derive(Debug, Clone, PartialEq)]
pub struct PaddleView {
    pub position: Vec3,
    pub color: Color,
    pub light: f32,
    pub emissive: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BallView {
    pub position: Vec3,
    pub color: Color,
    pub opacity: f32,
    pub glow: f32,
    pub visible: bool,
}

/// Everything the surface needs to draw one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneFrame {
    pub state: SessionState,
    pub loading: f32,
    pub menu_visible: bool,
    pub camera_position: Vec3,
    pub camera_jitter: Vec3,
    pub paddles: [PaddleView; 2],
    pub ball: BallView,
    pub ejected: Option<BallView>,
    pub segments: Vec<BorderSegment>,
    pub border_color: Color,
    pub border_intensity: f32,
    pub scores: [u32; 2],
    pub score_opacity: f32,
    /// Winner announcement, shown until dismissed.
    pub banner: Option<String>,
}

/// One-shot messages for the player.
#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    Alert(String),
    PlayerNames([String; 2]),
    MatchmakingStarted(GameMode),
    MatchmakingFinished,
}

/// Where finished frames go. The driver never lets a surface error escape
/// its frame.
pub trait PresentationSurface {
    fn present(&mut self, frame: &SceneFrame) -> Result<(), ClientError>;
    fn notify(&mut self, notice: Notice);
}

pub fn check_viewport(width: f32, height: f32) -> Result<(), ClientError> {
    let inside = width > MIN_VIEWPORT.0
        && height > MIN_VIEWPORT.1
        && width < MAX_VIEWPORT.0
        && height < MAX_VIEWPORT.1;
    if inside {
        Ok(())
    } else {
        Err(ClientError::LocalPrecondition("viewport size"))
    }
}

fn scaled(color: Color, factor: f32) -> Color {
    Color::new(
        (color.r * factor).min(1.0),
        (color.g * factor).min(1.0),
        (color.b * factor).min(1.0),
        color.a,
    )
}

pub struct Renderer {
    aspect: f32,
    alerts: Vec<(String, Instant)>,
    names: Option<([String; 2], Instant)>,
    matchmaking: Option<GameMode>,
}

impl Renderer {
    pub fn new(width: f32, height: f32) -> Result<Self, ClientError> {
        check_viewport(width, height)?;
        Ok(Renderer {
            aspect: width / height,
            alerts: Vec::new(),
            names: None,
            matchmaking: None,
        })
    }

    /// Keeps the last accepted projection when the window leaves the
    /// supported range.
    fn update_projection(&mut self, width: f32, height: f32) -> Result<(), ClientError> {
        check_viewport(width, height)?;
        self.aspect = width / height;
        Ok(())
    }

    fn draw_world(&self, frame: &SceneFrame) {
        let target = frame.camera_jitter * 10.0;
        set_camera(&Camera3D {
            position: frame.camera_position,
            target,
            up: vec3(0.0, 1.0, 0.0),
            aspect: Some(self.aspect),
            ..Default::default()
        });

        draw_plane(vec3(0.0, 0.0, 0.0), vec2(5.0, 7.5), None, TERRAIN);

        let border = scaled(frame.border_color, 0.4 + frame.border_intensity / 25.0);
        draw_cube(vec3(5.05, 0.05, 0.0), vec3(0.1, 0.1, 15.2), None, border);
        draw_cube(vec3(-5.05, 0.05, 0.0), vec3(0.1, 0.1, 15.2), None, border);
        draw_line_3d(vec3(-5.0, 0.001, 0.0), vec3(5.0, 0.001, 0.0), GRAY);

        for segment in &frame.segments {
            let color = if segment.broken { scaled(border, 0.6) } else { border };
            draw_cube(segment.position, vec3(0.48, 0.05, 0.05), None, color);
        }

        for paddle in &frame.paddles {
            let color = scaled(paddle.color, 0.5 + paddle.emissive * 0.5);
            draw_cube(paddle.position, vec3(1.66, 0.1, 0.1), None, color);
        }

        if frame.ball.visible {
            self.draw_ball(&frame.ball);
        }
        if let Some(ejected) = &frame.ejected {
            self.draw_ball(ejected);
        }
    }

    fn draw_ball(&self, ball: &BallView) {
        let mut color = scaled(ball.color, 0.6 + ball.glow * 0.2);
        color.a = ball.opacity.clamp(0.0, 1.0);
        draw_sphere(ball.position, 0.1, None, color);
    }

    fn draw_overlay(&mut self, frame: &SceneFrame) {
        set_default_camera();
        let width = screen_width();
        let height = screen_height();

        match frame.state {
            SessionState::Loading => {
                let bar = width * 0.4;
                draw_rectangle_lines((width - bar) / 2.0, height / 2.0, bar, 12.0, 1.0, WHITE);
                draw_rectangle((width - bar) / 2.0, height / 2.0, bar * frame.loading, 12.0, WHITE);
            }
            SessionState::PressStart => {
                draw_centered("Press any key to start", height / 2.0, 32.0, WHITE);
            }
            SessionState::MainMenu if frame.menu_visible => {
                draw_centered("ASTROPONG", height * 0.3, 48.0, WHITE);
                let lines = [
                    "1 / 2 / 3  -  vs AI (easy / medium / hard)",
                    "4  -  online match",
                    "5  -  shared keyboard",
                    "6  -  tournament match",
                ];
                for (i, line) in lines.iter().enumerate() {
                    draw_centered(line, height * 0.45 + i as f32 * 28.0, 22.0, LIGHTGRAY);
                }
            }
            SessionState::InGame | SessionState::Goal => {
                if frame.score_opacity > 0.0 {
                    let mut color = WHITE;
                    color.a = frame.score_opacity.min(1.0);
                    let text = format!("{}  -  {}", frame.scores[0], frame.scores[1]);
                    draw_centered(&text, height * 0.2, 64.0, color);
                }
            }
            _ => {}
        }

        if let Some(mode) = &self.matchmaking {
            let text = if mode.is_pve() {
                "Waiting for the AI..."
            } else {
                "Looking for an opponent..."
            };
            draw_centered(text, height * 0.85, 24.0, YELLOW);
        }

        let now = Instant::now();
        if let Some((names, shown)) = &self.names {
            if now.duration_since(*shown) < NAMES_LIFETIME {
                draw_text(&names[0], 20.0, height - 30.0, 28.0, WHITE);
                let size = measure_text(&names[1], None, 28, 1.0);
                draw_text(&names[1], width - size.width - 20.0, height - 30.0, 28.0, WHITE);
            }
        }

        if let Some(banner) = &frame.banner {
            draw_centered(banner, height / 2.0, 56.0, WHITE);
            draw_centered("Click to continue", height / 2.0 + 40.0, 20.0, LIGHTGRAY);
        }

        self.alerts
            .retain(|(_, raised)| now.duration_since(*raised) < ALERT_LIFETIME);
        for (i, (text, _)) in self.alerts.iter().enumerate() {
            draw_text(text, 20.0, 30.0 + i as f32 * 24.0, 22.0, RED);
        }
    }
}

fn draw_centered(text: &str, y: f32, size: f32, color: Color) {
    let dims = measure_text(text, None, size as u16, 1.0);
    draw_text(text, (screen_width() - dims.width) / 2.0, y, size, color);
}

impl PresentationSurface for Renderer {
    fn present(&mut self, frame: &SceneFrame) -> Result<(), ClientError> {
        let projection = self.update_projection(screen_width(), screen_height());
        clear_background(SPACE);
        if matches!(frame.state, SessionState::InGame | SessionState::Goal)
            || frame.camera_position.length() < 1000.0
        {
            self.draw_world(frame);
        }
        self.draw_overlay(frame);
        projection
    }

    fn notify(&mut self, notice: Notice) {
        match notice {
            Notice::Alert(text) => self.alerts.push((text, Instant::now())),
            Notice::PlayerNames(names) => self.names = Some((names, Instant::now())),
            Notice::MatchmakingStarted(mode) => self.matchmaking = Some(mode),
            Notice::MatchmakingFinished => self.matchmaking = None,
        }
    }
}
