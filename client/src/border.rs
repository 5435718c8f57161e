//! Destructible goal-line borders
//!
//! Forty cosmetic segments, twenty behind each paddle, break away when a
//! goal is scored through them. The reaction is local only: the server never
//! hears about it, so it only has to be deterministic for a given snapshot.

use macroquad::math::Vec3;
use shared::{PlayerSide, SEGMENTS_PER_SIDE, SEGMENT_COUNT, SEGMENT_WIDTH};

/// Minimum ball speed for a goal to break a segment.
pub const BREAK_SPEED: f32 = 0.45;
/// Lateral positions at or past this value use the fallback segment.
pub const FALLBACK_LATERAL: f32 = 9.75;
const SPEED_FACTOR: f32 = 0.003;
const DRIFT_Y: f32 = 0.0005;
const DRIFT_Z: f32 = 0.003;
const BORDER_Y: f32 = 0.025;
const BORDER_Z: f32 = 7.55;

/// Which goal line a segment belongs to. Side A sits behind paddle 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BorderSide {
    A,
    B,
}

impl BorderSide {
    /// The line the ball crosses when `scorer` gets the point.
    pub fn conceded_by(scorer: PlayerSide) -> Self {
        match scorer {
            PlayerSide::One => BorderSide::B,
            PlayerSide::Two => BorderSide::A,
        }
    }

    fn base_index(self) -> usize {
        match self {
            BorderSide::A => 0,
            BorderSide::B => SEGMENTS_PER_SIDE,
        }
    }

    fn fallback_index(self) -> usize {
        self.base_index() + SEGMENTS_PER_SIDE - 1
    }

    /// Impact direction from the rounding remainder. The two lines use
    /// opposite sign conventions.
    fn impact_side(self, lateral: f32) -> i8 {
        let shifted = lateral + 1.0;
        let remainder = shifted - round05(shifted);
        match self {
            BorderSide::A => {
                if remainder > 0.0 {
                    -1
                } else {
                    1
                }
            }
            BorderSide::B => {
                if remainder < 0.0 {
                    -1
                } else {
                    1
                }
            }
        }
    }

    /// Sign applied to rotation and vertical drift for a positive impact.
    fn spin_sign(self) -> f32 {
        match self {
            BorderSide::A => -1.0,
            BorderSide::B => 1.0,
        }
    }

    fn fall_direction(self) -> f32 {
        match self {
            BorderSide::A => -1.0,
            BorderSide::B => 1.0,
        }
    }
}

/// Rounds to the nearest half unit, ties toward positive infinity.
pub fn round05(value: f32) -> f32 {
    (value * 2.0 + 0.5).floor() * 0.5
}

#[derive(Debug, Clone, PartialEq)]
pub struct BorderSegment {
    pub index: usize,
    pub side: BorderSide,
    pub broken: bool,
    pub impact_side: i8,
    pub reaction_speed: f32,
    pub position: Vec3,
    /// Euler angles (x, y, z).
    pub rotation: Vec3,
    origin: Vec3,
}

impl BorderSegment {
    fn pristine(index: usize) -> Self {
        let (side, slot, z) = if index < SEGMENTS_PER_SIDE {
            (BorderSide::A, index, -BORDER_Z)
        } else {
            (BorderSide::B, index - SEGMENTS_PER_SIDE, BORDER_Z)
        };
        let origin = Vec3::new(-4.75 + slot as f32 * SEGMENT_WIDTH, BORDER_Y, z);
        Self {
            index,
            side,
            broken: false,
            impact_side: 0,
            reaction_speed: 0.0,
            position: origin,
            rotation: Vec3::ZERO,
            origin,
        }
    }

    fn break_away(&mut self, lateral: f32, ball_speed: f32) {
        self.broken = true;
        self.impact_side = self.side.impact_side(lateral);
        self.reaction_speed = ball_speed * SPEED_FACTOR;
    }

    fn advance(&mut self) {
        if !self.broken {
            return;
        }
        let step = self.side.spin_sign() * self.impact_side as f32;
        self.rotation.z += step * self.reaction_speed;
        self.rotation.y += step * self.reaction_speed;
        self.position.y += step * DRIFT_Y;
        self.position.z += self.side.fall_direction() * DRIFT_Z;
    }

    fn reset(&mut self) {
        self.broken = false;
        self.impact_side = 0;
        self.reaction_speed = 0.0;
        self.position = self.origin;
        self.rotation = Vec3::ZERO;
    }
}

/// Owns and animates all border segments.
pub struct BorderHitSimulator {
    segments: Vec<BorderSegment>,
}

impl BorderHitSimulator {
    pub fn new() -> Self {
        Self {
            segments: (0..SEGMENT_COUNT).map(BorderSegment::pristine).collect(),
        }
    }

    /// Segment hit by a ball crossing `side` at `lateral` (0..10 across the field).
    pub fn segment_index(side: BorderSide, lateral: f32) -> usize {
        if lateral >= FALLBACK_LATERAL {
            return side.fallback_index();
        }
        let zone = round05(lateral) * 2.0;
        if zone < 0.0 {
            return side.fallback_index();
        }
        side.base_index() + (zone as usize).min(SEGMENTS_PER_SIDE - 1)
    }

    /// Reacts to a goal edge. Returns the index of the segment that broke, if
    /// any; a segment that is already broken is left untouched.
    pub fn on_goal(&mut self, scorer: PlayerSide, ball_world_x: f32, ball_speed: f32) -> Option<usize> {
        if ball_speed <= BREAK_SPEED || !ball_world_x.is_finite() {
            return None;
        }
        let side = BorderSide::conceded_by(scorer);
        let lateral = ball_world_x + shared::PLAY_WIDTH / 2.0;
        let index = Self::segment_index(side, lateral);
        let segment = &mut self.segments[index];
        if segment.broken {
            return None;
        }
        segment.break_away(lateral, ball_speed);
        Some(index)
    }

    /// Advances every broken segment by one frame.
    pub fn advance(&mut self) {
        for segment in &mut self.segments {
            segment.advance();
        }
    }

    pub fn reset(&mut self) {
        for segment in &mut self.segments {
            segment.reset();
        }
    }

    pub fn segments(&self) -> &[BorderSegment] {
        &self.segments
    }

    pub fn segment(&self, index: usize) -> Option<&BorderSegment> {
        self.segments.get(index)
    }

    pub fn broken_count(&self) -> usize {
        self.segments.iter().filter(|s| s.broken).count()
    }
}

impl Default for BorderHitSimulator {
    fn default() -> Self {
        Self::new()
    }
}
