//! Camera flights between the orbit view and the terrain, plus shake
//!
//! Both flights are conditions evaluated once per frame. A flight that has
//! not settled within its frame budget snaps to the target so the session
//! can never stall on a camera that stopped moving.

use log::warn;
use macroquad::math::Vec3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub const TERRAIN_POSITION: Vec3 = Vec3::new(-11.0, 12.0, 0.0);
pub const MENU_POSITION: Vec3 = Vec3::new(-14_069_703.335, 16_848_469.744, 0.0);
pub const DEFAULT_SETTLE_BUDGET: u32 = 1800;

const TERRAIN_SETTLE_DISTANCE: f32 = 0.5;
const MENU_SETTLE_DISTANCE: f32 = 550_000.0;
const FAR_DISTANCE: f32 = 100.0;
const INITIAL_PROGRESS: f32 = 0.0001;
const MAX_PROGRESS: f32 = 0.025;
const MAX_TRANSIT_SHAKE: f32 = 0.005;
const MENU_LERP: f32 = 0.02;
const BASE_SHAKE_INTENSITY: f32 = 0.002;

/// Shake lengths in frames.
pub const TOUCH_SHAKE_FRAMES: u32 = 10;
pub const GOAL_SHAKE_FRAMES: u32 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flight {
    ToTerrain,
    ToMenu,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraEvent {
    SettledOnTerrain,
    SettledOnMenu,
}

pub struct CameraRig {
    pub position: Vec3,
    /// Euler angles used for the shake jitter.
    pub rotation: Vec3,
    flight: Option<Flight>,
    move_progress: f32,
    transit_shake: f32,
    frames_in_flight: u32,
    settle_budget: u32,
    shake_frames: u32,
    shake_intensity: f32,
    rng: StdRng,
}

impl CameraRig {
    pub fn new(settle_budget: u32) -> Self {
        Self::with_rng(settle_budget, StdRng::from_entropy())
    }

    pub fn with_rng(settle_budget: u32, rng: StdRng) -> Self {
        Self {
            position: MENU_POSITION,
            rotation: Vec3::ZERO,
            flight: None,
            move_progress: INITIAL_PROGRESS,
            transit_shake: INITIAL_PROGRESS,
            frames_in_flight: 0,
            settle_budget,
            shake_frames: 0,
            shake_intensity: BASE_SHAKE_INTENSITY,
            rng,
        }
    }

    pub fn flight(&self) -> Option<Flight> {
        self.flight
    }

    pub fn fly_to_terrain(&mut self) {
        self.start(Flight::ToTerrain);
    }

    pub fn fly_to_menu(&mut self) {
        self.start(Flight::ToMenu);
    }

    fn start(&mut self, flight: Flight) {
        self.flight = Some(flight);
        self.move_progress = INITIAL_PROGRESS;
        self.transit_shake = INITIAL_PROGRESS;
        self.frames_in_flight = 0;
    }

    fn jitter(&mut self, amount: f32) {
        self.rotation.x += amount * (self.rng.gen::<f32>() - 0.5);
        self.rotation.y += amount * (self.rng.gen::<f32>() - 0.5);
        self.rotation.z += amount * (self.rng.gen::<f32>() - 0.5);
    }

    /// Advances the current flight by one frame.
    pub fn advance_flight(&mut self) -> Option<CameraEvent> {
        let flight = self.flight?;
        self.frames_in_flight += 1;
        let over_budget = self.frames_in_flight > self.settle_budget;

        match flight {
            Flight::ToTerrain => {
                let distance = self.position.distance(TERRAIN_POSITION);
                if distance < TERRAIN_SETTLE_DISTANCE || over_budget {
                    if over_budget {
                        warn!("Camera did not settle on the terrain, snapping");
                    }
                    self.position = TERRAIN_POSITION;
                    self.rotation = Vec3::ZERO;
                    self.flight = None;
                    return Some(CameraEvent::SettledOnTerrain);
                }
                self.position = self.position.lerp(TERRAIN_POSITION, self.move_progress);
                let transit = self.transit_shake;
                self.jitter(transit);

                if self.position.distance(TERRAIN_POSITION) > FAR_DISTANCE {
                    if self.move_progress < MAX_PROGRESS {
                        self.move_progress += 0.0003;
                    }
                    if self.transit_shake < MAX_TRANSIT_SHAKE {
                        self.transit_shake += 0.0005;
                    }
                } else {
                    if self.move_progress > 0.0 {
                        self.move_progress -= 0.00003;
                    }
                    if self.transit_shake > 0.0 {
                        self.transit_shake -= 0.00005;
                    }
                }
                None
            }
            Flight::ToMenu => {
                let distance = self.position.distance(MENU_POSITION);
                if distance < MENU_SETTLE_DISTANCE || over_budget {
                    if over_budget {
                        self.position = MENU_POSITION;
                    }
                    self.rotation = Vec3::ZERO;
                    self.flight = None;
                    return Some(CameraEvent::SettledOnMenu);
                }
                self.position = self.position.lerp(MENU_POSITION, MENU_LERP);
                None
            }
        }
    }

    /// Queues a shake of `frames` frames.
    pub fn shake(&mut self, frames: u32) {
        self.shake_frames = frames;
    }

    pub fn is_shaking(&self) -> bool {
        self.shake_frames > 0
    }

    /// One shake step. Only called while play is live; a pending shake waits
    /// otherwise.
    pub fn advance_shake(&mut self, ball_speed: f32) {
        if self.shake_frames == 0 {
            return;
        }
        let saved = ball_speed * 0.01;
        let intensity = self.shake_intensity;
        self.jitter(intensity);
        self.shake_intensity -= saved * 0.05;
        self.shake_frames -= 1;
        if self.shake_frames == 0 {
            self.shake_intensity = saved;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    fn rig(budget: u32) -> CameraRig {
        CameraRig::with_rng(budget, StdRng::seed_from_u64(7))
    }

    fn fly(rig: &mut CameraRig) -> (u32, CameraEvent) {
        let mut frames = 0;
        loop {
            frames += 1;
            if let Some(event) = rig.advance_flight() {
                return (frames, event);
            }
        }
    }

    #[test]
    fn test_flight_to_terrain_settles() {
        let mut rig = rig(DEFAULT_SETTLE_BUDGET);
        rig.fly_to_terrain();
        let (frames, event) = fly(&mut rig);
        assert_eq!(event, CameraEvent::SettledOnTerrain);
        assert!(frames > 100);
        assert!(rig.position.distance(TERRAIN_POSITION) < 0.5);
        assert!(rig.flight().is_none());
    }

    #[test]
    fn test_flight_snaps_when_budget_exhausted() {
        let mut rig = rig(5);
        rig.fly_to_terrain();
        let (frames, event) = fly(&mut rig);
        assert_eq!(event, CameraEvent::SettledOnTerrain);
        assert_eq!(frames, 6);
        assert_approx_eq!(rig.position.x, TERRAIN_POSITION.x);
        assert_approx_eq!(rig.position.y, TERRAIN_POSITION.y);
    }

    #[test]
    fn test_flight_to_menu() {
        let mut rig = rig(DEFAULT_SETTLE_BUDGET);
        rig.position = TERRAIN_POSITION;
        rig.fly_to_menu();
        let (_, event) = fly(&mut rig);
        assert_eq!(event, CameraEvent::SettledOnMenu);
        assert!(rig.position.distance(MENU_POSITION) < 550_000.0);
    }

    #[test]
    fn test_no_flight_no_event() {
        let mut rig = rig(DEFAULT_SETTLE_BUDGET);
        assert_eq!(rig.advance_flight(), None);
    }

    #[test]
    fn test_shake_counts_down_and_restores_intensity() {
        let mut rig = rig(DEFAULT_SETTLE_BUDGET);
        rig.shake(TOUCH_SHAKE_FRAMES);
        for _ in 0..TOUCH_SHAKE_FRAMES {
            assert!(rig.is_shaking());
            rig.advance_shake(0.5);
        }
        assert!(!rig.is_shaking());
        assert_approx_eq!(rig.shake_intensity, 0.005);
        assert!(rig.rotation.length() > 0.0);
    }
}
