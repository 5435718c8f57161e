//! # AstroPong Client Library
//!
//! This library is the client core of a networked 3D Pong game. The server
//! is authoritative: it runs the simulation and streams snapshots, and the
//! client turns those snapshots into a scene, plays the local cosmetic
//! effects, and forwards paddle input.
//!
//! ## Architecture Overview
//!
//! Everything that mutates session state runs on the render thread, once per
//! display refresh, inside [`driver::RenderDriver::tick`]. Network I/O runs
//! on a tokio runtime and talks to the frame loop through channels, so a
//! slow connection never stalls a frame.
//!
//! ### Session State
//! [`state::SessionStateMachine`] owns the screen the player is on (loading,
//! press start, main menu, in game, goal). Transitions never perform side
//! effects themselves; they return [`state::SessionAction`]s that the driver
//! carries out.
//!
//! ### Snapshot Reconciliation
//! Inbound frames are decoded by the `shared` crate and applied to the one
//! [`game::SessionContext`] by [`reconciler::SnapshotReconciler`]. The
//! greeting and names handshakes are applied once per session.
//!
//! ### Cooperative Waits
//! Waiting for an opponent, for the tournament names, for the camera to
//! settle or for the server to acknowledge a goal resume are all conditions
//! polled once per frame, each with an explicit budget.
//!
//! ## Module Organization
//!
//! ### Network Module (`network`)
//! - `Transport` abstraction over the websocket
//! - One background task per connection, fire-and-forget sends
//! - Coalesced, idempotent close
//!
//! ### Matchmaking Module (`matchmaking`)
//! - Game uid via the HTTP join/create endpoints
//! - Guest credentials
//! - The polled wait for an opponent
//!
//! ### Input Module (`input`)
//! - Key transitions to per-player intents
//! - Bounded outbound queue drained at a fixed rate
//!
//! ### Scene Modules (`border`, `camera`, `effects`)
//! - Destructible goal-line segments
//! - Camera flights and shake
//! - Hit flashes, goal light oscillation, ejected ball, victory pulse
//!
//! ### Rendering Module (`rendering`)
//! - The `PresentationSurface` boundary and the `SceneFrame` handed to it
//! - A macroquad implementation
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::config::ClientConfig;
//! use client::driver::{FrameInput, RenderDriver, ServiceConnector};
//! use client::rendering::Renderer;
//! use std::sync::Arc;
//! use std::time::Instant;
//!
//! # fn run(runtime: &tokio::runtime::Runtime) -> Result<(), client::error::ClientError> {
//! let config = ClientConfig::default();
//! let connector = Arc::new(ServiceConnector::new(&config)?);
//! let mut driver = RenderDriver::new(config, runtime.handle().clone(), connector);
//! let mut surface = Renderer::new(1280.0, 720.0)?;
//!
//! // Once per display refresh
//! driver.tick(&FrameInput::at(Instant::now()), &mut surface);
//! # Ok(())
//! # }
//! ```

pub mod border;
pub mod camera;
pub mod config;
pub mod driver;
pub mod effects;
pub mod error;
pub mod game;
pub mod input;
pub mod matchmaking;
pub mod network;
pub mod reconciler;
pub mod rendering;
pub mod state;
