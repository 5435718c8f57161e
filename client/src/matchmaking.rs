//! Matchmaking against the game service
//!
//! [`GameService`] resolves a game uid over HTTP (join, then create) and
//! fetches a guest credential when the player has none. [`MatchmakingWait`]
//! is the wait for an opponent once the connection is open; the driver polls
//! it once per frame so the render loop keeps running.

use crate::error::ClientError;
use crate::game::GameMode;
use log::{debug, info, warn};
use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::StatusCode;
use serde::Deserialize;
use shared::{MatchmakingSignal, UidResponse};
use std::time::{Duration, Instant};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(250);
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// URLs of the game service on one host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub host: String,
    pub port: u16,
}

impl Endpoints {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    pub fn join_url(&self, mode: &GameMode) -> String {
        format!(
            "https://{}:{}/game/join/?mode={}&option={}",
            self.host,
            self.port,
            mode.wire_mode(),
            mode.option()
        )
    }

    pub fn create_url(&self, mode: &GameMode) -> String {
        format!(
            "https://{}:{}/game/create/?mode={}&option={}",
            self.host,
            self.port,
            mode.wire_mode(),
            mode.option()
        )
    }

    pub fn socket_url(&self, uid: &str) -> String {
        format!("wss://{}:{}/ws/pong/{}/", self.host, self.port, uid)
    }

    pub fn guest_token_url(&self) -> String {
        format!("https://{}:{}/auth/getguesttoken/", self.host, self.port)
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum GuestTokenResponse {
    Bare(String),
    Wrapped {
        #[serde(alias = "token")]
        access_token: Option<String>,
        error: Option<String>,
    },
}

pub struct GameService {
    http: reqwest::Client,
    endpoints: Endpoints,
}

impl GameService {
    pub fn new(endpoints: Endpoints, insecure_tls: bool) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .danger_accept_invalid_certs(insecure_tls)
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self { http, endpoints })
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    async fn request_uid(&self, url: &str, token: &str) -> Result<(StatusCode, UidResponse), ClientError> {
        debug!("GET {}", url);
        let response = self
            .http
            .get(url)
            .header(ACCEPT, "application/json")
            .header(AUTHORIZATION, token)
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;
        let parsed = serde_json::from_str::<UidResponse>(&body).unwrap_or_default();
        Ok((status, parsed))
    }

    /// Joins a waiting game. `Ok(None)` means there was nothing to join.
    pub async fn join(&self, mode: &GameMode, token: &str) -> Result<Option<String>, ClientError> {
        let (status, body) = self.request_uid(&self.endpoints.join_url(mode), token).await?;
        match status {
            StatusCode::OK => Ok(body.uid.filter(|uid| uid != "error")),
            StatusCode::NOT_FOUND => Ok(None),
            other => Err(ClientError::Http(
                body.error.unwrap_or_else(|| format!("join failed with status {}", other)),
            )),
        }
    }

    pub async fn create(&self, mode: &GameMode, token: &str) -> Result<String, ClientError> {
        let (status, body) = self.request_uid(&self.endpoints.create_url(mode), token).await?;
        match (status, body.uid) {
            (StatusCode::OK, Some(uid)) => Ok(uid),
            (other, _) => Err(ClientError::Http(
                body.error.unwrap_or_else(|| format!("create failed with status {}", other)),
            )),
        }
    }

    /// Uid of the game to connect to. Only a LAN match tries to join first.
    pub async fn resolve_uid(&self, mode: &GameMode, token: &str) -> Result<String, ClientError> {
        if mode.joins_first() {
            if let Some(uid) = self.join(mode, token).await? {
                info!("Joined waiting game {}", uid);
                return Ok(uid);
            }
            debug!("No game to join, creating one");
        }
        let uid = self.create(mode, token).await?;
        info!("Created game {}", uid);
        Ok(uid)
    }

    pub async fn guest_token(&self) -> Result<String, ClientError> {
        let response = self
            .http
            .get(self.endpoints.guest_token_url())
            .send()
            .await?;
        match response.json::<GuestTokenResponse>().await? {
            GuestTokenResponse::Bare(token) => Ok(token),
            GuestTokenResponse::Wrapped {
                access_token: Some(token),
                ..
            } => Ok(token),
            GuestTokenResponse::Wrapped { error, .. } => Err(ClientError::Credential(
                error.unwrap_or_else(|| "no guest token in response".to_string()),
            )),
        }
    }
}

#[derive(Debug)]
pub enum WaitOutcome {
    Pending,
    Ready,
    Failed(ClientError),
}

/// Wait for an opponent, evaluated once per frame.
///
/// The latest matchmaking signal is inspected every poll interval and
/// cleared afterwards; the whole wait fails after the timeout.
pub struct MatchmakingWait {
    mode: GameMode,
    started: Instant,
    last_poll: Instant,
    interval: Duration,
    timeout: Duration,
    status: Option<MatchmakingSignal>,
}

impl MatchmakingWait {
    pub fn new(mode: GameMode, now: Instant, interval: Duration, timeout: Duration) -> Self {
        Self {
            mode,
            started: now,
            last_poll: now,
            interval,
            timeout,
            status: None,
        }
    }

    pub fn record(&mut self, signal: MatchmakingSignal) {
        debug!("Matchmaking signal: {:?}", signal);
        self.status = Some(signal);
    }

    pub fn poll(&mut self, now: Instant, connection_open: bool) -> WaitOutcome {
        if now.duration_since(self.started) >= self.timeout {
            warn!("Matchmaking timed out after {:?}", self.timeout);
            return WaitOutcome::Failed(ClientError::MatchmakingTimeout);
        }
        if now.duration_since(self.last_poll) < self.interval {
            return WaitOutcome::Pending;
        }
        self.last_poll = now;

        let status = self.status.take();
        if !connection_open {
            return WaitOutcome::Failed(ClientError::ConnectionLost);
        }
        match status {
            Some(MatchmakingSignal::Timeout) | Some(MatchmakingSignal::SameJwt) => {
                WaitOutcome::Failed(ClientError::OpponentUnavailable {
                    mode: self.mode.clone(),
                })
            }
            Some(MatchmakingSignal::OpponentConnected) => WaitOutcome::Ready,
            None => WaitOutcome::Pending,
        }
    }
}
