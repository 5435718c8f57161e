use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Lateral width of the play field in world units.
pub const PLAY_WIDTH: f32 = 10.0;
/// Length of the play field along the ball's travel axis.
pub const PLAY_LENGTH: f32 = 15.0;
pub const SEGMENTS_PER_SIDE: usize = 20;
pub const SEGMENT_COUNT: usize = SEGMENTS_PER_SIDE * 2;
pub const SEGMENT_WIDTH: f32 = 0.5;
/// Name the server uses for the computer opponent.
pub const AI_NAME: &str = "AI";
pub const FRONT_SENDER: &str = "front";

/// One of the two paddles. Serialized on the wire as `"1"` / `"2"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlayerSide {
    One,
    Two,
}

impl PlayerSide {
    pub fn tag(self) -> &'static str {
        match self {
            PlayerSide::One => "1",
            PlayerSide::Two => "2",
        }
    }

    pub fn player_tag(self) -> &'static str {
        match self {
            PlayerSide::One => "p1",
            PlayerSide::Two => "p2",
        }
    }

    pub fn opponent(self) -> PlayerSide {
        match self {
            PlayerSide::One => PlayerSide::Two,
            PlayerSide::Two => PlayerSide::One,
        }
    }

    pub fn index(self) -> usize {
        match self {
            PlayerSide::One => 0,
            PlayerSide::Two => 1,
        }
    }

    /// Accepts the tags the server is known to use: `"1"`, `"p1"`, `1`.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => match s.as_str() {
                "1" | "p1" => Some(PlayerSide::One),
                "2" | "p2" => Some(PlayerSide::Two),
                _ => None,
            },
            Value::Number(n) => match n.as_u64() {
                Some(1) => Some(PlayerSide::One),
                Some(2) => Some(PlayerSide::Two),
                _ => None,
            },
            _ => None,
        }
    }
}

impl Serialize for PlayerSide {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.player_tag())
    }
}

fn lenient_side<'de, D>(deserializer: D) -> Result<Option<PlayerSide>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(PlayerSide::from_value(&value))
}

/// Messages the client sends. Every message carries `sender: "front"` once
/// encoded through [`ClientMessage::to_wire`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    #[serde(rename = "greetings")]
    Greetings {
        #[serde(skip_serializing_if = "Option::is_none")]
        name: Option<[String; 2]>,
    },
    #[serde(rename = "start")]
    Start { data: String },
    #[serde(rename = "keyDown")]
    KeyDown {
        player: PlayerSide,
        value: [i8; 2],
        active: bool,
    },
    #[serde(rename = "resumeOnGoal")]
    ResumeOnGoal,
    #[serde(rename = "disconnect")]
    Disconnect,
}

impl ClientMessage {
    pub fn start() -> Self {
        ClientMessage::Start {
            data: "init".to_string(),
        }
    }

    pub fn key_down(player: PlayerSide, value: [i8; 2]) -> Self {
        ClientMessage::KeyDown {
            player,
            value,
            active: true,
        }
    }

    pub fn to_wire(&self) -> Result<String, serde_json::Error> {
        let mut value = serde_json::to_value(self)?;
        if let Value::Object(map) = &mut value {
            map.insert("sender".to_string(), Value::from(FRONT_SENDER));
        }
        serde_json::to_string(&value)
    }
}

/// Transient control signal received while waiting for a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchmakingSignal {
    OpponentConnected,
    Timeout,
    SameJwt,
}

impl MatchmakingSignal {
    fn from_type(kind: &str) -> Option<Self> {
        match kind {
            "opponent_connected" => Some(MatchmakingSignal::OpponentConnected),
            "timeout" => Some(MatchmakingSignal::Timeout),
            "same_jwt" => Some(MatchmakingSignal::SameJwt),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PaddleState {
    pub y: f32,
    #[serde(default)]
    pub score: u32,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BallState {
    pub x: f32,
    pub y: f32,
    #[serde(default)]
    pub speed: f32,
    #[serde(default, rename = "lastTouch", deserialize_with = "lenient_side")]
    pub last_touch: Option<PlayerSide>,
}

/// One authoritative game-state tick.
///
/// `goal` names the side credited with the goal that just happened; the
/// server sends the literal `"None"` between goals, which maps to `None`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StateSnapshot {
    pub paddle1: PaddleState,
    pub paddle2: PaddleState,
    pub ball: BallState,
    #[serde(default, deserialize_with = "lenient_side")]
    pub goal: Option<PlayerSide>,
    #[serde(default)]
    pub gameover: Option<String>,
    #[serde(default)]
    pub playing: bool,
    #[serde(default, deserialize_with = "lenient_side")]
    pub winner: Option<PlayerSide>,
    #[serde(default)]
    pub game_mode: Option<String>,
}

impl StateSnapshot {
    pub fn paddle(&self, side: PlayerSide) -> &PaddleState {
        match side {
            PlayerSide::One => &self.paddle1,
            PlayerSide::Two => &self.paddle2,
        }
    }

    pub fn is_game_over(&self) -> bool {
        self.gameover.is_some()
    }
}

/// Inbound message after dispatch on its `type` tag.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerMessage {
    Greeting { side: PlayerSide },
    Names { p1: Option<String>, p2: Option<String> },
    Matchmaking(MatchmakingSignal),
    /// Sent by the game service when the other player left mid-match.
    OpponentLeft { winner: Option<String> },
    State(Box<StateSnapshot>),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("invalid json: {0}")]
    Json(String),
    #[error("missing field `{0}`")]
    MissingField(&'static str),
    #[error("malformed snapshot: {0}")]
    Malformed(String),
}

impl ServerMessage {
    pub fn decode(text: &str) -> Result<Self, DecodeError> {
        let value: Value =
            serde_json::from_str(text).map_err(|e| DecodeError::Json(e.to_string()))?;
        let kind = value.get("type").and_then(Value::as_str).unwrap_or("None");

        if let Some(signal) = MatchmakingSignal::from_type(kind) {
            return Ok(ServerMessage::Matchmaking(signal));
        }

        match kind {
            "greetings" => {
                let side = value
                    .get("side")
                    .and_then(PlayerSide::from_value)
                    .ok_or(DecodeError::MissingField("side"))?;
                Ok(ServerMessage::Greeting { side })
            }
            "names" => Ok(ServerMessage::Names {
                p1: value.get("p1").and_then(Value::as_str).map(str::to_string),
                p2: value.get("p2").and_then(Value::as_str).map(str::to_string),
            }),
            "gameover" => Ok(ServerMessage::OpponentLeft {
                winner: value
                    .get("winner")
                    .and_then(Value::as_str)
                    .map(str::to_string),
            }),
            _ => {
                let snapshot: StateSnapshot = serde_json::from_value(value)
                    .map_err(|e| DecodeError::Malformed(e.to_string()))?;
                Ok(ServerMessage::State(Box::new(snapshot)))
            }
        }
    }
}

/// Body returned by the game service's join/create endpoints.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UidResponse {
    #[serde(default)]
    pub uid: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Lateral world position of a paddle from its normalized coordinate.
pub fn paddle_world_x(y: f32) -> f32 {
    -(PLAY_WIDTH * y - PLAY_WIDTH / 2.0)
}

/// World `(x, z)` of the ball from its normalized coordinates. The server's
/// `y` runs across the field and `x` along it.
pub fn ball_world_position(ball: &BallState) -> (f32, f32) {
    (
        -(PLAY_WIDTH * ball.y - PLAY_WIDTH / 2.0),
        PLAY_LENGTH * ball.x - PLAY_LENGTH / 2.0,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    fn state_json(goal: &str) -> String {
        format!(
            r#"{{"type":"None","playing":true,"goal":"{}",
            "ball":{{"x":0.5,"y":0.25,"speed":0.6,"lastTouch":"2"}},
            "paddle1":{{"x":0.03,"y":0.5,"score":1}},
            "paddle2":{{"x":0.97,"y":0.75,"score":2}},
            "gameover":null,"winner":null}}"#,
            goal
        )
    }

    #[test]
    fn test_key_down_wire_shape() {
        let wire = ClientMessage::key_down(PlayerSide::Two, [1, -1])
            .to_wire()
            .unwrap();
        let value: Value = serde_json::from_str(&wire).unwrap();
        assert_eq!(value["type"], "keyDown");
        assert_eq!(value["player"], "p2");
        assert_eq!(value["value"], serde_json::json!([1, -1]));
        assert_eq!(value["active"], true);
        assert_eq!(value["sender"], "front");
    }

    #[test]
    fn test_greetings_without_names_omits_field() {
        let wire = ClientMessage::Greetings { name: None }.to_wire().unwrap();
        let value: Value = serde_json::from_str(&wire).unwrap();
        assert_eq!(value["type"], "greetings");
        assert!(value.get("name").is_none());

        let wire = ClientMessage::Greetings {
            name: Some(["Ann".to_string(), "Bob".to_string()]),
        }
        .to_wire()
        .unwrap();
        let value: Value = serde_json::from_str(&wire).unwrap();
        assert_eq!(value["name"], serde_json::json!(["Ann", "Bob"]));
    }

    #[test]
    fn test_control_messages_wire_shape() {
        let resume: Value =
            serde_json::from_str(&ClientMessage::ResumeOnGoal.to_wire().unwrap()).unwrap();
        assert_eq!(resume, serde_json::json!({"type": "resumeOnGoal", "sender": "front"}));

        let start: Value =
            serde_json::from_str(&ClientMessage::start().to_wire().unwrap()).unwrap();
        assert_eq!(start["data"], "init");

        let leave: Value =
            serde_json::from_str(&ClientMessage::Disconnect.to_wire().unwrap()).unwrap();
        assert_eq!(leave["type"], "disconnect");
    }

    #[test]
    fn test_decode_state_snapshot() {
        let msg = ServerMessage::decode(&state_json("None")).unwrap();
        let ServerMessage::State(snapshot) = msg else {
            panic!("expected state snapshot");
        };
        assert_eq!(snapshot.goal, None);
        assert!(snapshot.playing);
        assert_eq!(snapshot.ball.last_touch, Some(PlayerSide::Two));
        assert_eq!(snapshot.paddle2.score, 2);
        assert!(!snapshot.is_game_over());
    }

    #[test]
    fn test_decode_goal_tags() {
        for (tag, expected) in [("1", Some(PlayerSide::One)), ("2", Some(PlayerSide::Two))] {
            match ServerMessage::decode(&state_json(tag)).unwrap() {
                ServerMessage::State(snapshot) => assert_eq!(snapshot.goal, expected),
                other => panic!("unexpected {:?}", other),
            }
        }
    }

    #[test]
    fn test_decode_control_messages() {
        assert_eq!(
            ServerMessage::decode(r#"{"type":"greetings","side":"p2"}"#).unwrap(),
            ServerMessage::Greeting {
                side: PlayerSide::Two
            }
        );
        assert_eq!(
            ServerMessage::decode(r#"{"type":"same_jwt"}"#).unwrap(),
            ServerMessage::Matchmaking(MatchmakingSignal::SameJwt)
        );
        assert_eq!(
            ServerMessage::decode(r#"{"type":"names","p1":"ann","p2":"AI"}"#).unwrap(),
            ServerMessage::Names {
                p1: Some("ann".to_string()),
                p2: Some("AI".to_string())
            }
        );
        assert!(matches!(
            ServerMessage::decode(r#"{"type":"gameover","sender":"game","winner":"Human"}"#),
            Ok(ServerMessage::OpponentLeft { .. })
        ));
    }

    #[test]
    fn test_decode_rejects_snapshot_without_ball() {
        let err = ServerMessage::decode(
            r#"{"type":"None","goal":"1","paddle1":{"y":0.5},"paddle2":{"y":0.5}}"#,
        )
        .unwrap_err();
        assert!(matches!(err, DecodeError::Malformed(_)));

        assert!(matches!(
            ServerMessage::decode("not json"),
            Err(DecodeError::Json(_))
        ));
        assert_eq!(
            ServerMessage::decode(r#"{"type":"greetings"}"#),
            Err(DecodeError::MissingField("side"))
        );
    }

    #[test]
    fn test_decode_error_messages() {
        assert_eq!(
            DecodeError::MissingField("side").to_string(),
            "missing field `side`"
        );
        assert_eq!(
            DecodeError::Malformed("no ball".to_string()).to_string(),
            "malformed snapshot: no ball"
        );
        let err = ServerMessage::decode("{").unwrap_err();
        assert!(err.to_string().starts_with("invalid json: "));
        let boxed: Box<dyn std::error::Error> = Box::new(err);
        assert!(boxed.source().is_none());
    }

    #[test]
    fn test_coordinate_mapping() {
        assert_approx_eq!(paddle_world_x(0.5), 0.0);
        assert_approx_eq!(paddle_world_x(0.0), 5.0);
        assert_approx_eq!(paddle_world_x(1.0), -5.0);

        let ball = BallState {
            x: 1.0,
            y: 0.25,
            speed: 0.0,
            last_touch: None,
        };
        let (x, z) = ball_world_position(&ball);
        assert_approx_eq!(x, 2.5);
        assert_approx_eq!(z, 7.5);
    }

    #[test]
    fn test_numeric_side_tags() {
        assert_eq!(PlayerSide::from_value(&serde_json::json!(1)), Some(PlayerSide::One));
        assert_eq!(PlayerSide::from_value(&serde_json::json!(0)), None);
        assert_eq!(PlayerSide::from_value(&Value::Null), None);
    }
}
