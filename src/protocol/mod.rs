//! Wire protocol: client intents, server events, error codes, codec.
//!
//! Frames are single JSON objects discriminated by `op`. Malformed frames
//! are rejected here and never reach a room.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Hidden card kinds. The identity of a seat's card is secret; it only ever
/// appears on the wire inside a `REVEAL` for exactly that seat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CardType {
    Safe,
    Doom,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoomStatus {
    Lobby,
    InGame,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    DealerSetup,
    Dealing,
    Turns,
    AwaitingReveal,
    FinalReveal,
    RoundEnd,
    GameEnd,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VotePhase {
    Voting,
    Starting,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LeaveReason {
    Disconnected,
    Left,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSettings {
    pub turn_timer_seconds: u64,
    pub cheese_enabled: bool,
    pub cheese_count: u8,
}

/// Partial settings update; absent fields are left alone.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsPatch {
    #[serde(default)]
    pub cheese_enabled: Option<bool>,
    #[serde(default)]
    pub cheese_count: Option<u8>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerSnapshot {
    pub player_id: Uuid,
    pub name: String,
    pub avatar_id: u8,
    pub seat: u8,
    pub alive: bool,
    pub connected: bool,
    pub ready: bool,
    pub has_cheese: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSnapshot {
    pub room_id: Uuid,
    pub join_code: String,
    pub host_id: Uuid,
    pub status: RoomStatus,
    pub settings: RoomSettings,
    pub players: Vec<PlayerSnapshot>,
    /// Unix milliseconds.
    pub created_at: i64,
}

/// Public view of the game state. Never carries the card table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameSnapshot {
    pub phase: Phase,
    pub dealer_seat: u8,
    pub turn_seat: Option<u8>,
    pub round_index: u32,
    pub alive_seats: Vec<u8>,
    pub facedown_seats: Vec<u8>,
    pub acted_seats: Vec<u8>,
    pub deadline_ts: Option<i64>,
    pub cheese_seats: Vec<u8>,
}

/// Client → server intents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "op",
    rename_all = "SCREAMING_SNAKE_CASE",
    rename_all_fields = "camelCase"
)]
pub enum Intent {
    Join {
        token: String,
        // The client echoes its display identity; the token is authoritative.
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        avatar_id: Option<u8>,
    },
    Ready {
        ready: bool,
    },
    StartGame,
    UpdateSettings {
        settings: SettingsPatch,
    },
    ActionDrink,
    ActionSwap {
        target_seat: u8,
    },
    ActionStealCheese {
        target_seat: u8,
    },
    DealerSet {
        /// Ordered by ascending alive seat.
        composition: Vec<CardType>,
    },
    DealerPreview {
        seat: u8,
        #[serde(default)]
        card_type: Option<CardType>,
    },
    StartReveal,
    VoteRematch {
        vote: bool,
    },
    LeaveRoom,
    Ping {
        t: i64,
    },
}

/// Server → client events.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(
    tag = "op",
    rename_all = "SCREAMING_SNAKE_CASE",
    rename_all_fields = "camelCase"
)]
pub enum Event {
    State {
        room: RoomSnapshot,
        game: Option<GameSnapshot>,
        your_seat: u8,
        your_player_id: Uuid,
    },
    LobbyUpdate {
        players: Vec<PlayerSnapshot>,
        settings: RoomSettings,
        host_id: Uuid,
    },
    Phase {
        phase: Phase,
        dealer_seat: u8,
        turn_seat: Option<u8>,
        deadline_ts: Option<i64>,
        alive_seats: Vec<u8>,
    },
    Dealt {
        alive_seats: Vec<u8>,
    },
    Swap {
        from_seat: u8,
        to_seat: u8,
    },
    Reveal {
        seat: u8,
        card_type: CardType,
    },
    Elim {
        seat: u8,
    },
    CheeseStolen {
        from_seat: u8,
        to_seat: u8,
    },
    CheeseUpdate {
        cheese_seats: Vec<u8>,
    },
    /// Boolean activity only; the card type never leaves the dealer.
    DealerPreview {
        seat: u8,
        assigned: bool,
    },
    VoteUpdate {
        voted_yes: usize,
        required_votes: usize,
        phase: VotePhase,
    },
    PlayerLeft {
        seat: u8,
        reason: LeaveReason,
    },
    RoundEnd {
        next_dealer_seat: u8,
    },
    GameEnd {
        winner_seat: Option<u8>,
    },
    Error {
        code: ErrorCode,
        message: String,
    },
    Pong {
        t: i64,
    },
}

/// Machine error codes, sent only to the offending socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    #[error("invalid or expired token")]
    InvalidToken,
    #[error("not bound to a room")]
    NotInRoom,
    #[error("this session is already connected in the room")]
    SessionAlreadyInRoom,
    #[error("room not found")]
    RoomNotFound,
    #[error("room is full")]
    RoomFull,
    #[error("game already in progress")]
    GameInProgress,
    #[error("name already taken")]
    NameTaken,
    #[error("only the host may do that")]
    NotHost,
    #[error("only the dealer may do that")]
    NotDealer,
    #[error("it is not your turn")]
    NotYourTurn,
    #[error("you already acted this round")]
    AlreadyActed,
    #[error("invalid target seat")]
    InvalidTarget,
    #[error("action not valid now")]
    InvalidAction,
    #[error("not enough players")]
    NotEnoughPlayers,
    #[error("not all players are ready")]
    NotAllReady,
    #[error("composition must cover every alive seat")]
    MissingAssignments,
    #[error("composition needs at least one safe and one doom card")]
    InvalidComposition,
    #[error("you already hold cheese")]
    AlreadyHasCheese,
    #[error("target has no cheese to steal")]
    NoCheeseToSteal,
    #[error("malformed message")]
    InvalidMessage,
    #[error("invalid request")]
    InvalidRequest,
    #[error("unknown op")]
    UnknownOp,
}

impl Event {
    /// Build the canonical ERROR frame for a code.
    pub fn error(code: ErrorCode) -> Self {
        Event::Error {
            code,
            message: code.to_string(),
        }
    }
}

/// Serialize an event once; fanout clones the resulting text per socket.
pub fn encode(event: &Event) -> String {
    serde_json::to_string(event).expect("event serializes")
}

const KNOWN_OPS: &[&str] = &[
    "JOIN",
    "READY",
    "START_GAME",
    "UPDATE_SETTINGS",
    "ACTION_DRINK",
    "ACTION_SWAP",
    "ACTION_STEAL_CHEESE",
    "DEALER_SET",
    "DEALER_PREVIEW",
    "START_REVEAL",
    "VOTE_REMATCH",
    "LEAVE_ROOM",
    "PING",
];

/// Parse an inbound text frame. Distinguishes frames with an unrecognized
/// discriminant (`UNKNOWN_OP`) from frames that are not valid intents at
/// all (`INVALID_MESSAGE`).
pub fn decode(text: &str) -> Result<Intent, ErrorCode> {
    let value: serde_json::Value =
        serde_json::from_str(text).map_err(|_| ErrorCode::InvalidMessage)?;
    let op = value
        .get("op")
        .and_then(|v| v.as_str())
        .ok_or(ErrorCode::InvalidMessage)?;
    if !KNOWN_OPS.contains(&op) {
        return Err(ErrorCode::UnknownOp);
    }
    serde_json::from_value(value).map_err(|_| ErrorCode::InvalidMessage)
}
