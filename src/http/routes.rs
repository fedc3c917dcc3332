//! HTTP surface: create room, join room, health check.
//!
//! Thin by design: both endpoints end in a bearer token the client presents
//! over the message channel. All game rules live in the room engine.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::protocol::ErrorCode;
use crate::registry::Registry;

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<Registry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRoomRequest {
    pub host_name: String,
    #[serde(default)]
    pub avatar_id: u8,
    pub session_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRoomResponse {
    pub room_id: Uuid,
    pub join_code: String,
    pub token: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinRoomRequest {
    pub join_code: String,
    pub name: String,
    #[serde(default)]
    pub avatar_id: u8,
    pub session_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinRoomResponse {
    pub room_id: Uuid,
    pub token: String,
    pub is_reconnect: bool,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: ErrorCode,
    message: String,
}

fn error_response(code: ErrorCode) -> Response {
    let status = match code {
        ErrorCode::RoomNotFound => StatusCode::NOT_FOUND,
        ErrorCode::RoomFull
        | ErrorCode::NameTaken
        | ErrorCode::GameInProgress
        | ErrorCode::SessionAlreadyInRoom => StatusCode::CONFLICT,
        _ => StatusCode::BAD_REQUEST,
    };
    (
        status,
        Json(ErrorBody {
            code,
            message: code.to_string(),
        }),
    )
        .into_response()
}

/// 1-20 printable characters after trimming.
fn sanitize_name(raw: &str) -> Option<String> {
    let name = raw.trim();
    let len = name.chars().count();
    if !(1..=20).contains(&len) || name.chars().any(char::is_control) {
        return None;
    }
    Some(name.to_string())
}

fn valid_session(session_id: &str) -> bool {
    (1..=128).contains(&session_id.len())
}

pub async fn healthz() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

pub async fn create_room(
    State(state): State<AppState>,
    Json(req): Json<CreateRoomRequest>,
) -> Response {
    let Some(name) = sanitize_name(&req.host_name) else {
        return error_response(ErrorCode::InvalidRequest);
    };
    if !valid_session(&req.session_id) {
        return error_response(ErrorCode::InvalidRequest);
    }
    match state
        .registry
        .create_room(name, req.avatar_id, req.session_id)
        .await
    {
        Ok(created) => Json(CreateRoomResponse {
            room_id: created.room_id,
            join_code: created.join_code,
            token: created.token,
        })
        .into_response(),
        Err(code) => error_response(code),
    }
}

pub async fn join_room(
    State(state): State<AppState>,
    Json(req): Json<JoinRoomRequest>,
) -> Response {
    let Some(name) = sanitize_name(&req.name) else {
        return error_response(ErrorCode::InvalidRequest);
    };
    if !valid_session(&req.session_id) {
        return error_response(ErrorCode::InvalidRequest);
    }
    let join_code = req.join_code.trim().to_uppercase();
    match state
        .registry
        .join_room(&join_code, name, req.avatar_id, req.session_id)
        .await
    {
        Ok(joined) => Json(JoinRoomResponse {
            room_id: joined.room_id,
            token: joined.token,
            is_reconnect: joined.is_reconnect,
        })
        .into_response(),
        Err(code) => error_response(code),
    }
}
