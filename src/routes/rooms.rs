//! Room lookup and allocation routes.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use serde::Serialize;

use crate::services::room;
use crate::services::snapshot::RoomSnapshot;
use crate::state::{AppState, RoomCode};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedRoom {
    pub room_code: RoomCode,
}

/// `GET /api/rooms/:room_code`: current redacted snapshot of a room.
pub async fn get_room(
    State(state): State<AppState>,
    Path(room_code): Path<String>,
) -> Result<Json<RoomSnapshot>, StatusCode> {
    let code = RoomCode::parse(&room_code).ok_or(StatusCode::BAD_REQUEST)?;
    let handle = room::get(&state, &code)
        .await
        .map_err(|_| StatusCode::NOT_FOUND)?;
    Ok(Json(room::current_snapshot(&handle).await))
}

/// `POST /api/rooms`: allocate an empty room under a fresh code.
pub async fn create_room(State(state): State<AppState>) -> impl IntoResponse {
    let (room_code, _) = room::create_with_fresh_code(&state).await;
    (StatusCode::CREATED, Json(CreatedRoom { room_code }))
}

#[cfg(test)]
#[path = "rooms_test.rs"]
mod tests;
