use axum::Json;
use axum::extract::{Path, State};

use netpong_core::room::is_valid_room_code;

use crate::error::ApiError;
use crate::room_manager::RoomStatus;
use crate::state::AppState;

/// `GET /api/v1/rooms/{code}`: lobby state, seats and match settings of a room.
/// Codes are matched case-insensitively.
pub async fn get_room(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Json<RoomStatus>, ApiError> {
    let code = code.trim().to_ascii_uppercase();
    if !is_valid_room_code(&code) {
        return Err(ApiError::InvalidRoomCode(code));
    }
    let status = state.rooms.read().await.room_status(&code);
    status.map(Json).ok_or(ApiError::RoomNotFound(code))
}
