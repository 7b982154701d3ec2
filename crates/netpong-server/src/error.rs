use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Errors from the HTTP room API, rendered as `{"error", "code"}` JSON.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    InvalidRoomCode(String),
    RoomNotFound(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidRoomCode(_) => StatusCode::BAD_REQUEST,
            Self::RoomNotFound(_) => StatusCode::NOT_FOUND,
        }
    }

    /// Stable machine-readable tag.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidRoomCode(_) => "invalid_room_code",
            Self::RoomNotFound(_) => "room_not_found",
        }
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidRoomCode(code) => write!(f, "invalid room code: {code}"),
            Self::RoomNotFound(code) => write!(f, "room {code} not found"),
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({
            "error": self.to_string(),
            "code": self.code(),
        });
        (self.status(), Json(body)).into_response()
    }
}
