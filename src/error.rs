use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use std::fmt::Display;

use crate::room::MsgId;

pub type AppResult<T> = Result<T, AppErr>;

/* ── core errors: reported to the originating connection only ── */
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ChatError {
    #[error("{0}")]
    Validation(String),

    #[error("Server {0} not found.")]
    RoomNotFound(String),

    #[error("Message {0} does not exist in this server.")]
    InvalidReply(MsgId),

    #[error("Already connected to server {0}; leave it first.")]
    AlreadyBound(String),

    #[error("Not connected to that server.")]
    NotBound,

    #[error("File storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("Malformed event: {0}")]
    Malformed(String),

    /// Detail is for the logs; clients only see the generic text.
    #[error("Internal server error.")]
    Internal(String),
}

impl ChatError {
    /// Stable tag carried on `server_error` payloads.
    pub fn kind(&self) -> &'static str {
        match self {
            ChatError::Validation(_)         => "validation",
            ChatError::RoomNotFound(_)       => "room_not_found",
            ChatError::InvalidReply(_)       => "invalid_reply",
            ChatError::AlreadyBound(_)       => "already_bound",
            ChatError::NotBound              => "not_bound",
            ChatError::StorageUnavailable(_) => "storage_unavailable",
            ChatError::Malformed(_)          => "malformed",
            ChatError::Internal(_)           => "internal",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ChatError::Validation(_)
            | ChatError::InvalidReply(_)
            | ChatError::Malformed(_)        => StatusCode::BAD_REQUEST,
            ChatError::RoomNotFound(_)       => StatusCode::NOT_FOUND,
            ChatError::AlreadyBound(_)
            | ChatError::NotBound            => StatusCode::CONFLICT,
            ChatError::StorageUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ChatError::Internal(_)           => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/* ── HTTP handler errors ── */
#[derive(thiserror::Error, Debug)]
pub enum AppErr {
    #[error("Bad request: {0}")]
    Bad(String),

    #[error("File too large (max {0} bytes).")]
    TooLarge(usize),

    #[error(transparent)]
    Chat(#[from] ChatError),
}

impl IntoResponse for AppErr {
    fn into_response(self) -> axum::response::Response {
        let code = match &self {
            AppErr::Bad(_)      => StatusCode::BAD_REQUEST,
            AppErr::TooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            AppErr::Chat(e)     => e.status(),
        };
        if code.is_server_error() {
            tracing::error!(error = ?self, "request failed");
        }
        (code, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

/* ── helper: wrap any error as Bad ── */
pub fn bad<E: Display>(e: E) -> AppErr { AppErr::Bad(e.to_string()) }

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn internal_detail_is_not_displayed() {
        let e = ChatError::Internal("room code space exhausted".into());
        assert_eq!(e.to_string(), "Internal server error.");
        assert_eq!(e.kind(), "internal");
    }

    #[test]
    fn chat_errors_map_to_http_status() {
        assert_eq!(ChatError::RoomNotFound("ABC123".into()).status(), StatusCode::NOT_FOUND);
        assert_eq!(ChatError::Validation("x".into()).status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ChatError::StorageUnavailable("disk".into()).status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn too_large_response_status() {
        let resp = AppErr::TooLarge(10).into_response();
        assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }
}
