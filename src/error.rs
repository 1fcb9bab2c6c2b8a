use axum::{Json, http::StatusCode, response::IntoResponse, response::Response};
use thiserror::Error;

/// Crate-wide error taxonomy. WebSocket-side failures are reported as events
/// (or silently dropped); this type backs the HTTP management surface.
#[derive(Debug, Error)]
pub enum ChatError {
    /// Malformed or oversized input (username, room name, file shape).
    #[error("{0}")]
    Validation(String),

    /// The request would collide with existing state (duplicate name, full room).
    #[error("{0}")]
    Conflict(String),

    /// Unknown room, message, or session.
    #[error("{0} not found")]
    NotFound(&'static str),

    /// The caller is not a logged-in user.
    #[error("{0}")]
    Unauthorized(String),

    /// The caller is logged in but not allowed to perform the operation.
    #[error("{0}")]
    Forbidden(String),

    #[error("too many uploads, please try again later")]
    RateLimited,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ChatError>;

impl ChatError {
    pub fn status(&self) -> StatusCode {
        match self {
            ChatError::Validation(_) => StatusCode::BAD_REQUEST,
            ChatError::Conflict(_) => StatusCode::CONFLICT,
            ChatError::NotFound(_) => StatusCode::NOT_FOUND,
            ChatError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ChatError::Forbidden(_) => StatusCode::FORBIDDEN,
            ChatError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ChatError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ChatError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, "internal error");
        }
        (
            status,
            Json(serde_json::json!({ "error": self.to_string() })),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_map_to_taxonomy() {
        assert_eq!(
            ChatError::Validation("bad".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ChatError::Conflict("dup".into()).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(ChatError::NotFound("room").status(), StatusCode::NOT_FOUND);
        assert_eq!(
            ChatError::Forbidden("not owner".into()).status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(ChatError::RateLimited.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[test]
    fn not_found_message_names_the_resource() {
        assert_eq!(ChatError::NotFound("room").to_string(), "room not found");
    }
}
