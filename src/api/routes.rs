use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{delete, get, post},
};
use std::sync::Arc;

use super::handlers;
use crate::media::upload::MAX_FILE_BYTES;
use crate::state::AppState;

pub fn api_routes() -> Router<Arc<AppState>> {
    // Up to ten files at the per-file ceiling, plus multipart framing headroom.
    let upload_limit = DefaultBodyLimit::max(10 * MAX_FILE_BYTES + 1024 * 1024);

    Router::new()
        .route(
            "/api/rooms",
            get(handlers::list_rooms).post(handlers::create_room),
        )
        .route("/api/rooms/{room_id}", delete(handlers::delete_room))
        .route(
            "/api/rooms/{room_id}/announcement",
            post(handlers::set_announcement),
        )
        .route("/api/session/validate", post(handlers::validate_session))
        .route(
            "/api/upload/media",
            post(handlers::upload_media).layer(upload_limit.clone()),
        )
        .route(
            "/api/profile/update",
            post(handlers::update_profile).layer(upload_limit),
        )
        .route("/api/download/bulk", post(handlers::download_bulk))
}
