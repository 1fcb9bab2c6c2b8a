use axum::{
    extract::{State, WebSocketUpgrade},
    response::Response,
};
use std::sync::Arc;

use crate::{state::AppState, utils::id::mini_id, websocket::connection::handle_socket};

/// Upgrades the socket. Connections start anonymous; identity arrives with
/// the first `join` event.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    let connection_id = mini_id(8);
    ws.on_upgrade(move |socket| handle_socket(socket, state, connection_id))
}
