use axum::extract::ws::{Message as WsMessage, WebSocket};
use futures_util::{SinkExt, StreamExt};
use std::{sync::Arc, time::Duration};
use tokio::sync::mpsc;

use crate::events::ClientEvent;
use crate::state::AppState;

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(80);
const HEARTBEAT_MESSAGE: &str = "ping";

/// Runs one connection to completion: outbound frames and heartbeats on the
/// send half, client events on the receive half. Teardown goes through the
/// same coordinator path as an explicit logout, so a dropped socket leaves
/// every store consistent.
pub async fn handle_socket(socket: WebSocket, state: Arc<AppState>, connection_id: Arc<str>) {
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<String>();
    state
        .register_connection(connection_id.clone(), outbound_tx)
        .await;

    let (mut ws_sender, mut ws_receiver) = socket.split();

    let mut send_task = tokio::spawn(async move {
        let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
        loop {
            tokio::select! {
                frame = outbound_rx.recv() => {
                    match frame {
                        Some(frame) => {
                            if ws_sender.send(WsMessage::Text(frame.into())).await.is_err() {
                                break;
                            }
                        }
                        None => break,
                    }
                }
                _ = heartbeat.tick() => {
                    if ws_sender.send(WsMessage::Text(HEARTBEAT_MESSAGE.into())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    let recv_state = state.clone();
    let recv_connection_id = connection_id.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(msg) = ws_receiver.next().await {
            let text = match msg {
                Ok(WsMessage::Text(text)) => text,
                Ok(WsMessage::Close(_)) => break,
                Ok(_) => continue,
                Err(_) => break,
            };

            // Malformed frames are dropped without acknowledgment: an
            // attacker learns nothing from the response channel.
            let event = match serde_json::from_str::<ClientEvent>(&text) {
                Ok(event) => event,
                Err(err) => {
                    tracing::debug!(connection = %recv_connection_id, %err, "dropping malformed frame");
                    continue;
                }
            };

            dispatch(&recv_state, &recv_connection_id, event).await;
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    state.unregister_connection(&connection_id).await;
    let events = state.chat.lock().await.remove_connection(&connection_id);
    state.deliver(events).await;
}

/// One event, one exclusive region, then delivery.
async fn dispatch(state: &AppState, connection_id: &Arc<str>, event: ClientEvent) {
    let events = {
        let mut chat = state.chat.lock().await;
        match event {
            ClientEvent::Join(payload) => chat.join(connection_id, payload.normalize()),
            ClientEvent::ChatMessage(payload) => {
                let (body, attachments) = payload.normalize();
                chat.chat_message(connection_id, body, attachments)
            }
            ClientEvent::MarkMessagesRead(ids) => chat.mark_read(connection_id, ids),
            ClientEvent::SwitchRoom(payload) => chat.switch_room(connection_id, payload.room_id()),
            ClientEvent::TypingStart => chat.set_typing(connection_id, true),
            ClientEvent::TypingStop => chat.set_typing(connection_id, false),
            ClientEvent::Logout => chat.remove_connection(connection_id),
        }
    };
    state.deliver(events).await;
}
