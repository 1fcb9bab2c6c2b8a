use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use roomcast::events::{JoinRequest, ServerEvent};
use roomcast::state::AppState;

/// State with a throwaway uploads root and the default rate limits.
pub fn test_state() -> Arc<AppState> {
    let uploads = std::env::temp_dir().join(format!("roomcast-test-{}", uuid::Uuid::new_v4()));
    Arc::new(AppState::new(uploads, 10, Duration::from_secs(60)))
}

/// Registers a live connection and joins it as `username`, returning the
/// receiving half of its outbound channel.
pub async fn join_user(
    state: &Arc<AppState>,
    connection_id: &str,
    username: &str,
) -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    let connection_id: Arc<str> = Arc::from(connection_id);
    state.register_connection(connection_id.clone(), tx).await;

    let events = state.chat.lock().await.join(
        &connection_id,
        JoinRequest {
            username: username.to_string(),
            session_token: None,
            room_id: None,
        },
    );
    assert!(
        events
            .iter()
            .any(|o| matches!(o.event, ServerEvent::JoinSuccess(_))),
        "join for {username} did not succeed"
    );
    state.deliver(events).await;
    rx
}

/// Drains every frame currently queued for a connection.
pub fn drain(rx: &mut mpsc::UnboundedReceiver<String>) -> Vec<serde_json::Value> {
    let mut frames = Vec::new();
    while let Ok(frame) = rx.try_recv() {
        frames.push(serde_json::from_str(&frame).expect("frames are JSON"));
    }
    frames
}

/// The queued frames with the given event name.
pub fn frames_named(rx: &mut mpsc::UnboundedReceiver<String>, name: &str) -> Vec<serde_json::Value> {
    drain(rx)
        .into_iter()
        .filter(|f| f["event"] == name)
        .collect()
}
