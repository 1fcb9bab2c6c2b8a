use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock, mpsc};

use crate::coordinator::Coordinator;
use crate::events::{Outbound, Scope};
use crate::media::UploadService;
use crate::utils::rate_limit::RateLimiter;

pub type ConnectionSender = mpsc::UnboundedSender<String>;

/// Shared application state.
///
/// `chat` is the single exclusion region for every store the coordinator
/// owns: one inbound event is handled to completion under it, and it never
/// covers I/O. The connection registry lives outside so delivery can run
/// after the region is released.
pub struct AppState {
    pub chat: Mutex<Coordinator>,
    pub connections: RwLock<HashMap<Arc<str>, ConnectionSender>>,
    pub uploads: UploadService,
    pub upload_limiter: RateLimiter,
}

impl AppState {
    pub fn new(upload_root: impl Into<std::path::PathBuf>, rate_limit: u32, rate_window: Duration) -> Self {
        Self {
            chat: Mutex::new(Coordinator::new()),
            connections: RwLock::new(HashMap::new()),
            uploads: UploadService::new(upload_root),
            upload_limiter: RateLimiter::new(rate_limit, rate_window),
        }
    }

    pub async fn register_connection(&self, connection_id: Arc<str>, sender: ConnectionSender) {
        self.connections.write().await.insert(connection_id, sender);
    }

    pub async fn unregister_connection(&self, connection_id: &str) {
        self.connections.write().await.remove(connection_id);
    }

    /// Resolves each event's scope to live connections and pushes the frame.
    /// Send failures mean the receiver task already hung up; the socket's own
    /// teardown will clean the registry, so they are ignored here.
    pub async fn deliver(&self, events: Vec<Outbound>) {
        for outbound in events {
            let frame = match serde_json::to_string(&outbound.event) {
                Ok(frame) => frame,
                Err(err) => {
                    tracing::error!(%err, "failed to serialize outbound event");
                    continue;
                }
            };

            match outbound.scope {
                Scope::Connection(connection_id) => {
                    if let Some(sender) = self.connections.read().await.get(&connection_id) {
                        let _ = sender.send(frame);
                    }
                }
                Scope::Room { room_id, exclude } => {
                    let targets = self.chat.lock().await.connections_in(&room_id);
                    let connections = self.connections.read().await;
                    for target in targets {
                        if exclude.as_deref() == Some(target.as_ref()) {
                            continue;
                        }
                        if let Some(sender) = connections.get(&target) {
                            let _ = sender.send(frame.clone());
                        }
                    }
                }
                Scope::Broadcast => {
                    for sender in self.connections.read().await.values() {
                        let _ = sender.send(frame.clone());
                    }
                }
            }
        }
    }
}
