use axum::{Json, Router, http::StatusCode, routing::get};
use std::{net::SocketAddr, sync::Arc, time::Duration};

use crate::api::routes;
use crate::state::AppState;
use crate::websocket::handler;

const SESSION_SWEEP_INTERVAL: Duration = Duration::from_secs(60 * 60);

pub struct Server {
    state: Arc<AppState>,
    port: u16,
}

impl Server {
    pub fn new(
        upload_dir: String,
        upload_rate_limit: u32,
        upload_rate_seconds: u64,
        port: u16,
    ) -> Self {
        let state = AppState::new(
            upload_dir,
            upload_rate_limit,
            Duration::from_secs(upload_rate_seconds),
        );
        Self {
            state: Arc::new(state),
            port,
        }
    }

    /// Router shared with the integration tests.
    pub fn router(state: Arc<AppState>) -> Router {
        Router::new()
            .route("/ws", get(handler::ws_handler))
            .merge(routes::api_routes())
            .fallback(|| async {
                (
                    StatusCode::NOT_FOUND,
                    Json(serde_json::json!({ "error": "NOT_FOUND" })),
                )
            })
            .with_state(state)
    }

    pub async fn run(self) -> Result<(), Box<dyn std::error::Error>> {
        self.state.uploads.prepare().await?;
        spawn_sweepers(self.state.clone());

        let app = Self::router(self.state.clone());
        let url = format!("0.0.0.0:{}", self.port);
        tracing::info!(%url, "listening");

        axum::serve(
            tokio::net::TcpListener::bind(&url).await?,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await?;

        Ok(())
    }
}

/// Background timers. Each tick takes the relevant exclusion region itself;
/// neither sweep ever blocks event handling for longer than a map retain.
fn spawn_sweepers(state: Arc<AppState>) {
    let session_state = state.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(SESSION_SWEEP_INTERVAL);
        interval.tick().await; // immediate first tick
        loop {
            interval.tick().await;
            let removed = session_state.chat.lock().await.sweep_sessions();
            if removed > 0 {
                tracing::info!(removed, "expired sessions swept");
            }
        }
    });

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(state.upload_limiter.window());
        interval.tick().await;
        loop {
            interval.tick().await;
            state.upload_limiter.sweep().await;
        }
    });
}
