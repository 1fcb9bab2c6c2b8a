use std::collections::HashMap;
use std::net::IpAddr;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

use crate::error::{ChatError, Result};

struct WindowEntry {
    count: u32,
    reset_at: Instant,
}

/// Per-address sliding-window limiter for the upload endpoints. Windows are
/// created lazily; a periodic sweep drops entries whose window has lapsed so
/// the map does not grow with every address ever seen.
pub struct RateLimiter {
    limit: u32,
    window: Duration,
    entries: Mutex<HashMap<IpAddr, WindowEntry>>,
}

impl RateLimiter {
    pub fn new(limit: u32, window: Duration) -> Self {
        Self {
            limit,
            window,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub async fn check(&self, addr: IpAddr) -> Result<()> {
        let mut entries = self.entries.lock().await;
        let now = Instant::now();
        let entry = entries.entry(addr).or_insert(WindowEntry {
            count: 0,
            reset_at: now + self.window,
        });

        if now >= entry.reset_at {
            entry.count = 0;
            entry.reset_at = now + self.window;
        }

        if entry.count >= self.limit {
            return Err(ChatError::RateLimited);
        }

        entry.count += 1;
        Ok(())
    }

    /// Drops lapsed windows. Runs on its own timer.
    pub async fn sweep(&self) {
        let now = Instant::now();
        self.entries.lock().await.retain(|_, e| now < e.reset_at);
    }
}
