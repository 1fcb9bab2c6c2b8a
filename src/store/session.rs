use chrono::{DateTime, TimeDelta, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// Sessions expire after a week; the sweep runs hourly.
pub const SESSION_TTL_DAYS: i64 = 7;

#[derive(Clone, Debug)]
pub struct SessionData {
    pub username: String,
    pub room_id: Arc<str>,
    pub created_at: DateTime<Utc>,
}

/// Resumable identities outliving any single connection. Tokens are opaque
/// to clients; a re-join with a known token lands the user back in the last
/// room they used.
#[derive(Default)]
pub struct SessionStore {
    sessions: HashMap<Uuid, SessionData>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Generates a fresh token and records the session.
    pub fn create(&mut self, username: &str, room_id: Arc<str>) -> Uuid {
        let token = Uuid::new_v4();
        self.record(token, username, room_id);
        token
    }

    /// Upsert under a caller-supplied token. Re-joining refreshes the
    /// creation time, so active users never expire out from under a live
    /// connection.
    pub fn record(&mut self, token: Uuid, username: &str, room_id: Arc<str>) {
        self.sessions.insert(
            token,
            SessionData {
                username: username.to_string(),
                room_id,
                created_at: Utc::now(),
            },
        );
    }

    pub fn resolve(&self, token: &Uuid) -> Option<&SessionData> {
        self.sessions.get(token)
    }

    /// Updates the room association so resumption lands in the last-used room.
    pub fn touch(&mut self, token: &Uuid, room_id: Arc<str>) {
        if let Some(session) = self.sessions.get_mut(token) {
            session.room_id = room_id;
        }
    }

    /// Repoints every session referencing `from` at `to`. Used when a room is
    /// deleted so no session resumes into a dead room.
    pub fn retarget_room(&mut self, from: &str, to: &Arc<str>) {
        for session in self.sessions.values_mut() {
            if session.room_id.as_ref() == from {
                session.room_id = to.clone();
            }
        }
    }

    /// Removes entries older than the TTL, returning how many were dropped.
    pub fn sweep_expired(&mut self, now: DateTime<Utc>) -> usize {
        let ttl = TimeDelta::days(SESSION_TTL_DAYS);
        let before = self.sessions.len();
        self.sessions.retain(|_, s| now - s.created_at <= ttl);
        before - self.sessions.len()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn room(id: &str) -> Arc<str> {
        Arc::from(id)
    }

    #[test]
    fn create_then_resolve() {
        let mut store = SessionStore::new();
        let token = store.create("ana", room("general"));

        let session = store.resolve(&token).unwrap();
        assert_eq!(session.username, "ana");
        assert_eq!(session.room_id.as_ref(), "general");
        assert!(store.resolve(&Uuid::new_v4()).is_none());
    }

    #[test]
    fn touch_moves_the_room_association() {
        let mut store = SessionStore::new();
        let token = store.create("ana", room("general"));

        store.touch(&token, room("team"));
        assert_eq!(store.resolve(&token).unwrap().room_id.as_ref(), "team");

        // Touching an unknown token is a no-op.
        store.touch(&Uuid::new_v4(), room("team"));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn retarget_repoints_only_matching_sessions() {
        let mut store = SessionStore::new();
        let a = store.create("ana", room("team"));
        let b = store.create("bob", room("general"));

        store.retarget_room("team", &room("general"));
        assert_eq!(store.resolve(&a).unwrap().room_id.as_ref(), "general");
        assert_eq!(store.resolve(&b).unwrap().room_id.as_ref(), "general");
    }

    #[test]
    fn sweep_removes_only_expired_entries() {
        let mut store = SessionStore::new();
        let fresh = store.create("ana", room("general"));
        let stale = store.create("bob", room("general"));
        store
            .sessions
            .get_mut(&stale)
            .unwrap()
            .created_at = Utc::now() - TimeDelta::days(SESSION_TTL_DAYS + 1);

        let removed = store.sweep_expired(Utc::now());
        assert_eq!(removed, 1);
        assert!(store.resolve(&fresh).is_some());
        assert!(store.resolve(&stale).is_none());
    }

    #[test]
    fn rejoin_with_known_token_refreshes_creation_time() {
        let mut store = SessionStore::new();
        let token = store.create("ana", room("general"));
        store
            .sessions
            .get_mut(&token)
            .unwrap()
            .created_at = Utc::now() - TimeDelta::days(SESSION_TTL_DAYS - 1);

        store.record(token, "ana", room("team"));
        assert_eq!(store.sweep_expired(Utc::now()), 0);
        assert_eq!(store.resolve(&token).unwrap().room_id.as_ref(), "team");
    }
}
