use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::models::user::{ActiveUser, Profile};

/// The live, connection-bound record of an active user.
#[derive(Clone, Debug)]
pub struct PresenceEntry {
    pub username: String,
    pub room_id: Arc<str>,
    pub session: Uuid,
    pub is_typing: bool,
    pub profile: Profile,
    joined_seq: u64,
}

/// Maps connection ids to presence entries and derives per-room rosters.
///
/// Invariant: at most one entry per username. The coordinator enforces it on
/// join; `taken_by_other_session` / `same_session_connection` are the two
/// halves of that check (a matching session token models reconnection and
/// must replace, not reject).
#[derive(Default)]
pub struct PresenceRegistry {
    entries: HashMap<Arc<str>, PresenceEntry>,
    next_seq: u64,
}

impl PresenceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(
        &mut self,
        connection_id: Arc<str>,
        username: String,
        room_id: Arc<str>,
        session: Uuid,
        profile: Profile,
    ) {
        let joined_seq = self.next_seq;
        self.next_seq += 1;
        self.entries.insert(
            connection_id,
            PresenceEntry {
                username,
                room_id,
                session,
                is_typing: false,
                profile,
                joined_seq,
            },
        );
    }

    /// Removes the entry, returning it so the caller can broadcast the
    /// vacated username/room.
    pub fn remove(&mut self, connection_id: &str) -> Option<PresenceEntry> {
        self.entries.remove(connection_id)
    }

    pub fn get(&self, connection_id: &str) -> Option<&PresenceEntry> {
        self.entries.get(connection_id)
    }

    /// Idempotent; no-op when the connection is unknown. Returns the entry so
    /// the caller can compute the broadcast.
    pub fn set_typing(&mut self, connection_id: &str, is_typing: bool) -> Option<&PresenceEntry> {
        let entry = self.entries.get_mut(connection_id)?;
        entry.is_typing = is_typing;
        Some(entry)
    }

    pub fn set_room(&mut self, connection_id: &str, room_id: Arc<str>) {
        if let Some(entry) = self.entries.get_mut(connection_id) {
            entry.room_id = room_id;
        }
    }

    /// Propagates a profile change into every live entry for the username
    /// (normally zero or one). Returns how many entries were touched.
    pub fn update_profile(&mut self, username: &str, profile: &Profile) -> usize {
        let mut touched = 0;
        for entry in self.entries.values_mut() {
            if entry.username == username {
                entry.profile = profile.clone();
                touched += 1;
            }
        }
        touched
    }

    /// True when the username is live under a *different* session token.
    pub fn taken_by_other_session(&self, username: &str, session: &Uuid) -> bool {
        self.entries
            .values()
            .any(|e| e.username == username && e.session != *session)
    }

    /// The connection currently holding this username under the same token,
    /// i.e. the stale half of a reconnect.
    pub fn same_session_connection(&self, username: &str, session: &Uuid) -> Option<Arc<str>> {
        self.entries
            .iter()
            .find(|(_, e)| e.username == username && e.session == *session)
            .map(|(id, _)| id.clone())
    }

    pub fn is_active_username(&self, username: &str) -> bool {
        self.entries.values().any(|e| e.username == username)
    }

    /// Room roster in join order. The ordering carries no meaning but must be
    /// stable within a call.
    pub fn active_in(&self, room_id: &str) -> Vec<ActiveUser> {
        let mut live: Vec<&PresenceEntry> = self
            .entries
            .values()
            .filter(|e| e.room_id.as_ref() == room_id)
            .collect();
        live.sort_by_key(|e| e.joined_seq);
        live.into_iter()
            .map(|e| ActiveUser {
                username: e.username.clone(),
                is_typing: e.is_typing,
                profile: e.profile.clone(),
            })
            .collect()
    }

    /// Connection ids currently scoped to a room, for outbound delivery.
    pub fn connections_in(&self, room_id: &str) -> Vec<Arc<str>> {
        self.entries
            .iter()
            .filter(|(_, e)| e.room_id.as_ref() == room_id)
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// Moves every entry in `from` to `to`, returning the affected
    /// connection ids. Used when a room is deleted.
    pub fn retarget_room(&mut self, from: &str, to: &Arc<str>) -> Vec<Arc<str>> {
        let mut moved = Vec::new();
        for (id, entry) in self.entries.iter_mut() {
            if entry.room_id.as_ref() == from {
                entry.room_id = to.clone();
                moved.push(id.clone());
            }
        }
        moved
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry_with(users: &[(&str, &str, &str)]) -> (PresenceRegistry, Vec<Uuid>) {
        let mut registry = PresenceRegistry::new();
        let mut sessions = Vec::new();
        for (conn, username, room) in users {
            let session = Uuid::new_v4();
            registry.insert(
                Arc::from(*conn),
                username.to_string(),
                Arc::from(*room),
                session,
                Profile::default(),
            );
            sessions.push(session);
        }
        (registry, sessions)
    }

    #[test]
    fn roster_is_ordered_by_join() {
        let (registry, _) = registry_with(&[
            ("c1", "ana", "general"),
            ("c2", "bob", "general"),
            ("c3", "cleo", "team"),
        ]);

        let roster = registry.active_in("general");
        let names: Vec<_> = roster.iter().map(|u| u.username.as_str()).collect();
        assert_eq!(names, ["ana", "bob"]);
    }

    #[test]
    fn collision_check_ignores_the_same_session() {
        let (registry, sessions) = registry_with(&[("c1", "ana", "general")]);

        assert!(registry.taken_by_other_session("ana", &Uuid::new_v4()));
        assert!(!registry.taken_by_other_session("ana", &sessions[0]));
        assert_eq!(
            registry
                .same_session_connection("ana", &sessions[0])
                .unwrap()
                .as_ref(),
            "c1"
        );
    }

    #[test]
    fn typing_is_a_noop_for_unknown_connections() {
        let (mut registry, _) = registry_with(&[("c1", "ana", "general")]);

        assert!(registry.set_typing("ghost", true).is_none());
        let entry = registry.set_typing("c1", true).unwrap();
        assert!(entry.is_typing);
        // Setting it again does not error or change anything else.
        assert!(registry.set_typing("c1", true).unwrap().is_typing);
    }

    #[test]
    fn profile_update_reaches_every_live_entry() {
        let (mut registry, _) = registry_with(&[("c1", "ana", "general"), ("c2", "bob", "general")]);
        let profile = Profile {
            profile_photo: Some("/uploads/images/a.png".into()),
            bio: "hi".into(),
        };

        assert_eq!(registry.update_profile("ana", &profile), 1);
        assert_eq!(registry.update_profile("ghost", &profile), 0);
        assert_eq!(registry.get("c1").unwrap().profile, profile);
    }

    #[test]
    fn retarget_moves_connections_between_rooms() {
        let (mut registry, _) = registry_with(&[("c1", "ana", "team"), ("c2", "bob", "general")]);

        let moved = registry.retarget_room("team", &Arc::from("general"));
        assert_eq!(moved.len(), 1);
        assert_eq!(registry.connections_in("general").len(), 2);
        assert!(registry.connections_in("team").is_empty());
    }
}
