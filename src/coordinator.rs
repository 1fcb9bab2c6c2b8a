use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{ChatError, Result};
use crate::events::{
    JoinRequest, JoinSuccess, Outbound, ProfileUpdate, ReceiptUpdate, RoomRoster, RoomSwitched,
    ServerEvent, TypingUpdate,
};
use crate::models::message::{Attachment, Message, MessageView};
use crate::models::room::RoomSummary;
use crate::models::user::Profile;
use crate::store::presence::PresenceRegistry;
use crate::store::receipts::ReceiptTracker;
use crate::store::rooms::RoomDirectory;
use crate::store::session::{SessionData, SessionStore};

pub const MAX_USERNAME_LEN: usize = 20;

/// Session resume payload for the HTTP surface.
#[derive(Clone, Debug)]
pub struct SessionInfo {
    pub username: String,
    pub room_id: Arc<str>,
    pub profile: Profile,
}

/// The orchestrating state machine. Owns the four stores plus the profile
/// map; each operation mutates them to completion and returns the outbound
/// events for the transport adapter to deliver. Nothing here performs I/O.
pub struct Coordinator {
    sessions: SessionStore,
    presence: PresenceRegistry,
    rooms: RoomDirectory,
    receipts: ReceiptTracker,
    profiles: HashMap<String, Profile>,
}

impl Coordinator {
    pub fn new() -> Self {
        Self {
            sessions: SessionStore::new(),
            presence: PresenceRegistry::new(),
            rooms: RoomDirectory::new(),
            receipts: ReceiptTracker::new(),
            profiles: HashMap::new(),
        }
    }

    /// A connection claims a username and enters a room.
    ///
    /// Unknown room ids fall back to the default room (stale bookmarks are
    /// not an error); a username held by a different session is rejected; a
    /// join carrying the same session token replaces the stale presence
    /// entry instead of rejecting, which is how reconnection works.
    pub fn join(&mut self, connection_id: &Arc<str>, request: JoinRequest) -> Vec<Outbound> {
        let username = request.username.trim().to_string();
        if username.is_empty() {
            return vec![join_error(connection_id, "Username cannot be empty")];
        }
        if username.chars().count() > MAX_USERNAME_LEN {
            return vec![join_error(
                connection_id,
                &format!("Username too long (max {MAX_USERNAME_LEN} characters)"),
            )];
        }

        let token = request.session_token.unwrap_or_else(Uuid::new_v4);
        if self.presence.taken_by_other_session(&username, &token) {
            return vec![join_error(connection_id, "Username already taken")];
        }

        let room_id = match request.room_id {
            Some(id) if self.rooms.contains(&id) => id,
            _ => self.rooms.default_room_id(),
        };

        let room = self.rooms.get(&room_id).expect("room resolved above");
        if room.is_full() && !room.users.contains(&username) {
            return vec![join_error(connection_id, "Room is full")];
        }

        // Reconnection: drop the stale entry bound to the same session. When
        // the fresh join lands in a different room, the old room must also
        // give up the membership slot and learn about the departure.
        let mut events = Vec::new();
        if let Some(stale_connection) = self.presence.same_session_connection(&username, &token) {
            if let Some(stale) = self.presence.remove(&stale_connection) {
                if stale.room_id != room_id {
                    self.rooms.remove_member(&stale.room_id, &username);
                    events.push(Outbound::to_room(
                        stale.room_id.clone(),
                        ServerEvent::UserLeft(RoomRoster {
                            username: username.clone(),
                            active_users: self.presence.active_in(&stale.room_id),
                        }),
                    ));
                }
            }
        }

        self.sessions.record(token, &username, room_id.clone());
        let profile = self.profiles.get(&username).cloned().unwrap_or_default();
        self.presence.insert(
            connection_id.clone(),
            username.clone(),
            room_id.clone(),
            token,
            profile,
        );
        self.rooms.add_member(&room_id, &username);

        tracing::info!(%username, room = %room_id, "user joined");

        let room = self.rooms.get(&room_id).expect("room resolved above");
        events.push(Outbound::to_connection(
            connection_id,
            ServerEvent::JoinSuccess(JoinSuccess {
                username: username.clone(),
                session_id: token,
                room_id: room_id.clone(),
                room_info: room.info(),
                message_history: self.history_view(&room_id),
                active_users: self.presence.active_in(&room_id),
                rooms: self.rooms.summaries(),
            }),
        ));
        events.push(Outbound::to_room_except(
            room_id.clone(),
            connection_id,
            ServerEvent::UserJoined(RoomRoster {
                username,
                active_users: self.presence.active_in(&room_id),
            }),
        ));
        events.push(Outbound::broadcast(ServerEvent::RoomListUpdated(
            self.rooms.summaries(),
        )));
        events
    }

    /// Appends a message to the author's current room and fans it out to the
    /// whole room, author included. A connection without presence is an
    /// unattributable actor: the event is dropped without any broadcast.
    pub fn chat_message(
        &mut self,
        connection_id: &Arc<str>,
        body: String,
        attachments: Vec<Attachment>,
    ) -> Vec<Outbound> {
        let Some(entry) = self.presence.get(connection_id) else {
            return Vec::new();
        };
        let username = entry.username.clone();
        let room_id = entry.room_id.clone();
        let profile_photo = entry.profile.profile_photo.clone();

        let message = Message {
            id: Uuid::new_v4(),
            username: username.clone(),
            body,
            timestamp: Utc::now(),
            profile_photo,
            attachments,
        };
        let message_id = message.id;

        self.receipts.init(message_id, &username);
        if let Some(evicted) = self.rooms.append_message(&room_id, message.clone()) {
            self.receipts.evict(&evicted);
        }

        vec![Outbound::to_room(
            room_id,
            ServerEvent::NewMessage(MessageView {
                message,
                read_by: vec![username],
                read_count: 1,
            }),
        )]
    }

    /// Flips receipts for any id not yet read by this user. Unknown or
    /// evicted ids are skipped silently. Deltas go to *all* connections, not
    /// just the room: the sender may have switched rooms since sending and
    /// still needs the updated counts.
    pub fn mark_read(&mut self, connection_id: &Arc<str>, message_ids: Vec<String>) -> Vec<Outbound> {
        let Some(entry) = self.presence.get(connection_id) else {
            return Vec::new();
        };
        let username = entry.username.clone();

        let mut updates = Vec::new();
        for raw in message_ids {
            let Ok(id) = Uuid::parse_str(&raw) else {
                continue;
            };
            if self.receipts.record_read(&id, &username) {
                updates.push(ReceiptUpdate {
                    id,
                    read_by: self.receipts.readers_of(&id),
                    read_count: self.receipts.count_for(&id),
                });
            }
        }

        if updates.is_empty() {
            Vec::new()
        } else {
            vec![Outbound::broadcast(ServerEvent::ReadReceiptsUpdated(updates))]
        }
    }

    /// Moves a connection to another room: membership, presence, and the
    /// session's room association all change before any event is emitted.
    pub fn switch_room(&mut self, connection_id: &Arc<str>, target: Arc<str>) -> Vec<Outbound> {
        let Some(entry) = self.presence.get(connection_id) else {
            return Vec::new();
        };
        let username = entry.username.clone();
        let token = entry.session;
        let old_room_id = entry.room_id.clone();

        let Some(new_room) = self.rooms.get(&target) else {
            return vec![switch_error(connection_id, "Room not found")];
        };
        // Re-entry by an existing member never trips the capacity check.
        if new_room.is_full() && !new_room.users.contains(&username) {
            return vec![switch_error(connection_id, "Room is full")];
        }

        self.rooms.remove_member(&old_room_id, &username);
        self.presence.set_room(connection_id, target.clone());
        self.rooms.add_member(&target, &username);
        self.sessions.touch(&token, target.clone());

        tracing::info!(%username, from = %old_room_id, to = %target, "user switched room");

        let new_room = self.rooms.get(&target).expect("target resolved above");
        vec![
            Outbound::to_room_except(
                old_room_id.clone(),
                connection_id,
                ServerEvent::UserLeft(RoomRoster {
                    username: username.clone(),
                    active_users: self.presence.active_in(&old_room_id),
                }),
            ),
            Outbound::to_connection(
                connection_id,
                ServerEvent::RoomSwitched(RoomSwitched {
                    room_id: target.clone(),
                    room_info: new_room.info(),
                    message_history: self.history_view(&target),
                    active_users: self.presence.active_in(&target),
                }),
            ),
            Outbound::to_room_except(
                target.clone(),
                connection_id,
                ServerEvent::UserJoined(RoomRoster {
                    username,
                    active_users: self.presence.active_in(&target),
                }),
            ),
            Outbound::broadcast(ServerEvent::RoomListUpdated(self.rooms.summaries())),
        ]
    }

    /// Typing indicator, scoped to the user's current room only.
    pub fn set_typing(&mut self, connection_id: &Arc<str>, is_typing: bool) -> Vec<Outbound> {
        let Some(entry) = self.presence.set_typing(connection_id, is_typing) else {
            return Vec::new();
        };
        let username = entry.username.clone();
        let room_id = entry.room_id.clone();

        vec![Outbound::to_room_except(
            room_id.clone(),
            connection_id,
            ServerEvent::UserTypingUpdate(TypingUpdate {
                username,
                is_typing,
                active_users: self.presence.active_in(&room_id),
            }),
        )]
    }

    /// Logout and transport-level disconnect share one teardown path. The
    /// session stays alive for later resumption; only the expiry sweep
    /// removes it.
    pub fn remove_connection(&mut self, connection_id: &Arc<str>) -> Vec<Outbound> {
        let Some(entry) = self.presence.remove(connection_id) else {
            return Vec::new();
        };
        self.rooms.remove_member(&entry.room_id, &entry.username);

        tracing::info!(username = %entry.username, room = %entry.room_id, "user left");

        vec![
            Outbound::to_room_except(
                entry.room_id.clone(),
                connection_id,
                ServerEvent::UserLeft(RoomRoster {
                    username: entry.username,
                    active_users: self.presence.active_in(&entry.room_id),
                }),
            ),
            Outbound::broadcast(ServerEvent::RoomListUpdated(self.rooms.summaries())),
        ]
    }

    /// Room creation from the management surface.
    pub fn create_room(
        &mut self,
        name: &str,
        description: &str,
        max_users: Option<usize>,
        created_by: &str,
    ) -> Result<(Arc<str>, Vec<Outbound>)> {
        let room = self.rooms.create(name, description, max_users, created_by)?;
        let summary = room.summary();
        let room_id = room.id.clone();
        tracing::info!(room = %room_id, owner = %created_by, "room created");
        Ok((
            room_id,
            vec![Outbound::broadcast(ServerEvent::RoomCreated(summary))],
        ))
    }

    /// Owner-only deletion. Members are migrated to the default room whether
    /// or not they are connected; presence and session stores are retargeted
    /// in the same exclusive region so no reference to the dead room survives.
    pub fn delete_room(&mut self, room_id: &str, requester: &str) -> Result<Vec<Outbound>> {
        let removed = self.rooms.delete(room_id, requester)?;
        let default_id = self.rooms.default_room_id();

        let moved_connections = self.presence.retarget_room(room_id, &default_id);
        self.sessions.retarget_room(room_id, &default_id);
        self.rooms
            .extend_members(&default_id, removed.users.into_iter());

        tracing::info!(room = %room_id, members = moved_connections.len(), "room deleted");

        let mut events: Vec<Outbound> = moved_connections
            .iter()
            .map(|connection_id| {
                Outbound::to_connection(
                    connection_id,
                    ServerEvent::RoomDeleted {
                        deleted_room_id: Arc::from(room_id),
                        new_room_id: default_id.clone(),
                    },
                )
            })
            .collect();
        events.push(Outbound::broadcast(ServerEvent::RoomRemoved {
            room_id: Arc::from(room_id),
        }));
        Ok(events)
    }

    pub fn set_announcement(
        &mut self,
        room_id: &str,
        requester: &str,
        announcement: &str,
    ) -> Result<Vec<Outbound>> {
        let room = self.rooms.set_announcement(room_id, requester, announcement)?;
        Ok(vec![Outbound::to_room(
            room.id.clone(),
            ServerEvent::AnnouncementUpdated {
                room_id: room.id.clone(),
                announcement: room.announcement.clone(),
            },
        )])
    }

    /// Writes through the profile store and into any live presence entry.
    /// Broadcast goes to every connection: profile photos render in history
    /// regardless of room.
    pub fn update_profile(&mut self, username: &str, profile: Profile) -> Vec<Outbound> {
        self.profiles.insert(username.to_string(), profile.clone());
        self.presence.update_profile(username, &profile);

        vec![Outbound::broadcast(ServerEvent::ProfileUpdated(
            ProfileUpdate {
                username: username.to_string(),
                profile,
            },
        ))]
    }

    pub fn profile_of(&self, username: &str) -> Profile {
        self.profiles.get(username).cloned().unwrap_or_default()
    }

    /// Session resume for the HTTP surface.
    pub fn validate_session(&self, token: &Uuid) -> Option<SessionInfo> {
        let SessionData {
            username, room_id, ..
        } = self.sessions.resolve(token)?;
        Some(SessionInfo {
            username: username.clone(),
            room_id: if self.rooms.contains(room_id) {
                room_id.clone()
            } else {
                self.rooms.default_room_id()
            },
            profile: self.profiles.get(username).cloned().unwrap_or_default(),
        })
    }

    pub fn is_active_username(&self, username: &str) -> bool {
        self.presence.is_active_username(username)
    }

    pub fn room_summaries(&self) -> Vec<RoomSummary> {
        self.rooms.summaries()
    }

    /// Connection ids for a room scope; used by the delivery layer.
    pub fn connections_in(&self, room_id: &str) -> Vec<Arc<str>> {
        self.presence.connections_in(room_id)
    }

    pub fn sweep_sessions(&mut self) -> usize {
        self.sessions.sweep_expired(Utc::now())
    }

    fn history_view(&self, room_id: &str) -> Vec<MessageView> {
        let Some(room) = self.rooms.get(room_id) else {
            return Vec::new();
        };
        room.messages
            .iter()
            .map(|message| MessageView {
                message: message.clone(),
                read_by: self.receipts.readers_of(&message.id),
                read_count: self.receipts.count_for(&message.id),
            })
            .collect()
    }

    #[cfg(test)]
    pub(crate) fn presence_len(&self) -> usize {
        self.presence.len()
    }
}

impl Default for Coordinator {
    fn default() -> Self {
        Self::new()
    }
}

fn join_error(connection_id: &Arc<str>, reason: &str) -> Outbound {
    Outbound::to_connection(
        connection_id,
        ServerEvent::JoinError {
            reason: reason.to_string(),
        },
    )
}

fn switch_error(connection_id: &Arc<str>, reason: &str) -> Outbound {
    Outbound::to_connection(
        connection_id,
        ServerEvent::SwitchRoomError {
            reason: reason.to_string(),
        },
    )
}
