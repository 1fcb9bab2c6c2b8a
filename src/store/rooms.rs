use chrono::Utc;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::ChatError;
use crate::models::message::Message;
use crate::models::room::{Room, RoomSummary};

pub const DEFAULT_ROOM_ID: &str = "general";
pub const MAX_MESSAGES_PER_ROOM: usize = 100;
pub const MAX_ROOM_NAME_LEN: usize = 30;

const MIN_CAPACITY: usize = 2;
const MAX_CAPACITY: usize = 100;
const DEFAULT_CAPACITY: usize = 20;

/// Owns every room record. All mutation funnels through these operations so
/// the bounded log, name uniqueness, and default-room invariants hold at one
/// choke point.
pub struct RoomDirectory {
    rooms: HashMap<Arc<str>, Room>,
}

impl RoomDirectory {
    /// Starts with the default room, which always exists and is never deleted.
    pub fn new() -> Self {
        let default_id: Arc<str> = Arc::from(DEFAULT_ROOM_ID);
        let mut rooms = HashMap::new();
        rooms.insert(
            default_id.clone(),
            Room {
                id: default_id,
                name: "General".to_string(),
                description: "Main chat room for everyone".to_string(),
                max_users: 50,
                created_by: "system".to_string(),
                created_at: Utc::now(),
                announcement: String::new(),
                messages: VecDeque::new(),
                users: HashSet::new(),
            },
        );
        Self { rooms }
    }

    pub fn default_room_id(&self) -> Arc<str> {
        self.rooms
            .get(DEFAULT_ROOM_ID)
            .map(|r| r.id.clone())
            .unwrap_or_else(|| Arc::from(DEFAULT_ROOM_ID))
    }

    pub fn contains(&self, room_id: &str) -> bool {
        self.rooms.contains_key(room_id)
    }

    pub fn get(&self, room_id: &str) -> Option<&Room> {
        self.rooms.get(room_id)
    }

    /// Creates a room owned by `created_by`. Names are trimmed, bounded, and
    /// unique case-insensitively; the capacity is clamped to [2, 100].
    pub fn create(
        &mut self,
        name: &str,
        description: &str,
        max_users: Option<usize>,
        created_by: &str,
    ) -> Result<&Room, ChatError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ChatError::Validation("room name cannot be empty".into()));
        }
        if name.chars().count() > MAX_ROOM_NAME_LEN {
            return Err(ChatError::Validation(format!(
                "room name too long (max {MAX_ROOM_NAME_LEN} characters)"
            )));
        }
        if self
            .rooms
            .values()
            .any(|r| r.name.eq_ignore_ascii_case(name))
        {
            return Err(ChatError::Conflict("room name already exists".into()));
        }

        let id: Arc<str> = Arc::from(Uuid::new_v4().to_string());
        let room = Room {
            id: id.clone(),
            name: name.to_string(),
            description: description.trim().to_string(),
            max_users: max_users
                .unwrap_or(DEFAULT_CAPACITY)
                .clamp(MIN_CAPACITY, MAX_CAPACITY),
            created_by: created_by.to_string(),
            created_at: Utc::now(),
            announcement: String::new(),
            messages: VecDeque::new(),
            users: HashSet::new(),
        };
        self.rooms.insert(id.clone(), room);
        Ok(&self.rooms[&id])
    }

    /// Owner-only removal of a non-default room. The record is handed back so
    /// the coordinator can migrate its members before anything is broadcast.
    pub fn delete(&mut self, room_id: &str, requester: &str) -> Result<Room, ChatError> {
        if room_id == DEFAULT_ROOM_ID {
            return Err(ChatError::Validation("cannot delete default room".into()));
        }
        let room = self.rooms.get(room_id).ok_or(ChatError::NotFound("room"))?;
        if room.created_by != requester {
            return Err(ChatError::Forbidden(
                "only room creator can delete the room".into(),
            ));
        }
        Ok(self.rooms.remove(room_id).expect("checked above"))
    }

    pub fn set_announcement(
        &mut self,
        room_id: &str,
        requester: &str,
        announcement: &str,
    ) -> Result<&Room, ChatError> {
        let room = self
            .rooms
            .get_mut(room_id)
            .ok_or(ChatError::NotFound("room"))?;
        if room.created_by != requester {
            return Err(ChatError::Forbidden(
                "only room creator can set announcements".into(),
            ));
        }
        room.announcement = announcement.trim().to_string();
        Ok(room)
    }

    /// Appends to the room's bounded log. When the bound is exceeded the
    /// oldest message is dropped and its id returned so the caller can evict
    /// the matching receipt entry.
    pub fn append_message(&mut self, room_id: &str, message: Message) -> Option<Uuid> {
        let room = self.rooms.get_mut(room_id)?;
        room.messages.push_back(message);
        if room.messages.len() > MAX_MESSAGES_PER_ROOM {
            room.messages.pop_front().map(|evicted| evicted.id)
        } else {
            None
        }
    }

    pub fn add_member(&mut self, room_id: &str, username: &str) {
        if let Some(room) = self.rooms.get_mut(room_id) {
            room.users.insert(username.to_string());
        }
    }

    /// Idempotent.
    pub fn remove_member(&mut self, room_id: &str, username: &str) {
        if let Some(room) = self.rooms.get_mut(room_id) {
            room.users.remove(username);
        }
    }

    pub fn extend_members(&mut self, room_id: &str, usernames: impl IntoIterator<Item = String>) {
        if let Some(room) = self.rooms.get_mut(room_id) {
            room.users.extend(usernames);
        }
    }

    /// Listing for the lobby, oldest room first so the default room leads.
    pub fn summaries(&self) -> Vec<RoomSummary> {
        let mut summaries: Vec<RoomSummary> = self.rooms.values().map(Room::summary).collect();
        summaries.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.name.cmp(&b.name)));
        summaries
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }
}

impl Default for RoomDirectory {
    fn default() -> Self {
        Self::new()
    }
}
