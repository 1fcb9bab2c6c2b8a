use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use crate::models::message::Message;

/// A named chat room with a bounded message log and a member set.
#[derive(Clone, Debug)]
pub struct Room {
    pub id: Arc<str>,
    pub name: String,
    pub description: String,
    pub max_users: usize,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub announcement: String,
    pub messages: VecDeque<Message>,
    pub users: HashSet<String>,
}

impl Room {
    pub fn is_full(&self) -> bool {
        self.users.len() >= self.max_users
    }

    pub fn info(&self) -> RoomInfo {
        RoomInfo {
            id: self.id.clone(),
            name: self.name.clone(),
            description: self.description.clone(),
            announcement: self.announcement.clone(),
            created_by: self.created_by.clone(),
        }
    }

    pub fn summary(&self) -> RoomSummary {
        RoomSummary {
            id: self.id.clone(),
            name: self.name.clone(),
            description: self.description.clone(),
            user_count: self.users.len(),
            max_users: self.max_users,
            created_by: self.created_by.clone(),
            created_at: self.created_at,
            has_announcement: !self.announcement.is_empty(),
        }
    }
}

/// What a member of the room gets to see.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomInfo {
    pub id: Arc<str>,
    pub name: String,
    pub description: String,
    pub announcement: String,
    pub created_by: String,
}

/// Directory listing entry. Exposes counts only, never the log or the
/// member identities.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSummary {
    pub id: Arc<str>,
    pub name: String,
    pub description: String,
    pub user_count: usize,
    pub max_users: usize,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub has_announcement: bool,
}
