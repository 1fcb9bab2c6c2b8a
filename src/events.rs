//! Wire-level event shapes.
//!
//! Frames are JSON `{"event": <name>, "data": <payload>}` in both directions.
//! The legacy client sent bare scalars for `join`, `chat-message`, and
//! `switch-room`; those arrive as untagged unions and are normalized before
//! anything reaches the coordinator.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::models::message::{Attachment, MessageView};
use crate::models::room::{RoomInfo, RoomSummary};
use crate::models::user::{ActiveUser, Profile};

/// Who an outbound event is for. Resolution to live connections happens in
/// the transport adapter, which keeps the coordinator testable without
/// sockets.
#[derive(Clone, Debug, PartialEq)]
pub enum Scope {
    /// Exactly one connection.
    Connection(Arc<str>),
    /// Every connection currently present in a room.
    Room {
        room_id: Arc<str>,
        exclude: Option<Arc<str>>,
    },
    /// Every live connection.
    Broadcast,
}

/// One outbound event with its delivery scope.
#[derive(Clone, Debug)]
pub struct Outbound {
    pub scope: Scope,
    pub event: ServerEvent,
}

impl Outbound {
    pub fn to_connection(connection_id: &Arc<str>, event: ServerEvent) -> Self {
        Self {
            scope: Scope::Connection(connection_id.clone()),
            event,
        }
    }

    pub fn to_room(room_id: Arc<str>, event: ServerEvent) -> Self {
        Self {
            scope: Scope::Room {
                room_id,
                exclude: None,
            },
            event,
        }
    }

    pub fn to_room_except(room_id: Arc<str>, exclude: &Arc<str>, event: ServerEvent) -> Self {
        Self {
            scope: Scope::Room {
                room_id,
                exclude: Some(exclude.clone()),
            },
            event,
        }
    }

    pub fn broadcast(event: ServerEvent) -> Self {
        Self {
            scope: Scope::Broadcast,
            event,
        }
    }
}

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ServerEvent {
    JoinSuccess(JoinSuccess),
    JoinError { reason: String },
    UserJoined(RoomRoster),
    UserLeft(RoomRoster),
    NewMessage(MessageView),
    ReadReceiptsUpdated(Vec<ReceiptUpdate>),
    UserTypingUpdate(TypingUpdate),
    RoomSwitched(RoomSwitched),
    SwitchRoomError { reason: String },
    RoomListUpdated(Vec<RoomSummary>),
    RoomCreated(RoomSummary),
    #[serde(rename_all = "camelCase")]
    RoomRemoved { room_id: Arc<str> },
    #[serde(rename_all = "camelCase")]
    RoomDeleted {
        deleted_room_id: Arc<str>,
        new_room_id: Arc<str>,
    },
    #[serde(rename_all = "camelCase")]
    AnnouncementUpdated {
        room_id: Arc<str>,
        announcement: String,
    },
    ProfileUpdated(ProfileUpdate),
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinSuccess {
    pub username: String,
    pub session_id: Uuid,
    pub room_id: Arc<str>,
    pub room_info: RoomInfo,
    pub message_history: Vec<MessageView>,
    pub active_users: Vec<ActiveUser>,
    pub rooms: Vec<RoomSummary>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomRoster {
    pub username: String,
    pub active_users: Vec<ActiveUser>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingUpdate {
    pub username: String,
    pub is_typing: bool,
    pub active_users: Vec<ActiveUser>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptUpdate {
    pub id: Uuid,
    pub read_by: Vec<String>,
    pub read_count: usize,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSwitched {
    pub room_id: Arc<str>,
    pub room_info: RoomInfo,
    pub message_history: Vec<MessageView>,
    pub active_users: Vec<ActiveUser>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    pub username: String,
    #[serde(flatten)]
    pub profile: Profile,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ClientEvent {
    Join(JoinPayload),
    ChatMessage(ChatPayload),
    MarkMessagesRead(Vec<String>),
    SwitchRoom(SwitchRoomPayload),
    TypingStart,
    TypingStop,
    Logout,
}

/// `join` accepts either the legacy bare username or the structured shape.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum JoinPayload {
    Username(String),
    #[serde(rename_all = "camelCase")]
    Structured {
        username: String,
        session_id: Option<Uuid>,
        room_id: Option<Arc<str>>,
    },
}

/// Normalized join request handed to the coordinator.
#[derive(Debug)]
pub struct JoinRequest {
    pub username: String,
    pub session_token: Option<Uuid>,
    pub room_id: Option<Arc<str>>,
}

impl JoinPayload {
    pub fn normalize(self) -> JoinRequest {
        match self {
            JoinPayload::Username(username) => JoinRequest {
                username,
                session_token: None,
                room_id: None,
            },
            JoinPayload::Structured {
                username,
                session_id,
                room_id,
            } => JoinRequest {
                username,
                session_token: session_id,
                room_id,
            },
        }
    }
}

/// `chat-message` accepts a bare string body or `{body|message, attachments}`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ChatPayload {
    Body(String),
    Structured {
        #[serde(default, alias = "message")]
        body: String,
        #[serde(default)]
        attachments: Vec<Attachment>,
    },
}

impl ChatPayload {
    pub fn normalize(self) -> (String, Vec<Attachment>) {
        match self {
            ChatPayload::Body(body) => (body, Vec::new()),
            ChatPayload::Structured { body, attachments } => (body, attachments),
        }
    }
}

/// `switch-room` accepts a bare room id or `{roomId}`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum SwitchRoomPayload {
    RoomId(Arc<str>),
    #[serde(rename_all = "camelCase")]
    Structured { room_id: Arc<str> },
}

impl SwitchRoomPayload {
    pub fn room_id(self) -> Arc<str> {
        match self {
            SwitchRoomPayload::RoomId(room_id) => room_id,
            SwitchRoomPayload::Structured { room_id } => room_id,
        }
    }
}
