use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A stored file reference produced by the upload service. The core never
/// touches the bytes, only this descriptor.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub id: Uuid,
    pub filename: String,
    pub original_name: String,
    #[serde(rename = "type")]
    pub kind: AttachmentKind,
    pub mimetype: String,
    pub size: u64,
    pub url: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttachmentKind {
    Image,
    Video,
    File,
}

impl AttachmentKind {
    pub fn from_mimetype(mimetype: &str) -> Self {
        let mimetype = mimetype.to_ascii_lowercase();
        if mimetype.starts_with("image/") {
            AttachmentKind::Image
        } else if mimetype.starts_with("video/") {
            AttachmentKind::Video
        } else {
            AttachmentKind::File
        }
    }

    /// Subdirectory of the uploads root this kind is stored under.
    pub fn subdir(self) -> &'static str {
        match self {
            AttachmentKind::Image => "images",
            AttachmentKind::Video => "videos",
            AttachmentKind::File => "files",
        }
    }
}

/// A chat message inside one room's bounded log. Readers are tracked
/// separately by the receipt tracker.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: Uuid,
    pub username: String,
    pub body: String,
    pub timestamp: DateTime<Utc>,
    pub profile_photo: Option<String>,
    pub attachments: Vec<Attachment>,
}

/// A message joined with its read receipts, as sent over the wire.
#[derive(Clone, Debug, Serialize)]
pub struct MessageView {
    #[serde(flatten)]
    pub message: Message,
    #[serde(rename = "readBy")]
    pub read_by: Vec<String>,
    #[serde(rename = "readCount")]
    pub read_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_follows_mimetype_prefix() {
        assert_eq!(
            AttachmentKind::from_mimetype("image/png"),
            AttachmentKind::Image
        );
        assert_eq!(
            AttachmentKind::from_mimetype("VIDEO/mp4"),
            AttachmentKind::Video
        );
        assert_eq!(
            AttachmentKind::from_mimetype("application/pdf"),
            AttachmentKind::File
        );
    }

    #[test]
    fn message_view_flattens_receipts() {
        let view = MessageView {
            message: Message {
                id: Uuid::new_v4(),
                username: "ana".into(),
                body: "hi".into(),
                timestamp: Utc::now(),
                profile_photo: None,
                attachments: vec![],
            },
            read_by: vec!["ana".into()],
            read_count: 1,
        };
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["body"], "hi");
        assert_eq!(json["readCount"], 1);
        assert_eq!(json["readBy"][0], "ana");
    }
}
