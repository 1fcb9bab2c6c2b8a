use serde::{Deserialize, Serialize};

/// Per-username profile, kept for the process lifetime and snapshotted into
/// presence entries and messages.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub profile_photo: Option<String>,
    #[serde(default)]
    pub bio: String,
}

/// One entry of a room's live member list.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveUser {
    pub username: String,
    pub is_typing: bool,
    #[serde(flatten)]
    pub profile: Profile,
}
