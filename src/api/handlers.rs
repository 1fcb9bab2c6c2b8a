//! HTTP management surface: thin adapters over the coordinator. Handlers
//! parse the request, take the chat region once, and shape the response;
//! all rules live in the coordinator and its stores.

use axum::{
    Json,
    extract::{ConnectInfo, Multipart, Path, State},
    http::{HeaderMap, header},
    response::IntoResponse,
};
use serde::Deserialize;
use serde_json::{Value, json};
use std::net::SocketAddr;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{ChatError, Result};
use crate::media::archive::archive;
use crate::models::message::Attachment;
use crate::models::user::Profile;
use crate::state::AppState;

const MAX_FILES_PER_UPLOAD: usize = 10;

/// Resolves the percent-encoded `x-username` header to a logged-in user.
async fn require_active_user(state: &AppState, headers: &HeaderMap) -> Result<String> {
    let raw = headers
        .get("x-username")
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| ChatError::Validation("valid username is required".into()))?;
    let username = urlencoding::decode(raw)
        .map(|decoded| decoded.into_owned())
        .unwrap_or_else(|_| raw.to_string());
    let username = username.trim().to_string();
    if username.is_empty() {
        return Err(ChatError::Validation("valid username is required".into()));
    }
    if !state.chat.lock().await.is_active_username(&username) {
        return Err(ChatError::Unauthorized(
            "user authentication required".into(),
        ));
    }
    Ok(username)
}

pub async fn list_rooms(State(state): State<Arc<AppState>>) -> Json<Value> {
    let rooms = state.chat.lock().await.room_summaries();
    Json(json!({ "success": true, "rooms": rooms }))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRoomRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub max_users: Option<usize>,
}

pub async fn create_room(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<CreateRoomRequest>,
) -> Result<Json<Value>> {
    let username = require_active_user(&state, &headers).await?;
    let (room_id, events) = state.chat.lock().await.create_room(
        &request.name,
        &request.description,
        request.max_users,
        &username,
    )?;
    state.deliver(events).await;
    Ok(Json(json!({ "success": true, "roomId": room_id })))
}

pub async fn delete_room(
    State(state): State<Arc<AppState>>,
    Path(room_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<Value>> {
    let username = require_active_user(&state, &headers).await?;
    let events = state.chat.lock().await.delete_room(&room_id, &username)?;
    state.deliver(events).await;
    Ok(Json(json!({ "success": true })))
}

#[derive(Deserialize)]
pub struct AnnouncementRequest {
    #[serde(default)]
    pub announcement: String,
}

pub async fn set_announcement(
    State(state): State<Arc<AppState>>,
    Path(room_id): Path<String>,
    headers: HeaderMap,
    Json(request): Json<AnnouncementRequest>,
) -> Result<Json<Value>> {
    let username = require_active_user(&state, &headers).await?;
    let events = state
        .chat
        .lock()
        .await
        .set_announcement(&room_id, &username, &request.announcement)?;
    state.deliver(events).await;
    Ok(Json(json!({ "success": true })))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateSessionRequest {
    pub session_id: String,
}

pub async fn validate_session(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ValidateSessionRequest>,
) -> Result<Json<Value>> {
    let token = Uuid::parse_str(&request.session_id)
        .map_err(|_| ChatError::Unauthorized("invalid session".into()))?;
    let info = state
        .chat
        .lock()
        .await
        .validate_session(&token)
        .ok_or_else(|| ChatError::Unauthorized("invalid session".into()))?;
    Ok(Json(json!({
        "success": true,
        "username": info.username,
        "roomId": info.room_id,
        "profile": info.profile,
    })))
}

pub async fn upload_media(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    mut multipart: Multipart,
) -> Result<Json<Value>> {
    state.upload_limiter.check(addr.ip()).await?;

    let mut stored: Vec<Attachment> = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ChatError::Validation(e.to_string()))?
    {
        if field.name() != Some("files") {
            continue;
        }
        if stored.len() >= MAX_FILES_PER_UPLOAD {
            return Err(ChatError::Validation(format!(
                "too many files (max {MAX_FILES_PER_UPLOAD})"
            )));
        }
        let original_name = field.file_name().unwrap_or("file").to_string();
        let mimetype = field.content_type().unwrap_or("").to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ChatError::Validation(e.to_string()))?;
        stored.push(
            state
                .uploads
                .store(bytes.to_vec(), &mimetype, &original_name)
                .await?,
        );
    }

    if stored.is_empty() {
        return Err(ChatError::Validation("no files uploaded".into()));
    }
    Ok(Json(json!({ "success": true, "files": stored })))
}

pub async fn update_profile(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    mut multipart: Multipart,
) -> Result<Json<Value>> {
    state.upload_limiter.check(addr.ip()).await?;

    let mut username = None;
    let mut bio = String::new();
    let mut existing_photo = None;
    let mut uploaded_photo: Option<Attachment> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ChatError::Validation(e.to_string()))?
    {
        match field.name() {
            Some("username") => {
                username = Some(
                    field
                        .text()
                        .await
                        .map_err(|e| ChatError::Validation(e.to_string()))?,
                );
            }
            Some("bio") => {
                bio = field
                    .text()
                    .await
                    .map_err(|e| ChatError::Validation(e.to_string()))?;
            }
            Some("existingPhoto") => {
                existing_photo = Some(
                    field
                        .text()
                        .await
                        .map_err(|e| ChatError::Validation(e.to_string()))?,
                );
            }
            Some("profilePhoto") => {
                let original_name = field.file_name().unwrap_or("photo").to_string();
                let mimetype = field.content_type().unwrap_or("").to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ChatError::Validation(e.to_string()))?;
                uploaded_photo = Some(
                    state
                        .uploads
                        .store(bytes.to_vec(), &mimetype, &original_name)
                        .await?,
                );
            }
            _ => {}
        }
    }

    let username =
        username.ok_or_else(|| ChatError::Validation("username is required".into()))?;
    if username.trim().is_empty() {
        return Err(ChatError::Validation("username is required".into()));
    }

    let profile_photo = match &uploaded_photo {
        Some(attachment) => Some(attachment.url.clone()),
        None => existing_photo.filter(|p| !p.is_empty()),
    };

    // A freshly uploaded photo replaces the previous one on disk.
    if uploaded_photo.is_some() {
        let previous = state.chat.lock().await.profile_of(&username).profile_photo;
        if let Some(previous) = previous {
            if Some(&previous) != profile_photo.as_ref() {
                state.uploads.remove(&previous).await;
            }
        }
    }

    let profile = Profile {
        profile_photo,
        bio,
    };
    let events = state
        .chat
        .lock()
        .await
        .update_profile(&username, profile.clone());
    state.deliver(events).await;

    Ok(Json(json!({
        "success": true,
        "profilePhoto": profile.profile_photo,
        "bio": profile.bio,
    })))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkDownloadRequest {
    #[serde(default)]
    pub file_urls: Vec<String>,
}

pub async fn download_bulk(
    State(state): State<Arc<AppState>>,
    Json(request): Json<BulkDownloadRequest>,
) -> Result<impl IntoResponse> {
    let bytes = archive(&state.uploads, &request.file_urls).await?;
    Ok((
        [
            (header::CONTENT_TYPE, "application/zip"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"media-download.zip\"",
            ),
        ],
        bytes,
    ))
}
