use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::error::{ChatError, Result};
use crate::models::message::{Attachment, AttachmentKind};

pub const MAX_FILE_BYTES: usize = 100 * 1024 * 1024;
const MAX_BASENAME_LEN: usize = 50;

const ALLOWED_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "gif", "webp", "mp4", "webm", "mov", "pdf", "doc", "docx", "xls",
    "xlsx", "txt", "zip",
];

const ALLOWED_MIMETYPES: &[&str] = &[
    "image/jpeg",
    "image/jpg",
    "image/png",
    "image/gif",
    "image/webp",
    "video/mp4",
    "video/webm",
    "video/quicktime",
    "application/pdf",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "application/vnd.ms-excel",
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
    "text/plain",
    "application/zip",
    "application/x-zip-compressed",
];

/// The upload collaborator. Validates declared name/type/size against the
/// allow-lists, writes the bytes under the uploads root, and hands back an
/// `Attachment` descriptor. The coordinator trusts its output wholesale and
/// never sees bytes.
pub struct UploadService {
    root: PathBuf,
}

impl UploadService {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Creates the uploads root and its media subdirectories.
    pub async fn prepare(&self) -> Result<()> {
        for kind in [
            AttachmentKind::Image,
            AttachmentKind::Video,
            AttachmentKind::File,
        ] {
            tokio::fs::create_dir_all(self.root.join(kind.subdir())).await?;
        }
        Ok(())
    }

    /// Stores one validated file, returning its descriptor.
    pub async fn store(
        &self,
        bytes: Vec<u8>,
        mimetype: &str,
        original_name: &str,
    ) -> Result<Attachment> {
        if bytes.len() > MAX_FILE_BYTES {
            return Err(ChatError::Validation("file too large".into()));
        }
        let mimetype = mimetype.to_ascii_lowercase();
        if !ALLOWED_MIMETYPES.contains(&mimetype.as_str()) {
            return Err(ChatError::Validation("file type not allowed".into()));
        }
        let extension = extension_of(original_name)
            .filter(|ext| ALLOWED_EXTENSIONS.contains(&ext.as_str()))
            .ok_or_else(|| ChatError::Validation("invalid file extension".into()))?;

        let kind = AttachmentKind::from_mimetype(&mimetype);
        let filename = format!(
            "{}_{}.{}",
            Uuid::new_v4(),
            sanitize_basename(original_name),
            extension
        );
        let size = bytes.len() as u64;

        tokio::fs::write(self.root.join(kind.subdir()).join(&filename), bytes).await?;

        Ok(Attachment {
            id: Uuid::new_v4(),
            url: format!("/uploads/{}/{filename}", kind.subdir()),
            filename,
            original_name: original_name.to_string(),
            kind,
            mimetype,
            size,
        })
    }

    /// Maps an `/uploads/...` url path to a file inside the uploads root.
    /// Returns None for anything that escapes it, including via symlinks.
    pub fn resolve_contained(&self, url_path: &str) -> Option<PathBuf> {
        let relative = url_path.strip_prefix("/uploads/")?;
        if relative.contains("..") {
            return None;
        }
        let root = self.root.canonicalize().ok()?;
        let resolved = root.join(relative).canonicalize().ok()?;
        resolved.starts_with(&root).then_some(resolved)
    }

    /// Deletes a previously stored file (e.g. a replaced profile photo).
    /// Unknown or escaping paths are ignored rather than reported.
    pub async fn remove(&self, url_path: &str) {
        match self.resolve_contained(url_path) {
            Some(path) => {
                if let Err(err) = tokio::fs::remove_file(&path).await {
                    tracing::warn!(path = %path.display(), %err, "failed to delete upload");
                }
            }
            None => {
                tracing::warn!(url_path, "refusing to delete file outside uploads root");
            }
        }
    }
}

fn extension_of(name: &str) -> Option<String> {
    Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
}

/// Strips the name down to alphanumerics, dash, and underscore.
fn sanitize_basename(name: &str) -> String {
    let stem = Path::new(name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("file");
    stem.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .take(MAX_BASENAME_LEN)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn service() -> (TempDir, UploadService) {
        let dir = TempDir::new().unwrap();
        let service = UploadService::new(dir.path());
        service.prepare().await.unwrap();
        (dir, service)
    }

    #[tokio::test]
    async fn stores_an_image_under_the_images_subdir() {
        let (_dir, service) = service().await;
        let attachment = service
            .store(vec![1, 2, 3], "image/png", "team photo!.png")
            .await
            .unwrap();

        assert_eq!(attachment.kind, AttachmentKind::Image);
        assert_eq!(attachment.size, 3);
        assert!(attachment.url.starts_with("/uploads/images/"));
        assert!(attachment.filename.ends_with("_team_photo_.png"));
        assert!(service.root().join("images").join(&attachment.filename).exists());
    }

    #[tokio::test]
    async fn rejects_disallowed_extension_and_mimetype() {
        let (_dir, service) = service().await;
        assert!(matches!(
            service.store(vec![0], "image/png", "shell.exe").await,
            Err(ChatError::Validation(_))
        ));
        assert!(matches!(
            service.store(vec![0], "application/x-sh", "run.txt").await,
            Err(ChatError::Validation(_))
        ));
        assert!(matches!(
            service.store(vec![0], "image/png", "no-extension").await,
            Err(ChatError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn rejects_oversized_files() {
        let (_dir, service) = service().await;
        let oversized = vec![0u8; MAX_FILE_BYTES + 1];
        assert!(matches!(
            service.store(oversized, "text/plain", "big.txt").await,
            Err(ChatError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn containment_rejects_traversal() {
        let (_dir, service) = service().await;
        let stored = service
            .store(b"hello".to_vec(), "text/plain", "note.txt")
            .await
            .unwrap();

        assert!(service.resolve_contained(&stored.url).is_some());
        assert!(service.resolve_contained("/uploads/../secrets.txt").is_none());
        assert!(service.resolve_contained("/etc/passwd").is_none());
        assert!(service.resolve_contained("/uploads/files/missing.txt").is_none());
    }

    #[tokio::test]
    async fn remove_deletes_only_contained_files() {
        let (_dir, service) = service().await;
        let stored = service
            .store(b"hello".to_vec(), "text/plain", "note.txt")
            .await
            .unwrap();
        let path = service.resolve_contained(&stored.url).unwrap();

        service.remove("/uploads/../note.txt").await;
        assert!(path.exists());

        service.remove(&stored.url).await;
        assert!(!path.exists());
    }
}
