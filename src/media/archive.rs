use std::io::{Cursor, Write};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::{ChatError, Result};
use crate::media::UploadService;

/// Zips the referenced uploads into one download. Every reference goes
/// through the containment check first; anything escaping the uploads root
/// or missing on disk is skipped, matching the per-file policy of the
/// original bulk endpoint rather than failing the whole archive.
pub async fn archive(service: &UploadService, url_paths: &[String]) -> Result<Vec<u8>> {
    if url_paths.is_empty() {
        return Err(ChatError::Validation("no files specified".into()));
    }

    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut included = 0usize;

    for url_path in url_paths {
        let Some(path) = service.resolve_contained(url_path) else {
            tracing::warn!(url_path, "skipping file outside uploads root");
            continue;
        };
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(err) => {
                tracing::warn!(path = %path.display(), %err, "skipping unreadable file");
                continue;
            }
        };
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("file")
            .to_string();

        writer
            .start_file(name, options)
            .map_err(|e| ChatError::Io(std::io::Error::other(e)))?;
        writer.write_all(&bytes)?;
        included += 1;
    }

    if included == 0 {
        return Err(ChatError::NotFound("file"));
    }

    let cursor = writer
        .finish()
        .map_err(|e| ChatError::Io(std::io::Error::other(e)))?;
    Ok(cursor.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn service_with_files() -> (TempDir, UploadService, Vec<String>) {
        let dir = TempDir::new().unwrap();
        let service = UploadService::new(dir.path());
        service.prepare().await.unwrap();
        let mut urls = Vec::new();
        for name in ["a.txt", "b.txt"] {
            let stored = service
                .store(b"content".to_vec(), "text/plain", name)
                .await
                .unwrap();
            urls.push(stored.url);
        }
        (dir, service, urls)
    }

    #[tokio::test]
    async fn archives_contained_files() {
        let (_dir, service, urls) = service_with_files().await;
        let bytes = archive(&service, &urls).await.unwrap();
        // Zip local file header magic.
        assert_eq!(&bytes[..4], b"PK\x03\x04");
    }

    #[tokio::test]
    async fn traversal_references_are_skipped() {
        let (_dir, service, mut urls) = service_with_files().await;
        urls.push("/uploads/../../etc/passwd".to_string());
        urls.push("/uploads/files/does-not-exist.txt".to_string());

        // Still succeeds with the two legitimate files.
        assert!(archive(&service, &urls).await.is_ok());
    }

    #[tokio::test]
    async fn empty_or_fully_invalid_requests_fail() {
        let (_dir, service, _) = service_with_files().await;
        assert!(matches!(
            archive(&service, &[]).await,
            Err(ChatError::Validation(_))
        ));
        assert!(matches!(
            archive(&service, &["/uploads/../x".to_string()]).await,
            Err(ChatError::NotFound(_))
        ));
    }
}
