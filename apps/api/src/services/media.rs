//! Media storage boundary
//!
//! Attachments arrive through the multipart fallback path and are written to
//! a configured directory; the returned reference is an opaque URL the
//! messaging core never interprets. Serving the stored files is external.

use async_trait::async_trait;
use std::path::PathBuf;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{MediaKind, MediaRef};

/// Errors from the media storage boundary
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Storage boundary for uploaded attachments
#[async_trait]
pub trait MediaStore: Send + Sync {
    /// Persist an uploaded attachment and return its reference
    async fn save(
        &self,
        kind: MediaKind,
        file_name: Option<&str>,
        bytes: &[u8],
    ) -> Result<MediaRef, MediaError>;
}

/// Media store writing attachments to the local filesystem
#[derive(Debug, Clone)]
pub struct LocalMediaStore {
    root: PathBuf,
}

impl LocalMediaStore {
    /// Create a store rooted at the given directory
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Derive a safe file extension from the client-supplied name
    fn extension(file_name: Option<&str>, kind: MediaKind) -> String {
        let from_name = file_name
            .and_then(|name| name.rsplit_once('.'))
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .filter(|ext| {
                !ext.is_empty() && ext.len() <= 8 && ext.chars().all(|c| c.is_ascii_alphanumeric())
            });

        from_name.unwrap_or_else(|| {
            match kind {
                MediaKind::Image => "jpg",
                MediaKind::Video => "mp4",
            }
            .to_string()
        })
    }
}

#[async_trait]
impl MediaStore for LocalMediaStore {
    async fn save(
        &self,
        kind: MediaKind,
        file_name: Option<&str>,
        bytes: &[u8],
    ) -> Result<MediaRef, MediaError> {
        let name = format!("{}.{}", Uuid::new_v4(), Self::extension(file_name, kind));

        tokio::fs::create_dir_all(&self.root).await?;
        tokio::fs::write(self.root.join(&name), bytes).await?;

        tracing::debug!(file = %name, kind = %kind, size = bytes.len(), "Stored media attachment");

        Ok(MediaRef {
            url: format!("/media/{}", name),
            kind,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_from_file_name() {
        assert_eq!(
            LocalMediaStore::extension(Some("photo.PNG"), MediaKind::Image),
            "png"
        );
        assert_eq!(
            LocalMediaStore::extension(Some("clip.mov"), MediaKind::Video),
            "mov"
        );
    }

    #[test]
    fn test_extension_falls_back_per_kind() {
        assert_eq!(LocalMediaStore::extension(None, MediaKind::Image), "jpg");
        assert_eq!(LocalMediaStore::extension(None, MediaKind::Video), "mp4");
        assert_eq!(
            LocalMediaStore::extension(Some("no-extension"), MediaKind::Image),
            "jpg"
        );
        assert_eq!(
            LocalMediaStore::extension(Some("weird.///"), MediaKind::Image),
            "jpg"
        );
    }

    #[tokio::test]
    async fn test_save_writes_file_and_returns_reference() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalMediaStore::new(dir.path());

        let media = store
            .save(MediaKind::Image, Some("pic.jpg"), b"not really a jpeg")
            .await
            .unwrap();

        assert!(media.url.starts_with("/media/"));
        assert!(media.url.ends_with(".jpg"));
        assert_eq!(media.kind, MediaKind::Image);

        let stored = dir.path().join(media.url.trim_start_matches("/media/"));
        let contents = tokio::fs::read(stored).await.unwrap();
        assert_eq!(contents, b"not really a jpeg");
    }
}
