use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::error::StoreError;

pub const AUDIO_EXTENSIONS: &[&str] = &["mp3", "wav", "m4a", "ogg"];
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Audio,
    Image,
}

impl MediaKind {
    fn dir(&self) -> &'static str {
        match self {
            MediaKind::Audio => "audio",
            MediaKind::Image => "images",
        }
    }

    fn allowed(&self) -> &'static [&'static str] {
        match self {
            MediaKind::Audio => AUDIO_EXTENSIONS,
            MediaKind::Image => IMAGE_EXTENSIONS,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Upload {
    pub bytes: Vec<u8>,
    /// File extension without the dot, e.g. "wav".
    pub extension: String,
}

impl Upload {
    pub fn new(bytes: Vec<u8>, extension: &str) -> Self {
        Self {
            bytes,
            extension: extension.trim_start_matches('.').to_lowercase(),
        }
    }
}

/// Audio and cover images stored beside the records.
pub struct MediaStore {
    root: PathBuf,
    max_bytes: u64,
}

impl MediaStore {
    pub fn open(root: &Path, max_bytes: u64) -> Result<Self> {
        for kind in [MediaKind::Audio, MediaKind::Image] {
            std::fs::create_dir_all(root.join(kind.dir()))?;
        }
        Ok(Self { root: root.to_path_buf(), max_bytes })
    }

    /// Returns a user-facing problem description, or None if the upload is acceptable.
    pub fn check(&self, kind: MediaKind, upload: &Upload) -> Option<String> {
        if upload.bytes.is_empty() {
            return Some("Uploaded file is empty".into());
        }
        if upload.bytes.len() as u64 > self.max_bytes {
            return Some(format!(
                "File too large. Maximum size is {}MB.",
                self.max_bytes / (1024 * 1024)
            ));
        }
        if !kind.allowed().contains(&upload.extension.as_str()) {
            return Some(format!(
                "Invalid file type '{}'. Allowed types: {}",
                upload.extension,
                kind.allowed().join(", ")
            ));
        }
        None
    }

    /// Write `upload` as `<stem>.<ext>` and return its path.
    pub fn write(&self, kind: MediaKind, stem: &str, upload: &Upload) -> Result<PathBuf> {
        if let Some(problem) = self.check(kind, upload) {
            return Err(StoreError::Upload(problem).into());
        }
        let path = self
            .root
            .join(kind.dir())
            .join(format!("{}.{}", stem, upload.extension));
        std::fs::write(&path, &upload.bytes)?;
        tracing::debug!("wrote {} bytes to {}", upload.bytes.len(), path.display());
        Ok(path)
    }

    /// Best-effort removal of an asset whose story record was never written.
    pub fn discard(&self, path: &Path) {
        if path.starts_with(&self.root) && path.exists() {
            if let Err(e) = std::fs::remove_file(path) {
                tracing::warn!("could not remove orphaned upload {}: {}", path.display(), e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn rejects_wrong_type_and_oversize() {
        let dir = TempDir::new().unwrap();
        let media = MediaStore::open(dir.path(), 4).unwrap();

        assert!(media.check(MediaKind::Audio, &Upload::new(vec![1, 2], "wav")).is_none());
        assert!(media
            .check(MediaKind::Audio, &Upload::new(vec![1, 2], "exe"))
            .unwrap()
            .contains("Invalid file type"));
        assert!(media
            .check(MediaKind::Image, &Upload::new(vec![0; 5], "png"))
            .unwrap()
            .contains("too large"));
        assert!(media.check(MediaKind::Image, &Upload::new(Vec::new(), "png")).is_some());
    }

    #[test]
    fn write_then_discard() {
        let dir = TempDir::new().unwrap();
        let media = MediaStore::open(dir.path(), 1024).unwrap();
        let path = media
            .write(MediaKind::Image, "cover", &Upload::new(vec![9; 10], ".PNG"))
            .unwrap();
        assert_eq!(path, dir.path().join("images/cover.png"));
        assert!(path.exists());

        media.discard(&path);
        assert!(!path.exists());
    }
}
