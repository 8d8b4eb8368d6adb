//! Where uploaded bytes live. The room core only sees the returned url.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::fs;
use tracing::{debug, warn};

use crate::{
    error::ChatError,
    state::{MediaEntry, MediaLog},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    pub file_name: String,
    pub file_url: String,
    pub size: u64,
    pub mime: String,
}

#[async_trait]
pub trait FileStore: Send + Sync {
    async fn put(&self, room_code: &str, original_name: &str, bytes: Bytes) -> Result<StoredFile, ChatError>;
}

/// Files on local disk, served back under `url_prefix`.
#[derive(Debug, Clone)]
pub struct DiskStore {
    root: PathBuf,
    url_prefix: String,
    media: MediaLog,
}

impl DiskStore {
    pub fn new(root: impl Into<PathBuf>, media: MediaLog) -> Self {
        Self { root: root.into(), url_prefix: "/uploads".into(), media }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn media(&self) -> &MediaLog {
        &self.media
    }
}

#[async_trait]
impl FileStore for DiskStore {
    async fn put(&self, room_code: &str, original_name: &str, bytes: Bytes) -> Result<StoredFile, ChatError> {
        let file_name = sanitize_file_name(original_name);
        let stored = format!("{}_{}", nanoid::nanoid!(10), file_name);
        let path = self.root.join(&stored);

        let unavailable = |e: std::io::Error| {
            warn!(path = %path.display(), error = %e, "upload write failed");
            ChatError::StorageUnavailable(e.to_string())
        };
        fs::create_dir_all(&self.root).await.map_err(unavailable)?;
        fs::write(&path, &bytes).await.map_err(unavailable)?;

        let size = bytes.len() as u64;
        self.media.write().await.push_back(MediaEntry { path: path.clone(), size, room: room_code.to_owned() });
        debug!(room = room_code, path = %path.display(), size, "upload stored");

        Ok(StoredFile {
            mime: mime_guess::from_path(&file_name).first_or_octet_stream().to_string(),
            file_url: format!("{}/{}", self.url_prefix, stored),
            file_name,
            size,
        })
    }
}

/// Keeps ASCII alphanumerics, `.`, `-` and `_`; spaces become `_`.
/// Directory parts and leading dots are dropped.
pub fn sanitize_file_name(raw: &str) -> String {
    let base = raw.rsplit(&['/', '\\'][..]).next().unwrap_or_default();
    let cleaned: String = base
        .chars()
        .filter_map(|c| match c {
            c if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') => Some(c),
            c if c.is_whitespace() => Some('_'),
            _ => None,
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "file".to_owned()
    } else {
        cleaned.to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_strips_paths_and_odd_characters() {
        assert_eq!(sanitize_file_name("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_file_name(r"C:\Users\me\My Photo.png"), "My_Photo.png");
        assert_eq!(sanitize_file_name(".bashrc"), "bashrc");
        assert_eq!(sanitize_file_name("ünï©ødé"), "nd");
        assert_eq!(sanitize_file_name("***"), "file");
        assert_eq!(sanitize_file_name(""), "file");
    }

    #[tokio::test]
    async fn put_writes_file_and_records_it() {
        let dir = tempfile::tempdir().unwrap();
        let store = DiskStore::new(dir.path().join("uploads"), MediaLog::default());

        let stored = store.put("K3F9", "cat pic.png", Bytes::from_static(b"meow")).await.unwrap();
        assert_eq!(stored.file_name, "cat_pic.png");
        assert_eq!(stored.mime, "image/png");
        assert_eq!(stored.size, 4);
        assert!(stored.file_url.starts_with("/uploads/"));
        assert!(stored.file_url.ends_with("_cat_pic.png"));

        let on_disk = stored.file_url.trim_start_matches("/uploads/");
        assert_eq!(std::fs::read(store.root().join(on_disk)).unwrap(), b"meow");

        let media = store.media().read().await;
        assert_eq!(media.len(), 1);
        assert_eq!(media[0].room, "K3F9");
    }

    #[tokio::test]
    async fn same_name_twice_does_not_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let store = DiskStore::new(dir.path(), MediaLog::default());
        let a = store.put("R", "a.txt", Bytes::from_static(b"1")).await.unwrap();
        let b = store.put("R", "a.txt", Bytes::from_static(b"2")).await.unwrap();
        assert_ne!(a.file_url, b.file_url);
        assert_eq!(a.file_name, b.file_name);
    }
}
