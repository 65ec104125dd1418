//! Media storage
//!
//! Uploaded files live under the configured media root with UUID file names.
//! Paths stored in the database are relative to that root, e.g.
//! `posts/0b6c...e1.png`, and served under the configured URL prefix.

use crate::config::UploadConfig;
use anyhow::{bail, Context, Result};
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use uuid::Uuid;

/// Directory for main post images
pub const POST_IMAGE_DIR: &str = "posts";

/// Directory for gallery images
pub const GALLERY_DIR: &str = "gallery";

/// A file received from a multipart form
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

impl UploadedFile {
    pub fn is_image(&self) -> bool {
        self.content_type.contains("image")
    }
}

/// File store for uploaded media
#[derive(Debug, Clone)]
pub struct MediaStore {
    config: UploadConfig,
}

impl MediaStore {
    pub fn new(config: UploadConfig) -> Self {
        Self { config }
    }

    /// Media root on disk
    pub fn root(&self) -> &Path {
        &self.config.path
    }

    /// Upload limits and accepted types
    pub fn config(&self) -> &UploadConfig {
        &self.config
    }

    /// Write `data` to a fresh file in `dir` and return its relative path
    pub async fn save(&self, dir: &str, ext: &str, data: &[u8]) -> Result<String> {
        let target_dir = self.config.path.join(dir);
        fs::create_dir_all(&target_dir)
            .await
            .with_context(|| format!("Failed to create media dir {}", target_dir.display()))?;

        let file_name = format!("{}.{}", Uuid::new_v4(), ext);
        let relative = format!("{}/{}", dir, file_name);
        fs::write(target_dir.join(&file_name), data)
            .await
            .with_context(|| format!("Failed to save media file {}", relative))?;

        tracing::debug!(path = %relative, size = data.len(), "Stored media file");
        Ok(relative)
    }

    /// Delete a stored file. Missing files are ignored; other failures are
    /// logged, never returned.
    pub async fn remove(&self, relative: &str) {
        let path = match self.resolve(relative) {
            Ok(path) => path,
            Err(e) => {
                tracing::warn!(path = relative, error = %e, "Refusing to remove media file");
                return;
            }
        };
        match fs::remove_file(&path).await {
            Ok(()) => tracing::debug!(path = relative, "Removed media file"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(path = relative, error = %e, "Failed to remove media file"),
        }
    }

    pub async fn remove_all<I, S>(&self, paths: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for path in paths {
            self.remove(path.as_ref()).await;
        }
    }

    /// Store an upload in `dir`; the extension follows its content type
    pub async fn save_upload(&self, dir: &str, file: &UploadedFile) -> Result<String> {
        let ext = self.config.get_extension(&file.content_type);
        self.save(dir, ext, &file.data).await
    }

    /// Public URL of a stored file
    pub fn url(&self, relative: &str) -> String {
        format!(
            "{}/{}",
            self.config.url_prefix.trim_end_matches('/'),
            relative.trim_start_matches('/')
        )
    }

    fn resolve(&self, relative: &str) -> Result<PathBuf> {
        let path = Path::new(relative);
        let clean = path
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
        if relative.is_empty() || !clean {
            bail!("Invalid media path: {}", relative);
        }
        Ok(self.config.path.join(path))
    }
}
