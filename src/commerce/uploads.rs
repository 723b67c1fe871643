//! Durable storage for uploaded product images

use std::path::{Path, PathBuf};

use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::config::UploadConfig;
use crate::{Error, Result};

/// Attempts before giving up on a unique file name
const NAME_ATTEMPTS: u32 = 8;

/// An image written to the upload directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredImage {
    pub path: PathBuf,
    /// Public URL the image is served under
    pub url: String,
}

/// Writes images under a directory that is served at a public prefix
#[derive(Debug, Clone)]
pub struct UploadStore {
    dir: PathBuf,
    public_prefix: String,
}

impl UploadStore {
    #[must_use]
    pub fn new(config: &UploadConfig) -> Self {
        Self {
            dir: config.dir.clone(),
            public_prefix: config.public_prefix.trim_end_matches('/').to_string(),
        }
    }

    /// Directory images are written to
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// URL prefix images are served under
    #[must_use]
    pub fn public_prefix(&self) -> &str {
        &self.public_prefix
    }

    /// Save image bytes as `prod_<nanos><ext>`
    ///
    /// # Errors
    ///
    /// Returns error if the directory cannot be created or the file written
    pub async fn save(&self, bytes: &[u8], mime: &str) -> Result<StoredImage> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let ext = extension_for(mime);
        let mut stamp = now_nanos();

        for _ in 0..NAME_ATTEMPTS {
            let filename = format!("prod_{stamp}{ext}");
            let path = self.dir.join(&filename);

            match tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(file) => {
                    write_or_discard(file, &path, bytes).await?;

                    tracing::debug!(path = %path.display(), bytes = bytes.len(), "image stored");
                    return Ok(StoredImage {
                        url: format!("{}/{filename}", self.public_prefix),
                        path,
                    });
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => stamp += 1,
                Err(e) => return Err(e.into()),
            }
        }

        Err(Error::Storage(format!(
            "could not find a free file name in {}",
            self.dir.display()
        )))
    }
}

/// File extension guessed from an image MIME type
#[must_use]
pub fn extension_for(mime: &str) -> &'static str {
    match mime.trim().to_lowercase().as_str() {
        "image/jpeg" | "image/jpg" => ".jpg",
        "image/webp" => ".webp",
        _ => ".png",
    }
}

fn now_nanos() -> i64 {
    chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default()
}

/// Write `bytes` into a freshly created file, removing the file if the write
/// fails so no truncated image is ever served
async fn write_or_discard<W>(mut file: W, path: &Path, bytes: &[u8]) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let written = async {
        file.write_all(bytes).await?;
        file.flush().await
    }
    .await;

    if let Err(e) = written {
        drop(file);
        if let Err(cleanup) = tokio::fs::remove_file(path).await {
            tracing::warn!(path = %path.display(), error = %cleanup, "failed to remove partial upload");
        }
        return Err(e.into());
    }
    Ok(())
}
