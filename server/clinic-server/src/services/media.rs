//! Storage for uploaded payment receipts and consent signatures
//!
//! Clients send files as base64 text, optionally as a `data:` URL. Files are
//! written below the configured media directory and referenced by their
//! relative key.

use std::path::{Component, Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

/// Largest accepted upload once decoded (10 MiB)
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Storage backend for media files
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MediaStore: Send + Sync {
    /// Store `data` under `key` and return the key it can be found under
    async fn put(&self, key: &str, data: Vec<u8>) -> Result<String>;

    /// Delete the file under `key`; a missing file is not an error
    async fn remove(&self, key: &str) -> Result<()>;
}

/// Media directory on the local filesystem
pub struct LocalMediaStore {
    base_path: PathBuf,
}

impl LocalMediaStore {
    pub fn new(base_path: impl AsRef<Path>) -> Self {
        Self {
            base_path: base_path.as_ref().to_path_buf(),
        }
    }

    fn resolve(&self, key: &str) -> Result<PathBuf> {
        let relative = Path::new(key);
        let safe = relative
            .components()
            .all(|component| matches!(component, Component::Normal(_)));
        if key.is_empty() || !safe {
            return Err(anyhow!("Invalid media key: {}", key));
        }
        Ok(self.base_path.join(relative))
    }
}

#[async_trait]
impl MediaStore for LocalMediaStore {
    async fn put(&self, key: &str, data: Vec<u8>) -> Result<String> {
        let path = self.resolve(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create media directory {}", parent.display()))?;
        }

        let mut file = fs::File::create(&path)
            .await
            .with_context(|| format!("Failed to create media file {}", path.display()))?;
        file.write_all(&data).await.context("Failed to write media file")?;
        file.flush().await.context("Failed to flush media file")?;

        tracing::debug!(key = %key, bytes = data.len(), "Media file stored");
        Ok(key.to_string())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let path = self.resolve(key)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("Failed to remove media file {}", path.display())),
        }
    }
}

/// Pass `result` through, deleting the file under `key` when it is an error.
///
/// Used after a file was stored ahead of the row that references it.
pub async fn discard_on_error<T, E>(media: &dyn MediaStore, key: &str, result: Result<T, E>) -> Result<T, E> {
    if result.is_err() {
        if let Err(e) = media.remove(key).await {
            tracing::warn!(key = %key, error = %e, "Failed to remove orphaned media file");
        }
    }
    result
}

/// A decoded upload and the file extension it should be stored with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedUpload {
    pub bytes: Vec<u8>,
    pub extension: String,
}

/// Decode a base64 upload, accepting `data:<mime>;base64,` prefixes.
///
/// The extension comes from `filename_hint`, else from the data URL's MIME
/// subtype, else `fallback_extension`.
pub fn decode_upload(raw: &str, filename_hint: Option<&str>, fallback_extension: &str) -> Result<DecodedUpload> {
    let raw = raw.trim();
    let (mime, payload) = match raw.strip_prefix("data:").and_then(|rest| rest.split_once(',')) {
        Some((header, payload)) => (header.split(';').next(), payload),
        None => (None, raw),
    };

    let compact: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
    if compact.is_empty() {
        return Err(anyhow!("Uploaded file is empty"));
    }
    let bytes = STANDARD.decode(compact.as_bytes()).context("Uploaded file is not valid base64")?;
    if bytes.is_empty() {
        return Err(anyhow!("Uploaded file is empty"));
    }
    if bytes.len() > MAX_UPLOAD_BYTES {
        return Err(anyhow!("Uploaded file exceeds {} bytes", MAX_UPLOAD_BYTES));
    }

    let extension = filename_hint
        .and_then(|name| Path::new(name).extension())
        .and_then(|ext| ext.to_str())
        .and_then(clean_extension)
        .or_else(|| mime.and_then(|m| m.split('/').nth(1)).and_then(clean_extension))
        .unwrap_or_else(|| fallback_extension.to_string());

    Ok(DecodedUpload { bytes, extension })
}

fn clean_extension(ext: &str) -> Option<String> {
    let ext = ext.trim().to_ascii_lowercase();
    let ext = if ext == "jpeg" { "jpg".to_string() } else { ext };
    if !ext.is_empty() && ext.len() <= 5 && ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        Some(ext)
    } else {
        None
    }
}

/// Key of a transfer receipt
pub fn receipt_key(appointment_id: Uuid, extension: &str) -> String {
    format!("receipts/appointment_{}_{}.{}", appointment_id, Uuid::new_v4().simple(), extension)
}

/// Key of a patient's consent signature
pub fn signature_key(appointment_id: Uuid, extension: &str) -> String {
    format!("signatures/consent_appointment_{}.{}", appointment_id, extension)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_plain_base64() {
        let upload = decode_upload("aGVsbG8=", Some("comprobante.PDF"), "bin").unwrap();
        assert_eq!(upload.bytes, b"hello");
        assert_eq!(upload.extension, "pdf");
    }

    #[test]
    fn test_decode_data_url_uses_mime() {
        let upload = decode_upload("data:image/jpeg;base64,aGVsbG8=", None, "bin").unwrap();
        assert_eq!(upload.bytes, b"hello");
        assert_eq!(upload.extension, "jpg");
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(decode_upload("not base64 at all!", None, "png").is_err());
        assert!(decode_upload("data:image/png;base64,", None, "png").is_err());
        assert!(decode_upload("   ", None, "png").is_err());
    }

    #[test]
    fn test_fallback_extension() {
        let upload = decode_upload("aGVsbG8=", Some("firma"), "png").unwrap();
        assert_eq!(upload.extension, "png");
    }

    #[test]
    fn test_keys_stay_inside_media_dir() {
        let store = LocalMediaStore::new("/tmp/media");
        assert!(store.resolve("../etc/passwd").is_err());
        assert!(store.resolve("/etc/passwd").is_err());
        assert!(store.resolve("").is_err());
        assert!(store.resolve(&receipt_key(Uuid::new_v4(), "png")).is_ok());
    }

    #[tokio::test]
    async fn test_local_store_writes_file() {
        let dir = std::env::temp_dir().join(format!("clinic-media-{}", Uuid::new_v4()));
        let store = LocalMediaStore::new(&dir);
        let key = signature_key(Uuid::new_v4(), "png");

        let stored = store.put(&key, b"signature".to_vec()).await.unwrap();
        assert_eq!(stored, key);
        assert_eq!(tokio::fs::read(dir.join(&key)).await.unwrap(), b"signature");

        store.remove(&key).await.unwrap();
        assert!(!dir.join(&key).exists());
        store.remove(&key).await.unwrap();

        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }

    #[tokio::test]
    async fn test_failed_write_discards_file() {
        let key = receipt_key(Uuid::new_v4(), "png");
        let mut store = MockMediaStore::new();
        let expected = key.clone();
        store
            .expect_remove()
            .withf(move |k| k == expected)
            .times(1)
            .returning(|_| Ok(()));

        let result: Result<(), &str> = discard_on_error(&store, &key, Err("insert failed")).await;
        assert_eq!(result, Err("insert failed"));
    }

    #[tokio::test]
    async fn test_successful_write_keeps_file() {
        let mut store = MockMediaStore::new();
        store.expect_remove().times(0);

        let key = receipt_key(Uuid::new_v4(), "png");
        let result: Result<u8, &str> = discard_on_error(&store, &key, Ok(7)).await;
        assert_eq!(result, Ok(7));
    }

    #[tokio::test]
    async fn test_mock_store_contract() {
        let mut store = MockMediaStore::new();
        store
            .expect_put()
            .withf(|key, data| key.starts_with("receipts/") && data == b"hello")
            .times(1)
            .returning(|key, _| Ok(key.to_string()));

        let key = receipt_key(Uuid::new_v4(), "pdf");
        assert_eq!(store.put(&key, b"hello".to_vec()).await.unwrap(), key);
    }
}
