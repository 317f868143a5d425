//! Blob store collaborator.
//!
//! Objects are written under a random-suffixed name derived from the upload
//! filename and addressed by a public URL. `del` accepts that URL back.
//! Callers doing best-effort cleanup log and ignore `del` failures.

use std::path::PathBuf;
use thiserror::Error;
use uuid::Uuid;

const ALLOWED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "gif"];

#[derive(Debug, Error)]
pub enum BlobError {
    #[error("Invalid filename")]
    InvalidFilename,
    #[error("Unsupported file type")]
    UnsupportedType,
    #[error("URL is not managed by this store")]
    ForeignUrl,
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Where objects live on disk and the URL prefix they are served under.
#[derive(Debug, Clone)]
pub struct BlobConfig {
    pub dir: PathBuf,
    pub public_base: String,
}

impl Default for BlobConfig {
    fn default() -> Self {
        Self {
            dir: std::env::var("BLOB_STORE_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("uploads/cms")),
            public_base: std::env::var("BLOB_PUBLIC_BASE")
                .unwrap_or_else(|_| "/uploads/cms".to_string()),
        }
    }
}

fn is_safe_filename(filename: &str) -> bool {
    // Reject path traversal and special characters
    !filename.is_empty()
        && !filename.contains("..")
        && !filename.contains('/')
        && !filename.contains('\\')
        && !filename.contains('\0')
}

/// Derive the stored object name: `<stem>-<random>.<ext>`.
/// The random suffix keeps repeated uploads of the same filename distinct.
fn object_name(filename: &str) -> Result<String, BlobError> {
    if !is_safe_filename(filename) {
        return Err(BlobError::InvalidFilename);
    }
    let (stem, ext) = match filename.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem, ext.to_lowercase()),
        _ => return Err(BlobError::UnsupportedType),
    };
    if !ALLOWED_EXTENSIONS.contains(&ext.as_str()) {
        return Err(BlobError::UnsupportedType);
    }
    let suffix = Uuid::new_v4().simple().to_string();
    Ok(format!("{}-{}.{}", stem, &suffix[..8], ext))
}

/// Store `bytes` as a public object and return its URL.
pub async fn put_with(config: &BlobConfig, filename: &str, bytes: &[u8]) -> Result<String, BlobError> {
    let name = object_name(filename)?;
    tokio::fs::create_dir_all(&config.dir).await?;
    tokio::fs::write(config.dir.join(&name), bytes).await?;
    Ok(format!("{}/{}", config.public_base.trim_end_matches('/'), name))
}

/// Remove the object behind a store URL.
pub async fn del_with(config: &BlobConfig, url: &str) -> Result<(), BlobError> {
    let name = url
        .strip_prefix(config.public_base.trim_end_matches('/'))
        .and_then(|rest| rest.strip_prefix('/'))
        .ok_or(BlobError::ForeignUrl)?;
    if !is_safe_filename(name) {
        return Err(BlobError::InvalidFilename);
    }
    tokio::fs::remove_file(config.dir.join(name)).await?;
    Ok(())
}

/// Whether a URL points at an object this store manages.
/// External image URLs (photo CDNs pasted into the admin UI) are left alone.
pub fn is_store_url_with(config: &BlobConfig, url: &str) -> bool {
    url.starts_with(&format!("{}/", config.public_base.trim_end_matches('/')))
}

pub async fn put(filename: &str, bytes: &[u8]) -> Result<String, BlobError> {
    put_with(&BlobConfig::default(), filename, bytes).await
}

pub async fn del(url: &str) -> Result<(), BlobError> {
    del_with(&BlobConfig::default(), url).await
}

pub fn is_store_url(url: &str) -> bool {
    is_store_url_with(&BlobConfig::default(), url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn test_config(dir: &Path) -> BlobConfig {
        BlobConfig {
            dir: dir.to_path_buf(),
            public_base: "/uploads/cms".to_string(),
        }
    }

    #[tokio::test]
    async fn test_put_returns_store_url_and_writes_object() {
        let tmp = tempfile::tempdir().unwrap();
        let config = test_config(tmp.path());

        let url = put_with(&config, "hero.jpg", b"fake-image").await.unwrap();
        assert!(url.starts_with("/uploads/cms/hero-"));
        assert!(url.ends_with(".jpg"));
        assert!(is_store_url_with(&config, &url));

        let name = url.rsplit('/').next().unwrap();
        let stored = tokio::fs::read(tmp.path().join(name)).await.unwrap();
        assert_eq!(stored, b"fake-image");
    }

    #[tokio::test]
    async fn test_put_same_filename_twice_yields_distinct_urls() {
        let tmp = tempfile::tempdir().unwrap();
        let config = test_config(tmp.path());

        let first = put_with(&config, "hero.jpg", b"a").await.unwrap();
        let second = put_with(&config, "hero.jpg", b"b").await.unwrap();
        assert_ne!(first, second);
    }

    #[tokio::test]
    async fn test_del_removes_object() {
        let tmp = tempfile::tempdir().unwrap();
        let config = test_config(tmp.path());

        let url = put_with(&config, "banner.png", b"x").await.unwrap();
        del_with(&config, &url).await.unwrap();

        let name = url.rsplit('/').next().unwrap();
        assert!(!tmp.path().join(name).exists());
    }

    #[tokio::test]
    async fn test_del_rejects_foreign_url() {
        let tmp = tempfile::tempdir().unwrap();
        let config = test_config(tmp.path());

        let result = del_with(&config, "https://images.example.com/photo.jpg").await;
        assert!(matches!(result, Err(BlobError::ForeignUrl)));
    }

    #[tokio::test]
    async fn test_put_rejects_traversal_and_unknown_types() {
        let tmp = tempfile::tempdir().unwrap();
        let config = test_config(tmp.path());

        assert!(matches!(
            put_with(&config, "../escape.jpg", b"x").await,
            Err(BlobError::InvalidFilename)
        ));
        assert!(matches!(
            put_with(&config, "notes.txt", b"x").await,
            Err(BlobError::UnsupportedType)
        ));
    }

    #[test]
    fn test_is_store_url_distinguishes_external_hosts() {
        let config = BlobConfig {
            dir: PathBuf::from("uploads/cms"),
            public_base: "/uploads/cms".to_string(),
        };
        assert!(is_store_url_with(&config, "/uploads/cms/hero-abc123.jpg"));
        assert!(!is_store_url_with(&config, "https://i.ibb.co/abc/IMG_0821.jpg"));
        assert!(!is_store_url_with(&config, "/uploads/other/hero.jpg"));
    }
}
