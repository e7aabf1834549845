//! src/services/blob_store.rs
//!
//! BlobStore: file payloads on local disk, sharded beneath
//! `base_path/{shard}/{shard}/{key}`. Metadata lives in SQLite and is owned by
//! `FileService`; this type only knows keys and bytes.

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use std::{
    io::{self, ErrorKind},
    path::{Path, PathBuf},
};
use tokio::{
    fs::{self, File},
    io::AsyncWriteExt,
};
use tracing::debug;
use uuid::Uuid;

const MAX_BLOB_KEY_LEN: usize = 1024;

/// Everything but RFC 3986 unreserved characters is escaped in URL segments.
const URL_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

#[derive(Clone, Debug)]
pub struct BlobStore {
    /// Base directory on disk where payloads are stored.
    pub base_path: PathBuf,

    /// Prefix used to build public download URLs.
    public_base_url: String,
}

impl BlobStore {
    pub fn new(base_path: impl Into<PathBuf>, public_base_url: impl Into<String>) -> Self {
        Self {
            base_path: base_path.into(),
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Rejects keys that are empty, absolute, contain `..` or control bytes.
    pub fn ensure_key_safe(key: &str) -> io::Result<()> {
        let unsafe_key = key.is_empty()
            || key.len() > MAX_BLOB_KEY_LEN
            || key.starts_with('/')
            || key.split('/').any(|segment| segment == "..")
            || key
                .bytes()
                .any(|b| b.is_ascii_control() || b == b'\\' || b == b'\0');
        if unsafe_key {
            return Err(io::Error::new(
                ErrorKind::InvalidInput,
                format!("invalid blob key `{}`", key),
            ));
        }
        Ok(())
    }

    /// Two-level shard identifiers: first two bytes of MD5(key) in hex.
    fn shards(key: &str) -> (String, String) {
        let digest = md5::compute(key);
        (format!("{:02x}", digest[0]), format!("{:02x}", digest[1]))
    }

    /// Fully-qualified payload path. Parent directories may not exist yet.
    pub fn blob_path(&self, key: &str) -> PathBuf {
        let (shard_a, shard_b) = Self::shards(key);
        let mut path = self.base_path.clone();
        path.push(shard_a);
        path.push(shard_b);
        path.push(key);
        path
    }

    /// Download URL for `key`, with each path segment percent-encoded.
    pub fn public_url(&self, key: &str) -> String {
        let encoded = key
            .split('/')
            .map(|segment| utf8_percent_encode(segment, URL_SEGMENT).to_string())
            .collect::<Vec<_>>()
            .join("/");
        format!("{}/{}", self.public_base_url, encoded)
    }

    /// Write `bytes` under `key`, replacing any previous payload.
    ///
    /// Bytes go to a temp file that is fsynced and renamed into place.
    /// Returns the hex MD5 of the payload.
    pub async fn put(&self, key: &str, bytes: &[u8]) -> io::Result<String> {
        Self::ensure_key_safe(key)?;
        let file_path = self.blob_path(key);
        let parent = parent_dir(&file_path)?;
        fs::create_dir_all(&parent).await?;

        let tmp_path = parent.join(format!(".tmp-{}", Uuid::new_v4()));
        if let Err(err) = write_synced(&tmp_path, bytes).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(err);
        }

        if let Err(err) = fs::rename(&tmp_path, &file_path).await {
            if err.kind() == ErrorKind::AlreadyExists {
                fs::remove_file(&file_path).await?;
                fs::rename(&tmp_path, &file_path).await?;
            } else {
                let _ = fs::remove_file(&tmp_path).await;
                return Err(err);
            }
        }

        debug!("stored blob {} ({} bytes)", key, bytes.len());
        Ok(format!("{:x}", md5::compute(bytes)))
    }

    /// Move the payload at `old_key` to `new_key`.
    pub async fn move_blob(&self, old_key: &str, new_key: &str) -> io::Result<()> {
        Self::ensure_key_safe(old_key)?;
        Self::ensure_key_safe(new_key)?;
        if old_key == new_key {
            return Ok(());
        }

        let from = self.blob_path(old_key);
        let to = self.blob_path(new_key);
        fs::create_dir_all(parent_dir(&to)?).await?;
        fs::rename(&from, &to).await?;
        debug!("moved blob {} -> {}", old_key, new_key);

        if let Some(parent) = from.parent() {
            self.prune_empty_dirs(parent).await;
        }
        Ok(())
    }

    /// Remove payloads. Missing keys are skipped. Returns how many were removed.
    pub async fn remove(&self, keys: &[String]) -> io::Result<usize> {
        let mut removed = 0;
        for key in keys {
            Self::ensure_key_safe(key)?;
            let file_path = self.blob_path(key);
            match fs::remove_file(&file_path).await {
                Ok(_) => {
                    removed += 1;
                    debug!("removed blob {}", file_path.display());
                }
                Err(err) if err.kind() == ErrorKind::NotFound => {
                    debug!("blob {} already missing", file_path.display());
                }
                Err(err) => return Err(err),
            }
            if let Some(parent) = file_path.parent() {
                self.prune_empty_dirs(parent).await;
            }
        }
        Ok(removed)
    }

    /// Open a payload for streaming out.
    pub async fn open(&self, key: &str) -> io::Result<File> {
        Self::ensure_key_safe(key)?;
        File::open(self.blob_path(key)).await
    }

    /// Recursively remove empty directories up to the base path.
    async fn prune_empty_dirs(&self, start: &Path) {
        let mut current = start.to_path_buf();
        while current.starts_with(&self.base_path) && current != self.base_path {
            match fs::remove_dir(&current).await {
                Ok(_) => {
                    if let Some(parent) = current.parent() {
                        current = parent.to_path_buf();
                    } else {
                        break;
                    }
                }
                Err(err) if err.kind() == ErrorKind::NotFound => break,
                Err(err) if err.kind() == ErrorKind::DirectoryNotEmpty => break,
                Err(err) => {
                    debug!("failed to prune directory {}: {}", current.display(), err);
                    break;
                }
            }
        }
    }
}

fn parent_dir(path: &Path) -> io::Result<PathBuf> {
    path.parent()
        .map(Path::to_path_buf)
        .ok_or_else(|| io::Error::other("blob path missing parent directory"))
}

async fn write_synced(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut file = File::create(path).await?;
    file.write_all(bytes).await?;
    file.flush().await?;
    file.sync_all().await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_traversal_keys() {
        assert!(BlobStore::ensure_key_safe("docs/a.pdf").is_ok());
        assert!(BlobStore::ensure_key_safe("").is_err());
        assert!(BlobStore::ensure_key_safe("/abs").is_err());
        assert!(BlobStore::ensure_key_safe("docs/../etc").is_err());
        // `..` inside a name is fine
        assert!(BlobStore::ensure_key_safe("docs/a..b").is_ok());
    }

    #[tokio::test]
    async fn put_move_remove_cycle() {
        let dir = tempfile::tempdir().unwrap();
        let store = BlobStore::new(dir.path(), "http://localhost/blobs/");

        store.put("a/b.txt", b"hello").await.unwrap();
        assert!(store.blob_path("a/b.txt").exists());

        store.move_blob("a/b.txt", "c/b.txt").await.unwrap();
        assert!(!store.blob_path("a/b.txt").exists());
        assert_eq!(
            fs::read(store.blob_path("c/b.txt")).await.unwrap(),
            b"hello"
        );

        let removed = store
            .remove(&["c/b.txt".to_string(), "missing.txt".to_string()])
            .await
            .unwrap();
        assert_eq!(removed, 1);
    }

    #[test]
    fn public_url_escapes_each_segment() {
        let store = BlobStore::new("/tmp/blobs", "http://localhost/blobs/");
        assert_eq!(store.public_url("x/y.pdf"), "http://localhost/blobs/x/y.pdf");
        assert_eq!(
            store.public_url("Tugas Akhir/a.txt"),
            "http://localhost/blobs/Tugas%20Akhir/a.txt"
        );
        assert_eq!(
            store.public_url("Bab #1/50%/nilai_akhir-v2.txt"),
            "http://localhost/blobs/Bab%20%231/50%25/nilai_akhir-v2.txt"
        );
    }
}
