//! src/services/file_service.rs
//!
//! FileService: the virtual file tree. Entries are flat SQLite rows keyed by
//! absolute path; file payloads live in the `BlobStore` under a key derived
//! from the path. Folder rename and delete cascade over every row whose path
//! starts with the folder's path.

use crate::{
    db::is_unique_violation,
    models::path_entry::{PathEntry, TreeStats},
    paths::{self, NameProblem, ROOT},
    services::blob_store::BlobStore,
};
use chrono::Utc;
use serde::Serialize;
use sqlx::{SqliteConnection, SqlitePool};
use std::{io, sync::Arc};
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum FileError {
    #[error("invalid name `{name}`: {problem}")]
    InvalidName { name: String, problem: NameProblem },
    #[error("`{0}` already exists")]
    AlreadyExists(String),
    #[error("file `{name}` is {size} bytes, the limit is {max} bytes")]
    TooLarge {
        name: String,
        size: usize,
        max: usize,
    },
    #[error("`{0}` not found")]
    NotFound(String),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type FileResult<T> = Result<T, FileError>;

/// Outcome of a delete, reported back to the caller.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct DeleteSummary {
    pub path: String,
    pub entries_removed: u64,
    pub blobs_removed: usize,
}

const ENTRY_COLUMNS: &str =
    "id, path, name, parent_path, is_folder, size_bytes, mime_type, blob_ref, created_at";

const DEFAULT_MIME: &str = "application/octet-stream";

/// FileService provides the file-manager operations:
/// - list a folder (folders first, then by name)
/// - create a folder
/// - upload a file (last write wins on the same sanitized path)
/// - rename a file or folder (folder renames rewrite the whole subtree)
/// - delete a file or folder (folder deletes cascade over the subtree)
#[derive(Clone)]
pub struct FileService {
    /// Shared SQLite connection pool used for the `files` table.
    pub db: Arc<SqlitePool>,

    /// Payload storage.
    pub blobs: BlobStore,
}

impl FileService {
    pub fn new(db: Arc<SqlitePool>, blobs: BlobStore) -> Self {
        Self { db, blobs }
    }

    /// All entries directly inside `folder`, folders first, then alphabetical.
    pub async fn list_children(&self, folder: &str) -> FileResult<Vec<PathEntry>> {
        let folder = paths::normalize_folder_path(folder);
        let mut conn = self.db.acquire().await?;
        ensure_folder_exists(&mut conn, &folder).await?;

        let entries = sqlx::query_as::<_, PathEntry>(&format!(
            "SELECT {ENTRY_COLUMNS} FROM files
             WHERE parent_path = ?
             ORDER BY is_folder DESC, name COLLATE NOCASE ASC, name ASC"
        ))
        .bind(&folder)
        .fetch_all(&mut *conn)
        .await?;

        Ok(entries)
    }

    /// Look up a single entry by path.
    pub async fn get_entry(&self, path: &str) -> FileResult<PathEntry> {
        let path = paths::normalize_entry_path(path);
        let mut conn = self.db.acquire().await?;
        resolve_entry(&mut conn, &path)
            .await?
            .ok_or(FileError::NotFound(path))
    }

    /// Create an empty folder named `name` inside `parent`.
    pub async fn create_folder(&self, parent: &str, name: &str) -> FileResult<PathEntry> {
        let name = checked_name(name)?;
        let parent = paths::normalize_folder_path(parent);
        let path = paths::folder_path(&parent, name);

        let mut conn = self.db.acquire().await?;
        ensure_folder_exists(&mut conn, &parent).await?;

        let entry = PathEntry {
            id: Uuid::new_v4(),
            path: path.clone(),
            name: name.to_string(),
            parent_path: parent,
            is_folder: true,
            size_bytes: None,
            mime_type: None,
            blob_ref: None,
            created_at: Utc::now(),
        };

        match sqlx::query(
            "INSERT INTO files (id, path, name, parent_path, is_folder, created_at)
             VALUES (?, ?, ?, ?, 1, ?)",
        )
        .bind(entry.id)
        .bind(&entry.path)
        .bind(&entry.name)
        .bind(&entry.parent_path)
        .bind(entry.created_at)
        .execute(&mut *conn)
        .await
        {
            Ok(_) => {
                info!("created folder {}", entry.path);
                Ok(entry)
            }
            Err(err) if is_unique_violation(&err) => Err(FileError::AlreadyExists(path)),
            Err(err) => Err(FileError::Sqlx(err)),
        }
    }

    /// Store `bytes` as `file_name` inside `parent`.
    ///
    /// The name is sanitized to `[A-Za-z0-9._-]`. Uploading to a path that
    /// already holds a file replaces it.
    ///
    /// The payload is staged under a temporary key and only takes the place
    /// of the live blob while the record upsert is pending. Until that commits
    /// the previous payload is kept aside, so a failed upload leaves an
    /// existing file exactly as it was.
    pub async fn upload_file(
        &self,
        parent: &str,
        file_name: &str,
        bytes: &[u8],
        mime_type: Option<&str>,
        max_size: usize,
    ) -> FileResult<PathEntry> {
        if bytes.len() > max_size {
            return Err(FileError::TooLarge {
                name: file_name.to_string(),
                size: bytes.len(),
                max: max_size,
            });
        }

        let name = paths::sanitize_file_name(file_name.trim());
        paths::validate_name(&name).map_err(|problem| FileError::InvalidName {
            name: file_name.to_string(),
            problem,
        })?;
        let parent = paths::normalize_folder_path(parent);
        let path = paths::file_path(&parent, &name);
        let key = paths::blob_key(&path);
        let mime = mime_type
            .filter(|m| !m.trim().is_empty())
            .unwrap_or(DEFAULT_MIME);

        {
            let mut conn = self.db.acquire().await?;
            ensure_folder_exists(&mut conn, &parent).await?;
        }

        let staged = format!("{}.upload-{}", key, Uuid::new_v4());
        self.blobs.put(&staged, bytes).await?;

        let mut tx = match self.db.begin().await {
            Ok(tx) => tx,
            Err(err) => {
                self.discard_blob(&staged).await;
                return Err(FileError::Sqlx(err));
            }
        };

        let upsert = sqlx::query_as::<_, PathEntry>(&format!(
            "INSERT INTO files (
                id, path, name, parent_path, is_folder, size_bytes, mime_type, blob_ref, created_at
             ) VALUES (?, ?, ?, ?, 0, ?, ?, ?, ?)
             ON CONFLICT(path) DO UPDATE SET
                size_bytes = excluded.size_bytes,
                mime_type = excluded.mime_type,
                blob_ref = excluded.blob_ref,
                created_at = excluded.created_at
             RETURNING {ENTRY_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(&path)
        .bind(&name)
        .bind(&parent)
        .bind(bytes.len() as i64)
        .bind(mime)
        .bind(&key)
        .bind(Utc::now())
        .fetch_one(&mut *tx)
        .await;

        let entry = match upsert {
            Ok(entry) => entry,
            Err(err) => {
                warn!("upload of {} failed: {}", path, err);
                self.discard_blob(&staged).await;
                return Err(FileError::Sqlx(err));
            }
        };

        let backup = format!("{}.previous-{}", key, Uuid::new_v4());
        let kept_previous = match self.blobs.move_blob(&key, &backup).await {
            Ok(()) => true,
            Err(err) if err.kind() == io::ErrorKind::NotFound => false,
            Err(err) => {
                self.discard_blob(&staged).await;
                return Err(FileError::Io(err));
            }
        };
        let previous = kept_previous.then(|| (key.clone(), backup.clone()));

        if let Err(err) = self.blobs.move_blob(&staged, &key).await {
            warn!("blob move {} -> {} failed: {}", staged, key, err);
            self.discard_blob(&staged).await;
            self.undo_moves(previous.as_slice()).await;
            return Err(FileError::Io(err));
        }

        if let Err(err) = tx.commit().await {
            warn!("commit of upload {} failed: {}; restoring blob", path, err);
            self.discard_blob(&key).await;
            self.undo_moves(previous.as_slice()).await;
            return Err(FileError::Sqlx(err));
        }

        if kept_previous {
            self.discard_blob(&backup).await;
        }
        info!("uploaded {} ({} bytes)", entry.path, bytes.len());
        Ok(entry)
    }

    /// Rename the entry at `path` to `new_name`, keeping it in the same folder.
    ///
    /// All record updates share one transaction. Blob moves happen while it is
    /// open; if any step fails the moves are reversed and nothing is committed.
    pub async fn rename(&self, path: &str, new_name: &str) -> FileResult<PathEntry> {
        let new_name = checked_name(new_name)?;
        let path = paths::normalize_entry_path(path);

        let mut tx = self.db.begin().await?;
        let entry = resolve_entry(&mut tx, &path)
            .await?
            .ok_or_else(|| FileError::NotFound(path.clone()))?;

        let (old_base, new_base) = if entry.is_folder {
            (
                entry.path.clone(),
                paths::folder_path(&entry.parent_path, new_name),
            )
        } else {
            (
                entry.path.clone(),
                paths::file_path(&entry.parent_path, new_name),
            )
        };
        if old_base == new_base {
            return Ok(entry);
        }
        if fetch_entry(&mut tx, &new_base).await?.is_some() {
            return Err(FileError::AlreadyExists(new_base));
        }

        let affected = if entry.is_folder {
            fetch_subtree(&mut tx, &old_base).await?
        } else {
            vec![entry.clone()]
        };

        let mut renamed = None;
        let mut moves = Vec::new();
        for item in &affected {
            let new_path = paths::rebase(&item.path, &old_base, &new_base)
                .unwrap_or_else(|| item.path.clone());
            let (name, parent_path) = if item.id == entry.id {
                (new_name.to_string(), item.parent_path.clone())
            } else {
                let parent = paths::rebase(&item.parent_path, &old_base, &new_base)
                    .unwrap_or_else(|| item.parent_path.clone());
                (item.name.clone(), parent)
            };
            let blob_ref = (!item.is_folder).then(|| paths::blob_key(&new_path));
            if let Some(new_key) = &blob_ref {
                let old_key = item
                    .blob_ref
                    .clone()
                    .unwrap_or_else(|| paths::blob_key(&item.path));
                moves.push((old_key, new_key.clone()));
            }

            let updated = sqlx::query_as::<_, PathEntry>(&format!(
                "UPDATE files SET path = ?, name = ?, parent_path = ?, blob_ref = ?
                 WHERE id = ?
                 RETURNING {ENTRY_COLUMNS}"
            ))
            .bind(&new_path)
            .bind(&name)
            .bind(&parent_path)
            .bind(&blob_ref)
            .bind(item.id)
            .fetch_one(&mut *tx)
            .await
            .map_err(|err| {
                if is_unique_violation(&err) {
                    FileError::AlreadyExists(new_path.clone())
                } else {
                    FileError::Sqlx(err)
                }
            })?;
            debug!("rewrote {} -> {}", item.path, updated.path);

            if item.id == entry.id {
                renamed = Some(updated);
            }
        }

        let mut moved = Vec::with_capacity(moves.len());
        for (old_key, new_key) in moves {
            if let Err(err) = self.blobs.move_blob(&old_key, &new_key).await {
                warn!("blob move {} -> {} failed: {}; rolling back", old_key, new_key, err);
                self.undo_moves(&moved).await;
                return Err(FileError::Io(err));
            }
            moved.push((old_key, new_key));
        }

        if let Err(err) = tx.commit().await {
            warn!("commit of rename {} failed: {}; rolling back blobs", path, err);
            self.undo_moves(&moved).await;
            return Err(FileError::Sqlx(err));
        }

        info!(
            "renamed {} -> {} ({} entries)",
            old_base,
            new_base,
            affected.len()
        );
        renamed.ok_or(FileError::NotFound(path))
    }

    /// Delete the entry at `path`. Folders take their whole subtree with them.
    ///
    /// Records are removed in one transaction; blobs are removed after commit.
    pub async fn delete(&self, path: &str) -> FileResult<DeleteSummary> {
        let path = paths::normalize_entry_path(path);

        let mut tx = self.db.begin().await?;
        let entry = resolve_entry(&mut tx, &path)
            .await?
            .ok_or_else(|| FileError::NotFound(path.clone()))?;

        let (targets, result) = if entry.is_folder {
            let targets = fetch_subtree(&mut tx, &entry.path).await?;
            let result = sqlx::query("DELETE FROM files WHERE substr(path, 1, length(?)) = ?")
                .bind(&entry.path)
                .bind(&entry.path)
                .execute(&mut *tx)
                .await?;
            (targets, result)
        } else {
            let result = sqlx::query("DELETE FROM files WHERE id = ?")
                .bind(entry.id)
                .execute(&mut *tx)
                .await?;
            (vec![entry.clone()], result)
        };
        tx.commit().await?;

        let keys: Vec<String> = targets
            .iter()
            .filter(|e| !e.is_folder)
            .map(|e| e.blob_ref.clone().unwrap_or_else(|| paths::blob_key(&e.path)))
            .collect();
        let blobs_removed = self.blobs.remove(&keys).await.map_err(|err| {
            warn!(
                "records under {} deleted but blob removal failed: {}",
                entry.path, err
            );
            FileError::Io(err)
        })?;

        info!(
            "deleted {} ({} entries, {} blobs)",
            entry.path,
            result.rows_affected(),
            blobs_removed
        );
        Ok(DeleteSummary {
            path: entry.path,
            entries_removed: result.rows_affected(),
            blobs_removed,
        })
    }

    /// Open the payload of the file at `path` for streaming.
    pub async fn open_file(&self, path: &str) -> FileResult<(PathEntry, tokio::fs::File)> {
        let entry = self.get_entry(path).await?;
        if entry.is_folder {
            return Err(FileError::NotFound(entry.path));
        }
        let key = entry
            .blob_ref
            .clone()
            .unwrap_or_else(|| paths::blob_key(&entry.path));
        let file = self.blobs.open(&key).await.map_err(|err| {
            if err.kind() == io::ErrorKind::NotFound {
                FileError::NotFound(entry.path.clone())
            } else {
                FileError::Io(err)
            }
        })?;
        Ok((entry, file))
    }

    /// Totals over the whole tree.
    pub async fn stats(&self) -> FileResult<TreeStats> {
        let stats = sqlx::query_as::<_, TreeStats>(
            "SELECT
                COALESCE(SUM(CASE WHEN is_folder = 0 THEN 1 ELSE 0 END), 0) AS file_count,
                COALESCE(SUM(CASE WHEN is_folder = 1 THEN 1 ELSE 0 END), 0) AS folder_count,
                COALESCE(SUM(size_bytes), 0) AS total_bytes
             FROM files",
        )
        .fetch_one(&*self.db)
        .await?;
        Ok(stats)
    }

    /// Best-effort removal of a payload that no record points at.
    async fn discard_blob(&self, key: &str) {
        if let Err(err) = self.blobs.remove(&[key.to_string()]).await {
            warn!("could not remove blob {}: {}", key, err);
        }
    }

    async fn undo_moves(&self, moved: &[(String, String)]) {
        for (old_key, new_key) in moved.iter().rev() {
            if let Err(err) = self.blobs.move_blob(new_key, old_key).await {
                warn!("could not restore blob {} -> {}: {}", new_key, old_key, err);
            }
        }
    }
}

fn checked_name(raw: &str) -> FileResult<&str> {
    let name = raw.trim();
    paths::validate_name(name).map_err(|problem| FileError::InvalidName {
        name: raw.to_string(),
        problem,
    })?;
    Ok(name)
}

/// Look up `path`, accepting a folder path written without its trailing `/`.
async fn resolve_entry(conn: &mut SqliteConnection, path: &str) -> sqlx::Result<Option<PathEntry>> {
    if let Some(entry) = fetch_entry(conn, path).await? {
        return Ok(Some(entry));
    }
    if path.ends_with('/') {
        return Ok(None);
    }
    fetch_entry(conn, &format!("{}/", path))
        .await
        .map(|found| found.filter(|e| e.is_folder))
}

async fn fetch_entry(conn: &mut SqliteConnection, path: &str) -> sqlx::Result<Option<PathEntry>> {
    sqlx::query_as::<_, PathEntry>(&format!(
        "SELECT {ENTRY_COLUMNS} FROM files WHERE path = ?"
    ))
    .bind(path)
    .fetch_optional(conn)
    .await
}

/// The folder at `base` and everything below it, shallowest first.
///
/// Uses an exact prefix comparison: SQLite `LIKE` ignores ASCII case and
/// treats `_` as a wildcard.
async fn fetch_subtree(conn: &mut SqliteConnection, base: &str) -> sqlx::Result<Vec<PathEntry>> {
    sqlx::query_as::<_, PathEntry>(&format!(
        "SELECT {ENTRY_COLUMNS} FROM files
         WHERE substr(path, 1, length(?)) = ?
         ORDER BY length(path) ASC, path ASC"
    ))
    .bind(base)
    .bind(base)
    .fetch_all(conn)
    .await
}

async fn ensure_folder_exists(conn: &mut SqliteConnection, folder: &str) -> FileResult<()> {
    if folder == ROOT {
        return Ok(());
    }
    match fetch_entry(conn, folder).await? {
        Some(entry) if entry.is_folder => Ok(()),
        _ => Err(FileError::NotFound(folder.to_string())),
    }
}
