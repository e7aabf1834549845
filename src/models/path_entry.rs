//! Represents one node (file or folder) of the virtual file tree.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A single file or folder record keyed by absolute path.
///
/// The tree is stored flat: containment is expressed only through
/// `parent_path`, and `path == parent_path + name` (plus a trailing `/` for
/// folders) always holds.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug, PartialEq, Eq)]
pub struct PathEntry {
    /// Internal UUID; survives renames.
    pub id: Uuid,

    /// Absolute path, unique. Folders end with `/`.
    pub path: String,

    /// Display name (leaf segment).
    pub name: String,

    /// Path of the containing folder, `/` for root-level entries.
    pub parent_path: String,

    pub is_folder: bool,

    /// Size in bytes, files only.
    pub size_bytes: Option<i64>,

    /// MIME type, files only.
    pub mime_type: Option<String>,

    /// Key of the stored bytes in the blob store, files only.
    pub blob_ref: Option<String>,

    pub created_at: DateTime<Utc>,
}

/// Aggregate counters over the whole tree.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug, Default, PartialEq, Eq)]
pub struct TreeStats {
    pub file_count: i64,
    pub folder_count: i64,
    pub total_bytes: i64,
}
