//! Target class (student group) that exams are assigned to.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Serialize, Deserialize, Clone, FromRow, Debug)]
pub struct SchoolClass {
    pub id: Uuid,

    /// Unique class name, e.g. "XII RPL 1".
    pub name: String,

    pub created_at: DateTime<Utc>,
}
