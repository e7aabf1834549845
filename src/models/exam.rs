//! Exam headers and their multiple-choice questions.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, types::Json};
use uuid::Uuid;

/// Question type written for every imported question.
pub const MULTIPLE_CHOICE: &str = "multiple-choice";

/// An exam header record.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug)]
pub struct Exam {
    pub id: Uuid,

    pub title: String,

    pub description: String,

    /// Time allowed, in minutes.
    pub duration_minutes: i64,

    pub exam_date: NaiveDate,

    /// Names of the classes this exam targets.
    pub classes: Json<Vec<String>>,

    pub published: bool,

    /// Number of questions currently attached.
    pub question_count: i64,

    pub created_at: DateTime<Utc>,

    pub published_at: Option<DateTime<Utc>>,
}

/// A stored question belonging to an exam.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug)]
pub struct Question {
    pub id: Uuid,

    pub exam_id: Uuid,

    /// 1-based order within the exam.
    pub position: i64,

    pub question_type: String,

    pub question_text: String,

    /// Options A-D; unused options are empty strings.
    pub options: Json<Vec<String>>,

    /// 0-based index into `options`.
    pub correct_index: i64,

    pub points: i64,

    pub created_at: DateTime<Utc>,
}
