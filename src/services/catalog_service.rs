//! src/services/catalog_service.rs
//!
//! CatalogService: classes and exams as they are browsed and maintained
//! outside of an import: listing, creating/removing classes, authoring exams
//! and their questions by hand, publishing and deleting exams.
//!
//! Question positions stay contiguous (`1..=n`) and `question_count` always
//! matches the number of stored questions.

use crate::{
    db::is_unique_violation,
    import::DEFAULT_POINTS,
    models::{
        class::SchoolClass,
        exam::{Exam, MULTIPLE_CHOICE, Question},
    },
};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use sqlx::{SqliteConnection, SqliteExecutor, SqlitePool, types::Json};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("class name must not be empty")]
    EmptyClassName,
    #[error("class `{0}` already exists")]
    ClassExists(String),
    #[error("class `{0}` not found")]
    ClassNotFound(String),
    #[error("exam `{0}` not found")]
    ExamNotFound(Uuid),
    #[error("question `{0}` not found")]
    QuestionNotFound(Uuid),
    #[error("exam title must not be empty")]
    MissingTitle,
    #[error("select at least one class")]
    NoTargetClass,
    #[error("unknown classes: {}", .0.join(", "))]
    UnknownClasses(Vec<String>),
    #[error("duration must be between 5 and 180 minutes, got {0}")]
    InvalidDuration(i64),
    #[error("invalid question: {0}")]
    InvalidQuestion(&'static str),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

pub type CatalogResult<T> = Result<T, CatalogError>;

pub(crate) const EXAM_COLUMNS: &str = "id, title, description, duration_minutes, exam_date, classes, \
     published, question_count, created_at, published_at";

pub(crate) const QUESTION_COLUMNS: &str = "id, exam_id, position, question_type, question_text, options, \
     correct_index, points, created_at";

pub const MIN_DURATION_MINUTES: i64 = 5;
pub const MAX_DURATION_MINUTES: i64 = 180;

/// Header of an exam written by hand. It starts unpublished and empty.
#[derive(Debug, Clone, Deserialize)]
pub struct NewExam {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub duration_minutes: i64,
    /// Defaults to today.
    #[serde(default)]
    pub exam_date: Option<NaiveDate>,
    #[serde(default)]
    pub classes: Vec<String>,
}

/// Partial update of an exam header; absent fields are left alone.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExamChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub duration_minutes: Option<i64>,
    pub exam_date: Option<NaiveDate>,
    pub classes: Option<Vec<String>>,
    pub published: Option<bool>,
}

/// A multiple-choice question as typed into the editor.
#[derive(Debug, Clone, Deserialize)]
pub struct QuestionInput {
    pub question_text: String,
    /// Two to four options, in A-D order.
    pub options: Vec<String>,
    /// 0-based index into `options`.
    pub correct_index: i64,
    #[serde(default = "default_points")]
    pub points: i64,
}

fn default_points() -> i64 {
    i64::from(DEFAULT_POINTS)
}

/// Checked question content, options padded to four slots.
struct CheckedQuestion {
    text: String,
    options: Vec<String>,
    correct_index: i64,
    points: i64,
}

impl QuestionInput {
    fn check(&self) -> CatalogResult<CheckedQuestion> {
        let text = self.question_text.trim();
        if text.is_empty() {
            return Err(CatalogError::InvalidQuestion("question text must not be empty"));
        }
        let mut options: Vec<String> = self.options.iter().map(|o| o.trim().to_string()).collect();
        if options.len() < 2 {
            return Err(CatalogError::InvalidQuestion("at least two options are required"));
        }
        if options.len() > 4 {
            return Err(CatalogError::InvalidQuestion("at most four options are allowed"));
        }
        if options.iter().any(String::is_empty) {
            return Err(CatalogError::InvalidQuestion("options must not be empty"));
        }
        if !(0..options.len() as i64).contains(&self.correct_index) {
            return Err(CatalogError::InvalidQuestion(
                "correct answer must point at one of the options",
            ));
        }
        if self.points < 1 {
            return Err(CatalogError::InvalidQuestion("points must be a positive integer"));
        }
        options.resize(4, String::new());
        Ok(CheckedQuestion {
            text: text.to_string(),
            options,
            correct_index: self.correct_index,
            points: self.points,
        })
    }
}

#[derive(Clone)]
pub struct CatalogService {
    pub db: Arc<SqlitePool>,
}

impl CatalogService {
    pub fn new(db: Arc<SqlitePool>) -> Self {
        Self { db }
    }

    /// All classes ordered by name.
    pub async fn list_classes(&self) -> CatalogResult<Vec<SchoolClass>> {
        let classes = sqlx::query_as::<_, SchoolClass>(
            "SELECT id, name, created_at FROM classes ORDER BY name ASC",
        )
        .fetch_all(&*self.db)
        .await?;
        Ok(classes)
    }

    pub async fn create_class(&self, name: &str) -> CatalogResult<SchoolClass> {
        let name = name.trim();
        if name.is_empty() {
            return Err(CatalogError::EmptyClassName);
        }

        let class = SchoolClass {
            id: Uuid::new_v4(),
            name: name.to_string(),
            created_at: Utc::now(),
        };
        match sqlx::query("INSERT INTO classes (id, name, created_at) VALUES (?, ?, ?)")
            .bind(class.id)
            .bind(&class.name)
            .bind(class.created_at)
            .execute(&*self.db)
            .await
        {
            Ok(_) => {
                info!("created class {}", class.name);
                Ok(class)
            }
            Err(err) if is_unique_violation(&err) => Err(CatalogError::ClassExists(class.name)),
            Err(err) => Err(CatalogError::Sqlx(err)),
        }
    }

    pub async fn delete_class(&self, name: &str) -> CatalogResult<()> {
        let result = sqlx::query("DELETE FROM classes WHERE name = ?")
            .bind(name)
            .execute(&*self.db)
            .await?;
        if result.rows_affected() == 0 {
            return Err(CatalogError::ClassNotFound(name.to_string()));
        }
        info!("deleted class {}", name);
        Ok(())
    }

    /// All exams, newest first.
    pub async fn list_exams(&self) -> CatalogResult<Vec<Exam>> {
        let exams = sqlx::query_as::<_, Exam>(&format!(
            "SELECT {EXAM_COLUMNS} FROM exams ORDER BY created_at DESC"
        ))
        .fetch_all(&*self.db)
        .await?;
        Ok(exams)
    }

    pub async fn get_exam(&self, id: Uuid) -> CatalogResult<Exam> {
        let mut conn = self.db.acquire().await?;
        fetch_exam(&mut conn, id).await
    }

    /// Questions of one exam in display order.
    pub async fn list_questions(&self, exam_id: Uuid) -> CatalogResult<Vec<Question>> {
        self.get_exam(exam_id).await?;
        let questions = sqlx::query_as::<_, Question>(&format!(
            "SELECT {QUESTION_COLUMNS} FROM questions WHERE exam_id = ? ORDER BY position ASC"
        ))
        .bind(exam_id)
        .fetch_all(&*self.db)
        .await?;
        Ok(questions)
    }

    /// Create an empty, unpublished exam for the given classes.
    pub async fn create_exam(&self, new: NewExam) -> CatalogResult<Exam> {
        let title = checked_title(&new.title)?;
        check_duration(new.duration_minutes)?;
        let classes = clean_class_names(&new.classes);
        self.check_classes(&classes).await?;

        let now = Utc::now();
        let exam = sqlx::query_as::<_, Exam>(&format!(
            "INSERT INTO exams (
                id, title, description, duration_minutes, exam_date, classes,
                published, question_count, created_at, published_at
             ) VALUES (?, ?, ?, ?, ?, ?, 0, 0, ?, NULL)
             RETURNING {EXAM_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(title)
        .bind(new.description.trim())
        .bind(new.duration_minutes)
        .bind(new.exam_date.unwrap_or_else(|| now.date_naive()))
        .bind(Json(&classes))
        .bind(now)
        .fetch_one(&*self.db)
        .await?;

        info!("created exam `{}` ({})", exam.title, exam.id);
        Ok(exam)
    }

    /// Apply `changes` to the exam header. Publishing stamps `published_at`.
    pub async fn update_exam(&self, exam_id: Uuid, changes: ExamChanges) -> CatalogResult<Exam> {
        let mut tx = self.db.begin().await?;
        let exam = fetch_exam(&mut tx, exam_id).await?;

        let title = match &changes.title {
            Some(title) => checked_title(title)?.to_string(),
            None => exam.title,
        };
        let duration = match changes.duration_minutes {
            Some(minutes) => {
                check_duration(minutes)?;
                minutes
            }
            None => exam.duration_minutes,
        };
        let classes = match &changes.classes {
            Some(classes) => {
                let classes = clean_class_names(classes);
                if classes.is_empty() {
                    return Err(CatalogError::NoTargetClass);
                }
                let unknown = unknown_classes(&mut *tx, &classes).await?;
                if !unknown.is_empty() {
                    return Err(CatalogError::UnknownClasses(unknown));
                }
                classes
            }
            None => exam.classes.0,
        };
        let description = changes
            .description
            .map(|d| d.trim().to_string())
            .unwrap_or(exam.description);
        let (published, published_at) = match changes.published {
            Some(true) => (true, Some(Utc::now())),
            Some(false) => (false, exam.published_at),
            None => (exam.published, exam.published_at),
        };

        let updated = sqlx::query_as::<_, Exam>(&format!(
            "UPDATE exams SET
                title = ?, description = ?, duration_minutes = ?, exam_date = ?,
                classes = ?, published = ?, published_at = ?
             WHERE id = ?
             RETURNING {EXAM_COLUMNS}"
        ))
        .bind(&title)
        .bind(&description)
        .bind(duration)
        .bind(changes.exam_date.unwrap_or(exam.exam_date))
        .bind(Json(&classes))
        .bind(published)
        .bind(published_at)
        .bind(exam_id)
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;

        info!("updated exam `{}` ({})", updated.title, updated.id);
        Ok(updated)
    }

    pub async fn set_published(&self, exam_id: Uuid, published: bool) -> CatalogResult<Exam> {
        self.update_exam(
            exam_id,
            ExamChanges {
                published: Some(published),
                ..ExamChanges::default()
            },
        )
        .await
    }

    /// Append a question after the exam's last one.
    pub async fn add_question(&self, exam_id: Uuid, input: QuestionInput) -> CatalogResult<Question> {
        let checked = input.check()?;

        let mut tx = self.db.begin().await?;
        fetch_exam(&mut tx, exam_id).await?;
        let position: i64 = sqlx::query_scalar(
            "SELECT COALESCE(MAX(position), 0) + 1 FROM questions WHERE exam_id = ?",
        )
        .bind(exam_id)
        .fetch_one(&mut *tx)
        .await?;

        let question = sqlx::query_as::<_, Question>(&format!(
            "INSERT INTO questions (
                id, exam_id, position, question_type, question_text, options,
                correct_index, points, created_at
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
             RETURNING {QUESTION_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(exam_id)
        .bind(position)
        .bind(MULTIPLE_CHOICE)
        .bind(&checked.text)
        .bind(Json(&checked.options))
        .bind(checked.correct_index)
        .bind(checked.points)
        .bind(Utc::now())
        .fetch_one(&mut *tx)
        .await?;
        sync_question_count(&mut *tx, exam_id).await?;
        tx.commit().await?;

        debug!("added question {} to exam {} at {}", question.id, exam_id, position);
        Ok(question)
    }

    /// Replace the content of a question. Its position is kept.
    pub async fn update_question(
        &self,
        question_id: Uuid,
        input: QuestionInput,
    ) -> CatalogResult<Question> {
        let checked = input.check()?;
        sqlx::query_as::<_, Question>(&format!(
            "UPDATE questions SET question_text = ?, options = ?, correct_index = ?, points = ?
             WHERE id = ?
             RETURNING {QUESTION_COLUMNS}"
        ))
        .bind(&checked.text)
        .bind(Json(&checked.options))
        .bind(checked.correct_index)
        .bind(checked.points)
        .bind(question_id)
        .fetch_optional(&*self.db)
        .await?
        .ok_or(CatalogError::QuestionNotFound(question_id))
    }

    /// Remove a question and close the gap it leaves in the numbering.
    pub async fn delete_question(&self, question_id: Uuid) -> CatalogResult<()> {
        let mut tx = self.db.begin().await?;
        let (exam_id, position): (Uuid, i64) =
            sqlx::query_as("DELETE FROM questions WHERE id = ? RETURNING exam_id, position")
                .bind(question_id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or(CatalogError::QuestionNotFound(question_id))?;

        sqlx::query("UPDATE questions SET position = position - 1 WHERE exam_id = ? AND position > ?")
            .bind(exam_id)
            .bind(position)
            .execute(&mut *tx)
            .await?;
        sync_question_count(&mut *tx, exam_id).await?;
        tx.commit().await?;

        info!("deleted question {} from exam {}", question_id, exam_id);
        Ok(())
    }

    /// Delete an exam; its questions go with it.
    pub async fn delete_exam(&self, exam_id: Uuid) -> CatalogResult<()> {
        let result = sqlx::query("DELETE FROM exams WHERE id = ?")
            .bind(exam_id)
            .execute(&*self.db)
            .await?;
        if result.rows_affected() == 0 {
            return Err(CatalogError::ExamNotFound(exam_id));
        }
        info!("deleted exam {}", exam_id);
        Ok(())
    }

    async fn check_classes(&self, classes: &[String]) -> CatalogResult<()> {
        if classes.is_empty() {
            return Err(CatalogError::NoTargetClass);
        }
        let unknown = unknown_classes(&*self.db, classes).await?;
        if unknown.is_empty() {
            Ok(())
        } else {
            Err(CatalogError::UnknownClasses(unknown))
        }
    }
}

/// Trimmed, non-empty class names with repeats removed, in input order.
pub(crate) fn clean_class_names(classes: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(classes.len());
    for name in classes.iter().map(|c| c.trim()).filter(|c| !c.is_empty()) {
        if !out.iter().any(|seen| seen == name) {
            out.push(name.to_string());
        }
    }
    out
}

/// Names from `classes` with no row in the `classes` table.
pub(crate) async fn unknown_classes<'e>(
    db: impl SqliteExecutor<'e>,
    classes: &[String],
) -> sqlx::Result<Vec<String>> {
    let known: Vec<String> = sqlx::query_scalar("SELECT name FROM classes")
        .fetch_all(db)
        .await?;
    Ok(classes
        .iter()
        .filter(|c| !known.contains(c))
        .cloned()
        .collect())
}

fn checked_title(raw: &str) -> CatalogResult<&str> {
    let title = raw.trim();
    if title.is_empty() {
        return Err(CatalogError::MissingTitle);
    }
    Ok(title)
}

fn check_duration(minutes: i64) -> CatalogResult<()> {
    if (MIN_DURATION_MINUTES..=MAX_DURATION_MINUTES).contains(&minutes) {
        Ok(())
    } else {
        Err(CatalogError::InvalidDuration(minutes))
    }
}

async fn fetch_exam(conn: &mut SqliteConnection, id: Uuid) -> CatalogResult<Exam> {
    sqlx::query_as::<_, Exam>(&format!("SELECT {EXAM_COLUMNS} FROM exams WHERE id = ?"))
        .bind(id)
        .fetch_optional(conn)
        .await?
        .ok_or(CatalogError::ExamNotFound(id))
}

/// Set `question_count` to the number of stored questions.
pub(crate) async fn sync_question_count<'e>(
    db: impl SqliteExecutor<'e>,
    exam_id: Uuid,
) -> sqlx::Result<()> {
    sqlx::query(
        "UPDATE exams SET question_count = (SELECT COUNT(*) FROM questions WHERE exam_id = ?)
         WHERE id = ?",
    )
    .bind(exam_id)
    .bind(exam_id)
    .execute(db)
    .await?;
    Ok(())
}
