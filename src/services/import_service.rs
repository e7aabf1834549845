//! src/services/import_service.rs
//!
//! ImportService: runs the question import pipeline against an uploaded
//! table and, on commit, writes one exam header plus its questions.
//! Preview and commit both start again from the raw file bytes.

use crate::{
    import::{
        ColumnMapping, ImportError, ImportField, ImportResult, ImportedQuestion, KeywordStrategy,
        MappingStrategy, RowIssue, SourceFormat, dedupe, decode, validate_rows,
    },
    models::exam::{Exam, MULTIPLE_CHOICE},
    services::catalog_service::{
        EXAM_COLUMNS, clean_class_names, sync_question_count, unknown_classes,
    },
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::{QueryBuilder, SqlitePool, sqlite::Sqlite, types::Json};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Questions written per INSERT statement.
pub const QUESTION_BATCH_SIZE: usize = 100;

pub const DEFAULT_DURATION_MINUTES: u32 = 60;

/// Exam header fields supplied by the user at commit time.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExamDraft {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub duration_minutes: Option<u32>,
    #[serde(default)]
    pub classes: Vec<String>,
}

/// Everything the user needs to review a file before committing it.
#[derive(Debug, Serialize)]
pub struct ImportPreview {
    pub format: SourceFormat,
    pub headers: Vec<String>,
    pub mapping: ColumnMapping,
    /// Set when the mapping cannot be used yet (e.g. no answer column).
    pub mapping_problem: Option<String>,
    /// Required or optional fields with no column bound.
    pub unmapped_fields: Vec<ImportField>,
    pub questions: Vec<ImportedQuestion>,
    pub issues: Vec<RowIssue>,
    pub rejected_rows: usize,
    pub skipped_blank: usize,
    pub duplicates_removed: usize,
}

/// Result of a committed import.
#[derive(Debug, Serialize)]
pub struct ImportOutcome {
    pub exam: Exam,
    pub imported: usize,
    pub duplicates_removed: usize,
    pub rejected_rows: usize,
    pub skipped_blank: usize,
    pub issues: Vec<RowIssue>,
}

struct Reconciled {
    questions: Vec<ImportedQuestion>,
    issues: Vec<RowIssue>,
    rejected_rows: usize,
    skipped_blank: usize,
    duplicates_removed: usize,
}

#[derive(Clone)]
pub struct ImportService {
    pub db: Arc<SqlitePool>,
    strategy: Arc<dyn MappingStrategy + Send + Sync>,
}

impl ImportService {
    pub fn new(db: Arc<SqlitePool>) -> Self {
        Self::with_strategy(db, Arc::new(KeywordStrategy::builtin()))
    }

    /// Use a custom header-guessing strategy.
    pub fn with_strategy(
        db: Arc<SqlitePool>,
        strategy: Arc<dyn MappingStrategy + Send + Sync>,
    ) -> Self {
        Self { db, strategy }
    }

    /// Decode, map, validate and dedupe without writing anything.
    ///
    /// Without a `mapping` the strategy's suggestion is used. A mapping that
    /// lacks required fields is returned with `mapping_problem` set so the
    /// caller can complete it. The parsing runs on the blocking pool.
    pub async fn preview(
        &self,
        file_name: &str,
        bytes: &[u8],
        mapping: Option<ColumnMapping>,
    ) -> ImportResult<ImportPreview> {
        let strategy = self.strategy.clone();
        let file_name = file_name.to_string();
        let bytes = bytes.to_vec();
        run_blocking(move || build_preview(strategy.as_ref(), &file_name, &bytes, mapping)).await
    }

    /// Run the whole pipeline and store the result as a new published exam.
    ///
    /// Questions are written in batches of [`QUESTION_BATCH_SIZE`]. A failing
    /// batch leaves the exam and earlier batches in place, with its question
    /// count lowered to what was stored, and is reported as
    /// [`ImportError::PartialBatch`].
    pub async fn commit(
        &self,
        file_name: &str,
        bytes: &[u8],
        mapping: Option<ColumnMapping>,
        draft: ExamDraft,
    ) -> ImportResult<ImportOutcome> {
        let title = draft.title.trim().to_string();
        let classes = clean_class_names(&draft.classes);
        if classes.is_empty() {
            return Err(ImportError::NoTargetClass);
        }
        if title.is_empty() {
            return Err(ImportError::MissingTitle);
        }
        let unknown = unknown_classes(&*self.db, &classes).await?;
        if !unknown.is_empty() {
            return Err(ImportError::UnknownClasses(unknown));
        }

        let strategy = self.strategy.clone();
        let file_name = file_name.to_string();
        let bytes = bytes.to_vec();
        let reconciled = run_blocking(move || {
            let table = decode(&file_name, &bytes)?;
            let mapping = mapping.unwrap_or_else(|| strategy.suggest(&table.headers));
            mapping.check(&table)?;
            Ok(reconcile(&table, &mapping))
        })
        .await?;
        if reconciled.questions.is_empty() {
            return Err(ImportError::NothingToImport);
        }

        let now = Utc::now();
        let description = draft
            .description
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty())
            .unwrap_or_else(|| format!("Imported from file on {}", now.format("%Y-%m-%d")));
        let duration = draft.duration_minutes.unwrap_or(DEFAULT_DURATION_MINUTES);

        let exam = sqlx::query_as::<_, Exam>(&format!(
            "INSERT INTO exams (
                id, title, description, duration_minutes, exam_date, classes,
                published, question_count, created_at, published_at
             ) VALUES (?, ?, ?, ?, ?, ?, 1, ?, ?, ?)
             RETURNING {EXAM_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(&title)
        .bind(&description)
        .bind(i64::from(duration))
        .bind(now.date_naive())
        .bind(Json(&classes))
        .bind(reconciled.questions.len() as i64)
        .bind(now)
        .bind(now)
        .fetch_one(&*self.db)
        .await?;

        let expected = reconciled.questions.len();
        let mut inserted = 0;
        for batch in reconciled.questions.chunks(QUESTION_BATCH_SIZE) {
            if let Err(source) = self.insert_batch(exam.id, inserted, batch).await {
                warn!(
                    "import into exam {} stopped after {} of {} questions: {}",
                    exam.id, inserted, expected, source
                );
                if let Err(err) = sync_question_count(&*self.db, exam.id).await {
                    warn!("could not correct question count of exam {}: {}", exam.id, err);
                }
                return Err(ImportError::PartialBatch {
                    exam_id: exam.id,
                    inserted,
                    expected,
                    source,
                });
            }
            inserted += batch.len();
        }

        info!(
            "imported {} questions into exam `{}` ({}) for {} classes",
            inserted,
            exam.title,
            exam.id,
            classes.len()
        );
        Ok(ImportOutcome {
            exam,
            imported: inserted,
            duplicates_removed: reconciled.duplicates_removed,
            rejected_rows: reconciled.rejected_rows,
            skipped_blank: reconciled.skipped_blank,
            issues: reconciled.issues,
        })
    }

    async fn insert_batch(
        &self,
        exam_id: Uuid,
        offset: usize,
        batch: &[ImportedQuestion],
    ) -> Result<(), sqlx::Error> {
        let now = Utc::now();
        let mut builder = QueryBuilder::<Sqlite>::new(
            "INSERT INTO questions (
                id, exam_id, position, question_type, question_text, options,
                correct_index, points, created_at
             ) ",
        );
        builder.push_values(batch.iter().enumerate(), |mut row, (i, question)| {
            row.push_bind(Uuid::new_v4())
                .push_bind(exam_id)
                .push_bind((offset + i + 1) as i64)
                .push_bind(MULTIPLE_CHOICE)
                .push_bind(question.question_text.clone())
                .push_bind(Json(question.options.to_vec()))
                .push_bind(i64::from(question.correct_index))
                .push_bind(i64::from(question.points))
                .push_bind(now);
        });
        builder.build().execute(&*self.db).await?;
        Ok(())
    }
}

/// Run CPU-bound parsing off the async workers.
async fn run_blocking<T, F>(work: F) -> ImportResult<T>
where
    F: FnOnce() -> ImportResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|err| ImportError::Worker(err.to_string()))?
}

fn build_preview(
    strategy: &(dyn MappingStrategy + Send + Sync),
    file_name: &str,
    bytes: &[u8],
    mapping: Option<ColumnMapping>,
) -> ImportResult<ImportPreview> {
    let table = decode(file_name, bytes)?;
    let mapping = mapping.unwrap_or_else(|| strategy.suggest(&table.headers));

    let mut preview = ImportPreview {
        format: table.format,
        headers: table.headers.clone(),
        unmapped_fields: unmapped_fields(&mapping),
        mapping,
        mapping_problem: None,
        questions: Vec::new(),
        issues: Vec::new(),
        rejected_rows: 0,
        skipped_blank: 0,
        duplicates_removed: 0,
    };

    match preview.mapping.check(&table) {
        Ok(()) => {}
        Err(err @ ImportError::MissingMapping(_)) => {
            preview.mapping_problem = Some(err.to_string());
            return Ok(preview);
        }
        Err(err) => return Err(err),
    }

    let reconciled = reconcile(&table, &preview.mapping);
    preview.questions = reconciled.questions;
    preview.issues = reconciled.issues;
    preview.rejected_rows = reconciled.rejected_rows;
    preview.skipped_blank = reconciled.skipped_blank;
    preview.duplicates_removed = reconciled.duplicates_removed;
    Ok(preview)
}

fn reconcile(table: &crate::import::DecodedTable, mapping: &ColumnMapping) -> Reconciled {
    let report = validate_rows(table, mapping);
    let rejected_rows = report.rejected_rows();
    if !report.issues.is_empty() {
        warn!("{} rows rejected during import validation", rejected_rows);
    }

    let (questions, duplicates_removed) = dedupe(report.accepted);
    if duplicates_removed > 0 {
        warn!("{} duplicate questions dropped", duplicates_removed);
    }

    Reconciled {
        questions,
        issues: report.issues,
        rejected_rows,
        skipped_blank: report.skipped_blank,
        duplicates_removed,
    }
}

/// Column fields with no header bound. Points are never listed since they
/// fall back to a constant.
pub fn unmapped_fields(mapping: &ColumnMapping) -> Vec<ImportField> {
    ImportField::ALL
        .iter()
        .copied()
        .filter(|f| *f != ImportField::Points && mapping.column(*f).is_none())
        .collect()
}
