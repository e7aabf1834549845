//! Tabular question import.
//!
//! The pipeline is strictly sequential and pure up to the commit step:
//! [`decode`] turns file bytes into headers and rows, [`mapping`] binds
//! headers to logical fields, [`validate`] converts rows into questions and
//! collapses duplicates. Writing the exam happens in
//! `services::import_service`.

pub mod decode;
pub mod mapping;
pub mod template;
pub mod validate;

use thiserror::Error;

pub use decode::{DecodedTable, ImportRow, MAX_IMPORT_BYTES, SourceFormat, decode};
pub use mapping::{ColumnMapping, ImportField, KeywordStrategy, MappingStrategy, PointsSource};
pub use template::template_csv;
pub use validate::{
    DEFAULT_POINTS, ImportedQuestion, RowIssue, RowProblem, ValidationReport, dedupe,
    validate_rows,
};

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("unsupported file format `{0}`; use .csv, .xlsx or .xls")]
    UnsupportedFormat(String),
    #[error("file contains no data rows")]
    EmptyFile,
    #[error("file is {size} bytes, the limit is {max} bytes")]
    FileTooLarge { size: usize, max: usize },
    #[error("could not read file: {0}")]
    Malformed(String),
    #[error("column `{0}` is not present in the file")]
    UnknownColumn(String),
    #[error("no column selected for {0}")]
    MissingMapping(ImportField),
    #[error("select at least one class")]
    NoTargetClass,
    #[error("unknown classes: {}", .0.join(", "))]
    UnknownClasses(Vec<String>),
    #[error("exam title must not be empty")]
    MissingTitle,
    #[error("no valid questions to import")]
    NothingToImport,
    #[error("exam {exam_id} was created but only {inserted} of {expected} questions were stored: {source}")]
    PartialBatch {
        exam_id: uuid::Uuid,
        inserted: usize,
        expected: usize,
        #[source]
        source: sqlx::Error,
    },
    #[error("import worker stopped: {0}")]
    Worker(String),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

pub type ImportResult<T> = Result<T, ImportError>;
