use crate::{
    import::ImportError,
    services::{catalog_service::CatalogError, file_service::FileError},
};
use axum::{
    Json,
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;

/// Failure classes surfaced to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidInput,
    Conflict,
    SizeLimitExceeded,
    NotFound,
    RemoteUnavailable,
    PartialBatchFailure,
}

impl ErrorKind {
    pub fn status(self) -> StatusCode {
        match self {
            ErrorKind::InvalidInput => StatusCode::BAD_REQUEST,
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::SizeLimitExceeded => StatusCode::PAYLOAD_TOO_LARGE,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::RemoteUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            ErrorKind::PartialBatchFailure => StatusCode::BAD_GATEWAY,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::InvalidInput => "invalid_input",
            ErrorKind::Conflict => "conflict",
            ErrorKind::SizeLimitExceeded => "size_limit_exceeded",
            ErrorKind::NotFound => "not_found",
            ErrorKind::RemoteUnavailable => "remote_unavailable",
            ErrorKind::PartialBatchFailure => "partial_batch_failure",
        }
    }
}

/// A lightweight wrapper for errors that keeps the message local.
#[derive(Debug)]
pub struct AppError {
    pub kind: ErrorKind,
    pub message: String,
}

impl AppError {
    pub fn new(kind: ErrorKind, msg: impl Into<String>) -> Self {
        Self {
            kind,
            message: msg.into(),
        }
    }

    /// Shortcut for 400 Bad Request
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidInput, msg)
    }

    /// Shortcut for 503 when the database or blob directory fails
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::RemoteUnavailable, msg)
    }

    pub fn status(&self) -> StatusCode {
        self.kind.status()
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.kind == ErrorKind::RemoteUnavailable {
            tracing::error!("store failure: {}", self.message);
        }
        let status = self.status();
        let body = Json(json!({
            "error": self.message,
            "kind": self.kind.as_str(),
            "status": status.as_u16()
        }));

        (status, body).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::unavailable(err.to_string())
    }
}

impl From<MultipartError> for AppError {
    fn from(err: MultipartError) -> Self {
        let kind = if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ErrorKind::SizeLimitExceeded
        } else {
            ErrorKind::InvalidInput
        };
        AppError::new(kind, err.body_text())
    }
}

impl From<FileError> for AppError {
    fn from(err: FileError) -> Self {
        let kind = match &err {
            FileError::InvalidName { .. } => ErrorKind::InvalidInput,
            FileError::AlreadyExists(_) => ErrorKind::Conflict,
            FileError::TooLarge { .. } => ErrorKind::SizeLimitExceeded,
            FileError::NotFound(_) => ErrorKind::NotFound,
            FileError::Sqlx(_) | FileError::Io(_) => ErrorKind::RemoteUnavailable,
        };
        AppError::new(kind, err.to_string())
    }
}

impl From<ImportError> for AppError {
    fn from(err: ImportError) -> Self {
        let kind = match &err {
            ImportError::FileTooLarge { .. } => ErrorKind::SizeLimitExceeded,
            ImportError::PartialBatch { .. } => ErrorKind::PartialBatchFailure,
            ImportError::Sqlx(_) | ImportError::Worker(_) => ErrorKind::RemoteUnavailable,
            ImportError::UnsupportedFormat(_)
            | ImportError::EmptyFile
            | ImportError::Malformed(_)
            | ImportError::UnknownColumn(_)
            | ImportError::MissingMapping(_)
            | ImportError::NoTargetClass
            | ImportError::UnknownClasses(_)
            | ImportError::MissingTitle
            | ImportError::NothingToImport => ErrorKind::InvalidInput,
        };
        AppError::new(kind, err.to_string())
    }
}

impl From<CatalogError> for AppError {
    fn from(err: CatalogError) -> Self {
        let kind = match &err {
            CatalogError::EmptyClassName
            | CatalogError::MissingTitle
            | CatalogError::NoTargetClass
            | CatalogError::UnknownClasses(_)
            | CatalogError::InvalidDuration(_)
            | CatalogError::InvalidQuestion(_) => ErrorKind::InvalidInput,
            CatalogError::ClassExists(_) => ErrorKind::Conflict,
            CatalogError::ClassNotFound(_)
            | CatalogError::ExamNotFound(_)
            | CatalogError::QuestionNotFound(_) => ErrorKind::NotFound,
            CatalogError::Sqlx(_) => ErrorKind::RemoteUnavailable,
        };
        AppError::new(kind, err.to_string())
    }
}
