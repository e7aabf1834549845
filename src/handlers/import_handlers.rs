//! HTTP handlers for the question import.
//!
//! Both preview and commit take a multipart body with a `file` part and an
//! optional `mapping` part (JSON). Commit additionally needs an `exam` part
//! (JSON) describing the exam header.

use crate::{
    errors::AppError,
    import::{ColumnMapping, template::TEMPLATE_FILE_NAME, template_csv},
    services::{
        AppState,
        import_service::{ExamDraft, ImportOutcome, ImportPreview},
    },
};
use axum::{
    Json,
    extract::{Multipart, State},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use serde::de::DeserializeOwned;

/// Parts collected from an import request.
#[derive(Default)]
struct ImportForm {
    file: Option<(String, Bytes)>,
    mapping: Option<ColumnMapping>,
    exam: Option<ExamDraft>,
}

impl ImportForm {
    async fn read(mut multipart: Multipart) -> Result<Self, AppError> {
        let mut form = ImportForm::default();
        while let Some(field) = multipart.next_field().await? {
            match field.name() {
                Some("file") => {
                    let name = field.file_name().unwrap_or_default().to_string();
                    let bytes = field.bytes().await?;
                    form.file = Some((name, bytes));
                }
                Some("mapping") => {
                    let text = field.text().await?;
                    if !text.trim().is_empty() {
                        form.mapping = Some(parse_json("mapping", &text)?);
                    }
                }
                Some("exam") => {
                    let text = field.text().await?;
                    form.exam = Some(parse_json("exam", &text)?);
                }
                _ => {}
            }
        }
        Ok(form)
    }

    fn take_file(&mut self) -> Result<(String, Bytes), AppError> {
        self.file
            .take()
            .ok_or_else(|| AppError::invalid("a `file` part is required"))
    }
}

fn parse_json<T: DeserializeOwned>(part: &str, text: &str) -> Result<T, AppError> {
    serde_json::from_str(text).map_err(|err| AppError::invalid(format!("invalid `{}`: {}", part, err)))
}

/// POST `/api/imports/preview`
pub async fn preview_import(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<ImportPreview>, AppError> {
    let mut form = ImportForm::read(multipart).await?;
    let (name, bytes) = form.take_file()?;
    let preview = state.imports.preview(&name, &bytes, form.mapping).await?;
    Ok(Json(preview))
}

/// POST `/api/imports`
pub async fn commit_import(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let mut form = ImportForm::read(multipart).await?;
    let (name, bytes) = form.take_file()?;
    let draft = form
        .exam
        .take()
        .ok_or_else(|| AppError::invalid("an `exam` part is required"))?;

    let outcome: ImportOutcome = state
        .imports
        .commit(&name, &bytes, form.mapping, draft)
        .await?;
    Ok((StatusCode::CREATED, Json(outcome)))
}

/// GET `/api/imports/template.csv`
pub async fn download_template() -> Result<Response, AppError> {
    let csv = template_csv().map_err(|err| AppError::unavailable(err.to_string()))?;

    let mut response = Response::new(axum::body::Body::from(csv));
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/csv; charset=utf-8"),
    );
    if let Ok(value) =
        HeaderValue::from_str(&format!("attachment; filename=\"{}\"", TEMPLATE_FILE_NAME))
    {
        headers.insert(header::CONTENT_DISPOSITION, value);
    }
    Ok(response)
}
