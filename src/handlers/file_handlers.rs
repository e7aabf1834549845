//! HTTP handlers for the file manager.
//! Uploads arrive as multipart bodies; downloads stream the blob from disk.

use crate::{
    errors::AppError,
    models::path_entry::{PathEntry, TreeStats},
    paths::{self, Breadcrumb, ROOT},
    services::{
        AppState,
        file_service::{DeleteSummary, FileError},
    },
};
use axum::{
    Json,
    body::Body,
    extract::{
        Multipart, Path, Query, State,
        multipart::{Field, MultipartError},
    },
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use tokio_util::io::ReaderStream;

#[derive(Debug, Deserialize)]
pub struct PathQuery {
    pub path: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ParentQuery {
    pub parent_path: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateFolderReq {
    #[serde(default)]
    pub parent_path: Option<String>,
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct RenameReq {
    pub path: String,
    pub new_name: String,
}

#[derive(Debug, Serialize)]
pub struct FolderListing {
    pub path: String,
    pub breadcrumbs: Vec<Breadcrumb>,
    pub entries: Vec<PathEntry>,
}

#[derive(Debug, Serialize)]
pub struct UploadedFile {
    #[serde(flatten)]
    pub entry: PathEntry,
    pub url: String,
}

#[derive(Debug, Serialize)]
pub struct RejectedFile {
    pub name: String,
    pub kind: &'static str,
    pub error: String,
}

#[derive(Debug, Serialize)]
pub struct UploadReport {
    pub uploaded: Vec<UploadedFile>,
    pub rejected: Vec<RejectedFile>,
}

/// GET `/api/files?path=`: children of a folder plus its breadcrumbs.
pub async fn list_folder(
    State(state): State<AppState>,
    Query(q): Query<PathQuery>,
) -> Result<Json<FolderListing>, AppError> {
    let path = paths::normalize_folder_path(q.path.as_deref().unwrap_or(ROOT));
    let entries = state.files.list_children(&path).await?;
    Ok(Json(FolderListing {
        breadcrumbs: paths::breadcrumbs(&path),
        path,
        entries,
    }))
}

/// GET `/api/files/stats`
pub async fn tree_stats(State(state): State<AppState>) -> Result<Json<TreeStats>, AppError> {
    Ok(Json(state.files.stats().await?))
}

/// POST `/api/folders`
pub async fn create_folder(
    State(state): State<AppState>,
    Json(req): Json<CreateFolderReq>,
) -> Result<impl IntoResponse, AppError> {
    let parent = req.parent_path.as_deref().unwrap_or(ROOT);
    let entry = state.files.create_folder(parent, &req.name).await?;
    Ok((StatusCode::CREATED, Json(entry)))
}

/// POST `/api/files?parent_path=`: one or more `file` parts.
///
/// Files over the size ceiling are rejected one by one; the rest are stored.
/// A part stops being buffered as soon as it passes the ceiling.
pub async fn upload_files(
    State(state): State<AppState>,
    Query(q): Query<ParentQuery>,
    mut multipart: Multipart,
) -> Result<Json<UploadReport>, AppError> {
    let parent = q.parent_path.as_deref().unwrap_or(ROOT);
    let mut report = UploadReport {
        uploaded: Vec::new(),
        rejected: Vec::new(),
    };

    while let Some(mut field) = multipart.next_field().await? {
        if field.name() != Some("file") {
            continue;
        }
        let name = field.file_name().unwrap_or_default().to_string();
        let mime = field.content_type().map(str::to_string);
        let bytes = match read_part(&mut field, state.max_upload_bytes).await? {
            PartBody::Complete(bytes) => bytes,
            PartBody::Oversized(size) => {
                let err = FileError::TooLarge {
                    name: name.clone(),
                    size,
                    max: state.max_upload_bytes,
                };
                report.reject(name, err);
                continue;
            }
        };

        match state
            .files
            .upload_file(parent, &name, &bytes, mime.as_deref(), state.max_upload_bytes)
            .await
        {
            Ok(entry) => {
                let key = entry
                    .blob_ref
                    .clone()
                    .unwrap_or_else(|| paths::blob_key(&entry.path));
                let url = state.files.blobs.public_url(&key);
                report.uploaded.push(UploadedFile { entry, url });
            }
            Err(err @ (FileError::TooLarge { .. } | FileError::InvalidName { .. })) => {
                report.reject(name, err);
            }
            Err(err) => return Err(err.into()),
        }
    }

    if report.uploaded.is_empty() && report.rejected.is_empty() {
        return Err(AppError::invalid("no `file` parts in request"));
    }
    Ok(Json(report))
}

impl UploadReport {
    fn reject(&mut self, name: String, err: FileError) {
        tracing::warn!("upload of `{}` skipped: {}", name, err);
        let err = AppError::from(err);
        self.rejected.push(RejectedFile {
            name,
            kind: err.kind.as_str(),
            error: err.message,
        });
    }
}

/// A multipart part read up to a ceiling.
enum PartBody {
    Complete(Vec<u8>),
    /// Total size of a part that went over the ceiling. Its bytes were drained.
    Oversized(usize),
}

async fn read_part(field: &mut Field<'_>, max: usize) -> Result<PartBody, MultipartError> {
    let mut buf = Vec::new();
    let mut size = 0usize;
    while let Some(chunk) = field.chunk().await? {
        size += chunk.len();
        if size > max {
            if !buf.is_empty() {
                buf = Vec::new();
            }
            continue;
        }
        buf.extend_from_slice(&chunk);
    }
    if size > max {
        Ok(PartBody::Oversized(size))
    } else {
        Ok(PartBody::Complete(buf))
    }
}

/// POST `/api/entries/rename`
pub async fn rename_entry(
    State(state): State<AppState>,
    Json(req): Json<RenameReq>,
) -> Result<Json<PathEntry>, AppError> {
    Ok(Json(state.files.rename(&req.path, &req.new_name).await?))
}

/// DELETE `/api/entries?path=`
pub async fn delete_entry(
    State(state): State<AppState>,
    Query(q): Query<PathQuery>,
) -> Result<Json<DeleteSummary>, AppError> {
    let path = q
        .path
        .filter(|p| !p.trim().is_empty())
        .ok_or_else(|| AppError::invalid("`path` is required"))?;
    if paths::normalize_entry_path(&path) == ROOT {
        return Err(AppError::invalid("the root folder cannot be deleted"));
    }
    Ok(Json(state.files.delete(&path).await?))
}

/// GET `/blobs/{*key}`: stream a stored file.
pub async fn download_blob(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Response, AppError> {
    let (entry, file) = state
        .files
        .open_file(&format!("/{}", key.trim_start_matches('/')))
        .await?;
    let body = Body::from_stream(ReaderStream::new(file));

    let mut response = Response::new(body);
    *response.status_mut() = StatusCode::OK;
    set_file_headers(response.headers_mut(), &entry);
    Ok(response)
}

fn set_file_headers(headers: &mut HeaderMap, entry: &PathEntry) {
    let content_type = entry
        .mime_type
        .clone()
        .unwrap_or_else(|| "application/octet-stream".into());
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(&content_type)
            .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream")),
    );

    if let Some(size) = entry.size_bytes {
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from(size.max(0)));
    }

    if let Ok(value) = HeaderValue::from_str(&format!("inline; filename=\"{}\"", entry.name)) {
        headers.insert(header::CONTENT_DISPOSITION, value);
    }
}

