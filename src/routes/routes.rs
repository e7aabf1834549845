//! Defines routes for the file manager, the catalog and the importer.
//!
//! ## Structure
//! - **File tree**
//!   - `GET    /api/files?path=`          list a folder with breadcrumbs
//!   - `GET    /api/files/stats`          totals over the tree
//!   - `POST   /api/files?parent_path=`   multipart upload
//!   - `POST   /api/folders`              create folder
//!   - `POST   /api/entries/rename`       rename file or folder
//!   - `DELETE /api/entries?path=`        delete file or folder
//!   - `GET    /blobs/{*key}`             download a stored file
//!
//! - **Catalog**
//!   - `GET|POST /api/classes`, `DELETE /api/classes/{name}`
//!   - `GET|POST /api/exams`, `GET|PATCH|DELETE /api/exams/{id}`
//!   - `GET|POST /api/exams/{id}/questions`
//!   - `PUT|DELETE /api/questions/{id}`
//!
//! - **Import**
//!   - `POST /api/imports/preview`, `POST /api/imports`
//!   - `GET  /api/imports/template.csv`

use crate::{
    handlers::{
        catalog_handlers::{
            add_question, create_class, create_exam, delete_class, delete_exam, delete_question,
            get_exam, list_classes, list_exams, list_questions, update_exam, update_question,
        },
        file_handlers::{
            create_folder, delete_entry, download_blob, list_folder, rename_entry, tree_stats,
            upload_files,
        },
        health_handlers::{healthz, readyz},
        import_handlers::{commit_import, download_template, preview_import},
    },
    import::MAX_IMPORT_BYTES,
    services::AppState,
};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{delete, get, post, put},
};

/// Room for multipart boundaries and part headers on top of the payload.
const MULTIPART_SLACK_BYTES: usize = 64 * 1024;

/// Build the router.
///
/// File uploads get `max_request_bytes` for the whole request; the per-file
/// ceiling is enforced part by part in the handler. Every other route is
/// capped at the import ceiling.
pub fn routes(max_request_bytes: usize) -> Router<AppState> {
    let body_limit = MAX_IMPORT_BYTES + MULTIPART_SLACK_BYTES;
    let upload = post(upload_files).layer(DefaultBodyLimit::max(max_request_bytes));

    Router::new()
        // health endpoints (mounted at root)
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        // file tree
        .route("/api/files", get(list_folder).merge(upload))
        .route("/api/files/stats", get(tree_stats))
        .route("/api/folders", post(create_folder))
        .route("/api/entries", delete(delete_entry))
        .route("/api/entries/rename", post(rename_entry))
        .route("/blobs/{*key}", get(download_blob))
        // catalog
        .route("/api/classes", get(list_classes).post(create_class))
        .route("/api/classes/{name}", delete(delete_class))
        .route("/api/exams", get(list_exams).post(create_exam))
        .route(
            "/api/exams/{id}",
            get(get_exam).patch(update_exam).delete(delete_exam),
        )
        .route(
            "/api/exams/{id}/questions",
            get(list_questions).post(add_question),
        )
        .route(
            "/api/questions/{id}",
            put(update_question).delete(delete_question),
        )
        // import
        .route("/api/imports", post(commit_import))
        .route("/api/imports/preview", post(preview_import))
        .route("/api/imports/template.csv", get(download_template))
        .layer(DefaultBodyLimit::max(body_limit))
}
