//! Service layer: the file tree, the class/exam catalog and the importer.

pub mod blob_store;
pub mod catalog_service;
pub mod file_service;
pub mod import_service;

use crate::config::DEFAULT_MAX_REQUEST_BYTES;
use blob_store::BlobStore;
use catalog_service::CatalogService;
use file_service::FileService;
use import_service::ImportService;
use sqlx::SqlitePool;
use std::sync::Arc;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub files: FileService,
    pub catalog: CatalogService,
    pub imports: ImportService,
    /// Per-file ceiling for file-manager uploads.
    pub max_upload_bytes: usize,
    /// Ceiling for a whole upload request. Oversized parts are drained, so
    /// this must leave room for them.
    pub max_request_bytes: usize,
}

impl AppState {
    pub fn new(db: Arc<SqlitePool>, blobs: BlobStore, max_upload_bytes: usize) -> Self {
        Self {
            files: FileService::new(db.clone(), blobs),
            catalog: CatalogService::new(db.clone()),
            imports: ImportService::new(db),
            max_upload_bytes,
            max_request_bytes: DEFAULT_MAX_REQUEST_BYTES,
        }
    }

    pub fn with_max_request_bytes(mut self, max_request_bytes: usize) -> Self {
        self.max_request_bytes = max_request_bytes;
        self
    }
}
