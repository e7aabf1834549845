#![allow(dead_code)]

use classdrive::{
    db,
    services::{AppState, blob_store::BlobStore},
};
use std::sync::Arc;
use tempfile::TempDir;

pub const TEST_MAX_UPLOAD: usize = 1024;

/// Fresh database and blob directory inside a temp dir.
pub struct TestEnv {
    pub dir: TempDir,
    pub state: AppState,
}

pub async fn setup() -> TestEnv {
    let dir = tempfile::tempdir().expect("tempdir");
    let db_url = format!("sqlite://{}", dir.path().join("meta/test.db").display());
    let pool = db::connect(&db_url, 1).await.expect("connect");
    db::run_migrations(&pool).await.expect("migrate");

    let blobs = BlobStore::new(dir.path().join("blobs"), "http://localhost:3000/blobs");
    std::fs::create_dir_all(&blobs.base_path).expect("blob dir");
    let state = AppState::new(Arc::new(pool), blobs, TEST_MAX_UPLOAD);
    TestEnv { dir, state }
}

pub fn question_csv(rows: &[&str]) -> Vec<u8> {
    let mut data = String::from("Pertanyaan,Opsi A,Opsi B,Opsi C,Opsi D,Jawaban Benar,Poin\n");
    for row in rows {
        data.push_str(row);
        data.push('\n');
    }
    data.into_bytes()
}
