//! classdrive: a school file manager and exam question importer.
//!
//! The file manager keeps a virtual folder tree as flat SQLite rows keyed by
//! absolute path, with payloads in a sharded blob directory. The importer
//! turns CSV or spreadsheet tables into a validated, deduplicated set of
//! multiple-choice questions attached to a new exam.

pub mod config;
pub mod db;
pub mod errors;
pub mod handlers;
pub mod import;
pub mod models;
pub mod navigation;
pub mod paths;
pub mod routes;
pub mod services;

use axum::Router;
use services::AppState;

/// Router with state attached, ready to serve.
pub fn app(state: AppState) -> Router {
    let max_request_bytes = state.max_request_bytes;
    routes::routes::routes(max_request_bytes).with_state(state)
}
