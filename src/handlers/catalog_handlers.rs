//! HTTP handlers for classes and exams.

use crate::{
    errors::AppError,
    models::{
        class::SchoolClass,
        exam::{Exam, Question},
    },
    services::{
        AppState,
        catalog_service::{ExamChanges, NewExam, QuestionInput},
    },
};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct CreateClassReq {
    pub name: String,
}

/// GET `/api/classes`
pub async fn list_classes(
    State(state): State<AppState>,
) -> Result<Json<Vec<SchoolClass>>, AppError> {
    Ok(Json(state.catalog.list_classes().await?))
}

/// POST `/api/classes`
pub async fn create_class(
    State(state): State<AppState>,
    Json(req): Json<CreateClassReq>,
) -> Result<impl IntoResponse, AppError> {
    let class = state.catalog.create_class(&req.name).await?;
    Ok((StatusCode::CREATED, Json(class)))
}

/// DELETE `/api/classes/{name}`
pub async fn delete_class(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<StatusCode, AppError> {
    state.catalog.delete_class(&name).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET `/api/exams`
pub async fn list_exams(State(state): State<AppState>) -> Result<Json<Vec<Exam>>, AppError> {
    Ok(Json(state.catalog.list_exams().await?))
}

/// POST `/api/exams`: an empty, unpublished exam.
pub async fn create_exam(
    State(state): State<AppState>,
    Json(req): Json<NewExam>,
) -> Result<impl IntoResponse, AppError> {
    let exam = state.catalog.create_exam(req).await?;
    Ok((StatusCode::CREATED, Json(exam)))
}

/// GET `/api/exams/{id}`
pub async fn get_exam(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Exam>, AppError> {
    Ok(Json(state.catalog.get_exam(id).await?))
}

/// GET `/api/exams/{id}/questions`
pub async fn list_questions(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<Question>>, AppError> {
    Ok(Json(state.catalog.list_questions(id).await?))
}

/// PATCH `/api/exams/{id}`: header fields and the published flag.
pub async fn update_exam(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<ExamChanges>,
) -> Result<Json<Exam>, AppError> {
    Ok(Json(state.catalog.update_exam(id, req).await?))
}

/// POST `/api/exams/{id}/questions`
pub async fn add_question(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<QuestionInput>,
) -> Result<impl IntoResponse, AppError> {
    let question = state.catalog.add_question(id, req).await?;
    Ok((StatusCode::CREATED, Json(question)))
}

/// PUT `/api/questions/{id}`
pub async fn update_question(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<QuestionInput>,
) -> Result<Json<Question>, AppError> {
    Ok(Json(state.catalog.update_question(id, req).await?))
}

/// DELETE `/api/questions/{id}`
pub async fn delete_question(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.catalog.delete_question(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE `/api/exams/{id}`
pub async fn delete_exam(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.catalog.delete_exam(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
