// src/task.rs

use actix_web::{web, HttpResponse};
use chrono::Utc;
use serde_json::json;

use crate::app_state::AppState;
use crate::auth::AuthUser;
use crate::error::AppResult;
use crate::models::{CreateTaskRequest, TaskFilter};

/// CREATE a new task (admin only)
pub async fn create_task(
    AuthUser(user): AuthUser,
    data: web::Data<AppState>,
    payload: web::Json<CreateTaskRequest>,
) -> AppResult<HttpResponse> {
    let task = data.registry.create_task(payload.into_inner(), &user).await?;
    Ok(HttpResponse::Ok().json(json!({ "task": task })))
}

/// LIST tasks visible to the caller, optionally filtered
pub async fn list_tasks(
    AuthUser(user): AuthUser,
    data: web::Data<AppState>,
    query: web::Query<TaskFilter>,
) -> AppResult<HttpResponse> {
    let tasks = data.registry.list_tasks(&user).await?;
    let tasks = query.apply(tasks, Utc::now())?;
    Ok(HttpResponse::Ok().json(json!({ "tasks": tasks })))
}

/// GET a single task
pub async fn get_task(
    AuthUser(user): AuthUser,
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> AppResult<HttpResponse> {
    let task = data.registry.get_task(&path, &user).await?;
    Ok(HttpResponse::Ok().json(json!({ "task": task })))
}

/// Mark a task completed (assignee or admin)
pub async fn complete_task(
    AuthUser(user): AuthUser,
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> AppResult<HttpResponse> {
    let task = data.registry.complete_task(&path, &user).await?;
    Ok(HttpResponse::Ok().json(json!({ "task": task })))
}

/// DELETE a task (admin only)
pub async fn delete_task(
    AuthUser(user): AuthUser,
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> AppResult<HttpResponse> {
    data.registry.delete_task(&path, &user).await?;
    Ok(HttpResponse::Ok().json(json!({ "message": "Task deleted successfully" })))
}
