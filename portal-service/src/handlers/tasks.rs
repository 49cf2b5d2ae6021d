use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use service_core::error::AppError;
use uuid::Uuid;
use validator::Validate;

use crate::{
    middleware::AuthUser,
    models::{CreateTask, Task, TaskPriority, TaskStatus, UpdateTask},
    AppState,
};

#[derive(Debug, Deserialize, Validate)]
pub struct CreateTaskRequest {
    #[validate(length(min = 1, message = "Title is required"))]
    pub title: String,
    pub description: Option<String>,
    #[serde(default = "default_task_status")]
    pub status: TaskStatus,
    #[serde(default = "default_task_priority")]
    pub priority: TaskPriority,
    pub due_date: Option<NaiveDate>,
    pub estimated_hours: Option<f64>,
}

fn default_task_status() -> TaskStatus {
    TaskStatus::Todo
}

fn default_task_priority() -> TaskPriority {
    TaskPriority::Medium
}

#[derive(Debug, Deserialize, Validate, Default)]
pub struct UpdateTaskRequest {
    #[validate(length(min = 1, message = "Title cannot be empty"))]
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub due_date: Option<NaiveDate>,
    pub estimated_hours: Option<f64>,
    pub actual_hours: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct ReorderTasksRequest {
    pub task_ids: Vec<Uuid>,
}

/// Task with the legacy `completed` flag derived from its status.
#[derive(Debug, Serialize)]
pub struct TaskResponse {
    #[serde(flatten)]
    pub task: Task,
    pub completed: bool,
}

impl From<Task> for TaskResponse {
    fn from(task: Task) -> Self {
        let completed = task.is_completed();
        Self { task, completed }
    }
}

#[axum::debug_handler]
pub async fn create_task(
    State(state): State<AppState>,
    user: AuthUser,
    Path(project_id): Path<Uuid>,
    Json(req): Json<CreateTaskRequest>,
) -> Result<impl IntoResponse, AppError> {
    req.validate()?;
    let owner_id = user.user_id()?;

    let task = state
        .db
        .create_task(
            owner_id,
            project_id,
            &CreateTask {
                title: req.title,
                description: req.description,
                status: req.status,
                priority: req.priority,
                due_date: req.due_date,
                estimated_hours: req.estimated_hours,
            },
        )
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Project not found")))?;

    state
        .db
        .log_activity(owner_id, "created", "task", &task.title, None)
        .await?;

    Ok((StatusCode::CREATED, Json(TaskResponse::from(task))))
}

#[axum::debug_handler]
pub async fn update_task(
    State(state): State<AppState>,
    user: AuthUser,
    Path(task_id): Path<Uuid>,
    Json(req): Json<UpdateTaskRequest>,
) -> Result<impl IntoResponse, AppError> {
    req.validate()?;
    let owner_id = user.user_id()?;

    let task = state
        .db
        .update_task(
            owner_id,
            task_id,
            &UpdateTask {
                title: req.title,
                description: req.description,
                status: req.status,
                priority: req.priority,
                due_date: req.due_date,
                estimated_hours: req.estimated_hours,
                actual_hours: req.actual_hours,
            },
        )
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Task not found")))?;

    Ok(Json(TaskResponse::from(task)))
}

/// Flip a task between completed and todo.
#[axum::debug_handler]
pub async fn toggle_task(
    State(state): State<AppState>,
    user: AuthUser,
    Path(task_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let owner_id = user.user_id()?;

    let task = state
        .db
        .toggle_task(owner_id, task_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Task not found")))?;

    let action = if task.is_completed() {
        "completed"
    } else {
        "reopened"
    };
    state
        .db
        .log_activity(owner_id, action, "task", &task.title, None)
        .await?;

    Ok(Json(TaskResponse::from(task)))
}

#[axum::debug_handler]
pub async fn delete_task(
    State(state): State<AppState>,
    user: AuthUser,
    Path(task_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let owner_id = user.user_id()?;

    let deleted = state.db.delete_task(owner_id, task_id).await?;
    if !deleted {
        return Err(AppError::NotFound(anyhow::anyhow!("Task not found")));
    }

    Ok(StatusCode::NO_CONTENT)
}

/// Reassign display positions from the given ordering.
#[axum::debug_handler]
pub async fn reorder_tasks(
    State(state): State<AppState>,
    user: AuthUser,
    Path(project_id): Path<Uuid>,
    Json(req): Json<ReorderTasksRequest>,
) -> Result<impl IntoResponse, AppError> {
    let owner_id = user.user_id()?;

    let tasks = state
        .db
        .reorder_tasks(owner_id, project_id, &req.task_ids)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Project not found")))?;

    let tasks: Vec<TaskResponse> = tasks.into_iter().map(TaskResponse::from).collect();

    Ok(Json(tasks))
}
