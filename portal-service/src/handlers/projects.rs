use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use service_core::error::AppError;
use uuid::Uuid;
use validator::Validate;

use crate::{
    handlers::tasks::TaskResponse,
    middleware::AuthUser,
    models::{CreateProject, ListProjectsFilter, Project, ProjectStatus, UpdateProject},
    AppState,
};

#[derive(Debug, Deserialize, Validate)]
pub struct CreateProjectRequest {
    pub client_id: Option<Uuid>,
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,
    pub description: Option<String>,
    #[serde(default = "default_status")]
    pub status: ProjectStatus,
    #[serde(default)]
    pub budget: Decimal,
    pub deadline: Option<NaiveDate>,
}

fn default_status() -> ProjectStatus {
    ProjectStatus::Planning
}

#[derive(Debug, Deserialize, Validate, Default)]
pub struct UpdateProjectRequest {
    pub client_id: Option<Uuid>,
    #[validate(length(min = 1, message = "Name cannot be empty"))]
    pub name: Option<String>,
    pub description: Option<String>,
    pub status: Option<ProjectStatus>,
    pub budget: Option<Decimal>,
    pub spent: Option<Decimal>,
    pub deadline: Option<NaiveDate>,
}

#[derive(Debug, Deserialize, Default)]
pub struct ListProjectsQuery {
    pub status: Option<ProjectStatus>,
}

/// Project with its client's display name and its tasks in display order.
#[derive(Debug, Serialize)]
pub struct ProjectResponse {
    #[serde(flatten)]
    pub project: Project,
    pub client_name: Option<String>,
    pub tasks: Vec<TaskResponse>,
}

async fn project_response(
    state: &AppState,
    project: Project,
) -> Result<ProjectResponse, AppError> {
    let client_name = match project.client_id {
        Some(client_id) => state.db.get_client_name(client_id).await?,
        None => None,
    };
    let tasks = state
        .db
        .list_tasks(project.project_id)
        .await?
        .into_iter()
        .map(TaskResponse::from)
        .collect();

    Ok(ProjectResponse {
        project,
        client_name,
        tasks,
    })
}

#[axum::debug_handler]
pub async fn list_projects(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<ListProjectsQuery>,
) -> Result<impl IntoResponse, AppError> {
    let owner_id = user.user_id()?;

    let projects = state
        .db
        .list_projects(
            owner_id,
            &ListProjectsFilter {
                status: query.status,
            },
        )
        .await?;

    let mut responses = Vec::with_capacity(projects.len());
    for project in projects {
        responses.push(project_response(&state, project).await?);
    }

    Ok(Json(responses))
}

#[axum::debug_handler]
pub async fn create_project(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<CreateProjectRequest>,
) -> Result<impl IntoResponse, AppError> {
    req.validate()?;
    let owner_id = user.user_id()?;

    if let Some(client_id) = req.client_id {
        if state.db.get_client(owner_id, client_id).await?.is_none() {
            return Err(AppError::NotFound(anyhow::anyhow!("Client not found")));
        }
    }

    let project = state
        .db
        .create_project(
            owner_id,
            &CreateProject {
                client_id: req.client_id,
                name: req.name,
                description: req.description,
                status: req.status,
                budget: req.budget,
                deadline: req.deadline,
            },
        )
        .await?;

    state
        .db
        .log_activity(owner_id, "created", "project", &project.name, None)
        .await?;

    let response = project_response(&state, project).await?;

    Ok((StatusCode::CREATED, Json(response)))
}

#[axum::debug_handler]
pub async fn get_project(
    State(state): State<AppState>,
    user: AuthUser,
    Path(project_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let owner_id = user.user_id()?;

    let project = state
        .db
        .get_project(owner_id, project_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Project not found")))?;

    Ok(Json(project_response(&state, project).await?))
}

#[axum::debug_handler]
pub async fn update_project(
    State(state): State<AppState>,
    user: AuthUser,
    Path(project_id): Path<Uuid>,
    Json(req): Json<UpdateProjectRequest>,
) -> Result<impl IntoResponse, AppError> {
    req.validate()?;
    let owner_id = user.user_id()?;

    let project = state
        .db
        .update_project(
            owner_id,
            project_id,
            &UpdateProject {
                client_id: req.client_id,
                name: req.name,
                description: req.description,
                status: req.status,
                budget: req.budget,
                spent: req.spent,
                deadline: req.deadline,
            },
        )
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Project not found")))?;

    state
        .db
        .log_activity(owner_id, "updated", "project", &project.name, None)
        .await?;

    Ok(Json(project_response(&state, project).await?))
}

#[axum::debug_handler]
pub async fn delete_project(
    State(state): State<AppState>,
    user: AuthUser,
    Path(project_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let owner_id = user.user_id()?;

    let project = state
        .db
        .get_project(owner_id, project_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Project not found")))?;

    state.db.delete_project(owner_id, project_id).await?;

    state
        .db
        .log_activity(owner_id, "deleted", "project", &project.name, None)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}
