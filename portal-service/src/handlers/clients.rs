use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use service_core::error::AppError;
use uuid::Uuid;
use validator::Validate;

use crate::{
    middleware::AuthUser,
    models::{CreateClient, UpdateClient},
    AppState,
};

#[derive(Debug, Deserialize, Validate)]
pub struct CreateClientRequest {
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub address: Option<String>,
    pub notes: Option<String>,
    pub avatar_color: Option<String>,
}

#[derive(Debug, Deserialize, Validate, Default)]
pub struct UpdateClientRequest {
    #[validate(length(min = 1, message = "Name cannot be empty"))]
    pub name: Option<String>,
    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub address: Option<String>,
    pub notes: Option<String>,
    pub avatar_color: Option<String>,
}

#[axum::debug_handler]
pub async fn list_clients(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<impl IntoResponse, AppError> {
    let owner_id = user.user_id()?;
    let clients = state.db.list_clients(owner_id).await?;
    Ok(Json(clients))
}

#[axum::debug_handler]
pub async fn create_client(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<CreateClientRequest>,
) -> Result<impl IntoResponse, AppError> {
    req.validate()?;
    let owner_id = user.user_id()?;

    let client = state
        .db
        .create_client(
            owner_id,
            &CreateClient {
                name: req.name,
                email: req.email,
                phone: req.phone,
                company: req.company,
                address: req.address,
                notes: req.notes,
                avatar_color: req.avatar_color,
            },
        )
        .await?;

    state
        .db
        .log_activity(owner_id, "created", "client", &client.name, None)
        .await?;

    Ok((StatusCode::CREATED, Json(client)))
}

#[axum::debug_handler]
pub async fn get_client(
    State(state): State<AppState>,
    user: AuthUser,
    Path(client_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let owner_id = user.user_id()?;

    let client = state
        .db
        .get_client(owner_id, client_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Client not found")))?;

    Ok(Json(client))
}

#[axum::debug_handler]
pub async fn update_client(
    State(state): State<AppState>,
    user: AuthUser,
    Path(client_id): Path<Uuid>,
    Json(req): Json<UpdateClientRequest>,
) -> Result<impl IntoResponse, AppError> {
    req.validate()?;
    let owner_id = user.user_id()?;

    let client = state
        .db
        .update_client(
            owner_id,
            client_id,
            &UpdateClient {
                name: req.name,
                email: req.email,
                phone: req.phone,
                company: req.company,
                address: req.address,
                notes: req.notes,
                avatar_color: req.avatar_color,
            },
        )
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Client not found")))?;

    state
        .db
        .log_activity(owner_id, "updated", "client", &client.name, None)
        .await?;

    // Re-read for the derived stats.
    let client = state
        .db
        .get_client(owner_id, client_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Client not found")))?;

    Ok(Json(client))
}

#[axum::debug_handler]
pub async fn delete_client(
    State(state): State<AppState>,
    user: AuthUser,
    Path(client_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let owner_id = user.user_id()?;

    let client = state
        .db
        .get_client(owner_id, client_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Client not found")))?;

    state.db.delete_client(owner_id, client_id).await?;

    state
        .db
        .log_activity(owner_id, "deleted", "client", &client.name, None)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}
