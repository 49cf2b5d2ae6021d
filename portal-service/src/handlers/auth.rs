use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};
use service_core::error::AppError;
use tracing::info;
use validator::Validate;

use crate::{
    middleware::AuthUser,
    models::{CreateUser, User},
    utils::{hash_password, verify_password, Password, PasswordHashString},
    AppState,
};

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
    #[validate(length(min = 1, message = "Full name is required"))]
    pub full_name: String,
    pub company_name: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
    pub user: User,
}

/// Register a new account and issue an access token.
#[axum::debug_handler]
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    req.validate()?;

    let password = Password::new(req.password);
    let password_hash = hash_password(&password).map_err(AppError::InternalError)?;

    let user = state
        .db
        .create_user(&CreateUser {
            email: req.email.to_lowercase(),
            password_hash: password_hash.into_string(),
            full_name: req.full_name,
            company_name: req.company_name,
        })
        .await?;

    let token = state
        .jwt
        .generate_access_token(user.user_id, &user.email)
        .map_err(AppError::InternalError)?;
    let token = state.jwt.token_response(token);

    info!(user_id = %user.user_id, "User registered");

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            access_token: token.access_token,
            token_type: token.token_type,
            expires_in: token.expires_in,
            user,
        }),
    ))
}

/// Exchange credentials for an access token.
#[axum::debug_handler]
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    req.validate()?;

    let user = state
        .db
        .get_user_by_email(&req.email.to_lowercase())
        .await?
        .ok_or_else(|| AppError::Unauthorized(anyhow::anyhow!("Invalid email or password")))?;

    let password = Password::new(req.password);
    let stored = PasswordHashString::new(user.password_hash.clone());
    verify_password(&password, &stored)
        .map_err(|_| AppError::Unauthorized(anyhow::anyhow!("Invalid email or password")))?;

    let token = state
        .jwt
        .generate_access_token(user.user_id, &user.email)
        .map_err(AppError::InternalError)?;
    let token = state.jwt.token_response(token);

    info!(user_id = %user.user_id, "User logged in");

    Ok(Json(AuthResponse {
        access_token: token.access_token,
        token_type: token.token_type,
        expires_in: token.expires_in,
        user,
    }))
}

/// The authenticated user's profile.
#[axum::debug_handler]
pub async fn me(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<impl IntoResponse, AppError> {
    let user_id = user.user_id()?;

    let user = state
        .db
        .get_user(user_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("User not found")))?;

    Ok(Json(user))
}
