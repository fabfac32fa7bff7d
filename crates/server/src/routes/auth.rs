use axum::{
    Extension, Json, Router,
    extract::State,
    response::Json as ResponseJson,
    routing::{get, post},
};
use db::{models::user::User, types::UserRole};
use deployment::Deployment;
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use utils::response::ApiResponse;

use crate::{DeploymentImpl, error::ApiError};

const MIN_PASSWORD_LENGTH: usize = 6;

#[derive(Debug, Deserialize, TS)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: Option<UserRole>,
}

#[derive(Debug, Deserialize, TS)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, TS)]
pub struct AuthResponse {
    pub user: User,
    pub token: String,
}

fn validate_email(email: &str) -> Result<(), ApiError> {
    let trimmed = email.trim();
    if trimmed.is_empty() || !trimmed.contains('@') {
        return Err(ApiError::BadRequest(
            "Please provide a valid email".to_string(),
        ));
    }
    Ok(())
}

pub async fn register(
    State(deployment): State<DeploymentImpl>,
    Json(payload): Json<RegisterRequest>,
) -> Result<ResponseJson<ApiResponse<AuthResponse>>, ApiError> {
    if payload.name.trim().is_empty() {
        return Err(ApiError::BadRequest(
            "Please provide name, email and password".to_string(),
        ));
    }
    validate_email(&payload.email)?;
    if payload.password.len() < MIN_PASSWORD_LENGTH {
        return Err(ApiError::BadRequest(format!(
            "Password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }

    let (user, token) = deployment
        .auth()
        .register(
            &deployment.db().pool,
            payload.name.trim().to_string(),
            payload.email.trim().to_lowercase(),
            &payload.password,
            payload.role,
        )
        .await?;

    tracing::info!(user_id = %user.id, "Registered new user");
    Ok(ResponseJson(ApiResponse::success(AuthResponse {
        user,
        token,
    })))
}

pub async fn login(
    State(deployment): State<DeploymentImpl>,
    Json(payload): Json<LoginRequest>,
) -> Result<ResponseJson<ApiResponse<AuthResponse>>, ApiError> {
    validate_email(&payload.email)?;

    let (user, token) = deployment
        .auth()
        .login(
            &deployment.db().pool,
            &payload.email.trim().to_lowercase(),
            &payload.password,
        )
        .await?;

    Ok(ResponseJson(ApiResponse::success(AuthResponse {
        user,
        token,
    })))
}

/// The authenticated caller, as loaded by the auth middleware.
pub async fn me(
    Extension(user): Extension<User>,
) -> Result<ResponseJson<ApiResponse<User>>, ApiError> {
    Ok(ResponseJson(ApiResponse::success(user)))
}

/// Unauthenticated entry points; `/auth/me` is mounted with the protected
/// routes instead.
pub fn router() -> Router<DeploymentImpl> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
}

pub fn me_router() -> Router<DeploymentImpl> {
    Router::new().route("/auth/me", get(me))
}
