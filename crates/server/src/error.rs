use axum::{
    Json,
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use db::{
    DbErr,
    models::{
        comment::CommentError, project::ProjectError, ticket::TicketError, user::UserError,
    },
};
use deployment::DeploymentError;
use services::services::{
    attachment::AttachmentError,
    auth::AuthError,
    authorization::{Decision, DecisionReason},
    config::ConfigError,
    project::ProjectServiceError,
};
use thiserror::Error;
use utils::response::ApiResponse;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Project(#[from] ProjectError),
    #[error(transparent)]
    Ticket(#[from] TicketError),
    #[error(transparent)]
    Comment(#[from] CommentError),
    #[error(transparent)]
    User(#[from] UserError),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Attachment(#[from] AttachmentError),
    #[error(transparent)]
    Deployment(#[from] DeploymentError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Database(#[from] DbErr),
    #[error("Multipart error: {0}")]
    Multipart(#[from] MultipartError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Unauthorized")]
    Unauthorized,
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Internal server error: {0}")]
    Internal(String),
    #[error("Bad request: {0}")]
    BadRequest(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Forbidden: {0}")]
    Forbidden(String),
}

/// Turn an authorization decision into a handler result. `entity` names
/// the target for not-found messages; `forbidden_msg` is surfaced verbatim
/// on a deny.
pub fn require(decision: Decision, entity: &str, forbidden_msg: &str) -> Result<(), ApiError> {
    match decision.reason {
        DecisionReason::Ok => Ok(()),
        DecisionReason::NotFound => Err(ApiError::NotFound(format!("{entity} not found"))),
        DecisionReason::Forbidden => Err(ApiError::Forbidden(forbidden_msg.to_string())),
    }
}

impl From<ProjectServiceError> for ApiError {
    fn from(err: ProjectServiceError) -> Self {
        match err {
            ProjectServiceError::Database(db_err) => ApiError::Database(db_err),
            ProjectServiceError::Project(proj_err) => ApiError::Project(proj_err),
            ProjectServiceError::UserNotFound => {
                ApiError::NotFound("User not found with this email".to_string())
            }
            ProjectServiceError::AlreadyMember => {
                ApiError::Conflict("User is already a team member".to_string())
            }
            ProjectServiceError::CannotRemoveAdmin => {
                ApiError::Forbidden("Cannot remove project admin from team".to_string())
            }
            ProjectServiceError::MemberNotFound => {
                ApiError::NotFound("User is not a team member".to_string())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status_code, error_type) = match &self {
            ApiError::Project(err) => match err {
                ProjectError::ProjectNotFound => (StatusCode::NOT_FOUND, "ProjectError"),
                _ => (StatusCode::INTERNAL_SERVER_ERROR, "ProjectError"),
            },
            ApiError::Ticket(err) => match err {
                TicketError::TicketNotFound => (StatusCode::NOT_FOUND, "TicketError"),
                _ => (StatusCode::INTERNAL_SERVER_ERROR, "TicketError"),
            },
            ApiError::Comment(err) => match err {
                CommentError::CommentNotFound => (StatusCode::NOT_FOUND, "CommentError"),
                _ => (StatusCode::INTERNAL_SERVER_ERROR, "CommentError"),
            },
            ApiError::User(err) => match err {
                UserError::UserNotFound => (StatusCode::NOT_FOUND, "UserError"),
                _ => (StatusCode::INTERNAL_SERVER_ERROR, "UserError"),
            },
            ApiError::Auth(err) => match err {
                AuthError::InvalidCredentials => (StatusCode::UNAUTHORIZED, "AuthError"),
                AuthError::Token(_) => (StatusCode::UNAUTHORIZED, "AuthError"),
                AuthError::EmailTaken => (StatusCode::CONFLICT, "AuthError"),
                _ => (StatusCode::INTERNAL_SERVER_ERROR, "AuthError"),
            },
            ApiError::Attachment(err) => match err {
                AttachmentError::EmptyFile => (StatusCode::BAD_REQUEST, "AttachmentError"),
                AttachmentError::TooLarge(_, _) => {
                    (StatusCode::PAYLOAD_TOO_LARGE, "AttachmentTooLarge")
                }
                AttachmentError::NotFound => (StatusCode::NOT_FOUND, "AttachmentNotFound"),
                AttachmentError::InvalidFilename => (StatusCode::BAD_REQUEST, "AttachmentError"),
                _ => (StatusCode::INTERNAL_SERVER_ERROR, "AttachmentError"),
            },
            ApiError::Deployment(_) => (StatusCode::INTERNAL_SERVER_ERROR, "DeploymentError"),
            ApiError::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "ConfigError"),
            ApiError::Database(db_err) => match db_err {
                DbErr::RecordNotFound(_) => (StatusCode::NOT_FOUND, "DatabaseError"),
                _ => (StatusCode::INTERNAL_SERVER_ERROR, "DatabaseError"),
            },
            ApiError::Multipart(_) => (StatusCode::BAD_REQUEST, "MultipartError"),
            ApiError::Io(_) => (StatusCode::INTERNAL_SERVER_ERROR, "IoError"),
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized"),
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "NotFound"),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "InternalError"),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BadRequest"),
            ApiError::Conflict(_) => (StatusCode::CONFLICT, "ConflictError"),
            ApiError::Forbidden(_) => (StatusCode::FORBIDDEN, "ForbiddenError"),
        };

        let error_message = match &self {
            ApiError::Attachment(att_err) => match att_err {
                AttachmentError::TooLarge(size, max) => format!(
                    "This file is too large ({:.1} MB). Maximum file size is {:.1} MB.",
                    *size as f64 / 1_048_576.0,
                    *max as f64 / 1_048_576.0
                ),
                AttachmentError::EmptyFile => "No file uploaded".to_string(),
                AttachmentError::NotFound => "Attachment not found".to_string(),
                _ => "Failed to process attachment. Please try again.".to_string(),
            },
            ApiError::Multipart(_) => {
                "Failed to upload file. Please ensure the file is valid and try again.".to_string()
            }
            ApiError::Unauthorized => "Unauthorized. Please sign in again.".to_string(),
            ApiError::Auth(AuthError::InvalidCredentials) => {
                "Invalid email or password".to_string()
            }
            ApiError::Auth(AuthError::EmailTaken) => "Email already registered".to_string(),
            ApiError::Auth(AuthError::Token(_)) => "Not authorized, token failed".to_string(),
            ApiError::NotFound(msg) => msg.clone(),
            ApiError::Internal(msg) => msg.clone(),
            ApiError::BadRequest(msg) => msg.clone(),
            ApiError::Conflict(msg) => msg.clone(),
            ApiError::Forbidden(msg) => msg.clone(),
            _ => format!("{}: {}", error_type, self),
        };

        if status_code.is_server_error() {
            tracing::error!(
                status = %status_code,
                error_type,
                error = %self,
                "API request failed"
            );
        }
        let response = ApiResponse::<()>::error(&error_message);
        (status_code, Json(response)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use services::services::authorization::Decision;

    use super::*;

    #[test]
    fn api_error_maps_to_expected_http_statuses() {
        assert_eq!(
            ApiError::BadRequest("bad".to_string())
                .into_response()
                .status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::Unauthorized.into_response().status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError::Forbidden("nope".to_string())
                .into_response()
                .status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ApiError::NotFound("missing".to_string())
                .into_response()
                .status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::Conflict("conflict".to_string())
                .into_response()
                .status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::Internal("boom".to_string())
                .into_response()
                .status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn domain_errors_map_to_expected_http_statuses() {
        assert_eq!(
            ApiError::from(ProjectError::ProjectNotFound)
                .into_response()
                .status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::from(TicketError::TicketNotFound)
                .into_response()
                .status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::from(AuthError::EmailTaken).into_response().status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::from(AuthError::InvalidCredentials)
                .into_response()
                .status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError::from(AttachmentError::TooLarge(20, 10))
                .into_response()
                .status(),
            StatusCode::PAYLOAD_TOO_LARGE
        );
        assert_eq!(
            ApiError::from(ProjectServiceError::AlreadyMember)
                .into_response()
                .status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::from(ProjectServiceError::CannotRemoveAdmin)
                .into_response()
                .status(),
            StatusCode::FORBIDDEN
        );
    }

    #[test]
    fn require_distinguishes_not_found_from_forbidden() {
        assert!(require(Decision::allow(), "Project", "nope").is_ok());

        let not_found = require(Decision::not_found(), "Project", "nope").unwrap_err();
        assert_eq!(not_found.into_response().status(), StatusCode::NOT_FOUND);

        let forbidden = require(Decision::forbidden(), "Project", "nope").unwrap_err();
        assert_eq!(forbidden.into_response().status(), StatusCode::FORBIDDEN);
    }
}
