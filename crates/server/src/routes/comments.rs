use axum::{
    Extension, Json, Router,
    extract::{Path, State},
    middleware::from_fn_with_state,
    response::Json as ResponseJson,
    routing::{get, post, put},
};
use db::models::{
    comment::{Comment, CommentWithAuthor, CreateComment, UpdateComment},
    ticket::Ticket,
    user::User,
};
use deployment::Deployment;
use services::services::authorization;
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{
    DeploymentImpl,
    error::{ApiError, require},
    middleware::load_comment_middleware,
    routes::ticket_project,
};

const MAX_COMMENT_LENGTH: usize = 1000;

fn validate_text(text: &str) -> Result<(), ApiError> {
    if text.trim().is_empty() {
        return Err(ApiError::BadRequest(
            "Comment text is required".to_string(),
        ));
    }
    if text.len() > MAX_COMMENT_LENGTH {
        return Err(ApiError::BadRequest(format!(
            "Comment cannot exceed {MAX_COMMENT_LENGTH} characters"
        )));
    }
    Ok(())
}

/// Comments on a ticket, newest first.
pub async fn list_ticket_comments(
    State(deployment): State<DeploymentImpl>,
    Extension(user): Extension<User>,
    Path(ticket_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<Vec<CommentWithAuthor>>>, ApiError> {
    let ticket = Ticket::find_by_id(&deployment.db().pool, ticket_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Ticket not found".to_string()))?;

    let (_project, access) = ticket_project(&deployment, &ticket).await?;
    require(
        authorization::access_tickets(user.id, &access),
        "Ticket",
        "Not authorized to view comments",
    )?;

    let comments =
        Comment::find_by_ticket_with_authors(&deployment.db().pool, ticket.id).await?;
    Ok(ResponseJson(ApiResponse::success(comments)))
}

pub async fn create_comment(
    State(deployment): State<DeploymentImpl>,
    Extension(user): Extension<User>,
    Json(payload): Json<CreateComment>,
) -> Result<ResponseJson<ApiResponse<CommentWithAuthor>>, ApiError> {
    validate_text(&payload.text)?;

    let ticket = Ticket::find_by_id(&deployment.db().pool, payload.ticket_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Ticket not found".to_string()))?;

    let (_project, access) = ticket_project(&deployment, &ticket).await?;
    require(
        authorization::access_tickets(user.id, &access),
        "Ticket",
        "Not authorized to comment on this ticket",
    )?;

    let comment = Comment::create(&deployment.db().pool, &payload, user.id).await?;
    Ok(ResponseJson(ApiResponse::success(CommentWithAuthor {
        comment,
        author: Some(user),
    })))
}

pub async fn update_comment(
    Extension(existing_comment): Extension<Comment>,
    Extension(user): Extension<User>,
    State(deployment): State<DeploymentImpl>,
    Json(payload): Json<UpdateComment>,
) -> Result<ResponseJson<ApiResponse<CommentWithAuthor>>, ApiError> {
    require(
        authorization::modify_comment(user.id, existing_comment.author_id),
        "Comment",
        "Not authorized to update this comment",
    )?;
    validate_text(&payload.text)?;

    let comment = Comment::update_text(
        &deployment.db().pool,
        existing_comment.id,
        payload.text.trim().to_string(),
    )
    .await?;
    Ok(ResponseJson(ApiResponse::success(CommentWithAuthor {
        comment,
        author: Some(user),
    })))
}

pub async fn delete_comment(
    Extension(comment): Extension<Comment>,
    Extension(user): Extension<User>,
    State(deployment): State<DeploymentImpl>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    require(
        authorization::modify_comment(user.id, comment.author_id),
        "Comment",
        "Not authorized to delete this comment",
    )?;

    let rows = Comment::delete(&deployment.db().pool, comment.id).await?;
    if rows == 0 {
        return Err(ApiError::NotFound("Comment not found".to_string()));
    }
    Ok(ResponseJson(ApiResponse::success(())))
}

pub fn router(deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    let comment_id_router = Router::new()
        .route("/", put(update_comment).delete(delete_comment))
        .layer(from_fn_with_state(
            deployment.clone(),
            load_comment_middleware::<DeploymentImpl>,
        ));

    let comments_router = Router::new()
        .route("/", post(create_comment))
        .route("/ticket/{ticket_id}", get(list_ticket_comments))
        .nest("/{id}", comment_id_router);

    Router::new().nest("/comments", comments_router)
}
