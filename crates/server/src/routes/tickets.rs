use axum::{
    Extension, Json, Router,
    extract::{Path, Query, State},
    middleware::from_fn_with_state,
    response::Json as ResponseJson,
    routing::{delete, get, post},
};
use db::models::{
    attachment::Attachment,
    project::Project,
    ticket::{CreateTicket, Ticket, TicketFilters, TicketSort, TicketStats, UpdateTicket},
    user::User,
};
use deployment::Deployment;
use serde::{Deserialize, Serialize};
use services::services::authorization;
use ts_rs::TS;
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{
    DeploymentImpl,
    error::{ApiError, require},
    middleware::load_ticket_middleware,
    routes::{attachments, project_access, ticket_project},
};

const MAX_TITLE_LENGTH: usize = 150;
const MAX_DESCRIPTION_LENGTH: usize = 2000;

#[derive(Debug, Deserialize, TS)]
pub struct TicketListQuery {
    pub status: Option<db::types::TicketStatus>,
    pub priority: Option<db::types::TicketPriority>,
    pub assigned_to: Option<Uuid>,
    pub sort_by: Option<TicketSort>,
}

impl TicketListQuery {
    fn filters(&self) -> TicketFilters {
        TicketFilters {
            status: self.status,
            priority: self.priority,
            assigned_to: self.assigned_to,
        }
    }
}

/// Ticket plus its attachment records, as returned by single-ticket reads.
#[derive(Debug, Serialize, TS)]
pub struct TicketWithAttachments {
    #[serde(flatten)]
    #[ts(flatten)]
    pub ticket: Ticket,
    pub attachments: Vec<Attachment>,
}

impl TicketWithAttachments {
    pub(crate) async fn load(
        deployment: &DeploymentImpl,
        ticket: Ticket,
    ) -> Result<Self, ApiError> {
        let attachments = Attachment::find_by_ticket(&deployment.db().pool, ticket.id).await?;
        Ok(Self {
            ticket,
            attachments,
        })
    }
}

fn validate_title(title: &str) -> Result<(), ApiError> {
    if title.trim().is_empty() {
        return Err(ApiError::BadRequest(
            "Please provide title, description, and project".to_string(),
        ));
    }
    if title.len() > MAX_TITLE_LENGTH {
        return Err(ApiError::BadRequest(format!(
            "Title cannot exceed {MAX_TITLE_LENGTH} characters"
        )));
    }
    Ok(())
}

fn validate_description(description: &str) -> Result<(), ApiError> {
    if description.trim().is_empty() {
        return Err(ApiError::BadRequest(
            "Please provide title, description, and project".to_string(),
        ));
    }
    if description.len() > MAX_DESCRIPTION_LENGTH {
        return Err(ApiError::BadRequest(format!(
            "Description cannot exceed {MAX_DESCRIPTION_LENGTH} characters"
        )));
    }
    Ok(())
}

pub async fn list_project_tickets(
    State(deployment): State<DeploymentImpl>,
    Extension(user): Extension<User>,
    Path(project_id): Path<Uuid>,
    Query(query): Query<TicketListQuery>,
) -> Result<ResponseJson<ApiResponse<Vec<Ticket>>>, ApiError> {
    let project = Project::find_by_id(&deployment.db().pool, project_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Project not found".to_string()))?;

    let access = project_access(&deployment, &project).await?;
    require(
        authorization::access_tickets(user.id, &access),
        "Project",
        "Not authorized to view this project's tickets",
    )?;

    let tickets = Ticket::find_by_project(
        &deployment.db().pool,
        project.id,
        &query.filters(),
        query.sort_by.unwrap_or_default(),
    )
    .await?;
    Ok(ResponseJson(ApiResponse::success(tickets)))
}

pub async fn project_stats(
    State(deployment): State<DeploymentImpl>,
    Extension(user): Extension<User>,
    Path(project_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<TicketStats>>, ApiError> {
    let project = Project::find_by_id(&deployment.db().pool, project_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Project not found".to_string()))?;

    let access = project_access(&deployment, &project).await?;
    require(
        authorization::access_tickets(user.id, &access),
        "Project",
        "Not authorized to view this project's statistics",
    )?;

    let stats = Ticket::stats(&deployment.db().pool, project.id).await?;
    Ok(ResponseJson(ApiResponse::success(stats)))
}

pub async fn my_tickets(
    State(deployment): State<DeploymentImpl>,
    Extension(user): Extension<User>,
) -> Result<ResponseJson<ApiResponse<Vec<Ticket>>>, ApiError> {
    let tickets = Ticket::find_assigned_to(&deployment.db().pool, user.id).await?;
    Ok(ResponseJson(ApiResponse::success(tickets)))
}

pub async fn created_by_me(
    State(deployment): State<DeploymentImpl>,
    Extension(user): Extension<User>,
) -> Result<ResponseJson<ApiResponse<Vec<Ticket>>>, ApiError> {
    let tickets = Ticket::find_created_by(&deployment.db().pool, user.id).await?;
    Ok(ResponseJson(ApiResponse::success(tickets)))
}

pub async fn create_ticket(
    State(deployment): State<DeploymentImpl>,
    Extension(user): Extension<User>,
    Json(payload): Json<CreateTicket>,
) -> Result<ResponseJson<ApiResponse<Ticket>>, ApiError> {
    validate_title(&payload.title)?;
    validate_description(&payload.description)?;

    let project = Project::find_by_id(&deployment.db().pool, payload.project_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Project not found".to_string()))?;

    let access = project_access(&deployment, &project).await?;
    require(
        authorization::access_tickets(user.id, &access),
        "Project",
        "Not authorized to create tickets in this project",
    )?;

    // Assignment-time membership check; a violation is a validation
    // failure on the request, not an authorization failure.
    if !authorization::assignee_is_member(payload.assigned_to_id, &access) {
        return Err(ApiError::BadRequest(
            "Assigned user must be a team member of the project".to_string(),
        ));
    }

    tracing::debug!(
        "Creating ticket '{}' in project {}",
        payload.title,
        payload.project_id
    );

    let ticket = Ticket::create(&deployment.db().pool, &payload, user.id, Uuid::new_v4()).await?;
    Ok(ResponseJson(ApiResponse::success(ticket)))
}

pub async fn get_ticket(
    Extension(ticket): Extension<Ticket>,
    Extension(user): Extension<User>,
    State(deployment): State<DeploymentImpl>,
) -> Result<ResponseJson<ApiResponse<TicketWithAttachments>>, ApiError> {
    let (_project, access) = ticket_project(&deployment, &ticket).await?;
    require(
        authorization::access_tickets(user.id, &access),
        "Ticket",
        "Not authorized to view this ticket",
    )?;

    let populated = TicketWithAttachments::load(&deployment, ticket).await?;
    Ok(ResponseJson(ApiResponse::success(populated)))
}

pub async fn update_ticket(
    Extension(existing_ticket): Extension<Ticket>,
    Extension(user): Extension<User>,
    State(deployment): State<DeploymentImpl>,
    Json(payload): Json<UpdateTicket>,
) -> Result<ResponseJson<ApiResponse<Ticket>>, ApiError> {
    let (_project, access) = ticket_project(&deployment, &existing_ticket).await?;
    require(
        authorization::access_tickets(user.id, &access),
        "Ticket",
        "Not authorized to update this ticket",
    )?;

    // Use existing values if not provided in update
    let title = payload.title.unwrap_or(existing_ticket.title);
    validate_title(&title)?;
    let description = payload.description.unwrap_or(existing_ticket.description);
    validate_description(&description)?;
    let priority = payload.priority.unwrap_or(existing_ticket.priority);
    let status = payload.status.unwrap_or(existing_ticket.status);
    let kind = payload.kind.unwrap_or(existing_ticket.kind);

    // Outer None = field omitted, inner None = explicit clear.
    let assigned_to_id = match payload.assigned_to_id {
        None => existing_ticket.assigned_to_id,
        Some(None) => None,
        Some(Some(assignee)) => {
            if !authorization::assignee_is_member(Some(assignee), &access) {
                return Err(ApiError::BadRequest(
                    "Assigned user must be a team member of the project".to_string(),
                ));
            }
            Some(assignee)
        }
    };
    let due_date = match payload.due_date {
        None => existing_ticket.due_date,
        Some(value) => value,
    };

    let ticket = Ticket::update(
        &deployment.db().pool,
        existing_ticket.id,
        title,
        description,
        priority,
        status,
        kind,
        assigned_to_id,
        due_date,
    )
    .await?;
    Ok(ResponseJson(ApiResponse::success(ticket)))
}

pub async fn delete_ticket(
    Extension(ticket): Extension<Ticket>,
    Extension(user): Extension<User>,
    State(deployment): State<DeploymentImpl>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    let (_project, access) = ticket_project(&deployment, &ticket).await?;
    require(
        authorization::delete_ticket(user.id, &access, ticket.created_by_id),
        "Ticket",
        "Only ticket creator or project admin can delete tickets",
    )?;

    let filenames = Attachment::filenames_by_ticket(&deployment.db().pool, ticket.id).await?;
    let rows = Ticket::delete(&deployment.db().pool, ticket.id).await?;
    if rows == 0 {
        return Err(ApiError::NotFound("Ticket not found".to_string()));
    }

    for filename in filenames {
        if let Err(err) = deployment.attachment().remove(&filename).await {
            tracing::warn!(
                ticket_id = %ticket.id,
                filename = %filename,
                error = %err,
                "Failed to remove attachment file during ticket delete"
            );
        }
    }

    Ok(ResponseJson(ApiResponse::success(())))
}

pub fn router(deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    let ticket_id_router = Router::new()
        .route("/", get(get_ticket).put(update_ticket).delete(delete_ticket))
        .route("/attachments", post(attachments::upload_attachment))
        .layer(from_fn_with_state(
            deployment.clone(),
            load_ticket_middleware::<DeploymentImpl>,
        ));

    let tickets_router = Router::new()
        .route("/", post(create_ticket))
        .route("/my-tickets", get(my_tickets))
        .route("/created-by-me", get(created_by_me))
        .route("/project/{project_id}", get(list_project_tickets))
        .route("/project/{project_id}/stats", get(project_stats))
        .route(
            "/{ticket_id}/attachments/{attachment_id}",
            delete(attachments::delete_attachment),
        )
        .nest("/{id}", ticket_id_router);

    Router::new().nest("/tickets", tickets_router)
}
