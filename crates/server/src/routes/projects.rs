use axum::{
    Extension, Json, Router,
    extract::{Path, State},
    middleware::from_fn_with_state,
    response::Json as ResponseJson,
    routing::{delete, get, post},
};
use db::models::{
    project::{CreateProject, Project, ProjectWithMembers, UpdateProject},
    user::User,
};
use deployment::Deployment;
use serde::Deserialize;
use services::services::authorization;
use ts_rs::TS;
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{
    DeploymentImpl,
    error::{ApiError, require},
    middleware::load_project_middleware,
    routes::project_access,
};

const MAX_TITLE_LENGTH: usize = 100;
const MAX_DESCRIPTION_LENGTH: usize = 500;

#[derive(Debug, Deserialize, TS)]
pub struct AddMemberRequest {
    pub email: String,
}

fn validate_title(title: &str) -> Result<(), ApiError> {
    if title.trim().is_empty() {
        return Err(ApiError::BadRequest(
            "Please provide title and description".to_string(),
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
            "Please provide title and description".to_string(),
        ));
    }
    if description.len() > MAX_DESCRIPTION_LENGTH {
        return Err(ApiError::BadRequest(format!(
            "Description cannot exceed {MAX_DESCRIPTION_LENGTH} characters"
        )));
    }
    Ok(())
}

/// Projects where the caller is admin or member, newest first.
pub async fn get_projects(
    State(deployment): State<DeploymentImpl>,
    Extension(user): Extension<User>,
) -> Result<ResponseJson<ApiResponse<Vec<ProjectWithMembers>>>, ApiError> {
    let pool = &deployment.db().pool;
    let projects = Project::find_for_user(pool, user.id).await?;

    let mut populated = Vec::with_capacity(projects.len());
    for project in projects {
        populated.push(Project::with_members(pool, project).await?);
    }
    Ok(ResponseJson(ApiResponse::success(populated)))
}

pub async fn create_project(
    State(deployment): State<DeploymentImpl>,
    Extension(user): Extension<User>,
    Json(payload): Json<CreateProject>,
) -> Result<ResponseJson<ApiResponse<ProjectWithMembers>>, ApiError> {
    validate_title(&payload.title)?;
    validate_description(&payload.description)?;

    tracing::debug!("Creating project '{}'", payload.title);

    let project = deployment
        .project()
        .create_project(&deployment.db().pool, &payload, user.id)
        .await?;
    let populated = Project::with_members(&deployment.db().pool, project).await?;
    Ok(ResponseJson(ApiResponse::success(populated)))
}

pub async fn get_project(
    Extension(project): Extension<Project>,
    Extension(user): Extension<User>,
    State(deployment): State<DeploymentImpl>,
) -> Result<ResponseJson<ApiResponse<ProjectWithMembers>>, ApiError> {
    let access = project_access(&deployment, &project).await?;
    require(
        authorization::view_project(user.id, &access),
        "Project",
        "Not authorized to view this project",
    )?;

    let populated = Project::with_members(&deployment.db().pool, project).await?;
    Ok(ResponseJson(ApiResponse::success(populated)))
}

pub async fn update_project(
    Extension(existing_project): Extension<Project>,
    Extension(user): Extension<User>,
    State(deployment): State<DeploymentImpl>,
    Json(payload): Json<UpdateProject>,
) -> Result<ResponseJson<ApiResponse<ProjectWithMembers>>, ApiError> {
    let access = project_access(&deployment, &existing_project).await?;
    require(
        authorization::manage_project(user.id, &access),
        "Project",
        "Only project admin can update project",
    )?;

    if let Some(title) = payload.title.as_deref() {
        validate_title(title)?;
    }
    if let Some(description) = payload.description.as_deref() {
        validate_description(description)?;
    }

    let project = deployment
        .project()
        .update_project(&deployment.db().pool, &existing_project, &payload)
        .await?;
    let populated = Project::with_members(&deployment.db().pool, project).await?;
    Ok(ResponseJson(ApiResponse::success(populated)))
}

pub async fn delete_project(
    Extension(project): Extension<Project>,
    Extension(user): Extension<User>,
    State(deployment): State<DeploymentImpl>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    let access = project_access(&deployment, &project).await?;
    require(
        authorization::manage_project(user.id, &access),
        "Project",
        "Only project admin can delete project",
    )?;

    let filenames = deployment
        .project()
        .delete_project(&deployment.db().pool, &project)
        .await?;

    // Row deletes are done; stored files go best-effort (accepted orphan
    // window, see DESIGN.md).
    for filename in filenames {
        if let Err(err) = deployment.attachment().remove(&filename).await {
            tracing::warn!(
                project_id = %project.id,
                filename = %filename,
                error = %err,
                "Failed to remove attachment file during project delete"
            );
        }
    }

    tracing::info!(project_id = %project.id, "Deleted project");
    Ok(ResponseJson(ApiResponse::success(())))
}

pub async fn add_member(
    Extension(project): Extension<Project>,
    Extension(user): Extension<User>,
    State(deployment): State<DeploymentImpl>,
    Json(payload): Json<AddMemberRequest>,
) -> Result<ResponseJson<ApiResponse<ProjectWithMembers>>, ApiError> {
    if payload.email.trim().is_empty() {
        return Err(ApiError::BadRequest(
            "Please provide user email".to_string(),
        ));
    }

    let access = project_access(&deployment, &project).await?;
    require(
        authorization::add_member(user.id, &access),
        "Project",
        "Only project admin can add team members",
    )?;

    let populated = deployment
        .project()
        .add_member_by_email(&deployment.db().pool, &project, payload.email.trim())
        .await?;
    Ok(ResponseJson(ApiResponse::success(populated)))
}

pub async fn remove_member(
    State(deployment): State<DeploymentImpl>,
    Extension(user): Extension<User>,
    Path((project_id, member_id)): Path<(Uuid, Uuid)>,
) -> Result<ResponseJson<ApiResponse<ProjectWithMembers>>, ApiError> {
    let project = Project::find_by_id(&deployment.db().pool, project_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Project not found".to_string()))?;

    let access = project_access(&deployment, &project).await?;
    let decision = authorization::remove_member(user.id, &access, member_id);
    let forbidden_msg = if member_id == project.admin_id {
        "Cannot remove project admin from team"
    } else {
        "Only project admin can remove team members"
    };
    require(decision, "Project", forbidden_msg)?;

    let populated = deployment
        .project()
        .remove_member(&deployment.db().pool, &project, member_id)
        .await?;
    Ok(ResponseJson(ApiResponse::success(populated)))
}

pub fn router(deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    let project_id_router = Router::new()
        .route(
            "/",
            get(get_project).put(update_project).delete(delete_project),
        )
        .route("/members", post(add_member))
        .layer(from_fn_with_state(
            deployment.clone(),
            load_project_middleware::<DeploymentImpl>,
        ));

    let projects_router = Router::new()
        .route("/", get(get_projects).post(create_project))
        .route("/{project_id}/members/{user_id}", delete(remove_member))
        .nest("/{id}", project_id_router);

    Router::new().nest("/projects", projects_router)
}
