use db::models::{project::Project, ticket::Ticket};
use deployment::Deployment;
use services::services::authorization::ProjectAccess;

use crate::{DeploymentImpl, error::ApiError};

pub mod attachments;
pub mod auth;
pub mod comments;
pub mod health;
pub mod projects;
pub mod tickets;

/// Snapshot the membership state the authorization predicates operate on.
pub(crate) async fn project_access(
    deployment: &DeploymentImpl,
    project: &Project,
) -> Result<ProjectAccess, ApiError> {
    let member_ids = Project::member_uuids(&deployment.db().pool, project.id).await?;
    Ok(ProjectAccess::new(project.admin_id, member_ids))
}

/// Resolve the project owning a ticket, plus its access snapshot. Ticket
/// and comment checks walk ticket → project before any predicate runs.
pub(crate) async fn ticket_project(
    deployment: &DeploymentImpl,
    ticket: &Ticket,
) -> Result<(Project, ProjectAccess), ApiError> {
    let project = Project::find_by_id(&deployment.db().pool, ticket.project_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Project not found".to_string()))?;
    let access = project_access(deployment, &project).await?;
    Ok((project, access))
}
