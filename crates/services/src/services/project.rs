use db::{
    DbErr, DbPool, TransactionTrait,
    models::{
        attachment::Attachment,
        project::{CreateProject, Project, ProjectError, ProjectWithMembers, UpdateProject},
        project_member::ProjectMember,
        user::User,
    },
};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum ProjectServiceError {
    #[error(transparent)]
    Database(#[from] DbErr),
    #[error(transparent)]
    Project(#[from] ProjectError),
    #[error("User not found with this email")]
    UserNotFound,
    #[error("User is already a team member")]
    AlreadyMember,
    #[error("Cannot remove project admin from team")]
    CannotRemoveAdmin,
    #[error("User is not a team member")]
    MemberNotFound,
}

pub type Result<T> = std::result::Result<T, ProjectServiceError>;

/// Membership data rules: who joins a project, who leaves it, and what a
/// project takes with it when it goes away.
#[derive(Clone, Default)]
pub struct ProjectService;

impl ProjectService {
    pub fn new() -> Self {
        Self
    }

    /// Create a project with the caller as admin. The project row and the
    /// admin's membership row land in one transaction.
    pub async fn create_project(
        &self,
        pool: &DbPool,
        payload: &CreateProject,
        admin_id: Uuid,
    ) -> Result<Project> {
        let project_id = Uuid::new_v4();
        let tx = pool.begin().await?;
        let project = Project::create(&tx, payload, admin_id, project_id).await?;
        tx.commit().await?;
        Ok(project)
    }

    pub async fn update_project(
        &self,
        pool: &DbPool,
        project: &Project,
        payload: &UpdateProject,
    ) -> Result<Project> {
        Ok(Project::update(pool, project.id, payload).await?)
    }

    /// Add a user to the team by email. Unknown emails and existing
    /// members are both terminal, caller-correctable outcomes.
    pub async fn add_member_by_email(
        &self,
        pool: &DbPool,
        project: &Project,
        email: &str,
    ) -> Result<ProjectWithMembers> {
        let user = User::find_by_email(pool, email)
            .await?
            .ok_or(ProjectServiceError::UserNotFound)?;

        if ProjectMember::is_member(pool, project.id, user.id).await? {
            return Err(ProjectServiceError::AlreadyMember);
        }

        ProjectMember::add(pool, project.id, user.id).await?;
        Ok(Project::with_members(pool, project.clone()).await?)
    }

    /// Remove a team member. The admin's own membership is not removable;
    /// the authorization layer denies it first and this guard keeps the
    /// invariant even for internal callers.
    pub async fn remove_member(
        &self,
        pool: &DbPool,
        project: &Project,
        user_id: Uuid,
    ) -> Result<ProjectWithMembers> {
        if user_id == project.admin_id {
            return Err(ProjectServiceError::CannotRemoveAdmin);
        }

        let removed = ProjectMember::remove(pool, project.id, user_id).await?;
        if removed == 0 {
            return Err(ProjectServiceError::MemberNotFound);
        }
        Ok(Project::with_members(pool, project.clone()).await?)
    }

    /// Delete a project and everything scoped under it, returning the
    /// stored attachment filenames so the caller can clean up the disk.
    /// The row deletes are transactional; the file unlinks are not.
    pub async fn delete_project(&self, pool: &DbPool, project: &Project) -> Result<Vec<String>> {
        let filenames = Attachment::filenames_by_project(pool, project.id).await?;

        let tx = pool.begin().await?;
        let rows = Project::delete(&tx, project.id).await?;
        tx.commit().await?;

        if rows == 0 {
            return Err(ProjectServiceError::Project(ProjectError::ProjectNotFound));
        }
        Ok(filenames)
    }
}
