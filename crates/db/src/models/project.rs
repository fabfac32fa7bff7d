use std::collections::HashSet;

use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use ts_rs::TS;
use uuid::Uuid;

use crate::{
    entities::{attachment, comment, project, ticket},
    models::{ids, project_member::ProjectMember, user::User},
    types::ProjectStatus,
};

#[derive(Debug, Error)]
pub enum ProjectError {
    #[error(transparent)]
    Database(#[from] DbErr),
    #[error("Project not found")]
    ProjectNotFound,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct Project {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub status: ProjectStatus,
    pub admin_id: Uuid,
    #[ts(type = "Date")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "Date")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, TS)]
pub struct CreateProject {
    pub title: String,
    pub description: String,
    pub status: Option<ProjectStatus>,
}

#[derive(Debug, Deserialize, TS)]
pub struct UpdateProject {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<ProjectStatus>,
}

/// Project plus its resolved member accounts, as returned by the API.
#[derive(Debug, Clone, Serialize, TS)]
pub struct ProjectWithMembers {
    #[serde(flatten)]
    #[ts(flatten)]
    pub project: Project,
    pub members: Vec<User>,
}

impl std::ops::Deref for ProjectWithMembers {
    type Target = Project;
    fn deref(&self) -> &Self::Target {
        &self.project
    }
}

impl Project {
    async fn from_model<C: ConnectionTrait>(db: &C, model: project::Model) -> Result<Self, DbErr> {
        let admin_id = ids::user_uuid_by_id(db, model.admin_id)
            .await?
            .ok_or(DbErr::RecordNotFound("User not found".to_string()))?;
        Ok(Self {
            id: model.uuid,
            title: model.title,
            description: model.description,
            status: model.status,
            admin_id,
            created_at: model.created_at.into(),
            updated_at: model.updated_at.into(),
        })
    }

    /// Insert the project and the creator's membership row. The admin is
    /// always a member from the moment the project exists.
    pub async fn create<C: ConnectionTrait>(
        db: &C,
        data: &CreateProject,
        admin_id: Uuid,
        project_id: Uuid,
    ) -> Result<Self, DbErr> {
        let admin_row_id = ids::user_id_by_uuid(db, admin_id)
            .await?
            .ok_or(DbErr::RecordNotFound("User not found".to_string()))?;

        let now = Utc::now();
        let active = project::ActiveModel {
            uuid: Set(project_id),
            title: Set(data.title.clone()),
            description: Set(data.description.clone()),
            status: Set(data.status.unwrap_or_default()),
            admin_id: Set(admin_row_id),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
            ..Default::default()
        };
        let model = active.insert(db).await?;

        ProjectMember::add(db, project_id, admin_id).await?;
        Self::from_model(db, model).await
    }

    pub async fn find_by_id<C: ConnectionTrait>(db: &C, id: Uuid) -> Result<Option<Self>, DbErr> {
        let record = project::Entity::find()
            .filter(project::Column::Uuid.eq(id))
            .one(db)
            .await?;
        match record {
            Some(model) => Ok(Some(Self::from_model(db, model).await?)),
            None => Ok(None),
        }
    }

    /// Projects where the user is admin or member, newest first.
    pub async fn find_for_user<C: ConnectionTrait>(
        db: &C,
        user_id: Uuid,
    ) -> Result<Vec<Self>, DbErr> {
        let Some(user_row_id) = ids::user_id_by_uuid(db, user_id).await? else {
            return Ok(Vec::new());
        };

        let mut project_row_ids: HashSet<i64> =
            ProjectMember::project_row_ids_for_user(db, user_row_id)
                .await?
                .into_iter()
                .collect();

        let admin_rows: Vec<i64> = project::Entity::find()
            .select_only()
            .column(project::Column::Id)
            .filter(project::Column::AdminId.eq(user_row_id))
            .into_tuple()
            .all(db)
            .await?;
        project_row_ids.extend(admin_rows);

        if project_row_ids.is_empty() {
            return Ok(Vec::new());
        }

        let records = project::Entity::find()
            .filter(project::Column::Id.is_in(project_row_ids))
            .order_by_desc(project::Column::CreatedAt)
            .all(db)
            .await?;

        let mut projects = Vec::with_capacity(records.len());
        for model in records {
            projects.push(Self::from_model(db, model).await?);
        }
        Ok(projects)
    }

    pub async fn update<C: ConnectionTrait>(
        db: &C,
        id: Uuid,
        payload: &UpdateProject,
    ) -> Result<Self, DbErr> {
        let record = project::Entity::find()
            .filter(project::Column::Uuid.eq(id))
            .one(db)
            .await?
            .ok_or(DbErr::RecordNotFound("Project not found".to_string()))?;

        let mut active: project::ActiveModel = record.into();
        if let Some(title) = payload.title.clone() {
            active.title = Set(title);
        }
        if let Some(description) = payload.description.clone() {
            active.description = Set(description);
        }
        if let Some(status) = payload.status {
            active.status = Set(status);
        }
        active.updated_at = Set(Utc::now().into());

        let updated = active.update(db).await?;
        Self::from_model(db, updated).await
    }

    /// Hard-delete the project with everything scoped under it: comments on
    /// its tickets, attachment records, tickets, and membership rows.
    /// Stored attachment files are the caller's concern (collect filenames
    /// before calling this).
    pub async fn delete<C: ConnectionTrait>(db: &C, id: Uuid) -> Result<u64, DbErr> {
        let Some(project_row_id) = ids::project_id_by_uuid(db, id).await? else {
            return Ok(0);
        };

        let ticket_row_ids: Vec<i64> = ticket::Entity::find()
            .select_only()
            .column(ticket::Column::Id)
            .filter(ticket::Column::ProjectId.eq(project_row_id))
            .into_tuple()
            .all(db)
            .await?;

        if !ticket_row_ids.is_empty() {
            comment::Entity::delete_many()
                .filter(comment::Column::TicketId.is_in(ticket_row_ids.clone()))
                .exec(db)
                .await?;
            attachment::Entity::delete_many()
                .filter(attachment::Column::TicketId.is_in(ticket_row_ids.clone()))
                .exec(db)
                .await?;
            ticket::Entity::delete_many()
                .filter(ticket::Column::Id.is_in(ticket_row_ids))
                .exec(db)
                .await?;
        }

        ProjectMember::delete_by_project_row_id(db, project_row_id).await?;

        let result = project::Entity::delete_many()
            .filter(project::Column::Uuid.eq(id))
            .exec(db)
            .await?;
        Ok(result.rows_affected)
    }

    pub async fn member_uuids<C: ConnectionTrait>(
        db: &C,
        id: Uuid,
    ) -> Result<Vec<Uuid>, DbErr> {
        ProjectMember::member_uuids(db, id).await
    }

    pub async fn with_members<C: ConnectionTrait>(
        db: &C,
        project: Project,
    ) -> Result<ProjectWithMembers, DbErr> {
        let members = ProjectMember::member_users(db, project.id).await?;
        Ok(ProjectWithMembers { project, members })
    }
}

#[cfg(test)]
mod tests {
    use sea_orm::Database;
    use sea_orm_migration::MigratorTrait;

    use super::*;
    use crate::models::user::CreateUser;

    async fn setup_db() -> sea_orm::DatabaseConnection {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        db_migration::Migrator::up(&db, None).await.unwrap();
        db
    }

    async fn create_user<C: ConnectionTrait>(db: &C, email: &str) -> User {
        User::create(
            db,
            &CreateUser {
                name: email.split('@').next().unwrap().to_string(),
                email: email.to_string(),
                password_hash: "$argon2id$stub".to_string(),
                role: None,
            },
        )
        .await
        .unwrap()
    }

    fn project_payload(title: &str) -> CreateProject {
        CreateProject {
            title: title.to_string(),
            description: "A project".to_string(),
            status: None,
        }
    }

    #[tokio::test]
    async fn creator_becomes_admin_and_member() {
        let db = setup_db().await;
        let admin = create_user(&db, "admin@example.com").await;

        let project = Project::create(&db, &project_payload("P1"), admin.id, Uuid::new_v4())
            .await
            .unwrap();

        assert_eq!(project.admin_id, admin.id);
        assert_eq!(project.status, ProjectStatus::Active);

        let members = Project::member_uuids(&db, project.id).await.unwrap();
        assert_eq!(members, vec![admin.id]);
        assert!(members.contains(&project.admin_id));
    }

    #[tokio::test]
    async fn admin_stays_member_through_membership_changes() {
        let db = setup_db().await;
        let admin = create_user(&db, "admin@example.com").await;
        let other = create_user(&db, "other@example.com").await;

        let project = Project::create(&db, &project_payload("P1"), admin.id, Uuid::new_v4())
            .await
            .unwrap();

        ProjectMember::add(&db, project.id, other.id).await.unwrap();
        let members = Project::member_uuids(&db, project.id).await.unwrap();
        assert_eq!(members, vec![admin.id, other.id]);

        ProjectMember::remove(&db, project.id, other.id).await.unwrap();
        let members = Project::member_uuids(&db, project.id).await.unwrap();
        assert!(members.contains(&project.admin_id));
        assert_eq!(members.len(), 1);
    }

    #[tokio::test]
    async fn find_for_user_scopes_to_membership() {
        let db = setup_db().await;
        let admin = create_user(&db, "admin@example.com").await;
        let member = create_user(&db, "member@example.com").await;
        let outsider = create_user(&db, "outsider@example.com").await;

        let project = Project::create(&db, &project_payload("P1"), admin.id, Uuid::new_v4())
            .await
            .unwrap();
        ProjectMember::add(&db, project.id, member.id).await.unwrap();

        assert_eq!(Project::find_for_user(&db, admin.id).await.unwrap().len(), 1);
        assert_eq!(Project::find_for_user(&db, member.id).await.unwrap().len(), 1);
        assert!(Project::find_for_user(&db, outsider.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn delete_removes_project_and_memberships() {
        let db = setup_db().await;
        let admin = create_user(&db, "admin@example.com").await;

        let project = Project::create(&db, &project_payload("P1"), admin.id, Uuid::new_v4())
            .await
            .unwrap();

        let rows = Project::delete(&db, project.id).await.unwrap();
        assert_eq!(rows, 1);
        assert!(Project::find_by_id(&db, project.id).await.unwrap().is_none());
        assert!(Project::member_uuids(&db, project.id).await.unwrap().is_empty());
    }
}
