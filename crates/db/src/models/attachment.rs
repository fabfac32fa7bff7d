use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

use crate::{
    entities::{attachment, ticket},
    models::ids,
};

/// File reference scoped to a ticket. The bytes live on disk under the
/// uploads directory; this row only records the metadata.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct Attachment {
    pub id: Uuid,
    pub ticket_id: Uuid,
    pub filename: String,
    pub original_name: String,
    pub mime_type: String,
    pub size_bytes: i64,
    pub uploaded_by_id: Uuid,
    #[ts(type = "Date")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, TS)]
pub struct CreateAttachment {
    pub filename: String,
    pub original_name: String,
    pub mime_type: String,
    pub size_bytes: i64,
}

impl Attachment {
    async fn from_model<C: ConnectionTrait>(
        db: &C,
        model: attachment::Model,
    ) -> Result<Self, DbErr> {
        let ticket_id = ids::ticket_uuid_by_id(db, model.ticket_id)
            .await?
            .ok_or(DbErr::RecordNotFound("Ticket not found".to_string()))?;
        let uploaded_by_id = ids::user_uuid_by_id(db, model.uploaded_by_id)
            .await?
            .ok_or(DbErr::RecordNotFound("User not found".to_string()))?;
        Ok(Self {
            id: model.uuid,
            ticket_id,
            filename: model.filename,
            original_name: model.original_name,
            mime_type: model.mime_type,
            size_bytes: model.size_bytes,
            uploaded_by_id,
            created_at: model.created_at.into(),
        })
    }

    pub async fn create<C: ConnectionTrait>(
        db: &C,
        ticket_id: Uuid,
        uploaded_by_id: Uuid,
        data: &CreateAttachment,
    ) -> Result<Self, DbErr> {
        let ticket_row_id = ids::ticket_id_by_uuid(db, ticket_id)
            .await?
            .ok_or(DbErr::RecordNotFound("Ticket not found".to_string()))?;
        let uploader_row_id = ids::user_id_by_uuid(db, uploaded_by_id)
            .await?
            .ok_or(DbErr::RecordNotFound("User not found".to_string()))?;

        let active = attachment::ActiveModel {
            uuid: Set(Uuid::new_v4()),
            ticket_id: Set(ticket_row_id),
            filename: Set(data.filename.clone()),
            original_name: Set(data.original_name.clone()),
            mime_type: Set(data.mime_type.clone()),
            size_bytes: Set(data.size_bytes),
            uploaded_by_id: Set(uploader_row_id),
            created_at: Set(Utc::now().into()),
            ..Default::default()
        };
        let model = active.insert(db).await?;
        Self::from_model(db, model).await
    }

    pub async fn find_by_id<C: ConnectionTrait>(db: &C, id: Uuid) -> Result<Option<Self>, DbErr> {
        let record = attachment::Entity::find()
            .filter(attachment::Column::Uuid.eq(id))
            .one(db)
            .await?;
        match record {
            Some(model) => Ok(Some(Self::from_model(db, model).await?)),
            None => Ok(None),
        }
    }

    pub async fn find_by_ticket<C: ConnectionTrait>(
        db: &C,
        ticket_id: Uuid,
    ) -> Result<Vec<Self>, DbErr> {
        let Some(ticket_row_id) = ids::ticket_id_by_uuid(db, ticket_id).await? else {
            return Ok(Vec::new());
        };
        let records = attachment::Entity::find()
            .filter(attachment::Column::TicketId.eq(ticket_row_id))
            .order_by_asc(attachment::Column::CreatedAt)
            .all(db)
            .await?;

        let mut attachments = Vec::with_capacity(records.len());
        for model in records {
            attachments.push(Self::from_model(db, model).await?);
        }
        Ok(attachments)
    }

    pub async fn delete<C: ConnectionTrait>(db: &C, id: Uuid) -> Result<u64, DbErr> {
        let result = attachment::Entity::delete_many()
            .filter(attachment::Column::Uuid.eq(id))
            .exec(db)
            .await?;
        Ok(result.rows_affected)
    }

    /// Stored filenames for a single ticket, for disk cleanup before the
    /// rows go away.
    pub async fn filenames_by_ticket<C: ConnectionTrait>(
        db: &C,
        ticket_id: Uuid,
    ) -> Result<Vec<String>, DbErr> {
        let Some(ticket_row_id) = ids::ticket_id_by_uuid(db, ticket_id).await? else {
            return Ok(Vec::new());
        };
        attachment::Entity::find()
            .select_only()
            .column(attachment::Column::Filename)
            .filter(attachment::Column::TicketId.eq(ticket_row_id))
            .into_tuple()
            .all(db)
            .await
    }

    /// Stored filenames across every ticket of a project.
    pub async fn filenames_by_project<C: ConnectionTrait>(
        db: &C,
        project_id: Uuid,
    ) -> Result<Vec<String>, DbErr> {
        let Some(project_row_id) = ids::project_id_by_uuid(db, project_id).await? else {
            return Ok(Vec::new());
        };
        let ticket_row_ids: Vec<i64> = ticket::Entity::find()
            .select_only()
            .column(ticket::Column::Id)
            .filter(ticket::Column::ProjectId.eq(project_row_id))
            .into_tuple()
            .all(db)
            .await?;
        if ticket_row_ids.is_empty() {
            return Ok(Vec::new());
        }
        attachment::Entity::find()
            .select_only()
            .column(attachment::Column::Filename)
            .filter(attachment::Column::TicketId.is_in(ticket_row_ids))
            .into_tuple()
            .all(db)
            .await
    }
}

#[cfg(test)]
mod tests {
    use sea_orm::Database;
    use sea_orm_migration::MigratorTrait;

    use super::*;
    use crate::models::{
        project::{CreateProject, Project},
        ticket::{CreateTicket, Ticket},
        user::{CreateUser, User},
    };

    async fn setup_db() -> sea_orm::DatabaseConnection {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        db_migration::Migrator::up(&db, None).await.unwrap();
        db
    }

    async fn seed_ticket<C: ConnectionTrait>(db: &C) -> (User, Ticket) {
        let user = User::create(
            db,
            &CreateUser {
                name: "Uploader".to_string(),
                email: "uploader@example.com".to_string(),
                password_hash: "$argon2id$stub".to_string(),
                role: None,
            },
        )
        .await
        .unwrap();
        let project = Project::create(
            db,
            &CreateProject {
                title: "P1".to_string(),
                description: "A project".to_string(),
                status: None,
            },
            user.id,
            Uuid::new_v4(),
        )
        .await
        .unwrap();
        let ticket = Ticket::create(
            db,
            &CreateTicket {
                project_id: project.id,
                title: "T1".to_string(),
                description: "Something broke".to_string(),
                priority: None,
                status: None,
                kind: None,
                assigned_to_id: None,
                due_date: None,
            },
            user.id,
            Uuid::new_v4(),
        )
        .await
        .unwrap();
        (user, ticket)
    }

    #[tokio::test]
    async fn create_list_and_delete() {
        let db = setup_db().await;
        let (user, ticket) = seed_ticket(&db).await;

        let attachment = Attachment::create(
            &db,
            ticket.id,
            user.id,
            &CreateAttachment {
                filename: "abc123.png".to_string(),
                original_name: "screenshot.png".to_string(),
                mime_type: "image/png".to_string(),
                size_bytes: 2048,
            },
        )
        .await
        .unwrap();
        assert_eq!(attachment.ticket_id, ticket.id);
        assert_eq!(attachment.uploaded_by_id, user.id);

        let listed = Attachment::find_by_ticket(&db, ticket.id).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].original_name, "screenshot.png");

        assert_eq!(
            Attachment::filenames_by_ticket(&db, ticket.id).await.unwrap(),
            vec!["abc123.png".to_string()]
        );

        let rows = Attachment::delete(&db, attachment.id).await.unwrap();
        assert_eq!(rows, 1);
        assert!(Attachment::find_by_ticket(&db, ticket.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn ticket_delete_removes_attachment_rows() {
        let db = setup_db().await;
        let (user, ticket) = seed_ticket(&db).await;

        Attachment::create(
            &db,
            ticket.id,
            user.id,
            &CreateAttachment {
                filename: "abc123.log".to_string(),
                original_name: "trace.log".to_string(),
                mime_type: "text/plain".to_string(),
                size_bytes: 64,
            },
        )
        .await
        .unwrap();

        Ticket::delete(&db, ticket.id).await.unwrap();
        assert!(Attachment::find_by_ticket(&db, ticket.id).await.unwrap().is_empty());
    }
}
