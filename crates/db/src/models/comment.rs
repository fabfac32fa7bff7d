use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QueryOrder,
    Set,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use ts_rs::TS;
use uuid::Uuid;

use crate::{
    entities::comment,
    models::{ids, user::User},
};

#[derive(Debug, Error)]
pub enum CommentError {
    #[error(transparent)]
    Database(#[from] DbErr),
    #[error("Comment not found")]
    CommentNotFound,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct Comment {
    pub id: Uuid,
    pub ticket_id: Uuid,
    pub author_id: Uuid,
    pub text: String,
    #[ts(type = "Date")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "Date")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, TS)]
pub struct CreateComment {
    pub ticket_id: Uuid,
    pub text: String,
}

#[derive(Debug, Deserialize, TS)]
pub struct UpdateComment {
    pub text: String,
}

#[derive(Debug, Clone, Serialize, TS)]
pub struct CommentWithAuthor {
    #[serde(flatten)]
    #[ts(flatten)]
    pub comment: Comment,
    pub author: Option<User>,
}

impl std::ops::Deref for CommentWithAuthor {
    type Target = Comment;
    fn deref(&self) -> &Self::Target {
        &self.comment
    }
}

impl Comment {
    async fn from_model<C: ConnectionTrait>(db: &C, model: comment::Model) -> Result<Self, DbErr> {
        let ticket_id = ids::ticket_uuid_by_id(db, model.ticket_id)
            .await?
            .ok_or(DbErr::RecordNotFound("Ticket not found".to_string()))?;
        let author_id = ids::user_uuid_by_id(db, model.author_id)
            .await?
            .ok_or(DbErr::RecordNotFound("User not found".to_string()))?;
        Ok(Self {
            id: model.uuid,
            ticket_id,
            author_id,
            text: model.text,
            created_at: model.created_at.into(),
            updated_at: model.updated_at.into(),
        })
    }

    pub async fn create<C: ConnectionTrait>(
        db: &C,
        data: &CreateComment,
        author_id: Uuid,
    ) -> Result<Self, DbErr> {
        let ticket_row_id = ids::ticket_id_by_uuid(db, data.ticket_id)
            .await?
            .ok_or(DbErr::RecordNotFound("Ticket not found".to_string()))?;
        let author_row_id = ids::user_id_by_uuid(db, author_id)
            .await?
            .ok_or(DbErr::RecordNotFound("User not found".to_string()))?;

        let now = Utc::now();
        let active = comment::ActiveModel {
            uuid: Set(Uuid::new_v4()),
            ticket_id: Set(ticket_row_id),
            author_id: Set(author_row_id),
            text: Set(data.text.clone()),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
            ..Default::default()
        };
        let model = active.insert(db).await?;
        Self::from_model(db, model).await
    }

    pub async fn find_by_id<C: ConnectionTrait>(db: &C, id: Uuid) -> Result<Option<Self>, DbErr> {
        let record = comment::Entity::find()
            .filter(comment::Column::Uuid.eq(id))
            .one(db)
            .await?;
        match record {
            Some(model) => Ok(Some(Self::from_model(db, model).await?)),
            None => Ok(None),
        }
    }

    /// Comments on a ticket, newest first, with their authors resolved.
    pub async fn find_by_ticket_with_authors<C: ConnectionTrait>(
        db: &C,
        ticket_id: Uuid,
    ) -> Result<Vec<CommentWithAuthor>, DbErr> {
        let Some(ticket_row_id) = ids::ticket_id_by_uuid(db, ticket_id).await? else {
            return Ok(Vec::new());
        };
        let records = comment::Entity::find()
            .filter(comment::Column::TicketId.eq(ticket_row_id))
            .order_by_desc(comment::Column::CreatedAt)
            .all(db)
            .await?;

        let mut comments = Vec::with_capacity(records.len());
        for model in records {
            let comment = Self::from_model(db, model).await?;
            let author = User::find_by_id(db, comment.author_id).await?;
            comments.push(CommentWithAuthor { comment, author });
        }
        Ok(comments)
    }

    pub async fn update_text<C: ConnectionTrait>(
        db: &C,
        id: Uuid,
        text: String,
    ) -> Result<Self, DbErr> {
        let record = comment::Entity::find()
            .filter(comment::Column::Uuid.eq(id))
            .one(db)
            .await?
            .ok_or(DbErr::RecordNotFound("Comment not found".to_string()))?;

        let mut active: comment::ActiveModel = record.into();
        active.text = Set(text);
        active.updated_at = Set(Utc::now().into());

        let updated = active.update(db).await?;
        Self::from_model(db, updated).await
    }

    pub async fn delete<C: ConnectionTrait>(db: &C, id: Uuid) -> Result<u64, DbErr> {
        let result = comment::Entity::delete_many()
            .filter(comment::Column::Uuid.eq(id))
            .exec(db)
            .await?;
        Ok(result.rows_affected)
    }
}
