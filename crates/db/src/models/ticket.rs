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
    entities::{attachment, ticket},
    models::ids,
    types::{TicketKind, TicketPriority, TicketStatus},
};

#[derive(Debug, Error)]
pub enum TicketError {
    #[error(transparent)]
    Database(#[from] DbErr),
    #[error("Ticket not found")]
    TicketNotFound,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct Ticket {
    pub id: Uuid,
    pub project_id: Uuid,
    pub title: String,
    pub description: String,
    pub priority: TicketPriority,
    pub status: TicketStatus,
    pub kind: TicketKind,
    pub created_by_id: Uuid,
    pub assigned_to_id: Option<Uuid>,
    #[ts(type = "Date | null")]
    pub due_date: Option<DateTime<Utc>>,
    #[ts(type = "Date")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "Date")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, TS)]
pub struct CreateTicket {
    pub project_id: Uuid,
    pub title: String,
    pub description: String,
    pub priority: Option<TicketPriority>,
    pub status: Option<TicketStatus>,
    pub kind: Option<TicketKind>,
    pub assigned_to_id: Option<Uuid>,
    pub due_date: Option<DateTime<Utc>>,
}

/// Partial update. `assigned_to_id` and `due_date` distinguish "field
/// omitted" (outer None) from "explicitly cleared" (inner None).
#[derive(Debug, Deserialize, TS)]
pub struct UpdateTicket {
    pub title: Option<String>,
    pub description: Option<String>,
    pub priority: Option<TicketPriority>,
    pub status: Option<TicketStatus>,
    pub kind: Option<TicketKind>,
    #[serde(default)]
    #[ts(type = "string | null")]
    pub assigned_to_id: Option<Option<Uuid>>,
    #[serde(default)]
    #[ts(type = "Date | null")]
    pub due_date: Option<Option<DateTime<Utc>>>,
}

#[derive(Debug, Clone, Default, Deserialize, TS)]
pub struct TicketFilters {
    pub status: Option<TicketStatus>,
    pub priority: Option<TicketPriority>,
    pub assigned_to: Option<Uuid>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize, TS)]
#[serde(rename_all = "kebab-case")]
pub enum TicketSort {
    #[default]
    Newest,
    Oldest,
    PriorityHigh,
    PriorityLow,
    DueDate,
}

#[derive(Debug, Serialize, TS)]
pub struct StatusBreakdown {
    #[serde(rename = "to-do")]
    pub to_do: usize,
    #[serde(rename = "in-progress")]
    pub in_progress: usize,
    pub done: usize,
}

#[derive(Debug, Serialize, TS)]
pub struct PriorityBreakdown {
    pub low: usize,
    pub medium: usize,
    pub high: usize,
}

#[derive(Debug, Serialize, TS)]
pub struct TicketStats {
    pub total: usize,
    pub by_status: StatusBreakdown,
    pub by_priority: PriorityBreakdown,
    pub assigned: usize,
    pub unassigned: usize,
}

impl Ticket {
    async fn from_model<C: ConnectionTrait>(db: &C, model: ticket::Model) -> Result<Self, DbErr> {
        let project_id = ids::project_uuid_by_id(db, model.project_id)
            .await?
            .ok_or(DbErr::RecordNotFound("Project not found".to_string()))?;
        let created_by_id = ids::user_uuid_by_id(db, model.created_by_id)
            .await?
            .ok_or(DbErr::RecordNotFound("User not found".to_string()))?;
        let assigned_to_id = match model.assigned_to_id {
            Some(row_id) => ids::user_uuid_by_id(db, row_id)
                .await?
                .ok_or(DbErr::RecordNotFound("User not found".to_string()))
                .map(Some)?,
            None => None,
        };

        Ok(Self {
            id: model.uuid,
            project_id,
            title: model.title,
            description: model.description,
            priority: model.priority,
            status: model.status,
            kind: model.kind,
            created_by_id,
            assigned_to_id,
            due_date: model.due_date.map(Into::into),
            created_at: model.created_at.into(),
            updated_at: model.updated_at.into(),
        })
    }

    async fn from_models<C: ConnectionTrait>(
        db: &C,
        models: Vec<ticket::Model>,
    ) -> Result<Vec<Self>, DbErr> {
        let mut tickets = Vec::with_capacity(models.len());
        for model in models {
            tickets.push(Self::from_model(db, model).await?);
        }
        Ok(tickets)
    }

    pub async fn create<C: ConnectionTrait>(
        db: &C,
        data: &CreateTicket,
        created_by_id: Uuid,
        ticket_id: Uuid,
    ) -> Result<Self, DbErr> {
        let project_row_id = ids::project_id_by_uuid(db, data.project_id)
            .await?
            .ok_or(DbErr::RecordNotFound("Project not found".to_string()))?;
        let creator_row_id = ids::user_id_by_uuid(db, created_by_id)
            .await?
            .ok_or(DbErr::RecordNotFound("User not found".to_string()))?;
        let assignee_row_id = match data.assigned_to_id {
            Some(user_id) => ids::user_id_by_uuid(db, user_id)
                .await?
                .ok_or(DbErr::RecordNotFound("User not found".to_string()))
                .map(Some)?,
            None => None,
        };

        let now = Utc::now();
        let active = ticket::ActiveModel {
            uuid: Set(ticket_id),
            project_id: Set(project_row_id),
            title: Set(data.title.clone()),
            description: Set(data.description.clone()),
            priority: Set(data.priority.unwrap_or_default()),
            status: Set(data.status.unwrap_or_default()),
            kind: Set(data.kind.unwrap_or_default()),
            created_by_id: Set(creator_row_id),
            assigned_to_id: Set(assignee_row_id),
            due_date: Set(data.due_date.map(Into::into)),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
            ..Default::default()
        };
        let model = active.insert(db).await?;
        Self::from_model(db, model).await
    }

    pub async fn find_by_id<C: ConnectionTrait>(db: &C, id: Uuid) -> Result<Option<Self>, DbErr> {
        let record = ticket::Entity::find()
            .filter(ticket::Column::Uuid.eq(id))
            .one(db)
            .await?;
        match record {
            Some(model) => Ok(Some(Self::from_model(db, model).await?)),
            None => Ok(None),
        }
    }

    pub async fn find_by_project<C: ConnectionTrait>(
        db: &C,
        project_id: Uuid,
        filters: &TicketFilters,
        sort: TicketSort,
    ) -> Result<Vec<Self>, DbErr> {
        let Some(project_row_id) = ids::project_id_by_uuid(db, project_id).await? else {
            return Ok(Vec::new());
        };

        let mut query = ticket::Entity::find()
            .filter(ticket::Column::ProjectId.eq(project_row_id));
        if let Some(status) = filters.status {
            query = query.filter(ticket::Column::Status.eq(status));
        }
        if let Some(priority) = filters.priority {
            query = query.filter(ticket::Column::Priority.eq(priority));
        }
        if let Some(assigned_to) = filters.assigned_to {
            let assignee_row_id = ids::user_id_by_uuid(db, assigned_to).await?;
            let Some(assignee_row_id) = assignee_row_id else {
                return Ok(Vec::new());
            };
            query = query.filter(ticket::Column::AssignedToId.eq(assignee_row_id));
        }

        query = match sort {
            TicketSort::Oldest => query.order_by_asc(ticket::Column::CreatedAt),
            TicketSort::DueDate => query.order_by_asc(ticket::Column::DueDate),
            // Priority is a string column; rank ordering happens below.
            _ => query.order_by_desc(ticket::Column::CreatedAt),
        };

        let mut tickets = Self::from_models(db, query.all(db).await?).await?;
        match sort {
            TicketSort::PriorityHigh => {
                tickets.sort_by_key(|t| std::cmp::Reverse(t.priority.rank()));
            }
            TicketSort::PriorityLow => {
                tickets.sort_by_key(|t| t.priority.rank());
            }
            _ => {}
        }
        Ok(tickets)
    }

    pub async fn find_assigned_to<C: ConnectionTrait>(
        db: &C,
        user_id: Uuid,
    ) -> Result<Vec<Self>, DbErr> {
        let Some(user_row_id) = ids::user_id_by_uuid(db, user_id).await? else {
            return Ok(Vec::new());
        };
        let records = ticket::Entity::find()
            .filter(ticket::Column::AssignedToId.eq(user_row_id))
            .order_by_desc(ticket::Column::CreatedAt)
            .all(db)
            .await?;
        Self::from_models(db, records).await
    }

    pub async fn find_created_by<C: ConnectionTrait>(
        db: &C,
        user_id: Uuid,
    ) -> Result<Vec<Self>, DbErr> {
        let Some(user_row_id) = ids::user_id_by_uuid(db, user_id).await? else {
            return Ok(Vec::new());
        };
        let records = ticket::Entity::find()
            .filter(ticket::Column::CreatedById.eq(user_row_id))
            .order_by_desc(ticket::Column::CreatedAt)
            .all(db)
            .await?;
        Self::from_models(db, records).await
    }

    /// Full replacement of the mutable fields; callers merge the existing
    /// ticket with the update payload first.
    #[allow(clippy::too_many_arguments)]
    pub async fn update<C: ConnectionTrait>(
        db: &C,
        id: Uuid,
        title: String,
        description: String,
        priority: TicketPriority,
        status: TicketStatus,
        kind: TicketKind,
        assigned_to_id: Option<Uuid>,
        due_date: Option<DateTime<Utc>>,
    ) -> Result<Self, DbErr> {
        let record = ticket::Entity::find()
            .filter(ticket::Column::Uuid.eq(id))
            .one(db)
            .await?
            .ok_or(DbErr::RecordNotFound("Ticket not found".to_string()))?;

        let assignee_row_id = match assigned_to_id {
            Some(user_id) => ids::user_id_by_uuid(db, user_id)
                .await?
                .ok_or(DbErr::RecordNotFound("User not found".to_string()))
                .map(Some)?,
            None => None,
        };

        let mut active: ticket::ActiveModel = record.into();
        active.title = Set(title);
        active.description = Set(description);
        active.priority = Set(priority);
        active.status = Set(status);
        active.kind = Set(kind);
        active.assigned_to_id = Set(assignee_row_id);
        active.due_date = Set(due_date.map(Into::into));
        active.updated_at = Set(Utc::now().into());

        let updated = active.update(db).await?;
        Self::from_model(db, updated).await
    }

    /// Delete the ticket and its attachment records (embedded lifetime).
    /// Comments referencing the ticket are left in place.
    pub async fn delete<C: ConnectionTrait>(db: &C, id: Uuid) -> Result<u64, DbErr> {
        let Some(ticket_row_id) = ids::ticket_id_by_uuid(db, id).await? else {
            return Ok(0);
        };

        attachment::Entity::delete_many()
            .filter(attachment::Column::TicketId.eq(ticket_row_id))
            .exec(db)
            .await?;

        let result = ticket::Entity::delete_many()
            .filter(ticket::Column::Uuid.eq(id))
            .exec(db)
            .await?;
        Ok(result.rows_affected)
    }

    pub async fn stats<C: ConnectionTrait>(
        db: &C,
        project_id: Uuid,
    ) -> Result<TicketStats, DbErr> {
        let tickets =
            Self::find_by_project(db, project_id, &TicketFilters::default(), TicketSort::Newest)
                .await?;

        let count_status =
            |status: TicketStatus| tickets.iter().filter(|t| t.status == status).count();
        let count_priority =
            |priority: TicketPriority| tickets.iter().filter(|t| t.priority == priority).count();
        let assigned = tickets.iter().filter(|t| t.assigned_to_id.is_some()).count();

        Ok(TicketStats {
            total: tickets.len(),
            by_status: StatusBreakdown {
                to_do: count_status(TicketStatus::ToDo),
                in_progress: count_status(TicketStatus::InProgress),
                done: count_status(TicketStatus::Done),
            },
            by_priority: PriorityBreakdown {
                low: count_priority(TicketPriority::Low),
                medium: count_priority(TicketPriority::Medium),
                high: count_priority(TicketPriority::High),
            },
            assigned,
            unassigned: tickets.len() - assigned,
        })
    }
}
