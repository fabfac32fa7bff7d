use chrono::Utc;
use sea_orm::{
    ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QueryOrder, QuerySelect, Set,
};
use uuid::Uuid;

use crate::{
    entities::project_member,
    models::{ids, user::User},
};

/// Membership rows linking users to projects. The project admin always has
/// a row here; it is inserted at project creation and never removed.
pub struct ProjectMember;

impl ProjectMember {
    pub async fn add<C: ConnectionTrait>(
        db: &C,
        project_id: Uuid,
        user_id: Uuid,
    ) -> Result<(), DbErr> {
        let project_row_id = ids::project_id_by_uuid(db, project_id)
            .await?
            .ok_or(DbErr::RecordNotFound("Project not found".to_string()))?;
        let user_row_id = ids::user_id_by_uuid(db, user_id)
            .await?
            .ok_or(DbErr::RecordNotFound("User not found".to_string()))?;

        let active = project_member::ActiveModel {
            uuid: Set(Uuid::new_v4()),
            project_id: Set(project_row_id),
            user_id: Set(user_row_id),
            created_at: Set(Utc::now().into()),
            ..Default::default()
        };
        let result = project_member::Entity::insert(active)
            .on_conflict(
                sea_orm::sea_query::OnConflict::columns([
                    project_member::Column::ProjectId,
                    project_member::Column::UserId,
                ])
                .do_nothing()
                .to_owned(),
            )
            .exec(db)
            .await;
        match result {
            Ok(_) => Ok(()),
            // Adding an existing member is a no-op, not a failure.
            Err(DbErr::RecordNotInserted) => Ok(()),
            Err(err) => Err(err),
        }
    }

    pub async fn remove<C: ConnectionTrait>(
        db: &C,
        project_id: Uuid,
        user_id: Uuid,
    ) -> Result<u64, DbErr> {
        let Some(project_row_id) = ids::project_id_by_uuid(db, project_id).await? else {
            return Ok(0);
        };
        let Some(user_row_id) = ids::user_id_by_uuid(db, user_id).await? else {
            return Ok(0);
        };

        let result = project_member::Entity::delete_many()
            .filter(project_member::Column::ProjectId.eq(project_row_id))
            .filter(project_member::Column::UserId.eq(user_row_id))
            .exec(db)
            .await?;
        Ok(result.rows_affected)
    }

    pub async fn is_member<C: ConnectionTrait>(
        db: &C,
        project_id: Uuid,
        user_id: Uuid,
    ) -> Result<bool, DbErr> {
        Ok(Self::member_uuids(db, project_id).await?.contains(&user_id))
    }

    /// Member user ids in join order.
    pub async fn member_uuids<C: ConnectionTrait>(
        db: &C,
        project_id: Uuid,
    ) -> Result<Vec<Uuid>, DbErr> {
        let Some(project_row_id) = ids::project_id_by_uuid(db, project_id).await? else {
            return Ok(Vec::new());
        };

        let user_row_ids: Vec<i64> = project_member::Entity::find()
            .select_only()
            .column(project_member::Column::UserId)
            .filter(project_member::Column::ProjectId.eq(project_row_id))
            .order_by_asc(project_member::Column::CreatedAt)
            .into_tuple()
            .all(db)
            .await?;

        let mut uuids = Vec::with_capacity(user_row_ids.len());
        for row_id in user_row_ids {
            if let Some(uuid) = ids::user_uuid_by_id(db, row_id).await? {
                uuids.push(uuid);
            }
        }
        Ok(uuids)
    }

    pub async fn member_users<C: ConnectionTrait>(
        db: &C,
        project_id: Uuid,
    ) -> Result<Vec<User>, DbErr> {
        let uuids = Self::member_uuids(db, project_id).await?;
        let mut users = User::find_by_ids(db, &uuids).await?;
        // find_by_ids gives no ordering guarantee; restore join order.
        users.sort_by_key(|user| uuids.iter().position(|id| *id == user.id));
        Ok(users)
    }

    /// Row ids of every project the user belongs to.
    pub(crate) async fn project_row_ids_for_user<C: ConnectionTrait>(
        db: &C,
        user_row_id: i64,
    ) -> Result<Vec<i64>, DbErr> {
        project_member::Entity::find()
            .select_only()
            .column(project_member::Column::ProjectId)
            .filter(project_member::Column::UserId.eq(user_row_id))
            .into_tuple()
            .all(db)
            .await
    }

    pub(crate) async fn delete_by_project_row_id<C: ConnectionTrait>(
        db: &C,
        project_row_id: i64,
    ) -> Result<u64, DbErr> {
        let result = project_member::Entity::delete_many()
            .filter(project_member::Column::ProjectId.eq(project_row_id))
            .exec(db)
            .await?;
        Ok(result.rows_affected)
    }
}
