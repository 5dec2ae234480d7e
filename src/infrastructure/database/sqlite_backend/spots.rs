use super::mapper::{map_checkin_row, map_spot_row};
use super::queries::*;
use super::{SqliteBackend, ensure_owner, not_found};
use crate::application::ports::query_service::SpotQuery;
use crate::domain::entities::{HangoutSpot, Record, SpotDraft, SpotPatch};
use crate::domain::realtime::{ChangeKind, ResourceKind};
use crate::domain::value_objects::{EntityId, UserId};
use crate::shared::error::AppError;
use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};

pub(super) async fn load_spot(
    conn: &mut SqliteConnection,
    id: &EntityId,
) -> Result<Option<HangoutSpot>, AppError> {
    let row = sqlx::query(SELECT_SPOT_BY_ID)
        .bind(id.as_str())
        .fetch_optional(&mut *conn)
        .await?;
    row.as_ref().map(map_spot_row).transpose()
}

pub(super) async fn require_spot(
    conn: &mut SqliteConnection,
    id: &EntityId,
) -> Result<HangoutSpot, AppError> {
    load_spot(conn, id)
        .await?
        .ok_or_else(|| not_found(ResourceKind::HangoutSpots, id))
}

impl SqliteBackend {
    pub(super) async fn list_spots(&self, query: &SpotQuery) -> Result<Vec<HangoutSpot>, AppError> {
        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(SELECT_SPOTS_BASE);
        builder.push(" WHERE 1 = 1");

        if let Some(owner_id) = &query.owner_id {
            builder.push(" AND s.owner_id = ");
            builder.push_bind(owner_id.as_str());
        }

        if query.active_only {
            builder.push(" AND s.is_active = 1");
        }

        if let Some(spot_type) = &query.spot_type {
            builder.push(" AND s.spot_type = ");
            builder.push_bind(spot_type.as_str());
        }

        builder.push(" ORDER BY s.created_at DESC, s.rowid DESC LIMIT ");
        builder.push_bind(i64::from(query.limit));

        let rows = builder.build().fetch_all(self.pool.get_pool()).await?;
        rows.iter().map(map_spot_row).collect()
    }

    pub(super) async fn create_spot(
        &self,
        actor: &UserId,
        draft: SpotDraft,
    ) -> Result<Record, AppError> {
        draft.validate()?;
        let id = EntityId::generate();

        let mut tx = self.pool.get_pool().begin().await?;
        sqlx::query(INSERT_SPOT)
            .bind(id.as_str())
            .bind(actor.as_str())
            .bind(draft.name.trim())
            .bind(&draft.description)
            .bind(draft.spot_type.trim())
            .bind(draft.location.latitude)
            .bind(draft.location.longitude)
            .bind(i64::from(draft.capacity))
            .bind(Utc::now().timestamp_millis())
            .execute(&mut *tx)
            .await?;
        let spot = require_spot(&mut tx, &id).await?;
        tx.commit().await?;

        let record = Record::Spot(spot);
        self.publish(ChangeKind::Insert, &record);
        Ok(record)
    }

    pub(super) async fn update_spot(
        &self,
        actor: &UserId,
        id: &EntityId,
        patch: SpotPatch,
    ) -> Result<Record, AppError> {
        patch.validate()?;

        let mut tx = self.pool.get_pool().begin().await?;
        let mut spot = require_spot(&mut tx, id).await?;
        ensure_owner(&spot.owner_id, actor, ResourceKind::HangoutSpots, id)?;
        patch.apply_to(&mut spot);

        sqlx::query(UPDATE_SPOT)
            .bind(id.as_str())
            .bind(spot.name.trim())
            .bind(&spot.description)
            .bind(spot.spot_type.trim())
            .bind(i64::from(spot.capacity))
            .bind(spot.is_active)
            .bind(Utc::now().timestamp_millis())
            .execute(&mut *tx)
            .await?;
        let spot = require_spot(&mut tx, id).await?;
        tx.commit().await?;

        let record = Record::Spot(spot);
        self.publish(ChangeKind::Update, &record);
        Ok(record)
    }

    /// チェックインはカスケード削除される。有効だったものは削除として通知する
    pub(super) async fn delete_spot(
        &self,
        actor: &UserId,
        id: &EntityId,
    ) -> Result<Record, AppError> {
        let mut tx = self.pool.get_pool().begin().await?;
        let spot = require_spot(&mut tx, id).await?;
        ensure_owner(&spot.owner_id, actor, ResourceKind::HangoutSpots, id)?;

        let checkins = sqlx::query(SELECT_ACTIVE_CHECKINS_BY_SPOT)
            .bind(id.as_str())
            .fetch_all(&mut *tx)
            .await?
            .iter()
            .map(map_checkin_row)
            .collect::<Result<Vec<_>, _>>()?;

        sqlx::query(DELETE_SPOT)
            .bind(id.as_str())
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        for checkin in checkins {
            self.publish(ChangeKind::Delete, &Record::Checkin(checkin));
        }
        let record = Record::Spot(spot);
        self.publish(ChangeKind::Delete, &record);
        Ok(record)
    }
}
