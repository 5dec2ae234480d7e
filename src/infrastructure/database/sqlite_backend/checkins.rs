use super::mapper::map_checkin_row;
use super::queries::*;
use super::spots::{load_spot, require_spot};
use super::{SqliteBackend, ensure_owner, not_found};
use crate::application::ports::query_service::CheckinQuery;
use crate::domain::entities::{HangoutCheckin, Record};
use crate::domain::realtime::{ChangeKind, ResourceKind};
use crate::domain::value_objects::{EntityId, UserId};
use crate::shared::error::AppError;
use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};

pub(super) async fn load_checkin(
    conn: &mut SqliteConnection,
    id: &EntityId,
) -> Result<Option<HangoutCheckin>, AppError> {
    let row = sqlx::query(SELECT_CHECKIN_BY_ID)
        .bind(id.as_str())
        .fetch_optional(&mut *conn)
        .await?;
    row.as_ref().map(map_checkin_row).transpose()
}

async fn require_checkin(
    conn: &mut SqliteConnection,
    id: &EntityId,
) -> Result<HangoutCheckin, AppError> {
    load_checkin(conn, id)
        .await?
        .ok_or_else(|| not_found(ResourceKind::HangoutCheckins, id))
}

async fn active_checkin_of(
    conn: &mut SqliteConnection,
    user: &UserId,
) -> Result<Option<HangoutCheckin>, AppError> {
    let row = sqlx::query(SELECT_ACTIVE_CHECKIN_BY_USER)
        .bind(user.as_str())
        .fetch_optional(&mut *conn)
        .await?;
    row.as_ref().map(map_checkin_row).transpose()
}

impl SqliteBackend {
    pub(super) async fn list_checkins(
        &self,
        query: &CheckinQuery,
    ) -> Result<Vec<HangoutCheckin>, AppError> {
        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(SELECT_CHECKINS_BASE);
        builder.push(" WHERE 1 = 1");

        if let Some(spot_id) = &query.spot_id {
            builder.push(" AND c.spot_id = ");
            builder.push_bind(spot_id.as_str());
        }

        if let Some(user_id) = &query.user_id {
            builder.push(" AND c.user_id = ");
            builder.push_bind(user_id.as_str());
        }

        if query.active_only {
            builder.push(" AND c.is_active = 1");
        }

        builder.push(" ORDER BY c.checked_in_at DESC, c.rowid DESC LIMIT ");
        builder.push_bind(i64::from(query.limit));

        let rows = builder.build().fetch_all(self.pool.get_pool()).await?;
        rows.iter().map(map_checkin_row).collect()
    }

    /// チェックインの調停。
    ///
    /// ユーザーごとの有効チェックインは 1 件、スポットの有効チェックイン数は定員以下。
    /// どちらも同一トランザクション内で判定し、先にコミットした側が勝つ。
    pub(super) async fn check_in(
        &self,
        actor: &UserId,
        spot_id: &EntityId,
    ) -> Result<Record, AppError> {
        let mut tx = self.pool.get_pool().begin().await?;

        if let Some(existing) = active_checkin_of(&mut tx, actor).await? {
            return Err(AppError::AlreadyCheckedIn(existing.spot_id.to_string()));
        }

        let spot = require_spot(&mut tx, spot_id).await?;
        if !spot.is_active {
            return Err(AppError::ValidationError(format!(
                "Spot {spot_id} is not accepting check-ins"
            )));
        }
        if !spot.has_capacity() {
            return Err(AppError::CapacityExceeded {
                spot_id: spot_id.to_string(),
                capacity: spot.capacity,
            });
        }

        let id = EntityId::generate();
        let inserted = sqlx::query(INSERT_CHECKIN)
            .bind(id.as_str())
            .bind(spot_id.as_str())
            .bind(actor.as_str())
            .bind(Utc::now().timestamp_millis())
            .execute(&mut *tx)
            .await;
        if let Err(sqlx::Error::Database(db_err)) = &inserted {
            if db_err.is_unique_violation() {
                return Err(AppError::AlreadyCheckedIn(spot_id.to_string()));
            }
        }
        inserted?;

        let checkin = require_checkin(&mut tx, &id).await?;
        let spot = require_spot(&mut tx, spot_id).await?;
        tx.commit().await?;

        let record = Record::Checkin(checkin);
        self.publish(ChangeKind::Insert, &record);
        self.publish(ChangeKind::Update, &Record::Spot(spot));
        Ok(record)
    }

    pub(super) async fn check_out(
        &self,
        actor: &UserId,
        checkin_id: &EntityId,
    ) -> Result<Record, AppError> {
        let mut tx = self.pool.get_pool().begin().await?;
        let checkin = require_checkin(&mut tx, checkin_id).await?;
        ensure_owner(
            &checkin.user_id,
            actor,
            ResourceKind::HangoutCheckins,
            checkin_id,
        )?;

        let result = sqlx::query(CLOSE_CHECKIN)
            .bind(checkin_id.as_str())
            .bind(Utc::now().timestamp_millis())
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotCheckedIn);
        }

        let checkin = require_checkin(&mut tx, checkin_id).await?;
        let spot = load_spot(&mut tx, &checkin.spot_id).await?;
        tx.commit().await?;

        let record = Record::Checkin(checkin);
        self.publish(ChangeKind::Update, &record);
        if let Some(spot) = spot {
            self.publish(ChangeKind::Update, &Record::Spot(spot));
        }
        Ok(record)
    }
}
