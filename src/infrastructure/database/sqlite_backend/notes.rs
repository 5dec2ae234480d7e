use super::mapper::{map_comment_row, map_note_row};
use super::queries::*;
use super::{SqliteBackend, ensure_owner, not_found};
use crate::application::ports::query_service::NoteQuery;
use crate::domain::entities::{Note, NoteDraft, NotePatch, Record};
use crate::domain::realtime::{ChangeKind, ResourceKind};
use crate::domain::value_objects::{EntityId, UserId};
use crate::shared::error::AppError;
use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};

pub(super) async fn load_note(
    conn: &mut SqliteConnection,
    id: &EntityId,
) -> Result<Option<Note>, AppError> {
    let row = sqlx::query(SELECT_NOTE_BY_ID)
        .bind(id.as_str())
        .fetch_optional(&mut *conn)
        .await?;
    row.as_ref().map(map_note_row).transpose()
}

pub(super) async fn require_note(
    conn: &mut SqliteConnection,
    id: &EntityId,
) -> Result<Note, AppError> {
    load_note(conn, id)
        .await?
        .ok_or_else(|| not_found(ResourceKind::Notes, id))
}

impl SqliteBackend {
    pub(super) async fn list_notes(&self, query: &NoteQuery) -> Result<Vec<Note>, AppError> {
        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(SELECT_NOTES_BASE);

        if let Some(liked_by) = &query.liked_by {
            builder.push(" INNER JOIN note_likes l ON l.note_id = n.id AND l.user_id = ");
            builder.push_bind(liked_by.as_str());
        }

        builder.push(" WHERE 1 = 1");

        if let Some(owner_id) = &query.owner_id {
            builder.push(" AND n.owner_id = ");
            builder.push_bind(owner_id.as_str());
        }

        if query.public_only {
            builder.push(" AND n.is_public = 1 AND n.is_approved = 1");
        }

        if let Some(subject) = &query.subject {
            builder.push(" AND n.subject = ");
            builder.push_bind(subject.as_str());
        }

        builder.push(" ORDER BY n.created_at DESC, n.rowid DESC LIMIT ");
        builder.push_bind(i64::from(query.limit));

        let rows = builder.build().fetch_all(self.pool.get_pool()).await?;
        rows.iter().map(map_note_row).collect()
    }

    pub(super) async fn create_note(
        &self,
        actor: &UserId,
        draft: NoteDraft,
    ) -> Result<Record, AppError> {
        draft.validate()?;
        let id = EntityId::generate();
        let tags = serde_json::to_string(&draft.tags)?;
        let now = Utc::now().timestamp_millis();

        let mut tx = self.pool.get_pool().begin().await?;
        sqlx::query(INSERT_NOTE)
            .bind(id.as_str())
            .bind(actor.as_str())
            .bind(draft.title.trim())
            .bind(&draft.content)
            .bind(draft.subject.as_deref())
            .bind(&tags)
            .bind(draft.is_public)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        let note = require_note(&mut tx, &id).await?;
        tx.commit().await?;

        let record = Record::Note(note);
        self.publish(ChangeKind::Insert, &record);
        Ok(record)
    }

    pub(super) async fn update_note(
        &self,
        actor: &UserId,
        id: &EntityId,
        patch: NotePatch,
    ) -> Result<Record, AppError> {
        patch.validate()?;

        let mut tx = self.pool.get_pool().begin().await?;
        let mut note = require_note(&mut tx, id).await?;
        ensure_owner(&note.owner_id, actor, ResourceKind::Notes, id)?;
        patch.apply_to(&mut note);

        sqlx::query(UPDATE_NOTE)
            .bind(id.as_str())
            .bind(note.title.trim())
            .bind(&note.content)
            .bind(note.subject.as_deref())
            .bind(serde_json::to_string(&note.tags)?)
            .bind(note.is_public)
            .bind(Utc::now().timestamp_millis())
            .execute(&mut *tx)
            .await?;
        let note = require_note(&mut tx, id).await?;
        tx.commit().await?;

        let record = Record::Note(note);
        self.publish(ChangeKind::Update, &record);
        Ok(record)
    }

    /// コメントといいねはカスケード削除される。購読側のためにコメント削除も通知する
    pub(super) async fn delete_note(
        &self,
        actor: &UserId,
        id: &EntityId,
    ) -> Result<Record, AppError> {
        let mut tx = self.pool.get_pool().begin().await?;
        let note = require_note(&mut tx, id).await?;
        ensure_owner(&note.owner_id, actor, ResourceKind::Notes, id)?;

        let comments = sqlx::query(SELECT_ALL_COMMENTS_BY_NOTE)
            .bind(id.as_str())
            .fetch_all(&mut *tx)
            .await?
            .iter()
            .map(map_comment_row)
            .collect::<Result<Vec<_>, _>>()?;

        sqlx::query(DELETE_NOTE)
            .bind(id.as_str())
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        for comment in comments {
            self.publish(ChangeKind::Delete, &Record::Comment(comment));
        }
        let record = Record::Note(note);
        self.publish(ChangeKind::Delete, &record);
        Ok(record)
    }

    /// いいねの追加・取り消し。件数は常にいいね表から再計算する
    pub(super) async fn set_note_like(
        &self,
        actor: &UserId,
        id: &EntityId,
        liked: bool,
    ) -> Result<Record, AppError> {
        let mut tx = self.pool.get_pool().begin().await?;
        require_note(&mut tx, id).await?;

        if liked {
            sqlx::query(INSERT_NOTE_LIKE)
                .bind(id.as_str())
                .bind(actor.as_str())
                .bind(Utc::now().timestamp_millis())
                .execute(&mut *tx)
                .await?;
        } else {
            sqlx::query(DELETE_NOTE_LIKE)
                .bind(id.as_str())
                .bind(actor.as_str())
                .execute(&mut *tx)
                .await?;
        }

        sqlx::query(REFRESH_NOTE_LIKE_COUNT)
            .bind(id.as_str())
            .execute(&mut *tx)
            .await?;
        let note = require_note(&mut tx, id).await?;
        tx.commit().await?;

        let record = Record::Note(note);
        self.publish(ChangeKind::Update, &record);
        Ok(record)
    }

    pub(super) async fn record_note_view(&self, id: &EntityId) -> Result<Record, AppError> {
        let mut tx = self.pool.get_pool().begin().await?;
        let result = sqlx::query(INCREMENT_NOTE_VIEW_COUNT)
            .bind(id.as_str())
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(not_found(ResourceKind::Notes, id));
        }
        let note = require_note(&mut tx, id).await?;
        tx.commit().await?;

        let record = Record::Note(note);
        self.publish(ChangeKind::Update, &record);
        Ok(record)
    }

    /// モデレーション用。承認状態を切り替えて更新を通知する
    pub async fn set_note_approval(&self, id: &EntityId, approved: bool) -> Result<Note, AppError> {
        let mut tx = self.pool.get_pool().begin().await?;
        let result = sqlx::query(UPDATE_NOTE_APPROVAL)
            .bind(id.as_str())
            .bind(approved)
            .bind(Utc::now().timestamp_millis())
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(not_found(ResourceKind::Notes, id));
        }
        let note = require_note(&mut tx, id).await?;
        tx.commit().await?;

        self.publish(ChangeKind::Update, &Record::Note(note.clone()));
        Ok(note)
    }
}
