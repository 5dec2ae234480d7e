use super::mapper::map_comment_row;
use super::notes::require_note;
use super::queries::*;
use super::{SqliteBackend, ensure_owner, not_found};
use crate::application::ports::query_service::CommentQuery;
use crate::domain::entities::{NoteComment, Record, normalize_comment_content};
use crate::domain::realtime::{ChangeKind, ResourceKind};
use crate::domain::value_objects::{EntityId, UserId};
use crate::shared::error::AppError;
use chrono::Utc;
use sqlx::SqliteConnection;

pub(super) async fn load_comment(
    conn: &mut SqliteConnection,
    id: &EntityId,
) -> Result<Option<NoteComment>, AppError> {
    let row = sqlx::query(SELECT_COMMENT_BY_ID)
        .bind(id.as_str())
        .fetch_optional(&mut *conn)
        .await?;
    row.as_ref().map(map_comment_row).transpose()
}

async fn require_comment(
    conn: &mut SqliteConnection,
    id: &EntityId,
) -> Result<NoteComment, AppError> {
    load_comment(conn, id)
        .await?
        .ok_or_else(|| not_found(ResourceKind::NoteComments, id))
}

impl SqliteBackend {
    pub(super) async fn list_comments(
        &self,
        query: &CommentQuery,
    ) -> Result<Vec<NoteComment>, AppError> {
        let rows = sqlx::query(SELECT_COMMENTS_BY_NOTE)
            .bind(query.note_id.as_str())
            .bind(i64::from(query.limit))
            .fetch_all(self.pool.get_pool())
            .await?;
        rows.iter().map(map_comment_row).collect()
    }

    pub(super) async fn create_comment(
        &self,
        actor: &UserId,
        note_id: &EntityId,
        content: &str,
    ) -> Result<Record, AppError> {
        let content = normalize_comment_content(content)?;
        let id = EntityId::generate();

        let mut tx = self.pool.get_pool().begin().await?;
        require_note(&mut tx, note_id).await?;
        sqlx::query(INSERT_COMMENT)
            .bind(id.as_str())
            .bind(note_id.as_str())
            .bind(actor.as_str())
            .bind(content)
            .bind(Utc::now().timestamp_millis())
            .execute(&mut *tx)
            .await?;
        let comment = require_comment(&mut tx, &id).await?;
        tx.commit().await?;

        let record = Record::Comment(comment);
        self.publish(ChangeKind::Insert, &record);
        Ok(record)
    }

    pub(super) async fn delete_comment(
        &self,
        actor: &UserId,
        id: &EntityId,
    ) -> Result<Record, AppError> {
        let mut tx = self.pool.get_pool().begin().await?;
        let comment = require_comment(&mut tx, id).await?;
        ensure_owner(&comment.owner_id, actor, ResourceKind::NoteComments, id)?;
        sqlx::query(DELETE_COMMENT)
            .bind(id.as_str())
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        let record = Record::Comment(comment);
        self.publish(ChangeKind::Delete, &record);
        Ok(record)
    }
}
