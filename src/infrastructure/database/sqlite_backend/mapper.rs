use crate::domain::entities::{HangoutCheckin, HangoutSpot, Note, NoteComment};
use crate::domain::value_objects::{EntityId, GeoPoint, UserId};
use crate::shared::error::AppError;
use chrono::{DateTime, Utc};
use sqlx::{Row, sqlite::SqliteRow};

pub(super) fn map_note_row(row: &SqliteRow) -> Result<Note, AppError> {
    let tags_json: String = row.try_get("tags").unwrap_or_default();

    Ok(Note {
        id: entity_id(row.try_get("id")?)?,
        owner_id: user_id(row.try_get("owner_id")?)?,
        title: row.try_get("title")?,
        content: row.try_get("content")?,
        subject: row.try_get("subject")?,
        tags: serde_json::from_str(&tags_json).unwrap_or_default(),
        is_public: flag(row.try_get("is_public")?),
        is_approved: flag(row.try_get("is_approved")?),
        like_count: count(row.try_get("like_count")?),
        view_count: count(row.try_get("view_count")?),
        author_name: row.try_get("author_name")?,
        created_at: timestamp(row.try_get("created_at")?),
        updated_at: timestamp(row.try_get("updated_at")?),
    })
}

pub(super) fn map_comment_row(row: &SqliteRow) -> Result<NoteComment, AppError> {
    Ok(NoteComment {
        id: entity_id(row.try_get("id")?)?,
        note_id: entity_id(row.try_get("note_id")?)?,
        owner_id: user_id(row.try_get("owner_id")?)?,
        content: row.try_get("content")?,
        author_name: row.try_get("author_name")?,
        created_at: timestamp(row.try_get("created_at")?),
    })
}

pub(super) fn map_spot_row(row: &SqliteRow) -> Result<HangoutSpot, AppError> {
    let location = GeoPoint::new(row.try_get("latitude")?, row.try_get("longitude")?)
        .map_err(AppError::DeserializationError)?;

    Ok(HangoutSpot {
        id: entity_id(row.try_get("id")?)?,
        owner_id: user_id(row.try_get("owner_id")?)?,
        name: row.try_get("name")?,
        description: row.try_get("description").unwrap_or_default(),
        spot_type: row.try_get("spot_type")?,
        location,
        capacity: count(row.try_get("capacity")?),
        current_occupancy: count(row.try_get("current_occupancy")?),
        is_active: flag(row.try_get("is_active")?),
        created_at: timestamp(row.try_get("created_at")?),
        updated_at: timestamp(row.try_get("updated_at")?),
    })
}

pub(super) fn map_checkin_row(row: &SqliteRow) -> Result<HangoutCheckin, AppError> {
    let checked_out_at: Option<i64> = row.try_get("checked_out_at")?;

    Ok(HangoutCheckin {
        id: entity_id(row.try_get("id")?)?,
        spot_id: entity_id(row.try_get("spot_id")?)?,
        user_id: user_id(row.try_get("user_id")?)?,
        user_name: row.try_get("user_name")?,
        checked_in_at: timestamp(row.try_get("checked_in_at")?),
        checked_out_at: checked_out_at.map(timestamp),
        is_active: flag(row.try_get("is_active")?),
    })
}

fn entity_id(value: String) -> Result<EntityId, AppError> {
    EntityId::new(value).map_err(AppError::DeserializationError)
}

fn user_id(value: String) -> Result<UserId, AppError> {
    UserId::new(value).map_err(AppError::DeserializationError)
}

fn flag(value: i64) -> bool {
    value != 0
}

fn count(value: i64) -> u32 {
    u32::try_from(value.max(0)).unwrap_or(u32::MAX)
}

fn timestamp(millis: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(millis).unwrap_or_else(Utc::now)
}
