pub mod hangout_checkin;
pub mod hangout_spot;
pub mod note;
pub mod note_comment;

pub use hangout_checkin::HangoutCheckin;
pub use hangout_spot::{HangoutSpot, SpotDraft, SpotPatch};
pub use note::{Note, NoteDraft, NotePatch};
pub use note_comment::{NoteComment, normalize_comment_content};

use crate::domain::realtime::ResourceKind;
use crate::domain::value_objects::{EntityId, UserId};
use crate::shared::error::AppError;
use serde::Serialize;
use serde::de::DeserializeOwned;

/// 購読・突き合わせの対象になるレコード
pub trait Entity: Clone + Send + Sync + Serialize + DeserializeOwned + 'static {
    const RESOURCE: ResourceKind;

    fn id(&self) -> &EntityId;

    fn from_record(record: Record) -> Result<Self, AppError>;

    fn into_record(self) -> Record;
}

/// 所有者を持つレコード。更新・削除の事前認可に使う
pub trait Owned {
    fn owner_id(&self) -> &UserId;
}

/// クエリサービスが返すレコードの直和型
#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    Note(Note),
    Comment(NoteComment),
    Spot(HangoutSpot),
    Checkin(HangoutCheckin),
}

impl Record {
    pub fn resource(&self) -> ResourceKind {
        match self {
            Record::Note(_) => ResourceKind::Notes,
            Record::Comment(_) => ResourceKind::NoteComments,
            Record::Spot(_) => ResourceKind::HangoutSpots,
            Record::Checkin(_) => ResourceKind::HangoutCheckins,
        }
    }

    pub fn id(&self) -> &EntityId {
        match self {
            Record::Note(note) => &note.id,
            Record::Comment(comment) => &comment.id,
            Record::Spot(spot) => &spot.id,
            Record::Checkin(checkin) => &checkin.id,
        }
    }

    pub fn to_json(&self) -> Result<serde_json::Value, AppError> {
        let value = match self {
            Record::Note(note) => serde_json::to_value(note)?,
            Record::Comment(comment) => serde_json::to_value(comment)?,
            Record::Spot(spot) => serde_json::to_value(spot)?,
            Record::Checkin(checkin) => serde_json::to_value(checkin)?,
        };
        Ok(value)
    }
}

fn unexpected_record(expected: ResourceKind, record: &Record) -> AppError {
    AppError::DeserializationError(format!(
        "Expected {} record, got {}",
        expected,
        record.resource()
    ))
}

macro_rules! impl_entity {
    ($ty:ty, $variant:ident, $resource:expr) => {
        impl Entity for $ty {
            const RESOURCE: ResourceKind = $resource;

            fn id(&self) -> &EntityId {
                &self.id
            }

            fn from_record(record: Record) -> Result<Self, AppError> {
                match record {
                    Record::$variant(inner) => Ok(inner),
                    other => Err(unexpected_record(Self::RESOURCE, &other)),
                }
            }

            fn into_record(self) -> Record {
                Record::$variant(self)
            }
        }
    };
}

impl_entity!(Note, Note, ResourceKind::Notes);
impl_entity!(NoteComment, Comment, ResourceKind::NoteComments);
impl_entity!(HangoutSpot, Spot, ResourceKind::HangoutSpots);
impl_entity!(HangoutCheckin, Checkin, ResourceKind::HangoutCheckins);
