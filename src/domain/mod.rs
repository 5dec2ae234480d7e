pub mod checkin_state;
pub mod collection;
pub mod entities;
pub mod realtime;
pub mod value_objects;
pub mod view;

pub use checkin_state::CheckinState;
pub use collection::{CollectionState, EntityStore, LikedSet, SharedCollection};
pub use entities::{Entity, HangoutCheckin, HangoutSpot, Note, NoteComment, Owned, Record};
pub use realtime::{ChangeEvent, ChangeKind, ChangeMessage, EventPayload, ResourceFilter, ResourceKind};
pub use value_objects::{EntityId, GeoPoint, UserId};
