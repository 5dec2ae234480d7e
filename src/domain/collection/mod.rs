pub mod entity_store;
pub mod liked_set;
pub mod state;

pub use entity_store::{EntityStore, UpsertOutcome};
pub use liked_set::LikedSet;
pub use state::{CollectionState, PendingChange, SharedCollection, shared_collection};
