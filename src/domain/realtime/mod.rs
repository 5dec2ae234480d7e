pub mod change;
pub mod resource;

pub use change::{ChangeDecodeError, ChangeEvent, ChangeKind, ChangeMessage, EventPayload};
pub use resource::{ResourceFilter, ResourceKind, ResourceScope};
