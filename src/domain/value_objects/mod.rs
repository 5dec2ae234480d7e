pub mod entity_id;
pub mod geo_point;
pub mod user_id;

pub use entity_id::EntityId;
pub use geo_point::GeoPoint;
pub use user_id::UserId;
