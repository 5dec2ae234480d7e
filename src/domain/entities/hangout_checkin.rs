use super::Owned;
use crate::domain::value_objects::{EntityId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HangoutCheckin {
    pub id: EntityId,
    pub spot_id: EntityId,
    pub user_id: UserId,
    #[serde(default)]
    pub user_name: Option<String>,
    pub checked_in_at: DateTime<Utc>,
    #[serde(default)]
    pub checked_out_at: Option<DateTime<Utc>>,
    pub is_active: bool,
}

impl Owned for HangoutCheckin {
    fn owner_id(&self) -> &UserId {
        &self.user_id
    }
}
