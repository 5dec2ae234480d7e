use super::Owned;
use crate::domain::value_objects::{EntityId, GeoPoint, UserId};
use crate::shared::error::AppError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HangoutSpot {
    pub id: EntityId,
    pub owner_id: UserId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub spot_type: String,
    pub location: GeoPoint,
    pub capacity: u32,
    /// サーバー側で管理される在室人数
    #[serde(default)]
    pub current_occupancy: u32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl HangoutSpot {
    pub fn has_capacity(&self) -> bool {
        self.current_occupancy < self.capacity
    }

    pub fn remaining_capacity(&self) -> u32 {
        self.capacity.saturating_sub(self.current_occupancy)
    }

    pub fn matches_search(&self, needle: &str) -> bool {
        self.name.to_lowercase().contains(needle)
            || self.description.to_lowercase().contains(needle)
    }
}

impl Owned for HangoutSpot {
    fn owner_id(&self) -> &UserId {
        &self.owner_id
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpotDraft {
    pub name: String,
    pub description: String,
    pub spot_type: String,
    pub location: GeoPoint,
    pub capacity: u32,
}

impl SpotDraft {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.name.trim().is_empty() {
            return Err(AppError::ValidationError("Spot name is required".to_string()));
        }
        if self.spot_type.trim().is_empty() {
            return Err(AppError::ValidationError("Spot type is required".to_string()));
        }
        if self.capacity == 0 {
            return Err(AppError::ValidationError(
                "Spot capacity must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpotPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub spot_type: Option<String>,
    pub capacity: Option<u32>,
    pub is_active: Option<bool>,
}

impl SpotPatch {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.name.is_none()
            && self.description.is_none()
            && self.spot_type.is_none()
            && self.capacity.is_none()
            && self.is_active.is_none()
        {
            return Err(AppError::ValidationError("Spot patch is empty".to_string()));
        }
        if matches!(self.capacity, Some(0)) {
            return Err(AppError::ValidationError(
                "Spot capacity must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    pub fn apply_to(&self, spot: &mut HangoutSpot) {
        if let Some(name) = &self.name {
            spot.name = name.clone();
        }
        if let Some(description) = &self.description {
            spot.description = description.clone();
        }
        if let Some(spot_type) = &self.spot_type {
            spot.spot_type = spot_type.clone();
        }
        if let Some(capacity) = self.capacity {
            spot.capacity = capacity;
        }
        if let Some(is_active) = self.is_active {
            spot.is_active = is_active;
        }
    }
}
