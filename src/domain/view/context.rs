use crate::domain::value_objects::{EntityId, GeoPoint, UserId};
use serde::{Deserialize, Serialize};

/// ビューの表示条件。ユーザーの明示的な操作でのみ変化する
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewContext<M, F> {
    pub mode: M,
    pub filters: F,
    pub current_user: Option<UserId>,
}

impl<M, F: Default> ViewContext<M, F> {
    pub fn new(mode: M, current_user: Option<UserId>) -> Self {
        Self {
            mode,
            filters: F::default(),
            current_user,
        }
    }
}

impl<M, F> ViewContext<M, F> {
    pub fn with_filters(mut self, filters: F) -> Self {
        self.filters = filters;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoteViewMode {
    #[default]
    Community,
    Mine,
    Favorites,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteFilters {
    pub subject: Option<String>,
    pub search: Option<String>,
}

impl NoteFilters {
    pub fn normalized_subject(&self) -> Option<&str> {
        self.subject
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }

    pub fn normalized_search(&self) -> Option<String> {
        normalize_search(self.search.as_deref())
    }
}

pub type NoteViewContext = ViewContext<NoteViewMode, NoteFilters>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpotViewMode {
    #[default]
    All,
    Mine,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoRadius {
    pub center: GeoPoint,
    pub radius_km: f64,
}

impl GeoRadius {
    pub fn contains(&self, point: &GeoPoint) -> bool {
        self.center.distance_km(point) <= self.radius_km
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpotFilters {
    pub spot_type: Option<String>,
    pub search: Option<String>,
    pub near: Option<GeoRadius>,
    pub min_capacity: Option<u32>,
    /// 空きのあるスポットのみ
    pub only_available: bool,
}

impl SpotFilters {
    pub fn normalized_spot_type(&self) -> Option<&str> {
        self.spot_type
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }

    pub fn normalized_search(&self) -> Option<String> {
        normalize_search(self.search.as_deref())
    }
}

pub type SpotViewContext = ViewContext<SpotViewMode, SpotFilters>;

/// 特定スポットの在室一覧
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckinViewContext {
    pub spot_id: EntityId,
}

/// 特定ノートのコメント一覧
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentViewContext {
    pub note_id: EntityId,
}

fn normalize_search(search: Option<&str>) -> Option<String> {
    search
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_lowercase)
}
