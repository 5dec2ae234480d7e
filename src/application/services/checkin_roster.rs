use super::live_collection::{LiveCollection, ViewSource};
use crate::application::ports::query_service::{CheckinQuery, ListQuery, QueryService};
use crate::application::ports::subscription_channel::SubscriptionChannel;
use crate::domain::entities::HangoutCheckin;
use crate::domain::realtime::{ResourceFilter, ResourceKind};
use crate::domain::value_objects::EntityId;
use crate::domain::view::{CheckinViewContext, CheckinVisibility};
use crate::shared::error::AppError;
use std::sync::Arc;

impl ViewSource<HangoutCheckin> for CheckinVisibility {
    fn list_query(&self, context: &CheckinViewContext, limit: u32) -> Option<ListQuery> {
        Some(ListQuery::Checkins(CheckinQuery {
            spot_id: Some(context.spot_id.clone()),
            user_id: None,
            active_only: true,
            limit,
        }))
    }

    fn subscription_filter(&self, context: &CheckinViewContext) -> ResourceFilter {
        ResourceFilter::scoped(
            ResourceKind::HangoutCheckins,
            "spot_id",
            context.spot_id.as_str(),
        )
    }
}

/// スポットに今いる人の一覧。
///
/// チェックアウトは `is_active = false` の UPDATE として届き、述語によって一覧から外れる。
#[derive(Clone)]
pub struct CheckinRoster {
    collection: LiveCollection<HangoutCheckin, CheckinVisibility>,
}

impl CheckinRoster {
    pub fn new(
        query: Arc<dyn QueryService>,
        channel: Arc<dyn SubscriptionChannel>,
        spot_id: EntityId,
        list_limit: u32,
    ) -> Self {
        Self {
            collection: LiveCollection::new(
                CheckinVisibility,
                CheckinViewContext { spot_id },
                query,
                channel,
                list_limit,
            ),
        }
    }

    pub fn spot_id(&self) -> EntityId {
        self.collection.context().spot_id
    }

    pub async fn open(&self) -> Result<(), AppError> {
        self.collection.open().await
    }

    pub async fn close(&self) {
        self.collection.close().await;
    }

    pub async fn resync(&self) -> Result<(), AppError> {
        self.collection.resync().await
    }

    /// 別のスポットへ切り替える。旧スポットの購読は先に解除される
    pub async fn retarget(&self, spot_id: EntityId) -> Result<(), AppError> {
        self.collection
            .update_context(|ctx| ctx.spot_id = spot_id)
            .await
    }

    pub async fn checkins(&self) -> Vec<HangoutCheckin> {
        self.collection.items().await
    }

    pub async fn headcount(&self) -> usize {
        self.collection.len().await
    }
}
