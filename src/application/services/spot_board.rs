use super::auth_aware::AuthAware;
use super::live_collection::{LiveCollection, ViewSource};
use super::optimistic_mutator::{ensure_owned, require_user};
use crate::application::ports::auth_provider::AuthProvider;
use crate::application::ports::query_service::{
    ListQuery, Mutation, MutationRequest, QueryService, SpotQuery, fetch_entity, mutate_entity,
};
use crate::application::ports::subscription_channel::SubscriptionChannel;
use crate::domain::entities::{HangoutSpot, SpotDraft, SpotPatch};
use crate::domain::realtime::{ChangeEvent, EventPayload, ResourceFilter, ResourceKind};
use crate::domain::value_objects::{EntityId, UserId};
use crate::domain::view::{SpotFilters, SpotViewContext, SpotViewMode, SpotVisibility};
use crate::shared::error::AppError;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

impl ViewSource<HangoutSpot> for SpotVisibility {
    fn list_query(&self, context: &SpotViewContext, limit: u32) -> Option<ListQuery> {
        let query = match context.mode {
            SpotViewMode::All => SpotQuery {
                owner_id: None,
                active_only: true,
                spot_type: context.filters.normalized_spot_type().map(str::to_string),
                limit,
            },
            SpotViewMode::Mine => SpotQuery {
                owner_id: Some(context.current_user.clone()?),
                active_only: false,
                spot_type: None,
                limit,
            },
        };
        Some(ListQuery::Spots(query))
    }

    fn subscription_filter(&self, _context: &SpotViewContext) -> ResourceFilter {
        ResourceFilter::all(ResourceKind::HangoutSpots)
    }
}

/// たまり場スポットの一覧とその操作
#[derive(Clone)]
pub struct SpotBoard {
    collection: LiveCollection<HangoutSpot, SpotVisibility>,
    query: Arc<dyn QueryService>,
    auth: Arc<dyn AuthProvider>,
}

impl SpotBoard {
    pub fn new(
        query: Arc<dyn QueryService>,
        channel: Arc<dyn SubscriptionChannel>,
        auth: Arc<dyn AuthProvider>,
        mode: SpotViewMode,
        list_limit: u32,
    ) -> Self {
        let context = SpotViewContext::new(mode, auth.current_user());
        let collection = LiveCollection::new(
            SpotVisibility,
            context,
            Arc::clone(&query),
            channel,
            list_limit,
        );
        Self {
            collection,
            query,
            auth,
        }
    }

    pub fn collection(&self) -> &LiveCollection<HangoutSpot, SpotVisibility> {
        &self.collection
    }

    pub fn context(&self) -> SpotViewContext {
        self.collection.context()
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

    pub async fn set_view(&self, mode: SpotViewMode) -> Result<(), AppError> {
        self.collection.update_context(|ctx| ctx.mode = mode).await
    }

    pub async fn set_filters(&self, filters: SpotFilters) -> Result<(), AppError> {
        self.collection
            .update_context(|ctx| ctx.filters = filters)
            .await
    }

    pub async fn set_current_user(&self, user: Option<UserId>) -> Result<(), AppError> {
        self.collection
            .update_context(|ctx| ctx.current_user = user)
            .await
    }

    pub async fn spots(&self) -> Vec<HangoutSpot> {
        self.collection.items().await
    }

    /// 表示中ならその値、なければサーバーから取得する
    pub async fn lookup(&self, id: &EntityId) -> Result<HangoutSpot, AppError> {
        if let Some(spot) = self.collection.get(id).await {
            return Ok(spot);
        }
        fetch_entity::<HangoutSpot>(self.query.as_ref(), id).await
    }

    /// 在室人数はサーバー管理のため、変化後は行を取り直して UPDATE として反映する
    pub async fn refresh_spot(&self, id: &EntityId) -> Result<HangoutSpot, AppError> {
        let spot = fetch_entity::<HangoutSpot>(self.query.as_ref(), id).await?;
        self.collection
            .reconciler()
            .apply(ChangeEvent::Update(EventPayload::Record(spot.clone())))
            .await;
        Ok(spot)
    }

    pub async fn create(&self, draft: SpotDraft) -> Result<HangoutSpot, AppError> {
        let user = require_user(self.auth.current_user())?;
        draft.validate()?;
        let spot = mutate_entity::<HangoutSpot>(
            self.query.as_ref(),
            MutationRequest::new(Some(user), Mutation::CreateSpot(draft)),
        )
        .await?;
        info!("Created spot {}", spot.id);
        self.collection
            .reconciler()
            .apply(ChangeEvent::Insert(EventPayload::Record(spot.clone())))
            .await;
        Ok(spot)
    }

    pub async fn update(&self, id: &EntityId, patch: SpotPatch) -> Result<HangoutSpot, AppError> {
        let user = require_user(self.auth.current_user())?;
        patch.validate()?;
        let current = self.collection.get(id).await;
        ensure_owned(current.as_ref(), id, &user)?;

        let spot = mutate_entity::<HangoutSpot>(
            self.query.as_ref(),
            MutationRequest::new(
                Some(user),
                Mutation::UpdateSpot {
                    id: id.clone(),
                    patch,
                },
            ),
        )
        .await?;
        self.collection
            .reconciler()
            .apply(ChangeEvent::Update(EventPayload::Record(spot.clone())))
            .await;
        Ok(spot)
    }

    pub async fn delete(&self, id: &EntityId) -> Result<(), AppError> {
        let user = require_user(self.auth.current_user())?;
        let current = self.collection.get(id).await;
        ensure_owned(current.as_ref(), id, &user)?;

        self.query
            .mutate(MutationRequest::new(
                Some(user),
                Mutation::DeleteSpot { id: id.clone() },
            ))
            .await?;
        info!("Deleted spot {}", id);
        self.collection
            .reconciler()
            .apply(ChangeEvent::Delete(id.clone()))
            .await;
        Ok(())
    }
}

#[async_trait]
impl AuthAware for SpotBoard {
    async fn on_user_changed(&self, user: Option<UserId>) -> Result<(), AppError> {
        self.set_current_user(user).await
    }
}
