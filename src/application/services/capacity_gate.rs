use super::auth_aware::AuthAware;
use super::optimistic_mutator::require_user;
use super::spot_board::SpotBoard;
use crate::application::ports::auth_provider::AuthProvider;
use crate::application::ports::query_service::{
    CheckinQuery, ListQuery, Mutation, MutationRequest, QueryService, fetch_entities,
    mutate_entity,
};
use crate::domain::checkin_state::CheckinState;
use crate::domain::entities::HangoutCheckin;
use crate::domain::value_objects::{EntityId, UserId};
use crate::shared::error::AppError;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

#[derive(Debug, Default)]
struct GateInner {
    /// 状態の持ち主。認証ユーザーと異なれば状態は無効
    user: Option<UserId>,
    state: CheckinState,
}

impl GateInner {
    fn bind(&mut self, user: &UserId) {
        if self.user.as_ref() != Some(user) {
            if self.user.is_some() {
                debug!("Check-in state reset for user switch");
            }
            self.user = Some(user.clone());
            self.state = CheckinState::None;
        }
    }
}

/// ユーザーごとに同時にひとつだけのチェックインと、スポット定員を守る状態機械。
///
/// クライアント側の事前確認は助言的なもので、最終判定は常にサーバーが行う。
pub struct CapacityGate {
    query: Arc<dyn QueryService>,
    auth: Arc<dyn AuthProvider>,
    inner: RwLock<GateInner>,
}

impl CapacityGate {
    pub fn new(query: Arc<dyn QueryService>, auth: Arc<dyn AuthProvider>) -> Self {
        Self {
            query,
            auth,
            inner: RwLock::new(GateInner::default()),
        }
    }

    /// 現在の認証ユーザーに対する状態
    pub async fn state(&self) -> CheckinState {
        let inner = self.inner.read().await;
        match self.auth.current_user() {
            Some(user) if inner.user.as_ref() == Some(&user) => inner.state.clone(),
            _ => CheckinState::None,
        }
    }

    pub async fn check_in(
        &self,
        spots: &SpotBoard,
        spot_id: &EntityId,
    ) -> Result<HangoutCheckin, AppError> {
        let user = require_user(self.auth.current_user())?;
        {
            let mut inner = self.inner.write().await;
            inner.bind(&user);
            if let Some(current) = inner.state.spot_id() {
                return Err(AppError::AlreadyCheckedIn(current.to_string()));
            }
            inner.state = CheckinState::CheckingIn {
                spot_id: spot_id.clone(),
            };
        }

        let spot = match spots.lookup(spot_id).await {
            Ok(spot) => spot,
            Err(err) => {
                self.settle(&user, CheckinState::None).await;
                return Err(err);
            }
        };
        if !spot.has_capacity() {
            self.settle(&user, CheckinState::None).await;
            return Err(AppError::CapacityExceeded {
                spot_id: spot_id.to_string(),
                capacity: spot.capacity,
            });
        }

        let result = mutate_entity::<HangoutCheckin>(
            self.query.as_ref(),
            MutationRequest::new(
                Some(user.clone()),
                Mutation::CheckIn {
                    spot_id: spot_id.clone(),
                },
            ),
        )
        .await;

        match result {
            Ok(checkin) => {
                self.settle(
                    &user,
                    CheckinState::CheckedIn {
                        spot_id: spot_id.clone(),
                        checkin_id: checkin.id.clone(),
                    },
                )
                .await;
                info!("User {} checked in at {}", user, spot_id);
                self.refresh(spots, spot_id).await;
                Ok(checkin)
            }
            Err(err) => {
                // サーバーの拒否理由はそのまま呼び出し側へ返す
                self.settle(&user, CheckinState::None).await;
                warn!("Check-in at {} rejected: {}", spot_id, err);
                Err(err)
            }
        }
    }

    /// 在室人数は楽観的に減らさず、成功後にスポットを取り直す
    pub async fn check_out(&self, spots: &SpotBoard) -> Result<(), AppError> {
        let user = require_user(self.auth.current_user())?;
        let (spot_id, checkin_id) = {
            let mut inner = self.inner.write().await;
            inner.bind(&user);
            let CheckinState::CheckedIn {
                spot_id,
                checkin_id,
            } = inner.state.clone()
            else {
                return Err(AppError::NotCheckedIn);
            };
            inner.state = CheckinState::CheckingOut {
                spot_id: spot_id.clone(),
                checkin_id: checkin_id.clone(),
            };
            (spot_id, checkin_id)
        };

        let result = self
            .query
            .mutate(MutationRequest::new(
                Some(user.clone()),
                Mutation::CheckOut {
                    checkin_id: checkin_id.clone(),
                },
            ))
            .await;

        match result {
            Ok(_) => {
                self.settle(&user, CheckinState::None).await;
                info!("User {} checked out of {}", user, spot_id);
                self.refresh(spots, &spot_id).await;
                Ok(())
            }
            Err(err) => {
                self.settle(
                    &user,
                    CheckinState::CheckedIn {
                        spot_id: spot_id.clone(),
                        checkin_id,
                    },
                )
                .await;
                warn!("Check-out of {} failed: {}", spot_id, err);
                Err(err)
            }
        }
    }

    /// サーバー上の有効なチェックインから状態を復元する
    pub async fn restore(&self) -> Result<CheckinState, AppError> {
        let user = require_user(self.auth.current_user())?;
        let active = fetch_entities::<HangoutCheckin>(
            self.query.as_ref(),
            ListQuery::Checkins(CheckinQuery {
                spot_id: None,
                user_id: Some(user.clone()),
                active_only: true,
                limit: 1,
            }),
        )
        .await?;

        let restored = match active.into_iter().next() {
            Some(checkin) => CheckinState::CheckedIn {
                spot_id: checkin.spot_id,
                checkin_id: checkin.id,
            },
            None => CheckinState::None,
        };

        let mut inner = self.inner.write().await;
        inner.bind(&user);
        if matches!(
            inner.state,
            CheckinState::CheckingIn { .. } | CheckinState::CheckingOut { .. }
        ) {
            debug!("Skipping restore while a check-in call is in flight");
            return Ok(inner.state.clone());
        }
        inner.state = restored.clone();
        Ok(restored)
    }

    /// リモート呼び出しの結果を反映する。途中でユーザーが替わっていれば捨てる
    async fn settle(&self, user: &UserId, state: CheckinState) {
        let mut inner = self.inner.write().await;
        if inner.user.as_ref() != Some(user) {
            debug!("Discarding check-in result for a previous user");
            return;
        }
        inner.state = state;
    }

    async fn refresh(&self, spots: &SpotBoard, spot_id: &EntityId) {
        if let Err(err) = spots.refresh_spot(spot_id).await {
            warn!("Failed to refresh occupancy of {}: {}", spot_id, err);
        }
    }
}

#[async_trait]
impl AuthAware for CapacityGate {
    async fn on_user_changed(&self, user: Option<UserId>) -> Result<(), AppError> {
        {
            let mut inner = self.inner.write().await;
            inner.user = user.clone();
            inner.state = CheckinState::None;
        }
        if user.is_some() {
            self.restore().await?;
        }
        Ok(())
    }
}
