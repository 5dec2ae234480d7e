use crate::application::ports::auth_provider::AuthProvider;
use crate::application::ports::query_service::QueryService;
use crate::application::ports::subscription_channel::SubscriptionChannel;
use crate::application::services::{
    AuthAware, CapacityGate, CheckinRoster, CommentThread, NoteFeed, SpotBoard,
};
use crate::domain::value_objects::EntityId;
use crate::domain::view::{NoteViewMode, SpotViewMode};
use crate::infrastructure::auth::SessionAuth;
use crate::infrastructure::database::{ConnectionPool, SqliteBackend};
use crate::infrastructure::realtime::BroadcastSubscriptionChannel;
use crate::shared::config::AppConfig;
use crate::shared::error::AppError;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// アプリケーション全体の状態を管理する構造体
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub backend: Arc<SqliteBackend>,
    pub channel: Arc<BroadcastSubscriptionChannel>,
    pub auth: Arc<SessionAuth>,
    gate: Arc<CapacityGate>,
}

impl AppState {
    pub async fn new(config: AppConfig) -> anyhow::Result<Self> {
        config.validate().map_err(anyhow::Error::msg)?;

        let pool = ConnectionPool::new(&config.database).await?;
        let channel = Arc::new(BroadcastSubscriptionChannel::new(
            config.realtime.channel_capacity,
        ));
        let backend = Arc::new(SqliteBackend::new(
            pool,
            channel.sender(),
            config.realtime.include_records,
        ));
        backend.initialize().await?;

        let auth = Arc::new(SessionAuth::default());
        let gate = Arc::new(CapacityGate::new(
            Arc::clone(&backend) as Arc<dyn QueryService>,
            Arc::clone(&auth) as Arc<dyn AuthProvider>,
        ));

        info!(
            "Campus state initialized (database: {}, include_records: {})",
            config.database.url, config.realtime.include_records
        );

        Ok(Self {
            config,
            backend,
            channel,
            auth,
            gate,
        })
    }

    pub fn query(&self) -> Arc<dyn QueryService> {
        Arc::clone(&self.backend) as Arc<dyn QueryService>
    }

    pub fn subscriptions(&self) -> Arc<dyn SubscriptionChannel> {
        Arc::clone(&self.channel) as Arc<dyn SubscriptionChannel>
    }

    pub fn auth_provider(&self) -> Arc<dyn AuthProvider> {
        Arc::clone(&self.auth) as Arc<dyn AuthProvider>
    }

    pub fn gate(&self) -> Arc<CapacityGate> {
        Arc::clone(&self.gate)
    }

    pub async fn open_note_feed(&self, mode: NoteViewMode) -> Result<NoteFeed, AppError> {
        let feed = NoteFeed::new(
            self.query(),
            self.subscriptions(),
            self.auth_provider(),
            mode,
            self.config.feed.list_limit,
        );
        feed.open().await?;
        Ok(feed)
    }

    pub async fn open_spot_board(&self, mode: SpotViewMode) -> Result<SpotBoard, AppError> {
        let board = SpotBoard::new(
            self.query(),
            self.subscriptions(),
            self.auth_provider(),
            mode,
            self.config.feed.list_limit,
        );
        board.open().await?;
        Ok(board)
    }

    pub async fn open_checkin_roster(&self, spot_id: EntityId) -> Result<CheckinRoster, AppError> {
        let roster = CheckinRoster::new(
            self.query(),
            self.subscriptions(),
            spot_id,
            self.config.feed.list_limit,
        );
        roster.open().await?;
        Ok(roster)
    }

    pub async fn open_comment_thread(&self, note_id: EntityId) -> Result<CommentThread, AppError> {
        let thread = CommentThread::new(
            self.query(),
            self.subscriptions(),
            self.auth_provider(),
            note_id,
            self.config.feed.list_limit,
        );
        thread.open().await?;
        Ok(thread)
    }

    /// 認証状態の変化を対象へ転送し続ける。戻り値を drop すると転送を止める
    pub fn bind_auth(&self, target: Arc<dyn AuthAware>) -> AuthBinding {
        let mut watcher = self.auth.watch();
        let handle = tokio::spawn(async move {
            while watcher.changed().await.is_ok() {
                let user = watcher.borrow_and_update().clone();
                if let Err(e) = target.on_user_changed(user).await {
                    warn!("Failed to apply auth change: {}", e);
                }
            }
        });
        AuthBinding { handle }
    }

    pub async fn shutdown(&self) {
        self.backend.pool().close().await;
        info!("Campus state shut down");
    }
}

pub struct AuthBinding {
    handle: JoinHandle<()>,
}

impl Drop for AuthBinding {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
