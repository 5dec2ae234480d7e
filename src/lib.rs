use tracing::info;

pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod shared;
pub mod state;

pub use shared::{AppConfig, AppError};
pub use state::{AppState, AuthBinding};

/// 設定を読み込み、マイグレーション済みの状態を組み立てる
pub async fn bootstrap(config: AppConfig) -> anyhow::Result<AppState> {
    info!("Campus realtime core starting...");
    AppState::new(config).await
}

/// ログ設定の初期化。既に初期化済みなら何もしない
pub fn init_logging() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "campus_lib=debug,info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}
