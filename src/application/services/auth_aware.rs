use crate::domain::value_objects::UserId;
use crate::shared::error::AppError;
use async_trait::async_trait;

/// 認証ユーザーの切り替えに追従するビュー・状態機械
#[async_trait]
pub trait AuthAware: Send + Sync {
    async fn on_user_changed(&self, user: Option<UserId>) -> Result<(), AppError>;
}
