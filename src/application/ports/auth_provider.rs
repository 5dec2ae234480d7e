use crate::domain::value_objects::UserId;
use tokio::sync::watch;

/// 認証プロバイダのポート。
///
/// ユーザーが存在しない場合、楽観的ミューテーションは許可されず
/// ビューは公開コンテンツのみに制限される。
pub trait AuthProvider: Send + Sync {
    fn current_user(&self) -> Option<UserId>;

    /// 認証状態の変化を購読する
    fn watch(&self) -> watch::Receiver<Option<UserId>>;
}
