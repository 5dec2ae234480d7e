use crate::application::ports::auth_provider::AuthProvider;
use crate::domain::value_objects::UserId;
use tokio::sync::watch;

/// 端末上のログインセッション。サインイン状態を watch チャネルで配信する
pub struct SessionAuth {
    state: watch::Sender<Option<UserId>>,
}

impl SessionAuth {
    pub fn new(initial: Option<UserId>) -> Self {
        let (state, _) = watch::channel(initial);
        Self { state }
    }

    pub fn sign_in(&self, user: UserId) {
        tracing::info!("Signed in as {}", user);
        self.state.send_replace(Some(user));
    }

    pub fn sign_out(&self) {
        if let Some(previous) = self.state.send_replace(None) {
            tracing::info!("Signed out {}", previous);
        }
    }
}

impl Default for SessionAuth {
    fn default() -> Self {
        Self::new(None)
    }
}

impl AuthProvider for SessionAuth {
    fn current_user(&self) -> Option<UserId> {
        self.state.borrow().clone()
    }

    fn watch(&self) -> watch::Receiver<Option<UserId>> {
        self.state.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn watchers_observe_sign_in_and_out() {
        let auth = SessionAuth::default();
        let mut watcher = auth.watch();
        assert_eq!(auth.current_user(), None);

        auth.sign_in(UserId::new("alice").unwrap());
        watcher.changed().await.unwrap();
        assert_eq!(
            watcher.borrow_and_update().clone(),
            Some(UserId::new("alice").unwrap())
        );

        auth.sign_out();
        watcher.changed().await.unwrap();
        assert_eq!(*watcher.borrow(), None);
        assert_eq!(auth.current_user(), None);
    }
}
