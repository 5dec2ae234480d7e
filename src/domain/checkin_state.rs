use crate::domain::value_objects::EntityId;
use serde::{Deserialize, Serialize};

/// ユーザーごとのチェックイン状態。
///
/// `CheckingIn` / `CheckingOut` はリモート呼び出し中の過渡状態で、
/// 並行する別の操作を拒否するために使う。
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum CheckinState {
    #[default]
    None,
    CheckingIn {
        spot_id: EntityId,
    },
    CheckedIn {
        spot_id: EntityId,
        checkin_id: EntityId,
    },
    CheckingOut {
        spot_id: EntityId,
        checkin_id: EntityId,
    },
}

impl CheckinState {
    /// 占有中（または占有しようとしている）スポット
    pub fn spot_id(&self) -> Option<&EntityId> {
        match self {
            CheckinState::None => None,
            CheckinState::CheckingIn { spot_id }
            | CheckinState::CheckedIn { spot_id, .. }
            | CheckinState::CheckingOut { spot_id, .. } => Some(spot_id),
        }
    }

    pub fn is_checked_in(&self) -> bool {
        matches!(self, CheckinState::CheckedIn { .. })
    }
}
