use crate::domain::value_objects::EntityId;
use std::collections::HashSet;

/// 現在のユーザーが「いいね」したエンティティ ID の集合。
///
/// 購読イベントからは変更されず、like/unlike の操作でのみ増減する。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LikedSet {
    ids: HashSet<EntityId>,
}

impl LikedSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, id: &EntityId) -> bool {
        self.ids.contains(id)
    }

    pub fn insert(&mut self, id: EntityId) -> bool {
        self.ids.insert(id)
    }

    pub fn remove(&mut self, id: &EntityId) -> bool {
        self.ids.remove(id)
    }

    pub fn set(&mut self, id: &EntityId, liked: bool) {
        if liked {
            self.ids.insert(id.clone());
        } else {
            self.ids.remove(id);
        }
    }

    pub fn replace_all(&mut self, ids: impl IntoIterator<Item = EntityId>) {
        self.ids = ids.into_iter().collect();
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &EntityId> {
        self.ids.iter()
    }
}

impl FromIterator<EntityId> for LikedSet {
    fn from_iter<I: IntoIterator<Item = EntityId>>(iter: I) -> Self {
        Self {
            ids: iter.into_iter().collect(),
        }
    }
}
