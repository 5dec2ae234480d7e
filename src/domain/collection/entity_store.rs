use crate::domain::entities::Entity;
use crate::domain::value_objects::EntityId;
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// 新規 ID。先頭に挿入した
    Inserted,
    /// 既存 ID。位置を保ったまま置き換えた
    Replaced,
}

/// ID をキーにした順序付きコレクション（新しいものが先頭）。
///
/// 同一 ID のインスタンスは常に高々ひとつ。
#[derive(Debug, Clone)]
pub struct EntityStore<E> {
    items: Vec<E>,
}

impl<E: Entity> EntityStore<E> {
    pub fn new() -> Self {
        Self { items: Vec::new() }
    }

    pub fn upsert(&mut self, entity: E) -> UpsertOutcome {
        match self.position(entity.id()) {
            Some(index) => {
                self.items[index] = entity;
                UpsertOutcome::Replaced
            }
            None => {
                self.items.insert(0, entity);
                UpsertOutcome::Inserted
            }
        }
    }

    /// 指定位置（末尾で打ち切り）に挿入する。既存 ID は置き換えのみ
    pub fn insert_at(&mut self, index: usize, entity: E) -> UpsertOutcome {
        if let Some(existing) = self.position(entity.id()) {
            self.items[existing] = entity;
            return UpsertOutcome::Replaced;
        }
        let index = index.min(self.items.len());
        self.items.insert(index, entity);
        UpsertOutcome::Inserted
    }

    pub fn remove(&mut self, id: &EntityId) -> Option<E> {
        self.remove_with_position(id).map(|(_, entity)| entity)
    }

    pub fn remove_with_position(&mut self, id: &EntityId) -> Option<(usize, E)> {
        let index = self.position(id)?;
        Some((index, self.items.remove(index)))
    }

    /// 一覧を丸ごと差し替える。重複 ID は最初の出現を残す
    pub fn replace_all(&mut self, entities: Vec<E>) {
        let mut seen = HashSet::with_capacity(entities.len());
        self.items = entities
            .into_iter()
            .filter(|entity| seen.insert(entity.id().clone()))
            .collect();
    }

    pub fn get(&self, id: &EntityId) -> Option<&E> {
        self.items.iter().find(|entity| entity.id() == id)
    }

    pub fn get_mut(&mut self, id: &EntityId) -> Option<&mut E> {
        self.items.iter_mut().find(|entity| entity.id() == id)
    }

    pub fn position(&self, id: &EntityId) -> Option<usize> {
        self.items.iter().position(|entity| entity.id() == id)
    }

    pub fn contains(&self, id: &EntityId) -> bool {
        self.position(id).is_some()
    }

    pub fn items(&self) -> &[E] {
        &self.items
    }

    pub fn ids(&self) -> Vec<EntityId> {
        self.items.iter().map(|entity| entity.id().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl<E: Entity> Default for EntityStore<E> {
    fn default() -> Self {
        Self::new()
    }
}
