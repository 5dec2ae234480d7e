use super::{EntityStore, LikedSet};
use crate::domain::entities::Entity;
use crate::domain::realtime::ChangeKind;
use crate::domain::value_objects::EntityId;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// コールドロード中に反映されたイベント。ID ごとに最後の一件だけ残す
#[derive(Debug, Clone, PartialEq)]
pub struct PendingChange<E> {
    pub seq: u64,
    pub kind: ChangeKind,
    pub id: EntityId,
    /// DELETE の場合は `None`
    pub entity: Option<E>,
}

/// ひとつのビューが保持する可変状態。
///
/// ストアといいね集合を同じロックの内側に置くことで、like の反映が
/// 途中状態のまま他のイベントから観測されることはない。
#[derive(Debug, Clone)]
pub struct CollectionState<E> {
    pub store: EntityStore<E>,
    pub liked: LikedSet,
    generation: u64,
    event_seq: u64,
    stamps: HashMap<EntityId, u64>,
    capturing: usize,
    pending: HashMap<EntityId, PendingChange<E>>,
}

impl<E: Entity> CollectionState<E> {
    pub fn new() -> Self {
        Self {
            store: EntityStore::new(),
            liked: LikedSet::new(),
            generation: 0,
            event_seq: 0,
            stamps: HashMap::new(),
            capturing: 0,
            pending: HashMap::new(),
        }
    }

    /// コールドロードの結果で置き換える。世代が進む
    pub fn reset(&mut self, entities: Vec<E>) {
        self.store.replace_all(entities);
        self.generation = self.generation.wrapping_add(1);
        self.stamps.clear();
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// ストアへ反映する直前に呼ぶ。
    ///
    /// 既存行への重複 INSERT は行を変えないため変更印を進めない。
    pub fn record_event(&mut self, kind: ChangeKind, id: &EntityId, entity: Option<&E>) -> u64 {
        self.event_seq = self.event_seq.wrapping_add(1);
        let seq = self.event_seq;
        if kind != ChangeKind::Insert || !self.store.contains(id) {
            self.stamps.insert(id.clone(), seq);
        }
        if self.capturing > 0 {
            self.pending.insert(
                id.clone(),
                PendingChange {
                    seq,
                    kind,
                    id: id.clone(),
                    entity: entity.cloned(),
                },
            );
        }
        seq
    }

    /// 直近の reset 以降、この ID に最後に反映したイベントの通番
    pub fn stamp(&self, id: &EntityId) -> Option<u64> {
        self.stamps.get(id).copied()
    }

    /// コールドロードの開始。以降のイベントを取り置き、開始時点の通番を返す
    pub fn begin_capture(&mut self) -> u64 {
        self.capturing += 1;
        self.event_seq
    }

    /// `since` より後に取り置いたイベントを通番順に返す。
    ///
    /// 進行中のロードが残っていなければ取り置きを捨てる。
    pub fn finish_capture(&mut self, since: u64) -> Vec<PendingChange<E>> {
        let mut changes: Vec<PendingChange<E>> = self
            .pending
            .values()
            .filter(|change| change.seq > since)
            .cloned()
            .collect();
        changes.sort_by_key(|change| change.seq);
        self.capturing = self.capturing.saturating_sub(1);
        if self.capturing == 0 {
            self.pending.clear();
        }
        changes
    }
}

impl<E: Entity> Default for CollectionState<E> {
    fn default() -> Self {
        Self::new()
    }
}

pub type SharedCollection<E> = Arc<RwLock<CollectionState<E>>>;

pub fn shared_collection<E: Entity>() -> SharedCollection<E> {
    Arc::new(RwLock::new(CollectionState::new()))
}
