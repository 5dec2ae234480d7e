use super::resource::ResourceKind;
use crate::domain::entities::Entity;
use crate::domain::value_objects::EntityId;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// 購読チャネルが配信する生の変更通知。
///
/// INSERT/UPDATE は結合済みの行全体を `record` に持つのが通常だが、
/// ID のみ（`record: None`）や部分的な行で届くこともある。
/// DELETE の `record` は削除前の行（あれば）で、範囲判定にのみ使う。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeMessage {
    pub resource: ResourceKind,
    pub kind: ChangeKind,
    pub id: String,
    #[serde(default)]
    pub record: Option<serde_json::Value>,
}

impl ChangeMessage {
    /// 行全体を持つ通知。直列化できない場合は ID のみになる
    pub fn from_entity<E: Entity>(kind: ChangeKind, entity: &E) -> Self {
        Self {
            resource: E::RESOURCE,
            kind,
            id: entity.id().to_string(),
            record: serde_json::to_value(entity).ok(),
        }
    }

    /// ID のみの通知
    pub fn reference(resource: ResourceKind, kind: ChangeKind, id: &EntityId) -> Self {
        Self {
            resource,
            kind,
            id: id.to_string(),
            record: None,
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum ChangeDecodeError {
    #[error("Resource mismatch: expected {expected}, got {actual}")]
    ResourceMismatch {
        expected: ResourceKind,
        actual: ResourceKind,
    },
    #[error("Invalid entity id: {0}")]
    InvalidId(String),
    #[error("Record id {record_id} does not match event id {event_id}")]
    IdMismatch { event_id: String, record_id: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum EventPayload<E> {
    /// そのまま反映できる完全なレコード
    Record(E),
    /// 詳細取得が必要な参照
    Reference(EntityId),
}

/// チャネル境界で検証済みの変更イベント
#[derive(Debug, Clone, PartialEq)]
pub enum ChangeEvent<E> {
    Insert(EventPayload<E>),
    Update(EventPayload<E>),
    Delete(EntityId),
}

impl<E: Entity> ChangeEvent<E> {
    pub fn decode(message: ChangeMessage) -> Result<Self, ChangeDecodeError> {
        if message.resource != E::RESOURCE {
            return Err(ChangeDecodeError::ResourceMismatch {
                expected: E::RESOURCE,
                actual: message.resource,
            });
        }
        let id = EntityId::new(message.id).map_err(ChangeDecodeError::InvalidId)?;

        if message.kind == ChangeKind::Delete {
            return Ok(ChangeEvent::Delete(id));
        }

        let payload = match message.record {
            None => EventPayload::Reference(id),
            Some(value) => match serde_json::from_value::<E>(value) {
                Ok(entity) => {
                    if entity.id() != &id {
                        return Err(ChangeDecodeError::IdMismatch {
                            event_id: id.to_string(),
                            record_id: entity.id().to_string(),
                        });
                    }
                    EventPayload::Record(entity)
                }
                Err(err) => {
                    debug!("Partial {} record for {}: {}", E::RESOURCE, id, err);
                    EventPayload::Reference(id)
                }
            },
        };

        Ok(match message.kind {
            ChangeKind::Insert => ChangeEvent::Insert(payload),
            _ => ChangeEvent::Update(payload),
        })
    }

    pub fn kind(&self) -> ChangeKind {
        match self {
            ChangeEvent::Insert(_) => ChangeKind::Insert,
            ChangeEvent::Update(_) => ChangeKind::Update,
            ChangeEvent::Delete(_) => ChangeKind::Delete,
        }
    }

    pub fn entity_id(&self) -> &EntityId {
        match self {
            ChangeEvent::Insert(payload) | ChangeEvent::Update(payload) => match payload {
                EventPayload::Record(entity) => entity.id(),
                EventPayload::Reference(id) => id,
            },
            ChangeEvent::Delete(id) => id,
        }
    }
}
