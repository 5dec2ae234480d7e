use super::change::ChangeMessage;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Notes,
    NoteComments,
    HangoutSpots,
    HangoutCheckins,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Notes => "notes",
            ResourceKind::NoteComments => "note_comments",
            ResourceKind::HangoutSpots => "hangout_spots",
            ResourceKind::HangoutCheckins => "hangout_checkins",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `field = value` による購読範囲の絞り込み
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceScope {
    pub field: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceFilter {
    pub resource: ResourceKind,
    pub scope: Option<ResourceScope>,
}

impl ResourceFilter {
    pub fn all(resource: ResourceKind) -> Self {
        Self {
            resource,
            scope: None,
        }
    }

    pub fn scoped(resource: ResourceKind, field: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            resource,
            scope: Some(ResourceScope {
                field: field.into(),
                value: value.into(),
            }),
        }
    }

    /// メッセージがこの購読に届くべきかを判定する。
    ///
    /// レコードを持たない（ID のみの）メッセージや、絞り込み列を含まない
    /// 部分レコードは範囲外と断定できないため配信する。
    pub fn matches(&self, message: &ChangeMessage) -> bool {
        if message.resource != self.resource {
            return false;
        }
        let Some(scope) = &self.scope else {
            return true;
        };
        let Some(record) = message.record.as_ref() else {
            return true;
        };
        match record.get(&scope.field) {
            Some(value) => value.as_str() == Some(scope.value.as_str()),
            None => true,
        }
    }
}
