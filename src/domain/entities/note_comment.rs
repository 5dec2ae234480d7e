use super::Owned;
use crate::shared::error::AppError;
use crate::domain::value_objects::{EntityId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteComment {
    pub id: EntityId,
    pub note_id: EntityId,
    pub owner_id: UserId,
    pub content: String,
    #[serde(default)]
    pub author_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Owned for NoteComment {
    fn owner_id(&self) -> &UserId {
        &self.owner_id
    }
}

const MAX_COMMENT_CHARS: usize = 2000;

/// 前後の空白を除いたコメント本文を返す
pub fn normalize_comment_content(content: &str) -> Result<&str, AppError> {
    let content = content.trim();
    if content.is_empty() {
        return Err(AppError::ValidationError(
            "Comment content is required".to_string(),
        ));
    }
    if content.chars().count() > MAX_COMMENT_CHARS {
        return Err(AppError::ValidationError(format!(
            "Comment must be at most {MAX_COMMENT_CHARS} characters"
        )));
    }
    Ok(content)
}
