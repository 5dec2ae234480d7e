use super::Owned;
use crate::domain::value_objects::{EntityId, UserId};
use crate::shared::error::AppError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

const MAX_TITLE_CHARS: usize = 200;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub id: EntityId,
    pub owner_id: UserId,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub is_public: bool,
    pub is_approved: bool,
    #[serde(default)]
    pub like_count: u32,
    #[serde(default)]
    pub view_count: u32,
    /// 投稿者の表示名（結合フィールド）
    #[serde(default)]
    pub author_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Note {
    pub fn increment_likes(&mut self) {
        self.like_count = self.like_count.saturating_add(1);
    }

    pub fn decrement_likes(&mut self) {
        self.like_count = self.like_count.saturating_sub(1);
    }

    /// タイトル・本文・タグのいずれかに小文字化済みの `needle` を含むか
    pub fn matches_search(&self, needle: &str) -> bool {
        self.title.to_lowercase().contains(needle)
            || self.content.to_lowercase().contains(needle)
            || self
                .tags
                .iter()
                .any(|tag| tag.to_lowercase().contains(needle))
    }

    pub fn is_community_visible(&self) -> bool {
        self.is_public && self.is_approved
    }
}

impl Owned for Note {
    fn owner_id(&self) -> &UserId {
        &self.owner_id
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteDraft {
    pub title: String,
    pub content: String,
    pub subject: Option<String>,
    pub tags: Vec<String>,
    pub is_public: bool,
}

impl NoteDraft {
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
            subject: None,
            tags: Vec::new(),
            is_public: true,
        }
    }

    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    pub fn private(mut self) -> Self {
        self.is_public = false;
        self
    }

    pub fn validate(&self) -> Result<(), AppError> {
        validate_title(&self.title)?;
        if self.content.trim().is_empty() {
            return Err(AppError::ValidationError(
                "Note content is required".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NotePatch {
    pub title: Option<String>,
    pub content: Option<String>,
    /// `Some(None)` で科目をクリア
    pub subject: Option<Option<String>>,
    pub tags: Option<Vec<String>>,
    pub is_public: Option<bool>,
}

impl NotePatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.content.is_none()
            && self.subject.is_none()
            && self.tags.is_none()
            && self.is_public.is_none()
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.is_empty() {
            return Err(AppError::ValidationError("Note patch is empty".to_string()));
        }
        if let Some(title) = self.title.as_deref() {
            validate_title(title)?;
        }
        if self
            .content
            .as_deref()
            .is_some_and(|content| content.trim().is_empty())
        {
            return Err(AppError::ValidationError(
                "Note content is required".to_string(),
            ));
        }
        Ok(())
    }

    pub fn apply_to(&self, note: &mut Note) {
        if let Some(title) = &self.title {
            note.title = title.clone();
        }
        if let Some(content) = &self.content {
            note.content = content.clone();
        }
        if let Some(subject) = &self.subject {
            note.subject = subject.clone();
        }
        if let Some(tags) = &self.tags {
            note.tags = tags.clone();
        }
        if let Some(is_public) = self.is_public {
            note.is_public = is_public;
        }
    }
}

fn validate_title(title: &str) -> Result<(), AppError> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err(AppError::ValidationError(
            "Note title is required".to_string(),
        ));
    }
    if trimmed.chars().count() > MAX_TITLE_CHARS {
        return Err(AppError::ValidationError(format!(
            "Note title must be at most {MAX_TITLE_CHARS} characters"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_note() -> Note {
        Note {
            id: EntityId::new("n1").unwrap(),
            owner_id: UserId::new("u1").unwrap(),
            title: "Linear Algebra recap".into(),
            content: "Eigenvalues and eigenvectors".into(),
            subject: Some("math".into()),
            tags: vec!["Midterm".into()],
            is_public: true,
            is_approved: true,
            like_count: 0,
            view_count: 0,
            author_name: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn search_matches_title_content_and_tags() {
        let note = sample_note();
        assert!(note.matches_search("algebra"));
        assert!(note.matches_search("eigen"));
        assert!(note.matches_search("midterm"));
        assert!(!note.matches_search("calculus"));
    }

    #[test]
    fn like_counter_never_underflows() {
        let mut note = sample_note();
        note.decrement_likes();
        assert_eq!(note.like_count, 0);
        note.increment_likes();
        assert_eq!(note.like_count, 1);
    }

    #[test]
    fn patch_applies_only_present_fields() {
        let mut note = sample_note();
        let patch = NotePatch {
            subject: Some(None),
            is_public: Some(false),
            ..NotePatch::default()
        };
        patch.apply_to(&mut note);
        assert_eq!(note.subject, None);
        assert!(!note.is_public);
        assert_eq!(note.title, "Linear Algebra recap");
    }

    #[test]
    fn draft_validation_requires_title_and_content() {
        assert!(NoteDraft::new("", "body").validate().is_err());
        assert!(NoteDraft::new("title", "  ").validate().is_err());
        assert!(NoteDraft::new("title", "body").validate().is_ok());
        assert!(NotePatch::default().validate().is_err());
    }

    #[test]
    fn patch_validation_rejects_blank_content_only_when_present() {
        let blank = NotePatch {
            content: Some("   ".into()),
            ..NotePatch::default()
        };
        assert!(matches!(blank.validate(), Err(AppError::ValidationError(_))));

        let title_only = NotePatch {
            title: Some("Revised".into()),
            ..NotePatch::default()
        };
        assert!(title_only.validate().is_ok());
    }
}
