use super::context::{
    CheckinViewContext, CommentViewContext, NoteViewContext, NoteViewMode, SpotViewContext,
    SpotViewMode,
};
use crate::domain::collection::LikedSet;
use crate::domain::entities::{HangoutCheckin, HangoutSpot, Note, NoteComment};

/// エンティティが現在のビューに含まれるかを判定する純粋関数。
///
/// 呼び出しのたびに最新のコンテキストといいね集合を受け取り、
/// 購読開始時点の値を保持してはならない。
pub trait ViewPredicate<E>: Send + Sync + 'static {
    type Context: Clone + Send + Sync + 'static;

    fn includes(&self, entity: &E, context: &Self::Context, liked: &LikedSet) -> bool;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoteVisibility;

impl ViewPredicate<Note> for NoteVisibility {
    type Context = NoteViewContext;

    fn includes(&self, note: &Note, context: &NoteViewContext, liked: &LikedSet) -> bool {
        match context.mode {
            NoteViewMode::Community => {
                if !note.is_community_visible() {
                    return false;
                }
                if context
                    .filters
                    .normalized_subject()
                    .is_some_and(|subject| note.subject.as_deref() != Some(subject))
                {
                    return false;
                }
                match context.filters.normalized_search() {
                    Some(needle) => note.matches_search(&needle),
                    None => true,
                }
            }
            NoteViewMode::Mine => context
                .current_user
                .as_ref()
                .is_some_and(|user| &note.owner_id == user),
            NoteViewMode::Favorites => context.current_user.is_some() && liked.contains(&note.id),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SpotVisibility;

impl ViewPredicate<HangoutSpot> for SpotVisibility {
    type Context = SpotViewContext;

    fn includes(&self, spot: &HangoutSpot, context: &SpotViewContext, _liked: &LikedSet) -> bool {
        match context.mode {
            SpotViewMode::Mine => context
                .current_user
                .as_ref()
                .is_some_and(|user| &spot.owner_id == user),
            SpotViewMode::All => {
                let filters = &context.filters;
                if !spot.is_active {
                    return false;
                }
                if filters
                    .normalized_spot_type()
                    .is_some_and(|spot_type| spot.spot_type != spot_type)
                {
                    return false;
                }
                if filters
                    .normalized_search()
                    .is_some_and(|needle| !spot.matches_search(&needle))
                {
                    return false;
                }
                if filters
                    .near
                    .is_some_and(|radius| !radius.contains(&spot.location))
                {
                    return false;
                }
                if filters
                    .min_capacity
                    .is_some_and(|min_capacity| spot.capacity < min_capacity)
                {
                    return false;
                }
                !filters.only_available || spot.has_capacity()
            }
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CheckinVisibility;

impl ViewPredicate<HangoutCheckin> for CheckinVisibility {
    type Context = CheckinViewContext;

    fn includes(
        &self,
        checkin: &HangoutCheckin,
        context: &CheckinViewContext,
        _liked: &LikedSet,
    ) -> bool {
        checkin.is_active && checkin.spot_id == context.spot_id
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CommentVisibility;

impl ViewPredicate<NoteComment> for CommentVisibility {
    type Context = CommentViewContext;

    fn includes(
        &self,
        comment: &NoteComment,
        context: &CommentViewContext,
        _liked: &LikedSet,
    ) -> bool {
        comment.note_id == context.note_id
    }
}
