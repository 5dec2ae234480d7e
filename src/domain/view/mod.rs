pub mod context;
pub mod predicate;

pub use context::{
    CheckinViewContext, CommentViewContext, GeoRadius, NoteFilters, NoteViewContext, NoteViewMode,
    SpotFilters, SpotViewContext, SpotViewMode, ViewContext,
};
pub use predicate::{
    CheckinVisibility, CommentVisibility, NoteVisibility, SpotVisibility, ViewPredicate,
};
