pub mod auth_aware;
pub mod capacity_gate;
pub mod checkin_roster;
pub mod comment_thread;
pub mod live_collection;
pub mod note_feed;
pub mod optimistic_mutator;
pub mod reconciler;
pub mod spot_board;

#[cfg(test)]
pub(crate) mod test_support;

pub use auth_aware::AuthAware;
pub use capacity_gate::CapacityGate;
pub use checkin_roster::CheckinRoster;
pub use comment_thread::CommentThread;
pub use live_collection::{LiveCollection, ViewSource};
pub use note_feed::NoteFeed;
pub use optimistic_mutator::{
    Freshness, OptimisticMutator, RestoreOutcome, Snapshot, ensure_owned, require_user,
};
pub use reconciler::{ReconcileOutcome, Reconciler, ReconcilerTask, reconcile, replay};
pub use spot_board::SpotBoard;
