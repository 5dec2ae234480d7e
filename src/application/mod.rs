pub mod ports;
pub mod services;

pub use services::{
    CapacityGate, CheckinRoster, CommentThread, LiveCollection, NoteFeed, OptimisticMutator,
    Reconciler, SpotBoard,
};
