pub mod broadcast_channel;

pub use broadcast_channel::BroadcastSubscriptionChannel;
