pub mod auth_provider;
pub mod query_service;
pub mod subscription_channel;

pub use auth_provider::AuthProvider;
pub use query_service::{
    CheckinQuery, CommentQuery, ListQuery, Mutation, MutationRequest, NoteQuery, QueryService,
    SpotQuery, fetch_entities, fetch_entity, mutate_entity,
};
pub use subscription_channel::{Subscription, SubscriptionChannel};
