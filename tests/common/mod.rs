#![allow(dead_code)]

use campus_lib::application::ports::{Mutation, MutationRequest, QueryService};
use campus_lib::domain::entities::{Entity, HangoutSpot, Note, NoteDraft, SpotDraft};
use campus_lib::domain::value_objects::{GeoPoint, UserId};
use campus_lib::{AppConfig, AppError, AppState};
use std::future::Future;
use std::time::Duration;

pub async fn campus(include_records: bool) -> AppState {
    let mut config = AppConfig::default();
    config.realtime.include_records = include_records;
    config.feed.list_limit = 50;
    AppState::new(config).await.expect("failed to build state")
}

pub fn user(id: &str) -> UserId {
    UserId::new(id).unwrap()
}

/// 他ユーザーとしてバックエンドへ直接ミューテーションを送る
pub async fn mutate_as<E: Entity>(
    state: &AppState,
    actor: &str,
    mutation: Mutation,
) -> Result<E, AppError> {
    let record = state
        .backend
        .mutate(MutationRequest::new(Some(user(actor)), mutation))
        .await?;
    E::from_record(record)
}

pub async fn approved_note(state: &AppState, owner: &str, title: &str) -> Note {
    let note: Note = mutate_as(
        state,
        owner,
        Mutation::CreateNote(NoteDraft::new(title, "shared notes")),
    )
    .await
    .unwrap();
    state.backend.set_note_approval(&note.id, true).await.unwrap()
}

pub async fn spot_with_capacity(state: &AppState, owner: &str, capacity: u32) -> HangoutSpot {
    mutate_as(
        state,
        owner,
        Mutation::CreateSpot(SpotDraft {
            name: "Cafeteria terrace".into(),
            description: "Outdoor tables".into(),
            spot_type: "social".into(),
            location: GeoPoint::new(35.68, 139.76).unwrap(),
            capacity,
        }),
    )
    .await
    .unwrap()
}

/// 条件が満たされるまで待つ。購読経由の反映は非同期に届く
pub async fn eventually<F, Fut>(mut check: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    for _ in 0..200 {
        if check().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition was not met in time");
}
