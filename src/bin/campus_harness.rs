use std::time::Duration;

use campus_lib::application::services::AuthAware;
use campus_lib::domain::entities::{HangoutCheckin, HangoutSpot, Note, NoteDraft, SpotDraft};
use campus_lib::domain::value_objects::{GeoPoint, UserId};
use campus_lib::domain::view::{NoteViewMode, SpotViewMode};
use campus_lib::domain::CheckinState;
use campus_lib::{AppConfig, bootstrap, init_logging};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

const DEFAULT_SETTLE_MS: u64 = 50;

#[derive(Debug, Serialize)]
struct HarnessSummary {
    community_notes: Vec<Note>,
    liked_note_ids: Vec<String>,
    spots: Vec<HangoutSpot>,
    roster: Vec<HangoutCheckin>,
    gate_state: CheckinState,
    rejections: Vec<String>,
}

fn settle_duration() -> Duration {
    let millis = std::env::var("CAMPUS_HARNESS_SETTLE_MS")
        .ok()
        .and_then(|value| value.trim().parse::<u64>().ok())
        .unwrap_or(DEFAULT_SETTLE_MS);
    Duration::from_millis(millis)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();
    let settle = settle_duration();

    let state = bootstrap(AppConfig::from_env()).await?;
    let alice = UserId::new("alice").map_err(anyhow::Error::msg)?;
    let bob = UserId::new("bob").map_err(anyhow::Error::msg)?;
    state.backend.upsert_profile(&alice, "Alice").await?;
    state.backend.upsert_profile(&bob, "Bob").await?;

    state.auth.sign_in(alice.clone());

    let feed = state.open_note_feed(NoteViewMode::Community).await?;
    let spots = state.open_spot_board(SpotViewMode::All).await?;
    let gate = state.gate();
    let _feed_binding = state.bind_auth(Arc::new(feed.clone()) as Arc<dyn AuthAware>);
    let _spot_binding = state.bind_auth(Arc::new(spots.clone()) as Arc<dyn AuthAware>);
    let _gate_binding = state.bind_auth(Arc::clone(&gate) as Arc<dyn AuthAware>);

    let note = feed
        .create(NoteDraft::new("Thermodynamics cheat sheet", "dU = TdS - PdV").with_subject("physics"))
        .await?;
    state.backend.set_note_approval(&note.id, true).await?;
    tokio::time::sleep(settle).await;
    feed.like(&note.id).await?;

    let spot = spots
        .create(SpotDraft {
            name: "Library window seats".into(),
            description: "Second floor, east side".into(),
            spot_type: "study".into(),
            location: GeoPoint::new(35.0262, 135.7808).map_err(anyhow::Error::msg)?,
            capacity: 1,
        })
        .await?;
    let roster = state.open_checkin_roster(spot.id.clone()).await?;
    gate.check_in(&spots, &spot.id).await?;
    tokio::time::sleep(settle).await;

    let mut rejections = Vec::new();
    state.auth.sign_in(bob);
    tokio::time::sleep(settle).await;
    if let Err(e) = gate.check_in(&spots, &spot.id).await {
        warn!("Check-in rejected: {}", e);
        rejections.push(e.to_string());
    }

    state.auth.sign_in(alice);
    tokio::time::sleep(settle).await;

    let liked_note_ids = {
        let mut ids = Vec::new();
        for note in feed.notes().await {
            if feed.is_liked(&note.id).await {
                ids.push(note.id.to_string());
            }
        }
        ids
    };

    let summary = HarnessSummary {
        community_notes: feed.notes().await,
        liked_note_ids,
        spots: spots.spots().await,
        roster: roster.checkins().await,
        gate_state: gate.state().await,
        rejections,
    };

    info!(
        notes = summary.community_notes.len(),
        spots = summary.spots.len(),
        roster = summary.roster.len(),
        "Harness finished"
    );
    println!("{}", serde_json::to_string_pretty(&summary)?);

    roster.close().await;
    spots.close().await;
    feed.close().await;
    state.shutdown().await;
    Ok(())
}
