mod common;

use campus_lib::application::ports::Mutation;
use campus_lib::domain::entities::{Note, NoteComment, NoteDraft, NotePatch};
use campus_lib::domain::view::NoteViewMode;
use common::{approved_note, campus, eventually, mutate_as, user};

#[tokio::test]
async fn community_feed_tracks_remote_visibility_changes() {
    let state = campus(true).await;
    state.auth.sign_in(user("alice"));
    let feed = state.open_note_feed(NoteViewMode::Community).await.unwrap();

    let pending: Note = mutate_as(
        &state,
        "bob",
        Mutation::CreateNote(NoteDraft::new("Organic chem", "notes")),
    )
    .await
    .unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(30)).await;
    assert!(feed.notes().await.is_empty());

    state.backend.set_note_approval(&pending.id, true).await.unwrap();
    eventually(|| async { feed.notes().await.len() == 1 }).await;

    mutate_as::<Note>(
        &state,
        "bob",
        Mutation::UpdateNote {
            id: pending.id.clone(),
            patch: NotePatch {
                is_public: Some(false),
                ..NotePatch::default()
            },
        },
    )
    .await
    .unwrap();
    eventually(|| async { feed.notes().await.is_empty() }).await;

    feed.close().await;
}

#[tokio::test]
async fn id_only_events_are_resolved_through_detail_fetch() {
    let state = campus(false).await;
    state.auth.sign_in(user("alice"));
    let feed = state.open_note_feed(NoteViewMode::Community).await.unwrap();

    let note = approved_note(&state, "bob", "Statistics").await;

    eventually(|| async {
        feed.notes()
            .await
            .first()
            .is_some_and(|n| n.id == note.id && n.is_approved)
    })
    .await;

    mutate_as::<Note>(&state, "bob", Mutation::DeleteNote { id: note.id.clone() })
        .await
        .unwrap();
    eventually(|| async { feed.notes().await.is_empty() }).await;
}

#[tokio::test]
async fn likes_survive_resync_and_drive_favorites() {
    let state = campus(true).await;
    state.auth.sign_in(user("alice"));
    let note = approved_note(&state, "bob", "Microeconomics").await;
    let feed = state.open_note_feed(NoteViewMode::Community).await.unwrap();

    assert!(feed.toggle_like(&note.id).await.unwrap());
    assert!(feed.is_liked(&note.id).await);
    assert_eq!(feed.notes().await[0].like_count, 1);

    feed.set_view(NoteViewMode::Favorites).await.unwrap();
    let favorites = feed.notes().await;
    assert_eq!(favorites.len(), 1);
    assert_eq!(favorites[0].like_count, 1);

    feed.unlike(&note.id).await.unwrap();
    assert!(feed.notes().await.is_empty());

    feed.set_view(NoteViewMode::Community).await.unwrap();
    eventually(|| async {
        feed.notes()
            .await
            .first()
            .is_some_and(|n| n.like_count == 0)
    })
    .await;
    assert!(!feed.is_liked(&note.id).await);
}

#[tokio::test]
async fn own_drafts_show_in_mine_but_not_community() {
    let state = campus(true).await;
    state.auth.sign_in(user("alice"));
    let mine = state.open_note_feed(NoteViewMode::Mine).await.unwrap();
    let community = state.open_note_feed(NoteViewMode::Community).await.unwrap();

    let note = mine
        .create(NoteDraft::new("Draft", "wip").private())
        .await
        .unwrap();

    assert_eq!(mine.notes().await.len(), 1);
    tokio::time::sleep(std::time::Duration::from_millis(30)).await;
    assert!(community.notes().await.is_empty());

    mine.delete(&note.id).await.unwrap();
    eventually(|| async { mine.notes().await.is_empty() }).await;
}

#[tokio::test]
async fn comment_thread_follows_its_note() {
    let state = campus(true).await;
    state.auth.sign_in(user("alice"));
    let note = approved_note(&state, "alice", "Linear algebra").await;
    let other = approved_note(&state, "alice", "Calculus").await;
    let thread = state.open_comment_thread(note.id.clone()).await.unwrap();

    mutate_as::<NoteComment>(
        &state,
        "bob",
        Mutation::CreateComment {
            note_id: note.id.clone(),
            content: "Thanks for sharing".into(),
        },
    )
    .await
    .unwrap();
    mutate_as::<NoteComment>(
        &state,
        "bob",
        Mutation::CreateComment {
            note_id: other.id.clone(),
            content: "Elsewhere".into(),
        },
    )
    .await
    .unwrap();
    eventually(|| async { thread.comments().await.len() == 1 }).await;

    let mine = thread.add("Glad it helps").await.unwrap();
    assert!(thread.comments().await.iter().any(|c| c.id == mine.id));
    thread.delete(&mine.id).await.unwrap();
    eventually(|| async { thread.comments().await.len() == 1 }).await;

    mutate_as::<Note>(&state, "alice", Mutation::DeleteNote { id: note.id.clone() })
        .await
        .unwrap();
    eventually(|| async { thread.comments().await.is_empty() }).await;
}
