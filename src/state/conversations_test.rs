use super::*;
use crate::state::test_helpers::{Call, MockApi, server_error, summary};

fn setup() -> (Arc<MockApi>, ConversationListState) {
    let api = Arc::new(MockApi::new());
    let state = ConversationListState::new(api.clone());
    (api, state)
}

async fn loaded(api: &MockApi, state: &mut ConversationListState) {
    api.push_list(Ok(vec![summary("a", "First"), summary("b", "Second"), summary("c", "Third")]));
    state.load_conversations().await;
}

fn ids(state: &ConversationListState) -> Vec<&str> {
    state.conversations().iter().map(|c| c.id.as_str()).collect()
}

// =============================================================
// defaults
// =============================================================

#[test]
fn list_state_default_empty() {
    let (_, state) = setup();
    assert!(state.conversations().is_empty());
    assert!(!state.is_loading());
    assert!(state.error_message().is_none());
}

// =============================================================
// load_conversations
// =============================================================

#[tokio::test]
async fn load_fetches_fixed_first_page() {
    let (api, mut state) = setup();
    loaded(&api, &mut state).await;

    assert_eq!(ids(&state), vec!["a", "b", "c"]);
    assert!(!state.is_loading());
    assert_eq!(api.calls(), vec![Call::List { limit: PAGE_LIMIT, offset: PAGE_OFFSET }]);
}

#[tokio::test]
async fn reload_replaces_entire_list() {
    let (api, mut state) = setup();
    loaded(&api, &mut state).await;

    api.push_list(Ok(vec![summary("z", "Only")]));
    state.load_conversations().await;

    assert_eq!(ids(&state), vec!["z"]);
}

#[tokio::test]
async fn load_failure_keeps_list_and_sets_error() {
    let (api, mut state) = setup();
    loaded(&api, &mut state).await;

    api.push_list(Err(server_error("Service unavailable")));
    state.load_conversations().await;

    assert_eq!(ids(&state), vec!["a", "b", "c"]);
    assert_eq!(state.error_message(), Some("Service unavailable"));
    assert!(!state.is_loading());
}

// =============================================================
// delete_conversation
// =============================================================

#[tokio::test]
async fn delete_confirmed_removes_entry() {
    let (api, mut state) = setup();
    loaded(&api, &mut state).await;
    api.push_delete(Ok(true));

    state.delete_conversation("b").await;

    assert_eq!(ids(&state), vec!["a", "c"]);
    assert!(state.error_message().is_none());
    assert!(api.calls().contains(&Call::Delete { id: "b".into() }));
}

#[tokio::test]
async fn delete_declined_keeps_list_without_error() {
    let (api, mut state) = setup();
    loaded(&api, &mut state).await;
    api.push_delete(Ok(false));

    state.delete_conversation("b").await;

    assert_eq!(ids(&state), vec!["a", "b", "c"]);
    assert!(state.error_message().is_none());
}

#[tokio::test]
async fn delete_error_keeps_list_and_sets_error() {
    let (api, mut state) = setup();
    loaded(&api, &mut state).await;
    api.push_delete(Err(server_error("conversation not found")));

    state.delete_conversation("b").await;

    assert_eq!(ids(&state), vec!["a", "b", "c"]);
    assert_eq!(state.error_message(), Some("conversation not found"));
}

#[tokio::test]
async fn delete_unknown_id_is_harmless() {
    let (api, mut state) = setup();
    loaded(&api, &mut state).await;

    state.delete_conversation("nope").await;

    assert_eq!(ids(&state), vec!["a", "b", "c"]);
}

// =============================================================
// published snapshots
// =============================================================

#[tokio::test]
async fn pending_load_is_observable_through_snapshots() {
    let (api, mut state) = setup();
    loaded(&api, &mut state).await;
    api.hang_list();
    let mut snapshots = state.subscribe();

    let seen = {
        let load = state.load_conversations();
        tokio::pin!(load);
        tokio::select! {
            () = &mut load => panic!("a hung load cannot finish"),
            seen = snapshots.wait_for(|s| s.is_loading) => seen.unwrap().clone(),
        }
    };

    assert_eq!(seen.conversations.len(), 3);
    assert!(seen.error_message.is_none());
    assert!(!snapshots.borrow().is_loading);
}

#[tokio::test]
async fn snapshot_tracks_delete() {
    let (api, mut state) = setup();
    loaded(&api, &mut state).await;
    let snapshots = state.subscribe();

    state.delete_conversation("b").await;

    let ids: Vec<String> = snapshots.borrow().conversations.iter().map(|c| c.id.clone()).collect();
    assert_eq!(ids, vec!["a", "c"]);
    assert_eq!(*snapshots.borrow(), state.snapshot());
}
