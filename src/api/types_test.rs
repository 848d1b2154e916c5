use super::*;

// =============================================================================
// Role
// =============================================================================

#[test]
fn role_decodes_known_values() {
    let role: Role = serde_json::from_str("\"assistant\"").unwrap();
    assert_eq!(role, Role::Assistant);
    let role: Role = serde_json::from_str("\"user\"").unwrap();
    assert_eq!(role, Role::User);
}

#[test]
fn role_unknown_value_maps_to_other() {
    let role: Role = serde_json::from_str("\"tool\"").unwrap();
    assert_eq!(role, Role::Other);
}

// =============================================================================
// Message
// =============================================================================

#[test]
fn local_user_message_has_fresh_id_and_timestamp() {
    let a = Message::local_user("hi");
    let b = Message::local_user("hi");
    assert_eq!(a.role, Role::User);
    assert_eq!(a.content, "hi");
    assert_ne!(a.id, b.id);
    assert!(a.created_at > 1_600_000_000);
}

#[test]
fn chat_reply_converts_into_message() {
    let reply: ChatReply = serde_json::from_value(serde_json::json!({
        "message_id": "m-2",
        "role": "assistant",
        "content": "hello",
        "conversation_id": "c-1",
        "created_at": 1_700_000_000
    }))
    .unwrap();

    let msg = Message::from(reply);
    assert_eq!(msg.id, "m-2");
    assert_eq!(msg.role, Role::Assistant);
    assert_eq!(msg.content, "hello");
    assert_eq!(msg.created_at, 1_700_000_000);
}

#[test]
fn stream_chunk_defaults_missing_fields() {
    let delta: StreamChunk = serde_json::from_str(r#"{"delta":"Hel"}"#).unwrap();
    assert_eq!(delta.delta, "Hel");
    assert!(!delta.done);

    let last: StreamChunk =
        serde_json::from_str(r#"{"done":true,"message_id":"m-9","content":"Hello"}"#).unwrap();
    assert!(last.done);
    assert!(last.delta.is_empty());
    assert_eq!(last.message_id.as_deref(), Some("m-9"));
    assert_eq!(last.content.as_deref(), Some("Hello"));
}

#[test]
fn only_auth_failures_end_the_session() {
    assert!(ApiError::Unauthorized.ends_session());
    assert!(ApiError::NoDeviceToken.ends_session());
    assert!(!ApiError::Network("offline".into()).ends_session());
    assert!(!ApiError::StreamInterrupted.ends_session());
}

// =============================================================================
// Conversations
// =============================================================================

#[test]
fn conversation_detail_tolerates_missing_optional_fields() {
    let detail: ConversationDetail = serde_json::from_str(r#"{"id":"c-1"}"#).unwrap();
    assert_eq!(detail.id, "c-1");
    assert!(detail.title.is_none());
    assert!(detail.messages.is_empty());
}

#[test]
fn conversation_list_response_unwraps_envelope() {
    let body = r#"{"conversations":[{"id":"a","title":"First","created_at":1,"message_count":3},{"id":"b","title":null}]}"#;
    let parsed: ConversationListResponse = serde_json::from_str(body).unwrap();
    assert_eq!(parsed.conversations.len(), 2);
    assert_eq!(parsed.conversations[0].message_count, 3);
    assert!(parsed.conversations[1].title.is_none());
}

// =============================================================================
// Auth
// =============================================================================

#[test]
fn auth_payload_only_requires_token() {
    let payload: AuthPayload = serde_json::from_str(r#"{"token":"tok","tier":"free"}"#).unwrap();
    assert_eq!(payload.token, "tok");
    assert_eq!(payload.tier.as_deref(), Some("free"));
    assert!(payload.user_id.is_none());
}

// =============================================================================
// ApiError display
// =============================================================================

#[test]
fn api_error_display_is_human_readable() {
    let err = ApiError::Api { status: 409, message: "email already registered".into() };
    assert_eq!(err.to_string(), "email already registered");
    assert_eq!(ApiError::Decode("bad".into()).to_string(), "Failed to parse server response");
    assert!(ApiError::Network("refused".into()).to_string().starts_with("Network error"));
}
