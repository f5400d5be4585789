//! Drives the gateway end to end against an in-memory store: moderation
//! verdicts, warning escalation, admin enforcement, and the ephemeral
//! message lifecycle.

use std::time::Duration;

use sqlx::sqlite::SqlitePoolOptions;
use tokio::sync::mpsc::{self, UnboundedReceiver};
use uuid::Uuid;

use incognichat::chat::{self, ServerEvent};
use incognichat::config::{Config, ModerationConfig};
use incognichat::presence::{ConnectionId, Outbound};
use incognichat::users::{self, BlockType, User};
use incognichat::{AppState, auth, db, enforcement, messages, now_ts};

fn test_config() -> Config {
    Config {
        bind_addr: "127.0.0.1:0".to_owned(),
        database_url: "sqlite::memory:".to_owned(),
        client_origin: "http://localhost:5173".to_owned(),
        token_secret: "test-secret-key-at-least-32-chars".to_owned(),
        token_ttl_secs: 3600,
        service_key: "test-service-key".to_owned(),
        moderation: ModerationConfig {
            api_key: None,
            base_url: "http://localhost:9".to_owned(),
            model: "test".to_owned(),
            timeout: Duration::from_millis(100),
        },
    }
}

async fn test_state() -> AppState {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    db::init(&pool).await.unwrap();
    AppState::new(pool, &test_config())
}

fn join(state: &AppState, user: &User) -> (ConnectionId, UnboundedReceiver<Outbound>) {
    let conn_id = Uuid::now_v7();
    let (tx, rx) = mpsc::unbounded_channel();
    state.presence.join(conn_id, &user.id, &user.alias, tx);
    (conn_id, rx)
}

fn events(rx: &mut UnboundedReceiver<Outbound>) -> Vec<ServerEvent> {
    let mut out = Vec::new();
    while let Ok(item) = rx.try_recv() {
        if let Outbound::Event(event) = item {
            out.push(event);
        }
    }
    out
}

#[tokio::test]
async fn clean_message_reaches_everyone_including_the_sender() {
    let state = test_state().await;
    let alice = users::create(&state.db, true).await.unwrap();
    let bob = users::create(&state.db, true).await.unwrap();
    let (conn_a, mut rx_a) = join(&state, &alice);
    let (_conn_b, mut rx_b) = join(&state, &bob);
    events(&mut rx_a);
    events(&mut rx_b);

    // No remote classifier is configured, so the denylist is the only
    // filter; a clean body must pass it.
    chat::handle_send(&state, conn_a, &alice.id, "good morning everyone").await.unwrap();

    for rx in [&mut rx_a, &mut rx_b] {
        let received = events(rx);
        assert_eq!(received.len(), 1);
        match &received[0] {
            ServerEvent::NewMessage(payload) => {
                assert_eq!(payload.content, "good morning everyone");
                assert_eq!(payload.alias, alice.alias);
            }
            other => panic!("expected new_message, got {other:?}"),
        }
    }

    assert_eq!(messages::count_all(&state.db).await.unwrap(), 1);
    assert_eq!(messages::count_filtered(&state.db).await.unwrap(), 0);
}

#[tokio::test]
async fn flagged_message_warns_the_sender_only() {
    let state = test_state().await;
    let alice = users::create(&state.db, true).await.unwrap();
    let bob = users::create(&state.db, true).await.unwrap();
    let (conn_a, mut rx_a) = join(&state, &alice);
    let (_conn_b, mut rx_b) = join(&state, &bob);
    events(&mut rx_a);
    events(&mut rx_b);

    // Remote classifier unreachable (no key): the denylist decides.
    chat::handle_send(&state, conn_a, &alice.id, "you are an idiot").await.unwrap();

    let received = events(&mut rx_a);
    assert_eq!(received.len(), 1);
    match &received[0] {
        ServerEvent::MessageFiltered { warning_count, remaining_warnings, .. } => {
            assert_eq!(*warning_count, 1);
            assert_eq!(*remaining_warnings, 5);
        }
        other => panic!("expected message_filtered, got {other:?}"),
    }
    assert!(events(&mut rx_b).is_empty(), "warnings must never be broadcast");

    let alice = users::find(&state.db, &alice.id).await.unwrap().unwrap();
    assert_eq!(alice.warning_count, 1);
    assert!(!alice.is_typing_blocked);

    // The utterance is retained for audit, flagged.
    assert_eq!(messages::count_all(&state.db).await.unwrap(), 1);
    assert_eq!(messages::count_filtered(&state.db).await.unwrap(), 1);
}

#[tokio::test]
async fn sixth_violation_locks_typing_and_stays_locked() {
    let state = test_state().await;
    let mut alice = users::create(&state.db, true).await.unwrap();
    alice.warning_count = 5;
    users::save_enforcement(&state.db, &alice).await.unwrap();

    let (conn_a, mut rx_a) = join(&state, &alice);
    events(&mut rx_a);

    chat::handle_send(&state, conn_a, &alice.id, "you are an idiot").await.unwrap();

    let received = events(&mut rx_a);
    assert_eq!(received.len(), 1);
    match &received[0] {
        ServerEvent::TypingBlocked { warning_count, .. } => assert_eq!(*warning_count, 6),
        other => panic!("expected typing_blocked, got {other:?}"),
    }

    let alice_db = users::find(&state.db, &alice.id).await.unwrap().unwrap();
    assert_eq!(alice_db.warning_count, 6);
    assert!(alice_db.is_typing_blocked);

    // Even clean messages are refused now, without touching the count.
    chat::handle_send(&state, conn_a, &alice.id, "hello again").await.unwrap();
    let received = events(&mut rx_a);
    assert!(matches!(&received[..], [ServerEvent::ErrorMessage { .. }]));
    let alice_db = users::find(&state.db, &alice.id).await.unwrap().unwrap();
    assert_eq!(alice_db.warning_count, 6);
}

#[tokio::test]
async fn input_errors_never_escalate_warnings() {
    let state = test_state().await;
    let alice = users::create(&state.db, true).await.unwrap();
    let (conn_a, mut rx_a) = join(&state, &alice);
    events(&mut rx_a);

    // Empty and whitespace-only bodies are dropped silently.
    chat::handle_send(&state, conn_a, &alice.id, "   ").await.unwrap();
    assert!(events(&mut rx_a).is_empty());

    // Oversized bodies are refused to the sender only.
    let oversized = "x".repeat(chat::MAX_MESSAGE_LEN + 1);
    chat::handle_send(&state, conn_a, &alice.id, &oversized).await.unwrap();
    let received = events(&mut rx_a);
    assert!(matches!(&received[..], [ServerEvent::ErrorMessage { .. }]));

    let alice = users::find(&state.db, &alice.id).await.unwrap().unwrap();
    assert_eq!(alice.warning_count, 0);
    assert_eq!(messages::count_all(&state.db).await.unwrap(), 0);
}

#[tokio::test]
async fn blocked_sender_is_refused_before_moderation() {
    let state = test_state().await;
    let mut alice = users::create(&state.db, true).await.unwrap();
    enforcement::block(&mut alice, BlockType::Permanent, now_ts()).unwrap();
    users::save_enforcement(&state.db, &alice).await.unwrap();

    let (conn_a, mut rx_a) = join(&state, &alice);
    events(&mut rx_a);

    chat::handle_send(&state, conn_a, &alice.id, "hello").await.unwrap();
    let received = events(&mut rx_a);
    assert!(matches!(
        &received[..],
        [ServerEvent::ErrorMessage { message }] if message == "Your account is restricted"
    ));
    assert_eq!(messages::count_all(&state.db).await.unwrap(), 0);
}

#[tokio::test]
async fn any_disconnect_wipes_the_room() {
    let state = test_state().await;
    let alice = users::create(&state.db, true).await.unwrap();
    let bob = users::create(&state.db, true).await.unwrap();
    let (conn_a, mut rx_a) = join(&state, &alice);
    let (conn_b, mut rx_b) = join(&state, &bob);
    events(&mut rx_a);
    events(&mut rx_b);

    chat::handle_send(&state, conn_a, &alice.id, "good morning").await.unwrap();
    chat::handle_send(&state, conn_b, &bob.id, "morning alice").await.unwrap();
    assert_eq!(messages::count_all(&state.db).await.unwrap(), 2);

    // Bob leaving erases Alice's messages too.
    chat::disconnect(&state, conn_b, &bob).await;

    assert_eq!(messages::count_all(&state.db).await.unwrap(), 0);
    assert_eq!(state.presence.live_count(), 1);

    let received = events(&mut rx_a);
    assert!(received.iter().any(|e| matches!(
        e,
        ServerEvent::UserLeft { alias, online_count: 1 } if *alias == bob.alias
    )));

    let bob_db = users::find(&state.db, &bob.id).await.unwrap().unwrap();
    assert!(!bob_db.is_online);
}

#[tokio::test]
async fn connection_auth_resolves_block_expiry_lazily() {
    let state = test_state().await;
    let mut alice = users::create(&state.db, true).await.unwrap();

    // Still-active temporary block: refused at the handshake.
    enforcement::block(&mut alice, BlockType::Temporary, now_ts()).unwrap();
    users::save_enforcement(&state.db, &alice).await.unwrap();
    let token = state.tokens.issue(&alice.id).unwrap();
    assert!(auth::resolve_connection(&state, &token).await.is_err());

    // Expired block: cleared on this very attempt, connection admitted.
    alice.block_expires_at = Some(now_ts() - 10);
    users::save_enforcement(&state.db, &alice).await.unwrap();
    let resolved = auth::resolve_connection(&state, &token).await.unwrap();
    assert!(!resolved.is_blocked);
    assert_eq!(resolved.block_type, BlockType::None);

    let alice_db = users::find(&state.db, &alice.id).await.unwrap().unwrap();
    assert!(!alice_db.is_blocked);
    assert_eq!(alice_db.block_expires_at, None);

    // Deleted accounts and bad tokens never get through.
    assert!(auth::resolve_connection(&state, "garbage").await.is_err());
}
