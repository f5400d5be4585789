use axum::extract::ws::{Message as WsMessage, WebSocket};
use axum::extract::{Query, State, WebSocketUpgrade};
use axum::response::Response;
use axum::debug_handler;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use uuid::Uuid;

use tokio::sync::mpsc;

use crate::error::{ApiError, ApiResult};
use crate::presence::{ConnectionId, Outbound};
use crate::users::User;
use crate::{AppState, auth, messages, users};

use super::events::{ClientEvent, ServerEvent};
use super::msg;

#[derive(Deserialize)]
pub(crate) struct WsQuery {
    token: Option<String>,
}

/// Authentication happens before the upgrade is accepted; a refused
/// handshake leaves no partial state behind.
#[debug_handler]
pub(crate) async fn chat_ws(
    State(state): State<AppState>,
    Query(WsQuery { token }): Query<WsQuery>,
    ws: WebSocketUpgrade,
) -> ApiResult<Response> {
    let token = token.ok_or(ApiError::Unauthorized)?;
    let user = auth::resolve_connection(&state, &token).await?;
    Ok(ws.on_upgrade(move |socket| handle_socket(state, user, socket)))
}

async fn handle_socket(state: AppState, user: User, socket: WebSocket) {
    let conn_id: ConnectionId = Uuid::now_v7();
    tracing::info!(alias = %user.alias, %conn_id, "user connected");

    if let Err(e) = users::set_online(&state.db, &user.id, true).await {
        tracing::warn!(error = %e, "failed to mark user online");
    }

    let (tx, mut rx) = mpsc::unbounded_channel();
    state.presence.join(conn_id, &user.id, &user.alias, tx);
    // The room starts fresh on every connect.
    state.presence.send_to(conn_id, ServerEvent::RecentMessages(Vec::new()));

    let (mut sink, mut stream) = socket.split();

    let mut send_task = tokio::spawn(async move {
        while let Some(out) = rx.recv().await {
            match out {
                Outbound::Event(event) => {
                    let Ok(text) = serde_json::to_string(&event) else { continue };
                    if sink.send(WsMessage::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                Outbound::Close => {
                    let _ = sink.send(WsMessage::Close(None)).await;
                    break;
                }
            }
        }
    });

    let recv_state = state.clone();
    let recv_user = user.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(frame)) = stream.next().await {
            match frame {
                WsMessage::Text(text) => {
                    let Ok(event) = serde_json::from_str::<ClientEvent>(text.as_str()) else {
                        continue;
                    };
                    handle_event(&recv_state, conn_id, &recv_user, event);
                }
                WsMessage::Close(_) => break,
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    disconnect(&state, conn_id, &user).await;
}

fn handle_event(state: &AppState, conn_id: ConnectionId, user: &User, event: ClientEvent) {
    match event {
        ClientEvent::SendMessage { content } => {
            // Detached on purpose: a connection closing mid-moderation must
            // not cancel the verdict's side effects. The warning state
            // belongs to the user; delivery back is liveness-checked.
            let state = state.clone();
            let user_id = user.id.clone();
            let alias = user.alias.clone();
            tokio::spawn(async move {
                if let Err(e) = msg::handle_send(&state, conn_id, &user_id, &content).await {
                    tracing::warn!(error = %e, alias = %alias, "send_message failed");
                    state.presence.send_to(
                        conn_id,
                        ServerEvent::ErrorMessage { message: "Failed to send message".to_owned() },
                    );
                }
            });
        }
        ClientEvent::TypingStart => {
            state
                .presence
                .broadcast_except(conn_id, ServerEvent::UserTyping { alias: user.alias.clone() });
        }
        ClientEvent::TypingStop => {
            state
                .presence
                .broadcast_except(conn_id, ServerEvent::UserStopTyping { alias: user.alias.clone() });
        }
    }
}

pub async fn disconnect(state: &AppState, conn_id: ConnectionId, user: &User) {
    tracing::info!(alias = %user.alias, %conn_id, "user disconnected");

    // Any disconnect wipes the whole room, not just this user's messages.
    if let Err(e) = messages::delete_all(&state.db).await {
        tracing::warn!(error = %e, "failed to clear messages on disconnect");
    }
    if let Err(e) = users::set_online(&state.db, &user.id, false).await {
        tracing::warn!(error = %e, "failed to mark user offline");
    }
    state.presence.leave(conn_id);
}
