use crate::enforcement::{self, ViolationOutcome};
use crate::error::ApiResult;
use crate::messages::{self, MessageKind};
use crate::presence::ConnectionId;
use crate::users;
use crate::AppState;

use super::events::{MessagePayload, ServerEvent};

pub const MAX_MESSAGE_LEN: usize = 1000;

/// One inbound `send_message` event, start to finish: standing checks,
/// moderation verdict, then either a room-wide broadcast or a warning.
pub async fn handle_send(
    state: &AppState,
    conn_id: ConnectionId,
    sender_id: &str,
    content: &str,
) -> ApiResult<()> {
    // Fresh read, not the record captured at connect time: admin actions
    // taken mid-connection must apply to the very next message.
    let user = users::find(&state.db, sender_id).await?;
    let Some(user) = user.filter(|u| !u.is_deleted && !u.is_blocked) else {
        state.presence.send_to(
            conn_id,
            ServerEvent::ErrorMessage { message: "Your account is restricted".to_owned() },
        );
        return Ok(());
    };
    if user.is_typing_blocked {
        state.presence.send_to(
            conn_id,
            ServerEvent::ErrorMessage {
                message: "Your typing has been blocked due to repeated violations. Contact admin for help."
                    .to_owned(),
            },
        );
        return Ok(());
    }

    let content = content.trim();
    if content.is_empty() {
        return Ok(());
    }
    if content.chars().count() > MAX_MESSAGE_LEN {
        state.presence.send_to(
            conn_id,
            ServerEvent::ErrorMessage {
                message: format!("Message too long (max {MAX_MESSAGE_LEN} characters)"),
            },
        );
        return Ok(());
    }

    let verdict = state.moderation.classify(content).await;

    if verdict.inappropriate {
        // Kept for the audit trail; never broadcast.
        messages::insert(
            &state.db,
            &user.id,
            &user.alias,
            content,
            MessageKind::Warning,
            verdict.reason.as_deref(),
        )
        .await?;

        let outcome = {
            let lock = state.user_locks.acquire(&user.id);
            let _guard = lock.lock().await;
            let Some(mut fresh) = users::find(&state.db, &user.id).await? else {
                return Ok(());
            };
            let outcome = enforcement::record_violation(&mut fresh);
            users::save_enforcement(&state.db, &fresh).await?;
            outcome
        };

        // The warning is already persisted against the user; delivery is
        // skipped if this connection has meanwhile closed.
        let notice = match outcome {
            ViolationOutcome::Warned { count, remaining } => ServerEvent::MessageFiltered {
                message: format!(
                    "Your message was blocked due to inappropriate content. Warning {count}/5. You will be blocked at 6 warnings."
                ),
                warning_count: count,
                remaining_warnings: remaining,
            },
            ViolationOutcome::TypingBlocked { count } => ServerEvent::TypingBlocked {
                message: "Your typing has been permanently blocked due to repeated violations (6 warnings). Contact admin."
                    .to_owned(),
                warning_count: count,
            },
        };
        state.presence.send_to(conn_id, notice);
        return Ok(());
    }

    let message =
        messages::insert(&state.db, &user.id, &user.alias, content, MessageKind::Message, None).await?;
    state.presence.broadcast(ServerEvent::NewMessage(MessagePayload::from(&message)));
    Ok(())
}
