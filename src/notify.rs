//! Account-notification boundary. Delivery (email, templating) lives in
//! an external service; the core only reports what happened to whom.

use crate::users::{BlockType, User};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountAction {
    Blocked(BlockType),
    Unblocked,
    Deleted,
}

impl AccountAction {
    fn describe(&self) -> &'static str {
        match self {
            AccountAction::Blocked(BlockType::Temporary) => "blocked for 24 hours",
            AccountAction::Blocked(_) => "blocked permanently",
            AccountAction::Unblocked => "unblocked",
            AccountAction::Deleted => "deleted",
        }
    }
}

pub trait AccountNotifier: Send + Sync {
    fn account_action(&self, user: &User, action: AccountAction, reason: Option<&str>);
    fn resend_verification(&self, user: &User);
}

/// Default sink: structured log lines an operator can forward.
pub struct LogNotifier;

impl AccountNotifier for LogNotifier {
    fn account_action(&self, user: &User, action: AccountAction, reason: Option<&str>) {
        tracing::info!(
            user_id = %user.id,
            alias = %user.alias,
            action = action.describe(),
            reason = reason.unwrap_or("-"),
            "account action notification"
        );
    }

    fn resend_verification(&self, user: &User) {
        tracing::info!(user_id = %user.id, alias = %user.alias, "verification resend requested");
    }
}
