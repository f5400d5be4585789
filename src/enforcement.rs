//! Warning/block state transitions. Pure decisions over a loaded user
//! record; persisting the mutated record is the caller's job.

use crate::users::{BlockType, User};

/// Sixth violation locks typing until an admin resets the count.
pub const WARNING_LIMIT: i64 = 6;

pub const TEMP_BLOCK_SECS: i64 = 24 * 60 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViolationOutcome {
    Warned { count: i64, remaining: i64 },
    TypingBlocked { count: i64 },
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum EnforcementError {
    #[error("Cannot {0} admin")]
    AdminTarget(&'static str),
}

pub fn record_violation(user: &mut User) -> ViolationOutcome {
    user.warning_count += 1;
    if user.warning_count >= WARNING_LIMIT {
        user.is_typing_blocked = true;
        ViolationOutcome::TypingBlocked { count: user.warning_count }
    } else {
        ViolationOutcome::Warned {
            count: user.warning_count,
            remaining: WARNING_LIMIT - user.warning_count,
        }
    }
}

/// Lazily clears an expired temporary block. Runs on every connection
/// attempt; there is no background sweep. Returns true if it cleared one.
pub fn check_block_expiry(user: &mut User, now: i64) -> bool {
    if user.block_type == BlockType::Temporary
        && user.block_expires_at.is_some_and(|expires| now > expires)
    {
        unblock(user);
        return true;
    }
    false
}

pub fn block(user: &mut User, kind: BlockType, now: i64) -> Result<(), EnforcementError> {
    if user.is_admin() {
        return Err(EnforcementError::AdminTarget("block"));
    }

    user.is_blocked = true;
    user.block_type = kind;
    user.blocked_at = Some(now);
    user.block_expires_at = match kind {
        BlockType::Temporary => Some(now + TEMP_BLOCK_SECS),
        _ => None,
    };
    Ok(())
}

pub fn unblock(user: &mut User) {
    user.is_blocked = false;
    user.block_type = BlockType::None;
    user.blocked_at = None;
    user.block_expires_at = None;
}

pub fn reset_warnings(user: &mut User) {
    user.warning_count = 0;
    user.is_typing_blocked = false;
}

pub fn soft_delete(user: &mut User) -> Result<(), EnforcementError> {
    if user.is_admin() {
        return Err(EnforcementError::AdminTarget("delete"));
    }

    user.is_deleted = true;
    user.is_online = false;
    Ok(())
}
