//! Role and ownership checks applied at the engine boundary.
//!
//! - No IO (callers pass the already-fetched `AccountStatus`)
//! - No panics

use circulation_core::{AccountId, LendingError, LendingResult};

use crate::{AccountStatus, Role};

/// Caller must be an active administrator.
///
/// Any other outcome (missing, inactive, plain user) is `Forbidden`: the
/// caller is acting, so an unknown caller is an authorization failure.
pub fn require_admin(caller: AccountId, status: &AccountStatus) -> LendingResult<()> {
    if status.is_active_with(Role::Admin) {
        Ok(())
    } else {
        tracing::debug!(%caller, ?status, "admin check failed");
        Err(LendingError::forbidden(caller, "admin role required"))
    }
}

/// Target must be an active borrower account.
///
/// A missing, inactive or non-`User` account is reported as `NotFound`: from
/// the engine's point of view there is no borrower with that id.
pub fn require_borrower(user: AccountId, status: &AccountStatus) -> LendingResult<()> {
    if status.is_active_with(Role::User) {
        Ok(())
    } else {
        Err(LendingError::account_not_found(user))
    }
}

/// Caller must exist and be active, whatever the role.
pub fn require_active(caller: AccountId, status: &AccountStatus) -> LendingResult<()> {
    if !status.found {
        return Err(LendingError::account_not_found(caller));
    }
    if !status.is_active {
        return Err(LendingError::forbidden(caller, "account is inactive"));
    }
    Ok(())
}

/// Caller acts on a record owned by `owner`: allowed for the owner or an
/// active admin.
pub fn require_owner_or_admin(
    caller: AccountId,
    status: &AccountStatus,
    owner: AccountId,
) -> LendingResult<()> {
    require_active(caller, status)?;
    if caller == owner || status.role.is_some_and(|r| r.is_admin()) {
        Ok(())
    } else {
        Err(LendingError::forbidden(caller, format!("record belongs to account {owner}")))
    }
}
