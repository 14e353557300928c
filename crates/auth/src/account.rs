//! Narrow view of the external account store.
//!
//! The lending engine never registers, authenticates or mutates accounts. It
//! only asks "does this id exist, is it active, and what is its role".

use std::collections::HashMap;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use circulation_core::{AccountId, Entity};

use crate::Role;

/// Answer to an account lookup.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountStatus {
    pub found: bool,
    pub is_active: bool,
    /// `None` when the account was not found.
    pub role: Option<Role>,
}

impl AccountStatus {
    pub const MISSING: AccountStatus = AccountStatus {
        found: false,
        is_active: false,
        role: None,
    };

    pub fn active(role: Role) -> Self {
        Self {
            found: true,
            is_active: true,
            role: Some(role),
        }
    }

    pub fn inactive(role: Role) -> Self {
        Self {
            found: true,
            is_active: false,
            role: Some(role),
        }
    }

    /// Found, active and holding `role`.
    pub fn is_active_with(&self, role: Role) -> bool {
        self.found && self.is_active && self.role == Some(role)
    }
}

/// Consumed collaborator contract for account data.
///
/// Implementations may be slow (remote store); callers must not hold engine
/// locks across these calls.
pub trait AccountLookup: Send + Sync {
    fn exists(&self, id: AccountId) -> AccountStatus;

    /// Human-readable name for listings. Not used for any decision.
    fn display_name(&self, _id: AccountId) -> Option<String> {
        None
    }
}

impl<L> AccountLookup for std::sync::Arc<L>
where
    L: AccountLookup + ?Sized,
{
    fn exists(&self, id: AccountId) -> AccountStatus {
        (**self).exists(id)
    }

    fn display_name(&self, id: AccountId) -> Option<String> {
        (**self).display_name(id)
    }
}

/// Account row as mirrored from the account store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountRecord {
    pub id: AccountId,
    pub display_name: String,
    pub role: Role,
    pub is_active: bool,
}

impl AccountRecord {
    pub fn user(id: AccountId, display_name: impl Into<String>) -> Self {
        Self {
            id,
            display_name: display_name.into(),
            role: Role::User,
            is_active: true,
        }
    }

    pub fn admin(id: AccountId, display_name: impl Into<String>) -> Self {
        Self {
            id,
            display_name: display_name.into(),
            role: Role::Admin,
            is_active: true,
        }
    }

    pub fn deactivated(mut self) -> Self {
        self.is_active = false;
        self
    }
}

impl Entity for AccountRecord {
    type Id = AccountId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// In-memory account directory for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryAccountDirectory {
    accounts: RwLock<HashMap<AccountId, AccountRecord>>,
}

impl InMemoryAccountDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an account (stands in for external account management).
    pub fn upsert(&self, record: AccountRecord) {
        self.accounts.write().insert(record.id, record);
    }

    pub fn set_active(&self, id: AccountId, is_active: bool) -> bool {
        match self.accounts.write().get_mut(&id) {
            Some(record) => {
                record.is_active = is_active;
                true
            }
            None => false,
        }
    }
}

impl AccountLookup for InMemoryAccountDirectory {
    fn exists(&self, id: AccountId) -> AccountStatus {
        match self.accounts.read().get(&id) {
            Some(record) => AccountStatus {
                found: true,
                is_active: record.is_active,
                role: Some(record.role),
            },
            None => AccountStatus::MISSING,
        }
    }

    fn display_name(&self, id: AccountId) -> Option<String> {
        self.accounts.read().get(&id).map(|r| r.display_name.clone())
    }
}
