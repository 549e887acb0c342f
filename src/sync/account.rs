//! Acting-identity switching.
//!
//! Imports run as the privileged account. [`SwitchGuard`] switches on
//! creation and switches back when dropped, so the previous identity is
//! restored on every exit path, errors included.

use std::cell::RefCell;

use tracing::{debug, warn};

use crate::model::{Account, ROOT_ID, USER_TYPE};
use crate::storage::IdentityResolver;
use crate::sync::types::SyncResult;

/// The account imports run as: the identity at local id 1.
///
/// A store without that identity still gets a run as uid 1, named "admin".
///
/// # Errors
///
/// Returns an error if the lookup fails.
pub fn privileged_account<R: IdentityResolver + ?Sized>(resolver: &R) -> SyncResult<Account> {
    match resolver.find_by_local_id(USER_TYPE, ROOT_ID)? {
        Some(user) => Ok(Account::new(ROOT_ID, &user.label)),
        None => {
            warn!("Privileged account missing from the store, acting as uid {ROOT_ID}");
            Ok(Account::new(ROOT_ID, "admin"))
        }
    }
}

/// Switches the identity operations are performed as.
pub trait AccountSwitcher {
    /// The identity currently in effect.
    fn current(&self) -> Account;

    /// Make `account` current, remembering the previous identity.
    fn switch_to(&self, account: Account);

    /// Restore the identity in effect before the last `switch_to`.
    fn switch_back(&self);
}

/// In-process account switcher keeping a stack of previous identities.
#[derive(Debug)]
pub struct AccountStack {
    current: RefCell<Account>,
    previous: RefCell<Vec<Account>>,
}

impl AccountStack {
    #[must_use]
    pub fn new(initial: Account) -> Self {
        Self {
            current: RefCell::new(initial),
            previous: RefCell::new(Vec::new()),
        }
    }

    /// Number of switches not yet reverted.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.previous.borrow().len()
    }
}

impl Default for AccountStack {
    fn default() -> Self {
        Self::new(Account::anonymous())
    }
}

impl AccountSwitcher for AccountStack {
    fn current(&self) -> Account {
        self.current.borrow().clone()
    }

    fn switch_to(&self, account: Account) {
        debug!(account = %account.name, "Switching account");
        let previous = self.current.replace(account);
        self.previous.borrow_mut().push(previous);
    }

    fn switch_back(&self) {
        if let Some(previous) = self.previous.borrow_mut().pop() {
            debug!(account = %previous.name, "Switching back");
            self.current.replace(previous);
        }
    }
}

/// Scoped account switch.
pub struct SwitchGuard<'a> {
    switcher: &'a dyn AccountSwitcher,
    account: Account,
}

impl<'a> SwitchGuard<'a> {
    /// Switch to `account` until the guard is dropped.
    #[must_use]
    pub fn new(switcher: &'a dyn AccountSwitcher, account: Account) -> Self {
        switcher.switch_to(account.clone());
        Self { switcher, account }
    }

    /// The account switched to.
    #[must_use]
    pub fn account(&self) -> &Account {
        &self.account
    }
}

impl Drop for SwitchGuard<'_> {
    fn drop(&mut self) {
        self.switcher.switch_back();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guard_restores_previous_account() {
        let accounts = AccountStack::default();
        {
            let guard = SwitchGuard::new(&accounts, Account::new(1, "admin"));
            assert_eq!(guard.account().id, 1);
            assert_eq!(accounts.current().name, "admin");
            assert_eq!(accounts.depth(), 1);
        }
        assert!(accounts.current().is_anonymous());
        assert_eq!(accounts.depth(), 0);
    }

    #[test]
    fn test_guard_restores_on_error_path() {
        fn fails(accounts: &AccountStack) -> Result<(), String> {
            let _guard = SwitchGuard::new(accounts, Account::new(1, "admin"));
            Err("boom".to_string())
        }

        let accounts = AccountStack::new(Account::new(7, "editor"));
        assert!(fails(&accounts).is_err());
        assert_eq!(accounts.current().id, 7);
    }

    #[test]
    fn test_privileged_account_from_store() {
        let storage = crate::storage::SqliteStorage::open_memory().unwrap();
        let account = privileged_account(&storage).unwrap();
        assert_eq!(account.id, ROOT_ID);
        assert!(!account.name.is_empty());
    }

    #[test]
    fn test_switch_back_without_switch_is_noop() {
        let accounts = AccountStack::default();
        accounts.switch_back();
        assert!(accounts.current().is_anonymous());
    }
}
