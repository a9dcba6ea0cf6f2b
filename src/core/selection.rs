//! Account selection for batch scoping.
//!
//! Mirrors the account-picker flow of the presentation layer: a fetch or
//! update action applies to a chosen, non-empty subset of accounts. The
//! selection is purely a filter fed into the submission coordinator.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::core::order::AccountId;
use crate::errors::{Error, Result};

/// The non-empty set of accounts one fetch/update action applies to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountSelectionSet {
    accounts: BTreeSet<AccountId>,
}

impl AccountSelectionSet {
    /// Builds a selection from the picked accounts.
    ///
    /// # Errors
    /// Returns `NoAccountsSelected` for an empty selection.
    pub fn new<I>(accounts: I) -> Result<Self>
    where
        I: IntoIterator<Item = AccountId>,
    {
        let accounts: BTreeSet<AccountId> = accounts.into_iter().collect();
        if accounts.is_empty() {
            return Err(Error::NoAccountsSelected);
        }
        Ok(Self { accounts })
    }

    /// Whether `account` is part of the selection.
    #[must_use]
    pub fn contains(&self, account: &AccountId) -> bool {
        self.accounts.contains(account)
    }

    /// Number of selected accounts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    /// Whether the selection is empty. Always false for a constructed
    /// value; present for API completeness.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    /// Iterates the selected account ids in stable order.
    pub fn iter(&self) -> impl Iterator<Item = &AccountId> {
        self.accounts.iter()
    }
}
