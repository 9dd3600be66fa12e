//! In-memory value-transfer collaborator
//!
//! [`InMemoryCustody`] keeps one balance per identity and records every
//! transfer it accepted, so tests can check both "the issuer got paid" and
//! "nothing moved". Failure injection covers the `TransferFailed` path.

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity
#![allow(clippy::missing_panics_doc)] // Panics only on a poisoned lock

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokenmaster_core::environment::{Custody, CustodyError};
use tokenmaster_core::{Amount, Identity};

/// A transfer accepted by [`InMemoryCustody`]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransferRecord {
    /// Credited account
    pub to: Identity,
    /// Amount credited
    pub amount: Amount,
}

/// In-memory custody for fast, deterministic testing.
///
/// Cloning shares the underlying balances, so a test can keep one handle
/// while the registry environment holds another.
///
/// # Example
///
/// ```
/// use tokenmaster_core::environment::Custody;
/// use tokenmaster_core::{Amount, Identity};
/// use tokenmaster_testing::InMemoryCustody;
///
/// let custody = InMemoryCustody::new();
/// let issuer = Identity::new("issuer");
///
/// custody.transfer(&issuer, Amount::new(5)).unwrap();
/// assert_eq!(custody.balance_of(&issuer), Amount::new(5));
///
/// custody.fail_transfers(true);
/// assert!(custody.transfer(&issuer, Amount::new(1)).is_err());
/// assert_eq!(custody.balance_of(&issuer), Amount::new(5));
/// ```
#[derive(Clone, Debug, Default)]
pub struct InMemoryCustody {
    balances: Arc<Mutex<HashMap<Identity, Amount>>>,
    transfers: Arc<Mutex<Vec<TransferRecord>>>,
    rejected_recipients: Arc<Mutex<HashSet<Identity>>>,
    failing: Arc<AtomicBool>,
}

impl InMemoryCustody {
    /// Create a custody with no balances
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent transfer fail with [`CustodyError::Unavailable`]
    pub fn fail_transfers(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Make transfers to `recipient` fail with [`CustodyError::RecipientRejected`]
    pub fn reject_recipient(&self, recipient: Identity) {
        self.rejected_recipients.lock().unwrap().insert(recipient);
    }

    /// Seed an account with an opening balance
    pub fn set_balance(&self, account: Identity, amount: Amount) {
        self.balances.lock().unwrap().insert(account, amount);
    }

    /// Current balance of `account` (zero if never credited)
    #[must_use]
    pub fn balance_of(&self, account: &Identity) -> Amount {
        self.balances
            .lock()
            .unwrap()
            .get(account)
            .copied()
            .unwrap_or_default()
    }

    /// All accepted transfers, oldest first
    #[must_use]
    pub fn transfers(&self) -> Vec<TransferRecord> {
        self.transfers.lock().unwrap().clone()
    }
}

impl Custody for InMemoryCustody {
    fn transfer(&self, to: &Identity, amount: Amount) -> Result<(), CustodyError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(CustodyError::Unavailable(
                "injected failure".to_string(),
            ));
        }

        if self.rejected_recipients.lock().unwrap().contains(to) {
            return Err(CustodyError::RecipientRejected(to.clone()));
        }

        let mut balances = self.balances.lock().unwrap();
        let current = balances.get(to).copied().unwrap_or_default();
        let updated = current.checked_add(amount).ok_or_else(|| {
            CustodyError::Unavailable(format!("balance of {to} would overflow"))
        })?;
        balances.insert(to.clone(), updated);
        drop(balances);

        tracing::debug!(to = %to, amount = %amount, "In-memory custody credited account");

        self.transfers.lock().unwrap().push(TransferRecord {
            to: to.clone(),
            amount,
        });
        Ok(())
    }
}
