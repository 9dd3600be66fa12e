//! Local custody: an in-process balance book for payouts.

use std::collections::HashMap;
use std::sync::Mutex;
use tokenmaster_core::environment::{Custody, CustodyError};
use tokenmaster_core::{Amount, Identity};

/// Custody that credits a local balance book and logs every payout
///
/// Stands in for an external payment rail when the binary runs on its own.
#[derive(Debug, Default)]
pub struct LocalCustody {
    balances: Mutex<HashMap<Identity, Amount>>,
}

impl LocalCustody {
    /// Creates an empty balance book
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Funds credited to `account` so far
    ///
    /// # Errors
    ///
    /// Returns [`CustodyError::Unavailable`] if the balance book is poisoned.
    pub fn balance_of(&self, account: &Identity) -> Result<Amount, CustodyError> {
        let balances = self
            .balances
            .lock()
            .map_err(|_| CustodyError::Unavailable("balance book poisoned".to_string()))?;
        Ok(balances.get(account).copied().unwrap_or_default())
    }
}

impl Custody for LocalCustody {
    fn transfer(&self, to: &Identity, amount: Amount) -> Result<(), CustodyError> {
        let mut balances = self
            .balances
            .lock()
            .map_err(|_| CustodyError::Unavailable("balance book poisoned".to_string()))?;

        let current = balances.get(to).copied().unwrap_or_default();
        let updated = current
            .checked_add(amount)
            .ok_or_else(|| CustodyError::Unavailable(format!("balance of {to} would overflow")))?;
        balances.insert(to.clone(), updated);

        tracing::info!(to = %to, amount = %amount, balance = %updated, "Payout credited");
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_payouts_accumulate() {
        let custody = LocalCustody::new();
        let issuer = Identity::new("issuer");

        custody.transfer(&issuer, Amount::new(3)).unwrap();
        custody.transfer(&issuer, Amount::new(4)).unwrap();

        assert_eq!(custody.balance_of(&issuer).unwrap(), Amount::new(7));
        assert!(custody.balance_of(&Identity::new("nobody")).unwrap().is_zero());
    }

    #[test]
    fn test_overflowing_payout_is_refused() {
        let custody = LocalCustody::new();
        let issuer = Identity::new("issuer");
        custody.transfer(&issuer, Amount::new(u128::MAX)).unwrap();

        let result = custody.transfer(&issuer, Amount::new(1));

        assert!(matches!(result, Err(CustodyError::Unavailable(_))));
        assert_eq!(custody.balance_of(&issuer).unwrap(), Amount::new(u128::MAX));
    }
}
