//! # TokenMaster Testing
//!
//! Testing utilities and helpers for the TokenMaster registry.
//!
//! This crate provides:
//! - Mock implementations of Environment traits ([`ManualClock`], [`InMemoryCustody`])
//! - [`ReducerTest`], a Given-When-Then harness for reducers
//! - proptest strategies for identities and amounts
//! - Opt-in tracing output for tests
//!
//! ## Example
//!
//! ```ignore
//! use tokenmaster_testing::{test_clock, InMemoryCustody};
//!
//! #[tokio::test]
//! async fn test_withdraw_pays_issuer() {
//!     let custody = InMemoryCustody::new();
//!     let registry = Registry::new(config, RegistryEnvironment::new(
//!         Arc::new(test_clock()),
//!         Arc::new(custody.clone()),
//!     ));
//!     // ...
//! }
//! ```

use chrono::{DateTime, Utc};
use tokenmaster_core::environment::Clock;

/// In-memory custody collaborator
pub mod custody_mocks;


/// Mock implementations of Environment traits
pub mod mocks {
    use super::{Clock, DateTime, Utc};
    use std::sync::{Arc, Mutex, PoisonError};

    pub use crate::custody_mocks::{InMemoryCustody, TransferRecord};

    /// Opening of the sample sale used across tests, 2025-04-27 15:00 UTC
    const SALE_OPENS_UNIX: i64 = 1_745_766_000;

    /// Hand-driven clock
    ///
    /// Time stands still until [`ManualClock::advance`] is called. Clones
    /// share one instant, so a test can keep a handle while the registry
    /// environment holds another.
    ///
    /// ```
    /// use tokenmaster_testing::mocks::ManualClock;
    /// use tokenmaster_core::environment::Clock;
    ///
    /// let clock = ManualClock::at_sale_opening();
    /// let listed = clock.now();
    /// clock.advance(chrono::Duration::minutes(5));
    /// assert_eq!(clock.now() - listed, chrono::Duration::minutes(5));
    /// ```
    #[derive(Debug, Clone)]
    pub struct ManualClock {
        now: Arc<Mutex<DateTime<Utc>>>,
    }

    impl ManualClock {
        /// Clock frozen at `time`
        #[must_use]
        pub fn new(time: DateTime<Utc>) -> Self {
            Self {
                now: Arc::new(Mutex::new(time)),
            }
        }

        /// Clock frozen at the sample sale opening
        #[must_use]
        pub fn at_sale_opening() -> Self {
            Self::new(DateTime::<Utc>::UNIX_EPOCH + chrono::Duration::seconds(SALE_OPENS_UNIX))
        }

        /// Move time forward for every clone
        pub fn advance(&self, by: chrono::Duration) {
            let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
            *now += by;
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            *self.now.lock().unwrap_or_else(PoisonError::into_inner)
        }
    }

    /// Fresh [`ManualClock`] at the sample sale opening
    #[must_use]
    pub fn test_clock() -> ManualClock {
        ManualClock::at_sale_opening()
    }
}

/// Test helpers and utilities
pub mod helpers {
    /// Install a compact tracing subscriber for the current test binary.
    ///
    /// Honors `RUST_LOG`; silent by default. Safe to call from every test,
    /// only the first call installs anything.
    pub fn init_test_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "off".into()),
            )
            .with_test_writer()
            .try_init();
    }
}

/// Property-based testing utilities
///
/// proptest strategies for the core value types.
pub mod properties {
    use proptest::prelude::*;
    use tokenmaster_core::{Amount, Identity};

    /// Identities drawn from a small pool so that collisions (same buyer
    /// twice) actually happen.
    pub fn identity_strategy() -> impl Strategy<Value = Identity> {
        (0u8..8).prop_map(|n| Identity::new(format!("buyer-{n}")))
    }

    /// Amounts small enough that sums of thousands never overflow
    pub fn amount_strategy() -> impl Strategy<Value = Amount> {
        (0u64..1_000_000).prop_map(Amount::from)
    }
}

// Re-export commonly used items
pub use mocks::{InMemoryCustody, ManualClock, TransferRecord, test_clock};
pub use reducer_test::ReducerTest;

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_clock_stands_still_until_advanced() {
        let clock = test_clock();
        assert_eq!(clock.now(), clock.now());
        assert_eq!(clock.now().to_rfc3339(), "2025-04-27T15:00:00+00:00");

        let shared = clock.clone();
        shared.advance(chrono::Duration::seconds(90));

        assert_eq!(clock.now().to_rfc3339(), "2025-04-27T15:01:30+00:00");
    }

    #[test]
    fn test_init_test_tracing_is_idempotent() {
        helpers::init_test_tracing();
        helpers::init_test_tracing();
    }

    proptest! {
        #[test]
        fn prop_identity_strategy_never_blank(identity in properties::identity_strategy()) {
            prop_assert!(!identity.is_blank());
        }
    }
}
