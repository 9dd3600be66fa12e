//! Injected dependencies of the registry reducer.

use std::sync::Arc;
use tokenmaster_core::environment::{Clock, Custody};

/// Environment for the registry reducer
///
/// - `clock`: timestamps for listings, tickets and withdrawals
/// - `custody`: moves withdrawn funds to the issuer
#[derive(Clone)]
pub struct RegistryEnvironment {
    /// Clock for timestamps
    pub clock: Arc<dyn Clock>,
    /// Value-transfer collaborator
    pub custody: Arc<dyn Custody>,
}

impl RegistryEnvironment {
    /// Creates a new `RegistryEnvironment`
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>, custody: Arc<dyn Custody>) -> Self {
        Self { clock, custody }
    }
}

impl std::fmt::Debug for RegistryEnvironment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistryEnvironment").finish_non_exhaustive()
    }
}
