//! # TokenMaster Core
//!
//! Core traits and value types for the TokenMaster ticket registry.
//!
//! The registry is written as a reducer: all business rules live in one
//! deterministic function that either rejects an action (leaving state
//! untouched) or applies it and reports the fact it recorded. Everything the
//! reducer needs from the outside world (time, moving funds) is injected
//! through the Environment.
//!
//! ## Core Concepts
//!
//! - **State**: the registry's owned data
//! - **Action**: a caller request (list, purchase, withdraw)
//! - **Event**: the fact recorded when an action is accepted
//! - **Reducer**: `(State, Action, Environment) → Result<Event, Error>`
//! - **Environment**: injected dependencies ([`environment::Clock`], [`environment::Custody`])
//!
//! ## Example
//!
//! ```ignore
//! use tokenmaster_core::reducer::Reducer;
//!
//! impl Reducer for RegistryReducer {
//!     type State = RegistryState;
//!     type Action = RegistryAction;
//!     type Event = RegistryEvent;
//!     type Error = RegistryError;
//!     type Environment = RegistryEnvironment;
//!
//!     fn reduce(
//!         &self,
//!         state: &mut RegistryState,
//!         action: RegistryAction,
//!         env: &RegistryEnvironment,
//!     ) -> Result<RegistryEvent, RegistryError> {
//!         // Validate, then apply
//!     }
//! }
//! ```

/// Identity and amount value types
pub mod types;

pub use types::{Amount, Identity};

/// Reducer module - the core trait for business logic
pub mod reducer {
    /// The Reducer trait - core abstraction for business logic
    ///
    /// A reducer is all-or-nothing: when it returns `Err`, the state must be
    /// exactly as it was before the call. Implementations validate first and
    /// mutate only once every check (including calls into the environment)
    /// has succeeded.
    ///
    /// # Type Parameters
    ///
    /// - `State`: The domain state this reducer operates on
    /// - `Action`: The requests this reducer processes
    /// - `Event`: The fact returned for an accepted action
    /// - `Error`: The rejection reason for a refused action
    /// - `Environment`: The injected dependencies this reducer needs
    pub trait Reducer {
        /// The state type this reducer operates on
        type State;

        /// The action type this reducer processes
        type Action;

        /// The fact recorded for an accepted action
        type Event;

        /// Why an action was rejected
        type Error;

        /// The environment type with injected dependencies
        type Environment;

        /// Reduce an action into a state change
        ///
        /// # Errors
        ///
        /// Returns `Self::Error` when the action is rejected. State is left
        /// unchanged in that case.
        fn reduce(
            &self,
            state: &mut Self::State,
            action: Self::Action,
            env: &Self::Environment,
        ) -> Result<Self::Event, Self::Error>;
    }
}

/// Environment module - Dependency injection traits
///
/// All external collaborators are abstracted behind traits and injected
/// via the Environment parameter. Production and test implementations are
/// swapped without touching the reducer.
pub mod environment {
    use crate::types::{Amount, Identity};
    use chrono::{DateTime, Utc};
    use thiserror::Error;

    /// Clock trait - abstracts time operations for testability
    ///
    /// # Examples
    ///
    /// ```
    /// use tokenmaster_core::environment::{Clock, SystemClock};
    ///
    /// let clock = SystemClock;
    /// let _now = clock.now();
    /// ```
    pub trait Clock: Send + Sync {
        /// Get the current time
        fn now(&self) -> DateTime<Utc>;
    }

    /// Wall-clock time for production use
    #[derive(Debug, Clone, Copy, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }

    /// Errors reported by a [`Custody`] collaborator
    #[derive(Error, Debug, Clone, PartialEq, Eq)]
    pub enum CustodyError {
        /// The destination account cannot receive funds
        #[error("Recipient {0} cannot receive funds")]
        RecipientRejected(Identity),

        /// The custody backend is unreachable or refused the request
        #[error("Custody backend unavailable: {0}")]
        Unavailable(String),
    }

    /// Value-transfer collaborator.
    ///
    /// Moves funds held by the registry into an account. The call is
    /// synchronous and must either move the full amount or fail without any
    /// effect; the registry relies on that to keep its ledger consistent.
    pub trait Custody: Send + Sync {
        /// Credit `amount` to the account of `to`
        ///
        /// # Errors
        ///
        /// Returns [`CustodyError`] if the transfer did not happen.
        fn transfer(&self, to: &Identity, amount: Amount) -> Result<(), CustodyError>;
    }
}
