//! # TokenMaster Runtime
//!
//! Runtime implementation for the TokenMaster registry.
//!
//! This crate provides the Store runtime that owns the registry state and
//! runs every action through the reducer one at a time.
//!
//! ## Core Components
//!
//! - **Store**: owns state behind a `RwLock`; actions take the write lock for
//!   their whole duration, queries take the read lock
//! - **Event broadcast**: every accepted action's event is published to subscribers
//! - **Metrics**: action counters and reducer latency (see [`metrics`])
//!
//! ## Example
//!
//! ```ignore
//! use tokenmaster_runtime::Store;
//!
//! let store = Store::new(initial_state, RegistryReducer::new(), environment);
//!
//! // Send an action
//! let event = store.send(RegistryAction::Withdraw { caller }).await?;
//!
//! // Read state
//! let balance = store.state(|s| s.balance()).await;
//! ```

use std::sync::Arc;
use tokenmaster_core::reducer::Reducer;
use tokio::sync::RwLock;

/// Prometheus recorder and shared metric names
pub mod metrics;

/// Store failures
pub mod error {
    use thiserror::Error;

    /// Why a `send` did not record an event
    ///
    /// Generic over the reducer's own error type so that domain rejections
    /// pass through untouched.
    #[derive(Error, Debug)]
    pub enum StoreError<E>
    where
        E: std::error::Error + 'static,
    {
        /// The reducer rejected the action; state is unchanged
        #[error(transparent)]
        Rejected(E),

        /// `shutdown` was called; no further actions are applied
        ///
        /// This error is returned when `send()` is called after shutdown.
        #[error("Store is shutting down")]
        ShutdownInProgress,
    }

    impl<E> StoreError<E>
    where
        E: std::error::Error + 'static,
    {
        /// Returns the reducer's rejection, if that is what this error is
        #[must_use]
        pub const fn rejection(&self) -> Option<&E> {
            match self {
                Self::Rejected(error) => Some(error),
                Self::ShutdownInProgress => None,
            }
        }
    }
}

pub use error::StoreError;

/// Store tuning
///
/// # Example
///
/// ```
/// use tokenmaster_runtime::StoreConfig;
///
/// let config = StoreConfig::default().with_event_capacity(256);
/// assert_eq!(config.event_capacity, 256);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Capacity of the event broadcast channel
    ///
    /// Subscribers that fall further behind than this miss events and
    /// observe `RecvError::Lagged`.
    pub event_capacity: usize,
}

impl StoreConfig {
    /// Configuration with an explicit event channel capacity
    #[must_use]
    pub const fn new(event_capacity: usize) -> Self {
        Self { event_capacity }
    }

    /// Set the event broadcast capacity
    #[must_use]
    pub const fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self { event_capacity: 64 }
    }
}

/// Store runtime for serialized reducer execution.
pub mod store {
    use super::{Arc, Reducer, RwLock, StoreConfig, StoreError};
    use crate::metrics::names;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tokio::sync::broadcast;

    /// Runs one reducer over one state
    ///
    /// It owns the state behind a `RwLock`, the environment handed to every
    /// reducer call, and a broadcast channel for recorded events.
    ///
    /// Each `send` holds the write lock from validation to the last state
    /// mutation, so two actions never interleave and no reader sees a
    /// half-applied action.
    ///
    /// # Type Parameters
    ///
    /// - `R`: Reducer implementation; state, action, event and environment
    ///   types come from its associated types
    pub struct Store<R>
    where
        R: Reducer,
    {
        state: Arc<RwLock<R::State>>,
        reducer: R,
        environment: R::Environment,
        shutdown: AtomicBool,
        event_broadcast: broadcast::Sender<R::Event>,
    }

    impl<R> Store<R>
    where
        R: Reducer + Send + Sync + 'static,
        R::State: Send + Sync + 'static,
        R::Action: Send + 'static,
        R::Event: Clone + Send + 'static,
        R::Error: std::error::Error + Send + 'static,
        R::Environment: Send + Sync + 'static,
    {
        /// Store over `initial_state` with [`StoreConfig::default`]
        #[must_use]
        pub fn new(initial_state: R::State, reducer: R, environment: R::Environment) -> Self {
            Self::with_config(initial_state, reducer, environment, &StoreConfig::default())
        }

        /// Create a new store with explicit configuration
        ///
        /// A zero event capacity is raised to 1 (the broadcast channel needs
        /// at least one slot).
        #[must_use]
        pub fn with_config(
            initial_state: R::State,
            reducer: R,
            environment: R::Environment,
            config: &StoreConfig,
        ) -> Self {
            let (event_broadcast, _) = broadcast::channel(config.event_capacity.max(1));

            Self {
                state: Arc::new(RwLock::new(initial_state)),
                reducer,
                environment,
                shutdown: AtomicBool::new(false),
                event_broadcast,
            }
        }

        /// Send an action through the reducer
        ///
        /// Returns the recorded event on success. The event is also broadcast
        /// to every subscriber (see [`Store::subscribe_events`]).
        ///
        /// # Errors
        ///
        /// - [`StoreError::Rejected`]: the reducer refused the action; state unchanged
        /// - [`StoreError::ShutdownInProgress`]: [`Store::shutdown`] was called
        #[tracing::instrument(skip(self, action), name = "store_send")]
        pub async fn send(&self, action: R::Action) -> Result<R::Event, StoreError<R::Error>> {
            if self.is_shutting_down() {
                return Err(Self::refuse());
            }

            metrics::counter!(names::STORE_ACTIONS).increment(1);

            let outcome = {
                let mut state = self.state.write().await;
                tracing::trace!("Acquired write lock on state");

                // Shutdown may have landed while this action waited for the lock.
                if self.is_shutting_down() {
                    return Err(Self::refuse());
                }

                let span = tracing::debug_span!("reducer_execution");
                let _enter = span.enter();

                let start = std::time::Instant::now();
                let outcome = self.reducer.reduce(&mut *state, action, &self.environment);
                metrics::histogram!(names::STORE_REDUCER_DURATION)
                    .record(start.elapsed().as_secs_f64());

                outcome
            };

            match outcome {
                Ok(event) => {
                    tracing::debug!("Action accepted");
                    // No subscribers is fine; the caller still gets the event.
                    let _ = self.event_broadcast.send(event.clone());
                    Ok(event)
                },
                Err(error) => {
                    tracing::debug!(%error, "Action rejected");
                    metrics::counter!(names::STORE_ACTIONS_REJECTED, "reason" => "reducer")
                        .increment(1);
                    Err(StoreError::Rejected(error))
                },
            }
        }

        fn refuse() -> StoreError<R::Error> {
            tracing::warn!("Rejected action: store is shutting down");
            metrics::counter!(names::STORE_ACTIONS_REJECTED, "reason" => "shutdown").increment(1);
            StoreError::ShutdownInProgress
        }

        /// Run `f` against the state under the read lock
        ///
        /// The lock is held only while `f` runs:
        ///
        /// ```ignore
        /// let occasions = store.state(|s| s.total_occasions()).await;
        /// ```
        pub async fn state<F, T>(&self, f: F) -> T
        where
            F: FnOnce(&R::State) -> T,
        {
            let state = self.state.read().await;
            f(&*state)
        }

        /// Subscribe to events of accepted actions
        ///
        /// Rejected actions publish nothing. Slow receivers skip old events
        /// and get `RecvError::Lagged`.
        #[must_use]
        pub fn subscribe_events(&self) -> broadcast::Receiver<R::Event> {
            self.event_broadcast.subscribe()
        }

        /// Stop accepting actions
        ///
        /// Takes effect for every `send` that has not yet acquired the write
        /// lock, including ones already waiting for it. An action whose
        /// reducer is running when this is called still completes. Queries
        /// keep working.
        pub fn shutdown(&self) {
            tracing::info!("Store shutting down");
            self.shutdown.store(true, Ordering::Release);
        }

        /// Check whether [`Store::shutdown`] has been called
        #[must_use]
        pub fn is_shutting_down(&self) -> bool {
            self.shutdown.load(Ordering::Acquire)
        }
    }
}

pub use store::Store;

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use std::time::Duration;
    use thiserror::Error;

    #[derive(Clone, Debug, Default, PartialEq)]
    struct TallyState {
        total: u32,
        history: Vec<u32>,
    }

    #[derive(Clone, Debug)]
    enum TallyAction {
        Add(u32),
        AddSlowly(u32),
    }

    #[derive(Clone, Debug, PartialEq)]
    struct Added {
        total: u32,
    }

    #[derive(Error, Debug, PartialEq)]
    enum TallyError {
        #[error("zero is not allowed")]
        Zero,
    }

    struct TallyReducer;

    impl Reducer for TallyReducer {
        type State = TallyState;
        type Action = TallyAction;
        type Event = Added;
        type Error = TallyError;
        type Environment = ();

        fn reduce(
            &self,
            state: &mut Self::State,
            action: Self::Action,
            _env: &Self::Environment,
        ) -> Result<Self::Event, Self::Error> {
            let value = match action {
                TallyAction::Add(value) => value,
                TallyAction::AddSlowly(value) => {
                    // Blocks inside the write lock to widen the race window
                    std::thread::sleep(Duration::from_millis(5));
                    value
                },
            };

            if value == 0 {
                return Err(TallyError::Zero);
            }

            state.total += value;
            state.history.push(value);
            Ok(Added { total: state.total })
        }
    }

    #[tokio::test]
    async fn test_send_applies_and_returns_event() {
        let store = Store::new(TallyState::default(), TallyReducer, ());

        let event = store.send(TallyAction::Add(3)).await.unwrap();

        assert_eq!(event, Added { total: 3 });
        assert_eq!(store.state(|s| s.total).await, 3);
    }

    #[tokio::test]
    async fn test_rejected_action_leaves_state_and_broadcasts_nothing() {
        let store = Store::new(TallyState::default(), TallyReducer, ());
        let mut events = store.subscribe_events();

        let result = store.send(TallyAction::Add(0)).await;

        assert!(matches!(result, Err(StoreError::Rejected(TallyError::Zero))));
        assert_eq!(store.state(Clone::clone).await, TallyState::default());
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_subscribers_receive_accepted_events() {
        let store = Store::new(TallyState::default(), TallyReducer, ());
        let mut events = store.subscribe_events();

        store.send(TallyAction::Add(2)).await.unwrap();
        store.send(TallyAction::Add(5)).await.unwrap();

        assert_eq!(events.recv().await.unwrap(), Added { total: 2 });
        assert_eq!(events.recv().await.unwrap(), Added { total: 7 });
    }

    #[tokio::test]
    async fn test_shutdown_rejects_actions_but_allows_queries() {
        let store = Store::new(TallyState::default(), TallyReducer, ());
        store.send(TallyAction::Add(1)).await.unwrap();

        store.shutdown();

        assert!(store.is_shutting_down());
        let result = store.send(TallyAction::Add(1)).await;
        assert!(matches!(result, Err(StoreError::ShutdownInProgress)));
        assert!(result.unwrap_err().rejection().is_none());
        assert_eq!(store.state(|s| s.total).await, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_shutdown_refuses_send_queued_behind_lock() {
        let store = Arc::new(Store::new(TallyState::default(), TallyReducer, ()));
        let (held_tx, held_rx) = tokio::sync::oneshot::channel();
        let (release_tx, release_rx) = std::sync::mpsc::channel::<()>();

        let reader = tokio::spawn({
            let store = Arc::clone(&store);
            async move {
                store
                    .state(move |s| {
                        let _ = held_tx.send(());
                        let _ = release_rx.recv();
                        s.total
                    })
                    .await
            }
        });
        held_rx.await.unwrap();

        let writer = tokio::spawn({
            let store = Arc::clone(&store);
            async move { store.send(TallyAction::Add(1)).await }
        });
        // Let the writer reach the lock and park behind the reader
        tokio::time::sleep(Duration::from_millis(50)).await;

        store.shutdown();
        release_tx.send(()).unwrap();

        assert_eq!(reader.await.unwrap(), 0);
        assert!(matches!(
            writer.await.unwrap(),
            Err(StoreError::ShutdownInProgress)
        ));
        assert_eq!(store.state(Clone::clone).await, TallyState::default());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_sends_are_serialized() {
        let store = Arc::new(Store::new(TallyState::default(), TallyReducer, ()));

        let handles: Vec<_> = (1..=20)
            .map(|value| {
                let store = Arc::clone(&store);
                tokio::spawn(async move { store.send(TallyAction::AddSlowly(value)).await })
            })
            .collect();

        for result in futures::future::join_all(handles).await {
            result.unwrap().unwrap();
        }

        let state = store.state(Clone::clone).await;
        assert_eq!(state.total, (1..=20).sum::<u32>());
        assert_eq!(state.history.len(), 20);
    }

    #[test]
    fn test_zero_capacity_config_is_usable() {
        let store = Store::with_config(
            TallyState::default(),
            TallyReducer,
            (),
            &StoreConfig::new(0),
        );
        let event = tokio_test::block_on(store.send(TallyAction::Add(4))).unwrap();
        assert_eq!(event.total, 4);
    }
}
