//! Shareable async handle over the registry store.

use crate::actions::{RegistryAction, RegistryEvent};
use crate::environment::RegistryEnvironment;
use crate::error::RegistryError;
use crate::reducer::RegistryReducer;
use crate::types::{Listing, Occasion, OccasionId, RegistryState, SeatNumber, Ticket, TokenId};
use std::sync::Arc;
use tokenmaster_core::{Amount, Identity};
use tokenmaster_runtime::metrics::names;
use tokenmaster_runtime::{Store, StoreConfig, StoreError};
use tokio::sync::broadcast;

/// Construction-time registry settings
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RegistryConfig {
    /// Display name
    pub name: String,
    /// Display symbol
    pub symbol: String,
    /// The issuer identity
    pub issuer: Identity,
}

impl RegistryConfig {
    /// Creates a configuration
    #[must_use]
    pub fn new(name: impl Into<String>, symbol: impl Into<String>, issuer: Identity) -> Self {
        Self {
            name: name.into(),
            symbol: symbol.into(),
            issuer,
        }
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self::new("TokenMaster", "TM", Identity::new("issuer"))
    }
}

/// The ticket registry
///
/// Cheap to clone; all clones share one store. Mutating calls are
/// serialized by the store's write lock, queries run concurrently under the
/// read lock and always observe a state between two whole actions.
///
/// # Example
///
/// ```ignore
/// let registry = Registry::new(RegistryConfig::default(), environment);
///
/// let id = registry.list(&issuer, listing).await?;
/// let ticket = registry.purchase(&buyer, id, SeatNumber::new(50), cost).await?;
/// let paid_out = registry.withdraw(&issuer).await?;
/// ```
#[derive(Clone)]
pub struct Registry {
    store: Arc<Store<RegistryReducer>>,
}

impl Registry {
    /// Creates an empty registry with the default store configuration
    #[must_use]
    pub fn new(config: RegistryConfig, environment: RegistryEnvironment) -> Self {
        Self::with_store_config(config, environment, &StoreConfig::default())
    }

    /// Creates an empty registry with an explicit store configuration
    #[must_use]
    pub fn with_store_config(
        config: RegistryConfig,
        environment: RegistryEnvironment,
        store_config: &StoreConfig,
    ) -> Self {
        tracing::info!(
            name = %config.name,
            symbol = %config.symbol,
            issuer = %config.issuer,
            "Registry created"
        );
        let state = RegistryState::new(config.name, config.symbol, config.issuer);
        Self {
            store: Arc::new(Store::with_config(
                state,
                RegistryReducer::new(),
                environment,
                store_config,
            )),
        }
    }

    async fn send(&self, action: RegistryAction) -> Result<RegistryEvent, RegistryError> {
        self.store.send(action).await.map_err(|error| {
            let rejection = match error {
                StoreError::Rejected(rejection) => rejection,
                StoreError::ShutdownInProgress => RegistryError::ShuttingDown,
            };
            tracing::debug!(kind = rejection.kind(), %rejection, "Registry action rejected");
            metrics::counter!(names::REGISTRY_REJECTIONS, "kind" => rejection.kind())
                .increment(1);
            rejection
        })
    }

    fn unexpected(action: &'static str, recorded: &RegistryEvent) -> RegistryError {
        tracing::error!(
            action,
            recorded = recorded.event_type(),
            "Store recorded the wrong event"
        );
        RegistryError::UnexpectedEvent {
            action,
            recorded: recorded.event_type(),
        }
    }

    // ========== Operations ==========

    /// Lists a new occasion and returns its id
    ///
    /// # Errors
    ///
    /// - [`RegistryError::Unauthorized`] if `caller` is not the issuer
    /// - [`RegistryError::InvalidListing`] for zero capacity or blank text
    /// - [`RegistryError::ShuttingDown`] after [`Registry::shutdown`]
    pub async fn list(
        &self,
        caller: &Identity,
        listing: Listing,
    ) -> Result<OccasionId, RegistryError> {
        match self
            .send(RegistryAction::List {
                caller: caller.clone(),
                listing,
            })
            .await?
        {
            RegistryEvent::OccasionListed { occasion } => Ok(occasion.id),
            other => Err(Self::unexpected("List", &other)),
        }
    }

    /// Buys one seat and returns the minted ticket (the purchase receipt)
    ///
    /// The whole payment is kept, including any amount above the cost.
    ///
    /// # Errors
    ///
    /// In check order: [`RegistryError::NotFound`], [`RegistryError::InvalidSeat`],
    /// [`RegistryError::SeatTaken`], [`RegistryError::InsufficientPayment`],
    /// [`RegistryError::LedgerOverflow`]; or [`RegistryError::ShuttingDown`].
    pub async fn purchase(
        &self,
        caller: &Identity,
        occasion_id: OccasionId,
        seat: SeatNumber,
        payment: Amount,
    ) -> Result<Ticket, RegistryError> {
        match self
            .send(RegistryAction::Purchase {
                caller: caller.clone(),
                occasion_id,
                seat,
                payment,
            })
            .await?
        {
            RegistryEvent::TicketPurchased { ticket } => Ok(ticket),
            other => Err(Self::unexpected("Purchase", &other)),
        }
    }

    /// Pays the whole ledger out to the issuer and returns the amount moved
    ///
    /// # Errors
    ///
    /// - [`RegistryError::Unauthorized`] if `caller` is not the issuer
    /// - [`RegistryError::TransferFailed`] if custody refused; the ledger is kept
    /// - [`RegistryError::ShuttingDown`] after [`Registry::shutdown`]
    pub async fn withdraw(&self, caller: &Identity) -> Result<Amount, RegistryError> {
        match self
            .send(RegistryAction::Withdraw {
                caller: caller.clone(),
            })
            .await?
        {
            RegistryEvent::FundsWithdrawn { amount, .. } => Ok(amount),
            other => Err(Self::unexpected("Withdraw", &other)),
        }
    }

    // ========== Queries ==========

    /// Number of occasions listed
    pub async fn total_occasions(&self) -> u64 {
        self.store.state(RegistryState::total_occasions).await
    }

    /// Snapshot of an occasion, including remaining tickets
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotFound`] if `id` was never assigned.
    pub async fn get_occasion(&self, id: OccasionId) -> Result<Occasion, RegistryError> {
        self.store
            .state(|s| s.occasion(id).cloned())
            .await
            .ok_or(RegistryError::NotFound(id))
    }

    /// Snapshot of every occasion in id order
    pub async fn occasions(&self) -> Vec<Occasion> {
        self.store.state(|s| s.occasions().cloned().collect()).await
    }

    /// Whether `buyer` holds a seat for `occasion_id`
    pub async fn has_bought(&self, occasion_id: OccasionId, buyer: &Identity) -> bool {
        self.store.state(|s| s.has_bought(occasion_id, buyer)).await
    }

    /// Owner of a seat, if sold
    pub async fn seat_taken(&self, occasion_id: OccasionId, seat: SeatNumber) -> Option<Identity> {
        self.store
            .state(|s| s.seat_taken(occasion_id, seat).cloned())
            .await
    }

    /// Sold seats in sale order; empty for unknown occasions
    pub async fn seats_taken(&self, occasion_id: OccasionId) -> Vec<SeatNumber> {
        self.store
            .state(|s| s.seats_taken(occasion_id).to_vec())
            .await
    }

    /// Funds held by the registry
    pub async fn balance(&self) -> Amount {
        self.store.state(RegistryState::balance).await
    }

    /// Display name
    pub async fn name(&self) -> String {
        self.store.state(|s| s.name().to_string()).await
    }

    /// Display symbol
    pub async fn symbol(&self) -> String {
        self.store.state(|s| s.symbol().to_string()).await
    }

    /// The issuer
    pub async fn owner(&self) -> Identity {
        self.store.state(|s| s.owner().clone()).await
    }

    /// Number of ticket tokens minted
    pub async fn total_supply(&self) -> u64 {
        self.store.state(RegistryState::total_supply).await
    }

    /// Holder of a ticket token
    pub async fn owner_of(&self, token_id: TokenId) -> Option<Identity> {
        self.store.state(|s| s.owner_of(token_id).cloned()).await
    }

    /// Number of tickets held by `holder`
    pub async fn balance_of(&self, holder: &Identity) -> u64 {
        self.store.state(|s| s.balance_of(holder)).await
    }

    /// Ticket details by token id
    pub async fn ticket(&self, token_id: TokenId) -> Option<Ticket> {
        self.store.state(|s| s.ticket(token_id).cloned()).await
    }

    /// Runs `f` against a consistent snapshot of the whole state
    pub async fn inspect<F, T>(&self, f: F) -> T
    where
        F: FnOnce(&RegistryState) -> T,
    {
        self.store.state(f).await
    }

    // ========== Lifecycle ==========

    /// Subscribe to events of accepted actions
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<RegistryEvent> {
        self.store.subscribe_events()
    }

    /// Stop accepting actions; queries keep working
    pub fn shutdown(&self) {
        self.store.shutdown();
    }

    /// Whether [`Registry::shutdown`] was called
    #[must_use]
    pub fn is_shutting_down(&self) -> bool {
        self.store.is_shutting_down()
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry").finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tokenmaster_core::environment::Clock;
    use tokenmaster_testing::{InMemoryCustody, test_clock};

    fn create_registry(custody: &InMemoryCustody) -> Registry {
        Registry::new(
            RegistryConfig::default(),
            RegistryEnvironment::new(Arc::new(test_clock()), Arc::new(custody.clone())),
        )
    }

    #[tokio::test]
    async fn test_metadata_queries() {
        let registry = create_registry(&InMemoryCustody::new());

        assert_eq!(registry.name().await, "TokenMaster");
        assert_eq!(registry.symbol().await, "TM");
        assert_eq!(registry.owner().await, Identity::new("issuer"));
        assert_eq!(registry.total_occasions().await, 0);
    }

    #[tokio::test]
    async fn test_get_occasion_unknown_id() {
        let registry = create_registry(&InMemoryCustody::new());

        for id in [0, 1] {
            assert_eq!(
                registry.get_occasion(OccasionId::new(id)).await,
                Err(RegistryError::NotFound(OccasionId::new(id)))
            );
        }
        assert!(registry.seats_taken(OccasionId::new(1)).await.is_empty());
        assert_eq!(registry.seat_taken(OccasionId::new(1), SeatNumber::new(1)).await, None);
    }

    #[tokio::test]
    async fn test_rejection_is_returned_unwrapped() {
        let registry = create_registry(&InMemoryCustody::new());

        let result = registry.withdraw(&Identity::new("mallory")).await;

        assert_eq!(
            result,
            Err(RegistryError::Unauthorized {
                caller: Identity::new("mallory")
            })
        );
    }

    #[test]
    fn test_mismatched_event_becomes_error() {
        let event = RegistryEvent::FundsWithdrawn {
            to: Identity::new("issuer"),
            amount: Amount::ZERO,
            withdrawn_at: test_clock().now(),
        };

        let error = Registry::unexpected("Purchase", &event);

        assert_eq!(
            error,
            RegistryError::UnexpectedEvent {
                action: "Purchase",
                recorded: event.event_type(),
            }
        );
        assert_eq!(error.kind(), "unexpected_event");
    }

    #[tokio::test]
    async fn test_shutdown_refuses_actions_but_serves_queries() {
        let registry = create_registry(&InMemoryCustody::new());
        let issuer = Identity::new("issuer");
        registry
            .list(&issuer, Listing::new("Show", Amount::new(1), 5, "d", "t", "l"))
            .await
            .unwrap();

        registry.shutdown();

        assert!(registry.is_shutting_down());
        assert_eq!(
            registry.withdraw(&issuer).await,
            Err(RegistryError::ShuttingDown)
        );
        assert_eq!(registry.total_occasions().await, 1);
    }

    #[tokio::test]
    async fn test_clones_share_state() {
        let registry = create_registry(&InMemoryCustody::new());
        let other = registry.clone();

        registry
            .list(
                &Identity::new("issuer"),
                Listing::new("Show", Amount::new(1), 5, "d", "t", "l"),
            )
            .await
            .unwrap();

        assert_eq!(other.total_occasions().await, 1);
    }
}
