//! Registry reducer: listing, seat sales and withdrawals.
//!
//! Every action is validated against the current state first; the state is
//! mutated only after all checks (and, for withdrawals, the custody
//! transfer) succeeded. Run under the store's write lock this makes each
//! action atomic: two buyers racing for the same seat are serialized and the
//! loser gets [`RegistryError::SeatTaken`].

use crate::actions::{RegistryAction, RegistryEvent};
use crate::environment::RegistryEnvironment;
use crate::error::RegistryError;
use crate::types::{Listing, Occasion, OccasionId, RegistryState, SeatNumber, Ticket};
use tokenmaster_core::reducer::Reducer;
use tokenmaster_core::{Amount, Identity};
use tokenmaster_runtime::metrics::names;

// ============================================================================
// Reducer
// ============================================================================

/// Reducer for the ticket registry
#[derive(Clone, Debug, Default)]
pub struct RegistryReducer;

impl RegistryReducer {
    /// Creates a new `RegistryReducer`
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn validate_issuer(state: &RegistryState, caller: &Identity) -> Result<(), RegistryError> {
        if caller == state.owner() {
            Ok(())
        } else {
            tracing::warn!(caller = %caller, "Privileged action attempted by non-issuer");
            Err(RegistryError::Unauthorized {
                caller: caller.clone(),
            })
        }
    }

    /// Validates `List`
    fn validate_listing(listing: &Listing) -> Result<(), RegistryError> {
        if listing.max_tickets == 0 {
            return Err(RegistryError::InvalidListing(
                "max_tickets must be at least 1".to_string(),
            ));
        }

        for (field, value) in [
            ("name", &listing.name),
            ("date", &listing.date),
            ("time", &listing.time),
            ("location", &listing.location),
        ] {
            if value.trim().is_empty() {
                return Err(RegistryError::InvalidListing(format!(
                    "{field} must not be blank"
                )));
            }
        }

        Ok(())
    }

    /// Validates `Purchase` and returns the new ledger balance
    ///
    /// Checks run in a fixed order: occasion, seat range, seat availability,
    /// payment, ledger headroom.
    fn validate_purchase(
        state: &RegistryState,
        occasion_id: OccasionId,
        seat: SeatNumber,
        payment: Amount,
    ) -> Result<Amount, RegistryError> {
        let Some(record) = state.record(occasion_id) else {
            return Err(RegistryError::NotFound(occasion_id));
        };
        let occasion = &record.occasion;

        if !occasion.has_seat(seat) {
            return Err(RegistryError::InvalidSeat {
                occasion_id,
                seat,
                max_tickets: occasion.max_tickets,
            });
        }

        // A sold-out occasion has every seat mapped, so this also covers it.
        if record.seat_owners.contains_key(&seat) {
            return Err(RegistryError::SeatTaken { occasion_id, seat });
        }

        if payment < occasion.cost {
            return Err(RegistryError::InsufficientPayment {
                required: occasion.cost,
                offered: payment,
            });
        }

        state
            .balance()
            .checked_add(payment)
            .ok_or(RegistryError::LedgerOverflow)
    }

    fn apply_event(state: &mut RegistryState, event: &RegistryEvent) {
        match event {
            RegistryEvent::OccasionListed { occasion } => {
                state.push_occasion(occasion.clone());
            },
            RegistryEvent::TicketPurchased { ticket } => {
                if let Some(record) = state.record_mut(ticket.occasion_id) {
                    record.occasion.tickets = record.occasion.tickets.saturating_sub(1);
                    record.seat_owners.insert(ticket.seat, ticket.owner.clone());
                    record.sale_order.push(ticket.seat);
                }
                state
                    .purchases
                    .insert((ticket.occasion_id, ticket.owner.clone()));
                *state.holdings.entry(ticket.owner.clone()).or_insert(0) += 1;
                state.tickets.push(ticket.clone());
            },
            // A withdrawal always moves the whole balance.
            RegistryEvent::FundsWithdrawn { .. } => state.ledger = Amount::ZERO,
        }
    }

    fn list(
        state: &mut RegistryState,
        caller: &Identity,
        listing: Listing,
        env: &RegistryEnvironment,
    ) -> Result<RegistryEvent, RegistryError> {
        Self::validate_issuer(state, caller)?;
        Self::validate_listing(&listing)?;

        let occasion = Occasion::from_listing(state.next_occasion_id(), listing, env.clock.now());
        tracing::info!(
            occasion_id = %occasion.id,
            name = %occasion.name,
            max_tickets = occasion.max_tickets,
            cost = %occasion.cost,
            "Occasion listed"
        );

        let event = RegistryEvent::OccasionListed { occasion };
        Self::apply_event(state, &event);
        metrics::counter!(names::OCCASIONS_LISTED).increment(1);
        Ok(event)
    }

    fn purchase(
        state: &mut RegistryState,
        caller: Identity,
        occasion_id: OccasionId,
        seat: SeatNumber,
        payment: Amount,
        env: &RegistryEnvironment,
    ) -> Result<RegistryEvent, RegistryError> {
        let ledger = Self::validate_purchase(state, occasion_id, seat, payment)?;

        let ticket = Ticket {
            token_id: state.next_token_id(),
            occasion_id,
            seat,
            owner: caller,
            paid: payment,
            purchased_at: env.clock.now(),
        };
        tracing::info!(
            occasion_id = %occasion_id,
            seat = %seat,
            buyer = %ticket.owner,
            token_id = %ticket.token_id,
            paid = %payment,
            "Ticket purchased"
        );

        let event = RegistryEvent::TicketPurchased { ticket };
        Self::apply_event(state, &event);
        state.ledger = ledger;
        metrics::counter!(names::TICKETS_SOLD).increment(1);
        record_ledger_gauge(state.balance());
        Ok(event)
    }

    fn withdraw(
        state: &mut RegistryState,
        caller: &Identity,
        env: &RegistryEnvironment,
    ) -> Result<RegistryEvent, RegistryError> {
        Self::validate_issuer(state, caller)?;

        let amount = state.balance();
        if amount.is_zero() {
            tracing::debug!("Withdrawal of empty ledger, nothing to transfer");
        } else if let Err(error) = env.custody.transfer(state.owner(), amount) {
            tracing::error!(%error, amount = %amount, "Withdrawal transfer failed");
            return Err(error.into());
        }

        let event = RegistryEvent::FundsWithdrawn {
            to: state.owner().clone(),
            amount,
            withdrawn_at: env.clock.now(),
        };
        Self::apply_event(state, &event);
        tracing::info!(to = %caller, amount = %amount, "Funds withdrawn");
        metrics::counter!(names::WITHDRAWALS).increment(1);
        record_ledger_gauge(state.balance());
        Ok(event)
    }
}

#[allow(clippy::cast_precision_loss)] // Gauge is for dashboards only
fn record_ledger_gauge(balance: Amount) {
    metrics::gauge!(names::LEDGER_BALANCE).set(balance.units() as f64);
}

impl Reducer for RegistryReducer {
    type State = RegistryState;
    type Action = RegistryAction;
    type Event = RegistryEvent;
    type Error = RegistryError;
    type Environment = RegistryEnvironment;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> Result<Self::Event, Self::Error> {
        match action {
            RegistryAction::List { caller, listing } => Self::list(state, &caller, listing, env),
            RegistryAction::Purchase {
                caller,
                occasion_id,
                seat,
                payment,
            } => Self::purchase(state, caller, occasion_id, seat, payment, env),
            RegistryAction::Withdraw { caller } => Self::withdraw(state, &caller, env),
        }
    }
}
