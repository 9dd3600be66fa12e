//! Actions the registry accepts and the events it records.

use crate::types::{Listing, Occasion, OccasionId, SeatNumber, Ticket};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokenmaster_core::{Amount, Identity};

/// Requests sent to the registry
///
/// Every action carries the caller's identity; the registry checks it
/// against the issuer for the privileged operations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RegistryAction {
    /// Issuer lists a new occasion
    List {
        /// Who is asking
        caller: Identity,
        /// Occasion details
        listing: Listing,
    },

    /// Anyone buys one numbered seat
    Purchase {
        /// Buyer
        caller: Identity,
        /// Occasion to buy into
        occasion_id: OccasionId,
        /// Requested seat
        seat: SeatNumber,
        /// Value attached to the purchase
        payment: Amount,
    },

    /// Issuer sweeps the whole ledger
    Withdraw {
        /// Who is asking
        caller: Identity,
    },
}

/// Facts recorded for accepted actions
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RegistryEvent {
    /// An occasion was listed
    OccasionListed {
        /// The new occasion, with every seat available
        occasion: Occasion,
    },

    /// A seat was sold and its ticket token minted
    TicketPurchased {
        /// The minted ticket
        ticket: Ticket,
    },

    /// The ledger was paid out to the issuer
    FundsWithdrawn {
        /// Recipient (always the issuer)
        to: Identity,
        /// Amount moved; zero when the ledger was empty
        amount: Amount,
        /// When the withdrawal happened
        withdrawn_at: DateTime<Utc>,
    },
}

impl RegistryEvent {
    /// Short event name, used for logging and metrics labels
    #[must_use]
    pub const fn event_type(&self) -> &'static str {
        match self {
            Self::OccasionListed { .. } => "OccasionListed",
            Self::TicketPurchased { .. } => "TicketPurchased",
            Self::FundsWithdrawn { .. } => "FundsWithdrawn",
        }
    }
}
