//! Rejection reasons for registry actions.

use crate::types::{OccasionId, SeatNumber};
use thiserror::Error;
use tokenmaster_core::environment::CustodyError;
use tokenmaster_core::{Amount, Identity};

/// Why the registry refused an action
///
/// A rejected action leaves the registry exactly as it was.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// A privileged action was attempted by someone other than the issuer
    #[error("{caller} is not the issuer")]
    Unauthorized {
        /// Who tried
        caller: Identity,
    },

    /// The occasion id is 0 or was never listed
    #[error("Occasion {0} not found")]
    NotFound(OccasionId),

    /// The seat is outside `1..=max_tickets`
    #[error("Seat {seat} is not valid for occasion {occasion_id} (1..={max_tickets})")]
    InvalidSeat {
        /// Occasion asked for
        occasion_id: OccasionId,
        /// Seat asked for
        seat: SeatNumber,
        /// Capacity of the occasion
        max_tickets: u32,
    },

    /// The seat was already sold
    #[error("Seat {seat} of occasion {occasion_id} is already taken")]
    SeatTaken {
        /// Occasion asked for
        occasion_id: OccasionId,
        /// Seat asked for
        seat: SeatNumber,
    },

    /// Attached payment is below the ticket cost
    #[error("Insufficient payment: cost is {required}, offered {offered}")]
    InsufficientPayment {
        /// Ticket cost
        required: Amount,
        /// Payment attached
        offered: Amount,
    },

    /// The custody collaborator refused the withdrawal transfer
    #[error("Withdrawal transfer failed: {0}")]
    TransferFailed(#[from] CustodyError),

    /// The listing has zero capacity or blank text
    #[error("Invalid listing: {0}")]
    InvalidListing(String),

    /// Accepting the payment would overflow the ledger
    #[error("Ledger balance would overflow")]
    LedgerOverflow,

    /// The registry no longer accepts actions
    #[error("Registry is shutting down")]
    ShuttingDown,

    /// The store recorded an event of the wrong kind for the action sent
    #[error("{action} recorded an unexpected {recorded} event")]
    UnexpectedEvent {
        /// Action that was sent
        action: &'static str,
        /// Event the store returned
        recorded: &'static str,
    },
}

impl RegistryError {
    /// Stable label for metrics and logs
    ///
    /// Used as the `kind` label of the registry rejection counter.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Unauthorized { .. } => "unauthorized",
            Self::NotFound(_) => "not_found",
            Self::InvalidSeat { .. } => "invalid_seat",
            Self::SeatTaken { .. } => "seat_taken",
            Self::InsufficientPayment { .. } => "insufficient_payment",
            Self::TransferFailed(_) => "transfer_failed",
            Self::InvalidListing(_) => "invalid_listing",
            Self::LedgerOverflow => "ledger_overflow",
            Self::ShuttingDown => "shutting_down",
            Self::UnexpectedEvent { .. } => "unexpected_event",
        }
    }
}
