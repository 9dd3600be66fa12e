//! # TokenMaster Registry
//!
//! A ticket-sale registry. The issuer lists occasions (named events with a
//! price and a fixed number of seats); anyone buys a specific numbered seat
//! by attaching a payment at or above the price; each sale mints a ticket
//! token held by the buyer; the issuer withdraws the accumulated funds.
//!
//! ## Architecture
//!
//! - [`RegistryReducer`]: every business rule, validate-then-apply
//! - [`Registry`]: async handle over a [`tokenmaster_runtime::Store`]; all
//!   mutations are serialized, queries see whole-action snapshots
//! - [`RegistryEnvironment`]: injected clock and custody
//!
//! ## Example
//!
//! ```ignore
//! use tokenmaster_registry::{Listing, Registry, RegistryConfig, SeatNumber};
//!
//! let registry = Registry::new(RegistryConfig::default(), environment);
//! let id = registry.list(&issuer, Listing::new(
//!     "ETH Tokyo", Amount::new(10), 125, "Jun 09", "6:00PM JST", "Tokyo, Japan",
//! )).await?;
//!
//! let ticket = registry.purchase(&buyer, id, SeatNumber::new(7), Amount::new(10)).await?;
//! assert_eq!(registry.seat_taken(id, SeatNumber::new(7)).await, Some(buyer));
//! ```

pub mod actions;
pub mod environment;
pub mod error;
pub mod reducer;
pub mod registry;
pub mod types;

pub use actions::{RegistryAction, RegistryEvent};
pub use environment::RegistryEnvironment;
pub use error::RegistryError;
pub use reducer::RegistryReducer;
pub use registry::{Registry, RegistryConfig};
pub use tokenmaster_core::{Amount, Identity};
pub use types::{Listing, Occasion, OccasionId, RegistryState, SeatNumber, Ticket, TokenId};
