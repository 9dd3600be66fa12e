//! Domain types for the ticket registry.
//!
//! - [`Occasion`]: a listed event with price, capacity and display metadata
//! - [`Ticket`]: a sold seat, minted as a numbered token; doubles as the purchase receipt
//! - [`RegistryState`]: everything the registry owns, mutated only by the reducer

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tokenmaster_core::{Amount, Identity};

/// Sequential occasion identifier, starting at 1
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OccasionId(u64);

impl OccasionId {
    /// Creates an `OccasionId` from its numeric value
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the numeric value
    #[must_use]
    pub const fn value(&self) -> u64 {
        self.0
    }

    /// Position in the append-only occasion table (id 1 is index 0)
    fn index(self) -> Option<usize> {
        self.0
            .checked_sub(1)
            .and_then(|index| usize::try_from(index).ok())
    }
}

impl std::fmt::Display for OccasionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Caller-chosen seat number, valid in `1..=max_tickets`
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SeatNumber(u32);

impl SeatNumber {
    /// Creates a `SeatNumber`
    #[must_use]
    pub const fn new(seat: u32) -> Self {
        Self(seat)
    }

    /// Returns the numeric value
    #[must_use]
    pub const fn value(&self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for SeatNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Sequential ticket token identifier, starting at 1
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TokenId(u64);

impl TokenId {
    /// Creates a `TokenId`
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the numeric value
    #[must_use]
    pub const fn value(&self) -> u64 {
        self.0
    }

    fn index(self) -> Option<usize> {
        self.0
            .checked_sub(1)
            .and_then(|index| usize::try_from(index).ok())
    }
}

impl std::fmt::Display for TokenId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What the issuer submits to list a new occasion
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Listing {
    /// Display name
    pub name: String,
    /// Price of one seat
    pub cost: Amount,
    /// Seat capacity; must be at least 1
    pub max_tickets: u32,
    /// Free-form date text
    pub date: String,
    /// Free-form time text
    pub time: String,
    /// Free-form location text
    pub location: String,
}

impl Listing {
    /// Creates a listing
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        cost: Amount,
        max_tickets: u32,
        date: impl Into<String>,
        time: impl Into<String>,
        location: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            cost,
            max_tickets,
            date: date.into(),
            time: time.into(),
            location: location.into(),
        }
    }
}

/// A listed occasion
///
/// Everything except `tickets` is fixed at listing time.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Occasion {
    /// Sequential id
    pub id: OccasionId,
    /// Display name
    pub name: String,
    /// Price of one seat
    pub cost: Amount,
    /// Remaining (unsold) seats
    pub tickets: u32,
    /// Seat capacity
    pub max_tickets: u32,
    /// Free-form date text
    pub date: String,
    /// Free-form time text
    pub time: String,
    /// Free-form location text
    pub location: String,
    /// When the issuer listed it
    pub listed_at: DateTime<Utc>,
}

impl Occasion {
    /// Builds an occasion from a listing, with every seat still available
    #[must_use]
    pub fn from_listing(id: OccasionId, listing: Listing, listed_at: DateTime<Utc>) -> Self {
        Self {
            id,
            name: listing.name,
            cost: listing.cost,
            tickets: listing.max_tickets,
            max_tickets: listing.max_tickets,
            date: listing.date,
            time: listing.time,
            location: listing.location,
            listed_at,
        }
    }

    /// Number of seats sold so far
    #[must_use]
    pub const fn tickets_sold(&self) -> u32 {
        self.max_tickets.saturating_sub(self.tickets)
    }

    /// Checks whether every seat is sold
    #[must_use]
    pub const fn is_sold_out(&self) -> bool {
        self.tickets == 0
    }

    /// Checks whether `seat` lies in `1..=max_tickets`
    #[must_use]
    pub const fn has_seat(&self, seat: SeatNumber) -> bool {
        seat.0 >= 1 && seat.0 <= self.max_tickets
    }
}

/// A sold seat, minted as a ticket token
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    /// Token id
    pub token_id: TokenId,
    /// Occasion the seat belongs to
    pub occasion_id: OccasionId,
    /// Seat number
    pub seat: SeatNumber,
    /// Buyer
    pub owner: Identity,
    /// Full payment retained by the registry (may exceed the cost)
    pub paid: Amount,
    /// When the sale was recorded
    pub purchased_at: DateTime<Utc>,
}

/// Per-occasion seat bookkeeping
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct OccasionRecord {
    pub(crate) occasion: Occasion,
    pub(crate) seat_owners: HashMap<SeatNumber, Identity>,
    pub(crate) sale_order: Vec<SeatNumber>,
}

impl OccasionRecord {
    fn new(occasion: Occasion) -> Self {
        Self {
            occasion,
            seat_owners: HashMap::new(),
            sale_order: Vec::new(),
        }
    }
}

/// State of the registry
///
/// Occasions live in an append-only table where id `n` sits at index
/// `n - 1`; tickets use the same scheme. Fields are crate-private: only the
/// reducer mutates them, callers go through the query methods.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryState {
    pub(crate) name: String,
    pub(crate) symbol: String,
    pub(crate) issuer: Identity,
    pub(crate) occasions: Vec<OccasionRecord>,
    pub(crate) purchases: HashSet<(OccasionId, Identity)>,
    pub(crate) tickets: Vec<Ticket>,
    pub(crate) holdings: HashMap<Identity, u64>,
    pub(crate) ledger: Amount,
}

impl RegistryState {
    /// Creates an empty registry owned by `issuer`
    #[must_use]
    pub fn new(name: impl Into<String>, symbol: impl Into<String>, issuer: Identity) -> Self {
        Self {
            name: name.into(),
            symbol: symbol.into(),
            issuer,
            occasions: Vec::new(),
            purchases: HashSet::new(),
            tickets: Vec::new(),
            holdings: HashMap::new(),
            ledger: Amount::ZERO,
        }
    }

    /// Display name given at construction
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Display symbol given at construction
    #[must_use]
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// The issuer: the only identity allowed to list and withdraw
    #[must_use]
    pub const fn owner(&self) -> &Identity {
        &self.issuer
    }

    /// Number of occasions listed so far (also the highest id)
    #[must_use]
    pub fn total_occasions(&self) -> u64 {
        self.occasions.len() as u64
    }

    /// Looks up an occasion, including its remaining tickets
    #[must_use]
    pub fn occasion(&self, id: OccasionId) -> Option<&Occasion> {
        self.record(id).map(|record| &record.occasion)
    }

    /// All occasions in id order
    pub fn occasions(&self) -> impl Iterator<Item = &Occasion> {
        self.occasions.iter().map(|record| &record.occasion)
    }

    /// Whether `buyer` bought at least one seat of `occasion_id`
    #[must_use]
    pub fn has_bought(&self, occasion_id: OccasionId, buyer: &Identity) -> bool {
        self.purchases.contains(&(occasion_id, buyer.clone()))
    }

    /// Owner of a seat, or `None` if the seat (or occasion) is unsold/unknown
    #[must_use]
    pub fn seat_taken(&self, occasion_id: OccasionId, seat: SeatNumber) -> Option<&Identity> {
        self.record(occasion_id)
            .and_then(|record| record.seat_owners.get(&seat))
    }

    /// Seats sold for an occasion, in the order they were sold
    #[must_use]
    pub fn seats_taken(&self, occasion_id: OccasionId) -> &[SeatNumber] {
        self.record(occasion_id)
            .map_or(&[], |record| record.sale_order.as_slice())
    }

    /// Funds currently held by the registry
    #[must_use]
    pub const fn balance(&self) -> Amount {
        self.ledger
    }

    /// Number of ticket tokens minted
    #[must_use]
    pub fn total_supply(&self) -> u64 {
        self.tickets.len() as u64
    }

    /// Looks up a ticket by token id
    #[must_use]
    pub fn ticket(&self, token_id: TokenId) -> Option<&Ticket> {
        token_id.index().and_then(|index| self.tickets.get(index))
    }

    /// Holder of a ticket token
    #[must_use]
    pub fn owner_of(&self, token_id: TokenId) -> Option<&Identity> {
        self.ticket(token_id).map(|ticket| &ticket.owner)
    }

    /// Number of tickets held by `holder`
    #[must_use]
    pub fn balance_of(&self, holder: &Identity) -> u64 {
        self.holdings.get(holder).copied().unwrap_or(0)
    }

    pub(crate) fn record(&self, id: OccasionId) -> Option<&OccasionRecord> {
        id.index().and_then(|index| self.occasions.get(index))
    }

    pub(crate) fn record_mut(&mut self, id: OccasionId) -> Option<&mut OccasionRecord> {
        id.index().and_then(|index| self.occasions.get_mut(index))
    }

    pub(crate) fn next_occasion_id(&self) -> OccasionId {
        OccasionId::new(self.total_occasions() + 1)
    }

    pub(crate) fn next_token_id(&self) -> TokenId {
        TokenId::new(self.total_supply() + 1)
    }

    pub(crate) fn push_occasion(&mut self, occasion: Occasion) {
        self.occasions.push(OccasionRecord::new(occasion));
    }
}
