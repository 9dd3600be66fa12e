//! End-to-end registry flows through the async handle.

#![allow(clippy::expect_used, clippy::unwrap_used)] // Test code can use unwrap/expect

use std::sync::Arc;
use tokenmaster_registry::{
    Amount, Identity, Listing, OccasionId, Registry, RegistryConfig, RegistryEnvironment,
    RegistryError, RegistryEvent, SeatNumber, TokenId,
};
use tokenmaster_testing::{InMemoryCustody, helpers::init_test_tracing, test_clock};

fn issuer() -> Identity {
    Identity::new("issuer")
}

fn setup() -> (Registry, InMemoryCustody) {
    init_test_tracing();
    let custody = InMemoryCustody::new();
    let registry = Registry::new(
        RegistryConfig::new("TokenMaster", "TM", issuer()),
        RegistryEnvironment::new(Arc::new(test_clock()), Arc::new(custody.clone())),
    );
    (registry, custody)
}

/// List, buy seat 50, withdraw, then fail to buy seat 50 again.
#[tokio::test]
async fn test_list_purchase_withdraw_flow() {
    let (registry, custody) = setup();
    let buyer = Identity::new("buyer");

    let id = registry
        .list(
            &issuer(),
            Listing::new(
                "ETH Texas",
                Amount::new(1),
                100,
                "Apr 27",
                "10:00AM CST",
                "Austin, Texas",
            ),
        )
        .await
        .unwrap();
    assert_eq!(id, OccasionId::new(1));

    let ticket = registry
        .purchase(&buyer, id, SeatNumber::new(50), Amount::new(1))
        .await
        .unwrap();
    assert_eq!(ticket.token_id, TokenId::new(1));
    assert_eq!(ticket.occasion_id, id);
    assert_eq!(ticket.seat, SeatNumber::new(50));

    assert_eq!(registry.get_occasion(id).await.unwrap().tickets, 99);
    assert!(registry.has_bought(id, &buyer).await);
    assert_eq!(registry.seat_taken(id, SeatNumber::new(50)).await, Some(buyer.clone()));
    assert_eq!(registry.seats_taken(id).await, vec![SeatNumber::new(50)]);
    assert_eq!(registry.balance().await, Amount::new(1));

    let issuer_before = custody.balance_of(&issuer());
    let paid_out = registry.withdraw(&issuer()).await.unwrap();
    assert_eq!(paid_out, Amount::new(1));
    assert_eq!(
        custody.balance_of(&issuer()),
        issuer_before.checked_add(Amount::new(1)).unwrap()
    );
    assert!(registry.balance().await.is_zero());

    for caller in [buyer.clone(), Identity::new("someone-else")] {
        let again = registry
            .purchase(&caller, id, SeatNumber::new(50), Amount::new(1))
            .await;
        assert_eq!(
            again,
            Err(RegistryError::SeatTaken {
                occasion_id: id,
                seat: SeatNumber::new(50),
            })
        );
    }
    assert_eq!(registry.get_occasion(id).await.unwrap().tickets, 99);
}

#[tokio::test]
async fn test_ticket_tokens_follow_sales() {
    let (registry, _custody) = setup();
    let alice = Identity::new("alice");
    let bob = Identity::new("bob");

    let id = registry
        .list(&issuer(), Listing::new("ETH Tokyo", Amount::new(10), 3, "Jun 09", "6PM", "Tokyo"))
        .await
        .unwrap();

    registry.purchase(&alice, id, SeatNumber::new(3), Amount::new(10)).await.unwrap();
    registry.purchase(&bob, id, SeatNumber::new(1), Amount::new(12)).await.unwrap();
    registry.purchase(&alice, id, SeatNumber::new(2), Amount::new(10)).await.unwrap();

    assert_eq!(registry.total_supply().await, 3);
    assert_eq!(registry.owner_of(TokenId::new(2)).await, Some(bob.clone()));
    assert_eq!(registry.owner_of(TokenId::new(4)).await, None);
    assert_eq!(registry.balance_of(&alice).await, 2);
    assert_eq!(registry.balance_of(&bob).await, 1);
    assert_eq!(registry.ticket(TokenId::new(2)).await.unwrap().paid, Amount::new(12));
    assert_eq!(
        registry.seats_taken(id).await,
        vec![SeatNumber::new(3), SeatNumber::new(1), SeatNumber::new(2)]
    );
    assert!(registry.get_occasion(id).await.unwrap().is_sold_out());
    assert_eq!(registry.balance().await, Amount::new(32));
}

#[tokio::test]
async fn test_failed_transfer_keeps_funds_for_retry() {
    let (registry, custody) = setup();
    let id = registry
        .list(&issuer(), Listing::new("Show", Amount::new(5), 10, "d", "t", "l"))
        .await
        .unwrap();
    registry
        .purchase(&Identity::new("buyer"), id, SeatNumber::new(1), Amount::new(5))
        .await
        .unwrap();

    custody.fail_transfers(true);
    let failed = registry.withdraw(&issuer()).await;
    assert!(matches!(failed, Err(RegistryError::TransferFailed(_))));
    assert_eq!(registry.balance().await, Amount::new(5));
    assert!(custody.transfers().is_empty());

    custody.fail_transfers(false);
    assert_eq!(registry.withdraw(&issuer()).await, Ok(Amount::new(5)));
    assert!(registry.balance().await.is_zero());
    assert_eq!(custody.balance_of(&issuer()), Amount::new(5));
}

#[tokio::test]
async fn test_subscribers_see_accepted_actions_only() {
    let (registry, _custody) = setup();
    let mut events = registry.subscribe();

    let id = registry
        .list(&issuer(), Listing::new("Show", Amount::new(5), 10, "d", "t", "l"))
        .await
        .unwrap();
    let rejected = registry
        .purchase(&Identity::new("cheapskate"), id, SeatNumber::new(1), Amount::new(1))
        .await;
    assert!(rejected.is_err());
    registry.withdraw(&issuer()).await.unwrap();

    let first = events.recv().await.unwrap();
    assert_eq!(first.event_type(), "OccasionListed");
    let second = events.recv().await.unwrap();
    assert!(matches!(
        second,
        RegistryEvent::FundsWithdrawn { amount, .. } if amount.is_zero()
    ));
    assert!(events.try_recv().is_err());
}

#[tokio::test]
async fn test_events_serialize_to_json() {
    let (registry, _custody) = setup();
    let mut events = registry.subscribe();

    registry
        .list(&issuer(), Listing::new("Show", Amount::new(5), 10, "d", "t", "l"))
        .await
        .unwrap();

    let event = events.recv().await.unwrap();
    let json = serde_json::to_value(&event).unwrap();
    assert_eq!(json["OccasionListed"]["occasion"]["name"], "Show");
    assert_eq!(json["OccasionListed"]["occasion"]["max_tickets"], 10);
    assert_eq!(json["OccasionListed"]["occasion"]["cost"], 5);

    let text = serde_json::to_string(&event).unwrap();
    let back: RegistryEvent = serde_json::from_str(&text).unwrap();
    assert_eq!(back, event);
}
