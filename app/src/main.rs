//! TokenMaster binary
//!
//! Boots a registry from environment configuration and runs a short sale:
//! the issuer lists occasions, buyers race for seats, the issuer withdraws.
//! Every recorded event is printed as JSON.

use anyhow::Context;
use std::sync::Arc;
use tokenmaster::{Config, LocalCustody, init_tracing};
use tokenmaster_core::environment::SystemClock;
use tokenmaster_registry::{
    Amount, Identity, Listing, Registry, RegistryEnvironment, RegistryEvent, SeatNumber,
};
use tokenmaster_runtime::metrics::MetricsServer;
use tokio::sync::broadcast;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    init_tracing();

    let config = Config::from_env().context("Failed to load configuration")?;
    info!(
        name = %config.registry.name,
        issuer = %config.registry.issuer,
        metrics = config.metrics.enabled,
        "Configuration loaded"
    );

    let mut metrics_server = None;
    if config.metrics.enabled {
        let mut server = MetricsServer::new(config.metrics_addr()?);
        server.start().context("Failed to start metrics")?;
        metrics_server = Some(server);
    }

    let custody = Arc::new(LocalCustody::new());
    let registry = Registry::with_store_config(
        config.registry_config(),
        RegistryEnvironment::new(Arc::new(SystemClock), custody.clone()),
        &config.store_config(),
    );
    let printer = tokio::spawn(print_events(registry.subscribe()));

    let issuer = Identity::new(config.registry.issuer.clone());
    println!(
        "=== {} ({}) owned by {} ===\n",
        registry.name().await,
        registry.symbol().await,
        registry.owner().await
    );

    // List
    let occasions = [
        Listing::new(
            "ETH Texas",
            Amount::new(1_000),
            100,
            "Apr 27",
            "10:00AM CST",
            "Austin, Texas",
        ),
        Listing::new(
            "ETH Tokyo",
            Amount::new(250),
            125,
            "Jun 09",
            "6:00PM JST",
            "Tokyo, Japan",
        ),
        Listing::new(
            "ETH Global Toronto",
            Amount::new(500),
            2,
            "Aug 11",
            "10:00AM EST",
            "Toronto, Canada",
        ),
    ];
    for listing in occasions {
        registry.list(&issuer, listing).await?;
    }
    println!(">>> {} occasions listed", registry.total_occasions().await);

    // Purchase: three buyers want both Toronto seats
    let Some(toronto) = registry.occasions().await.last().map(|occasion| occasion.id) else {
        anyhow::bail!("no occasions listed");
    };
    let wanted = [("alice", 1), ("bob", 2), ("carol", 1)];
    let attempts: Vec<_> = wanted
        .into_iter()
        .map(|(buyer, seat)| {
            let registry = registry.clone();
            let buyer = Identity::new(buyer);
            let seat = SeatNumber::new(seat);
            tokio::spawn(async move {
                let outcome = registry.purchase(&buyer, toronto, seat, Amount::new(500)).await;
                (buyer, seat, outcome)
            })
        })
        .collect();

    for attempt in attempts {
        let (buyer, seat, outcome) = attempt.await?;
        match outcome {
            Ok(ticket) => println!(">>> {buyer} bought seat {seat} (ticket {})", ticket.token_id),
            Err(error) => println!(">>> {buyer} could not buy seat {seat}: {error}"),
        }
    }

    // An underpaid purchase is rejected and changes nothing
    if let Err(error) = registry
        .purchase(&Identity::new("dave"), toronto, SeatNumber::new(1), Amount::new(1))
        .await
    {
        println!(">>> dave rejected: {error}");
    }

    let occasion = registry.get_occasion(toronto).await;
    println!(
        ">>> {} seats left, sold in order {:?}",
        occasion.map_or(0, |occasion| occasion.tickets),
        registry
            .seats_taken(toronto)
            .await
            .iter()
            .map(SeatNumber::value)
            .collect::<Vec<_>>()
    );
    println!(">>> Ledger holds {}", registry.balance().await);

    // Withdraw
    match registry.withdraw(&Identity::new("mallory")).await {
        Ok(_) => warn!("Non-issuer withdrawal was accepted"),
        Err(error) => println!(">>> mallory rejected: {error}"),
    }
    let paid_out = registry.withdraw(&issuer).await?;
    println!(
        ">>> Withdrew {paid_out}; issuer custody balance {}",
        custody.balance_of(&issuer)?
    );

    let snapshot = registry
        .inspect(|state| serde_json::to_string_pretty(state))
        .await?;
    println!("\n=== Final state ===\n{snapshot}");

    if let Some(text) = metrics_server.as_ref().and_then(MetricsServer::render) {
        println!("\n=== Metrics ===\n{text}");
    }

    registry.shutdown();
    drop(registry);
    printer.await?;
    Ok(())
}

/// Print each recorded event as one JSON line until the registry is dropped
async fn print_events(mut events: broadcast::Receiver<RegistryEvent>) {
    loop {
        match events.recv().await {
            Ok(event) => match serde_json::to_string(&event) {
                Ok(json) => println!("event: {json}"),
                Err(error) => warn!(%error, "Failed to serialize event"),
            },
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "Event printer fell behind");
            },
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
