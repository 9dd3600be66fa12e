//! # TokenMaster
//!
//! Wiring for the registry binary: environment configuration, a local
//! custody, and tracing setup.

pub mod config;
pub mod custody;

pub use config::{Config, ConfigError};
pub use custody::LocalCustody;

/// Default log filter when `RUST_LOG` is unset
pub const DEFAULT_LOG_FILTER: &str =
    "tokenmaster=info,tokenmaster_registry=info,tokenmaster_runtime=debug";

/// Install the global tracing subscriber (`RUST_LOG` or [`DEFAULT_LOG_FILTER`])
pub fn init_tracing() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
