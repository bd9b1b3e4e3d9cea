//! Elecommerce Storefront - Checkout backend.
//!
//! This binary serves the checkout API, the Stripe webhook and the checkout
//! push channel on port 3000.
//!
//! # Architecture
//!
//! - Axum web framework, JSON API plus one websocket route
//! - `PostgreSQL` for buyers, saved addresses, orders and carts
//! - Stripe REST API for payment intents
//!
//! # Security
//!
//! Webhook deliveries are only trusted when `STRIPE_WEBHOOK_SECRET` is set.
//! Without it the server still starts, for local development, and says so
//! loudly in the log.

#![cfg_attr(not(test), forbid(unsafe_code))]

use elecommerce_storefront::config::StorefrontConfig;
use elecommerce_storefront::db::{self, PgCheckoutStore};
use elecommerce_storefront::state::ProductionState;
use elecommerce_storefront::stripe::StripeClient;
use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &StorefrontConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: config
                .sentry_environment
                .clone()
                .map(std::borrow::Cow::Owned),
            sample_rate: config.sentry_sample_rate,
            traces_sample_rate: config.sentry_traces_sample_rate,
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    tracing::info!("Sentry initialized");
    Some(guard)
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "elecommerce_storefront=info,tower_http=debug".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();
}

#[tokio::main]
async fn main() {
    let config = StorefrontConfig::from_env().expect("Failed to load configuration");

    // Sentry must be initialized before the tracing subscriber.
    let _sentry_guard = init_sentry(&config);
    init_tracing();

    // Migrations are applied separately: `elec-cli migrate`.
    let pool = db::create_pool(&config.database_url)
        .await
        .expect("Failed to create database pool");
    let store = PgCheckoutStore::new(pool);

    let stripe = StripeClient::new(&config.stripe).expect("Failed to create Stripe client");
    let trust = config.stripe.webhook_trust.clone();
    if trust.is_verified() {
        tracing::info!(api_base = %config.stripe.api_base, "Stripe webhooks verified");
    } else {
        tracing::warn!(
            "STRIPE_WEBHOOK_SECRET is not set: webhook signatures are NOT verified. \
             Anyone who can reach /webhooks/stripe can mark orders paid."
        );
    }

    let app = elecommerce_storefront::app(ProductionState::new(store, stripe, trust))
        .layer(sentry_tower::NewSentryLayer::new_from_top())
        .layer(sentry_tower::SentryHttpLayer::new().enable_transaction());

    let addr = config.socket_addr();
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");
    tracing::info!(%addr, "Checkout backend listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}
