//! Reelpass API server.

use std::sync::Arc;

use anyhow::Context;
use secrecy::ExposeSecret;
use tokio::signal;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use reelpass::adapters::http::{app_router, AppDependencies, AppState, Repositories};
use reelpass::adapters::postgres::run_migrations;
use reelpass::adapters::{
    Argon2PasswordHasher, InMemoryEntitlementStore, InMemoryWebhookInbox, JwtTokenService,
    LoggingNotifier, PostgresEntitlementStore, PostgresWebhookInbox, StaticPlanCatalog,
    StripePaymentAdapter,
};
use reelpass::application::RetryPolicy;
use reelpass::config::{AppConfig, LogFormat, ServerConfig};
use reelpass::domain::subscription::WebhookVerifier;
use reelpass::ports::{Clock, SystemClock, WebhookEventRepository};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load().context("loading configuration")?;
    init_tracing(&config.server);
    config.validate().context("validating configuration")?;

    tracing::info!(
        environment = ?config.server.environment,
        port = config.server.port,
        "Starting Reelpass"
    );

    let (repositories, inbox) = match &config.database {
        Some(database) => {
            let pool = database
                .pool_options()
                .connect(database.url.expose_secret())
                .await
                .context("connecting to PostgreSQL")?;
            if database.run_migrations {
                run_migrations(&pool).await.context("running migrations")?;
                tracing::info!("Database migrations applied");
            }
            let inbox: Arc<dyn WebhookEventRepository> =
                Arc::new(PostgresWebhookInbox::new(pool.clone()));
            (
                Repositories::from_store(Arc::new(PostgresEntitlementStore::new(pool))),
                inbox,
            )
        }
        None => {
            tracing::warn!("No database configured; using the in-memory store");
            let inbox: Arc<dyn WebhookEventRepository> = Arc::new(InMemoryWebhookInbox::new());
            (
                Repositories::from_store(Arc::new(InMemoryEntitlementStore::new())),
                inbox,
            )
        }
    };

    let catalog = StaticPlanCatalog::from_config(&config.catalog).context("loading plans")?;
    let payment_provider =
        StripePaymentAdapter::new(&config.payment).context("building payment client")?;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let state = AppState::new(AppDependencies {
        repositories,
        inbox,
        catalog: Arc::new(catalog),
        payment_provider: Arc::new(payment_provider),
        password_hasher: Arc::new(Argon2PasswordHasher::new()),
        token_service: Arc::new(JwtTokenService::new(&config.auth, clock.clone())),
        notifier: Arc::new(LoggingNotifier),
        clock,
        webhook_verifier: WebhookVerifier::new(config.payment.webhook_secret.clone()),
        retry: RetryPolicy::from_config(&config.payment),
        entitlement: config.entitlement.clone(),
        reconciler: config.reconciler.clone(),
    });

    let app = app_router(state, &config.server);
    let addr = config.server.socket_addr().context("parsing listen address")?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {}", addr))?;
    tracing::info!("HTTP server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving HTTP")?;

    tracing::info!("Shutdown complete");
    Ok(())
}

/// `RUST_LOG` wins over the configured level.
fn init_tracing(server: &ServerConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(server.log_level.clone()));
    let registry = tracing_subscriber::registry().with(filter);
    match server.log_format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => tracing::error!("Failed to install SIGTERM handler: {}", e),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    tracing::info!("Shutdown signal received");
}
