//! Open-house rewards server
//!
//! Serves the agent, gift and lead-capture APIs, runs the notification
//! worker and, when configured, the scheduled sweep of Pending gifts.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::http::{HeaderValue, Method};
use tokio::signal;
use tower_http::cors::{Any, CorsLayer};

use openhouse_rewards::config::Config;
use openhouse_rewards::db::Database;
use openhouse_rewards::gifts::{start_pending_sweep, GiftService};
use openhouse_rewards::leads::LeadService;
use openhouse_rewards::middleware::RateLimiter;
use openhouse_rewards::notifications::{
    Dispatcher, DynMailClient, DynNotificationSink, Notifier, SmtpMailClient,
};
use openhouse_rewards::provider::{BrandCatalog, GiftProvider, GiftbitClient};
use openhouse_rewards::routes;
use openhouse_rewards::state::AppState;
use openhouse_rewards::store::Store;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level)),
        )
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::info!(environment = config.environment.as_str(), "Starting open-house rewards server");

    let database = Database::connect(&config)
        .await
        .context("database initialisation failed")?;
    let store: Arc<dyn Store> = Arc::new(database.store());

    let provider: Arc<dyn GiftProvider> = Arc::new(
        GiftbitClient::new(
            config.gift_provider_base_url.clone(),
            config.gift_provider_api_key.clone(),
            config.gift_provider_timeout,
        )
        .context("gift provider client")?,
    );
    if !provider.is_configured() {
        tracing::warn!("GIFT_PROVIDER_API_KEY not set; gift issuance will be refused");
    }

    let mailer: Option<DynMailClient> = match &config.smtp {
        Some(settings) => Some(Arc::new(
            SmtpMailClient::new(settings).context("SMTP transport")?,
        )),
        None => {
            tracing::warn!("SMTP not configured; emails will be skipped");
            None
        }
    };
    let (notifier, notifier_handle) =
        Notifier::spawn(Dispatcher::new(mailer, config.app_base_url.clone()));
    let notifier: DynNotificationSink = Arc::new(notifier);

    let catalog = BrandCatalog::new(provider.clone(), store.clone(), config.brand_cache_ttl);
    let gift_service = GiftService::new(
        store.clone(),
        provider,
        catalog.clone(),
        notifier.clone(),
        config.gift_policy(),
    );
    let lead_service = LeadService::new(
        store,
        gift_service.clone(),
        notifier,
        config.auto_settle_pending_gifts,
    );

    let sweeper = match &config.pending_sweep_cron {
        Some(cron) => Some(
            start_pending_sweep(gift_service.clone(), cron)
                .await
                .context("pending gift sweep")?,
        ),
        None => {
            tracing::info!("Pending gift sweep disabled");
            None
        }
    };

    let issuance_limiter = RateLimiter::per_minute(config.rate_limit_per_minute);
    let limiter_cleanup = issuance_limiter.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(300));
        loop {
            interval.tick().await;
            limiter_cleanup.cleanup(Duration::from_secs(600)).await;
        }
    });

    let app_state = AppState::new(
        gift_service,
        lead_service,
        catalog,
        issuance_limiter,
        Some(database),
    );

    let app = routes::router(app_state).layer(configure_cors(config.cors_allowed_origins.as_deref()));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;

    tracing::info!("Server listening on {}", addr);
    tracing::info!("Health check at http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    if let Some(mut scheduler) = sweeper {
        if let Err(e) = scheduler.shutdown().await {
            tracing::warn!(error = %e, "Pending gift sweep did not stop cleanly");
        }
    }

    // The queue closes once the last sink clone is dropped; give the worker
    // a bounded window to flush what is left.
    if tokio::time::timeout(Duration::from_secs(10), notifier_handle)
        .await
        .is_err()
    {
        tracing::warn!("Notification worker did not drain before shutdown");
    }

    tracing::info!("Server shutdown complete");
    Ok(())
}

fn configure_cors(allowed_origins: Option<&str>) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .unwrap_or_default()
        .split(',')
        .filter_map(|s| s.trim().parse().ok())
        .collect();

    if origins.is_empty() {
        tracing::warn!("CORS_ALLOWED_ORIGINS not set, allowing all origins (permissive)");
        return CorsLayer::permissive();
    }

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown...");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown...");
        }
    }
}
