//! `datawatch-agent` -- keeps a citizen-portal session alive and reports
//! who accessed the user's personal data.
//!
//! Renews the session on a schedule, polls the data tracker after every
//! successful renewal and shows one notification per new access. See
//! [`AgentConfig::from_env`] for the environment variables.

use std::sync::Arc;

use anyhow::Context;
use datawatch_agent::config::AgentConfig;
use datawatch_agent::identity;
use datawatch_agent::keepalive::SessionKeepAlive;
use datawatch_agent::poller::DataTrackerPoller;
use datawatch_agent::scheduler::{CycleScheduler, SchedulerDeps};
use datawatch_agent::transport::{ReqwestTransport, Transport};
use datawatch_core::credentials::{CredentialStore, Credentials};
use datawatch_db::repositories::SessionRepo;
use datawatch_db::{AccessLogStore, DbCredentialStore, DbPool};
use datawatch_events::{
    EventBus, NotificationDispatcher, Notifier, TracingNotifier, WebhookNotifier,
};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "datawatch_agent=info,datawatch_db=info,datawatch_events=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = AgentConfig::from_env().context("invalid configuration")?;
    tracing::info!(
        database_url = %config.database_url,
        poll_interval_secs = config.poll_interval.as_secs(),
        retry_budget = config.retry_budget,
        webhook = config.webhook_url.is_some(),
        "Loaded agent configuration",
    );

    // --- Database ---
    let pool = datawatch_db::create_pool(&config.database_url)
        .await
        .context("failed to open database")?;
    datawatch_db::run_migrations(&pool)
        .await
        .context("failed to run migrations")?;
    tracing::info!("Database ready");

    // --- Collaborators ---
    let credentials: Arc<dyn CredentialStore> = Arc::new(DbCredentialStore::new(pool.clone()));
    let transport: Arc<dyn Transport> = Arc::new(ReqwestTransport::new(
        Arc::clone(&credentials),
        config.http_timeout,
        config.http_retry,
    )?);
    let notifier: Arc<dyn Notifier> = match &config.webhook_url {
        Some(url) => Arc::new(WebhookNotifier::new(url.clone())?),
        None => Arc::new(TracingNotifier),
    };
    let bus = Arc::new(EventBus::default());

    let scheduler = Arc::new(CycleScheduler::new(
        SchedulerDeps {
            pool: pool.clone(),
            store: Arc::new(AccessLogStore::new(pool.clone())),
            credentials: Arc::clone(&credentials),
            keepalive: SessionKeepAlive::new(
                Arc::clone(&transport),
                config.renew_url.clone(),
                Arc::clone(&bus),
            ),
            poller: DataTrackerPoller::new(Arc::clone(&transport), config.tracker_url.clone()),
            dispatcher: NotificationDispatcher::new(notifier),
            bus: Arc::clone(&bus),
        },
        config.scheduler(),
    ));

    spawn_event_logger(&bus);

    // --- Session ---
    if let Some(token) = &config.session_jwt {
        hand_over_login(
            &scheduler,
            &pool,
            credentials.as_ref(),
            transport.as_ref(),
            &config,
            token,
        )
        .await?;
    }

    match scheduler.recover().await? {
        Some(task) => tracing::info!(fire_at = %task.fire_at, "Next refresh"),
        None => tracing::warn!("Not logged in; set SESSION_JWT to start a session"),
    }

    // --- Run ---
    let cancel = CancellationToken::new();
    let runner = tokio::spawn({
        let scheduler = Arc::clone(&scheduler);
        let cancel = cancel.clone();
        async move { scheduler.run(cancel).await }
    });

    tokio::signal::ctrl_c()
        .await
        .context("failed to install Ctrl+C handler")?;
    tracing::info!("Shutdown signal received");

    cancel.cancel();
    runner.await.context("scheduler task panicked")?;
    pool.close().await;

    tracing::info!("datawatch-agent stopped");
    Ok(())
}

/// Start a session from a handed-over token unless one is already active.
async fn hand_over_login(
    scheduler: &CycleScheduler,
    pool: &DbPool,
    credentials: &dyn CredentialStore,
    transport: &dyn Transport,
    config: &AgentConfig,
    token: &str,
) -> anyhow::Result<()> {
    if SessionRepo::get(pool).await?.logged_in {
        tracing::info!("Session already active, ignoring SESSION_JWT");
        return Ok(());
    }

    let jar = Credentials::from_jwt(token);
    credentials.set(&jar).await?;
    let claims = identity::resolve_identity(token, transport, &config.identity_url)
        .await
        .context("failed to resolve identity for the new session")?;

    scheduler.on_login(jar, claims).await?;
    Ok(())
}

/// Log every session event at info level.
fn spawn_event_logger(bus: &EventBus) {
    let mut rx = bus.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => match serde_json::to_string(&event) {
                    Ok(json) => tracing::info!(event = %json, "Session event"),
                    Err(e) => tracing::warn!(error = %e, "Unserializable session event"),
                },
                Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "Event logger lagged");
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    });
}
