//! Refresh cycle scheduling.
//!
//! One persisted [`RefreshTask`] describes the next wake. A wake renews the
//! session; on success it polls the tracker, merges the result into the
//! access-log store, notifies about what was new and re-arms the schedule
//! with a full retry budget. A 500 from the renewal endpoint re-arms a short
//! backoff with one retry fewer until the budget runs out. Any other renewal
//! status ends the session.
//!
//! The schedule carries an epoch. Cancelling (logout) or re-arming for a new
//! login bumps it. A cycle that started under an older epoch may still store
//! and notify, but it never re-arms and never tears down the newer session.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use datawatch_core::credentials::{CredentialStore, Credentials};
use datawatch_core::refresh::{
    RefreshTask, DEFAULT_POLL_INTERVAL, DEFAULT_RETRY_BACKOFF, DEFAULT_RETRY_BUDGET,
};
use datawatch_core::session::{IdentityClaims, LogoutReason, SessionState};
use datawatch_db::repositories::{RefreshTaskRepo, SessionRepo};
use datawatch_db::{AccessLogStore, DbPool};
use datawatch_events::{EventBus, NotificationDispatcher, SessionEvent};
use tokio::sync::{Mutex, Notify};
use tokio_util::sync::CancellationToken;

use crate::error::AgentError;
use crate::keepalive::{RenewResult, SessionKeepAlive};
use crate::poller::DataTrackerPoller;

/// Pause before the run loop retries after a failed schedule read.
const STORAGE_RETRY_DELAY: Duration = Duration::from_secs(30);

/// Timing of the refresh schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Delay between successful cycles.
    pub poll_interval: Duration,
    /// Delay before retrying a renewal that got a 500.
    pub retry_backoff: Duration,
    /// Renewal attempts a fresh schedule starts with.
    pub retry_budget: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            retry_backoff: DEFAULT_RETRY_BACKOFF,
            retry_budget: DEFAULT_RETRY_BUDGET,
        }
    }
}

/// What a single wake did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Session renewed; `inserted` entries were new and `notified` of them
    /// were shown.
    Renewed { inserted: usize, notified: usize },
    /// Renewal got a 500 or failed in transport; retried later.
    RetryScheduled { retries_remaining: u32 },
    /// Renewal failed and no retries are left; the schedule is dormant.
    RetriesExhausted,
    /// The session was rejected and has been torn down.
    LoggedOut,
    /// Another wake is still in flight.
    AlreadyRunning,
    /// Nobody is logged in; nothing was done.
    NotLoggedIn,
    /// The session changed while the renewal was in flight; its rejection
    /// applied to a session that had already ended and was ignored.
    Superseded,
}

/// Collaborators the scheduler drives.
pub struct SchedulerDeps {
    pub pool: DbPool,
    pub store: Arc<AccessLogStore>,
    pub credentials: Arc<dyn CredentialStore>,
    pub keepalive: SessionKeepAlive,
    pub poller: DataTrackerPoller,
    pub dispatcher: NotificationDispatcher,
    pub bus: Arc<EventBus>,
}

/// Owns the refresh schedule and runs cycles against it.
pub struct CycleScheduler {
    pool: DbPool,
    store: Arc<AccessLogStore>,
    credentials: Arc<dyn CredentialStore>,
    keepalive: SessionKeepAlive,
    poller: DataTrackerPoller,
    dispatcher: NotificationDispatcher,
    bus: Arc<EventBus>,
    config: SchedulerConfig,
    /// Held for the whole of a wake.
    cycle: Mutex<()>,
    /// Schedule epoch; every write to the persisted task happens under it.
    epoch: Mutex<u64>,
    /// Signalled whenever the persisted task changes.
    rearmed: Notify,
}

impl CycleScheduler {
    pub fn new(deps: SchedulerDeps, config: SchedulerConfig) -> Self {
        Self {
            pool: deps.pool,
            store: deps.store,
            credentials: deps.credentials,
            keepalive: deps.keepalive,
            poller: deps.poller,
            dispatcher: deps.dispatcher,
            bus: deps.bus,
            config,
            cycle: Mutex::new(()),
            epoch: Mutex::new(0),
            rearmed: Notify::new(),
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn keepalive(&self) -> &SessionKeepAlive {
        &self.keepalive
    }

    // ---------------------------------------------------------------------------
    // Schedule
    // ---------------------------------------------------------------------------

    /// The currently armed task, if any.
    pub async fn pending(&self) -> Result<Option<RefreshTask>, sqlx::Error> {
        RefreshTaskRepo::get(&self.pool).await
    }

    /// Arm a task at the normal interval with a full budget unless one is
    /// already pending. Returns whether a task was armed.
    pub async fn ensure_scheduled(&self) -> Result<bool, sqlx::Error> {
        let _epoch = self.epoch.lock().await;
        if RefreshTaskRepo::get(&self.pool).await?.is_some() {
            return Ok(false);
        }

        let task = self.fresh_task();
        RefreshTaskRepo::upsert(&self.pool, &task).await?;
        tracing::info!(fire_at = %task.fire_at, "Refresh scheduled");
        self.rearmed.notify_one();
        Ok(true)
    }

    /// Replace any pending task with one firing after `delay`.
    ///
    /// A budget of zero arms nothing and returns `false`.
    pub async fn schedule_next(
        &self,
        delay: Duration,
        retries_remaining: u32,
    ) -> Result<bool, sqlx::Error> {
        let epoch = *self.epoch.lock().await;
        self.arm(delay, retries_remaining, epoch).await
    }

    /// Remove the pending task and invalidate in-flight cycles.
    ///
    /// Returns whether a task was pending.
    pub async fn cancel(&self) -> Result<bool, sqlx::Error> {
        let mut epoch = self.epoch.lock().await;
        *epoch += 1;
        let removed = RefreshTaskRepo::delete(&self.pool).await?;
        tracing::info!(removed, epoch = *epoch, "Refresh schedule cancelled");
        self.rearmed.notify_one();
        Ok(removed)
    }

    /// Restore the schedule after a process start.
    ///
    /// A persisted task is kept as is, so an overdue one fires right away.
    /// A logged-in session without a task gets a fresh one.
    pub async fn recover(&self) -> Result<Option<RefreshTask>, sqlx::Error> {
        if let Some(task) = self.pending().await? {
            tracing::info!(
                fire_at = %task.fire_at,
                retries_remaining = task.retries_remaining,
                "Recovered persisted refresh task",
            );
            self.rearmed.notify_one();
            return Ok(Some(task));
        }

        if SessionRepo::get(&self.pool).await?.logged_in {
            tracing::info!("Logged in without a pending refresh, re-arming");
            self.ensure_scheduled().await?;
            return self.pending().await;
        }

        tracing::debug!("No session to recover");
        Ok(None)
    }

    /// Task at the normal interval with a full budget.
    fn fresh_task(&self) -> RefreshTask {
        RefreshTask::after(Utc::now(), self.config.poll_interval, self.config.retry_budget)
    }

    /// Write a task if the schedule epoch is still `expected`.
    async fn arm(
        &self,
        delay: Duration,
        retries_remaining: u32,
        expected: u64,
    ) -> Result<bool, sqlx::Error> {
        if retries_remaining == 0 {
            tracing::warn!("Refusing to schedule with an empty retry budget");
            return Ok(false);
        }

        let epoch = self.epoch.lock().await;
        if *epoch != expected {
            tracing::info!(
                expected,
                current = *epoch,
                "Schedule changed during the cycle, not re-arming",
            );
            return Ok(false);
        }

        let task = RefreshTask::after(Utc::now(), delay, retries_remaining);
        RefreshTaskRepo::upsert(&self.pool, &task).await?;
        tracing::debug!(fire_at = %task.fire_at, retries_remaining, "Refresh armed");
        self.rearmed.notify_one();
        Ok(true)
    }

    // ---------------------------------------------------------------------------
    // Session lifecycle
    // ---------------------------------------------------------------------------

    /// Take over a completed login: store the credentials and identity, then
    /// start a fresh schedule.
    pub async fn on_login(
        &self,
        credentials: Credentials,
        identity: IdentityClaims,
    ) -> Result<(), AgentError> {
        {
            let mut epoch = self.epoch.lock().await;
            *epoch += 1;
            self.credentials.set(&credentials).await?;
            SessionRepo::record_login(&self.pool, &identity).await?;
            self.keepalive.reset();

            let task = self.fresh_task();
            RefreshTaskRepo::upsert(&self.pool, &task).await?;
            tracing::info!(fire_at = %task.fire_at, epoch = *epoch, "Logged in, refresh scheduled");
            self.rearmed.notify_one();
        }

        self.bus.publish(SessionEvent::LoggedIn {
            first_name: identity.first_name,
        });
        Ok(())
    }

    /// Explicit logout by the user. No notification is shown.
    pub async fn on_logout(&self) -> Result<(), AgentError> {
        self.end_session(LogoutReason::UserRequested, None).await?;
        Ok(())
    }

    /// Tear the session down.
    ///
    /// With `expected` set, nothing happens unless the schedule epoch still
    /// matches it. Returns whether the session was ended.
    async fn end_session(
        &self,
        reason: LogoutReason,
        expected: Option<u64>,
    ) -> Result<bool, AgentError> {
        {
            let mut epoch = self.epoch.lock().await;
            if expected.is_some_and(|expected| expected != *epoch) {
                tracing::info!(
                    current = *epoch,
                    "Session changed during the cycle, not logging out",
                );
                return Ok(false);
            }

            *epoch += 1;
            RefreshTaskRepo::delete(&self.pool).await?;
            self.credentials.clear().await?;
            SessionRepo::set_logged_in(&self.pool, false).await?;
            self.keepalive.mark_logged_out();
            self.rearmed.notify_one();
        }

        if let LogoutReason::Unauthorized { status } = reason {
            tracing::warn!(status, "Session rejected by the portal, logged out");
            self.dispatcher.notify_logged_out().await;
        } else {
            tracing::info!("Logged out");
        }

        self.bus.publish(SessionEvent::LoggedOut { reason });
        Ok(true)
    }

    // ---------------------------------------------------------------------------
    // Cycle
    // ---------------------------------------------------------------------------

    /// Run one cycle now.
    ///
    /// Consumes the pending task and uses its remaining budget; without one
    /// the full budget applies. A storage failure while merging is returned
    /// after the schedule has been re-armed.
    pub async fn wake(&self) -> Result<CycleOutcome, AgentError> {
        let Ok(_running) = self.cycle.try_lock() else {
            tracing::debug!("Wake requested while a cycle is running");
            return Ok(CycleOutcome::AlreadyRunning);
        };

        let epoch = *self.epoch.lock().await;
        let task = RefreshTaskRepo::take(&self.pool).await?;
        let retries = task
            .map(|t| t.retries_remaining)
            .unwrap_or(self.config.retry_budget);

        let session = SessionRepo::get(&self.pool).await?;
        if !session.logged_in {
            tracing::debug!("Wake without a session, skipping");
            return Ok(CycleOutcome::NotLoggedIn);
        }

        tracing::info!(retries, "Refresh cycle started");
        match self.keepalive.renew().await {
            Ok(RenewResult::Success) => self.complete(&session, epoch).await,
            Ok(RenewResult::ServerError) => {
                self.retry_later(retries, self.config.retry_backoff, epoch)
                    .await
            }
            Ok(RenewResult::Unauthorized { status }) => {
                let reason = LogoutReason::Unauthorized { status };
                if self.end_session(reason, Some(epoch)).await? {
                    Ok(CycleOutcome::LoggedOut)
                } else {
                    // The rejection belonged to the ended session.
                    self.keepalive.reset();
                    Ok(CycleOutcome::Superseded)
                }
            }
            // Transport failures are transient; wait a normal interval.
            Err(_) => {
                self.retry_later(retries, self.config.poll_interval, epoch)
                    .await
            }
        }
    }

    async fn retry_later(
        &self,
        retries: u32,
        delay: Duration,
        epoch: u64,
    ) -> Result<CycleOutcome, AgentError> {
        let remaining = retries.saturating_sub(1);
        if remaining == 0 {
            tracing::warn!("Renewal retry budget exhausted, schedule dormant until re-armed");
            return Ok(CycleOutcome::RetriesExhausted);
        }

        self.arm(delay, remaining, epoch).await?;
        tracing::info!(
            retries_remaining = remaining,
            delay_secs = delay.as_secs(),
            "Renewal retry scheduled",
        );
        Ok(CycleOutcome::RetryScheduled {
            retries_remaining: remaining,
        })
    }

    async fn complete(
        &self,
        session: &SessionState,
        epoch: u64,
    ) -> Result<CycleOutcome, AgentError> {
        let merged = self.poll_and_store(session).await;
        self.arm(self.config.poll_interval, self.config.retry_budget, epoch)
            .await?;

        let (inserted, notified) = merged?;
        tracing::info!(inserted, notified, "Refresh cycle finished");
        Ok(CycleOutcome::Renewed { inserted, notified })
    }

    /// Poll, merge and notify. Returns `(inserted, notified)`.
    async fn poll_and_store(&self, session: &SessionState) -> Result<(usize, usize), AgentError> {
        let entries = match self.poller.poll_once(session.self_identity()).await {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(error = %e, "Data tracker poll failed");
                return Ok((0, 0));
            }
        };

        let inserted = self.store.merge(&entries).await?;
        let backfill = session.in_backfill();

        let notified = if backfill {
            tracing::info!(
                count = inserted.len(),
                "Initial backfill stored without notifications",
            );
            SessionRepo::set_first_use(&self.pool, Some(false)).await?;
            0
        } else {
            self.dispatcher.notify(&inserted).await
        };

        if !inserted.is_empty() {
            self.bus.publish(SessionEvent::EntriesInserted {
                count: inserted.len(),
                notified: !backfill,
            });
        }
        Ok((inserted.len(), notified))
    }

    // ---------------------------------------------------------------------------
    // Run loop
    // ---------------------------------------------------------------------------

    /// Fire wakes as the persisted task comes due, until `cancel` fires.
    pub async fn run(&self, cancel: CancellationToken) {
        tracing::info!("Refresh scheduler started");

        loop {
            let next = match self.pending().await {
                Ok(next) => next,
                Err(e) => {
                    tracing::error!(error = %e, "Failed to read refresh schedule");
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(STORAGE_RETRY_DELAY) => continue,
                    }
                }
            };

            let Some(task) = next else {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = self.rearmed.notified() => continue,
                }
            };

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = self.rearmed.notified() => continue,
                _ = tokio::time::sleep(task.remaining(Utc::now())) => {
                    match self.wake().await {
                        Ok(outcome) => tracing::debug!(?outcome, "Wake finished"),
                        Err(e) => {
                            tracing::error!(error = %e, "Refresh cycle failed");
                            tokio::select! {
                                _ = cancel.cancelled() => break,
                                _ = tokio::time::sleep(STORAGE_RETRY_DELAY) => {}
                            }
                        }
                    }
                }
            }
        }

        tracing::info!("Refresh scheduler stopped");
    }
}
