#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicU16, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use datawatch_agent::keepalive::SessionKeepAlive;
use datawatch_agent::poller::DataTrackerPoller;
use datawatch_agent::scheduler::{CycleScheduler, SchedulerConfig, SchedulerDeps};
use datawatch_agent::transport::{HttpResponse, Transport, TransportError};
use datawatch_core::credentials::{Credentials, MemoryCredentialStore};
use datawatch_core::session::IdentityClaims;
use datawatch_db::{AccessLogStore, DbPool};
use datawatch_events::{EventBus, Notification, NotificationDispatcher, Notifier, NotifyError};
use serde_json::json;
use tokio::sync::{Notify, Semaphore};

pub const RENEW_URL: &str = "http://portal.test/renew";
pub const TRACKER_URL: &str = "http://portal.test/usages";

// ---------------------------------------------------------------------------
// Fake portal
// ---------------------------------------------------------------------------

/// In-process stand-in for the renewal and tracker endpoints.
pub struct FakePortal {
    renew_status: AtomicU16,
    renew_offline: AtomicBool,
    tracker: Mutex<HttpResponse>,
    pub renew_calls: AtomicUsize,
    pub tracker_calls: AtomicUsize,
    hold_renewals: AtomicBool,
    /// Signalled when a held renewal is waiting.
    pub renewal_entered: Notify,
    renewal_gate: Semaphore,
}

impl Default for FakePortal {
    fn default() -> Self {
        Self {
            renew_status: AtomicU16::new(200),
            renew_offline: AtomicBool::new(false),
            tracker: Mutex::new(HttpResponse::new(200, usages(&[]))),
            renew_calls: AtomicUsize::new(0),
            tracker_calls: AtomicUsize::new(0),
            hold_renewals: AtomicBool::new(false),
            renewal_entered: Notify::new(),
            renewal_gate: Semaphore::new(0),
        }
    }
}

impl FakePortal {
    pub fn renew_with(&self, status: u16) {
        self.renew_status.store(status, Ordering::SeqCst);
    }

    pub fn renew_offline(&self, offline: bool) {
        self.renew_offline.store(offline, Ordering::SeqCst);
    }

    pub fn tracker_returns(&self, status: u16, body: impl Into<String>) {
        *self.tracker.lock().unwrap() = HttpResponse::new(status, body);
    }

    /// Make renewals block until [`FakePortal::release_renewal`].
    pub fn hold_renewals(&self) {
        self.hold_renewals.store(true, Ordering::SeqCst);
    }

    pub fn release_renewal(&self) {
        self.renewal_gate.add_permits(1);
    }

    pub fn renew_calls(&self) -> usize {
        self.renew_calls.load(Ordering::SeqCst)
    }

    pub fn tracker_calls(&self) -> usize {
        self.tracker_calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl Transport for FakePortal {
    async fn get(&self, url: &str) -> Result<HttpResponse, TransportError> {
        if url == RENEW_URL {
            self.renew_calls.fetch_add(1, Ordering::SeqCst);
            if self.hold_renewals.load(Ordering::SeqCst) {
                self.renewal_entered.notify_one();
                self.renewal_gate.acquire().await.unwrap().forget();
            }
            if self.renew_offline.load(Ordering::SeqCst) {
                return Err(TransportError::RetriesExhausted {
                    url: url.to_string(),
                    attempts: 3,
                    message: "connection refused".into(),
                });
            }
            return Ok(HttpResponse::new(self.renew_status.load(Ordering::SeqCst), ""));
        }

        assert_eq!(url, TRACKER_URL, "unexpected request");
        self.tracker_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.tracker.lock().unwrap().clone())
    }
}

/// A tracker body with one record per `(log_time, receiver)` pair.
pub fn usages(records: &[(&str, &str)]) -> String {
    let records: Vec<_> = records
        .iter()
        .map(|(log_time, receiver)| {
            json!({
                "logTime": log_time,
                "receiver": receiver,
                "infoSystemCode": "RR",
                "action": "read",
            })
        })
        .collect();
    json!({ "findUsageResponses": records }).to_string()
}

// ---------------------------------------------------------------------------
// Recording notifier
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct RecordingNotifier {
    shown: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn shown(&self) -> Vec<Notification> {
        self.shown.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Notifier for RecordingNotifier {
    async fn show(&self, notification: &Notification) -> Result<(), NotifyError> {
        self.shown.lock().unwrap().push(notification.clone());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

pub struct Harness {
    pub scheduler: Arc<CycleScheduler>,
    pub portal: Arc<FakePortal>,
    pub notifier: Arc<RecordingNotifier>,
    pub credentials: Arc<MemoryCredentialStore>,
    pub store: Arc<AccessLogStore>,
    pub bus: Arc<EventBus>,
    pub pool: DbPool,
}

impl Harness {
    /// Harness over an already migrated database.
    pub fn new(pool: DbPool) -> Self {
        let portal = Arc::new(FakePortal::default());
        let notifier = Arc::new(RecordingNotifier::default());
        let credentials = Arc::new(MemoryCredentialStore::default());
        let store = Arc::new(AccessLogStore::new(pool.clone()));
        let bus = Arc::new(EventBus::default());

        let scheduler = CycleScheduler::new(
            SchedulerDeps {
                pool: pool.clone(),
                store: store.clone(),
                credentials: credentials.clone(),
                keepalive: SessionKeepAlive::new(portal.clone(), RENEW_URL, bus.clone()),
                poller: DataTrackerPoller::new(portal.clone(), TRACKER_URL),
                dispatcher: NotificationDispatcher::new(notifier.clone()),
                bus: bus.clone(),
            },
            SchedulerConfig::default(),
        );

        Self {
            scheduler: Arc::new(scheduler),
            portal,
            notifier,
            credentials,
            store,
            bus,
            pool,
        }
    }

    /// Log in as `personal_code`.
    pub async fn login(&self, personal_code: &str) {
        self.scheduler
            .on_login(
                Credentials::from_jwt("session-token"),
                IdentityClaims::from_raw(personal_code, "Mari"),
            )
            .await
            .unwrap();
    }
}
