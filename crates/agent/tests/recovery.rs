mod common;

use std::time::Duration;

use assert_matches::assert_matches;
use chrono::Utc;
use datawatch_agent::scheduler::CycleOutcome;
use datawatch_core::refresh::DEFAULT_RETRY_BUDGET;
use datawatch_db::repositories::RefreshTaskRepo;
use sqlx::SqlitePool;

use common::{usages, Harness};

fn database_url(dir: &tempfile::TempDir) -> String {
    format!("sqlite://{}", dir.path().join("datawatch.db").display())
}

#[tokio::test]
async fn persisted_task_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let url = database_url(&dir);

    {
        let pool = datawatch_db::create_pool(&url).await.unwrap();
        datawatch_db::run_migrations(&pool).await.unwrap();
        let h = Harness::new(pool.clone());
        h.login("38001010000").await;
        h.portal.tracker_returns(200, usages(&[("2025-03-01T08:00:00", "Police")]));
        h.scheduler.wake().await.unwrap();
        h.scheduler.schedule_next(Duration::ZERO, 7).await.unwrap();
        pool.close().await;
    }

    let pool = datawatch_db::create_pool(&url).await.unwrap();
    datawatch_db::run_migrations(&pool).await.unwrap();
    let h = Harness::new(pool);

    let task = h.scheduler.recover().await.unwrap().unwrap();
    assert_eq!(task.retries_remaining, 7);
    assert!(task.is_due(Utc::now()));

    // The store and the finished backfill carried over, so only the new
    // record is announced.
    h.portal.tracker_returns(
        200,
        usages(&[
            ("2025-03-01T08:00:00", "Police"),
            ("2025-03-02T08:00:00", "Bank"),
        ]),
    );
    assert_eq!(
        h.scheduler.wake().await.unwrap(),
        CycleOutcome::Renewed { inserted: 1, notified: 1 }
    );
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn logged_in_without_task_gets_a_fresh_one(pool: SqlitePool) {
    let h = Harness::new(pool);
    h.login("38001010000").await;
    RefreshTaskRepo::delete(&h.pool).await.unwrap();

    let task = h.scheduler.recover().await.unwrap().unwrap();

    assert_eq!(task.retries_remaining, DEFAULT_RETRY_BUDGET);
    assert!(!task.is_due(Utc::now()));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn nothing_to_recover_without_a_session(pool: SqlitePool) {
    let h = Harness::new(pool);

    assert_matches!(h.scheduler.recover().await.unwrap(), None);
    assert!(h.scheduler.pending().await.unwrap().is_none());
    assert_eq!(h.scheduler.wake().await.unwrap(), CycleOutcome::NotLoggedIn);
    assert_eq!(h.portal.renew_calls(), 0);
}
