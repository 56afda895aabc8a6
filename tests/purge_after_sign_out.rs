//! Delayed purge of report data after sign-out
//!
//! Time is paused; sleeping past a deadline advances the clock.
//!
//! Run with: `cargo test --test purge_after_sign_out`

mod common;

use analystai::{MemoryStore, ReportStore, DEFAULT_PURGE_DELAY};
use common::{analyst, open_sqlite, q1_meta, single_page};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

fn signed_in_store_with_data() -> ReportStore {
    let store = ReportStore::with_store(Arc::new(MemoryStore::new()));
    store.set_user(Some(analyst())).unwrap();
    let id = store.add_report(q1_meta()).unwrap();
    store.add_extracted_data(single_page(&id, "p1")).unwrap();
    store
}

#[tokio::test(start_paused = true)]
async fn sign_out_then_wait_purges_everything() {
    let store = signed_in_store_with_data();

    store.set_user(None).unwrap();
    assert!(store.purge_pending());

    sleep(DEFAULT_PURGE_DELAY + Duration::from_secs(1)).await;
    assert_eq!(store.report_count(), 0);
    assert!(store.extracted_data().is_empty());
    assert!(!store.purge_pending());
}

#[tokio::test(start_paused = true)]
async fn data_survives_until_the_deadline() {
    let store = signed_in_store_with_data();
    store.set_user(None).unwrap();

    sleep(DEFAULT_PURGE_DELAY - Duration::from_secs(1)).await;
    assert_eq!(store.report_count(), 1);
    assert!(store.purge_pending());
}

#[tokio::test(start_paused = true)]
async fn signing_back_in_cancels_the_purge() {
    let store = signed_in_store_with_data();

    store.set_user(None).unwrap();
    sleep(Duration::from_secs(10 * 60)).await;
    store.set_user(Some(analyst())).unwrap();
    assert!(!store.purge_pending());

    sleep(DEFAULT_PURGE_DELAY * 2).await;
    assert_eq!(store.report_count(), 1);
    assert_eq!(store.extracted_data().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn repeated_sign_out_restarts_the_countdown() {
    let store = signed_in_store_with_data();

    for _ in 0..3 {
        store.set_user(None).unwrap();
        sleep(Duration::from_secs(20 * 60)).await;
        store.set_user(Some(analyst())).unwrap();
    }
    store.set_user(None).unwrap();

    // 20 minutes after the last sign-out; earlier timers must not fire.
    sleep(Duration::from_secs(20 * 60)).await;
    assert_eq!(store.report_count(), 1);

    sleep(Duration::from_secs(11 * 60)).await;
    assert_eq!(store.report_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn sign_out_with_no_reports_arms_nothing() {
    let store = ReportStore::new();
    store.set_user(Some(analyst())).unwrap();
    store.set_user(None).unwrap();
    assert!(!store.purge_pending());
}

#[tokio::test(start_paused = true)]
async fn upload_while_signed_out_restarts_the_countdown() {
    let store = ReportStore::new().with_purge_delay(Duration::from_secs(60));

    store.add_report(q1_meta()).unwrap();
    assert!(store.purge_pending());

    sleep(Duration::from_secs(30)).await;
    store.add_report(q1_meta()).unwrap();

    // 61s after the first upload, 31s after the second.
    sleep(Duration::from_secs(31)).await;
    assert_eq!(store.report_count(), 2);

    sleep(Duration::from_secs(30)).await;
    assert_eq!(store.report_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn removal_while_signed_out_restarts_the_countdown() {
    let store = ReportStore::new().with_purge_delay(Duration::from_secs(60));
    let first = store.add_report(q1_meta()).unwrap();
    store.add_report(q1_meta()).unwrap();

    sleep(Duration::from_secs(30)).await;
    store.remove_report(&first).unwrap();

    sleep(Duration::from_secs(31)).await;
    assert_eq!(store.report_count(), 1);

    sleep(Duration::from_secs(30)).await;
    assert_eq!(store.report_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn removing_the_last_report_disarms_the_purge() {
    let store = ReportStore::new();
    let id = store.add_report(q1_meta()).unwrap();
    assert!(store.purge_pending());

    store.remove_report(&id).unwrap();
    assert!(!store.purge_pending());
}

#[tokio::test(start_paused = true)]
async fn purge_clears_the_backing_store() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("store.db");
    {
        let (_, store) = open_sqlite(&path);
        store.set_user(Some(analyst())).unwrap();
        let id = store.add_report(q1_meta()).unwrap();
        store.add_extracted_data(single_page(&id, "p1")).unwrap();
        store.set_user(None).unwrap();
        sleep(DEFAULT_PURGE_DELAY + Duration::from_secs(1)).await;
    }

    let (_, reloaded) = open_sqlite(&path);
    assert_eq!(reloaded.report_count(), 0);
    assert!(reloaded.extracted_data().is_empty());
}

#[tokio::test(start_paused = true)]
async fn load_while_signed_out_arms_the_purge() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("store.db");
    {
        let (_, store) = open_sqlite(&path);
        store.add_report(q1_meta()).unwrap();
    }

    let (_, reloaded) = open_sqlite(&path);
    assert!(reloaded.purge_pending());
    sleep(DEFAULT_PURGE_DELAY + Duration::from_secs(1)).await;
    assert_eq!(reloaded.report_count(), 0);
}
