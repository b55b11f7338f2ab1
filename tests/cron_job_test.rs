//! Scheduled job against an in-memory sheet and scripted pages.

mod common;

use common::*;
use shopscout::core::config::ScoutConfig;
use shopscout::cron_job::run_scheduled_job;
use shopscout::heartbeat::Heartbeat;
use shopscout::scheduler::{run_if_idle, RunOutcome};
use shopscout::sheets::MemorySheetStore;
use shopscout::AppState;
use std::sync::Arc;

const YES_URL: &str = "https://www.youtube.com/shorts/yes0000001";
const NO_URL: &str = "https://www.youtube.com/watch?v=no00000002";
const ERR_URL: &str = "https://www.youtube.com/watch?v=err0000003";
const DONE_URL: &str = "https://www.youtube.com/watch?v=done000004";

fn scripted_site() -> Arc<FakeSite> {
    let site = FakeSite::new();
    site.script(
        YES_URL,
        vec![FakeDom::watch(vec![FakeNode::card(
            "Railway Group D Mock Test Pass\n₹299",
            "https://testbook.com/pass",
        )])],
    );
    site.script(NO_URL, vec![FakeDom::watch(vec![])]);
    site.script(ERR_URL, vec![FakeDom::failing("Timeout 60000ms exceeded")]);
    site
}

#[tokio::test(start_paused = true)]
async fn run_over_yes_no_error_rows() {
    let store = MemorySheetStore::with_links(&[
        (YES_URL, ""),
        (NO_URL, "NO"),
        (ERR_URL, "error"),
        (DONE_URL, "YES"),
        ("", ""),
    ]);
    let launcher = FakeLauncher::new(scripted_site());
    let hb_path = temp_heartbeat();
    let heartbeat = Heartbeat::new(&hb_path);

    let summary = run_scheduled_job(&store, &launcher, &heartbeat, &fixed_clock())
        .await
        .expect("fetch succeeds");

    assert_eq!(summary.total_rows, 5);
    assert_eq!(summary.updated_with_product, 1);
    assert_eq!(summary.have_no_product, 2);
    assert_eq!(summary.already_have_product, 1);

    let updates = store.updates();
    assert_eq!(updates.len(), 3);
    let (row, yes) = &updates[0];
    assert_eq!(*row, 2);
    assert_eq!(yes.cells(), ["YES", "Railway Group D Mock Test Pass", "₹299", "Testbook"]);
    assert_eq!(updates[1].0, 3);
    assert_eq!(updates[1].1.cells(), ["NO", "", "", ""]);
    assert_eq!(updates[2].0, 4);
    assert_eq!(updates[2].1.status, "ERROR");

    // Already-done row untouched.
    assert_eq!(store.rows()[4][9], "YES");
    assert_eq!(store.run_logs(), vec![summary]);
    assert_eq!(
        heartbeat.read().await.as_deref(),
        Some("Completed processing 3 URLs at 2025-03-10 06:00:00")
    );
    let _ = tokio::fs::remove_file(&hb_path).await;
}

#[tokio::test(start_paused = true)]
async fn zero_pending_still_logs_a_run() {
    let store = MemorySheetStore::with_links(&[(DONE_URL, "YES"), (YES_URL, "yes")]);
    let launcher = FakeLauncher::new(FakeSite::new());
    let hb_path = temp_heartbeat();
    let heartbeat = Heartbeat::new(&hb_path);

    let summary = run_scheduled_job(&store, &launcher, &heartbeat, &fixed_clock())
        .await
        .expect("fetch succeeds");

    assert_eq!(summary.total_rows, 2);
    assert_eq!(summary.already_have_product, 2);
    assert_eq!(summary.updated_with_product, 0);
    assert_eq!(summary.have_no_product, 0);
    assert!(store.updates().is_empty());
    assert_eq!(store.run_logs().len(), 1);
    assert_eq!(launcher.launches.load(std::sync::atomic::Ordering::SeqCst), 0);
    assert_eq!(
        heartbeat.read().await.as_deref(),
        Some("Completed at 2025-03-10 06:00:00 (0 pending URLs)")
    );
    let _ = tokio::fs::remove_file(&hb_path).await;
}

#[tokio::test(start_paused = true)]
async fn fetch_failure_aborts_without_audit_row() {
    let store = MemorySheetStore::with_links(&[(YES_URL, "")]).failing_fetch();
    let launcher = FakeLauncher::new(scripted_site());
    let hb_path = temp_heartbeat();
    let heartbeat = Heartbeat::new(&hb_path);

    let summary = run_scheduled_job(&store, &launcher, &heartbeat, &fixed_clock()).await;

    assert!(summary.is_none());
    assert!(store.run_logs().is_empty());
    assert_eq!(
        heartbeat.read().await.as_deref(),
        Some("Started collecting URLs at 2025-03-10 06:00:00...")
    );
    let _ = tokio::fs::remove_file(&hb_path).await;
}

#[tokio::test(start_paused = true)]
async fn failed_write_does_not_block_later_rows() {
    let store = MemorySheetStore::with_links(&[(NO_URL, ""), (YES_URL, "")]).rejecting(2);
    let launcher = FakeLauncher::new(scripted_site());
    let heartbeat = Heartbeat::new(temp_heartbeat());

    let summary = run_scheduled_job(&store, &launcher, &heartbeat, &fixed_clock())
        .await
        .expect("fetch succeeds");

    let updates = store.updates();
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].0, 3);
    assert_eq!(summary.updated_with_product, 1);
    assert_eq!(summary.have_no_product, 0);
    let _ = tokio::fs::remove_file(heartbeat.path()).await;
}

#[tokio::test(start_paused = true)]
async fn overlapping_run_is_skipped() {
    let store = Arc::new(MemorySheetStore::with_links(&[(YES_URL, "")]));
    let state = AppState::new(reqwest::Client::new(), ScoutConfig::default())
        .with_launcher(Arc::new(FakeLauncher::new(scripted_site())))
        .with_sheet_store(store.clone())
        .with_heartbeat(Heartbeat::new(temp_heartbeat()));

    {
        let _held = state.cron_lock.lock().await;
        assert!(state.cron_running());
        assert_eq!(run_if_idle(&state, &fixed_clock()).await, RunOutcome::Busy);
        assert!(store.updates().is_empty());
    }

    assert!(!state.cron_running());
    match run_if_idle(&state, &fixed_clock()).await {
        RunOutcome::Finished(s) => assert_eq!(s.updated_with_product, 1),
        other => panic!("unexpected outcome: {:?}", other),
    }
    let _ = tokio::fs::remove_file(state.heartbeat.path()).await;
}
