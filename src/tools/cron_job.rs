//! Scheduled sheet job: pending rows → sequential workers → per-row writes →
//! one audit row. Strictly sequential to keep a single browser alive at a time.

use crate::features::heartbeat::Heartbeat;
use crate::features::sheets::{pending_rows, RowUpdate, SheetStore, TIMESTAMP_FORMAT};
use crate::scraping::harvest::url_suffix;
use crate::scraping::page::BrowserLauncher;
use crate::scraping::worker::scrape_video;
use crate::tools::scheduler::Clock;
use crate::types::{RunSummary, TagStatus};
use tracing::{debug, error, info, warn};

/// Run the job once. `None` when the pending list could not be fetched.
pub async fn run_scheduled_job(
    store: &dyn SheetStore,
    launcher: &dyn BrowserLauncher,
    heartbeat: &Heartbeat,
    clock: &dyn Clock,
) -> Option<RunSummary> {
    let start_time = clock.now();
    let start_str = start_time.format(TIMESTAMP_FORMAT).to_string();
    info!("[CRON] Started at {}", start_str);
    heartbeat
        .write(&format!("Started collecting URLs at {}...", start_str))
        .await;

    let rows = match store.fetch_rows().await {
        Ok(rows) => rows,
        Err(e) => {
            error!("[CRON] Sheet fetch error: {}", e);
            return None;
        }
    };
    let scan = pending_rows(&rows);

    if scan.pending.is_empty() {
        let end_time = clock.now();
        let msg = format!(
            "Completed at {} (0 pending URLs)",
            end_time.format(TIMESTAMP_FORMAT)
        );
        info!("[CRON] {}", msg);
        heartbeat.write(&msg).await;
        let summary = RunSummary {
            start_time,
            end_time,
            total_rows: scan.total_rows,
            updated_with_product: 0,
            already_have_product: scan.already_done,
            have_no_product: 0,
        };
        append_summary(store, &summary).await;
        return Some(summary);
    }

    let total = scan.pending.len();
    let msg = format!("Started processing {} URLs at {}", total, start_str);
    info!("[CRON] {}", msg);
    heartbeat.write(&msg).await;

    let mut updated_with_product = 0;
    let mut have_no_product = 0;

    for (idx, row_ref) in scan.pending.iter().enumerate() {
        let out = scrape_video(launcher, &row_ref.video_url, &[]).await;
        debug!("[CRON] worker produced {} log lines", out.logs.len());

        let update = out
            .rows
            .first()
            .map(RowUpdate::from_row)
            .unwrap_or_else(RowUpdate::no_product);
        let is_yes = update.status == TagStatus::Yes.as_str();

        match store.update_row(row_ref.row_number, &update).await {
            Ok(()) => {
                if is_yes {
                    updated_with_product += 1;
                } else {
                    have_no_product += 1;
                }
                info!(
                    "[CRON] Updated row {} for {}",
                    row_ref.row_number,
                    url_suffix(&row_ref.video_url, 30)
                );
            }
            Err(e) => warn!(
                "[CRON] Error processing {}: {}",
                row_ref.video_url, e
            ),
        }

        heartbeat
            .write(&format!(
                "Running ({}/{} URLs processed) - Started {}",
                idx + 1,
                total,
                start_str
            ))
            .await;
    }

    let end_time = clock.now();
    let summary = RunSummary {
        start_time,
        end_time,
        total_rows: scan.total_rows,
        updated_with_product,
        already_have_product: scan.already_done,
        have_no_product,
    };
    append_summary(store, &summary).await;

    let end_str = end_time.format(TIMESTAMP_FORMAT);
    info!("[CRON] Finished at {}", end_str);
    heartbeat
        .write(&format!("Completed processing {} URLs at {}", total, end_str))
        .await;
    Some(summary)
}

async fn append_summary(store: &dyn SheetStore, summary: &RunSummary) {
    if let Err(e) = store.append_run_log(summary).await {
        warn!("[CRON] Failed to write run log: {}", e);
    }
}
