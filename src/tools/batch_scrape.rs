use crate::core::config::clamp_workers;
use crate::scraping::page::BrowserLauncher;
use crate::scraping::worker::scrape_video;
use crate::types::*;
use anyhow::{anyhow, Result};
use chromiumoxide::cdp::browser_protocol::network::CookieParam;
use futures::stream::{self, StreamExt};
use std::io::Write;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// Log lines shown live while a batch runs.
pub const LIVE_TAIL_LINES: usize = 80;

/// Aggregated result of a manual batch.
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    pub rows: Vec<ProductRow>,
    pub logs: Vec<LogLine>,
    pub total_duration_ms: u64,
}

impl BatchReport {
    fn log(&mut self, msg: String) {
        let line = format!("[{}] {}", chrono::Local::now().format("%H:%M:%S"), msg);
        info!("{}", line);
        self.logs.push(LogLine(line));
    }

    pub fn tail(&self, n: usize) -> String {
        render_tail(&self.logs, n)
    }
}

/// Progress of a running batch, handed to the caller after every completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchProgress {
    pub completed: usize,
    pub total: usize,
}

/// Last `n` log lines joined with newlines.
pub fn render_tail(logs: &[LogLine], n: usize) -> String {
    let start = logs.len().saturating_sub(n);
    logs[start..]
        .iter()
        .map(|l| l.0.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Scrape multiple videos with a bounded pool of isolated workers.
///
/// Each worker owns its own browser; results are merged in completion order
/// and `on_result` sees the report after every merge.
pub async fn scrape_batch<F>(
    launcher: Arc<dyn BrowserLauncher>,
    urls: Vec<String>,
    cookies: Vec<CookieParam>,
    workers: usize,
    mut on_result: F,
) -> BatchReport
where
    F: FnMut(&BatchReport, BatchProgress),
{
    let start_time = Instant::now();
    let workers = clamp_workers(workers);
    let urls: Vec<String> = urls
        .into_iter()
        .map(|u| u.trim().to_string())
        .filter(|u| !u.is_empty())
        .collect();
    let total = urls.len();
    let cookies = Arc::new(cookies);

    let mut report = BatchReport::default();
    report.log(format!("Starting: {} URLs | {} workers", total, workers));
    on_result(&report, BatchProgress { completed: 0, total });

    let mut outputs = stream::iter(urls)
        .map(|url| {
            let launcher = Arc::clone(&launcher);
            let cookies = Arc::clone(&cookies);
            async move {
                // A panicking worker must not take the batch down with it.
                let task_url = url.clone();
                let handle = tokio::spawn(async move {
                    scrape_video(launcher.as_ref(), &task_url, &cookies).await
                });
                match handle.await {
                    Ok(out) => out,
                    Err(e) => {
                        warn!("worker for {} aborted: {}", url, e);
                        WorkerOutput {
                            rows: vec![ProductRow::error(&url, format!("worker aborted: {}", e))],
                            logs: vec![LogLine(format!("worker for {} aborted: {}", url, e))],
                        }
                    }
                }
            }
        })
        .buffer_unordered(workers);

    let mut completed = 0;
    while let Some(out) = outputs.next().await {
        completed += 1;
        report.rows.extend(out.rows);
        report.logs.extend(out.logs);
        on_result(&report, BatchProgress { completed, total });
    }

    let total_rows = report.rows.len();
    report.log(format!("Done. Total rows: {}", total_rows));
    report.total_duration_ms = start_time.elapsed().as_millis() as u64;
    on_result(&report, BatchProgress { completed, total });
    report
}

/// Write rows as CSV with the tabular header.
pub fn write_csv<W: Write>(rows: &[ProductRow], out: W) -> Result<()> {
    let mut writer = csv::Writer::from_writer(out);
    for row in rows {
        writer
            .serialize(row)
            .map_err(|e| anyhow!("CSV write failed: {}", e))?;
    }
    writer.flush()?;
    Ok(())
}

pub fn rows_to_csv(rows: &[ProductRow]) -> Result<String> {
    let mut buf = Vec::new();
    write_csv(rows, &mut buf)?;
    String::from_utf8(buf).map_err(|e| anyhow!("CSV is not UTF-8: {}", e))
}
