//! Video Worker: one URL, one isolated browser, up to [`MAX_ATTEMPTS`] attempts.
//!
//! ```text
//! Init → Navigating → TypeDetection → {ShortsFlow | NormalFlow} → Resolved
//!          ^                                                        |
//!          └──────────────── empty / error, attempts left ──────────┘
//! ```
//! Every attempt gets a fresh page that is closed whatever happens; the
//! browser itself is closed once at the end.

use super::flows::{run_normal_flow, run_shorts_flow};
use super::harvest::Harvest;
use super::layout::detect_video_type;
use super::page::{BrowserLauncher, BrowserSession, VideoPage};
use super::selectors;
use crate::types::{ProductRow, VideoType, WorkerOutput};
use anyhow::{Context, Result};
use chromiumoxide::cdp::browser_protocol::network::CookieParam;
use std::time::Duration;
use tracing::warn;

pub const MAX_ATTEMPTS: u32 = 2;
pub const NAVIGATION_TIMEOUT: Duration = Duration::from_secs(60);
pub const SHOPPING_READY_TIMEOUT: Duration = Duration::from_secs(5);
pub const NO_SHOPPING_SETTLE_MS: u64 = 3000;

/// Scrape one video. Never fails: errors surface as a terminal ERROR row.
pub async fn scrape_video(
    launcher: &dyn BrowserLauncher,
    video_url: &str,
    cookies: &[CookieParam],
) -> WorkerOutput {
    let mut harvest = Harvest::new(video_url);

    let session = match launcher.launch().await {
        Ok(s) => s,
        Err(e) => {
            harvest.log(format!("Browser launch failed: {:#}", e));
            harvest.push_row(ProductRow::error(video_url, format!("{:#}", e)));
            return harvest.into_output();
        }
    };

    run_attempts(session.as_ref(), video_url, cookies, &mut harvest).await;

    if let Err(e) = session.close().await {
        warn!("browser close failed for {}: {}", video_url, e);
    }
    harvest.into_output()
}

async fn run_attempts(
    session: &dyn BrowserSession,
    video_url: &str,
    cookies: &[CookieParam],
    harvest: &mut Harvest,
) {
    for attempt in 1..=MAX_ATTEMPTS {
        harvest.clear_rows();
        let final_attempt = attempt == MAX_ATTEMPTS;

        match run_attempt(session, video_url, cookies, attempt, harvest).await {
            Ok(_) if !harvest.rows().is_empty() => {
                harvest.log(format!("→ {} product(s) ✓", harvest.rows().len()));
                return;
            }
            Ok(video_type) => {
                harvest.log("→ NO products found this attempt");
                if final_attempt {
                    harvest.push_row(ProductRow::no_product(video_url, video_type));
                }
            }
            Err(e) => {
                harvest.log(format!("Error on attempt {}: {:#}", attempt, e));
                if final_attempt {
                    harvest.clear_rows();
                    harvest.push_row(ProductRow::error(video_url, format!("{:#}", e)));
                }
            }
        }
    }
}

async fn run_attempt(
    session: &dyn BrowserSession,
    video_url: &str,
    cookies: &[CookieParam],
    attempt: u32,
    harvest: &mut Harvest,
) -> Result<VideoType> {
    let page = session.new_page().await.context("failed to open page")?;
    let result = drive_page(page.as_ref(), video_url, cookies, attempt, harvest).await;
    if let Err(e) = page.close().await {
        warn!("page close failed for {}: {}", video_url, e);
    }
    result
}

async fn drive_page(
    page: &dyn VideoPage,
    video_url: &str,
    cookies: &[CookieParam],
    attempt: u32,
    harvest: &mut Harvest,
) -> Result<VideoType> {
    if let Err(e) = page.block_heavy_resources().await {
        warn!("resource blocking unavailable: {}", e);
    }
    if !cookies.is_empty() {
        if let Err(e) = page.set_cookies(cookies.to_vec()).await {
            harvest.log(format!("Cookie error: {}", e));
        }
    }

    harvest.log(format!("Navigating (Attempt {}/{})...", attempt, MAX_ATTEMPTS));
    page.goto(video_url, NAVIGATION_TIMEOUT).await?;

    if page
        .wait_for_selector(selectors::SHOPPING_READY, SHOPPING_READY_TIMEOUT)
        .await
        .is_err()
    {
        page.settle(NO_SHOPPING_SETTLE_MS).await;
    }

    let video_type = detect_video_type(page).await;
    harvest.log(format!("Type: {}", video_type));

    match video_type {
        VideoType::Shorts => run_shorts_flow(page, harvest).await,
        _ => run_normal_flow(page, harvest).await,
    }
    Ok(video_type)
}
