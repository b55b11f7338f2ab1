//! Layout-specific interaction sequences that reveal and scan product cards.

use super::cards::{extract_card, scan_cards, DEFAULT_SCAN_LIMIT};
use super::harvest::Harvest;
use super::page::{PageNode, TextQuery, VideoPage};
use super::selectors;
use crate::types::VideoType;
use anyhow::Result;
use std::time::Duration;
use tracing::debug;

const VIDEO_VISIBLE_TIMEOUT: Duration = Duration::from_secs(8);
const TRIGGER_CLICK_TIMEOUT: Duration = Duration::from_secs(3);
const TRIGGER_SETTLE_MS: u64 = 1800;
const PANEL_SCROLL_PX: i64 = 500;
const PANEL_SCROLL_SETTLE_MS: u64 = 800;
const SHORTS_PRICE_NODES: usize = 6;

const WATCH_SCROLL_FRACTION: f64 = 0.3;
const WATCH_SCROLL_SETTLE_MS: u64 = 2500;
const CARD_CLICK_TIMEOUT: Duration = Duration::from_secs(2);
const CARD_CLICK_SETTLE_MS: u64 = 1200;
const WATCH_PRICE_NODES: usize = 8;

/// "View product(s)" trigger variants, tried in order.
fn trigger_queries() -> [TextQuery; 3] {
    [
        TextQuery::has_text("button", "View product"),
        TextQuery::has_text("button", "View products"),
        TextQuery::regex(r"View\s+product", "i"),
    ]
}

/// Shorts: open the product sheet via the "View products" button, then scan
/// the shopping panel, the page, and finally loose price labels.
pub async fn run_shorts_flow(page: &dyn VideoPage, harvest: &mut Harvest) {
    if let Err(e) = page.wait_for_visible(selectors::VIDEO, VIDEO_VISIBLE_TIMEOUT).await {
        debug!("video not visible yet: {}", e);
    }

    let Some(trigger) = find_trigger(page).await else {
        harvest.log("No 'View Product' button → NO");
        return;
    };
    harvest.log("'View Product' button found");

    match trigger.force_click(TRIGGER_CLICK_TIMEOUT).await {
        Ok(()) => page.settle(TRIGGER_SETTLE_MS).await,
        Err(e) => harvest.log(format!("Click failed: {}", e)),
    }

    if let Some(panel) = visible_panel(page).await {
        scan_within(panel.as_ref(), VideoType::Shorts, harvest).await;
        match panel.scroll_by(PANEL_SCROLL_PX).await {
            Ok(()) => {
                page.settle(PANEL_SCROLL_SETTLE_MS).await;
                scan_within(panel.as_ref(), VideoType::Shorts, harvest).await;
            }
            Err(e) => debug!("panel scroll failed: {}", e),
        }
        if harvest.has_product() {
            return;
        }
    }

    scan_page(page, selectors::PRODUCT_CARDS, VideoType::Shorts, harvest).await;

    if !harvest.has_product() {
        scan_price_labels(page, VideoType::Shorts, SHORTS_PRICE_NODES, false, harvest).await;
    }
}

/// Watch page: scroll to let the merch shelf lazy-load, scan the panel and
/// the page, and fall back to clicking cards found through price labels.
pub async fn run_normal_flow(page: &dyn VideoPage, harvest: &mut Harvest) {
    match page.scroll_to_fraction(WATCH_SCROLL_FRACTION).await {
        Ok(()) => page.settle(WATCH_SCROLL_SETTLE_MS).await,
        Err(e) => debug!("watch scroll failed: {}", e),
    }

    if let Some(panel) = visible_panel(page).await {
        scan_within(panel.as_ref(), VideoType::Normal, harvest).await;
    }

    scan_page(page, selectors::PRODUCT_CARDS, VideoType::Normal, harvest).await;

    if harvest.has_product() {
        return;
    }

    scan_price_labels(page, VideoType::Normal, WATCH_PRICE_NODES, true, harvest).await;
}

async fn find_trigger(page: &dyn VideoPage) -> Option<Box<dyn PageNode>> {
    for query in trigger_queries() {
        match page.find_by_text(&query).await {
            Ok(found) => {
                if let Some(first) = found.into_iter().next() {
                    return Some(first);
                }
            }
            Err(e) => debug!("trigger query {:?} failed: {}", query, e),
        }
    }
    None
}

async fn visible_panel(page: &dyn VideoPage) -> Option<Box<dyn PageNode>> {
    let panel = page
        .find_all(selectors::SHOPPING_PANEL)
        .await
        .ok()?
        .into_iter()
        .next()?;
    match panel.is_visible().await {
        Ok(true) => Some(panel),
        _ => None,
    }
}

async fn scan_within(panel: &dyn PageNode, video_type: VideoType, harvest: &mut Harvest) {
    match panel.find_all(selectors::PRODUCT_CARDS).await {
        Ok(cards) => {
            scan_cards(&cards, video_type, DEFAULT_SCAN_LIMIT, harvest).await;
        }
        Err(e) => debug!("panel card lookup failed: {}", e),
    }
}

async fn scan_page(page: &dyn VideoPage, selector: &str, video_type: VideoType, harvest: &mut Harvest) {
    match page.find_all(selector).await {
        Ok(cards) => {
            scan_cards(&cards, video_type, DEFAULT_SCAN_LIMIT, harvest).await;
        }
        Err(e) => debug!("page card lookup failed: {}", e),
    }
}

/// Last resort: start from visible rupee labels and climb to the enclosing
/// card. With `click_card`, each card is scrolled to and clicked first so its
/// expanded details render.
async fn scan_price_labels(
    page: &dyn VideoPage,
    video_type: VideoType,
    limit: usize,
    click_card: bool,
    harvest: &mut Harvest,
) {
    let labels = match page
        .find_by_text(&TextQuery::regex(selectors::RUPEE_TEXT_SOURCE, ""))
        .await
    {
        Ok(labels) => labels,
        Err(e) => {
            debug!("price label lookup failed: {}", e);
            return;
        }
    };

    for (idx, label) in labels.iter().take(limit).enumerate() {
        if let Err(e) = scan_price_label(page, label.as_ref(), video_type, click_card, harvest).await {
            debug!("price label {} skipped: {}", idx, e);
        }
    }
}

async fn scan_price_label(
    page: &dyn VideoPage,
    label: &dyn PageNode,
    video_type: VideoType,
    click_card: bool,
    harvest: &mut Harvest,
) -> Result<()> {
    if !label.is_visible().await? {
        return Ok(());
    }
    if click_card {
        label.scroll_into_view().await?;
    }
    let Some(card) = label.card_ancestor().await? else {
        return Ok(());
    };
    if click_card && card.force_click(CARD_CLICK_TIMEOUT).await.is_ok() {
        page.settle(CARD_CLICK_SETTLE_MS).await;
    }
    extract_card(card.as_ref(), video_type, harvest).await?;
    Ok(())
}
