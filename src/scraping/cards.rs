//! Card Scanner: turns candidate DOM nodes into deduplicated product rows.

use super::harvest::Harvest;
use super::page::PageNode;
use super::text::{extract_price, extract_title, has_price};
use crate::types::VideoType;
use anyhow::Result;
use tracing::debug;

/// Nodes inspected per scan.
pub const DEFAULT_SCAN_LIMIT: usize = 30;

/// Scan up to `limit` nodes in order. Invisible nodes and nodes without a
/// price are skipped; errors on a node skip only that node.
/// Returns the number of rows added.
pub async fn scan_cards(
    cards: &[Box<dyn PageNode>],
    video_type: VideoType,
    limit: usize,
    harvest: &mut Harvest,
) -> usize {
    let mut added = 0;
    for (idx, card) in cards.iter().take(limit).enumerate() {
        match scan_one(card.as_ref(), video_type, harvest).await {
            Ok(true) => added += 1,
            Ok(false) => {}
            Err(e) => debug!("card {} skipped: {}", idx, e),
        }
    }
    added
}

async fn scan_one(card: &dyn PageNode, video_type: VideoType, harvest: &mut Harvest) -> Result<bool> {
    if !card.is_visible().await? {
        return Ok(false);
    }
    extract_card(card, video_type, harvest).await
}

/// Read one card's text and record it when it carries a price.
/// Link resolution failures degrade to an empty link.
pub async fn extract_card(
    card: &dyn PageNode,
    video_type: VideoType,
    harvest: &mut Harvest,
) -> Result<bool> {
    let text = card.inner_text().await?;
    let price = extract_price(&text);
    if !has_price(&price) {
        return Ok(false);
    }
    let title = extract_title(&text);
    let link = card.first_link_href().await.unwrap_or_default();
    Ok(harvest.add_product(video_type, title, price, link, &text))
}
