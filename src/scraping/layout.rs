//! Layout Classifier: Shorts vs watch-page, as an ordered list of probes.
//!
//! Each probe returns `Some(answer)` only when it is conclusive; errors are
//! swallowed and treated as "no answer" so the next probe gets its turn.

use super::page::{ElementBox, VideoPage};
use super::selectors;
use crate::types::VideoType;
use anyhow::Result;
use tracing::debug;

pub const LAYOUT_SETTLE_MS: u64 = 2000;

/// Height/width at or above which a player counts as vertical.
pub const PORTRAIT_RATIO: f64 = 0.9;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Probe {
    DomMarkers,
    VideoAspect,
    PageHint,
}

pub const PROBE_ORDER: [Probe; 3] = [Probe::DomMarkers, Probe::VideoAspect, Probe::PageHint];

pub async fn detect_video_type(page: &dyn VideoPage) -> VideoType {
    page.settle(LAYOUT_SETTLE_MS).await;
    for probe in PROBE_ORDER {
        match run_probe(page, probe).await {
            Ok(Some(t)) => {
                debug!("layout probe {:?} → {}", probe, t);
                return t;
            }
            Ok(None) => {}
            Err(e) => debug!("layout probe {:?} failed: {}", probe, e),
        }
    }
    VideoType::Normal
}

async fn run_probe(page: &dyn VideoPage, probe: Probe) -> Result<Option<VideoType>> {
    match probe {
        Probe::DomMarkers => dom_markers(page).await,
        Probe::VideoAspect => Ok(page.element_box(selectors::VIDEO).await?.and_then(classify_box)),
        Probe::PageHint => Ok(page.shorts_hint().await?.then_some(VideoType::Shorts)),
    }
}

async fn dom_markers(page: &dyn VideoPage) -> Result<Option<VideoType>> {
    if page.has_element(selectors::SHORTS_MARKERS).await? {
        return Ok(Some(VideoType::Shorts));
    }
    if page.has_element(selectors::WATCH_MARKER).await? {
        return Ok(Some(VideoType::Normal));
    }
    Ok(None)
}

/// Conclusive only for a rendered (non-zero) box.
pub fn classify_box(b: ElementBox) -> Option<VideoType> {
    if b.width <= 0.0 || b.height <= 0.0 {
        return None;
    }
    if b.height / b.width.max(1.0) >= PORTRAIT_RATIO {
        Some(VideoType::Shorts)
    } else {
        Some(VideoType::Normal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn portrait_box_is_shorts() {
        let b = ElementBox { width: 405.0, height: 720.0 };
        assert_eq!(classify_box(b), Some(VideoType::Shorts));
    }

    #[test]
    fn landscape_box_is_normal() {
        let b = ElementBox { width: 1280.0, height: 720.0 };
        assert_eq!(classify_box(b), Some(VideoType::Normal));
    }

    #[test]
    fn ratio_boundary_counts_as_shorts() {
        let b = ElementBox { width: 100.0, height: 90.0 };
        assert_eq!(classify_box(b), Some(VideoType::Shorts));
    }

    #[test]
    fn collapsed_box_is_inconclusive() {
        assert_eq!(classify_box(ElementBox { width: 0.0, height: 300.0 }), None);
        assert_eq!(classify_box(ElementBox { width: 300.0, height: 0.0 }), None);
    }
}
