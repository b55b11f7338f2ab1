//! YouTube DOM selectors the heuristic keys on.

pub const SHORTS_MARKERS: &str = "ytd-reel-video-renderer, ytd-shorts, ytd-shorts-player-renderer, \
     ytd-reel-player-overlay-renderer, ytd-reel-item-renderer";

pub const WATCH_MARKER: &str = "ytd-watch-flexy";

pub const VIDEO: &str = "video";

pub const SHOPPING_PANEL: &str =
    "ytd-engagement-panel-section-list-renderer[target-id='engagement-panel-shopping']";

/// Card containers, matched in document order inside the shopping panel or
/// across the whole page.
pub const PRODUCT_CARDS: &str =
    "ytd-vertical-product-card-renderer, ytd-merch-item-renderer, ytd-grid-merch-item-renderer";

/// Attached once shopping UI has hydrated.
pub const SHOPPING_READY: &str =
    "ytd-engagement-panel-section-list-renderer, ytd-merch-shelf-renderer";

/// Leaf text nodes that look like a rupee price.
pub const RUPEE_TEXT_SOURCE: &str = r"₹\s*[0-9]";
