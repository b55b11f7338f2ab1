//! Browser seam used by the extraction heuristic.
//!
//! The flows only talk to these traits; `scraping::cdp` implements them on top
//! of `chromiumoxide`, and the integration tests drive them with scripted fakes.

use anyhow::Result;
use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::network::CookieParam;
use std::time::Duration;

/// Rendered size of an element, in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ElementBox {
    pub width: f64,
    pub height: f64,
}

/// Text-based element queries that CSS selectors cannot express.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextQuery {
    /// Elements matching `selector` whose visible text contains `text`
    /// (case-insensitive).
    HasText { selector: String, text: String },
    /// Innermost elements whose visible text matches a JavaScript regex
    /// source with the given flags.
    Regex { source: String, flags: String },
}

impl TextQuery {
    pub fn has_text(selector: &str, text: &str) -> Self {
        TextQuery::HasText {
            selector: selector.to_string(),
            text: text.to_string(),
        }
    }

    pub fn regex(source: &str, flags: &str) -> Self {
        TextQuery::Regex {
            source: source.to_string(),
            flags: flags.to_string(),
        }
    }
}

/// A live DOM element handle.
#[async_trait]
pub trait PageNode: Send + Sync {
    async fn is_visible(&self) -> Result<bool>;

    /// Rendered (`innerText`) text of the subtree.
    async fn inner_text(&self) -> Result<String>;

    /// `href` of the first `a[href]` descendant, or an empty string.
    async fn first_link_href(&self) -> Result<String>;

    /// Click without actionability checks (the element may be covered).
    async fn force_click(&self, timeout: Duration) -> Result<()>;

    async fn scroll_into_view(&self) -> Result<()>;

    /// Scroll the element's own content (`scrollTop += px`).
    async fn scroll_by(&self, px: i64) -> Result<()>;

    async fn find_all(&self, selector: &str) -> Result<Vec<Box<dyn PageNode>>>;

    /// Nearest ancestor (within a bounded number of levels) that looks like a
    /// product card: one exposing a SHOP control.
    async fn card_ancestor(&self) -> Result<Option<Box<dyn PageNode>>>;
}

/// One browser tab.
#[async_trait]
pub trait VideoPage: Send + Sync {
    /// Navigate and wait for network quiescence, bounded by `timeout`.
    async fn goto(&self, url: &str, timeout: Duration) -> Result<()>;

    /// Resolve once any element matches `selector`; error on timeout.
    async fn wait_for_selector(&self, selector: &str, timeout: Duration) -> Result<()>;

    /// Resolve once the first element matching `selector` is visible; error on timeout.
    async fn wait_for_visible(&self, selector: &str, timeout: Duration) -> Result<()>;

    async fn has_element(&self, selector: &str) -> Result<bool>;

    async fn find_all(&self, selector: &str) -> Result<Vec<Box<dyn PageNode>>>;

    async fn find_by_text(&self, query: &TextQuery) -> Result<Vec<Box<dyn PageNode>>>;

    /// Box of the first element matching `selector`, `None` when absent or not rendered.
    async fn element_box(&self, selector: &str) -> Result<Option<ElementBox>>;

    /// In-page check: canonical / og:url points at `/shorts/`, or the player
    /// box is at least as tall as 0.9× its width.
    async fn shorts_hint(&self) -> Result<bool>;

    /// Smooth-scroll the window to `fraction` of the document height.
    async fn scroll_to_fraction(&self, fraction: f64) -> Result<()>;

    /// Abort image, media and font requests for the lifetime of the page.
    async fn block_heavy_resources(&self) -> Result<()>;

    async fn set_cookies(&self, cookies: Vec<CookieParam>) -> Result<()>;

    /// Fixed wait for asynchronous rendering.
    async fn settle(&self, ms: u64) {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }

    async fn close(&self) -> Result<()>;
}

/// A browser process (plus its default context) owned by one worker.
#[async_trait]
pub trait BrowserSession: Send + Sync {
    async fn new_page(&self) -> Result<Box<dyn VideoPage>>;
    async fn close(&self) -> Result<()>;
}

/// Starts isolated browser sessions; one per Video Worker.
#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    async fn launch(&self) -> Result<Box<dyn BrowserSession>>;
}
