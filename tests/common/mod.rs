//! Scripted browser fakes shared by the integration tests.
//!
//! A `FakeSite` maps each video URL to a queue of DOM snapshots, one per
//! navigation; the last snapshot repeats once the queue runs dry.
#![allow(dead_code)]

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::network::CookieParam;
use chrono::{DateTime, FixedOffset};
use shopscout::scheduler::Clock;
use shopscout::scraping::page::{
    BrowserLauncher, BrowserSession, ElementBox, PageNode, TextQuery, VideoPage,
};
use shopscout::scraping::selectors;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Clone, Default)]
pub struct FakeNode {
    pub text: String,
    pub href: String,
    pub hidden: bool,
    pub broken: bool,
    pub unclickable: bool,
    pub children: HashMap<String, Vec<FakeNode>>,
    pub card: Option<Box<FakeNode>>,
}

impl FakeNode {
    pub fn card(text: &str, href: &str) -> Self {
        Self {
            text: text.to_string(),
            href: href.to_string(),
            ..Default::default()
        }
    }

    pub fn button(label: &str) -> Self {
        Self {
            text: label.to_string(),
            ..Default::default()
        }
    }

    pub fn with_children(mut self, selector: &str, nodes: Vec<FakeNode>) -> Self {
        self.children.insert(selector.to_string(), nodes);
        self
    }

    /// A price label whose enclosing card is `card`.
    pub fn label_in(price: &str, card: FakeNode) -> Self {
        Self {
            text: price.to_string(),
            card: Some(Box::new(card)),
            ..Default::default()
        }
    }
}

#[async_trait]
impl PageNode for FakeNode {
    async fn is_visible(&self) -> Result<bool> {
        Ok(!self.hidden)
    }

    async fn inner_text(&self) -> Result<String> {
        if self.broken {
            return Err(anyhow!("node detached"));
        }
        Ok(self.text.clone())
    }

    async fn first_link_href(&self) -> Result<String> {
        Ok(self.href.clone())
    }

    async fn force_click(&self, _timeout: Duration) -> Result<()> {
        if self.unclickable {
            return Err(anyhow!("element is not attached to the DOM"));
        }
        Ok(())
    }

    async fn scroll_into_view(&self) -> Result<()> {
        Ok(())
    }

    async fn scroll_by(&self, _px: i64) -> Result<()> {
        Ok(())
    }

    async fn find_all(&self, selector: &str) -> Result<Vec<Box<dyn PageNode>>> {
        Ok(boxed(self.children.get(selector)))
    }

    async fn card_ancestor(&self) -> Result<Option<Box<dyn PageNode>>> {
        Ok(self
            .card
            .as_ref()
            .map(|c| Box::new(c.as_ref().clone()) as Box<dyn PageNode>))
    }
}

fn boxed(nodes: Option<&Vec<FakeNode>>) -> Vec<Box<dyn PageNode>> {
    nodes
        .map(|v| {
            v.iter()
                .cloned()
                .map(|n| Box::new(n) as Box<dyn PageNode>)
                .collect()
        })
        .unwrap_or_default()
}

/// One rendered state of a video page.
#[derive(Debug, Clone, Default)]
pub struct FakeDom {
    pub goto_error: Option<String>,
    pub elements: HashMap<String, Vec<FakeNode>>,
    pub text_queries: Vec<(TextQuery, Vec<FakeNode>)>,
    pub video_box: Option<ElementBox>,
    pub shorts_hint: bool,
}

impl FakeDom {
    pub fn failing(msg: &str) -> Self {
        Self {
            goto_error: Some(msg.to_string()),
            ..Default::default()
        }
    }

    /// Watch page with the given page-wide merch cards.
    pub fn watch(cards: Vec<FakeNode>) -> Self {
        Self::default()
            .with(selectors::WATCH_MARKER, vec![FakeNode::default()])
            .with(selectors::PRODUCT_CARDS, cards)
    }

    /// Shorts page whose "View products" button is `trigger`.
    pub fn shorts_with_trigger(trigger: FakeNode) -> Self {
        Self::shorts().with_text(TextQuery::has_text("button", "View product"), vec![trigger])
    }

    /// Adds rupee labels found by the price-label fallback.
    pub fn with_price_labels(self, labels: Vec<FakeNode>) -> Self {
        self.with_text(TextQuery::regex(selectors::RUPEE_TEXT_SOURCE, ""), labels)
    }

    /// Shorts page without any shopping trigger.
    pub fn shorts() -> Self {
        Self::default().with(selectors::SHORTS_MARKERS, vec![FakeNode::default()])
    }

    pub fn with(mut self, selector: &str, nodes: Vec<FakeNode>) -> Self {
        self.elements.insert(selector.to_string(), nodes);
        self
    }

    pub fn with_text(mut self, query: TextQuery, nodes: Vec<FakeNode>) -> Self {
        self.text_queries.push((query, nodes));
        self
    }

    fn has(&self, selector: &str) -> bool {
        self.elements.get(selector).is_some_and(|v| !v.is_empty())
    }
}

#[derive(Debug, Default)]
pub struct FakeSite {
    scripts: Mutex<HashMap<String, VecDeque<FakeDom>>>,
    pub navigations: AtomicUsize,
    pub pages_opened: AtomicUsize,
    pub pages_closed: AtomicUsize,
    pub sessions_closed: AtomicUsize,
    pub cookies_set: AtomicUsize,
}

impl FakeSite {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn script(&self, url: &str, doms: Vec<FakeDom>) {
        if let Ok(mut s) = self.scripts.lock() {
            s.insert(url.to_string(), doms.into());
        }
    }

    fn next_dom(&self, url: &str) -> Option<FakeDom> {
        let mut scripts = self.scripts.lock().ok()?;
        let queue = scripts.get_mut(url)?;
        if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        }
    }
}

pub struct FakePage {
    site: Arc<FakeSite>,
    dom: Mutex<FakeDom>,
}

impl FakePage {
    fn dom(&self) -> FakeDom {
        self.dom.lock().map(|d| d.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl VideoPage for FakePage {
    async fn goto(&self, url: &str, _timeout: Duration) -> Result<()> {
        self.site.navigations.fetch_add(1, Ordering::SeqCst);
        let dom = self
            .site
            .next_dom(url)
            .ok_or_else(|| anyhow!("net::ERR_NAME_NOT_RESOLVED"))?;
        if let Some(msg) = &dom.goto_error {
            return Err(anyhow!("{}", msg));
        }
        if let Ok(mut d) = self.dom.lock() {
            *d = dom;
        }
        Ok(())
    }

    async fn wait_for_selector(&self, selector: &str, _timeout: Duration) -> Result<()> {
        if self.dom().has(selector) {
            Ok(())
        } else {
            Err(anyhow!("timed out waiting for {}", selector))
        }
    }

    async fn wait_for_visible(&self, selector: &str, timeout: Duration) -> Result<()> {
        self.wait_for_selector(selector, timeout).await
    }

    async fn has_element(&self, selector: &str) -> Result<bool> {
        Ok(self.dom().has(selector))
    }

    async fn find_all(&self, selector: &str) -> Result<Vec<Box<dyn PageNode>>> {
        Ok(boxed(self.dom().elements.get(selector)))
    }

    async fn find_by_text(&self, query: &TextQuery) -> Result<Vec<Box<dyn PageNode>>> {
        let dom = self.dom();
        Ok(boxed(
            dom.text_queries
                .iter()
                .find(|(q, _)| q == query)
                .map(|(_, nodes)| nodes),
        ))
    }

    async fn element_box(&self, _selector: &str) -> Result<Option<ElementBox>> {
        Ok(self.dom().video_box)
    }

    async fn shorts_hint(&self) -> Result<bool> {
        Ok(self.dom().shorts_hint)
    }

    async fn scroll_to_fraction(&self, _fraction: f64) -> Result<()> {
        Ok(())
    }

    async fn block_heavy_resources(&self) -> Result<()> {
        Ok(())
    }

    async fn set_cookies(&self, cookies: Vec<CookieParam>) -> Result<()> {
        self.site.cookies_set.fetch_add(cookies.len(), Ordering::SeqCst);
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.site.pages_closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub struct FakeSession {
    site: Arc<FakeSite>,
}

#[async_trait]
impl BrowserSession for FakeSession {
    async fn new_page(&self) -> Result<Box<dyn VideoPage>> {
        self.site.pages_opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakePage {
            site: Arc::clone(&self.site),
            dom: Mutex::new(FakeDom::default()),
        }))
    }

    async fn close(&self) -> Result<()> {
        self.site.sessions_closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub struct FakeLauncher {
    pub site: Arc<FakeSite>,
    pub fail_launch: bool,
    pub launches: AtomicUsize,
}

impl FakeLauncher {
    pub fn new(site: Arc<FakeSite>) -> Self {
        Self {
            site,
            fail_launch: false,
            launches: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl BrowserLauncher for FakeLauncher {
    async fn launch(&self) -> Result<Box<dyn BrowserSession>> {
        self.launches.fetch_add(1, Ordering::SeqCst);
        if self.fail_launch {
            return Err(anyhow!("chrome exited with status 127"));
        }
        Ok(Box::new(FakeSession {
            site: Arc::clone(&self.site),
        }))
    }
}

pub struct FixedClock(pub DateTime<FixedOffset>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<FixedOffset> {
        self.0
    }
}

pub fn fixed_clock() -> FixedClock {
    FixedClock(DateTime::parse_from_rfc3339("2025-03-10T06:00:00+05:30").unwrap())
}

pub fn temp_heartbeat() -> std::path::PathBuf {
    std::env::temp_dir().join(format!("shopscout-hb-{}.txt", uuid::Uuid::new_v4()))
}

pub fn logs_contain(logs: &[shopscout::types::LogLine], needle: &str) -> bool {
    logs.iter().any(|l| l.0.contains(needle))
}
