//! Chromium implementation of the page traits over `chromiumoxide`.
//!
//! Elements found by in-page scripts (text queries, ancestor walks) cannot be
//! returned as handles directly, so the script stamps them with a
//! `data-shopscout-ref` token and the Rust side re-queries that attribute.

use super::browser_manager::{self, BLOCKED_RESOURCE_TYPES};
use super::page::{BrowserLauncher, BrowserSession, ElementBox, PageNode, TextQuery, VideoPage};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::fetch::{
    EnableParams, EventRequestPaused, FailRequestParams, RequestPattern, RequestStage,
};
use chromiumoxide::cdp::browser_protocol::network::{CookieParam, ErrorReason, SetCookiesParams};
use chromiumoxide::element::Element;
use chromiumoxide::{Browser, Page};
use futures::StreamExt;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info};

const REF_ATTR: &str = "data-shopscout-ref";
const POLL: Duration = Duration::from_millis(250);
const NETWORK_IDLE: Duration = Duration::from_millis(500);

/// Ancestor levels inspected when climbing from a price label to its card.
pub const CARD_ANCESTOR_DEPTH: usize = 12;

const VISIBLE_FN: &str = r#"function() {
    const r = this.getBoundingClientRect();
    const s = window.getComputedStyle(this);
    return r.width > 0 && r.height > 0 && s.visibility !== 'hidden' && s.display !== 'none';
}"#;

const FIRST_LINK_FN: &str = r#"function() {
    const a = this.querySelector('a[href]');
    return a ? a.href : '';
}"#;

const CLICK_FN: &str = "function() { this.click(); return true; }";

const SHORTS_HINT_JS: &str = r#"(() => {
    const c = document.querySelector('link[rel="canonical"]');
    if (c && c.href.includes('/shorts/')) return true;
    const og = document.querySelector('meta[property="og:url"]');
    if (og && (og.content || '').includes('/shorts/')) return true;
    const p = document.querySelector('#movie_player, ytd-player');
    if (p) { const r = p.getBoundingClientRect(); return r.height >= r.width * 0.9; }
    return false;
})()"#;

fn fresh_token() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

fn ref_selector(token: &str) -> String {
    format!("[{}='{}']", REF_ATTR, token)
}

fn js_str(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_else(|_| "\"\"".to_string())
}

fn card_ancestor_fn(token: &str) -> String {
    format!(
        r#"function() {{
    const hasShop = (node) => Array.from(node.querySelectorAll('button,a'))
        .some(n => (n.innerText || '').trim().toUpperCase() === 'SHOP');
    let cur = this;
    for (let i = 0; i < {depth} && cur; i++) {{
        const txt = (cur.innerText || '').toUpperCase();
        if ((txt.includes('₹') && txt.includes('SHOP')) || hasShop(cur)) {{
            cur.setAttribute({attr}, {token});
            return true;
        }}
        cur = cur.parentElement;
    }}
    return false;
}}"#,
        depth = CARD_ANCESTOR_DEPTH,
        attr = js_str(REF_ATTR),
        token = js_str(token),
    )
}

fn text_query_js(query: &TextQuery, token: &str) -> String {
    let matcher = match query {
        TextQuery::HasText { selector, text } => format!(
            r#"const needle = {text}.toLowerCase();
    const hits = Array.from(document.querySelectorAll({selector}))
        .filter(el => (el.innerText || el.textContent || '').toLowerCase().includes(needle));"#,
            text = js_str(text),
            selector = js_str(selector),
        ),
        TextQuery::Regex { source, flags } => format!(
            r#"const re = new RegExp({source}, {flags});
    const skip = new Set(['SCRIPT', 'STYLE', 'NOSCRIPT', 'TEMPLATE']);
    const hits = Array.from(document.body ? document.body.querySelectorAll('*') : [])
        .filter(el => !skip.has(el.tagName) && re.test(el.textContent || ''))
        .filter(el => !Array.from(el.children).some(c => re.test(c.textContent || '')));"#,
            source = js_str(source),
            flags = js_str(flags),
        ),
    };
    format!(
        r#"(() => {{
    {matcher}
    hits.forEach(el => el.setAttribute({attr}, {token}));
    return hits.length;
}})()"#,
        matcher = matcher,
        attr = js_str(REF_ATTR),
        token = js_str(token),
    )
}

fn remote_bool(ret: &chromiumoxide::cdp::js_protocol::runtime::CallFunctionOnReturns) -> bool {
    ret.result
        .value
        .as_ref()
        .and_then(|v| v.as_bool())
        .unwrap_or(false)
}

// ── Launcher / session ───────────────────────────────────────────────────────

/// Launches one headless Chromium per worker.
#[derive(Debug, Clone)]
pub struct CdpLauncher {
    exe: String,
    user_agent: String,
}

impl CdpLauncher {
    pub fn new(exe: impl Into<String>, user_agent: impl Into<String>) -> Self {
        Self {
            exe: exe.into(),
            user_agent: user_agent.into(),
        }
    }

    /// Launcher for the auto-discovered executable; `None` when no browser is installed.
    pub fn new_auto(user_agent: impl Into<String>) -> Option<Self> {
        browser_manager::find_chrome_executable().map(|exe| Self::new(exe, user_agent))
    }
}

#[async_trait]
impl BrowserLauncher for CdpLauncher {
    async fn launch(&self) -> Result<Box<dyn BrowserSession>> {
        let config = browser_manager::build_headless_config(&self.exe, &self.user_agent)?;
        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| anyhow!("failed to launch browser ({}): {}", self.exe, e))?;
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("CDP handler error: {}", e);
                }
            }
        });
        info!("browser launched ({})", self.exe);
        Ok(Box::new(CdpSession {
            browser: Mutex::new(Some(browser)),
            handler_task,
        }))
    }
}

pub struct CdpSession {
    browser: Mutex<Option<Browser>>,
    handler_task: JoinHandle<()>,
}

#[async_trait]
impl BrowserSession for CdpSession {
    async fn new_page(&self) -> Result<Box<dyn VideoPage>> {
        let guard = self.browser.lock().await;
        let browser = guard.as_ref().ok_or_else(|| anyhow!("browser already closed"))?;
        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| anyhow!("failed to open tab: {}", e))?;
        Ok(Box::new(CdpPage {
            page,
            interceptors: std::sync::Mutex::new(Vec::new()),
        }))
    }

    async fn close(&self) -> Result<()> {
        let mut guard = self.browser.lock().await;
        if let Some(mut browser) = guard.take() {
            browser
                .close()
                .await
                .map_err(|e| anyhow!("browser close failed: {}", e))?;
            let _ = browser.wait().await;
        }
        self.handler_task.abort();
        Ok(())
    }
}

impl Drop for CdpSession {
    fn drop(&mut self) {
        self.handler_task.abort();
    }
}

// ── Page ─────────────────────────────────────────────────────────────────────

pub struct CdpPage {
    page: Page,
    interceptors: std::sync::Mutex<Vec<JoinHandle<()>>>,
}

impl CdpPage {
    async fn eval_bool(&self, js: &str) -> Result<bool> {
        self.page
            .evaluate(js)
            .await
            .map_err(|e| anyhow!("evaluate failed: {}", e))?
            .into_value::<bool>()
            .map_err(|e| anyhow!("unexpected evaluate result: {}", e))
    }

    fn wrap(&self, elements: Vec<Element>) -> Vec<Box<dyn PageNode>> {
        elements
            .into_iter()
            .map(|element| {
                Box::new(CdpNode {
                    page: self.page.clone(),
                    element,
                }) as Box<dyn PageNode>
            })
            .collect()
    }

    async fn first_visible(&self, selector: &str) -> bool {
        let Ok(found) = self.page.find_elements(selector).await else {
            return false;
        };
        match found.into_iter().next() {
            Some(el) => el
                .call_js_fn(VISIBLE_FN, false)
                .await
                .map(|r| remote_bool(&r))
                .unwrap_or(false),
            None => false,
        }
    }
}

#[async_trait]
impl VideoPage for CdpPage {
    async fn goto(&self, url: &str, timeout: Duration) -> Result<()> {
        let started = Instant::now();
        tokio::time::timeout(timeout, async {
            self.page
                .goto(url)
                .await
                .map_err(|e| anyhow!("navigation failed: {}", e))?;
            let remaining = timeout.saturating_sub(started.elapsed());
            browser_manager::wait_for_network_idle(&self.page, NETWORK_IDLE, remaining).await
        })
        .await
        .map_err(|_| anyhow!("navigation timeout of {}ms exceeded", timeout.as_millis()))?
    }

    async fn wait_for_selector(&self, selector: &str, timeout: Duration) -> Result<()> {
        let started = Instant::now();
        loop {
            if self.page.find_element(selector).await.is_ok() {
                return Ok(());
            }
            if started.elapsed() >= timeout {
                return Err(anyhow!(
                    "timeout {}ms waiting for '{}'",
                    timeout.as_millis(),
                    selector
                ));
            }
            tokio::time::sleep(POLL).await;
        }
    }

    async fn wait_for_visible(&self, selector: &str, timeout: Duration) -> Result<()> {
        let started = Instant::now();
        loop {
            if self.first_visible(selector).await {
                return Ok(());
            }
            if started.elapsed() >= timeout {
                return Err(anyhow!(
                    "timeout {}ms waiting for visible '{}'",
                    timeout.as_millis(),
                    selector
                ));
            }
            tokio::time::sleep(POLL).await;
        }
    }

    async fn has_element(&self, selector: &str) -> Result<bool> {
        let found = self
            .page
            .find_elements(selector)
            .await
            .map_err(|e| anyhow!("query '{}' failed: {}", selector, e))?;
        Ok(!found.is_empty())
    }

    async fn find_all(&self, selector: &str) -> Result<Vec<Box<dyn PageNode>>> {
        let found = self
            .page
            .find_elements(selector)
            .await
            .map_err(|e| anyhow!("query '{}' failed: {}", selector, e))?;
        Ok(self.wrap(found))
    }

    async fn find_by_text(&self, query: &TextQuery) -> Result<Vec<Box<dyn PageNode>>> {
        let token = fresh_token();
        let count: u64 = self
            .page
            .evaluate(text_query_js(query, &token))
            .await
            .map_err(|e| anyhow!("text query failed: {}", e))?
            .into_value()
            .unwrap_or(0);
        if count == 0 {
            return Ok(Vec::new());
        }
        self.find_all(&ref_selector(&token)).await
    }

    async fn element_box(&self, selector: &str) -> Result<Option<ElementBox>> {
        let found = self
            .page
            .find_elements(selector)
            .await
            .map_err(|e| anyhow!("query '{}' failed: {}", selector, e))?;
        let Some(el) = found.into_iter().next() else {
            return Ok(None);
        };
        let bb = el
            .bounding_box()
            .await
            .map_err(|e| anyhow!("bounding box unavailable: {}", e))?;
        Ok(Some(ElementBox {
            width: bb.width,
            height: bb.height,
        }))
    }

    async fn shorts_hint(&self) -> Result<bool> {
        self.eval_bool(SHORTS_HINT_JS).await
    }

    async fn scroll_to_fraction(&self, fraction: f64) -> Result<()> {
        let js = format!(
            r#"(() => {{
    const t = Math.max(document.body.scrollHeight, document.documentElement.scrollHeight) * {fraction};
    window.scrollTo({{ top: t, behavior: 'smooth' }});
    return true;
}})()"#
        );
        self.eval_bool(&js).await.map(|_| ())
    }

    async fn block_heavy_resources(&self) -> Result<()> {
        let mut paused = self
            .page
            .event_listener::<EventRequestPaused>()
            .await
            .map_err(|e| anyhow!("request listener unavailable: {}", e))?;

        let patterns = BLOCKED_RESOURCE_TYPES
            .iter()
            .map(|rt| RequestPattern {
                url_pattern: Some("*".to_string()),
                resource_type: Some(rt.clone()),
                request_stage: Some(RequestStage::Request),
            })
            .collect();
        self.page
            .execute(EnableParams {
                patterns: Some(patterns),
                handle_auth_requests: None,
            })
            .await
            .map_err(|e| anyhow!("Fetch.enable failed: {}", e))?;

        let page = self.page.clone();
        let task = tokio::spawn(async move {
            while let Some(event) = paused.next().await {
                let fail = FailRequestParams::new(event.request_id.clone(), ErrorReason::BlockedByClient);
                if let Err(e) = page.execute(fail).await {
                    debug!("failed to abort request: {}", e);
                }
            }
        });
        if let Ok(mut tasks) = self.interceptors.lock() {
            tasks.push(task);
        }
        Ok(())
    }

    async fn set_cookies(&self, cookies: Vec<CookieParam>) -> Result<()> {
        let count = cookies.len();
        self.page
            .execute(SetCookiesParams::new(cookies))
            .await
            .map_err(|e| anyhow!("Network.setCookies failed: {}", e))?;
        debug!("injected {} cookies", count);
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        if let Ok(mut tasks) = self.interceptors.lock() {
            for t in tasks.drain(..) {
                t.abort();
            }
        }
        self.page
            .clone()
            .close()
            .await
            .map_err(|e| anyhow!("page close failed: {}", e))
    }
}

// ── Element ──────────────────────────────────────────────────────────────────

pub struct CdpNode {
    page: Page,
    element: Element,
}

#[async_trait]
impl PageNode for CdpNode {
    async fn is_visible(&self) -> Result<bool> {
        let ret = self
            .element
            .call_js_fn(VISIBLE_FN, false)
            .await
            .map_err(|e| anyhow!("visibility check failed: {}", e))?;
        Ok(remote_bool(&ret))
    }

    async fn inner_text(&self) -> Result<String> {
        Ok(self
            .element
            .inner_text()
            .await
            .map_err(|e| anyhow!("innerText failed: {}", e))?
            .unwrap_or_default())
    }

    async fn first_link_href(&self) -> Result<String> {
        let ret = self
            .element
            .call_js_fn(FIRST_LINK_FN, false)
            .await
            .map_err(|e| anyhow!("link lookup failed: {}", e))?;
        Ok(ret
            .result
            .value
            .as_ref()
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string())
    }

    async fn force_click(&self, timeout: Duration) -> Result<()> {
        tokio::time::timeout(timeout, self.element.call_js_fn(CLICK_FN, false))
            .await
            .map_err(|_| anyhow!("click timeout of {}ms exceeded", timeout.as_millis()))?
            .map_err(|e| anyhow!("click failed: {}", e))?;
        Ok(())
    }

    async fn scroll_into_view(&self) -> Result<()> {
        self.element
            .scroll_into_view()
            .await
            .map_err(|e| anyhow!("scroll into view failed: {}", e))?;
        Ok(())
    }

    async fn scroll_by(&self, px: i64) -> Result<()> {
        let js = format!("function() {{ this.scrollTop += {}; return true; }}", px);
        self.element
            .call_js_fn(js, false)
            .await
            .map_err(|e| anyhow!("element scroll failed: {}", e))?;
        Ok(())
    }

    async fn find_all(&self, selector: &str) -> Result<Vec<Box<dyn PageNode>>> {
        let found = self
            .element
            .find_elements(selector)
            .await
            .map_err(|e| anyhow!("query '{}' failed: {}", selector, e))?;
        Ok(found
            .into_iter()
            .map(|element| {
                Box::new(CdpNode {
                    page: self.page.clone(),
                    element,
                }) as Box<dyn PageNode>
            })
            .collect())
    }

    async fn card_ancestor(&self) -> Result<Option<Box<dyn PageNode>>> {
        let token = fresh_token();
        let ret = self
            .element
            .call_js_fn(card_ancestor_fn(&token), false)
            .await
            .map_err(|e| anyhow!("ancestor walk failed: {}", e))?;
        if !remote_bool(&ret) {
            return Ok(None);
        }
        let element = self
            .page
            .find_element(ref_selector(&token))
            .await
            .map_err(|e| anyhow!("stamped card vanished: {}", e))?;
        Ok(Some(Box::new(CdpNode {
            page: self.page.clone(),
            element,
        })))
    }
}
