//! Native browser management using `chromiumoxide`.
//!
//! * Finding a usable browser executable (Chrome → Chromium → Brave, cross-platform).
//! * Building the headless launch config every worker uses.
//! * Waiting for the post-navigation network burst to settle.
//! * The resource types dropped at the network layer.

use anyhow::{anyhow, Result};
use chromiumoxide::browser::BrowserConfig;
use chromiumoxide::cdp::browser_protocol::network::ResourceType;
use chromiumoxide::handler::viewport::Viewport;
use chromiumoxide::Page;
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::debug;

pub const VIEWPORT_WIDTH: u32 = 1920;
pub const VIEWPORT_HEIGHT: u32 = 1080;

/// Requests of these types never influence extraction; they are aborted.
pub const BLOCKED_RESOURCE_TYPES: [ResourceType; 3] =
    [ResourceType::Image, ResourceType::Media, ResourceType::Font];

// ── Browser executable discovery ─────────────────────────────────────────────

/// Binary names looked up on `PATH`, most preferred first.
const PATH_BROWSERS: [&str; 5] = [
    "google-chrome",
    "chromium",
    "chromium-browser",
    "chrome",
    "brave-browser",
];

#[cfg(target_os = "macos")]
const INSTALL_PATHS: &[&str] = &[
    "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
    "/Applications/Chromium.app/Contents/MacOS/Chromium",
    "/Applications/Brave Browser.app/Contents/MacOS/Brave Browser",
];

#[cfg(target_os = "linux")]
const INSTALL_PATHS: &[&str] = &[
    "/usr/bin/google-chrome",
    "/usr/bin/chromium",
    "/usr/bin/chromium-browser",
    "/usr/local/bin/chromium",
    "/usr/bin/brave-browser",
];

#[cfg(target_os = "windows")]
const INSTALL_PATHS: &[&str] = &[
    r"C:\Program Files\Google\Chrome\Application\chrome.exe",
    r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
    r"C:\Program Files\BraveSoftware\Brave-Browser\Application\brave.exe",
];

#[cfg(not(any(target_os = "macos", target_os = "linux", target_os = "windows")))]
const INSTALL_PATHS: &[&str] = &[];

/// Browser the workers launch: `CHROME_EXECUTABLE`, then `PATH`, then the
/// platform's usual install locations.
pub fn find_chrome_executable() -> Option<String> {
    let explicit = std::env::var("CHROME_EXECUTABLE").ok();
    let path_var = std::env::var_os("PATH");
    resolve_browser(explicit.as_deref(), path_var.as_deref(), INSTALL_PATHS)
}

fn resolve_browser(
    explicit: Option<&str>,
    path_var: Option<&std::ffi::OsStr>,
    install_paths: &[&str],
) -> Option<String> {
    if let Some(p) = explicit.map(str::trim).filter(|p| !p.is_empty()) {
        if Path::new(p).is_file() {
            return Some(p.to_string());
        }
        debug!("CHROME_EXECUTABLE={} not found, searching", p);
    }

    let on_path = path_var.into_iter().flat_map(std::env::split_paths).find_map(|dir| {
        PATH_BROWSERS
            .iter()
            .map(|exe| dir.join(exe))
            .find(|full| full.is_file())
    });
    if let Some(full) = on_path {
        return Some(full.to_string_lossy().into_owned());
    }

    install_paths
        .iter()
        .find(|c| Path::new(c).is_file())
        .map(|c| c.to_string())
}

// ── Headless browser config builder ──────────────────────────────────────────

/// Build a `BrowserConfig` for headless operation.
///
/// `--disable-dev-shm-usage` matters on small containers where the scheduled
/// job runs; `--no-sandbox` is required in most CI / container sandboxes.
pub fn build_headless_config(exe: &str, user_agent: &str) -> Result<BrowserConfig> {
    BrowserConfig::builder()
        .chrome_executable(exe)
        .viewport(Viewport {
            width: VIEWPORT_WIDTH,
            height: VIEWPORT_HEIGHT,
            device_scale_factor: Some(1.0),
            emulating_mobile: false,
            is_landscape: true,
            has_touch: false,
        })
        .window_size(VIEWPORT_WIDTH, VIEWPORT_HEIGHT)
        .arg("--disable-gpu")
        .arg("--no-sandbox")
        .arg("--disable-setuid-sandbox")
        .arg("--disable-dev-shm-usage")
        .arg("--disable-extensions")
        .arg("--disable-background-networking")
        .arg("--disable-sync")
        .arg("--disable-translate")
        .arg("--no-first-run")
        .arg("--no-default-browser-check")
        .arg("--mute-audio")
        .arg("--autoplay-policy=no-user-gesture-required")
        .arg(format!("--user-agent={}", user_agent))
        .build()
        .map_err(|e| anyhow!("Failed to build browser config: {}", e))
}

// ── Network quiescence ───────────────────────────────────────────────────────

const IDLE_POLL: Duration = Duration::from_millis(250);

/// Tracks whether the resource count has stopped moving on a loaded document.
#[derive(Debug)]
struct IdleTracker {
    resources: u64,
    unchanged_since: Instant,
}

impl IdleTracker {
    fn new(now: Instant) -> Self {
        Self {
            resources: 0,
            unchanged_since: now,
        }
    }

    /// Feed one sample; `true` once the document has been complete with the
    /// same resource count for at least `idle`.
    fn observe(&mut self, now: Instant, loaded: bool, resources: u64, idle: Duration) -> bool {
        if !loaded || resources != self.resources {
            self.resources = resources;
            self.unchanged_since = now;
            return false;
        }
        now.duration_since(self.unchanged_since) >= idle
    }
}

async fn eval_json(page: &Page, expr: &str) -> Option<serde_json::Value> {
    page.evaluate(expr)
        .await
        .ok()
        .and_then(|v| v.into_value::<serde_json::Value>().ok())
}

/// Let the video page finish its XHR burst after navigation. Returns once no
/// new resource entries appeared for `idle` on a complete document, or when
/// `budget` runs out; running out is not an error.
pub async fn wait_for_network_idle(page: &Page, idle: Duration, budget: Duration) -> Result<()> {
    let start = Instant::now();
    let mut tracker = IdleTracker::new(start);

    while start.elapsed() < budget {
        let resources = eval_json(page, "performance.getEntriesByType('resource').length")
            .await
            .and_then(|j| j.as_u64())
            .unwrap_or(0);
        let loaded = eval_json(page, "document.readyState")
            .await
            .is_some_and(|j| j.as_str() == Some("complete"));

        if tracker.observe(Instant::now(), loaded, resources, idle) {
            debug!(
                "network idle after {}ms ({} resources)",
                start.elapsed().as_millis(),
                resources
            );
            return Ok(());
        }
        tokio::time::sleep(IDLE_POLL).await;
    }
    debug!("network still busy after {}ms, continuing", budget.as_millis());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocks_exactly_image_media_font() {
        assert!(BLOCKED_RESOURCE_TYPES.contains(&ResourceType::Image));
        assert!(BLOCKED_RESOURCE_TYPES.contains(&ResourceType::Media));
        assert!(BLOCKED_RESOURCE_TYPES.contains(&ResourceType::Font));
        assert!(!BLOCKED_RESOURCE_TYPES.contains(&ResourceType::Script));
    }

    #[test]
    fn idle_needs_a_complete_document_and_a_steady_count() {
        let t0 = Instant::now();
        let idle = Duration::from_millis(500);
        let mut tracker = IdleTracker::new(t0);

        assert!(!tracker.observe(t0, false, 12, idle));
        assert!(!tracker.observe(t0 + Duration::from_millis(300), true, 12, idle));
        // New resource resets the window.
        assert!(!tracker.observe(t0 + Duration::from_millis(600), true, 15, idle));
        assert!(!tracker.observe(t0 + Duration::from_millis(900), true, 15, idle));
        assert!(tracker.observe(t0 + Duration::from_millis(1100), true, 15, idle));
    }

    #[test]
    fn browser_found_on_path_when_override_is_stale() {
        let dir = std::env::temp_dir().join(format!("shopscout-bin-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let chromium = dir.join("chromium");
        std::fs::write(&chromium, b"").unwrap();
        let path_var = std::env::join_paths([dir.as_path()]).unwrap();

        let found = resolve_browser(Some("/nonexistent/chrome"), Some(path_var.as_os_str()), &[]);
        assert_eq!(found.as_deref(), Some(chromium.to_string_lossy().as_ref()));

        let explicit = chromium.to_string_lossy().into_owned();
        assert_eq!(
            resolve_browser(Some(&format!("  {}  ", explicit)), None, &[]),
            Some(explicit)
        );

        assert_eq!(resolve_browser(None, None, &["/nonexistent/chrome"]), None);
        let _ = std::fs::remove_dir_all(&dir);
    }
}
