use crate::core::config::ScoutConfig;
use crate::features::heartbeat::Heartbeat;
use crate::features::sheets::{GoogleSheetStore, SheetStore};
use crate::scraping::cdp::CdpLauncher;
use crate::scraping::page::BrowserLauncher;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Clone)]
pub struct AppState {
    /// File-based config loaded from `shopscout.json` (env-var fallback for all fields).
    pub config: Arc<ScoutConfig>,

    // None when no Chromium-family browser is installed.
    pub launcher: Option<Arc<dyn BrowserLauncher>>,

    // None when the spreadsheet id / token are not configured.
    pub sheets: Option<Arc<dyn SheetStore>>,

    pub heartbeat: Heartbeat,

    // Held for the whole scheduled run; try-locked so overlapping triggers are skipped.
    pub cron_lock: Arc<tokio::sync::Mutex<()>>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("browser_available", &self.launcher.is_some())
            .field("sheets_configured", &self.sheets.is_some())
            .field("heartbeat", &self.heartbeat.path())
            .finish()
    }
}

impl AppState {
    pub fn new(http_client: reqwest::Client, config: ScoutConfig) -> Self {
        let launcher: Option<Arc<dyn BrowserLauncher>> =
            match CdpLauncher::new_auto(config.resolve_user_agent()) {
                Some(l) => Some(Arc::new(l)),
                None => {
                    warn!("No Chromium-family browser found; set CHROME_EXECUTABLE to enable scraping");
                    None
                }
            };

        let sheets: Option<Arc<dyn SheetStore>> =
            match GoogleSheetStore::from_config(http_client, &config.sheet) {
                Ok(s) => {
                    info!("Spreadsheet store ready");
                    Some(Arc::new(s))
                }
                Err(e) => {
                    info!("Scheduled job disabled: {}", e);
                    None
                }
            };

        Self {
            heartbeat: Heartbeat::new(config.resolve_heartbeat_path()),
            config: Arc::new(config),
            launcher,
            sheets,
            cron_lock: Arc::new(tokio::sync::Mutex::new(())),
        }
    }

    pub fn with_launcher(mut self, launcher: Arc<dyn BrowserLauncher>) -> Self {
        self.launcher = Some(launcher);
        self
    }

    pub fn with_sheet_store(mut self, store: Arc<dyn SheetStore>) -> Self {
        self.sheets = Some(store);
        self
    }

    pub fn with_heartbeat(mut self, heartbeat: Heartbeat) -> Self {
        self.heartbeat = heartbeat;
        self
    }

    /// True while a scheduled run holds the lock.
    pub fn cron_running(&self) -> bool {
        self.cron_lock.try_lock().is_err()
    }
}
