use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// ScoutConfig: file-based config loader (shopscout.json) with env-var fallback
// ---------------------------------------------------------------------------

/// Spreadsheet sub-config (mirrors the `sheet` key in shopscout.json).
#[derive(serde::Deserialize, Default, Clone, Debug)]
pub struct SheetConfig {
    /// Spreadsheet key (the long id in the sheet URL).
    pub spreadsheet_id: Option<String>,
    /// Worksheet holding the video links. Default: `LiveClasses`.
    pub worksheet: Option<String>,
    /// Worksheet receiving one audit row per scheduled run. Default: `CronLog`.
    pub log_worksheet: Option<String>,
    /// OAuth bearer token for the Sheets API. Never logged.
    pub access_token: Option<String>,
    /// Sheets API root, overridable for tests / proxies.
    pub api_base: Option<String>,
}

impl SheetConfig {
    /// Spreadsheet id: JSON field → `SHOPSCOUT_SHEET_ID` env var → `None`.
    pub fn resolve_spreadsheet_id(&self) -> Option<String> {
        non_empty(self.spreadsheet_id.as_deref())
            .or_else(|| env_non_empty("SHOPSCOUT_SHEET_ID"))
    }

    pub fn resolve_worksheet(&self) -> String {
        non_empty(self.worksheet.as_deref())
            .or_else(|| env_non_empty("SHOPSCOUT_WORKSHEET"))
            .unwrap_or_else(|| "LiveClasses".to_string())
    }

    pub fn resolve_log_worksheet(&self) -> String {
        non_empty(self.log_worksheet.as_deref()).unwrap_or_else(|| "CronLog".to_string())
    }

    /// Access token: JSON field → `GOOGLE_SHEETS_ACCESS_TOKEN` env var → `None`.
    pub fn resolve_access_token(&self) -> Option<String> {
        non_empty(self.access_token.as_deref())
            .or_else(|| env_non_empty("GOOGLE_SHEETS_ACCESS_TOKEN"))
    }

    pub fn resolve_api_base(&self) -> String {
        non_empty(self.api_base.as_deref())
            .unwrap_or_else(|| "https://sheets.googleapis.com/v4".to_string())
    }
}

/// Top-level config loaded from `shopscout.json`.
#[derive(serde::Deserialize, Default, Clone, Debug)]
pub struct ScoutConfig {
    #[serde(default)]
    pub sheet: SheetConfig,
    /// Heartbeat file path. Default: `cron_status.txt`.
    pub heartbeat_path: Option<String>,
    /// Parallel workers for manual batches. Default: 2, clamped to 1..=10.
    pub workers: Option<usize>,
    /// User agent for every browser context.
    pub user_agent: Option<String>,
    /// HTTP API port. Default: `PORT` env → 5000.
    pub port: Option<u16>,
}

pub const MIN_WORKERS: usize = 1;
pub const MAX_WORKERS: usize = 10;
pub const DEFAULT_WORKERS: usize = 2;

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/114.0.0.0 Safari/537.36";

impl ScoutConfig {
    pub fn resolve_heartbeat_path(&self) -> PathBuf {
        non_empty(self.heartbeat_path.as_deref())
            .or_else(|| env_non_empty("SHOPSCOUT_HEARTBEAT"))
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("cron_status.txt"))
    }

    pub fn resolve_workers(&self) -> usize {
        clamp_workers(self.workers.unwrap_or(DEFAULT_WORKERS))
    }

    pub fn resolve_user_agent(&self) -> String {
        non_empty(self.user_agent.as_deref()).unwrap_or_else(|| DEFAULT_USER_AGENT.to_string())
    }

    pub fn resolve_port(&self) -> u16 {
        if let Some(p) = self.port {
            return p;
        }
        for k in ["SHOPSCOUT_PORT", "PORT"] {
            if let Some(p) = env_non_empty(k).and_then(|v| v.parse::<u16>().ok()) {
                return p;
            }
        }
        5000
    }
}

/// Operator-supplied worker counts are clamped into the supported range.
pub fn clamp_workers(n: usize) -> usize {
    n.clamp(MIN_WORKERS, MAX_WORKERS)
}

/// Load `shopscout.json` from standard locations.
///
/// Search order (first found wins):
/// 1. `SHOPSCOUT_CONFIG` env var path
/// 2. `./shopscout.json`
/// 3. `~/.shopscout/shopscout.json`
///
/// Missing file → `ScoutConfig::default()` (env-var fallbacks apply).
/// Parse error → log a warning, return `ScoutConfig::default()`.
pub fn load_scout_config() -> ScoutConfig {
    let mut candidates = vec![PathBuf::from("shopscout.json")];
    if let Some(home) = dirs::home_dir() {
        candidates.push(home.join(".shopscout").join("shopscout.json"));
    }
    if let Ok(env_path) = std::env::var("SHOPSCOUT_CONFIG") {
        candidates.insert(0, PathBuf::from(env_path));
    }

    for path in &candidates {
        if let Some(cfg) = load_from(path) {
            return cfg;
        }
    }
    ScoutConfig::default()
}

fn load_from(path: &Path) -> Option<ScoutConfig> {
    let contents = std::fs::read_to_string(path).ok()?;
    match serde_json::from_str::<ScoutConfig>(&contents) {
        Ok(cfg) => {
            tracing::info!("shopscout.json loaded from {}", path.display());
            Some(cfg)
        }
        Err(e) => {
            tracing::warn!(
                "shopscout.json parse error at {}: {} - using defaults",
                path.display(),
                e
            );
            Some(ScoutConfig::default())
        }
    }
}

fn non_empty(v: Option<&str>) -> Option<String> {
    v.map(str::trim).filter(|s| !s.is_empty()).map(str::to_string)
}

fn env_non_empty(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .and_then(|v| non_empty(Some(&v)))
}
