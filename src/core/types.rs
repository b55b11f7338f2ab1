use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Page layout a video was rendered with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VideoType {
    Shorts,
    Normal,
    Unknown,
}

impl VideoType {
    pub fn as_str(&self) -> &'static str {
        match self {
            VideoType::Shorts => "Shorts",
            VideoType::Normal => "Normal",
            VideoType::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for VideoType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Product tag status written to the sheet's tag column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TagStatus {
    Yes,
    No,
    Error,
}

impl TagStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TagStatus::Yes => "YES",
            TagStatus::No => "NO",
            TagStatus::Error => "ERROR",
        }
    }
}

impl fmt::Display for TagStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Storefront a product card links out to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Platform {
    Flipkart,
    Testbook,
}

impl Platform {
    /// Two-platform heuristic: any mention of flipkart in the card text or
    /// its link wins, everything else is a Testbook product.
    pub fn detect(card_text: &str, link: &str) -> Self {
        let hit = |s: &str| s.to_lowercase().contains("flipkart");
        if hit(card_text) || hit(link) {
            Platform::Flipkart
        } else {
            Platform::Testbook
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Flipkart => "Flipkart",
            Platform::Testbook => "Testbook",
        }
    }
}

/// One extracted product (or a terminal NO/ERROR marker) for a video.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductRow {
    #[serde(rename = "Source URL")]
    pub source_url: String,
    #[serde(rename = "Video_Type")]
    pub video_type: VideoType,
    #[serde(rename = "Product_Tag_Status")]
    pub status: TagStatus,
    #[serde(rename = "Title")]
    pub title: String,
    #[serde(rename = "Price")]
    pub price: String,
    /// `None` on NO/ERROR fallback rows.
    #[serde(rename = "Platform")]
    pub platform: Option<Platform>,
    #[serde(rename = "Link")]
    pub link: String,
}

impl ProductRow {
    pub fn found(
        source_url: &str,
        video_type: VideoType,
        title: String,
        price: String,
        link: String,
        card_text: &str,
    ) -> Self {
        let platform = Platform::detect(card_text, &link);
        Self {
            source_url: source_url.to_string(),
            video_type,
            status: TagStatus::Yes,
            title,
            price,
            platform: Some(platform),
            link,
        }
    }

    pub fn no_product(source_url: &str, video_type: VideoType) -> Self {
        Self {
            source_url: source_url.to_string(),
            video_type,
            status: TagStatus::No,
            title: String::new(),
            price: String::new(),
            platform: None,
            link: String::new(),
        }
    }

    pub fn error(source_url: &str, message: String) -> Self {
        Self {
            source_url: source_url.to_string(),
            video_type: VideoType::Unknown,
            status: TagStatus::Error,
            title: message,
            price: String::new(),
            platform: None,
            link: String::new(),
        }
    }

    /// Deduplication key within one video's batch.
    pub fn identity(&self) -> (&str, &str, &str) {
        (&self.source_url, &self.title, &self.price)
    }

    pub fn platform_str(&self) -> &'static str {
        self.platform.map(|p| p.as_str()).unwrap_or("")
    }
}

/// Timestamped worker log line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogLine(pub String);

impl fmt::Display for LogLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Everything one Video Worker hands back to its caller.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkerOutput {
    pub rows: Vec<ProductRow>,
    pub logs: Vec<LogLine>,
}

/// A pending spreadsheet row: 1-based sheet row number plus the video link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SheetRowRef {
    pub row_number: usize,
    pub video_url: String,
}

/// Audit record appended once per scheduled run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub start_time: DateTime<FixedOffset>,
    pub end_time: DateTime<FixedOffset>,
    pub total_rows: usize,
    pub updated_with_product: usize,
    pub already_have_product: usize,
    pub have_no_product: usize,
}

// ── HTTP surface ─────────────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
pub struct ScrapeBatchRequest {
    pub urls: Vec<String>,
    #[serde(default)]
    pub cookies: Option<Vec<serde_json::Value>>,
    #[serde(default)]
    pub workers: Option<usize>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ScrapeBatchResponse {
    pub batch_id: String,
    pub total_urls: usize,
    pub rows: Vec<ProductRow>,
    pub log_tail: String,
    pub total_duration_ms: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CronStatusResponse {
    pub last_status: Option<String>,
    pub running: bool,
    pub next_run: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CronRunResponse {
    /// `finished` or `aborted`.
    pub outcome: String,
    pub summary: Option<RunSummary>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn platform_is_flipkart_in_any_case() {
        assert_eq!(Platform::detect("Buy on FLIPKART today", ""), Platform::Flipkart);
        assert_eq!(
            Platform::detect("Some book", "https://www.flipkart.com/item"),
            Platform::Flipkart
        );
        assert_eq!(Platform::detect("SSC Pass", "https://testbook.com"), Platform::Testbook);
    }

    #[test]
    fn fallback_rows_have_no_platform() {
        let row = ProductRow::no_product("u", VideoType::Shorts);
        assert_eq!(row.platform_str(), "");
        assert_eq!(row.status, TagStatus::No);

        let err = ProductRow::error("u", "boom".into());
        assert_eq!(err.video_type, VideoType::Unknown);
        assert_eq!(err.title, "boom");
    }

    #[test]
    fn status_serializes_uppercase() {
        let v = serde_json::to_value(TagStatus::Error).unwrap();
        assert_eq!(v, serde_json::json!("ERROR"));
    }
}
