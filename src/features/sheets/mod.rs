//! Spreadsheet collaborator: pending-row discovery, per-row result writes and
//! the per-run audit log.

pub mod google;

pub use google::GoogleSheetStore;

use crate::types::{ProductRow, RunSummary, SheetRowRef, TagStatus};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Mutex;

// Sheet column positions (1-indexed).
pub const COL_VIDEO_LINK: usize = 9; // I
pub const COL_PRODUCT_TAG: usize = 10; // J
pub const COL_PRODUCT_TITLE: usize = 11; // K
pub const COL_PRICE: usize = 12; // L
pub const COL_PLATFORM: usize = 13; // M

pub const RUN_LOG_HEADER: [&str; 6] = [
    "Cron Start at",
    "Cron Stop at",
    "Total Rows",
    "Rows Updated with Product",
    "Rows Already have the product",
    "Rows have no Product",
];

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, thiserror::Error)]
pub enum SheetError {
    #[error("sheet not configured: {0}")]
    NotConfigured(&'static str),
    #[error("sheets API returned {status}: {body}")]
    Http { status: u16, body: String },
    #[error("sheets transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("unexpected sheets response: {0}")]
    Decode(String),
    #[error("write rejected for row {0}")]
    Rejected(usize),
}

/// Values written to the status / title / price / platform columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowUpdate {
    pub status: String,
    pub title: String,
    pub price: String,
    pub platform: String,
}

impl RowUpdate {
    pub fn from_row(row: &ProductRow) -> Self {
        Self {
            status: row.status.as_str().to_string(),
            title: row.title.clone(),
            price: row.price.clone(),
            platform: row.platform_str().to_string(),
        }
    }

    pub fn no_product() -> Self {
        Self {
            status: TagStatus::No.as_str().to_string(),
            title: String::new(),
            price: String::new(),
            platform: String::new(),
        }
    }

    pub fn cells(&self) -> [&str; 4] {
        [&self.status, &self.title, &self.price, &self.platform]
    }
}

/// Audit row values in header order.
pub fn run_log_cells(s: &RunSummary) -> Vec<serde_json::Value> {
    vec![
        s.start_time.format(TIMESTAMP_FORMAT).to_string().into(),
        s.end_time.format(TIMESTAMP_FORMAT).to_string().into(),
        s.total_rows.into(),
        s.updated_with_product.into(),
        s.already_have_product.into(),
        s.have_no_product.into(),
    ]
}

#[async_trait]
pub trait SheetStore: Send + Sync {
    /// Every row of the video worksheet, header included.
    async fn fetch_rows(&self) -> Result<Vec<Vec<String>>, SheetError>;

    /// Overwrite the four result cells of one 1-based sheet row.
    async fn update_row(&self, row_number: usize, update: &RowUpdate) -> Result<(), SheetError>;

    /// Append one audit row, creating the log worksheet with a header if needed.
    async fn append_run_log(&self, summary: &RunSummary) -> Result<(), SheetError>;
}

/// Result of scanning the worksheet for rows that need (re)processing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PendingScan {
    pub pending: Vec<SheetRowRef>,
    pub already_done: usize,
    /// Data rows, header excluded.
    pub total_rows: usize,
}

/// A row is pending when it has a video link and its tag is empty, NO or ERROR.
pub fn pending_rows(rows: &[Vec<String>]) -> PendingScan {
    let mut scan = PendingScan {
        total_rows: rows.len().saturating_sub(1),
        ..Default::default()
    };
    for (i, row) in rows.iter().enumerate().skip(1) {
        let cell = |col: usize| row.get(col - 1).map(|s| s.trim()).unwrap_or("");
        let video_link = cell(COL_VIDEO_LINK);
        if video_link.is_empty() {
            continue;
        }
        let tag = cell(COL_PRODUCT_TAG).to_uppercase();
        if tag.is_empty() || tag == "NO" || tag == "ERROR" {
            scan.pending.push(SheetRowRef {
                row_number: i + 1,
                video_url: video_link.to_string(),
            });
        } else {
            scan.already_done += 1;
        }
    }
    scan
}

/// 1-based column index → A1 letter(s).
pub fn column_letter(mut col: usize) -> String {
    let mut out = Vec::new();
    while col > 0 {
        let rem = (col - 1) % 26;
        out.push(b'A' + rem as u8);
        col = (col - 1) / 26;
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}

// ── In-memory store ──────────────────────────────────────────────────────────

/// In-memory test double for [`SheetStore`], with hooks to fail fetches or
/// reject writes to chosen rows.
#[derive(Debug, Default)]
pub struct MemorySheetStore {
    rows: Mutex<Vec<Vec<String>>>,
    updates: Mutex<Vec<(usize, RowUpdate)>>,
    run_logs: Mutex<Vec<RunSummary>>,
    reject_rows: HashSet<usize>,
    fail_fetch: bool,
}

impl MemorySheetStore {
    pub fn new(rows: Vec<Vec<String>>) -> Self {
        Self {
            rows: Mutex::new(rows),
            ..Default::default()
        }
    }

    /// Builds a sheet with a header row and one data row per `(link, tag)`.
    pub fn with_links(links: &[(&str, &str)]) -> Self {
        let mut rows = vec![vec!["header".to_string(); COL_PLATFORM]];
        for (link, tag) in links {
            let mut row = vec![String::new(); COL_PLATFORM];
            row[COL_VIDEO_LINK - 1] = link.to_string();
            row[COL_PRODUCT_TAG - 1] = tag.to_string();
            rows.push(row);
        }
        Self::new(rows)
    }

    /// Make writes to `row_number` fail.
    pub fn rejecting(mut self, row_number: usize) -> Self {
        self.reject_rows.insert(row_number);
        self
    }

    pub fn failing_fetch(mut self) -> Self {
        self.fail_fetch = true;
        self
    }

    pub fn updates(&self) -> Vec<(usize, RowUpdate)> {
        self.updates.lock().map(|u| u.clone()).unwrap_or_default()
    }

    pub fn run_logs(&self) -> Vec<RunSummary> {
        self.run_logs.lock().map(|l| l.clone()).unwrap_or_default()
    }

    pub fn rows(&self) -> Vec<Vec<String>> {
        self.rows.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl SheetStore for MemorySheetStore {
    async fn fetch_rows(&self) -> Result<Vec<Vec<String>>, SheetError> {
        if self.fail_fetch {
            return Err(SheetError::Http {
                status: 503,
                body: "unavailable".into(),
            });
        }
        Ok(self.rows())
    }

    async fn update_row(&self, row_number: usize, update: &RowUpdate) -> Result<(), SheetError> {
        if self.reject_rows.contains(&row_number) {
            return Err(SheetError::Rejected(row_number));
        }
        if let Ok(mut rows) = self.rows.lock() {
            if let Some(row) = row_number.checked_sub(1).and_then(|i| rows.get_mut(i)) {
                if row.len() < COL_PLATFORM {
                    row.resize(COL_PLATFORM, String::new());
                }
                for (offset, value) in update.cells().iter().enumerate() {
                    row[COL_PRODUCT_TAG - 1 + offset] = value.to_string();
                }
            }
        }
        if let Ok(mut updates) = self.updates.lock() {
            updates.push((row_number, update.clone()));
        }
        Ok(())
    }

    async fn append_run_log(&self, summary: &RunSummary) -> Result<(), SheetError> {
        if let Ok(mut logs) = self.run_logs.lock() {
            logs.push(summary.clone());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(link: &str, tag: &str) -> Vec<String> {
        let mut r = vec![String::new(); 10];
        r[8] = link.into();
        r[9] = tag.into();
        r
    }

    #[test]
    fn pending_rows_are_empty_no_or_error_tags() {
        let rows = vec![
            row("Video Link", "Product_Tag_Status"),
            row("https://youtu.be/a", ""),
            row("https://youtu.be/b", "YES"),
            row("https://youtu.be/c", "no"),
            row("", ""),
            row("https://youtu.be/d", " Error "),
            vec!["short row".to_string()],
        ];
        let scan = pending_rows(&rows);
        assert_eq!(scan.total_rows, 6);
        assert_eq!(scan.already_done, 1);
        let numbers: Vec<usize> = scan.pending.iter().map(|r| r.row_number).collect();
        assert_eq!(numbers, vec![2, 4, 6]);
        assert_eq!(scan.pending[2].video_url, "https://youtu.be/d");
    }

    #[test]
    fn link_cell_is_trimmed() {
        let rows = vec![row("h", "h"), row("  https://youtu.be/x  ", "")];
        assert_eq!(pending_rows(&rows).pending[0].video_url, "https://youtu.be/x");
    }

    #[test]
    fn empty_sheet_has_zero_rows() {
        assert_eq!(pending_rows(&[]), PendingScan::default());
    }

    #[test]
    fn column_letters() {
        assert_eq!(column_letter(9), "I");
        assert_eq!(column_letter(13), "M");
        assert_eq!(column_letter(27), "AA");
    }

    #[test]
    fn memory_store_writes_result_columns() {
        let store = MemorySheetStore::with_links(&[("https://youtu.be/a", "")]);
        let update = RowUpdate {
            status: "YES".into(),
            title: "Book".into(),
            price: "₹10".into(),
            platform: "Testbook".into(),
        };
        tokio_test::assert_ok!(tokio_test::block_on(store.update_row(2, &update)));
        tokio_test::assert_err!(tokio_test::block_on(
            MemorySheetStore::default().rejecting(2).update_row(2, &update)
        ));
        let rows = store.rows();
        assert_eq!(&rows[1][9..13], &["YES", "Book", "₹10", "Testbook"]);
    }
}
