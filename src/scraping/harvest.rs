use crate::types::{LogLine, ProductRow, TagStatus, VideoType, WorkerOutput};
use tracing::info;

/// Owned row + log buffers for one video.
///
/// The worker creates one `Harvest` per URL and lends it mutably to the flows;
/// rows are reset at the start of every attempt, logs accumulate across attempts.
#[derive(Debug)]
pub struct Harvest {
    source_url: String,
    tag: String,
    rows: Vec<ProductRow>,
    logs: Vec<LogLine>,
}

impl Harvest {
    pub fn new(source_url: &str) -> Self {
        Self {
            source_url: source_url.to_string(),
            tag: format!("[...{}]", url_suffix(source_url, 12)),
            rows: Vec::new(),
            logs: Vec::new(),
        }
    }

    pub fn source_url(&self) -> &str {
        &self.source_url
    }

    pub fn log(&mut self, msg: impl AsRef<str>) {
        let line = format!(
            "[{}] {} {}",
            chrono::Local::now().format("%H:%M:%S"),
            self.tag,
            msg.as_ref()
        );
        info!("{}", line);
        self.logs.push(LogLine(line));
    }

    /// Append a YES row unless one with the same (url, title, price) exists.
    /// Returns whether the row was added.
    pub fn add_product(
        &mut self,
        video_type: VideoType,
        title: String,
        price: String,
        link: String,
        card_text: &str,
    ) -> bool {
        let row = ProductRow::found(&self.source_url, video_type, title, price, link, card_text);
        if self.rows.iter().any(|r| r.identity() == row.identity()) {
            return false;
        }
        self.rows.push(row);
        true
    }

    pub fn push_row(&mut self, row: ProductRow) {
        self.rows.push(row);
    }

    pub fn has_product(&self) -> bool {
        self.rows.iter().any(|r| r.status == TagStatus::Yes)
    }

    pub fn rows(&self) -> &[ProductRow] {
        &self.rows
    }

    pub fn logs(&self) -> &[LogLine] {
        &self.logs
    }

    pub fn clear_rows(&mut self) {
        self.rows.clear();
    }

    pub fn into_output(self) -> WorkerOutput {
        WorkerOutput {
            rows: self.rows,
            logs: self.logs,
        }
    }
}

/// Last `n` characters of `s` (whole string when shorter).
pub fn url_suffix(s: &str, n: usize) -> &str {
    let count = s.chars().count();
    if count <= n {
        return s;
    }
    let skip = count - n;
    let start = s.char_indices().nth(skip).map(|(i, _)| i).unwrap_or(0);
    &s[start..]
}
