//! Google Sheets v4 REST backend.

use super::{
    column_letter, run_log_cells, RowUpdate, SheetError, SheetStore, COL_PLATFORM,
    COL_PRODUCT_TAG, RUN_LOG_HEADER,
};
use crate::core::config::SheetConfig;
use crate::types::RunSummary;
use async_trait::async_trait;
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info};

const LOG_SHEET_ROWS: u32 = 1000;

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
struct SpreadsheetMeta {
    #[serde(default)]
    sheets: Vec<SheetMeta>,
}

#[derive(Debug, Deserialize)]
struct SheetMeta {
    properties: SheetProperties,
}

#[derive(Debug, Deserialize)]
struct SheetProperties {
    title: String,
}

#[derive(Debug, Clone)]
pub struct GoogleSheetStore {
    client: reqwest::Client,
    api_base: String,
    spreadsheet_id: String,
    worksheet: String,
    log_worksheet: String,
    access_token: String,
}

impl GoogleSheetStore {
    pub fn new(
        client: reqwest::Client,
        api_base: impl Into<String>,
        spreadsheet_id: impl Into<String>,
        worksheet: impl Into<String>,
        log_worksheet: impl Into<String>,
        access_token: impl Into<String>,
    ) -> Self {
        Self {
            client,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            spreadsheet_id: spreadsheet_id.into(),
            worksheet: worksheet.into(),
            log_worksheet: log_worksheet.into(),
            access_token: access_token.into(),
        }
    }

    /// Build from config; fails when the spreadsheet id or token is missing.
    pub fn from_config(client: reqwest::Client, cfg: &SheetConfig) -> Result<Self, SheetError> {
        let id = cfg
            .resolve_spreadsheet_id()
            .ok_or(SheetError::NotConfigured("spreadsheet id"))?;
        let token = cfg
            .resolve_access_token()
            .ok_or(SheetError::NotConfigured("access token"))?;
        Ok(Self::new(
            client,
            cfg.resolve_api_base(),
            id,
            cfg.resolve_worksheet(),
            cfg.resolve_log_worksheet(),
            token,
        ))
    }

    fn values_url(&self, range: &str) -> String {
        format!(
            "{}/spreadsheets/{}/values/{}",
            self.api_base,
            self.spreadsheet_id,
            utf8_percent_encode(range, NON_ALPHANUMERIC)
        )
    }

    /// A1 range covering the four result cells of `row_number`.
    pub fn result_range(&self, row_number: usize) -> String {
        format!(
            "'{}'!{}{}:{}{}",
            self.worksheet,
            column_letter(COL_PRODUCT_TAG),
            row_number,
            column_letter(COL_PLATFORM),
            row_number
        )
    }

    async fn send(&self, req: reqwest::RequestBuilder) -> Result<Value, SheetError> {
        let resp = req.bearer_auth(&self.access_token).send().await?;
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(SheetError::Http {
                status: status.as_u16(),
                body,
            });
        }
        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&body).map_err(|e| SheetError::Decode(e.to_string()))
    }

    async fn sheet_titles(&self) -> Result<Vec<String>, SheetError> {
        let url = format!("{}/spreadsheets/{}", self.api_base, self.spreadsheet_id);
        let req = self
            .client
            .get(url)
            .query(&[("fields", "sheets.properties.title")]);
        let meta: SpreadsheetMeta = serde_json::from_value(self.send(req).await?)
            .map_err(|e| SheetError::Decode(e.to_string()))?;
        Ok(meta
            .sheets
            .into_iter()
            .map(|s| s.properties.title)
            .collect())
    }

    async fn append_values(&self, sheet: &str, row: Vec<Value>) -> Result<(), SheetError> {
        let url = format!("{}:append", self.values_url(&format!("'{}'!A1", sheet)));
        let req = self
            .client
            .post(url)
            .query(&[
                ("valueInputOption", "USER_ENTERED"),
                ("insertDataOption", "INSERT_ROWS"),
            ])
            .json(&json!({ "values": [row] }));
        self.send(req).await.map(|_| ())
    }

    async fn ensure_log_sheet(&self) -> Result<(), SheetError> {
        if self.sheet_titles().await?.contains(&self.log_worksheet) {
            return Ok(());
        }
        info!("creating worksheet '{}'", self.log_worksheet);
        let url = format!(
            "{}/spreadsheets/{}:batchUpdate",
            self.api_base, self.spreadsheet_id
        );
        let body = json!({
            "requests": [{
                "addSheet": {
                    "properties": {
                        "title": self.log_worksheet,
                        "gridProperties": {
                            "rowCount": LOG_SHEET_ROWS,
                            "columnCount": RUN_LOG_HEADER.len()
                        }
                    }
                }
            }]
        });
        self.send(self.client.post(url).json(&body)).await?;
        let header = RUN_LOG_HEADER.iter().map(|h| json!(h)).collect();
        self.append_values(&self.log_worksheet, header).await
    }
}

/// Sheets returns ragged rows of mixed JSON scalars; flatten them to strings.
fn cell_to_string(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[async_trait]
impl SheetStore for GoogleSheetStore {
    async fn fetch_rows(&self) -> Result<Vec<Vec<String>>, SheetError> {
        let req = self
            .client
            .get(self.values_url(&format!("'{}'", self.worksheet)));
        let range: ValueRange = serde_json::from_value(self.send(req).await?)
            .map_err(|e| SheetError::Decode(e.to_string()))?;
        debug!("fetched {} rows from '{}'", range.values.len(), self.worksheet);
        Ok(range
            .values
            .iter()
            .map(|row| row.iter().map(cell_to_string).collect())
            .collect())
    }

    async fn update_row(&self, row_number: usize, update: &RowUpdate) -> Result<(), SheetError> {
        let range = self.result_range(row_number);
        let req = self
            .client
            .put(self.values_url(&range))
            .query(&[("valueInputOption", "RAW")])
            .json(&json!({
                "range": range,
                "majorDimension": "ROWS",
                "values": [update.cells()],
            }));
        self.send(req).await.map(|_| ())
    }

    async fn append_run_log(&self, summary: &RunSummary) -> Result<(), SheetError> {
        self.ensure_log_sheet().await?;
        self.append_values(&self.log_worksheet, run_log_cells(summary))
            .await
    }
}
