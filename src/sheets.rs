//! Google Sheets values API, used as a plain row store: fetch a range, append
//! or overwrite a grid. Token acquisition happens elsewhere.

use async_trait::async_trait;
use reqwest::{Client, Method, Url};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use crate::error::SheetsError;
use crate::models::Record;

pub const DEFAULT_SHEETS_BASE: &str = "https://sheets.googleapis.com/v4/spreadsheets";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetTarget {
    pub spreadsheet_id: String,
    pub sheet_name: String,
    pub start_row: u32,
}

impl SheetTarget {
    /// Pulls the spreadsheet id out of a `.../d/<id>/...` sheet URL.
    pub fn from_url(url: &str, sheet_name: &str, start_row: u32) -> Result<Self, SheetsError> {
        let id: String = url
            .split_once("/d/")
            .map(|(_, rest)| {
                rest.chars()
                    .take_while(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
                    .collect()
            })
            .unwrap_or_default();
        if id.is_empty() {
            return Err(SheetsError::InvalidUrl(url.to_string()));
        }

        Ok(Self {
            spreadsheet_id: id,
            sheet_name: sheet_name.trim().to_string(),
            start_row: start_row.max(1),
        })
    }

    pub fn quoted_sheet(&self) -> String {
        if self.sheet_name.contains(' ') {
            format!("'{}'", self.sheet_name)
        } else {
            self.sheet_name.clone()
        }
    }

    pub fn data_range(&self) -> String {
        format!("{}!A{}:ZZ", self.quoted_sheet(), self.start_row)
    }

    pub fn probe_range(&self) -> String {
        format!("{}!A1:A1", self.quoted_sheet())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum WriteMode {
    Append,
    Update,
}

/// Shapes JSON into a row grid: objects become their values in field order,
/// nested arrays pass through, a flat array becomes one row.
pub fn value_grid(json: &Value) -> Result<Vec<Vec<Value>>, SheetsError> {
    let Value::Array(items) = json else {
        return Err(SheetsError::InvalidGrid);
    };

    match items.first() {
        None => Ok(Vec::new()),
        Some(Value::Object(_)) => Ok(items
            .iter()
            .map(|item| match item {
                Value::Object(record) => record.values().cloned().collect(),
                other => vec![other.clone()],
            })
            .collect()),
        Some(Value::Array(_)) => Ok(items
            .iter()
            .map(|item| match item {
                Value::Array(row) => row.clone(),
                other => vec![other.clone()],
            })
            .collect()),
        Some(_) => Ok(vec![items.clone()]),
    }
}

/// First row is the header; shorter rows leave trailing fields out.
pub fn rows_to_records(rows: &[Vec<Value>]) -> Vec<Record> {
    let Some((header, body)) = rows.split_first() else {
        return Vec::new();
    };
    let names: Vec<String> = header
        .iter()
        .map(|cell| match cell {
            Value::String(name) => name.clone(),
            other => other.to_string(),
        })
        .collect();

    body.iter()
        .map(|row| {
            names
                .iter()
                .cloned()
                .zip(row.iter().cloned())
                .collect::<Record>()
        })
        .collect()
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

/// Rows of a values response. A range with no data omits `values`.
fn parse_values(body: &str) -> Result<Vec<Vec<Value>>, SheetsError> {
    let parsed: ValueRange = serde_json::from_str(body).map_err(SheetsError::InvalidResponse)?;
    Ok(parsed.values)
}

#[derive(Debug, Serialize)]
struct WriteBody<'a> {
    values: &'a [Vec<Value>],
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: Option<ErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: Option<String>,
}

#[async_trait]
pub trait TabularStore: Send + Sync {
    async fn probe(&self, target: &SheetTarget) -> Result<(), SheetsError>;
    async fn fetch_rows(&self, target: &SheetTarget) -> Result<Vec<Vec<Value>>, SheetsError>;
    async fn write_rows(
        &self,
        target: &SheetTarget,
        mode: WriteMode,
        rows: &[Vec<Value>],
    ) -> Result<(), SheetsError>;
}

pub struct SheetsClient {
    client: Client,
    access_token: String,
    base_url: String,
}

impl SheetsClient {
    pub fn new(access_token: String, base_url: Option<String>) -> Self {
        Self {
            client: Client::new(),
            access_token,
            base_url: base_url.unwrap_or_else(|| DEFAULT_SHEETS_BASE.to_string()),
        }
    }

    /// Values URL with the range as one percent-encoded path segment.
    fn values_url(&self, target: &SheetTarget, range: &str) -> Result<Url, SheetsError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|_| SheetsError::InvalidUrl(self.base_url.clone()))?;
        url.path_segments_mut()
            .map_err(|_| SheetsError::InvalidUrl(self.base_url.clone()))?
            .pop_if_empty()
            .extend([target.spreadsheet_id.as_str(), "values", range]);
        Ok(url)
    }

    async fn send(
        &self,
        method: Method,
        url: Url,
        body: Option<&[Vec<Value>]>,
    ) -> Result<String, SheetsError> {
        let mut request = self
            .client
            .request(method, url)
            .bearer_auth(&self.access_token);
        if let Some(values) = body {
            request = request
                .query(&[("valueInputOption", "USER_ENTERED")])
                .json(&WriteBody { values });
        }

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            let message = serde_json::from_str::<ErrorBody>(&text)
                .ok()
                .and_then(|body| body.error)
                .and_then(|detail| detail.message)
                .unwrap_or_else(|| status.canonical_reason().unwrap_or("").to_string());
            return Err(SheetsError::Api {
                status: status.as_u16(),
                message,
            });
        }
        Ok(text)
    }
}

#[async_trait]
impl TabularStore for SheetsClient {
    async fn probe(&self, target: &SheetTarget) -> Result<(), SheetsError> {
        let url = self.values_url(target, &target.probe_range())?;
        self.send(Method::GET, url, None).await?;
        info!(range = %target.probe_range(), "sheet is accessible");
        Ok(())
    }

    async fn fetch_rows(&self, target: &SheetTarget) -> Result<Vec<Vec<Value>>, SheetsError> {
        let range = target.data_range();
        info!(%range, "fetching rows");
        let url = self.values_url(target, &range)?;
        let body = self.send(Method::GET, url, None).await?;
        let rows = parse_values(&body)?;
        info!(rows = rows.len(), "fetch complete");
        Ok(rows)
    }

    async fn write_rows(
        &self,
        target: &SheetTarget,
        mode: WriteMode,
        rows: &[Vec<Value>],
    ) -> Result<(), SheetsError> {
        let range = target.data_range();
        let (method, url) = match mode {
            WriteMode::Append => (
                Method::POST,
                self.values_url(target, &format!("{range}:append"))?,
            ),
            WriteMode::Update => (Method::PUT, self.values_url(target, &range)?),
        };
        info!(%range, rows = rows.len(), ?mode, "writing rows");
        self.send(method, url, Some(rows)).await?;
        Ok(())
    }
}
