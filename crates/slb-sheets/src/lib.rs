//! Google Sheets adapter.
//!
//! Implements the `slb-core` [`RowStore`] port over the Sheets v4 REST API,
//! authenticated as a service account.

use async_trait::async_trait;
use reqwest::{RequestBuilder, Response, Url};
use serde::Deserialize;
use serde_json::{json, Value};

pub mod auth;

use auth::{ServiceAccountKey, TokenProvider};
use slb_core::{errors::Error, ports::RowStore, Result};

pub const DEFAULT_API_BASE: &str = "https://sheets.googleapis.com";

/// Grid size of a freshly created worksheet.
const NEW_SHEET_ROWS: usize = 1000;

/// How cell values are interpreted on write.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ValueInput {
    /// Stored verbatim.
    Raw,
    /// Parsed as if typed into the UI (dates, numbers, formulas).
    UserEntered,
}

impl ValueInput {
    fn as_param(self) -> &'static str {
        match self {
            ValueInput::Raw => "RAW",
            ValueInput::UserEntered => "USER_ENTERED",
        }
    }
}

/// An authenticated handle to one spreadsheet.
pub struct SheetsClient {
    http: reqwest::Client,
    api_base: Url,
    spreadsheet_id: String,
    tokens: TokenProvider,
}

#[derive(Deserialize)]
struct SpreadsheetMeta {
    #[serde(default)]
    sheets: Vec<SheetMeta>,
}

#[derive(Deserialize)]
struct SheetMeta {
    properties: SheetProperties,
}

#[derive(Deserialize)]
struct SheetProperties {
    title: String,
}

#[derive(Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

impl SheetsClient {
    /// Authenticate and open `spreadsheet_id` on the public Sheets endpoint.
    pub async fn connect(spreadsheet_id: &str, key: ServiceAccountKey) -> Result<Self> {
        Self::connect_with_base(DEFAULT_API_BASE, spreadsheet_id, key).await
    }

    pub async fn connect_with_base(
        api_base: &str,
        spreadsheet_id: &str,
        key: ServiceAccountKey,
    ) -> Result<Self> {
        let api_base = Url::parse(api_base)
            .map_err(|e| Error::Config(format!("invalid sheets api base {api_base}: {e}")))?;
        if api_base.cannot_be_a_base() {
            return Err(Error::Config(format!(
                "invalid sheets api base {api_base}: not a base url"
            )));
        }

        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| Error::External(format!("http client build error: {e}")))?;
        let tokens = TokenProvider::new(key, http.clone())?;

        let client = Self {
            http,
            api_base,
            spreadsheet_id: spreadsheet_id.to_string(),
            tokens,
        };

        // Fail at startup on bad credentials or a wrong id.
        let titles = client.sheet_titles().await?;
        tracing::info!(
            account = %client.tokens.client_email(),
            sheets = titles.len(),
            "opened spreadsheet"
        );
        Ok(client)
    }

    pub fn spreadsheet_id(&self) -> &str {
        &self.spreadsheet_id
    }

    /// Titles of all worksheets, in tab order.
    pub async fn sheet_titles(&self) -> Result<Vec<String>> {
        let url = self.url(&[self.spreadsheet_id.as_str()])?;
        let resp = self
            .send(
                self.http
                    .get(url)
                    .query(&[("fields", "sheets.properties.title")]),
            )
            .await?;
        let meta: SpreadsheetMeta = json_body(resp).await?;
        Ok(meta.sheets.into_iter().map(|s| s.properties.title).collect())
    }

    pub async fn add_sheet(&self, title: &str, rows: usize, cols: usize) -> Result<()> {
        let batch = format!("{}:batchUpdate", self.spreadsheet_id);
        let url = self.url(&[batch.as_str()])?;
        let body = json!({
            "requests": [{
                "addSheet": {
                    "properties": {
                        "title": title,
                        "gridProperties": { "rowCount": rows, "columnCount": cols }
                    }
                }
            }]
        });
        self.send(self.http.post(url).json(&body)).await?;
        tracing::info!(sheet = title, "created worksheet");
        Ok(())
    }

    /// Cell values of an A1 range; trailing empty cells are omitted by the API.
    pub async fn read_values(&self, range: &str) -> Result<Vec<Vec<String>>> {
        let url = self.url(&[self.spreadsheet_id.as_str(), "values", range])?;
        let resp = self.send(self.http.get(url)).await?;
        let vr: ValueRange = json_body(resp).await?;
        Ok(vr
            .values
            .into_iter()
            .map(|row| row.into_iter().map(cell_to_string).collect())
            .collect())
    }

    /// Overwrite the cells starting at `range`.
    pub async fn update_values(
        &self,
        range: &str,
        rows: &[Vec<String>],
        input: ValueInput,
    ) -> Result<()> {
        let url = self.url(&[self.spreadsheet_id.as_str(), "values", range])?;
        let req = self
            .http
            .put(url)
            .query(&[("valueInputOption", input.as_param())])
            .json(&json!({ "range": range, "majorDimension": "ROWS", "values": rows }));
        self.send(req).await?;
        Ok(())
    }

    /// Append rows after the table found in `range`.
    pub async fn append_values(
        &self,
        range: &str,
        rows: &[Vec<String>],
        input: ValueInput,
    ) -> Result<()> {
        let target = format!("{range}:append");
        let url = self.url(&[self.spreadsheet_id.as_str(), "values", target.as_str()])?;
        let req = self
            .http
            .post(url)
            .query(&[("valueInputOption", input.as_param())])
            .json(&json!({ "majorDimension": "ROWS", "values": rows }));
        self.send(req).await?;
        Ok(())
    }

    fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.api_base.clone();
        url.path_segments_mut()
            .map_err(|_| Error::Config("sheets api base is not a base url".to_string()))?
            .pop_if_empty()
            .extend(["v4", "spreadsheets"])
            .extend(segments);
        Ok(url)
    }

    async fn send(&self, req: RequestBuilder) -> Result<Response> {
        let token = self.tokens.access_token().await?;
        let resp = req
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| Error::Store(format!("sheets request error: {e}")))?;

        if resp.status().is_success() {
            return Ok(resp);
        }

        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        let detail = serde_json::from_str::<Value>(&body)
            .ok()
            .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
            .unwrap_or(body);
        Err(Error::Store(format!(
            "sheets api {status}: {}",
            detail.chars().take(200).collect::<String>()
        )))
    }
}

#[async_trait]
impl RowStore for SheetsClient {
    async fn ensure_worksheet(&self, name: &str, headers: &[&str]) -> Result<()> {
        let expected: Vec<String> = headers.iter().map(|h| h.to_string()).collect();
        let range = sheet_range(name);

        let titles = self.sheet_titles().await?;
        if !titles.iter().any(|t| t == name) {
            self.add_sheet(name, NEW_SHEET_ROWS, headers.len()).await?;
            self.append_values(&range, &[expected], ValueInput::Raw)
                .await?;
            return Ok(());
        }

        let first = self
            .read_values(&format!("{range}!1:1"))
            .await?
            .into_iter()
            .next()
            .unwrap_or_default();
        if first != expected {
            tracing::warn!(sheet = name, found = ?first, "header row mismatch; rewriting");
            self.update_values(&format!("{range}!A1"), &[expected], ValueInput::Raw)
                .await?;
        }
        Ok(())
    }

    async fn append_row(&self, name: &str, values: &[String]) -> Result<()> {
        self.append_values(&sheet_range(name), &[values.to_vec()], ValueInput::UserEntered)
            .await
    }

    async fn get_rows(&self, name: &str, limit: Option<usize>) -> Result<Vec<Vec<String>>> {
        let mut rows = pad_rows(self.read_values(&sheet_range(name)).await?);
        if let Some(limit) = limit {
            rows.truncate(limit);
        }
        Ok(rows)
    }
}

/// A1 reference to a whole sheet: `'name'`, with embedded quotes doubled.
pub fn sheet_range(name: &str) -> String {
    format!("'{}'", name.replace('\'', "''"))
}

/// Pad ragged rows with empty cells to the widest row.
fn pad_rows(mut rows: Vec<Vec<String>>) -> Vec<Vec<String>> {
    let width = rows.iter().map(Vec::len).max().unwrap_or(0);
    for row in &mut rows {
        row.resize(width, String::new());
    }
    rows
}

fn cell_to_string(v: Value) -> String {
    match v {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

async fn json_body<T: serde::de::DeserializeOwned>(resp: Response) -> Result<T> {
    resp.json()
        .await
        .map_err(|e| Error::Store(format!("sheets json error: {e}")))
}
