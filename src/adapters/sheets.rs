use crate::domain::model::RawGrid;
use crate::domain::ports::TabularProvider;
use crate::utils::error::ProviderError;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use url::Url;

pub const DEFAULT_SHEETS_BASE_URL: &str = "https://sheets.googleapis.com";

#[derive(Debug, Clone)]
pub struct SheetsSettings {
    pub base_url: String,
    pub api_key: Option<String>,
    pub bearer_token: Option<String>,
    pub timeout: Duration,
}

impl Default for SheetsSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_SHEETS_BASE_URL.to_string(),
            api_key: None,
            bearer_token: None,
            timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<serde_json::Value>>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

/// Reads cell values through the Google Sheets v4 `values.get` endpoint.
pub struct GoogleSheetsProvider {
    settings: SheetsSettings,
    client: Client,
}

impl GoogleSheetsProvider {
    pub fn new(settings: SheetsSettings) -> Result<Self, ProviderError> {
        let client = Client::builder().timeout(settings.timeout).build()?;
        Ok(Self { settings, client })
    }

    fn values_url(&self, spreadsheet_id: &str, range: &str) -> Result<Url, ProviderError> {
        let mut url = Url::parse(&self.settings.base_url).map_err(|e| ProviderError::Decode {
            message: format!("invalid base URL '{}': {}", self.settings.base_url, e),
        })?;
        url.path_segments_mut()
            .map_err(|_| ProviderError::Decode {
                message: format!("base URL '{}' cannot have a path", self.settings.base_url),
            })?
            .pop_if_empty()
            .extend(["v4", "spreadsheets", spreadsheet_id, "values", range]);

        {
            let mut query = url.query_pairs_mut();
            query.append_pair("majorDimension", "ROWS");
            if let Some(key) = &self.settings.api_key {
                query.append_pair("key", key);
            }
        }
        Ok(url)
    }
}

fn cell_to_string(value: serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s,
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[async_trait]
impl TabularProvider for GoogleSheetsProvider {
    async fn get_grid(&self, spreadsheet_id: &str, range: &str) -> Result<RawGrid, ProviderError> {
        let url = self.values_url(spreadsheet_id, range)?;
        tracing::debug!("Making Sheets request to: {}", url.path());

        let mut request = self.client.get(url);
        if let Some(token) = &self.settings.bearer_token {
            request = request.bearer_auth(token);
        }
        let response = request.send().await?;
        let status = response.status();
        tracing::debug!("Sheets response status: {}", status);

        if status == StatusCode::NOT_FOUND {
            return Err(ProviderError::NotFound {
                spreadsheet_id: spreadsheet_id.to_string(),
            });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorEnvelope>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(ProviderError::Status {
                status: status.as_u16(),
                message,
            });
        }

        let body: ValueRange = response.json().await.map_err(|e| ProviderError::Decode {
            message: e.to_string(),
        })?;
        Ok(body
            .values
            .into_iter()
            .map(|row| row.into_iter().map(cell_to_string).collect())
            .collect())
    }
}
