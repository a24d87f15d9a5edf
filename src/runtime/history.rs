//! Persisted chat history over the REST API

use super::error::HistoryError;
use super::traits::HistorySource;
use crate::config::SessionConfig;
use crate::transcript::PersistedMessage;
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::header::{ACCEPT, COOKIE};
use reqwest::Client;
use serde_json::Value;

/// Fetches `GET /api/chat-messages/{date}/`
#[derive(Debug, Clone)]
pub struct HttpHistorySource {
    client: Client,
    api_url: String,
    cookie: Option<String>,
}

impl HttpHistorySource {
    pub fn new(config: &SessionConfig) -> Result<Self, HistoryError> {
        let client = Client::builder().timeout(config.http_timeout).build()?;
        Ok(Self {
            client,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            cookie: config.session_cookie.clone(),
        })
    }

    fn url_for(&self, date: NaiveDate) -> String {
        format!("{}/api/chat-messages/{}/", self.api_url, date.format("%Y-%m-%d"))
    }
}

#[async_trait]
impl HistorySource for HttpHistorySource {
    async fn messages_for_date(
        &self,
        date: NaiveDate,
    ) -> Result<Vec<PersistedMessage>, HistoryError> {
        let url = self.url_for(date);
        let mut request = self.client.get(&url).header(ACCEPT, "application/json");
        if let Some(cookie) = &self.cookie {
            request = request.header(COOKIE, cookie);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            // Error bodies carry a human readable `detail` when the API has one
            let body: Value = response.json().await.unwrap_or(Value::Null);
            let detail = body
                .get("detail")
                .and_then(Value::as_str)
                .map_or_else(
                    || format!("Request failed with status {}", status.as_u16()),
                    str::to_owned,
                );
            tracing::warn!(url = %url, status = status.as_u16(), detail = %detail, "History request rejected");
            return Err(HistoryError::Status {
                status: status.as_u16(),
                detail,
            });
        }

        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| HistoryError::Decode(e.to_string()))
    }
}
