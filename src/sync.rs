//! Client for the sync API (bearer-token HTTP+JSON).
//!
//! Two operations are consumed: upsert chat metadata as one batch, and
//! upsert messages for a chat in batches of 500. Responses carry
//! created/updated/skipped counts which are summed across batches.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::config::SyncCredentials;
use crate::error::{Error, Result};

const MESSAGE_BATCH_SIZE: usize = 500;

/// Chat metadata as the sync API expects it.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatUpsert {
    pub telegram_id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub chat_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub member_count: Option<i32>,
}

/// Upsert counts returned by the API.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SyncCounts {
    #[serde(default)]
    pub created: u64,
    #[serde(default)]
    pub updated: u64,
    #[serde(default)]
    pub skipped: u64,
}

/// Chat entry from the API's chat listing.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiChat {
    pub telegram_id: String,
    #[serde(default = "default_true")]
    pub sync_enabled: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone)]
pub struct SyncClient {
    http: Client,
    api_base: String,
    token: String,
}

impl SyncClient {
    pub fn new(creds: &SyncCredentials) -> Result<Self> {
        let http = Client::builder()
            .user_agent(format!("telegram_agent/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::SyncError(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            api_base: creds.api_base.trim_end_matches('/').to_string(),
            token: creds.token.clone(),
        })
    }

    /// Push chat metadata in one batch.
    pub async fn sync_chats(&self, chats: &[ChatUpsert]) -> Result<SyncCounts> {
        self.post("/telegram/chats", &json!({ "chats": chats }))
            .await
    }

    /// Push messages for one chat, batched at 500 per request; counts are
    /// summed across batches and the first error aborts.
    pub async fn sync_messages(
        &self,
        chat_telegram_id: &str,
        messages: &[Value],
    ) -> Result<SyncCounts> {
        let mut totals = SyncCounts::default();

        for batch in messages.chunks(MESSAGE_BATCH_SIZE) {
            let counts: SyncCounts = self
                .post(
                    "/telegram/messages",
                    &json!({
                        "chatTelegramId": chat_telegram_id,
                        "messages": batch,
                    }),
                )
                .await?;

            totals.created += counts.created;
            totals.updated += counts.updated;
            totals.skipped += counts.skipped;
        }

        Ok(totals)
    }

    /// Chats the API wants synced.
    pub async fn enabled_chats(&self) -> Result<Vec<ApiChat>> {
        let url = format!("{}/api/mcp/telegram/chats?limit=200", self.api_base);
        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| Error::SyncError(format!("Connection failed: {}", e)))?;

        let body: Value = Self::parse_response(response).await?;
        let chats = body
            .get("chats")
            .cloned()
            .unwrap_or_else(|| json!([]));
        serde_json::from_value(chats).map_err(Error::from)
    }

    async fn post<D: for<'de> Deserialize<'de>>(
        &self,
        endpoint: &str,
        body: &Value,
    ) -> Result<D> {
        let url = format!("{}/api/mcp{}", self.api_base, endpoint);
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.token)
            .json(body)
            .send()
            .await
            .map_err(|e| Error::SyncError(format!("Connection failed: {}", e)))?;

        let value = Self::parse_response(response).await?;
        serde_json::from_value(value).map_err(Error::from)
    }

    async fn parse_response(response: reqwest::Response) -> Result<Value> {
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| Error::SyncError(format!("Failed to read response: {}", e)))?;

        if !status.is_success() {
            let message = serde_json::from_str::<Value>(&text)
                .ok()
                .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(str::to_string))
                .unwrap_or_else(|| format!("HTTP {}: {}", status.as_u16(), truncate(&text, 200)));
            return Err(Error::SyncError(message));
        }

        serde_json::from_str(&text)
            .map_err(|_| Error::SyncError(format!("Invalid JSON response: {}", truncate(&text, 200))))
    }
}

fn truncate(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((index, _)) => &text[..index],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    fn client(base: &str) -> SyncClient {
        SyncClient::new(&SyncCredentials {
            api_base: base.to_string(),
            token: "test-token".to_string(),
        })
        .unwrap()
    }

    fn message(id: i32) -> Value {
        json!({ "telegramMessageId": id.to_string(), "text": "hi" })
    }

    #[tokio::test]
    async fn sync_chats_posts_batch_with_bearer_auth() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/api/mcp/telegram/chats")
                .header("authorization", "Bearer test-token");
            then.status(200)
                .json_body(json!({ "created": 2, "updated": 1, "skipped": 0 }));
        });

        let counts = client(&server.base_url())
            .sync_chats(&[ChatUpsert {
                telegram_id: "123".to_string(),
                name: "Deals".to_string(),
                chat_type: "supergroup".to_string(),
                username: None,
                member_count: Some(10),
            }])
            .await
            .unwrap();

        mock.assert();
        assert_eq!(counts.created, 2);
        assert_eq!(counts.updated, 1);
    }

    #[tokio::test]
    async fn sync_messages_batches_at_500_and_sums_counts() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST).path("/api/mcp/telegram/messages");
            then.status(200)
                .json_body(json!({ "created": 100, "updated": 0, "skipped": 0 }));
        });

        let messages: Vec<Value> = (0..1200).map(message).collect();
        let counts = client(&server.base_url())
            .sync_messages("123", &messages)
            .await
            .unwrap();

        // 1200 messages → three requests of ≤500.
        mock.assert_hits(3);
        assert_eq!(counts.created, 300);
    }

    #[tokio::test]
    async fn api_error_body_is_surfaced() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/api/mcp/telegram/chats");
            then.status(401)
                .json_body(json!({ "error": "Invalid token" }));
        });

        let err = client(&server.base_url())
            .sync_chats(&[])
            .await
            .unwrap_err();

        assert_eq!(err.code(), "SYNC_ERROR");
        assert!(err.to_string().contains("Invalid token"));
    }

    #[tokio::test]
    async fn enabled_chats_parses_listing() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET)
                .path("/api/mcp/telegram/chats")
                .query_param("limit", "200");
            then.status(200).json_body(json!({
                "chats": [
                    { "telegramId": "111", "syncEnabled": true },
                    { "telegramId": "222", "syncEnabled": false },
                    { "telegramId": "333" },
                ]
            }));
        });

        let chats = client(&server.base_url()).enabled_chats().await.unwrap();
        assert_eq!(chats.len(), 3);
        assert!(chats[0].sync_enabled);
        assert!(!chats[1].sync_enabled);
        // syncEnabled defaults to true when omitted.
        assert!(chats[2].sync_enabled);
    }

    #[tokio::test]
    async fn connection_failure_is_sync_error() {
        let err = client("http://127.0.0.1:1")
            .sync_chats(&[])
            .await
            .unwrap_err();
        assert_eq!(err.code(), "SYNC_ERROR");
    }
}
