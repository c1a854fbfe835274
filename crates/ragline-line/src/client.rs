// LINE Messaging API client
//
// Decision: one client implements the whole MessagingClient trait; reply is
// the only operation the orchestrator uses, typing indicator and profile
// lookup are gateway-side.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use ragline_core::{MessagingClient, RelayError, Result};

const LOADING_SECONDS: u32 = 60;

/// Environment configuration for the LINE channel
#[derive(Clone)]
pub struct LineConfig {
    pub channel_access_token: String,
    pub channel_secret: String,
    pub api_base: String,
}

impl LineConfig {
    pub fn from_env() -> Result<Self> {
        let channel_access_token = std::env::var("LINE_CHANNEL_ACCESS_TOKEN")
            .map_err(|_| RelayError::config("LINE_CHANNEL_ACCESS_TOKEN is required"))?;
        let channel_secret = std::env::var("LINE_CHANNEL_SECRET")
            .map_err(|_| RelayError::config("LINE_CHANNEL_SECRET is required"))?;
        let api_base = std::env::var("LINE_API_BASE")
            .unwrap_or_else(|_| "https://api.line.me".to_string());

        Ok(Self {
            channel_access_token,
            channel_secret,
            api_base,
        })
    }
}

impl std::fmt::Debug for LineConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LineConfig")
            .field("channel_access_token", &"[REDACTED]")
            .field("channel_secret", &"[REDACTED]")
            .field("api_base", &self.api_base)
            .finish()
    }
}

#[derive(Serialize)]
struct ReplyRequest<'a> {
    #[serde(rename = "replyToken")]
    reply_token: &'a str,
    messages: Vec<TextMessage<'a>>,
}

#[derive(Serialize)]
struct TextMessage<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    text: &'a str,
}

#[derive(Serialize)]
struct LoadingRequest<'a> {
    #[serde(rename = "chatId")]
    chat_id: &'a str,
    #[serde(rename = "loadingSeconds")]
    loading_seconds: u32,
}

#[derive(Deserialize)]
struct ProfileResponse {
    #[serde(rename = "displayName")]
    display_name: String,
}

/// Client for the LINE Messaging API, authenticated with the channel access
/// token.
#[derive(Clone)]
pub struct LineMessagingClient {
    http: Client,
    api_base: String,
    channel_access_token: String,
}

impl LineMessagingClient {
    pub fn new(config: &LineConfig) -> Self {
        Self {
            http: Client::new(),
            api_base: config.api_base.trim_end_matches('/').to_string(),
            channel_access_token: config.channel_access_token.clone(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_base, path)
    }

    async fn post_json<T: Serialize>(&self, path: &str, body: &T, concern: &str) -> Result<()> {
        let response = self
            .http
            .post(self.url(path))
            .bearer_auth(&self.channel_access_token)
            .json(body)
            .send()
            .await
            .map_err(|e| RelayError::transient(format!("{concern} request failed: {e}")))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let detail = response.text().await.unwrap_or_default();
        if status.as_u16() == 429 || status.is_server_error() {
            Err(RelayError::transient(format!(
                "{concern} returned {status}: {detail}"
            )))
        } else {
            Err(RelayError::delivery(format!(
                "{concern} returned {status}: {detail}"
            )))
        }
    }
}

impl std::fmt::Debug for LineMessagingClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LineMessagingClient")
            .field("api_base", &self.api_base)
            .field("channel_access_token", &"[REDACTED]")
            .finish()
    }
}

#[async_trait]
impl MessagingClient for LineMessagingClient {
    async fn reply(&self, reply_handle: &str, text: &str) -> Result<()> {
        let request = ReplyRequest {
            reply_token: reply_handle,
            messages: vec![TextMessage { kind: "text", text }],
        };
        self.post_json("/v2/bot/message/reply", &request, "reply")
            .await
    }

    async fn show_typing(&self, source_id: &str) -> Result<()> {
        let request = LoadingRequest {
            chat_id: source_id,
            loading_seconds: LOADING_SECONDS,
        };
        self.post_json("/v2/bot/chat/loading/start", &request, "loading indicator")
            .await
    }

    async fn display_name(&self, user_id: &str) -> Result<String> {
        let response = self
            .http
            .get(self.url(&format!("/v2/bot/profile/{user_id}")))
            .bearer_auth(&self.channel_access_token)
            .send()
            .await
            .map_err(|e| RelayError::transient(format!("profile request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(RelayError::transient(format!(
                "profile returned {status}: {detail}"
            )));
        }

        let profile: ProfileResponse = response
            .json()
            .await
            .map_err(|e| RelayError::transient(format!("profile body invalid: {e}")))?;

        Ok(profile.display_name)
    }
}
