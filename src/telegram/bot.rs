use crate::config::TelegramConfig;
use crate::http::build_client;
use crate::publisher::{MessageSink, PublishError};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const SEND_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Serialize)]
struct SendMessageBody<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'static str,
}

#[derive(Deserialize)]
struct BotApiResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

/// Posts to the destination chat through the Bot API.
#[derive(Debug, Clone)]
pub struct BotClient {
    endpoint: String,
    chat_id: String,
    http: Client,
}

impl BotClient {
    pub fn new(config: &TelegramConfig, user_agent: &str) -> Self {
        Self {
            endpoint: format!("{}/bot{}/sendMessage", config.bot_api_url, config.bot_token),
            chat_id: config.chat_id.clone(),
            http: build_client(SEND_TIMEOUT, user_agent),
        }
    }
}

#[async_trait]
impl MessageSink for BotClient {
    async fn send_html(&self, text: &str) -> Result<(), PublishError> {
        let body = SendMessageBody {
            chat_id: &self.chat_id,
            text,
            parse_mode: "HTML",
        };
        let response = self
            .http
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            // The endpoint embeds the bot token; keep it out of logs.
            .map_err(|err| PublishError::Send(err.without_url().to_string()))?;

        let status = response.status();
        let payload: Option<BotApiResponse> = response.json().await.ok();
        match payload {
            Some(BotApiResponse { ok: true, .. }) if status.is_success() => Ok(()),
            Some(BotApiResponse { description, .. }) => Err(PublishError::Rejected(
                description.unwrap_or_else(|| format!("HTTP {status}")),
            )),
            None => Err(PublishError::Rejected(format!("HTTP {status}"))),
        }
    }
}
