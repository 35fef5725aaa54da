use std::fmt;
use std::future::Future;

use log::debug;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::TelegramError;
use crate::models::BotIdentity;

pub const DEFAULT_API_BASE: &str = "https://api.telegram.org";

/// Target chat: a numeric id or a public `@channel` name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChatId {
    Id(i64),
    Username(String),
}

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChatId::Id(id) => write!(f, "{id}"),
            ChatId::Username(name) => f.write_str(name),
        }
    }
}

/// Where rendered messages go.
pub trait Delivery {
    /// Post a message and return its id.
    fn send_message(&self, text: &str, silent: bool) -> impl Future<Output = Result<i64, TelegramError>>;

    fn pin_message(&self, message_id: i64) -> impl Future<Output = Result<(), TelegramError>>;
}

#[derive(Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

#[derive(Deserialize)]
struct SentMessage {
    message_id: i64,
}

/// Bot API client bound to one target chat.
#[derive(Clone)]
pub struct TelegramClient {
    client: Client,
    api_base: String,
    token: String,
    chat_id: ChatId,
}

impl fmt::Debug for TelegramClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TelegramClient")
            .field("api_base", &self.api_base)
            .field("token", &"[REDACTED]")
            .field("chat_id", &self.chat_id)
            .finish()
    }
}

impl TelegramClient {
    pub fn new(client: Client, api_base: &str, token: &str, chat_id: ChatId) -> Self {
        Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            token: token.to_string(),
            chat_id,
        }
    }

    pub async fn get_me(&self) -> Result<BotIdentity, TelegramError> {
        self.call("getMe", &json!({})).await
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &'static str,
        params: &serde_json::Value,
    ) -> Result<T, TelegramError> {
        let url = format!("{}/bot{}/{}", self.api_base, self.token, method);
        let network = |source: reqwest::Error| TelegramError::Network {
            method,
            source: source.without_url(),
        };

        let response = self.client.post(&url).json(params).send().await.map_err(network)?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let description = serde_json::from_str::<ApiResponse<serde_json::Value>>(&body)
                .ok()
                .and_then(|r| r.description)
                .unwrap_or(body);
            return Err(TelegramError::HttpStatus {
                method,
                status: status.as_u16(),
                description,
            });
        }

        let envelope: ApiResponse<T> = response.json().await.map_err(network)?;
        match (envelope.ok, envelope.result) {
            (true, Some(result)) => Ok(result),
            _ => Err(TelegramError::Api {
                method,
                description: envelope
                    .description
                    .unwrap_or_else(|| "no result in response".to_string()),
            }),
        }
    }
}

impl Delivery for TelegramClient {
    async fn send_message(&self, text: &str, silent: bool) -> Result<i64, TelegramError> {
        let mut params = json!({
            "chat_id": self.chat_id,
            "text": text,
            "parse_mode": "HTML",
        });
        if silent {
            params["disable_notification"] = json!(true);
        }
        let sent: SentMessage = self.call("sendMessage", &params).await?;
        debug!("sendMessage -> message_id {}", sent.message_id);
        Ok(sent.message_id)
    }

    async fn pin_message(&self, message_id: i64) -> Result<(), TelegramError> {
        let params = json!({
            "chat_id": self.chat_id,
            "message_id": message_id,
        });
        let _: bool = self.call("pinChatMessage", &params).await?;
        Ok(())
    }
}
