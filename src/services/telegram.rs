//! Telegram delivery gateway
//!
//! The router only depends on the `Messenger` trait so notification logic
//! stays testable with a recording fake; `TelegramMessenger` is the thin
//! Bot-API implementation.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use tracing::warn;

/// Per-message delivery options
#[derive(Debug, Clone, Copy, Default)]
pub struct SendOptions {
    /// Deliver without a notification sound
    pub silent: bool,
    /// Render link previews in text messages
    pub show_preview: bool,
}

/// Outbound messaging gateway
#[async_trait]
pub trait Messenger: Send + Sync {
    async fn send_text(&self, chat_id: &str, text: &str, options: SendOptions) -> Result<()>;

    /// Send an image with an HTML caption. Implementations fall back to
    /// `send_text` when image delivery fails.
    async fn send_photo(
        &self,
        chat_id: &str,
        photo_url: &str,
        caption: &str,
        options: SendOptions,
    ) -> Result<()>;
}

/// Telegram Bot API client
pub struct TelegramMessenger {
    client: Client,
    api_base: String,
}

impl TelegramMessenger {
    pub fn new(bot_token: &str) -> Self {
        Self {
            client: Client::new(),
            api_base: format!("https://api.telegram.org/bot{bot_token}"),
        }
    }

    async fn call(&self, method: &str, payload: serde_json::Value) -> Result<()> {
        let url = format!("{}/{method}", self.api_base);

        let response = self
            .client
            .post(&url)
            .json(&payload)
            .send()
            .await
            .with_context(|| format!("Failed to call Telegram {method}"))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Telegram {method} failed with status {status}: {body}");
        }

        Ok(())
    }
}

#[async_trait]
impl Messenger for TelegramMessenger {
    async fn send_text(&self, chat_id: &str, text: &str, options: SendOptions) -> Result<()> {
        self.call(
            "sendMessage",
            json!({
                "chat_id": chat_id,
                "text": text,
                "parse_mode": "HTML",
                "disable_notification": options.silent,
                "disable_web_page_preview": !options.show_preview,
            }),
        )
        .await
    }

    async fn send_photo(
        &self,
        chat_id: &str,
        photo_url: &str,
        caption: &str,
        options: SendOptions,
    ) -> Result<()> {
        let result = self
            .call(
                "sendPhoto",
                json!({
                    "chat_id": chat_id,
                    "photo": photo_url,
                    "caption": caption,
                    "parse_mode": "HTML",
                    "disable_notification": options.silent,
                }),
            )
            .await;

        if let Err(e) = result {
            warn!(chat = chat_id, error = %e, "Photo delivery failed, falling back to text");
            return self.send_text(chat_id, caption, options).await;
        }

        Ok(())
    }
}
