// =============================================================================
// Telegram Notifier — Bot API sendMessage
// =============================================================================
//
// SECURITY: The bot token is part of the request path and is never logged or
// included in error messages.
// =============================================================================

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::json;
use tracing::{debug, instrument};

use super::{MessageTemplate, Notifier};
use crate::error::ScanError;
use crate::signals::Signal;

const TELEGRAM_API: &str = "https://api.telegram.org";

/// Posts signals to a single Telegram chat or channel.
#[derive(Clone)]
pub struct TelegramNotifier {
    token: String,
    chat_id: String,
    base_url: String,
    template: MessageTemplate,
    client: reqwest::Client,
}

impl TelegramNotifier {
    /// Create a notifier for `chat_id` using bot `token`.
    ///
    /// `timeout` bounds every `sendMessage` call.
    pub fn new(
        token: impl Into<String>,
        chat_id: impl Into<String>,
        template: MessageTemplate,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build reqwest client for TelegramNotifier")?;

        Ok(Self {
            token: token.into(),
            chat_id: chat_id.into(),
            base_url: TELEGRAM_API.to_string(),
            template,
            client,
        })
    }

    /// Point the notifier at a different Bot API host.
    #[cfg(test)]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// POST /bot<token>/sendMessage
    #[instrument(skip(self, text), name = "telegram::send_message")]
    async fn send_message(&self, symbol: &str, text: &str) -> Result<(), ScanError> {
        let url = format!("{}/bot{}/sendMessage", self.base_url, self.token);
        let payload = json!({
            "chat_id": self.chat_id,
            "text": text,
            "parse_mode": "Markdown",
        });

        let resp = self
            .client
            .post(&url)
            .json(&payload)
            .send()
            .await
            // without_url keeps the token out of the error text
            .map_err(|e| ScanError::delivery(symbol, e.without_url()))?;

        let status = resp.status();
        let body: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| {
                ScanError::delivery(symbol, format!("unreadable response: {}", e.without_url()))
            })?;

        if !status.is_success() || body["ok"].as_bool() != Some(true) {
            let description = body["description"].as_str().unwrap_or("no description");
            return Err(ScanError::delivery(
                symbol,
                format!("Telegram returned {status}: {description}"),
            ));
        }

        debug!(symbol, "telegram message accepted");
        Ok(())
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn deliver(&self, signal: &Signal) -> Result<(), ScanError> {
        let text = self.template.render(signal);
        self.send_message(&signal.instrument, &text).await
    }
}

impl std::fmt::Debug for TelegramNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramNotifier")
            .field("token", &"<redacted>")
            .field("chat_id", &self.chat_id)
            .field("base_url", &self.base_url)
            .finish()
    }
}
