// src/alerts/telegram.rs

use super::{AlertSink, format::render_html};
use crate::pipeline::PoolAlertRecord;
use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;

const TELEGRAM_API_URL: &str = "https://api.telegram.org";
const BUTTON_LABEL: &str = "New Mint";

#[derive(Debug, Serialize)]
struct InlineButton<'a> {
    text: &'a str,
    url: &'a str,
}

#[derive(Debug, Serialize)]
struct ReplyMarkup<'a> {
    inline_keyboard: Vec<Vec<InlineButton<'a>>>,
}

#[derive(Debug, Serialize)]
pub struct SendMessageRequest<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'static str,
    disable_web_page_preview: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_markup: Option<ReplyMarkup<'a>>,
}

impl<'a> SendMessageRequest<'a> {
    pub fn html(chat_id: &'a str, text: &'a str, button_url: Option<&'a str>) -> Self {
        Self {
            chat_id,
            text,
            parse_mode: "HTML",
            disable_web_page_preview: true,
            reply_markup: button_url.map(|url| ReplyMarkup {
                inline_keyboard: vec![vec![InlineButton { text: BUTTON_LABEL, url }]],
            }),
        }
    }
}

/// `sendMessage` de l'API Bot Telegram vers un canal.
pub struct TelegramSink {
    http: reqwest::Client,
    endpoint: String,
    channel_id: String,
    button_url: Option<String>,
}

impl TelegramSink {
    pub fn new(bot_token: &str, channel_id: String, button_url: Option<String>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Construction du client HTTP Telegram")?;
        Ok(Self {
            http,
            endpoint: format!("{TELEGRAM_API_URL}/bot{bot_token}/sendMessage"),
            channel_id,
            button_url,
        })
    }
}

#[async_trait]
impl AlertSink for TelegramSink {
    async fn deliver(&self, record: &PoolAlertRecord) -> Result<()> {
        let text = render_html(record);
        let request = SendMessageRequest::html(&self.channel_id, &text, self.button_url.as_deref());

        let response = self
            .http
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            // L'URL contient le token du bot : on ne la laisse pas fuiter dans les logs.
            .map_err(|e| anyhow!("Appel Telegram impossible : {}", e.without_url()))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_body = response.text().await.unwrap_or_default();
            return Err(anyhow!("Erreur API Telegram: {} - {}", status, error_body));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_with_button() {
        let request = SendMessageRequest::html("@pools", "<b>hi</b>", Some("https://t.me/newlymint"));
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({
                "chat_id": "@pools",
                "text": "<b>hi</b>",
                "parse_mode": "HTML",
                "disable_web_page_preview": true,
                "reply_markup": { "inline_keyboard": [[{ "text": "New Mint", "url": "https://t.me/newlymint" }]] }
            })
        );
    }

    #[test]
    fn request_without_button_omits_markup() {
        let value = serde_json::to_value(SendMessageRequest::html("-100123", "x", None)).unwrap();
        assert!(value.get("reply_markup").is_none());
    }
}
