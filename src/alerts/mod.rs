// src/alerts/mod.rs

use crate::pipeline::PoolAlertRecord;
use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::info;

pub mod format;
pub mod telegram;

pub use format::render_html;
pub use telegram::TelegramSink;

/// Destination finale d'une alerte. Livraison sans accusé de réception :
/// une erreur est journalisée par l'appelant, jamais retentée.
#[async_trait]
pub trait AlertSink: Send + Sync {
    async fn deliver(&self, record: &PoolAlertRecord) -> Result<()>;
}

/// Sink par défaut quand Telegram n'est pas configuré : l'alerte part dans les logs JSON.
pub struct LogSink;

#[async_trait]
impl AlertSink for LogSink {
    async fn deliver(&self, record: &PoolAlertRecord) -> Result<()> {
        let payload = serde_json::to_string(record).context("Sérialisation de l'alerte")?;
        info!(signature = %record.signature, alert = %payload, "[Alerte] Nouvelle pool.");
        Ok(())
    }
}
