use crate::monitoring::logging::LogFormat;
use anyhow::{Context, Result, bail};
use serde::Deserialize;
use solana_sdk::{commitment_config::CommitmentConfig, pubkey::Pubkey};
use std::{str::FromStr, time::Duration};

/// Autorité des pools Raydium AMM v4 : mentionnée par chaque `initialize2`.
pub const DEFAULT_POOL_AUTHORITY: &str = "5Q544fKrFoe6tsEbD7S8EmxGTJYAKtTVhAW5Q5pge4j1";
pub const DEFAULT_POOL_INIT_MARKER: &str = "Program log: initialize2:";
pub const WRAPPED_SOL_MINT: &str = "So11111111111111111111111111111111111111112";

fn default_stream_commitment() -> String { "processed".to_string() }
fn default_rpc_commitment() -> String { "confirmed".to_string() }
fn default_pool_authority() -> String { DEFAULT_POOL_AUTHORITY.to_string() }
fn default_pool_init_marker() -> String { DEFAULT_POOL_INIT_MARKER.to_string() }
fn default_quote_mint() -> String { WRAPPED_SOL_MINT.to_string() }
fn default_quote_price_id() -> String { "solana".to_string() }
fn default_fiat_currency() -> String { "usd".to_string() }
fn default_coingecko_api_url() -> String { "https://api.coingecko.com/api/v3".to_string() }
fn default_reconnect_base_delay_ms() -> u64 { 1_000 }
fn default_reconnect_max_delay_ms() -> u64 { 30_000 }
fn default_stream_idle_timeout_ms() -> u64 { 120_000 }
fn default_rpc_timeout_ms() -> u64 { 10_000 }
fn default_rpc_max_retries() -> u8 { 3 }
fn default_rpc_retry_delay_ms() -> u64 { 500 }
fn default_resolve_attempts() -> u8 { 3 }
fn default_resolve_retry_delay_ms() -> u64 { 1_500 }
fn default_max_in_flight() -> usize { 1 }
fn default_top_holders() -> usize { 6 }

/// Configuration du processus, lue depuis l'environnement (et un éventuel `.env`).
#[derive(Deserialize, Debug, Clone)]
pub struct Config {
    pub solana_rpc_url: String,
    /// Déduit de `solana_rpc_url` si absent.
    pub solana_ws_url: Option<String>,
    #[serde(default = "default_stream_commitment")]
    pub stream_commitment: String,
    #[serde(default = "default_rpc_commitment")]
    pub rpc_commitment: String,

    #[serde(default = "default_pool_authority")]
    pub pool_authority: String,
    #[serde(default = "default_pool_init_marker")]
    pub pool_init_marker: String,
    #[serde(default = "default_quote_mint")]
    pub quote_mint: String,

    #[serde(default = "default_quote_price_id")]
    pub quote_price_id: String,
    #[serde(default = "default_fiat_currency")]
    pub fiat_currency: String,
    #[serde(default = "default_coingecko_api_url")]
    pub coingecko_api_url: String,

    pub telegram_bot_token: Option<String>,
    pub telegram_channel_id: Option<String>,
    pub telegram_button_url: Option<String>,

    #[serde(default = "default_reconnect_base_delay_ms")]
    pub reconnect_base_delay_ms: u64,
    #[serde(default = "default_reconnect_max_delay_ms")]
    pub reconnect_max_delay_ms: u64,
    /// 0 désactive la détection de flux muet.
    #[serde(default = "default_stream_idle_timeout_ms")]
    pub stream_idle_timeout_ms: u64,
    #[serde(default = "default_rpc_timeout_ms")]
    pub rpc_timeout_ms: u64,
    #[serde(default = "default_rpc_max_retries")]
    pub rpc_max_retries: u8,
    #[serde(default = "default_rpc_retry_delay_ms")]
    pub rpc_retry_delay_ms: u64,
    #[serde(default = "default_resolve_attempts")]
    pub resolve_attempts: u8,
    #[serde(default = "default_resolve_retry_delay_ms")]
    pub resolve_retry_delay_ms: u64,
    #[serde(default = "default_max_in_flight")]
    pub max_in_flight: usize,
    #[serde(default = "default_top_holders")]
    pub top_holders: usize,

    pub metrics_port: Option<u16>,
    #[serde(default)]
    pub log_format: LogFormat,
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();
        let config = envy::from_env::<Config>().context("Configuration invalide")?;
        config.validate()?;
        Ok(config)
    }

    /// Vérifie au démarrage tout ce qui doit être parsé plus tard.
    pub fn validate(&self) -> Result<()> {
        self.stream_commitment()?;
        self.rpc_commitment()?;
        self.pool_authority()?;
        self.quote_mint()?;
        if self.reconnect_base_delay_ms > self.reconnect_max_delay_ms {
            bail!(
                "RECONNECT_BASE_DELAY_MS ({}) dépasse RECONNECT_MAX_DELAY_MS ({})",
                self.reconnect_base_delay_ms,
                self.reconnect_max_delay_ms
            );
        }
        Ok(())
    }

    pub fn ws_url(&self) -> String {
        match &self.solana_ws_url {
            Some(url) => url.clone(),
            None => derive_ws_url(&self.solana_rpc_url),
        }
    }

    pub fn stream_commitment(&self) -> Result<CommitmentConfig> {
        parse_commitment(&self.stream_commitment)
    }

    /// `getTransaction` n'accepte pas `processed`.
    pub fn rpc_commitment(&self) -> Result<CommitmentConfig> {
        let commitment = parse_commitment(&self.rpc_commitment)?;
        if commitment == CommitmentConfig::processed() {
            bail!("RPC_COMMITMENT doit être `confirmed` ou `finalized`");
        }
        Ok(commitment)
    }

    pub fn pool_authority(&self) -> Result<Pubkey> {
        Pubkey::from_str(&self.pool_authority).context("POOL_AUTHORITY invalide")
    }

    pub fn quote_mint(&self) -> Result<Pubkey> {
        Pubkey::from_str(&self.quote_mint).context("QUOTE_MINT invalide")
    }

    /// (token, canal) si les deux sont renseignés.
    pub fn telegram(&self) -> Option<(&str, &str)> {
        match (&self.telegram_bot_token, &self.telegram_channel_id) {
            (Some(token), Some(channel)) if !token.is_empty() && !channel.is_empty() => {
                Some((token.as_str(), channel.as_str()))
            }
            _ => None,
        }
    }

    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_millis(self.rpc_timeout_ms)
    }

    pub fn stream_idle_timeout(&self) -> Option<Duration> {
        (self.stream_idle_timeout_ms > 0).then(|| Duration::from_millis(self.stream_idle_timeout_ms))
    }
}

pub fn parse_commitment(value: &str) -> Result<CommitmentConfig> {
    match value.trim().to_ascii_lowercase().as_str() {
        "processed" => Ok(CommitmentConfig::processed()),
        "confirmed" => Ok(CommitmentConfig::confirmed()),
        "finalized" => Ok(CommitmentConfig::finalized()),
        other => bail!("Niveau de commitment inconnu : {other}"),
    }
}

pub fn derive_ws_url(rpc_url: &str) -> String {
    if let Some(rest) = rpc_url.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = rpc_url.strip_prefix("http://") {
        format!("ws://{rest}")
    } else {
        rpc_url.to_string()
    }
}
