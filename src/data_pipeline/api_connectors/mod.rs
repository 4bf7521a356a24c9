// src/data_pipeline/api_connectors/mod.rs

use anyhow::Result;
use async_trait::async_trait;

pub mod coingecko;
pub mod token_metadata;

pub use coingecko::CoinGeckoPriceFeed;
pub use token_metadata::HttpMetadataFeed;

/// Prix fiat d'un actif de cotation (ex : `solana` → USD).
#[async_trait]
pub trait PriceFeed: Send + Sync {
    async fn get_price(&self, asset: &str) -> Result<f64>;
}

/// Description d'un token tirée de son JSON off-chain (`uri` des métadonnées).
#[async_trait]
pub trait OffChainMetadataFeed: Send + Sync {
    async fn get_description(&self, uri: &str) -> Result<String>;
}
