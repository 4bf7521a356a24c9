// src/data_pipeline/api_connectors/coingecko.rs

use super::PriceFeed;
use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use serde::Deserialize;
use std::{collections::HashMap, time::Duration};

/// Réponse de `/simple/price` : `{ "<id>": { "<devise>": prix } }`.
#[derive(Debug, Deserialize)]
#[serde(transparent)]
pub struct SimplePriceResponse(pub HashMap<String, HashMap<String, f64>>);

impl SimplePriceResponse {
    pub fn price(&self, asset: &str, currency: &str) -> Option<f64> {
        self.0.get(asset).and_then(|prices| prices.get(currency)).copied()
    }
}

pub fn parse_simple_price(body: &str, asset: &str, currency: &str) -> Result<f64> {
    let response: SimplePriceResponse =
        serde_json::from_str(body).context("Réponse CoinGecko illisible")?;
    let price = response
        .price(asset, currency)
        .ok_or_else(|| anyhow!("Pas de prix {currency} pour `{asset}` dans la réponse CoinGecko"))?;
    if !price.is_finite() || price <= 0.0 {
        return Err(anyhow!("Prix CoinGecko aberrant pour `{asset}` : {price}"));
    }
    Ok(price)
}

/// Connecteur vers l'API publique CoinGecko. Aucun cache : un appel par événement.
pub struct CoinGeckoPriceFeed {
    http: reqwest::Client,
    base_url: String,
    currency: String,
}

impl CoinGeckoPriceFeed {
    pub fn new(base_url: String, currency: String, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Construction du client HTTP CoinGecko")?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            currency,
        })
    }
}

#[async_trait]
impl PriceFeed for CoinGeckoPriceFeed {
    async fn get_price(&self, asset: &str) -> Result<f64> {
        let url = format!("{}/simple/price", self.base_url);
        let response = self
            .http
            .get(&url)
            .query(&[("ids", asset), ("vs_currencies", self.currency.as_str())])
            .send()
            .await
            .context("Appel CoinGecko impossible")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_body = response.text().await.unwrap_or_default();
            return Err(anyhow!("Erreur API CoinGecko: {} - {}", status, error_body));
        }

        let body = response.text().await?;
        parse_simple_price(&body, asset, &self.currency)
    }
}
