// src/data_pipeline/api_connectors/token_metadata.rs

use super::OffChainMetadataFeed;
use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

/// Sous-ensemble du JSON off-chain pointé par `uri` dans les métadonnées Metaplex.
#[derive(Debug, Deserialize)]
struct OffChainTokenJson {
    #[serde(default)]
    description: Option<String>,
}

/// Description du token, vide si le champ est absent ou nul.
pub fn parse_description(body: &str) -> Result<String> {
    let json: OffChainTokenJson = serde_json::from_str(body).context("JSON off-chain illisible")?;
    Ok(json.description.map(|d| d.trim().to_string()).unwrap_or_default())
}

/// Lit le JSON off-chain du token par HTTP(S).
pub struct HttpMetadataFeed {
    http: reqwest::Client,
}

impl HttpMetadataFeed {
    pub fn new(timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Construction du client HTTP des métadonnées")?;
        Ok(Self { http })
    }
}

#[async_trait]
impl OffChainMetadataFeed for HttpMetadataFeed {
    async fn get_description(&self, uri: &str) -> Result<String> {
        // ipfs://, ar:// et uri vides : rien à lire sans passerelle.
        if !(uri.starts_with("https://") || uri.starts_with("http://")) {
            return Ok(String::new());
        }

        let response = self
            .http
            .get(uri)
            .send()
            .await
            .with_context(|| format!("Appel de {uri} impossible"))?;

        if !response.status().is_success() {
            return Err(anyhow!("JSON off-chain {uri} : statut {}", response.status()));
        }

        let body = response.text().await?;
        parse_description(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_description() {
        let body = r#"{"name":"Foo","symbol":"FOO","description":" The foo token. ","image":"https://x/y.png"}"#;
        assert_eq!(parse_description(body).unwrap(), "The foo token.");
    }

    #[test]
    fn missing_or_null_description_is_empty() {
        assert_eq!(parse_description(r#"{"name":"Foo"}"#).unwrap(), "");
        assert_eq!(parse_description(r#"{"description":null}"#).unwrap(), "");
    }

    #[test]
    fn garbage_body_is_an_error() {
        assert!(parse_description("<html>gateway timeout</html>").is_err());
    }

    #[tokio::test]
    async fn non_http_uri_is_skipped() {
        let feed = HttpMetadataFeed::new(Duration::from_secs(1)).unwrap();
        assert_eq!(feed.get_description("").await.unwrap(), "");
        assert_eq!(feed.get_description("ipfs://bafy/meta.json").await.unwrap(), "");
    }
}
