// src/pipeline/coordinator.rs

use super::{
    HolderShare, PoolAlertRecord,
    resolver::{ResolveError, ResolvedLegs, TransactionResolver},
};
use crate::{
    alerts::AlertSink,
    data_pipeline::api_connectors::{OffChainMetadataFeed, PriceFeed},
    decoders::{DecodeError, DecodedMint, decode_metadata, decode_mint, metadata_address},
    math::{ValuationError, compute_valuation, holding_percentage},
    monitoring::metrics,
    rpc::{ChainRpc, HolderBalance},
};
use solana_sdk::{pubkey::Pubkey, signature::Signature};
use std::{sync::Arc, time::Duration};
use thiserror::Error;
use tokio::{
    sync::{Semaphore, mpsc},
    task::JoinSet,
    time::sleep,
};
use tracing::{error, info, warn};

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Valuation(#[from] ValuationError),

    #[error("compte de métadonnées {address} indisponible : {reason:#}")]
    MetadataUnavailable { address: Pubkey, reason: anyhow::Error },

    #[error("supply du mint {mint} indisponible : {reason:#}")]
    Supply { mint: Pubkey, reason: anyhow::Error },

    #[error("prix de cotation indisponible : {0:#}")]
    Price(anyhow::Error),
}

impl PipelineError {
    /// Étape en échec, utilisée comme label de métrique.
    pub fn stage(&self) -> &'static str {
        match self {
            PipelineError::Resolve(_) => "resolve",
            PipelineError::Decode(_) => "decode",
            PipelineError::Valuation(_) => "valuation",
            PipelineError::MetadataUnavailable { .. } => "metadata",
            PipelineError::Supply { .. } => "supply",
            PipelineError::Price(_) => "price",
        }
    }
}

#[derive(Debug, Clone)]
pub struct CoordinatorSettings {
    pub quote_mint: Pubkey,
    pub quote_price_id: String,
    /// 0 désactive le résumé des holders.
    pub top_holders: usize,
    pub resolve_attempts: u8,
    pub resolve_retry_delay: Duration,
    /// 1 = une signature à la fois, dans l'ordre d'arrivée.
    pub max_in_flight: usize,
}

pub struct PipelineCoordinator {
    resolver: TransactionResolver,
    rpc: Arc<dyn ChainRpc>,
    prices: Arc<dyn PriceFeed>,
    descriptions: Arc<dyn OffChainMetadataFeed>,
    sink: Arc<dyn AlertSink>,
    settings: CoordinatorSettings,
}

impl PipelineCoordinator {
    pub fn new(
        rpc: Arc<dyn ChainRpc>,
        prices: Arc<dyn PriceFeed>,
        descriptions: Arc<dyn OffChainMetadataFeed>,
        sink: Arc<dyn AlertSink>,
        settings: CoordinatorSettings,
    ) -> Self {
        Self {
            resolver: TransactionResolver::new(rpc.clone(), settings.quote_mint),
            rpc,
            prices,
            descriptions,
            sink,
            settings,
        }
    }

    /// Traite une signature de bout en bout, sans livrer l'alerte.
    /// Aucun enregistrement partiel : toute étape obligatoire en échec fait échouer l'ensemble.
    pub async fn process(&self, signature: &Signature) -> Result<PoolAlertRecord, PipelineError> {
        let legs = self.resolve_with_retry(signature).await?;
        let base_mint = legs.base.mint;
        let metadata_address = metadata_address(&base_mint);

        let metadata_fetch = async {
            self.rpc
                .get_account_data(&metadata_address)
                .await
                .map_err(|reason| PipelineError::MetadataUnavailable { address: metadata_address, reason })
        };
        let supply_fetch = async {
            self.rpc
                .get_token_supply(&base_mint)
                .await
                .map_err(|reason| PipelineError::Supply { mint: base_mint, reason })
        };
        let price_fetch = async {
            self.prices
                .get_price(&self.settings.quote_price_id)
                .await
                .map_err(PipelineError::Price)
        };
        let mandatory = async { tokio::try_join!(metadata_fetch, supply_fetch, price_fetch) };

        let (mandatory, holders, mint_risk) =
            tokio::join!(mandatory, self.fetch_holders(&base_mint), self.fetch_mint_risk(&base_mint));
        let (metadata_bytes, supply, quote_price) = mandatory?;

        let metadata = decode_metadata(&metadata_bytes)?;
        let valuation = compute_valuation(legs.base.ui_amount, legs.quote.ui_amount, supply, quote_price)?;
        let top_holders = holder_shares(holders, supply);
        let description = self.fetch_description(&base_mint, &metadata.uri).await;

        let ResolvedLegs { base, quote, classification } = legs;
        Ok(PoolAlertRecord {
            signature: *signature,
            metadata_address,
            metadata,
            description,
            valuation,
            base,
            quote,
            classification,
            top_holders,
            mint_risk,
        })
    }

    /// Traite une signature et livre l'alerte. Les erreurs s'arrêtent ici.
    pub async fn handle(&self, signature: Signature) {
        let timer = metrics::PIPELINE_LATENCY.start_timer();
        match self.process(&signature).await {
            Ok(record) => {
                info!(
                    %signature,
                    name = %record.metadata.name,
                    symbol = %record.metadata.symbol,
                    base_mint = %record.base.mint,
                    price_in_fiat = record.valuation.price_in_fiat,
                    market_cap_fiat = record.valuation.market_cap_fiat,
                    "[Pipeline] Nouvelle pool valorisée."
                );
                match self.sink.deliver(&record).await {
                    Ok(()) => metrics::ALERTS_EMITTED.inc(),
                    Err(e) => {
                        metrics::ALERT_DELIVERY_FAILURES.inc();
                        error!(%signature, error = ?e, "[Pipeline] Livraison de l'alerte impossible.");
                    }
                }
            }
            Err(e) => {
                metrics::EVENTS_DROPPED.with_label_values(&[e.stage()]).inc();
                warn!(%signature, stage = e.stage(), error = %e, "[Pipeline] Signature abandonnée.");
            }
        }
        timer.observe_duration();
    }

    /// Consomme les candidats jusqu'à la fermeture du canal.
    pub async fn run(self: Arc<Self>, mut candidates: mpsc::Receiver<Signature>) {
        if self.settings.max_in_flight <= 1 {
            while let Some(signature) = candidates.recv().await {
                self.handle(signature).await;
            }
        } else {
            // L'ordre des alertes ne suit plus l'ordre d'arrivée.
            let permits = Arc::new(Semaphore::new(self.settings.max_in_flight));
            let mut tasks = JoinSet::new();
            while let Some(signature) = candidates.recv().await {
                let Ok(permit) = permits.clone().acquire_owned().await else {
                    break;
                };
                let coordinator = self.clone();
                tasks.spawn(async move {
                    coordinator.handle(signature).await;
                    drop(permit);
                });
                while tasks.try_join_next().is_some() {}
            }
            while tasks.join_next().await.is_some() {}
        }
        info!("[Pipeline] Plus de candidats, arrêt du coordinateur.");
    }

    async fn resolve_with_retry(&self, signature: &Signature) -> Result<ResolvedLegs, ResolveError> {
        let attempts = self.settings.resolve_attempts.max(1);
        let mut attempt: u8 = 1;
        loop {
            match self.resolver.resolve(signature).await {
                Err(e) if e.is_retryable() && attempt < attempts => {
                    warn!(%signature, attempt, error = %e, "[Pipeline] Transaction pas encore lisible, nouvelle tentative.");
                    attempt += 1;
                    sleep(self.settings.resolve_retry_delay).await;
                }
                outcome => return outcome,
            }
        }
    }

    async fn fetch_holders(&self, mint: &Pubkey) -> Vec<HolderBalance> {
        if self.settings.top_holders == 0 {
            return Vec::new();
        }
        match self.rpc.get_token_largest_accounts(mint).await {
            Ok(mut holders) => {
                holders.truncate(self.settings.top_holders);
                holders
            }
            Err(e) => {
                warn!(%mint, error = %e, "[Pipeline] Holders indisponibles, alerte sans résumé.");
                Vec::new()
            }
        }
    }

    async fn fetch_description(&self, mint: &Pubkey, uri: &str) -> String {
        match self.descriptions.get_description(uri).await {
            Ok(description) => description,
            Err(e) => {
                warn!(%mint, uri, error = %e, "[Pipeline] JSON off-chain indisponible, alerte sans description.");
                String::new()
            }
        }
    }

    async fn fetch_mint_risk(&self, mint: &Pubkey) -> Option<DecodedMint> {
        let data = match self.rpc.get_account_data(mint).await {
            Ok(data) => data,
            Err(e) => {
                warn!(%mint, error = %e, "[Pipeline] Compte du mint illisible.");
                return None;
            }
        };
        match decode_mint(mint, &data) {
            Ok(decoded) => Some(decoded),
            Err(e) => {
                warn!(%mint, error = %e, "[Pipeline] Compte du mint indécodable.");
                None
            }
        }
    }
}

fn holder_shares(holders: Vec<HolderBalance>, supply: f64) -> Vec<HolderShare> {
    holders
        .into_iter()
        .filter_map(|holder| {
            let percent_of_supply = holding_percentage(supply, holder.ui_amount).ok()?;
            Some(HolderShare { address: holder.address, ui_amount: holder.ui_amount, percent_of_supply })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn holder_shares_are_relative_to_supply() {
        let (a, b) = (Pubkey::new_unique(), Pubkey::new_unique());
        let shares = holder_shares(
            vec![
                HolderBalance { address: a, ui_amount: 250.0 },
                HolderBalance { address: b, ui_amount: 10.0 },
            ],
            1000.0,
        );
        assert_eq!(shares.len(), 2);
        assert_eq!(shares[0].percent_of_supply, 25.0);
        assert_eq!(shares[1].percent_of_supply, 1.0);
    }

    #[test]
    fn zero_supply_yields_no_shares() {
        let shares = holder_shares(vec![HolderBalance { address: Pubkey::new_unique(), ui_amount: 1.0 }], 0.0);
        assert!(shares.is_empty());
    }

    #[test]
    fn stage_labels() {
        assert_eq!(PipelineError::from(ResolveError::TransactionFailed).stage(), "resolve");
        assert_eq!(
            PipelineError::from(DecodeError::BadDiscriminant { expected: 4, found: 0 }).stage(),
            "decode"
        );
        assert_eq!(PipelineError::Price(anyhow::anyhow!("429")).stage(), "price");
    }
}
