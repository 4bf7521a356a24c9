// src/rpc/mod.rs

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use solana_sdk::{pubkey::Pubkey, signature::Signature};

pub mod resilient_client;

pub use resilient_client::ResilientRpcClient;

/// Un solde de token post-exécution extrait d'une transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenBalanceLeg {
    pub account_index: u8,
    pub mint: Pubkey,
    pub owner: Option<Pubkey>,
    pub raw_amount: u64,
    pub decimals: u8,
    pub ui_amount: f64,
}

/// Ce que le pipeline retient d'une transaction résolue.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TransactionBalances {
    /// `true` si la transaction a échoué à l'exécution.
    pub failed: bool,
    pub post_token_balances: Vec<TokenBalanceLeg>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HolderBalance {
    pub address: Pubkey,
    pub ui_amount: f64,
}

/// Les lectures on-chain dont le pipeline a besoin. Implémenté par
/// `ResilientRpcClient` en production et par des doublures dans les tests.
#[async_trait]
pub trait ChainRpc: Send + Sync {
    /// Une seule tentative, sans ré-essai interne.
    async fn get_transaction_balances(&self, signature: &Signature) -> Result<TransactionBalances>;

    async fn get_account_data(&self, address: &Pubkey) -> Result<Vec<u8>>;

    /// Supply totale du mint, en unités UI.
    async fn get_token_supply(&self, mint: &Pubkey) -> Result<f64>;

    /// Plus gros comptes de token du mint, triés par solde décroissant.
    async fn get_token_largest_accounts(&self, mint: &Pubkey) -> Result<Vec<HolderBalance>>;
}

/// Montant UI à partir du montant brut quand le nœud ne renvoie pas `uiAmount`.
pub fn ui_amount_from_raw(raw_amount: u64, decimals: u8) -> f64 {
    raw_amount as f64 / 10f64.powi(i32::from(decimals))
}
