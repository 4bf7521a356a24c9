// src/pipeline/resolver.rs

use crate::rpc::{ChainRpc, TokenBalanceLeg};
use serde::Serialize;
use solana_sdk::{pubkey::Pubkey, signature::Signature};
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("{found} solde(s) de token post-exécution, 2 requis")]
    InsufficientBalances { found: usize },

    #[error("la transaction a échoué à l'exécution")]
    TransactionFailed,

    #[error("appel RPC en échec : {0:#}")]
    Upstream(anyhow::Error),
}

impl ResolveError {
    /// Seules les erreurs réseau/RPC valent la peine d'être retentées.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ResolveError::Upstream(_))
    }
}

/// Comment la jambe de cotation a été identifiée.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LegClassification {
    /// Exactement une des deux jambes porte le mint de cotation.
    ByMint,
    /// Aucune ou les deux : ordre d'origine conservé (première = base). Au mieux.
    Positional,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedLegs {
    pub base: TokenBalanceLeg,
    pub quote: TokenBalanceLeg,
    pub classification: LegClassification,
}

pub fn classify_legs(first: TokenBalanceLeg, second: TokenBalanceLeg, quote_mint: &Pubkey) -> ResolvedLegs {
    match (first.mint == *quote_mint, second.mint == *quote_mint) {
        (true, false) => ResolvedLegs { base: second, quote: first, classification: LegClassification::ByMint },
        (false, true) => ResolvedLegs { base: first, quote: second, classification: LegClassification::ByMint },
        _ => ResolvedLegs { base: first, quote: second, classification: LegClassification::Positional },
    }
}

/// Signature → (base, quote). Une seule tentative par appel, le ré-essai est
/// décidé par le coordinateur.
pub struct TransactionResolver {
    rpc: Arc<dyn ChainRpc>,
    quote_mint: Pubkey,
}

impl TransactionResolver {
    pub fn new(rpc: Arc<dyn ChainRpc>, quote_mint: Pubkey) -> Self {
        Self { rpc, quote_mint }
    }

    pub async fn resolve(&self, signature: &Signature) -> Result<ResolvedLegs, ResolveError> {
        let balances = self
            .rpc
            .get_transaction_balances(signature)
            .await
            .map_err(ResolveError::Upstream)?;

        if balances.failed {
            return Err(ResolveError::TransactionFailed);
        }

        let found = balances.post_token_balances.len();
        let mut legs = balances.post_token_balances.into_iter();
        match (legs.next(), legs.next()) {
            (Some(first), Some(second)) => Ok(classify_legs(first, second, &self.quote_mint)),
            _ => Err(ResolveError::InsufficientBalances { found }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::{HolderBalance, TransactionBalances};
    use anyhow::{Result, anyhow};
    use async_trait::async_trait;
    use std::sync::Mutex;

    fn leg(index: u8, mint: Pubkey, ui_amount: f64) -> TokenBalanceLeg {
        TokenBalanceLeg {
            account_index: index,
            mint,
            owner: None,
            raw_amount: (ui_amount * 1e9) as u64,
            decimals: 9,
            ui_amount,
        }
    }

    struct ScriptedRpc {
        replies: Mutex<Vec<Result<TransactionBalances>>>,
    }

    #[async_trait]
    impl ChainRpc for ScriptedRpc {
        async fn get_transaction_balances(&self, _: &Signature) -> Result<TransactionBalances> {
            self.replies.lock().unwrap().remove(0)
        }
        async fn get_account_data(&self, _: &Pubkey) -> Result<Vec<u8>> {
            unimplemented!()
        }
        async fn get_token_supply(&self, _: &Pubkey) -> Result<f64> {
            unimplemented!()
        }
        async fn get_token_largest_accounts(&self, _: &Pubkey) -> Result<Vec<HolderBalance>> {
            unimplemented!()
        }
    }

    fn resolver(reply: Result<TransactionBalances>, quote: Pubkey) -> TransactionResolver {
        let rpc = ScriptedRpc { replies: Mutex::new(vec![reply]) };
        TransactionResolver::new(Arc::new(rpc), quote)
    }

    #[test]
    fn quote_leg_found_by_mint_in_either_order() {
        let quote = Pubkey::new_unique();
        let token = Pubkey::new_unique();

        let legs = classify_legs(leg(5, quote, 50.0), leg(6, token, 1000.0), &quote);
        assert_eq!(legs.quote.mint, quote);
        assert_eq!(legs.base.mint, token);
        assert_eq!(legs.classification, LegClassification::ByMint);

        let legs = classify_legs(leg(5, token, 1000.0), leg(6, quote, 50.0), &quote);
        assert_eq!(legs.quote.mint, quote);
        assert_eq!(legs.base.mint, token);
        assert_eq!(legs.classification, LegClassification::ByMint);
    }

    #[test]
    fn unknown_or_duplicate_quote_falls_back_to_position() {
        let quote = Pubkey::new_unique();
        let (a, b) = (Pubkey::new_unique(), Pubkey::new_unique());

        let legs = classify_legs(leg(1, a, 1.0), leg(2, b, 2.0), &quote);
        assert_eq!((legs.base.mint, legs.quote.mint), (a, b));
        assert_eq!(legs.classification, LegClassification::Positional);

        let legs = classify_legs(leg(1, quote, 1.0), leg(2, quote, 2.0), &quote);
        assert_eq!(legs.base.account_index, 1);
        assert_eq!(legs.classification, LegClassification::Positional);
    }

    #[tokio::test]
    async fn only_the_first_two_balances_are_used() {
        let quote = Pubkey::new_unique();
        let token = Pubkey::new_unique();
        let balances = TransactionBalances {
            failed: false,
            post_token_balances: vec![
                leg(0, token, 1000.0),
                leg(1, quote, 50.0),
                leg(2, Pubkey::new_unique(), 7.0),
            ],
        };
        let legs = resolver(Ok(balances), quote).resolve(&Signature::default()).await.unwrap();
        assert_eq!(legs.base.ui_amount, 1000.0);
        assert_eq!(legs.quote.ui_amount, 50.0);
    }

    #[tokio::test]
    async fn fewer_than_two_balances_is_insufficient() {
        let balances = TransactionBalances {
            failed: false,
            post_token_balances: vec![leg(0, Pubkey::new_unique(), 1.0)],
        };
        let err = resolver(Ok(balances), Pubkey::new_unique())
            .resolve(&Signature::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ResolveError::InsufficientBalances { found: 1 }));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn failed_transaction_is_skipped() {
        let balances = TransactionBalances { failed: true, post_token_balances: vec![] };
        let err = resolver(Ok(balances), Pubkey::new_unique())
            .resolve(&Signature::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ResolveError::TransactionFailed));
    }

    #[tokio::test]
    async fn rpc_failure_is_upstream_and_retryable() {
        let err = resolver(Err(anyhow!("503 Service Unavailable")), Pubkey::new_unique())
            .resolve(&Signature::default())
            .await
            .unwrap_err();
        assert!(err.is_retryable());
        assert!(err.to_string().contains("503"));
    }
}
