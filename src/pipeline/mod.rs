// src/pipeline/mod.rs

use crate::{
    decoders::{DecodedMint, MetadataRecord},
    math::ValuationSnapshot,
    rpc::TokenBalanceLeg,
};
use serde::Serialize;
use solana_sdk::{pubkey::Pubkey, signature::Signature};

pub mod coordinator;
pub mod resolver;

pub use coordinator::{CoordinatorSettings, PipelineCoordinator, PipelineError};
pub use resolver::{LegClassification, ResolveError, ResolvedLegs, TransactionResolver, classify_legs};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HolderShare {
    pub address: Pubkey,
    pub ui_amount: f64,
    pub percent_of_supply: f64,
}

/// Tout ce qu'on sait d'une nouvelle pool au moment de l'alerte.
/// Construit en une fois, remis au sink, puis jeté.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PoolAlertRecord {
    pub signature: Signature,
    pub metadata_address: Pubkey,
    pub metadata: MetadataRecord,
    /// `description` du JSON off-chain, vide si absent ou illisible.
    pub description: String,
    pub valuation: ValuationSnapshot,
    pub base: TokenBalanceLeg,
    pub quote: TokenBalanceLeg,
    pub classification: LegClassification,
    /// Vide si l'enrichissement est désactivé ou a échoué.
    pub top_holders: Vec<HolderShare>,
    /// `None` si le compte du mint n'a pas pu être lu ou décodé.
    pub mint_risk: Option<DecodedMint>,
}
