// src/decoders/spl_token_decoders/mint.rs

use anyhow::Result;
use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;
use spl_token_2022::{
    extension::transfer_fee::TransferFeeConfig,
    extension::{BaseStateWithExtensions, StateWithExtensions},
    state::Mint,
};

/// Ce que l'alerte affiche dans son bloc "Risques" à propos du mint de base.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodedMint {
    pub address: Pubkey,
    pub decimals: u8,
    pub supply: u64,
    /// `true` si plus personne ne peut frapper de nouveaux tokens.
    pub mint_authority_revoked: bool,
    /// `true` si plus personne ne peut geler les comptes de token.
    pub freeze_authority_revoked: bool,
    pub transfer_fee_basis_points: u16, // 0 sans extension TransferFee
}

/// Décode un compte de mint SPL Token ou Token-2022.
pub fn decode_mint(address: &Pubkey, data: &[u8]) -> Result<DecodedMint> {
    // StateWithExtensions lit aussi bien les anciens mints (82 octets) que les mints à extensions.
    let mint_state = StateWithExtensions::<Mint>::unpack(data)?;
    let base_mint = mint_state.base;

    let transfer_fee_basis_points = mint_state
        .get_extension::<TransferFeeConfig>()
        .map(|config| u16::from(config.newer_transfer_fee.transfer_fee_basis_points))
        .unwrap_or(0);

    Ok(DecodedMint {
        address: *address,
        decimals: base_mint.decimals,
        supply: base_mint.supply,
        mint_authority_revoked: base_mint.mint_authority.is_none(),
        freeze_authority_revoked: base_mint.freeze_authority.is_none(),
        transfer_fee_basis_points,
    })
}
