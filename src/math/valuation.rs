// src/math/valuation.rs

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum ValuationError {
    #[error("division par zéro : {what} est nul")]
    DivisionByZero { what: &'static str },

    #[error("valeur non finie pour `{field}` : {value}")]
    NonFinite { field: &'static str, value: f64 },
}

/// Chiffres dérivés d'un pool fraîchement créé. Aucun arrondi ici :
/// l'affichage s'en charge.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValuationSnapshot {
    pub price_in_quote_asset: f64,
    pub price_in_fiat: f64,
    pub liquidity_fiat: f64,
    pub market_cap_fiat: f64,
    pub circulating_supply: f64,
}

fn finite(field: &'static str, value: f64) -> Result<f64, ValuationError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(ValuationError::NonFinite { field, value })
    }
}

/// Calcule prix, liquidité et market cap à partir des réserves du pool (en unités UI),
/// de la supply du token de base et du prix fiat de l'actif de cotation.
pub fn compute_valuation(
    base_reserve: f64,
    quote_reserve: f64,
    circulating_supply: f64,
    quote_fiat_price: f64,
) -> Result<ValuationSnapshot, ValuationError> {
    let base_reserve = finite("base_reserve", base_reserve)?;
    let quote_reserve = finite("quote_reserve", quote_reserve)?;
    let circulating_supply = finite("circulating_supply", circulating_supply)?;
    let quote_fiat_price = finite("quote_fiat_price", quote_fiat_price)?;

    if base_reserve == 0.0 {
        return Err(ValuationError::DivisionByZero { what: "base_reserve" });
    }

    let price_in_quote_asset = finite("price_in_quote_asset", quote_reserve / base_reserve)?;
    let price_in_fiat = finite("price_in_fiat", price_in_quote_asset * quote_fiat_price)?;
    let liquidity_fiat = finite("liquidity_fiat", quote_reserve * quote_fiat_price)?;
    let market_cap_fiat = finite("market_cap_fiat", price_in_fiat * circulating_supply)?;

    Ok(ValuationSnapshot {
        price_in_quote_asset,
        price_in_fiat,
        liquidity_fiat,
        market_cap_fiat,
        circulating_supply,
    })
}

/// Part de la supply détenue par un compte, en pourcentage.
pub fn holding_percentage(total_supply: f64, holding: f64) -> Result<f64, ValuationError> {
    if total_supply == 0.0 {
        return Err(ValuationError::DivisionByZero { what: "total_supply" });
    }
    finite("holding_percentage", holding / total_supply * 100.0)
}
