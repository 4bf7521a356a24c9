// src/math/mod.rs

pub mod valuation;

pub use valuation::{ValuationError, ValuationSnapshot, compute_valuation, holding_percentage};
