// src/pricing.rs

//! The mutation-history price model.
//!
//! Rewriting a boundary costs more each time it has been rewritten before:
//! the per-pixel base price is scaled by a fixed climb table indexed by the
//! boundary's on-chain mutation counter. Boundaries in chunks that do not
//! exist yet additionally carry a flat chunk-creation fee.

use serde::{Deserialize, Serialize};

/// Price multiplier per mutation count. Counters past the end of the table
/// clamp to the last entry.
pub const PRICE_CLIMB: [u64; 16] = [
    1, 2, 3, 5, 8, 13, 21, 34, 55, 89, 144, 233, 377, 610, 987, 1597,
];

/// Value-unit constants for the price model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PricingConfig {
    /// Price of one pixel at mutation count zero, in value units (wei).
    pub base_cost: u128,
    /// Flat premium for a boundary whose chunk must be created first.
    pub chunk_creation_fee: u128,
}

impl Default for PricingConfig {
    fn default() -> Self {
        PricingConfig {
            // The ledger's base price per pixel on a never-rewritten
            // boundary.
            base_cost: 5_000_000_000_000,
            chunk_creation_fee: 10_000_000_000_000_000,
        }
    }
}

/// Computes commit prices from mutation counters.
#[derive(Debug, Clone)]
pub struct PriceModel {
    config: PricingConfig,
}

impl PriceModel {
    pub fn new(config: PricingConfig) -> Self {
        PriceModel { config }
    }

    /// Climb multiplier for a mutation counter, clamped to the table.
    pub fn climb(&self, mutations: u32) -> u64 {
        let index = (mutations as usize).min(PRICE_CLIMB.len() - 1);
        PRICE_CLIMB[index]
    }

    /// Price of rewriting `pixels_changed` pixels of a boundary with the
    /// given mutation counter.
    pub fn boundary_cost(&self, mutations: u32, pixels_changed: u32) -> u128 {
        pixels_changed as u128 * self.config.base_cost * self.climb(mutations) as u128
    }

    /// Full price of one change: the boundary cost plus, for chunks that do
    /// not exist on-chain yet, the flat creation fee.
    pub fn change_cost(&self, mutations: u32, pixels_changed: u32, creates_chunk: bool) -> u128 {
        let mut cost = self.boundary_cost(mutations, pixels_changed);
        if creates_chunk {
            cost += self.config.chunk_creation_fee;
        }
        cost
    }

    pub fn chunk_creation_fee(&self) -> u128 {
        self.config.chunk_creation_fee
    }
}
