// src/config.rs

//! Configuration for the commit pipeline.
//!
//! Every struct deserializes from a JSON config file with missing fields
//! falling back to the documented defaults, so a partial file is always
//! valid. The pricing table and palette are data here rather than ambient
//! globals; tests and deployments can swap them wholesale.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::palette::Palette;
use crate::pricing::PricingConfig;

/// Root configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Value-unit pricing constants.
    pub pricing: PricingConfig,
    /// Gas accounting knobs.
    pub gas: GasConfig,
    /// Image import behavior.
    pub import: ImportConfig,
    /// The 16-color palette.
    pub palette: Palette,
}

impl Config {
    /// Loads configuration from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("could not read config file {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("could not parse config file {}", path.display()))
    }
}

/// Gas accounting configuration.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct GasConfig {
    /// Subtracted from the queried block gas limit before it is used as the
    /// batch-packing ceiling.
    pub safety_margin: u64,
    /// Flat estimate shown to the user per boundary update.
    pub boundary_update_gas: u64,
    /// Flat estimate shown to the user per chunk creation.
    pub chunk_creation_gas: u64,
}

impl Default for GasConfig {
    fn default() -> Self {
        GasConfig {
            safety_margin: 500_000,
            boundary_update_gas: 20_000,
            chunk_creation_gas: 650_000,
        }
    }
}

/// Image import configuration.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportConfig {
    /// Floyd–Steinberg diffusion strength in [0, 1]; zero disables
    /// dithering.
    pub dither_strength: f32,
}

impl Default for ImportConfig {
    fn default() -> Self {
        ImportConfig {
            dither_strength: 1.0,
        }
    }
}
