// src/boundary.rs

//! The packed on-chain boundary word.
//!
//! A boundary is 64 pixels (8×8), each a 4-bit palette index, packed into
//! one 256-bit unsigned integer. The canonical layout puts pixel 0 (the
//! boundary's top-left) in the least-significant nibble and pixel 63
//! (bottom-right) in the most-significant nibble; the ledger stores and
//! emits exactly this value.
//!
//! The word is represented as four little-endian `u64` limbs: nibble `i`
//! lives in limb `i / 16` at bit `4 * (i % 16)`. No arithmetic is ever
//! needed on the value, only packing, unpacking, and hex formatting.

use std::fmt;
use std::str::FromStr;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::coords::PIXELS_PER_BOUNDARY;

/// Nibbles carried by one limb.
const NIBBLES_PER_LIMB: usize = 16;

/// One boundary's 64 palette indices packed as a 256-bit unsigned integer.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct BoundaryWord([u64; 4]);

impl BoundaryWord {
    pub const ZERO: BoundaryWord = BoundaryWord([0; 4]);

    /// Packs 64 palette indices, pixel 0 into the least-significant nibble.
    ///
    /// Indices must be valid palette indices (< 16); larger values are a
    /// caller bug and are masked to 4 bits after a debug assertion.
    pub fn encode(pixels: &[u8; PIXELS_PER_BOUNDARY]) -> Self {
        let mut limbs = [0u64; 4];
        for (i, &index) in pixels.iter().enumerate() {
            debug_assert!(index < 16, "palette index {} exceeds 4 bits", index);
            limbs[i / NIBBLES_PER_LIMB] |=
                ((index & 0xF) as u64) << (4 * (i % NIBBLES_PER_LIMB));
        }
        BoundaryWord(limbs)
    }

    /// Unpacks the 64 palette indices; exact inverse of [`encode`].
    ///
    /// [`encode`]: BoundaryWord::encode
    pub fn decode(&self) -> [u8; PIXELS_PER_BOUNDARY] {
        let mut pixels = [0u8; PIXELS_PER_BOUNDARY];
        for (i, pixel) in pixels.iter_mut().enumerate() {
            *pixel =
                ((self.0[i / NIBBLES_PER_LIMB] >> (4 * (i % NIBBLES_PER_LIMB))) & 0xF) as u8;
        }
        pixels
    }

    /// Single pixel's palette index without unpacking the whole word.
    pub fn nibble(&self, offset: usize) -> u8 {
        debug_assert!(offset < PIXELS_PER_BOUNDARY);
        ((self.0[offset / NIBBLES_PER_LIMB] >> (4 * (offset % NIBBLES_PER_LIMB))) & 0xF) as u8
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0; 4]
    }

    /// Parses a hex string (optionally `0x`-prefixed, at most 64 digits,
    /// right-aligned) into a word.
    pub fn from_hex(s: &str) -> Result<Self> {
        let digits = s.strip_prefix("0x").unwrap_or(s);
        if digits.is_empty() {
            bail!("empty boundary value");
        }
        if digits.len() > 64 {
            bail!(
                "boundary value has {} hex digits, exceeds 256 bits",
                digits.len()
            );
        }
        let mut limbs = [0u64; 4];
        // Walk digits from the right so the value stays right-aligned.
        for (i, ch) in digits.chars().rev().enumerate() {
            let nibble = ch
                .to_digit(16)
                .with_context(|| format!("invalid hex digit {:?} in boundary value", ch))?
                as u64;
            limbs[i / NIBBLES_PER_LIMB] |= nibble << (4 * (i % NIBBLES_PER_LIMB));
        }
        Ok(BoundaryWord(limbs))
    }

    /// Raw little-endian limbs, least significant first.
    pub fn limbs(&self) -> [u64; 4] {
        self.0
    }
}

impl fmt::Display for BoundaryWord {
    /// Canonical `0x`-prefixed minimal hex, matching the value the ledger
    /// renders for a 256-bit unsigned integer.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut started = false;
        write!(f, "0x")?;
        for limb in self.0.iter().rev() {
            if started {
                write!(f, "{:016x}", limb)?;
            } else if *limb != 0 {
                write!(f, "{:x}", limb)?;
                started = true;
            }
        }
        if !started {
            write!(f, "0")?;
        }
        Ok(())
    }
}

impl fmt::Debug for BoundaryWord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BoundaryWord({})", self)
    }
}

impl FromStr for BoundaryWord {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        BoundaryWord::from_hex(s)
    }
}

impl Serialize for BoundaryWord {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for BoundaryWord {
    fn deserialize<D: Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        BoundaryWord::from_hex(&s).map_err(serde::de::Error::custom)
    }
}
