// src/sync.rs

//! Merging authoritative remote state into the chunk cache.
//!
//! Remote events only ever touch the cached "original" rasters and mutation
//! counters — never a draw-space overlay, so uncommitted local edits survive
//! any amount of remote traffic. Malformed events are logged and dropped;
//! nothing here is fatal.

use anyhow::{Context, Result};
use log::{debug, info, warn};

use crate::canvas::chunk::{ChunkCache, ChunkFlags};
use crate::coords::{ChunkKey, BOUNDARIES_PER_CHUNK};
use crate::ledger::{Ledger, LedgerEvent};
use crate::palette::Palette;

/// Applies one remote event to the cache.
///
/// Returns the chunk whose raster changed and needs a repaint, if any.
/// [`LedgerEvent::BatchResolved`] is a planner concern and passes through
/// untouched.
pub fn apply_event(
    chunks: &mut ChunkCache,
    palette: &Palette,
    event: &LedgerEvent,
) -> Option<ChunkKey> {
    match event {
        LedgerEvent::ChunkCreated { key } => {
            let chunk = chunks.ensure(*key);
            chunk.flags.insert(ChunkFlags::CREATED | ChunkFlags::DAMAGED);
            debug!("chunk ({}, {}) created on-chain", key.x, key.y);
            Some(*key)
        }
        LedgerEvent::ChunkUpdated {
            key,
            boundary_index,
            value,
            change_count,
        } => {
            let index = *boundary_index as usize;
            if index >= BOUNDARIES_PER_CHUNK {
                warn!(
                    "dropping update for chunk ({}, {}): boundary index {} out of range",
                    key.x, key.y, boundary_index
                );
                return None;
            }
            let chunk = chunks.ensure(*key);
            // An update implies the chunk exists, even if its creation
            // event was missed.
            chunk.flags.insert(ChunkFlags::CREATED);
            chunk.apply_word(index, value, palette);
            chunk.set_mutation_count(index, *change_count);
            Some(*key)
        }
        LedgerEvent::BatchResolved { .. } => None,
    }
}

/// Loads every chunk that already exists on-chain into the cache through
/// the ledger's read accessors. Returns the number of chunks loaded.
/// Chunks with malformed pixel data are skipped, not fatal.
pub fn bootstrap(ledger: &mut dyn Ledger, chunks: &mut ChunkCache, palette: &Palette) -> Result<usize> {
    let count = ledger.chunk_count().context("could not enumerate chunks")?;
    let mut loaded = 0;
    for i in 0..count {
        let handle = match ledger.chunk_handle(i) {
            Ok(handle) => handle,
            Err(e) => {
                warn!("skipping chunk {}: {:#}", i, e);
                continue;
            }
        };
        if handle.pixel_data().len() != BOUNDARIES_PER_CHUNK {
            warn!(
                "skipping chunk {}: {} boundary words instead of {}",
                i,
                handle.pixel_data().len(),
                BOUNDARIES_PER_CHUNK
            );
            continue;
        }
        let (x, y) = handle.position();
        let key = ChunkKey::new(x, y);
        let chunk = chunks.ensure(key);
        if handle.created() {
            chunk.flags.insert(ChunkFlags::CREATED);
        }
        for (index, word) in handle.pixel_data().iter().enumerate() {
            if !word.is_zero() {
                chunk.apply_word(index, word, palette);
            }
            chunk.set_mutation_count(index, handle.changes(index));
        }
        loaded += 1;
    }
    info!("bootstrapped {} of {} chunks", loaded, count);
    Ok(loaded)
}
