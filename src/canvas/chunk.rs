// src/canvas/chunk.rs

//! The authoritative chunk cache.
//!
//! Each cached chunk mirrors what the ledger holds: a 128×128 RGBA raster
//! decoded from the chunk's 256 boundary words, the per-boundary mutation
//! counters driving the price climb, and state flags. RemoteSync is the only
//! writer; painting happens in [`crate::canvas::draw`] overlays instead.

use std::collections::BTreeMap;

use bitflags::bitflags;
use log::trace;
use serde::{Deserialize, Serialize};

use crate::boundary::BoundaryWord;
use crate::coords::{
    boundary_origin, raster_offset, BoundaryKey, ChunkKey, BOUNDARIES_PER_CHUNK,
    BOUNDARY_PIXELS, CHUNK_RASTER_BYTES,
};
use crate::palette::Palette;

bitflags! {
    /// Per-chunk cache state.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct ChunkFlags: u8 {
        /// The chunk exists on-chain.
        const CREATED = 1 << 0;
        /// The cached raster changed since the renderer last read it.
        const DAMAGED = 1 << 1;
    }
}

/// Cached state of one chunk.
#[derive(Debug, Clone)]
pub struct ChunkState {
    raster: Vec<u8>,
    mutations: [u32; BOUNDARIES_PER_CHUNK],
    pub flags: ChunkFlags,
}

impl ChunkState {
    /// A chunk raster holding nothing but background (opaque white).
    pub fn background() -> Self {
        ChunkState {
            raster: vec![0xFF; CHUNK_RASTER_BYTES],
            mutations: [0; BOUNDARIES_PER_CHUNK],
            flags: ChunkFlags::empty(),
        }
    }

    /// The chunk's RGBA raster, row-major 128×128.
    pub fn raster(&self) -> &[u8] {
        &self.raster
    }

    /// Writes one decoded boundary word into the raster. Every pixel is
    /// written as a whole 4-byte RGBA quad.
    pub fn apply_word(&mut self, boundary_index: usize, word: &BoundaryWord, palette: &Palette) {
        debug_assert!(boundary_index < BOUNDARIES_PER_CHUNK);
        let (origin_x, origin_y) = boundary_origin(boundary_index);
        let pixels = word.decode();
        for (offset, &index) in pixels.iter().enumerate() {
            let x = origin_x + offset % BOUNDARY_PIXELS as usize;
            let y = origin_y + offset / BOUNDARY_PIXELS as usize;
            let [r, g, b] = palette.rgb(index);
            let at = raster_offset(x, y);
            self.raster[at..at + 4].copy_from_slice(&[r, g, b, 0xFF]);
        }
        self.flags.insert(ChunkFlags::DAMAGED);
    }

    /// Mutation counter for a boundary grid index.
    pub fn mutation_count(&self, boundary_index: usize) -> u32 {
        self.mutations.get(boundary_index).copied().unwrap_or(0)
    }

    /// Sets a boundary's mutation counter to the ledger's authoritative
    /// value.
    pub fn set_mutation_count(&mut self, boundary_index: usize, count: u32) {
        if let Some(slot) = self.mutations.get_mut(boundary_index) {
            *slot = count;
        }
    }
}

/// All chunks known locally, keyed by chunk coordinates.
#[derive(Debug, Default)]
pub struct ChunkCache {
    chunks: BTreeMap<ChunkKey, ChunkState>,
}

impl ChunkCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: ChunkKey) -> Option<&ChunkState> {
        self.chunks.get(&key)
    }

    pub fn get_mut(&mut self, key: ChunkKey) -> Option<&mut ChunkState> {
        self.chunks.get_mut(&key)
    }

    /// Whether the chunk is known to exist on-chain.
    pub fn is_created(&self, key: ChunkKey) -> bool {
        self.chunks
            .get(&key)
            .map(|c| c.flags.contains(ChunkFlags::CREATED))
            .unwrap_or(false)
    }

    /// Inserts an all-background chunk if absent and returns it.
    pub fn ensure(&mut self, key: ChunkKey) -> &mut ChunkState {
        self.chunks.entry(key).or_insert_with(|| {
            trace!("caching new background chunk at ({}, {})", key.x, key.y);
            ChunkState::background()
        })
    }

    /// Mutation counter for an absolute boundary; zero when the chunk is
    /// not cached.
    pub fn mutation_count(&self, key: &BoundaryKey) -> u32 {
        self.chunks
            .get(&key.chunk)
            .map(|c| c.mutation_count(key.index()))
            .unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ChunkKey, &ChunkState)> {
        self.chunks.iter()
    }

    /// Chunks whose rasters changed since the renderer last drained damage,
    /// clearing the marker.
    pub fn drain_damage(&mut self) -> Vec<ChunkKey> {
        let mut damaged = Vec::new();
        for (key, chunk) in self.chunks.iter_mut() {
            if chunk.flags.contains(ChunkFlags::DAMAGED) {
                chunk.flags.remove(ChunkFlags::DAMAGED);
                damaged.push(*key);
            }
        }
        damaged
    }
}
