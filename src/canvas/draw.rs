// src/canvas/draw.rs

//! The draw space: uncommitted local edits layered over the chunk cache.
//!
//! Painting lazily creates a per-chunk overlay (a copy of the cached raster,
//! or plain background for chunks that do not exist yet) together with an
//! immutable snapshot of that starting state. Dirty tracking is per pixel,
//! folded into one 64-bit mask per boundary: a bit is set while the overlay
//! pixel differs from the snapshot, so painting a pixel back to its original
//! color drops it — and, when it was the last one, its whole boundary — out
//! of the pending diff.

use std::collections::BTreeMap;

use anyhow::{ensure, Result};
use log::{debug, trace};

use crate::boundary::BoundaryWord;
use crate::canvas::chunk::ChunkCache;
use crate::coords::{
    boundary_at, boundary_index, boundary_origin, pixel_in_chunk, pixel_to_chunk,
    raster_offset, BoundaryKey, ChunkKey, BOUNDARY_PIXELS, CHUNK_PIXELS,
    CHUNK_RASTER_BYTES, PIXELS_PER_BOUNDARY,
};
use crate::palette::Palette;
use crate::pricing::PriceModel;

/// One pending boundary update, derived at diff time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Change {
    pub key: BoundaryKey,
    pub value: BoundaryWord,
    /// Price in value units, from the mutation counter known at diff time.
    pub cost: u128,
    /// The owning chunk did not exist when painting began, so committing
    /// this change creates it.
    pub creates_chunk: bool,
}

/// Breakdown of pending work for the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PendingCounts {
    /// Chunks that will be created on commit.
    pub chunk_creations: usize,
    /// Boundaries that will be rewritten.
    pub boundary_updates: usize,
    /// Pixels currently differing from their snapshot.
    pub pixel_changes: usize,
}

/// Per-chunk overlay state.
#[derive(Debug, Clone)]
struct ChunkOverlay {
    overlay: Vec<u8>,
    snapshot: Vec<u8>,
    /// Whether the chunk was known created when the overlay was made.
    chunk_existed: bool,
    /// Boundary grid index → mask of pixels differing from the snapshot.
    dirty: BTreeMap<usize, u64>,
}

impl ChunkOverlay {
    fn pixel_bit(x: usize, y: usize) -> u64 {
        let bit =
            (x % BOUNDARY_PIXELS as usize) + BOUNDARY_PIXELS as usize * (y % BOUNDARY_PIXELS as usize);
        1u64 << bit
    }
}

/// The local edit buffer over all chunks.
#[derive(Debug)]
pub struct DrawSpace {
    palette: Palette,
    overlays: BTreeMap<ChunkKey, ChunkOverlay>,
}

impl DrawSpace {
    pub fn new(palette: Palette) -> Self {
        DrawSpace {
            palette,
            overlays: BTreeMap::new(),
        }
    }

    pub fn palette(&self) -> &Palette {
        &self.palette
    }

    /// Whether any pixel differs from its snapshot.
    pub fn has_pending(&self) -> bool {
        self.overlays.values().any(|ov| !ov.dirty.is_empty())
    }

    /// Lazily creates the overlay for a chunk: a copy of the cached raster
    /// when the chunk is cached, plain background otherwise. The snapshot is
    /// fixed at this moment; whether the chunk existed is captured with it.
    fn ensure(&mut self, key: ChunkKey, chunks: &ChunkCache) -> &mut ChunkOverlay {
        self.overlays.entry(key).or_insert_with(|| {
            let (overlay, chunk_existed) = match chunks.get(key) {
                Some(state) => (state.raster().to_vec(), chunks.is_created(key)),
                None => (vec![0xFF; CHUNK_RASTER_BYTES], false),
            };
            debug!(
                "draw space opened chunk ({}, {}) (existed: {})",
                key.x, key.y, chunk_existed
            );
            ChunkOverlay {
                snapshot: overlay.clone(),
                overlay,
                chunk_existed,
                dirty: BTreeMap::new(),
            }
        })
    }

    /// Paints one pixel of a chunk, `x`/`y` in chunk-local coordinates.
    ///
    /// No-op when the palette color's RGB already equals the snapshot RGB at
    /// that offset and the pixel is not currently dirty; this comparison is
    /// always against the snapshot, never the previous overlay value, so
    /// toggling a pixel away and back leaves no phantom dirty boundary.
    ///
    /// Returns whether the overlay was written.
    pub fn paint(
        &mut self,
        key: ChunkKey,
        x: usize,
        y: usize,
        palette_index: u8,
        chunks: &ChunkCache,
    ) -> bool {
        debug_assert!(x < CHUNK_PIXELS as usize && y < CHUNK_PIXELS as usize);
        let [r, g, b] = self.palette.rgb(palette_index);
        let entry = self.ensure(key, chunks);
        let offset = raster_offset(x, y);

        let now_dirty = entry.snapshot[offset..offset + 3] != [r, g, b];
        let was_dirty = entry.snapshot[offset..offset + 3] != entry.overlay[offset..offset + 3];
        if !now_dirty && !was_dirty {
            trace!("paint short-circuit at ({}, {}) in ({}, {})", x, y, key.x, key.y);
            return false;
        }

        // Whole-quad write so a concurrent reader never sees a torn pixel.
        entry.overlay[offset..offset + 4].copy_from_slice(&[r, g, b, 0xFF]);

        let index = boundary_index(
            (x / BOUNDARY_PIXELS as usize) as u8,
            (y / BOUNDARY_PIXELS as usize) as u8,
        );
        let bit = ChunkOverlay::pixel_bit(x, y);
        let mask = entry.dirty.entry(index).or_insert(0);
        if now_dirty {
            *mask |= bit;
        } else {
            *mask &= !bit;
        }
        if *mask == 0 {
            entry.dirty.remove(&index);
        }
        true
    }

    /// Paints one pixel addressed in world coordinates.
    pub fn paint_world(&mut self, px: i32, py: i32, palette_index: u8, chunks: &ChunkCache) -> bool {
        let key = pixel_to_chunk(px, py);
        let (x, y) = pixel_in_chunk(px, py);
        self.paint(key, x, y, palette_index, chunks)
    }

    /// Bulk-paints a quantized RGBA image with its top-left at a world
    /// position. Quantization runs in raster order with optional error
    /// diffusion; fully transparent source pixels are left unpainted.
    ///
    /// Returns the number of pixels painted.
    pub fn import_image(
        &mut self,
        origin_px: i32,
        origin_py: i32,
        width: usize,
        image: &mut [u8],
        dither_strength: f32,
        chunks: &ChunkCache,
    ) -> usize {
        let indices = self.palette.quantize_image(image, width, dither_strength);
        let mut painted = 0;
        for (pixel, &index) in indices.iter().enumerate() {
            if image[pixel * 4 + 3] == 0 {
                continue;
            }
            let px = origin_px + (pixel % width) as i32;
            let py = origin_py + (pixel / width) as i32;
            if self.paint_world(px, py, index, chunks) {
                painted += 1;
            }
        }
        debug!(
            "imported {}x{} image at ({}, {}): {} pixels painted",
            width,
            indices.len() / width.max(1),
            origin_px,
            origin_py,
            painted
        );
        painted
    }

    /// Derives the pending change list: one [`Change`] per boundary with at
    /// least one pixel differing from its snapshot, its value re-encoded
    /// from the current overlay and its cost priced from the mutation
    /// counter known now.
    pub fn compute_changes(
        &self,
        chunks: &ChunkCache,
        prices: &PriceModel,
    ) -> Result<Vec<Change>> {
        let mut changes = Vec::new();
        for (key, entry) in &self.overlays {
            ensure!(
                entry.overlay.len() == CHUNK_RASTER_BYTES,
                "overlay raster for chunk ({}, {}) is {} bytes",
                key.x,
                key.y,
                entry.overlay.len()
            );
            for (&index, &mask) in &entry.dirty {
                if mask == 0 {
                    continue;
                }
                let value = self.encode_boundary(entry, index);
                let (bx, by) = boundary_at(index);
                let boundary = BoundaryKey::new(*key, bx, by);
                let mutations = chunks.mutation_count(&boundary);
                let creates_chunk = !entry.chunk_existed;
                let cost = prices.change_cost(
                    mutations,
                    PIXELS_PER_BOUNDARY as u32,
                    creates_chunk,
                );
                changes.push(Change {
                    key: boundary,
                    value,
                    cost,
                    creates_chunk,
                });
            }
        }
        debug!("draw space diff produced {} changes", changes.len());
        Ok(changes)
    }

    /// Re-encodes one boundary's 64 overlay pixels into a packed word.
    fn encode_boundary(&self, entry: &ChunkOverlay, index: usize) -> BoundaryWord {
        let (origin_x, origin_y) = boundary_origin(index);
        let mut pixels = [0u8; PIXELS_PER_BOUNDARY];
        for (offset, slot) in pixels.iter_mut().enumerate() {
            let x = origin_x + offset % BOUNDARY_PIXELS as usize;
            let y = origin_y + offset / BOUNDARY_PIXELS as usize;
            let at = raster_offset(x, y);
            let rgb = &entry.overlay[at..at + 3];
            *slot = self.palette.quantize(rgb[0], rgb[1], rgb[2]);
        }
        BoundaryWord::encode(&pixels)
    }

    /// Pending-work breakdown for the UI: chunks to create, boundaries to
    /// rewrite, pixels differing.
    pub fn pending_counts(&self) -> PendingCounts {
        let mut counts = PendingCounts::default();
        for entry in self.overlays.values() {
            if entry.dirty.is_empty() {
                continue;
            }
            if !entry.chunk_existed {
                counts.chunk_creations += 1;
            }
            counts.boundary_updates += entry.dirty.len();
            counts.pixel_changes += entry
                .dirty
                .values()
                .map(|mask| mask.count_ones() as usize)
                .sum::<usize>();
        }
        counts
    }

    /// The raster the renderer should show for a chunk: the overlay when one
    /// exists, the cached raster otherwise.
    pub fn visible_raster<'a>(&'a self, key: ChunkKey, chunks: &'a ChunkCache) -> Option<&'a [u8]> {
        if let Some(entry) = self.overlays.get(&key) {
            return Some(&entry.overlay);
        }
        chunks.get(key).map(|state| state.raster())
    }

    /// Drops all overlays, snapshots and dirty markers. Idempotent.
    pub fn clear(&mut self) {
        if !self.overlays.is_empty() {
            debug!("draw space cleared ({} overlays dropped)", self.overlays.len());
        }
        self.overlays.clear();
    }

    /// Drops only the given boundaries from the pending state, keeping
    /// edits painted after a commit snapshot was taken. Overlays left with
    /// no dirty boundary are dropped wholesale.
    pub fn clear_boundaries(&mut self, committed: &[BoundaryKey]) {
        for key in committed {
            if let Some(entry) = self.overlays.get_mut(&key.chunk) {
                entry.dirty.remove(&key.index());
            }
        }
        self.overlays.retain(|_, entry| !entry.dirty.is_empty());
    }
}
