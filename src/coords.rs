// src/coords.rs

//! World-position addressing for the chunked canvas.
//!
//! ## Coordinate Systems
//!
//! The canvas uses three nested coordinate systems:
//!
//! 1. **World pixels** (i32): absolute pixel positions on the infinite
//!    canvas. May be negative in either axis.
//!
//! 2. **Boundary coordinates** (i32): absolute position of an 8×8 pixel
//!    boundary, `floor(pixel / 8)`. This is the addressing the ledger's
//!    `commit` call takes on the wire.
//!
//! 3. **Chunk coordinates** (i32): position of a 128×128 pixel chunk,
//!    `floor(pixel / 128)` — equivalently `floor(boundary / 16)`.
//!
//! ## Conversion Rules
//!
//! - Pixel → Chunk: `px.div_euclid(128)` (floor division, correct for
//!   negative positions).
//! - Pixel → in-chunk boundary: `px.div_euclid(8).rem_euclid(16)` (true
//!   mathematical modulo, always non-negative).
//! - Boundary index inside a chunk: `bx + 16 * by`, range [0, 256).
//! - Pixel offset inside a boundary: `x + 8 * y`, range [0, 64).
//!
//! All functions here are pure and total; out-of-range inputs cannot occur
//! because the integer conversions are closed over `i32`.

use serde::{Deserialize, Serialize};

/// Chunk edge length in pixels.
pub const CHUNK_PIXELS: i32 = 128;
/// Boundary edge length in pixels.
pub const BOUNDARY_PIXELS: i32 = 8;
/// Boundaries along one chunk edge.
pub const CHUNK_BOUNDARIES: i32 = 16;
/// Boundaries in a whole chunk (16×16).
pub const BOUNDARIES_PER_CHUNK: usize = 256;
/// Pixels in a whole boundary (8×8).
pub const PIXELS_PER_BOUNDARY: usize = 64;
/// Bytes per RGBA pixel in a raster.
pub const BYTES_PER_PIXEL: usize = 4;
/// Bytes in a full chunk raster (128×128 RGBA).
pub const CHUNK_RASTER_BYTES: usize =
    (CHUNK_PIXELS as usize) * (CHUNK_PIXELS as usize) * BYTES_PER_PIXEL;

/// Identifies one chunk by its chunk-space coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChunkKey {
    pub x: i32,
    pub y: i32,
}

impl ChunkKey {
    pub fn new(x: i32, y: i32) -> Self {
        ChunkKey { x, y }
    }
}

/// Identifies one boundary: its owning chunk plus its 16×16 grid position
/// within that chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BoundaryKey {
    pub chunk: ChunkKey,
    pub bx: u8,
    pub by: u8,
}

impl BoundaryKey {
    pub fn new(chunk: ChunkKey, bx: u8, by: u8) -> Self {
        debug_assert!((bx as i32) < CHUNK_BOUNDARIES && (by as i32) < CHUNK_BOUNDARIES);
        BoundaryKey { chunk, bx, by }
    }

    /// Index of this boundary inside its chunk's 16×16 grid, [0, 256).
    pub fn index(&self) -> usize {
        boundary_index(self.bx, self.by)
    }

    /// Absolute boundary coordinates, the addressing `commit` takes on the
    /// wire: `chunk * 16 + local`.
    pub fn absolute(&self) -> (i32, i32) {
        (
            self.chunk.x * CHUNK_BOUNDARIES + self.bx as i32,
            self.chunk.y * CHUNK_BOUNDARIES + self.by as i32,
        )
    }

    /// Rebuilds a key from absolute boundary coordinates.
    pub fn from_absolute(bx: i32, by: i32) -> Self {
        BoundaryKey {
            chunk: ChunkKey::new(
                bx.div_euclid(CHUNK_BOUNDARIES),
                by.div_euclid(CHUNK_BOUNDARIES),
            ),
            bx: bx.rem_euclid(CHUNK_BOUNDARIES) as u8,
            by: by.rem_euclid(CHUNK_BOUNDARIES) as u8,
        }
    }
}

/// Chunk owning a world pixel position.
pub fn pixel_to_chunk(px: i32, py: i32) -> ChunkKey {
    ChunkKey::new(px.div_euclid(CHUNK_PIXELS), py.div_euclid(CHUNK_PIXELS))
}

/// Pixel position inside its chunk, [0, 128) each axis.
pub fn pixel_in_chunk(px: i32, py: i32) -> (usize, usize) {
    (
        px.rem_euclid(CHUNK_PIXELS) as usize,
        py.rem_euclid(CHUNK_PIXELS) as usize,
    )
}

/// In-chunk boundary position of a world pixel, [0, 16) each axis.
pub fn pixel_to_boundary(px: i32, py: i32) -> (u8, u8) {
    (
        px.div_euclid(BOUNDARY_PIXELS).rem_euclid(CHUNK_BOUNDARIES) as u8,
        py.div_euclid(BOUNDARY_PIXELS).rem_euclid(CHUNK_BOUNDARIES) as u8,
    )
}

/// Pixel position inside its boundary, [0, 8) each axis.
pub fn pixel_in_boundary(px: i32, py: i32) -> (u8, u8) {
    (
        px.rem_euclid(BOUNDARY_PIXELS) as u8,
        py.rem_euclid(BOUNDARY_PIXELS) as u8,
    )
}

/// Offset of a world pixel inside its boundary's 64-pixel block, [0, 64).
pub fn pixel_offset_in_boundary(px: i32, py: i32) -> usize {
    let (x, y) = pixel_in_boundary(px, py);
    x as usize + BOUNDARY_PIXELS as usize * y as usize
}

/// Full boundary key for a world pixel.
pub fn pixel_to_boundary_key(px: i32, py: i32) -> BoundaryKey {
    let (bx, by) = pixel_to_boundary(px, py);
    BoundaryKey::new(pixel_to_chunk(px, py), bx, by)
}

/// Index of an in-chunk boundary position in the 16×16 grid, [0, 256).
pub fn boundary_index(bx: u8, by: u8) -> usize {
    bx as usize + CHUNK_BOUNDARIES as usize * by as usize
}

/// In-chunk boundary position for a grid index, the inverse of
/// [`boundary_index`].
pub fn boundary_at(index: usize) -> (u8, u8) {
    debug_assert!(index < BOUNDARIES_PER_CHUNK);
    (
        (index % CHUNK_BOUNDARIES as usize) as u8,
        (index / CHUNK_BOUNDARIES as usize) as u8,
    )
}

/// Top-left in-chunk pixel position of a boundary grid index. Used when
/// placing a decoded boundary word into a chunk raster.
pub fn boundary_origin(index: usize) -> (usize, usize) {
    let (bx, by) = boundary_at(index);
    (
        bx as usize * BOUNDARY_PIXELS as usize,
        by as usize * BOUNDARY_PIXELS as usize,
    )
}

/// Chunk owning an absolute boundary coordinate.
pub fn boundary_to_chunk(bx: i32, by: i32) -> ChunkKey {
    ChunkKey::new(
        bx.div_euclid(CHUNK_BOUNDARIES),
        by.div_euclid(CHUNK_BOUNDARIES),
    )
}

/// Byte offset of an in-chunk pixel position in a chunk's RGBA raster.
pub fn raster_offset(x: usize, y: usize) -> usize {
    (x + CHUNK_PIXELS as usize * y) * BYTES_PER_PIXEL
}
