// src/canvas/mod.rs

//! Local canvas state.
//!
//! Two layers live here: `chunk` is the cached authoritative raster state
//! mirrored from the ledger, and `draw` is the uncommitted local overlay a
//! user paints into. The draw space is authoritative for rendering until a
//! commit or revert; remote updates only ever land in the chunk cache.

pub mod chunk;
pub mod draw;

pub use chunk::{ChunkCache, ChunkFlags, ChunkState};
pub use draw::{Change, DrawSpace, PendingCounts};
