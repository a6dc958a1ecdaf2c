// src/ledger/mod.rs

//! The external ledger seam.
//!
//! Everything the pipeline needs from the chain goes through the [`Ledger`]
//! trait: capacity and gas-estimate queries, batch submission, chunk read
//! accessors for bootstrap, and polled events. Submission is fire-and-forget;
//! resolution (confirmation or rejection) arrives later as a
//! [`LedgerEvent::BatchResolved`]. Implementations own signing, broadcasting
//! and event decoding; the pipeline only reacts to what they report.

pub mod mock;

use anyhow::Result;

use crate::boundary::BoundaryWord;
use crate::canvas::draw::Change;
use crate::coords::{BoundaryKey, ChunkKey, BOUNDARIES_PER_CHUNK};

/// Identifies one submitted batch until its resolution event arrives.
pub type SubmissionId = u64;

/// One gas-bounded commit transaction: parallel arrays of absolute boundary
/// coordinates and packed values, plus the totals sent with it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Batch {
    pub xs: Vec<i32>,
    pub ys: Vec<i32>,
    pub values: Vec<BoundaryWord>,
    /// Summed per-change gas estimates.
    pub gas_estimate: u64,
    /// Aggregate price sent as the transaction value.
    pub value: u128,
}

impl Batch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one change with its gas estimate.
    pub fn push(&mut self, change: &Change, gas: u64) {
        let (x, y) = change.key.absolute();
        self.xs.push(x);
        self.ys.push(y);
        self.values.push(change.value);
        self.gas_estimate += gas;
        self.value += change.cost;
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Boundary keys of every change in the batch, rebuilt from the wire
    /// coordinates.
    pub fn boundary_keys(&self) -> Vec<BoundaryKey> {
        self.xs
            .iter()
            .zip(&self.ys)
            .map(|(&x, &y)| BoundaryKey::from_absolute(x, y))
            .collect()
    }
}

/// Resolution of a submitted batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOutcome {
    Confirmed,
    Rejected(String),
}

/// Events the ledger reports back to the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerEvent {
    /// A chunk now exists on-chain.
    ChunkCreated { key: ChunkKey },
    /// A boundary was rewritten. `boundary_index` is the raw wire value and
    /// may be out of range on a malformed payload; `change_count` is the
    /// boundary's authoritative post-commit mutation counter.
    ChunkUpdated {
        key: ChunkKey,
        boundary_index: u32,
        value: BoundaryWord,
        change_count: u32,
    },
    /// A previously submitted batch resolved.
    BatchResolved {
        id: SubmissionId,
        outcome: BatchOutcome,
    },
}

/// Snapshot of one chunk's on-chain state, served by the read accessors.
#[derive(Debug, Clone)]
pub struct ChunkHandle {
    position: (i32, i32),
    pixel_data: Vec<BoundaryWord>,
    changes: Vec<u32>,
    created: bool,
}

impl ChunkHandle {
    pub fn new(
        position: (i32, i32),
        pixel_data: Vec<BoundaryWord>,
        changes: Vec<u32>,
        created: bool,
    ) -> Self {
        debug_assert_eq!(pixel_data.len(), BOUNDARIES_PER_CHUNK);
        debug_assert_eq!(changes.len(), BOUNDARIES_PER_CHUNK);
        ChunkHandle {
            position,
            pixel_data,
            changes,
            created,
        }
    }

    pub fn position(&self) -> (i32, i32) {
        self.position
    }

    /// The chunk's 256 packed boundary words.
    pub fn pixel_data(&self) -> &[BoundaryWord] {
        &self.pixel_data
    }

    /// Mutation counter of one boundary grid index.
    pub fn changes(&self, boundary_index: usize) -> u32 {
        self.changes.get(boundary_index).copied().unwrap_or(0)
    }

    pub fn created(&self) -> bool {
        self.created
    }
}

/// The abstract ledger client.
///
/// All methods take `&mut self`: even reads may drive an underlying
/// connection. Every call is a suspension point in the cooperative model —
/// implementations may block, the pipeline never holds state it cannot
/// re-derive across a call.
pub trait Ledger {
    /// Current network capacity; the planner subtracts its safety margin
    /// before using it as the batch ceiling.
    fn block_gas_limit(&mut self) -> Result<u64>;

    /// Gas estimate for committing one change. Implementations distinguish
    /// changes into known-created chunks from changes that may first create
    /// their chunk.
    fn estimate_commit(&mut self, change: &Change) -> Result<u64>;

    /// Explicitly creates a chunk at chunk coordinates. Batches that touch
    /// chunks which do not exist yet create them implicitly; this is the
    /// standalone operation for callers that want the chunk first. Emits a
    /// [`LedgerEvent::ChunkCreated`].
    fn create_chunk(&mut self, x: i32, y: i32) -> Result<()>;

    /// Hands a batch to the chain. Returns an id whose resolution arrives
    /// later as [`LedgerEvent::BatchResolved`]; once this returns, the batch
    /// cannot be recalled.
    fn submit(&mut self, batch: Batch) -> Result<SubmissionId>;

    /// Drains events that arrived since the last poll.
    fn poll_events(&mut self) -> Result<Vec<LedgerEvent>>;

    /// Number of chunks that exist on-chain.
    fn chunk_count(&mut self) -> Result<u32>;

    /// Read accessors for the chunk at an enumeration index in
    /// `[0, chunk_count)`.
    fn chunk_handle(&mut self, index: u32) -> Result<ChunkHandle>;
}
