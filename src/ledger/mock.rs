// src/ledger/mock.rs

//! In-memory ledger for tests and the demo binary.
//!
//! Behaves like the real chain at the trait boundary: submissions apply
//! immediately to an in-memory chunk store and every observable effect is
//! reported back through the polled event queue, never synchronously.
//! Failure injection knobs cover the error paths the pipeline must survive.

use std::collections::BTreeMap;

use anyhow::{bail, ensure, Result};
use log::debug;

use crate::boundary::BoundaryWord;
use crate::canvas::draw::Change;
use crate::coords::{BoundaryKey, ChunkKey, BOUNDARIES_PER_CHUNK};
use crate::ledger::{Batch, BatchOutcome, ChunkHandle, Ledger, LedgerEvent, SubmissionId};

/// Fixed gas cost of updating one boundary in an existing chunk.
pub const GAS_ESTIMATE_CHUNK_UPDATE: u64 = 20_000;
/// Fixed gas cost of spawning a chunk contract.
pub const GAS_ESTIMATE_CHUNK_CREATE: u64 = 650_000;
/// Default network block gas limit.
pub const DEFAULT_BLOCK_GAS_LIMIT: u64 = 8_000_000;

#[derive(Debug, Clone)]
struct MockChunk {
    words: Vec<BoundaryWord>,
    changes: Vec<u32>,
}

impl MockChunk {
    fn new() -> Self {
        MockChunk {
            words: vec![BoundaryWord::ZERO; BOUNDARIES_PER_CHUNK],
            changes: vec![0; BOUNDARIES_PER_CHUNK],
        }
    }
}

/// Scriptable in-memory [`Ledger`].
#[derive(Debug, Default)]
pub struct MockLedger {
    chunks: BTreeMap<ChunkKey, MockChunk>,
    events: Vec<LedgerEvent>,
    submitted: Vec<Batch>,
    next_id: SubmissionId,
    /// Reasons to reject upcoming submissions, consumed in order.
    rejections: Vec<String>,
    /// Block gas limit served to the planner.
    pub gas_limit: u64,
    /// When set, every gas estimate call fails.
    pub fail_estimates: bool,
    /// When set, the gas limit query fails.
    pub fail_gas_limit: bool,
}

impl MockLedger {
    pub fn new() -> Self {
        MockLedger {
            gas_limit: DEFAULT_BLOCK_GAS_LIMIT,
            ..Default::default()
        }
    }

    /// Queues a rejection for the next unconsumed submission.
    pub fn reject_next(&mut self, reason: &str) {
        self.rejections.push(reason.to_string());
    }

    /// Injects an event as if it arrived from the chain.
    pub fn push_event(&mut self, event: LedgerEvent) {
        self.events.push(event);
    }

    /// Seeds a chunk as already existing on-chain, without emitting events.
    pub fn seed_chunk(&mut self, key: ChunkKey, words: Vec<BoundaryWord>, changes: Vec<u32>) {
        debug_assert_eq!(words.len(), BOUNDARIES_PER_CHUNK);
        debug_assert_eq!(changes.len(), BOUNDARIES_PER_CHUNK);
        self.chunks.insert(key, MockChunk { words, changes });
    }

    /// Every batch handed to [`Ledger::submit`], in order.
    pub fn submitted(&self) -> &[Batch] {
        &self.submitted
    }

    fn apply_batch(&mut self, batch: &Batch) {
        for ((&x, &y), &value) in batch.xs.iter().zip(&batch.ys).zip(&batch.values) {
            let key = BoundaryKey::from_absolute(x, y);
            if !self.chunks.contains_key(&key.chunk) {
                self.events.push(LedgerEvent::ChunkCreated { key: key.chunk });
            }
            let chunk = self.chunks.entry(key.chunk).or_insert_with(MockChunk::new);
            let index = key.index();
            chunk.words[index] = value;
            chunk.changes[index] += 1;
            self.events.push(LedgerEvent::ChunkUpdated {
                key: key.chunk,
                boundary_index: index as u32,
                value,
                change_count: chunk.changes[index],
            });
        }
    }
}

impl Ledger for MockLedger {
    fn block_gas_limit(&mut self) -> Result<u64> {
        if self.fail_gas_limit {
            bail!("gas limit query unavailable");
        }
        Ok(self.gas_limit)
    }

    fn estimate_commit(&mut self, change: &Change) -> Result<u64> {
        if self.fail_estimates {
            bail!("gas estimation unavailable");
        }
        Ok(if change.creates_chunk {
            GAS_ESTIMATE_CHUNK_CREATE + GAS_ESTIMATE_CHUNK_UPDATE
        } else {
            GAS_ESTIMATE_CHUNK_UPDATE
        })
    }

    fn create_chunk(&mut self, x: i32, y: i32) -> Result<()> {
        let key = ChunkKey::new(x, y);
        if self.chunks.contains_key(&key) {
            bail!("chunk ({}, {}) already exists", x, y);
        }
        self.chunks.insert(key, MockChunk::new());
        self.events.push(LedgerEvent::ChunkCreated { key });
        Ok(())
    }

    fn submit(&mut self, batch: Batch) -> Result<SubmissionId> {
        ensure!(
            batch.xs.len() == batch.ys.len() && batch.ys.len() == batch.values.len(),
            "batch arrays must be the same length"
        );
        let id = self.next_id;
        self.next_id += 1;

        if self.rejections.is_empty() {
            self.apply_batch(&batch);
            self.events.push(LedgerEvent::BatchResolved {
                id,
                outcome: BatchOutcome::Confirmed,
            });
        } else {
            let reason = self.rejections.remove(0);
            debug!("mock ledger rejecting submission {}: {}", id, reason);
            self.events.push(LedgerEvent::BatchResolved {
                id,
                outcome: BatchOutcome::Rejected(reason),
            });
        }
        self.submitted.push(batch);
        Ok(id)
    }

    fn poll_events(&mut self) -> Result<Vec<LedgerEvent>> {
        Ok(self.events.drain(..).collect())
    }

    fn chunk_count(&mut self) -> Result<u32> {
        Ok(self.chunks.len() as u32)
    }

    fn chunk_handle(&mut self, index: u32) -> Result<ChunkHandle> {
        let Some((key, chunk)) = self.chunks.iter().nth(index as usize) else {
            bail!("chunk index {} out of range", index);
        };
        Ok(ChunkHandle::new(
            (key.x, key.y),
            chunk.words.clone(),
            chunk.changes.clone(),
            true,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn change_at(x: i32, y: i32, creates_chunk: bool) -> Change {
        Change {
            key: BoundaryKey::from_absolute(x, y),
            value: BoundaryWord::encode(&[7; 64]),
            cost: 64 * 5_000_000_000_000,
            creates_chunk,
        }
    }

    #[test]
    fn submit_applies_and_reports_through_events() {
        let mut ledger = MockLedger::new();
        let mut batch = Batch::new();
        batch.push(&change_at(2, 2, true), GAS_ESTIMATE_CHUNK_CREATE);
        let id = ledger.submit(batch).unwrap();

        let events = ledger.poll_events().unwrap();
        assert_eq!(events.len(), 3);
        assert!(matches!(events[0], LedgerEvent::ChunkCreated { .. }));
        match &events[1] {
            LedgerEvent::ChunkUpdated {
                boundary_index,
                change_count,
                ..
            } => {
                assert_eq!(*boundary_index, 34);
                assert_eq!(*change_count, 1);
            }
            other => panic!("unexpected event {:?}", other),
        }
        assert_eq!(
            events[2],
            LedgerEvent::BatchResolved {
                id,
                outcome: BatchOutcome::Confirmed
            }
        );
        // Events drain exactly once.
        assert!(ledger.poll_events().unwrap().is_empty());
    }

    #[test]
    fn second_update_increments_the_counter() {
        let mut ledger = MockLedger::new();
        for _ in 0..2 {
            let mut batch = Batch::new();
            batch.push(&change_at(2, 2, false), GAS_ESTIMATE_CHUNK_UPDATE);
            ledger.submit(batch).unwrap();
        }
        let events = ledger.poll_events().unwrap();
        let counts: Vec<u32> = events
            .iter()
            .filter_map(|e| match e {
                LedgerEvent::ChunkUpdated { change_count, .. } => Some(*change_count),
                _ => None,
            })
            .collect();
        assert_eq!(counts, vec![1, 2]);
    }

    #[test]
    fn rejection_leaves_the_chain_untouched() {
        let mut ledger = MockLedger::new();
        ledger.reject_next("out of funds");
        let mut batch = Batch::new();
        batch.push(&change_at(2, 2, true), GAS_ESTIMATE_CHUNK_CREATE);
        let id = ledger.submit(batch).unwrap();

        let events = ledger.poll_events().unwrap();
        assert_eq!(events.len(), 1);
        assert!(matches!(
            &events[0],
            LedgerEvent::BatchResolved { id: got, outcome: BatchOutcome::Rejected(_) } if *got == id
        ));
        assert_eq!(ledger.chunk_count().unwrap(), 0);
    }

    #[test]
    fn explicit_chunk_creation_refuses_duplicates() {
        let mut ledger = MockLedger::new();
        ledger.create_chunk(0, 0).unwrap();
        assert!(ledger.create_chunk(0, 0).is_err());
        let events = ledger.poll_events().unwrap();
        assert_eq!(
            events,
            vec![LedgerEvent::ChunkCreated {
                key: ChunkKey::new(0, 0)
            }]
        );
        assert_eq!(ledger.chunk_count().unwrap(), 1);
    }

    #[test]
    fn chunk_handle_serves_read_accessors() {
        let mut ledger = MockLedger::new();
        let mut batch = Batch::new();
        batch.push(&change_at(-20, -20, true), GAS_ESTIMATE_CHUNK_CREATE);
        ledger.submit(batch).unwrap();
        ledger.poll_events().unwrap();

        assert_eq!(ledger.chunk_count().unwrap(), 1);
        let handle = ledger.chunk_handle(0).unwrap();
        assert_eq!(handle.position(), (-2, -2));
        assert!(handle.created());
        assert_eq!(handle.changes(204), 1);
        assert_eq!(handle.pixel_data()[204], BoundaryWord::encode(&[7; 64]));
        assert!(ledger.chunk_handle(1).is_err());
    }
}
