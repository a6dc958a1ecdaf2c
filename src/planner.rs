// src/planner.rs

//! The batch planner and commit state machine.
//!
//! A commit run moves `Idle → Planning → Running → Waiting → Idle`. Planning
//! derives the change list from the draw space (aborting back to Idle, buffer
//! intact, if the diff fails). Running queries the network's block gas limit
//! once, then greedily packs changes — popped LIFO from the pending list —
//! into batches whose summed gas estimates never exceed the capacity
//! (limit minus a safety margin), submitting each closed batch. Waiting holds
//! until every submission resolves; rejected batches raise the error counter
//! but never abort the rest. The terminal report carries the committed
//! boundary keys so the caller can drop exactly those from the draw space.

use anyhow::{bail, Context, Result};
use log::{debug, info, warn};

use crate::canvas::chunk::ChunkCache;
use crate::canvas::draw::{Change, DrawSpace};
use crate::config::GasConfig;
use crate::coords::BoundaryKey;
use crate::ledger::{Batch, BatchOutcome, Ledger, SubmissionId};
use crate::pricing::PriceModel;

/// Observable phase of the commit state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlannerPhase {
    Idle,
    Planning,
    Running,
    Waiting,
}

/// Final accounting of one commit run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitReport {
    /// Changes the run started with.
    pub total: usize,
    /// Changes packed into batches (or dropped with an error).
    pub processed: usize,
    /// Batches handed to the ledger.
    pub batches: usize,
    /// Failed submissions, rejected batches and unpackable changes.
    pub errors: usize,
    /// Summed gas estimates of all submitted batches.
    pub gas_total: u64,
    /// Summed value of all submitted batches.
    pub value_total: u128,
    /// Boundaries whose batches confirmed.
    pub committed: Vec<BoundaryKey>,
}

impl CommitReport {
    /// Fraction of changes processed, in [0, 1].
    pub fn progress(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            self.processed as f64 / self.total as f64
        }
    }
}

#[derive(Debug)]
struct SubmittedBatch {
    id: SubmissionId,
    keys: Vec<BoundaryKey>,
}

#[derive(Debug)]
struct RunState {
    pending: Vec<Change>,
    total: usize,
    processed: usize,
    errors: usize,
    submitted: Vec<SubmittedBatch>,
    resolved: usize,
    committed: Vec<BoundaryKey>,
    gas_total: u64,
    value_total: u128,
}

impl RunState {
    fn new(changes: Vec<Change>) -> Self {
        RunState {
            total: changes.len(),
            pending: changes,
            processed: 0,
            errors: 0,
            submitted: Vec::new(),
            resolved: 0,
            committed: Vec::new(),
            gas_total: 0,
            value_total: 0,
        }
    }

    fn report(&self) -> CommitReport {
        CommitReport {
            total: self.total,
            processed: self.processed,
            batches: self.submitted.len(),
            errors: self.errors,
            gas_total: self.gas_total,
            value_total: self.value_total,
            committed: self.committed.clone(),
        }
    }
}

/// Drives commit runs against a [`Ledger`].
#[derive(Debug)]
pub struct CommitPlanner {
    safety_margin: u64,
    phase: PlannerPhase,
    run: Option<RunState>,
    finished: Option<CommitReport>,
}

impl CommitPlanner {
    pub fn new(gas: &GasConfig) -> Self {
        CommitPlanner {
            safety_margin: gas.safety_margin,
            phase: PlannerPhase::Idle,
            run: None,
            finished: None,
        }
    }

    pub fn phase(&self) -> PlannerPhase {
        self.phase
    }

    /// Whether a run is underway (planned, running or waiting).
    pub fn is_active(&self) -> bool {
        self.phase != PlannerPhase::Idle
    }

    /// Progress of the current or last run, in [0, 1].
    pub fn progress(&self) -> f64 {
        match (&self.run, &self.finished) {
            (Some(run), _) => run.report().progress(),
            (None, Some(report)) => report.progress(),
            (None, None) => 1.0,
        }
    }

    /// Plans a run: diffs the draw space into a change snapshot. Returns the
    /// number of changes planned; zero means there is nothing to commit and
    /// the planner stays idle. A diff failure propagates and leaves both the
    /// planner and the draw space untouched.
    pub fn begin(
        &mut self,
        draw: &DrawSpace,
        chunks: &ChunkCache,
        prices: &PriceModel,
    ) -> Result<usize> {
        if self.phase != PlannerPhase::Idle {
            bail!("commit already in progress ({:?})", self.phase);
        }
        let changes = draw
            .compute_changes(chunks, prices)
            .context("planning failed, nothing was submitted")?;
        if changes.is_empty() {
            debug!("nothing to commit");
            return Ok(0);
        }
        let total = changes.len();
        info!("planned {} changes", total);
        self.run = Some(RunState::new(changes));
        self.finished = None;
        self.phase = PlannerPhase::Planning;
        Ok(total)
    }

    /// Packs and submits the planned changes. On return the planner is
    /// Waiting for resolutions, or already Idle when nothing could be
    /// submitted. A capacity-query failure aborts the run before any
    /// submission.
    pub fn run(&mut self, ledger: &mut dyn Ledger) -> Result<()> {
        if self.phase != PlannerPhase::Planning {
            bail!("no planned run to execute ({:?})", self.phase);
        }
        self.phase = PlannerPhase::Running;

        let capacity = match self.query_capacity(ledger) {
            Ok(capacity) => capacity,
            Err(e) => {
                self.phase = PlannerPhase::Idle;
                self.run = None;
                return Err(e);
            }
        };

        let Some(run) = self.run.as_mut() else {
            self.phase = PlannerPhase::Idle;
            bail!("planner phase out of sync with run state");
        };
        let mut batch = Batch::new();
        while let Some(change) = run.pending.pop() {
            let estimate = match ledger.estimate_commit(&change) {
                Ok(gas) => gas,
                Err(e) => {
                    // The change still ships; it just cannot count toward
                    // the capacity bound.
                    warn!(
                        "gas estimate failed for boundary {:?}: {:#}; counting zero",
                        change.key.absolute(),
                        e
                    );
                    0
                }
            };

            if !batch.is_empty() && batch.gas_estimate + estimate > capacity {
                run.pending.push(change);
                Self::submit_batch(ledger, run, std::mem::take(&mut batch));
                continue;
            }
            if batch.is_empty() && estimate > capacity {
                warn!(
                    "boundary {:?} alone exceeds capacity ({} > {}), dropping",
                    change.key.absolute(),
                    estimate,
                    capacity
                );
                run.errors += 1;
                run.processed += 1;
                continue;
            }
            batch.push(&change, estimate);
            run.processed += 1;
        }
        if !batch.is_empty() {
            Self::submit_batch(ledger, run, batch);
        }

        let batches = run.submitted.len();
        if batches == 0 {
            info!("run ended with no submissions ({} errors)", run.errors);
            self.finish();
        } else {
            debug!("submitted {} batches, waiting for resolution", batches);
            self.phase = PlannerPhase::Waiting;
        }
        Ok(())
    }

    /// Feeds one batch resolution into the machine. Unknown ids are logged
    /// and ignored.
    pub fn handle_resolution(&mut self, id: SubmissionId, outcome: &BatchOutcome) {
        let Some(run) = self.run.as_mut() else {
            warn!("batch {} resolved with no run active", id);
            return;
        };
        let Some(batch) = run.submitted.iter().find(|b| b.id == id) else {
            warn!("resolution for unknown batch {}", id);
            return;
        };
        match outcome {
            BatchOutcome::Confirmed => {
                debug!("batch {} confirmed ({} boundaries)", id, batch.keys.len());
                let keys = batch.keys.clone();
                run.committed.extend(keys);
            }
            BatchOutcome::Rejected(reason) => {
                warn!("batch {} rejected: {}", id, reason);
                run.errors += 1;
            }
        }
        run.resolved += 1;
        if run.resolved == run.submitted.len() {
            self.finish();
        }
    }

    /// Terminal report of the last finished run, yielded once.
    pub fn poll_report(&mut self) -> Option<CommitReport> {
        self.finished.take()
    }

    /// Aborts whatever run is underway. Batches already submitted cannot be
    /// recalled; their resolutions will be ignored. Returns the partial
    /// report when a run was active.
    pub fn abort(&mut self) -> Option<CommitReport> {
        let run = self.run.take()?;
        let report = run.report();
        info!(
            "commit run aborted at {:.0}% ({} errors)",
            report.progress() * 100.0,
            report.errors
        );
        self.phase = PlannerPhase::Idle;
        self.finished = None;
        Some(report)
    }

    fn query_capacity(&self, ledger: &mut dyn Ledger) -> Result<u64> {
        let limit = ledger
            .block_gas_limit()
            .context("could not query block gas limit")?;
        let capacity = limit.saturating_sub(self.safety_margin);
        if capacity == 0 {
            bail!(
                "block gas limit {} leaves no capacity under safety margin {}",
                limit,
                self.safety_margin
            );
        }
        debug!("batch capacity: {} gas (limit {})", capacity, limit);
        Ok(capacity)
    }

    fn submit_batch(ledger: &mut dyn Ledger, run: &mut RunState, batch: Batch) {
        let keys = batch.boundary_keys();
        run.gas_total += batch.gas_estimate;
        run.value_total += batch.value;
        info!(
            "submitting batch of {} boundaries ({} gas, {} value units)",
            batch.len(),
            batch.gas_estimate,
            batch.value
        );
        match ledger.submit(batch) {
            Ok(id) => run.submitted.push(SubmittedBatch { id, keys }),
            Err(e) => {
                warn!("batch submission failed: {:#}", e);
                run.errors += 1;
            }
        }
    }

    fn finish(&mut self) {
        if let Some(run) = self.run.take() {
            let report = run.report();
            info!(
                "commit run finished: {}/{} changes, {} batches, {} errors",
                report.processed, report.total, report.batches, report.errors
            );
            self.finished = Some(report);
        }
        self.phase = PlannerPhase::Idle;
    }
}
