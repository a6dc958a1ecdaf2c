// src/app.rs

//! Orchestrates the pipeline: user intents in, ledger traffic out.
//!
//! The `App` owns the chunk cache, the draw space and the commit planner,
//! and talks to the chain exclusively through a borrowed [`Ledger`]. UI
//! callbacks only dispatch [`Intent`]s; all state transitions happen here or
//! in the components. One call to [`App::pump_events`] per tick of the host
//! event loop keeps remote state and in-flight commits moving.

use anyhow::Result;
use log::{debug, info};

use crate::canvas::chunk::ChunkCache;
use crate::canvas::draw::{DrawSpace, PendingCounts};
use crate::config::Config;
use crate::coords::ChunkKey;
use crate::ledger::{Ledger, LedgerEvent};
use crate::planner::{CommitPlanner, CommitReport, PlannerPhase};
use crate::pricing::PriceModel;
use crate::sync;

/// A user-facing operation on the pipeline.
#[derive(Debug, Clone)]
pub enum Intent {
    /// Paint one world pixel with a palette color.
    Paint { px: i32, py: i32, palette_index: u8 },
    /// Quantize and paint a decoded RGBA image with its top-left at a world
    /// position.
    ImportImage {
        px: i32,
        py: i32,
        width: usize,
        rgba: Vec<u8>,
    },
    /// Diff, price, batch and submit all pending edits.
    Commit,
    /// Discard all pending edits; in-flight batches cannot be recalled.
    Revert,
}

/// Snapshot of pipeline state for the UI.
#[derive(Debug, Clone, PartialEq)]
pub struct AppStatus {
    pub phase: PlannerPhase,
    pub pending: PendingCounts,
    /// Flat gas estimate for the pending work.
    pub gas_estimate: u64,
    /// Summed price of the pending work in value units.
    pub value_estimate: u128,
    /// Progress of the current or last commit run, in [0, 1].
    pub progress: f64,
    /// Errors accumulated across commit runs.
    pub errors: usize,
}

/// The pipeline orchestrator.
pub struct App<'a> {
    config: Config,
    ledger: &'a mut dyn Ledger,
    chunks: ChunkCache,
    draw: DrawSpace,
    prices: PriceModel,
    planner: CommitPlanner,
    last_report: Option<CommitReport>,
    errors_total: usize,
}

impl<'a> App<'a> {
    pub fn new(config: Config, ledger: &'a mut dyn Ledger) -> Self {
        let draw = DrawSpace::new(config.palette.clone());
        let prices = PriceModel::new(config.pricing);
        let planner = CommitPlanner::new(&config.gas);
        App {
            config,
            ledger,
            chunks: ChunkCache::new(),
            draw,
            prices,
            planner,
            last_report: None,
            errors_total: 0,
        }
    }

    /// Loads all chunks that already exist on-chain into the cache.
    pub fn bootstrap(&mut self) -> Result<usize> {
        sync::bootstrap(self.ledger, &mut self.chunks, self.draw.palette())
    }

    /// Dispatches one user intent.
    pub fn dispatch(&mut self, intent: Intent) -> Result<()> {
        match intent {
            Intent::Paint {
                px,
                py,
                palette_index,
            } => {
                self.draw.paint_world(px, py, palette_index, &self.chunks);
                Ok(())
            }
            Intent::ImportImage {
                px,
                py,
                width,
                mut rgba,
            } => {
                self.draw.import_image(
                    px,
                    py,
                    width,
                    &mut rgba,
                    self.config.import.dither_strength,
                    &self.chunks,
                );
                Ok(())
            }
            Intent::Commit => self.commit(),
            Intent::Revert => {
                self.draw.clear();
                if let Some(report) = self.planner.abort() {
                    self.errors_total += report.errors;
                    self.last_report = Some(report);
                }
                Ok(())
            }
        }
    }

    fn commit(&mut self) -> Result<()> {
        let planned = self.planner.begin(&self.draw, &self.chunks, &self.prices)?;
        if planned == 0 {
            return Ok(());
        }
        self.planner.run(self.ledger)
    }

    /// Polls the ledger once and routes every event: chunk updates into the
    /// cache, batch resolutions into the planner. Returns the chunks whose
    /// rasters changed and need a repaint.
    pub fn pump_events(&mut self) -> Result<Vec<ChunkKey>> {
        let mut repaint = Vec::new();
        for event in self.ledger.poll_events()? {
            match event {
                LedgerEvent::BatchResolved { id, outcome } => {
                    self.planner.handle_resolution(id, &outcome);
                }
                other => {
                    if let Some(key) =
                        sync::apply_event(&mut self.chunks, self.draw.palette(), &other)
                    {
                        repaint.push(key);
                    }
                }
            }
        }

        if let Some(report) = self.planner.poll_report() {
            self.errors_total += report.errors;
            if report.errors == 0 {
                // Only the boundaries this run committed are dropped, so
                // edits painted while it was in flight stay pending.
                self.draw.clear_boundaries(&report.committed);
                info!("commit confirmed: {} boundaries", report.committed.len());
            } else {
                debug!(
                    "commit finished with {} errors; draw space kept for retry",
                    report.errors
                );
            }
            self.last_report = Some(report);
        }
        Ok(repaint)
    }

    /// Current pipeline status for the UI.
    pub fn status(&self) -> AppStatus {
        let pending = self.draw.pending_counts();
        let gas_estimate = pending.chunk_creations as u64 * self.config.gas.chunk_creation_gas
            + pending.boundary_updates as u64 * self.config.gas.boundary_update_gas;
        let value_estimate = self
            .draw
            .compute_changes(&self.chunks, &self.prices)
            .map(|changes| changes.iter().map(|c| c.cost).sum())
            .unwrap_or(0);
        AppStatus {
            phase: self.planner.phase(),
            pending,
            gas_estimate,
            value_estimate,
            progress: self.planner.progress(),
            errors: self.errors_total,
        }
    }

    /// Whether a commit run is still planned, running or waiting.
    pub fn commit_in_flight(&self) -> bool {
        self.planner.is_active()
    }

    /// Report of the last finished or aborted run.
    pub fn last_report(&self) -> Option<&CommitReport> {
        self.last_report.as_ref()
    }

    /// The raster the renderer should draw for a chunk: local overlay when
    /// present, cached chunk state otherwise.
    pub fn visible_raster(&self, key: ChunkKey) -> Option<&[u8]> {
        self.draw.visible_raster(key, &self.chunks)
    }

    pub fn chunks(&self) -> &ChunkCache {
        &self.chunks
    }

    pub fn draw_space(&self) -> &DrawSpace {
        &self.draw
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coords::BoundaryKey;
    use crate::ledger::mock::MockLedger;
    use crate::palette::Palette;

    fn drain(app: &mut App<'_>) {
        while app.commit_in_flight() {
            app.pump_events().unwrap();
        }
        // One more poll picks up remote events from the final batch.
        app.pump_events().unwrap();
    }

    #[test]
    fn paint_commit_confirm_clears_pending() {
        let mut ledger = MockLedger::new();
        let mut app = App::new(Config::default(), &mut ledger);

        app.dispatch(Intent::Paint {
            px: 18,
            py: 18,
            palette_index: 5,
        })
        .unwrap();
        assert_eq!(app.status().pending.boundary_updates, 1);
        assert!(app.status().value_estimate > 0);

        app.dispatch(Intent::Commit).unwrap();
        drain(&mut app);

        let status = app.status();
        assert_eq!(status.pending, PendingCounts::default());
        assert_eq!(status.errors, 0);
        assert!((status.progress - 1.0).abs() < f64::EPSILON);
        // The confirmed update came back around into the cache.
        let key = BoundaryKey::from_absolute(2, 2);
        assert_eq!(app.chunks().mutation_count(&key), 1);
        assert!(app.chunks().is_created(key.chunk));
    }

    #[test]
    fn second_commit_pays_the_climbed_price() {
        let mut ledger = MockLedger::new();
        let mut app = App::new(Config::default(), &mut ledger);

        app.dispatch(Intent::Paint {
            px: 18,
            py: 18,
            palette_index: 5,
        })
        .unwrap();
        app.dispatch(Intent::Commit).unwrap();
        drain(&mut app);

        app.dispatch(Intent::Paint {
            px: 18,
            py: 18,
            palette_index: 7,
        })
        .unwrap();
        let first = app.last_report().unwrap().value_total;
        let estimate = app.status().value_estimate;
        // Mutation counter is now 1, so the climb doubles the price, and no
        // creation fee applies anymore.
        let prices = PriceModel::new(Config::default().pricing);
        assert_eq!(estimate, prices.boundary_cost(1, 64));
        assert!(first > prices.boundary_cost(0, 64));
    }

    #[test]
    fn revert_discards_pending_edits_idempotently() {
        let mut ledger = MockLedger::new();
        let mut app = App::new(Config::default(), &mut ledger);
        app.dispatch(Intent::Paint {
            px: 0,
            py: 0,
            palette_index: 9,
        })
        .unwrap();
        app.dispatch(Intent::Revert).unwrap();
        let once = app.status();
        app.dispatch(Intent::Revert).unwrap();
        let twice = app.status();
        assert_eq!(once.pending, PendingCounts::default());
        assert_eq!(once.pending, twice.pending);
        assert_eq!(once.value_estimate, 0);
    }

    #[test]
    fn rejected_run_keeps_the_buffer_and_counts_errors() {
        let mut ledger = MockLedger::new();
        ledger.reject_next("rejected by wallet");
        let mut app = App::new(Config::default(), &mut ledger);
        app.dispatch(Intent::Paint {
            px: 0,
            py: 0,
            palette_index: 9,
        })
        .unwrap();
        app.dispatch(Intent::Commit).unwrap();
        drain(&mut app);

        let status = app.status();
        assert_eq!(status.errors, 1);
        assert_eq!(status.pending.boundary_updates, 1, "buffer kept for retry");
    }

    #[test]
    fn remote_paint_shows_through_after_bootstrap() {
        let palette = Palette::default();
        let mut ledger = MockLedger::new();
        // Another user's pixels, already on-chain before we start.
        {
            let mut other = App::new(Config::default(), &mut ledger);
            other
                .dispatch(Intent::Paint {
                    px: 0,
                    py: 0,
                    palette_index: 13,
                })
                .unwrap();
            other.dispatch(Intent::Commit).unwrap();
            while other.commit_in_flight() {
                other.pump_events().unwrap();
            }
        }

        let mut app = App::new(Config::default(), &mut ledger);
        assert_eq!(app.bootstrap().unwrap(), 1);
        let raster = app.visible_raster(ChunkKey::new(0, 0)).unwrap();
        assert_eq!(&raster[0..3], &palette.rgb(13));
    }

    #[test]
    fn import_intent_paints_through_quantization() {
        let mut ledger = MockLedger::new();
        let mut app = App::new(Config::default(), &mut ledger);
        app.dispatch(Intent::ImportImage {
            px: 0,
            py: 0,
            width: 2,
            rgba: vec![230, 0, 0, 255, 0, 0, 0, 0],
        })
        .unwrap();
        let pending = app.status().pending;
        assert_eq!(pending.pixel_changes, 1);
        assert_eq!(pending.chunk_creations, 1);
    }
}
