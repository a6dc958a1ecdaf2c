// src/main.rs

use std::path::Path;

use anyhow::Result;
use log::{info, warn};

use place_canvas::app::{App, Intent};
use place_canvas::config::Config;
use place_canvas::coords::ChunkKey;
use place_canvas::ledger::mock::MockLedger;

/// Demo driver: paints a small figure onto an in-memory ledger, commits it,
/// and narrates the pipeline as the confirmations come back.
fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_micros()
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => Config::load(Path::new(&path))?,
        None => {
            info!("no config file given, using defaults");
            Config::default()
        }
    };

    let mut ledger = MockLedger::new();
    let mut app = App::new(config, &mut ledger);

    let loaded = app.bootstrap()?;
    info!("bootstrap complete, {} chunks cached", loaded);

    // An 8x8 two-color checker across the chunk seam at the origin, plus a
    // stray pixel in negative space.
    for y in -4..4 {
        for x in -4..4 {
            let palette_index = if (x + y) % 2 == 0 { 5 } else { 13 };
            app.dispatch(Intent::Paint {
                px: x,
                py: y,
                palette_index,
            })?;
        }
    }
    app.dispatch(Intent::Paint {
        px: -160,
        py: -160,
        palette_index: 9,
    })?;

    let status = app.status();
    info!(
        "pending: {} chunk creations, {} boundary updates, {} pixels; ~{} gas, {} value units",
        status.pending.chunk_creations,
        status.pending.boundary_updates,
        status.pending.pixel_changes,
        status.gas_estimate,
        status.value_estimate
    );

    app.dispatch(Intent::Commit)?;

    while app.commit_in_flight() {
        let repaint = app.pump_events()?;
        for key in repaint {
            info!("chunk ({}, {}) needs repaint", key.x, key.y);
        }
    }
    // Pick up any events the final batch left behind.
    app.pump_events()?;

    match app.last_report() {
        Some(report) => info!(
            "commit done: {}/{} changes in {} batches, {} errors, {} gas, {} value units",
            report.processed,
            report.total,
            report.batches,
            report.errors,
            report.gas_total,
            report.value_total
        ),
        None => warn!("commit finished without a report"),
    }

    let key = ChunkKey::new(0, 0);
    if app.visible_raster(key).is_some() {
        info!("chunk (0, 0) raster available for rendering");
    }

    let status = app.status();
    info!(
        "final state: progress {:.0}%, {} errors, {} pixels pending",
        status.progress * 100.0,
        status.errors,
        status.pending.pixel_changes
    );

    Ok(())
}
