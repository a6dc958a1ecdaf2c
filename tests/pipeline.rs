// tests/pipeline.rs

//! End-to-end pipeline tests over the in-memory ledger: paint → diff →
//! price → batch → submit → events → cache convergence.

use place_canvas::app::{App, Intent};
use place_canvas::config::{Config, GasConfig};
use place_canvas::coords::{BoundaryKey, ChunkKey};
use place_canvas::ledger::mock::{MockLedger, GAS_ESTIMATE_CHUNK_UPDATE};
use place_canvas::ledger::{Ledger, LedgerEvent};
use place_canvas::palette::Palette;
use place_canvas::boundary::BoundaryWord;

fn drain(app: &mut App<'_>) {
    while app.commit_in_flight() {
        app.pump_events().unwrap();
    }
    app.pump_events().unwrap();
}

#[test_log::test]
fn paint_commit_and_converge() {
    let palette = Palette::default();
    let mut ledger = MockLedger::new();
    let mut app = App::new(Config::default(), &mut ledger);

    // Paint across two chunks, one of them in negative space.
    app.dispatch(Intent::Paint {
        px: 18,
        py: 18,
        palette_index: 5,
    })
    .unwrap();
    app.dispatch(Intent::Paint {
        px: -1,
        py: -1,
        palette_index: 13,
    })
    .unwrap();

    let status = app.status();
    assert_eq!(status.pending.chunk_creations, 2);
    assert_eq!(status.pending.boundary_updates, 2);
    assert_eq!(status.pending.pixel_changes, 2);

    app.dispatch(Intent::Commit).unwrap();
    drain(&mut app);

    // Both chunks exist now and carry the committed colors.
    let origin = app.visible_raster(ChunkKey::new(0, 0)).unwrap();
    let at = place_canvas::coords::raster_offset(18, 18);
    assert_eq!(&origin[at..at + 3], &palette.rgb(5));

    let negative = app.visible_raster(ChunkKey::new(-1, -1)).unwrap();
    let at = place_canvas::coords::raster_offset(127, 127);
    assert_eq!(&negative[at..at + 3], &palette.rgb(13));

    let status = app.status();
    assert_eq!(status.errors, 0);
    assert_eq!(status.pending.pixel_changes, 0);
    assert!((status.progress - 1.0).abs() < f64::EPSILON);
}

#[test]
fn toggled_pixel_never_reaches_the_ledger() {
    let mut ledger = MockLedger::new();
    let mut app = App::new(Config::default(), &mut ledger);

    app.dispatch(Intent::Paint {
        px: 7,
        py: 7,
        palette_index: 5,
    })
    .unwrap();
    // Back to the background color it started with.
    app.dispatch(Intent::Paint {
        px: 7,
        py: 7,
        palette_index: 0,
    })
    .unwrap();
    app.dispatch(Intent::Commit).unwrap();
    drain(&mut app);

    assert!(ledger.submitted().is_empty());
    assert_eq!(ledger.chunk_count().unwrap(), 0);
}

#[test]
fn tight_capacity_splits_batches_under_the_bound() {
    let mut ledger = MockLedger::new();
    let margin = GasConfig::default().safety_margin;
    let capacity = 2 * GAS_ESTIMATE_CHUNK_UPDATE;
    ledger.gas_limit = margin + capacity;
    // Pre-existing chunk so every change estimates at the flat update cost.
    ledger.seed_chunk(
        ChunkKey::new(0, 0),
        vec![BoundaryWord::ZERO; 256],
        vec![0; 256],
    );

    let mut app = App::new(Config::default(), &mut ledger);
    assert_eq!(app.bootstrap().unwrap(), 1);

    // Five dirty boundaries along the top row.
    for i in 0..5 {
        app.dispatch(Intent::Paint {
            px: i * 8,
            py: 0,
            palette_index: 5,
        })
        .unwrap();
    }
    app.dispatch(Intent::Commit).unwrap();
    drain(&mut app);

    let status = app.status();
    assert_eq!(status.errors, 0);
    assert_eq!(status.pending.pixel_changes, 0);

    assert_eq!(ledger.submitted().len(), 3); // 2 + 2 + 1
    for batch in ledger.submitted() {
        assert!(batch.gas_estimate <= capacity);
        assert!(batch.len() <= 2);
    }
    let total: usize = ledger.submitted().iter().map(|b| b.len()).sum();
    assert_eq!(total, 5);
}

#[test]
fn retry_after_rejection_succeeds() {
    let mut ledger = MockLedger::new();
    ledger.reject_next("wallet refused");
    let mut app = App::new(Config::default(), &mut ledger);

    app.dispatch(Intent::Paint {
        px: 40,
        py: 40,
        palette_index: 8,
    })
    .unwrap();
    app.dispatch(Intent::Commit).unwrap();
    drain(&mut app);

    let status = app.status();
    assert_eq!(status.errors, 1);
    assert_eq!(status.pending.pixel_changes, 1, "buffer preserved for retry");

    // User-initiated retry: same edits, new run.
    app.dispatch(Intent::Commit).unwrap();
    drain(&mut app);

    let status = app.status();
    assert_eq!(status.errors, 1, "old error stays visible");
    assert_eq!(status.pending.pixel_changes, 0);
    let key = BoundaryKey::from_absolute(5, 5);
    assert_eq!(app.chunks().mutation_count(&key), 1);
}

#[test]
fn remote_update_mid_edit_preserves_the_overlay() {
    let palette = Palette::default();
    let mut ledger = MockLedger::new();
    ledger.push_event(LedgerEvent::ChunkUpdated {
        key: ChunkKey::new(0, 0),
        boundary_index: 0,
        value: BoundaryWord::encode(&[3; 64]),
        change_count: 2,
    });

    let mut app = App::new(Config::default(), &mut ledger);
    app.dispatch(Intent::Paint {
        px: 0,
        py: 0,
        palette_index: 9,
    })
    .unwrap();

    let repaint = app.pump_events().unwrap();
    assert_eq!(repaint, vec![ChunkKey::new(0, 0)]);

    // The local pixel wins in the visible raster; the cache took the remote
    // word and counter.
    let raster = app.visible_raster(ChunkKey::new(0, 0)).unwrap();
    assert_eq!(&raster[0..3], &palette.rgb(9));
    let key = BoundaryKey::from_absolute(0, 0);
    assert_eq!(app.chunks().mutation_count(&key), 2);
    // The next diff prices against the remote counter.
    let estimate = app.status().value_estimate;
    assert!(estimate > 0);
}

#[test]
fn imported_image_lands_on_chain() {
    let palette = Palette::default();
    let mut ledger = MockLedger::new();
    let mut app = App::new(Config::default(), &mut ledger);

    // A 4x4 solid red image with one transparent corner.
    let mut rgba = Vec::new();
    for pixel in 0..16 {
        if pixel == 15 {
            rgba.extend_from_slice(&[0, 0, 0, 0]);
        } else {
            rgba.extend_from_slice(&[238, 0, 0, 255]);
        }
    }
    app.dispatch(Intent::ImportImage {
        px: 0,
        py: 0,
        width: 4,
        rgba,
    })
    .unwrap();
    assert_eq!(app.status().pending.pixel_changes, 15);

    app.dispatch(Intent::Commit).unwrap();
    drain(&mut app);

    let raster = app.visible_raster(ChunkKey::new(0, 0)).unwrap();
    let red = palette.rgb(5);
    let at = place_canvas::coords::raster_offset(0, 0);
    assert_eq!(&raster[at..at + 3], &red);
    // The transparent corner stayed background.
    let corner = place_canvas::coords::raster_offset(3, 3);
    assert_eq!(&raster[corner..corner + 3], &[0xFF, 0xFF, 0xFF]);
}
