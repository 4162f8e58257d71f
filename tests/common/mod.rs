//! Shared helpers for integration tests.

#![allow(dead_code)]

use std::sync::Once;

use cellgraph::{Cell, Key};
use tracing_subscriber::EnvFilter;

static TRACING: Once = Once::new();

/// Install a test subscriber once per test binary. `RUST_LOG` controls the level.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

pub fn cell(row: &str, cf: &str, cq: &str, vis: &str, ts: i64, value: &[u8]) -> Cell {
    Cell::new(Key::new(row, cf, cq, vis, ts), value.to_vec())
}

/// Qualifier made of `parts` joined with the reserved separator.
pub fn q(parts: &[&str]) -> String {
    parts.join("\u{1f}")
}
