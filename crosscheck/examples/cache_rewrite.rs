//! Validating a cache-layer rewrite against the legacy read path.
//!
//! Run with `cargo run --example cache_rewrite` to see mismatch logging;
//! the rewrite carries an intentional defect on every tenth key.

use crosscheck::{Experiment, LogPublisher};

fn legacy_lookup(key: u64) -> u64 {
    key.wrapping_mul(31).rotate_left(7)
}

fn rewritten_lookup(key: u64) -> u64 {
    let value = legacy_lookup(key);
    // Simulated defect: the rewrite drops the low bit on every tenth key.
    if key % 10 == 0 { value & !1 } else { value }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter("crosscheck=debug")
        .init();

    let mut mismatches = 0;
    for key in 0..100_u64 {
        let config = Experiment::<u64>::new("cache-read-rewrite")
            .control(move || legacy_lookup(key))
            .candidate("rewritten", move || rewritten_lookup(key))
            .context("key", key)
            .publisher(LogPublisher)
            .throw_on_mismatch(true)
            .build()?;

        if let Err(err) = config.run() {
            mismatches += 1;
            eprintln!("key {key}: {err}");
        }
    }

    println!("observed {mismatches} mismatching keys out of 100");
    Ok(())
}
