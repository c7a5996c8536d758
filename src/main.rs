//! A tiny demo job: doubles and triples each input number, then sums the
//! two emissions per key back into one float. Not part of the library's
//! public API — a usage example for the CLI, wired against `mapreduce_rs`
//! the same way any other crate would embed it.

use std::sync::Arc;

use anyhow::Result;
use mapreduce_rs::{
    init_tracing_once, run_map_reduce, AHashKeyHasher, Emit, JobOptions, MapFn, MemorySink, MemorySource, ReduceFn,
    SerdeJsonCodec, SinkEmit,
};

fn main() -> Result<()> {
    init_tracing_once();

    let numbers = vec![1i64, 3, 6, 7, 12, 20];
    let src = MemorySource::new(numbers);
    let sink = Arc::new(MemorySink::new());

    let map_fn: MapFn<i64, i64, i64> = Arc::new(|v: i64, emit: &SinkEmit<i64, i64>| {
        tracing::info!(v, doubled = v * 2, tripled = v * 3, "emit");
        emit.emit(v, v * 2)?;
        emit.emit(v, v * 3)?;
        Ok(())
    });

    let reduce_fn: ReduceFn<i64, i64, f64> = Arc::new(|key, values| {
        let total: f64 = values.iter().map(|v| *v as f64 + 0.2).sum();
        tracing::info!(key, total, "reduce");
        Ok(total)
    });

    let dir = std::env::temp_dir().join("mapreduce-rs-demo");
    let options = JobOptions::new()
        .with_shards(4)
        .with_temp_dir(&dir)
        .with_hasher(Arc::new(AHashKeyHasher::new()))
        .with_codec(Arc::new(SerdeJsonCodec));

    run_map_reduce(&src, sink.clone(), map_fn, reduce_fn, options)?;

    for d in sink.snapshot() {
        println!("REDUCED: {d}");
    }

    Ok(())
}
