use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;

use mapreduce_rs::{
    run_map_reduce, AHashKeyHasher, Emit, JobOptions, MapFn, MemorySink, MemorySource, MrError, ReduceFn,
    SerdeJsonCodec, SinkEmit, WorkerPool,
};

fn options<K, V>(dir: &std::path::Path, shards: usize) -> JobOptions<K, V>
where
    K: std::hash::Hash + Serialize + DeserializeOwned + Send + Sync + 'static,
    V: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    JobOptions::new()
        .with_shards(shards)
        .with_worker_threads(4)
        .with_temp_dir(dir)
        .with_hasher(Arc::new(AHashKeyHasher::new()))
        .with_codec(Arc::new(SerdeJsonCodec))
}

#[test]
fn doubling_and_tripling_numbers() {
    let dir = tempfile::tempdir().unwrap();
    let src = MemorySource::new(vec![1i64, 3, 6, 7, 12, 20]);
    let sink = Arc::new(MemorySink::new());

    let map_fn: MapFn<i64, i64, i64> = Arc::new(|v: i64, emit: &SinkEmit<i64, i64>| {
        emit.emit(v, v * 2)?;
        emit.emit(v, v * 3)?;
        Ok(())
    });
    let reduce_fn: ReduceFn<i64, i64, f64> =
        Arc::new(|_key, values| Ok(values.iter().map(|v| *v as f64 + 0.2).sum()));

    run_map_reduce(&src, sink.clone(), map_fn, reduce_fn, options(dir.path(), 3)).unwrap();

    let mut out = sink.snapshot();
    out.sort_by(|a, b| a.partial_cmp(b).unwrap());
    assert_eq!(out.len(), 6);
    // v*2 + 0.2 + v*3 + 0.2 == 5v + 0.4
    let expected: Vec<f64> = [1i64, 3, 6, 7, 12, 20].iter().map(|v| *v as f64 * 5.0 + 0.4).collect();
    let mut expected_sorted = expected.clone();
    expected_sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
    assert_eq!(out, expected_sorted);
}

#[test]
fn a_record_larger_than_the_shuffle_buffer_survives_the_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let big_value = "x".repeat(50_000);
    let src = MemorySource::new(vec![("only-key".to_string(), big_value.clone())]);
    let sink = Arc::new(MemorySink::new());

    let map_fn: MapFn<(String, String), String, String> =
        Arc::new(|(k, v), emit: &SinkEmit<String, String>| emit.emit(k, v));
    let reduce_fn: ReduceFn<String, String, usize> = Arc::new(|_k, vs| Ok(vs[0].len()));

    let opts: JobOptions<String, String> = options(dir.path(), 1).with_buffer_bytes(1024);
    run_map_reduce(&src, sink.clone(), map_fn, reduce_fn, opts).unwrap();

    assert_eq!(sink.snapshot(), vec![big_value.len()]);
}

#[test]
fn a_failing_reduce_fn_surfaces_as_a_user_code_error() {
    let dir = tempfile::tempdir().unwrap();
    let src = MemorySource::new(vec![1i64, 2, 3]);
    let sink = Arc::new(MemorySink::new());

    let map_fn: MapFn<i64, i64, i64> = Arc::new(|v, emit: &SinkEmit<i64, i64>| emit.emit(v, v));
    let reduce_fn: ReduceFn<i64, i64, i64> = Arc::new(|k, vs| {
        if k == 2 {
            return Err(MrError::user_code("reduce refuses key 2"));
        }
        Ok(vs.iter().sum())
    });

    let err = run_map_reduce(&src, sink, map_fn, reduce_fn, options(dir.path(), 2)).unwrap_err();
    assert_eq!(err.kind(), "user-code");
}

#[test]
fn empty_input_is_not_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let src = MemorySource::new(Vec::<i64>::new());
    let sink = Arc::new(MemorySink::new());

    let map_fn: MapFn<i64, i64, i64> = Arc::new(|v, emit: &SinkEmit<i64, i64>| emit.emit(v, v));
    let reduce_fn: ReduceFn<i64, i64, i64> = Arc::new(|_k, vs| Ok(vs.iter().sum()));

    run_map_reduce(&src, sink.clone(), map_fn, reduce_fn, options(dir.path(), 4)).unwrap();
    assert!(sink.snapshot().is_empty());
}

#[test]
fn worker_pool_shuts_down_cleanly_after_a_job_with_no_zombie_workers() {
    let pool = WorkerPool::new(6);
    assert_eq!(pool.worker_count(), 6);
    for _ in 0..500 {
        pool.submit(|| {});
    }
    pool.wait_idle();
    drop(pool); // must join every worker thread without deadlocking
}
