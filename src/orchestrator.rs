//! Wires a source, a map function, the hash-sharded shuffle, a reduce
//! function, and a sink into one job run.
//!
//! The state machine is `init -> mapping -> shuffle handoff -> reducing ->
//! done`, with `aborted` reachable from any state once the first error
//! lands in the shared [`ErrorSlot`]. Configuration is validated up front
//! so a misconfigured job never spawns a worker thread or creates a shard
//! file.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use crate::config::JobOptions;
use crate::error::MrError;
use crate::error_slot::ErrorSlot;
use crate::kv_sink::ShardedKVSink;
use crate::map_stage::{run_map_stage, MapFn};
use crate::pool::WorkerPool;
use crate::progress::{make_stage_spinner, tick_callback};
use crate::reduce_stage::{run_reduce_stage, ReduceFn};
use crate::sink::Sink;
use crate::source::Source;

/// Runs one map-reduce job to completion.
///
/// Pulls every record from `src`, maps it into a hash-sharded shuffle
/// spill, barriers, groups and reduces each key, and writes every reduce
/// output to `sink`. On success the shard files are removed; on failure
/// they are left in place under `options.temp_dir` for post-mortem
/// inspection.
///
/// Spawns a fresh [`WorkerPool`] for this one job and tears it down on
/// return. Callers who want to run several jobs back to back without
/// paying pool-spawn cost each time should use [`MapReduceJob`] instead.
///
/// Returns the first error recorded by either stage, if any.
pub fn run_map_reduce<In, K, V, Out>(
    src: &dyn Source<In>,
    sink: Arc<dyn Sink<Out>>,
    map_fn: MapFn<In, K, V>,
    reduce_fn: ReduceFn<K, V, Out>,
    options: JobOptions<K, V>,
) -> Result<(), MrError>
where
    In: Send + 'static,
    K: std::hash::Hash + Eq + Send + 'static,
    V: Send + 'static,
    Out: Send + 'static,
{
    options.validate()?;
    let pool = WorkerPool::new(options.worker_threads);
    execute(&pool, src, sink, map_fn, reduce_fn, &options)
}

/// Owns a [`WorkerPool`] and a validated [`JobOptions`] across the
/// lifetime of more than one job run, for callers who would otherwise pay
/// pool-spawn and -teardown cost on every call to [`run_map_reduce`].
///
/// Each [`MapReduceJob::run`] call runs one complete map/shuffle/reduce
/// pipeline against this job's shared pool — the pool itself still
/// outlives both stages within any single run, as it does inside the free
/// function, it is just not rebuilt between runs.
pub struct MapReduceJob<In, K, V, Out> {
    options: JobOptions<K, V>,
    pool: WorkerPool,
    _marker: std::marker::PhantomData<fn(In) -> Out>,
}

impl<In, K, V, Out> MapReduceJob<In, K, V, Out>
where
    In: Send + 'static,
    K: std::hash::Hash + Eq + Send + 'static,
    V: Send + 'static,
    Out: Send + 'static,
{
    /// Validates `options` and spawns its worker pool once.
    pub fn new(options: JobOptions<K, V>) -> Result<Self, MrError> {
        options.validate()?;
        let pool = WorkerPool::new(options.worker_threads);
        Ok(Self { options, pool, _marker: std::marker::PhantomData })
    }

    /// Runs one job through this job's shared pool and configuration.
    /// Safe to call more than once; each call creates and tears down its
    /// own shuffle shard files under `options.temp_dir`.
    pub fn run(
        &self,
        src: &dyn Source<In>,
        sink: Arc<dyn Sink<Out>>,
        map_fn: MapFn<In, K, V>,
        reduce_fn: ReduceFn<K, V, Out>,
    ) -> Result<(), MrError> {
        execute(&self.pool, src, sink, map_fn, reduce_fn, &self.options)
    }

    pub fn worker_count(&self) -> usize {
        self.pool.worker_count()
    }
}

fn execute<In, K, V, Out>(
    pool: &WorkerPool,
    src: &dyn Source<In>,
    sink: Arc<dyn Sink<Out>>,
    map_fn: MapFn<In, K, V>,
    reduce_fn: ReduceFn<K, V, Out>,
    options: &JobOptions<K, V>,
) -> Result<(), MrError>
where
    In: Send + 'static,
    K: std::hash::Hash + Eq + Send + 'static,
    V: Send + 'static,
    Out: Send + 'static,
{
    let hasher = options.hasher.clone().expect("validated above");
    let codec = options.codec.clone().expect("validated above");
    let errors = ErrorSlot::new();

    tracing::info!(
        shards = options.shards,
        workers = options.worker_threads,
        temp_dir = %options.temp_dir.display(),
        "map-reduce job starting"
    );

    let shuffle_sink = Arc::new(ShardedKVSink::create(
        &options.temp_dir,
        &options.base_name,
        options.shards,
        options.buffer_bytes,
        hasher,
        codec.clone(),
    )?);
    let shard_paths: Vec<PathBuf> = shuffle_sink.shard_paths().to_vec();

    let map_progress = tick_callback(make_stage_spinner(options.progress, "mapping"));
    run_map_stage(src, shuffle_sink.clone(), map_fn, pool, &errors, map_progress);

    if errors.has_error() {
        return finish(errors, &shard_paths, false);
    }

    // The map stage has fully quiesced (barrier via `wait_idle`), so the
    // only remaining strong reference to `shuffle_sink` is this one.
    let shuffle_sink = Arc::try_unwrap(shuffle_sink)
        .unwrap_or_else(|_| panic!("shuffle sink still shared after map stage barrier"));
    let shuffle_source = shuffle_sink.into_source(options.buffer_bytes, codec);

    let reduce_progress = tick_callback(make_stage_spinner(options.progress, "reducing"));
    run_reduce_stage(&shuffle_source, sink, reduce_fn, pool, &errors, reduce_progress);

    let success = !errors.has_error();
    finish(errors, &shard_paths, success)
}

fn finish(errors: ErrorSlot, shard_paths: &[PathBuf], success: bool) -> Result<(), MrError> {
    if success {
        for path in shard_paths {
            if let Err(e) = fs::remove_file(path) {
                tracing::warn!(path = %path.display(), error = %e, "failed to remove shard file after success");
            }
        }
        tracing::info!("map-reduce job completed");
    } else {
        tracing::warn!(count = shard_paths.len(), "map-reduce job failed; shard files retained for inspection");
    }
    errors.into_result()
}
