//! Drains the input source, submitting one map task per record into the
//! worker pool, then barriers on completion.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use crate::emit::SinkEmit;
use crate::error::{panic_message, MrError};
use crate::error_slot::ErrorSlot;
use crate::kv_sink::KVSink;
use crate::pool::WorkerPool;
use crate::source::Source;

/// `map_fn(record, emit)`. `emit.emit(k, v)` may be called any number of
/// times, including zero, per record.
pub type MapFn<In, K, V> = Arc<dyn Fn(In, &SinkEmit<K, V>) -> Result<(), MrError> + Send + Sync>;

/// Runs the map stage to completion: pulls from `src` on the calling
/// thread (the orchestrator is the sole puller), dispatches one
/// task per record, and blocks until every dispatched task has finished.
/// Once `errors` holds a first error, no further tasks are submitted — the
/// stage still waits for tasks already in flight so the pool quiesces
/// before the orchestrator aborts.
pub fn run_map_stage<In, K, V>(
    src: &dyn Source<In>,
    sink: Arc<dyn KVSink<K, V>>,
    map_fn: MapFn<In, K, V>,
    pool: &WorkerPool,
    errors: &ErrorSlot,
    on_dispatch: Option<Arc<dyn Fn() + Send + Sync>>,
) where
    In: Send + 'static,
    K: Send + 'static,
    V: Send + 'static,
{
    let emit = SinkEmit::new(sink);
    let mut dispatched = 0usize;

    while !errors.has_error() && src.has_next() {
        let record = match src.next() {
            Ok(Some(record)) => record,
            Ok(None) => break,
            Err(e) => {
                errors.set_if_first(e);
                break;
            }
        };
        let map_fn = map_fn.clone();
        let emit = emit.clone();
        let errors = errors.clone();
        let tick = on_dispatch.clone();
        pool.submit(move || {
            let outcome = catch_unwind(AssertUnwindSafe(|| map_fn(record, &emit)));
            match outcome {
                Ok(Ok(())) => {}
                Ok(Err(e)) => errors.set_if_first(e),
                Err(payload) => errors.set_if_first(MrError::user_code(panic_message(payload.as_ref()))),
            }
            if let Some(tick) = tick {
                tick();
            }
        });
        dispatched += 1;
    }

    pool.wait_idle();
    tracing::info!(dispatched, "map stage complete");
}
