//! Drains the grouped shuffle source, submitting one reduce task per
//! group into the worker pool, then barriers on completion.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use crate::error::{panic_message, MrError};
use crate::error_slot::ErrorSlot;
use crate::kv_source::KVSource;
use crate::pool::WorkerPool;
use crate::sink::Sink;

/// `reduce_fn(key, values)`. Returning `Err` records a user-code error
/// without writing to the output sink for that group.
pub type ReduceFn<K, V, Out> = Arc<dyn Fn(K, Vec<V>) -> Result<Out, MrError> + Send + Sync>;

/// Runs the reduce stage to completion: pulls from `src` on the calling
/// thread, dispatches one task per group, and blocks until every
/// dispatched task has finished. Reduce tasks may complete — and write to
/// `sink` — in any order.
pub fn run_reduce_stage<K, V, Out>(
    src: &dyn KVSource<K, V>,
    sink: Arc<dyn Sink<Out>>,
    reduce_fn: ReduceFn<K, V, Out>,
    pool: &WorkerPool,
    errors: &ErrorSlot,
    on_dispatch: Option<Arc<dyn Fn() + Send + Sync>>,
) where
    K: Send + 'static,
    V: Send + 'static,
    Out: Send + 'static,
{
    let mut dispatched = 0usize;

    while !errors.has_error() && src.has_next() {
        let (key, values) = match src.next() {
            Ok(Some(group)) => group,
            Ok(None) => break,
            Err(e) => {
                errors.set_if_first(e);
                break;
            }
        };
        let reduce_fn = reduce_fn.clone();
        let sink = sink.clone();
        let errors = errors.clone();
        let tick = on_dispatch.clone();
        pool.submit(move || {
            let outcome = catch_unwind(AssertUnwindSafe(|| reduce_fn(key, values)));
            match outcome {
                Ok(Ok(out)) => sink.write(out),
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
    tracing::info!(dispatched, "reduce stage complete");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv_source::GroupedMemoryKVSource;
    use crate::sink::MemorySink;
    use std::collections::HashMap;

    #[test]
    fn one_output_per_group() {
        let mut data = HashMap::new();
        data.insert("a".to_string(), vec![1i64, 2, 3]);
        data.insert("b".to_string(), vec![10]);
        let src = GroupedMemoryKVSource::new(data);

        let sink = Arc::new(MemorySink::new());
        let reduce_fn: ReduceFn<String, i64, (String, i64)> =
            Arc::new(|k, vs| Ok((k, vs.into_iter().sum())));

        let pool = WorkerPool::new(4);
        let errors = ErrorSlot::new();
        run_reduce_stage(&src, sink.clone(), reduce_fn, &pool, &errors, None);
        errors.into_result().unwrap();

        let mut out = sink.snapshot();
        out.sort();
        assert_eq!(out, vec![("a".to_string(), 6), ("b".to_string(), 10)]);
    }

    #[test]
    fn a_source_read_fault_is_recorded_as_an_error_not_silent_exhaustion() {
        use crate::kv_source::{KVSource, ShardedFileKVSource};
        use std::path::PathBuf;

        let decode: crate::framing::DecodeFn<(String, i64)> =
            Arc::new(|b: &[u8]| serde_json::from_slice(b).map_err(|e| MrError::invariant(format!("{e}"))));
        let src: ShardedFileKVSource<String, i64> =
            ShardedFileKVSource::new(vec![PathBuf::from("/nonexistent/for/reduce/stage/test")], 4096, decode);
        let src: &dyn KVSource<String, i64> = &src;

        let sink = Arc::new(MemorySink::new());
        let reduce_fn: ReduceFn<String, i64, i64> = Arc::new(|_, vs| Ok(vs.iter().sum()));

        let pool = WorkerPool::new(2);
        let errors = ErrorSlot::new();
        run_reduce_stage(src, sink.clone(), reduce_fn, &pool, &errors, None);

        let err = errors.into_result().unwrap_err();
        assert_eq!(err.kind(), "io");
        assert!(sink.snapshot().is_empty());
    }

    #[test]
    fn empty_group_source_produces_empty_output() {
        let src = GroupedMemoryKVSource::<String, i64>::new(HashMap::new());
        let sink = Arc::new(MemorySink::new());
        let reduce_fn: ReduceFn<String, i64, i64> = Arc::new(|_, vs| Ok(vs.iter().sum()));

        let pool = WorkerPool::new(2);
        let errors = ErrorSlot::new();
        run_reduce_stage(&src, sink.clone(), reduce_fn, &pool, &errors, None);
        errors.into_result().unwrap();

        assert!(sink.snapshot().is_empty());
    }
}
