//! The `Emit` adapter: the one surface a `map_fn` sees for producing
//! key/value pairs, forwarding straight into the shuffle sink.

use std::sync::Arc;

use crate::error::MrError;
use crate::kv_sink::KVSink;

/// Callable any number of times per input record, including zero.
pub trait Emit<K, V> {
    fn emit(&self, key: K, value: V) -> Result<(), MrError>;
}

/// Forwards every `emit(k, v)` to a shared shuffle sink. Cheap to clone —
/// it only holds an `Arc` to the sink, never the sink by value, so each map
/// task gets its own handle without copying shard state.
pub struct SinkEmit<K, V> {
    sink: Arc<dyn KVSink<K, V>>,
}

impl<K, V> SinkEmit<K, V> {
    pub fn new(sink: Arc<dyn KVSink<K, V>>) -> Self {
        Self { sink }
    }
}

impl<K, V> Clone for SinkEmit<K, V> {
    fn clone(&self) -> Self {
        Self { sink: self.sink.clone() }
    }
}

impl<K, V> Emit<K, V> for SinkEmit<K, V> {
    fn emit(&self, key: K, value: V) -> Result<(), MrError> {
        self.sink.write(key, value)
    }
}
