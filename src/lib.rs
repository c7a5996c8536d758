mod codec;
mod config;
mod emit;
mod error;
mod error_slot;
mod framing;
mod hash;
mod kv_sink;
mod kv_source;
mod logging;
mod map_stage;
mod orchestrator;
mod pool;
mod progress;
mod reduce_stage;
mod sink;
mod source;

pub use crate::codec::{Codec, SerdeJsonCodec};
pub use crate::config::JobOptions;
pub use crate::emit::{Emit, SinkEmit};
pub use crate::error::{MrError, Result};
pub use crate::error_slot::ErrorSlot;
pub use crate::framing::{DecodeFn, EncodeFn, FrameReader, FrameWriter, TypedFrameReader, TypedFrameWriter};
pub use crate::hash::{AHashKeyHasher, FnKeyHasher, KeyHasher};
pub use crate::kv_sink::{FramedFileKVSink, KVSink, MemoryKVSink, ShardedKVSink};
pub use crate::kv_source::{GroupedMemoryKVSource, KVSource, ShardedFileKVSource};
pub use crate::logging::init_tracing_once;
pub use crate::map_stage::{run_map_stage, MapFn};
pub use crate::orchestrator::{run_map_reduce, MapReduceJob};
pub use crate::pool::WorkerPool;
pub use crate::reduce_stage::{run_reduce_stage, ReduceFn};
pub use crate::sink::{MemorySink, Sink};
pub use crate::source::{FramedFileSource, MemorySource, ShardedFileSource, Source};
