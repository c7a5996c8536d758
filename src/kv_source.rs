//! Pull-style sources over grouped `(K, list<V>)` pairs — the shuffle's
//! read side.

use std::collections::{HashMap, VecDeque};
use std::fs::File;
use std::hash::Hash;
use std::io::BufReader;
use std::path::PathBuf;

use parking_lot::Mutex;

use crate::error::MrError;
use crate::framing::{DecodeFn, TypedFrameReader};

/// One `next()` yields one complete `(key, all values emitted for that
/// key)` grouping. Once a key is yielded, it is never yielded again.
///
/// A decode failure or read fault while assembling a group is fatal —
/// `next()` reports it as `Err` rather than yielding a partial or empty
/// grouping, the same contract as `crate::source::Source`.
pub trait KVSource<K, V>: Send + Sync {
    fn has_next(&self) -> bool;
    fn next(&self) -> Result<Option<(K, Vec<V>)>, MrError>;
}

/// Groups held entirely in memory, typically produced by converting a
/// [`crate::kv_sink::MemoryKVSink`].
pub struct GroupedMemoryKVSource<K, V> {
    groups: Mutex<VecDeque<(K, Vec<V>)>>,
}

impl<K, V> GroupedMemoryKVSource<K, V> {
    pub fn new(data: HashMap<K, Vec<V>>) -> Self {
        Self { groups: Mutex::new(data.into_iter().collect()) }
    }
}

impl<K: Send, V: Send> KVSource<K, V> for GroupedMemoryKVSource<K, V> {
    fn has_next(&self) -> bool {
        !self.groups.lock().is_empty()
    }

    fn next(&self) -> Result<Option<(K, Vec<V>)>, MrError> {
        Ok(self.groups.lock().pop_front())
    }
}

/// Reads a sharded framed file of `(K, V)` pairs one shard at a time:
/// buffers the whole shard into a `HashMap<K, Vec<V>>`, drains groupings
/// from it, then advances. Because the writer's hash invariant guarantees
/// a key never straddles two shards, grouping is exhaustive
/// within each shard and advancing never re-merges a key across shards.
pub struct ShardedFileKVSource<K, V> {
    state: Mutex<State<K, V>>,
}

struct State<K, V> {
    remaining_shards: VecDeque<PathBuf>,
    buffer_size: usize,
    decode: DecodeFn<(K, V)>,
    current: VecDeque<(K, Vec<V>)>,
}

impl<K, V> ShardedFileKVSource<K, V> {
    pub fn new(shard_paths: Vec<PathBuf>, buffer_size: usize, decode: DecodeFn<(K, V)>) -> Self {
        Self {
            state: Mutex::new(State {
                remaining_shards: shard_paths.into_iter().collect(),
                buffer_size,
                decode,
                current: VecDeque::new(),
            }),
        }
    }
}

impl<K: Eq + Hash, V> State<K, V> {
    /// Loads the next non-empty shard's groups into `current`. A failure
    /// to open a shard, or a decode/read fault partway through one, is
    /// fatal (an unreadable shard is not the same as an absent key) and
    /// is propagated rather than silently skipped.
    fn load_next_shard(&mut self) -> Result<bool, MrError> {
        while let Some(path) = self.remaining_shards.pop_front() {
            let file = File::open(&path).map_err(|e| MrError::io(format!("open shard {}", path.display()), e))?;
            let mut reader = TypedFrameReader::new(BufReader::new(file), self.buffer_size, self.decode.clone());
            let mut grouped: HashMap<K, Vec<V>> = HashMap::new();
            while let Some((k, v)) = reader.next_value()? {
                grouped.entry(k).or_default().push(v);
            }
            if !grouped.is_empty() {
                self.current = grouped.into_iter().collect();
                return Ok(true);
            }
            // Empty shard: keep scanning for the next non-empty one.
        }
        Ok(false)
    }

    fn ensure_readable(&mut self) -> Result<bool, MrError> {
        if !self.current.is_empty() {
            return Ok(true);
        }
        self.load_next_shard()
    }
}

impl<K: Eq + Hash + Send, V: Send> KVSource<K, V> for ShardedFileKVSource<K, V> {
    fn has_next(&self) -> bool {
        !matches!(self.state.lock().ensure_readable(), Ok(false))
    }

    fn next(&self) -> Result<Option<(K, Vec<V>)>, MrError> {
        let mut st = self.state.lock();
        if !st.ensure_readable()? {
            return Ok(None);
        }
        Ok(st.current.pop_front())
    }
}
