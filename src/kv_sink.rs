//! Append-only `(K, V)` destinations — the shuffle's write side.
//!
//! Grounded on the sharded, mutex-per-shard writers in this codebase's
//! sibling ETL tooling (`ShardedWriter`, `ShardedKVWriter`,
//! `PartitionWriters`): N hash-routed files, each behind its own lock, so
//! contention scales down with shard count instead of serializing every
//! write through one global mutex.

use std::collections::HashMap;
use std::fs::{self, File};
use std::hash::Hash;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::codec::Codec;
use crate::error::MrError;
use crate::framing::TypedFrameWriter;
use crate::hash::KeyHasher;
use crate::kv_source::{GroupedMemoryKVSource, ShardedFileKVSource};

/// A thread-safe `(K, V)` appender.
pub trait KVSink<K, V>: Send + Sync {
    /// A short or failed write is fatal to the job; implementations that
    /// cannot fail (memory variants) always return `Ok`.
    fn write(&self, key: K, value: V) -> Result<(), MrError>;
}

/// Appends into `HashMap<K, Vec<V>>` under a mutex.
pub struct MemoryKVSink<K, V> {
    data: Mutex<HashMap<K, Vec<V>>>,
}

impl<K, V> MemoryKVSink<K, V> {
    pub fn new() -> Self {
        Self { data: Mutex::new(HashMap::new()) }
    }

    /// Takes ownership of the accumulated map, producing a grouped source.
    pub fn into_source(self) -> GroupedMemoryKVSource<K, V>
    where
        K: Eq + Hash,
    {
        GroupedMemoryKVSource::new(self.data.into_inner())
    }
}

impl<K, V> Default for MemoryKVSink<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Eq + Hash + Send, V: Send> KVSink<K, V> for MemoryKVSink<K, V> {
    fn write(&self, key: K, value: V) -> Result<(), MrError> {
        self.data.lock().entry(key).or_default().push(value);
        Ok(())
    }
}

/// Writes every `(K, V)` pair to one framed file, synchronized internally.
pub struct FramedFileKVSink<K, V> {
    path: PathBuf,
    writer: Mutex<TypedFrameWriter<BufWriter<File>, (K, V)>>,
}

impl<K, V> FramedFileKVSink<K, V> {
    pub fn create(path: &Path, write_buffer_bytes: usize, codec: Arc<dyn Codec<K, V>>) -> Result<Self, MrError>
    where
        K: Send + 'static,
        V: Send + 'static,
    {
        let file = File::create(path).map_err(|e| MrError::io(format!("create shard {}", path.display()), e))?;
        let buffered = BufWriter::with_capacity(write_buffer_bytes.max(4096), file);
        let encode = Arc::new(move |pair: &(K, V)| codec.encode(&pair.0, &pair.1));
        Ok(Self {
            path: path.to_path_buf(),
            writer: Mutex::new(TypedFrameWriter::new(buffered, encode)),
        })
    }

    pub fn write_pair(&self, key: K, value: V) -> Result<(), MrError> {
        self.writer
            .lock()
            .write_value(&(key, value))
            .map_err(|e| MrError::io(format!("write shard {}", self.path.display()), e))
    }

    /// Flushes and closes the file. Close failures are logged, not fatal.
    pub fn close(self) {
        let mut w = self.writer.lock();
        if let Err(e) = w.flush() {
            tracing::warn!(path = %self.path.display(), error = %e, "failed to flush shard on close");
        }
    }
}

impl<K: Send + 'static, V: Send + 'static> KVSink<K, V> for FramedFileKVSink<K, V> {
    fn write(&self, key: K, value: V) -> Result<(), MrError> {
        self.write_pair(key, value)
    }
}

/// Owns N [`FramedFileKVSink`]s and routes each write by
/// `hasher(key) mod N`. This is the shuffle's central invariant: all pairs
/// with the same key land in the same shard file.
pub struct ShardedKVSink<K, V> {
    shards: Vec<FramedFileKVSink<K, V>>,
    shard_paths: Vec<PathBuf>,
    hasher: Arc<dyn KeyHasher<K>>,
}

impl<K, V> ShardedKVSink<K, V>
where
    K: Send + 'static,
    V: Send + 'static,
{
    /// Eagerly creates (truncating) `shard_count` files named
    /// `"<base_name>_<i>-of-<N>"` under `temp_dir`.
    pub fn create(
        temp_dir: &Path,
        base_name: &str,
        shard_count: usize,
        write_buffer_bytes: usize,
        hasher: Arc<dyn KeyHasher<K>>,
        codec: Arc<dyn Codec<K, V>>,
    ) -> Result<Self, MrError> {
        if shard_count == 0 {
            return Err(MrError::configuration("shard_count must be >= 1"));
        }
        fs::create_dir_all(temp_dir)
            .map_err(|e| MrError::io(format!("create temp dir {}", temp_dir.display()), e))?;

        let mut shards = Vec::with_capacity(shard_count);
        let mut shard_paths = Vec::with_capacity(shard_count);
        for i in 0..shard_count {
            let path = temp_dir.join(format!("{base_name}_{i}-of-{shard_count}"));
            shards.push(FramedFileKVSink::create(&path, write_buffer_bytes, codec.clone())?);
            shard_paths.push(path);
        }
        tracing::debug!(shard_count, base_name, dir = %temp_dir.display(), "sharded shuffle sink created");

        Ok(Self { shards, shard_paths, hasher })
    }

    fn shard_index(&self, key: &K) -> usize {
        (self.hasher.hash_key(key) % self.shards.len() as u64) as usize
    }

    /// Flushes and closes every shard, then converts into a
    /// [`ShardedFileKVSource`] over the same files, parameterized by the
    /// read-side buffer size and decoder.
    pub fn into_source(self, buffer_size: usize, codec: Arc<dyn Codec<K, V>>) -> ShardedFileKVSource<K, V> {
        for shard in self.shards {
            shard.close();
        }
        let decode = Arc::new(move |bytes: &[u8]| codec.decode(bytes));
        ShardedFileKVSource::new(self.shard_paths, buffer_size, decode)
    }

    /// Shard file paths, in shard-index order. Used by the orchestrator to
    /// remove them after a successful job.
    pub fn shard_paths(&self) -> &[PathBuf] {
        &self.shard_paths
    }
}

impl<K: Send + 'static, V: Send + 'static> KVSink<K, V> for ShardedKVSink<K, V> {
    fn write(&self, key: K, value: V) -> Result<(), MrError> {
        let idx = self.shard_index(&key);
        self.shards[idx].write_pair(key, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::SerdeJsonCodec;
    use crate::hash::FnKeyHasher;
    use crate::kv_source::KVSource;
    use std::collections::HashSet;

    #[test]
    fn same_key_always_routes_to_the_same_shard() {
        let dir = tempfile::tempdir().unwrap();
        let hasher: Arc<dyn KeyHasher<i64>> = Arc::new(FnKeyHasher::new(|k: &i64| *k as u64));
        let codec: Arc<dyn Codec<i64, i64>> = Arc::new(SerdeJsonCodec);
        let sink = ShardedKVSink::create(dir.path(), "kv", 4, 64 * 1024, hasher, codec).unwrap();

        for k in 0i64..40 {
            sink.write(k, k * 10).unwrap();
            sink.write(k, k * 100).unwrap();
        }

        let shard_paths: Vec<_> = sink.shard_paths().to_vec();
        let codec2: Arc<dyn Codec<i64, i64>> = Arc::new(SerdeJsonCodec);
        drop(sink);

        for (i, path) in shard_paths.iter().enumerate() {
            let decode = {
                let c = codec2.clone();
                Arc::new(move |b: &[u8]| c.decode(b))
            };
            let src = ShardedFileKVSource::new(vec![path.clone()], 4096, decode);
            while let Some((k, _vs)) = src.next().unwrap() {
                assert_eq!(k.rem_euclid(4), i as i64, "key {k} landed in shard {i}");
            }
        }
    }

    #[test]
    fn sharded_sink_converts_into_complete_grouped_source() {
        let dir = tempfile::tempdir().unwrap();
        let hasher: Arc<dyn KeyHasher<String>> = Arc::new(crate::hash::AHashKeyHasher::new());
        let codec: Arc<dyn Codec<String, i64>> = Arc::new(SerdeJsonCodec);
        let sink = ShardedKVSink::create(dir.path(), "wc", 3, 64 * 1024, hasher, codec.clone()).unwrap();

        let words = ["a", "b", "a", "c", "a", "b"];
        for w in words {
            sink.write(w.to_string(), 1i64).unwrap();
        }

        let src = sink.into_source(4096, codec);
        let mut seen: HashMap<String, i64> = HashMap::new();
        let mut keys_seen = HashSet::new();
        while let Some((k, vs)) = src.next().unwrap() {
            assert!(keys_seen.insert(k.clone()), "key {k} yielded twice");
            seen.insert(k, vs.iter().sum());
        }
        assert_eq!(seen.get("a"), Some(&3));
        assert_eq!(seen.get("b"), Some(&2));
        assert_eq!(seen.get("c"), Some(&1));
    }
}
