//! Job configuration: a builder-style options struct, mirroring the
//! chained `with_*` shape this codebase's ETL options use.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::codec::Codec;
use crate::error::MrError;
use crate::hash::KeyHasher;

const DEFAULT_SHARDS: usize = 8;
const DEFAULT_BUFFER_BYTES: usize = 256 * 1024;

fn default_worker_threads() -> usize {
    std::thread::available_parallelism().map(|n| n.get()).unwrap_or(4)
}

/// Everything a job needs beyond the source, sink, map function, and
/// reduce function: shard count, I/O buffer sizing, the temp directory
/// layout, and the hasher/codec collaborators.
pub struct JobOptions<K, V> {
    pub(crate) shards: usize,
    pub(crate) buffer_bytes: usize,
    pub(crate) temp_dir: PathBuf,
    pub(crate) base_name: String,
    pub(crate) worker_threads: usize,
    pub(crate) progress: bool,
    pub(crate) hasher: Option<Arc<dyn KeyHasher<K>>>,
    pub(crate) codec: Option<Arc<dyn Codec<K, V>>>,
}

impl<K, V> JobOptions<K, V> {
    pub fn new() -> Self {
        Self {
            shards: DEFAULT_SHARDS,
            buffer_bytes: DEFAULT_BUFFER_BYTES,
            temp_dir: std::env::temp_dir().join("mapreduce-rs"),
            base_name: "shuffle".to_string(),
            worker_threads: default_worker_threads(),
            progress: false,
            hasher: None,
            codec: None,
        }
    }

    pub fn with_shards(mut self, shards: usize) -> Self {
        self.shards = shards;
        self
    }

    pub fn with_buffer_bytes(mut self, bytes: usize) -> Self {
        self.buffer_bytes = bytes;
        self
    }

    pub fn with_temp_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.temp_dir = dir.as_ref().to_path_buf();
        self
    }

    pub fn with_base_name(mut self, name: impl Into<String>) -> Self {
        self.base_name = name.into();
        self
    }

    pub fn with_worker_threads(mut self, n: usize) -> Self {
        self.worker_threads = n;
        self
    }

    pub fn with_progress(mut self, yes: bool) -> Self {
        self.progress = yes;
        self
    }

    pub fn with_hasher(mut self, hasher: Arc<dyn KeyHasher<K>>) -> Self {
        self.hasher = Some(hasher);
        self
    }

    pub fn with_codec(mut self, codec: Arc<dyn Codec<K, V>>) -> Self {
        self.codec = Some(codec);
        self
    }

    /// Configuration-class checks: run before any worker thread spawns or
    /// any shard file is created.
    pub fn validate(&self) -> Result<(), MrError> {
        if self.shards == 0 {
            return Err(MrError::configuration("shards must be >= 1"));
        }
        if self.buffer_bytes == 0 {
            return Err(MrError::configuration("buffer_bytes must be >= 1"));
        }
        if self.worker_threads == 0 {
            return Err(MrError::configuration("worker_threads must be >= 1"));
        }
        if self.hasher.is_none() {
            return Err(MrError::configuration("a key hasher is required"));
        }
        if self.codec.is_none() {
            return Err(MrError::configuration("an encoder/decoder codec is required"));
        }
        self.probe_temp_dir_writable()?;
        Ok(())
    }

    /// Creates `temp_dir` if missing and writes then removes a marker file
    /// in it, so an unwritable temp directory is caught here as a
    /// Configuration error rather than surfacing later as an `Io` error
    /// from inside `ShardedKVSink::create`, after the worker pool has
    /// already spawned.
    fn probe_temp_dir_writable(&self) -> Result<(), MrError> {
        fs::create_dir_all(&self.temp_dir).map_err(|e| {
            MrError::configuration(format!("temp dir {} is not writable: {e}", self.temp_dir.display()))
        })?;
        let probe = self.temp_dir.join(".mr_writability_probe");
        fs::File::create(&probe).map_err(|e| {
            MrError::configuration(format!("temp dir {} is not writable: {e}", self.temp_dir.display()))
        })?;
        let _ = fs::remove_file(&probe);
        Ok(())
    }
}

impl<K, V> Default for JobOptions<K, V> {
    fn default() -> Self {
        Self::new()
    }
}
