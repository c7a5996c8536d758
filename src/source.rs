//! Pull-style sources over `T` records: memory-backed, a single framed
//! file, and a concatenation of framed shard files.

use std::collections::VecDeque;
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;

use parking_lot::Mutex;

use crate::error::MrError;
use crate::framing::{DecodeFn, TypedFrameReader};

/// A pull iterator with a shared cursor: concurrent callers never see the
/// same element twice and never skip one. The map and reduce stages each
/// use a single puller thread, but the contract itself does not assume
/// that — `has_next`/`next` take `&self`, not `&mut self`.
///
/// `has_next` is a best-effort peek: an implementation that hits a read
/// fault while peeking reports `true` rather than guessing it is clean
/// end-of-stream, so the fault surfaces through the `Err` returned from
/// the following `next()` instead of being swallowed as exhaustion.
pub trait Source<T>: Send + Sync {
    fn has_next(&self) -> bool;
    /// Returns the next element, `Ok(None)` at a clean end of stream, or
    /// `Err` if decoding or reading the next record failed — a decode or
    /// I/O fault is fatal to the job, never silently treated as "no more
    /// records" (see `crate::error::MrError`).
    fn next(&self) -> Result<Option<T>, MrError>;
}

/// Backed by an in-memory ordered sequence. Stores the remaining elements
/// in a mutex-guarded deque: `next()` hands out ownership directly via
/// `pop_front`, so `T` need not be `Clone` to be read back out.
pub struct MemorySource<T> {
    queue: Mutex<VecDeque<T>>,
}

impl<T> MemorySource<T> {
    pub fn new(items: impl IntoIterator<Item = T>) -> Self {
        Self { queue: Mutex::new(items.into_iter().collect()) }
    }
}

impl<T: Send> Source<T> for MemorySource<T> {
    fn has_next(&self) -> bool {
        !self.queue.lock().is_empty()
    }

    fn next(&self) -> Result<Option<T>, MrError> {
        Ok(self.queue.lock().pop_front())
    }
}

/// Backed by a single framed file and a user-supplied decoder.
pub struct FramedFileSource<T> {
    reader: Mutex<TypedFrameReader<BufReader<File>, T>>,
}

impl<T> FramedFileSource<T> {
    pub fn open(path: &std::path::Path, buffer_size: usize, decode: DecodeFn<T>) -> Result<Self, MrError> {
        let file = File::open(path).map_err(|e| MrError::io(format!("open {}", path.display()), e))?;
        let reader = TypedFrameReader::new(BufReader::new(file), buffer_size, decode);
        Ok(Self { reader: Mutex::new(reader) })
    }
}

impl<T: Send> Source<T> for FramedFileSource<T> {
    fn has_next(&self) -> bool {
        // A read fault here is not clean exhaustion; report `true` so the
        // caller's subsequent `next()` observes and reports the error.
        !matches!(self.reader.lock().has_next(), Ok(false))
    }

    fn next(&self) -> Result<Option<T>, MrError> {
        self.reader.lock().next_value()
    }
}

/// Concatenates an ordered list of framed shard files into one source,
/// holding at most one shard's file handle open at a time.
pub struct ShardedFileSource<T> {
    state: Mutex<ShardedState<T>>,
}

struct ShardedState<T> {
    remaining_paths: VecDeque<PathBuf>,
    buffer_size: usize,
    decode: DecodeFn<T>,
    active: Option<TypedFrameReader<BufReader<File>, T>>,
}

impl<T> ShardedFileSource<T> {
    pub fn new(shard_paths: Vec<PathBuf>, buffer_size: usize, decode: DecodeFn<T>) -> Self {
        Self {
            state: Mutex::new(ShardedState {
                remaining_paths: shard_paths.into_iter().collect(),
                buffer_size,
                decode,
                active: None,
            }),
        }
    }
}

impl<T> ShardedState<T> {
    /// Advances `active` until it has another record or no shards remain.
    /// A read fault on the active shard, or a failure to open the next
    /// one, is fatal and propagated rather than silently skipped — an
    /// unreadable shard must not be mistaken for an empty one.
    fn advance_to_readable(&mut self) -> Result<bool, MrError> {
        loop {
            if let Some(reader) = &mut self.active {
                match reader.has_next() {
                    Ok(true) => return Ok(true),
                    Ok(false) => self.active = None,
                    Err(e) => return Err(e.into()),
                }
            }
            let Some(path) = self.remaining_paths.pop_front() else {
                return Ok(false);
            };
            let file = File::open(&path).map_err(|e| MrError::io(format!("open shard {}", path.display()), e))?;
            self.active = Some(TypedFrameReader::new(BufReader::new(file), self.buffer_size, self.decode.clone()));
        }
    }
}

impl<T: Send> Source<T> for ShardedFileSource<T> {
    fn has_next(&self) -> bool {
        !matches!(self.state.lock().advance_to_readable(), Ok(false))
    }

    fn next(&self) -> Result<Option<T>, MrError> {
        let mut st = self.state.lock();
        if !st.advance_to_readable()? {
            return Ok(None);
        }
        st.active.as_mut().expect("advance_to_readable guarantees an active reader").next_value()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_source_yields_each_element_once_in_order() {
        let src = MemorySource::new(vec![1, 2, 3]);
        assert!(src.has_next());
        assert_eq!(src.next().unwrap(), Some(1));
        assert_eq!(src.next().unwrap(), Some(2));
        assert_eq!(src.next().unwrap(), Some(3));
        assert!(!src.has_next());
        assert_eq!(src.next().unwrap(), None);
    }

    #[test]
    fn memory_source_concurrent_pulls_partition_the_input() {
        use std::sync::Arc;
        let src = Arc::new(MemorySource::new(0..1000));
        let mut handles = Vec::new();
        for _ in 0..8 {
            let src = src.clone();
            handles.push(std::thread::spawn(move || {
                let mut mine = Vec::new();
                while let Some(v) = src.next().unwrap() {
                    mine.push(v);
                }
                mine
            }));
        }
        let mut all: Vec<i32> = handles.into_iter().flat_map(|h| h.join().unwrap()).collect();
        all.sort();
        assert_eq!(all, (0..1000).collect::<Vec<_>>());
    }

    #[test]
    fn framed_file_source_surfaces_a_truncated_record_as_an_error_not_exhaustion() {
        use crate::framing::FrameWriter;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("truncated");
        {
            let file = std::fs::File::create(&path).unwrap();
            let mut w = FrameWriter::new(file);
            // A length prefix claiming 100 bytes, but no payload follows.
            w.write_record(&vec![0u8; 0]).unwrap();
            std::io::Write::write_all(&mut w.into_inner(), &100u64.to_ne_bytes()).unwrap();
        }
        let decode: DecodeFn<Vec<u8>> = std::sync::Arc::new(|b: &[u8]| Ok(b.to_vec()));
        let src = FramedFileSource::open(&path, 16, decode).unwrap();

        assert!(src.has_next());
        assert_eq!(src.next().unwrap(), Some(Vec::new()));
        assert!(src.has_next());
        assert!(src.next().is_err(), "a length prefix with no matching payload must error, not exhaust cleanly");
    }
}
