use std::io;
use std::path::Path;
use std::sync::{Arc, OnceLock};
use std::time::SystemTime;

use digest::DynDigest;

use crate::error::WalkError;

/// A single object found during traversal, either on disk or inside an archive.
///
/// Checkers and visitors receive `&dyn File`, so the same pipeline works
/// against both backends. Implementations are provided by
/// [`DiskFile`](crate::DiskFile) and [`ArchiveFile`](crate::ArchiveFile).
pub trait File {
    /// Full OS path (disk) or archive-relative name (archive).
    fn path(&self) -> &Path;

    /// Kind, size, permission bits and modification time.
    fn metadata(&self) -> &Metadata;

    /// Timestamps known for this entry.
    fn times(&self) -> &Timestat;

    /// The full content of the entry.
    ///
    /// The first call performs the read; every later call returns the same
    /// shared bytes, or a clone of the same cached error.
    fn content(&self) -> Result<Arc<[u8]>, WalkError>;

    /// Hash [`content()`](File::content) and return the lowercase hex digest.
    ///
    /// The hasher is reset before use, so it may be reused across entries.
    fn hash(&self, hasher: &mut dyn DynDigest) -> Result<String, WalkError> {
        let content = self.content()?;
        hasher.reset();
        hasher.update(&content);
        Ok(to_hex(&hasher.finalize_reset()))
    }

    fn mod_time(&self) -> SystemTime {
        self.times().modified
    }

    /// Inode change time. `None` when the platform or header lacks it.
    fn change_time(&self) -> Option<SystemTime> {
        self.times().changed
    }

    /// Last access time. `None` when the platform or header lacks it.
    fn access_time(&self) -> Option<SystemTime> {
        self.times().accessed
    }
}

/// The kind of a traversed entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// A regular file.
    File,

    /// A directory.
    Dir,

    /// A symbolic link (never followed unless the walker is told to).
    Symlink,

    /// Anything else (device files, pipes, sockets, hard-link records, etc.).
    Other,
}

/// Backend-neutral metadata of an entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Metadata {
    pub(crate) kind: EntryKind,
    pub(crate) size: u64,
    pub(crate) mode: u32,
    pub(crate) modified: SystemTime,
}

impl Metadata {
    pub fn new(kind: EntryKind, size: u64, mode: u32, modified: SystemTime) -> Self {
        Self {
            kind,
            size,
            mode: mode & 0o7777,
            modified,
        }
    }

    pub fn kind(&self) -> EntryKind {
        self.kind
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    /// Permission bits, including setuid/setgid/sticky.
    pub fn mode(&self) -> u32 {
        self.mode
    }

    pub fn modified(&self) -> SystemTime {
        self.modified
    }

    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Dir
    }

    pub fn is_regular(&self) -> bool {
        self.kind == EntryKind::File
    }

    pub fn is_symlink(&self) -> bool {
        self.kind == EntryKind::Symlink
    }
}

/// Modification, change and access instants of an entry.
///
/// Archive headers usually carry only the modification time, so the other
/// two are optional.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timestat {
    pub modified: SystemTime,
    pub changed: Option<SystemTime>,
    pub accessed: Option<SystemTime>,
}

// ---------------------------------------------------------------------------
// Content cache
// ---------------------------------------------------------------------------

type Cached = Result<Arc<[u8]>, Arc<io::Error>>;

/// One-shot content cell shared by every accessor of an entry.
#[derive(Default)]
pub(crate) struct OnceContent {
    cell: OnceLock<Cached>,
}

impl OnceContent {
    /// Run `read` on the first call only; all callers observe its outcome.
    pub(crate) fn get_or_read<F>(&self, path: &Path, read: F) -> Result<Arc<[u8]>, WalkError>
    where
        F: FnOnce() -> io::Result<Vec<u8>>,
    {
        let cached = self
            .cell
            .get_or_init(|| read().map(Arc::from).map_err(Arc::new));
        match cached {
            Ok(bytes) => Ok(Arc::clone(bytes)),
            Err(err) => Err(WalkError::Read {
                path: path.to_path_buf(),
                source: Arc::clone(err),
            }),
        }
    }
}

/// Lowercase hex encoding of a digest.
pub(crate) fn to_hex(bytes: &[u8]) -> String {
    const DIGITS: &[u8; 16] = b"0123456789abcdef";
    let mut out = String::with_capacity(bytes.len() * 2);
    for &byte in bytes {
        out.push(char::from(DIGITS[usize::from(byte >> 4)]));
        out.push(char::from(DIGITS[usize::from(byte & 0x0f)]));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn hex_is_lowercase_and_padded() {
        assert_eq!(to_hex(&[0x00, 0x0f, 0xab, 0xff]), "000fabff");
        assert_eq!(to_hex(&[]), "");
    }

    #[test]
    fn content_is_read_once_across_threads() {
        let cell = OnceContent::default();
        let reads = AtomicUsize::new(0);
        let path = Path::new("shared");

        let results: Vec<_> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    s.spawn(|| {
                        cell.get_or_read(path, || {
                            reads.fetch_add(1, Ordering::SeqCst);
                            Ok(b"payload".to_vec())
                        })
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap().unwrap()).collect()
        });

        assert_eq!(reads.load(Ordering::SeqCst), 1);
        assert!(results.iter().all(|b| Arc::ptr_eq(b, &results[0])));
        assert_eq!(&*results[0], b"payload");
    }

    #[test]
    fn read_failure_is_cached() {
        let cell = OnceContent::default();
        let path = Path::new("broken");
        let first = cell.get_or_read(path, || Err(io::Error::other("boom")));
        let second = cell.get_or_read(path, || Ok(b"late".to_vec()));

        match (first, second) {
            (
                Err(WalkError::Read { source: a, .. }),
                Err(WalkError::Read { source: b, .. }),
            ) => assert!(Arc::ptr_eq(&a, &b)),
            other => panic!("expected cached read errors, got {other:?}"),
        }
    }
}
