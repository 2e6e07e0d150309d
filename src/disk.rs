use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use ignore::{DirEntry, WalkBuilder, WalkState};

use crate::cancel::CancelScope;
use crate::entry::{EntryKind, File, Metadata, OnceContent, Timestat};
use crate::error::WalkError;
use crate::pipeline::{Outcome, Pipelines};
use crate::platform;
use crate::results::{Summary, Tally};

// ---------------------------------------------------------------------------
// DiskFile
// ---------------------------------------------------------------------------

/// An entry of a live directory tree.
///
/// Metadata is captured once, when the entry is discovered; content is read
/// from disk lazily on the first [`content()`](File::content) call.
pub struct DiskFile {
    path: PathBuf,
    metadata: Metadata,
    times: Timestat,
    content: OnceContent,
}

impl DiskFile {
    /// Build a `DiskFile` from metadata already obtained by the caller.
    pub fn new(path: impl Into<PathBuf>, info: &fs::Metadata) -> Self {
        let times = platform::timestat(info);
        let metadata = Metadata::new(kind_of(info), info.len(), platform::mode(info), times.modified);
        Self {
            path: path.into(),
            metadata,
            times,
            content: OnceContent::default(),
        }
    }

    /// `lstat` the path and build a `DiskFile` from the result.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, WalkError> {
        let path = path.into();
        let info = fs::symlink_metadata(&path).map_err(|source| io_error(&path, source))?;
        Ok(Self::new(path, &info))
    }

    #[cfg(test)]
    pub(crate) fn from_parts(path: impl Into<PathBuf>, metadata: Metadata) -> Self {
        let times = Timestat {
            modified: metadata.modified(),
            changed: None,
            accessed: None,
        };
        Self {
            path: path.into(),
            metadata,
            times,
            content: OnceContent::default(),
        }
    }
}

impl File for DiskFile {
    fn path(&self) -> &Path {
        &self.path
    }

    fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    fn times(&self) -> &Timestat {
        &self.times
    }

    fn content(&self) -> Result<Arc<[u8]>, WalkError> {
        self.content.get_or_read(&self.path, || fs::read(&self.path))
    }
}

fn kind_of(info: &fs::Metadata) -> EntryKind {
    let ft = info.file_type();
    if ft.is_dir() {
        EntryKind::Dir
    } else if ft.is_file() {
        EntryKind::File
    } else if ft.is_symlink() {
        EntryKind::Symlink
    } else {
        EntryKind::Other
    }
}

fn io_error(path: &Path, source: std::io::Error) -> WalkError {
    match source.kind() {
        std::io::ErrorKind::PermissionDenied => WalkError::PermissionDenied(path.to_path_buf()),
        std::io::ErrorKind::NotFound => WalkError::NotFound(path.to_path_buf()),
        _ => WalkError::Io {
            path: path.to_path_buf(),
            source,
        },
    }
}

// ---------------------------------------------------------------------------
// WalkConfig
// ---------------------------------------------------------------------------

/// Traversal parameters for the directory backend.
///
/// Not part of the public API. Callers configure these through
/// [`Walker::threads`](crate::Walker::threads) and friends.
#[derive(Debug, Clone)]
pub(crate) struct WalkConfig {
    pub threads:      usize,
    pub max_depth:    Option<usize>,
    pub follow_links: bool,
}

impl Default for WalkConfig {
    fn default() -> Self {
        Self {
            threads:      num_cpus(),
            max_depth:    None,
            follow_links: false,
        }
    }
}

/// Get the logical CPU count, with a safe fallback.
fn num_cpus() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

// ---------------------------------------------------------------------------
// walk()
// ---------------------------------------------------------------------------

/// Everything the worker callbacks mutate, guarded by one lock.
struct Shared<'p, 'a> {
    pipelines: &'p mut Pipelines<'a>,
    tally: Tally,
    failure: Option<WalkError>,
}

/// Walk `root` with the parallel walker, running `pipelines` once per entry.
///
/// Workers stat entries concurrently; pipelines run one entry at a time under
/// a single lock, in no particular order.
pub(crate) fn walk(
    root: &Path,
    config: &WalkConfig,
    scope: &CancelScope,
    pipelines: &mut Pipelines<'_>,
) -> Result<Summary, WalkError> {
    let start = Instant::now();

    let mut builder = WalkBuilder::new(root);
    builder
        .standard_filters(false)
        .ignore(false)
        .parents(false)
        .hidden(false)
        .follow_links(config.follow_links)
        .same_file_system(false)
        .threads(config.threads);

    if let Some(depth) = config.max_depth {
        builder.max_depth(Some(depth));
    }

    let shared = Mutex::new(Shared {
        pipelines,
        tally:   Tally::default(),
        failure: None,
    });

    builder.build_parallel().run(|| {
        let shared = &shared;
        Box::new(move |res: Result<DirEntry, ignore::Error>| -> WalkState {
            if scope.is_cancelled() {
                return WalkState::Quit;
            }

            // Stat outside the lock so workers overlap on I/O.
            let res = res
                .and_then(|entry| {
                    let info = entry.metadata()?;
                    Ok(DiskFile::new(entry.into_path(), &info))
                })
                .map_err(|err| map_ignore_error(err, root));

            let mut shared = shared.lock().unwrap_or_else(PoisonError::into_inner);
            if shared.failure.is_some() {
                return WalkState::Quit;
            }

            let file = match res {
                Ok(file) => file,
                Err(err) => {
                    let path = err.path().cloned().unwrap_or_else(|| root.to_path_buf());
                    return match shared.pipelines.filter_error(&path, err) {
                        None => {
                            shared.tally.suppressed();
                            WalkState::Continue
                        }
                        Some(err) => {
                            shared.failure = Some(err);
                            WalkState::Quit
                        }
                    };
                }
            };

            shared.tally.seen();
            let outcome = shared.pipelines.process(&file);
            shared.tally.record(&outcome);
            match outcome {
                Outcome::Pruned => {
                    log::debug!("pruning subtree {}", file.path().display());
                    WalkState::Skip
                }
                Outcome::Failed(err) => {
                    shared.failure = Some(err);
                    WalkState::Quit
                }
                Outcome::Visited | Outcome::Skipped | Outcome::Suppressed => WalkState::Continue,
            }
        })
    });

    let shared = shared.into_inner().unwrap_or_else(PoisonError::into_inner);
    if let Some(err) = shared.failure {
        return Err(err);
    }

    let cancelled = scope.is_cancelled();
    if cancelled {
        log::debug!("walk of {} cancelled", root.display());
    }
    Ok(shared.tally.finish(cancelled, start.elapsed()))
}

// ---------------------------------------------------------------------------
// Map ignore::Error to WalkError
// ---------------------------------------------------------------------------

fn map_ignore_error(e: ignore::Error, root: &Path) -> WalkError {
    classify(e, None, root)
}

/// Unwrap `WithPath`/`WithDepth` layers, keeping the innermost path.
fn classify(e: ignore::Error, path: Option<PathBuf>, root: &Path) -> WalkError {
    match e {
        ignore::Error::WithPath { path, err } => classify(*err, Some(path), root),
        ignore::Error::WithDepth { err, .. } => classify(*err, path, root),
        ignore::Error::WithLineNumber { err, .. } => classify(*err, path, root),
        ignore::Error::Loop { child, .. } => WalkError::SymlinkLoop(child),
        ignore::Error::Io(io_err) => io_error(path.as_deref().unwrap_or(root), io_err),
        other => match path {
            Some(path) => WalkError::Traversal(format!("{}: {}", path.display(), other)),
            None => WalkError::Traversal(other.to_string()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn open_captures_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hello.txt");
        fs::write(&path, b"hello").unwrap();

        let file = DiskFile::open(&path).unwrap();
        assert_eq!(file.metadata().kind(), EntryKind::File);
        assert_eq!(file.metadata().size(), 5);
        assert_eq!(&*file.content().unwrap(), b"hello");
    }

    #[test]
    fn open_missing_path_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        assert!(matches!(DiskFile::open(&missing), Err(WalkError::NotFound(_))));
    }

    #[test]
    fn content_survives_file_removal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f");
        fs::write(&path, b"first").unwrap();

        let file = DiskFile::open(&path).unwrap();
        let first = file.content().unwrap();
        fs::remove_file(&path).unwrap();
        let second = file.content().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn maps_permission_errors_with_path() {
        let err = ignore::Error::WithPath {
            path: PathBuf::from("/locked"),
            err: Box::new(ignore::Error::Io(io::Error::from(io::ErrorKind::PermissionDenied))),
        };
        match map_ignore_error(err, Path::new("/")) {
            WalkError::PermissionDenied(p) => assert_eq!(p, Path::new("/locked")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn nested_stat_failure_keeps_kind_and_path() {
        let err = ignore::Error::WithPath {
            path: PathBuf::from("/locked/child"),
            err: Box::new(ignore::Error::WithDepth {
                depth: 1,
                err: Box::new(ignore::Error::Io(io::Error::from(
                    io::ErrorKind::PermissionDenied,
                ))),
            }),
        };
        let mapped = map_ignore_error(err, Path::new("/locked"));
        match &mapped {
            WalkError::PermissionDenied(p) => assert_eq!(p, Path::new("/locked/child")),
            other => panic!("unexpected {other:?}"),
        }
        assert!(mapped.is_permission_denied());
        assert_eq!(
            crate::filters::skip_permission_errors(Path::new("/locked/child"), &mapped),
            crate::ErrorAction::Suppress
        );
    }

    #[test]
    fn nested_missing_root_is_not_found() {
        let err = ignore::Error::WithPath {
            path: PathBuf::from("/gone"),
            err: Box::new(ignore::Error::WithDepth {
                depth: 0,
                err: Box::new(ignore::Error::Io(io::Error::from(io::ErrorKind::NotFound))),
            }),
        };
        match map_ignore_error(err, Path::new("/gone")) {
            WalkError::NotFound(p) => assert_eq!(p, Path::new("/gone")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn pathless_io_error_falls_back_to_root() {
        let err = ignore::Error::Io(io::Error::other("disk on fire"));
        match map_ignore_error(err, Path::new("/root")) {
            WalkError::Io { path, .. } => assert_eq!(path, Path::new("/root")),
            other => panic!("unexpected {other:?}"),
        }
    }
}
