use std::borrow::Cow;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::cell::RefCell;
use std::sync::Arc;
use std::time::{Instant, SystemTime};

use tar::{EntryType, Header};

use crate::cancel::CancelScope;
use crate::entry::{EntryKind, File, Metadata, OnceContent, Timestat};
use crate::error::WalkError;
use crate::pipeline::{Outcome, Pipelines};
use crate::platform::from_unix;
use crate::results::{Summary, Tally};

// ---------------------------------------------------------------------------
// ArchiveFile
// ---------------------------------------------------------------------------

/// An entry of a tar stream.
///
/// Metadata and times come from the entry header. The content is the entry's
/// section of the stream, drained at most once; the file borrows the
/// underlying entry and cannot outlive the stream position.
pub struct ArchiveFile<'e> {
    path: PathBuf,
    metadata: Metadata,
    times: Timestat,
    reader: RefCell<&'e mut (dyn Read + 'e)>,
    content: OnceContent,
}

impl<'e> ArchiveFile<'e> {
    /// Build an `ArchiveFile` from the current entry of a tar stream.
    ///
    /// Fails when the header carries an unusable path or numeric field.
    pub fn from_entry<R: Read>(entry: &'e mut tar::Entry<'_, R>) -> Result<Self, WalkError> {
        let path = entry
            .path()
            .map_err(|e| WalkError::InvalidEntry(format!("unreadable entry name: {e}")))?
            .into_owned();
        if path.as_os_str().is_empty() {
            return Err(WalkError::InvalidEntry("empty entry name".into()));
        }

        let header = entry.header();
        let mode = header
            .mode()
            .map_err(|e| invalid_field(&path, "mode", e))?;
        let mtime = header
            .mtime()
            .map_err(|e| invalid_field(&path, "mtime", e))?;
        let kind = kind_of(header.entry_type());
        let mut times = Timestat {
            modified: header_time(mtime).unwrap_or(SystemTime::UNIX_EPOCH),
            changed: None,
            accessed: None,
        };
        gnu_times(header, &mut times);

        if let Some(extensions) = entry
            .pax_extensions()
            .map_err(|e| invalid_field(&path, "pax extensions", e))?
        {
            for extension in extensions {
                let extension = extension.map_err(|e| invalid_field(&path, "pax record", e))?;
                let (Ok(key), Ok(value)) = (extension.key(), extension.value()) else {
                    continue;
                };
                let Some(t) = pax_time(value) else {
                    continue;
                };
                match key {
                    "mtime" => times.modified = t,
                    "atime" => times.accessed = Some(t),
                    "ctime" => times.changed = Some(t),
                    _ => {}
                }
            }
        }

        let metadata = Metadata::new(kind, entry.size(), mode, times.modified);
        Ok(Self::from_parts(path, metadata, times, entry))
    }

    pub(crate) fn from_parts(
        path: PathBuf,
        metadata: Metadata,
        times: Timestat,
        reader: &'e mut (dyn Read + 'e),
    ) -> Self {
        Self {
            path,
            metadata,
            times,
            reader: RefCell::new(reader),
            content: OnceContent::default(),
        }
    }
}

impl File for ArchiveFile<'_> {
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
        self.content.get_or_read(&self.path, || {
            let mut reader = self.reader.borrow_mut();
            let mut buf = Vec::new();
            reader.read_to_end(&mut buf)?;
            Ok(buf)
        })
    }
}

fn kind_of(entry_type: EntryType) -> EntryKind {
    if entry_type.is_file() {
        EntryKind::File
    } else if entry_type.is_dir() {
        EntryKind::Dir
    } else if entry_type.is_symlink() {
        EntryKind::Symlink
    } else {
        EntryKind::Other
    }
}

fn invalid_field(path: &Path, field: &str, err: io::Error) -> WalkError {
    WalkError::InvalidEntry(format!("{}: bad {field}: {err}", path.display()))
}

/// Access and change times from a GNU header; zero means "not recorded".
fn gnu_times(header: &Header, times: &mut Timestat) {
    let Some(gnu) = header.as_gnu() else {
        return;
    };
    if let Ok(atime) = gnu.atime() {
        times.accessed = (atime != 0).then(|| header_time(atime)).flatten();
    }
    if let Ok(ctime) = gnu.ctime() {
        times.changed = (ctime != 0).then(|| header_time(ctime)).flatten();
    }
}

/// Base-256 header fields can exceed `i64::MAX`; those are unrepresentable.
fn header_time(secs: u64) -> Option<SystemTime> {
    from_unix(i64::try_from(secs).ok()?, 0)
}

/// Parse a PAX timestamp record such as `1700000000.123456789` or `-5.5`.
fn pax_time(value: &str) -> Option<SystemTime> {
    let (secs, frac) = match value.split_once('.') {
        Some((secs, frac)) => (secs, frac),
        None => (value, ""),
    };
    if frac.bytes().any(|b| !b.is_ascii_digit()) {
        return None;
    }
    let negative = secs.starts_with('-');
    let secs: i64 = secs.parse().ok()?;

    // Keep nanosecond precision; extra digits are truncated.
    let digits: Cow<'_, str> = if frac.len() >= 9 {
        Cow::Borrowed(&frac[..9])
    } else {
        Cow::Owned(format!("{frac:0<9}"))
    };
    let nanos: i64 = digits.parse().ok()?;

    if negative && nanos > 0 {
        from_unix(secs.checked_sub(1)?, 1_000_000_000 - nanos)
    } else {
        from_unix(secs, nanos)
    }
}

// ---------------------------------------------------------------------------
// Prefix-exclusion pruning
// ---------------------------------------------------------------------------

/// Subtrees pruned so far in a linear stream.
///
/// A tar stream cannot be "not descended into", so pruned directory paths are
/// remembered and every later entry below one of them is dropped.
#[derive(Debug, Default)]
struct PrunedPrefixes {
    prefixes: Vec<PathBuf>,
}

impl PrunedPrefixes {
    fn insert(&mut self, path: &Path) {
        self.prefixes.push(path.to_path_buf());
    }

    /// Component-wise, so `a/skip` covers `a/skip/x` but not `a/skipper`.
    fn covers(&self, path: &Path) -> bool {
        self.prefixes.iter().any(|prefix| path.starts_with(prefix))
    }
}

// ---------------------------------------------------------------------------
// walk()
// ---------------------------------------------------------------------------

/// Scan a tar stream sequentially, running `pipelines` once per entry in
/// stream order.
pub(crate) fn walk<R: Read>(
    reader: R,
    scope: &CancelScope,
    pipelines: &mut Pipelines<'_>,
) -> Result<Summary, WalkError> {
    let start = Instant::now();
    let mut tally = Tally::default();
    let mut pruned = PrunedPrefixes::default();

    let mut archive = tar::Archive::new(reader);
    let mut entries = archive.entries().map_err(WalkError::Archive)?;

    loop {
        if scope.is_cancelled() {
            log::debug!("archive walk cancelled");
            return Ok(tally.finish(true, start.elapsed()));
        }

        let mut entry = match entries.next() {
            Some(entry) => entry.map_err(WalkError::Archive)?,
            None => break,
        };
        let file = ArchiveFile::from_entry(&mut entry)?;
        tally.seen();

        if pruned.covers(file.path()) {
            log::trace!("dropping {} under a pruned subtree", file.path().display());
            tally.dropped();
            continue;
        }

        let outcome = pipelines.process(&file);
        tally.record(&outcome);
        match outcome {
            Outcome::Pruned => {
                log::debug!("pruning subtree {}", file.path().display());
                pruned.insert(file.path());
            }
            Outcome::Failed(err) => return Err(err),
            Outcome::Visited | Outcome::Skipped | Outcome::Suppressed => {}
        }
    }

    Ok(tally.finish(false, start.elapsed()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, UNIX_EPOCH};

    /// Counts how many times the underlying stream is actually read.
    struct CountingReader<'a> {
        inner: &'a [u8],
        reads: &'a std::sync::atomic::AtomicUsize,
    }

    impl Read for CountingReader<'_> {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.reads.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            self.inner.read(buf)
        }
    }

    #[test]
    fn content_drains_the_stream_once() {
        let reads = std::sync::atomic::AtomicUsize::new(0);
        let mut reader = CountingReader {
            inner: b"archived bytes",
            reads: &reads,
        };
        let times = Timestat {
            modified: UNIX_EPOCH,
            changed: None,
            accessed: None,
        };
        let metadata = Metadata::new(EntryKind::File, 14, 0o644, UNIX_EPOCH);
        let file = ArchiveFile::from_parts("a/b".into(), metadata, times, &mut reader);

        let first = file.content().unwrap();
        let after_first = reads.load(std::sync::atomic::Ordering::SeqCst);
        for _ in 0..5 {
            let again = file.content().unwrap();
            assert!(Arc::ptr_eq(&first, &again));
        }
        assert_eq!(reads.load(std::sync::atomic::Ordering::SeqCst), after_first);
        assert_eq!(&*first, b"archived bytes");
    }

    #[test]
    fn pruned_prefixes_match_whole_components() {
        let mut pruned = PrunedPrefixes::default();
        pruned.insert(Path::new("d0/skips/d3/skip/"));

        assert!(pruned.covers(Path::new("d0/skips/d3/skip/f5")));
        assert!(pruned.covers(Path::new("d0/skips/d3/skip")));
        assert!(!pruned.covers(Path::new("d0/skips/d3/skipper")));
        assert!(!pruned.covers(Path::new("d0/skips/d3/z2")));
    }

    #[test]
    fn parses_pax_times() {
        assert_eq!(pax_time("10"), Some(UNIX_EPOCH + Duration::from_secs(10)));
        assert_eq!(
            pax_time("10.5"),
            Some(UNIX_EPOCH + Duration::from_millis(10_500))
        );
        assert_eq!(
            pax_time("1.1234567891"),
            Some(UNIX_EPOCH + Duration::new(1, 123_456_789))
        );
        assert_eq!(
            pax_time("-1.5"),
            Some(UNIX_EPOCH - Duration::from_millis(1_500))
        );
        assert_eq!(pax_time("x.5"), None);
        assert_eq!(pax_time("1.5e3"), None);
        assert_eq!(pax_time("-9223372036854775808.5"), None);
    }

    #[test]
    fn header_times_beyond_i64_are_unrepresentable() {
        assert_eq!(header_time(u64::MAX), None);
        assert_eq!(header_time(10), Some(UNIX_EPOCH + Duration::from_secs(10)));
    }
}
