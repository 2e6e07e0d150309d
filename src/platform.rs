//! Platform metadata extraction.
//!
//! Everything that depends on OS-specific `stat` fields lives here; the rest
//! of the crate only sees a [`Timestat`] triple and plain permission bits.

use std::fs;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::entry::Timestat;

/// Convert a seconds + nanoseconds pair relative to the Unix epoch.
///
/// Returns `None` when the value cannot be represented as a `SystemTime`.
pub(crate) fn from_unix(secs: i64, nsec: i64) -> Option<SystemTime> {
    let nsec = u32::try_from(nsec).ok().filter(|n| *n < 1_000_000_000)?;
    if secs >= 0 {
        UNIX_EPOCH.checked_add(Duration::new(secs as u64, nsec))
    } else {
        UNIX_EPOCH
            .checked_sub(Duration::from_secs(secs.unsigned_abs()))?
            .checked_add(Duration::from_nanos(u64::from(nsec)))
    }
}

#[cfg(unix)]
mod imp {
    use std::fs;
    use std::os::unix::fs::{MetadataExt, PermissionsExt};

    use super::from_unix;
    use crate::entry::Timestat;

    pub(super) fn timestat(meta: &fs::Metadata) -> Timestat {
        let modified = from_unix(meta.mtime(), meta.mtime_nsec())
            .or_else(|| meta.modified().ok())
            .unwrap_or(std::time::UNIX_EPOCH);
        Timestat {
            modified,
            changed: from_unix(meta.ctime(), meta.ctime_nsec()),
            accessed: from_unix(meta.atime(), meta.atime_nsec()),
        }
    }

    pub(super) fn mode(meta: &fs::Metadata) -> u32 {
        meta.permissions().mode() & 0o7777
    }
}

#[cfg(not(unix))]
mod imp {
    use std::fs;

    use crate::entry::Timestat;

    // No inode change time outside unix; creation time is not a substitute.
    pub(super) fn timestat(meta: &fs::Metadata) -> Timestat {
        Timestat {
            modified: meta.modified().unwrap_or(std::time::UNIX_EPOCH),
            changed: None,
            accessed: meta.accessed().ok(),
        }
    }

    pub(super) fn mode(meta: &fs::Metadata) -> u32 {
        let base = if meta.is_dir() { 0o755 } else { 0o644 };
        if meta.permissions().readonly() {
            base & 0o555
        } else {
            base
        }
    }
}

/// Extract the `{modified, changed, accessed}` triple from OS metadata.
pub(crate) fn timestat(meta: &fs::Metadata) -> Timestat {
    imp::timestat(meta)
}

/// Permission bits (`mode & 0o7777` on unix, an approximation elsewhere).
pub(crate) fn mode(meta: &fs::Metadata) -> u32 {
    imp::mode(meta)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_positive_and_negative_offsets() {
        assert_eq!(from_unix(0, 0), Some(UNIX_EPOCH));
        assert_eq!(
            from_unix(10, 500),
            Some(UNIX_EPOCH + Duration::new(10, 500))
        );
        assert_eq!(
            from_unix(-2, 250_000_000),
            Some(UNIX_EPOCH - Duration::from_millis(1750))
        );
    }

    #[test]
    fn rejects_out_of_range_nanoseconds() {
        assert_eq!(from_unix(1, -1), None);
        assert_eq!(from_unix(1, 1_000_000_000), None);
    }

    #[test]
    fn reads_times_of_a_real_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f");
        fs::write(&path, b"x").unwrap();
        let meta = fs::symlink_metadata(&path).unwrap();

        let stat = timestat(&meta);
        assert_eq!(Some(stat.modified), meta.modified().ok());
        assert!(stat.accessed.is_some());
        #[cfg(unix)]
        assert!(stat.changed.is_some());
    }
}
