//! Built-in checkers and error filters.
//!
//! Every checker here is a plain closure that can be registered with
//! [`Walker::check`](crate::Walker::check) and reused across walks.

use std::path::Path;

use crate::entry::File;
use crate::error::WalkError;
use crate::pipeline::{ErrorAction, Verdict};

// ---------------------------------------------------------------------------
// Path membership
// ---------------------------------------------------------------------------

fn has_any<F>(has: F, subs: Vec<String>) -> impl Fn(&dyn File) -> Verdict + Send + Sync + Clone
where
    F: Fn(&str, &str) -> bool + Send + Sync + Clone,
{
    move |file: &dyn File| {
        if subs.is_empty() {
            return Verdict::Proceed;
        }
        let path = file.path().to_string_lossy();
        if subs.iter().any(|sub| has(path.as_ref(), sub.as_str())) {
            Verdict::Proceed
        } else {
            Verdict::Skip
        }
    }
}

fn has_all<F>(has: F, subs: Vec<String>) -> impl Fn(&dyn File) -> Verdict + Send + Sync + Clone
where
    F: Fn(&str, &str) -> bool + Send + Sync + Clone,
{
    move |file: &dyn File| {
        let path = file.path().to_string_lossy();
        if subs.iter().all(|sub| has(path.as_ref(), sub.as_str())) {
            Verdict::Proceed
        } else {
            Verdict::Skip
        }
    }
}

fn collect<I, S>(subs: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    subs.into_iter().map(Into::into).collect()
}

fn starts_with(s: &str, sub: &str) -> bool {
    s.starts_with(sub)
}

fn ends_with(s: &str, sub: &str) -> bool {
    s.ends_with(sub)
}

/// Proceed only for paths starting with `prefix`.
pub fn has_prefix(prefix: impl Into<String>) -> impl Fn(&dyn File) -> Verdict + Send + Sync + Clone {
    has_any_prefix([prefix])
}

/// Proceed for paths starting with at least one of `prefixes`.
///
/// An empty list is treated as "no decision" and always proceeds.
pub fn has_any_prefix<I, S>(prefixes: I) -> impl Fn(&dyn File) -> Verdict + Send + Sync + Clone
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    has_any(starts_with, collect(prefixes))
}

/// Proceed for paths starting with every one of `prefixes`.
///
/// An empty list proceeds (nothing is required).
pub fn has_all_prefix<I, S>(prefixes: I) -> impl Fn(&dyn File) -> Verdict + Send + Sync + Clone
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    has_all(starts_with, collect(prefixes))
}

/// Proceed only for paths ending with `suffix`.
pub fn has_suffix(suffix: impl Into<String>) -> impl Fn(&dyn File) -> Verdict + Send + Sync + Clone {
    has_any_suffix([suffix])
}

/// Proceed for paths ending with at least one of `suffixes`.
///
/// An empty list is treated as "no decision" and always proceeds.
pub fn has_any_suffix<I, S>(suffixes: I) -> impl Fn(&dyn File) -> Verdict + Send + Sync + Clone
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    has_any(ends_with, collect(suffixes))
}

/// Proceed for paths ending with every one of `suffixes`.
pub fn has_all_suffix<I, S>(suffixes: I) -> impl Fn(&dyn File) -> Verdict + Send + Sync + Clone
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    has_all(ends_with, collect(suffixes))
}

// ---------------------------------------------------------------------------
// Kind
// ---------------------------------------------------------------------------

/// Proceed only for regular files. Directories, symlinks and special files are skipped.
pub fn is_regular() -> impl Fn(&dyn File) -> Verdict + Send + Sync + Clone {
    |file: &dyn File| {
        if file.metadata().is_regular() {
            Verdict::Proceed
        } else {
            Verdict::Skip
        }
    }
}

/// Prune every directory whose base name equals `dirname`.
///
/// Non-directories with that name proceed; only directories trigger pruning.
pub fn skip_dir(dirname: impl Into<String>) -> impl Fn(&dyn File) -> Verdict + Send + Sync + Clone {
    let dirname = dirname.into();
    move |file: &dyn File| {
        let matches = file
            .path()
            .file_name()
            .is_some_and(|name| name == dirname.as_str());
        if file.metadata().is_dir() && matches {
            Verdict::SkipSubtree
        } else {
            Verdict::Proceed
        }
    }
}

// ---------------------------------------------------------------------------
// Error filters
// ---------------------------------------------------------------------------

/// Suppress permission-denied errors; everything else propagates.
pub fn skip_permission_errors(path: &Path, err: &WalkError) -> ErrorAction {
    if err.is_permission_denied() {
        log::debug!("skipping unreadable path {}", path.display());
        ErrorAction::Suppress
    } else {
        ErrorAction::Propagate
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disk::DiskFile;
    use crate::entry::{EntryKind, Metadata};
    use std::io;
    use std::time::UNIX_EPOCH;

    fn entry(path: &str, kind: EntryKind) -> DiskFile {
        DiskFile::from_parts(path, Metadata::new(kind, 0, 0o644, UNIX_EPOCH))
    }

    fn reg(path: &str) -> DiskFile {
        entry(path, EntryKind::File)
    }

    #[test]
    fn any_prefix_needs_one_match() {
        let check = has_any_prefix(["/a", "/b"]);
        assert_eq!(check(&reg("/b/x")), Verdict::Proceed);
        assert_eq!(check(&reg("/c/x")), Verdict::Skip);
    }

    #[test]
    fn all_prefix_needs_every_match() {
        let check = has_all_prefix(["/a", "/a/b"]);
        assert_eq!(check(&reg("/a/b/c")), Verdict::Proceed);
        assert_eq!(check(&reg("/a/c")), Verdict::Skip);
    }

    #[test]
    fn empty_candidate_lists_proceed() {
        let none: [&str; 0] = [];
        assert_eq!(has_any_prefix(none)(&reg("/x")), Verdict::Proceed);
        assert_eq!(has_all_prefix(none)(&reg("/x")), Verdict::Proceed);
        assert_eq!(has_any_suffix(none)(&reg("/x")), Verdict::Proceed);
        assert_eq!(has_all_suffix(none)(&reg("/x")), Verdict::Proceed);
    }

    #[test]
    fn suffix_checks() {
        assert_eq!(has_suffix(".rs")(&reg("src/lib.rs")), Verdict::Proceed);
        assert_eq!(has_suffix(".rs")(&reg("Cargo.toml")), Verdict::Skip);
        assert_eq!(has_any_suffix([".md", ".toml"])(&reg("Cargo.toml")), Verdict::Proceed);
        assert_eq!(has_all_suffix(["lib.rs", ".rs"])(&reg("src/lib.rs")), Verdict::Proceed);
        assert_eq!(has_all_suffix(["main.rs", ".rs"])(&reg("src/lib.rs")), Verdict::Skip);
    }

    #[test]
    fn single_prefix_is_any_prefix() {
        assert_eq!(has_prefix("/d0")(&reg("/d0/f1")), Verdict::Proceed);
        assert_eq!(has_prefix("/d1")(&reg("/d0/f1")), Verdict::Skip);
    }

    #[test]
    fn regular_only() {
        let check = is_regular();
        assert_eq!(check(&reg("/f")), Verdict::Proceed);
        assert_eq!(check(&entry("/d", EntryKind::Dir)), Verdict::Skip);
        assert_eq!(check(&entry("/l", EntryKind::Symlink)), Verdict::Skip);
        assert_eq!(check(&entry("/p", EntryKind::Other)), Verdict::Skip);
    }

    #[test]
    fn skip_dir_prunes_only_directories() {
        let check = skip_dir("skip");
        assert_eq!(check(&entry("/d3/skip", EntryKind::Dir)), Verdict::SkipSubtree);
        assert_eq!(check(&entry("d3/skip/", EntryKind::Dir)), Verdict::SkipSubtree);
        assert_eq!(check(&reg("/d2/skip")), Verdict::Proceed);
        assert_eq!(check(&entry("/d3/skipper", EntryKind::Dir)), Verdict::Proceed);
    }

    #[test]
    fn permission_errors_are_suppressed() {
        let path = Path::new("/locked");
        let denied = WalkError::PermissionDenied(path.to_path_buf());
        let io_denied = WalkError::Io {
            path: path.to_path_buf(),
            source: io::Error::from(io::ErrorKind::PermissionDenied),
        };
        let missing = WalkError::NotFound(path.to_path_buf());

        assert_eq!(skip_permission_errors(path, &denied), ErrorAction::Suppress);
        assert_eq!(skip_permission_errors(path, &io_denied), ErrorAction::Suppress);
        assert_eq!(skip_permission_errors(path, &missing), ErrorAction::Propagate);
        assert_eq!(
            skip_permission_errors(path, &WalkError::visitor("boom")),
            ErrorAction::Propagate
        );
    }
}
