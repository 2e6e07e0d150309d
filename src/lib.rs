//! # treewalk
//!
//! Backend-agnostic file-tree traversal: register checkers, visitors and
//! error filters once, then run them against a live directory tree or a tar
//! stream with the same meaning for "skip this entry", "skip this subtree"
//! and "abort the walk".
//!
//! treewalk owns the pipelines and their short-circuit contract. It does
//! **not** decide what happens to matched files; that is visitor logic
//! supplied by the caller.
//!
//! # Quick Start
//!
//! ```rust
//! use treewalk::{filters, File, Verdict};
//!
//! // A small archive built in memory.
//! let mut builder = tar::Builder::new(Vec::new());
//! for (name, body) in [("src/lib.rs", "pub fn f() {}"), ("target/out.rs", "junk"), ("README.md", "hi")] {
//!     let mut header = tar::Header::new_gnu();
//!     header.set_size(body.len() as u64);
//!     header.set_mode(0o644);
//!     header.set_cksum();
//!     builder.append_data(&mut header, name, body.as_bytes()).unwrap();
//! }
//! let bytes = builder.into_inner().unwrap();
//!
//! let mut names = Vec::new();
//! let summary = treewalk::walker()
//!     .check(filters::has_any_suffix([".rs"]))
//!     .check(|f: &dyn File| {
//!         if f.path().starts_with("target") { Verdict::Skip } else { Verdict::Proceed }
//!     })
//!     .on_visit(|f: &dyn File| {
//!         names.push(f.path().display().to_string());
//!         Ok(())
//!     })
//!     .walk_archive(bytes.as_slice())
//!     .unwrap();
//!
//! assert_eq!(summary.visited, 1);
//! assert_eq!(names, vec!["src/lib.rs"]);
//! ```
//!
//! # Pipelines
//!
//! - **Checkers** return a [`Verdict`]: `Proceed`, `Skip` (this entry only)
//!   or `SkipSubtree` (this entry and everything below it). The first
//!   non-`Proceed` verdict wins.
//! - **Visitors** run, in order, for entries every checker let through. The
//!   first `Err` stops the remaining visitors for that entry.
//! - **Error filters** see visitor and traversal errors and may
//!   [`Suppress`](ErrorAction::Suppress) them; an unsuppressed error aborts
//!   the walk and is returned.
//!
//! # Ordering
//!
//! Archive walks visit entries in stream order. Directory walks stat entries
//! on several threads and visit them one at a time in whatever order the
//! workers deliver them, so compare results as sets.

#![forbid(unsafe_code)]

pub mod filters;

mod archive;
mod cancel;
mod disk;
mod entry;
mod error;
mod pipeline;
mod platform;
mod results;
mod walker;

// ── Public re-exports ─────────────────────────────────────────────────────────

pub use archive::ArchiveFile;
pub use cancel::CancelScope;
pub use disk::DiskFile;
pub use entry::{EntryKind, File, Metadata, Timestat};
pub use error::{BoxError, WalkError};
pub use pipeline::{Checker, ErrorAction, ErrorFilter, Verdict, Visitor};
pub use results::Summary;
pub use walker::Walker;

// ── Entry point ───────────────────────────────────────────────────────────────

/// Create a new [`Walker`] with empty pipelines and a fresh cancellation scope.
pub fn walker<'a>() -> Walker<'a> {
    Walker::new()
}
