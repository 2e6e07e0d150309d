use std::io::{BufReader, Read};
use std::path::Path;
use std::time::Duration;

use crate::archive;
use crate::cancel::CancelScope;
use crate::disk::{self, WalkConfig};
use crate::entry::File;
use crate::error::WalkError;
use crate::pipeline::{Checker, ErrorAction, ErrorFilter, Pipelines, Verdict, Visitor};
use crate::results::Summary;

// ---------------------------------------------------------------------------
// Walker
// ---------------------------------------------------------------------------

/// Owns the checker, visitor and error-filter pipelines and runs them over a
/// directory tree or a tar stream.
///
/// Created via [`treewalk::walker()`](crate::walker) or [`Walker::new`].
/// Register pipelines with the chained builder methods, then call one of the
/// `walk_*` methods as often as needed. Walks borrow the walker mutably, so
/// pipelines cannot change while a walk is running.
///
/// # Example
///
/// ```rust,no_run
/// use treewalk::{filters, File};
///
/// let mut found = Vec::new();
/// let mut walker = treewalk::walker()
///     .check(filters::skip_dir(".git"))
///     .check(filters::is_regular())
///     .check(filters::has_suffix(".rs"))
///     .on_visit(|f: &dyn File| {
///         found.push(f.path().to_path_buf());
///         Ok(())
///     })
///     .filter_error(filters::skip_permission_errors);
///
/// walker.walk_dir("src")?;
/// walker.walk_archive_file("snapshot.tar")?;
/// drop(walker);
/// println!("{} rust files", found.len());
/// # Ok::<(), treewalk::WalkError>(())
/// ```
pub struct Walker<'a> {
    pipelines: Pipelines<'a>,
    scope: CancelScope,
    config: WalkConfig,
}

impl Default for Walker<'_> {
    fn default() -> Self {
        Self::with_scope(&CancelScope::new())
    }
}

impl<'a> Walker<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a walker whose scope is a child of `parent`.
    ///
    /// Cancelling `parent` cancels every walk of this walker; cancelling the
    /// walker leaves `parent` untouched.
    pub fn with_scope(parent: &CancelScope) -> Self {
        Self {
            pipelines: Pipelines::default(),
            scope: parent.child(),
            config: WalkConfig::default(),
        }
    }

    // ── Checkers ──────────────────────────────────────────────────────────

    /// Append a checker. Checkers run in registration order.
    pub fn check<F>(mut self, checker: F) -> Self
    where
        F: FnMut(&dyn File) -> Verdict + Send + 'a,
    {
        self.pipelines.checkers.push(Box::new(checker));
        self
    }

    /// Append several pre-boxed checkers at once.
    pub fn checks(mut self, checkers: impl IntoIterator<Item = Checker<'a>>) -> Self {
        self.pipelines.checkers.extend(checkers);
        self
    }

    // ── Visitors ──────────────────────────────────────────────────────────

    /// Append a visitor. Visitors run in registration order, only for
    /// entries every checker let through.
    pub fn on_visit<F>(mut self, visitor: F) -> Self
    where
        F: FnMut(&dyn File) -> Result<(), WalkError> + Send + 'a,
    {
        self.pipelines.visitors.push(Box::new(visitor));
        self
    }

    /// Append several pre-boxed visitors at once.
    pub fn on_visits(mut self, visitors: impl IntoIterator<Item = Visitor<'a>>) -> Self {
        self.pipelines.visitors.extend(visitors);
        self
    }

    // ── Error filters ─────────────────────────────────────────────────────

    /// Append an error filter. The first filter returning
    /// [`ErrorAction::Suppress`] swallows the error.
    pub fn filter_error<F>(mut self, filter: F) -> Self
    where
        F: FnMut(&Path, &WalkError) -> ErrorAction + Send + 'a,
    {
        self.pipelines.error_filters.push(Box::new(filter));
        self
    }

    /// Append several pre-boxed error filters at once.
    pub fn filter_errors(mut self, filters: impl IntoIterator<Item = ErrorFilter<'a>>) -> Self {
        self.pipelines.error_filters.extend(filters);
        self
    }

    // ── Options ───────────────────────────────────────────────────────────

    /// Number of threads statting a directory tree.
    ///
    /// Defaults to the number of logical CPU cores. Archive walks are always
    /// sequential.
    pub fn threads(mut self, n: usize) -> Self {
        self.config.threads = n;
        self
    }

    /// Maximum directory depth. `0` means the root only. Unlimited by
    /// default; ignored by archive walks.
    pub fn max_depth(mut self, d: usize) -> Self {
        self.config.max_depth = Some(d);
        self
    }

    /// Follow symbolic links while walking a directory tree. Off by default.
    pub fn follow_links(mut self, yes: bool) -> Self {
        self.config.follow_links = yes;
        self
    }

    // ── Cancellation ──────────────────────────────────────────────────────

    /// Cancel the current and every future walk of this walker.
    pub fn cancel(&self) {
        self.scope.cancel();
    }

    /// A handle to this walker's scope, usable from any thread (including
    /// from inside a visitor) to cancel a running walk.
    pub fn scope(&self) -> CancelScope {
        self.scope.clone()
    }

    // ── Execute ───────────────────────────────────────────────────────────

    /// Walk a directory tree rooted at `root`, root included.
    ///
    /// Entries are statted concurrently and visited one at a time, in no
    /// guaranteed order.
    ///
    /// # Errors
    ///
    /// Returns the first visitor or traversal error no error filter
    /// suppressed. A cancelled walk returns `Ok`.
    pub fn walk_dir(&mut self, root: impl AsRef<Path>) -> Result<Summary, WalkError> {
        if self.scope.is_cancelled() {
            return Ok(cancelled());
        }
        disk::walk(root.as_ref(), &self.config, &self.scope, &mut self.pipelines)
    }

    /// Open the tar file at `path` and walk it.
    pub fn walk_archive_file(&mut self, path: impl AsRef<Path>) -> Result<Summary, WalkError> {
        let path = path.as_ref();
        let fd = std::fs::File::open(path).map_err(|source| WalkError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        self.walk_archive(BufReader::new(fd))
    }

    /// Walk a tar stream, visiting entries in stream order.
    ///
    /// # Errors
    ///
    /// Returns a stream read failure or a malformed header immediately, and
    /// the first visitor error no error filter suppressed. A cancelled walk
    /// returns `Ok`.
    pub fn walk_archive<R: Read>(&mut self, reader: R) -> Result<Summary, WalkError> {
        archive::walk(reader, &self.scope, &mut self.pipelines)
    }
}

fn cancelled() -> Summary {
    Summary {
        cancelled: true,
        duration: Duration::ZERO,
        ..Summary::default()
    }
}
