use std::path::Path;

use crate::entry::File;
use crate::error::WalkError;

/// Decision returned by a checker for one entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Let the next checker decide; visit the entry if every checker proceeds.
    Proceed,

    /// Do not visit this entry. Siblings and descendants are unaffected.
    Skip,

    /// Do not visit this entry nor anything below it.
    SkipSubtree,
}

/// Decision returned by an error filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorAction {
    /// Swallow the error; the walk continues as if nothing failed.
    Suppress,

    /// Hand the error to the next filter, or to the caller if none is left.
    Propagate,
}

/// A predicate deciding whether an entry is visited.
///
/// Only `Send` is required: during a directory walk checkers, visitors and
/// error filters all run under one lock, never concurrently.
pub type Checker<'a> = Box<dyn FnMut(&dyn File) -> Verdict + Send + 'a>;

/// Caller logic run for every entry that passes all checkers.
pub type Visitor<'a> = Box<dyn FnMut(&dyn File) -> Result<(), WalkError> + Send + 'a>;

/// Caller logic that may suppress a visitor or backend error.
pub type ErrorFilter<'a> = Box<dyn FnMut(&Path, &WalkError) -> ErrorAction + Send + 'a>;

/// What happened to one entry after the pipelines ran.
#[derive(Debug)]
pub(crate) enum Outcome {
    Visited,
    Skipped,
    Pruned,
    Suppressed,
    Failed(WalkError),
}

/// The three ordered pipelines shared by every backend.
#[derive(Default)]
pub(crate) struct Pipelines<'a> {
    pub(crate) checkers: Vec<Checker<'a>>,
    pub(crate) visitors: Vec<Visitor<'a>>,
    pub(crate) error_filters: Vec<ErrorFilter<'a>>,
}

impl Pipelines<'_> {
    /// Run checkers, then visitors, then (on failure) error filters for `file`.
    pub(crate) fn process(&mut self, file: &dyn File) -> Outcome {
        match self.check(file) {
            Verdict::Proceed => {}
            Verdict::Skip => return Outcome::Skipped,
            Verdict::SkipSubtree => return Outcome::Pruned,
        }

        match self.visit(file) {
            Ok(()) => Outcome::Visited,
            Err(err) => match self.filter_error(file.path(), err) {
                None => Outcome::Suppressed,
                Some(err) => Outcome::Failed(err),
            },
        }
    }

    /// First non-`Proceed` verdict wins; later checkers do not run.
    fn check(&mut self, file: &dyn File) -> Verdict {
        for checker in &mut self.checkers {
            let verdict = checker(file);
            if verdict != Verdict::Proceed {
                return verdict;
            }
        }
        Verdict::Proceed
    }

    fn visit(&mut self, file: &dyn File) -> Result<(), WalkError> {
        for visitor in &mut self.visitors {
            visitor(file)?;
        }
        Ok(())
    }

    /// Returns `None` when a filter suppressed `err`, otherwise `err` itself.
    pub(crate) fn filter_error(&mut self, path: &Path, err: WalkError) -> Option<WalkError> {
        for filter in &mut self.error_filters {
            if filter(path, &err) == ErrorAction::Suppress {
                log::debug!("suppressed error at {}: {}", path.display(), err);
                return None;
            }
        }
        Some(err)
    }
}
