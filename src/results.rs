use std::time::Duration;

use crate::pipeline::Outcome;

/// Statistics of a completed walk.
///
/// A walk that stopped because of cancellation still returns a `Summary`,
/// with [`cancelled`](Summary::cancelled) set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Summary {
    /// Entries the backend produced, including ones dropped before any checker ran.
    pub entries: usize,

    /// Entries that passed every checker and every visitor.
    pub visited: usize,

    /// Entries a checker skipped, plus archive entries dropped under a pruned subtree.
    pub skipped: usize,

    /// Subtree prunes requested by checkers.
    pub pruned: usize,

    /// Visitor or backend errors swallowed by an error filter.
    pub suppressed: usize,

    /// Whether the walk stopped early because its scope was cancelled.
    pub cancelled: bool,

    /// Wall-clock time from walk start to completion.
    pub duration: Duration,
}

/// Running counters owned by a backend while it walks.
#[derive(Debug, Default)]
pub(crate) struct Tally {
    summary: Summary,
}

impl Tally {
    pub(crate) fn seen(&mut self) {
        self.summary.entries += 1;
    }

    /// An archive entry that lies under an already pruned prefix.
    pub(crate) fn dropped(&mut self) {
        self.summary.skipped += 1;
    }

    pub(crate) fn suppressed(&mut self) {
        self.summary.suppressed += 1;
    }

    pub(crate) fn record(&mut self, outcome: &Outcome) {
        match outcome {
            Outcome::Visited => self.summary.visited += 1,
            Outcome::Skipped => self.summary.skipped += 1,
            Outcome::Pruned => self.summary.pruned += 1,
            Outcome::Suppressed => self.summary.suppressed += 1,
            Outcome::Failed(_) => {}
        }
    }

    pub(crate) fn finish(self, cancelled: bool, duration: Duration) -> Summary {
        Summary {
            cancelled,
            duration,
            ..self.summary
        }
    }
}
