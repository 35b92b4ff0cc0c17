//! Differential comparator.
//!
//! Walks the corpus in file order, asks the candidate and the oracle for each
//! position's legal moves and classifies the pair. One query is in flight at
//! a time; the line protocol has no framing that would survive pipelining.

mod report;
#[cfg(test)]
mod tests;

pub use report::{ConsoleReporter, Fanout, JsonLinesReporter, RecordingReporter, Reporter};

use serde::{Deserialize, Serialize};

use crate::corpus::CorpusEntry;
use crate::driver::Candidate;
use crate::error::{CorpusError, HarnessError};
use crate::oracle::Oracle;
use crate::sync::StopFlag;
use crate::types::{MoveSet, MoveToken, PositionDescriptor};

/// Outcome counters for one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tally {
    pub good: u64,
    pub bad: u64,
    /// Positions where the candidate answered with no moves
    pub warnings: u64,
}

impl Tally {
    /// Positions classified so far.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.good + self.bad + self.warnings
    }

    pub fn record(&mut self, outcome: &Outcome) {
        match outcome {
            Outcome::Good => self.good += 1,
            Outcome::Bad(_) => self.bad += 1,
            Outcome::Warning => self.warnings += 1,
        }
    }
}

/// Where the candidate and the oracle disagree on one position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MismatchReport {
    pub descriptor: PositionDescriptor,
    /// Moves only the candidate claims, sorted
    pub driver_only: Vec<MoveToken>,
    /// Moves only the oracle knows, sorted
    pub oracle_only: Vec<MoveToken>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Good,
    Bad(MismatchReport),
    /// The candidate returned an empty set; left for manual inspection
    Warning,
}

impl Outcome {
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Good => "good",
            Outcome::Bad(_) => "bad",
            Outcome::Warning => "warning",
        }
    }
}

/// Classify one position.
///
/// An empty candidate set is a warning even when the oracle agrees (mate or
/// stalemate), since it is indistinguishable from a protocol failure.
#[must_use]
pub fn classify(descriptor: &PositionDescriptor, driver: &MoveSet, oracle: &MoveSet) -> Outcome {
    if driver.is_empty() {
        return Outcome::Warning;
    }
    if driver == oracle {
        return Outcome::Good;
    }
    Outcome::Bad(MismatchReport {
        descriptor: descriptor.clone(),
        driver_only: driver.difference(oracle),
        oracle_only: oracle.difference(driver),
    })
}

#[derive(Debug, Clone, Default)]
pub struct CompareOptions {
    /// Stop after this many positions
    pub limit: Option<u64>,
    /// Stop after the first mismatch
    pub fail_fast: bool,
    pub stop: StopFlag,
}

/// Run the comparison over `corpus` and return the final tally.
///
/// `candidate.reset()` is sent once, before the first query. Corpus and
/// candidate failures abort the run; mismatches and warnings do not.
pub fn run<I, C, O, R>(
    corpus: I,
    candidate: &mut C,
    oracle: &O,
    reporter: &mut R,
    options: &CompareOptions,
) -> Result<Tally, HarnessError>
where
    I: IntoIterator<Item = Result<CorpusEntry, CorpusError>>,
    C: Candidate + ?Sized,
    O: Oracle + ?Sized,
    R: Reporter + ?Sized,
{
    let mut tally = Tally::default();
    candidate.reset()?;
    log::debug!("candidate reset, starting comparison");

    for entry in corpus {
        if options.stop.is_stopped() {
            return Err(HarnessError::Interrupted);
        }
        if options.limit.is_some_and(|limit| tally.total() >= limit) {
            log::info!("position limit reached after {}", tally.total());
            break;
        }

        let entry = entry?;
        let oracle_moves = oracle
            .legal_moves(&entry.descriptor)
            .map_err(|error| CorpusError::InvalidDescriptor {
                line: entry.line,
                error,
            })?;
        // A Ctrl-C usually reaches the candidate too; report that as the
        // interrupt rather than as a candidate failure.
        let driver_moves = candidate
            .legal_moves(&entry.descriptor)
            .map_err(|e| {
                if options.stop.is_stopped() {
                    HarnessError::Interrupted
                } else {
                    HarnessError::Engine(e)
                }
            })?;

        let outcome = classify(&entry.descriptor, &driver_moves, &oracle_moves);
        tally.record(&outcome);
        match &outcome {
            Outcome::Good => {}
            Outcome::Bad(report) => log::debug!(
                "line {}: mismatch, {} extra, {} missing",
                entry.line,
                report.driver_only.len(),
                report.oracle_only.len()
            ),
            Outcome::Warning => log::warn!(
                "line {}: candidate returned no moves for {}",
                entry.line,
                entry.descriptor
            ),
        }
        reporter
            .on_outcome(&entry, &outcome)
            .map_err(HarnessError::Report)?;

        if options.fail_fast && matches!(outcome, Outcome::Bad(_)) {
            log::info!("stopping at first mismatch (line {})", entry.line);
            break;
        }
    }

    reporter.on_finish(&tally).map_err(HarnessError::Report)?;
    log::info!(
        "{} positions: {} good, {} bad, {} warnings",
        tally.total(),
        tally.good,
        tally.bad,
        tally.warnings
    );
    Ok(tally)
}
