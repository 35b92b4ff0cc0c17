//! Per-position reporting for comparison runs.

use std::io::{self, Write};

use serde::Serialize;

use super::{Outcome, Tally};
use crate::corpus::CorpusEntry;
use crate::types::MoveToken;

const GREEN: &str = "\x1b[92m";
const RED: &str = "\x1b[91m";
const YELLOW: &str = "\x1b[93m";
const BLUE: &str = "\x1b[94m";
const MAGENTA: &str = "\x1b[95m";
const RESET: &str = "\x1b[0m";

/// Sink for the streamed report of a run.
pub trait Reporter {
    fn on_outcome(&mut self, entry: &CorpusEntry, outcome: &Outcome) -> io::Result<()>;

    fn on_finish(&mut self, tally: &Tally) -> io::Result<()>;
}

/// Human-readable report, one line per position plus mismatch details.
pub struct ConsoleReporter<W: Write> {
    out: W,
    color: bool,
    show_good: bool,
}

impl<W: Write> ConsoleReporter<W> {
    pub fn new(out: W) -> Self {
        ConsoleReporter {
            out,
            color: cfg!(feature = "color"),
            show_good: true,
        }
    }

    #[must_use]
    pub fn with_color(mut self, color: bool) -> Self {
        self.color = color;
        self
    }

    /// Print a line for matching positions too (default on).
    #[must_use]
    pub fn with_good_lines(mut self, show_good: bool) -> Self {
        self.show_good = show_good;
        self
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn line(&mut self, color: &str, text: &str) -> io::Result<()> {
        if self.color {
            writeln!(self.out, "{color}{text}{RESET}")
        } else {
            writeln!(self.out, "{text}")
        }
    }
}

fn token_list(tokens: &[MoveToken]) -> String {
    let joined: Vec<&str> = tokens.iter().map(MoveToken::as_str).collect();
    format!("[{}]", joined.join(", "))
}

impl<W: Write> Reporter for ConsoleReporter<W> {
    fn on_outcome(&mut self, entry: &CorpusEntry, outcome: &Outcome) -> io::Result<()> {
        match outcome {
            Outcome::Good => {
                if self.show_good {
                    self.line(GREEN, &format!("✔ {}", entry.descriptor))?;
                }
            }
            Outcome::Bad(report) => {
                self.line(RED, &format!("✘ {}", report.descriptor))?;
                if !report.driver_only.is_empty() {
                    let text = format!("  Candidate only : {}", token_list(&report.driver_only));
                    self.line(BLUE, &text)?;
                }
                if !report.oracle_only.is_empty() {
                    let text = format!("  Missing        : {}", token_list(&report.oracle_only));
                    self.line(MAGENTA, &text)?;
                }
            }
            Outcome::Warning => {
                self.line(
                    YELLOW,
                    &format!("⚠ No moves from candidate: {}", entry.descriptor),
                )?;
            }
        }
        Ok(())
    }

    fn on_finish(&mut self, tally: &Tally) -> io::Result<()> {
        writeln!(self.out)?;
        if tally.warnings > 0 {
            writeln!(
                self.out,
                "{} positions with no moves from the candidate.",
                tally.warnings
            )?;
        }
        writeln!(
            self.out,
            "{} good positions, {} bad positions.",
            tally.good, tally.bad
        )?;
        self.out.flush()
    }
}

#[derive(Serialize)]
struct OutcomeLine<'a> {
    line: usize,
    outcome: &'static str,
    descriptor: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    driver_only: Option<&'a [MoveToken]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    oracle_only: Option<&'a [MoveToken]>,
}

#[derive(Serialize)]
struct SummaryLine<'a> {
    summary: &'a Tally,
}

/// Machine-readable report: one JSON object per line.
///
/// Mismatches and warnings are always written; matching positions only when
/// asked for. The last line carries the tally.
pub struct JsonLinesReporter<W: Write> {
    out: W,
    include_good: bool,
}

impl<W: Write> JsonLinesReporter<W> {
    pub fn new(out: W) -> Self {
        JsonLinesReporter {
            out,
            include_good: false,
        }
    }

    #[must_use]
    pub fn with_good_lines(mut self, include_good: bool) -> Self {
        self.include_good = include_good;
        self
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn write_json<T: Serialize>(&mut self, value: &T) -> io::Result<()> {
        serde_json::to_writer(&mut self.out, value)?;
        writeln!(self.out)
    }
}

impl<W: Write> Reporter for JsonLinesReporter<W> {
    fn on_outcome(&mut self, entry: &CorpusEntry, outcome: &Outcome) -> io::Result<()> {
        if matches!(outcome, Outcome::Good) && !self.include_good {
            return Ok(());
        }
        let (driver_only, oracle_only) = match outcome {
            Outcome::Bad(report) => (
                Some(report.driver_only.as_slice()),
                Some(report.oracle_only.as_slice()),
            ),
            _ => (None, None),
        };
        self.write_json(&OutcomeLine {
            line: entry.line,
            outcome: outcome.label(),
            descriptor: entry.descriptor.as_str(),
            driver_only,
            oracle_only,
        })
    }

    fn on_finish(&mut self, tally: &Tally) -> io::Result<()> {
        self.write_json(&SummaryLine { summary: tally })?;
        self.out.flush()
    }
}

/// Keeps every outcome in memory.
#[derive(Debug, Default)]
pub struct RecordingReporter {
    pub outcomes: Vec<(CorpusEntry, Outcome)>,
    pub finished: Option<Tally>,
}

impl RecordingReporter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mismatch reports in corpus order.
    pub fn mismatches(&self) -> impl Iterator<Item = &super::MismatchReport> {
        self.outcomes.iter().filter_map(|(_, outcome)| match outcome {
            Outcome::Bad(report) => Some(report),
            _ => None,
        })
    }
}

impl Reporter for RecordingReporter {
    fn on_outcome(&mut self, entry: &CorpusEntry, outcome: &Outcome) -> io::Result<()> {
        self.outcomes.push((entry.clone(), outcome.clone()));
        Ok(())
    }

    fn on_finish(&mut self, tally: &Tally) -> io::Result<()> {
        self.finished = Some(*tally);
        Ok(())
    }
}

/// Forwards every event to several reporters, in order.
#[derive(Default)]
pub struct Fanout {
    reporters: Vec<Box<dyn Reporter>>,
}

impl Fanout {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, reporter: Box<dyn Reporter>) {
        self.reporters.push(reporter);
    }
}

impl Reporter for Fanout {
    fn on_outcome(&mut self, entry: &CorpusEntry, outcome: &Outcome) -> io::Result<()> {
        for reporter in &mut self.reporters {
            reporter.on_outcome(entry, outcome)?;
        }
        Ok(())
    }

    fn on_finish(&mut self, tally: &Tally) -> io::Result<()> {
        for reporter in &mut self.reporters {
            reporter.on_finish(tally)?;
        }
        Ok(())
    }
}
