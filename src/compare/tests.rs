//! Comparator tests against in-memory candidates and oracles.

use std::collections::{BTreeMap, VecDeque};

use proptest::prelude::*;

use super::*;
use crate::error::{EngineError, OracleError};
use crate::oracle::ReferenceOracle;

const AFTER_E4: &str = "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq e3 0 1";

/// Replays canned response lines and records what it was asked.
#[derive(Default)]
struct ScriptedCandidate {
    responses: VecDeque<String>,
    resets: usize,
    queries: Vec<String>,
    fail_after: Option<usize>,
}

impl ScriptedCandidate {
    fn new<I: IntoIterator<Item = &'static str>>(responses: I) -> Self {
        ScriptedCandidate {
            responses: responses.into_iter().map(str::to_string).collect(),
            ..Self::default()
        }
    }
}

impl Candidate for ScriptedCandidate {
    fn reset(&mut self) -> Result<(), EngineError> {
        self.resets += 1;
        Ok(())
    }

    fn legal_moves(&mut self, position: &PositionDescriptor) -> Result<MoveSet, EngineError> {
        if self.fail_after == Some(self.queries.len()) {
            return Err(EngineError::Closed);
        }
        self.queries.push(position.as_str().to_string());
        let line = self.responses.pop_front().ok_or(EngineError::Closed)?;
        Ok(MoveSet::from_response_line(&line))
    }
}

/// Oracle answering from a fixed table; unknown descriptors are malformed.
struct TableOracle(BTreeMap<String, MoveSet>);

impl TableOracle {
    fn single(fen: &str, moves: &str) -> Self {
        let mut table = BTreeMap::new();
        table.insert(fen.to_string(), MoveSet::from_response_line(moves));
        TableOracle(table)
    }
}

impl Oracle for TableOracle {
    fn legal_moves(&self, position: &PositionDescriptor) -> Result<MoveSet, OracleError> {
        self.0
            .get(position.as_str())
            .cloned()
            .ok_or_else(|| OracleError::Syntax {
                descriptor: position.as_str().to_string(),
                reason: "not in table".to_string(),
            })
    }
}

fn corpus(lines: &[&str]) -> Vec<Result<CorpusEntry, CorpusError>> {
    lines
        .iter()
        .enumerate()
        .map(|(i, fen)| {
            Ok(CorpusEntry {
                line: i + 1,
                descriptor: PositionDescriptor::new(fen).unwrap(),
            })
        })
        .collect()
}

fn set(moves: &str) -> MoveSet {
    MoveSet::from_response_line(moves)
}

#[test]
fn missing_move_is_reported_as_oracle_only() {
    let oracle = TableOracle::single(AFTER_E4, "d7d5 d7d6 e7e5 g8f6");
    let mut candidate = ScriptedCandidate::new(["d7d5 d7d6 e7e5"]);
    let mut reporter = RecordingReporter::new();

    let tally = run(
        corpus(&[AFTER_E4]),
        &mut candidate,
        &oracle,
        &mut reporter,
        &CompareOptions::default(),
    )
    .unwrap();

    assert_eq!(tally, Tally { good: 0, bad: 1, warnings: 0 });
    let report = reporter.mismatches().next().unwrap();
    assert_eq!(report.descriptor.as_str(), AFTER_E4);
    assert_eq!(report.oracle_only, vec![MoveToken::from("g8f6")]);
    assert!(report.driver_only.is_empty());
}

#[test]
fn missing_move_against_reference_oracle() {
    let mut candidate = ScriptedCandidate::new(["d7d5 d7d6 e7e5"]);
    let mut reporter = RecordingReporter::new();

    let tally = run(
        corpus(&[AFTER_E4]),
        &mut candidate,
        &ReferenceOracle,
        &mut reporter,
        &CompareOptions::default(),
    )
    .unwrap();

    assert_eq!(tally.bad, 1);
    let report = reporter.mismatches().next().unwrap();
    assert!(report.driver_only.is_empty());
    assert_eq!(report.oracle_only.len(), 17);
    assert!(report.oracle_only.contains(&MoveToken::from("g8f6")));
}

#[test]
fn empty_answer_is_a_warning() {
    let mut candidate = ScriptedCandidate::new([""]);
    let mut reporter = RecordingReporter::new();

    let tally = run(
        corpus(&[AFTER_E4]),
        &mut candidate,
        &ReferenceOracle,
        &mut reporter,
        &CompareOptions::default(),
    )
    .unwrap();

    assert_eq!(tally, Tally { good: 0, bad: 0, warnings: 1 });
    assert_eq!(reporter.outcomes[0].1, Outcome::Warning);
    assert_eq!(reporter.finished, Some(tally));
}

#[test]
fn reset_once_and_identical_descriptors() {
    let fens = [PositionDescriptor::STARTPOS, AFTER_E4];
    let startpos_moves = ReferenceOracle
        .legal_moves(&PositionDescriptor::startpos())
        .unwrap()
        .to_string();
    let after_e4_moves = ReferenceOracle
        .legal_moves(&PositionDescriptor::new(AFTER_E4).unwrap())
        .unwrap()
        .to_string();
    let mut candidate = ScriptedCandidate::default();
    candidate.responses.push_back(startpos_moves);
    candidate.responses.push_back(after_e4_moves);

    let tally = run(
        corpus(&fens),
        &mut candidate,
        &ReferenceOracle,
        &mut RecordingReporter::new(),
        &CompareOptions::default(),
    )
    .unwrap();

    assert_eq!(tally.good, 2);
    assert_eq!(candidate.resets, 1);
    assert_eq!(candidate.queries, fens.map(str::to_string).to_vec());
}

#[test]
fn unparsable_descriptor_is_a_corpus_failure() {
    let mut candidate = ScriptedCandidate::new(["e2e4"]);
    let err = run(
        corpus(&[PositionDescriptor::STARTPOS, "garbage"]),
        &mut candidate,
        &ReferenceOracle,
        &mut RecordingReporter::new(),
        &CompareOptions::default(),
    )
    .unwrap_err();

    match err {
        HarnessError::Corpus(CorpusError::InvalidDescriptor { line, .. }) => assert_eq!(line, 2),
        other => panic!("unexpected error: {other}"),
    }
    // the candidate is never asked about the bad line
    assert_eq!(candidate.queries.len(), 1);
}

#[test]
fn closed_candidate_is_an_engine_failure() {
    let mut candidate = ScriptedCandidate::default();
    candidate.fail_after = Some(0);
    let err = run(
        corpus(&[PositionDescriptor::STARTPOS]),
        &mut candidate,
        &ReferenceOracle,
        &mut RecordingReporter::new(),
        &CompareOptions::default(),
    )
    .unwrap_err();
    assert!(matches!(err, HarnessError::Engine(EngineError::Closed)));
    assert_eq!(err.culprit(), "candidate process misbehaving");
}

#[test]
fn fail_fast_stops_at_first_mismatch() {
    let oracle = TableOracle::single(PositionDescriptor::STARTPOS, "a2a3 b2b3");
    let mut candidate = ScriptedCandidate::new(["a2a3", "a2a3 b2b3"]);
    let options = CompareOptions {
        fail_fast: true,
        ..CompareOptions::default()
    };
    let tally = run(
        corpus(&[PositionDescriptor::STARTPOS, PositionDescriptor::STARTPOS]),
        &mut candidate,
        &oracle,
        &mut RecordingReporter::new(),
        &options,
    )
    .unwrap();
    assert_eq!(tally, Tally { good: 0, bad: 1, warnings: 0 });
}

#[test]
fn limit_caps_positions() {
    let oracle = TableOracle::single(PositionDescriptor::STARTPOS, "a2a3");
    let mut candidate = ScriptedCandidate::new(["a2a3", "a2a3", "a2a3"]);
    let options = CompareOptions {
        limit: Some(2),
        ..CompareOptions::default()
    };
    let tally = run(
        corpus(&[PositionDescriptor::STARTPOS; 3]),
        &mut candidate,
        &oracle,
        &mut RecordingReporter::new(),
        &options,
    )
    .unwrap();
    assert_eq!(tally.total(), 2);
}

#[test]
fn raised_stop_flag_interrupts_before_next_position() {
    let options = CompareOptions::default();
    options.stop.stop();
    let mut candidate = ScriptedCandidate::new(["a2a3"]);
    let err = run(
        corpus(&[PositionDescriptor::STARTPOS]),
        &mut candidate,
        &ReferenceOracle,
        &mut RecordingReporter::new(),
        &options,
    )
    .unwrap_err();
    assert!(matches!(err, HarnessError::Interrupted));
    assert!(candidate.queries.is_empty());
}

fn token_strategy() -> impl Strategy<Value = String> {
    "[a-h][1-8][a-h][1-8][qrbn]?"
}

fn tokens_strategy() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec(token_strategy(), 0..24)
}

proptest! {
    /// Order and duplicates in the raw response never matter.
    #[test]
    fn prop_permuted_response_is_good(tokens in prop::collection::vec(token_strategy(), 1..24), seed in any::<u64>()) {
        use rand::prelude::*;

        let oracle: MoveSet = tokens.iter().map(|t| MoveToken::from(t.as_str())).collect();
        let mut shuffled = tokens.clone();
        shuffled.extend(tokens.iter().take(3).cloned());
        shuffled.shuffle(&mut StdRng::seed_from_u64(seed));
        let driver = MoveSet::from_response_line(&shuffled.join(" "));

        prop_assert_eq!(classify(&PositionDescriptor::startpos(), &driver, &oracle), Outcome::Good);
    }

    /// driver_only and oracle_only partition the symmetric difference, sorted.
    #[test]
    fn prop_mismatch_partitions_symmetric_difference(a in tokens_strategy(), b in tokens_strategy()) {
        let driver = set(&a.join(" "));
        let oracle = set(&b.join(" "));
        match classify(&PositionDescriptor::startpos(), &driver, &oracle) {
            Outcome::Warning => prop_assert!(driver.is_empty()),
            Outcome::Good => prop_assert_eq!(&driver, &oracle),
            Outcome::Bad(report) => {
                prop_assert!(driver != oracle);
                let mut sorted = report.driver_only.clone();
                sorted.sort();
                prop_assert_eq!(&sorted, &report.driver_only);
                let mut sorted = report.oracle_only.clone();
                sorted.sort();
                prop_assert_eq!(&sorted, &report.oracle_only);

                for t in &report.driver_only {
                    prop_assert!(driver.contains(t.as_str()) && !oracle.contains(t.as_str()));
                }
                for t in &report.oracle_only {
                    prop_assert!(oracle.contains(t.as_str()) && !driver.contains(t.as_str()));
                }
                let symmetric = driver.iter().filter(|t| !oracle.contains(t.as_str())).count()
                    + oracle.iter().filter(|t| !driver.contains(t.as_str())).count();
                prop_assert_eq!(symmetric, report.driver_only.len() + report.oracle_only.len());
            }
        }
    }

    /// Every processed position lands in exactly one counter.
    #[test]
    fn prop_tally_accounts_for_every_position(answers in prop::collection::vec(prop::option::of(tokens_strategy()), 1..16)) {
        let oracle = TableOracle::single(PositionDescriptor::STARTPOS, "a2a3 b2b3");
        let lines: Vec<String> = answers
            .iter()
            .map(|a| a.as_ref().map(|t| t.join(" ")).unwrap_or_else(|| "a2a3 b2b3".to_string()))
            .collect();
        let mut candidate = ScriptedCandidate::default();
        candidate.responses = lines.iter().cloned().collect();
        let fens = vec![PositionDescriptor::STARTPOS; lines.len()];
        let mut reporter = RecordingReporter::new();

        let tally = run(corpus(&fens), &mut candidate, &oracle, &mut reporter, &CompareOptions::default()).unwrap();

        prop_assert_eq!(tally.total(), lines.len() as u64);
        let empties = lines.iter().filter(|l| l.is_empty()).count() as u64;
        prop_assert_eq!(tally.warnings, empties);
        prop_assert_eq!(reporter.outcomes.len(), lines.len());
    }
}
