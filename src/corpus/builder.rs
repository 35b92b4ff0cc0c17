//! Corpus builder: replay game records and emit one descriptor per ply.

use std::io::{BufRead, Write};

use serde::{Deserialize, Serialize};
use shakmaty::{EnPassantMode, Position};

use super::pgn::{GameRecord, PgnReader};
use super::CorpusWriter;
use crate::error::{BuildError, RecordError};
use crate::oracle::describe;
use crate::types::PositionDescriptor;

/// When the en-passant square is written into a descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EnPassantRendering {
    /// Only if an en-passant capture is actually legal
    #[default]
    Legal,
    /// If a pseudo-legal en-passant capture exists
    PseudoLegal,
    /// After every double pawn push
    Always,
}

impl From<EnPassantRendering> for EnPassantMode {
    fn from(rendering: EnPassantRendering) -> Self {
        match rendering {
            EnPassantRendering::Legal => EnPassantMode::Legal,
            EnPassantRendering::PseudoLegal => EnPassantMode::PseudoLegal,
            EnPassantRendering::Always => EnPassantMode::Always,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    /// Also emit each game's starting position
    pub include_start: bool,
    pub en_passant: EnPassantRendering,
    /// Stop after this many records
    pub max_games: Option<u64>,
}

/// What one builder run did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildSummary {
    /// Records read, including skipped ones
    pub games: u64,
    pub positions: u64,
    /// Valid records with no mainline moves
    pub empty_games: u64,
    /// Records skipped because they could not be replayed
    pub malformed_games: u64,
}

/// Receives progress while the builder runs. Calls are made inline, so
/// implementations must be cheap.
pub trait BuildObserver {
    fn on_game(&mut self, _games_read: u64) {}

    fn on_skipped(&mut self, _index: u64, _error: &RecordError) {}
}

impl BuildObserver for () {}

pub struct CorpusBuilder {
    options: BuildOptions,
}

impl CorpusBuilder {
    #[must_use]
    pub fn new(options: BuildOptions) -> Self {
        CorpusBuilder { options }
    }

    /// Stream every position of every valid game in `input` into `sink`.
    ///
    /// Malformed records are skipped and counted; only I/O failures abort.
    pub fn build<R, W, O>(
        &self,
        input: R,
        sink: &mut CorpusWriter<W>,
        observer: &mut O,
    ) -> Result<BuildSummary, BuildError>
    where
        R: BufRead,
        W: Write,
        O: BuildObserver + ?Sized,
    {
        let mut reader = PgnReader::new(input);
        let mut summary = BuildSummary::default();

        while let Some(raw) = reader.read_game().map_err(BuildError::Read)? {
            summary.games += 1;
            observer.on_game(summary.games);

            match GameRecord::parse(&raw) {
                Ok(record) if record.moves.is_empty() => {
                    log::debug!("game {} has an empty mainline", record.index);
                    summary.empty_games += 1;
                }
                Ok(record) => {
                    for descriptor in self.descriptors(&record) {
                        sink.write(&descriptor).map_err(BuildError::Write)?;
                        summary.positions += 1;
                    }
                }
                Err(e) => {
                    log::warn!("skipping game {}: {}", raw.index, e);
                    summary.malformed_games += 1;
                    observer.on_skipped(raw.index, &e);
                }
            }

            if self.options.max_games.is_some_and(|max| summary.games >= max) {
                log::info!("stopping after {} games", summary.games);
                break;
            }
        }

        log::info!(
            "read {} games: {} positions, {} empty, {} malformed",
            summary.games,
            summary.positions,
            summary.empty_games,
            summary.malformed_games
        );
        Ok(summary)
    }

    /// Descriptors of the positions reached after each mainline move,
    /// preceded by the start position if configured.
    pub fn descriptors<'a>(
        &self,
        record: &'a GameRecord,
    ) -> impl Iterator<Item = PositionDescriptor> + 'a {
        let mode = EnPassantMode::from(self.options.en_passant);
        let start = self
            .options
            .include_start
            .then(|| describe(&record.start, mode));
        let mut pos = record.start.clone();
        start.into_iter().chain(record.moves.iter().map(move |mv| {
            pos.play_unchecked(mv);
            describe(&pos, mode)
        }))
    }
}

impl Default for CorpusBuilder {
    fn default() -> Self {
        Self::new(BuildOptions::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(pgn: &str, options: BuildOptions) -> (BuildSummary, Vec<String>) {
        let mut sink = CorpusWriter::new(Vec::new());
        let summary = CorpusBuilder::new(options)
            .build(pgn.as_bytes(), &mut sink, &mut ())
            .unwrap();
        let text = String::from_utf8(sink.finish().unwrap()).unwrap();
        (summary, text.lines().map(str::to_string).collect())
    }

    #[test]
    fn three_plies_give_three_descriptors() {
        let (summary, lines) = build("1. e4 e5 2. Nf3 *\n", BuildOptions::default());
        assert_eq!(summary.positions, 3);
        assert_eq!(
            lines,
            vec![
                "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq - 0 1",
                "rnbqkbnr/pppp1ppp/8/4p3/4P3/8/PPPP1PPP/RNBQKBNR w KQkq - 0 2",
                "rnbqkbnr/pppp1ppp/8/4p3/4P3/5N2/PPPP1PPP/RNBQKB1R b KQkq - 1 2",
            ]
        );
    }

    #[test]
    fn en_passant_rendering_is_configurable() {
        let options = BuildOptions {
            en_passant: EnPassantRendering::Always,
            ..BuildOptions::default()
        };
        let (_, lines) = build("1. e4 *\n", options);
        assert_eq!(
            lines,
            vec!["rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq e3 0 1"]
        );
    }

    #[test]
    fn start_position_is_opt_in() {
        let options = BuildOptions {
            include_start: true,
            ..BuildOptions::default()
        };
        let (summary, lines) = build("1. d4 *\n", options);
        assert_eq!(summary.positions, 2);
        assert_eq!(lines[0], PositionDescriptor::STARTPOS);
    }

    #[test]
    fn malformed_and_empty_games_are_counted_separately() {
        let pgn = "[Event \"ok\"]\n1. e4 *\n\n\
                   [Event \"bad\"]\n1. e4 e5 2. Qxf7 *\n\n\
                   [Event \"empty\"]\n*\n\n\
                   [Event \"ok again\"]\n1. d4 d5 *\n";
        let (summary, lines) = build(pgn, BuildOptions::default());
        assert_eq!(summary.games, 4);
        assert_eq!(summary.malformed_games, 1);
        assert_eq!(summary.empty_games, 1);
        assert_eq!(summary.positions, 3);
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn max_games_caps_the_run() {
        let options = BuildOptions {
            max_games: Some(1),
            ..BuildOptions::default()
        };
        let (summary, lines) = build("1. e4 *\n1. d4 *\n", options);
        assert_eq!(summary.games, 1);
        assert_eq!(lines.len(), 1);
    }

    #[derive(Default)]
    struct Counting {
        seen: Vec<u64>,
        skipped: Vec<u64>,
    }

    impl BuildObserver for Counting {
        fn on_game(&mut self, games_read: u64) {
            self.seen.push(games_read);
        }

        fn on_skipped(&mut self, index: u64, _error: &RecordError) {
            self.skipped.push(index);
        }
    }

    #[test]
    fn observer_sees_every_record() {
        let mut observer = Counting::default();
        let mut sink = CorpusWriter::new(Vec::new());
        CorpusBuilder::default()
            .build(
                "1. e4 *\n1. Nf6 *\n1. c4 *\n".as_bytes(),
                &mut sink,
                &mut observer,
            )
            .unwrap();
        assert_eq!(observer.seen, vec![1, 2, 3]);
        assert_eq!(observer.skipped, vec![2]);
    }
}
