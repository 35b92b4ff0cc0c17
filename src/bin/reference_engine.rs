//! Protocol-conforming candidate engine backed by the reference generator.
//!
//! Answers `legalmoves` with exactly the oracle's move set unless one of the
//! fault switches is given, which makes it useful for exercising the harness
//! end to end without a real engine under test.

use std::io::{self, BufRead, Write};
use std::thread;
use std::time::Duration;

use clap::Parser;
use shakmaty::{Chess, Position};

use movegen_diff::oracle::{legal_move_set, move_token, parse_position};
use movegen_diff::protocol::{parse_command, EngineCommand};
use movegen_diff::{MoveSet, MoveToken};

#[derive(Parser, Debug, Default)]
#[command(
    name = "reference_engine",
    version,
    about = "Line-protocol engine answering legalmoves from the reference generator"
)]
struct Faults {
    /// Leave this move out of every answer that contains it (repeatable)
    #[arg(long, value_name = "MOVE")]
    omit: Vec<String>,

    /// Add this move to every answer (repeatable)
    #[arg(long, value_name = "MOVE")]
    inject: Vec<String>,

    /// Never report castling moves
    #[arg(long)]
    no_castling: bool,

    /// Never report en-passant captures
    #[arg(long)]
    no_en_passant: bool,

    /// Answer with an empty line once this many queries have been served
    #[arg(long, value_name = "N")]
    silent_after: Option<u64>,

    /// Exit without answering once this many queries have been served
    #[arg(long, value_name = "N")]
    exit_after: Option<u64>,

    /// Sleep this long before each answer
    #[arg(long, value_name = "MS")]
    delay_ms: Option<u64>,

    /// Print a greeting line before reading any command
    #[arg(long)]
    banner: bool,
}

struct Session {
    faults: Faults,
    position: Option<Chess>,
    served: u64,
}

impl Session {
    fn new(faults: Faults) -> Self {
        Session {
            faults,
            position: Some(Chess::default()),
            served: 0,
        }
    }

    /// Apply a `position` command. An unusable position leaves the engine
    /// without one, and later queries answer empty.
    fn set_position(&mut self, fen: Option<&str>, moves: &[String]) {
        let start = match fen {
            Some(fen) => parse_position(fen).map_err(|e| e.to_string()),
            None => Ok(Chess::default()),
        };
        self.position = match start.and_then(|pos| play_moves(pos, moves)) {
            Ok(pos) => Some(pos),
            Err(reason) => {
                log::warn!("rejected position: {reason}");
                None
            }
        };
    }

    fn answer(&self) -> MoveSet {
        let Some(pos) = &self.position else {
            return MoveSet::new();
        };
        if self.faults.silent_after.is_some_and(|n| self.served >= n) {
            return MoveSet::new();
        }
        if !self.faults.no_castling && !self.faults.no_en_passant {
            return self.mangle(legal_move_set(pos));
        }
        let moves = pos
            .legal_moves()
            .iter()
            .filter(|m| !(self.faults.no_castling && m.is_castle()))
            .filter(|m| !(self.faults.no_en_passant && m.is_en_passant()))
            .map(move_token)
            .collect();
        self.mangle(moves)
    }

    fn mangle(&self, moves: MoveSet) -> MoveSet {
        moves
            .iter()
            .filter(|m| !self.faults.omit.iter().any(|o| o == m.as_str()))
            .cloned()
            .chain(self.faults.inject.iter().map(|m| MoveToken::from(m.as_str())))
            .collect()
    }
}

fn play_moves(mut pos: Chess, moves: &[String]) -> Result<Chess, String> {
    for token in moves {
        let mv = pos
            .legal_moves()
            .into_iter()
            .find(|m| move_token(m).as_str() == token)
            .ok_or_else(|| format!("illegal move '{token}'"))?;
        pos.play_unchecked(&mv);
    }
    Ok(pos)
}

fn serve(faults: Faults) -> io::Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout().lock();
    let mut session = Session::new(faults);

    if session.faults.banner {
        writeln!(stdout, "reference_engine ready")?;
        stdout.flush()?;
    }

    for line in stdin.lock().lines() {
        let line = line?;
        let Some(command) = parse_command(&line) else {
            continue;
        };
        match command {
            EngineCommand::Uci => {
                writeln!(stdout, "id name reference_engine")?;
                writeln!(stdout, "id author movegen_diff")?;
                writeln!(stdout, "uciok")?;
            }
            EngineCommand::IsReady => writeln!(stdout, "readyok")?,
            EngineCommand::UciNewGame => session.position = Some(Chess::default()),
            EngineCommand::PositionFen { fen, moves } => session.set_position(Some(&fen), &moves),
            EngineCommand::PositionStart { moves } => session.set_position(None, &moves),
            EngineCommand::LegalMoves => {
                if session.faults.exit_after.is_some_and(|n| session.served >= n) {
                    log::info!("exiting after {} queries", session.served);
                    return Ok(());
                }
                if let Some(ms) = session.faults.delay_ms {
                    thread::sleep(Duration::from_millis(ms));
                }
                writeln!(stdout, "{}", session.answer())?;
                session.served += 1;
            }
            EngineCommand::Quit => break,
            EngineCommand::Unknown(line) => log::debug!("ignoring '{line}'"),
        }
        stdout.flush()?;
    }
    Ok(())
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    if let Err(e) = serve(Faults::parse()) {
        // The harness closing our pipes is a normal way to end.
        if e.kind() != io::ErrorKind::BrokenPipe {
            eprintln!("reference_engine: {e}");
            std::process::exit(1);
        }
    }
}
