//! Line protocol spoken between the harness and a candidate engine.
//!
//! The harness only needs a small subset of UCI plus the non-standard
//! `legalmoves` query. `Display` renders a command as the exact line sent
//! (without the newline); `parse_command` is the engine-side inverse.

use std::fmt;

use crate::types::PositionDescriptor;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCommand {
    Uci,
    IsReady,
    UciNewGame,
    /// `position fen <descriptor> [moves ...]`
    PositionFen {
        fen: String,
        moves: Vec<String>,
    },
    /// `position startpos [moves ...]`
    PositionStart {
        moves: Vec<String>,
    },
    LegalMoves,
    Quit,
    Unknown(String),
}

impl EngineCommand {
    /// `position fen` for a corpus descriptor, sent verbatim.
    #[must_use]
    pub fn set_position(position: &PositionDescriptor) -> Self {
        EngineCommand::PositionFen {
            fen: position.as_str().to_string(),
            moves: Vec::new(),
        }
    }
}

impl fmt::Display for EngineCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineCommand::Uci => f.write_str("uci"),
            EngineCommand::IsReady => f.write_str("isready"),
            EngineCommand::UciNewGame => f.write_str("ucinewgame"),
            EngineCommand::PositionFen { fen, moves } => {
                write!(f, "position fen {fen}")?;
                write_moves(f, moves)
            }
            EngineCommand::PositionStart { moves } => {
                f.write_str("position startpos")?;
                write_moves(f, moves)
            }
            EngineCommand::LegalMoves => f.write_str("legalmoves"),
            EngineCommand::Quit => f.write_str("quit"),
            EngineCommand::Unknown(line) => f.write_str(line),
        }
    }
}

fn write_moves(f: &mut fmt::Formatter<'_>, moves: &[String]) -> fmt::Result {
    if moves.is_empty() {
        return Ok(());
    }
    write!(f, " moves {}", moves.join(" "))
}

/// Parse one line received by an engine. Blank lines yield `None`.
#[must_use]
pub fn parse_command(line: &str) -> Option<EngineCommand> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return None;
    }
    let parts: Vec<&str> = trimmed.split_whitespace().collect();

    let cmd = match parts[0] {
        "uci" => EngineCommand::Uci,
        "isready" => EngineCommand::IsReady,
        "ucinewgame" => EngineCommand::UciNewGame,
        "legalmoves" => EngineCommand::LegalMoves,
        "quit" => EngineCommand::Quit,
        "position" => parse_position(&parts[1..])
            .unwrap_or_else(|| EngineCommand::Unknown(trimmed.to_string())),
        _ => EngineCommand::Unknown(trimmed.to_string()),
    };

    Some(cmd)
}

fn parse_position(parts: &[&str]) -> Option<EngineCommand> {
    let split = parts.iter().position(|p| *p == "moves");
    let (head, moves) = match split {
        Some(i) => (&parts[..i], &parts[i + 1..]),
        None => (parts, &parts[parts.len()..]),
    };
    let moves: Vec<String> = moves.iter().map(|m| (*m).to_string()).collect();

    match head.first() {
        Some(&"startpos") if head.len() == 1 => Some(EngineCommand::PositionStart { moves }),
        Some(&"fen") if head.len() > 1 => Some(EngineCommand::PositionFen {
            fen: head[1..].join(" "),
            moves,
        }),
        _ => None,
    }
}
