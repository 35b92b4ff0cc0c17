//! Reference move generation.
//!
//! The oracle is the trusted side of every comparison. `ReferenceOracle` is
//! backed by `shakmaty`; tests substitute table-driven implementations.

use shakmaty::fen::Fen;
use shakmaty::{CastlingMode, Chess, EnPassantMode, Move, Position};

use crate::error::OracleError;
use crate::types::{MoveSet, MoveToken, PositionDescriptor};

/// Capability: produce the ground-truth legal move set for a position.
pub trait Oracle {
    /// Enumerate legal moves, or reject the descriptor as malformed.
    fn legal_moves(&self, position: &PositionDescriptor) -> Result<MoveSet, OracleError>;
}

impl<O: Oracle + ?Sized> Oracle for &O {
    fn legal_moves(&self, position: &PositionDescriptor) -> Result<MoveSet, OracleError> {
        (**self).legal_moves(position)
    }
}

/// Oracle backed by the `shakmaty` rules library.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReferenceOracle;

impl Oracle for ReferenceOracle {
    fn legal_moves(&self, position: &PositionDescriptor) -> Result<MoveSet, OracleError> {
        let pos = parse_position(position.as_str())?;
        Ok(legal_move_set(&pos))
    }
}

/// Parse a FEN descriptor into a playable position.
pub fn parse_position(descriptor: &str) -> Result<Chess, OracleError> {
    let fen: Fen = descriptor.parse().map_err(|e: shakmaty::fen::ParseFenError| {
        OracleError::Syntax {
            descriptor: descriptor.to_string(),
            reason: e.to_string(),
        }
    })?;
    fen.into_position(CastlingMode::Standard)
        .map_err(|e| OracleError::IllegalPosition {
            descriptor: descriptor.to_string(),
            reason: e.to_string(),
        })
}

/// All legal moves of `pos` as canonical tokens.
#[must_use]
pub fn legal_move_set(pos: &Chess) -> MoveSet {
    pos.legal_moves().iter().map(move_token).collect()
}

/// UCI token for a move; castling is written as the king's two-square step.
#[must_use]
pub fn move_token(mv: &Move) -> MoveToken {
    MoveToken::new(mv.to_uci(CastlingMode::Standard).to_string())
}

/// Canonical descriptor of a position.
#[must_use]
pub fn describe(pos: &Chess, ep_mode: EnPassantMode) -> PositionDescriptor {
    let fen = Fen::from_position(pos.clone(), ep_mode).to_string();
    // A FEN rendering is never blank.
    PositionDescriptor::new(&fen).unwrap_or_else(PositionDescriptor::startpos)
}
