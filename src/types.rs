//! Core value types shared by the corpus builder, the driver and the comparator.
//!
//! Everything here is compared by its canonical string form: two descriptors
//! are the same position iff their FEN strings match, two moves are the same
//! move iff their UCI strings match.

use std::borrow::Borrow;
use std::collections::btree_set;
use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Canonical FEN encoding of a full board state.
///
/// The string is stored exactly as produced (or read from the corpus, minus
/// surrounding whitespace) so that the candidate and the oracle see the same
/// bytes.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PositionDescriptor(String);

impl PositionDescriptor {
    /// Standard starting position.
    pub const STARTPOS: &'static str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

    /// Wrap a descriptor string, trimming surrounding whitespace.
    ///
    /// Returns `None` for blank input.
    #[must_use]
    pub fn new(fen: &str) -> Option<Self> {
        let trimmed = fen.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(PositionDescriptor(trimmed.to_string()))
        }
    }

    #[must_use]
    pub fn startpos() -> Self {
        PositionDescriptor(Self::STARTPOS.to_string())
    }

    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for PositionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A single move in UCI coordinate notation (`e2e4`, `e7e8q`, `e1g1`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MoveToken(String);

impl MoveToken {
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        MoveToken(token.into())
    }

    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MoveToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for MoveToken {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for MoveToken {
    fn from(s: &str) -> Self {
        MoveToken(s.to_string())
    }
}

/// Unordered set of legal moves for one position.
///
/// Backed by a `BTreeSet` so iteration is always sorted ascending.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveSet(BTreeSet<MoveToken>);

impl MoveSet {
    #[must_use]
    pub fn new() -> Self {
        MoveSet(BTreeSet::new())
    }

    /// Parse one protocol response line.
    ///
    /// Tokens are separated by single spaces; empty fragments (from a blank
    /// line or doubled separators) are dropped and duplicates collapse.
    #[must_use]
    pub fn from_response_line(line: &str) -> Self {
        line.trim_end_matches(['\r', '\n'])
            .split(' ')
            .filter(|t| !t.is_empty())
            .map(MoveToken::from)
            .collect()
    }

    pub fn insert(&mut self, token: MoveToken) -> bool {
        self.0.insert(token)
    }

    #[must_use]
    pub fn contains(&self, token: &str) -> bool {
        self.0.contains(token)
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> btree_set::Iter<'_, MoveToken> {
        self.0.iter()
    }

    /// Tokens in `self` that are missing from `other`, sorted ascending.
    #[must_use]
    pub fn difference(&self, other: &MoveSet) -> Vec<MoveToken> {
        self.0.difference(&other.0).cloned().collect()
    }
}

impl FromIterator<MoveToken> for MoveSet {
    fn from_iter<I: IntoIterator<Item = MoveToken>>(iter: I) -> Self {
        MoveSet(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a MoveSet {
    type Item = &'a MoveToken;
    type IntoIter = btree_set::Iter<'a, MoveToken>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl fmt::Display for MoveSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for token in &self.0 {
            if !first {
                f.write_str(" ")?;
            }
            f.write_str(token.as_str())?;
            first = false;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptor_trims_and_rejects_blank() {
        let d = PositionDescriptor::new("  8/8/8/8/8/8/8/K6k w - - 0 1\n").unwrap();
        assert_eq!(d.as_str(), "8/8/8/8/8/8/8/K6k w - - 0 1");
        assert!(PositionDescriptor::new("   \n").is_none());
    }

    #[test]
    fn response_line_collapses_duplicates() {
        let set = MoveSet::from_response_line("e2e4 d2d4 e2e4\n");
        assert_eq!(set.len(), 2);
        assert!(set.contains("e2e4"));
        assert!(set.contains("d2d4"));
    }

    #[test]
    fn empty_response_line_is_empty_set() {
        assert!(MoveSet::from_response_line("\n").is_empty());
        assert!(MoveSet::from_response_line("").is_empty());
        assert!(MoveSet::from_response_line("\r\n").is_empty());
    }

    #[test]
    fn doubled_separators_do_not_create_tokens() {
        let set = MoveSet::from_response_line("a2a3  b2b3 ");
        assert_eq!(set.to_string(), "a2a3 b2b3");
    }

    #[test]
    fn difference_is_sorted() {
        let a = MoveSet::from_response_line("h2h3 a2a3 c2c3");
        let b = MoveSet::from_response_line("c2c3");
        let diff = a.difference(&b);
        assert_eq!(diff, vec![MoveToken::from("a2a3"), MoveToken::from("h2h3")]);
    }
}
