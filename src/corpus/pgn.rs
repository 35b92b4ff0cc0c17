//! Streaming PGN reader.
//!
//! Reading is split in two steps so the builder can tell the three outcomes
//! apart: `PgnReader::read_game` frames the next record from the byte stream
//! (`Ok(None)` is end of input, `Err` is an I/O failure), then
//! `GameRecord::parse` validates it against the rules library (`Err` is a
//! malformed record that can be skipped).

use std::io::{self, BufRead};

use shakmaty::san::SanPlus;
use shakmaty::{Chess, Move, Position};

use crate::error::RecordError;
use crate::oracle::parse_position;

const RESULTS: [&str; 4] = ["1-0", "0-1", "1/2-1/2", "*"];

/// Variant tag values that mean ordinary chess.
const STANDARD_VARIANTS: [&str; 4] = ["standard", "chess", "normal", "from position"];

/// One framed but unvalidated game.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawGame {
    /// 1-based position of the record in the input
    pub index: u64,
    /// Tag pair lines, as written
    pub tags: Vec<String>,
    pub movetext: String,
}

/// Splits a PGN stream into records.
pub struct PgnReader<R> {
    reader: R,
    pending: Option<String>,
    games: u64,
    first_line: bool,
}

impl<R: BufRead> PgnReader<R> {
    pub fn new(reader: R) -> Self {
        PgnReader {
            reader,
            pending: None,
            games: 0,
            first_line: true,
        }
    }

    /// Number of records framed so far.
    #[must_use]
    pub fn games_read(&self) -> u64 {
        self.games
    }

    /// Frame the next record.
    ///
    /// A record is its tag section followed by movetext up to a result
    /// marker. A tag line after movetext also closes the record, so games
    /// that omit the result still separate cleanly.
    pub fn read_game(&mut self) -> io::Result<Option<RawGame>> {
        let mut tags = Vec::new();
        let mut movetext = String::new();
        let mut scan = ScanState::default();
        // Blank line seen after the tag section
        let mut gap = false;

        while let Some(line) = self.next_line()? {
            let trimmed = line.trim();
            if !scan.in_comment {
                if line.starts_with('%') {
                    continue;
                }
                if trimmed.is_empty() {
                    gap |= !tags.is_empty();
                    continue;
                }
                if trimmed.starts_with('[') {
                    // Tags after movetext, or after a blank line that ended a
                    // tag-only record, start the next game.
                    if !movetext.is_empty() || gap {
                        self.pending = Some(line);
                        break;
                    }
                    tags.push(trimmed.to_string());
                    continue;
                }
            }

            movetext.push_str(trimmed);
            movetext.push('\n');

            let mut terminated = false;
            scan_movetext(&line, &mut scan, |word, depth| {
                if depth == 0 && RESULTS.contains(&word) {
                    terminated = true;
                }
                !terminated
            });
            if terminated {
                break;
            }
        }

        if tags.is_empty() && movetext.is_empty() {
            return Ok(None);
        }
        self.games += 1;
        Ok(Some(RawGame {
            index: self.games,
            tags,
            movetext,
        }))
    }

    fn next_line(&mut self) -> io::Result<Option<String>> {
        if let Some(line) = self.pending.take() {
            return Ok(Some(line));
        }
        let mut bytes = Vec::new();
        if self.reader.read_until(b'\n', &mut bytes)? == 0 {
            return Ok(None);
        }
        let mut buf = match String::from_utf8(bytes) {
            Ok(text) => text,
            // Export-format PGN is ISO-8859-1, where every byte is a code point.
            Err(e) => e.into_bytes().into_iter().map(char::from).collect(),
        };
        if self.first_line {
            self.first_line = false;
            if let Some(stripped) = buf.strip_prefix('\u{feff}') {
                buf = stripped.to_string();
            }
        }
        let len = buf.trim_end_matches(['\r', '\n']).len();
        buf.truncate(len);
        Ok(Some(buf))
    }
}

/// A validated game: where it starts and the mainline moves, all legal.
#[derive(Debug, Clone)]
pub struct GameRecord {
    pub index: u64,
    pub tags: Vec<(String, String)>,
    pub start: Chess,
    pub moves: Vec<Move>,
}

impl GameRecord {
    /// Validate a framed record by replaying its mainline.
    pub fn parse(raw: &RawGame) -> Result<Self, RecordError> {
        let tags = raw
            .tags
            .iter()
            .map(|line| parse_tag(line))
            .collect::<Result<Vec<_>, _>>()?;

        if let Some(variant) = tag_value(&tags, "Variant") {
            if !STANDARD_VARIANTS.contains(&variant.to_ascii_lowercase().as_str()) {
                return Err(RecordError::UnsupportedVariant {
                    variant: variant.to_string(),
                });
            }
        }

        let start = match tag_value(&tags, "FEN") {
            Some(fen) => parse_position(fen).map_err(|e| RecordError::InvalidFen {
                fen: fen.to_string(),
                reason: e.to_string(),
            })?,
            None => Chess::default(),
        };

        let words = mainline_words(&raw.movetext)?;
        let mut pos = start.clone();
        let mut moves = Vec::with_capacity(words.len());
        for (i, word) in words.iter().enumerate() {
            let ply = i + 1;
            let mv = resolve_san(&pos, word, ply)?;
            pos.play_unchecked(&mv);
            moves.push(mv);
        }

        Ok(GameRecord {
            index: raw.index,
            tags,
            start,
            moves,
        })
    }

    #[must_use]
    pub fn tag(&self, name: &str) -> Option<&str> {
        tag_value(&self.tags, name)
    }
}

fn tag_value<'a>(tags: &'a [(String, String)], name: &str) -> Option<&'a str> {
    tags.iter()
        .find(|(n, _)| n == name)
        .map(|(_, v)| v.as_str())
}

/// Parse `[Name "Value"]`, undoing `\"` and `\\` escapes.
fn parse_tag(line: &str) -> Result<(String, String), RecordError> {
    let malformed = || RecordError::MalformedTag {
        line: line.to_string(),
    };
    let inner = line
        .strip_prefix('[')
        .and_then(|s| s.strip_suffix(']'))
        .ok_or_else(malformed)?
        .trim();
    let (name, rest) = inner.split_once(char::is_whitespace).ok_or_else(malformed)?;
    let quoted = rest
        .trim()
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .ok_or_else(malformed)?;

    let mut value = String::with_capacity(quoted.len());
    let mut chars = quoted.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some(escaped) => value.push(escaped),
                None => return Err(malformed()),
            }
        } else {
            value.push(c);
        }
    }
    Ok((name.to_string(), value))
}

/// SAN words of the mainline, with numbers, NAGs and results removed.
fn mainline_words(movetext: &str) -> Result<Vec<String>, RecordError> {
    let mut scan = ScanState::default();
    let mut words = Vec::new();
    scan_movetext(movetext, &mut scan, |word, depth| {
        if depth > 0 {
            return true;
        }
        if RESULTS.contains(&word) {
            return false;
        }
        if let Some(san) = strip_decorations(word) {
            words.push(san.to_string());
        }
        true
    });

    if scan.in_comment {
        return Err(RecordError::Unterminated { what: "comment" });
    }
    if scan.depth > 0 || scan.unbalanced {
        return Err(RecordError::Unterminated { what: "variation" });
    }
    Ok(words)
}

/// Strip move numbers, NAGs and annotation glyphs; `None` if nothing is left.
fn strip_decorations(word: &str) -> Option<&str> {
    if word.starts_with('$') {
        return None;
    }
    // "12." and "12..." prefixes, but not the digits of "0-0"
    let rest = word.trim_start_matches(|c: char| c.is_ascii_digit());
    let word = if rest.len() < word.len() && rest.starts_with('.') {
        rest
    } else {
        word
    };
    let word = word.trim_start_matches('.');
    let word = word.trim_end_matches(['!', '?']);
    if word.is_empty() {
        None
    } else {
        Some(word)
    }
}

fn resolve_san(pos: &Chess, word: &str, ply: usize) -> Result<Move, RecordError> {
    if word == "--" || word == "Z0" {
        return Err(RecordError::NullMove { ply });
    }
    let normalized = word.replace("0-0-0", "O-O-O").replace("0-0", "O-O");
    let san = SanPlus::from_ascii(normalized.as_bytes()).map_err(|_| RecordError::InvalidSan {
        ply,
        san: word.to_string(),
    })?;
    san.san.to_move(pos).map_err(|e| RecordError::IllegalMove {
        ply,
        san: word.to_string(),
        reason: e.to_string(),
    })
}

#[derive(Debug, Default)]
struct ScanState {
    in_comment: bool,
    depth: usize,
    unbalanced: bool,
}

/// Walk movetext, calling `on_word(word, variation_depth)` for every word
/// outside comments. Stops early when `on_word` returns false.
fn scan_movetext<F>(text: &str, state: &mut ScanState, mut on_word: F)
where
    F: FnMut(&str, usize) -> bool,
{
    let mut word_start: Option<usize> = None;
    let mut rest_of_line_comment = false;

    let mut flush = |start: &mut Option<usize>, end: usize, depth: usize| -> bool {
        match start.take() {
            Some(s) => on_word(&text[s..end], depth),
            None => true,
        }
    };

    for (i, c) in text.char_indices() {
        if rest_of_line_comment {
            if c == '\n' {
                rest_of_line_comment = false;
            }
            continue;
        }
        if state.in_comment {
            if c == '}' {
                state.in_comment = false;
            }
            continue;
        }
        match c {
            '{' | ';' | '(' | ')' => {
                if !flush(&mut word_start, i, state.depth) {
                    return;
                }
                match c {
                    '{' => state.in_comment = true,
                    ';' => rest_of_line_comment = true,
                    '(' => state.depth += 1,
                    _ => {
                        if state.depth == 0 {
                            state.unbalanced = true;
                        } else {
                            state.depth -= 1;
                        }
                    }
                }
            }
            c if c.is_whitespace() => {
                if !flush(&mut word_start, i, state.depth) {
                    return;
                }
            }
            _ => {
                if word_start.is_none() {
                    word_start = Some(i);
                }
            }
        }
    }
    flush(&mut word_start, text.len(), state.depth);
}
