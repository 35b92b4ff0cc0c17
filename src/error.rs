//! Error types for the harness.
//!
//! Fatal conditions are split by which side has to be fixed: the corpus
//! (`CorpusError`, `OracleError`) or the candidate process (`EngineError`).

use std::fmt;
use std::io;
use std::time::Duration;

/// A game record in the PGN input that cannot be replayed.
///
/// These are never fatal: the builder skips the record and counts it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordError {
    /// Tag pair line that is not `[Name "Value"]`
    MalformedTag { line: String },
    /// `[FEN]` tag that the rules library rejects
    InvalidFen { fen: String, reason: String },
    /// `[Variant]` tag naming something other than standard chess
    UnsupportedVariant { variant: String },
    /// Movetext token that is not SAN
    InvalidSan { ply: usize, san: String },
    /// SAN that does not match a legal move in the current position
    IllegalMove { ply: usize, san: String, reason: String },
    /// Null move (`--` or `Z0`), which has no resulting legal position
    NullMove { ply: usize },
    /// Comment or variation left open at the end of the record
    Unterminated { what: &'static str },
}

impl fmt::Display for RecordError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordError::MalformedTag { line } => write!(f, "malformed tag pair '{line}'"),
            RecordError::InvalidFen { fen, reason } => {
                write!(f, "invalid FEN tag '{fen}': {reason}")
            }
            RecordError::UnsupportedVariant { variant } => {
                write!(f, "unsupported variant '{variant}'")
            }
            RecordError::InvalidSan { ply, san } => {
                write!(f, "ply {ply}: '{san}' is not a SAN move")
            }
            RecordError::IllegalMove { ply, san, reason } => {
                write!(f, "ply {ply}: illegal move '{san}': {reason}")
            }
            RecordError::NullMove { ply } => write!(f, "ply {ply}: null move"),
            RecordError::Unterminated { what } => write!(f, "unterminated {what}"),
        }
    }
}

impl std::error::Error for RecordError {}

/// The reference implementation rejected a position descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OracleError {
    /// Descriptor is not syntactically valid FEN
    Syntax { descriptor: String, reason: String },
    /// Descriptor parses but does not describe a legal position
    IllegalPosition { descriptor: String, reason: String },
}

impl fmt::Display for OracleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OracleError::Syntax { descriptor, reason } => {
                write!(f, "unparsable descriptor '{descriptor}': {reason}")
            }
            OracleError::IllegalPosition { descriptor, reason } => {
                write!(f, "illegal position '{descriptor}': {reason}")
            }
        }
    }
}

impl std::error::Error for OracleError {}

/// Failures of the candidate process or its channels.
#[derive(Debug)]
pub enum EngineError {
    /// Process could not be launched
    Spawn { program: String, source: io::Error },
    /// A pipe was not available right after spawning
    MissingPipe { pipe: &'static str },
    /// The process exited or closed its output
    Closed,
    /// Reading from or writing to the process failed
    Io(io::Error),
    /// No response within the configured bound
    Timeout { after: Duration },
    /// Handshake did not complete with `readyok`
    Handshake { reason: String },
    /// User interrupt while waiting for a reply
    Interrupted,
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::Spawn { program, source } => {
                write!(f, "failed to launch '{program}': {source}")
            }
            EngineError::MissingPipe { pipe } => write!(f, "engine {pipe} is not piped"),
            EngineError::Closed => write!(f, "engine closed its output"),
            EngineError::Io(e) => write!(f, "engine I/O failed: {e}"),
            EngineError::Timeout { after } => {
                write!(f, "engine did not answer within {} ms", after.as_millis())
            }
            EngineError::Handshake { reason } => write!(f, "engine handshake failed: {reason}"),
            EngineError::Interrupted => write!(f, "interrupted while waiting for the engine"),
        }
    }
}

impl std::error::Error for EngineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EngineError::Spawn { source, .. } => Some(source),
            EngineError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for EngineError {
    fn from(e: io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::BrokenPipe | io::ErrorKind::UnexpectedEof => EngineError::Closed,
            _ => EngineError::Io(e),
        }
    }
}

/// The corpus cannot be used as test input.
#[derive(Debug)]
pub enum CorpusError {
    /// Reading the corpus failed
    Io(io::Error),
    /// A corpus line was rejected by the oracle
    InvalidDescriptor { line: usize, error: OracleError },
}

impl fmt::Display for CorpusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CorpusError::Io(e) => write!(f, "failed to read corpus: {e}"),
            CorpusError::InvalidDescriptor { line, error } => write!(f, "line {line}: {error}"),
        }
    }
}

impl std::error::Error for CorpusError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CorpusError::Io(e) => Some(e),
            CorpusError::InvalidDescriptor { error, .. } => Some(error),
        }
    }
}

impl From<io::Error> for CorpusError {
    fn from(e: io::Error) -> Self {
        CorpusError::Io(e)
    }
}

/// Fatal corpus-builder failures. Malformed records are not errors.
#[derive(Debug)]
pub enum BuildError {
    /// Reading the game records failed
    Read(io::Error),
    /// Writing the corpus failed
    Write(io::Error),
}

impl fmt::Display for BuildError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildError::Read(e) => write!(f, "failed to read game records: {e}"),
            BuildError::Write(e) => write!(f, "failed to write corpus: {e}"),
        }
    }
}

impl std::error::Error for BuildError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BuildError::Read(e) | BuildError::Write(e) => Some(e),
        }
    }
}

/// Anything that aborts a comparison run.
#[derive(Debug)]
pub enum HarnessError {
    /// Bad input corpus
    Corpus(CorpusError),
    /// Candidate process misbehaving
    Engine(EngineError),
    /// The report sink could not be written
    Report(io::Error),
    /// User interrupt between positions
    Interrupted,
}

impl HarnessError {
    /// Whether the run stopped because the user asked it to.
    #[must_use]
    pub fn is_interrupted(&self) -> bool {
        matches!(
            self,
            HarnessError::Interrupted | HarnessError::Engine(EngineError::Interrupted)
        )
    }

    /// Short label naming the side that needs fixing.
    #[must_use]
    pub fn culprit(&self) -> &'static str {
        match self {
            HarnessError::Corpus(_) => "bad input corpus",
            HarnessError::Interrupted => "interrupted",
            _ if self.is_interrupted() => "interrupted",
            HarnessError::Engine(_) => "candidate process misbehaving",
            HarnessError::Report(_) => "report output failed",
        }
    }
}

impl fmt::Display for HarnessError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HarnessError::Corpus(e) => write!(f, "{}: {e}", self.culprit()),
            HarnessError::Engine(e) => write!(f, "{}: {e}", self.culprit()),
            HarnessError::Report(e) => write!(f, "{}: {e}", self.culprit()),
            HarnessError::Interrupted => write!(f, "interrupted by user"),
        }
    }
}

impl std::error::Error for HarnessError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            HarnessError::Corpus(e) => Some(e),
            HarnessError::Engine(e) => Some(e),
            HarnessError::Report(e) => Some(e),
            HarnessError::Interrupted => None,
        }
    }
}

impl From<CorpusError> for HarnessError {
    fn from(e: CorpusError) -> Self {
        HarnessError::Corpus(e)
    }
}

impl From<EngineError> for HarnessError {
    fn from(e: EngineError) -> Self {
        HarnessError::Engine(e)
    }
}
