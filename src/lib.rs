//! Differential testing of chess move generators.
//!
//! Positions come from real games ([`corpus`]), the engine under test is
//! driven over a line protocol ([`driver`]), and every answer is checked
//! against a trusted move generator ([`oracle`]) by the [`compare`] loop.
//!
//! # Example
//! ```no_run
//! use movegen_diff::compare::{self, CompareOptions, ConsoleReporter};
//! use movegen_diff::corpus::CorpusReader;
//! use movegen_diff::driver::{EngineConfig, EngineProcess};
//! use movegen_diff::oracle::ReferenceOracle;
//! use movegen_diff::sync::StopFlag;
//!
//! let corpus = CorpusReader::open("fens.txt").unwrap();
//! let mut engine =
//!     EngineProcess::spawn(&EngineConfig::new("./engine"), StopFlag::new()).unwrap();
//! let mut reporter = ConsoleReporter::new(std::io::stdout());
//! let tally = compare::run(
//!     corpus,
//!     &mut engine,
//!     &ReferenceOracle,
//!     &mut reporter,
//!     &CompareOptions::default(),
//! )
//! .unwrap();
//! println!("{} mismatches", tally.bad);
//! ```

pub mod compare;
pub mod corpus;
pub mod driver;
pub mod error;
pub mod oracle;
pub mod protocol;
pub mod sync;
pub mod types;

pub use compare::{MismatchReport, Outcome, Tally};
pub use error::{BuildError, CorpusError, EngineError, HarnessError, OracleError, RecordError};
pub use types::{MoveSet, MoveToken, PositionDescriptor};
