use std::fs::File;
use std::io::{self, BufReader, BufWriter};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};

use movegen_diff::compare::{self, CompareOptions, ConsoleReporter, Fanout, JsonLinesReporter};
use movegen_diff::corpus::{
    BuildObserver, BuildOptions, CorpusBuilder, CorpusReader, CorpusWriter, EnPassantRendering,
};
use movegen_diff::driver::{EngineConfig, EngineProcess};
use movegen_diff::oracle::ReferenceOracle;
use movegen_diff::sync::StopFlag;
use movegen_diff::{BuildError, CorpusError, HarnessError, RecordError, Tally};

#[derive(Parser, Debug)]
#[command(
    name = "movegen_diff",
    version,
    about = "Differential legal-move testing against a reference generator"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Replay PGN games into a corpus of FEN positions, one per ply
    BuildCorpus(BuildArgs),
    /// Check a candidate engine's legal moves on every corpus position
    Compare(CompareArgs),
}

#[derive(Args, Debug)]
struct BuildArgs {
    /// PGN file to read
    input: PathBuf,

    /// Corpus file to write
    #[arg(short, long, default_value = "fens.txt")]
    output: PathBuf,

    /// Also write each game's starting position
    #[arg(long)]
    include_start: bool,

    /// When to write the en-passant square
    #[arg(long, value_enum, default_value_t = EpMode::Legal)]
    ep_mode: EpMode,

    /// Stop after this many games
    #[arg(long)]
    max_games: Option<u64>,

    /// Progress line interval in games (0 disables it)
    #[arg(long, default_value_t = 1000)]
    progress_every: u64,
}

#[derive(Args, Debug)]
struct CompareArgs {
    /// Candidate engine executable
    engine: PathBuf,

    /// Arguments passed to the engine (after `--`)
    #[arg(last = true)]
    engine_args: Vec<String>,

    /// Corpus file to read
    #[arg(short, long, default_value = "fens.txt")]
    corpus: PathBuf,

    /// Fail if the engine does not answer within this many milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Send uci/isready and wait for readyok before testing
    #[arg(long)]
    handshake: bool,

    /// Stop after this many positions
    #[arg(long)]
    limit: Option<u64>,

    /// Stop at the first mismatch
    #[arg(long)]
    fail_fast: bool,

    /// Also write mismatches and warnings as JSON lines to this file
    #[arg(long)]
    json: Option<PathBuf>,

    /// Do not print a line for matching positions
    #[arg(short, long)]
    quiet: bool,

    /// Disable ANSI colors
    #[arg(long)]
    no_color: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum EpMode {
    Legal,
    PseudoLegal,
    Always,
}

impl From<EpMode> for EnPassantRendering {
    fn from(mode: EpMode) -> Self {
        match mode {
            EpMode::Legal => EnPassantRendering::Legal,
            EpMode::PseudoLegal => EnPassantRendering::PseudoLegal,
            EpMode::Always => EnPassantRendering::Always,
        }
    }
}

/// Throttled "Processing game N" line on stderr.
struct ProgressLine {
    every: u64,
    printed: bool,
}

impl BuildObserver for ProgressLine {
    fn on_game(&mut self, games_read: u64) {
        if self.every > 0 && games_read % self.every == 0 {
            eprint!("\rProcessing game {games_read}");
            self.printed = true;
        }
    }

    fn on_skipped(&mut self, index: u64, error: &RecordError) {
        if self.printed {
            eprintln!();
            self.printed = false;
        }
        eprintln!("skipped game {index}: {error}");
    }
}

fn build_corpus(args: BuildArgs) -> Result<(), BuildError> {
    let input = File::open(&args.input).map_err(BuildError::Read)?;
    let mut sink = CorpusWriter::create(&args.output).map_err(BuildError::Write)?;
    let options = BuildOptions {
        include_start: args.include_start,
        en_passant: args.ep_mode.into(),
        max_games: args.max_games,
    };
    let mut progress = ProgressLine {
        every: args.progress_every,
        printed: false,
    };

    let summary = CorpusBuilder::new(options).build(BufReader::new(input), &mut sink, &mut progress)?;
    sink.finish().map_err(BuildError::Write)?;

    if progress.printed {
        eprintln!();
    }
    println!(
        "{} games, {} positions written to {} ({} empty, {} malformed)",
        summary.games,
        summary.positions,
        args.output.display(),
        summary.empty_games,
        summary.malformed_games
    );
    Ok(())
}

fn compare(args: CompareArgs) -> Result<Tally, HarnessError> {
    let stop = StopFlag::new();
    if let Err(e) = stop.install_ctrlc_handler() {
        log::warn!("could not install interrupt handler: {e}");
    }

    let corpus = CorpusReader::open(&args.corpus).map_err(CorpusError::Io)?;

    let mut reporter = Fanout::new();
    reporter.push(Box::new(
        ConsoleReporter::new(io::stdout())
            .with_color(!args.no_color)
            .with_good_lines(!args.quiet),
    ));
    if let Some(path) = &args.json {
        let file = File::create(path).map_err(HarnessError::Report)?;
        reporter.push(Box::new(JsonLinesReporter::new(BufWriter::new(file))));
    }

    let config = EngineConfig::new(&args.engine)
        .with_args(args.engine_args)
        .with_timeout(args.timeout_ms.map(Duration::from_millis))
        .with_handshake(args.handshake);
    let mut engine = EngineProcess::spawn(&config, stop.clone())?;

    let options = CompareOptions {
        limit: args.limit,
        fail_fast: args.fail_fast,
        stop,
    };
    println!("Testing positions...");
    let result = compare::run(corpus, &mut engine, &ReferenceOracle, &mut reporter, &options);

    match engine.shutdown() {
        Ok(status) => log::debug!("engine exited with {status}"),
        Err(e) => log::warn!("engine teardown failed: {e}"),
    }
    result
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    match Cli::parse().command {
        Command::BuildCorpus(args) => match build_corpus(args) {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                eprintln!("error: {e}");
                ExitCode::from(2)
            }
        },
        Command::Compare(args) => match compare(args) {
            Ok(tally) if tally.bad == 0 => ExitCode::SUCCESS,
            Ok(_) => ExitCode::from(1),
            Err(e) if e.is_interrupted() => {
                eprintln!("error: {e}");
                ExitCode::from(130)
            }
            Err(e) => {
                eprintln!("error: {e}");
                ExitCode::from(2)
            }
        },
    }
}
