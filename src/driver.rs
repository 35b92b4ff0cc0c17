//! Process driver for the candidate engine.
//!
//! `Candidate` is the capability the comparator needs; `EngineProcess` is the
//! one adapter that talks to a real subprocess. The adapter owns the child
//! and both pipes exclusively and tears the process down on every exit path,
//! including `Drop`.

use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread;
use std::time::{Duration, Instant};

use crate::error::EngineError;
use crate::protocol::EngineCommand;
use crate::sync::StopFlag;
use crate::types::{MoveSet, PositionDescriptor};

/// How often a blocked read wakes up to check the stop flag
const POLL_INTERVAL_MS: u64 = 50;

/// Time the engine gets to exit on its own after `quit`
const DEFAULT_SHUTDOWN_GRACE_MS: u64 = 500;

/// The engine under test, as seen by the comparator.
pub trait Candidate {
    /// Clear any state retained between positions. Called once per run.
    fn reset(&mut self) -> Result<(), EngineError>;

    /// The engine's claimed legal moves for `position`.
    fn legal_moves(&mut self, position: &PositionDescriptor) -> Result<MoveSet, EngineError>;
}

impl<C: Candidate + ?Sized> Candidate for Box<C> {
    fn reset(&mut self) -> Result<(), EngineError> {
        (**self).reset()
    }

    fn legal_moves(&mut self, position: &PositionDescriptor) -> Result<MoveSet, EngineError> {
        (**self).legal_moves(position)
    }
}

/// How to launch and talk to the candidate.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub program: PathBuf,
    pub args: Vec<String>,
    /// Bound on each reply; `None` waits forever
    pub timeout: Option<Duration>,
    /// Send `uci` / `isready` and wait for `readyok` after launch
    pub handshake: bool,
    pub shutdown_grace: Duration,
}

impl EngineConfig {
    #[must_use]
    pub fn new(program: impl Into<PathBuf>) -> Self {
        EngineConfig {
            program: program.into(),
            args: Vec::new(),
            timeout: None,
            handshake: false,
            shutdown_grace: Duration::from_millis(DEFAULT_SHUTDOWN_GRACE_MS),
        }
    }

    #[must_use]
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_handshake(mut self, handshake: bool) -> Self {
        self.handshake = handshake;
        self
    }
}

type LineResult = std::io::Result<String>;

/// A running candidate engine.
pub struct EngineProcess {
    child: Child,
    stdin: Option<ChildStdin>,
    lines: Receiver<LineResult>,
    timeout: Option<Duration>,
    shutdown_grace: Duration,
    stop: StopFlag,
    terminated: bool,
}

impl EngineProcess {
    /// Launch the engine with piped stdin and stdout.
    ///
    /// stderr is inherited so engine diagnostics reach the operator.
    pub fn spawn(config: &EngineConfig, stop: StopFlag) -> Result<Self, EngineError> {
        let program = config.program.display().to_string();
        let mut child = Command::new(&config.program)
            .args(&config.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|source| EngineError::Spawn {
                program: program.clone(),
                source,
            })?;
        log::debug!("spawned '{}' as pid {}", program, child.id());

        let stdin = child.stdin.take();
        let stdout = child.stdout.take();
        let (stdin, stdout) = match (stdin, stdout) {
            (Some(stdin), Some(stdout)) => (stdin, stdout),
            (None, _) => return Err(abandon(child, EngineError::MissingPipe { pipe: "stdin" })),
            (_, None) => return Err(abandon(child, EngineError::MissingPipe { pipe: "stdout" })),
        };

        let (tx, rx) = mpsc::channel();
        if let Err(e) = thread::Builder::new()
            .name("engine-stdout".to_string())
            .spawn(move || forward_lines(stdout, &tx))
        {
            return Err(abandon(child, EngineError::Io(e)));
        }

        let mut engine = EngineProcess {
            child,
            stdin: Some(stdin),
            lines: rx,
            timeout: config.timeout,
            shutdown_grace: config.shutdown_grace,
            stop,
            terminated: false,
        };

        if config.handshake {
            engine.handshake()?;
        }
        Ok(engine)
    }

    /// OS process id of the engine.
    #[must_use]
    pub fn id(&self) -> u32 {
        self.child.id()
    }

    /// Send `quit`, close stdin and reap the process.
    ///
    /// The engine is killed if it has not exited within the grace period.
    pub fn shutdown(mut self) -> Result<ExitStatus, EngineError> {
        self.terminate().map_err(EngineError::from)
    }

    /// Run `uci` / `isready` and drain output up to `readyok`.
    ///
    /// The engine going away at any point is a handshake failure.
    fn handshake(&mut self) -> Result<(), EngineError> {
        self.await_ready().map_err(|e| match e {
            EngineError::Closed => EngineError::Handshake {
                reason: "engine exited before readyok".to_string(),
            },
            e => e,
        })
    }

    fn await_ready(&mut self) -> Result<(), EngineError> {
        self.send(&EngineCommand::Uci)?;
        self.send(&EngineCommand::IsReady)?;
        while self.read_line()?.trim() != "readyok" {}
        Ok(())
    }

    fn send(&mut self, command: &EngineCommand) -> Result<(), EngineError> {
        let stdin = self.stdin.as_mut().ok_or(EngineError::Closed)?;
        log::trace!(">> {command}");
        writeln!(stdin, "{command}")?;
        stdin.flush()?;
        Ok(())
    }

    fn read_line(&mut self) -> Result<String, EngineError> {
        let started = Instant::now();
        let poll = Duration::from_millis(POLL_INTERVAL_MS);
        loop {
            if self.stop.is_stopped() {
                return Err(EngineError::Interrupted);
            }
            let wait = match self.timeout {
                Some(limit) => {
                    let elapsed = started.elapsed();
                    if elapsed >= limit {
                        return Err(EngineError::Timeout { after: limit });
                    }
                    (limit - elapsed).min(poll)
                }
                None => poll,
            };
            match self.lines.recv_timeout(wait) {
                Ok(Ok(line)) => {
                    log::trace!("<< {line}");
                    return Ok(line);
                }
                Ok(Err(e)) => return Err(e.into()),
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => return Err(EngineError::Closed),
            }
        }
    }

    fn terminate(&mut self) -> std::io::Result<ExitStatus> {
        self.terminated = true;
        if let Some(mut stdin) = self.stdin.take() {
            // The engine may already be gone; quit is best-effort.
            let _ = writeln!(stdin, "{}", EngineCommand::Quit);
            let _ = stdin.flush();
        }

        let deadline = Instant::now() + self.shutdown_grace;
        loop {
            match self.child.try_wait() {
                Ok(Some(status)) => {
                    log::debug!("engine pid {} exited with {}", self.child.id(), status);
                    return Ok(status);
                }
                Ok(None) => {}
                Err(e) => {
                    log::warn!("polling engine pid {} failed: {e}", self.child.id());
                    break;
                }
            }
            if Instant::now() >= deadline {
                break;
            }
            thread::sleep(Duration::from_millis(10));
        }

        log::warn!(
            "engine pid {} did not exit after quit, killing it",
            self.child.id()
        );
        self.child.kill()?;
        self.child.wait()
    }
}

impl Candidate for EngineProcess {
    fn reset(&mut self) -> Result<(), EngineError> {
        self.send(&EngineCommand::UciNewGame)
    }

    fn legal_moves(&mut self, position: &PositionDescriptor) -> Result<MoveSet, EngineError> {
        self.send(&EngineCommand::set_position(position))?;
        self.send(&EngineCommand::LegalMoves)?;
        let line = self.read_line()?;
        Ok(MoveSet::from_response_line(&line))
    }
}

impl Drop for EngineProcess {
    fn drop(&mut self) {
        if !self.terminated {
            if let Err(e) = self.terminate() {
                log::error!("failed to reap engine: {e}");
            }
        }
    }
}

/// Pump complete lines from the engine's stdout until it closes.
///
/// Dropping the sender on exit is what tells the driver the pipe is closed.
fn forward_lines(stdout: ChildStdout, tx: &Sender<LineResult>) {
    let mut reader = BufReader::new(stdout);
    loop {
        let mut line = String::new();
        match reader.read_line(&mut line) {
            Ok(0) => break,
            Ok(_) => {
                let trimmed = line.trim_end_matches(['\r', '\n']).to_string();
                if tx.send(Ok(trimmed)).is_err() {
                    break;
                }
            }
            Err(e) => {
                let _ = tx.send(Err(e));
                break;
            }
        }
    }
}

fn abandon(mut child: Child, error: EngineError) -> EngineError {
    let _ = child.kill();
    let _ = child.wait();
    error
}
