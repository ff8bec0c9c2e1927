//! The external collaborators: the game executable and the compile command.
//!
//! The game is invoked as
//! `Game <p1> <p2> <p3> <p4> -s <seed> -i <input file> -o <output file>` and reports the match
//! on stderr (see [`crate::match_result`]). Scheduling code only talks to the
//! [`MatchExecutor`] trait so that tests and alternative runners can stand in for the process.

use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::str::FromStr;
use std::sync::{mpsc, Arc, Mutex};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use tracing::{debug, error, info, instrument, warn};

use crate::configuration::Configuration;
use crate::error::{DojoError, Result};
use crate::match_result::PLAYERS_PER_MATCH;

/// Largest seed handed to the game, time based seeds are reduced modulo this value.
pub const SEED_MODULUS: u64 = 2_147_479_307;

const STDERR_TAIL_LINES: usize = 20;

/// How long the game's stderr may stay open once the game exited, when a timeout is set.
const DRAIN_GRACE: Duration = Duration::from_millis(200);

/// Random seed policy for a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Seed {
    /// Always the same seed.
    Fixed(u32),
    /// Derived from the clock when the match starts.
    Time,
}

impl Seed {
    /// Seed value to pass to the game.
    pub fn resolve(self) -> u32 {
        match self {
            Seed::Fixed(seed) => seed,
            Seed::Time => {
                let micros = SystemTime::now()
                    .duration_since(UNIX_EPOCH)
                    .unwrap_or_default()
                    .as_micros();
                (micros % u128::from(SEED_MODULUS)) as u32
            }
        }
    }
}

impl FromStr for Seed {
    type Err = DojoError;

    fn from_str(s: &str) -> Result<Self> {
        if s.eq_ignore_ascii_case("time") {
            return Ok(Seed::Time);
        }
        s.trim()
            .parse()
            .map(Seed::Fixed)
            .map_err(|_| DojoError::InvalidInput(format!("seed must be a number or 'time', got '{s}'")))
    }
}

/// Files handed to the game for one match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchFiles {
    /// Game configuration, only read.
    pub input: PathBuf,
    /// Result file written by the game.
    pub output: PathBuf,
}

impl MatchFiles {
    /// Files for worker `slot`: the shared input and a result file no other slot uses.
    pub fn for_slot(input: &Path, output_dir: &Path, slot: usize) -> MatchFiles {
        MatchFiles {
            input: input.to_owned(),
            output: output_dir.join(format!("dojo-{}-slot{slot}.res", std::process::id())),
        }
    }
}

/// Runs a single match and returns the game's diagnostic output.
///
/// Implementations are shared by every worker thread and must block until the match is over.
pub trait MatchExecutor: Send + Sync {
    /// Plays `players` (seat order) with `seed`.
    ///
    /// # Errors
    /// [`DojoError::ExecutionFailure`] when the match could not be played to the end.
    fn execute(&self, players: &[String; PLAYERS_PER_MATCH], seed: u32, files: &MatchFiles) -> Result<String>;
}

impl<F> MatchExecutor for F
where
    F: Fn(&[String; PLAYERS_PER_MATCH], u32, &MatchFiles) -> Result<String> + Send + Sync,
{
    fn execute(&self, players: &[String; PLAYERS_PER_MATCH], seed: u32, files: &MatchFiles) -> Result<String> {
        self(players, seed, files)
    }
}

/// [`MatchExecutor`] spawning the game executable as a child process.
#[derive(Debug, Clone)]
pub struct GameExecutable {
    path: PathBuf,
    working_dir: Option<PathBuf>,
    timeout: Option<Duration>,
    echo: bool,
}

impl GameExecutable {
    /// Game at `path`, no timeout, silent.
    pub fn new(path: impl Into<PathBuf>) -> GameExecutable {
        GameExecutable {
            path: path.into(),
            working_dir: None,
            timeout: None,
            echo: false,
        }
    }

    /// Game, timeout and echo taken from `config`.
    pub fn from_config(config: &Configuration) -> GameExecutable {
        GameExecutable {
            path: config.game_executable.clone(),
            working_dir: None,
            timeout: config.match_timeout,
            echo: config.echo_game_output,
        }
    }

    /// Run the game from `dir`. A relative game path is resolved against `dir`.
    pub fn in_dir(mut self, dir: &Path) -> Self {
        if self.path.is_relative() {
            self.path = dir.join(&self.path);
        }
        self.working_dir = Some(dir.to_owned());
        self
    }

    /// Kill the game after `timeout`.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Mirror the game's stderr while reading it.
    pub fn with_echo(mut self, echo: bool) -> Self {
        self.echo = echo;
        self
    }
}

impl MatchExecutor for GameExecutable {
    #[instrument(skip(self, files), fields(game = %self.path.display()))]
    fn execute(&self, players: &[String; PLAYERS_PER_MATCH], seed: u32, files: &MatchFiles) -> Result<String> {
        let mut command = Command::new(&self.path);
        if let Some(dir) = &self.working_dir {
            command.current_dir(dir);
        }
        let mut child = command
            .args(players)
            .arg("-s")
            .arg(seed.to_string())
            .arg("-i")
            .arg(&files.input)
            .arg("-o")
            .arg(&files.output)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| DojoError::ExecutionFailure {
                status: format!("cannot launch '{}': {e}", self.path.display()),
                stderr: String::new(),
            })?;

        // drained on its own thread so a chatty game never blocks on a full pipe
        let output = Arc::new(Mutex::new(String::new()));
        let (drained_tx, drained_rx) = mpsc::channel::<()>();
        match child.stderr.take() {
            Some(pipe) => {
                let output = Arc::clone(&output);
                let echo = self.echo;
                std::thread::spawn(move || {
                    read_output(pipe, echo, &output);
                    let _ = drained_tx.send(());
                });
            }
            None => drop(drained_tx),
        }

        let status = wait_for(&mut child, self.timeout);
        // processes spawned by the game may keep the pipe open after it is gone
        match self.timeout {
            Some(_) => {
                if drained_rx.recv_timeout(DRAIN_GRACE).is_err() {
                    debug!("stderr still open after the game exited, not waiting for it");
                }
            }
            None => {
                let _ = drained_rx.recv();
            }
        }
        let output = output.lock().map(|o| o.clone()).unwrap_or_default();

        match status? {
            Some(status) if status.success() => {
                debug!("game finished");
                Ok(output)
            }
            Some(status) => {
                warn!("game exited with {status}");
                Err(DojoError::ExecutionFailure {
                    status: status.to_string(),
                    stderr: tail(&output),
                })
            }
            None => {
                warn!("game killed after {:?}", self.timeout);
                Err(DojoError::ExecutionFailure {
                    status: format!("timed out after {:?}", self.timeout.unwrap_or_default()),
                    stderr: tail(&output),
                })
            }
        }
    }
}

fn read_output(pipe: impl Read, echo: bool, output: &Mutex<String>) {
    let mut reader = BufReader::new(pipe);
    let mut line = Vec::new();
    loop {
        line.clear();
        match reader.read_until(b'\n', &mut line) {
            Ok(0) | Err(_) => break,
            Ok(_) => {
                let text = String::from_utf8_lossy(&line);
                if echo {
                    eprint!("{text}");
                }
                if let Ok(mut output) = output.lock() {
                    output.push_str(&text);
                }
            }
        }
    }
}

/// Waits for `child`, killing it once `timeout` is exceeded (`Ok(None)` then).
fn wait_for(child: &mut Child, timeout: Option<Duration>) -> Result<Option<ExitStatus>> {
    let Some(timeout) = timeout else {
        return Ok(Some(child.wait()?));
    };

    let deadline = Instant::now() + timeout;
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if Instant::now() >= deadline {
            let _ = child.kill();
            let _ = child.wait();
            return Ok(None);
        }
        std::thread::sleep(Duration::from_millis(10));
    }
}

fn tail(output: &str) -> String {
    let lines: Vec<&str> = output.lines().collect();
    lines[lines.len().saturating_sub(STDERR_TAIL_LINES)..].join("\n")
}

/// Runs the compile command (program followed by whitespace separated arguments) in `dir`.
///
/// # Errors
/// [`DojoError::Compilation`] when the command cannot be launched or exits with an error.
#[instrument]
pub fn compile_agents(command: &str, dir: &Path) -> Result<()> {
    let mut parts = command.split_whitespace();
    let Some(program) = parts.next() else {
        return Err(DojoError::InvalidInput("empty compile command".to_owned()));
    };

    let output = Command::new(program)
        .args(parts)
        .current_dir(dir)
        .stdin(Stdio::null())
        .output()
        .map_err(|e| DojoError::Compilation {
            status: "not launched".to_owned(),
            output: format!("command '{program}' could not be run: {e}"),
        })?;

    if output.status.success() {
        info!("compilation done");
        return Ok(());
    }

    let stderr = String::from_utf8_lossy(&output.stderr);
    let stderr = stderr.trim();
    error!("compilation error: {stderr}");
    Err(DojoError::Compilation {
        status: output.status.to_string(),
        output: stderr.lines().next().unwrap_or_default().to_owned(),
    })
}
