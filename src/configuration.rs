//! Config for the dojo behaviors
//!
//! Configuration can be created programmatically using [`Configuration::new()`] or by reading
//! environment variables using [`Configuration::from_env()`].
//!
//! # Environment Variables
//!
//! All values are optional. Flags are case-insensitive, set them to `"true"` to enable.
//!
//! - `DOJO_VERBOSE`: Print a line per finished match (default: `false`)
//! - `DOJO_LOG`: Enable logging to a file (default: `false`)
//! - `DOJO_COMPILE`: Run the compile command before running matches (default: `true`)
//! - `DOJO_WORKERS`: Number of matches run in parallel (default: number of CPUs)
//! - `DOJO_GAME`: Path of the game executable (default: `./Game`)
//! - `DOJO_COMPILE_COMMAND`: Command building agents and game (default: `make`)
//! - `DOJO_INPUT_FILE`: Game configuration file given to the game (default: `default.cnf`)
//! - `DOJO_OUTPUT_DIR`: Directory receiving per-match result files (default: system temp dir)
//! - `DOJO_MATCH_TIMEOUT_SECS`: Kill a match running longer than this (default: no limit)
//! - `DOJO_ECHO_GAME_OUTPUT`: Mirror the game's stderr (default: `false`)

use std::path::PathBuf;
use std::time::Duration;

/// Configuration for dojo behaviors.
#[derive(Debug, Clone)]
pub struct Configuration {
    pub(crate) verbose: bool,
    pub(crate) log: bool,
    pub(crate) compile: bool,
    pub(crate) workers: Option<usize>,
    pub(crate) game_executable: PathBuf,
    pub(crate) compile_command: String,
    pub(crate) input_file: PathBuf,
    pub(crate) output_dir: PathBuf,
    pub(crate) match_timeout: Option<Duration>,
    pub(crate) echo_game_output: bool,
}

impl Configuration {
    /// Create a new configuration with default parameters.
    ///
    /// By default:
    /// - Nothing is printed per match and logging to file is disabled.
    /// - Agents are compiled with `make` before running.
    /// - One match runs per available CPU.
    /// - The game is `./Game`, reading `default.cnf`.
    /// - Matches have no time limit.
    pub fn new() -> Self {
        Self {
            verbose: false,
            log: false,
            compile: true,
            workers: None,
            game_executable: PathBuf::from("./Game"),
            compile_command: "make".to_owned(),
            input_file: PathBuf::from("default.cnf"),
            output_dir: std::env::temp_dir(),
            match_timeout: None,
            echo_game_output: false,
        }
    }

    /// Create configuration from environment variables, see the module documentation.
    ///
    /// Unset or unparseable variables keep their default value.
    pub fn from_env() -> Self {
        fn get_env_flag(var: &str, default: bool) -> bool {
            match std::env::var(var) {
                Ok(val) => val.eq_ignore_ascii_case("true"),
                Err(_) => default,
            }
        }

        fn get_env_parsed<T: std::str::FromStr>(var: &str) -> Option<T> {
            std::env::var(var).ok()?.parse().ok()
        }

        let default = Self::new();
        Self {
            verbose: get_env_flag("DOJO_VERBOSE", default.verbose),
            log: get_env_flag("DOJO_LOG", default.log),
            compile: get_env_flag("DOJO_COMPILE", default.compile),
            workers: get_env_parsed("DOJO_WORKERS").filter(|&n: &usize| n > 0),
            game_executable: get_env_parsed("DOJO_GAME").unwrap_or(default.game_executable),
            compile_command: std::env::var("DOJO_COMPILE_COMMAND").unwrap_or(default.compile_command),
            input_file: get_env_parsed("DOJO_INPUT_FILE").unwrap_or(default.input_file),
            output_dir: get_env_parsed("DOJO_OUTPUT_DIR").unwrap_or(default.output_dir),
            match_timeout: get_env_parsed("DOJO_MATCH_TIMEOUT_SECS").map(Duration::from_secs),
            echo_game_output: get_env_flag("DOJO_ECHO_GAME_OUTPUT", default.echo_game_output),
        }
    }

    /// Enable or disable the per-match progress line.
    pub fn with_verbose(mut self, value: bool) -> Self {
        self.verbose = value;
        self
    }

    /// Enable or disable logging to file.
    pub fn with_log(mut self, value: bool) -> Self {
        self.log = value;
        self
    }

    /// Enable or disable compilation before running matches.
    pub fn with_compile(mut self, value: bool) -> Self {
        self.compile = value;
        self
    }

    /// Number of matches run in parallel. `0` restores the default (one per CPU).
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = (workers > 0).then_some(workers);
        self
    }

    /// Path of the game executable.
    pub fn with_game_executable(mut self, path: impl Into<PathBuf>) -> Self {
        self.game_executable = path.into();
        self
    }

    /// Command (program and whitespace separated arguments) building agents and game.
    pub fn with_compile_command(mut self, command: &str) -> Self {
        self.compile_command = command.to_owned();
        self
    }

    /// Game configuration file passed with `-i`.
    pub fn with_input_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.input_file = path.into();
        self
    }

    /// Directory receiving the per-slot result files passed with `-o`.
    pub fn with_output_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_dir = path.into();
        self
    }

    /// Kill matches running longer than `timeout`.
    pub fn with_match_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.match_timeout = timeout;
        self
    }

    /// Mirror the game's stderr while it runs (debug purposes only).
    pub fn with_echo_game_output(mut self, value: bool) -> Self {
        self.echo_game_output = value;
        self
    }

    /// Number of worker threads to use.
    pub fn worker_count(&self) -> usize {
        self.workers.unwrap_or_else(num_cpus::get).max(1)
    }
}

impl Default for Configuration {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_overrides_defaults() {
        let config = Configuration::new()
            .with_workers(3)
            .with_compile(false)
            .with_game_executable("bin/Game")
            .with_match_timeout(Some(Duration::from_secs(5)));
        assert_eq!(config.worker_count(), 3);
        assert!(!config.compile);
        assert_eq!(config.game_executable, PathBuf::from("bin/Game"));
        assert_eq!(config.match_timeout, Some(Duration::from_secs(5)));
    }

    #[test]
    fn zero_workers_means_one_per_cpu() {
        let config = Configuration::new().with_workers(0);
        assert_eq!(config.worker_count(), num_cpus::get().max(1));
    }
}
