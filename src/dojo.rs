//! Entry point tying the working directory, the configuration and the game together.
//!
//! A [`Dojo`] works on one directory holding agent artifacts (`AI<Name>[_<Version>[_<Desc>]].cc`
//! sources and `.o` objects), the game executable and the game configuration file. It offers the
//! four operations of the tool:
//!
//! - [`Dojo::list`]: agents selected by descriptors
//! - [`Dojo::new_version`]: copy an agent's source into the next version of its family
//! - [`Dojo::run`]: compile, then play one match
//! - [`Dojo::evaluate`]: compile, then play many matches and rank every participant
//!
//! The agent set is rescanned on every call, so files added between calls are picked up.
//!
//! # Example
//!
//! ```no_run
//! use ai_dojo::prelude::*;
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = Configuration::from_env().with_workers(4);
//!     let dojo = Dojo::new("path/to/game", config);
//!
//!     let against = vec!["Dummy".to_owned(), "Albert:..-2".to_owned()];
//!     let report = dojo.evaluate("Albert", 200, &against, |_| {})?;
//!     print!("{report}");
//!     Ok(())
//! }
//! ```

use std::path::{Path, PathBuf};

use anyhow::Context;
use tracing::{instrument, trace, warn};

use crate::agent::{Agent, Registry};
use crate::configuration::Configuration;
use crate::descriptor::Descriptor;
use crate::executor::{compile_agents, GameExecutable, MatchExecutor, MatchFiles, Seed};
use crate::logger::init_logger;
use crate::match_result::MatchResult;
use crate::rating::TournamentReport;
use crate::single_match::run_single;
use crate::tournament::{run_tournament, CancellationToken, TournamentSettings};
use crate::versioning::{derive_next_version, NewVersion};

/// The main type of the crate, see the module documentation.
///
/// # Type Parameters
/// - `E`: how matches are played, the game executable by default
pub struct Dojo<E: MatchExecutor = GameExecutable> {
    dir: PathBuf,
    config: Configuration,
    executor: E,
    cancellation: CancellationToken,
}

impl Dojo<GameExecutable> {
    /// Dojo over `dir`, playing matches with the configured game executable.
    ///
    /// A relative game path is taken relative to `dir`.
    pub fn new(dir: impl Into<PathBuf>, config: Configuration) -> Dojo<GameExecutable> {
        let dir = dir.into();
        let executor = GameExecutable::from_config(&config).in_dir(&dir);
        Dojo::with_executor(dir, config, executor)
    }
}

impl<E: MatchExecutor> Dojo<E> {
    /// Dojo over `dir` playing matches with `executor`.
    #[instrument(skip_all, fields(dir = %dir.as_ref().display()))]
    pub fn with_executor(dir: impl AsRef<Path>, config: Configuration, executor: E) -> Dojo<E> {
        if config.log {
            if let Err(e) = init_logger() {
                warn!("file logging disabled: {e:#}");
            }
        }
        trace!(?config);

        Dojo {
            dir: dir.as_ref().to_owned(),
            config,
            executor,
            cancellation: CancellationToken::new(),
        }
    }

    /// Working directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Token stopping a running [`evaluate`](Self::evaluate) from another thread.
    ///
    /// Every evaluation starts uncancelled: a cancellation only stops the evaluation running
    /// when it is issued.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation.clone()
    }

    /// Agents currently found in the working directory.
    pub fn registry(&self) -> anyhow::Result<Registry> {
        Registry::scan(&self.dir).with_context(|| format!("could not read {}", self.dir.display()))
    }

    /// Agents selected by any of `descriptors` (all agents when empty), by name then latest
    /// version first.
    pub fn list(&self, descriptors: &[String]) -> anyhow::Result<Vec<Agent>> {
        let registry = self.registry()?;
        let descriptors: Vec<Descriptor> = descriptors.iter().map(|d| Descriptor::parse(d)).collect();
        Ok(registry.list(&descriptors).into_iter().cloned().collect())
    }

    /// Creates the next version of the agent selected by `from`, copying its source.
    #[instrument(skip(self))]
    pub fn new_version(&self, from: &str, description: &str) -> anyhow::Result<NewVersion> {
        let registry = self.registry()?;
        let base = registry.lookup_first(&[Descriptor::parse(from)])?;
        Ok(derive_next_version(&registry, base, description, &self.dir)?)
    }

    /// Compiles, then plays one match between the agents selected by `players` (one descriptor
    /// per seat).
    #[instrument(skip(self))]
    pub fn run(&self, players: &[String], seed: Seed, shuffle: bool) -> anyhow::Result<MatchResult> {
        self.compile()?;
        let registry = self.registry()?;
        let files = MatchFiles::for_slot(&self.config.input_file, &self.config.output_dir, 0);
        let result = run_single(
            &registry,
            players,
            seed,
            shuffle,
            &self.executor,
            &files,
            &mut rand::rng(),
        )?;
        Ok(result)
    }

    /// Compiles, then evaluates the agent selected by `ai` over `games` matches against the pool
    /// selected by `against`.
    ///
    /// `on_match_complete` is called once per finished match, from the aggregating thread.
    #[instrument(skip(self, on_match_complete))]
    pub fn evaluate<F>(
        &self,
        ai: &str,
        games: usize,
        against: &[String],
        mut on_match_complete: F,
    ) -> anyhow::Result<TournamentReport>
    where
        F: FnMut(&MatchResult) + Send,
    {
        self.cancellation.reset();
        self.compile()?;
        let registry = self.registry()?;
        let evaluated = registry.lookup_first(&[Descriptor::parse(ai)])?;

        let settings =
            TournamentSettings::from_config(&self.config).with_cancellation(self.cancellation.clone());
        let verbose = self.config.verbose;
        let mut finished = 0;
        let report = run_tournament(
            &registry,
            evaluated,
            games,
            against,
            &self.executor,
            &settings,
            |result| {
                finished += 1;
                if verbose {
                    println!("game {finished}/{games}: {} wins", result.winner_name());
                }
                on_match_complete(result);
            },
        )?;

        if report.matches < games {
            warn!("evaluation stopped after {} of {games} games", report.matches);
        }
        Ok(report)
    }

    fn compile(&self) -> anyhow::Result<()> {
        if !self.config.compile {
            return Ok(());
        }
        if self.config.verbose {
            println!("Compiling ...");
        }
        compile_agents(&self.config.compile_command, &self.dir)?;
        Ok(())
    }
}
