//! Running many independent matches in parallel and folding their results.
//!
//! The scheduler thread samples four players per match and hands the match to a fixed pool of
//! workers through a rendezvous channel, so submitting blocks until a worker is free. Workers run
//! the game and send the parsed result (or the error) to a single aggregator thread that owns
//! the [`Standings`]. Statistics are therefore never touched concurrently.
//!
//! The first failed match stops the scheduling of new matches; matches already running are
//! drained and the error is returned. A [`CancellationToken`] does the same from the outside,
//! returning the report of the matches that completed.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread;

use rand::Rng;
use tracing::{debug, error, info, instrument, trace, warn};

use crate::agent::{Agent, Registry};
use crate::configuration::Configuration;
use crate::descriptor::Descriptor;
use crate::error::{DojoError, Result};
use crate::executor::{MatchExecutor, MatchFiles, Seed};
use crate::match_result::{MatchResult, PLAYERS_PER_MATCH};
use crate::rating::{Standings, TournamentReport};

/// Shared flag asking a running tournament to stop scheduling matches.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    /// A token that is not cancelled.
    pub fn new() -> CancellationToken {
        CancellationToken::default()
    }

    /// Request cancellation. Matches already running still complete.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Whether [`cancel`](Self::cancel) was called since the last reset.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    /// Clears a previous cancellation, for every clone of this token.
    pub fn reset(&self) {
        self.0.store(false, Ordering::Relaxed);
    }
}

/// How a tournament is executed.
#[derive(Debug, Clone)]
pub struct TournamentSettings {
    /// Matches run in parallel.
    pub workers: usize,
    /// Seed policy of every match.
    pub seed: Seed,
    /// Game configuration file shared by every match.
    pub input_file: PathBuf,
    /// Directory of the per-worker result files.
    pub output_dir: PathBuf,
    /// Outside request to stop early.
    pub cancellation: CancellationToken,
}

impl TournamentSettings {
    /// Settings taken from `config`, with time based seeds.
    pub fn from_config(config: &Configuration) -> TournamentSettings {
        TournamentSettings {
            workers: config.worker_count(),
            seed: Seed::Time,
            input_file: config.input_file.clone(),
            output_dir: config.output_dir.clone(),
            cancellation: CancellationToken::new(),
        }
    }

    /// Use `token` to cancel the tournament.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    /// Use `seed` for every match.
    pub fn with_seed(mut self, seed: Seed) -> Self {
        self.seed = seed;
        self
    }
}

/// Picks the four seats of a match out of a candidate pool.
#[derive(Debug, Clone, Copy)]
pub struct PlayerSampler<'a> {
    pool: &'a [String],
    distinct: usize,
}

impl<'a> PlayerSampler<'a> {
    /// Sampler over `pool`, which must not be empty. Repeated entries only weigh their draw.
    pub fn new(pool: &'a [String]) -> PlayerSampler<'a> {
        let distinct = pool.iter().collect::<HashSet<_>>().len();
        PlayerSampler { pool, distinct }
    }

    /// Four players drawn uniformly with replacement.
    ///
    /// Seat `i` is redrawn while it repeats an earlier seat, as long as the pool has more than
    /// `i` distinct entries: four or more give four distinct players, fewer repeat.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> [String; PLAYERS_PER_MATCH] {
        let mut seats: [String; PLAYERS_PER_MATCH] = Default::default();
        for seat in 0..PLAYERS_PER_MATCH {
            let mut pick = self.draw(rng);
            if seat < self.distinct {
                while seats[..seat].iter().any(|p| p == pick) {
                    pick = self.draw(rng);
                }
            }
            seats[seat] = pick.clone();
        }
        seats
    }

    fn draw<R: Rng + ?Sized>(&self, rng: &mut R) -> &'a String {
        // the pool is never empty, see `run_tournament`
        &self.pool[rng.random_range(0..self.pool.len())]
    }
}

struct MatchJob {
    index: usize,
    players: [String; PLAYERS_PER_MATCH],
}

type MatchOutcome = (usize, Result<MatchResult>);

/// Plays `total_matches` matches of `evaluated` against the agents selected by
/// `opponent_descriptors` and returns the ranking.
///
/// The evaluated agent joins the candidate pool through its exact descriptor. `on_match_complete`
/// is called from the aggregator thread after each result is folded.
///
/// # Errors
/// - [`DojoError::InvalidInput`] when no opponent descriptor is given
/// - [`DojoError::NotFound`] when the candidate pool is empty
/// - the first match error (execution failure or unparseable output)
#[instrument(skip(registry, executor, settings, on_match_complete), fields(evaluated = %evaluated))]
pub fn run_tournament<F>(
    registry: &Registry,
    evaluated: &Agent,
    total_matches: usize,
    opponent_descriptors: &[String],
    executor: &dyn MatchExecutor,
    settings: &TournamentSettings,
    on_match_complete: F,
) -> Result<TournamentReport>
where
    F: FnMut(&MatchResult) + Send,
{
    if opponent_descriptors.is_empty() {
        return Err(DojoError::InvalidInput(
            "evaluate received no against descriptors".to_owned(),
        ));
    }

    let descriptors: Vec<Descriptor> = std::iter::once(evaluated.descriptor())
        .chain(opponent_descriptors.iter().map(|d| Descriptor::parse(d)))
        .collect();
    let pool: Vec<String> = registry
        .list(&descriptors)
        .into_iter()
        .map(Agent::player_name)
        .collect();
    if pool.is_empty() {
        return Err(DojoError::NotFound {
            descriptor: opponent_descriptors.join(", "),
        });
    }

    let workers = settings.workers.clamp(1, total_matches.max(1));
    info!(?pool, total_matches, workers, "starting tournament");

    let failed = AtomicBool::new(false);
    let failed = &failed;
    let (standings, first_error) = thread::scope(|scope| {
        let (job_tx, job_rx) = mpsc::sync_channel::<MatchJob>(0);
        let job_rx = Arc::new(Mutex::new(job_rx));
        let (result_tx, result_rx) = mpsc::channel::<MatchOutcome>();

        for slot in 0..workers {
            let jobs = Arc::clone(&job_rx);
            let results = result_tx.clone();
            let files = MatchFiles::for_slot(&settings.input_file, &settings.output_dir, slot);
            let seed = settings.seed;
            scope.spawn(move || worker(slot, jobs, results, executor, files, seed, failed));
        }
        // the workers own the channel ends from here on
        drop(job_rx);
        drop(result_tx);

        let evaluated_name = evaluated.player_name();
        let aggregator =
            scope.spawn(move || aggregate(result_rx, Standings::new(evaluated_name), on_match_complete));

        let sampler = PlayerSampler::new(&pool);
        let mut rng = rand::rng();
        for index in 0..total_matches {
            if failed.load(Ordering::Relaxed) {
                warn!("a match failed, no more matches are scheduled");
                break;
            }
            if settings.cancellation.is_cancelled() {
                warn!("tournament cancelled after scheduling {index} matches");
                break;
            }
            let players = sampler.sample(&mut rng);
            trace!(index, ?players, "scheduling match");
            if job_tx.send(MatchJob { index, players }).is_err() {
                error!("every worker stopped, no more matches are scheduled");
                break;
            }
        }
        drop(job_tx);

        match aggregator.join() {
            Ok(outcome) => outcome,
            Err(panic) => std::panic::resume_unwind(panic),
        }
    });

    if let Some(err) = first_error {
        return Err(err);
    }
    info!(matches = standings.matches(), "tournament finished");
    Ok(standings.report())
}

fn worker(
    slot: usize,
    jobs: Arc<Mutex<Receiver<MatchJob>>>,
    results: Sender<MatchOutcome>,
    executor: &dyn MatchExecutor,
    files: MatchFiles,
    seed: Seed,
    failed: &AtomicBool,
) {
    loop {
        let job = match jobs.lock() {
            Ok(receiver) => receiver.recv(),
            Err(_) => break,
        };
        let Ok(MatchJob { index, players }) = job else {
            break;
        };

        if failed.load(Ordering::Relaxed) {
            debug!(slot, index, "skipping match after failure");
            continue;
        }

        debug!(slot, index, ?players, "match started");
        let outcome = executor
            .execute(&players, seed.resolve(), &files)
            .and_then(|output| MatchResult::parse(&output));
        if outcome.is_err() {
            failed.store(true, Ordering::Relaxed);
        }
        if results.send((index, outcome)).is_err() {
            break;
        }
    }
}

fn aggregate<F>(
    results: Receiver<MatchOutcome>,
    mut standings: Standings,
    mut on_match_complete: F,
) -> (Standings, Option<DojoError>)
where
    F: FnMut(&MatchResult),
{
    let mut first_error = None;
    for (index, outcome) in results {
        match outcome {
            Ok(result) => {
                standings.fold(&result);
                debug!(index, winner = result.winner_name(), "match folded");
                on_match_complete(&result);
            }
            Err(err) => {
                error!(index, "match failed: {err}");
                first_error.get_or_insert(err);
            }
        }
    }
    (standings, first_error)
}
