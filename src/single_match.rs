//! One match between four descriptors.

use rand::seq::{IndexedRandom, SliceRandom};
use rand::Rng;
use tracing::{info, instrument};

use crate::agent::Registry;
use crate::descriptor::Descriptor;
use crate::error::{DojoError, Result};
use crate::executor::{MatchExecutor, MatchFiles, Seed};
use crate::match_result::{MatchResult, PLAYERS_PER_MATCH};

/// Resolves each descriptor to one of its matching agents (picked at random), optionally
/// shuffles the seats, and plays the match.
///
/// # Errors
/// - [`DojoError::InvalidInput`] unless exactly four descriptors are given
/// - [`DojoError::NotFound`] when a descriptor matches no agent
/// - errors of the executor and of [`MatchResult::parse`]
#[instrument(skip(registry, executor, rng))]
pub fn run_single<R: Rng + ?Sized>(
    registry: &Registry,
    descriptors: &[String],
    seed: Seed,
    shuffle: bool,
    executor: &dyn MatchExecutor,
    files: &MatchFiles,
    rng: &mut R,
) -> Result<MatchResult> {
    if descriptors.len() != PLAYERS_PER_MATCH {
        return Err(DojoError::InvalidInput(format!(
            "invalid number of players '{}'",
            descriptors.len()
        )));
    }

    let mut players: [String; PLAYERS_PER_MATCH] = Default::default();
    for (seat, text) in descriptors.iter().enumerate() {
        let descriptor = Descriptor::parse(text);
        let candidates = registry.list(std::slice::from_ref(&descriptor));
        let agent = candidates.choose(rng).ok_or_else(|| DojoError::NotFound {
            descriptor: format!("{text} (player {seat})"),
        })?;
        players[seat] = agent.player_name();
    }

    if shuffle {
        players.shuffle(rng);
    }

    info!(?players, "running match");
    let output = executor.execute(&players, seed.resolve(), files)?;
    MatchResult::parse(&output)
}
