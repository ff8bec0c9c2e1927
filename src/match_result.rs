//! Parsing the diagnostic output of the game executable.
//!
//! At the end of a match the game prints one line per player of the form
//! `... player <ID> got score <N>` followed by a short trailing block. The last four such lines
//! describe the match.

use std::fmt::Display;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::{DojoError, Result};

/// Number of players in every match.
pub const PLAYERS_PER_MATCH: usize = 4;

/// Outcome of one match, immutable once parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchResult {
    /// Player identifiers in the order the game reported them.
    pub players: [String; PLAYERS_PER_MATCH],
    /// Score of each player, same order as `players`.
    pub scores: [u64; PLAYERS_PER_MATCH],
    /// Seat indices ordered by score descending, ties keep seat order.
    pub ranking: [usize; PLAYERS_PER_MATCH],
    /// Seat of the first player reaching the best score.
    pub winner: usize,
}

impl MatchResult {
    /// Builds a result from players and scores, computing winner and ranking.
    pub fn new(players: [String; PLAYERS_PER_MATCH], scores: [u64; PLAYERS_PER_MATCH]) -> Self {
        let mut winner = 0;
        for (seat, &score) in scores.iter().enumerate() {
            if score > scores[winner] {
                winner = seat;
            }
        }

        let mut ranking = [0, 1, 2, 3];
        // stable
        ranking.sort_by(|&a, &b| scores[b].cmp(&scores[a]));

        MatchResult {
            players,
            scores,
            ranking,
            winner,
        }
    }

    /// Parses the game's diagnostic text.
    ///
    /// # Errors
    /// [`DojoError::ProtocolViolation`] when fewer than four score lines are present.
    pub fn parse(output: &str) -> Result<MatchResult> {
        let mut found = output
            .lines()
            .filter_map(parse_score_line)
            .collect::<Vec<_>>();

        if found.len() < PLAYERS_PER_MATCH {
            return Err(DojoError::ProtocolViolation(format!(
                "expected {PLAYERS_PER_MATCH} 'player <ID> got score <N>' lines, found {}",
                found.len()
            )));
        }

        let found = found.split_off(found.len() - PLAYERS_PER_MATCH);
        let mut players: [String; PLAYERS_PER_MATCH] = Default::default();
        let mut scores = [0; PLAYERS_PER_MATCH];
        for (seat, line) in found.into_iter().enumerate() {
            let (player, score) = line?;
            players[seat] = player;
            scores[seat] = score;
        }

        Ok(MatchResult::new(players, scores))
    }

    /// Player identifiers ordered by score descending.
    pub fn players_sorted(&self) -> impl Iterator<Item = &str> + '_ {
        self.ranking.iter().map(|&seat| self.players[seat].as_str())
    }

    /// Identifier of the winner.
    pub fn winner_name(&self) -> &str {
        &self.players[self.winner]
    }
}

static SCORE_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"player ([_0-9A-Za-z]+) got score ([0-9]+)").expect("valid score pattern"));

/// Extracts `(id, score)` from a line containing `player <ID> got score <N>`.
///
/// Lines that do not contain the pattern yield `None`; a matching line whose score does not
/// fit yields an error.
fn parse_score_line(line: &str) -> Option<Result<(String, u64)>> {
    let captures = SCORE_LINE.captures(line)?;
    let id = captures[1].to_owned();
    Some(
        captures[2]
            .parse()
            .map(|score| (id, score))
            .map_err(|e| DojoError::ProtocolViolation(format!("bad score in '{line}': {e}"))),
    )
}

impl Display for MatchResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for seat in 0..PLAYERS_PER_MATCH {
            let prefix = if seat == self.winner { "*" } else { " " };
            writeln!(f, "{prefix} {:<14} {}", self.players[seat], self.scores[seat])?;
        }
        Ok(())
    }
}
