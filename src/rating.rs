//! Folding match results into per-agent statistics and Elo ratings.
//!
//! [`Standings`] is owned by a single consumer: results are applied one at a time, in whatever
//! order matches finish. Score histories do not depend on that order (as multisets), Elo
//! trajectories do.

use std::collections::HashMap;
use std::fmt::Display;

use tracing::trace;

use crate::match_result::{MatchResult, PLAYERS_PER_MATCH};
use crate::stats;

/// Rating every agent starts with.
pub const INITIAL_ELO: i32 = 1500;

/// Weight of a single pairwise update.
pub const K_FACTOR: f64 = 11.0;

/// Placement buckets tracked: at 1st, at 2nd or better, at 3rd or better.
pub const PLACEMENT_BUCKETS: usize = 3;

/// Probability that a player rated `elo_a` beats one rated `elo_b`.
pub fn win_probability(elo_a: i32, elo_b: i32) -> f64 {
    1.0 / (1.0 + 10f64.powf(f64::from(elo_b - elo_a) / 400.0))
}

/// Rating changes `(winner, loser)` after `winner` finished above `loser`.
///
/// Each change is truncated toward zero.
pub fn elo_deltas(winner: i32, loser: i32) -> (i32, i32) {
    let p_winner = win_probability(winner, loser);
    let p_loser = win_probability(loser, winner);
    (
        (K_FACTOR * (1.0 - p_winner)) as i32,
        (K_FACTOR * (0.0 - p_loser)) as i32,
    )
}

/// Running statistics of one agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentStats {
    /// Score of every match played, in fold order.
    pub scores: Vec<u64>,
    /// `placements[k]`: matches finished at place `k + 1` or better.
    pub placements: [u32; PLACEMENT_BUCKETS],
    /// Matches this agent took part in that the evaluated agent won.
    pub wins_of_evaluated: u32,
    /// Current rating.
    pub elo: i32,
}

impl Default for AgentStats {
    fn default() -> Self {
        AgentStats {
            scores: vec![],
            placements: [0; PLACEMENT_BUCKETS],
            wins_of_evaluated: 0,
            elo: INITIAL_ELO,
        }
    }
}

/// Per-agent statistics accumulated over a tournament.
#[derive(Debug, Clone)]
pub struct Standings {
    evaluated: String,
    stats: HashMap<String, AgentStats>,
    matches: usize,
}

impl Standings {
    /// Empty standings for a tournament evaluating `evaluated` (a player name).
    pub fn new(evaluated: impl Into<String>) -> Standings {
        Standings {
            evaluated: evaluated.into(),
            stats: HashMap::new(),
            matches: 0,
        }
    }

    /// Player name of the evaluated agent.
    pub fn evaluated(&self) -> &str {
        &self.evaluated
    }

    /// Number of results folded so far.
    pub fn matches(&self) -> usize {
        self.matches
    }

    /// Statistics of `player`, if it played at least once.
    pub fn stats(&self, player: &str) -> Option<&AgentStats> {
        self.stats.get(player)
    }

    /// Applies one match result.
    ///
    /// An identity holding several seats (small pools) is counted once, with its best score and
    /// best placement, and is never rated against itself.
    pub fn fold(&mut self, result: &MatchResult) {
        // distinct players with best score and best rank, `ranking` is sorted by score
        let mut distinct: Vec<(&str, u64, usize)> = Vec::with_capacity(PLAYERS_PER_MATCH);
        for (rank, &seat) in result.ranking.iter().enumerate() {
            let player = result.players[seat].as_str();
            if distinct.iter().all(|(p, _, _)| *p != player) {
                distinct.push((player, result.scores[seat], rank));
            }
        }

        let evaluated_won = result.winner_name() == self.evaluated;
        for &(player, score, rank) in &distinct {
            let stats = self.stats.entry(player.to_owned()).or_default();
            stats.scores.push(score);
            if evaluated_won {
                stats.wins_of_evaluated += 1;
            }
            for bucket in rank..PLACEMENT_BUCKETS {
                stats.placements[bucket] += 1;
            }
        }

        for i in 0..PLAYERS_PER_MATCH {
            for j in i + 1..PLAYERS_PER_MATCH {
                let winner = &result.players[result.ranking[i]];
                let loser = &result.players[result.ranking[j]];
                if winner != loser {
                    self.update_elo(winner, loser);
                }
            }
        }

        self.matches += 1;
        trace!(matches = self.matches, winner = result.winner_name());
    }

    fn update_elo(&mut self, winner: &str, loser: &str) {
        let (winner_delta, loser_delta) = elo_deltas(self.stats[winner].elo, self.stats[loser].elo);
        if let Some(stats) = self.stats.get_mut(winner) {
            stats.elo += winner_delta;
        }
        if let Some(stats) = self.stats.get_mut(loser) {
            stats.elo += loser_delta;
        }
    }

    /// Final ranking, best Elo first.
    pub fn report(&self) -> TournamentReport {
        let mut entries: Vec<AgentReport> = self
            .stats
            .iter()
            .map(|(player, stats)| AgentReport::new(player, stats, player == &self.evaluated))
            .collect();
        entries.sort_by(|a, b| b.elo.cmp(&a.elo).then_with(|| a.player.cmp(&b.player)));

        TournamentReport {
            evaluated: self.evaluated.clone(),
            matches: self.matches,
            entries,
        }
    }
}

/// Summary of one agent at the end of a tournament.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentReport {
    /// Player name.
    pub player: String,
    /// Final rating.
    pub elo: i32,
    /// Matches played.
    pub games: usize,
    /// Percentage of matches finished 1st, 2nd or better, 3rd or better.
    pub placement_percentages: [f64; PLACEMENT_BUCKETS],
    /// Mean score.
    pub mean_score: f64,
    /// Population standard deviation of the scores.
    pub score_std_dev: f64,
    /// 95th percentile score.
    pub score_p95: f64,
    /// 99th percentile score.
    pub score_p99: f64,
    /// Percentage of this agent's matches won by the evaluated agent (0 for the evaluated
    /// agent itself).
    pub evaluated_win_percentage: f64,
    /// Whether this row is the evaluated agent.
    pub is_evaluated: bool,
    /// Raw score history.
    pub scores: Vec<u64>,
}

impl AgentReport {
    fn new(player: &str, stats: &AgentStats, is_evaluated: bool) -> AgentReport {
        let games = stats.scores.len();
        let data: Vec<f64> = stats.scores.iter().map(|&s| s as f64).collect();
        let percentage = |count: u32| 100.0 * f64::from(count) / games as f64;

        AgentReport {
            player: player.to_owned(),
            elo: stats.elo,
            games,
            placement_percentages: stats.placements.map(percentage),
            mean_score: stats::mean(&data),
            score_std_dev: stats::std_dev(&data),
            score_p95: stats::percentile(&data, 95.0),
            score_p99: stats::percentile(&data, 99.0),
            evaluated_win_percentage: if is_evaluated {
                0.0
            } else {
                percentage(stats.wins_of_evaluated)
            },
            is_evaluated,
            scores: stats.scores.clone(),
        }
    }
}

/// Ranked outcome of a tournament.
#[derive(Debug, Clone, PartialEq)]
pub struct TournamentReport {
    /// Player name of the evaluated agent.
    pub evaluated: String,
    /// Matches folded into the report.
    pub matches: usize,
    /// One entry per agent seen, best Elo first.
    pub entries: Vec<AgentReport>,
}

impl TournamentReport {
    /// Entry of `player`.
    pub fn entry(&self, player: &str) -> Option<&AgentReport> {
        self.entries.iter().find(|e| e.player == player)
    }

    /// 1-based rank of the evaluated agent.
    pub fn evaluated_rank(&self) -> Option<usize> {
        self.entries.iter().position(|e| e.is_evaluated).map(|i| i + 1)
    }
}

impl Display for TournamentReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "{:>3} {:<18} {:>6} {:>7} {:>7} {:>7} {:>7} {:>18} {:>9} {:>9} {:>6}",
            "#", "AI", "Elo", "1st%", "<=2nd%", "<=3rd%", "EvWin%", "Score", "95%", "99%", "Games"
        )?;
        writeln!(f, "{}", "-".repeat(107))?;
        for (i, e) in self.entries.iter().enumerate() {
            let marker = if e.is_evaluated { "*" } else { " " };
            let relative_dev = if e.mean_score == 0.0 {
                0.0
            } else {
                100.0 * e.score_std_dev / e.mean_score
            };
            let score = format!("{:.2} ± {:.2}%", e.mean_score, relative_dev);
            writeln!(
                f,
                "{:>3} {:<18} {:>6} {:>7.2} {:>7.2} {:>7.2} {:>7.2} {:>18} {:>9.2} {:>9.2} {:>6}",
                i + 1,
                format!("{marker}{}", e.player),
                e.elo,
                e.placement_percentages[0],
                e.placement_percentages[1],
                e.placement_percentages[2],
                e.evaluated_win_percentage,
                score,
                e.score_p95,
                e.score_p99,
                e.games
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(players: [&str; 4], scores: [u64; 4]) -> MatchResult {
        MatchResult::new(players.map(String::from), scores)
    }

    #[test]
    fn equal_ratings_move_apart() {
        assert!((win_probability(1500, 1500) - 0.5).abs() < 1e-9);
        let (up, down) = elo_deltas(1500, 1500);
        assert!(up > 0);
        assert!(down < 0);
        assert_eq!((up, down), (5, -5));
    }

    #[test]
    fn upsets_move_more() {
        let (favourite_up, _) = elo_deltas(1700, 1500);
        let (underdog_up, _) = elo_deltas(1500, 1700);
        assert!(underdog_up > favourite_up);
    }

    #[test]
    fn single_match_between_fresh_agents() {
        let mut standings = Standings::new("A");
        standings.fold(&result(["A", "B", "C", "D"], [1000, 10, 500, 300]));

        let stats = |p: &str| standings.stats(p).unwrap().clone();
        assert_eq!(stats("A").placements, [1, 1, 1]);
        assert_eq!(stats("C").placements, [0, 1, 1]);
        assert_eq!(stats("D").placements, [0, 0, 1]);
        assert_eq!(stats("B").placements, [0, 0, 0]);

        assert_eq!(stats("A").elo, 1515);
        assert_eq!(stats("C").elo, 1505);
        assert_eq!(stats("D").elo, 1495);
        assert_eq!(stats("B").elo, 1485);

        for p in ["A", "B", "C", "D"] {
            assert_eq!(stats(p).wins_of_evaluated, 1);
        }

        let report = standings.report();
        let order: Vec<_> = report.entries.iter().map(|e| e.player.as_str()).collect();
        assert_eq!(order, vec!["A", "C", "D", "B"]);
        assert_eq!(report.evaluated_rank(), Some(1));
        assert_eq!(report.entry("A").unwrap().evaluated_win_percentage, 0.0);
        assert_eq!(report.entry("B").unwrap().evaluated_win_percentage, 100.0);
    }

    #[test]
    fn wins_only_count_when_evaluated_agent_wins() {
        let mut standings = Standings::new("A");
        standings.fold(&result(["A", "B", "C", "D"], [10, 1000, 500, 300]));
        assert!(["A", "B", "C", "D"]
            .iter()
            .all(|p| standings.stats(p).unwrap().wins_of_evaluated == 0));
    }

    #[test]
    fn score_histories_do_not_depend_on_order() {
        let results = [
            result(["A", "B", "C", "D"], [1000, 10, 500, 300]),
            result(["B", "C", "E", "A"], [40, 900, 20, 70]),
            result(["D", "E", "A", "C"], [5, 6, 7, 8]),
        ];

        let mut forward = Standings::new("A");
        results.iter().for_each(|r| forward.fold(r));
        let mut backward = Standings::new("A");
        results.iter().rev().for_each(|r| backward.fold(r));

        for player in ["A", "B", "C", "D", "E"] {
            let mut f = forward.stats(player).unwrap().scores.clone();
            let mut b = backward.stats(player).unwrap().scores.clone();
            f.sort_unstable();
            b.sort_unstable();
            assert_eq!(f, b, "{player}");
            assert_eq!(
                forward.stats(player).unwrap().placements,
                backward.stats(player).unwrap().placements
            );
        }
        assert_eq!(forward.matches(), 3);
    }

    #[test]
    fn duplicate_seats_count_once() {
        let mut standings = Standings::new("A");
        standings.fold(&result(["A", "B", "A", "B"], [100, 300, 200, 50]));

        let a = standings.stats("A").unwrap();
        let b = standings.stats("B").unwrap();
        assert_eq!(a.scores, vec![200]);
        assert_eq!(b.scores, vec![300]);
        assert_eq!(b.placements, [1, 1, 1]);
        assert_eq!(a.placements, [0, 1, 1]);
        assert_eq!(a.elo + b.elo, 2 * INITIAL_ELO);

        let report = standings.report();
        assert!(report.entries.iter().all(|e| e.placement_percentages[2] <= 100.0));
    }

    #[test]
    fn report_statistics() {
        let mut standings = Standings::new("A");
        standings.fold(&result(["A", "B", "C", "D"], [100, 10, 50, 30]));
        standings.fold(&result(["A", "B", "C", "D"], [300, 10, 500, 30]));

        let a = standings.report().entry("A").cloned().unwrap();
        assert_eq!(a.games, 2);
        assert_eq!(a.placement_percentages, [50.0, 100.0, 100.0]);
        assert_eq!(a.mean_score, 200.0);
        assert_eq!(a.score_std_dev, 100.0);
        assert_eq!(a.score_p99, 200.0);
        assert!(a.is_evaluated);
        assert!(standings.report().to_string().contains("*A"));
    }
}
