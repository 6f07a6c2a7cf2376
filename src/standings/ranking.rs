// Ranking engine: snapshot -> ordered team standings.
//
// Pure computation. Absent scores are not an error; they contribute zero
// points to the total and the per-round breakdown.

use std::cmp::Ordering;

use serde::Serialize;

use crate::model::{Snapshot, Team};

use super::movement::Movement;

/// One cell of a team's per-round breakdown. Every defined round appears,
/// scored or not.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundScore {
    pub round_number: u32,
    pub points: f64,
}

/// A team's position and statistics on the leaderboard.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamStanding {
    pub team: Team,
    /// 1-based. Never shared: equal totals are split by team name.
    pub rank: u32,
    pub total_score: f64,
    pub round_scores: Vec<RoundScore>,
    /// Points at the last completed round (0 when none exists).
    pub last_round_points: f64,
    /// `last_round_points` minus the round before it; 0 when there is no
    /// last completed round.
    pub recent_delta: f64,
    /// Mean over rounds the team was both eligible for and that are
    /// completed; 0 when no such round exists. A team joining at round 3
    /// is not penalized for "missing" rounds 1-2.
    pub average_score: f64,
    pub movement: Movement,
}

/// Total order used everywhere ranks are assigned: total descending, then
/// team name ascending. No two teams ever tie in sort position.
pub(crate) fn rank_order(a_total: f64, a_name: &str, b_total: f64, b_name: &str) -> Ordering {
    b_total
        .partial_cmp(&a_total)
        .unwrap_or(Ordering::Equal)
        .then_with(|| a_name.cmp(b_name))
}

/// Compute ordered standings for every team in the snapshot.
///
/// `last_completed_round` comes from the completion tracker; it drives
/// `last_round_points`, `recent_delta`, and the average denominator.
/// Movement starts out [`Movement::Same`]; the movement classifier
/// overwrites it.
pub fn rank_teams(snapshot: &Snapshot, last_completed_round: Option<u32>) -> Vec<TeamStanding> {
    let mut standings: Vec<TeamStanding> = snapshot
        .teams
        .iter()
        .map(|team| {
            let round_scores: Vec<RoundScore> = snapshot
                .rounds
                .iter()
                .map(|round| RoundScore {
                    round_number: round.round_number,
                    points: snapshot.points_for(&team.id, round.round_number).unwrap_or(0.0),
                })
                .collect();

            let total_score: f64 = round_scores.iter().map(|rs| rs.points).sum();

            let points_at = |n: u32| {
                round_scores
                    .iter()
                    .find(|rs| rs.round_number == n)
                    .map(|rs| rs.points)
                    .unwrap_or(0.0)
            };

            let last_round_points = last_completed_round.map(points_at).unwrap_or(0.0);
            let previous_round_points = match last_completed_round {
                Some(last) if last > 1 => points_at(last - 1),
                _ => 0.0,
            };
            let recent_delta = if last_completed_round.is_some() {
                last_round_points - previous_round_points
            } else {
                0.0
            };

            let average_score = match last_completed_round {
                Some(last) => {
                    let counted: Vec<f64> = round_scores
                        .iter()
                        .filter(|rs| {
                            rs.round_number <= last && rs.round_number >= team.joined_round
                        })
                        .map(|rs| rs.points)
                        .collect();
                    if counted.is_empty() {
                        0.0
                    } else {
                        counted.iter().sum::<f64>() / counted.len() as f64
                    }
                }
                None => 0.0,
            };

            TeamStanding {
                team: team.clone(),
                rank: 0,
                total_score,
                round_scores,
                last_round_points,
                recent_delta,
                average_score,
                movement: Movement::Same,
            }
        })
        .collect();

    standings.sort_by(|a, b| rank_order(a.total_score, &a.team.name, b.total_score, &b.team.name));
    for (index, standing) in standings.iter_mut().enumerate() {
        standing.rank = (index + 1) as u32;
    }

    standings
}
