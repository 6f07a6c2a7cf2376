// The ranking pipeline: completion tracking, ranking, movement, highlights.
//
// `compute_leaderboard` is the single entry point. It is a pure function of
// the snapshot and is re-run in full whenever a broadcast signals that the
// underlying data changed.

pub mod completion;
pub mod highlights;
pub mod movement;
pub mod ranking;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::model::{Event, EventStatus, Snapshot};

pub use completion::{compute_completion, is_round_completed, CompletionStatus};
pub use highlights::{compute_highlights, Highlights};
pub use movement::{classify_movement, Movement};
pub use ranking::{rank_teams, RoundScore, TeamStanding};

/// Where a round sits in the event's progression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RoundStatus {
    Completed,
    Current,
    Upcoming,
}

/// Per-round digest shown alongside the standings.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundSummary {
    pub round_number: u32,
    pub name: Option<String>,
    pub is_bonus: bool,
    pub max_points: Option<f64>,
    pub status: RoundStatus,
    pub top_team_name: Option<String>,
    pub top_score: Option<f64>,
}

/// The full derived leaderboard for one snapshot.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Leaderboard {
    pub event: Event,
    pub standings: Vec<TeamStanding>,
    pub current_round: Option<u32>,
    pub total_rounds: usize,
    pub last_updated: DateTime<Utc>,
    pub last_completed_round: Option<u32>,
    pub highlights: Highlights,
    pub rounds_summary: Vec<RoundSummary>,
}

/// Run the whole pipeline against one snapshot.
pub fn compute_leaderboard(snapshot: &Snapshot) -> Leaderboard {
    let completion = compute_completion(
        &snapshot.event,
        &snapshot.rounds,
        &snapshot.teams,
        &snapshot.scores,
    );
    let last_completed = completion.last_completed_round;

    let mut standings = rank_teams(snapshot, last_completed);
    classify_movement(&mut standings, snapshot, last_completed);
    let highlights = compute_highlights(&standings, snapshot, last_completed);
    let rounds_summary = summarize_rounds(snapshot);

    Leaderboard {
        event: snapshot.event.clone(),
        standings,
        current_round: snapshot.event.current_round,
        total_rounds: snapshot.rounds.len(),
        last_updated: snapshot.event.updated_at,
        last_completed_round: last_completed,
        highlights,
        rounds_summary,
    }
}

/// Build the per-round digest: status plus the round's top score.
///
/// The active event's current round always reads `current`, and rounds an
/// admin has already advanced past count as completed even when score
/// entry never finished there.
fn summarize_rounds(snapshot: &Snapshot) -> Vec<RoundSummary> {
    let is_active = snapshot.event.status == EventStatus::Active;
    let current = snapshot.event.current_round;

    snapshot
        .rounds
        .iter()
        .map(|round| {
            let n = round.round_number;
            let status = if is_active && current == Some(n) {
                RoundStatus::Current
            } else if is_round_completed(n, &snapshot.teams, &snapshot.scores)
                || (is_active && current.is_some_and(|c| n < c))
            {
                RoundStatus::Completed
            } else {
                RoundStatus::Upcoming
            };

            // Highest score in this round; first-encountered wins ties.
            let mut top: Option<(&str, f64)> = None;
            for score in snapshot.scores.iter().filter(|s| s.round_number == n) {
                if top.is_none_or(|(_, best)| score.points > best) {
                    top = Some((score.team_id.as_str(), score.points));
                }
            }
            let (top_team_name, top_score) = match top {
                Some((team_id, points)) => (
                    snapshot.team(team_id).map(|t| t.name.clone()),
                    Some(points),
                ),
                None => (None, None),
            };

            RoundSummary {
                round_number: n,
                name: round.name.clone(),
                is_bonus: round.is_bonus,
                max_points: round.max_points,
                status,
                top_team_name,
                top_score,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Round, Score, Team};

    fn round(n: u32) -> Round {
        Round {
            id: format!("r{n}"),
            event_id: "ev-1".into(),
            round_number: n,
            name: None,
            is_bonus: false,
            max_points: None,
        }
    }

    fn team(id: &str, name: &str, joined_round: u32) -> Team {
        Team {
            id: id.into(),
            event_id: "ev-1".into(),
            name: name.into(),
            joined_round,
        }
    }

    fn score(team_id: &str, round_number: u32, points: f64) -> Score {
        Score {
            id: format!("score_{team_id}_{round_number}"),
            event_id: "ev-1".into(),
            team_id: team_id.into(),
            round_number,
            points,
        }
    }

    fn snapshot(status: EventStatus, current_round: Option<u32>) -> Snapshot {
        Snapshot {
            event: Event {
                id: "ev-1".into(),
                name: "Trivia Finals".into(),
                status,
                current_round,
                scheduled_date: None,
                started_at: None,
                ended_at: None,
                updated_at: Utc::now(),
            },
            rounds: vec![round(1), round(2), round(3)],
            teams: vec![
                team("a", "Alpha", 1),
                team("b", "Beta", 1),
                team("g", "Gamma", 2),
            ],
            scores: vec![
                score("a", 1, 10.0),
                score("b", 1, 8.0),
                score("a", 2, 5.0),
                score("b", 2, 9.0),
                score("g", 2, 7.0),
            ],
        }
    }

    #[test]
    fn pipeline_end_to_end() {
        let snap = snapshot(EventStatus::Active, Some(3));
        let board = compute_leaderboard(&snap);

        assert_eq!(board.last_completed_round, Some(2));
        assert_eq!(board.total_rounds, 3);

        let names: Vec<&str> = board
            .standings
            .iter()
            .map(|s| s.team.name.as_str())
            .collect();
        assert_eq!(names, vec!["Beta", "Alpha", "Gamma"]);
        let ranks: Vec<u32> = board.standings.iter().map(|s| s.rank).collect();
        assert_eq!(ranks, vec![1, 2, 3]);

        // Gamma joined at round 2 and only round 2 counts toward its average.
        let gamma = &board.standings[2];
        assert!((gamma.average_score - 7.0).abs() < 1e-9);
        // Already ranked at the comparison round (end of round 2), so not new.
        assert_eq!(gamma.movement, Movement::Same);
    }

    #[test]
    fn round_statuses_for_active_event() {
        let snap = snapshot(EventStatus::Active, Some(3));
        let board = compute_leaderboard(&snap);

        let statuses: Vec<RoundStatus> =
            board.rounds_summary.iter().map(|r| r.status).collect();
        assert_eq!(
            statuses,
            vec![RoundStatus::Completed, RoundStatus::Completed, RoundStatus::Current]
        );
    }

    #[test]
    fn round_summary_top_scores() {
        let snap = snapshot(EventStatus::Active, Some(3));
        let board = compute_leaderboard(&snap);

        assert_eq!(board.rounds_summary[0].top_team_name.as_deref(), Some("Alpha"));
        assert_eq!(board.rounds_summary[0].top_score, Some(10.0));
        assert_eq!(board.rounds_summary[1].top_team_name.as_deref(), Some("Beta"));
        assert!(board.rounds_summary[2].top_score.is_none());
    }

    #[test]
    fn completed_event_rounds_without_scores_are_upcoming() {
        let snap = snapshot(EventStatus::Completed, Some(3));
        let board = compute_leaderboard(&snap);

        let statuses: Vec<RoundStatus> =
            board.rounds_summary.iter().map(|r| r.status).collect();
        // Round 3 never got scores; a completed event has no current round.
        assert_eq!(
            statuses,
            vec![
                RoundStatus::Completed,
                RoundStatus::Completed,
                RoundStatus::Upcoming
            ]
        );
    }
}
