// Movement classification: where each team's rank sits relative to a
// reconstructed earlier ranking.
//
// The comparison is recomputed from the snapshot rather than read from any
// locally remembered prior render, so every client classifies movement
// identically.

use std::collections::HashMap;

use serde::Serialize;

use crate::model::{EventStatus, Snapshot};

use super::ranking::{rank_order, TeamStanding};

/// Direction of a team's rank change since the comparison round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Movement {
    Up,
    Down,
    Same,
    New,
}

/// The round to reconstruct the earlier ranking at, if one exists.
///
/// Active events compare against the end of the last completed round
/// ("where did ranks stand one round ago"). Completed (and archived)
/// events step one further back so the final round still shows movement.
/// Draft and upcoming events have nothing to compare.
pub fn comparison_round(status: EventStatus, last_completed_round: Option<u32>) -> Option<u32> {
    let last = last_completed_round?;
    match status {
        EventStatus::Active => Some(last),
        EventStatus::Completed | EventStatus::Archived => {
            if last > 1 {
                Some(last - 1)
            } else {
                None
            }
        }
        EventStatus::Draft | EventStatus::Upcoming => None,
    }
}

/// Tag every standing with its movement relative to the comparison round.
///
/// Teams absent from the comparison ranking (joined after the comparison
/// round) are `New`. With no comparison round at all, everything is `Same`.
pub fn classify_movement(
    standings: &mut [TeamStanding],
    snapshot: &Snapshot,
    last_completed_round: Option<u32>,
) {
    let Some(comparison) = comparison_round(snapshot.event.status, last_completed_round) else {
        for standing in standings.iter_mut() {
            standing.movement = Movement::Same;
        }
        return;
    };

    let earlier = ranks_at(snapshot, comparison);

    for standing in standings.iter_mut() {
        standing.movement = match earlier.get(standing.team.id.as_str()) {
            None => Movement::New,
            Some(&prior_rank) => {
                // Numerically lower rank is better.
                if standing.rank < prior_rank {
                    Movement::Up
                } else if standing.rank > prior_rank {
                    Movement::Down
                } else {
                    Movement::Same
                }
            }
        };
    }
}

/// Reconstruct ranks as they stood after `cutoff_round`: cumulative totals
/// over scores at or before the cutoff, restricted to teams already
/// eligible by then, ordered by the same (total desc, name asc) rule.
fn ranks_at(snapshot: &Snapshot, cutoff_round: u32) -> HashMap<&str, u32> {
    let mut totals: Vec<(&str, &str, f64)> = snapshot
        .teams
        .iter()
        .filter(|t| t.joined_round <= cutoff_round)
        .map(|team| {
            let total: f64 = snapshot
                .scores
                .iter()
                .filter(|s| s.team_id == team.id && s.round_number <= cutoff_round)
                .map(|s| s.points)
                .sum();
            (team.id.as_str(), team.name.as_str(), total)
        })
        .collect();

    totals.sort_by(|a, b| rank_order(a.2, a.1, b.2, b.1));

    totals
        .into_iter()
        .enumerate()
        .map(|(index, (id, _, _))| (id, (index + 1) as u32))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Event, Round, Score, Team};
    use crate::standings::ranking::rank_teams;
    use chrono::Utc;

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

    fn snapshot(
        status: EventStatus,
        current_round: Option<u32>,
        rounds: Vec<Round>,
        teams: Vec<Team>,
        scores: Vec<Score>,
    ) -> Snapshot {
        Snapshot {
            event: Event {
                id: "ev-1".into(),
                name: "Test".into(),
                status,
                current_round,
                scheduled_date: None,
                started_at: None,
                ended_at: None,
                updated_at: Utc::now(),
            },
            rounds,
            teams,
            scores,
        }
    }

    #[test]
    fn comparison_round_by_status() {
        assert_eq!(comparison_round(EventStatus::Active, Some(3)), Some(3));
        assert_eq!(comparison_round(EventStatus::Completed, Some(3)), Some(2));
        assert_eq!(comparison_round(EventStatus::Archived, Some(3)), Some(2));
        assert_eq!(comparison_round(EventStatus::Completed, Some(1)), None);
        assert_eq!(comparison_round(EventStatus::Active, None), None);
        assert_eq!(comparison_round(EventStatus::Upcoming, Some(2)), None);
    }

    #[test]
    fn overtake_marks_up_and_down() {
        // After round 1: Alpha 10, Beta 8. Beta's round-2 surge flips them,
        // and the active-event comparison is the end of round 1.
        let snap = snapshot(
            EventStatus::Active,
            Some(2),
            vec![round(1), round(2)],
            vec![team("a", "Alpha", 1), team("b", "Beta", 1)],
            vec![
                score("a", 1, 10.0),
                score("b", 1, 8.0),
                score("b", 2, 9.0),
            ],
        );
        let mut standings = rank_teams(&snap, Some(1));
        classify_movement(&mut standings, &snap, Some(1));

        let beta = standings.iter().find(|s| s.team.name == "Beta").unwrap();
        let alpha = standings.iter().find(|s| s.team.name == "Alpha").unwrap();
        assert_eq!(beta.rank, 1);
        assert_eq!(beta.movement, Movement::Up);
        assert_eq!(alpha.rank, 2);
        assert_eq!(alpha.movement, Movement::Down);
    }

    #[test]
    fn late_joiner_is_new() {
        let snap = snapshot(
            EventStatus::Active,
            Some(2),
            vec![round(1), round(2)],
            vec![team("a", "Alpha", 1), team("g", "Gamma", 2)],
            vec![score("a", 1, 10.0), score("g", 2, 7.0)],
        );
        let mut standings = rank_teams(&snap, Some(1));
        classify_movement(&mut standings, &snap, Some(1));

        let gamma = standings.iter().find(|s| s.team.name == "Gamma").unwrap();
        assert_eq!(gamma.movement, Movement::New);
    }

    #[test]
    fn no_comparison_round_means_all_same() {
        let snap = snapshot(
            EventStatus::Active,
            Some(1),
            vec![round(1)],
            vec![team("a", "Alpha", 1), team("b", "Beta", 1)],
            vec![score("a", 1, 3.0)],
        );
        let mut standings = rank_teams(&snap, None);
        classify_movement(&mut standings, &snap, None);

        assert!(standings.iter().all(|s| s.movement == Movement::Same));
    }

    #[test]
    fn unchanged_rank_is_same() {
        let snap = snapshot(
            EventStatus::Active,
            Some(2),
            vec![round(1), round(2)],
            vec![team("a", "Alpha", 1), team("b", "Beta", 1)],
            vec![
                score("a", 1, 10.0),
                score("b", 1, 8.0),
                score("a", 2, 5.0),
                score("b", 2, 5.0),
            ],
        );
        let mut standings = rank_teams(&snap, Some(1));
        classify_movement(&mut standings, &snap, Some(1));

        assert!(standings.iter().all(|s| s.movement == Movement::Same));
    }

    #[test]
    fn completed_event_compares_one_round_earlier() {
        // Final standings after round 2; comparison is end of round 1.
        let snap = snapshot(
            EventStatus::Completed,
            Some(2),
            vec![round(1), round(2)],
            vec![team("a", "Alpha", 1), team("b", "Beta", 1)],
            vec![
                score("a", 1, 10.0),
                score("b", 1, 8.0),
                score("a", 2, 0.0),
                score("b", 2, 9.0),
            ],
        );
        let mut standings = rank_teams(&snap, Some(2));
        classify_movement(&mut standings, &snap, Some(2));

        let beta = standings.iter().find(|s| s.team.name == "Beta").unwrap();
        assert_eq!(beta.movement, Movement::Up);
    }
}
