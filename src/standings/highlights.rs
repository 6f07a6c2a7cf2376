// Narrative signals derived from the ranking: who leads and by how much,
// who is surging, where the closest race is, and the single biggest round
// score of the event.

use serde::Serialize;

use crate::model::{Snapshot, Team};

use super::ranking::TeamStanding;

/// The rank-1 team and its cushion over second place.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderHighlight {
    pub team: Team,
    pub total: f64,
    /// `None` when fewer than two teams exist.
    pub lead_over_next: Option<f64>,
}

/// The team with the largest strictly positive recent delta.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SurgingHighlight {
    pub team: Team,
    pub delta: f64,
    pub round_number: u32,
}

/// The adjacent pair with the smallest strictly positive margin.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TightRace {
    pub margin: f64,
    pub leading: Team,
    pub trailing: Team,
}

/// The single highest recorded score across the whole event.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundHero {
    pub team: Team,
    pub points: f64,
    pub round_number: u32,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Highlights {
    pub leader: Option<LeaderHighlight>,
    pub surging: Option<SurgingHighlight>,
    pub tight_race: Option<TightRace>,
    pub round_hero: Option<RoundHero>,
}

/// Derive all highlight signals from ranked standings.
///
/// `standings` must already be in rank order.
pub fn compute_highlights(
    standings: &[TeamStanding],
    snapshot: &Snapshot,
    last_completed_round: Option<u32>,
) -> Highlights {
    let leader = standings.first().map(|first| LeaderHighlight {
        team: first.team.clone(),
        total: first.total_score,
        lead_over_next: standings.get(1).map(|second| first.total_score - second.total_score),
    });

    // Largest strictly positive delta; first in rank order wins ties.
    let surging = last_completed_round.and_then(|round_number| {
        standings
            .iter()
            .filter(|s| s.recent_delta > 0.0)
            .fold(None::<&TeamStanding>, |best, candidate| match best {
                Some(current) if candidate.recent_delta <= current.recent_delta => Some(current),
                _ => Some(candidate),
            })
            .map(|s| SurgingHighlight {
                team: s.team.clone(),
                delta: s.recent_delta,
                round_number,
            })
    });

    // Scan adjacent pairs for the smallest strictly positive margin.
    // Zero margins are skipped: a dead heat is not a race to call.
    let mut tight_race: Option<TightRace> = None;
    for pair in standings.windows(2) {
        let margin = pair[0].total_score - pair[1].total_score;
        if margin <= 0.0 {
            continue;
        }
        if tight_race.as_ref().is_none_or(|t| margin < t.margin) {
            tight_race = Some(TightRace {
                margin,
                leading: pair[0].team.clone(),
                trailing: pair[1].team.clone(),
            });
        }
    }

    // Highest single score anywhere; first-encountered wins ties, so only a
    // strictly greater score displaces the incumbent.
    let mut round_hero: Option<RoundHero> = None;
    for score in &snapshot.scores {
        if round_hero.as_ref().is_some_and(|h| score.points <= h.points) {
            continue;
        }
        if let Some(team) = snapshot.team(&score.team_id) {
            round_hero = Some(RoundHero {
                team: team.clone(),
                points: score.points,
                round_number: score.round_number,
            });
        }
    }

    Highlights {
        leader,
        surging,
        tight_race,
        round_hero,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Event, EventStatus, Round, Score};
    use crate::standings::ranking::rank_teams;
    use chrono::Utc;

    fn approx_eq(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

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

    fn team(id: &str, name: &str) -> Team {
        Team {
            id: id.into(),
            event_id: "ev-1".into(),
            name: name.into(),
            joined_round: 1,
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

    fn snapshot(rounds: Vec<Round>, teams: Vec<Team>, scores: Vec<Score>) -> Snapshot {
        Snapshot {
            event: Event {
                id: "ev-1".into(),
                name: "Test".into(),
                status: EventStatus::Active,
                current_round: Some(2),
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
    fn leader_and_margin() {
        let snap = snapshot(
            vec![round(1)],
            vec![team("a", "Alpha"), team("b", "Beta")],
            vec![score("a", 1, 12.0), score("b", 1, 9.0)],
        );
        let standings = rank_teams(&snap, Some(1));
        let highlights = compute_highlights(&standings, &snap, Some(1));

        let leader = highlights.leader.unwrap();
        assert_eq!(leader.team.name, "Alpha");
        assert!(approx_eq(leader.total, 12.0));
        assert!(approx_eq(leader.lead_over_next.unwrap(), 3.0));
    }

    #[test]
    fn single_team_has_no_lead_over_next() {
        let snap = snapshot(vec![round(1)], vec![team("a", "Alpha")], vec![]);
        let standings = rank_teams(&snap, None);
        let highlights = compute_highlights(&standings, &snap, None);

        assert!(highlights.leader.unwrap().lead_over_next.is_none());
    }

    #[test]
    fn no_teams_no_leader() {
        let snap = snapshot(vec![round(1)], vec![], vec![]);
        let highlights = compute_highlights(&[], &snap, None);
        assert!(highlights.leader.is_none());
    }

    #[test]
    fn surging_picks_largest_positive_delta() {
        let snap = snapshot(
            vec![round(1), round(2)],
            vec![team("a", "Alpha"), team("b", "Beta"), team("c", "Comet")],
            vec![
                score("a", 1, 5.0),
                score("a", 2, 6.0), // delta +1
                score("b", 1, 5.0),
                score("b", 2, 9.0), // delta +4
                score("c", 1, 9.0),
                score("c", 2, 2.0), // delta -7
            ],
        );
        let standings = rank_teams(&snap, Some(2));
        let highlights = compute_highlights(&standings, &snap, Some(2));

        let surging = highlights.surging.unwrap();
        assert_eq!(surging.team.name, "Beta");
        assert!(approx_eq(surging.delta, 4.0));
        assert_eq!(surging.round_number, 2);
    }

    #[test]
    fn surging_none_when_no_positive_delta() {
        let snap = snapshot(
            vec![round(1), round(2)],
            vec![team("a", "Alpha")],
            vec![score("a", 1, 9.0), score("a", 2, 3.0)],
        );
        let standings = rank_teams(&snap, Some(2));
        let highlights = compute_highlights(&standings, &snap, Some(2));
        assert!(highlights.surging.is_none());
    }

    #[test]
    fn surging_none_without_completed_round() {
        let snap = snapshot(
            vec![round(1)],
            vec![team("a", "Alpha")],
            vec![score("a", 1, 9.0)],
        );
        let standings = rank_teams(&snap, None);
        let highlights = compute_highlights(&standings, &snap, None);
        assert!(highlights.surging.is_none());
    }

    #[test]
    fn tight_race_smallest_positive_margin() {
        let snap = snapshot(
            vec![round(1)],
            vec![team("a", "Alpha"), team("b", "Beta"), team("c", "Comet")],
            vec![
                score("a", 1, 20.0),
                score("b", 1, 19.5),
                score("c", 1, 10.0),
            ],
        );
        let standings = rank_teams(&snap, Some(1));
        let highlights = compute_highlights(&standings, &snap, Some(1));

        let race = highlights.tight_race.unwrap();
        assert!(approx_eq(race.margin, 0.5));
        assert_eq!(race.leading.name, "Alpha");
        assert_eq!(race.trailing.name, "Beta");
    }

    #[test]
    fn tight_race_skips_zero_margins() {
        let snap = snapshot(
            vec![round(1)],
            vec![team("a", "Alpha"), team("b", "Beta"), team("c", "Comet")],
            vec![
                score("a", 1, 20.0),
                score("b", 1, 20.0),
                score("c", 1, 12.0),
            ],
        );
        let standings = rank_teams(&snap, Some(1));
        let highlights = compute_highlights(&standings, &snap, Some(1));

        // Alpha/Beta tie exactly; the only positive margin is Beta->Comet.
        let race = highlights.tight_race.unwrap();
        assert!(approx_eq(race.margin, 8.0));
        assert_eq!(race.trailing.name, "Comet");
    }

    #[test]
    fn tight_race_none_with_fewer_than_two_teams() {
        let snap = snapshot(
            vec![round(1)],
            vec![team("a", "Alpha")],
            vec![score("a", 1, 20.0)],
        );
        let standings = rank_teams(&snap, Some(1));
        let highlights = compute_highlights(&standings, &snap, Some(1));
        assert!(highlights.tight_race.is_none());
    }

    #[test]
    fn round_hero_first_encountered_wins_ties() {
        let snap = snapshot(
            vec![round(1), round(2)],
            vec![team("a", "Alpha"), team("b", "Beta")],
            vec![
                score("a", 1, 15.0),
                score("b", 2, 15.0), // equal, but Alpha was seen first
                score("b", 1, 3.0),
            ],
        );
        let standings = rank_teams(&snap, Some(2));
        let highlights = compute_highlights(&standings, &snap, Some(2));

        let hero = highlights.round_hero.unwrap();
        assert_eq!(hero.team.name, "Alpha");
        assert_eq!(hero.round_number, 1);
        assert!(approx_eq(hero.points, 15.0));
    }

    #[test]
    fn round_hero_none_without_scores() {
        let snap = snapshot(vec![round(1)], vec![team("a", "Alpha")], vec![]);
        let standings = rank_teams(&snap, None);
        let highlights = compute_highlights(&standings, &snap, None);
        assert!(highlights.round_hero.is_none());
    }
}
