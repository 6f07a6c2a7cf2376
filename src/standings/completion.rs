// Round completion tracking.
//
// A round counts as completed only when every team eligible for it has a
// recorded score. Eligibility is join-aware: a team that joined at round 3
// places no completion requirement on rounds 1-2.

use crate::model::{Event, EventStatus, Round, Score, Team};

/// Completion state for an event's rounds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionStatus {
    /// Round numbers with full score coverage for their eligible teams,
    /// ascending.
    pub completed_rounds: Vec<u32>,
    /// The round momentum comparisons measure against. Never a round
    /// without full coverage.
    pub last_completed_round: Option<u32>,
}

/// True iff every team eligible for `round_number` has a score there.
///
/// A round with no eligible teams is never completed; this keeps an empty
/// event (or a round predating every join) from reading as finished.
pub fn is_round_completed(round_number: u32, teams: &[Team], scores: &[Score]) -> bool {
    let mut any_eligible = false;
    for team in teams.iter().filter(|t| t.joined_round <= round_number) {
        any_eligible = true;
        let has_score = scores
            .iter()
            .any(|s| s.team_id == team.id && s.round_number == round_number);
        if !has_score {
            return false;
        }
    }
    any_eligible
}

/// Compute the completed-round set and the last completed round.
///
/// While the event is active, "last completed" means the round just
/// finished: the candidate is `current_round - 1`, falling back to the
/// greatest completed round below it when an admin advanced rounds before
/// entry caught up (or scores arrived out of order). For every other
/// status the answer is simply the greatest completed round.
pub fn compute_completion(
    event: &Event,
    rounds: &[Round],
    teams: &[Team],
    scores: &[Score],
) -> CompletionStatus {
    let completed_rounds: Vec<u32> = rounds
        .iter()
        .map(|r| r.round_number)
        .filter(|&n| is_round_completed(n, teams, scores))
        .collect();

    let last_completed_round = match event.status {
        EventStatus::Active => {
            let current = event.current_round.unwrap_or(1);
            if current <= 1 {
                None
            } else {
                let candidate = current - 1;
                if completed_rounds.contains(&candidate) {
                    Some(candidate)
                } else {
                    completed_rounds
                        .iter()
                        .rev()
                        .find(|&&n| n < candidate)
                        .copied()
                }
            }
        }
        _ => completed_rounds.last().copied(),
    };

    CompletionStatus {
        completed_rounds,
        last_completed_round,
    }
}
