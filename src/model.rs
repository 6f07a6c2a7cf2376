// Core records for a scoring event and the validated snapshot the ranking
// pipeline consumes.
//
// The snapshot is produced fresh on every recomputation; nothing here holds
// state across calls. Field names serialize in camelCase to match the
// broadcast wire format and the snapshot-fetch payload.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Event lifecycle
// ---------------------------------------------------------------------------

/// Lifecycle status of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    Draft,
    Upcoming,
    Active,
    Completed,
    Archived,
}

impl EventStatus {
    /// Stable text form, used for database storage and display.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventStatus::Draft => "draft",
            EventStatus::Upcoming => "upcoming",
            EventStatus::Active => "active",
            EventStatus::Completed => "completed",
            EventStatus::Archived => "archived",
        }
    }

    /// Parse the text form back. Returns `None` for unknown strings.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(EventStatus::Draft),
            "upcoming" => Some(EventStatus::Upcoming),
            "active" => Some(EventStatus::Active),
            "completed" => Some(EventStatus::Completed),
            "archived" => Some(EventStatus::Archived),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// A scoring event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: String,
    pub name: String,
    pub status: EventStatus,
    /// The round currently being played. Set once the event is active.
    pub current_round: Option<u32>,
    pub scheduled_date: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    /// Bumped on every score mutation; serves as a coarse "data changed"
    /// watermark for connected clients.
    pub updated_at: DateTime<Utc>,
}

/// A round within an event. Round numbers are 1-based and unique per event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Round {
    pub id: String,
    pub event_id: String,
    pub round_number: u32,
    pub name: Option<String>,
    pub is_bonus: bool,
    /// Advisory cap; not enforced by this layer.
    pub max_points: Option<f64>,
}

/// A team participating in an event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Team {
    pub id: String,
    pub event_id: String,
    pub name: String,
    /// First round this team is eligible to have a score for. Teams joining
    /// mid-event have no completion requirement before this round.
    pub joined_round: u32,
}

/// A recorded score for one (team, round) cell. At most one exists per cell;
/// the persistence layer enforces the uniqueness.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Score {
    pub id: String,
    pub event_id: String,
    pub team_id: String,
    pub round_number: u32,
    /// Non-negative, at most 2 fractional digits. Validated at the store
    /// boundary; assumed well-formed everywhere else.
    pub points: f64,
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// A complete, self-consistent view of one event, the sole input of the
/// ranking pipeline.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub event: Event,
    /// Sorted ascending by round number.
    pub rounds: Vec<Round>,
    /// Sorted ascending by name.
    pub teams: Vec<Team>,
    pub scores: Vec<Score>,
}

impl Snapshot {
    /// Look up a team's recorded points at a round, if any.
    pub fn points_for(&self, team_id: &str, round_number: u32) -> Option<f64> {
        self.scores
            .iter()
            .find(|s| s.team_id == team_id && s.round_number == round_number)
            .map(|s| s.points)
    }

    /// Look up a team by id.
    pub fn team(&self, team_id: &str) -> Option<&Team> {
        self.teams.iter().find(|t| t.id == team_id)
    }
}

/// Error raised when a fetched snapshot is structurally unusable.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SnapshotError {
    #[error("event data incomplete: missing {0}")]
    Incomplete(&'static str),
}

/// Raw snapshot-fetch payload. Collections are optional on the wire; a
/// missing one fails fast rather than producing a partial leaderboard.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotPayload {
    pub event: Event,
    pub rounds: Option<Vec<Round>>,
    pub teams: Option<Vec<Team>>,
    pub scores: Option<Vec<Score>>,
}

impl SnapshotPayload {
    /// Validate the payload into a [`Snapshot`], normalizing sort order.
    pub fn into_snapshot(self) -> Result<Snapshot, SnapshotError> {
        let mut rounds = self.rounds.ok_or(SnapshotError::Incomplete("rounds"))?;
        let mut teams = self.teams.ok_or(SnapshotError::Incomplete("teams"))?;
        let scores = self.scores.ok_or(SnapshotError::Incomplete("scores"))?;

        rounds.sort_by_key(|r| r.round_number);
        teams.sort_by(|a, b| a.name.cmp(&b.name));

        Ok(Snapshot {
            event: self.event,
            rounds,
            teams,
            scores,
        })
    }
}
