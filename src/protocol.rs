// Broadcast wire format and the app-internal command/update vocabulary.
//
// Every score mutation is announced on a per-event channel; a second,
// global channel carries event lifecycle notices used only to refresh
// dashboard listings. Wire field names are camelCase; message kinds are an
// internally tagged ("type"/"data") enum.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::live::conflict::{Conflict, ConflictResolution};
use crate::standings::Leaderboard;

use crate::model::EventStatus;

/// Channel carrying event lifecycle notices for the dashboard listing.
pub const GLOBAL_CHANNEL: &str = "global";

/// The per-event channel name.
pub fn event_channel(event_id: &str) -> String {
    format!("event:{event_id}")
}

// ---------------------------------------------------------------------------
// Broadcast payloads
// ---------------------------------------------------------------------------

/// A score was created or changed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreUpdatedPayload {
    pub team_id: String,
    pub team_name: String,
    pub round_number: u32,
    pub points: f64,
    /// Absent (not null) when the update created the score.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_points: Option<f64>,
    pub changed_by: String,
    pub changed_by_name: String,
    pub timestamp: DateTime<Utc>,
}

/// A score was deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreDeletedPayload {
    pub team_id: String,
    pub team_name: String,
    pub round_number: u32,
    pub changed_by: String,
    pub changed_by_name: String,
    pub timestamp: DateTime<Utc>,
}

/// The event advanced to another round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundChangedPayload {
    pub new_round: u32,
    pub total_rounds: u32,
    pub changed_by: String,
    pub changed_by_name: String,
    pub timestamp: DateTime<Utc>,
}

/// A team joined the event (possibly mid-event).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamAddedPayload {
    pub team_id: String,
    pub team_name: String,
    pub joined_round: u32,
    pub timestamp: DateTime<Utc>,
}

/// A team was removed from the event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamRemovedPayload {
    pub team_id: String,
    pub team_name: String,
    pub timestamp: DateTime<Utc>,
}

/// The event's lifecycle status changed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventStatusPayload {
    pub status: EventStatus,
    pub timestamp: DateTime<Utc>,
}

/// What happened to an event, as announced on the global channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleAction {
    Created,
    Started,
    Ended,
    Reopened,
    Archived,
    Deleted,
    Reset,
}

/// Global-channel notice. Consumed only as a "refresh the events list"
/// hint, never by the ranking or conflict core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LifecycleNotice {
    pub action: LifecycleAction,
    pub event_id: String,
    pub event_name: String,
    pub changed_by: String,
    pub changed_by_name: String,
    pub timestamp: DateTime<Utc>,
}

/// A typed broadcast message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum BroadcastMessage {
    #[serde(rename = "score:updated")]
    ScoreUpdated(ScoreUpdatedPayload),
    #[serde(rename = "score:deleted")]
    ScoreDeleted(ScoreDeletedPayload),
    #[serde(rename = "round:changed")]
    RoundChanged(RoundChangedPayload),
    #[serde(rename = "team:added")]
    TeamAdded(TeamAddedPayload),
    #[serde(rename = "team:removed")]
    TeamRemoved(TeamRemovedPayload),
    #[serde(rename = "event:status")]
    EventStatusChanged(EventStatusPayload),
    #[serde(rename = "event:lifecycle")]
    Lifecycle(LifecycleNotice),
}

/// One inbound frame: a message plus the channel it arrived on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub channel: String,
    #[serde(flatten)]
    pub message: BroadcastMessage,
}

/// Outbound frames from client to relay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum ClientFrame {
    Subscribe {
        channel: String,
    },
    Publish {
        channel: String,
        #[serde(flatten)]
        message: BroadcastMessage,
    },
}

// ---------------------------------------------------------------------------
// App-internal vocabulary
// ---------------------------------------------------------------------------

/// State of the broadcast connection, for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Connecting,
    Connected,
    Disconnected,
}

/// Commands issued by the local operator.
#[derive(Debug, Clone, PartialEq)]
pub enum OperatorCommand {
    /// Start editing a score cell.
    BeginEdit { team_id: String, round_number: u32 },
    /// Replace the pending (unsaved) value of a cell under edit.
    EditValue {
        team_id: String,
        round_number: u32,
        value: String,
    },
    /// Save the pending value of a cell under edit.
    Save { team_id: String, round_number: u32 },
    /// Abandon an edit with no network effect.
    CancelEdit { team_id: String, round_number: u32 },
    /// Settle a conflicted cell.
    Resolve {
        team_id: String,
        round_number: u32,
        resolution: ConflictResolution,
    },
    /// Re-render the current leaderboard.
    ShowBoard,
    Quit,
}

/// Updates pushed to the presenter.
#[derive(Debug, Clone)]
pub enum UiUpdate {
    Leaderboard(Box<Leaderboard>),
    Connection(ConnectionStatus),
    /// A remote edit collided with a local one; the operator must choose.
    ConflictRaised(Conflict),
    /// A peer changed an idle cell; flash it briefly.
    CellHighlighted { team_id: String, round_number: u32 },
    /// Human-readable notice (peer activity, save confirmations, errors).
    Notice(String),
    /// Something on the global channel changed the events list.
    EventsListStale,
}
