// Concurrent-edit conflict coordination.
//
// Each score cell (team + round) is idle, editing, or conflicted. Remote
// changes to a cell under local edit raise a conflict the operator must
// settle explicitly; remote changes to idle cells get a short visual
// highlight. The protocol is advisory: the persistence layer's
// last-write-wins is the final arbiter, and the coordinator only surfaces
// what it has observed.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::protocol::{ScoreDeletedPayload, ScoreUpdatedPayload};

/// How long a remote-change highlight stays visible.
pub const HIGHLIGHT_DURATION: Duration = Duration::from_millis(2500);

/// Identifies one score cell.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CellKey {
    pub team_id: String,
    pub round_number: u32,
}

impl CellKey {
    pub fn new(team_id: impl Into<String>, round_number: u32) -> Self {
        CellKey {
            team_id: team_id.into(),
            round_number,
        }
    }
}

/// A remote change that landed on a cell the operator was editing.
#[derive(Debug, Clone, PartialEq)]
pub struct Conflict {
    pub team_id: String,
    pub team_name: String,
    pub round_number: u32,
    /// The operator's in-progress value, preserved verbatim.
    pub local_value: String,
    /// The remote value; `None` when the remote operator deleted the score.
    pub remote_points: Option<f64>,
    pub changed_by: String,
    pub changed_by_name: String,
}

/// The operator's choice for a conflicted cell. Both choices are always
/// valid; there is no error path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictResolution {
    /// Discard the local edit and adopt the remote value.
    AcceptRemote,
    /// Proceed to save the local value over the remote one.
    Override,
}

/// What the app should do after a conflict is resolved.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedEdit {
    /// Nothing to write; the remote value (or deletion) stands.
    AdoptRemote { points: Option<f64> },
    /// Save this value; the resulting broadcast may conflict a third
    /// concurrently-editing operator in turn.
    SaveLocal { value: String },
}

/// Outcome of observing one remote change.
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteOutcome {
    /// The change was the local operator's own write echoing back.
    Ignored,
    /// An idle cell changed; highlight it briefly.
    Highlighted(CellKey),
    /// A cell under local edit changed; the operator must choose.
    Conflicted(Conflict),
}

#[derive(Debug, Clone, PartialEq)]
enum CellState {
    Editing { pending: String },
    Conflicted(Conflict),
}

/// Per-client edit-lock set and conflict/highlight tracker.
///
/// Purely local UI state: entries appear when the operator starts editing
/// and disappear on save, cancel, or resolution. Time is injected so the
/// machine can be driven in tests without sleeping.
#[derive(Debug)]
pub struct ConflictCoordinator {
    operator_id: String,
    cells: HashMap<CellKey, CellState>,
    /// Highlight expiry deadlines for recently-changed idle cells.
    highlights: HashMap<CellKey, Instant>,
}

impl ConflictCoordinator {
    pub fn new(operator_id: impl Into<String>) -> Self {
        ConflictCoordinator {
            operator_id: operator_id.into(),
            cells: HashMap::new(),
            highlights: HashMap::new(),
        }
    }

    // ------------------------------------------------------------------
    // Local edit lifecycle
    // ------------------------------------------------------------------

    /// Begin editing a cell with an initial value (the currently saved
    /// score, or empty). Returns `false` if the cell is conflicted; the
    /// conflict must be resolved first.
    pub fn begin_edit(&mut self, team_id: &str, round_number: u32, initial: &str) -> bool {
        let key = CellKey::new(team_id, round_number);
        if matches!(self.cells.get(&key), Some(CellState::Conflicted(_))) {
            return false;
        }
        self.cells.insert(
            key,
            CellState::Editing {
                pending: initial.to_string(),
            },
        );
        true
    }

    /// Replace the pending value of a cell under edit. Returns `false` if
    /// the cell is not being edited.
    pub fn set_pending(&mut self, team_id: &str, round_number: u32, value: &str) -> bool {
        let key = CellKey::new(team_id, round_number);
        match self.cells.get_mut(&key) {
            Some(CellState::Editing { pending }) => {
                *pending = value.to_string();
                true
            }
            _ => false,
        }
    }

    /// The pending value of a cell under edit, if any.
    pub fn pending_value(&self, team_id: &str, round_number: u32) -> Option<&str> {
        match self.cells.get(&CellKey::new(team_id, round_number)) {
            Some(CellState::Editing { pending }) => Some(pending),
            _ => None,
        }
    }

    pub fn is_editing(&self, team_id: &str, round_number: u32) -> bool {
        matches!(
            self.cells.get(&CellKey::new(team_id, round_number)),
            Some(CellState::Editing { .. })
        )
    }

    /// Abandon an edit; the cell returns to idle with no network effect.
    pub fn cancel_edit(&mut self, team_id: &str, round_number: u32) {
        let key = CellKey::new(team_id, round_number);
        if matches!(self.cells.get(&key), Some(CellState::Editing { .. })) {
            self.cells.remove(&key);
        }
    }

    /// A save of this cell completed successfully; release the edit lock.
    pub fn edit_saved(&mut self, team_id: &str, round_number: u32) {
        let key = CellKey::new(team_id, round_number);
        if matches!(self.cells.get(&key), Some(CellState::Editing { .. })) {
            self.cells.remove(&key);
        }
    }

    // ------------------------------------------------------------------
    // Remote observations
    // ------------------------------------------------------------------

    /// Observe a remote score update from the broadcast channel.
    pub fn observe_update(
        &mut self,
        payload: &ScoreUpdatedPayload,
        now: Instant,
    ) -> RemoteOutcome {
        self.observe_change(
            CellKey::new(payload.team_id.as_str(), payload.round_number),
            &payload.team_name,
            Some(payload.points),
            &payload.changed_by,
            &payload.changed_by_name,
            now,
        )
    }

    /// Observe a remote score deletion from the broadcast channel.
    pub fn observe_delete(
        &mut self,
        payload: &ScoreDeletedPayload,
        now: Instant,
    ) -> RemoteOutcome {
        self.observe_change(
            CellKey::new(payload.team_id.as_str(), payload.round_number),
            &payload.team_name,
            None,
            &payload.changed_by,
            &payload.changed_by_name,
            now,
        )
    }

    fn observe_change(
        &mut self,
        key: CellKey,
        team_name: &str,
        remote_points: Option<f64>,
        changed_by: &str,
        changed_by_name: &str,
        now: Instant,
    ) -> RemoteOutcome {
        // Our own writes echo back on the channel; never self-conflict,
        // never self-highlight.
        if changed_by == self.operator_id {
            return RemoteOutcome::Ignored;
        }

        match self.cells.get(&key) {
            Some(CellState::Editing { pending }) => {
                let conflict = Conflict {
                    team_id: key.team_id.clone(),
                    team_name: team_name.to_string(),
                    round_number: key.round_number,
                    local_value: pending.clone(),
                    remote_points,
                    changed_by: changed_by.to_string(),
                    changed_by_name: changed_by_name.to_string(),
                };
                self.cells
                    .insert(key, CellState::Conflicted(conflict.clone()));
                RemoteOutcome::Conflicted(conflict)
            }
            Some(CellState::Conflicted(existing)) => {
                // A newer remote write supersedes the captured one; the
                // operator's pending value is carried over.
                let conflict = Conflict {
                    remote_points,
                    changed_by: changed_by.to_string(),
                    changed_by_name: changed_by_name.to_string(),
                    ..existing.clone()
                };
                self.cells
                    .insert(key, CellState::Conflicted(conflict.clone()));
                RemoteOutcome::Conflicted(conflict)
            }
            None => {
                // Re-observing the same cell pushes the deadline out.
                self.highlights.insert(key.clone(), now + HIGHLIGHT_DURATION);
                RemoteOutcome::Highlighted(key)
            }
        }
    }

    // ------------------------------------------------------------------
    // Conflict resolution
    // ------------------------------------------------------------------

    /// The current conflict on a cell, if any.
    pub fn conflict(&self, team_id: &str, round_number: u32) -> Option<&Conflict> {
        match self.cells.get(&CellKey::new(team_id, round_number)) {
            Some(CellState::Conflicted(conflict)) => Some(conflict),
            _ => None,
        }
    }

    /// All outstanding conflicts.
    pub fn conflicts(&self) -> Vec<&Conflict> {
        self.cells
            .values()
            .filter_map(|state| match state {
                CellState::Conflicted(conflict) => Some(conflict),
                _ => None,
            })
            .collect()
    }

    /// Settle a conflicted cell. Either choice clears the conflicted state;
    /// returns `None` if the cell was not conflicted.
    pub fn resolve(
        &mut self,
        team_id: &str,
        round_number: u32,
        resolution: ConflictResolution,
    ) -> Option<ResolvedEdit> {
        let key = CellKey::new(team_id, round_number);
        let Some(CellState::Conflicted(conflict)) = self.cells.remove(&key) else {
            return None;
        };

        match resolution {
            ConflictResolution::AcceptRemote => Some(ResolvedEdit::AdoptRemote {
                points: conflict.remote_points,
            }),
            ConflictResolution::Override => Some(ResolvedEdit::SaveLocal {
                value: conflict.local_value,
            }),
        }
    }

    // ------------------------------------------------------------------
    // Highlights
    // ------------------------------------------------------------------

    /// Whether a cell's highlight is still live at `now`.
    pub fn is_highlighted(&self, team_id: &str, round_number: u32, now: Instant) -> bool {
        self.highlights
            .get(&CellKey::new(team_id, round_number))
            .is_some_and(|deadline| *deadline > now)
    }

    /// Drop highlights whose deadline has passed.
    pub fn prune_highlights(&mut self, now: Instant) {
        self.highlights.retain(|_, deadline| *deadline > now);
    }
}
