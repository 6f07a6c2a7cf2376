// Application state and orchestration logic.
//
// The central event loop that coordinates broadcast events from the relay,
// operator commands from the console, and the ranking recompute. The loop
// owns all mutable state (conflict coordinator, cached leaderboard), so the
// broadcast listener never blocks anything and no locking is needed.

use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use chrono::Utc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::live::client::{BroadcastPublisher, LiveEvent};
use crate::live::conflict::{ConflictCoordinator, RemoteOutcome, ResolvedEdit};
use crate::protocol::{
    event_channel, BroadcastMessage, ConnectionStatus, Envelope, LifecycleAction,
    OperatorCommand, ScoreUpdatedPayload, UiUpdate, GLOBAL_CHANNEL,
};
use crate::standings::{compute_leaderboard, Leaderboard};
use crate::store::Store;

/// How often expired cell highlights are swept.
pub const HIGHLIGHT_SWEEP_INTERVAL: Duration = Duration::from_secs(1);

/// The complete application state.
pub struct AppState {
    pub config: Config,
    pub store: Store,
    pub coordinator: ConflictCoordinator,
    pub connection_status: ConnectionStatus,
    /// The most recently computed leaderboard, re-rendered on demand.
    pub leaderboard: Option<Leaderboard>,
}

impl AppState {
    pub fn new(config: Config, store: Store) -> Self {
        let coordinator = ConflictCoordinator::new(config.operator.id.clone());
        AppState {
            config,
            store,
            coordinator,
            connection_status: ConnectionStatus::Connecting,
            leaderboard: None,
        }
    }

    fn event_channel(&self) -> String {
        event_channel(&self.config.event_id)
    }
}

/// Run the main event loop until the operator quits or both input channels
/// close.
pub async fn run<P: BroadcastPublisher>(
    mut live_rx: mpsc::Receiver<LiveEvent>,
    mut cmd_rx: mpsc::Receiver<OperatorCommand>,
    ui_tx: mpsc::Sender<UiUpdate>,
    mut publisher: P,
    mut state: AppState,
) -> Result<()> {
    // First render from the snapshot as it stands.
    if let Err(e) = refresh_leaderboard(&mut state, &ui_tx).await {
        warn!("Initial leaderboard computation failed: {e:#}");
        let _ = ui_tx
            .send(UiUpdate::Notice(format!("Leaderboard unavailable: {e}")))
            .await;
    }

    let mut sweep = tokio::time::interval(HIGHLIGHT_SWEEP_INTERVAL);

    loop {
        tokio::select! {
            Some(event) = live_rx.recv() => {
                handle_live_event(&mut state, &ui_tx, event).await;
            }
            maybe_cmd = cmd_rx.recv() => {
                match maybe_cmd {
                    None | Some(OperatorCommand::Quit) => {
                        info!("Operator quit; shutting down event loop");
                        break;
                    }
                    Some(cmd) => {
                        handle_command(&mut state, &mut publisher, &ui_tx, cmd).await;
                    }
                }
            }
            _ = sweep.tick() => {
                state.coordinator.prune_highlights(Instant::now());
            }
        }
    }

    Ok(())
}

/// Recompute the leaderboard from a fresh snapshot and push it to the UI.
pub async fn refresh_leaderboard(
    state: &mut AppState,
    ui_tx: &mpsc::Sender<UiUpdate>,
) -> Result<()> {
    let snapshot = state
        .store
        .load_snapshot(&state.config.event_id)
        .context("snapshot fetch failed")?;
    let board = compute_leaderboard(&snapshot);
    state.leaderboard = Some(board.clone());
    let _ = ui_tx.send(UiUpdate::Leaderboard(Box::new(board))).await;
    Ok(())
}

async fn refresh_or_notice(state: &mut AppState, ui_tx: &mpsc::Sender<UiUpdate>) {
    if let Err(e) = refresh_leaderboard(state, ui_tx).await {
        warn!("Leaderboard refresh failed: {e:#}");
        let _ = ui_tx
            .send(UiUpdate::Notice(format!("Failed to refresh leaderboard: {e}")))
            .await;
    }
}

// ---------------------------------------------------------------------------
// Broadcast events
// ---------------------------------------------------------------------------

/// Process one event from the broadcast listener.
pub async fn handle_live_event(
    state: &mut AppState,
    ui_tx: &mpsc::Sender<UiUpdate>,
    event: LiveEvent,
) {
    match event {
        LiveEvent::Connected => {
            state.connection_status = ConnectionStatus::Connected;
            let _ = ui_tx
                .send(UiUpdate::Connection(ConnectionStatus::Connected))
                .await;
        }
        LiveEvent::Disconnected => {
            state.connection_status = ConnectionStatus::Disconnected;
            let _ = ui_tx
                .send(UiUpdate::Connection(ConnectionStatus::Disconnected))
                .await;
        }
        LiveEvent::Message(envelope) => {
            handle_broadcast(state, ui_tx, envelope).await;
        }
    }
}

async fn handle_broadcast(
    state: &mut AppState,
    ui_tx: &mpsc::Sender<UiUpdate>,
    envelope: Envelope,
) {
    // Lifecycle notices ride the global channel; everything else must be
    // for the event this client follows.
    if let BroadcastMessage::Lifecycle(notice) = &envelope.message {
        if envelope.channel == GLOBAL_CHANNEL {
            if notice.changed_by != state.config.operator.id {
                let verb = match notice.action {
                    LifecycleAction::Created => "created",
                    LifecycleAction::Started => "started",
                    LifecycleAction::Ended => "ended",
                    LifecycleAction::Reopened => "reopened",
                    LifecycleAction::Archived => "archived",
                    LifecycleAction::Deleted => "deleted",
                    LifecycleAction::Reset => "reset",
                };
                let _ = ui_tx
                    .send(UiUpdate::Notice(format!(
                        "{} {verb} \"{}\"",
                        notice.changed_by_name, notice.event_name
                    )))
                    .await;
            }
            let _ = ui_tx.send(UiUpdate::EventsListStale).await;
        }
        return;
    }

    if envelope.channel != state.event_channel() {
        debug!("Ignoring message for channel {}", envelope.channel);
        return;
    }

    match envelope.message {
        BroadcastMessage::ScoreUpdated(payload) => {
            let outcome = state.coordinator.observe_update(&payload, Instant::now());
            match outcome {
                RemoteOutcome::Ignored => return,
                RemoteOutcome::Conflicted(conflict) => {
                    let _ = ui_tx.send(UiUpdate::ConflictRaised(conflict)).await;
                }
                RemoteOutcome::Highlighted(key) => {
                    let text = match payload.old_points {
                        Some(old) => format!(
                            "{} updated {} Round {}: {} -> {} pts",
                            payload.changed_by_name,
                            payload.team_name,
                            payload.round_number,
                            old,
                            payload.points
                        ),
                        None => format!(
                            "{} added score for {} Round {}: {} pts",
                            payload.changed_by_name,
                            payload.team_name,
                            payload.round_number,
                            payload.points
                        ),
                    };
                    let _ = ui_tx
                        .send(UiUpdate::CellHighlighted {
                            team_id: key.team_id,
                            round_number: key.round_number,
                        })
                        .await;
                    let _ = ui_tx.send(UiUpdate::Notice(text)).await;
                }
            }
            refresh_or_notice(state, ui_tx).await;
        }
        BroadcastMessage::ScoreDeleted(payload) => {
            let outcome = state.coordinator.observe_delete(&payload, Instant::now());
            match outcome {
                RemoteOutcome::Ignored => return,
                RemoteOutcome::Conflicted(conflict) => {
                    let _ = ui_tx.send(UiUpdate::ConflictRaised(conflict)).await;
                }
                RemoteOutcome::Highlighted(key) => {
                    let _ = ui_tx
                        .send(UiUpdate::CellHighlighted {
                            team_id: key.team_id,
                            round_number: key.round_number,
                        })
                        .await;
                    let _ = ui_tx
                        .send(UiUpdate::Notice(format!(
                            "{} deleted score for {} Round {}",
                            payload.changed_by_name, payload.team_name, payload.round_number
                        )))
                        .await;
                }
            }
            refresh_or_notice(state, ui_tx).await;
        }
        BroadcastMessage::RoundChanged(payload) => {
            if payload.changed_by == state.config.operator.id {
                return;
            }
            let _ = ui_tx
                .send(UiUpdate::Notice(format!(
                    "{} moved to Round {}",
                    payload.changed_by_name, payload.new_round
                )))
                .await;
            refresh_or_notice(state, ui_tx).await;
        }
        BroadcastMessage::TeamAdded(payload) => {
            let _ = ui_tx
                .send(UiUpdate::Notice(format!(
                    "{} was added to the event",
                    payload.team_name
                )))
                .await;
            refresh_or_notice(state, ui_tx).await;
        }
        BroadcastMessage::TeamRemoved(payload) => {
            let _ = ui_tx
                .send(UiUpdate::Notice(format!(
                    "{} was removed from the event",
                    payload.team_name
                )))
                .await;
            refresh_or_notice(state, ui_tx).await;
        }
        BroadcastMessage::EventStatusChanged(payload) => {
            let _ = ui_tx
                .send(UiUpdate::Notice(format!(
                    "Event is now {}",
                    payload.status.as_str()
                )))
                .await;
            refresh_or_notice(state, ui_tx).await;
        }
        BroadcastMessage::Lifecycle(_) => {
            // Handled above; lifecycle never arrives on event channels.
        }
    }
}

// ---------------------------------------------------------------------------
// Operator commands
// ---------------------------------------------------------------------------

/// Process one operator command.
pub async fn handle_command<P: BroadcastPublisher>(
    state: &mut AppState,
    publisher: &mut P,
    ui_tx: &mpsc::Sender<UiUpdate>,
    command: OperatorCommand,
) {
    match command {
        OperatorCommand::BeginEdit {
            team_id,
            round_number,
        } => {
            // Seed the edit with the currently saved value, if any.
            let initial = state
                .store
                .load_snapshot(&state.config.event_id)
                .ok()
                .and_then(|snap| snap.points_for(&team_id, round_number))
                .map(|points| points.to_string())
                .unwrap_or_default();

            if state.coordinator.begin_edit(&team_id, round_number, &initial) {
                let current = if initial.is_empty() { "-" } else { initial.as_str() };
                let _ = ui_tx
                    .send(UiUpdate::Notice(format!(
                        "Editing {team_id} round {round_number} (current: {current})"
                    )))
                    .await;
            } else {
                let _ = ui_tx
                    .send(UiUpdate::Notice(
                        "Cell has an unresolved conflict; accept or override first".into(),
                    ))
                    .await;
            }
        }
        OperatorCommand::EditValue {
            team_id,
            round_number,
            value,
        } => {
            if !state.coordinator.set_pending(&team_id, round_number, &value) {
                let _ = ui_tx
                    .send(UiUpdate::Notice(format!(
                        "Not editing {team_id} round {round_number}; use `edit` first"
                    )))
                    .await;
            }
        }
        OperatorCommand::Save {
            team_id,
            round_number,
        } => {
            let Some(pending) = state
                .coordinator
                .pending_value(&team_id, round_number)
                .map(str::to_string)
            else {
                let _ = ui_tx
                    .send(UiUpdate::Notice(format!(
                        "Nothing to save for {team_id} round {round_number}"
                    )))
                    .await;
                return;
            };

            let Ok(points) = pending.trim().parse::<f64>() else {
                let _ = ui_tx
                    .send(UiUpdate::Notice("Please enter a valid number".into()))
                    .await;
                return;
            };

            save_and_broadcast(state, publisher, ui_tx, &team_id, round_number, points).await;
        }
        OperatorCommand::CancelEdit {
            team_id,
            round_number,
        } => {
            state.coordinator.cancel_edit(&team_id, round_number);
        }
        OperatorCommand::Resolve {
            team_id,
            round_number,
            resolution,
        } => {
            match state.coordinator.resolve(&team_id, round_number, resolution) {
                None => {
                    let _ = ui_tx
                        .send(UiUpdate::Notice(format!(
                            "No conflict on {team_id} round {round_number}"
                        )))
                        .await;
                }
                Some(ResolvedEdit::AdoptRemote { points }) => {
                    let _ = ui_tx
                        .send(UiUpdate::Notice(match points {
                            Some(points) => format!("Accepted remote value: {points} pts"),
                            None => "Accepted remote deletion".to_string(),
                        }))
                        .await;
                    refresh_or_notice(state, ui_tx).await;
                }
                Some(ResolvedEdit::SaveLocal { value }) => {
                    match value.trim().parse::<f64>() {
                        Ok(points) => {
                            save_and_broadcast(
                                state, publisher, ui_tx, &team_id, round_number, points,
                            )
                            .await;
                        }
                        Err(_) => {
                            // Put the value back under edit so it can be fixed.
                            state.coordinator.begin_edit(&team_id, round_number, &value);
                            let _ = ui_tx
                                .send(UiUpdate::Notice(
                                    "Local value is not a valid number; still editing".into(),
                                ))
                                .await;
                        }
                    }
                }
            }
        }
        OperatorCommand::ShowBoard => {
            if let Some(board) = &state.leaderboard {
                let _ = ui_tx
                    .send(UiUpdate::Leaderboard(Box::new(board.clone())))
                    .await;
            } else {
                refresh_or_notice(state, ui_tx).await;
            }
        }
        OperatorCommand::Quit => {
            // Handled by the loop; nothing to do here.
        }
    }
}

/// Persist one score, broadcast the change, and release the edit lock.
///
/// A failed save leaves the cell editable with its pending value intact. A
/// failed broadcast is logged and swallowed: the write is already durable,
/// the only consequence is a delayed live update elsewhere.
async fn save_and_broadcast<P: BroadcastPublisher>(
    state: &mut AppState,
    publisher: &mut P,
    ui_tx: &mpsc::Sender<UiUpdate>,
    team_id: &str,
    round_number: u32,
    points: f64,
) {
    let team_name = state
        .store
        .load_snapshot(&state.config.event_id)
        .ok()
        .and_then(|snap| snap.team(team_id).map(|t| t.name.clone()))
        .unwrap_or_else(|| team_id.to_string());

    let outcome = match state.store.save_score(
        &state.config.event_id,
        team_id,
        round_number,
        points,
        &state.config.operator.id,
        None,
    ) {
        Ok(outcome) => outcome,
        Err(e) => {
            warn!("Score save failed for {team_id} round {round_number}: {e:#}");
            let _ = ui_tx
                .send(UiUpdate::Notice(format!("Failed to save score: {e}")))
                .await;
            return;
        }
    };

    let payload = ScoreUpdatedPayload {
        team_id: team_id.to_string(),
        team_name,
        round_number,
        points,
        old_points: outcome.old_points,
        changed_by: state.config.operator.id.clone(),
        changed_by_name: state.config.operator.name.clone(),
        timestamp: Utc::now(),
    };
    let channel = state.event_channel();
    if let Err(e) = publisher
        .publish(&channel, BroadcastMessage::ScoreUpdated(payload))
        .await
    {
        warn!("Broadcast publish failed (write still durable): {e:#}");
    }

    state.coordinator.edit_saved(team_id, round_number);
    let _ = ui_tx.send(UiUpdate::Notice("Score saved!".into())).await;
    refresh_or_notice(state, ui_tx).await;
}
