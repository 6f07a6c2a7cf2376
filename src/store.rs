// SQLite persistence layer: events, rounds, teams, scores, and the score
// audit trail.
//
// The schema's UNIQUE(team_id, round_number) is the "one score per cell"
// invariant the ranking engine assumes; saves are update-in-place, so the
// last write to a cell wins. Score values are validated here, before they
// ever reach the engine.

use std::sync::{Mutex, MutexGuard};

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use crate::model::{Event, EventStatus, Round, Score, Snapshot, Team};

/// Result of saving one score cell.
#[derive(Debug, Clone, PartialEq)]
pub struct SaveOutcome {
    pub score_id: String,
    /// The previous value, `None` when the save created the cell. Feeds the
    /// `oldPoints` field of the resulting broadcast.
    pub old_points: Option<f64>,
}

/// Result of a batch save: per-cell failures don't abort the batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchOutcome {
    pub saved: usize,
    pub failed: usize,
}

/// One row of the score audit trail.
#[derive(Debug, Clone)]
pub struct AuditEntry {
    pub id: i64,
    pub score_id: String,
    pub team_id: String,
    pub round_number: u32,
    pub old_points: Option<f64>,
    pub new_points: f64,
    pub action: String,
    pub reason: Option<String>,
    pub changed_by: String,
    pub timestamp: String,
}

/// Reject malformed score values before they reach the engine: negative,
/// above 1000, non-finite, or more than 2 decimal places.
pub fn validate_points(points: f64) -> Result<()> {
    if !points.is_finite() {
        bail!("score must be a valid number");
    }
    if points < 0.0 {
        bail!("score cannot be negative");
    }
    if points > 1000.0 {
        bail!("score cannot exceed 1000 points");
    }
    let scaled = points * 100.0;
    if (scaled - scaled.round()).abs() > 1e-6 {
        bail!("score cannot have more than 2 decimal places");
    }
    Ok(())
}

/// SQLite-backed store for one or more scoring events.
pub struct Store {
    conn: Mutex<Connection>,
}

impl Store {
    /// Open (or create) the database at `path` and ensure the schema
    /// exists. Pass `":memory:"` for an ephemeral database (tests).
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open database at {path}"))?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA busy_timeout = 5000;
             PRAGMA foreign_keys = ON;",
        )
        .context("failed to set database pragmas")?;

        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS events (
                id             TEXT PRIMARY KEY,
                name           TEXT NOT NULL,
                status         TEXT NOT NULL DEFAULT 'draft',
                current_round  INTEGER,
                scheduled_date TEXT,
                started_at     TEXT,
                ended_at       TEXT,
                updated_at     TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS rounds (
                id           TEXT PRIMARY KEY,
                event_id     TEXT NOT NULL REFERENCES events(id) ON DELETE CASCADE,
                round_number INTEGER NOT NULL,
                round_name   TEXT,
                is_bonus     INTEGER NOT NULL DEFAULT 0,
                max_points   REAL,
                UNIQUE(event_id, round_number)
            );

            CREATE TABLE IF NOT EXISTS teams (
                id           TEXT PRIMARY KEY,
                event_id     TEXT NOT NULL REFERENCES events(id) ON DELETE CASCADE,
                name         TEXT NOT NULL,
                joined_round INTEGER NOT NULL DEFAULT 1
            );

            CREATE TABLE IF NOT EXISTS scores (
                id           TEXT PRIMARY KEY,
                event_id     TEXT NOT NULL REFERENCES events(id) ON DELETE CASCADE,
                team_id      TEXT NOT NULL REFERENCES teams(id) ON DELETE CASCADE,
                round_number INTEGER NOT NULL,
                points       REAL NOT NULL,
                entered_by   TEXT,
                UNIQUE(team_id, round_number)
            );

            CREATE TABLE IF NOT EXISTS score_audit (
                id           INTEGER PRIMARY KEY AUTOINCREMENT,
                score_id     TEXT NOT NULL,
                event_id     TEXT NOT NULL,
                team_id      TEXT NOT NULL,
                round_number INTEGER NOT NULL,
                old_points   REAL,
                new_points   REAL NOT NULL,
                action       TEXT NOT NULL,
                reason       TEXT,
                changed_by   TEXT NOT NULL,
                timestamp    TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
            );

            CREATE INDEX IF NOT EXISTS idx_scores_event ON scores(event_id);
            CREATE INDEX IF NOT EXISTS idx_score_audit_event ON score_audit(event_id);
            ",
        )
        .context("failed to create database schema")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Acquire the database connection.
    ///
    /// Panics if the mutex is poisoned (another thread panicked while
    /// holding the lock). This should never happen in normal operation.
    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().expect("store mutex poisoned")
    }

    /// Generate a timestamp-based row id, e.g. `team_20260307_201500_123`.
    pub fn generate_id(prefix: &str) -> String {
        format!("{prefix}_{}", Utc::now().format("%Y%m%d_%H%M%S_%3f"))
    }

    // ------------------------------------------------------------------
    // Event / round / team setup
    // ------------------------------------------------------------------

    /// Insert an event record.
    pub fn create_event(&self, event: &Event) -> Result<()> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO events (id, name, status, current_round, scheduled_date, started_at, ended_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                event.id,
                event.name,
                event.status.as_str(),
                event.current_round,
                event.scheduled_date.map(|t| t.to_rfc3339()),
                event.started_at.map(|t| t.to_rfc3339()),
                event.ended_at.map(|t| t.to_rfc3339()),
                event.updated_at.to_rfc3339(),
            ],
        )
        .context("failed to insert event")?;
        Ok(())
    }

    /// Insert a round. Round numbers are unique per event.
    pub fn add_round(&self, round: &Round) -> Result<()> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO rounds (id, event_id, round_number, round_name, is_bonus, max_points)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                round.id,
                round.event_id,
                round.round_number,
                round.name,
                round.is_bonus,
                round.max_points,
            ],
        )
        .context("failed to insert round")?;
        Ok(())
    }

    /// Insert a team.
    pub fn add_team(&self, team: &Team) -> Result<()> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO teams (id, event_id, name, joined_round) VALUES (?1, ?2, ?3, ?4)",
            params![team.id, team.event_id, team.name, team.joined_round],
        )
        .context("failed to insert team")?;
        Ok(())
    }

    /// Remove a team and (via cascade) its scores.
    pub fn remove_team(&self, team_id: &str) -> Result<()> {
        let conn = self.conn();
        conn.execute("DELETE FROM teams WHERE id = ?1", params![team_id])
            .context("failed to delete team")?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Snapshot fetch
    // ------------------------------------------------------------------

    /// Load the full snapshot for one event: the event row plus its rounds
    /// (by number), teams (by name), and scores.
    pub fn load_snapshot(&self, event_id: &str) -> Result<Snapshot> {
        let conn = self.conn();

        let event = conn
            .query_row(
                "SELECT id, name, status, current_round, scheduled_date, started_at, ended_at, updated_at
                 FROM events WHERE id = ?1",
                params![event_id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, Option<u32>>(3)?,
                        row.get::<_, Option<String>>(4)?,
                        row.get::<_, Option<String>>(5)?,
                        row.get::<_, Option<String>>(6)?,
                        row.get::<_, String>(7)?,
                    ))
                },
            )
            .optional()
            .context("failed to query event")?;

        let Some((id, name, status, current_round, scheduled, started, ended, updated)) = event
        else {
            bail!("event not found: {event_id}");
        };

        let status = EventStatus::parse(&status)
            .with_context(|| format!("unknown event status in database: {status}"))?;

        let event = Event {
            id,
            name,
            status,
            current_round,
            scheduled_date: parse_opt_timestamp(scheduled)?,
            started_at: parse_opt_timestamp(started)?,
            ended_at: parse_opt_timestamp(ended)?,
            updated_at: parse_timestamp(&updated)?,
        };

        let mut stmt = conn
            .prepare(
                "SELECT id, round_number, round_name, is_bonus, max_points
                 FROM rounds WHERE event_id = ?1 ORDER BY round_number",
            )
            .context("failed to prepare rounds query")?;
        let rounds = stmt
            .query_map(params![event_id], |row| {
                Ok(Round {
                    id: row.get(0)?,
                    event_id: event_id.to_string(),
                    round_number: row.get(1)?,
                    name: row.get(2)?,
                    is_bonus: row.get(3)?,
                    max_points: row.get(4)?,
                })
            })
            .context("failed to query rounds")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map round rows")?;

        let mut stmt = conn
            .prepare(
                "SELECT id, name, joined_round FROM teams WHERE event_id = ?1 ORDER BY name",
            )
            .context("failed to prepare teams query")?;
        let teams = stmt
            .query_map(params![event_id], |row| {
                Ok(Team {
                    id: row.get(0)?,
                    event_id: event_id.to_string(),
                    name: row.get(1)?,
                    joined_round: row.get(2)?,
                })
            })
            .context("failed to query teams")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map team rows")?;

        let mut stmt = conn
            .prepare(
                "SELECT id, team_id, round_number, points
                 FROM scores WHERE event_id = ?1 ORDER BY round_number, team_id",
            )
            .context("failed to prepare scores query")?;
        let scores = stmt
            .query_map(params![event_id], |row| {
                Ok(Score {
                    id: row.get(0)?,
                    event_id: event_id.to_string(),
                    team_id: row.get(1)?,
                    round_number: row.get(2)?,
                    points: row.get(3)?,
                })
            })
            .context("failed to query scores")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map score rows")?;

        Ok(Snapshot {
            event,
            rounds,
            teams,
            scores,
        })
    }

    // ------------------------------------------------------------------
    // Score mutations
    // ------------------------------------------------------------------

    /// Create or update one score cell. Returns the cell's id and the
    /// previous value (None on create). Writes an audit row and bumps the
    /// event's `updated_at` in the same transaction.
    pub fn save_score(
        &self,
        event_id: &str,
        team_id: &str,
        round_number: u32,
        points: f64,
        changed_by: &str,
        reason: Option<&str>,
    ) -> Result<SaveOutcome> {
        validate_points(points)?;

        let mut conn = self.conn();
        let tx = conn.transaction().context("failed to begin transaction")?;

        let existing: Option<(String, f64)> = tx
            .query_row(
                "SELECT id, points FROM scores WHERE team_id = ?1 AND round_number = ?2",
                params![team_id, round_number],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
            .context("failed to query existing score")?;

        let (score_id, old_points, action) = match existing {
            Some((id, old)) => {
                tx.execute(
                    "UPDATE scores SET points = ?1, entered_by = ?2 WHERE id = ?3",
                    params![points, changed_by, id],
                )
                .context("failed to update score")?;
                (id, Some(old), "updated")
            }
            None => {
                let id = format!("score_{team_id}_r{round_number}");
                tx.execute(
                    "INSERT INTO scores (id, event_id, team_id, round_number, points, entered_by)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    params![id, event_id, team_id, round_number, points, changed_by],
                )
                .context("failed to insert score")?;
                (id, None, "created")
            }
        };

        tx.execute(
            "INSERT INTO score_audit (score_id, event_id, team_id, round_number, old_points, new_points, action, reason, changed_by)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                score_id,
                event_id,
                team_id,
                round_number,
                old_points,
                points,
                action,
                reason,
                changed_by,
            ],
        )
        .context("failed to insert audit row")?;

        tx.execute(
            "UPDATE events SET updated_at = ?1 WHERE id = ?2",
            params![Utc::now().to_rfc3339(), event_id],
        )
        .context("failed to bump event watermark")?;

        tx.commit().context("failed to commit score save")?;

        Ok(SaveOutcome {
            score_id,
            old_points,
        })
    }

    /// Delete one score cell. Returns the deleted value, or `None` if the
    /// cell had no score.
    pub fn delete_score(
        &self,
        event_id: &str,
        team_id: &str,
        round_number: u32,
        changed_by: &str,
    ) -> Result<Option<f64>> {
        let mut conn = self.conn();
        let tx = conn.transaction().context("failed to begin transaction")?;

        let existing: Option<(String, f64)> = tx
            .query_row(
                "SELECT id, points FROM scores WHERE team_id = ?1 AND round_number = ?2",
                params![team_id, round_number],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
            .context("failed to query existing score")?;

        let Some((score_id, old_points)) = existing else {
            return Ok(None);
        };

        tx.execute(
            "INSERT INTO score_audit (score_id, event_id, team_id, round_number, old_points, new_points, action, reason, changed_by)
             VALUES (?1, ?2, ?3, ?4, ?5, 0, 'deleted', NULL, ?6)",
            params![score_id, event_id, team_id, round_number, old_points, changed_by],
        )
        .context("failed to insert audit row")?;

        tx.execute("DELETE FROM scores WHERE id = ?1", params![score_id])
            .context("failed to delete score")?;

        tx.execute(
            "UPDATE events SET updated_at = ?1 WHERE id = ?2",
            params![Utc::now().to_rfc3339(), event_id],
        )
        .context("failed to bump event watermark")?;

        tx.commit().context("failed to commit score delete")?;

        Ok(Some(old_points))
    }

    /// Save a whole round's worth of cells. Per-cell failures are counted,
    /// not propagated, so one bad value doesn't block the rest.
    pub fn batch_save_scores(
        &self,
        event_id: &str,
        round_number: u32,
        entries: &[(&str, f64)],
        changed_by: &str,
    ) -> Result<BatchOutcome> {
        let mut outcome = BatchOutcome { saved: 0, failed: 0 };
        for &(team_id, points) in entries {
            match self.save_score(event_id, team_id, round_number, points, changed_by, None) {
                Ok(_) => outcome.saved += 1,
                Err(e) => {
                    tracing::warn!("batch save failed for {team_id} round {round_number}: {e}");
                    outcome.failed += 1;
                }
            }
        }
        Ok(outcome)
    }

    // ------------------------------------------------------------------
    // Event lifecycle
    // ------------------------------------------------------------------

    /// Advance an active event to its next round. Refuses to run past the
    /// final defined round; does NOT require the current round to be fully
    /// scored (entry can lag behind).
    pub fn advance_round(&self, event_id: &str) -> Result<u32> {
        let conn = self.conn();

        let (status, current_round): (String, Option<u32>) = conn
            .query_row(
                "SELECT status, current_round FROM events WHERE id = ?1",
                params![event_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
            .context("failed to query event")?
            .with_context(|| format!("event not found: {event_id}"))?;

        if status != "active" {
            bail!("cannot advance rounds: event is {status}, not active");
        }

        let max_round: Option<u32> = conn
            .query_row(
                "SELECT MAX(round_number) FROM rounds WHERE event_id = ?1",
                params![event_id],
                |row| row.get(0),
            )
            .context("failed to query max round")?;
        let max_round = max_round.context("event has no rounds")?;

        let next = current_round.unwrap_or(0) + 1;
        if next > max_round {
            bail!("already at the final round ({max_round})");
        }

        conn.execute(
            "UPDATE events SET current_round = ?1, updated_at = ?2 WHERE id = ?3",
            params![next, Utc::now().to_rfc3339(), event_id],
        )
        .context("failed to advance round")?;

        Ok(next)
    }

    /// Change an event's lifecycle status, stamping started/ended times.
    pub fn set_status(&self, event_id: &str, status: EventStatus) -> Result<()> {
        let conn = self.conn();
        let now = Utc::now().to_rfc3339();

        match status {
            EventStatus::Active => {
                conn.execute(
                    "UPDATE events
                     SET status = ?1,
                         started_at = COALESCE(started_at, ?2),
                         current_round = COALESCE(current_round, 1),
                         updated_at = ?2
                     WHERE id = ?3",
                    params![status.as_str(), now, event_id],
                )
                .context("failed to activate event")?;
            }
            EventStatus::Completed => {
                conn.execute(
                    "UPDATE events SET status = ?1, ended_at = ?2, updated_at = ?2 WHERE id = ?3",
                    params![status.as_str(), now, event_id],
                )
                .context("failed to complete event")?;
            }
            _ => {
                conn.execute(
                    "UPDATE events SET status = ?1, updated_at = ?2 WHERE id = ?3",
                    params![status.as_str(), now, event_id],
                )
                .context("failed to update event status")?;
            }
        }

        Ok(())
    }

    // ------------------------------------------------------------------
    // Audit trail
    // ------------------------------------------------------------------

    /// All audit rows for an event, oldest first.
    pub fn audit_for_event(&self, event_id: &str) -> Result<Vec<AuditEntry>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(
                "SELECT id, score_id, team_id, round_number, old_points, new_points, action, reason, changed_by, timestamp
                 FROM score_audit WHERE event_id = ?1 ORDER BY id",
            )
            .context("failed to prepare audit query")?;

        let entries = stmt
            .query_map(params![event_id], |row| {
                Ok(AuditEntry {
                    id: row.get(0)?,
                    score_id: row.get(1)?,
                    team_id: row.get(2)?,
                    round_number: row.get(3)?,
                    old_points: row.get(4)?,
                    new_points: row.get(5)?,
                    action: row.get(6)?,
                    reason: row.get(7)?,
                    changed_by: row.get(8)?,
                    timestamp: row.get(9)?,
                })
            })
            .context("failed to query audit rows")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map audit rows")?;

        Ok(entries)
    }
}

fn parse_timestamp(text: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(text)
        .with_context(|| format!("invalid timestamp in database: {text}"))?
        .with_timezone(&Utc))
}

fn parse_opt_timestamp(text: Option<String>) -> Result<Option<DateTime<Utc>>> {
    text.as_deref().map(parse_timestamp).transpose()
}

#[cfg(test)]
mod tests {
    use super::*;

    const EVENT_ID: &str = "ev-test";

    fn test_store() -> Store {
        let store = Store::open(":memory:").expect("in-memory store should open");
        store
            .create_event(&Event {
                id: EVENT_ID.into(),
                name: "Test Event".into(),
                status: EventStatus::Active,
                current_round: Some(1),
                scheduled_date: None,
                started_at: Some(Utc::now()),
                ended_at: None,
                updated_at: Utc::now(),
            })
            .unwrap();
        for n in 1..=3 {
            store
                .add_round(&Round {
                    id: format!("r{n}"),
                    event_id: EVENT_ID.into(),
                    round_number: n,
                    name: None,
                    is_bonus: false,
                    max_points: None,
                })
                .unwrap();
        }
        for (id, name) in [("team-a", "Alpha"), ("team-b", "Beta")] {
            store
                .add_team(&Team {
                    id: id.into(),
                    event_id: EVENT_ID.into(),
                    name: name.into(),
                    joined_round: 1,
                })
                .unwrap();
        }
        store
    }

    // ------------------------------------------------------------------
    // Score validation
    // ------------------------------------------------------------------

    #[test]
    fn validate_points_rules() {
        assert!(validate_points(0.0).is_ok());
        assert!(validate_points(12.25).is_ok());
        assert!(validate_points(1000.0).is_ok());

        assert!(validate_points(-1.0).is_err());
        assert!(validate_points(1000.01).is_err());
        assert!(validate_points(3.141).is_err());
        assert!(validate_points(f64::NAN).is_err());
        assert!(validate_points(f64::INFINITY).is_err());
    }

    // ------------------------------------------------------------------
    // Save / update / delete
    // ------------------------------------------------------------------

    #[test]
    fn save_creates_then_updates_in_place() {
        let store = test_store();

        let first = store
            .save_score(EVENT_ID, "team-a", 1, 10.0, "op-a", None)
            .unwrap();
        assert_eq!(first.old_points, None);

        let second = store
            .save_score(EVENT_ID, "team-a", 1, 12.5, "op-b", None)
            .unwrap();
        assert_eq!(second.old_points, Some(10.0));
        assert_eq!(second.score_id, first.score_id);

        // One row per cell, holding the last write.
        let snapshot = store.load_snapshot(EVENT_ID).unwrap();
        assert_eq!(snapshot.scores.len(), 1);
        assert_eq!(snapshot.scores[0].points, 12.5);
    }

    #[test]
    fn save_rejects_invalid_values() {
        let store = test_store();
        assert!(store
            .save_score(EVENT_ID, "team-a", 1, -5.0, "op-a", None)
            .is_err());
        assert!(store
            .save_score(EVENT_ID, "team-a", 1, 1.999, "op-a", None)
            .is_err());
        // Nothing was written.
        assert!(store.load_snapshot(EVENT_ID).unwrap().scores.is_empty());
    }

    #[test]
    fn save_bumps_event_watermark() {
        let store = test_store();
        let before = store.load_snapshot(EVENT_ID).unwrap().event.updated_at;

        std::thread::sleep(std::time::Duration::from_millis(5));
        store
            .save_score(EVENT_ID, "team-a", 1, 10.0, "op-a", None)
            .unwrap();

        let after = store.load_snapshot(EVENT_ID).unwrap().event.updated_at;
        assert!(after > before);
    }

    #[test]
    fn delete_returns_old_value() {
        let store = test_store();
        store
            .save_score(EVENT_ID, "team-a", 1, 10.0, "op-a", None)
            .unwrap();

        let deleted = store.delete_score(EVENT_ID, "team-a", 1, "op-b").unwrap();
        assert_eq!(deleted, Some(10.0));
        assert!(store.load_snapshot(EVENT_ID).unwrap().scores.is_empty());

        // Deleting an empty cell is a no-op, not an error.
        let deleted = store.delete_score(EVENT_ID, "team-a", 1, "op-b").unwrap();
        assert_eq!(deleted, None);
    }

    #[test]
    fn audit_trail_records_every_change() {
        let store = test_store();
        store
            .save_score(EVENT_ID, "team-a", 1, 10.0, "op-a", None)
            .unwrap();
        store
            .save_score(EVENT_ID, "team-a", 1, 12.0, "op-b", Some("recount"))
            .unwrap();
        store.delete_score(EVENT_ID, "team-a", 1, "op-a").unwrap();

        let audit = store.audit_for_event(EVENT_ID).unwrap();
        assert_eq!(audit.len(), 3);

        assert_eq!(audit[0].action, "created");
        assert_eq!(audit[0].old_points, None);
        assert_eq!(audit[0].new_points, 10.0);

        assert_eq!(audit[1].action, "updated");
        assert_eq!(audit[1].old_points, Some(10.0));
        assert_eq!(audit[1].reason.as_deref(), Some("recount"));

        assert_eq!(audit[2].action, "deleted");
        assert_eq!(audit[2].old_points, Some(12.0));
        assert_eq!(audit[2].changed_by, "op-a");
    }

    #[test]
    fn batch_save_counts_failures_without_aborting() {
        let store = test_store();
        let outcome = store
            .batch_save_scores(
                EVENT_ID,
                1,
                &[("team-a", 10.0), ("team-b", -3.0)],
                "op-a",
            )
            .unwrap();

        assert_eq!(outcome, BatchOutcome { saved: 1, failed: 1 });
        let snapshot = store.load_snapshot(EVENT_ID).unwrap();
        assert_eq!(snapshot.scores.len(), 1);
        assert_eq!(snapshot.scores[0].team_id, "team-a");
    }

    // ------------------------------------------------------------------
    // Snapshot
    // ------------------------------------------------------------------

    #[test]
    fn snapshot_orders_rounds_and_teams() {
        let store = test_store();
        let snapshot = store.load_snapshot(EVENT_ID).unwrap();

        assert_eq!(snapshot.event.id, EVENT_ID);
        assert_eq!(
            snapshot.rounds.iter().map(|r| r.round_number).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
        // Teams come back name-ordered regardless of insert order.
        assert_eq!(
            snapshot.teams.iter().map(|t| t.name.as_str()).collect::<Vec<_>>(),
            vec!["Alpha", "Beta"]
        );
    }

    #[test]
    fn snapshot_for_unknown_event_fails() {
        let store = test_store();
        assert!(store.load_snapshot("nope").is_err());
    }

    #[test]
    fn removing_team_cascades_to_scores() {
        let store = test_store();
        store
            .save_score(EVENT_ID, "team-a", 1, 10.0, "op-a", None)
            .unwrap();

        store.remove_team("team-a").unwrap();

        let snapshot = store.load_snapshot(EVENT_ID).unwrap();
        assert_eq!(snapshot.teams.len(), 1);
        assert!(snapshot.scores.is_empty());
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    #[test]
    fn advance_round_walks_to_final_then_refuses() {
        let store = test_store();

        assert_eq!(store.advance_round(EVENT_ID).unwrap(), 2);
        assert_eq!(store.advance_round(EVENT_ID).unwrap(), 3);
        assert!(store.advance_round(EVENT_ID).is_err());
    }

    #[test]
    fn advance_round_requires_active_event() {
        let store = test_store();
        store.set_status(EVENT_ID, EventStatus::Completed).unwrap();
        assert!(store.advance_round(EVENT_ID).is_err());
    }

    #[test]
    fn activating_stamps_start_and_first_round() {
        let store = Store::open(":memory:").unwrap();
        store
            .create_event(&Event {
                id: "ev-2".into(),
                name: "Later Event".into(),
                status: EventStatus::Upcoming,
                current_round: None,
                scheduled_date: None,
                started_at: None,
                ended_at: None,
                updated_at: Utc::now(),
            })
            .unwrap();

        store.set_status("ev-2", EventStatus::Active).unwrap();

        let snapshot = store.load_snapshot("ev-2").unwrap();
        assert_eq!(snapshot.event.status, EventStatus::Active);
        assert_eq!(snapshot.event.current_round, Some(1));
        assert!(snapshot.event.started_at.is_some());
    }

    #[test]
    fn completing_stamps_end_time() {
        let store = test_store();
        store.set_status(EVENT_ID, EventStatus::Completed).unwrap();

        let snapshot = store.load_snapshot(EVENT_ID).unwrap();
        assert_eq!(snapshot.event.status, EventStatus::Completed);
        assert!(snapshot.event.ended_at.is_some());
    }

    #[test]
    fn generate_id_carries_prefix() {
        let id = Store::generate_id("team");
        assert!(id.starts_with("team_"));
    }
}
