// Line-oriented operator console: parses stdin commands into
// OperatorCommands and renders UiUpdates to stdout.
//
// The terminal belongs to this module; everything else logs to a file.

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::warn;

use crate::live::conflict::ConflictResolution;
use crate::protocol::{ConnectionStatus, OperatorCommand, UiUpdate};
use crate::standings::{Leaderboard, Movement};

/// Parse one console line into a command.
///
/// Grammar:
///   edit <team-id> <round>
///   set <team-id> <round> <value>
///   save <team-id> <round>
///   cancel <team-id> <round>
///   accept <team-id> <round>
///   override <team-id> <round>
///   board
///   quit
pub fn parse_command(line: &str) -> Result<OperatorCommand, String> {
    let mut parts = line.split_whitespace();
    let verb = parts.next().ok_or("empty command")?;

    let mut cell = |verb: &str| -> Result<(String, u32), String> {
        let team_id = parts
            .next()
            .ok_or(format!("usage: {verb} <team-id> <round>"))?
            .to_string();
        let round = parts
            .next()
            .ok_or(format!("usage: {verb} <team-id> <round>"))?
            .parse::<u32>()
            .map_err(|_| "round must be a number".to_string())?;
        Ok((team_id, round))
    };

    match verb {
        "edit" => {
            let (team_id, round_number) = cell("edit")?;
            Ok(OperatorCommand::BeginEdit {
                team_id,
                round_number,
            })
        }
        "set" => {
            let (team_id, round_number) = cell("set")?;
            let value = parts
                .next()
                .ok_or("usage: set <team-id> <round> <value>")?
                .to_string();
            Ok(OperatorCommand::EditValue {
                team_id,
                round_number,
                value,
            })
        }
        "save" => {
            let (team_id, round_number) = cell("save")?;
            Ok(OperatorCommand::Save {
                team_id,
                round_number,
            })
        }
        "cancel" => {
            let (team_id, round_number) = cell("cancel")?;
            Ok(OperatorCommand::CancelEdit {
                team_id,
                round_number,
            })
        }
        "accept" => {
            let (team_id, round_number) = cell("accept")?;
            Ok(OperatorCommand::Resolve {
                team_id,
                round_number,
                resolution: ConflictResolution::AcceptRemote,
            })
        }
        "override" => {
            let (team_id, round_number) = cell("override")?;
            Ok(OperatorCommand::Resolve {
                team_id,
                round_number,
                resolution: ConflictResolution::Override,
            })
        }
        "board" => Ok(OperatorCommand::ShowBoard),
        "quit" | "exit" => Ok(OperatorCommand::Quit),
        other => Err(format!("unknown command: {other} (try `help`)")),
    }
}

fn format_points(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{}", value as i64)
    } else {
        format!("{value:.1}")
    }
}

fn movement_tag(movement: Movement) -> &'static str {
    match movement {
        Movement::Up => "Rise",
        Movement::Down => "Dip",
        Movement::New => "New",
        Movement::Same => "Even",
    }
}

/// Render the leaderboard as plain text.
pub fn render_leaderboard(board: &Leaderboard) -> String {
    let mut out = String::new();

    out.push_str(&format!(
        "== {} [{}]",
        board.event.name,
        board.event.status.as_str()
    ));
    if let Some(current) = board.current_round {
        out.push_str(&format!("  round {current}/{}", board.total_rounds));
    }
    if let Some(last) = board.last_completed_round {
        out.push_str(&format!("  last completed: {last}"));
    }
    out.push('\n');

    for standing in &board.standings {
        out.push_str(&format!(
            "{:>3}. {:<24} {:>8}  last {:>6}  avg {:>6}  [{}]\n",
            standing.rank,
            standing.team.name,
            format_points(standing.total_score),
            format_points(standing.last_round_points),
            format_points(standing.average_score),
            movement_tag(standing.movement),
        ));
    }
    if board.standings.is_empty() {
        out.push_str("  (no teams yet)\n");
    }

    let h = &board.highlights;
    if let Some(leader) = &h.leader {
        match leader.lead_over_next {
            Some(margin) => out.push_str(&format!(
                "Leader: {} by {} pts\n",
                leader.team.name,
                format_points(margin)
            )),
            None => out.push_str(&format!("Leader: {}\n", leader.team.name)),
        }
    }
    if let Some(surging) = &h.surging {
        out.push_str(&format!(
            "Surging: {} (+{} in round {})\n",
            surging.team.name,
            format_points(surging.delta),
            surging.round_number
        ));
    }
    if let Some(race) = &h.tight_race {
        out.push_str(&format!(
            "Tight race: {} vs {} ({} pts)\n",
            race.leading.name,
            race.trailing.name,
            format_points(race.margin)
        ));
    }
    if let Some(hero) = &h.round_hero {
        out.push_str(&format!(
            "Round hero: {} with {} in round {}\n",
            hero.team.name,
            format_points(hero.points),
            hero.round_number
        ));
    }

    out
}

fn print_help() {
    println!("commands:");
    println!("  edit <team-id> <round>         start editing a score cell");
    println!("  set <team-id> <round> <value>  change the pending value");
    println!("  save <team-id> <round>         save the pending value");
    println!("  cancel <team-id> <round>       abandon the edit");
    println!("  accept <team-id> <round>       conflict: take the remote value");
    println!("  override <team-id> <round>     conflict: save your value anyway");
    println!("  board                          re-print the leaderboard");
    println!("  quit");
}

fn print_update(update: &UiUpdate) {
    match update {
        UiUpdate::Leaderboard(board) => print!("{}", render_leaderboard(board)),
        UiUpdate::Connection(status) => {
            let text = match status {
                ConnectionStatus::Connected => "live updates connected",
                ConnectionStatus::Connecting => "connecting to live updates...",
                ConnectionStatus::Disconnected => "live updates disconnected",
            };
            println!("[{text}]");
        }
        UiUpdate::ConflictRaised(conflict) => {
            println!("!! CONFLICT on {} round {}", conflict.team_id, conflict.round_number);
            match conflict.remote_points {
                Some(points) => println!(
                    "   {} just set it to {} pts",
                    conflict.changed_by_name,
                    format_points(points)
                ),
                None => println!("   {} just deleted the score", conflict.changed_by_name),
            }
            let local = if conflict.local_value.is_empty() {
                "-"
            } else {
                conflict.local_value.as_str()
            };
            println!("   your value: {local}");
            println!(
                "   resolve with: accept {0} {1}  |  override {0} {1}",
                conflict.team_id, conflict.round_number
            );
        }
        UiUpdate::CellHighlighted {
            team_id,
            round_number,
        } => println!("* {team_id} round {round_number} just changed"),
        UiUpdate::Notice(text) => println!("{text}"),
        UiUpdate::EventsListStale => println!("[events list changed elsewhere]"),
    }
}

/// Run the console loop: forward parsed commands, print updates. Returns
/// when the operator quits or either channel closes.
pub async fn run(
    cmd_tx: mpsc::Sender<OperatorCommand>,
    mut ui_rx: mpsc::Receiver<UiUpdate>,
) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    print_help();

    loop {
        tokio::select! {
            maybe_update = ui_rx.recv() => {
                match maybe_update {
                    Some(update) => print_update(&update),
                    None => break,
                }
            }
            line = lines.next_line() => {
                match line {
                    Ok(Some(text)) => {
                        let trimmed = text.trim();
                        if trimmed.is_empty() {
                            continue;
                        }
                        if trimmed == "help" {
                            print_help();
                            continue;
                        }
                        match parse_command(trimmed) {
                            Ok(cmd) => {
                                let quitting = cmd == OperatorCommand::Quit;
                                if cmd_tx.send(cmd).await.is_err() {
                                    break;
                                }
                                if quitting {
                                    break;
                                }
                            }
                            Err(message) => println!("{message}"),
                        }
                    }
                    Ok(None) => {
                        let _ = cmd_tx.send(OperatorCommand::Quit).await;
                        break;
                    }
                    Err(e) => {
                        warn!("stdin error: {e}");
                        break;
                    }
                }
            }
        }
    }

    Ok(())
}
