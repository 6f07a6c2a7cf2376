// tallycast entry point.
//
// Startup sequence:
// 1. Initialize tracing (log to file, not the terminal)
// 2. Load config
// 3. Open the database, verify the followed event exists
// 4. Create mpsc channels
// 5. Connect to the broadcast relay and subscribe (best effort)
// 6. Spawn the app event loop
// 7. Run the operator console until quit
// 8. Cleanup

use tallycast::app;
use tallycast::config;
use tallycast::console;
use tallycast::live::{self, LiveEvent};
use tallycast::protocol;
use tallycast::store::Store;

use anyhow::Context;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Initialize tracing (the terminal belongs to the console)
    init_tracing()?;
    info!("tallycast starting up");

    // 2. Load config
    let config = config::load_config().context("failed to load configuration")?;
    info!(
        "Config loaded: event={}, operator={} ({})",
        config.event_id, config.operator.name, config.operator.id
    );

    // 3. Open the database and verify the event exists before going
    // interactive.
    let store = Store::open(&config.db_path).context("failed to open database")?;
    store.load_snapshot(&config.event_id).with_context(|| {
        format!(
            "event {} not found in {}; seed it before starting",
            config.event_id, config.db_path
        )
    })?;
    info!("Database opened at {}", config.db_path);

    // 4. Create mpsc channels
    let (live_tx, live_rx) = mpsc::channel(256);
    let (cmd_tx, cmd_rx) = mpsc::channel(64);
    let (ui_tx, ui_rx) = mpsc::channel(256);

    // 5. Connect to the relay. An unreachable relay disables live updates
    // but never blocks score entry.
    let mut publisher: Option<live::LiveConnection> = None;
    let mut pump_handle = None;
    match live::LiveConnection::connect(&config.relay_url).await {
        Ok((mut connection, source)) => {
            connection
                .subscribe(&protocol::event_channel(&config.event_id))
                .await
                .context("failed to subscribe to event channel")?;
            connection
                .subscribe(protocol::GLOBAL_CHANNEL)
                .await
                .context("failed to subscribe to global channel")?;

            let tx = live_tx.clone();
            pump_handle = Some(tokio::spawn(async move {
                let _ = tx.send(LiveEvent::Connected).await;
                let _ = live::pump_frames(source, &tx).await;
                let _ = tx.send(LiveEvent::Disconnected).await;
            }));
            publisher = Some(connection);
        }
        Err(e) => {
            warn!("Broadcast relay unavailable, live updates disabled: {e:#}");
            let _ = live_tx.send(LiveEvent::Disconnected).await;
        }
    }
    drop(live_tx);

    // 6. Spawn the app event loop
    let state = app::AppState::new(config, store);
    let app_handle = tokio::spawn(async move {
        if let Err(e) = app::run(live_rx, cmd_rx, ui_tx, publisher, state).await {
            error!("Application loop error: {e:#}");
        }
    });

    // 7. Run the operator console (blocking until quit)
    if let Err(e) = console::run(cmd_tx, ui_rx).await {
        error!("Console error: {e:#}");
    }

    // 8. Cleanup: wait for the app task, then stop the listener
    let _ = tokio::time::timeout(std::time::Duration::from_secs(5), async {
        let _ = app_handle.await;
    })
    .await;

    if let Some(handle) = pump_handle {
        handle.abort();
    }

    info!("tallycast shut down cleanly");
    Ok(())
}

/// Initialize tracing to log to a file (not the terminal, which is used by
/// the operator console).
fn init_tracing() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let log_dir = std::env::current_dir()?.join("logs");
    std::fs::create_dir_all(&log_dir)?;

    let log_file = std::fs::File::create(log_dir.join("tallycast.log"))?;

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("tallycast=info,warn")),
        )
        .with_writer(log_file)
        .with_ansi(false)
        .with_target(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    Ok(())
}
