/// CflLive — Team Tracker
///
/// Co dělá:
///   1. Pro každý tým z CFL_TEAMS drží vlastní monitor + koordinátor
///   2. První refresh hned po startu, pak každých 10 minut
///   3. Kickoff blíž než 20 minut nebo hra běží → 5s fast poll
///   4. Každý úspěšný cyklus publikuje plochý GameRecord (watch kanál + JSONL)
///
/// Selhaný cyklus nic nepřepisuje — poslední dobrý záznam zůstává.
///
/// Spuštění:
///   cargo run --bin team-tracker

use anyhow::Result;
use coordinator::UpdateCoordinator;
use dotenv::dotenv;
use logger::{now_iso, EventLogger, SystemHeartbeatEvent};
use scoreboard_client::{TeamConfig, TeamMonitor, DEFAULT_INTERVAL_SECS};
use std::env;
use std::fs::File;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::time::interval;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();

    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info"))
        )
        .init();

    info!("=== CflLive Team Tracker ===");

    // Single instance lock
    let lock_file_path = env::temp_dir().join("cfllive_tracker.lock");
    let lock_file = match File::create(&lock_file_path) {
        Ok(f) => f,
        Err(e) => {
            warn!("Failed to create lock file at {:?}: {}", lock_file_path, e);
            return Ok(());
        }
    };

    let mut lock = fd_lock::RwLock::new(lock_file);
    let _write_guard = match lock.try_write() {
        Ok(guard) => {
            info!("Acquired single-instance lock.");
            guard
        }
        Err(_) => {
            warn!("Another instance of team-tracker is already running! Exiting.");
            return Ok(());
        }
    };

    let teams = TeamConfig::from_env();
    if teams.is_empty() {
        warn!("CFL_TEAMS is empty — nothing to track. Example: CFL_TEAMS=\"BC=BC Lions,WPG\"");
        return Ok(());
    }
    let log_dir = env::var("CFL_LOG_DIR").unwrap_or_else(|_| "logs".to_string());

    info!(
        "Tracking {} team(s), cycle timeout {}s, logs: {}",
        teams.len(),
        teams[0].timeout_secs,
        log_dir
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let logger = EventLogger::new(&log_dir);

    // Každý tým má vlastní monitor/koordinátor — žádný sdílený stav
    let mut receivers = Vec::new();
    let mut handles = Vec::new();

    for cfg in teams {
        let team_id = cfg.team_id.clone();
        let display = cfg.name.clone();
        let timeout_secs = cfg.timeout_secs;

        let monitor = TeamMonitor::new(cfg, &log_dir);
        let coord = UpdateCoordinator::new(
            display,
            monitor,
            Duration::from_secs(DEFAULT_INTERVAL_SECS),
            Duration::from_secs(timeout_secs),
        );

        receivers.push((team_id, coord.subscribe()));
        handles.push(tokio::spawn(coord.run(shutdown_rx.clone())));
    }

    let started = Instant::now();
    let mut heartbeat = interval(Duration::from_secs(300));
    heartbeat.tick().await; // první tick je okamžitý, přeskočit

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Ctrl-C — shutting down.");
                break;
            }
            _ = heartbeat.tick() => {
                let mut fast = 0;
                for (team, rx) in &receivers {
                    match rx.borrow().as_ref() {
                        Some(rec) => {
                            if rec.fast_refresh {
                                fast += 1;
                            }
                            info!(
                                "  {team}: {} vs {} ({})",
                                rec.state,
                                rec.opponent_abbr.as_deref().unwrap_or("-"),
                                rec.kickoff_in.as_deref().unwrap_or("-"),
                            );
                        }
                        None => info!("  {team}: no successful refresh yet"),
                    }
                }

                let _ = logger.log(&SystemHeartbeatEvent {
                    ts:            now_iso(),
                    event:         "SYSTEM_HEARTBEAT",
                    tracked_teams: receivers.len(),
                    fast_polling:  fast,
                    uptime_secs:   started.elapsed().as_secs(),
                });
                info!("Heartbeat: {} team(s) tracked, {} fast-polling.", receivers.len(), fast);
            }
        }
    }

    // Teardown: zrušit čekající timery a počkat na koordinátory
    let _ = shutdown_tx.send(true);
    for h in handles {
        let _ = h.await;
    }
    info!("All coordinators stopped.");

    Ok(())
}
