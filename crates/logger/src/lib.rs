/// CflLive — Logger
/// JSONL event stream (game updates, API health, heartbeaty)

use anyhow::Result;
use chrono::Utc;
use serde::Serialize;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

pub struct EventLogger {
    log_dir: PathBuf,
}

impl EventLogger {
    pub fn new(log_dir: impl Into<PathBuf>) -> Self {
        let dir = log_dir.into();
        fs::create_dir_all(&dir).ok();
        Self { log_dir: dir }
    }

    pub fn log<T: Serialize>(&self, event: &T) -> Result<()> {
        let date  = Utc::now().format("%Y-%m-%d").to_string();
        let path  = self.log_dir.join(format!("{date}.jsonl"));
        let line  = serde_json::to_string(event)?;
        let mut f = OpenOptions::new().create(true).append(true).open(&path)?;
        writeln!(f, "{line}")?;
        Ok(())
    }
}

pub fn now_iso() -> String {
    Utc::now().to_rfc3339()
}

// ── Event typy ────────────────────────────────────────────────────────────────

/// Publikovaný stav hry po úspěšném refresh cyklu (zkrácený výtah záznamu)
#[derive(Serialize, Debug)]
pub struct GameUpdateEvent {
    pub ts:             String,
    pub event:          &'static str,   // "GAME_UPDATE"
    pub team:           String,         // configured short name
    pub opponent:       Option<String>,
    pub state:          String,         // PRE | IN | POST | NOT_FOUND | passthrough
    pub team_score:     Option<i64>,
    pub opponent_score: Option<i64>,
    pub quarter:        Option<i64>,
    pub clock:          Option<String>,
    pub fast_refresh:   bool,
}

#[derive(Serialize, Debug)]
pub struct ApiStatusEvent {
    pub ts:          String,
    pub event:       &'static str,      // "API_STATUS"
    pub source:      String,            // "cflscoreboard"
    pub team:        String,
    pub ok:          bool,
    pub status_code: Option<u16>,
    pub message:     String,
    pub rounds_seen: usize,
}

#[derive(Serialize, Debug)]
pub struct SystemHeartbeatEvent {
    pub ts:            String,
    pub event:         &'static str,    // "SYSTEM_HEARTBEAT"
    pub tracked_teams: usize,
    pub fast_polling:  usize,           // kolik instancí je v 5s režimu
    pub uptime_secs:   u64,
}
