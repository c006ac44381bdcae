/// CflLive — Scoreboard Client
///
/// Poll CFL scoreboardu (rounds.json) pro jeden sledovaný tým:
///   - jeden GET za cyklus, pevné hlavičky, žádné retry ani cache
///   - typovaný serde model odpovědi (kola → zápasy → squady)
///   - normalizace do plochého GameRecord (record.rs)
///
/// Každý tým má vlastní TeamMonitor instanci — nic se nesdílí kromě
/// konstant endpointu a hlaviček.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use coordinator::Refresher;
use logger::{now_iso, ApiStatusEvent, EventLogger, GameUpdateEvent};
use serde::Deserialize;
use std::env;
use std::time::Duration;
use tracing::{debug, info};

pub mod record;
pub use record::{normalize, GameRecord, STATE_NOT_FOUND};

pub const API_ENDPOINT: &str = "https://cflscoreboard.cfl.ca/json/scoreboard/rounds.json";
pub const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 11_6) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/15.0 Safari/605.1.15";

pub const DEFAULT_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_INTERVAL_SECS: u64 = 600;
pub const FAST_INTERVAL_SECS: u64 = 5;

// ── Typy odpovědi (rounds.json) ──────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct Round {
    #[serde(default)]
    pub tournaments: Vec<Tournament>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tournament {
    pub home_squad: Squad,
    pub away_squad: Squad,
    #[serde(default)]
    pub timeouts:   Option<TimeoutPair>,
    pub status:     String,
    pub date:       String,
    #[serde(default)]
    pub active_period: Option<i64>,
    #[serde(default)]
    pub clock:      Option<String>,
    #[serde(default)]
    pub possession: Option<serde_json::Value>,
    #[serde(default)]
    pub markets:    Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Squad {
    pub short_name: String,
    #[serde(default)]
    pub id:    Option<i64>,
    #[serde(default)]
    pub name:  Option<String>,
    #[serde(default)]
    pub score: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct TimeoutPair {
    #[serde(default)]
    pub home: Option<i64>,
    #[serde(default)]
    pub away: Option<i64>,
}

// ── Konfigurace ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct TeamConfig {
    pub team_id:      String,   // short name, např. "BC"
    pub name:         String,   // display name pro logy
    pub timeout_secs: u64,
}

impl TeamConfig {
    /// Parse "BC=BC Lions,WPG" → položky; prázdné se přeskočí
    pub fn parse_list(raw: &str, timeout_secs: u64) -> Vec<TeamConfig> {
        raw.split(',')
            .filter_map(|entry| {
                let entry = entry.trim();
                if entry.is_empty() {
                    return None;
                }
                let (id, name) = match entry.split_once('=') {
                    Some((id, name)) => (id.trim(), name.trim()),
                    None => (entry, entry),
                };
                if id.is_empty() {
                    return None;
                }
                let team_id = id.to_uppercase();
                Some(TeamConfig {
                    name: if name.is_empty() { team_id.clone() } else { name.to_string() },
                    team_id,
                    timeout_secs,
                })
            })
            .collect()
    }

    pub fn from_env() -> Vec<TeamConfig> {
        let timeout = env::var("CFL_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);
        let raw = env::var("CFL_TEAMS").unwrap_or_default();
        Self::parse_list(&raw, timeout)
    }
}

// ── HTTP klient ──────────────────────────────────────────────────────────────

pub struct ScoreboardClient {
    client: reqwest::Client,
}

impl ScoreboardClient {
    pub fn new(timeout_secs: u64) -> Self {
        Self {
            client: reqwest::Client::builder()
                .user_agent(USER_AGENT)
                .timeout(Duration::from_secs(timeout_secs))
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
        }
    }

    /// Jeden GET na scoreboard. Ne-2xx status i nevalidní JSON = tvrdá chyba.
    pub async fn fetch_rounds(&self) -> Result<Vec<Round>> {
        let resp = self
            .client
            .get(API_ENDPOINT)
            .header("Accept", "application/json")
            .send()
            .await
            .context("scoreboard request failed")?;

        let status = resp.status();
        if !status.is_success() {
            return Err(anyhow::anyhow!("scoreboard HTTP {status}"));
        }

        // Endpoint posílá JSON s volným content-type, proto text + from_str
        let raw = resp.text().await.context("scoreboard body read failed")?;
        debug!("scoreboard raw (first 300): {}", &raw[..raw.len().min(300)]);

        let rounds: Vec<Round> =
            serde_json::from_str(&raw).context("scoreboard JSON parse failed")?;
        Ok(rounds)
    }
}

// ── TeamMonitor ──────────────────────────────────────────────────────────────

/// Jeden sledovaný tým = jedna instance (vlastní klient, vlastní logger).
pub struct TeamMonitor {
    client: ScoreboardClient,
    logger: EventLogger,
    config: TeamConfig,
}

impl TeamMonitor {
    pub fn new(config: TeamConfig, log_dir: impl Into<std::path::PathBuf>) -> Self {
        Self {
            client: ScoreboardClient::new(config.timeout_secs),
            logger: EventLogger::new(log_dir),
            config,
        }
    }

    fn log_api_status(&self, ok: bool, status_code: Option<u16>, message: &str, rounds_seen: usize) {
        let _ = self.logger.log(&ApiStatusEvent {
            ts:          now_iso(),
            event:       "API_STATUS",
            source:      "cflscoreboard".to_string(),
            team:        self.config.team_id.clone(),
            ok,
            status_code,
            message:     message.to_string(),
            rounds_seen,
        });
    }
}

#[async_trait]
impl Refresher for TeamMonitor {
    type Data = GameRecord;

    async fn refresh(&self) -> Result<GameRecord> {
        let rounds = match self.client.fetch_rounds().await {
            Ok(r) => r,
            Err(e) => {
                self.log_api_status(false, None, &format!("{e:#}"), 0);
                return Err(e);
            }
        };

        let record = normalize(&rounds, &self.config.team_id, Utc::now());
        self.log_api_status(true, Some(200), "ok", rounds.len());

        let _ = self.logger.log(&GameUpdateEvent {
            ts:             now_iso(),
            event:          "GAME_UPDATE",
            team:           self.config.team_id.clone(),
            opponent:       record.opponent_abbr.clone(),
            state:          record.state.clone(),
            team_score:     record.team_score,
            opponent_score: record.opponent_score,
            quarter:        record.quarter,
            clock:          record.clock.clone(),
            fast_refresh:   record.fast_refresh,
        });

        if record.state == STATE_NOT_FOUND {
            debug!("{}: no game on the current scoreboard", self.config.team_id);
        } else {
            info!(
                "{}: vs {} — {} ({}:{})",
                self.config.team_id,
                record.opponent_abbr.as_deref().unwrap_or("?"),
                record.state,
                record.team_score.map_or("-".to_string(), |s| s.to_string()),
                record.opponent_score.map_or("-".to_string(), |s| s.to_string()),
            );
        }

        Ok(record)
    }

    /// 5 s když se hra blíží nebo běží, jinak 10 minut
    fn next_interval(&self, record: &GameRecord) -> Duration {
        if record.fast_refresh {
            Duration::from_secs(FAST_INTERVAL_SECS)
        } else {
            Duration::from_secs(DEFAULT_INTERVAL_SECS)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_list_with_display_names() {
        let teams = TeamConfig::parse_list("BC=BC Lions,WPG", 120);
        assert_eq!(teams.len(), 2);
        assert_eq!(teams[0].team_id, "BC");
        assert_eq!(teams[0].name, "BC Lions");
        assert_eq!(teams[1].team_id, "WPG");
        assert_eq!(teams[1].name, "WPG");
        assert_eq!(teams[1].timeout_secs, 120);
    }

    #[test]
    fn test_parse_list_normalizes_case_and_whitespace() {
        let teams = TeamConfig::parse_list(" bc , ,tor=Argonauts ", 30);
        assert_eq!(teams.len(), 2);
        assert_eq!(teams[0].team_id, "BC");
        assert_eq!(teams[0].name, "BC");
        assert_eq!(teams[1].team_id, "TOR");
        assert_eq!(teams[1].name, "Argonauts");
    }

    #[test]
    fn test_parse_list_empty_input() {
        assert!(TeamConfig::parse_list("", 120).is_empty());
        assert!(TeamConfig::parse_list(" , ,", 120).is_empty());
    }

    #[test]
    fn test_tournament_deserializes_camel_case() {
        let raw = r#"{
            "homeSquad": {"shortName": "BC", "id": 3, "name": "BC Lions", "score": 21},
            "awaySquad": {"shortName": "WPG", "id": 7, "name": "Winnipeg Blue Bombers", "score": 17},
            "timeouts": {"home": 2, "away": 1},
            "status": "live",
            "date": "2026-08-07T19:00:00-04:00",
            "activePeriod": 3,
            "clock": "12:44",
            "possession": "BC",
            "markets": [{"line": -3.5}],
            "somethingUnknown": true
        }"#;
        let game: Tournament = serde_json::from_str(raw).unwrap();
        assert_eq!(game.home_squad.short_name, "BC");
        assert_eq!(game.home_squad.score, Some(21));
        assert_eq!(game.away_squad.id, Some(7));
        assert_eq!(game.active_period, Some(3));
        assert_eq!(game.timeouts.as_ref().unwrap().home, Some(2));
        assert_eq!(game.clock.as_deref(), Some("12:44"));
        assert!(game.markets.is_some());
    }

    #[test]
    fn test_round_without_tournaments_is_empty() {
        let round: Round = serde_json::from_str(r#"{"roundNumber": 9}"#).unwrap();
        assert!(round.tournaments.is_empty());
    }
}
