/// CflLive — Game Record
///
/// Normalizace rounds.json → plochý záznam s pevnou sadou klíčů.
/// Nedostupná pole jsou explicitně null (Option::None), nikdy nechybí —
/// odběratelé se můžou spolehnout na přítomnost klíčů.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use std::time::Duration;

use crate::{Round, Squad, Tournament};

pub const STATE_PRE: &str = "PRE";
pub const STATE_IN: &str = "IN";
pub const STATE_POST: &str = "POST";
pub const STATE_NOT_FOUND: &str = "NOT_FOUND";

/// Fast-poll okno: kickoff blíž než 20 minut
const FAST_REFRESH_WINDOW_SECS: i64 = 1200;

/// Plochý stav jedné hry z pohledu sledovaného týmu. Nahrazuje se celý
/// při každém úspěšném cyklu, nikdy po částech.
///
/// venue / location / tv_network / overunder / last_play /
/// down_distance_text / *_record / *_logo / *_colors / *_win_probability
/// tenhle feed nenese — drží se null kvůli paritě s bohatšími feedy.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GameRecord {
    pub state:      String,
    pub date:       Option<String>,
    pub kickoff_in: Option<String>,
    pub quarter:    Option<i64>,
    pub clock:      Option<String>,
    pub venue:      Option<String>,
    pub location:   Option<String>,
    pub tv_network: Option<String>,
    pub odds:       Option<serde_json::Value>,
    pub overunder:  Option<f64>,
    pub possession: Option<serde_json::Value>,
    pub last_play:  Option<String>,
    pub down_distance_text: Option<String>,

    pub team_abbr:     Option<String>,
    pub team_id:       Option<i64>,
    pub team_name:     Option<String>,
    pub team_record:   Option<String>,
    pub team_homeaway: Option<String>,
    pub team_logo:     Option<String>,
    pub team_colors:   Option<String>,
    pub team_score:    Option<i64>,
    pub team_win_probability: Option<f64>,
    pub team_timeouts: Option<i64>,

    pub opponent_abbr:     Option<String>,
    pub opponent_id:       Option<i64>,
    pub opponent_name:     Option<String>,
    pub opponent_record:   Option<String>,
    pub opponent_homeaway: Option<String>,
    pub opponent_logo:     Option<String>,
    pub opponent_colors:   Option<String>,
    pub opponent_score:    Option<i64>,
    pub opponent_win_probability: Option<f64>,
    pub opponent_timeouts: Option<i64>,

    pub last_update:  String,
    pub fast_refresh: bool,
}

impl GameRecord {
    /// Vyčištěný záznam — plná sada klíčů, všechna volitelná pole null
    fn cleared(state: &str, now: DateTime<Utc>) -> Self {
        Self {
            state:      state.to_string(),
            date:       None,
            kickoff_in: None,
            quarter:    None,
            clock:      None,
            venue:      None,
            location:   None,
            tv_network: None,
            odds:       None,
            overunder:  None,
            possession: None,
            last_play:  None,
            down_distance_text: None,

            team_abbr:     None,
            team_id:       None,
            team_name:     None,
            team_record:   None,
            team_homeaway: None,
            team_logo:     None,
            team_colors:   None,
            team_score:    None,
            team_win_probability: None,
            team_timeouts: None,

            opponent_abbr:     None,
            opponent_id:       None,
            opponent_name:     None,
            opponent_record:   None,
            opponent_homeaway: None,
            opponent_logo:     None,
            opponent_colors:   None,
            opponent_score:    None,
            opponent_win_probability: None,
            opponent_timeouts: None,

            last_update:  w3c(now),
            fast_refresh: false,
        }
    }
}

/// Pohled na jednu stranu zápasu (home nebo away)
struct SideView {
    abbr:     String,
    id:       Option<i64>,
    name:     Option<String>,
    score:    Option<i64>,
    timeouts: Option<i64>,
    homeaway: &'static str,
}

fn side(squad: &Squad, game: &Tournament, which: &'static str) -> SideView {
    let timeouts = game
        .timeouts
        .as_ref()
        .and_then(|t| if which == "home" { t.home } else { t.away });
    SideView {
        abbr:     squad.short_name.clone(),
        id:       squad.id,
        name:     squad.name.clone(),
        score:    squad.score,
        timeouts,
        homeaway: which,
    }
}

/// Najdi první zápas sledovaného týmu (kola v pořadí, zápasy v pořadí;
/// shortName se bere jako unikátní v rámci snapshotu) a zploštli ho.
/// Bez zápasu vrací NOT_FOUND záznam.
pub fn normalize(rounds: &[Round], team_id: &str, now: DateTime<Utc>) -> GameRecord {
    let wanted = team_id.to_uppercase();

    let game = rounds
        .iter()
        .flat_map(|r| r.tournaments.iter())
        .find(|g| {
            g.home_squad.short_name.to_uppercase() == wanted
                || g.away_squad.short_name.to_uppercase() == wanted
        });

    let Some(game) = game else {
        return GameRecord::cleared(STATE_NOT_FOUND, now);
    };

    let home_is_ours = game.home_squad.short_name.to_uppercase() == wanted;
    let (team, opp) = if home_is_ours {
        (
            side(&game.home_squad, game, "home"),
            side(&game.away_squad, game, "away"),
        )
    } else {
        (
            side(&game.away_squad, game, "away"),
            side(&game.home_squad, game, "home"),
        )
    };

    let state = canonical_state(&game.status);
    let kickoff = DateTime::parse_from_rfc3339(&game.date)
        .ok()
        .map(|d| d.with_timezone(&Utc));

    GameRecord {
        fast_refresh: fast_refresh(&state, kickoff, now),
        state,
        date:       Some(game.date.clone()),
        kickoff_in: kickoff.map(|k| humanize_delta(k, now)),
        quarter:    game.active_period,
        clock:      game.clock.clone(),
        venue:      None,
        location:   None,
        tv_network: None,
        odds:       game.markets.clone(),
        overunder:  None,
        possession: game.possession.clone(),
        last_play:  None,
        down_distance_text: None,

        team_abbr:     Some(team.abbr),
        team_id:       team.id,
        team_name:     team.name,
        team_record:   None,
        team_homeaway: Some(team.homeaway.to_string()),
        team_logo:     None,
        team_colors:   None,
        team_score:    team.score,
        team_win_probability: None,
        team_timeouts: team.timeouts,

        opponent_abbr:     Some(opp.abbr),
        opponent_id:       opp.id,
        opponent_name:     opp.name,
        opponent_record:   None,
        opponent_homeaway: Some(opp.homeaway.to_string()),
        opponent_logo:     None,
        opponent_colors:   None,
        opponent_score:    opp.score,
        opponent_win_probability: None,
        opponent_timeouts: opp.timeouts,

        last_update: w3c(now),
    }
}

/// Mapování status → kanonický kód; neznámé stavy projdou uppercase
pub fn canonical_state(status: &str) -> String {
    match status.to_lowercase().as_str() {
        "scheduled" => STATE_PRE.to_string(),
        "live" | "inprogress" => STATE_IN.to_string(),
        "complete" | "final" => STATE_POST.to_string(),
        _ => status.to_uppercase(),
    }
}

/// Fast-poll: hra PRE/IN a kickoff míň než 20 minut daleko.
/// Rozdíl je znaménkový — hra co už běží má záporný rozdíl a projde taky.
pub fn fast_refresh(state: &str, kickoff: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    if state != STATE_PRE && state != STATE_IN {
        return false;
    }
    match kickoff {
        Some(k) => (k - now).num_seconds() < FAST_REFRESH_WINDOW_SECS,
        None => false,
    }
}

/// "in 2h 30m" / "15m ago" / "now" — zaokrouhleno na celé minuty
fn humanize_delta(kickoff: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let secs = (kickoff - now).num_seconds();
    if secs.abs() < 30 {
        return "now".to_string();
    }
    let abs = secs.unsigned_abs();
    let rounded = if abs >= 60 { abs - abs % 60 } else { abs };
    let text = humantime::format_duration(Duration::from_secs(rounded));
    if secs > 0 {
        format!("in {text}")
    } else {
        format!("{text} ago")
    }
}

fn w3c(now: DateTime<Utc>) -> String {
    now.to_rfc3339_opts(SecondsFormat::Secs, true)
}
