use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::Value;

use crate::error::ParseError;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DayListing {
    #[serde(rename = "sportItem", default)]
    pub sport_item: Option<SportItem>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SportItem {
    #[serde(default, deserialize_with = "vec_or_default")]
    pub tournaments: Vec<DayTournament>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DayTournament {
    #[serde(default)]
    pub tournament: Option<TournamentInfo>,
    #[serde(default, deserialize_with = "vec_or_default")]
    pub events: Vec<EventRef>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventRef {
    #[serde(default, deserialize_with = "id_or_none")]
    pub id: Option<u64>,
}

impl DayListing {
    pub fn tournaments(&self) -> &[DayTournament] {
        self.sport_item
            .as_ref()
            .map(|item| item.tournaments.as_slice())
            .unwrap_or_default()
    }
}

impl DayTournament {
    pub fn unique_id(&self) -> Option<u64> {
        self.tournament.as_ref().and_then(|t| t.unique_id)
    }

    pub fn name(&self) -> &str {
        self.tournament
            .as_ref()
            .and_then(|t| t.name.as_deref())
            .unwrap_or("Unknown")
    }

    /// Event ids in listing order; entries without an id are skipped.
    pub fn event_ids(&self) -> Vec<u64> {
        self.events.iter().filter_map(|e| e.id).collect()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TournamentInfo {
    #[serde(rename = "uniqueId", default, deserialize_with = "id_or_none")]
    pub unique_id: Option<u64>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub slug: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventDocument {
    #[serde(default)]
    pub event: Option<EventInfo>,
    #[serde(default)]
    pub statistics: Option<StatisticsBlock>,
    #[serde(rename = "teamsForm", default)]
    pub teams_form: Option<TeamsForm>,
    #[serde(default)]
    pub vote: Option<Votes>,
    #[serde(rename = "managerDuel", default)]
    pub manager_duel: Option<ManagerDuel>,
    #[serde(rename = "h2hDuel", default)]
    pub h2h_duel: Option<H2hDuel>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventInfo {
    #[serde(default, deserialize_with = "id_or_none")]
    pub id: Option<u64>,
    #[serde(default)]
    pub tournament: Option<TournamentInfo>,
    #[serde(default)]
    pub season: Option<SeasonInfo>,
    #[serde(rename = "homeTeam", default)]
    pub home_team: Option<TeamInfo>,
    #[serde(rename = "awayTeam", default)]
    pub away_team: Option<TeamInfo>,
    #[serde(rename = "formatedStartDate", default)]
    pub formatted_start_date: Option<String>,
    #[serde(rename = "startTime", default)]
    pub start_time: Option<String>,
    #[serde(rename = "startTimestamp", default, deserialize_with = "i64_or_none")]
    pub start_timestamp: Option<i64>,
    #[serde(default)]
    pub status: Option<StatusInfo>,
    #[serde(default)]
    pub referee: Option<RefereeInfo>,
    #[serde(default)]
    pub venue: Option<VenueInfo>,
    #[serde(rename = "homeScore", default)]
    pub home_score: Option<ScoreInfo>,
    #[serde(rename = "awayScore", default)]
    pub away_score: Option<ScoreInfo>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SeasonInfo {
    #[serde(default, deserialize_with = "id_or_none")]
    pub id: Option<u64>,
    #[serde(default, deserialize_with = "text_or_none")]
    pub year: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub slug: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TeamInfo {
    #[serde(default, deserialize_with = "id_or_none")]
    pub id: Option<u64>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(rename = "shortName", default)]
    pub short_name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StatusInfo {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RefereeInfo {
    #[serde(default, deserialize_with = "id_or_none")]
    pub id: Option<u64>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(rename = "yellowCardsPerGame", default, deserialize_with = "float_or_none")]
    pub yellow_cards_per_game: Option<f64>,
    #[serde(rename = "redCardsPerGame", default, deserialize_with = "float_or_none")]
    pub red_cards_per_game: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NamedRef {
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StadiumInfo {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "u64_or_none")]
    pub capacity: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct VenueInfo {
    #[serde(default, deserialize_with = "id_or_none")]
    pub id: Option<u64>,
    #[serde(default)]
    pub country: Option<NamedRef>,
    #[serde(default)]
    pub city: Option<NamedRef>,
    #[serde(default)]
    pub stadium: Option<StadiumInfo>,
}

impl VenueInfo {
    pub fn country_name(&self) -> Option<&str> {
        self.country.as_ref().and_then(|c| c.name.as_deref())
    }

    pub fn city_name(&self) -> Option<&str> {
        self.city.as_ref().and_then(|c| c.name.as_deref())
    }

    pub fn stadium_name(&self) -> Option<&str> {
        self.stadium.as_ref().and_then(|s| s.name.as_deref())
    }

    pub fn capacity(&self) -> Option<u64> {
        self.stadium.as_ref().and_then(|s| s.capacity)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScoreInfo {
    #[serde(default, deserialize_with = "float_or_none")]
    pub current: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StatisticsBlock {
    #[serde(default, deserialize_with = "vec_or_default")]
    pub periods: Vec<StatisticsPeriod>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StatisticsPeriod {
    #[serde(default)]
    pub period: Option<String>,
    #[serde(default, deserialize_with = "vec_or_default")]
    pub groups: Vec<StatisticsGroup>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StatisticsGroup {
    #[serde(rename = "groupName", default)]
    pub group_name: Option<String>,
    #[serde(rename = "statisticsItems", default, deserialize_with = "vec_or_default")]
    pub items: Vec<StatisticsItem>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StatisticsItem {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub home: Option<Value>,
    #[serde(default)]
    pub away: Option<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TeamsForm {
    #[serde(rename = "homeTeam", default)]
    pub home: Option<TeamForm>,
    #[serde(rename = "awayTeam", default)]
    pub away: Option<TeamForm>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TeamForm {
    #[serde(rename = "avgRating", default, deserialize_with = "float_or_none")]
    pub avg_rating: Option<f64>,
    #[serde(default, deserialize_with = "i64_or_none")]
    pub position: Option<i64>,
    #[serde(default, deserialize_with = "float_or_none")]
    pub points: Option<f64>,
    #[serde(default, deserialize_with = "vec_or_default")]
    pub form: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Votes {
    #[serde(default, deserialize_with = "i64_or_none")]
    pub vote1: Option<i64>,
    #[serde(default, deserialize_with = "i64_or_none")]
    pub vote2: Option<i64>,
    #[serde(rename = "voteX", default, deserialize_with = "i64_or_none")]
    pub vote_x: Option<i64>,
    #[serde(rename = "vote1ScaledPercentage", default, deserialize_with = "float_or_none")]
    pub vote1_perc: Option<f64>,
    #[serde(rename = "vote2ScaledPercentage", default, deserialize_with = "float_or_none")]
    pub vote2_perc: Option<f64>,
    #[serde(rename = "voteXScaledPercentage", default, deserialize_with = "float_or_none")]
    pub vote_x_perc: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct IdRef {
    #[serde(default, deserialize_with = "id_or_none")]
    pub id: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ManagerDuel {
    #[serde(rename = "homeManagerWins", default, deserialize_with = "i64_or_none")]
    pub home_wins: Option<i64>,
    #[serde(rename = "awayManagerWins", default, deserialize_with = "i64_or_none")]
    pub away_wins: Option<i64>,
    #[serde(default, deserialize_with = "i64_or_none")]
    pub draws: Option<i64>,
    #[serde(rename = "homeManager", default)]
    pub home_manager: Option<IdRef>,
    #[serde(rename = "awayManager", default)]
    pub away_manager: Option<IdRef>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct H2hDuel {
    #[serde(default, deserialize_with = "i64_or_none")]
    pub homewins: Option<i64>,
    #[serde(default, deserialize_with = "i64_or_none")]
    pub awaywins: Option<i64>,
    #[serde(default, deserialize_with = "i64_or_none")]
    pub draws: Option<i64>,
}

impl EventDocument {
    pub fn match_id(&self) -> Option<u64> {
        self.event.as_ref().and_then(|e| e.id)
    }

    pub fn unique_tournament_id(&self) -> Option<u64> {
        self.event
            .as_ref()
            .and_then(|e| e.tournament.as_ref())
            .and_then(|t| t.unique_id)
    }

    pub fn home_team_id(&self) -> Option<u64> {
        self.event
            .as_ref()
            .and_then(|e| e.home_team.as_ref())
            .and_then(|t| t.id)
    }

    pub fn away_team_id(&self) -> Option<u64> {
        self.event
            .as_ref()
            .and_then(|e| e.away_team.as_ref())
            .and_then(|t| t.id)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LineupDocument {
    #[serde(rename = "homeTeam", default)]
    pub home: Option<TeamSheet>,
    #[serde(rename = "awayTeam", default)]
    pub away: Option<TeamSheet>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TeamSheet {
    #[serde(default, deserialize_with = "formation_or_none")]
    pub formation: Option<String>,
    #[serde(default)]
    pub manager: Option<ManagerInfo>,
    #[serde(rename = "lineupsSorted", default, deserialize_with = "vec_or_default")]
    pub players: Vec<LineupEntry>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ManagerInfo {
    #[serde(default, deserialize_with = "id_or_none")]
    pub id: Option<u64>,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LineupEntry {
    #[serde(default, deserialize_with = "bool_or_false")]
    pub substitute: bool,
    #[serde(rename = "positionName", default)]
    pub position_name: Option<String>,
    #[serde(rename = "positionNameshort", default)]
    pub position_short: Option<String>,
    #[serde(default, deserialize_with = "float_or_none")]
    pub rating: Option<f64>,
    #[serde(default)]
    pub player: Option<PlayerInfo>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PlayerInfo {
    #[serde(default, deserialize_with = "id_or_none")]
    pub id: Option<u64>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(rename = "shortName", default)]
    pub short_name: Option<String>,
    #[serde(default, deserialize_with = "u64_or_none")]
    pub height: Option<u64>,
}

impl LineupDocument {
    /// Both team sheets when each lists at least one player.
    pub fn sides(&self) -> Option<(&TeamSheet, &TeamSheet)> {
        let home = self.home.as_ref().filter(|s| !s.players.is_empty())?;
        let away = self.away.as_ref().filter(|s| !s.players.is_empty())?;
        Some((home, away))
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OddsDocument {
    #[serde(default, deserialize_with = "vec_or_default")]
    pub markets: Vec<OddsMarket>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OddsMarket {
    #[serde(rename = "marketName", default)]
    pub market_name: Option<String>,
    #[serde(rename = "choiceGroup", default, deserialize_with = "text_or_none")]
    pub choice_group: Option<String>,
    #[serde(default, deserialize_with = "vec_or_default")]
    pub choices: Vec<OddsChoice>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OddsChoice {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(rename = "fractionalValue", default, deserialize_with = "text_or_none")]
    pub fractional_value: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PlayerStatDocument {
    #[serde(rename = "eventData", default)]
    pub event_data: Option<IdRef>,
    #[serde(default)]
    pub player: Option<IdRef>,
    #[serde(default, deserialize_with = "map_or_default")]
    pub groups: BTreeMap<String, StatGroup>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StatGroup {
    #[serde(default, deserialize_with = "map_or_default")]
    pub items: BTreeMap<String, StatItem>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StatItem {
    #[serde(default)]
    pub raw: Option<Value>,
    #[serde(default, deserialize_with = "text_or_none")]
    pub value: Option<String>,
}

impl PlayerStatDocument {
    pub fn match_id(&self) -> Option<u64> {
        self.event_data.as_ref().and_then(|e| e.id)
    }

    pub fn player_id(&self) -> Option<u64> {
        self.player.as_ref().and_then(|p| p.id)
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    pub fn item(&self, group: &str, name: &str) -> Option<&StatItem> {
        self.groups.get(group).and_then(|g| g.items.get(name))
    }
}

pub fn parse_day_listing_json(raw: &str) -> Result<DayListing, ParseError> {
    parse_document(raw, "day listing")
}

pub fn parse_event_json(raw: &str) -> Result<EventDocument, ParseError> {
    parse_document(raw, "event")
}

pub fn parse_lineups_json(raw: &str) -> Result<LineupDocument, ParseError> {
    parse_document(raw, "lineups")
}

pub fn parse_odds_json(raw: &str) -> Result<OddsDocument, ParseError> {
    parse_document(raw, "odds")
}

pub fn parse_player_stat_json(raw: &str) -> Result<PlayerStatDocument, ParseError> {
    parse_document(raw, "player statistics")
}

fn parse_document<T>(raw: &str, context: &str) -> Result<T, ParseError>
where
    T: for<'de> Deserialize<'de> + Default,
{
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == "null" {
        return Ok(T::default());
    }
    serde_json::from_str(trimmed).map_err(|source| ParseError::Json {
        context: context.to_string(),
        source,
    })
}

fn vec_or_default<'de, D, T>(deserializer: D) -> std::result::Result<Vec<T>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: serde::Deserialize<'de>,
{
    let value = Option::<Vec<T>>::deserialize(deserializer)?;
    Ok(value.unwrap_or_default())
}

fn map_or_default<'de, D, T>(
    deserializer: D,
) -> std::result::Result<BTreeMap<String, T>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: serde::Deserialize<'de>,
{
    let value = Option::<BTreeMap<String, T>>::deserialize(deserializer)?;
    Ok(value.unwrap_or_default())
}

fn id_or_none<'de, D>(deserializer: D) -> std::result::Result<Option<u64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(as_u64_any(&value))
}

fn u64_or_none<'de, D>(deserializer: D) -> std::result::Result<Option<u64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    id_or_none(deserializer)
}

fn i64_or_none<'de, D>(deserializer: D) -> std::result::Result<Option<i64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    })
}

fn float_or_none<'de, D>(deserializer: D) -> std::result::Result<Option<f64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    match value {
        Value::Number(n) => Ok(n.as_f64()),
        Value::String(s) => Ok(s.trim().parse::<f64>().ok()),
        _ => Ok(None),
    }
}

fn text_or_none<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

fn bool_or_false<'de, D>(deserializer: D) -> std::result::Result<bool, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(matches!(value, Value::Bool(true)))
}

/// Accepts `"4-4-2"` or `["4", "4", "2"]`.
fn formation_or_none<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    let rendered = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Array(parts) => parts
            .iter()
            .filter_map(|part| match part {
                Value::String(s) => Some(s.trim().to_string()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("-"),
        _ => String::new(),
    };
    Ok(Some(rendered).filter(|s| !s.is_empty()))
}

pub fn as_u64_any(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    }
}
