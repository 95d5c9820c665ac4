use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;

use anyhow::{Context, Result};
use serde_json::Value;

use crate::records::{Blob, Record, RecordKind};
use crate::sink::Sink;
use crate::store::key_columns;

pub type Row = Blob;

/// Blob columns spread into the joined match row.
const ODDS_BLOBS: &[&str] = &["primary_odds", "feed_odds"];
const STAT_BLOBS: &[&str] = &[
    "primary_statistics",
    "feed_statistics",
    "forms",
    "votes",
    "manager_duels",
    "h2h",
];
const LINEUP_COLUMNS: &[&str] = &["primary_player_id", "position_short", "rating", "substitute"];

/// In-memory tables, one per base record kind, in arrival order.
#[derive(Debug, Default)]
pub struct TabularSink {
    tables: BTreeMap<RecordKind, Vec<Row>>,
}

#[derive(Debug, Default)]
pub struct TabularOutput {
    /// One row per stored match with every related table joined in.
    pub matches: Vec<Row>,
    pub player_stats: Vec<Row>,
    pub tables: BTreeMap<&'static str, Vec<Row>>,
}

fn base_kind(kind: RecordKind) -> RecordKind {
    match kind {
        RecordKind::FeedOdds => RecordKind::Odds,
        RecordKind::FeedStatistic => RecordKind::MatchStatistic,
        RecordKind::PlayerBirthdate | RecordKind::SecondaryId => RecordKind::Player,
        RecordKind::SecondaryStat | RecordKind::SecondaryChecked => RecordKind::PlayerStat,
        other => other,
    }
}

fn same_key(row: &Row, fields: &Row, keys: &[&str]) -> bool {
    keys.iter().all(|key| row.get(*key) == fields.get(*key))
}

impl TabularSink {
    fn apply_update(&mut self, kind: RecordKind, mut fields: Row) {
        let keys = key_columns(kind);
        if kind == RecordKind::SecondaryStat {
            fields.insert("has_secondary_stat".to_string(), Value::Bool(true));
        }
        let rows = self.tables.entry(base_kind(kind)).or_default();
        let mut touched = false;
        for row in rows.iter_mut().filter(|row| same_key(row, &fields, keys)) {
            touched = true;
            for (column, value) in &fields {
                if kind == RecordKind::SecondaryChecked
                    && column == "has_secondary_stat"
                    && row.get("secondary_stat").is_some_and(|v| !v.is_null())
                {
                    continue;
                }
                row.insert(column.clone(), value.clone());
            }
        }
        if !touched && matches!(kind, RecordKind::FeedOdds | RecordKind::FeedStatistic) {
            rows.push(fields);
        }
    }
}

impl Sink for TabularSink {
    type Output = TabularOutput;

    fn accept(&mut self, record: Record) {
        let kind = record.kind();
        let fields = record.to_fields();
        if kind.is_update() {
            self.apply_update(kind, fields);
        } else {
            self.tables.entry(kind).or_default().push(fields);
        }
    }

    fn finalize(self) -> TabularOutput {
        let matches = join_matches(&self.tables);
        let player_stats = self
            .tables
            .get(&RecordKind::PlayerStat)
            .cloned()
            .unwrap_or_default();
        let tables = self
            .tables
            .into_iter()
            .map(|(kind, rows)| (kind.table(), rows))
            .collect();
        TabularOutput {
            matches,
            player_stats,
            tables,
        }
    }
}

fn id_of(row: &Row, column: &str) -> Option<u64> {
    row.get(column).and_then(Value::as_u64)
}

/// Right side of a join keyed by one id column. Later rows replace earlier ones.
fn index_by<'a>(rows: Option<&'a Vec<Row>>, column: &str) -> HashMap<u64, &'a Row> {
    rows.into_iter()
        .flatten()
        .filter_map(|row| id_of(row, column).map(|id| (id, row)))
        .collect()
}

fn index_by_pair<'a>(rows: Option<&'a Vec<Row>>, a: &str, b: &str) -> HashMap<(u64, u64), &'a Row> {
    rows.into_iter()
        .flatten()
        .filter_map(|row| Some(((id_of(row, a)?, id_of(row, b)?), row)))
        .collect()
}

fn copy_columns(target: &mut Row, source: &Row, skip: &[&str], prefix: &str) {
    for (column, value) in source {
        if skip.contains(&column.as_str()) {
            continue;
        }
        target.insert(format!("{prefix}{column}"), value.clone());
    }
}

fn spread_blobs(target: &mut Row, source: &Row, blobs: &[&str]) {
    for blob in blobs {
        if let Some(Value::Object(entries)) = source.get(*blob) {
            for (key, value) in entries {
                target.insert(key.clone(), value.clone());
            }
        }
    }
}

fn join_matches(tables: &BTreeMap<RecordKind, Vec<Row>>) -> Vec<Row> {
    let Some(matches) = tables.get(&RecordKind::Match) else {
        return Vec::new();
    };
    let tournaments = index_by(tables.get(&RecordKind::Tournament), "tournament_id");
    let seasons = index_by(tables.get(&RecordKind::Season), "season_id");
    let teams = index_by(tables.get(&RecordKind::Team), "team_id");
    let referees = index_by(tables.get(&RecordKind::Referee), "referee_id");
    let stadiums = index_by(tables.get(&RecordKind::Stadium), "stadium_id");
    let odds = index_by(tables.get(&RecordKind::Odds), "match_id");
    let statistics = index_by(tables.get(&RecordKind::MatchStatistic), "match_id");
    let managers = index_by(tables.get(&RecordKind::Manager), "manager_id");
    let team_lineups = index_by_pair(tables.get(&RecordKind::TeamLineup), "match_id", "team_id");

    let mut sheets: HashMap<(u64, u64), Vec<&Row>> = HashMap::new();
    for row in tables.get(&RecordKind::PlayerLineup).into_iter().flatten() {
        if let (Some(match_id), Some(team_id)) = (id_of(row, "match_id"), id_of(row, "team_id")) {
            sheets.entry((match_id, team_id)).or_default().push(row);
        }
    }
    for sheet in sheets.values_mut() {
        sheet.sort_by_key(|row| id_of(row, "slot").unwrap_or(u64::MAX));
    }

    let mut joined = Vec::with_capacity(matches.len());
    for parent in matches {
        let mut row = parent.clone();
        let match_id = id_of(parent, "match_id");

        if let Some(t) = id_of(parent, "tournament_id").and_then(|id| tournaments.get(&id)) {
            copy_columns(&mut row, t, &["tournament_id"], "");
        }
        if let Some(s) = id_of(parent, "season_id").and_then(|id| seasons.get(&id)) {
            copy_columns(&mut row, s, &["season_id"], "");
        }
        if let Some(r) = id_of(parent, "referee_id").and_then(|id| referees.get(&id)) {
            copy_columns(&mut row, r, &["referee_id"], "");
        }
        if let Some(s) = id_of(parent, "stadium_id").and_then(|id| stadiums.get(&id)) {
            copy_columns(&mut row, s, &["stadium_id"], "stadium_");
        }
        if let Some(o) = match_id.and_then(|id| odds.get(&id)) {
            spread_blobs(&mut row, o, ODDS_BLOBS);
        }
        if let Some(s) = match_id.and_then(|id| statistics.get(&id)) {
            spread_blobs(&mut row, s, STAT_BLOBS);
            for score in ["home_score", "away_score"] {
                if let Some(value) = s.get(score) {
                    row.insert(score.to_string(), value.clone());
                }
            }
        }

        for side in ["home", "away"] {
            let Some(team_id) = id_of(parent, &format!("{side}_team_id")) else {
                continue;
            };
            if let Some(team) = teams.get(&team_id) {
                for column in ["team_name", "team_slug", "team_short"] {
                    if let Some(value) = team.get(column) {
                        row.insert(format!("{side}_{column}"), value.clone());
                    }
                }
            }
            let Some(match_id) = match_id else {
                continue;
            };
            if let Some(lineup) = team_lineups.get(&(match_id, team_id)) {
                if let Some(formation) = lineup.get("formation") {
                    row.insert(format!("{side}_formation"), formation.clone());
                }
                let manager_id = id_of(lineup, "manager_id");
                row.insert(
                    format!("{side}_manager_id"),
                    manager_id.map(Value::from).unwrap_or(Value::Null),
                );
                if let Some(name) = manager_id
                    .and_then(|id| managers.get(&id))
                    .and_then(|m| m.get("manager_name"))
                {
                    row.insert(format!("{side}_manager_name"), name.clone());
                }
            }
            if let Some(sheet) = sheets.get(&(match_id, team_id)) {
                for (idx, player) in sheet.iter().enumerate() {
                    for column in LINEUP_COLUMNS {
                        if let Some(value) = player.get(*column) {
                            row.insert(format!("{side}_{column}_{idx}"), value.clone());
                        }
                    }
                }
            }
        }
        joined.push(row);
    }
    joined
}

fn cell(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(text)) => text.clone(),
        Some(other) => other.to_string(),
    }
}

/// Writes rows as CSV with the union of their columns as the header.
pub fn write_csv(rows: &[Row], path: &Path) -> Result<()> {
    let columns: BTreeSet<&str> = rows
        .iter()
        .flat_map(|row| row.keys().map(String::as_str))
        .collect();
    let mut writer =
        csv::Writer::from_path(path).with_context(|| format!("create {}", path.display()))?;
    writer
        .write_record(columns.iter())
        .context("write csv header")?;
    for row in rows {
        writer
            .write_record(columns.iter().map(|column| cell(row.get(*column))))
            .context("write csv row")?;
    }
    writer.flush().context("flush csv")?;
    Ok(())
}
