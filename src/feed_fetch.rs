use std::collections::{BTreeMap, HashMap};
use std::time::Instant;

use anyhow::Result;
use chrono::NaiveDate;
use rusqlite::Connection;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::dates::parse_slashed_date;
use crate::error::SourceResult;
use crate::executor::Executor;
use crate::http_client::SourceClient;
use crate::records::{Blob, FeedOddsUpdate, FeedStatisticUpdate, Record};
use crate::store::{FeedCandidate, matches_missing_feed};

const SEASON_CSV_URL: &str = "http://www.football-data.co.uk/mmz4281/{year}/{code}.csv";

/// Similarity a feed team name must reach to count as the same team.
pub const NAME_CUTOFF: f64 = 0.8;
const MAX_CLOSE_MATCHES: usize = 3;

const ODDS_COLUMNS: &[&str] = &[
    "B365H", "B365D", "B365A", "BSH", "BSD", "BSA", "BWH", "BWD", "BWA", "GBH", "GBD", "GBA",
    "IWH", "IWD", "IWA", "LBH", "LBD", "LBA", "PSH", "PSD", "PSA", "PH", "PD", "PA", "SOH",
    "SOD", "SOA", "SBH", "SBD", "SBA", "SJH", "SJD", "SJA", "SYH", "SYD", "SYA", "VCH", "VCD",
    "VCA", "WHH", "WHD", "WHA", "Bb1X2", "BbMxH", "BbAvH", "BbMxD", "BbAvD", "BbMxA", "BbAvA",
    "MaxH", "MaxD", "MaxA", "AvgH", "AvgD", "AvgA", "BbOU", "BbMx>2.5", "BbAv>2.5", "BbMx<2.5",
    "BbAv<2.5", "GB>2.5", "GB<2.5", "B365>2.5", "B365<2.5", "P>2.5", "P<2.5", "Max>2.5",
    "Max<2.5", "Avg>2.5", "Avg<2.5", "BbAH", "BbAHh", "AHh", "BbMxAHH", "BbAvAHH", "BbMxAHA",
    "BbAvAHA", "GBAHH", "GBAHA", "GBAH", "LBAHH", "LBAHA", "LBAH", "B365AHH", "B365AHA",
    "B365AH", "PAHH", "PAHA", "MaxAHH", "MaxAHA", "AvgAHH", "AvgAHA",
];

const STAT_COLUMNS: &[&str] = &[
    "HS", "AS", "HST", "AST", "HHW", "AHW", "HC", "AC", "HF", "AF", "HFKC", "AFKC", "HO", "AO",
    "HY", "AY", "HR", "AR", "HBP", "ABP", "Time", "HTHG", "HTAG",
];

/// Season results with bookmaker odds, one CSV per league and season.
pub trait FeedSource: Send + Sync {
    fn season_csv(&self, league_code: &str, season_year: &str) -> SourceResult<String>;
}

pub struct FeedClient<'a> {
    http: &'a SourceClient,
}

impl<'a> FeedClient<'a> {
    pub fn new(http: &'a SourceClient) -> Self {
        Self { http }
    }
}

/// `19/20` to the `1920` path segment the feed uses.
pub fn feed_season(season_year: &str) -> String {
    season_year.replace('/', "")
}

impl FeedSource for FeedClient<'_> {
    fn season_csv(&self, league_code: &str, season_year: &str) -> SourceResult<String> {
        let url = SEASON_CSV_URL
            .replace("{year}", &feed_season(season_year))
            .replace("{code}", league_code);
        Ok(self.http.get_text(&url)?)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FeedRow {
    pub date: NaiveDate,
    pub home_team: String,
    pub away_team: String,
    pub columns: BTreeMap<String, String>,
}

/// Rows with a readable date and both team names. Broken lines are skipped.
pub fn parse_feed_csv(raw: &str) -> Vec<FeedRow> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(raw.trim_start_matches('\u{feff}').as_bytes());
    let headers = match reader.headers() {
        Ok(headers) => headers.clone(),
        Err(err) => {
            warn!(error = %err, "feed csv has no header");
            return Vec::new();
        }
    };

    let mut rows = Vec::new();
    for (line, record) in reader.records().enumerate() {
        let record = match record {
            Ok(record) => record,
            Err(err) => {
                warn!(line = line + 2, error = %err, "skipping unreadable feed row");
                continue;
            }
        };
        let columns: BTreeMap<String, String> = headers
            .iter()
            .zip(record.iter())
            .filter(|(_, value)| !value.is_empty())
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect();
        let date = columns.get("Date").and_then(|d| parse_slashed_date(d));
        let (Some(date), Some(home), Some(away)) =
            (date, columns.get("HomeTeam"), columns.get("AwayTeam"))
        else {
            debug!(line = line + 2, "feed row without date or teams");
            continue;
        };
        rows.push(FeedRow {
            date,
            home_team: home.clone(),
            away_team: away.clone(),
            columns,
        });
    }
    rows
}

/// Up to three names scoring at least [`NAME_CUTOFF`], best first.
pub fn close_matches<'n>(name: &str, pool: &[&'n str]) -> Vec<&'n str> {
    let mut scored: Vec<(f64, &str)> = pool
        .iter()
        .map(|candidate| (strsim::jaro_winkler(name, candidate), *candidate))
        .filter(|(score, _)| *score >= NAME_CUTOFF)
        .collect();
    scored.sort_by(|a, b| b.0.total_cmp(&a.0));
    let mut out: Vec<&str> = Vec::new();
    for (_, candidate) in scored {
        if !out.contains(&candidate) {
            out.push(candidate);
        }
        if out.len() == MAX_CLOSE_MATCHES {
            break;
        }
    }
    out
}

fn team_options<'n>(
    name: &str,
    pool: &[&'n str],
    team_alias: &HashMap<String, String>,
) -> Vec<&'n str> {
    match team_alias.get(name) {
        Some(alias) => pool
            .iter()
            .copied()
            .filter(|candidate| *candidate == alias.as_str())
            .take(1)
            .collect(),
        None => close_matches(name, pool),
    }
}

/// The feed row of one match among the rows played that day.
///
/// A single home candidate decides alone. Otherwise a single away candidate decides, and
/// failing that the row must pair the best away candidate with one of the home candidates.
pub fn select_row<'r>(
    home: &str,
    away: &str,
    day_rows: &[&'r FeedRow],
    team_alias: &HashMap<String, String>,
) -> Option<&'r FeedRow> {
    let homes: Vec<&str> = day_rows.iter().map(|r| r.home_team.as_str()).collect();
    let home_options = team_options(home, &homes, team_alias);
    if let [only] = home_options.as_slice() {
        return day_rows.iter().copied().find(|r| r.home_team == *only);
    }

    let aways: Vec<&str> = day_rows.iter().map(|r| r.away_team.as_str()).collect();
    let away_options = team_options(away, &aways, team_alias);
    match (home_options.as_slice(), away_options.as_slice()) {
        ([], []) => {
            debug!(home, away, "no feed team names matched");
            None
        }
        (_, [only]) => day_rows.iter().copied().find(|r| r.away_team == *only),
        (_, [best, ..]) => day_rows.iter().copied().find(|r| {
            r.away_team == *best && home_options.contains(&r.home_team.as_str())
        }),
        _ => None,
    }
}

fn column_value(raw: &str) -> Value {
    raw.parse::<f64>()
        .ok()
        .and_then(serde_json::Number::from_f64)
        .map(Value::Number)
        .unwrap_or_else(|| Value::from(raw))
}

fn pick_columns(row: &FeedRow, allowed: &[&str]) -> Blob {
    allowed
        .iter()
        .filter_map(|column| {
            row.columns
                .get(*column)
                .map(|raw| (column.to_string(), column_value(raw)))
        })
        .collect()
}

/// Feed updates for one matched row.
pub fn feed_records(match_id: u64, row: &FeedRow) -> Vec<Record> {
    let mut out = Vec::with_capacity(2);
    let score = |column: &str| row.columns.get(column).and_then(|v| v.parse::<f64>().ok());
    out.push(
        FeedStatisticUpdate {
            match_id,
            feed_statistics: pick_columns(row, STAT_COLUMNS),
            home_score: score("FTHG"),
            away_score: score("FTAG"),
        }
        .into(),
    );
    let odds = pick_columns(row, ODDS_COLUMNS);
    if !odds.is_empty() {
        out.push(
            FeedOddsUpdate {
                match_id,
                feed_odds: odds,
            }
            .into(),
        );
    }
    out
}

/// Stored matches of one tournament season, fetched against one CSV.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedWork {
    pub tournament_id: u64,
    pub season_year: String,
    pub matches: Vec<FeedCandidate>,
}

/// Groups candidates by tournament and season, keeping their order inside each group.
pub fn group_feed_work(candidates: Vec<FeedCandidate>) -> Vec<FeedWork> {
    let mut groups: BTreeMap<(u64, String), Vec<FeedCandidate>> = BTreeMap::new();
    for candidate in candidates {
        let Some(year) = candidate.season_year.clone() else {
            debug!(match_id = candidate.match_id, "stored match has no season year");
            continue;
        };
        groups
            .entry((candidate.tournament_id, year))
            .or_default()
            .push(candidate);
    }
    groups
        .into_iter()
        .map(|((tournament_id, season_year), matches)| FeedWork {
            tournament_id,
            season_year,
            matches,
        })
        .collect()
}

pub struct FeedRun<'a, F: ?Sized> {
    source: &'a F,
    executor: &'a Executor,
    league_codes: HashMap<u64, String>,
    team_alias: &'a HashMap<String, String>,
}

impl<'a, F: FeedSource + ?Sized> FeedRun<'a, F> {
    pub fn new(
        source: &'a F,
        executor: &'a Executor,
        league_codes: HashMap<u64, String>,
        team_alias: &'a HashMap<String, String>,
    ) -> Self {
        Self {
            source,
            executor,
            league_codes,
            team_alias,
        }
    }

    pub fn fetch_feed(
        &self,
        conn: &Connection,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Record>> {
        let candidates = matches_missing_feed(conn, start, end)?;
        Ok(self.match_candidates(candidates))
    }

    pub fn match_candidates(&self, candidates: Vec<FeedCandidate>) -> Vec<Record> {
        let started = Instant::now();
        let work = group_feed_work(candidates);
        let records = self.executor.run_chunked(&work, |unit| self.process(unit));
        info!(
            groups = work.len(),
            records = records.len(),
            elapsed_secs = started.elapsed().as_secs_f64(),
            "feed run finished"
        );
        records
    }

    fn process(&self, unit: &FeedWork) -> Vec<Record> {
        let Some(code) = self.league_codes.get(&unit.tournament_id) else {
            warn!(tournament = unit.tournament_id, "no feed league for tournament");
            return Vec::new();
        };
        let raw = match self.source.season_csv(code, &unit.season_year) {
            Ok(raw) => raw,
            Err(err) => {
                warn!(code = %code, season = %unit.season_year, error = %err, "feed csv unavailable");
                return Vec::new();
            }
        };
        let rows = parse_feed_csv(&raw);

        let mut out = Vec::new();
        for candidate in &unit.matches {
            let day_rows: Vec<&FeedRow> =
                rows.iter().filter(|r| r.date == candidate.match_date).collect();
            let by_short = match (&candidate.home_short, &candidate.away_short) {
                (Some(home), Some(away)) => select_row(home, away, &day_rows, self.team_alias),
                _ => None,
            };
            let selected = by_short.or_else(|| {
                select_row(
                    &candidate.home_team,
                    &candidate.away_team,
                    &day_rows,
                    self.team_alias,
                )
            });
            match selected {
                Some(row) => out.extend(feed_records(candidate.match_id, row)),
                None => warn!(
                    match_id = candidate.match_id,
                    date = %candidate.match_date,
                    home = %candidate.home_team,
                    away = %candidate.away_team,
                    "no feed row for match"
                ),
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn season_path_drops_slash() {
        assert_eq!(feed_season("19/20"), "1920");
    }

    #[test]
    fn close_matches_respect_cutoff() {
        let pool = ["Man United", "Man City", "Liverpool"];
        let found = close_matches("Man United", &pool);
        assert_eq!(found.first(), Some(&"Man United"));
        assert!(!found.contains(&"Liverpool"));
        assert!(close_matches("Watford", &pool).is_empty());
    }
}
