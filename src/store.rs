use std::path::Path;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use rusqlite::{Connection, params};

use crate::records::RecordKind;

pub fn open_db(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).ok();
    }
    let conn =
        Connection::open(path).with_context(|| format!("open sqlite db {}", path.display()))?;
    init_schema(&conn)?;
    Ok(conn)
}

pub fn open_in_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory().context("open in-memory sqlite db")?;
    init_schema(&conn)?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        PRAGMA journal_mode = WAL;
        CREATE TABLE IF NOT EXISTS tournaments (
            tournament_id INTEGER PRIMARY KEY,
            tournament_name TEXT NOT NULL,
            tournament_short TEXT NULL
        );
        CREATE TABLE IF NOT EXISTS seasons (
            season_id INTEGER PRIMARY KEY,
            season_year TEXT NULL,
            season_name TEXT NULL,
            season_slug TEXT NULL
        );
        CREATE TABLE IF NOT EXISTS teams (
            team_id INTEGER PRIMARY KEY,
            team_name TEXT NOT NULL,
            team_slug TEXT NULL,
            team_short TEXT NULL
        );
        CREATE TABLE IF NOT EXISTS matches (
            match_id INTEGER PRIMARY KEY,
            tournament_id INTEGER NOT NULL,
            season_id INTEGER NULL,
            match_date TEXT NULL,
            full_date TEXT NULL,
            match_status TEXT NULL,
            home_team_id INTEGER NOT NULL,
            away_team_id INTEGER NOT NULL,
            referee_id INTEGER NULL,
            stadium_id INTEGER NULL
        );
        CREATE INDEX IF NOT EXISTS idx_matches_date ON matches(match_date);
        CREATE INDEX IF NOT EXISTS idx_matches_tournament ON matches(tournament_id, season_id);

        CREATE TABLE IF NOT EXISTS referees (
            referee_id INTEGER PRIMARY KEY,
            referee_name TEXT NOT NULL,
            yellow_card_per_game REAL NULL,
            red_card_per_game REAL NULL
        );
        CREATE TABLE IF NOT EXISTS stadiums (
            stadium_id INTEGER PRIMARY KEY,
            country TEXT NULL,
            city TEXT NULL,
            name TEXT NULL,
            capacity INTEGER NULL
        );
        CREATE TABLE IF NOT EXISTS odds (
            match_id INTEGER PRIMARY KEY,
            primary_odds TEXT NULL,
            feed_odds TEXT NULL
        );
        CREATE TABLE IF NOT EXISTS statistics (
            match_id INTEGER PRIMARY KEY,
            primary_statistics TEXT NULL,
            feed_statistics TEXT NULL,
            forms TEXT NULL,
            votes TEXT NULL,
            manager_duels TEXT NULL,
            h2h TEXT NULL,
            home_score REAL NULL,
            away_score REAL NULL
        );
        CREATE TABLE IF NOT EXISTS team_lineups (
            match_id INTEGER NOT NULL,
            team_id INTEGER NOT NULL,
            formation TEXT NULL,
            manager_id INTEGER NULL,
            PRIMARY KEY (match_id, team_id)
        );
        CREATE TABLE IF NOT EXISTS managers (
            manager_id INTEGER PRIMARY KEY,
            manager_name TEXT NOT NULL
        );
        CREATE TABLE IF NOT EXISTS player_lineups (
            match_id INTEGER NOT NULL,
            team_id INTEGER NOT NULL,
            primary_player_id INTEGER NOT NULL,
            position_long TEXT NULL,
            position_short TEXT NULL,
            rating REAL NULL,
            substitute INTEGER NOT NULL,
            slot INTEGER NOT NULL,
            PRIMARY KEY (match_id, primary_player_id)
        );
        CREATE TABLE IF NOT EXISTS players (
            primary_player_id INTEGER PRIMARY KEY,
            secondary_player_id INTEGER NULL,
            full_name TEXT NOT NULL,
            slug TEXT NULL,
            short_name TEXT NULL,
            birth_date TEXT NULL,
            height INTEGER NULL
        );
        CREATE TABLE IF NOT EXISTS player_stats (
            primary_player_id INTEGER NOT NULL,
            match_id INTEGER NOT NULL,
            primary_stat TEXT NULL,
            secondary_stat TEXT NULL,
            has_primary_stat INTEGER NOT NULL,
            has_secondary_stat INTEGER NOT NULL,
            secondary_checked INTEGER NOT NULL DEFAULT 0,
            PRIMARY KEY (primary_player_id, match_id)
        );
        CREATE INDEX IF NOT EXISTS idx_player_stats_pending
            ON player_stats(secondary_checked, primary_player_id);
        "#,
    )
    .context("init sqlite schema")?;
    Ok(())
}

/// Conflict target of each base table.
pub fn key_columns(kind: RecordKind) -> &'static [&'static str] {
    match kind {
        RecordKind::Tournament => &["tournament_id"],
        RecordKind::Season => &["season_id"],
        RecordKind::Team => &["team_id"],
        RecordKind::Match => &["match_id"],
        RecordKind::Referee => &["referee_id"],
        RecordKind::Stadium => &["stadium_id"],
        RecordKind::Odds | RecordKind::FeedOdds => &["match_id"],
        RecordKind::MatchStatistic | RecordKind::FeedStatistic => &["match_id"],
        RecordKind::TeamLineup => &["match_id", "team_id"],
        RecordKind::Manager => &["manager_id"],
        RecordKind::PlayerLineup => &["match_id", "primary_player_id"],
        RecordKind::Player | RecordKind::PlayerBirthdate | RecordKind::SecondaryId => {
            &["primary_player_id"]
        }
        RecordKind::PlayerStat | RecordKind::SecondaryStat => &["primary_player_id", "match_id"],
        RecordKind::SecondaryChecked => &["primary_player_id"],
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchAppearance {
    pub match_id: u64,
    pub match_date: NaiveDate,
}

/// A player whose statistic rows have not been looked up on the secondary source.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingPlayer {
    pub primary_player_id: u64,
    pub secondary_player_id: Option<u64>,
    pub full_name: String,
    pub short_name: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub matches: Vec<MatchAppearance>,
}

/// A stored match that has no feed odds yet.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedCandidate {
    pub match_id: u64,
    pub tournament_id: u64,
    pub season_id: Option<u64>,
    pub season_year: Option<String>,
    pub match_date: NaiveDate,
    pub home_team: String,
    pub away_team: String,
    pub home_short: Option<String>,
    pub away_short: Option<String>,
}

fn parse_stored_date(raw: Option<String>) -> Option<NaiveDate> {
    raw.and_then(|raw| NaiveDate::parse_from_str(raw.get(..10)?, "%Y-%m-%d").ok())
}

pub fn pending_players(conn: &Connection, limit: usize) -> Result<Vec<PendingPlayer>> {
    let mut stmt = conn
        .prepare(
            r#"
            SELECT p.primary_player_id, p.secondary_player_id, p.full_name, p.short_name,
                   p.birth_date
            FROM players p
            WHERE EXISTS (
                SELECT 1 FROM player_stats s
                WHERE s.primary_player_id = p.primary_player_id
                  AND s.secondary_checked = 0
            )
            ORDER BY p.primary_player_id ASC
            LIMIT ?1
            "#,
        )
        .context("prepare pending players query")?;
    let rows = stmt
        .query_map(params![limit as i64], |row| {
            Ok(PendingPlayer {
                primary_player_id: row.get::<_, u64>(0)?,
                secondary_player_id: row.get::<_, Option<u64>>(1)?,
                full_name: row.get(2)?,
                short_name: row.get(3)?,
                birth_date: parse_stored_date(row.get(4)?),
                matches: Vec::new(),
            })
        })
        .context("query pending players")?;

    let mut out = Vec::new();
    for row in rows {
        let mut player = row.context("decode pending player row")?;
        player.matches = unchecked_matches(conn, player.primary_player_id)?;
        out.push(player);
    }
    Ok(out)
}

fn unchecked_matches(conn: &Connection, player_id: u64) -> Result<Vec<MatchAppearance>> {
    let mut stmt = conn
        .prepare_cached(
            r#"
            SELECT s.match_id, m.match_date
            FROM player_stats s
            JOIN matches m ON m.match_id = s.match_id
            WHERE s.primary_player_id = ?1
              AND s.secondary_checked = 0
            ORDER BY m.match_date ASC, s.match_id ASC
            "#,
        )
        .context("prepare player matches query")?;
    let rows = stmt
        .query_map(params![player_id as i64], |row| {
            Ok((row.get::<_, u64>(0)?, row.get::<_, Option<String>>(1)?))
        })
        .context("query player matches")?;

    let mut out = Vec::new();
    for row in rows {
        let (match_id, raw_date) = row.context("decode player match row")?;
        if let Some(match_date) = parse_stored_date(raw_date) {
            out.push(MatchAppearance {
                match_id,
                match_date,
            });
        }
    }
    Ok(out)
}

pub fn matches_missing_feed(
    conn: &Connection,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Vec<FeedCandidate>> {
    let mut stmt = conn
        .prepare(
            r#"
            SELECT m.match_id, m.tournament_id, m.season_id, s.season_year, m.match_date,
                   ht.team_name, at.team_name, ht.team_short, at.team_short
            FROM matches m
            LEFT JOIN seasons s ON s.season_id = m.season_id
            LEFT JOIN teams ht ON ht.team_id = m.home_team_id
            LEFT JOIN teams at ON at.team_id = m.away_team_id
            LEFT JOIN odds o ON o.match_id = m.match_id
            WHERE m.match_date >= ?1
              AND m.match_date <= ?2
              AND o.feed_odds IS NULL
            ORDER BY m.tournament_id ASC, m.season_id ASC, m.match_date ASC, m.match_id ASC
            "#,
        )
        .context("prepare missing feed query")?;
    let start = start.format("%Y-%m-%d").to_string();
    let end = end.format("%Y-%m-%d").to_string();
    let rows = stmt
        .query_map(params![start, end], |row| {
            Ok((
                row.get::<_, u64>(0)?,
                row.get::<_, u64>(1)?,
                row.get::<_, Option<u64>>(2)?,
                row.get::<_, Option<String>>(3)?,
                row.get::<_, Option<String>>(4)?,
                row.get::<_, Option<String>>(5)?,
                row.get::<_, Option<String>>(6)?,
                row.get::<_, Option<String>>(7)?,
                row.get::<_, Option<String>>(8)?,
            ))
        })
        .context("query missing feed")?;

    let mut out = Vec::new();
    for row in rows {
        let (match_id, tournament_id, season_id, season_year, raw_date, home, away, hs, aws) =
            row.context("decode missing feed row")?;
        let (Some(match_date), Some(home_team), Some(away_team)) =
            (parse_stored_date(raw_date), home, away)
        else {
            continue;
        };
        out.push(FeedCandidate {
            match_id,
            tournament_id,
            season_id,
            season_year,
            match_date,
            home_team,
            away_team,
            home_short: hs,
            away_short: aws,
        });
    }
    Ok(out)
}
