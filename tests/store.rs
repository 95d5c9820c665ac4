mod common;

use std::collections::{HashMap, HashSet};

use chrono_tz::Europe::Budapest;
use rusqlite::Connection;

use matchday_miner::config::{MinerConfig, SinkKind};
use matchday_miner::error::{FetchError, SourceResult};
use matchday_miner::executor::Executor;
use matchday_miner::feed_fetch::{FeedRun, FeedSource};
use matchday_miner::match_fetch::MatchOrchestrator;
use matchday_miner::queued_sink::QueuedSink;
use matchday_miner::ratings_fetch::RatingsRun;
use matchday_miner::records::{Record, RecordKind};
use matchday_miner::sink::{AnySink, Sink, SinkOutput};
use matchday_miner::store::{matches_missing_feed, open_in_memory, pending_players};

use common::{FixturePrimary, FixtureSecondary, SECONDARY_ID, read_fixture, ymd};

struct FixtureFeed;

impl FeedSource for FixtureFeed {
    fn season_csv(&self, league_code: &str, season_year: &str) -> SourceResult<String> {
        if league_code == "E0" && season_year == "19/20" {
            Ok(read_fixture("feed_E0_1920.csv"))
        } else {
            Err(FetchError::Http {
                url: format!("{season_year}/{league_code}.csv"),
                status: 404,
            }
            .into())
        }
    }
}

fn flush(conn: &mut Connection, records: Vec<Record>) -> matchday_miner::queued_sink::FlushReport {
    let mut sink = QueuedSink::new(conn);
    sink.accept_all(records);
    sink.finalize().expect("flush should commit")
}

fn count_rows(conn: &Connection, table: &str) -> i64 {
    conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))
        .expect("count rows")
}

fn stored_matches(conn: &mut Connection) {
    let primary = FixturePrimary::new();
    let executor = Executor::new(None);
    let tournaments: HashSet<u64> = [17, 8].into_iter().collect();
    let records =
        MatchOrchestrator::new(&primary, &executor, tournaments, Budapest).fetch_matches(&[1001, 2002]);
    let report = flush(conn, records);
    assert_eq!(report.failed, 0);
}

#[test]
fn queued_sink_stores_every_table() {
    let mut conn = open_in_memory().expect("open store");
    stored_matches(&mut conn);

    assert_eq!(count_rows(&conn, "tournaments"), 2);
    assert_eq!(count_rows(&conn, "seasons"), 2);
    assert_eq!(count_rows(&conn, "teams"), 4);
    assert_eq!(count_rows(&conn, "matches"), 2);
    assert_eq!(count_rows(&conn, "referees"), 1);
    assert_eq!(count_rows(&conn, "stadiums"), 1);
    assert_eq!(count_rows(&conn, "odds"), 1);
    assert_eq!(count_rows(&conn, "statistics"), 2);
    assert_eq!(count_rows(&conn, "team_lineups"), 4);
    assert_eq!(count_rows(&conn, "managers"), 4);
    assert_eq!(count_rows(&conn, "player_lineups"), 8);
    assert_eq!(count_rows(&conn, "players"), 8);
    assert_eq!(count_rows(&conn, "player_stats"), 8);

    let (date, full): (String, String) = conn
        .query_row(
            "SELECT match_date, full_date FROM matches WHERE match_id = 1001",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .expect("stored match");
    assert_eq!(date, "2019-08-11");
    assert_eq!(full, "2019-08-11T17:30:00+02:00");
}

#[test]
fn storing_twice_keeps_one_row_and_existing_values() {
    let mut conn = open_in_memory().expect("open store");
    stored_matches(&mut conn);
    conn.execute(
        "UPDATE players SET secondary_player_id = 5 WHERE primary_player_id = 101",
        [],
    )
    .expect("set secondary id");
    stored_matches(&mut conn);

    assert_eq!(count_rows(&conn, "matches"), 2);
    assert_eq!(count_rows(&conn, "player_stats"), 8);
    let secondary: Option<i64> = conn
        .query_row(
            "SELECT secondary_player_id FROM players WHERE primary_player_id = 101",
            [],
            |row| row.get(0),
        )
        .expect("player row");
    assert_eq!(secondary, Some(5));
}

#[test]
fn pending_players_lists_unchecked_matches() {
    let mut conn = open_in_memory().expect("open store");
    stored_matches(&mut conn);

    let pending = pending_players(&conn, 100).expect("pending players");
    assert_eq!(pending.len(), 8);
    let ids: Vec<u64> = pending.iter().map(|p| p.primary_player_id).collect();
    assert_eq!(ids, vec![100, 101, 200, 201, 300, 301, 400, 401]);
    let messi = pending
        .iter()
        .find(|p| p.primary_player_id == 301)
        .expect("pending player 301");
    assert_eq!(messi.full_name, "Lionel Messi");
    assert_eq!(messi.short_name.as_deref(), Some("L. Messi"));
    assert_eq!(messi.matches.len(), 1);
    assert_eq!(messi.matches[0].match_id, 2002);
    assert_eq!(messi.matches[0].match_date, ymd(2019, 8, 17));

    assert_eq!(pending_players(&conn, 3).expect("limited").len(), 3);
}

#[test]
fn ratings_run_updates_players_and_checks_them_off() {
    let mut conn = open_in_memory().expect("open store");
    stored_matches(&mut conn);

    let primary = FixturePrimary::new().with_birthdate_page(101);
    let secondary = FixtureSecondary::new();
    let aliases = HashMap::new();
    let executor = Executor::new(Some(2));
    let records = RatingsRun::new(&primary, &secondary, &aliases, &executor)
        .with_today(ymd(2020, 1, 1))
        .fetch_ratings(&conn, 100)
        .expect("ratings run");

    let checked = records
        .iter()
        .filter(|r| r.kind() == RecordKind::SecondaryChecked)
        .count();
    assert_eq!(checked, 8);
    assert!(records.iter().any(|r| matches!(
        r,
        Record::SecondaryId(update)
            if update.primary_player_id == 301 && update.secondary_player_id == SECONDARY_ID
    )));
    assert!(records.iter().any(|r| matches!(
        r,
        Record::PlayerBirthdate(update) if update.primary_player_id == 101
    )));

    let report = flush(&mut conn, records);
    assert_eq!(report.failed, 0);

    let (secondary_id, birth): (Option<i64>, Option<String>) = conn
        .query_row(
            "SELECT secondary_player_id, birth_date FROM players WHERE primary_player_id = 301",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .expect("player 301");
    assert_eq!(secondary_id, Some(SECONDARY_ID as i64));
    assert_eq!(birth, None);

    let birth: Option<String> = conn
        .query_row(
            "SELECT birth_date FROM players WHERE primary_player_id = 101",
            [],
            |row| row.get(0),
        )
        .expect("player 101");
    assert_eq!(birth.as_deref(), Some("1985-08-09"));

    let (has_secondary, stat): (i64, Option<String>) = conn
        .query_row(
            "SELECT has_secondary_stat, secondary_stat FROM player_stats \
             WHERE primary_player_id = 301 AND match_id = 2002",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .expect("stat row 301");
    assert_eq!(has_secondary, 1);
    let stat: serde_json::Value =
        serde_json::from_str(&stat.expect("secondary stat stored")).expect("stat json");
    assert_eq!(stat.get("Overall"), Some(&serde_json::Value::from(94)));

    let unrated: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM player_stats WHERE has_secondary_stat = 0",
            [],
            |row| row.get(0),
        )
        .expect("unrated rows");
    assert_eq!(unrated, 7);
    assert!(pending_players(&conn, 100).expect("pending").is_empty());
}

#[test]
fn ratings_through_the_default_sink_reach_the_store() {
    let mut conn = open_in_memory().expect("open store");
    stored_matches(&mut conn);

    let config = MinerConfig::default();
    let kind = config.store_run_sink(None).expect("store run sink");
    assert_eq!(kind, SinkKind::Queued);

    let primary = FixturePrimary::new();
    let secondary = FixtureSecondary::new();
    let executor = Executor::new(None);
    let records = RatingsRun::new(&primary, &secondary, &config.alias, &executor)
        .with_today(ymd(2020, 1, 1))
        .fetch_ratings(&conn, 100)
        .expect("ratings run");

    let mut sink = AnySink::for_kind(kind, Some(&mut conn)).expect("queued sink");
    sink.accept_all(records);
    let Ok(SinkOutput::Queued(report)) = sink.finalize() else {
        panic!("expected a queued flush report");
    };
    assert_eq!(report.failed, 0);
    assert!(report.rows_changed > 0);
    assert!(pending_players(&conn, 100).expect("pending").is_empty());
}

#[test]
fn failing_statement_is_counted_and_the_rest_committed() {
    let mut conn = open_in_memory().expect("open store");
    let primary = FixturePrimary::new();
    let executor = Executor::new(None);
    let tournaments: HashSet<u64> = [17].into_iter().collect();
    let mut managers_seen = 0;
    let records: Vec<Record> =
        MatchOrchestrator::new(&primary, &executor, tournaments, Budapest)
            .fetch_matches(&[1001])
            .into_iter()
            .filter(|r| {
                if r.kind() != RecordKind::Manager {
                    return true;
                }
                managers_seen += 1;
                managers_seen == 1
            })
            .collect();
    let total = records.len();
    conn.execute_batch("DROP TABLE managers").expect("drop managers");

    let report = flush(&mut conn, records);
    assert_eq!(report.failed, 1);
    assert_eq!(report.executed, total - 1);
    assert_eq!(count_rows(&conn, "matches"), 1);
    assert_eq!(count_rows(&conn, "team_lineups"), 2);
    assert_eq!(count_rows(&conn, "player_stats"), 4);
}

#[test]
fn ratings_rerun_after_new_match_keeps_old_stats() {
    let mut conn = open_in_memory().expect("open store");
    stored_matches(&mut conn);

    let primary = FixturePrimary::new();
    let secondary = FixtureSecondary::new();
    let aliases = HashMap::new();
    let executor = Executor::new(None);
    let run = RatingsRun::new(&primary, &secondary, &aliases, &executor).with_today(ymd(2020, 1, 1));
    let records = run.fetch_ratings(&conn, 100).expect("first run");
    flush(&mut conn, records);

    stored_matches(&mut conn);
    let has_secondary: i64 = conn
        .query_row(
            "SELECT has_secondary_stat FROM player_stats \
             WHERE primary_player_id = 301 AND match_id = 2002",
            [],
            |row| row.get(0),
        )
        .expect("stat row 301");
    assert_eq!(has_secondary, 1);
}

#[test]
fn feed_run_fills_odds_for_matched_rows() {
    let mut conn = open_in_memory().expect("open store");
    stored_matches(&mut conn);

    let missing = matches_missing_feed(&conn, ymd(2019, 8, 1), ymd(2019, 8, 31)).expect("missing");
    let ids: Vec<u64> = missing.iter().map(|m| m.match_id).collect();
    assert_eq!(ids, vec![2002, 1001]);
    assert_eq!(missing[1].home_short.as_deref(), Some("Man Utd"));
    assert_eq!(missing[1].season_year.as_deref(), Some("19/20"));

    let codes: HashMap<u64, String> = [(17, "E0".to_string())].into_iter().collect();
    let team_alias = HashMap::new();
    let executor = Executor::new(None);
    let records = FeedRun::new(&FixtureFeed, &executor, codes, &team_alias)
        .fetch_feed(&conn, ymd(2019, 8, 1), ymd(2019, 8, 31))
        .expect("feed run");
    assert_eq!(records.len(), 2);

    let report = flush(&mut conn, records);
    assert_eq!(report.failed, 0);

    let (feed_odds, primary_odds): (Option<String>, Option<String>) = conn
        .query_row(
            "SELECT feed_odds, primary_odds FROM odds WHERE match_id = 1001",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .expect("odds row");
    let feed: serde_json::Value =
        serde_json::from_str(&feed_odds.expect("feed odds stored")).expect("odds json");
    assert_eq!(feed.get("B365H").and_then(serde_json::Value::as_f64), Some(2.1));
    assert!(primary_odds.is_some());

    let (home_score, feed_stats): (Option<f64>, Option<String>) = conn
        .query_row(
            "SELECT home_score, feed_statistics FROM statistics WHERE match_id = 1001",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .expect("statistics row");
    assert_eq!(home_score, Some(4.0));
    assert!(feed_stats.is_some());

    let still_missing =
        matches_missing_feed(&conn, ymd(2019, 8, 1), ymd(2019, 8, 31)).expect("missing");
    let ids: Vec<u64> = still_missing.iter().map(|m| m.match_id).collect();
    assert_eq!(ids, vec![2002]);
}
